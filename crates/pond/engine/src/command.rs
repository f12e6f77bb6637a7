//! Inbound text parsed into a closed set of commands.

/// What a member asked for. Anything that is not a keyword is a message for
/// the current partner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Stop,
    /// `invite <phone #>`; the number is everything after the keyword.
    Invite { number: Option<String> },
    Report,
    Spot,
    Intro,
    /// `help`; only `help 2` produces a reply.
    Help { extended: bool },
    Mute,
    Next,
    Message,
}

impl Command {
    /// Dispatch on the first whitespace-separated token, case-insensitively.
    pub fn parse(text: &str) -> Self {
        let mut tokens = text.split_whitespace();
        let keyword = tokens.next().map(str::to_lowercase).unwrap_or_default();
        let args: Vec<&str> = tokens.collect();

        match keyword.as_str() {
            "stop" => Command::Stop,
            "invite" => Command::Invite {
                number: (!args.is_empty()).then(|| args.join(" ")),
            },
            "report" => Command::Report,
            "spot" => Command::Spot,
            "intro" => Command::Intro,
            "help" => Command::Help {
                extended: args == ["2"],
            },
            "mute" => Command::Mute,
            "next" => Command::Next,
            _ => Command::Message,
        }
    }

    /// Whether the triggering text is forwarded to the partner once the
    /// default flow runs.
    pub fn forwards_text(&self) -> bool {
        !matches!(self, Command::Next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(Command::parse("STOP"), Command::Stop);
        assert_eq!(Command::parse("  Next  "), Command::Next);
        assert_eq!(Command::parse("mUtE please"), Command::Mute);
    }

    #[test]
    fn invite_keeps_the_whole_number() {
        assert_eq!(
            Command::parse("invite (555) 123-4567"),
            Command::Invite {
                number: Some("(555) 123-4567".to_string())
            }
        );
        assert_eq!(Command::parse("invite"), Command::Invite { number: None });
    }

    #[test]
    fn only_help_two_is_extended() {
        assert_eq!(Command::parse("help 2"), Command::Help { extended: true });
        assert_eq!(Command::parse("help"), Command::Help { extended: false });
        assert_eq!(Command::parse("help 2 3"), Command::Help { extended: false });
    }

    #[test]
    fn anything_else_is_a_message() {
        assert_eq!(Command::parse("hey there"), Command::Message);
        assert_eq!(Command::parse(""), Command::Message);
        assert_eq!(Command::parse("stopping by"), Command::Message);
        assert!(Command::parse("hi").forwards_text());
        assert!(!Command::Next.forwards_text());
    }
}
