//! Reply and notification texts.

/// Banner in front of everything the pond itself says.
pub const BANNER: &str = "🦆\n";

/// Spots from the end of the window at which the `spot` reply nudges the
/// member to invite someone.
pub const SPOT_WARNING_MARGIN: i64 = 5;

pub const NOT_A_MEMBER: &str =
    "quack!\nyou're not in duckpond right now. find someone to invite you.";
pub const INVITE_USAGE: &str = "usage: invite <phone #>";
pub const PHONE_FORMAT: &str = "quack! having trouble.\ntry format xxx-xxx-xxxx.";
pub const NOT_DOMESTIC: &str = "quack! phone # must be inside the us.";
pub const ALREADY_INVITED: &str = "quack!\nthey've already been invited.";
pub const SELF_INVITE: &str = "quack! you can't invite yourself.";
pub const REPORTED: &str = "no room in the pond for bad ducks.\nthx for reporting.";
pub const MUTED: &str = "you've muted duckpond.\nsend another message to jump back in.";
pub const NO_ONE: &str = "quack! no one to talk to right now. try again soon.";
pub const SOMETHING_WRONG: &str = "quack! something went wrong.";
pub const TRY_AGAIN: &str = "quack! the pond is busy. try again in a moment.";

pub const MORE_HELP: &str = "\"spot\" to view your spot.\n\
\"intro\" to show welcome message.\n\
\"about\" for more info on duckpond.";

/// Prefix a pond-generated text with the banner.
pub fn frame(text: &str) -> String {
    format!("{BANNER}{text}")
}

pub fn intro(window_size: usize, spot: i64) -> String {
    format!(
        "you're one of {window_size} people in the invite-only duckpond.\n\
write a msg to talk to a random member.\n\
send \"next\" to talk to someone else, \"mute\" to stop talking, or \"report\" for jerks.\n\
\n\
you're in spot #{spot}. #{window_size} gets booted when someone new joins.\n\
invite someone to stay on top: \"invite <phone #>\".\n\
\"help\" and \"about\" for more."
    )
}

/// Welcome sent to a freshly invited member. New invitees always hold spot 1.
pub fn invited(inviter_phone: &str, window_size: usize) -> String {
    format!(
        "welcome to duckpond!\nyou were invited by {inviter_phone}.\njust reply \"stop\" to leave.\n\n{}",
        intro(window_size, 1)
    )
}

pub fn invite_confirmation(e164: &str) -> String {
    format!("invited {e164} to duckpond.\nyou're now in spot #2.")
}

pub fn spot(spot: i64, total: i64, window_size: usize) -> String {
    let mut text = format!("you're in spot #{spot} of {total}.");
    let window = i64::try_from(window_size).unwrap_or(i64::MAX);
    if spot > window.saturating_sub(SPOT_WARNING_MARGIN) {
        text.push_str("\nyou're <5 spots from the end.\ninvite someone to stay in!");
    }
    text
}

pub fn now_talking_to(spot: i64) -> String {
    format!("now talking to #{spot}.")
}

pub fn started_conversation(spot: i64) -> String {
    format!("#{spot} started a conversation with you.")
}
