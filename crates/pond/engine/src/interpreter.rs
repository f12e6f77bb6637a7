//! Command interpreter: one inbound text in, at most one reply out.
//!
//! Keyword commands answer directly. `stop`, `next` and plain messages run
//! the conversation flow: unmute, reuse the live conversation or match a new
//! partner, then forward the text.

use crate::messages::{self, frame};
use crate::{
    Command, ConversationRegistry, MatchEngine, MemberDirectory, NanpPhoneParser, PhoneParser,
    PondError, PondPolicy, PondResult, Transport,
};
use chrono::Utc;
use pond_ledger::InvitationLedger;
use pond_storage::PondStorage;
use pond_types::{Member, MemberId, PhoneHandle};
use std::sync::Arc;

pub struct CommandInterpreter<S: ?Sized> {
    directory: MemberDirectory<S>,
    registry: ConversationRegistry<S>,
    ledger: InvitationLedger<S>,
    matcher: Arc<MatchEngine<S>>,
    transport: Arc<dyn Transport>,
    phones: Arc<dyn PhoneParser>,
    policy: PondPolicy,
}

impl<S> CommandInterpreter<S>
where
    S: PondStorage + ?Sized,
{
    pub fn new(storage: Arc<S>, transport: Arc<dyn Transport>, policy: PondPolicy) -> Self {
        Self {
            directory: MemberDirectory::new(storage.clone()),
            registry: ConversationRegistry::new(storage.clone()),
            ledger: InvitationLedger::new(storage.clone()),
            matcher: Arc::new(MatchEngine::new(storage, policy.stale_after)),
            transport,
            phones: Arc::new(NanpPhoneParser::new()),
            policy,
        }
    }

    pub fn with_matcher(mut self, matcher: MatchEngine<S>) -> Self {
        self.matcher = Arc::new(matcher);
        self
    }

    pub fn with_phone_parser(mut self, phones: Arc<dyn PhoneParser>) -> Self {
        self.phones = phones;
        self
    }

    pub fn directory(&self) -> &MemberDirectory<S> {
        &self.directory
    }

    pub fn ledger(&self) -> &InvitationLedger<S> {
        &self.ledger
    }

    /// Resolve the sender, handle the text and render the framed reply.
    ///
    /// Failures become a generic reply; they are never propagated to the
    /// webhook caller.
    pub async fn respond(&self, from: &PhoneHandle, text: &str) -> Option<String> {
        match self.handle_inbound(from, text).await {
            Ok(reply) => reply.map(|reply| frame(&reply)),
            Err(err) => Some(frame(error_reply(&err))),
        }
    }

    pub async fn handle_inbound(&self, from: &PhoneHandle, text: &str) -> PondResult<Option<String>> {
        let member = self.directory.find_by_phone(from).await?;
        self.handle(text, member.as_ref()).await
    }

    /// Carrier-level opt-out: behaves like the member texting `stop`.
    pub async fn opt_out(&self, from: &PhoneHandle) -> PondResult<()> {
        let member = self.directory.find_by_phone(from).await?;
        if member.is_some() {
            tracing::info!(phone = %from, "carrier opt-out");
        }
        self.handle("stop", member.as_ref()).await.map(|_| ())
    }

    /// Bring `phone` into the pond with an invitation from the bootstrap
    /// identity. Existing members are left alone.
    pub async fn seed(&self, phone: &PhoneHandle) -> PondResult<Option<Member>> {
        if self.directory.find_by_phone(phone).await?.is_some() {
            return Ok(None);
        }
        let member = self.admit(&MemberId::system(), phone).await?;
        Ok(Some(member))
    }

    /// Reply text for `text` from `member`, unframed. `None` means stay quiet.
    pub async fn handle(&self, text: &str, member: Option<&Member>) -> PondResult<Option<String>> {
        let Some(member) = member else {
            return Ok(Some(messages::NOT_A_MEMBER.to_string()));
        };

        let command = Command::parse(text);
        tracing::debug!(member = %member.id, ?command, "inbound command");

        let mut exclude_last = None;
        let mut cleared = false;
        match &command {
            Command::Stop => self.leave(member).await?,
            Command::Invite { number } => {
                return self.invite(member, number.as_deref()).await.map(Some);
            }
            Command::Report => {
                let removed = self.registry.clear_member(&member.id).await?;
                for conversation in &removed {
                    let partner = conversation.partner_of(&member.id);
                    if self.directory.report(partner).await? {
                        tracing::info!(reporter = %member.id, reported = %partner, "member reported");
                    }
                }
                return Ok(Some(messages::REPORTED.to_string()));
            }
            Command::Spot => {
                let position = self.ledger.position(&member.id, self.policy.window_size).await?;
                return Ok(Some(messages::spot(
                    position.spot,
                    position.total,
                    self.policy.window_size,
                )));
            }
            Command::Intro => {
                let position = self.ledger.position(&member.id, self.policy.window_size).await?;
                return Ok(Some(messages::intro(self.policy.window_size, position.spot)));
            }
            Command::Help { extended } => {
                return Ok(extended.then(|| messages::MORE_HELP.to_string()));
            }
            Command::Mute => {
                self.registry.clear_member(&member.id).await?;
                self.directory.set_muted(&member.id, true).await?;
                return Ok(Some(messages::MUTED.to_string()));
            }
            Command::Next => {
                let removed = self.registry.clear_member(&member.id).await?;
                exclude_last = removed
                    .last()
                    .map(|conversation| conversation.partner_of(&member.id).clone());
                cleared = !removed.is_empty();
            }
            Command::Message => {}
        }

        self.converse(member, text, &command, exclude_last, cleared).await
    }

    async fn invite(&self, member: &Member, number: Option<&str>) -> PondResult<String> {
        let Some(raw) = number else {
            return Ok(messages::INVITE_USAGE.to_string());
        };

        let parsed = match self.phones.parse(raw, &self.policy.default_region) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::debug!(member = %member.id, error = %err, "unparseable invite number");
                return Ok(messages::PHONE_FORMAT.to_string());
            }
        };
        if !parsed.is_domestic() {
            return Ok(messages::NOT_DOMESTIC.to_string());
        }
        let handle = parsed.e164();
        if handle == member.phone {
            return Ok(messages::SELF_INVITE.to_string());
        }

        // Someone without a record cannot hold a spot in the window, so the
        // rejection check happens before any record is created.
        if let Some(existing) = self.directory.find_by_phone(&handle).await? {
            let recent = self
                .ledger
                .recent_participants(self.policy.window_size)
                .await?;
            if recent.contains(&existing.id) {
                return Ok(messages::ALREADY_INVITED.to_string());
            }
        }

        let invitee = self.admit(&member.id, &handle).await?;

        let welcome = messages::invited(member.phone.as_str(), self.policy.window_size);
        self.deliver(&invitee.phone, &frame(&welcome)).await;

        Ok(messages::invite_confirmation(handle.as_str()))
    }

    /// Record for `phone` plus its invitation from `inviter`. A record created
    /// here is removed again when the invitation cannot be recorded.
    async fn admit(&self, inviter: &MemberId, phone: &PhoneHandle) -> PondResult<Member> {
        let (invitee, created) = self.directory.lookup_or_create_tracked(phone).await?;
        if let Err(err) = self.ledger.record_invitation(inviter, &invitee.id).await {
            if created {
                if let Err(cleanup) = self.directory.remove(&invitee.id).await {
                    tracing::error!(
                        member = %invitee.id,
                        error = %cleanup,
                        "uninvited member record left behind"
                    );
                }
            }
            return Err(err.into());
        }
        Ok(invitee)
    }

    /// Release one slot and delete the member. The slot is handed back if
    /// the record cannot be deleted.
    async fn leave(&self, member: &Member) -> PondResult<()> {
        let counter = self.ledger.decrement_counter(1).await?;
        if let Err(err) = self.directory.remove(&member.id).await {
            if let Err(restore) = self.ledger.increment_counter(1).await {
                tracing::error!(
                    member = %member.id,
                    error = %restore,
                    "invite counter not restored after failed stop"
                );
            }
            return Err(err);
        }
        tracing::info!(member = %member.id, counter, "member left the pond");
        Ok(())
    }

    async fn converse(
        &self,
        member: &Member,
        text: &str,
        command: &Command,
        exclude_last: Option<MemberId>,
        cleared: bool,
    ) -> PondResult<Option<String>> {
        // Muting only lasts until the member's next interaction.
        self.directory.set_muted(&member.id, false).await?;

        let current = if cleared {
            Vec::new()
        } else {
            self.registry.for_member(&member.id).await?
        };

        let (partner_id, conversation_id, reply) = match current.first() {
            Some(conversation) => (
                conversation.partner_of(&member.id).clone(),
                conversation.id,
                None,
            ),
            None => match self
                .matcher
                .find_partner(member, exclude_last.as_ref())
                .await
            {
                Ok(Some(pairing)) => {
                    let partner_position = self
                        .ledger
                        .position(&pairing.partner, self.policy.window_size)
                        .await?;
                    (
                        pairing.partner,
                        pairing.conversation.id,
                        Some(messages::now_talking_to(partner_position.spot)),
                    )
                }
                Ok(None) => {
                    tracing::debug!(member = %member.id, "nobody to talk to");
                    return Ok(Some(messages::NO_ONE.to_string()));
                }
                Err(PondError::Conflict(reason)) => {
                    // A concurrent request paired this member first.
                    let Some(conversation) =
                        self.registry.for_member(&member.id).await?.into_iter().next()
                    else {
                        return Err(PondError::Conflict(reason));
                    };
                    (
                        conversation.partner_of(&member.id).clone(),
                        conversation.id,
                        None,
                    )
                }
                Err(other) => return Err(other),
            },
        };

        let Some(partner) = self.directory.get(&partner_id).await? else {
            tracing::warn!(
                member = %member.id,
                partner = %partner_id,
                conversation = %conversation_id,
                "partner record missing, dropping conversation"
            );
            self.registry.delete(&conversation_id).await?;
            return Ok(Some(messages::NO_ONE.to_string()));
        };

        if reply.is_some() {
            let position = self.ledger.position(&member.id, self.policy.window_size).await?;
            let notice = messages::started_conversation(position.spot);
            self.deliver(&partner.phone, &frame(&notice)).await;
        }

        if command.forwards_text() {
            self.deliver(&partner.phone, text).await;
            self.registry.touch(&conversation_id, Utc::now()).await?;
        }

        Ok(reply)
    }

    async fn deliver(&self, to: &PhoneHandle, body: &str) {
        if let Err(err) = self.transport.send(to, body).await {
            tracing::warn!(to = %to, error = %err, "outbound message failed");
        }
    }
}

/// Member-facing text for a failed request.
pub fn error_reply(err: &PondError) -> &'static str {
    match err {
        PondError::NotFound(_) => messages::NO_ONE,
        PondError::Conflict(_) => messages::TRY_AGAIN,
        PondError::Validation(reason) => {
            tracing::warn!(%reason, "request rejected");
            messages::SOMETHING_WRONG
        }
        PondError::Storage(inner) => {
            tracing::error!(
                error = %inner,
                retryable = err.is_retryable(),
                "storage failure while handling request"
            );
            messages::SOMETHING_WRONG
        }
    }
}
