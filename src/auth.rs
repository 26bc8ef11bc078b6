//! Authorization predicates for the command layer
//!
//! All predicates are derived from cached state. A lookup miss always
//! answers `false`.

use crate::aggregator::StateAggregator;
use crate::events::ChatMessage;
use std::sync::Arc;
use twilight_model::guild::Permissions;
use twilight_model::id::marker::UserMarker;
use twilight_model::id::Id;

/// Permission bits that make a member a moderator
const MODERATOR_PERMISSIONS: Permissions = Permissions::ADMINISTRATOR
    .union(Permissions::MANAGE_CHANNELS)
    .union(Permissions::MANAGE_GUILD);

#[derive(Debug, Clone)]
pub struct Authorizer {
    state: Arc<StateAggregator>,
    owner: Option<Id<UserMarker>>,
}

impl Authorizer {
    pub fn new(state: Arc<StateAggregator>, owner: Option<Id<UserMarker>>) -> Self {
        Self { state, owner }
    }

    /// Author is the configured bot owner
    pub fn is_bot_owner(&self, message: &dyn ChatMessage) -> bool {
        self.owner.is_some() && message.user_id() == self.owner
    }

    /// Message was posted in a direct conversation
    pub fn is_private(&self, message: &dyn ChatMessage) -> bool {
        self.state
            .channel(message.channel())
            .is_ok_and(|channel| channel.is_private())
    }

    /// Author owns the channel's guild, or is the bot owner.
    ///
    /// Requires the channel and its guild to be cached.
    pub fn is_channel_owner(&self, message: &dyn ChatMessage) -> bool {
        let Ok(guild) = self.state.channel_guild(message.channel()) else {
            return false;
        };
        let is_guild_owner = guild.owner_id.is_some() && guild.owner_id == message.user_id();
        is_guild_owner || self.is_bot_owner(message)
    }

    /// Author holds administrative or management bits in the channel, or
    /// passes `is_channel_owner`
    pub fn is_moderator(&self, message: &dyn ChatMessage) -> bool {
        let manages = message.user_id().is_some_and(|user_id| {
            self.state
                .user_channel_permissions(user_id, message.channel())
                .is_ok_and(|permissions| permissions.intersects(MODERATOR_PERMISSIONS))
        });
        manages || self.is_channel_owner(message)
    }

    /// Message was authored by this client
    pub fn is_me(&self, message: &dyn ChatMessage) -> bool {
        self.state
            .current_user()
            .is_some_and(|me| message.user_id() == Some(me.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{MessageEnvelope, MessageKind};
    use crate::fixtures::{self, dispatch};
    use serde_json::json;

    fn setup(owner: Option<u64>) -> (Arc<StateAggregator>, Authorizer) {
        let state = fixtures::state(1);
        state.apply(0, fixtures::test_guild());
        let auth = Authorizer::new(Arc::clone(&state), owner.map(Id::new));
        (state, auth)
    }

    fn from(state: &Arc<StateAggregator>, author: u64) -> MessageEnvelope {
        MessageEnvelope::new(
            0,
            MessageKind::Create,
            fixtures::guild_message(author, "someone", "hi"),
            Arc::clone(state),
        )
    }

    #[test]
    fn bot_owner_matches_configured_user() {
        let (state, auth) = setup(Some(fixtures::BOB));
        assert!(auth.is_bot_owner(&from(&state, fixtures::BOB)));
        assert!(!auth.is_bot_owner(&from(&state, fixtures::ALICE)));

        let (state, auth) = setup(None);
        assert!(!auth.is_bot_owner(&from(&state, fixtures::BOB)));
    }

    #[test]
    fn channel_owner_is_guild_owner_or_bot_owner() {
        let (state, auth) = setup(Some(fixtures::BOB));
        assert!(auth.is_channel_owner(&from(&state, fixtures::OWNER)));
        assert!(auth.is_channel_owner(&from(&state, fixtures::BOB)));
        assert!(!auth.is_channel_owner(&from(&state, fixtures::CAROL)));
    }

    #[test]
    fn moderator_bits() {
        let (state, auth) = setup(None);
        // Administrator
        assert!(auth.is_moderator(&from(&state, fixtures::ALICE)));
        // Manage channels
        assert!(auth.is_moderator(&from(&state, fixtures::CAROL)));
        // Guild owner
        assert!(auth.is_moderator(&from(&state, fixtures::OWNER)));
        // @everyone only
        assert!(!auth.is_moderator(&from(&state, fixtures::BOB)));
    }

    #[test]
    fn private_channel_detection() {
        let (state, auth) = setup(None);
        assert!(!auth.is_private(&from(&state, fixtures::BOB)));

        let dm = fixtures::raw_message(json!({
            "id": "1",
            "channel_id": "600",
            "author": { "id": "3", "username": "bob" },
            "content": "hi"
        }));
        state.observe_message(0, &dm);
        let envelope = MessageEnvelope::new(0, MessageKind::Create, dm, Arc::clone(&state));
        assert!(auth.is_private(&envelope));
        // No guild behind a DM
        assert!(!auth.is_channel_owner(&envelope));
    }

    #[test]
    fn is_me_follows_ready_identity() {
        let (state, auth) = setup(None);
        let message = from(&state, 9);
        assert!(!auth.is_me(&message));

        state.apply(
            0,
            dispatch("READY", json!({ "user": { "id": "9", "username": "bridge", "bot": true } })),
        );
        assert!(auth.is_me(&message));
    }
}
