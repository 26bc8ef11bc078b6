//! Mention rewriting and display-name resolution
//!
//! Three rewrite passes run in a fixed order over the raw body: user
//! mentions, channel mentions, role mentions. A token that cannot be
//! resolved is left exactly as it was.

use crate::aggregator::StateAggregator;
use crate::model::RawMessage;
use regex::{Captures, Regex};
use std::sync::LazyLock;
use twilight_model::id::marker::{ChannelMarker, UserMarker};
use twilight_model::id::Id;

static USER_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@!?([0-9]+)>").expect("valid regex"));
static CHANNEL_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<#([0-9]+)>").expect("valid regex"));
static ROLE_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@&([0-9]+)>").expect("valid regex"));

/// Human-readable body of a message
pub fn normalize_content(state: &StateAggregator, message: &RawMessage) -> String {
    let content = replace_user_mentions(message, &message.content);
    let content = replace_channel_mentions(state, &content);
    replace_role_mentions(state, message.channel_id, &content)
}

/// `<@id>` / `<@!id>` → `@username`, from the message's own mention list
fn replace_user_mentions(message: &RawMessage, content: &str) -> String {
    USER_MENTION
        .replace_all(content, |caps: &Captures| {
            snowflake::<UserMarker>(&caps[1])
                .and_then(|id| message.mentions.iter().find(|user| user.id == id))
                .map_or_else(|| caps[0].to_string(), |user| format!("@{}", user.name))
        })
        .into_owned()
}

/// `<#id>` → `#name`
pub fn replace_channel_mentions(state: &StateAggregator, content: &str) -> String {
    CHANNEL_MENTION
        .replace_all(content, |caps: &Captures| {
            snowflake(&caps[1])
                .and_then(|id| state.channel(id).ok())
                .map_or_else(|| caps[0].to_string(), |channel| format!("#{}", channel.name()))
        })
        .into_owned()
}

/// `<@&id>` → `@name`, looked up in the guild of the message's channel
pub fn replace_role_mentions(
    state: &StateAggregator,
    channel_id: Id<ChannelMarker>,
    content: &str,
) -> String {
    if !ROLE_MENTION.is_match(content) {
        return content.to_string();
    }
    let guild = state.channel_guild(channel_id).ok();

    ROLE_MENTION
        .replace_all(content, |caps: &Captures| {
            let role = snowflake(&caps[1])
                .zip(guild.as_ref())
                .and_then(|(id, guild)| guild.role(id));
            match role {
                Some(role) => format!("@{}", role.name),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Per-guild nickname of a user when set, otherwise `username`.
pub fn display_name(
    state: &StateAggregator,
    user_id: Id<UserMarker>,
    username: &str,
    channel_id: Id<ChannelMarker>,
) -> String {
    state
        .channel_guild(channel_id)
        .and_then(|guild| state.member(guild.id, user_id))
        .ok()
        .and_then(|member| member.nickname().map(str::to_string))
        .unwrap_or_else(|| username.to_string())
}

fn snowflake<M>(digits: &str) -> Option<Id<M>> {
    digits.parse().ok().and_then(Id::new_checked)
}
