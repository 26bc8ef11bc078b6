//! Channel permission and display color computation

use crate::model::{CachedGuild, ChannelRecord, MemberRecord, OVERWRITE_MEMBER, OVERWRITE_ROLE};
use twilight_model::guild::Permissions;
use twilight_model::id::marker::{GenericMarker, RoleMarker};
use twilight_model::id::Id;

/// Effective permissions of `member` in `channel`.
///
/// Guild owner and administrators get everything. Otherwise the `@everyone`
/// role and the member's roles are combined, then channel overwrites apply
/// in order: `@everyone`, member roles (merged), member.
pub fn channel_permissions(
    guild: &CachedGuild,
    channel: &ChannelRecord,
    member: &MemberRecord,
) -> Permissions {
    if guild.owner_id == Some(member.user.id) {
        return Permissions::all();
    }

    let everyone_id: Id<RoleMarker> = guild.id.cast();
    let everyone_target: Id<GenericMarker> = guild.id.cast();
    let mut permissions = guild
        .role(everyone_id)
        .map_or(Permissions::empty(), |role| role.permissions);
    for role_id in &member.roles {
        if let Some(role) = guild.role(*role_id) {
            permissions |= role.permissions;
        }
    }

    if permissions.contains(Permissions::ADMINISTRATOR) {
        return Permissions::all();
    }

    let overwrites = &channel.permission_overwrites;

    if let Some(everyone) = overwrites
        .iter()
        .find(|o| o.kind == OVERWRITE_ROLE && o.id == everyone_target)
    {
        permissions.remove(everyone.deny);
        permissions.insert(everyone.allow);
    }

    let mut allow = Permissions::empty();
    let mut deny = Permissions::empty();
    for overwrite in overwrites.iter().filter(|o| o.kind == OVERWRITE_ROLE) {
        if member
            .roles
            .iter()
            .any(|role_id| role_id.cast::<GenericMarker>() == overwrite.id)
        {
            allow |= overwrite.allow;
            deny |= overwrite.deny;
        }
    }
    permissions.remove(deny);
    permissions.insert(allow);

    if let Some(own) = overwrites
        .iter()
        .find(|o| o.kind == OVERWRITE_MEMBER && o.id == member.user.id.cast::<GenericMarker>())
    {
        permissions.remove(own.deny);
        permissions.insert(own.allow);
    }

    permissions
}

/// Color of the highest-positioned member role with a non-zero color, or 0.
pub fn member_color(guild: &CachedGuild, member: &MemberRecord) -> u32 {
    let mut roles: Vec<_> = member
        .roles
        .iter()
        .filter_map(|role_id| guild.role(*role_id))
        .collect();
    roles.sort_by(|a, b| b.position.cmp(&a.position));

    roles
        .into_iter()
        .map(|role| role.color)
        .find(|color| *color != 0)
        .unwrap_or(0)
}
