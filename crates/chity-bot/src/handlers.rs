//! Built-in handlers for inbound commands.
//!
//! Local invariant violations (an id we have not cached yet) are absorbed
//! here: they are logged and the missing identity is requested, since the
//! service is eventually consistent with respect to what this client knows.

use rand::seq::SliceRandom;
use tracing::{debug, info, trace, warn};

use crate::protocol::{
    GroupList, JoinNotice, MemberIds, ServerError, SessionReply, StatusUpdate, UserList,
    UserRecord,
};
use crate::state::{BootstrapStep, ClientState, Outbox};
use crate::types::{Group, Message, User};
use crate::Result;

pub fn session(state: &mut ClientState, reply: SessionReply, _outbox: &Outbox) -> Result<()> {
    info!(session_id = reply.id, "session established");
    state.session.establish(reply.id);
    Ok(())
}

pub fn error(_state: &mut ClientState, err: ServerError, _outbox: &Outbox) -> Result<()> {
    warn!(origin = %err.origin, message = %err.message, "service rejected a request");
    Ok(())
}

pub fn client_user_info(state: &mut ClientState, record: UserRecord, _outbox: &Outbox) -> Result<()> {
    let user = User::from(record);
    debug!(user_id = user.id, username = %user.username, "own profile received");
    state.me = Some(user.id);
    state.cache.upsert_user(user);
    state.cache.resolve_all();
    state.bootstrap.mark(BootstrapStep::Profile);
    Ok(())
}

/// Membership list, also sent as the acknowledgment of a create or join.
pub fn client_groups(state: &mut ClientState, list: GroupList, outbox: &Outbox) -> Result<()> {
    let mut missing = Vec::new();
    for record in list.groups {
        let group = Group::from(record);
        let group_id = group.id;
        debug!(group_id, name = %group.name, "group announced");

        state.cache.insert_group(group);
        missing.extend(state.cache.resolve_members(group_id)?);
        // The announcement rarely carries members; the authoritative list comes separately.
        outbox.get_member_ids(group_id)?;
        if state.current_group.is_none() {
            state.current_group = Some(group_id);
        }
    }
    outbox.get_users(state.cache.missing_users(missing))?;
    state.bootstrap.mark(BootstrapStep::Groups);
    Ok(())
}

/// Public group directory. A bot that belongs nowhere joins one of them.
pub fn public_groups(state: &mut ClientState, list: GroupList, outbox: &Outbox) -> Result<()> {
    let owners = state.cache.missing_users(list.groups.iter().map(|g| g.owner_id));
    outbox.get_users(owners)?;

    if !state.cache.groups().is_empty() {
        return Ok(());
    }
    if let Some(group) = list.groups.choose(&mut rand::thread_rng()) {
        info!(group_id = group.group_id, name = %group.name, "joining public group");
        outbox.join_group(group.group_id)?;
    }
    Ok(())
}

pub fn status_update(state: &mut ClientState, update: StatusUpdate, outbox: &Outbox) -> Result<()> {
    if !state.cache.has_user(update.user_id) {
        debug!(user_id = update.user_id, "status update for uncached user");
        return outbox.get_users(vec![update.user_id]);
    }
    if let Some(status) = update.status {
        state.cache.set_status(update.user_id, status)?;
    }
    if let Some(pfp_name) = update.pfp_name.as_deref() {
        state.cache.set_avatar(update.user_id, pfp_name)?;
    }
    if let Some(typing) = update.typing {
        trace!(user_id = update.user_id, typing, group_id = ?update.typing_group_id, "typing");
    }
    Ok(())
}

pub fn group_msg(state: &mut ClientState, message: Message, outbox: &Outbox) -> Result<()> {
    state.stats.messages_received += 1;
    if state.me == Some(message.sender_id) {
        return Ok(());
    }
    if state.cache.group(message.group_id).is_none() {
        debug!(group_id = message.group_id, "message for unknown group");
    }
    if !state.cache.has_user(message.sender_id) {
        outbox.get_users(vec![message.sender_id])?;
    }
    trace!(
        group_id = message.group_id,
        sender = message.sender_id,
        content = %message.content,
        "message"
    );
    Ok(())
}

pub fn member_ids(state: &mut ClientState, ids: MemberIds, outbox: &Outbox) -> Result<()> {
    if let Err(err) = state.cache.replace_member_ids(ids.group_id, ids.member_ids) {
        debug!(error = %err, "ignoring member list");
        return Ok(());
    }
    let missing = state.cache.resolve_members(ids.group_id)?;
    outbox.get_users(missing)
}

/// Identity lookup reply. Resolution is re-run for every group afterwards.
pub fn users(state: &mut ClientState, list: UserList, _outbox: &Outbox) -> Result<()> {
    for record in list.users {
        state.cache.upsert_user(User::from(record));
    }
    state.cache.resolve_all();
    Ok(())
}

pub fn join_group(state: &mut ClientState, notice: JoinNotice, outbox: &Outbox) -> Result<()> {
    if let Err(err) = state.cache.add_group_member(notice.group_id, notice.user_id) {
        debug!(error = %err, "ignoring join notice");
        return Ok(());
    }
    state.cache.resolve_members(notice.group_id)?;
    outbox.get_users(state.cache.missing_users([notice.user_id]))
}
