use tracing::warn;

use crate::handlers;
use crate::protocol::{
    GroupList, Inbound, JoinNotice, MemberIds, ServerError, SessionReply, StatusUpdate, UserList,
    UserRecord,
};
use crate::state::{ClientState, Outbox};
use crate::types::Message;
use crate::Result;

/// Handler for one inbound command. Mutates client state and may queue further requests.
pub type Handler<T> = fn(&mut ClientState, T, &Outbox) -> Result<()>;

/// One handler per recognized inbound command.
///
/// Every field must be filled, so adding an [`Inbound`] variant without a
/// handler does not compile. Override individual entries with struct update
/// syntax: `Handlers { group_msg: my_handler, ..Handlers::default() }`.
#[derive(Clone, Copy)]
pub struct Handlers {
    pub session: Handler<SessionReply>,
    pub error: Handler<ServerError>,
    pub client_user_info: Handler<UserRecord>,
    pub client_groups: Handler<GroupList>,
    pub public_groups: Handler<GroupList>,
    pub status_update: Handler<StatusUpdate>,
    pub group_msg: Handler<Message>,
    pub member_ids: Handler<MemberIds>,
    pub users: Handler<UserList>,
    pub join_group: Handler<JoinNotice>,
}

impl Default for Handlers {
    fn default() -> Self {
        Self {
            session: handlers::session,
            error: handlers::error,
            client_user_info: handlers::client_user_info,
            client_groups: handlers::client_groups,
            public_groups: handlers::public_groups,
            status_update: handlers::status_update,
            group_msg: handlers::group_msg,
            member_ids: handlers::member_ids,
            users: handlers::users,
            join_group: handlers::join_group,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    Handled,
    /// No handler for the discriminator; logged and dropped.
    Dropped,
}

/// Immutable command table, built once before the first connection.
#[derive(Clone, Copy, Default)]
pub struct Dispatcher {
    handlers: Handlers,
}

impl Dispatcher {
    pub fn new(handlers: Handlers) -> Self {
        Self { handlers }
    }

    pub fn dispatch(
        &self,
        state: &mut ClientState,
        inbound: Inbound,
        outbox: &Outbox,
    ) -> Result<Dispatched> {
        let h = &self.handlers;
        match inbound {
            Inbound::Session(reply) => (h.session)(state, reply, outbox)?,
            Inbound::Error(err) => (h.error)(state, err, outbox)?,
            Inbound::ClientUserInfo(user) => (h.client_user_info)(state, user, outbox)?,
            Inbound::ClientGroups(list) => (h.client_groups)(state, list, outbox)?,
            Inbound::PublicGroups(list) => (h.public_groups)(state, list, outbox)?,
            Inbound::StatusUpdate(update) => (h.status_update)(state, update, outbox)?,
            Inbound::GroupMsg(record) => (h.group_msg)(state, record.into(), outbox)?,
            Inbound::MemberIds(ids) => (h.member_ids)(state, ids, outbox)?,
            Inbound::Users(list) => (h.users)(state, list, outbox)?,
            Inbound::JoinGroup(notice) => (h.join_group)(state, notice, outbox)?,
            Inbound::Unrecognized(packet) => {
                warn!(cmd = %packet.cmd, "no handler for packet");
                state.stats.unrecognized += 1;
                return Ok(Dispatched::Dropped);
            }
        }
        Ok(Dispatched::Handled)
    }
}
