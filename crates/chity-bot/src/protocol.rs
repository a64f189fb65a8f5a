//! Typed view of the chat service wire schema.
//!
//! Outbound traffic is the closed [`Request`] enum. Inbound frames are decoded
//! by the codec and then validated into the closed [`Inbound`] enum, so a
//! missing or mistyped field is reported here instead of inside a handler.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::codec::{self, Fields, Packet, CMD_KEY};
use crate::types::{GroupId, MessageId, Status, UserId};
use crate::{Error, Result};

pub const CMD_SESSION: &str = "session";
pub const CMD_ERROR: &str = "error";
pub const CMD_CLIENT_USER_INFO: &str = "client_user_info";
pub const CMD_CLIENT_GROUPS: &str = "client_groups";
pub const CMD_GET_ALL_GROUPS: &str = "get_all_groups";
/// Real-time user status message.
pub const CMD_STATUS_UPDATE: &str = "rtusm";
pub const CMD_GROUP_MSG: &str = "group_msg";
pub const CMD_GET_MEMBER_IDS: &str = "get_member_ids";
pub const CMD_GET_USER: &str = "get_user";
pub const CMD_JOIN_GROUP: &str = "join_group";

/// Every inbound discriminator with a dedicated [`Inbound`] variant.
pub const RECOGNIZED_COMMANDS: [&str; 10] = [
    CMD_SESSION,
    CMD_ERROR,
    CMD_CLIENT_USER_INFO,
    CMD_CLIENT_GROUPS,
    CMD_GET_ALL_GROUPS,
    CMD_STATUS_UPDATE,
    CMD_GROUP_MSG,
    CMD_GET_MEMBER_IDS,
    CMD_GET_USER,
    CMD_JOIN_GROUP,
];

/// Requests understood by the chat service.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Request {
    Register {
        username: String,
        displayname: String,
        password: String,
        session: bool,
    },
    Login {
        username: String,
        password: String,
        session: bool,
    },
    ClientUserInfo,
    ClientGroups,
    GetAllGroups,
    JoinGroup {
        group_id: GroupId,
    },
    GroupCreate {
        name: String,
        public: bool,
    },
    GroupMsg {
        group_id: GroupId,
        content: String,
        attachments: Vec<Value>,
    },
    GetUser {
        user_ids: Vec<UserId>,
    },
    GetMemberIds {
        group_id: GroupId,
    },
    DeleteGroup {
        group_id: GroupId,
    },
    DeleteMsg {
        msg_id: MessageId,
    },
}

impl Request {
    pub fn cmd(&self) -> &'static str {
        match self {
            Request::Register { .. } => "register",
            Request::Login { .. } => "login",
            Request::ClientUserInfo => "client_user_info",
            Request::ClientGroups => "client_groups",
            Request::GetAllGroups => "get_all_groups",
            Request::JoinGroup { .. } => "join_group",
            Request::GroupCreate { .. } => "group_create",
            Request::GroupMsg { .. } => "group_msg",
            Request::GetUser { .. } => "get_user",
            Request::GetMemberIds { .. } => "get_member_ids",
            Request::DeleteGroup { .. } => "delete_group",
            Request::DeleteMsg { .. } => "delete_msg",
        }
    }

    /// Split into discriminator and fields.
    pub fn to_packet(&self) -> Result<Packet> {
        let Value::Object(mut fields) = serde_json::to_value(self)? else {
            return Err(Error::Protocol(format!(
                "request '{}' did not serialize to an object",
                self.cmd()
            )));
        };
        fields.remove(CMD_KEY);
        Ok(Packet::new(self.cmd(), fields))
    }

    /// Encode into one outbound frame.
    pub fn encode(&self) -> Result<String> {
        let packet = self.to_packet()?;
        codec::encode(&packet.cmd, packet.fields)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SessionReply {
    pub id: u64,
}

/// Explicit failure reply. `origin` is the command that caused it.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerError {
    pub message: String,
    pub origin: String,
}

#[derive(Deserialize)]
struct RawServerError {
    error_msg: String,
    #[serde(default)]
    from: Option<Value>,
}

impl From<RawServerError> for ServerError {
    fn from(raw: RawServerError) -> Self {
        let origin = raw
            .from
            .as_ref()
            .and_then(|from| from.get(CMD_KEY))
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        Self {
            message: raw.error_msg,
            origin,
        }
    }
}

impl From<ServerError> for Error {
    fn from(err: ServerError) -> Self {
        Error::ServerError {
            message: err.message,
            origin: err.origin,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserRecord {
    pub user_id: UserId,
    pub username: String,
    pub displayname: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub bio: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pfp_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: Status,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GroupRecord {
    pub group_id: GroupId,
    pub owner_id: UserId,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub desc: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub public: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub members_id: Vec<UserId>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GroupList {
    #[serde(default, deserialize_with = "null_as_default")]
    pub groups: Vec<GroupRecord>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatusUpdate {
    pub user_id: UserId,
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(default)]
    pub pfp_name: Option<String>,
    #[serde(default)]
    pub typing: Option<bool>,
    #[serde(default)]
    pub typing_group_id: Option<GroupId>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MessageRecord {
    pub msg_id: MessageId,
    pub group_id: GroupId,
    pub user_id: UserId,
    pub content: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub attachments: Vec<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MemberIds {
    pub group_id: GroupId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub member_ids: Vec<UserId>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserList {
    #[serde(default, deserialize_with = "null_as_default")]
    pub users: Vec<UserRecord>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JoinNotice {
    pub group_id: GroupId,
    pub user_id: UserId,
}

/// A validated inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Session(SessionReply),
    Error(ServerError),
    ClientUserInfo(UserRecord),
    ClientGroups(GroupList),
    PublicGroups(GroupList),
    StatusUpdate(StatusUpdate),
    GroupMsg(MessageRecord),
    MemberIds(MemberIds),
    Users(UserList),
    JoinGroup(JoinNotice),
    /// Well-formed frame with a discriminator this client has no handler for.
    Unrecognized(Packet),
}

fn parse<T: DeserializeOwned>(cmd: &str, fields: Fields) -> Result<T> {
    serde_json::from_value(Value::Object(fields))
        .map_err(|e| Error::Protocol(format!("invalid '{}' packet: {}", cmd, e)))
}

impl Inbound {
    pub fn decode(frame: &str) -> Result<Self> {
        Self::from_packet(codec::decode(frame)?)
    }

    pub fn from_packet(packet: Packet) -> Result<Self> {
        let Packet { cmd, fields } = packet;
        let inbound = match cmd.as_str() {
            CMD_SESSION => Inbound::Session(parse(&cmd, fields)?),
            CMD_ERROR => Inbound::Error(parse::<RawServerError>(&cmd, fields)?.into()),
            CMD_CLIENT_USER_INFO => Inbound::ClientUserInfo(parse(&cmd, fields)?),
            CMD_CLIENT_GROUPS => Inbound::ClientGroups(parse(&cmd, fields)?),
            CMD_GET_ALL_GROUPS => Inbound::PublicGroups(parse(&cmd, fields)?),
            CMD_STATUS_UPDATE => Inbound::StatusUpdate(parse(&cmd, fields)?),
            CMD_GROUP_MSG => Inbound::GroupMsg(parse(&cmd, fields)?),
            CMD_GET_MEMBER_IDS => Inbound::MemberIds(parse(&cmd, fields)?),
            CMD_GET_USER => Inbound::Users(parse(&cmd, fields)?),
            CMD_JOIN_GROUP => Inbound::JoinGroup(parse(&cmd, fields)?),
            _ => Inbound::Unrecognized(Packet::new(cmd.clone(), fields)),
        };
        Ok(inbound)
    }

    pub fn cmd(&self) -> &str {
        match self {
            Inbound::Session(_) => CMD_SESSION,
            Inbound::Error(_) => CMD_ERROR,
            Inbound::ClientUserInfo(_) => CMD_CLIENT_USER_INFO,
            Inbound::ClientGroups(_) => CMD_CLIENT_GROUPS,
            Inbound::PublicGroups(_) => CMD_GET_ALL_GROUPS,
            Inbound::StatusUpdate(_) => CMD_STATUS_UPDATE,
            Inbound::GroupMsg(_) => CMD_GROUP_MSG,
            Inbound::MemberIds(_) => CMD_GET_MEMBER_IDS,
            Inbound::Users(_) => CMD_GET_USER,
            Inbound::JoinGroup(_) => CMD_JOIN_GROUP,
            Inbound::Unrecognized(packet) => &packet.cmd,
        }
    }
}
