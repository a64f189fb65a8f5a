use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

use crate::protocol::{GroupRecord, MessageRecord, UserRecord};

pub type UserId = u32;
pub type GroupId = u32;
pub type MessageId = u32;

/// Presence as reported by the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Offline,
    Online,
    Away,
    Dnd,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub displayname: String,
    pub bio: String,
    pub created_at: String,
    pub pfp_name: String,
    pub status: Status,
}

impl User {
    pub fn set_status(&mut self, status: Status) {
        self.status = status;
    }
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.user_id,
            username: record.username,
            displayname: record.displayname,
            bio: record.bio,
            created_at: record.created_at,
            pfp_name: record.pfp_name,
            status: record.status,
        }
    }
}

/// A group as last announced by the service.
///
/// `member_ids` is the authoritative list; `resolved_members` holds the subset
/// already present in the user cache and only grows for the lifetime of this
/// value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Group {
    pub id: GroupId,
    pub owner_id: UserId,
    pub name: String,
    pub desc: String,
    pub public: bool,
    member_ids: Vec<UserId>,
    resolved_members: BTreeSet<UserId>,
}

impl Group {
    pub fn new(
        id: GroupId,
        owner_id: UserId,
        name: impl Into<String>,
        public: bool,
        member_ids: Vec<UserId>,
    ) -> Self {
        Self {
            id,
            owner_id,
            name: name.into(),
            desc: String::new(),
            public,
            member_ids,
            resolved_members: BTreeSet::new(),
        }
    }

    pub fn member_ids(&self) -> &[UserId] {
        &self.member_ids
    }

    pub fn resolved_members(&self) -> &BTreeSet<UserId> {
        &self.resolved_members
    }

    pub fn is_member(&self, user_id: UserId) -> bool {
        self.member_ids.contains(&user_id)
    }

    /// Record a member id announced after the group itself. Returns false if already listed.
    pub fn add_member_id(&mut self, user_id: UserId) -> bool {
        if self.is_member(user_id) {
            return false;
        }
        self.member_ids.push(user_id);
        true
    }

    /// A fresh entry with the same metadata and a new authoritative member list.
    pub fn with_member_ids(&self, member_ids: Vec<UserId>) -> Self {
        Self {
            id: self.id,
            owner_id: self.owner_id,
            name: self.name.clone(),
            desc: self.desc.clone(),
            public: self.public,
            member_ids,
            resolved_members: BTreeSet::new(),
        }
    }

    /// Resolve every member id already present in `users`. Missing ids are left for a later call.
    pub fn try_resolve_members(&mut self, users: &HashMap<UserId, User>) {
        for member_id in &self.member_ids {
            if users.contains_key(member_id) {
                self.resolved_members.insert(*member_id);
            }
        }
    }

    /// Member ids not yet resolved.
    pub fn unresolved_members(&self) -> Vec<UserId> {
        self.member_ids
            .iter()
            .copied()
            .filter(|id| !self.resolved_members.contains(id))
            .collect()
    }
}

impl From<GroupRecord> for Group {
    fn from(record: GroupRecord) -> Self {
        let mut group = Group::new(
            record.group_id,
            record.owner_id,
            record.name,
            record.public,
            record.members_id,
        );
        group.desc = record.desc;
        group
    }
}

/// A chat message. Consumed by the handler that receives it and never cached.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub group_id: GroupId,
    pub sender_id: UserId,
    pub content: String,
    pub attachments: Vec<Value>,
    pub timestamp: String,
}

impl From<MessageRecord> for Message {
    fn from(record: MessageRecord) -> Self {
        Self {
            id: record.msg_id,
            group_id: record.group_id,
            sender_id: record.user_id,
            content: record.content,
            attachments: record.attachments,
            timestamp: record.timestamp,
        }
    }
}

/// Authentication state of one connected run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Session {
    pub authenticated: bool,
    pub id: Option<u64>,
}

impl Session {
    pub fn establish(&mut self, id: u64) {
        self.authenticated = true;
        self.id = Some(id);
    }
}
