use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::types::{Group, GroupId, Status, User, UserId};
use crate::{Error, Result};

/// Users and groups observed during one run.
///
/// Resolution is best effort: a user that arrives after a group was resolved
/// is not attached automatically. Call [`EntityCache::resolve_members`] or
/// [`EntityCache::resolve_all`] once the missing identities have been fetched.
#[derive(Debug, Default)]
pub struct EntityCache {
    users: HashMap<UserId, User>,
    groups: BTreeMap<GroupId, Group>,
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(&self, id: UserId) -> Option<&User> {
        self.users.get(&id)
    }

    pub fn users(&self) -> &HashMap<UserId, User> {
        &self.users
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(&id)
    }

    pub fn groups(&self) -> &BTreeMap<GroupId, Group> {
        &self.groups
    }

    pub fn group_ids(&self) -> Vec<GroupId> {
        self.groups.keys().copied().collect()
    }

    pub fn has_user(&self, id: UserId) -> bool {
        self.users.contains_key(&id)
    }

    /// Insert a user, or update the cached entry in place. Returns true for a new user.
    pub fn upsert_user(&mut self, user: User) -> bool {
        match self.users.get_mut(&user.id) {
            Some(existing) => {
                *existing = user;
                false
            }
            None => {
                self.users.insert(user.id, user);
                true
            }
        }
    }

    pub fn set_status(&mut self, id: UserId, status: Status) -> Result<()> {
        let user = self
            .users
            .get_mut(&id)
            .ok_or_else(|| Error::Logic(format!("status update for unknown user {}", id)))?;
        user.set_status(status);
        Ok(())
    }

    pub fn set_avatar(&mut self, id: UserId, pfp_name: &str) -> Result<()> {
        let user = self
            .users
            .get_mut(&id)
            .ok_or_else(|| Error::Logic(format!("avatar update for unknown user {}", id)))?;
        user.pfp_name = pfp_name.to_string();
        Ok(())
    }

    /// Store a group, replacing any previous entry with the same id wholesale.
    pub fn insert_group(&mut self, group: Group) -> Option<Group> {
        self.groups.insert(group.id, group)
    }

    /// Record a late member id on a cached group.
    pub fn add_group_member(&mut self, group_id: GroupId, user_id: UserId) -> Result<bool> {
        let group = self
            .groups
            .get_mut(&group_id)
            .ok_or_else(|| Error::Logic(format!("join for unknown group {}", group_id)))?;
        Ok(group.add_member_id(user_id))
    }

    /// Replace a group's member list. The entry is rebuilt, so earlier resolution is discarded.
    pub fn replace_member_ids(&mut self, group_id: GroupId, member_ids: Vec<UserId>) -> Result<()> {
        let group = self
            .groups
            .get(&group_id)
            .ok_or_else(|| Error::Logic(format!("member list for unknown group {}", group_id)))?;
        let replaced = group.with_member_ids(member_ids);
        self.groups.insert(group_id, replaced);
        Ok(())
    }

    /// Resolve one group's members against the user cache. Returns the ids still missing.
    pub fn resolve_members(&mut self, group_id: GroupId) -> Result<Vec<UserId>> {
        let group = self
            .groups
            .get_mut(&group_id)
            .ok_or_else(|| Error::Logic(format!("cannot resolve unknown group {}", group_id)))?;
        group.try_resolve_members(&self.users);
        Ok(group.unresolved_members())
    }

    /// Resolve every group. Returns the union of ids still missing.
    pub fn resolve_all(&mut self) -> Vec<UserId> {
        let mut missing = BTreeSet::new();
        for group in self.groups.values_mut() {
            group.try_resolve_members(&self.users);
            missing.extend(group.unresolved_members());
        }
        missing.into_iter().collect()
    }

    /// The subset of `ids` with no cached user, deduplicated and sorted.
    pub fn missing_users(&self, ids: impl IntoIterator<Item = UserId>) -> Vec<UserId> {
        ids.into_iter()
            .filter(|id| !self.users.contains_key(id))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
