//! Minimal chat service speaking the bot protocol over channel connections.

use chity_bot::codec::Packet;
use chity_bot::transport::channel::{ChannelAcceptor, ServerEnd};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct Account {
    pub id: u32,
    pub username: String,
    pub displayname: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct FakeGroup {
    pub id: u32,
    pub owner_id: u32,
    pub name: String,
    pub public: bool,
    pub members: Vec<u32>,
}

#[derive(Debug)]
pub struct World {
    pub accounts: BTreeMap<u32, Account>,
    pub groups: BTreeMap<u32, FakeGroup>,
    /// Every command received, in arrival order.
    pub received: Vec<String>,
    pub connections: usize,
    pub closed: usize,
    pub allow_register: bool,
    next_msg_id: u32,
}

impl Default for World {
    fn default() -> Self {
        Self {
            accounts: BTreeMap::new(),
            groups: BTreeMap::new(),
            received: Vec::new(),
            connections: 0,
            closed: 0,
            allow_register: true,
            next_msg_id: 1,
        }
    }
}

fn str_field<'a>(packet: &'a Packet, key: &str) -> &'a str {
    packet.fields.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn id_field(packet: &Packet, key: &str) -> u32 {
    packet
        .fields
        .get(key)
        .and_then(Value::as_u64)
        .unwrap_or_default() as u32
}

fn error(cmd: &str, message: &str) -> Value {
    json!({ "cmd": "error", "error_msg": message, "from": { "cmd": cmd } })
}

fn user_json(account: &Account) -> Value {
    json!({
        "user_id": account.id,
        "username": account.username,
        "displayname": account.displayname,
        "bio": null,
        "created_at": "2024-01-01 00:00:00",
        "pfp_name": null,
        "status": "online",
    })
}

fn group_json(group: &FakeGroup) -> Value {
    json!({
        "group_id": group.id,
        "owner_id": group.owner_id,
        "name": group.name,
        "desc": "",
        "public": group.public,
    })
}

impl World {
    pub fn add_account(&mut self, id: u32, username: &str, password: &str) -> &mut Self {
        self.accounts.insert(
            id,
            Account {
                id,
                username: username.to_string(),
                displayname: username.to_uppercase(),
                password: password.to_string(),
            },
        );
        self
    }

    pub fn add_group(&mut self, id: u32, owner_id: u32, public: bool, members: &[u32]) -> &mut Self {
        self.groups.insert(
            id,
            FakeGroup {
                id,
                owner_id,
                name: format!("group {}", id),
                public,
                members: members.to_vec(),
            },
        );
        self
    }

    fn account_by_name(&self, username: &str) -> Option<&Account> {
        self.accounts.values().find(|a| a.username == username)
    }

    fn client_groups(&self, groups: Vec<&FakeGroup>) -> Value {
        let groups: Vec<Value> = groups.into_iter().map(group_json).collect();
        json!({ "cmd": "client_groups", "groups": groups })
    }

    fn handle(&mut self, me: &mut Option<u32>, packet: &Packet) -> Vec<Value> {
        let cmd = packet.cmd.as_str();
        self.received.push(cmd.to_string());

        match (cmd, *me) {
            ("login", None) => {
                let password = str_field(packet, "password");
                match self.account_by_name(str_field(packet, "username")) {
                    Some(account) if account.password == password => {
                        *me = Some(account.id);
                        vec![json!({ "cmd": "session", "id": 0 })]
                    }
                    _ => vec![error(cmd, "Incorrect username or password")],
                }
            }
            ("register", None) => {
                let username = str_field(packet, "username");
                if !self.allow_register || self.account_by_name(username).is_some() {
                    return vec![error(cmd, "Username taken")];
                }
                let id = self.accounts.keys().next_back().copied().unwrap_or(0) + 1;
                self.accounts.insert(
                    id,
                    Account {
                        id,
                        username: username.to_string(),
                        displayname: str_field(packet, "displayname").to_string(),
                        password: str_field(packet, "password").to_string(),
                    },
                );
                *me = Some(id);
                vec![json!({ "cmd": "session", "id": 0 })]
            }
            (_, None) => vec![error(cmd, "Not logged in")],
            ("client_user_info", Some(id)) => {
                let mut user = user_json(&self.accounts[&id]);
                user["cmd"] = json!("client_user_info");
                vec![user]
            }
            ("client_groups", Some(id)) => {
                let mine = self.groups.values().filter(|g| g.members.contains(&id)).collect();
                vec![self.client_groups(mine)]
            }
            ("get_all_groups", Some(_)) => {
                let groups: Vec<Value> = self
                    .groups
                    .values()
                    .filter(|g| g.public)
                    .map(group_json)
                    .collect();
                vec![json!({ "cmd": "get_all_groups", "groups": groups })]
            }
            ("get_member_ids", Some(_)) => match self.groups.get(&id_field(packet, "group_id")) {
                Some(group) => vec![json!({
                    "cmd": "get_member_ids",
                    "group_id": group.id,
                    "member_ids": group.members,
                })],
                None => vec![error(cmd, "Group not found")],
            },
            ("get_user", Some(_)) => {
                let users: Vec<Value> = packet
                    .fields
                    .get("user_ids")
                    .and_then(Value::as_array)
                    .into_iter()
                    .flatten()
                    .filter_map(Value::as_u64)
                    .filter_map(|id| self.accounts.get(&(id as u32)))
                    .map(user_json)
                    .collect();
                vec![json!({ "cmd": "get_user", "users": users })]
            }
            ("join_group", Some(id)) => {
                let group_id = id_field(packet, "group_id");
                match self.groups.get_mut(&group_id) {
                    Some(group) if group.public => {
                        if !group.members.contains(&id) {
                            group.members.push(id);
                        }
                        let group = group.clone();
                        vec![self.client_groups(vec![&group])]
                    }
                    _ => vec![error(cmd, "Cannot join group")],
                }
            }
            ("group_create", Some(id)) => {
                let group_id = self.groups.keys().next_back().copied().unwrap_or(99) + 1;
                let group = FakeGroup {
                    id: group_id,
                    owner_id: id,
                    name: str_field(packet, "name").to_string(),
                    public: packet.fields.get("public").and_then(Value::as_bool).unwrap_or(false),
                    members: vec![id],
                };
                self.groups.insert(group_id, group.clone());
                vec![self.client_groups(vec![&group])]
            }
            ("group_msg", Some(id)) => {
                let group_id = id_field(packet, "group_id");
                let member = self
                    .groups
                    .get(&group_id)
                    .is_some_and(|g| g.members.contains(&id));
                if !member {
                    return vec![error(cmd, "Not a group member")];
                }
                let msg_id = self.next_msg_id;
                self.next_msg_id += 1;
                vec![json!({
                    "cmd": "group_msg",
                    "msg_id": msg_id,
                    "group_id": group_id,
                    "user_id": id,
                    "content": str_field(packet, "content"),
                    "attachments": [],
                    "timestamp": "2024-01-01 00:00:00",
                })]
            }
            _ => vec![error(cmd, "Unknown command")],
        }
    }
}

/// Shared handle to a running fake service.
#[derive(Clone, Default)]
pub struct FakeChat {
    world: Arc<Mutex<World>>,
}

impl FakeChat {
    pub fn new(world: World) -> Self {
        Self {
            world: Arc::new(Mutex::new(world)),
        }
    }

    pub fn world(&self) -> MutexGuard<'_, World> {
        self.world.lock().unwrap()
    }

    /// Serve every connection the acceptor yields.
    pub fn spawn(&self, mut acceptor: ChannelAcceptor) -> JoinHandle<()> {
        let world = self.world.clone();
        tokio::spawn(async move {
            while let Some(end) = acceptor.accept().await {
                world.lock().unwrap().connections += 1;
                tokio::spawn(serve(end, world.clone()));
            }
        })
    }
}

async fn serve(mut end: ServerEnd, world: Arc<Mutex<World>>) {
    let mut me = None;
    while let Some(packet) = end.recv_packet().await {
        let replies = world.lock().unwrap().handle(&mut me, &packet);
        for reply in replies {
            if !end.send_json(reply) {
                return;
            }
        }
    }
    world.lock().unwrap().closed += 1;
}
