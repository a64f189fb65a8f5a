use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::debug;

use crate::cache::EntityCache;
use crate::protocol::Request;
use crate::scheduler::{Action, ACTION_COUNT};
use crate::types::{GroupId, MessageId, Session, UserId};
use crate::{Error, Result};

/// Client state shared by the listen loop and the behavior scheduler.
///
/// Holders never keep the lock across a suspension point other than the
/// lock acquisition itself.
pub type SharedState = Arc<Mutex<ClientState>>;

#[derive(Debug, Default)]
pub struct ClientState {
    pub session: Session,
    pub cache: EntityCache,
    /// Our own user id, known once the profile reply arrived.
    pub me: Option<UserId>,
    /// Target of the send-message action.
    pub current_group: Option<GroupId>,
    pub bootstrap: Bootstrap,
    pub stats: Stats,
}

impl ClientState {
    pub fn shared() -> SharedState {
        Arc::new(Mutex::new(Self::default()))
    }

    pub fn displayname(&self) -> Option<&str> {
        self.me
            .and_then(|id| self.cache.user(id))
            .map(|user| user.displayname.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapStep {
    Profile,
    Groups,
}

/// Tracks the two replies that complete bootstrapping and fires a one-shot
/// notification the moment both have been recorded.
#[derive(Debug, Default)]
pub struct Bootstrap {
    got_profile: bool,
    got_groups: bool,
    done_tx: Option<oneshot::Sender<()>>,
}

impl Bootstrap {
    /// Clear both flags and return the receiver for the completion notification.
    pub fn arm(&mut self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        self.got_profile = false;
        self.got_groups = false;
        self.done_tx = Some(tx);
        rx
    }

    pub fn mark(&mut self, step: BootstrapStep) {
        match step {
            BootstrapStep::Profile => self.got_profile = true,
            BootstrapStep::Groups => self.got_groups = true,
        }
        if self.is_complete() {
            if let Some(tx) = self.done_tx.take() {
                debug!("bootstrap replies received");
                let _ = tx.send(());
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        self.got_profile && self.got_groups
    }
}

/// Counters accumulated over every run of one bot, reconnects included.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Stats {
    pub frames_received: u64,
    pub messages_received: u64,
    pub unrecognized: u64,
    pub dropped_frames: u64,
    /// Performed actions, indexed like [`Action::ALL`]. Left out of the
    /// serialized form; see [`Stats::actions_by_name`].
    #[serde(skip)]
    pub actions: [u64; ACTION_COUNT],
}

impl Stats {
    pub fn record(&mut self, action: Action) {
        self.actions[action.index()] += 1;
    }

    pub fn actions_by_name(&self) -> BTreeMap<&'static str, u64> {
        Action::ALL
            .iter()
            .map(|action| (action.name(), self.actions[action.index()]))
            .collect()
    }
}

/// Non-blocking queue of outbound requests, drained onto the connection by the writer loop.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<Request>,
}

impl Outbox {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Request>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(&self, request: Request) -> Result<()> {
        self.tx
            .send(request)
            .map_err(|_| Error::Transport("outbound queue closed".to_string()))
    }

    pub fn client_user_info(&self) -> Result<()> {
        self.send(Request::ClientUserInfo)
    }

    pub fn client_groups(&self) -> Result<()> {
        self.send(Request::ClientGroups)
    }

    pub fn get_all_groups(&self) -> Result<()> {
        self.send(Request::GetAllGroups)
    }

    pub fn join_group(&self, group_id: GroupId) -> Result<()> {
        self.send(Request::JoinGroup { group_id })
    }

    pub fn create_group(&self, name: impl Into<String>, public: bool) -> Result<()> {
        self.send(Request::GroupCreate {
            name: name.into(),
            public,
        })
    }

    pub fn send_msg(
        &self,
        group_id: GroupId,
        content: impl Into<String>,
        attachments: Vec<Value>,
    ) -> Result<()> {
        self.send(Request::GroupMsg {
            group_id,
            content: content.into(),
            attachments,
        })
    }

    /// Look up users by id. An empty list sends nothing.
    pub fn get_users(&self, user_ids: Vec<UserId>) -> Result<()> {
        if user_ids.is_empty() {
            return Ok(());
        }
        self.send(Request::GetUser { user_ids })
    }

    pub fn get_member_ids(&self, group_id: GroupId) -> Result<()> {
        self.send(Request::GetMemberIds { group_id })
    }

    pub fn delete_group(&self, group_id: GroupId) -> Result<()> {
        self.send(Request::DeleteGroup { group_id })
    }

    pub fn delete_msg(&self, msg_id: MessageId) -> Result<()> {
        self.send(Request::DeleteMsg { msg_id })
    }
}
