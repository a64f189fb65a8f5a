//! Protocol engine for synthetic ChityChat users.
//!
//! A [`Bot`] connects through a [`Connector`], logs in (registering on
//! rejection), fetches its own profile and group memberships, and then
//! runs a listen loop and a weighted-random behavior loop side by side
//! until stopped. [`Supervisor`] adds reconnection on transport loss.

pub mod bot;
pub mod cache;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod listen;
pub mod protocol;
pub mod scheduler;
pub mod session;
pub mod state;
pub mod supervisor;
pub mod transport;
pub mod types;

pub use bot::{Bot, ConnectedCallback, StopHandle};
pub use cache::EntityCache;
pub use codec::{Fields, Packet};
pub use config::{BehaviorConfig, BotConfig, ReconnectPolicy};
pub use dispatch::{Dispatched, Dispatcher, Handler, Handlers};
pub use error::{Error, Result};
pub use protocol::{Inbound, Request, ServerError};
pub use scheduler::{Action, ActionPicker, Scheduler, ACTION_COUNT};
pub use session::{AuthOutcome, Phase};
pub use state::{ClientState, Outbox, SharedState, Stats};
pub use supervisor::Supervisor;
pub use transport::{Connection, Connector, FrameSink, FrameStream};
pub use types::{Group, GroupId, Message, MessageId, Session, Status, User, UserId};
