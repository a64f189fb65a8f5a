//! Connection phases and the login/register exchange.

use std::fmt;
use tracing::{debug, info, warn};

use crate::config::BotConfig;
use crate::protocol::{Inbound, Request, ServerError, SessionReply};
use crate::transport::{FrameSink, FrameStream};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Disconnected,
    Connecting,
    Authenticating,
    Bootstrapping,
    Ready,
    Closing,
    Closed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Disconnected => "disconnected",
            Phase::Connecting => "connecting",
            Phase::Authenticating => "authenticating",
            Phase::Bootstrapping => "bootstrapping",
            Phase::Ready => "ready",
            Phase::Closing => "closing",
            Phase::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Result of a single login or register exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthOutcome {
    Accepted { session_id: u64 },
    /// The service answered with an `error` frame.
    Rejected(ServerError),
}

impl AuthOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, AuthOutcome::Accepted { .. })
    }
}

pub async fn login(
    sink: &mut dyn FrameSink,
    stream: &mut dyn FrameStream,
    config: &BotConfig,
) -> Result<AuthOutcome> {
    let request = Request::Login {
        username: config.username.clone(),
        password: config.password.clone(),
        session: config.request_session,
    };
    exchange(sink, stream, &request).await
}

pub async fn register(
    sink: &mut dyn FrameSink,
    stream: &mut dyn FrameStream,
    config: &BotConfig,
) -> Result<AuthOutcome> {
    let request = Request::Register {
        username: config.username.clone(),
        displayname: config.displayname.clone(),
        password: config.password.clone(),
        session: config.request_session,
    };
    exchange(sink, stream, &request).await
}

/// Log in, falling back to registration when the login is rejected.
///
/// Fails with [`Error::Auth`] when both are rejected. Protocol and transport
/// failures of either exchange are returned as they are.
pub async fn authenticate(
    sink: &mut dyn FrameSink,
    stream: &mut dyn FrameStream,
    config: &BotConfig,
) -> Result<SessionReply> {
    let login_err = match login(sink, stream, config).await? {
        AuthOutcome::Accepted { session_id } => {
            info!(session_id, "logged in");
            return Ok(SessionReply { id: session_id });
        }
        AuthOutcome::Rejected(err) => err,
    };
    debug!(reason = %login_err.message, "login rejected, registering");

    match register(sink, stream, config).await? {
        AuthOutcome::Accepted { session_id } => {
            info!(session_id, "registered");
            Ok(SessionReply { id: session_id })
        }
        AuthOutcome::Rejected(err) => {
            warn!(reason = %err.message, "registration rejected");
            Err(Error::Auth(format!(
                "login rejected ({}), registration rejected ({})",
                login_err.message, err.message
            )))
        }
    }
}

async fn exchange(
    sink: &mut dyn FrameSink,
    stream: &mut dyn FrameStream,
    request: &Request,
) -> Result<AuthOutcome> {
    let frame = request.encode()?;
    debug!(cmd = request.cmd(), "send");
    sink.send(frame).await?;

    let frame = stream.recv().await?.ok_or_else(|| {
        Error::Transport(format!("connection closed awaiting {} reply", request.cmd()))
    })?;
    debug!(%frame, "recv");

    match Inbound::decode(&frame)? {
        Inbound::Session(reply) => Ok(AuthOutcome::Accepted { session_id: reply.id }),
        Inbound::Error(err) => Ok(AuthOutcome::Rejected(err)),
        other => Err(Error::Protocol(format!(
            "expected session or error reply to {}, got {}",
            request.cmd(),
            other.cmd()
        ))),
    }
}
