use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::dispatch::Dispatcher;
use crate::protocol::{Inbound, Request};
use crate::state::{Outbox, SharedState};
use crate::transport::{FrameSink, FrameStream};
use crate::{Error, Result};

/// Drain queued requests onto the connection until the queue closes or a send fails.
pub async fn write_loop(
    sink: &mut dyn FrameSink,
    mut queue: mpsc::UnboundedReceiver<Request>,
) -> Result<()> {
    while let Some(request) = queue.recv().await {
        let frame = match request.encode() {
            Ok(frame) => frame,
            Err(err) => {
                warn!(cmd = request.cmd(), error = %err, "could not encode request");
                continue;
            }
        };
        debug!(cmd = request.cmd(), "send");
        sink.send(frame).await?;
    }
    Ok(())
}

/// Receive and dispatch frames until the connection fails.
///
/// A frame that does not decode, or whose handler fails, is logged and
/// counted; the loop moves on to the next frame. Only transport failures
/// (including the peer closing) end the loop, always as an error.
pub async fn listen_loop(
    stream: &mut dyn FrameStream,
    dispatcher: &Dispatcher,
    state: &SharedState,
    outbox: &Outbox,
) -> Result<()> {
    loop {
        let frame = stream
            .recv()
            .await?
            .ok_or_else(|| Error::Transport("connection closed by peer".to_string()))?;
        receive(&frame, dispatcher, state, outbox).await?;
    }
}

/// One receive cycle: decode, dispatch, absorb non-transport failures.
pub async fn receive(
    frame: &str,
    dispatcher: &Dispatcher,
    state: &SharedState,
    outbox: &Outbox,
) -> Result<()> {
    debug!(%frame, "recv");
    let mut state = state.lock().await;
    state.stats.frames_received += 1;

    let result = Inbound::decode(frame)
        .and_then(|inbound| dispatcher.dispatch(&mut state, inbound, outbox));
    match result {
        Ok(_) => Ok(()),
        Err(err) if err.is_transport() => Err(err),
        Err(err) => {
            warn!(error = %err, "dropping frame");
            state.stats.dropped_frames += 1;
            Ok(())
        }
    }
}
