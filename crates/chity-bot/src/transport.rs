use async_trait::async_trait;

use crate::Result;

/// Outbound half of a connection. Frames are opaque text; framing and TLS belong to the implementor.
#[async_trait]
pub trait FrameSink: Send {
    async fn send(&mut self, frame: String) -> Result<()>;

    async fn close(&mut self) -> Result<()>;
}

/// Inbound half of a connection.
#[async_trait]
pub trait FrameStream: Send {
    /// Next text frame, or `None` once the peer has closed the connection.
    async fn recv(&mut self) -> Result<Option<String>>;
}

/// One established connection, split so sending and receiving can proceed concurrently.
pub struct Connection {
    pub sink: Box<dyn FrameSink>,
    pub stream: Box<dyn FrameStream>,
}

impl Connection {
    pub fn new(sink: impl FrameSink + 'static, stream: impl FrameStream + 'static) -> Self {
        Self {
            sink: Box::new(sink),
            stream: Box::new(stream),
        }
    }
}

/// Opens connections to the chat service.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Connection>;

    /// Human-readable target, for logs.
    fn endpoint(&self) -> String;
}

/// In-process transport backed by unbounded channels.
///
/// Each `connect` hands a [`ServerEnd`] to the paired [`ChannelAcceptor`], which
/// lets tests script the service side of a conversation.
pub mod channel {
    use async_trait::async_trait;
    use serde_json::Value;
    use tokio::sync::mpsc;

    use super::{Connection, Connector, FrameSink, FrameStream};
    use crate::codec::{self, Packet};
    use crate::{Error, Result};

    pub struct ChannelConnector {
        accept_tx: mpsc::UnboundedSender<ServerEnd>,
    }

    pub struct ChannelAcceptor {
        accept_rx: mpsc::UnboundedReceiver<ServerEnd>,
    }

    pub fn pair() -> (ChannelConnector, ChannelAcceptor) {
        let (accept_tx, accept_rx) = mpsc::unbounded_channel();
        (ChannelConnector { accept_tx }, ChannelAcceptor { accept_rx })
    }

    #[async_trait]
    impl Connector for ChannelConnector {
        async fn connect(&self) -> Result<Connection> {
            let (client_tx, server_rx) = mpsc::unbounded_channel();
            let (server_tx, client_rx) = mpsc::unbounded_channel();
            self.accept_tx
                .send(ServerEnd {
                    from_client: server_rx,
                    to_client: server_tx,
                })
                .map_err(|_| Error::Transport("connection refused".to_string()))?;
            Ok(Connection::new(
                ChannelSink { tx: Some(client_tx) },
                ChannelStream { rx: client_rx },
            ))
        }

        fn endpoint(&self) -> String {
            "channel://local".to_string()
        }
    }

    impl ChannelAcceptor {
        pub async fn accept(&mut self) -> Option<ServerEnd> {
            self.accept_rx.recv().await
        }
    }

    pub struct ChannelSink {
        tx: Option<mpsc::UnboundedSender<String>>,
    }

    #[async_trait]
    impl FrameSink for ChannelSink {
        async fn send(&mut self, frame: String) -> Result<()> {
            let tx = self
                .tx
                .as_ref()
                .ok_or_else(|| Error::Transport("connection already closed".to_string()))?;
            tx.send(frame)
                .map_err(|_| Error::Transport("peer closed the connection".to_string()))
        }

        async fn close(&mut self) -> Result<()> {
            self.tx = None;
            Ok(())
        }
    }

    pub struct ChannelStream {
        rx: mpsc::UnboundedReceiver<String>,
    }

    #[async_trait]
    impl FrameStream for ChannelStream {
        async fn recv(&mut self) -> Result<Option<String>> {
            Ok(self.rx.recv().await)
        }
    }

    /// Service side of a channel connection. Dropping it closes the connection.
    pub struct ServerEnd {
        from_client: mpsc::UnboundedReceiver<String>,
        to_client: mpsc::UnboundedSender<String>,
    }

    impl ServerEnd {
        /// Next raw frame from the client, `None` once the client closed.
        pub async fn recv(&mut self) -> Option<String> {
            self.from_client.recv().await
        }

        /// Next frame from the client, decoded. Panics on frames the codec rejects.
        pub async fn recv_packet(&mut self) -> Option<Packet> {
            let frame = self.recv().await?;
            Some(codec::decode(&frame).unwrap_or_else(|e| panic!("client sent {}: {}", frame, e)))
        }

        /// Send a raw frame to the client. Returns false if the client is gone.
        pub fn send(&self, frame: impl Into<String>) -> bool {
            self.to_client.send(frame.into()).is_ok()
        }

        pub fn send_json(&self, value: Value) -> bool {
            self.send(value.to_string())
        }
    }

}
