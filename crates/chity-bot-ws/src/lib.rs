//! WebSocket transport for chity-bot.
//!
//! Frames travel as WebSocket text messages. `wss://` URLs are wrapped in
//! rustls; certificate verification can be switched off for services that
//! run on self-signed certificates.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use chity_bot::transport::{Connection, Connector, FrameSink, FrameStream};
use chity_bot::{BotConfig, Error, Result};

mod tls;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn transport_err(context: &str, err: impl std::fmt::Display) -> Error {
    Error::Transport(format!("{}: {}", context, err))
}

/// Opens WebSocket connections to one URL.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
    accept_invalid_certs: bool,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            accept_invalid_certs: false,
        }
    }

    pub fn from_config(config: &BotConfig) -> Self {
        Self::new(config.url()).accept_invalid_certs(config.accept_invalid_certs)
    }

    /// Skip certificate and hostname checks on `wss://`.
    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn is_secure(&self) -> bool {
        self.url.starts_with("wss://")
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> Result<Connection> {
        let tls = if self.is_secure() {
            let config = tls::client_config(self.accept_invalid_certs)?;
            Some(tokio_tungstenite::Connector::Rustls(Arc::new(config)))
        } else {
            None
        };

        let (socket, response) =
            tokio_tungstenite::connect_async_tls_with_config(self.url.as_str(), None, false, tls)
                .await
                .map_err(|e| transport_err(&format!("connect {}", self.url), e))?;
        debug!(url = %self.url, status = %response.status(), "websocket open");

        let (sink, stream) = socket.split();
        Ok(Connection::new(WsSink { sink }, WsStream { stream }))
    }

    fn endpoint(&self) -> String {
        self.url.clone()
    }
}

pub struct WsSink {
    sink: SplitSink<Socket, Message>,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send(&mut self, frame: String) -> Result<()> {
        self.sink
            .send(Message::Text(frame))
            .await
            .map_err(|e| transport_err("send", e))
    }

    async fn close(&mut self) -> Result<()> {
        self.sink.close().await.map_err(|e| transport_err("close", e))
    }
}

pub struct WsStream {
    stream: SplitStream<Socket>,
}

#[async_trait]
impl FrameStream for WsStream {
    async fn recv(&mut self) -> Result<Option<String>> {
        loop {
            let message = match self.stream.next().await {
                Some(message) => message.map_err(|e| transport_err("receive", e))?,
                None => return Ok(None),
            };
            match message {
                Message::Text(text) => return Ok(Some(text)),
                Message::Binary(bytes) => match String::from_utf8(bytes) {
                    Ok(text) => return Ok(Some(text)),
                    Err(_) => warn!("dropping non-UTF-8 binary frame"),
                },
                Message::Close(frame) => {
                    debug!(?frame, "peer closed websocket");
                    return Ok(None);
                }
                // Pings are answered by tungstenite itself.
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }
}
