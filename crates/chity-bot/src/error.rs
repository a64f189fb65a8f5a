use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed frame, or a frame whose discriminator or fields do not match the schema.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Explicit `error` reply from the service.
    #[error("Server error (from '{origin}'): {message}")]
    ServerError { message: String, origin: String },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Logic error: {0}")]
    Logic(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Error::Auth(_))
    }

    /// Protocol-level failures, including explicit server errors and undecodable JSON.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            Error::Protocol(_) | Error::ServerError { .. } | Error::Json(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
