use thiserror::Error;
use topicmesh_storage::StorageError;

/// Errors that can occur in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// The endpoint has already been started.
    #[error("endpoint already started")]
    AlreadyStarted,

    /// Failed to bind the listening socket.
    #[error("failed to bind listener: {0}")]
    Bind(#[source] std::io::Error),

    /// Dialing a remote endpoint failed.
    #[error("failed to connect to {address}: {reason}")]
    Connect {
        /// The address that was dialed.
        address: String,
        /// Why the handshake failed.
        reason: String,
    },

    /// The websocket handshake did not complete in time.
    #[error("timed out connecting to {0}")]
    ConnectTimeout(String),

    /// The address could not be parsed or is not usable.
    #[error("invalid topic address: {0}")]
    InvalidAddress(String),

    /// A stored record could not be carried in a text frame.
    #[error("record is not valid utf-8: {0}")]
    InvalidPayload(#[from] std::string::FromUtf8Error),

    /// The queue was dropped while a reader was waiting.
    #[error("queue closed")]
    QueueClosed,

    /// The host name of an address did not resolve.
    #[error("could not resolve {0}")]
    Resolve(String),

    /// Sending or receiving on the websocket failed.
    #[error("socket error: {0}")]
    Socket(String),

    /// The websocket is already closed.
    #[error("socket closed")]
    SocketClosed,

    /// The underlying log failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A background connection task failed to join.
    #[error("connection task failed: {0}")]
    Task(String),
}
