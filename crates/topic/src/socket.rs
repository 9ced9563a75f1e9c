//! Text-frame view over the server and client websocket types
//!
//! Both axum's server-side socket and tokio-tungstenite's client stream are
//! reduced to [`FrameSocket`] so a stream role runs identically on either
//! side of a connection.

use std::fmt::{self, Debug};

use async_trait::async_trait;
use axum::extract::ws::{self, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::Error;

/// What came off the wire.
#[derive(Debug)]
pub enum Incoming {
    /// A text frame.
    Text(String),
    /// The peer closed the connection or the stream ended.
    Closed,
    /// A frame kind the protocol does not carry.
    Unsupported(&'static str),
    /// The transport failed.
    Failed(String),
}

/// Why this side is closing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// The session ended normally.
    Normal,
    /// The endpoint is shutting down.
    GoingAway,
}

/// One websocket connection carrying text frames.
#[async_trait]
pub trait FrameSocket: Send {
    /// Send one text frame.
    async fn send_text(&mut self, text: String) -> Result<(), Error>;

    /// Wait for the next data frame, control frames are handled internally.
    ///
    /// Must be cancel safe.
    async fn next_frame(&mut self) -> Incoming;

    /// Start the closing handshake, a no-op once closed.
    async fn close(&mut self, reason: CloseReason) -> Result<(), Error>;

    /// Whether the connection is known to be closed.
    fn is_closed(&self) -> bool;
}

/// Server side of a connection, accepted through axum.
pub struct ServerSocket {
    socket: WebSocket,
    closed: bool,
}

impl ServerSocket {
    /// Wrap an upgraded axum socket.
    #[must_use]
    pub const fn new(socket: WebSocket) -> Self {
        Self {
            socket,
            closed: false,
        }
    }
}

impl Debug for ServerSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerSocket")
            .field("closed", &self.closed)
            .finish()
    }
}

#[async_trait]
impl FrameSocket for ServerSocket {
    async fn send_text(&mut self, text: String) -> Result<(), Error> {
        if self.closed {
            return Err(Error::SocketClosed);
        }

        self.socket
            .send(ws::Message::Text(text.into()))
            .await
            .map_err(|e| Error::Socket(e.to_string()))
    }

    async fn next_frame(&mut self) -> Incoming {
        loop {
            match self.socket.recv().await {
                Some(Ok(ws::Message::Text(text))) => return Incoming::Text(text.as_str().to_owned()),
                Some(Ok(ws::Message::Binary(_))) => return Incoming::Unsupported("binary"),
                Some(Ok(ws::Message::Ping(_) | ws::Message::Pong(_))) => {}
                Some(Ok(ws::Message::Close(_))) | None => {
                    self.closed = true;
                    return Incoming::Closed;
                }
                Some(Err(e)) => {
                    self.closed = true;
                    return Incoming::Failed(e.to_string());
                }
            }
        }
    }

    async fn close(&mut self, reason: CloseReason) -> Result<(), Error> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let frame = match reason {
            CloseReason::Normal => ws::CloseFrame {
                code: ws::close_code::NORMAL,
                reason: ws::Utf8Bytes::from_static(""),
            },
            CloseReason::GoingAway => ws::CloseFrame {
                code: ws::close_code::AWAY,
                reason: ws::Utf8Bytes::from_static("server shutting down"),
            },
        };

        self.socket
            .send(ws::Message::Close(Some(frame)))
            .await
            .map_err(|e| Error::Socket(e.to_string()))
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Client side of a connection, dialed with tokio-tungstenite.
pub struct ClientSocket {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    closed: bool,
}

impl ClientSocket {
    /// Wrap a connected client stream.
    #[must_use]
    pub const fn new(stream: WebSocketStream<MaybeTlsStream<TcpStream>>) -> Self {
        Self {
            stream,
            closed: false,
        }
    }
}

impl Debug for ClientSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSocket")
            .field("closed", &self.closed)
            .finish()
    }
}

#[async_trait]
impl FrameSocket for ClientSocket {
    async fn send_text(&mut self, text: String) -> Result<(), Error> {
        if self.closed {
            return Err(Error::SocketClosed);
        }

        self.stream
            .send(Message::text(text))
            .await
            .map_err(|e| Error::Socket(e.to_string()))
    }

    async fn next_frame(&mut self) -> Incoming {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Incoming::Text(text.as_str().to_owned()),
                Some(Ok(Message::Binary(_))) => return Incoming::Unsupported("binary"),
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                Some(Ok(Message::Close(_))) | None => {
                    self.closed = true;
                    return Incoming::Closed;
                }
                Some(Err(e)) => {
                    self.closed = true;
                    return Incoming::Failed(e.to_string());
                }
            }
        }
    }

    async fn close(&mut self, _reason: CloseReason) -> Result<(), Error> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        self.stream
            .close(None)
            .await
            .map_err(|e| Error::Socket(e.to_string()))
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
