//! Control frames of the credit protocol
//!
//! Every websocket text frame is either one of two sentinels or a payload.
//! A reader grants one record of credit with [`READY_SIGNAL`] and ends the
//! session with [`CLOSE_SIGNAL`]; anything else is a record.

/// Sentinel a reader sends to ask for the next record.
pub const READY_SIGNAL: &str = "-ready-";

/// Sentinel either side sends before going away.
pub const CLOSE_SIGNAL: &str = "-close-";

/// A decoded text frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// Credit for one record.
    Ready,
    /// The peer is leaving.
    Close,
    /// A record.
    Payload(String),
}

impl Frame {
    /// Classify an incoming text frame.
    #[must_use]
    pub fn parse(text: String) -> Self {
        match text.as_str() {
            READY_SIGNAL => Self::Ready,
            CLOSE_SIGNAL => Self::Close,
            _ => Self::Payload(text),
        }
    }

    /// The text frame to put on the wire.
    #[must_use]
    pub fn into_text(self) -> String {
        match self {
            Self::Ready => READY_SIGNAL.to_string(),
            Self::Close => CLOSE_SIGNAL.to_string(),
            Self::Payload(text) => text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels_are_control_frames() {
        assert_eq!(Frame::parse("-ready-".into()), Frame::Ready);
        assert_eq!(Frame::parse("-close-".into()), Frame::Close);
        assert_eq!(
            Frame::parse(" -ready-".into()),
            Frame::Payload(" -ready-".into())
        );
        assert_eq!(Frame::parse(String::new()), Frame::Payload(String::new()));
    }

    #[test]
    fn test_into_text() {
        assert_eq!(Frame::Ready.into_text(), READY_SIGNAL);
        assert_eq!(Frame::Payload("hello".into()).into_text(), "hello");
    }
}
