//! Frame codecs.
//!
//! The server never touches `serde_json` directly: it encodes and decodes
//! through a [`Codec`], so the wire format can change without touching
//! the connection handler.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Converts messages to and from raw frame bytes.
///
/// `Send + Sync + 'static` because one codec instance is shared by every
/// connection task for the lifetime of the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into a frame.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if the value cannot be represented.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Parses a frame into a value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the bytes are malformed or do
    /// not match `T`.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// JSON codec. Browser clients read these frames as plain text.
///
/// ```rust
/// use studysync_protocol::{Codec, Envelope, JsonCodec, ServerMessage, SessionStatus, TimerUpdate};
///
/// let codec = JsonCodec;
/// let frame = Envelope::new(
///     3,
///     1_700_000_000_000,
///     ServerMessage::TimerUpdate(TimerUpdate { remaining_time: 90, status: SessionStatus::Active }),
/// );
///
/// let bytes = codec.encode(&frame).unwrap();
/// let back: Envelope<ServerMessage> = codec.decode(&bytes).unwrap();
/// assert_eq!(frame, back);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
