//! Messages exchanged between an output port and its remote peer.
//!
//! | Channel           | Direction   | Message                                                         |
//! |-------------------|-------------|-----------------------------------------------------------------|
//! | information (tag) | peer → port | remote call trigger, no payload                                 |
//! | information (tag) | port → peer | `Option<InformationRecord>`                                     |
//! | data (tag + 1)    | peer → port | [`UpdateExtent`](crate::source::UpdateExtent), then a timestamp |
//! | data (tag + 1)    | port → peer | [`DataMessage`], then a timestamp                               |
//!
//! Records are encoded with CBOR, while timestamps use a fixed-size, 8-byte
//! big-endian encoding.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::source::DataInformation;
use crate::time::Timestamp;

type SerializationError = ciborium::ser::Error<std::io::Error>;
type DeserializationError = ciborium::de::Error<std::io::Error>;

/// Metadata sent in reply to an information request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InformationRecord {
    /// Highest modification time observed upstream of the data.
    pub pipeline_mtime: Timestamp,
    /// Structural description of the data.
    pub information: DataInformation,
}

/// Data sent in reply to a data request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataMessage {
    /// The serialized data object.
    Payload(Bytes),
    /// No data is available.
    Null,
}

/// An error raised while encoding or decoding a message.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// A record could not be encoded.
    #[error("could not encode message: {0}")]
    Encode(#[from] SerializationError),
    /// A record could not be decoded.
    #[error("could not decode message: {0}")]
    Decode(#[from] DeserializationError),
    /// A timestamp did not have the expected size.
    #[error("a timestamp must be {expected} bytes long, got {actual} bytes")]
    TimestampLength {
        /// Expected length in bytes.
        expected: usize,
        /// Actual length in bytes.
        actual: usize,
    },
}

/// Encodes a record with CBOR.
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, WireError> {
    let mut buf = Vec::new();
    ciborium::into_writer(message, &mut buf)?;

    Ok(buf)
}

/// Decodes a CBOR-encoded record.
pub fn decode<T: DeserializeOwned>(buf: &[u8]) -> Result<T, WireError> {
    Ok(ciborium::from_reader(buf)?)
}

/// Encodes a timestamp with its fixed-size representation.
pub fn encode_timestamp(time: Timestamp) -> [u8; Timestamp::ENCODED_LEN] {
    time.to_be_bytes()
}

/// Decodes a timestamp from its fixed-size representation.
pub fn decode_timestamp(buf: &[u8]) -> Result<Timestamp, WireError> {
    let bytes: [u8; Timestamp::ENCODED_LEN] =
        buf.try_into().map_err(|_| WireError::TimestampLength {
            expected: Timestamp::ENCODED_LEN,
            actual: buf.len(),
        })?;

    Ok(Timestamp::from_be_bytes(bytes))
}
