//! Payload codecs.
//!
//! A codec turns an envelope into payload bytes and back. The engine is
//! generic over the codec so wire-compatible alternatives can be
//! swapped in, but [`MsgPackCodec`] is the default and what the test
//! suites use.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// Encode and decode frame payloads.
pub trait PayloadCodec: Send + Sync + 'static {
    /// Serialize a value to payload bytes.
    fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>>;

    /// Deserialize a value from payload bytes.
    fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T>;
}

/// MessagePack codec.
///
/// Uses named (map-style) encoding so payloads stay self-describing
/// and field order does not matter on decode.
pub struct MsgPackCodec;

impl PayloadCodec for MsgPackCodec {
    fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(payload)?)
    }
}
