//! Serialization of transitions into the blobs held by the key-value store.
//!
//! Each blob is an envelope: the magic tag [`MAGIC`], one byte naming the
//! payload format, one byte for the schema version, then the payload. A decoder
//! checks the header before touching the payload, so records written by another
//! codec or by an incompatible version of this crate are rejected with
//! [`ReplayBufferError::IncompatibleRecord`] instead of being misread.
use crate::{ReplayBufferError, Result, Transition};
use serde::{de::DeserializeOwned, Serialize};

/// Magic tag at the head of every record.
pub const MAGIC: [u8; 4] = *b"DRBR";

/// Schema version of [`Transition`] records written by this crate.
pub const SCHEMA_VERSION: u8 = 1;

const HEADER_LEN: usize = MAGIC.len() + 2;

/// Encodes transitions to bytes and back.
pub trait TransitionCodec: Send + Sync {
    /// Serializes a transition into a record.
    fn encode<O, A>(&self, tr: &Transition<O, A>) -> Result<Vec<u8>>
    where
        O: Serialize,
        A: Serialize;

    /// Deserializes a record produced by [`TransitionCodec::encode`].
    fn decode<O, A>(&self, bytes: &[u8]) -> Result<Transition<O, A>>
    where
        O: DeserializeOwned,
        A: DeserializeOwned;
}

/// Payload formats distinguished in the envelope header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
enum Format {
    Bincode = 1,
    Json = 2,
}

fn with_header(format: Format, payload_len: usize) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + payload_len);
    buf.extend_from_slice(&MAGIC);
    buf.push(format as u8);
    buf.push(SCHEMA_VERSION);
    buf
}

/// Checks the header and returns the payload.
fn payload(format: Format, bytes: &[u8]) -> Result<&[u8]> {
    if bytes.len() < HEADER_LEN || bytes[..MAGIC.len()] != MAGIC {
        return Err(ReplayBufferError::IncompatibleRecord(
            "missing record header".to_string(),
        ));
    }
    let (f, v) = (bytes[MAGIC.len()], bytes[MAGIC.len() + 1]);
    if f != format as u8 {
        return Err(ReplayBufferError::IncompatibleRecord(format!(
            "record format {} cannot be read as {:?}",
            f, format
        )));
    }
    if v != SCHEMA_VERSION {
        return Err(ReplayBufferError::IncompatibleRecord(format!(
            "schema version {} is not supported (expected {})",
            v, SCHEMA_VERSION
        )));
    }
    Ok(&bytes[HEADER_LEN..])
}

/// Compact binary codec based on [`bincode`].
#[derive(Clone, Copy, Debug, Default)]
pub struct BincodeCodec;

impl TransitionCodec for BincodeCodec {
    fn encode<O, A>(&self, tr: &Transition<O, A>) -> Result<Vec<u8>>
    where
        O: Serialize,
        A: Serialize,
    {
        let payload = bincode::serialize(tr)
            .map_err(|e| ReplayBufferError::IncompatibleRecord(e.to_string()))?;
        let mut buf = with_header(Format::Bincode, payload.len());
        buf.extend_from_slice(&payload);
        Ok(buf)
    }

    fn decode<O, A>(&self, bytes: &[u8]) -> Result<Transition<O, A>>
    where
        O: DeserializeOwned,
        A: DeserializeOwned,
    {
        let payload = payload(Format::Bincode, bytes)?;
        bincode::deserialize(payload).map_err(|e| ReplayBufferError::IncompatibleRecord(e.to_string()))
    }
}

/// Human-readable codec based on [`serde_json`], handy when inspecting a store by hand.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl TransitionCodec for JsonCodec {
    fn encode<O, A>(&self, tr: &Transition<O, A>) -> Result<Vec<u8>>
    where
        O: Serialize,
        A: Serialize,
    {
        let payload = serde_json::to_vec(tr)
            .map_err(|e| ReplayBufferError::IncompatibleRecord(e.to_string()))?;
        let mut buf = with_header(Format::Json, payload.len());
        buf.extend_from_slice(&payload);
        Ok(buf)
    }

    fn decode<O, A>(&self, bytes: &[u8]) -> Result<Transition<O, A>>
    where
        O: DeserializeOwned,
        A: DeserializeOwned,
    {
        let payload = payload(Format::Json, bytes)?;
        serde_json::from_slice(payload).map_err(|e| ReplayBufferError::IncompatibleRecord(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Tr = Transition<Vec<f32>, i64>;

    fn transition() -> Tr {
        Transition::new(vec![0.1, 0.2], 3, vec![0.3, 0.4], -1.5, true, false).with_info("step", 7.0)
    }

    fn assert_incompatible(res: Result<Tr>, needle: &str) {
        match res {
            Err(ReplayBufferError::IncompatibleRecord(msg)) => {
                assert!(msg.contains(needle), "{:?} does not contain {:?}", msg, needle)
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_bincode_roundtrip() {
        let codec = BincodeCodec;
        let bytes = codec.encode(&transition()).unwrap();
        assert_eq!(&bytes[..4], b"DRBR");
        assert_eq!(codec.decode::<Vec<f32>, i64>(&bytes).unwrap(), transition());
    }

    #[test]
    fn test_json_payload_is_readable() {
        let bytes = JsonCodec.encode(&transition()).unwrap();
        let text = std::str::from_utf8(&bytes[HEADER_LEN..]).unwrap();
        assert!(text.contains("\"reward\":-1.5"));
        assert_eq!(JsonCodec.decode::<Vec<f32>, i64>(&bytes).unwrap(), transition());
    }

    #[test]
    fn test_rejects_foreign_bytes() {
        assert_incompatible(BincodeCodec.decode(b"\x80\x04pickle"), "header");
        assert_incompatible(BincodeCodec.decode(b""), "header");
    }

    #[test]
    fn test_rejects_other_format() {
        let bytes = JsonCodec.encode(&transition()).unwrap();
        assert_incompatible(BincodeCodec.decode(&bytes), "format 2");
    }

    #[test]
    fn test_rejects_other_schema_version() {
        let mut bytes = BincodeCodec.encode(&transition()).unwrap();
        bytes[5] = SCHEMA_VERSION + 1;
        assert_incompatible(BincodeCodec.decode(&bytes), "schema version");
    }

    #[test]
    fn test_rejects_other_transition_type() {
        let bytes = JsonCodec.encode(&transition()).unwrap();
        let res = JsonCodec.decode::<String, i64>(&bytes);
        assert!(matches!(res, Err(ReplayBufferError::IncompatibleRecord(_))));
    }
}
