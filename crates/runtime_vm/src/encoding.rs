//! Deterministic binary encoding for messages, params, actor state and
//! state roots.
//!
//! bincode with fixed-width little-endian integers. Trailing bytes are
//! rejected on decode, so a payload is either exactly one value or invalid.

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::VmResult;

/// Upper bound on any single decoded value.
const MAX_DECODE_BYTES: u64 = 16 * 1024 * 1024;

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .with_limit(MAX_DECODE_BYTES)
        .reject_trailing_bytes()
}

/// Encodes `value`. Same value, same bytes.
pub fn to_vec<T: Serialize + ?Sized>(value: &T) -> VmResult<Vec<u8>> {
    Ok(options().serialize(value)?)
}

/// Decodes exactly one `T` from `bytes`.
pub fn from_slice<T: DeserializeOwned>(bytes: &[u8]) -> VmResult<T> {
    Ok(options().deserialize(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tvx_schema::{Address, Cid};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Params {
        code: Cid,
        to: Address,
        payload: Vec<u8>,
    }

    fn sample() -> Params {
        Params {
            code: Cid::of(b"code"),
            to: Address::new_id(101),
            payload: vec![1, 2, 3],
        }
    }

    #[test]
    fn test_encoding_deterministic() {
        assert_eq!(to_vec(&sample()).expect("a"), to_vec(&sample()).expect("b"));
        let back: Params = from_slice(&to_vec(&sample()).expect("enc")).expect("dec");
        assert_eq!(back, sample());
    }

    #[test]
    fn test_leading_zero_bytes_never_decode() {
        let valid = to_vec(&sample()).expect("enc");
        for pad in 1..=12 {
            let mut bad = vec![0u8; pad];
            bad.extend_from_slice(&valid);
            assert!(from_slice::<Params>(&bad).is_err(), "pad {pad} decoded");
        }
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = to_vec(&sample()).expect("enc");
        bytes.push(0);
        assert!(from_slice::<Params>(&bytes).is_err());
    }
}
