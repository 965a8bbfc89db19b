//! # Test Vector Record
//!
//! The persisted form of one replayable state transition. One JSON object per
//! vector:
//!
//! | Key | Content |
//! |-----|---------|
//! | `class` | `message`, `tipset` or `blockseq` |
//! | `selector` | feature name → required value; unmet ⇒ driver skips |
//! | `hints` | driver interpretation markers (`incorrect`, `negate`) |
//! | `_meta` | [`Metadata`] provenance |
//! | `car` | base64 snapshot holding every block the preconditions reference |
//! | `randomness` | ordered [`Randomness`] rules |
//! | `preconditions` | epoch, state root, base fee, circulating supply |
//! | `apply_messages` / `apply_tipsets` | ordered transition inputs |
//! | `postconditions` | resulting root, receipts, failures, receipts roots |
//! | `diagnostics` | opaque debug payload, never interpreted |
//!
//! A record is only emitted after [`TestVector::validate`] succeeds, and a
//! driver validates a decoded record before replaying it.

use std::collections::BTreeMap;

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::cid::Cid;
use crate::encoding::{opt_bigint_string, Base64Bytes};
use crate::error::{SchemaError, SchemaResult};
use crate::randomness::Randomness;

/// The vector encodes a known-wrong reference outcome.
pub const HINT_INCORRECT: &str = "incorrect";

/// Combined with [`HINT_INCORRECT`]: assert the opposite of the postconditions.
pub const HINT_NEGATE: &str = "negate";

/// Base fee drivers assume when the preconditions omit one.
pub const DEFAULT_BASE_FEE: u64 = 100;

/// Capability predicates a driver must satisfy to run the vector.
pub type Selector = BTreeMap<String, String>;

/// Kind of transition a vector describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Class {
    /// A flat list of messages applied one by one.
    Message,
    /// A list of tipsets, each with its own blocks and base fee.
    Tipset,
    /// A block sequence.
    Blockseq,
}

impl Class {
    pub fn as_str(&self) -> &'static str {
        match self {
            Class::Message => "message",
            Class::Tipset => "tipset",
            Class::Blockseq => "blockseq",
        }
    }
}

/// One entry of the generation provenance list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Provenance of a vector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gen: Vec<GenerationData>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl Metadata {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

/// Reference to a state tree root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTree {
    pub root_cid: Cid,
}

/// State before the transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preconditions {
    pub epoch: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_tree: Option<StateTree>,
    #[serde(
        rename = "basefee",
        default,
        skip_serializing_if = "Option::is_none",
        with = "opt_bigint_string"
    )]
    pub base_fee: Option<BigInt>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "opt_bigint_string"
    )]
    pub circ_supply: Option<BigInt>,
}

impl Preconditions {
    /// Base fee to apply, falling back to [`DEFAULT_BASE_FEE`].
    pub fn effective_base_fee(&self) -> BigInt {
        self.base_fee
            .clone()
            .unwrap_or_else(|| BigInt::from(DEFAULT_BASE_FEE))
    }
}

/// Recorded outcome of one applied message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub exit_code: i64,
    #[serde(rename = "return")]
    pub return_value: Base64Bytes,
    pub gas_used: i64,
}

/// Expected state after the transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Postconditions {
    /// Indices of messages that never produced a receipt.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub apply_message_failures: Vec<usize>,
    pub state_tree: StateTree,
    /// One entry per applied message; `null` at indices listed in
    /// `apply_message_failures`.
    #[serde(default)]
    pub receipts: Vec<Option<Receipt>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub receipts_roots: Vec<Cid>,
}

/// Free-form debug payload surfaced to humans only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub format: String,
    pub data: Base64Bytes,
}

/// A serialized message applied at an optional epoch override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyMessage {
    pub bytes: Base64Bytes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epoch: Option<i64>,
}

/// One block of a tipset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub miner_addr: Address,
    pub win_count: i64,
    pub messages: Vec<Base64Bytes>,
}

/// One tipset: blocks sharing an epoch and base fee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tipset {
    pub epoch: i64,
    #[serde(rename = "basefee", with = "crate::encoding::bigint_string")]
    pub base_fee: BigInt,
    pub blocks: Vec<Block>,
}

/// One complete, replayable transition case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestVector {
    pub class: Class,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub selector: Selector,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Metadata>,
    pub car: Base64Bytes,
    #[serde(default, skip_serializing_if = "Randomness::is_empty")]
    pub randomness: Randomness,
    #[serde(rename = "preconditions")]
    pub pre: Preconditions,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub apply_messages: Vec<ApplyMessage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub apply_tipsets: Vec<Tipset>,
    #[serde(rename = "postconditions")]
    pub post: Postconditions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Diagnostics>,
}

impl TestVector {
    /// Checks the structural invariants of the record.
    ///
    /// For message-class vectors the receipts list must line up one to one
    /// with `apply_messages`.
    pub fn validate(&self) -> SchemaResult<()> {
        if self.class == Class::Message && self.post.receipts.len() != self.apply_messages.len() {
            return Err(SchemaError::ReceiptCountMismatch {
                receipts: self.post.receipts.len(),
                messages: self.apply_messages.len(),
            });
        }
        Ok(())
    }

    pub fn has_hint(&self, hint: &str) -> bool {
        self.hints.iter().any(|h| h == hint)
    }

    /// Identifier from the metadata, or `""`.
    pub fn id(&self) -> &str {
        self.meta.as_ref().map(|m| m.id.as_str()).unwrap_or("")
    }

    pub fn to_json(&self) -> SchemaResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> SchemaResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decodes and validates a persisted record.
    pub fn from_json(s: &str) -> SchemaResult<Self> {
        let vector: TestVector = serde_json::from_str(s)?;
        vector.validate()?;
        Ok(vector)
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// TESTS
// ════════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal(class: Class) -> TestVector {
        TestVector {
            class,
            selector: Selector::new(),
            hints: Vec::new(),
            meta: Some(Metadata::new("minimal")),
            car: Base64Bytes::absent(),
            randomness: Randomness::default(),
            pre: Preconditions {
                epoch: 0,
                state_tree: Some(StateTree {
                    root_cid: Cid::of(b"pre"),
                }),
                base_fee: None,
                circ_supply: None,
            },
            apply_messages: Vec::new(),
            apply_tipsets: Vec::new(),
            post: Postconditions {
                apply_message_failures: Vec::new(),
                state_tree: StateTree {
                    root_cid: Cid::of(b"post"),
                },
                receipts: Vec::new(),
                receipts_roots: Vec::new(),
            },
            diagnostics: None,
        }
    }

    #[test]
    fn test_receipt_count_must_match_messages() {
        let mut v = minimal(Class::Message);
        v.apply_messages.push(ApplyMessage {
            bytes: Base64Bytes::new(vec![1]),
            epoch: None,
        });
        match v.validate() {
            Err(SchemaError::ReceiptCountMismatch { receipts, messages }) => {
                assert_eq!((receipts, messages), (0, 1));
            }
            other => panic!("expected mismatch, got {other:?}"),
        }
        v.post.receipts.push(None);
        assert!(v.validate().is_ok());
    }

    #[test]
    fn test_tipset_class_is_not_bound_to_receipt_count() {
        let mut v = minimal(Class::Tipset);
        v.post.receipts.push(None);
        assert!(v.validate().is_ok());
    }

    #[test]
    fn test_persisted_keys() {
        let mut v = minimal(Class::Message);
        v.pre.base_fee = Some(BigInt::from(100));
        v.hints.push(HINT_INCORRECT.to_string());
        let value = serde_json::to_value(&v).expect("encode");
        let obj = value.as_object().expect("object");
        for key in ["class", "hints", "_meta", "car", "preconditions", "postconditions"] {
            assert!(obj.contains_key(key), "missing {key}");
        }
        assert!(!obj.contains_key("apply_tipsets"));
        assert_eq!(value["class"], "message");
        assert_eq!(value["preconditions"]["basefee"], "100");
        assert!(v.has_hint(HINT_INCORRECT));
        assert!(!v.has_hint(HINT_NEGATE));
    }

    #[test]
    fn test_receipt_return_key() {
        let r = Receipt {
            exit_code: 0,
            return_value: Base64Bytes::absent(),
            gas_used: 1234,
        };
        let json = serde_json::to_string(&r).expect("encode");
        assert_eq!(json, r#"{"exit_code":0,"return":"","gas_used":1234}"#);
    }

    #[test]
    fn test_effective_base_fee_defaults() {
        let v = minimal(Class::Message);
        assert_eq!(v.pre.effective_base_fee(), BigInt::from(DEFAULT_BASE_FEE));
    }

    #[test]
    fn test_from_json_validates() {
        let mut v = minimal(Class::Message);
        v.post.receipts.push(None);
        let json = v.to_json().expect("encode");
        assert!(TestVector::from_json(&json).is_err());
    }
}
