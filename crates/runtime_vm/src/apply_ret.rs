//! # Apply Results
//!
//! [`MessageReceipt`] is the VM-side receipt; [`ApplyRet`] adds the gas
//! settlement and the abort reason, which are operational only.
//!
//! ## Receipts Root
//!
//! ```text
//! leaf_i = encode(receipt_i)            // fixed-width binary form
//! root   = compute_merkle_root(leaves)  // see merkle.rs
//! cid    = Cid::from_digest(root)
//! ```
//!
//! Only `exit_code`, `return_data` and `gas_used` are committed. The
//! settlement split and the failure text never affect the root.

use serde::{Deserialize, Serialize};
use tvx_schema::{Cid, Receipt};

use crate::encoding;
use crate::error::VmResult;
use crate::exit_code::ExitCode;
use crate::gas::GasOutputs;
use crate::merkle::compute_merkle_root;

// ════════════════════════════════════════════════════════════════════════════════
// TYPES
// ════════════════════════════════════════════════════════════════════════════════

/// Outcome of one message as recorded on chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReceipt {
    pub exit_code: ExitCode,
    pub return_data: Vec<u8>,
    pub gas_used: i64,
}

impl MessageReceipt {
    /// Receipt of a message rejected before any gas was charged.
    pub fn rejected(exit_code: ExitCode) -> Self {
        Self {
            exit_code,
            return_data: Vec::new(),
            gas_used: 0,
        }
    }

    #[must_use]
    pub fn to_schema(&self) -> Receipt {
        Receipt {
            exit_code: self.exit_code.value(),
            return_value: self.return_data.clone().into(),
            gas_used: self.gas_used,
        }
    }

    #[must_use]
    pub fn from_schema(receipt: &Receipt) -> Self {
        Self {
            exit_code: ExitCode::new(receipt.exit_code),
            return_data: receipt.return_value.as_slice().to_vec(),
            gas_used: receipt.gas_used,
        }
    }
}

/// Everything the VM reports about one applied message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyRet {
    pub receipt: MessageReceipt,
    /// How the escrowed gas funds were split. Zero for rejected messages.
    pub gas_outputs: GasOutputs,
    /// Abort reason, if the message did not succeed.
    pub failure: Option<String>,
}

impl ApplyRet {
    pub fn exit_code(&self) -> ExitCode {
        self.receipt.exit_code
    }

    /// Result of a message rejected before execution.
    pub(crate) fn rejected(exit_code: ExitCode, reason: impl Into<String>) -> Self {
        Self {
            receipt: MessageReceipt::rejected(exit_code),
            gas_outputs: GasOutputs::zero(),
            failure: Some(reason.into()),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// RECEIPTS ROOT
// ════════════════════════════════════════════════════════════════════════════════

/// Commits to an ordered receipt list.
pub fn receipts_root(receipts: &[MessageReceipt]) -> VmResult<Cid> {
    let leaves = receipts
        .iter()
        .map(encoding::to_vec::<MessageReceipt>)
        .collect::<VmResult<Vec<_>>>()?;
    Ok(Cid::from_digest(compute_merkle_root(&leaves)))
}

// ════════════════════════════════════════════════════════════════════════════════
// TESTS
// ════════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn receipt(code: i64, gas: i64) -> MessageReceipt {
        MessageReceipt {
            exit_code: ExitCode::new(code),
            return_data: vec![0xAB; 3],
            gas_used: gas,
        }
    }

    #[test]
    fn schema_conversion_preserves_fields() {
        let r = receipt(16, 1234);
        let schema = r.to_schema();
        assert_eq!(schema.exit_code, 16);
        assert_eq!(schema.gas_used, 1234);
        assert_eq!(schema.return_value.as_slice(), &[0xAB; 3]);
        assert_eq!(MessageReceipt::from_schema(&schema), r);
    }

    #[test]
    fn receipts_root_depends_on_order_and_content() {
        let a = receipt(0, 10);
        let b = receipt(6, 20);
        let ab = receipts_root(&[a.clone(), b.clone()]).expect("root");
        let ba = receipts_root(&[b.clone(), a.clone()]).expect("root");
        assert_ne!(ab, ba);
        assert_eq!(ab, receipts_root(&[a.clone(), b]).expect("root"));
        assert_ne!(ab, receipts_root(&[a, receipt(6, 21)]).expect("root"));
    }

    #[test]
    fn empty_receipts_root_is_zero_digest() {
        assert_eq!(receipts_root(&[]).expect("root"), Cid::from_digest([0u8; 32]));
    }

    #[test]
    fn rejected_charges_nothing() {
        let ret = ApplyRet::rejected(ExitCode::SYS_ERR_SENDER_INVALID, "unknown sender");
        assert_eq!(ret.receipt.gas_used, 0);
        assert_eq!(ret.gas_outputs, GasOutputs::zero());
        assert_eq!(ret.exit_code(), ExitCode::SYS_ERR_SENDER_INVALID);
    }
}
