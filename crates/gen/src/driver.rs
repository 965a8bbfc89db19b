//! # Conformance Driver
//!
//! Replays a [`TestVector`] against a fresh reference VM loaded from the
//! vector's own snapshot and compares what it observes with the recorded
//! postconditions.
//!
//! | Vector | Verdict |
//! |--------|---------|
//! | selector not satisfied, or unsupported class | `Skipped` |
//! | hinted `incorrect` only | `Skipped` |
//! | hinted `incorrect` + `negate`, outcome differs | `NegatedAsExpected` |
//! | hinted `incorrect` + `negate`, outcome matches | `Failed` |
//! | otherwise | `Passed` or `Failed` |
//!
//! Mismatches are collected as [`ConformanceFailure`] values; only input the
//! driver cannot replay at all is returned as an error.

use std::fmt;

use tracing::{debug, warn};
use tvx_runtime_vm::{ExitCode, Message, ReplayingRand, TipsetBlock, Vm, VmConfig, VmError};
use tvx_schema::{Cid, Class, Receipt, Selector, TestVector, HINT_INCORRECT, HINT_NEGATE};

use crate::error::{GenError, GenResult};

/// One way the replayed outcome differs from the recorded one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConformanceFailure {
    pub what: String,
    pub expected: String,
    pub actual: String,
}

impl fmt::Display for ConformanceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {}, got {}",
            self.what, self.expected, self.actual
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Passed,
    Skipped(String),
    Failed(Vec<ConformanceFailure>),
    /// A negated vector whose outcome differed, as its hints require.
    NegatedAsExpected(Vec<ConformanceFailure>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverReport {
    pub id: String,
    pub verdict: Verdict,
}

impl DriverReport {
    pub fn is_failure(&self) -> bool {
        matches!(self.verdict, Verdict::Failed(_))
    }
}

/// What the replay produced.
struct Observed {
    failures: Vec<usize>,
    receipts: Vec<Option<Receipt>>,
    receipts_roots: Vec<Cid>,
    root: Cid,
}

pub struct Driver {
    supported: Selector,
    vm_config: VmConfig,
}

impl Default for Driver {
    /// Supports the chaos actor and classifies undecodable params as
    /// `ErrSerialization`.
    fn default() -> Self {
        let mut supported = Selector::new();
        supported.insert(
            tvx_builders::SELECTOR_CHAOS_ACTOR.to_string(),
            "true".to_string(),
        );
        Self {
            supported,
            vm_config: VmConfig {
                params_decode_exit: ExitCode::ERR_SERIALIZATION,
                ..VmConfig::default()
            },
        }
    }
}

impl Driver {
    pub fn new(supported: Selector, vm_config: VmConfig) -> Self {
        Self {
            supported,
            vm_config,
        }
    }

    fn unsupported(&self, selector: &Selector) -> Option<String> {
        selector
            .iter()
            .find(|(k, v)| self.supported.get(*k) != Some(*v))
            .map(|(k, v)| format!("selector {k}={v} not supported"))
    }

    pub fn check(&self, vector: &TestVector) -> GenResult<DriverReport> {
        let id = vector.id().to_string();
        let report = |verdict| DriverReport {
            id: id.clone(),
            verdict,
        };

        if let Some(reason) = self.unsupported(&vector.selector) {
            return Ok(report(Verdict::Skipped(reason)));
        }
        if vector.class == Class::Blockseq {
            return Ok(report(Verdict::Skipped("blockseq vectors are not replayed".into())));
        }
        let negate = vector.has_hint(HINT_NEGATE);
        if vector.has_hint(HINT_INCORRECT) && !negate {
            return Ok(report(Verdict::Skipped("vector is known to be incorrect".into())));
        }

        let observed = self.replay(vector)?;
        let mismatches = compare(vector, &observed);
        debug!(%id, mismatches = mismatches.len(), negate, "vector replayed");

        let verdict = match (negate, mismatches.is_empty()) {
            (false, true) => Verdict::Passed,
            (false, false) => Verdict::Failed(mismatches),
            (true, false) => Verdict::NegatedAsExpected(mismatches),
            (true, true) => Verdict::Failed(vec![ConformanceFailure {
                what: "negated postconditions".into(),
                expected: "a differing outcome".into(),
                actual: "the recorded outcome".into(),
            }]),
        };
        if let Verdict::Failed(failures) = &verdict {
            for f in failures {
                warn!(%id, failure = %f, "conformance failure");
            }
        }
        Ok(report(verdict))
    }

    fn replay(&self, vector: &TestVector) -> GenResult<Observed> {
        let malformed = |reason: String| GenError::MalformedVector {
            id: vector.id().to_string(),
            reason,
        };
        let pre = &vector.pre;
        let root = pre
            .state_tree
            .as_ref()
            .map(|s| s.root_cid)
            .ok_or_else(|| malformed("preconditions carry no state root".into()))?;

        let mut vm = Vm::from_snapshot(self.vm_config.clone(), vector.car.as_slice(), &root)?;
        vm.set_epoch(pre.epoch);
        vm.set_base_fee(pre.effective_base_fee());
        if let Some(supply) = &pre.circ_supply {
            vm.set_circ_supply(supply.clone());
        }
        vm.set_rand(Box::new(ReplayingRand::new(vector.randomness.clone())));

        let decode = |bytes: &[u8]| {
            Message::decode(bytes).map_err(|e| malformed(format!("undecodable message: {e}")))
        };

        let mut observed = Observed {
            failures: Vec::new(),
            receipts: Vec::new(),
            receipts_roots: Vec::new(),
            root,
        };
        match vector.class {
            Class::Tipset => {
                for ts in &vector.apply_tipsets {
                    let mut blocks = Vec::with_capacity(ts.blocks.len());
                    for b in &ts.blocks {
                        let messages = b
                            .messages
                            .iter()
                            .map(|m| decode(m.as_slice()))
                            .collect::<GenResult<Vec<_>>>()?;
                        blocks.push(TipsetBlock {
                            miner: b.miner_addr,
                            win_count: b.win_count,
                            messages,
                        });
                    }
                    let ret = vm.apply_tipset(ts.epoch, ts.base_fee.clone(), &blocks)?;
                    observed
                        .receipts
                        .extend(ret.applied.iter().map(|r| Some(r.receipt.to_schema())));
                    observed.receipts_roots.push(ret.receipts_root);
                }
            }
            _ => {
                for (index, m) in vector.apply_messages.iter().enumerate() {
                    let msg = decode(m.bytes.as_slice())?;
                    vm.set_epoch(m.epoch.unwrap_or(pre.epoch));
                    match vm.apply_message(&msg) {
                        Ok(ret) => observed.receipts.push(Some(ret.receipt.to_schema())),
                        Err(VmError::Fatal(reason)) => {
                            debug!(index, %reason, "message failed to apply");
                            observed.failures.push(index);
                            observed.receipts.push(None);
                        }
                        Err(other) => return Err(other.into()),
                    }
                }
            }
        }
        observed.root = vm.flush()?;
        Ok(observed)
    }
}

fn describe(receipt: Option<&Receipt>) -> String {
    match receipt {
        Some(r) => format!(
            "{} (gas {}, return {})",
            ExitCode::new(r.exit_code),
            r.gas_used,
            r.return_value
        ),
        None => "no receipt".into(),
    }
}

fn compare(vector: &TestVector, observed: &Observed) -> Vec<ConformanceFailure> {
    let post = &vector.post;
    let mut out = Vec::new();

    if post.apply_message_failures != observed.failures {
        out.push(ConformanceFailure {
            what: "apply failures".into(),
            expected: format!("{:?}", post.apply_message_failures),
            actual: format!("{:?}", observed.failures),
        });
    }

    let count = post.receipts.len().max(observed.receipts.len());
    for i in 0..count {
        let expected = post.receipts.get(i).and_then(Option::as_ref);
        let actual = observed.receipts.get(i).and_then(Option::as_ref);
        if expected != actual {
            out.push(ConformanceFailure {
                what: format!("receipt {i}"),
                expected: describe(expected),
                actual: describe(actual),
            });
        }
    }

    if post.receipts_roots != observed.receipts_roots {
        out.push(ConformanceFailure {
            what: "receipts roots".into(),
            expected: format!("{:?}", post.receipts_roots),
            actual: format!("{:?}", observed.receipts_roots),
        });
    }

    if post.state_tree.root_cid != observed.root {
        out.push(ConformanceFailure {
            what: "post state root".into(),
            expected: post.state_tree.root_cid.to_string(),
            actual: observed.root.to_string(),
        });
    }
    out
}
