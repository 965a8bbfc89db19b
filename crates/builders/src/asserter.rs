//! # Asserter
//!
//! Checks the committed outcome of a [`Builder`]. Predicates come from
//! [`crate::predicates`] or any closure with the same shape.
//!
//! | Mode | A failing check |
//! |------|-----------------|
//! | `Strict` | returns [`BuilderError::Assertion`]; the vector must not be emitted |
//! | `Lenient` | logs a warning and passes; used for vectors hinted as incorrect |

use std::collections::BTreeMap;

use num_bigint::BigInt;
use tracing::warn;
use tvx_runtime_vm::{ActorState, ApplyRet, ExitCode};
use tvx_schema::Address;

use crate::builder::Builder;
use crate::error::{BuilderError, BuilderResult};
use crate::messages::{ApplicableMessage, MessageHandle};
use crate::predicates::{self, PredicateResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AssertionMode {
    #[default]
    Strict,
    Lenient,
}

pub struct Asserter<'a> {
    builder: &'a Builder,
}

impl<'a> Asserter<'a> {
    pub(crate) fn new(builder: &'a Builder) -> Self {
        Self { builder }
    }

    fn check(&self, outcome: PredicateResult) -> BuilderResult<()> {
        match (outcome, self.builder.mode()) {
            (Ok(()), _) => Ok(()),
            (Err(reason), AssertionMode::Strict) => Err(BuilderError::Assertion(reason)),
            (Err(reason), AssertionMode::Lenient) => {
                warn!(id = self.builder.id(), %reason, "assertion failed");
                Ok(())
            }
        }
    }

    fn result_of<'m>(index: usize, am: &'m ApplicableMessage) -> Result<&'m ApplyRet, String> {
        am.result
            .as_ref()
            .ok_or_else(|| format!("message {index} produced no receipt"))
    }

    // ────────────────────────────────────────────────────────────────────────────
    // Message results
    // ────────────────────────────────────────────────────────────────────────────

    pub fn every_message_result_satisfies<P>(&self, predicate: P) -> BuilderResult<()>
    where
        P: Fn(&ApplyRet) -> PredicateResult,
    {
        for (index, am) in self.builder.messages().iter().enumerate() {
            let outcome = Self::result_of(index, am)
                .and_then(|ret| predicate(ret).map_err(|e| format!("message {index}: {e}")));
            self.check(outcome)?;
        }
        Ok(())
    }

    pub fn message_result_satisfies<P>(
        &self,
        handle: MessageHandle,
        predicate: P,
    ) -> BuilderResult<()>
    where
        P: Fn(&ApplyRet) -> PredicateResult,
    {
        let am = self.builder.applicable(handle)?;
        let index = handle.index();
        self.check(
            Self::result_of(index, am)
                .and_then(|ret| predicate(ret).map_err(|e| format!("message {index}: {e}"))),
        )
    }

    pub fn exit_code_eq(&self, handle: MessageHandle, expected: ExitCode) -> BuilderResult<()> {
        self.message_result_satisfies(handle, predicates::exit_code(expected))
    }

    // ────────────────────────────────────────────────────────────────────────────
    // Actors
    // ────────────────────────────────────────────────────────────────────────────

    /// Runs `predicate` once per distinct sender with its state before and
    /// after, and the messages it sent.
    pub fn every_message_sender_satisfies<P>(&self, predicate: P) -> BuilderResult<()>
    where
        P: Fn(&ActorState, &ActorState, &[&ApplicableMessage]) -> PredicateResult,
    {
        let (Some(pre_root), Some(post_root)) = (self.builder.pre_root(), self.builder.post_root())
        else {
            return Err(BuilderError::Assertion("no committed state".into()));
        };
        let vm = self.builder.vm();

        let mut by_sender: BTreeMap<Address, Vec<&ApplicableMessage>> = BTreeMap::new();
        for am in self.builder.messages() {
            by_sender.entry(am.message.from).or_default().push(am);
        }

        for (sender, sent) in by_sender {
            let pre = vm.actor_at(&pre_root, &sender)?;
            let post = vm.actor_at(&post_root, &sender)?;
            let outcome = match (pre, post) {
                (Some(pre), Some(post)) => {
                    predicate(&pre, &post, &sent).map_err(|e| format!("sender {sender}: {e}"))
                }
                _ => Err(format!("sender {sender} missing before or after the applies")),
            };
            self.check(outcome)?;
        }
        Ok(())
    }

    pub fn balance_eq(&self, addr: &Address, expected: &BigInt) -> BuilderResult<()> {
        let actual = self.builder.balance(addr)?;
        self.check(if &actual == expected {
            Ok(())
        } else {
            Err(format!("balance of {addr}: expected {expected}, got {actual}"))
        })
    }

    pub fn nonce_eq(&self, addr: &Address, expected: u64) -> BuilderResult<()> {
        let outcome = match self.builder.actor(addr)? {
            Some(actor) if actor.nonce == expected => Ok(()),
            Some(actor) => Err(format!(
                "nonce of {addr}: expected {expected}, got {}",
                actor.nonce
            )),
            None => Err(format!("actor {addr} does not exist")),
        };
        self.check(outcome)
    }

    pub fn actor_exists(&self, addr: &Address) -> BuilderResult<()> {
        let outcome = match self.builder.actor(addr)? {
            Some(_) => Ok(()),
            None => Err(format!("actor {addr} does not exist")),
        };
        self.check(outcome)
    }

    pub fn actor_missing(&self, addr: &Address) -> BuilderResult<()> {
        let outcome = match self.builder.actor(addr)? {
            Some(_) => Err(format!("actor {addr} exists")),
            None => Ok(()),
        };
        self.check(outcome)
    }
}
