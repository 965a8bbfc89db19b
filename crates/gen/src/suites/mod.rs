//! # Vector Suites
//!
//! Every suite is assembled here explicitly; nothing registers itself.
//!
//! | Suite | Groups |
//! |-------|--------|
//! | [`actor_creation`] | `addresses`, `on_transfer`, `params` |
//! | [`vm_violations`] | `caller_validation`, `actor_creation` |
//! | [`transfer`] | `basic`, `rejected` |
//! | [`randomness`] | `replay` |
//! | [`tipset_ordering`] | `nonce_order`, `duplicates` |

use crate::error::GenResult;
use crate::generator::Generator;
use crate::item::VectorGroup;

pub mod actor_creation;
pub mod randomness;
pub mod tipset_ordering;
pub mod transfer;
pub mod vm_violations;

#[derive(Debug)]
pub struct Suite {
    pub name: &'static str,
    pub groups: Vec<VectorGroup>,
}

impl Suite {
    /// Submits every group under `<suite>/<group>`.
    pub fn submit(self, generator: &Generator) -> GenResult<()> {
        for group in self.groups {
            generator.submit(VectorGroup {
                name: format!("{}/{}", self.name, group.name),
                ..group
            })?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| g.items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn all() -> Vec<Suite> {
    vec![
        actor_creation::suite(),
        vm_violations::suite(),
        transfer::suite(),
        randomness::suite(),
        tipset_ordering::suite(),
    ]
}

/// Suites whose name is in `names`; every suite when `names` is empty.
pub fn select(names: &[String]) -> Vec<Suite> {
    all()
        .into_iter()
        .filter(|s| names.is_empty() || names.iter().any(|n| n == s.name))
        .collect()
}
