//! Generation jobs: one vector definition and the group it belongs to.

use std::fmt;

use tvx_builders::{AssertionMode, Builder, BuilderResult};
use tvx_schema::{Class, Metadata, Selector};

/// Body of a vector definition. It declares, applies and asserts; the
/// harness finishes the builder afterwards.
pub type VectorFn = Box<dyn Fn(&mut Builder) -> BuilderResult<()> + Send + Sync>;

pub struct VectorGenItem {
    pub metadata: Metadata,
    pub selector: Selector,
    pub hints: Vec<String>,
    pub mode: AssertionMode,
    pub func: VectorFn,
}

impl VectorGenItem {
    pub fn new<F>(metadata: Metadata, func: F) -> Self
    where
        F: Fn(&mut Builder) -> BuilderResult<()> + Send + Sync + 'static,
    {
        Self {
            metadata,
            selector: Selector::new(),
            hints: Vec::new(),
            mode: AssertionMode::Strict,
            func: Box::new(func),
        }
    }

    /// Marks a known-incorrect vector: lenient assertions plus the given
    /// hints.
    pub fn lenient(mut self, hints: &[&str]) -> Self {
        self.mode = AssertionMode::Lenient;
        self.hints = hints.iter().map(|h| h.to_string()).collect();
        self
    }

    pub fn id(&self) -> &str {
        &self.metadata.id
    }
}

impl fmt::Debug for VectorGenItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorGenItem")
            .field("metadata", &self.metadata)
            .field("selector", &self.selector)
            .field("hints", &self.hints)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

/// Vectors of one class written under one directory.
#[derive(Debug)]
pub struct VectorGroup {
    pub name: String,
    pub class: Class,
    pub items: Vec<VectorGenItem>,
}

impl VectorGroup {
    pub fn message(name: impl Into<String>, items: Vec<VectorGenItem>) -> Self {
        Self {
            name: name.into(),
            class: Class::Message,
            items,
        }
    }

    pub fn tipset(name: impl Into<String>, items: Vec<VectorGenItem>) -> Self {
        Self {
            name: name.into(),
            class: Class::Tipset,
            items,
        }
    }
}
