//! Destinations for finished vectors.
//!
//! | Sink | Writes |
//! |------|--------|
//! | [`FsSink`] | `<root>/<group>/<id>.json` |
//! | [`MemorySink`] | an in-process map keyed by `(group, id)` |
//!
//! Groups are `/`-separated segments and ids a single segment; neither may
//! climb out of the root (see [`check_group`], [`check_id`]).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tvx_schema::TestVector;

use crate::error::{GenError, GenResult};

fn check_segment(what: &'static str, name: &str, segment: &str) -> GenResult<()> {
    let invalid = |reason| {
        Err(GenError::InvalidName {
            what,
            name: name.to_string(),
            reason,
        })
    };
    if segment.is_empty() {
        return invalid("empty path segment");
    }
    if segment == "." || segment == ".." {
        return invalid("relative path segment");
    }
    if segment.contains(['\\', '\0', ':']) {
        return invalid("reserved character");
    }
    Ok(())
}

/// Accepts `suite/group` style names made of plain segments.
pub fn check_group(group: &str) -> GenResult<()> {
    group
        .split('/')
        .try_for_each(|segment| check_segment("group", group, segment))
}

/// Accepts a single plain segment; an empty id is [`GenError::MissingId`].
pub fn check_id(group: &str, id: &str) -> GenResult<()> {
    if id.is_empty() {
        return Err(GenError::MissingId {
            group: group.to_string(),
        });
    }
    if id.contains('/') {
        return Err(GenError::InvalidName {
            what: "id",
            name: id.to_string(),
            reason: "path separator",
        });
    }
    check_segment("id", id, id)
}

/// Receives every vector the harness emits. Called from worker threads.
pub trait VectorSink: Send + Sync {
    fn write(&self, group: &str, vector: &TestVector) -> GenResult<()>;
}

#[derive(Debug, Clone)]
pub struct FsSink {
    root: PathBuf,
    pretty: bool,
}

impl FsSink {
    pub fn new(root: impl Into<PathBuf>, pretty: bool) -> Self {
        Self {
            root: root.into(),
            pretty,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File a vector with `id` in `group` is written to. Always below
    /// [`root`](Self::root).
    pub fn path_for(&self, group: &str, id: &str) -> GenResult<PathBuf> {
        check_group(group)?;
        check_id(group, id)?;
        let mut path = self.root.clone();
        path.extend(group.split('/'));
        path.push(format!("{id}.json"));
        Ok(path)
    }
}

impl VectorSink for FsSink {
    fn write(&self, group: &str, vector: &TestVector) -> GenResult<()> {
        let path = self.path_for(group, vector.id())?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| GenError::io(dir, e))?;
        }
        let json = if self.pretty {
            vector.to_json_pretty()?
        } else {
            vector.to_json()?
        };
        fs::write(&path, json).map_err(|e| GenError::io(&path, e))
    }
}

#[derive(Debug, Default)]
pub struct MemorySink {
    vectors: Mutex<BTreeMap<(String, String), TestVector>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.vectors.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.lock().is_empty()
    }

    pub fn get(&self, group: &str, id: &str) -> Option<TestVector> {
        self.vectors
            .lock()
            .get(&(group.to_string(), id.to_string()))
            .cloned()
    }

    /// Drains every stored vector in `(group, id)` order.
    pub fn take(&self) -> Vec<(String, TestVector)> {
        std::mem::take(&mut *self.vectors.lock())
            .into_iter()
            .map(|((group, _), v)| (group, v))
            .collect()
    }
}

impl VectorSink for MemorySink {
    fn write(&self, group: &str, vector: &TestVector) -> GenResult<()> {
        let id = vector.id();
        check_group(group)?;
        check_id(group, id)?;
        let key = (group.to_string(), id.to_string());
        let mut vectors = self.vectors.lock();
        if vectors.contains_key(&key) {
            return Err(GenError::DuplicateId {
                group: key.0,
                id: key.1,
            });
        }
        vectors.insert(key, vector.clone());
        Ok(())
    }
}
