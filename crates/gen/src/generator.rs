//! # Generator Harness
//!
//! Fans vector definitions out to a pool of worker threads, finishes each
//! builder, and hands the record to a [`VectorSink`].
//!
//! ```text
//!  message_vector_group ─┐                       ┌─► worker 0 ─┐
//!  tipset_vector_group  ─┼─► mpsc job queue ─────┼─► worker 1 ─┼─► sink.write(group, vector)
//!                        │   (pending += 1)      └─► worker N ─┘   outcomes.push(..)
//!                        │                                         pending -= 1
//!  wait() ◄──────────────┴──────────── Condvar: pending == 0
//! ```
//!
//! A group is accepted whole or not at all: every id must be a valid path
//! segment and unique within its group across all submissions, so no
//! vector can overwrite another in the sink.
//!
//! Every submitted job ends in exactly one [`JobStatus`]. With `fail_fast`,
//! jobs still queued after the first failure are reported as cancelled
//! rather than run.

use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info};
use tvx_builders::{Builder, VectorOptions};
use tvx_schema::{Class, GenerationData};

use crate::config::GeneratorConfig;
use crate::error::{GenError, GenResult};
use crate::item::{VectorGenItem, VectorGroup};
use crate::sink::{check_group, check_id, VectorSink};

// ════════════════════════════════════════════════════════════════════════════════
// OUTCOMES
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Succeeded,
    Failed(String),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub group: String,
    pub id: String,
    pub status: JobStatus,
}

/// Tally of every job submitted to a generator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationReport {
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub outcomes: Vec<JobOutcome>,
}

impl GenerationReport {
    fn from_outcomes(mut outcomes: Vec<JobOutcome>) -> Self {
        outcomes.sort_by(|a, b| (&a.group, &a.id).cmp(&(&b.group, &b.id)));
        let mut report = GenerationReport::default();
        for o in &outcomes {
            match o.status {
                JobStatus::Succeeded => report.succeeded += 1,
                JobStatus::Failed(_) => report.failed += 1,
                JobStatus::Cancelled => report.cancelled += 1,
            }
        }
        report.outcomes = outcomes;
        report
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.cancelled
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.cancelled == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &JobOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, JobStatus::Failed(_)))
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// COMPLETION BARRIER
// ════════════════════════════════════════════════════════════════════════════════

/// Count of submitted jobs that have not reported back.
#[derive(Debug, Default)]
struct Pending {
    count: Mutex<usize>,
    idle: Condvar,
}

impl Pending {
    fn add(&self) {
        *self.count.lock() += 1;
    }

    fn done(&self) {
        let mut count = self.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }

    fn wait(&self) {
        let mut count = self.count.lock();
        while *count > 0 {
            self.idle.wait(&mut count);
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// GENERATOR
// ════════════════════════════════════════════════════════════════════════════════

struct Job {
    group: String,
    class: Class,
    item: VectorGenItem,
}

/// State shared by the submitting thread and every worker.
struct Shared {
    config: GeneratorConfig,
    sink: Arc<dyn VectorSink>,
    pending: Pending,
    outcomes: Mutex<Vec<JobOutcome>>,
    cancelled: AtomicBool,
}

pub struct Generator {
    shared: Arc<Shared>,
    sender: Option<mpsc::Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    /// `(group, id)` of every accepted job.
    ids: Mutex<BTreeSet<(String, String)>>,
}

impl Generator {
    pub fn new(config: GeneratorConfig, sink: Arc<dyn VectorSink>) -> Self {
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));
        let n = config.workers();
        let shared = Arc::new(Shared {
            config,
            sink,
            pending: Pending::default(),
            outcomes: Mutex::new(Vec::new()),
            cancelled: AtomicBool::new(false),
        });

        let workers = (0..n)
            .map(|i| {
                let shared = Arc::clone(&shared);
                let receiver = Arc::clone(&receiver);
                thread::Builder::new()
                    .name(format!("tvx-gen-{i}"))
                    .spawn(move || worker_loop(&shared, &receiver))
            })
            .filter_map(|spawned| match spawned {
                Ok(handle) => Some(handle),
                Err(e) => {
                    error!(error = %e, "failed to spawn generator worker");
                    None
                }
            })
            .collect::<Vec<_>>();
        debug!(workers = workers.len(), "generator started");

        Self {
            shared,
            sender: (!workers.is_empty()).then_some(sender),
            workers,
            ids: Mutex::new(BTreeSet::new()),
        }
    }

    /// Enqueues a group of message-class vectors.
    pub fn message_vector_group(
        &self,
        group: impl Into<String>,
        items: Vec<VectorGenItem>,
    ) -> GenResult<()> {
        self.submit(VectorGroup::message(group, items))
    }

    /// Enqueues a group of tipset-class vectors.
    pub fn tipset_vector_group(
        &self,
        group: impl Into<String>,
        items: Vec<VectorGenItem>,
    ) -> GenResult<()> {
        self.submit(VectorGroup::tipset(group, items))
    }

    /// Enqueues every item of `group`. Nothing is enqueued when the group
    /// name, any id, or any `(group, id)` pair seen before is rejected.
    pub fn submit(&self, group: VectorGroup) -> GenResult<()> {
        let sender = self.sender.as_ref().ok_or(GenError::Closed)?;
        check_group(&group.name)?;
        {
            let mut ids = self.ids.lock();
            let mut fresh = BTreeSet::new();
            for item in &group.items {
                let id = item.id();
                check_id(&group.name, id)?;
                let key = (group.name.clone(), id.to_string());
                if ids.contains(&key) || !fresh.insert(key) {
                    return Err(GenError::DuplicateId {
                        group: group.name.clone(),
                        id: id.to_string(),
                    });
                }
            }
            ids.append(&mut fresh);
        }

        for item in group.items {
            self.shared.pending.add();
            let job = Job {
                group: group.name.clone(),
                class: group.class,
                item,
            };
            if sender.send(job).is_err() {
                self.shared.pending.done();
                return Err(GenError::Closed);
            }
        }
        Ok(())
    }

    /// Blocks until every job submitted so far has reported back.
    pub fn wait(&self) {
        self.shared.pending.wait();
    }

    /// Waits for outstanding jobs, stops the workers and returns the tally.
    pub fn finish(mut self) -> GenerationReport {
        self.wait();
        self.shutdown();
        let outcomes = std::mem::take(&mut *self.shared.outcomes.lock());
        let report = GenerationReport::from_outcomes(outcomes);
        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            cancelled = report.cancelled,
            "generation finished"
        );
        report
    }

    fn shutdown(&mut self) {
        self.sender = None;
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("generator worker panicked");
            }
        }
    }
}

impl Drop for Generator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(shared: &Shared, receiver: &Mutex<mpsc::Receiver<Job>>) {
    loop {
        let job = receiver.lock().recv();
        let Ok(job) = job else {
            return;
        };
        let id = job.item.id().to_string();

        let status = if shared.cancelled.load(Ordering::Acquire) {
            JobStatus::Cancelled
        } else {
            match panic::catch_unwind(AssertUnwindSafe(|| run_job(shared, &job))) {
                Ok(Ok(())) => JobStatus::Succeeded,
                Ok(Err(e)) => JobStatus::Failed(e.to_string()),
                Err(_) => JobStatus::Failed("vector definition panicked".to_string()),
            }
        };

        match &status {
            JobStatus::Succeeded => info!(group = %job.group, %id, "vector generated"),
            JobStatus::Failed(reason) => {
                error!(group = %job.group, %id, %reason, "vector generation failed");
                if shared.config.fail_fast {
                    shared.cancelled.store(true, Ordering::Release);
                }
            }
            JobStatus::Cancelled => debug!(group = %job.group, %id, "vector cancelled"),
        }

        shared.outcomes.lock().push(JobOutcome {
            group: job.group,
            id,
            status,
        });
        shared.pending.done();
    }
}

fn run_job(shared: &Shared, job: &Job) -> GenResult<()> {
    let item = &job.item;
    let mut meta = item.metadata.clone();
    meta.gen.push(GenerationData {
        source: Some(shared.config.source.clone()),
        version: Some(shared.config.version.clone()),
    });
    let options = VectorOptions {
        selector: item.selector.clone(),
        hints: item.hints.clone(),
        mode: item.mode,
    };

    let mut builder = Builder::new(job.class, meta, options)?;
    (item.func)(&mut builder)?;
    let vector = builder.finish()?;
    shared.sink.write(&job.group, &vector)
}
