//! # tvx-gen: Vector Generation Harness
//!
//! Turns declarative vector definitions into a corpus of test-vector JSON
//! files, and replays such files against the reference VM.
//!
//! ```text
//!  suites::all() ──► Generator ──► worker pool ──► Builder ──► VectorSink
//!                                                               │
//!                         <output_dir>/<suite>/<group>/<id>.json ◄┘
//!
//!  *.json ──► Driver::check ──► Passed | Skipped | Failed | NegatedAsExpected
//! ```
//!
//! ## Modules
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`config`] | `GeneratorConfig`, TOML loading |
//! | [`item`] | `VectorGenItem`, `VectorGroup` |
//! | [`generator`] | Worker pool, completion barrier, `GenerationReport` |
//! | [`sink`] | Filesystem and in-memory vector sinks |
//! | [`suites`] | The vector definitions shipped with the harness |
//! | [`driver`] | Replays vectors and reports conformance verdicts |
//! | [`error`] | `GenError` |

pub mod config;
pub mod driver;
pub mod error;
pub mod generator;
pub mod item;
pub mod sink;
pub mod suites;

pub use config::{load_from_file, GeneratorConfig, DEFAULT_SOURCE};
pub use driver::{ConformanceFailure, Driver, DriverReport, Verdict};
pub use error::{GenError, GenResult};
pub use generator::{GenerationReport, Generator, JobOutcome, JobStatus};
pub use item::{VectorFn, VectorGenItem, VectorGroup};
pub use sink::{check_group, check_id, FsSink, MemorySink, VectorSink};
pub use suites::Suite;
