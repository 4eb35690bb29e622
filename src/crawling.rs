//! # Crawl engine
//!
//! - `limiter`: bounds in-flight units
//! - `validator`: record acceptance policy
//! - `progress`: processed counts and time estimates
//! - `orchestrator`: batches, shards and checkpoints for one run
//! - `reconciler`: post-run accounting and the rerun set

pub mod limiter;
pub mod orchestrator;
pub mod progress;
pub mod reconciler;
pub mod validator;

pub use limiter::ConcurrencyLimiter;
pub use orchestrator::{BatchOrchestrator, OrchestratorError, RunContext, RunSettings, RunStats, UnitOutcome};
pub use progress::{ProgressSnapshot, ProgressTracker};
pub use reconciler::{ReconcileError, ReconcileReport, reconcile};
pub use validator::{RecordValidator, ValidationReport};
