//! Cycle orchestration: fetch, extract, analyze and publish against one
//! [`mb_core::ArticleStore`], with at most one cycle in flight per process.

pub mod config;
pub mod guard;
pub mod orchestrator;
pub mod plan;
pub mod run;
pub mod scheduler;
pub mod timeout;

pub use config::{PipelineConfig, Timeouts, MAX_EXTRACT_CONCURRENCY};
pub use guard::{CycleGuard, CyclePermit};
pub use orchestrator::{Orchestrator, OrchestratorBuilder};
pub use plan::{CyclePlan, Stage};
pub use run::{CycleSummary, RunHistory, RunRecord, RunStatus, RunTrigger, StageError, StageErrorKind};
pub use scheduler::Scheduler;
