use mb_pipeline::{CyclePlan, Orchestrator};
use serde::Serialize;
use std::sync::Arc;

/// Which credentials the process was started with. Values are never exposed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Credentials {
    pub newsdata: bool,
    pub openai: bool,
    pub telegram: bool,
    pub channel: bool,
}

pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub credentials: Credentials,
    /// Plan started by `POST /api/run`.
    pub run_plan: CyclePlan,
}
