//! Application state.

use std::sync::Arc;

use docugen_config::Config;
use docugen_db::JobRepo;
use docugen_queue::TaskBroker;

/// Shared application state, directly modeled on
/// `buildit_api::state::AppState`'s `Arc<Pg...Repo>` fields: every
/// collaborator the Submitter and the read-only job routes need, each
/// already behind the trait object its crate exposes.
#[derive(Clone)]
pub struct AppState {
    pub job_repo: Arc<dyn JobRepo>,
    pub broker: Arc<dyn TaskBroker>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(job_repo: Arc<dyn JobRepo>, broker: Arc<dyn TaskBroker>, config: Arc<Config>) -> Self {
        Self {
            job_repo,
            broker,
            config,
        }
    }
}
