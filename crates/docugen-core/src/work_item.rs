//! The message shape that crosses the Task Broker.

use serde::{Deserialize, Serialize};

use crate::{JobVariant, ResourceId};

/// Everything a worker needs to start a job, independent of the Job
/// Store. Crosses the broker as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub job_id: ResourceId,
    /// Opaque credential for the source repository, if any.
    pub credential: Option<String>,
    pub variant: JobVariant,
}
