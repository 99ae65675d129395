use crate::api::{ApiClient, TaskAction};
use crate::cache::QueryCache;
use crate::error::ApiError;
use crate::models::CheckResult;
use crate::queries::{DASHBOARD, TASKS};

/// Check-in / check-out. Nothing is updated locally: a success invalidates
/// every task list and every dashboard aggregate so the screen only ever
/// shows what the backend confirmed.
#[derive(Clone)]
pub struct TaskActions {
    api: ApiClient,
    cache: QueryCache,
}

impl TaskActions {
    pub fn new(api: ApiClient, cache: QueryCache) -> Self {
        TaskActions { api, cache }
    }

    pub async fn run(&self, id: u64, action: TaskAction) -> Result<CheckResult, ApiError> {
        match self.api.patch_task(id, action).await {
            Ok(result) => {
                tracing::info!(task = id, action = action.path_segment(), "task action applied");
                self.cache.invalidate_group(TASKS);
                self.cache.invalidate_group(DASHBOARD);
                Ok(result)
            }
            Err(err) => {
                tracing::warn!(task = id, action = action.path_segment(), error = %err, "task action failed");
                Err(err)
            }
        }
    }
}
