//! Project lifecycle against `/api/projects`.

use async_trait::async_trait;
use tracing::{info, Instrument};

use super::{
    operation_span, read_outcome, require_identifier, Applied, Engine, Fetched, ReadOutcome,
    Reconciler,
};
use crate::client::ApiRequest;
use crate::error::{Result, Warning};
use crate::model::{ProjectRecord, ProjectSpec, ProjectState, ResourceKind};
use crate::observability::OperationTracker;
use crate::paths;

#[derive(Debug, Clone)]
pub struct ProjectReconciler {
    engine: Engine,
}

impl ProjectReconciler {
    #[must_use]
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    async fn create_inner(&self, desired: &ProjectSpec) -> Result<Applied<ProjectState>> {
        desired.validate()?;
        let body = desired.create_body();
        let (mut record, mut warnings) = self
            .engine
            .submit_create::<ProjectRecord>(ApiRequest::post(paths::projects(), &body)?)
            .await?;

        match self
            .engine
            .fetch_item::<ProjectRecord>(&paths::project(&record.id))
            .await
        {
            Fetched::Found(hydrated) => {
                let id = std::mem::take(&mut record.id);
                record = hydrated;
                if record.id.is_empty() {
                    record.id = id;
                }
            }
            Fetched::NotFound => warnings.push(Warning::new(
                "project hydration skipped",
                format!("GET {} returned 404 right after create", paths::project(&record.id)),
            )),
            Fetched::Unavailable(warning) => warnings.push(warning),
        }

        let state = ProjectState::from_record(&record, desired, &body);
        info!(project.id = %state.id, key = %state.key, "created project");
        Ok(Applied { state, warnings })
    }

    async fn read_inner(&self, current: &ProjectState) -> Result<ReadOutcome<ProjectState>> {
        require_identifier(ResourceKind::Project, &current.id)?;
        let fetched = self
            .engine
            .fetch_item::<ProjectRecord>(&paths::project(&current.id))
            .await;
        Ok(read_outcome(ResourceKind::Project, fetched, |record| Applied {
            state: current.refreshed(&record),
            warnings: Vec::new(),
        }))
    }

    async fn update_inner(
        &self,
        current: &ProjectState,
        desired: &ProjectSpec,
    ) -> Result<Applied<ProjectState>> {
        require_identifier(ResourceKind::Project, &current.id)?;
        desired.validate()?;
        let body = desired.update_body(Some(current));
        let (record, warnings) = self
            .engine
            .submit_update::<ProjectRecord>(ApiRequest::put(paths::project(&current.id), &body)?)
            .await?;

        let mut record = record.unwrap_or_default();
        record.id.clone_from(&current.id);
        let state = ProjectState::from_record(&record, desired, &body);
        info!(project.id = %state.id, "updated project");
        Ok(Applied { state, warnings })
    }

    async fn delete_inner(&self, current: &ProjectState) -> Result<()> {
        require_identifier(ResourceKind::Project, &current.id)?;
        self.engine
            .delete_with_retry(ResourceKind::Project, &paths::project(&current.id))
            .await?;
        info!(project.id = %current.id, "deleted project");
        Ok(())
    }
}

#[async_trait]
impl Reconciler for ProjectReconciler {
    type Spec = ProjectSpec;
    type State = ProjectState;

    const KIND: ResourceKind = ResourceKind::Project;

    async fn create(&self, desired: &ProjectSpec) -> Result<Applied<ProjectState>> {
        let span = operation_span!("brms.project.create", "", "");
        let tracker = OperationTracker::new(span.clone(), Self::KIND, "create");
        tracker.finish(self.create_inner(desired).instrument(span).await)
    }

    async fn read(&self, current: &ProjectState) -> Result<ReadOutcome<ProjectState>> {
        let span = operation_span!("brms.project.read", current.id, current.id);
        let tracker = OperationTracker::new(span.clone(), Self::KIND, "read");
        tracker.finish(self.read_inner(current).instrument(span).await)
    }

    async fn update(
        &self,
        current: &ProjectState,
        desired: &ProjectSpec,
    ) -> Result<Applied<ProjectState>> {
        let span = operation_span!("brms.project.update", current.id, current.id);
        let tracker = OperationTracker::new(span.clone(), Self::KIND, "update");
        tracker.finish(self.update_inner(current, desired).instrument(span).await)
    }

    async fn delete(&self, current: &ProjectState) -> Result<()> {
        let span = operation_span!("brms.project.delete", current.id, current.id);
        let tracker = OperationTracker::new(span.clone(), Self::KIND, "delete");
        tracker.finish(self.delete_inner(current).instrument(span).await)
    }
}
