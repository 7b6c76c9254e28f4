//! Group lifecycle against `/api/projects/{project}/groups`.

use async_trait::async_trait;
use tracing::{info, Instrument};

use super::{
    operation_span, read_outcome, require_identifier, require_same_parent, Applied, Engine,
    Fetched, ReadOutcome, Reconciler,
};
use crate::client::ApiRequest;
use crate::error::{Result, Warning};
use crate::model::{GroupRecord, GroupSpec, GroupState, ResourceKind};
use crate::observability::OperationTracker;
use crate::paths;

#[derive(Debug, Clone)]
pub struct GroupReconciler {
    engine: Engine,
}

impl GroupReconciler {
    #[must_use]
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    async fn create_inner(&self, desired: &GroupSpec) -> Result<Applied<GroupState>> {
        desired.validate()?;
        let (mut record, mut warnings) = self
            .engine
            .submit_create::<GroupRecord>(ApiRequest::post(
                paths::groups(&desired.project_id),
                &desired.body(),
            )?)
            .await?;

        let item = paths::group(&desired.project_id, &record.id);
        match self.engine.fetch_item::<GroupRecord>(&item).await {
            Fetched::Found(mut hydrated) => {
                if hydrated.id.is_empty() {
                    hydrated.id = std::mem::take(&mut record.id);
                }
                record = hydrated;
            }
            Fetched::NotFound => warnings.push(Warning::new(
                "group hydration skipped",
                format!("GET {item} returned 404 right after create"),
            )),
            Fetched::Unavailable(warning) => warnings.push(warning),
        }

        let state = GroupState::from_record(&record, desired);
        info!(project.id = %state.project_id, group.id = %state.id, "created group");
        Ok(Applied { state, warnings })
    }

    async fn read_inner(&self, current: &GroupState) -> Result<ReadOutcome<GroupState>> {
        require_identifier(ResourceKind::Group, &current.id)?;
        let fetched = self
            .engine
            .fetch_item::<GroupRecord>(&paths::group(&current.project_id, &current.id))
            .await;
        Ok(read_outcome(ResourceKind::Group, fetched, |record| Applied {
            state: current.refreshed(&record),
            warnings: Vec::new(),
        }))
    }

    async fn update_inner(
        &self,
        current: &GroupState,
        desired: &GroupSpec,
    ) -> Result<Applied<GroupState>> {
        require_identifier(ResourceKind::Group, &current.id)?;
        require_same_parent(ResourceKind::Group, &current.project_id, &desired.project_id)?;
        desired.validate()?;
        let (record, warnings) = self
            .engine
            .submit_update::<GroupRecord>(ApiRequest::put(
                paths::group(&current.project_id, &current.id),
                &desired.body(),
            )?)
            .await?;

        let mut record = record.unwrap_or_default();
        record.id.clone_from(&current.id);
        let state = GroupState::from_record(&record, desired);
        info!(project.id = %state.project_id, group.id = %state.id, "updated group");
        Ok(Applied { state, warnings })
    }

    async fn delete_inner(&self, current: &GroupState) -> Result<()> {
        require_identifier(ResourceKind::Group, &current.id)?;
        self.engine
            .delete_with_retry(
                ResourceKind::Group,
                &paths::group(&current.project_id, &current.id),
            )
            .await?;
        info!(project.id = %current.project_id, group.id = %current.id, "deleted group");
        Ok(())
    }
}

#[async_trait]
impl Reconciler for GroupReconciler {
    type Spec = GroupSpec;
    type State = GroupState;

    const KIND: ResourceKind = ResourceKind::Group;

    async fn create(&self, desired: &GroupSpec) -> Result<Applied<GroupState>> {
        let span = operation_span!("brms.group.create", desired.project_id, "");
        let tracker = OperationTracker::new(span.clone(), Self::KIND, "create");
        tracker.finish(self.create_inner(desired).instrument(span).await)
    }

    async fn read(&self, current: &GroupState) -> Result<ReadOutcome<GroupState>> {
        let span = operation_span!("brms.group.read", current.project_id, current.id);
        let tracker = OperationTracker::new(span.clone(), Self::KIND, "read");
        tracker.finish(self.read_inner(current).instrument(span).await)
    }

    async fn update(&self, current: &GroupState, desired: &GroupSpec) -> Result<Applied<GroupState>> {
        let span = operation_span!("brms.group.update", current.project_id, current.id);
        let tracker = OperationTracker::new(span.clone(), Self::KIND, "update");
        tracker.finish(self.update_inner(current, desired).instrument(span).await)
    }

    async fn delete(&self, current: &GroupState) -> Result<()> {
        let span = operation_span!("brms.group.delete", current.project_id, current.id);
        let tracker = OperationTracker::new(span.clone(), Self::KIND, "delete");
        tracker.finish(self.delete_inner(current).instrument(span).await)
    }
}
