//! Environment lifecycle against `/api/projects/{project}/environments`.
//!
//! The backend exposes no item GET for environments, so reads and post-create
//! hydration locate the record in the project's environment listing. Absence from
//! that listing never counts as removal.
//!
//! Approval groups are declared by name, sent as identifiers, and tracked by name
//! again. When names cannot be recovered (group listing unavailable) the desired or
//! previously tracked names are kept and a warning is reported.

use async_trait::async_trait;
use std::collections::BTreeSet;
use tracing::{info, warn, Instrument};

use super::{
    operation_span, preserved, require_identifier, require_same_parent, Applied, Engine,
    ReadOutcome, Reconciler,
};
use crate::client::ApiRequest;
use crate::error::{Result, Warning};
use crate::model::{EnvironmentRecord, EnvironmentSpec, EnvironmentState, ResourceKind};
use crate::observability::OperationTracker;
use crate::paths;

#[derive(Debug, Clone)]
pub struct EnvironmentReconciler {
    engine: Engine,
}

impl EnvironmentReconciler {
    #[must_use]
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    /// Group names for `ids`, or `fallback` with a warning when the listing fails
    async fn names_or(
        &self,
        ids: &BTreeSet<String>,
        project_id: &str,
        fallback: &BTreeSet<String>,
        warnings: &mut Vec<Warning>,
    ) -> BTreeSet<String> {
        match self.engine.resolver().unresolve(ids, project_id).await {
            Ok(names) => names,
            Err(e) => {
                warn!(project.id = project_id, error = %e, "could not map approval group ids to names");
                warnings.push(Warning::new(
                    "could not resolve approval group names",
                    format!("{e}; keeping the configured names"),
                ));
                fallback.clone()
            }
        }
    }

    async fn create_inner(&self, desired: &EnvironmentSpec) -> Result<Applied<EnvironmentState>> {
        desired.validate()?;
        let names = desired.approval_group_names();
        let group_ids = self
            .engine
            .resolver()
            .resolve(&names, &desired.project_id)
            .await?;

        let (mut record, mut warnings) = self
            .engine
            .submit_create::<EnvironmentRecord>(ApiRequest::post(
                paths::environments(&desired.project_id),
                &desired.body(&group_ids),
            )?)
            .await?;

        match self
            .engine
            .find_in_listing::<EnvironmentRecord>(
                &paths::environments(&desired.project_id),
                &record.id,
            )
            .await
        {
            Ok(hydrated) => record = hydrated,
            Err(warning) => warnings.push(warning),
        }

        let group_names = self
            .names_or(
                &record.approval_group_ids,
                &desired.project_id,
                &names,
                &mut warnings,
            )
            .await;
        let state = EnvironmentState::from_record(&record, desired, group_names);
        info!(project.id = %state.project_id, environment.id = %state.id, key = %state.key, "created environment");
        Ok(Applied { state, warnings })
    }

    async fn read_inner(
        &self,
        current: &EnvironmentState,
    ) -> Result<ReadOutcome<EnvironmentState>> {
        require_identifier(ResourceKind::Environment, &current.id)?;
        let fetched = self
            .engine
            .find_in_listing::<EnvironmentRecord>(
                &paths::environments(&current.project_id),
                &current.id,
            )
            .await;

        let record = match fetched {
            Ok(record) => record,
            Err(warning) => return Ok(preserved(ResourceKind::Environment, warning)),
        };

        let mut warnings = Vec::new();
        let group_names = self
            .names_or(
                &record.approval_group_ids,
                &current.project_id,
                &current.approval_groups,
                &mut warnings,
            )
            .await;
        Ok(ReadOutcome::Refreshed(Applied {
            state: current.refreshed(&record, group_names),
            warnings,
        }))
    }

    async fn update_inner(
        &self,
        current: &EnvironmentState,
        desired: &EnvironmentSpec,
    ) -> Result<Applied<EnvironmentState>> {
        require_identifier(ResourceKind::Environment, &current.id)?;
        require_same_parent(
            ResourceKind::Environment,
            &current.project_id,
            &desired.project_id,
        )?;
        desired.validate()?;
        let names = desired.approval_group_names();
        let group_ids = self
            .engine
            .resolver()
            .resolve(&names, &desired.project_id)
            .await?;

        let (record, mut warnings) = self
            .engine
            .submit_update::<EnvironmentRecord>(ApiRequest::put(
                paths::environment(&current.project_id, &current.id),
                &desired.body(&group_ids),
            )?)
            .await?;

        let mut record = record.unwrap_or_else(|| EnvironmentRecord {
            approval_group_ids: group_ids.clone(),
            ..EnvironmentRecord::default()
        });
        record.id.clone_from(&current.id);

        let group_names = self
            .names_or(
                &record.approval_group_ids,
                &current.project_id,
                &names,
                &mut warnings,
            )
            .await;
        let state = EnvironmentState::from_record(&record, desired, group_names);
        info!(project.id = %state.project_id, environment.id = %state.id, "updated environment");
        Ok(Applied { state, warnings })
    }

    async fn delete_inner(&self, current: &EnvironmentState) -> Result<()> {
        require_identifier(ResourceKind::Environment, &current.id)?;
        self.engine
            .delete_with_retry(
                ResourceKind::Environment,
                &paths::environment(&current.project_id, &current.id),
            )
            .await?;
        info!(project.id = %current.project_id, environment.id = %current.id, "deleted environment");
        Ok(())
    }
}

#[async_trait]
impl Reconciler for EnvironmentReconciler {
    type Spec = EnvironmentSpec;
    type State = EnvironmentState;

    const KIND: ResourceKind = ResourceKind::Environment;

    async fn create(&self, desired: &EnvironmentSpec) -> Result<Applied<EnvironmentState>> {
        let span = operation_span!("brms.environment.create", desired.project_id, "");
        let tracker = OperationTracker::new(span.clone(), Self::KIND, "create");
        tracker.finish(self.create_inner(desired).instrument(span).await)
    }

    async fn read(&self, current: &EnvironmentState) -> Result<ReadOutcome<EnvironmentState>> {
        let span = operation_span!("brms.environment.read", current.project_id, current.id);
        let tracker = OperationTracker::new(span.clone(), Self::KIND, "read");
        tracker.finish(self.read_inner(current).instrument(span).await)
    }

    async fn update(
        &self,
        current: &EnvironmentState,
        desired: &EnvironmentSpec,
    ) -> Result<Applied<EnvironmentState>> {
        let span = operation_span!("brms.environment.update", current.project_id, current.id);
        let tracker = OperationTracker::new(span.clone(), Self::KIND, "update");
        tracker.finish(self.update_inner(current, desired).instrument(span).await)
    }

    async fn delete(&self, current: &EnvironmentState) -> Result<()> {
        let span = operation_span!("brms.environment.delete", current.project_id, current.id);
        let tracker = OperationTracker::new(span.clone(), Self::KIND, "delete");
        tracker.finish(self.delete_inner(current).instrument(span).await)
    }
}
