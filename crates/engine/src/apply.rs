use std::collections::BTreeSet;

use varsync_core::{AggregateId, CoreError, NameAllocator, SiblingNames, Stub, VariationId, VarsyncConfig};
use varsync_storage::VariationStore;

use crate::error::EngineError;
use crate::gate::PermissionGate;
use crate::reconcile::{Plan, Reconciler};

/// A gate-approved plan with every create name already allocated.
#[derive(Debug, Clone)]
pub struct PreparedPlan {
    pub plan: Plan,
    /// Final storage names, parallel to `plan.creates`.
    pub names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    pub aggregate_id: AggregateId,
    /// Every deleted, created and updated identity.
    pub modified: BTreeSet<VariationId>,
}

#[derive(Debug, Clone)]
pub struct TransactionApplier {
    reconciler: Reconciler,
    gate: PermissionGate,
    allocator: NameAllocator,
    fallback_name: String,
}

impl TransactionApplier {
    pub fn new(
        reconciler: Reconciler,
        gate: PermissionGate,
        allocator: NameAllocator,
        fallback_name: impl Into<String>,
    ) -> Self {
        Self {
            reconciler,
            gate,
            allocator,
            fallback_name: fallback_name.into(),
        }
    }

    pub fn from_config(config: &VarsyncConfig) -> Self {
        Self::new(
            Reconciler::new(varsync_core::by_sort_key_then_id, config.default_sort_key),
            PermissionGate::new(config.elevated),
            NameAllocator::new(config.naming.clone()),
            config.fallback_name.clone(),
        )
    }

    /// Plan phase: diff, gate, identity check and name allocation. Never
    /// mutates the store.
    #[tracing::instrument(skip_all, name = "varsync.prepare", fields(aggregate = %aggregate_id.short(), stubs = stubs.len()))]
    pub fn prepare<S>(
        &self,
        store: &S,
        aggregate_id: AggregateId,
        stubs: &[Stub],
    ) -> Result<PreparedPlan, EngineError>
    where
        S: VariationStore + ?Sized,
    {
        let baseline = store.list_records(aggregate_id)?;
        let plan = self
            .reconciler
            .plan(aggregate_id, stubs, &baseline, |item| store.resolve_path(item))?;
        tracing::debug!(
            creates = plan.creates.len(),
            updates = plan.updates.len(),
            deletes = plan.deletes.len(),
            "plan computed"
        );

        let verdict = self.gate.check(store, &plan)?;
        if !verdict.is_approved() {
            return Err(EngineError::PermissionDenied(verdict.denials));
        }

        // A create reuses its stub's id, which may already belong to a record
        // elsewhere in the store.
        for entry in &plan.creates {
            if store.get_record(entry.stub.id)?.is_some() {
                tracing::warn!(variation = %entry.stub.id.short(), "create refused, id already in use");
                return Err(EngineError::IdentityTaken(entry.stub.id.to_string()));
            }
        }

        // Deletes run first, so their names are free for the creates.
        let mut siblings: SiblingNames = baseline
            .iter()
            .filter(|r| !plan.deletes.iter().any(|d| d.id == r.id))
            .map(|r| r.name.as_str())
            .collect();
        let mut names = Vec::with_capacity(plan.creates.len());
        for entry in &plan.creates {
            let name = self
                .allocator
                .allocate(&entry.stub.name, &siblings, &self.fallback_name)
                .map_err(|e| match e {
                    CoreError::InvalidName { proposed } => EngineError::NameRejected { proposed },
                    other => EngineError::Core(other),
                })?;
            siblings.insert(&name);
            names.push(name);
        }

        Ok(PreparedPlan { plan, names })
    }

    /// Apply phase. Store failures part-way through are not rolled back.
    #[tracing::instrument(skip_all, name = "varsync.commit", fields(aggregate = %prepared.plan.aggregate_id.short()))]
    pub fn commit<S>(&self, store: &mut S, prepared: PreparedPlan) -> Result<ApplyReport, EngineError>
    where
        S: VariationStore + ?Sized,
    {
        let PreparedPlan { plan, names } = prepared;
        let aggregate_id = plan.aggregate_id;
        let mut modified = BTreeSet::new();

        for record in &plan.deletes {
            store.delete_record(record.id)?;
            modified.insert(record.id);
        }

        for (entry, name) in plan.creates.iter().zip(&names) {
            let created = store.create_record(
                aggregate_id,
                entry.stub.id,
                name,
                entry.sort_key,
                &entry.stub.fields(),
            )?;
            modified.insert(created.id);
            if entry.stub.is_original {
                store.set_original_ref(aggregate_id, created.id)?;
            }
        }

        for entry in &plan.updates {
            store.update_record(entry.record.id, &entry.stub.fields())?;
            modified.insert(entry.record.id);
            if entry.stub.is_original {
                store.set_original_ref(aggregate_id, entry.record.id)?;
            }
        }

        tracing::info!(modified = modified.len(), "variations applied");
        Ok(ApplyReport {
            aggregate_id,
            modified,
        })
    }

    pub fn apply<S>(
        &self,
        store: &mut S,
        aggregate_id: AggregateId,
        stubs: &[Stub],
    ) -> Result<ApplyReport, EngineError>
    where
        S: VariationStore + ?Sized,
    {
        let prepared = self.prepare(&*store, aggregate_id, stubs)?;
        self.commit(store, prepared)
    }
}
