pub mod apply;
pub mod error;
pub mod gate;
pub mod reconcile;
pub mod session;

pub use apply::{ApplyReport, PreparedPlan, TransactionApplier};
pub use error::EngineError;
pub use gate::{Denial, PermissionGate, Verdict};
pub use reconcile::{CreateEntry, Plan, Reconciler, UpdateEntry};
pub use session::{EditSession, Effective, RenderingSelector};

use varsync_core::{AggregateId, Stub, VarsyncConfig};
use varsync_storage::{Capabilities, VariationStore};

/// Outcome of resetting a session's variations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetReport {
    /// The deleted aggregate, `None` if there was nothing to delete.
    pub removed: Option<AggregateId>,
    /// Scope the caller must clear from its active-test cache.
    pub cache_scope: String,
}

pub struct Engine<S: VariationStore> {
    store: S,
    config: VarsyncConfig,
    applier: TransactionApplier,
}

impl<S: VariationStore> Engine<S> {
    pub fn new(store: S, config: VarsyncConfig) -> Self {
        let applier = TransactionApplier::from_config(&config);
        Self {
            store,
            config,
            applier,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Compute and gate a plan without touching the store.
    pub fn prepare(&self, aggregate_id: AggregateId, stubs: &[Stub]) -> Result<PreparedPlan, EngineError> {
        self.applier.prepare(&self.store, aggregate_id, stubs)
    }

    pub fn apply(&mut self, aggregate_id: AggregateId, stubs: &[Stub]) -> Result<ApplyReport, EngineError> {
        self.applier.apply(&mut self.store, aggregate_id, stubs)
    }

    /// Start editing the variations of `owner_key`, seeded from the store.
    pub fn open_session(
        &self,
        owner_key: &str,
        device_id: &str,
        rendering: RenderingSelector,
    ) -> Result<EditSession, EngineError> {
        let session = EditSession::new(
            owner_key,
            device_id,
            rendering,
            self.config.new_variation_name.clone(),
            self.config.max_variations,
        );
        let Some(aggregate) = self.store.find_aggregate(owner_key)? else {
            return Ok(session);
        };

        let mut records = self.store.list_records(aggregate.id)?;
        records.sort_by(varsync_core::by_sort_key_then_id);
        let stubs = records
            .iter()
            .map(|r| Stub::from_record(r, aggregate.original_ref == Some(r.id)))
            .collect();
        Ok(session.with_stubs(stubs))
    }

    /// Persist a session, creating its aggregate on first commit.
    #[tracing::instrument(skip_all, name = "varsync.session_commit", fields(owner = %session.owner_key))]
    pub fn commit(&mut self, session: &EditSession) -> Result<ApplyReport, EngineError> {
        if !session.can_commit() {
            return Err(EngineError::NotEnoughVariations {
                count: session.len(),
            });
        }
        let (aggregate, fresh) = match self.store.find_aggregate(&session.owner_key)? {
            Some(aggregate) => (aggregate, false),
            None => (self.store.create_aggregate(&session.owner_key)?, true),
        };

        match self.apply(aggregate.id, session.stubs()) {
            // A rejected first commit must not leave an empty aggregate behind.
            Err(e) if fresh && e.is_rejection() => {
                if let Err(cleanup) = self.store.delete_aggregate(aggregate.id) {
                    tracing::warn!("failed to remove empty aggregate {}: {cleanup}", aggregate.id.short());
                }
                Err(e)
            }
            other => other,
        }
    }

    /// Remove every variation of the session's owner.
    pub fn reset(&mut self, session: &EditSession) -> Result<ResetReport, EngineError> {
        let cache_scope = session.owner_key.clone();
        let Some(aggregate) = self.store.find_aggregate(&session.owner_key)? else {
            return Ok(ResetReport {
                removed: None,
                cache_scope,
            });
        };
        if !self.store.can_delete_aggregate(aggregate.id)? {
            return Err(EngineError::PermissionDenied(vec![Denial::AggregateDelete(aggregate.id)]));
        }
        self.store.delete_aggregate(aggregate.id)?;
        tracing::info!(aggregate = %aggregate.id.short(), "variations reset");
        Ok(ResetReport {
            removed: Some(aggregate.id),
            cache_scope,
        })
    }
}
