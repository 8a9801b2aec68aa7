use varsync_core::{AggregateId, RecordFields, Stub, VariationId, VarsyncConfig};
use varsync_engine::Engine;
use varsync_storage::{SqliteStore, StorageError, VariationStore};

/// One actor editing variations through a SQLite-backed engine.
pub struct TestPeer {
    pub engine: Engine<SqliteStore>,
}

impl TestPeer {
    pub fn new(actor: &str) -> Result<Self, StorageError> {
        Self::with_config(SqliteStore::open_in_memory(actor)?, VarsyncConfig::default())
    }

    pub fn open(path: &str, actor: &str) -> Result<Self, StorageError> {
        Self::with_config(SqliteStore::open(path, actor)?, VarsyncConfig::default())
    }

    pub fn with_config(store: SqliteStore, config: VarsyncConfig) -> Result<Self, StorageError> {
        Ok(Self {
            engine: Engine::new(store, config),
        })
    }

    pub fn actor(&self) -> &str {
        self.engine.store().actor()
    }

    /// Create an aggregate for `owner_key` holding `(name, sort_key)` records.
    pub fn seed(
        &mut self,
        owner_key: &str,
        records: &[(&str, i64)],
    ) -> Result<(AggregateId, Vec<VariationId>), StorageError> {
        let store = self.engine.store_mut();
        let aggregate = store.create_aggregate(owner_key)?;
        let mut ids = Vec::new();
        for (name, sort_key) in records {
            let fields = RecordFields {
                display_name: name.to_string(),
                datasource: None,
                replacement: None,
                hide_component: false,
            };
            let record = store.create_record(aggregate.id, VariationId::new(), name, *sort_key, &fields)?;
            ids.push(record.id);
        }
        Ok((aggregate.id, ids))
    }

    /// Current records of an aggregate as stubs, in display order.
    pub fn stubs(&self, aggregate_id: AggregateId) -> Result<Vec<Stub>, StorageError> {
        let store = self.engine.store();
        let original = store.get_aggregate(aggregate_id)?.and_then(|a| a.original_ref);
        let mut records = store.list_records(aggregate_id)?;
        records.sort_by(varsync_core::by_sort_key_then_id);
        Ok(records
            .iter()
            .map(|r| Stub::from_record(r, original == Some(r.id)))
            .collect())
    }
}
