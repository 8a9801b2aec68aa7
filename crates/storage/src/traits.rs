use varsync_core::{Aggregate, AggregateId, ItemRef, Record, RecordFields, VariationId};

use crate::error::StorageError;

/// Access and lock queries. Answers are advisory; the store enforces them
/// again on every mutation.
pub trait Capabilities {
    /// May a new variation be added under the aggregate?
    fn can_add_child(&self, aggregate_id: AggregateId) -> Result<bool, StorageError>;

    fn can_delete(&self, id: VariationId) -> Result<bool, StorageError>;

    fn can_write(&self, id: VariationId) -> Result<bool, StorageError>;

    /// True when the record is locked by an actor other than the caller.
    fn is_locked(&self, id: VariationId) -> Result<bool, StorageError>;

    fn is_read_only(&self, id: VariationId) -> Result<bool, StorageError>;

    fn can_delete_aggregate(&self, aggregate_id: AggregateId) -> Result<bool, StorageError>;
}

pub trait VariationStore: Capabilities {
    /// Baseline read. Order is unspecified; callers sort.
    fn list_records(&self, aggregate_id: AggregateId) -> Result<Vec<Record>, StorageError>;

    fn get_record(&self, id: VariationId) -> Result<Option<Record>, StorageError>;

    fn create_record(
        &mut self,
        aggregate_id: AggregateId,
        id: VariationId,
        name: &str,
        sort_key: i64,
        fields: &RecordFields,
    ) -> Result<Record, StorageError>;

    fn delete_record(&mut self, id: VariationId) -> Result<(), StorageError>;

    /// Writes the mutable fields; the storage name and sort key are untouched.
    fn update_record(&mut self, id: VariationId, fields: &RecordFields) -> Result<(), StorageError>;

    fn set_original_ref(
        &mut self,
        aggregate_id: AggregateId,
        id: VariationId,
    ) -> Result<(), StorageError>;

    /// Canonical path of a referenced item, `None` if it does not resolve.
    fn resolve_path(&self, item: &ItemRef) -> Result<Option<String>, StorageError>;

    fn get_aggregate(&self, aggregate_id: AggregateId) -> Result<Option<Aggregate>, StorageError>;

    fn find_aggregate(&self, owner_key: &str) -> Result<Option<Aggregate>, StorageError>;

    fn create_aggregate(&mut self, owner_key: &str) -> Result<Aggregate, StorageError>;

    /// Removes the aggregate and every record under it.
    fn delete_aggregate(&mut self, aggregate_id: AggregateId) -> Result<(), StorageError>;
}
