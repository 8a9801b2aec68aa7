use std::collections::{BTreeMap, HashMap};

use varsync_core::{Aggregate, AggregateId, ItemRef, Record, RecordFields, VariationId};
use varsync_storage::{Capabilities, StorageError, VariationStore};

/// Per-record access flags in the fake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access {
    pub can_write: bool,
    pub can_delete: bool,
    pub read_only: bool,
    pub locked_by_other: bool,
}

impl Default for Access {
    fn default() -> Self {
        Self {
            can_write: true,
            can_delete: true,
            read_only: false,
            locked_by_other: false,
        }
    }
}

/// Every mutating call the fake has served, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    CreateAggregate(AggregateId),
    DeleteAggregate(AggregateId),
    Create(VariationId),
    Delete(VariationId),
    Update(VariationId),
    SetOriginal(AggregateId, VariationId),
}

#[derive(Debug, Clone)]
struct FakeAggregate {
    aggregate: Aggregate,
    can_add: bool,
    can_delete: bool,
}

/// In-memory store with switchable capabilities and a mutation log.
#[derive(Debug, Clone, Default)]
pub struct FakeStore {
    aggregates: BTreeMap<AggregateId, FakeAggregate>,
    records: BTreeMap<VariationId, (Record, Access)>,
    paths: HashMap<String, String>,
    pub mutations: Vec<Mutation>,
    /// Lets updates through records locked by other actors.
    pub elevated: bool,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an aggregate without logging a mutation.
    pub fn seed_aggregate(&mut self, owner_key: &str) -> AggregateId {
        let id = AggregateId::new();
        self.aggregates.insert(
            id,
            FakeAggregate {
                aggregate: Aggregate {
                    id,
                    owner_key: owner_key.to_string(),
                    original_ref: None,
                },
                can_add: true,
                can_delete: true,
            },
        );
        id
    }

    /// Seed a record whose storage and display names match.
    pub fn seed_record(&mut self, aggregate_id: AggregateId, name: &str, sort_key: i64) -> Record {
        let record = Record {
            id: VariationId::new(),
            aggregate_id,
            name: name.to_string(),
            display_name: name.to_string(),
            datasource: None,
            replacement: None,
            hide_component: false,
            sort_key,
        };
        self.records.insert(record.id, (record.clone(), Access::default()));
        record
    }

    pub fn set_access(&mut self, id: VariationId, access: Access) {
        if let Some((_, current)) = self.records.get_mut(&id) {
            *current = access;
        }
    }

    pub fn set_can_add(&mut self, aggregate_id: AggregateId, can_add: bool) {
        if let Some(aggregate) = self.aggregates.get_mut(&aggregate_id) {
            aggregate.can_add = can_add;
        }
    }

    pub fn set_can_delete_aggregate(&mut self, aggregate_id: AggregateId, can_delete: bool) {
        if let Some(aggregate) = self.aggregates.get_mut(&aggregate_id) {
            aggregate.can_delete = can_delete;
        }
    }

    pub fn register_path(&mut self, item_id: &str, path: &str) {
        self.paths.insert(item_id.to_string(), path.to_string());
    }

    /// Records of an aggregate in ascending sort-key order.
    pub fn snapshot(&self, aggregate_id: AggregateId) -> Vec<Record> {
        let mut records: Vec<Record> = self
            .records
            .values()
            .filter(|(r, _)| r.aggregate_id == aggregate_id)
            .map(|(r, _)| r.clone())
            .collect();
        records.sort_by(varsync_core::by_sort_key_then_id);
        records
    }

    pub fn original_ref(&self, aggregate_id: AggregateId) -> Option<VariationId> {
        self.aggregates
            .get(&aggregate_id)
            .and_then(|a| a.aggregate.original_ref)
    }

    fn access(&self, id: VariationId) -> Result<Access, StorageError> {
        self.records
            .get(&id)
            .map(|(_, access)| *access)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    fn aggregate(&self, aggregate_id: AggregateId) -> Result<&FakeAggregate, StorageError> {
        self.aggregates
            .get(&aggregate_id)
            .ok_or_else(|| StorageError::NotFound(aggregate_id.to_string()))
    }
}

impl Capabilities for FakeStore {
    fn can_add_child(&self, aggregate_id: AggregateId) -> Result<bool, StorageError> {
        Ok(self.aggregate(aggregate_id)?.can_add)
    }

    fn can_delete(&self, id: VariationId) -> Result<bool, StorageError> {
        Ok(self.access(id)?.can_delete)
    }

    fn can_write(&self, id: VariationId) -> Result<bool, StorageError> {
        Ok(self.access(id)?.can_write)
    }

    fn is_locked(&self, id: VariationId) -> Result<bool, StorageError> {
        Ok(self.access(id)?.locked_by_other)
    }

    fn is_read_only(&self, id: VariationId) -> Result<bool, StorageError> {
        Ok(self.access(id)?.read_only)
    }

    fn can_delete_aggregate(&self, aggregate_id: AggregateId) -> Result<bool, StorageError> {
        Ok(self.aggregate(aggregate_id)?.can_delete)
    }
}

impl VariationStore for FakeStore {
    fn list_records(&self, aggregate_id: AggregateId) -> Result<Vec<Record>, StorageError> {
        self.aggregate(aggregate_id)?;
        // Descending on purpose; the engine imposes its own order.
        let mut records = self.snapshot(aggregate_id);
        records.reverse();
        Ok(records)
    }

    fn get_record(&self, id: VariationId) -> Result<Option<Record>, StorageError> {
        Ok(self.records.get(&id).map(|(r, _)| r.clone()))
    }

    fn create_record(
        &mut self,
        aggregate_id: AggregateId,
        id: VariationId,
        name: &str,
        sort_key: i64,
        fields: &RecordFields,
    ) -> Result<Record, StorageError> {
        if !self.can_add_child(aggregate_id)? {
            return Err(StorageError::PermissionDenied(aggregate_id.to_string()));
        }
        if self.records.contains_key(&id) {
            return Err(StorageError::IdConflict(id.to_string()));
        }
        let taken = self
            .records
            .values()
            .any(|(r, _)| r.aggregate_id == aggregate_id && r.name.eq_ignore_ascii_case(name));
        if taken {
            return Err(StorageError::NameConflict {
                aggregate_id: aggregate_id.to_string(),
                name: name.to_string(),
            });
        }

        let record = Record {
            id,
            aggregate_id,
            name: name.to_string(),
            display_name: fields.display_name.clone(),
            datasource: fields.datasource.clone(),
            replacement: fields.replacement.clone(),
            hide_component: fields.hide_component,
            sort_key,
        };
        self.records.insert(id, (record.clone(), Access::default()));
        self.mutations.push(Mutation::Create(id));
        Ok(record)
    }

    fn delete_record(&mut self, id: VariationId) -> Result<(), StorageError> {
        if !self.can_delete(id)? {
            return Err(StorageError::PermissionDenied(id.to_string()));
        }
        self.records.remove(&id);
        self.mutations.push(Mutation::Delete(id));
        Ok(())
    }

    fn update_record(&mut self, id: VariationId, fields: &RecordFields) -> Result<(), StorageError> {
        let access = self.access(id)?;
        if access.locked_by_other && !self.elevated {
            return Err(StorageError::Locked(id.to_string()));
        }
        if !access.can_write || access.read_only {
            return Err(StorageError::PermissionDenied(id.to_string()));
        }
        if let Some((record, _)) = self.records.get_mut(&id) {
            record.display_name = fields.display_name.clone();
            record.datasource = fields.datasource.clone();
            record.replacement = fields.replacement.clone();
            record.hide_component = fields.hide_component;
        }
        self.mutations.push(Mutation::Update(id));
        Ok(())
    }

    fn set_original_ref(
        &mut self,
        aggregate_id: AggregateId,
        id: VariationId,
    ) -> Result<(), StorageError> {
        let aggregate = self
            .aggregates
            .get_mut(&aggregate_id)
            .ok_or_else(|| StorageError::NotFound(aggregate_id.to_string()))?;
        aggregate.aggregate.original_ref = Some(id);
        self.mutations.push(Mutation::SetOriginal(aggregate_id, id));
        Ok(())
    }

    fn resolve_path(&self, item: &ItemRef) -> Result<Option<String>, StorageError> {
        Ok(self.paths.get(item.as_str()).cloned())
    }

    fn get_aggregate(&self, aggregate_id: AggregateId) -> Result<Option<Aggregate>, StorageError> {
        Ok(self.aggregates.get(&aggregate_id).map(|a| a.aggregate.clone()))
    }

    fn find_aggregate(&self, owner_key: &str) -> Result<Option<Aggregate>, StorageError> {
        Ok(self
            .aggregates
            .values()
            .find(|a| a.aggregate.owner_key == owner_key)
            .map(|a| a.aggregate.clone()))
    }

    fn create_aggregate(&mut self, owner_key: &str) -> Result<Aggregate, StorageError> {
        let id = self.seed_aggregate(owner_key);
        self.mutations.push(Mutation::CreateAggregate(id));
        Ok(self.aggregate(id)?.aggregate.clone())
    }

    fn delete_aggregate(&mut self, aggregate_id: AggregateId) -> Result<(), StorageError> {
        if !self.can_delete_aggregate(aggregate_id)? {
            return Err(StorageError::PermissionDenied(aggregate_id.to_string()));
        }
        self.aggregates.remove(&aggregate_id);
        self.records.retain(|_, (r, _)| r.aggregate_id != aggregate_id);
        self.mutations.push(Mutation::DeleteAggregate(aggregate_id));
        Ok(())
    }
}
