//! Stub/baseline diff.
//!
//! Stubs are matched to baseline records by identity. Unmatched stubs become
//! creates with fresh sort keys, matched pairs whose fields differ become
//! updates, and baseline records nobody claimed become deletes.

use varsync_core::{
    AggregateId, BaselineOrder, ItemRef, Record, SortOrderAssigner, Stub, VariationId,
    by_sort_key_then_id,
};
use varsync_storage::StorageError;

use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateEntry {
    pub sort_key: i64,
    pub stub: Stub,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateEntry {
    pub record: Record,
    pub stub: Stub,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub aggregate_id: AggregateId,
    /// In discovery order, which is bottom-to-top of the stub list.
    pub creates: Vec<CreateEntry>,
    pub updates: Vec<UpdateEntry>,
    pub deletes: Vec<Record>,
    /// Matched records with no field changes.
    pub unchanged: Vec<VariationId>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Reconciler {
    order: BaselineOrder,
    default_sort_key: i64,
}

impl Reconciler {
    pub fn new(order: BaselineOrder, default_sort_key: i64) -> Self {
        Self {
            order,
            default_sort_key,
        }
    }

    /// Classify every stub and baseline record.
    ///
    /// `resolve` maps a reference to its canonical path; references that do
    /// not resolve compare by their raw value. Stub identities must be
    /// unique; duplicates give an unspecified plan. Fails if the creates
    /// need more sort keys than fit below the baseline minimum.
    pub fn plan<F>(
        &self,
        aggregate_id: AggregateId,
        stubs: &[Stub],
        baseline: &[Record],
        resolve: F,
    ) -> Result<Plan, EngineError>
    where
        F: Fn(&ItemRef) -> Result<Option<String>, StorageError>,
    {
        let mut remaining = baseline.to_vec();
        remaining.sort_by(self.order);
        let mut keys = SortOrderAssigner::new(&remaining, self.default_sort_key);

        let mut creates = Vec::new();
        let mut updates = Vec::new();
        let mut unchanged = Vec::new();

        for stub in stubs.iter().rev() {
            let Some(idx) = remaining.iter().position(|r| r.id == stub.id) else {
                creates.push(CreateEntry {
                    sort_key: keys.next_key()?,
                    stub: stub.clone(),
                });
                continue;
            };

            let record = remaining.remove(idx);
            if is_changed(&record, stub, &resolve)? {
                updates.push(UpdateEntry {
                    record,
                    stub: stub.clone(),
                });
            } else {
                unchanged.push(record.id);
            }
        }

        Ok(Plan {
            aggregate_id,
            creates,
            updates,
            deletes: remaining,
            unchanged,
        })
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(by_sort_key_then_id, 0)
    }
}

fn canonical<F>(reference: Option<&ItemRef>, resolve: &F) -> Result<Option<String>, StorageError>
where
    F: Fn(&ItemRef) -> Result<Option<String>, StorageError>,
{
    match reference {
        Some(item) => Ok(Some(resolve(item)?.unwrap_or_else(|| item.as_str().to_string()))),
        None => Ok(None),
    }
}

fn is_changed<F>(record: &Record, stub: &Stub, resolve: &F) -> Result<bool, StorageError>
where
    F: Fn(&ItemRef) -> Result<Option<String>, StorageError>,
{
    if record.display_name != stub.name
        || record.datasource != stub.datasource
        || record.hide_component != stub.hide_component
    {
        return Ok(true);
    }
    let stored = canonical(record.replacement.as_ref(), resolve)?;
    let edited = canonical(stub.replacement.as_ref(), resolve)?;
    Ok(stored != edited)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_paths(_: &ItemRef) -> Result<Option<String>, StorageError> {
        Ok(None)
    }

    fn record(aggregate_id: AggregateId, name: &str, sort_key: i64) -> Record {
        Record {
            id: VariationId::new(),
            aggregate_id,
            name: name.to_string(),
            display_name: name.to_string(),
            datasource: None,
            replacement: None,
            hide_component: false,
            sort_key,
        }
    }

    #[test]
    fn new_stub_below_existing_original() {
        let aggregate = AggregateId::new();
        let a = record(aggregate, "Original", 10);
        let b = Stub::new("Variant 2");
        let stubs = vec![Stub::from_record(&a, true), b.clone()];

        let plan = Reconciler::default()
            .plan(aggregate, &stubs, std::slice::from_ref(&a), no_paths)
            .unwrap();

        assert_eq!(plan.creates, vec![CreateEntry { sort_key: 9, stub: b }]);
        assert!(plan.updates.is_empty());
        assert!(plan.deletes.is_empty());
        assert_eq!(plan.unchanged, vec![a.id]);
    }

    #[test]
    fn removed_stub_becomes_delete() {
        let aggregate = AggregateId::new();
        let a = record(aggregate, "A", 1);
        let c = record(aggregate, "C", 2);
        let stubs = vec![Stub::from_record(&a, false)];

        let plan = Reconciler::default()
            .plan(aggregate, &stubs, &[a.clone(), c.clone()], no_paths)
            .unwrap();

        assert_eq!(plan.deletes, vec![c]);
        assert!(plan.creates.is_empty());
        assert!(plan.updates.is_empty());
    }

    #[test]
    fn empty_stub_list_deletes_everything() {
        let aggregate = AggregateId::new();
        let baseline = vec![record(aggregate, "A", 3), record(aggregate, "B", 1)];
        let plan = Reconciler::default()
            .plan(aggregate, &[], &baseline, no_paths)
            .unwrap();
        assert_eq!(plan.deletes.len(), 2);
        assert_eq!(plan.deletes[0].sort_key, 1);
        assert!(plan.creates.is_empty() && plan.updates.is_empty());
    }

    #[test]
    fn creates_take_descending_keys_bottom_to_top() {
        let aggregate = AggregateId::new();
        let baseline = vec![record(aggregate, "A", 50), record(aggregate, "B", 20)];
        let top = Stub::new("top");
        let middle = Stub::new("middle");
        let bottom = Stub::new("bottom");
        let stubs = vec![
            top.clone(),
            Stub::from_record(&baseline[0], false),
            middle.clone(),
            Stub::from_record(&baseline[1], false),
            bottom.clone(),
        ];

        let plan = Reconciler::default()
            .plan(aggregate, &stubs, &baseline, no_paths)
            .unwrap();
        let assigned: Vec<(i64, VariationId)> =
            plan.creates.iter().map(|c| (c.sort_key, c.stub.id)).collect();
        assert_eq!(assigned, vec![(19, bottom.id), (18, middle.id), (17, top.id)]);
    }

    #[test]
    fn empty_baseline_starts_at_default_key() {
        let aggregate = AggregateId::new();
        let stubs = vec![Stub::new("a"), Stub::new("b")];
        let plan = Reconciler::new(by_sort_key_then_id, 100)
            .plan(aggregate, &stubs, &[], no_paths)
            .unwrap();
        let keys: Vec<i64> = plan.creates.iter().map(|c| c.sort_key).collect();
        assert_eq!(keys, vec![100, 99]);
    }

    #[test]
    fn no_room_below_minimum_key_is_an_error() {
        let aggregate = AggregateId::new();
        let a = record(aggregate, "A", i64::MIN);
        let stubs = vec![Stub::from_record(&a, false), Stub::new("fresh")];
        let result = Reconciler::default().plan(aggregate, &stubs, std::slice::from_ref(&a), no_paths);
        assert!(matches!(
            result,
            Err(EngineError::Core(varsync_core::CoreError::SortKeysExhausted))
        ));

        // Without creates the minimum is never decremented.
        let plan = Reconciler::default()
            .plan(aggregate, &stubs[..1], std::slice::from_ref(&a), no_paths)
            .unwrap();
        assert_eq!(plan.unchanged, vec![a.id]);
    }

    #[test]
    fn field_changes_become_updates_keeping_sort_key() {
        let aggregate = AggregateId::new();
        let a = record(aggregate, "A", 7);
        let stubs = vec![Stub::from_record(&a, false).hidden(true)];
        let plan = Reconciler::default()
            .plan(aggregate, &stubs, std::slice::from_ref(&a), no_paths)
            .unwrap();
        assert_eq!(plan.updates.len(), 1);
        assert_eq!(plan.updates[0].record.sort_key, 7);

        let stubs = vec![Stub::from_record(&a, false).datasource("{DS}")];
        let plan = Reconciler::default()
            .plan(aggregate, &stubs, std::slice::from_ref(&a), no_paths)
            .unwrap();
        assert_eq!(plan.updates.len(), 1);
    }

    #[test]
    fn empty_datasource_on_both_sides_is_unchanged() {
        let aggregate = AggregateId::new();
        let a = record(aggregate, "A", 7);
        let stubs = vec![Stub::from_record(&a, false).datasource("")];
        let plan = Reconciler::default()
            .plan(aggregate, &stubs, std::slice::from_ref(&a), no_paths)
            .unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn replacement_compares_by_canonical_path() {
        let aggregate = AggregateId::new();
        let mut a = record(aggregate, "A", 7);
        a.replacement = ItemRef::parse("{HERO}");
        let resolve = |item: &ItemRef| -> Result<Option<String>, StorageError> {
            Ok(match item.as_str() {
                "{HERO}" | "{hero}" => Some("/layout/renderings/hero".to_string()),
                _ => None,
            })
        };

        let same_item = vec![Stub::from_record(&a, false).replacement("{hero}")];
        let plan = Reconciler::default()
            .plan(aggregate, &same_item, std::slice::from_ref(&a), resolve)
            .unwrap();
        assert!(plan.is_empty());

        let other_item = vec![Stub::from_record(&a, false).replacement("{PROMO}")];
        let plan = Reconciler::default()
            .plan(aggregate, &other_item, std::slice::from_ref(&a), resolve)
            .unwrap();
        assert_eq!(plan.updates.len(), 1);

        let cleared = vec![Stub::from_record(&a, false).replacement("")];
        let plan = Reconciler::default()
            .plan(aggregate, &cleared, std::slice::from_ref(&a), resolve)
            .unwrap();
        assert_eq!(plan.updates.len(), 1);
    }

    #[test]
    fn partition_covers_baseline_and_stubs() {
        let aggregate = AggregateId::new();
        let baseline: Vec<Record> = (0..5).map(|i| record(aggregate, &format!("r{i}"), i)).collect();
        let mut stubs: Vec<Stub> = baseline
            .iter()
            .step_by(2)
            .map(|r| Stub::from_record(r, false))
            .collect();
        stubs[1].name = "renamed".into();
        stubs.insert(1, Stub::new("fresh"));

        let plan = Reconciler::default()
            .plan(aggregate, &stubs, &baseline, no_paths)
            .unwrap();

        let kept = plan.updates.len() + plan.unchanged.len();
        assert_eq!(plan.deletes.len() + kept, baseline.len());
        assert_eq!(kept + plan.creates.len(), stubs.len());
    }
}
