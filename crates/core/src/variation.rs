use serde::{Deserialize, Serialize};

use crate::ids::{AggregateId, ItemRef, VariationId};

/// Client-side draft of one variation, alive for a single editing session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stub {
    pub id: VariationId,
    pub name: String,
    /// `None` inherits the rendering's datasource.
    pub datasource: Option<ItemRef>,
    /// `None` keeps the rendering's own component.
    pub replacement: Option<ItemRef>,
    pub hide_component: bool,
    pub is_original: bool,
}

impl Stub {
    /// A fresh stub with a locally generated identity.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(VariationId::new(), name)
    }

    pub fn with_id(id: VariationId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            datasource: None,
            replacement: None,
            hide_component: false,
            is_original: false,
        }
    }

    /// Seed a stub from a persisted record.
    pub fn from_record(record: &Record, is_original: bool) -> Self {
        Self {
            id: record.id,
            name: record.display_name.clone(),
            datasource: record.datasource.clone(),
            replacement: record.replacement.clone(),
            hide_component: record.hide_component,
            is_original,
        }
    }

    pub fn datasource(mut self, datasource: &str) -> Self {
        self.datasource = ItemRef::parse(datasource);
        self
    }

    pub fn replacement(mut self, replacement: &str) -> Self {
        self.replacement = ItemRef::parse(replacement);
        self
    }

    pub fn hidden(mut self, hide: bool) -> Self {
        self.hide_component = hide;
        self
    }

    pub fn original(mut self, is_original: bool) -> Self {
        self.is_original = is_original;
        self
    }

    /// The field values written onto a record by create or update.
    pub fn fields(&self) -> RecordFields {
        RecordFields {
            display_name: self.name.clone(),
            datasource: self.datasource.clone(),
            replacement: self.replacement.clone(),
            hide_component: self.hide_component,
        }
    }
}

/// Persisted variation under an aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: VariationId,
    pub aggregate_id: AggregateId,
    /// Storage name, unique among siblings. Allocated once at creation.
    pub name: String,
    pub display_name: String,
    pub datasource: Option<ItemRef>,
    pub replacement: Option<ItemRef>,
    pub hide_component: bool,
    pub sort_key: i64,
}

/// Mutable fields of a record, as written by create and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFields {
    pub display_name: String,
    pub datasource: Option<ItemRef>,
    pub replacement: Option<ItemRef>,
    pub hide_component: bool,
}

/// Parent of a variation set: the test variable for one rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregate {
    pub id: AggregateId,
    pub owner_key: String,
    pub original_ref: Option<VariationId>,
}
