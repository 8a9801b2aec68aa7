use std::fmt;

use varsync_core::{AggregateId, VariationId};
use varsync_storage::{Capabilities, StorageError};

use crate::reconcile::Plan;

/// One operation of a plan that the store would refuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    Delete(VariationId),
    AddChild(AggregateId),
    Write(VariationId),
    Locked(VariationId),
    ReadOnly(VariationId),
    AggregateDelete(AggregateId),
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delete(id) => write!(f, "cannot delete {}", id.short()),
            Self::AddChild(id) => write!(f, "cannot add variations under {}", id.short()),
            Self::Write(id) => write!(f, "cannot write {}", id.short()),
            Self::Locked(id) => write!(f, "{} is locked by another actor", id.short()),
            Self::ReadOnly(id) => write!(f, "{} is read-only", id.short()),
            Self::AggregateDelete(id) => write!(f, "cannot delete aggregate {}", id.short()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub deletable: bool,
    pub addable: bool,
    pub updatable: bool,
    pub denials: Vec<Denial>,
}

impl Verdict {
    pub fn is_approved(&self) -> bool {
        self.deletable && self.addable && self.updatable
    }
}

/// Read-only pre-check of a whole plan. Nothing may be mutated unless every
/// operation passes.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionGate {
    elevated: bool,
}

impl PermissionGate {
    /// An elevated caller ignores locks held by other actors.
    pub fn new(elevated: bool) -> Self {
        Self { elevated }
    }

    pub fn check<C>(&self, caps: &C, plan: &Plan) -> Result<Verdict, StorageError>
    where
        C: Capabilities + ?Sized,
    {
        let mut denials = Vec::new();

        let mut deletable = true;
        for record in &plan.deletes {
            if !caps.can_delete(record.id)? {
                deletable = false;
                denials.push(Denial::Delete(record.id));
            }
        }

        let addable = plan.creates.is_empty() || caps.can_add_child(plan.aggregate_id)?;
        if !addable {
            denials.push(Denial::AddChild(plan.aggregate_id));
        }

        let mut updatable = true;
        for entry in &plan.updates {
            if let Some(denial) = self.update_denial(caps, entry.record.id)? {
                updatable = false;
                denials.push(denial);
            }
        }

        let verdict = Verdict {
            deletable,
            addable,
            updatable,
            denials,
        };
        if !verdict.is_approved() {
            tracing::warn!(denials = verdict.denials.len(), "plan rejected by permission gate");
        }
        Ok(verdict)
    }

    fn update_denial<C>(&self, caps: &C, id: VariationId) -> Result<Option<Denial>, StorageError>
    where
        C: Capabilities + ?Sized,
    {
        if !self.elevated && caps.is_locked(id)? {
            return Ok(Some(Denial::Locked(id)));
        }
        if caps.is_read_only(id)? {
            return Ok(Some(Denial::ReadOnly(id)));
        }
        if !caps.can_write(id)? {
            return Ok(Some(Denial::Write(id)));
        }
        Ok(None)
    }
}
