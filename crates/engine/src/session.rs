//! Typed editing context for one variation dialog.
//!
//! Holds the draft stub list plus the selectors identifying what is being
//! varied. All edits here are in memory; nothing reaches the store until
//! [`crate::Engine::commit`].

use varsync_core::{ItemRef, Stub, VariationId};

use crate::error::EngineError;

/// The rendering whose variations are being edited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderingSelector {
    /// The rendering's own component.
    pub component: Option<ItemRef>,
    /// Datasource used by stubs that do not set their own.
    pub datasource: Option<ItemRef>,
}

/// A resolved reference and whether it came from the rendering default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Effective<'a> {
    pub item: &'a ItemRef,
    pub is_fallback: bool,
}

#[derive(Debug, Clone)]
pub struct EditSession {
    /// Key of the aggregate this session edits (one per rendering).
    pub owner_key: String,
    pub device_id: String,
    pub rendering: RenderingSelector,
    stubs: Vec<Stub>,
    new_variation_name: String,
    max_variations: usize,
}

impl EditSession {
    pub fn new(
        owner_key: impl Into<String>,
        device_id: impl Into<String>,
        rendering: RenderingSelector,
        new_variation_name: impl Into<String>,
        max_variations: usize,
    ) -> Self {
        Self {
            owner_key: owner_key.into(),
            device_id: device_id.into(),
            rendering,
            stubs: Vec::new(),
            new_variation_name: new_variation_name.into(),
            max_variations,
        }
    }

    pub fn with_stubs(mut self, stubs: Vec<Stub>) -> Self {
        self.stubs = stubs;
        self
    }

    pub fn stubs(&self) -> &[Stub] {
        &self.stubs
    }

    pub fn len(&self) -> usize {
        self.stubs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stubs.is_empty()
    }

    pub fn get(&self, id: VariationId) -> Option<&Stub> {
        self.stubs.iter().find(|s| s.id == id)
    }

    fn stub_mut(&mut self, id: VariationId) -> Result<&mut Stub, EngineError> {
        self.stubs
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| EngineError::VariationNotFound(id.to_string()))
    }

    /// False once the session holds `max_variations` stubs, so the cap is
    /// the largest count a session can reach.
    pub fn can_add(&self) -> bool {
        self.stubs.len() < self.max_variations
    }

    /// A test needs something to compare against.
    pub fn can_commit(&self) -> bool {
        self.stubs.len() >= 2
    }

    /// Insert a new variation at the top of the list.
    pub fn add_variation(&mut self) -> Result<VariationId, EngineError> {
        if !self.can_add() {
            return Err(EngineError::TooManyVariations {
                max: self.max_variations,
            });
        }
        let stub = Stub::new(self.new_variation_name.clone());
        let id = stub.id;
        self.stubs.insert(0, stub);
        tracing::debug!(variation = %id.short(), "variation added");
        Ok(id)
    }

    pub fn remove(&mut self, id: VariationId) -> Result<Stub, EngineError> {
        let idx = self
            .stubs
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| EngineError::VariationNotFound(id.to_string()))?;
        Ok(self.stubs.remove(idx))
    }

    pub fn rename(&mut self, id: VariationId, name: &str) -> Result<(), EngineError> {
        let stub = self.stub_mut(id)?;
        if name.is_empty() {
            return Err(EngineError::BlankName);
        }
        stub.name = name.to_string();
        Ok(())
    }

    /// Returns the new hide flag.
    pub fn toggle_hide(&mut self, id: VariationId) -> Result<bool, EngineError> {
        let stub = self.stub_mut(id)?;
        stub.hide_component = !stub.hide_component;
        Ok(stub.hide_component)
    }

    pub fn set_datasource(&mut self, id: VariationId, datasource: &str) -> Result<(), EngineError> {
        self.stub_mut(id)?.datasource = ItemRef::parse(datasource);
        Ok(())
    }

    pub fn reset_datasource(&mut self, id: VariationId) -> Result<(), EngineError> {
        self.stub_mut(id)?.datasource = None;
        Ok(())
    }

    /// Accepts the raw picker result, which may carry extra comma-separated
    /// values after the item id.
    pub fn set_replacement(&mut self, id: VariationId, picked: &str) -> Result<(), EngineError> {
        let item = picked.split(',').next().unwrap_or_default();
        self.stub_mut(id)?.replacement = ItemRef::parse(item);
        Ok(())
    }

    pub fn reset_replacement(&mut self, id: VariationId) -> Result<(), EngineError> {
        self.stub_mut(id)?.replacement = None;
        Ok(())
    }

    /// Drop every replacement component. Returns the ids that had one.
    pub fn clear_replacements(&mut self) -> Vec<VariationId> {
        self.stubs
            .iter_mut()
            .filter(|s| s.replacement.is_some())
            .map(|s| {
                s.replacement = None;
                s.id
            })
            .collect()
    }

    pub fn has_replacements(&self) -> bool {
        self.stubs.iter().any(|s| s.replacement.is_some())
    }

    pub fn effective_datasource(&self, id: VariationId) -> Result<Option<Effective<'_>>, EngineError> {
        let stub = self
            .get(id)
            .ok_or_else(|| EngineError::VariationNotFound(id.to_string()))?;
        Ok(effective(stub.datasource.as_ref(), self.rendering.datasource.as_ref()))
    }

    pub fn effective_component(&self, id: VariationId) -> Result<Option<Effective<'_>>, EngineError> {
        let stub = self
            .get(id)
            .ok_or_else(|| EngineError::VariationNotFound(id.to_string()))?;
        Ok(effective(stub.replacement.as_ref(), self.rendering.component.as_ref()))
    }
}

fn effective<'a>(own: Option<&'a ItemRef>, default: Option<&'a ItemRef>) -> Option<Effective<'a>> {
    match (own, default) {
        (Some(item), _) => Some(Effective {
            item,
            is_fallback: false,
        }),
        (None, Some(item)) => Some(Effective {
            item,
            is_fallback: true,
        }),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(max: usize) -> EditSession {
        EditSession::new(
            "rendering-1",
            "default",
            RenderingSelector {
                component: ItemRef::parse("{HERO}"),
                datasource: ItemRef::parse("{HOME}"),
            },
            "New variation",
            max,
        )
    }

    #[test]
    fn add_inserts_at_top_until_limit() {
        let mut s = session(2);
        let first = s.add_variation().unwrap();
        let second = s.add_variation().unwrap();
        assert_eq!(s.stubs()[0].id, second);
        assert_eq!(s.stubs()[1].id, first);
        assert_eq!(s.stubs()[0].name, "New variation");
        assert!(matches!(s.add_variation(), Err(EngineError::TooManyVariations { max: 2 })));
    }

    #[test]
    fn unknown_id_aborts_only_that_operation() {
        let mut s = session(5);
        let id = s.add_variation().unwrap();
        let missing = VariationId::new();
        assert!(matches!(s.remove(missing), Err(EngineError::VariationNotFound(_))));
        assert!(matches!(s.rename(missing, "x"), Err(EngineError::VariationNotFound(_))));
        assert!(matches!(s.toggle_hide(missing), Err(EngineError::VariationNotFound(_))));
        assert_eq!(s.len(), 1);
        assert!(s.get(id).is_some());
    }

    #[test]
    fn blank_rename_is_refused() {
        let mut s = session(5);
        let id = s.add_variation().unwrap();
        assert!(matches!(s.rename(id, ""), Err(EngineError::BlankName)));
        s.rename(id, "Hero B").unwrap();
        assert_eq!(s.get(id).unwrap().name, "Hero B");
    }

    #[test]
    fn picker_result_keeps_first_part() {
        let mut s = session(5);
        let id = s.add_variation().unwrap();
        s.set_replacement(id, "{PROMO},placeholder").unwrap();
        assert_eq!(s.get(id).unwrap().replacement, ItemRef::parse("{PROMO}"));
        assert!(s.has_replacements());

        assert_eq!(s.clear_replacements(), vec![id]);
        assert!(!s.has_replacements());
    }

    #[test]
    fn effective_references_fall_back_to_rendering() {
        let mut s = session(5);
        let id = s.add_variation().unwrap();
        let ds = s.effective_datasource(id).unwrap().unwrap();
        assert!(ds.is_fallback);
        assert_eq!(ds.item.as_str(), "{HOME}");

        s.set_datasource(id, "{ABOUT}").unwrap();
        let ds = s.effective_datasource(id).unwrap().unwrap();
        assert!(!ds.is_fallback);
        assert_eq!(ds.item.as_str(), "{ABOUT}");

        s.reset_datasource(id).unwrap();
        assert!(s.effective_datasource(id).unwrap().unwrap().is_fallback);

        s.set_replacement(id, "{PROMO}").unwrap();
        assert_eq!(s.effective_component(id).unwrap().unwrap().item.as_str(), "{PROMO}");
        s.reset_replacement(id).unwrap();
        assert!(s.effective_component(id).unwrap().unwrap().is_fallback);
    }

    #[test]
    fn commit_needs_two_variations() {
        let mut s = session(5);
        s.add_variation().unwrap();
        assert!(!s.can_commit());
        s.add_variation().unwrap();
        assert!(s.can_commit());
        assert!(s.toggle_hide(s.stubs()[0].id).unwrap());
    }
}
