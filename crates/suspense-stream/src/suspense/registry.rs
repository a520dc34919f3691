use rustc_hash::FxHashSet;

use super::types::BoundaryId;

/// Set of boundary ids that are still waiting on their content.
///
/// Adding a present id or removing an absent one is a no-op, so late or
/// duplicate notifications never skew the count.
#[derive(Debug, Default)]
pub struct BoundaryRegistry {
    pending: FxHashSet<BoundaryId>,
}

impl BoundaryRegistry {
    pub fn new() -> Self {
        Self { pending: FxHashSet::default() }
    }

    /// Returns `true` if the id was not pending before.
    pub fn add(&mut self, id: BoundaryId) -> bool {
        self.pending.insert(id)
    }

    /// Returns `true` if the id was pending.
    pub fn remove(&mut self, id: &BoundaryId) -> bool {
        self.pending.remove(id)
    }

    pub fn contains(&self, id: &BoundaryId) -> bool {
        self.pending.contains(id)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn size(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_is_idempotent() {
        let mut registry = BoundaryRegistry::new();
        assert!(registry.add(BoundaryId::from(1u64)));
        assert!(!registry.add(BoundaryId::from(1u64)));
        assert_eq!(registry.size(), 1);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut registry = BoundaryRegistry::new();
        registry.add(BoundaryId::from(1u64));

        assert!(!registry.remove(&BoundaryId::from(2u64)));
        assert_eq!(registry.size(), 1);

        assert!(registry.remove(&BoundaryId::from(1u64)));
        assert!(!registry.remove(&BoundaryId::from(1u64)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_named_and_numeric_ids_are_distinct() {
        let mut registry = BoundaryRegistry::new();
        registry.add(BoundaryId::from(1u64));
        registry.add(BoundaryId::from("1"));

        assert_eq!(registry.size(), 2);
        assert!(registry.contains(&BoundaryId::from("1")));
    }
}
