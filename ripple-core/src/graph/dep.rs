//! Dependency sets.
//!
//! A `Dep` is the set of effects subscribed to one tracked slot, plus the
//! two marker bit-fields used to diff an effect's dependencies between runs
//! without rebuilding them. Bit `n` belongs to the effect running at
//! recursion depth `n`.

use indexmap::IndexSet;

use super::node::EffectId;

#[derive(Debug, Default)]
pub(crate) struct Dep {
    subscribers: IndexSet<EffectId>,
    /// Depths at which the running effect already depended on this set
    /// before the current run started.
    was_tracked: u32,
    /// Depths at which the running effect read this set during the
    /// current run.
    new_tracked: u32,
}

impl Dep {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn was_tracked(&self, bit: u32) -> bool {
        self.was_tracked & bit != 0
    }

    pub(crate) fn new_tracked(&self, bit: u32) -> bool {
        self.new_tracked & bit != 0
    }

    pub(crate) fn mark_was_tracked(&mut self, bit: u32) {
        self.was_tracked |= bit;
    }

    pub(crate) fn mark_new_tracked(&mut self, bit: u32) {
        self.new_tracked |= bit;
    }

    pub(crate) fn clear_markers(&mut self, bit: u32) {
        self.was_tracked &= !bit;
        self.new_tracked &= !bit;
    }

    pub(crate) fn contains(&self, effect: EffectId) -> bool {
        self.subscribers.contains(&effect)
    }

    /// Returns `false` if the effect was already subscribed.
    pub(crate) fn insert(&mut self, effect: EffectId) -> bool {
        self.subscribers.insert(effect)
    }

    pub(crate) fn remove(&mut self, effect: EffectId) -> bool {
        self.subscribers.shift_remove(&effect)
    }

    pub(crate) fn subscribers(&self) -> impl Iterator<Item = EffectId> + '_ {
        self.subscribers.iter().copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_are_per_bit() {
        let mut dep = Dep::new();
        let outer = 1 << 1;
        let inner = 1 << 2;

        dep.mark_was_tracked(outer);
        dep.mark_new_tracked(inner);

        assert!(dep.was_tracked(outer));
        assert!(!dep.was_tracked(inner));
        assert!(dep.new_tracked(inner));
        assert!(!dep.new_tracked(outer));

        dep.clear_markers(outer);
        assert!(!dep.was_tracked(outer));
        assert!(dep.new_tracked(inner));

        dep.clear_markers(inner);
        assert!(!dep.new_tracked(inner));
    }

    #[test]
    fn subscribers_behave_as_a_set() {
        let mut dep = Dep::new();
        let a = EffectId::new();
        let b = EffectId::new();

        assert!(dep.insert(a));
        assert!(!dep.insert(a));
        assert!(dep.insert(b));
        assert_eq!(dep.len(), 2);
        assert_eq!(dep.subscribers().collect::<Vec<_>>(), vec![a, b]);

        assert!(dep.remove(a));
        assert!(!dep.remove(a));
        assert!(!dep.contains(a));
        assert!(dep.contains(b));
        assert!(!dep.is_empty());
    }
}
