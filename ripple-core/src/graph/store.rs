//! Subscriber Graph
//!
//! The graph owns every dependency set and every effect node, and keeps the
//! two sides of each edge consistent: an effect appears in a dep's
//! subscriber set exactly when that dep appears in the effect's dep list.
//!
//! # How Re-tracking Works
//!
//! Before an effect runs at depth `n`, every dep it currently holds gets
//! bit `n` set in `was_tracked`. Each read during the run sets bit `n` in
//! `new_tracked`, and links the effect only if the dep was not already
//! held. After the run, deps with the bit in `was_tracked` but not in
//! `new_tracked` are unlinked, and both bits are cleared. Unchanged
//! dependencies are never removed and re-added.
//!
//! Past the configured depth cap the runtime falls back to a full cleanup
//! before the run (`cleanup_effect`) and passes `None` as the bit.

use std::collections::HashMap;

use smallvec::SmallVec;

use super::dep::Dep;
use super::node::{DepId, EffectId, EffectNode};

/// Deps and effects with their bidirectional edges.
pub(crate) struct DepGraph {
    deps: HashMap<DepId, Dep>,
    effects: HashMap<EffectId, EffectNode>,
}

impl DepGraph {
    pub(crate) fn new() -> Self {
        Self {
            deps: HashMap::new(),
            effects: HashMap::new(),
        }
    }

    pub(crate) fn create_dep(&mut self) -> DepId {
        let id = DepId::new();
        self.deps.insert(id, Dep::new());
        id
    }

    /// Remove a dep and unlink it from every subscriber.
    ///
    /// Returns the effects that were subscribed to it.
    pub(crate) fn remove_dep(&mut self, dep_id: DepId) -> SmallVec<[EffectId; 8]> {
        let Some(dep) = self.deps.remove(&dep_id) else {
            return SmallVec::new();
        };
        let subscribers: SmallVec<[EffectId; 8]> = dep.subscribers().collect();
        for effect in &subscribers {
            if let Some(node) = self.effects.get_mut(effect) {
                node.deps.retain(|d| *d != dep_id);
            }
        }
        subscribers
    }

    pub(crate) fn dep(&self, dep_id: DepId) -> Option<&Dep> {
        self.deps.get(&dep_id)
    }

    pub(crate) fn insert_effect(&mut self, id: EffectId, node: EffectNode) {
        self.effects.insert(id, node);
    }

    /// Remove an effect and unlink it from every dep it holds.
    ///
    /// The node is handed back so the caller can drop its closures outside
    /// of any runtime borrow.
    pub(crate) fn remove_effect(&mut self, id: EffectId) -> Option<EffectNode> {
        self.cleanup_effect(id);
        self.effects.remove(&id)
    }

    pub(crate) fn effect(&self, id: EffectId) -> Option<&EffectNode> {
        self.effects.get(&id)
    }

    pub(crate) fn effect_mut(&mut self, id: EffectId) -> Option<&mut EffectNode> {
        self.effects.get_mut(&id)
    }

    /// Add the edge `dep -> effect` on both sides.
    pub(crate) fn link(&mut self, dep_id: DepId, effect: EffectId) -> bool {
        let Some(dep) = self.deps.get_mut(&dep_id) else {
            return false;
        };
        let Some(node) = self.effects.get_mut(&effect) else {
            return false;
        };
        if dep.insert(effect) {
            node.deps.push(dep_id);
            true
        } else {
            false
        }
    }

    /// Record a read of `dep_id` by `effect`.
    ///
    /// `bit` is the marker of the running depth, or `None` past the depth
    /// cap. Returns `true` when a new edge was created.
    pub(crate) fn track(&mut self, dep_id: DepId, effect: EffectId, bit: Option<u32>) -> bool {
        let Some(dep) = self.deps.get_mut(&dep_id) else {
            return false;
        };
        let should_link = match bit {
            Some(bit) => {
                if dep.new_tracked(bit) {
                    false
                } else {
                    dep.mark_new_tracked(bit);
                    !dep.was_tracked(bit)
                }
            }
            None => !dep.contains(effect),
        };
        should_link && self.link(dep_id, effect)
    }

    /// Mark every dep the effect holds as tracked at this depth.
    pub(crate) fn init_markers(&mut self, effect: EffectId, bit: u32) {
        let Self { deps, effects } = self;
        if let Some(node) = effects.get(&effect) {
            for dep_id in &node.deps {
                if let Some(dep) = deps.get_mut(dep_id) {
                    dep.mark_was_tracked(bit);
                }
            }
        }
    }

    /// Drop the deps not read during the run and clear this depth's bits.
    pub(crate) fn finalize_markers(&mut self, effect: EffectId, bit: u32) {
        let Self { deps, effects } = self;
        let Some(node) = effects.get_mut(&effect) else {
            return;
        };
        node.deps.retain(|dep_id| {
            let Some(dep) = deps.get_mut(dep_id) else {
                return false;
            };
            let keep = !(dep.was_tracked(bit) && !dep.new_tracked(bit));
            if !keep {
                dep.remove(effect);
            }
            dep.clear_markers(bit);
            keep
        });
    }

    /// Clear this depth's bits on every dep the effect holds.
    pub(crate) fn clear_markers(&mut self, effect: EffectId, bit: u32) {
        let Self { deps, effects } = self;
        if let Some(node) = effects.get(&effect) {
            for dep_id in &node.deps {
                if let Some(dep) = deps.get_mut(dep_id) {
                    dep.clear_markers(bit);
                }
            }
        }
    }

    /// Unsubscribe the effect from everything.
    pub(crate) fn cleanup_effect(&mut self, effect: EffectId) {
        let Self { deps, effects } = self;
        if let Some(node) = effects.get_mut(&effect) {
            for dep_id in node.deps.drain(..) {
                if let Some(dep) = deps.get_mut(&dep_id) {
                    dep.remove(effect);
                }
            }
        }
    }

    /// Snapshot of a dep's subscribers, safe to iterate while effects run.
    pub(crate) fn subscribers(&self, dep_id: DepId) -> SmallVec<[EffectId; 8]> {
        self.deps
            .get(&dep_id)
            .map(|dep| dep.subscribers().collect())
            .unwrap_or_default()
    }

    pub(crate) fn dep_count(&self) -> usize {
        self.deps.len()
    }

    pub(crate) fn effect_count(&self) -> usize {
        self.effects.len()
    }
}

impl Default for DepGraph {
    fn default() -> Self {
        Self::new()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::{Rc, Weak};

    fn add_effect(graph: &mut DepGraph) -> EffectId {
        let id = EffectId::new();
        graph.insert_effect(id, EffectNode::new(Rc::new(|| {}), Weak::new()));
        id
    }

    fn holds(graph: &DepGraph, dep: DepId, effect: EffectId) -> bool {
        let forward = graph.dep(dep).map_or(false, |d| d.contains(effect));
        let backward = graph
            .effect(effect)
            .map_or(false, |n| n.deps.contains(&dep));
        assert_eq!(forward, backward, "edge must be mirrored");
        forward
    }

    #[test]
    fn link_is_bidirectional_and_idempotent() {
        let mut graph = DepGraph::new();
        let dep = graph.create_dep();
        let effect = add_effect(&mut graph);

        assert!(graph.link(dep, effect));
        assert!(!graph.link(dep, effect));
        assert!(holds(&graph, dep, effect));
        assert_eq!(graph.effect(effect).unwrap().deps.len(), 1);
    }

    #[test]
    fn retracking_keeps_read_deps_and_drops_stale_ones() {
        let mut graph = DepGraph::new();
        let a = graph.create_dep();
        let b = graph.create_dep();
        let effect = add_effect(&mut graph);
        let bit = 1 << 1;

        // First run reads a and b.
        graph.init_markers(effect, bit);
        assert!(graph.track(a, effect, Some(bit)));
        assert!(graph.track(b, effect, Some(bit)));
        assert!(!graph.track(a, effect, Some(bit)));
        graph.finalize_markers(effect, bit);
        assert!(holds(&graph, a, effect));
        assert!(holds(&graph, b, effect));

        // Second run reads only a: no new edge, b is pruned.
        graph.init_markers(effect, bit);
        assert!(!graph.track(a, effect, Some(bit)));
        graph.finalize_markers(effect, bit);
        assert!(holds(&graph, a, effect));
        assert!(!holds(&graph, b, effect));

        let dep_a = graph.dep(a).unwrap();
        assert!(!dep_a.was_tracked(bit));
        assert!(!dep_a.new_tracked(bit));
    }

    #[test]
    fn tracking_without_marker_links_once() {
        let mut graph = DepGraph::new();
        let dep = graph.create_dep();
        let effect = add_effect(&mut graph);

        assert!(graph.track(dep, effect, None));
        assert!(!graph.track(dep, effect, None));
        assert!(holds(&graph, dep, effect));
    }

    #[test]
    fn cleanup_and_removal_unlink_both_sides() {
        let mut graph = DepGraph::new();
        let a = graph.create_dep();
        let b = graph.create_dep();
        let first = add_effect(&mut graph);
        let second = add_effect(&mut graph);
        graph.link(a, first);
        graph.link(b, first);
        graph.link(a, second);

        graph.cleanup_effect(first);
        assert!(!holds(&graph, a, first));
        assert!(!holds(&graph, b, first));
        assert!(holds(&graph, a, second));

        let subscribers = graph.remove_dep(a);
        assert_eq!(subscribers.as_slice(), &[second]);
        assert!(graph.effect(second).unwrap().deps.is_empty());

        assert!(graph.remove_effect(second).is_some());
        assert_eq!(graph.effect_count(), 1);
        assert_eq!(graph.dep_count(), 1);
    }

    #[test]
    fn clear_markers_before_cleanup_leaves_no_stale_bits() {
        let mut graph = DepGraph::new();
        let dep = graph.create_dep();
        let running = add_effect(&mut graph);
        let later = add_effect(&mut graph);
        let bit = 1 << 1;

        graph.link(dep, running);
        graph.init_markers(running, bit);
        graph.clear_markers(running, bit);
        graph.cleanup_effect(running);
        assert!(!graph.dep(dep).unwrap().was_tracked(bit));

        // Another effect at the same depth links normally.
        graph.init_markers(later, bit);
        assert!(graph.track(dep, later, Some(bit)));
        graph.finalize_markers(later, bit);
        assert!(holds(&graph, dep, later));
    }

    #[test]
    fn subscribers_snapshot_preserves_order() {
        let mut graph = DepGraph::new();
        let dep = graph.create_dep();
        let first = add_effect(&mut graph);
        let second = add_effect(&mut graph);
        graph.link(dep, second);
        graph.link(dep, first);

        assert_eq!(graph.subscribers(dep).as_slice(), &[second, first]);
        assert!(graph.subscribers(DepId::new()).is_empty());
    }
}
