//! Dependency Graph
//!
//! This module holds the bookkeeping behind dependency tracking: which
//! effects are subscribed to which dependency sets.
//!
//! # Overview
//!
//! - A `Dep` is the set of effects interested in one tracked slot (a
//!   property of a container, the `value` of a ref, the iteration of a
//!   collection).
//! - An `EffectNode` is the graph-side record of a running computation,
//!   including the list of deps it holds.
//!
//! Edges are stored on both sides. Effects are addressed by `EffectId` and
//! deps by `DepId`, so neither side owns the other and dropping a container
//! or a ref simply removes its deps from the graph.
//!
//! # Design Decisions
//!
//! 1. The graph is centralized and indexed by ID for O(1) lookups, the same
//!    way for deps and effects.
//!
//! 2. Re-tracking after a run is incremental (see `store`), so an effect
//!    that reads the same slots on every run never touches its edges.

mod dep;
mod node;
mod store;

pub(crate) use node::{EffectFn, EffectNode, SchedulerFn};
pub use node::{ComputedKind, DepId, EffectId, ObjectId, ScheduleCause};
pub(crate) use store::DepGraph;
