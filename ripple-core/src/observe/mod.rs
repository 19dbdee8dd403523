//! Observed State
//!
//! This module holds the data that effects react to.
//!
//! - `Value` is the dynamic value stored in containers.
//! - `Target` is a raw container. Plain reads and writes through it are
//!   invisible to the runtime.
//! - `Observed` is a view over a target. Reads through a view are tracked
//!   and writes through it are triggered.
//!
//! Records and arrays are handled in `base`, maps and sets in `collection`.
//! Both follow the same rules: nested containers are observed lazily on
//! read, values are stored raw, and writes trigger only when the stored
//! value actually changed.

mod base;
mod collection;
mod observed;
mod target;
mod value;

pub use observed::{
    is_proxy, is_reactive, is_readonly, is_shallow, mark_raw, reactive, readonly,
    shallow_reactive, shallow_readonly, to_raw, wrap, Flavor, Observed, ReactiveFlag,
};
pub use target::{Container, ContainerKind, Record, Target, TargetKind};
pub use value::Value;
