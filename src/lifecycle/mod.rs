//! Object Lifecycle
//!
//! Intrusive reference counting for capability objects.
//!
//! # Design
//! - Each object embeds a `RefCount` (see `RefObj`)
//! - `Ref<T>` is the scoped handle: acquire on clone, release on drop
//! - `raw` exposes the three counting operations for pointer-level code
//!
//! # Safety Properties
//! - An object is destroyed exactly when its last reference is released
//! - A count going negative or an object destroyed with live references is
//!   a contract violation

mod handle;
pub mod raw;
mod refcount;

pub use handle::Ref;
pub use refcount::{RefCount, RefObj};
