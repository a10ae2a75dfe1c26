//! Security gate
//!
//! Everything that decides whether a request may touch the filesystem:
//! path confinement and the forbidden-extension deny-list.

pub mod path;
pub mod policy;

pub use path::{normalize, resolve, ResolvedTarget, TraversalError};
pub use policy::Policy;
