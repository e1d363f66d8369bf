// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Navigable node model for Echo merkle-DAGs.
//!
//! Blocks stored in `echo-cas` decode into [`Node`]s. A block may hold many
//! nodes (a nested map, say) and point at other blocks through [`Link`]s.
//! Every node shape answers `kind`, `lookup_by_name` and `as_link`, which is
//! all path resolution needs to walk the graph.
#![forbid(unsafe_code)]
#![allow(
    clippy::must_use_candidate,
    clippy::missing_const_for_fn,
    clippy::module_name_repetitions
)]

pub mod codec;
pub mod fs;
mod json;
pub mod node;

pub use codec::{decode, DecodeError, Prototype};
pub use fs::{FsLink, FsNode};
pub use node::{Kind, Link, LookupError, Node};
