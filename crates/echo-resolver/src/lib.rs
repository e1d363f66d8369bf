// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Path resolution over content-addressed Echo merkle-DAGs.
//!
//! A path such as `/ipfs/<cid>/a/b` names a root block and a list of segments.
//! The [`Resolver`] compiles the segments into a [`Selector`], walks it from the
//! root through a fetch [`Session`], and reports the node at the end, every node
//! on the way, or the last block touched plus what is left to apply inside it.
//!
//! ```text
//! Path ──► Selector ──► Session (BlockService + NodeChooser) ──► walk ──► result
//! ```
//!
//! Blocks are fetched lazily: a link is loaded only when the walk needs to look
//! inside its target. How each block decodes is up to the [`NodeChooser`];
//! the default picks the file/directory shape for `dag-fs` links so directory
//! entries resolve by name.
#![forbid(unsafe_code)]
#![allow(
    clippy::must_use_candidate,
    clippy::missing_const_for_fn,
    clippy::module_name_repetitions
)]

pub mod chooser;
pub mod config;
mod error;
pub mod fetch;
mod resolver;
pub mod selector;
pub mod walk;

pub use chooser::{DefaultChooser, LinkContext, NodeChooser, PathFollowingChooser};
pub use config::{ConfigService, FsConfigStore, ResolverConfig};
pub use error::ResolveError;
pub use fetch::{BlockService, FetchError, FetcherConfig, Session, StoreBlockService};
pub use resolver::{resolve_single, Resolver, DEFAULT_TIMEOUT};
pub use selector::{Mode, Selector};
