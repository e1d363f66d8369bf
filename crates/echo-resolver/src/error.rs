// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Resolution errors.

use std::time::Duration;

use echo_cas::Cid;
use echo_dag::Link;
use echo_path::PathError;

use crate::fetch::FetchError;

/// Errors returned by [`Resolver`](crate::Resolver) operations.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// Malformed path text, unknown namespace, or a root that is not an
    /// identifier.
    #[error(transparent)]
    InvalidPath(#[from] PathError),
    /// The operation needs at least one segment after the root.
    #[error("path must contain at least one component")]
    NoComponents,
    /// A named lookup found no such field.
    #[error("no link named {name:?} under {}", describe_parent(.parent.as_ref()))]
    NoLink {
        /// The missing segment.
        name: String,
        /// Block holding the node the lookup ran against; `None` when it ran
        /// against a caller-supplied node.
        parent: Option<Cid>,
    },
    /// A link was found but is not a content-identifier link.
    #[error("{link} is not a cid link")]
    UnsupportedLinkKind {
        /// The link as found.
        link: Link,
    },
    /// The walk finished without the match the operation required.
    #[error("path {path} did not resolve to a node")]
    NotResolved {
        /// Path (or segment list) being resolved.
        path: String,
    },
    /// The call's wall-clock budget ran out; the session was cancelled.
    #[error("resolution cancelled after {budget:?}")]
    Timeout {
        /// The budget that was exceeded.
        budget: Duration,
    },
    /// Fetch collaborator failure, passed through unchanged.
    #[error(transparent)]
    Fetch(FetchError),
}

impl From<FetchError> for ResolveError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::UnsupportedLink(link) => Self::UnsupportedLinkKind { link },
            other => Self::Fetch(other),
        }
    }
}

fn describe_parent(parent: Option<&Cid>) -> String {
    parent.map_or_else(|| "the starting node".to_owned(), ToString::to_string)
}
