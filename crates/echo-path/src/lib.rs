// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Content paths: `/<namespace>/<root>[/<segment>]*`.
//!
//! A [`Path`] is an immutable, validated value. The `ipfs` namespace roots a
//! path at a content identifier; the `ipns` namespace roots it at a mutable
//! name, which this crate carries but never resolves.
//!
//! Parsing is forgiving in the same ways a shell is: repeated and trailing
//! slashes collapse, and a bare `<cid>/a/b` is read as `/ipfs/<cid>/a/b`.
#![forbid(unsafe_code)]
#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]

use std::fmt;
use std::str::FromStr;

use echo_cas::{CasError, Cid};

/// Path errors.
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    /// Malformed text, unknown namespace, or unparseable root.
    #[error("invalid path {path:?}: {reason}")]
    Invalid {
        /// The text that failed to parse.
        path: String,
        /// What was wrong with it.
        reason: String,
        /// Identifier parse failure, when the root was at fault.
        #[source]
        source: Option<CasError>,
    },
    /// Nothing after the namespace.
    #[error("invalid path {path:?}: path must contain at least one component")]
    NoComponents {
        /// The text that failed to parse.
        path: String,
    },
}

impl PathError {
    /// The original text the error refers to.
    pub fn path(&self) -> &str {
        match self {
            Self::Invalid { path, .. } | Self::NoComponents { path } => path,
        }
    }

    fn invalid(path: &str, reason: impl Into<String>, source: Option<CasError>) -> Self {
        Self::Invalid {
            path: path.to_owned(),
            reason: reason.into(),
            source,
        }
    }
}

/// Root namespace of a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Rooted at an immutable content identifier.
    Ipfs,
    /// Rooted at a mutable name.
    Ipns,
}

impl Namespace {
    /// Text form, without slashes.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ipfs => "ipfs",
            Self::Ipns => "ipns",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        match token {
            "ipfs" => Some(Self::Ipfs),
            "ipns" => Some(Self::Ipns),
            _ => None,
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed, validated content path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path {
    namespace: Namespace,
    root: String,
    segments: Vec<String>,
}

impl Path {
    /// Parse and validate path text.
    pub fn parse(text: &str) -> Result<Self, PathError> {
        if text.is_empty() {
            return Err(PathError::invalid(text, "empty path", None));
        }
        if !text.starts_with('/') {
            // bare "<cid>[/...]" is shorthand for "/ipfs/<cid>[/...]"
            let head = text.split('/').next().unwrap_or_default();
            return match head.parse::<Cid>() {
                Ok(_) => Self::parse(&format!("/ipfs/{text}")),
                Err(err) => Err(PathError::invalid(
                    text,
                    "path must begin with '/' or a content identifier",
                    Some(err),
                )),
            };
        }

        let mut tokens = text.split('/').filter(|t| !t.is_empty());
        let Some(ns_token) = tokens.next() else {
            return Err(PathError::NoComponents {
                path: text.to_owned(),
            });
        };
        let Some(namespace) = Namespace::from_token(ns_token) else {
            return Err(PathError::invalid(
                text,
                format!("unknown namespace {ns_token:?}"),
                None,
            ));
        };
        let Some(root) = tokens.next() else {
            return Err(PathError::NoComponents {
                path: text.to_owned(),
            });
        };
        if namespace == Namespace::Ipfs {
            if let Err(err) = root.parse::<Cid>() {
                return Err(PathError::invalid(text, "root is not a content identifier", Some(err)));
            }
        }
        Ok(Self {
            namespace,
            root: root.to_owned(),
            segments: tokens.map(str::to_owned).collect(),
        })
    }

    /// Build a path from a namespace and its components (root first).
    pub fn from_segments<I, S>(namespace: Namespace, components: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut text = format!("/{namespace}");
        for component in components {
            text.push('/');
            text.push_str(component.as_ref());
        }
        Self::parse(&text)
    }

    /// A path naming a block with no trailing segments.
    pub fn from_cid(cid: &Cid) -> Self {
        Self {
            namespace: Namespace::Ipfs,
            root: cid.to_string(),
            segments: Vec::new(),
        }
    }

    /// Namespace of the root.
    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// Root token (identifier text or name).
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Segments after the root, in order.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Re-run validation against this value.
    pub fn is_valid(&self) -> Result<(), PathError> {
        Self::parse(&self.to_string()).map(|_| ())
    }

    /// Split into the root identifier and the segments that follow it.
    ///
    /// Fails for `ipns` paths: names have to be resolved to an identifier by a
    /// layer above this one.
    pub fn split_abs_path(&self) -> Result<(Cid, &[String]), PathError> {
        if self.namespace != Namespace::Ipfs {
            return Err(PathError::invalid(
                &self.to_string(),
                "root is a name, not a content identifier",
                None,
            ));
        }
        let cid = self.root.parse::<Cid>().map_err(|err| {
            PathError::invalid(&self.to_string(), "root is not a content identifier", Some(err))
        })?;
        Ok((cid, &self.segments))
    }

    /// `true` for an `ipfs` path with no segments after the root.
    pub fn is_just_a_key(&self) -> bool {
        self.namespace == Namespace::Ipfs && self.segments.is_empty()
    }

    /// Drop the last segment, returning the parent path and what was removed.
    pub fn pop_last_segment(&self) -> (Self, Option<String>) {
        let mut parent = self.clone();
        let last = parent.segments.pop();
        (parent, last)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.namespace, self.root)?;
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Join segments with `/`. Pure formatting, no validation.
pub fn join<S: AsRef<str>>(segments: &[S]) -> String {
    segments
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join("/")
}
