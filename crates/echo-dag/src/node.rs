// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Decoded, navigable nodes.

use std::collections::BTreeMap;
use std::fmt;

use echo_cas::Cid;

use crate::fs::FsNode;

/// Data-model discriminant of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Absent value.
    Null,
    /// Boolean scalar.
    Bool,
    /// Integer scalar.
    Integer,
    /// Floating-point scalar.
    Float,
    /// UTF-8 string.
    String,
    /// Opaque bytes.
    Bytes,
    /// Ordered sequence, looked up by decimal index.
    List,
    /// String-keyed mapping.
    Map,
    /// Reference to another block.
    Link,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::String => "string",
            Self::Bytes => "bytes",
            Self::List => "list",
            Self::Map => "map",
            Self::Link => "link",
        };
        f.write_str(name)
    }
}

/// A typed edge to another block.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Link {
    /// Content-identifier link; the only form traversal can follow.
    Cid(Cid),
    /// Link payload that does not parse as an identifier this crate supports.
    Unsupported(Vec<u8>),
}

impl Link {
    /// The target identifier, if this is a [`Link::Cid`].
    pub fn as_cid(&self) -> Option<&Cid> {
        match self {
            Self::Cid(cid) => Some(cid),
            Self::Unsupported(_) => None,
        }
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cid(cid) => write!(f, "{cid}"),
            Self::Unsupported(raw) => write!(f, "<unsupported link {}>", hex::encode(raw)),
        }
    }
}

/// Failure of a field lookup or link coercion.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    /// No field or entry under this name.
    #[error("no field named {name:?}")]
    NotFound {
        /// The name that was looked up.
        name: String,
    },
    /// The node is a scalar and has no named children.
    #[error("cannot look up {name:?} on a {kind} node")]
    NotTraversable {
        /// The name that was looked up.
        name: String,
        /// Kind of the node the lookup ran against.
        kind: Kind,
    },
    /// `as_link` called on a node that is not a link.
    #[error("expected a link, found a {kind} node")]
    NotALink {
        /// Kind of the node that was coerced.
        kind: Kind,
    },
}

/// A decoded graph node.
///
/// Every shape answers the same three questions: [`kind`](Node::kind),
/// [`lookup_by_name`](Node::lookup_by_name) and [`as_link`](Node::as_link).
/// The generic shapes mirror the data model; [`Node::Fs`] is the specialized
/// file/directory shape selected for `dag-fs` blocks.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Absent value.
    Null,
    /// Boolean scalar.
    Bool(bool),
    /// Integer scalar (wide enough for any CBOR integer).
    Integer(i128),
    /// Floating-point scalar.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Opaque bytes.
    Bytes(Vec<u8>),
    /// Ordered sequence.
    List(Vec<Node>),
    /// String-keyed mapping.
    Map(BTreeMap<String, Node>),
    /// Reference to another block.
    Link(Link),
    /// File/directory view over a `dag-fs` block.
    Fs(FsNode),
}

impl Node {
    /// Build a map node from `(key, value)` pairs.
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Node)>,
    {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Build a string node.
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    /// Build a link node pointing at `cid`.
    pub fn link(cid: Cid) -> Self {
        Self::Link(Link::Cid(cid))
    }

    /// Data-model kind of this node.
    pub fn kind(&self) -> Kind {
        match self {
            Self::Null => Kind::Null,
            Self::Bool(_) => Kind::Bool,
            Self::Integer(_) => Kind::Integer,
            Self::Float(_) => Kind::Float,
            Self::String(_) => Kind::String,
            Self::Bytes(_) => Kind::Bytes,
            Self::List(_) => Kind::List,
            Self::Map(_) => Kind::Map,
            Self::Link(_) => Kind::Link,
            Self::Fs(fs) => fs.kind(),
        }
    }

    /// Look up a child by name. Lists accept decimal indices.
    pub fn lookup_by_name(&self, name: &str) -> Result<Node, LookupError> {
        let not_found = || LookupError::NotFound {
            name: name.to_owned(),
        };
        match self {
            Self::Map(entries) => entries.get(name).cloned().ok_or_else(not_found),
            Self::List(items) => name
                .parse::<usize>()
                .ok()
                .and_then(|idx| items.get(idx))
                .cloned()
                .ok_or_else(not_found),
            Self::Fs(fs) => fs.lookup_by_name(name),
            other => Err(LookupError::NotTraversable {
                name: name.to_owned(),
                kind: other.kind(),
            }),
        }
    }

    /// Coerce to a link.
    pub fn as_link(&self) -> Result<&Link, LookupError> {
        match self {
            Self::Link(link) => Ok(link),
            other => Err(LookupError::NotALink { kind: other.kind() }),
        }
    }
}
