// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! File/directory shape for `dag-fs` blocks.
//!
//! A `dag-fs` block carries inline `Data` plus an ordered list of links. Named
//! links are directory entries; unnamed links are file chunks whose content
//! follows the inline data. Seen through this shape, a directory looks up its
//! entries by name and a file presents as one byte sequence no matter how many
//! blocks it is split across.

use echo_cas::Cid;

use crate::node::{Kind, Link, LookupError, Node};

/// One link in a `dag-fs` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsLink {
    /// Entry name; empty for file chunks.
    pub name: String,
    /// Target block.
    pub cid: Cid,
    /// Cumulative size of the target, as recorded by the writer.
    pub size: u64,
}

impl FsLink {
    /// A named directory entry.
    pub fn entry(name: impl Into<String>, cid: Cid, size: u64) -> Self {
        Self {
            name: name.into(),
            cid,
            size,
        }
    }

    /// An unnamed file chunk.
    pub fn chunk(cid: Cid, size: u64) -> Self {
        Self::entry(String::new(), cid, size)
    }
}

/// Specialized view of a decoded `dag-fs` block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FsNode {
    data: Vec<u8>,
    links: Vec<FsLink>,
}

impl FsNode {
    /// Build from inline data and links (order preserved).
    pub fn new(data: Vec<u8>, links: Vec<FsLink>) -> Self {
        Self { data, links }
    }

    /// Inline data carried by this block.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// All links, in block order.
    pub fn links(&self) -> &[FsLink] {
        &self.links
    }

    /// Named links (directory entries).
    pub fn entries(&self) -> impl DoubleEndedIterator<Item = &FsLink> {
        self.links.iter().filter(|l| !l.name.is_empty())
    }

    /// Unnamed links (file chunks), in content order.
    pub fn chunks(&self) -> impl DoubleEndedIterator<Item = &FsLink> {
        self.links.iter().filter(|l| l.name.is_empty())
    }

    /// A block with any named entry is a directory.
    pub fn is_directory(&self) -> bool {
        self.entries().next().is_some()
    }

    /// Directories are maps; everything else reads as bytes.
    pub fn kind(&self) -> Kind {
        if self.is_directory() {
            Kind::Map
        } else {
            Kind::Bytes
        }
    }

    /// Resolve a directory entry to its link. First entry wins on duplicates.
    pub fn lookup_by_name(&self, name: &str) -> Result<Node, LookupError> {
        if name.is_empty() {
            return Err(LookupError::NotFound { name: String::new() });
        }
        self.entries()
            .find(|l| l.name == name)
            .map(|l| Node::Link(Link::Cid(l.cid)))
            .ok_or_else(|| LookupError::NotFound {
                name: name.to_owned(),
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use echo_cas::cid::{DAG_FS, RAW};

    #[test]
    fn directory_entries_resolve_to_links() {
        let child = Cid::of(DAG_FS, b"child");
        let dir = FsNode::new(vec![], vec![FsLink::entry("child", child, 5)]);
        assert!(dir.is_directory());
        assert_eq!(dir.kind(), Kind::Map);
        assert_eq!(dir.lookup_by_name("child").unwrap(), Node::link(child));
        assert!(matches!(
            dir.lookup_by_name("other"),
            Err(LookupError::NotFound { .. })
        ));
    }

    #[test]
    fn chunks_are_not_addressable_by_name() {
        let chunk = Cid::of(RAW, b"part");
        let file = FsNode::new(b"head".to_vec(), vec![FsLink::chunk(chunk, 4)]);
        assert!(!file.is_directory());
        assert_eq!(file.kind(), Kind::Bytes);
        assert_eq!(file.chunks().count(), 1);
        assert!(file.lookup_by_name("").is_err());
    }

    #[test]
    fn links_can_be_walked_from_either_end() {
        let first = Cid::of(RAW, b"first");
        let second = Cid::of(RAW, b"second");
        let child = Cid::of(DAG_FS, b"child");
        let node = FsNode::new(
            vec![],
            vec![
                FsLink::chunk(first, 5),
                FsLink::entry("a", child, 1),
                FsLink::chunk(second, 6),
            ],
        );
        let reversed: Vec<Cid> = node.chunks().rev().map(|l| l.cid).collect();
        assert_eq!(reversed, [second, first]);
        assert_eq!(node.entries().next_back().map(|l| l.name.as_str()), Some("a"));
    }
}
