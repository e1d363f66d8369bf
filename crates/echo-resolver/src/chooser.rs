// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Node-type choosers: which shape a linked block decodes into.

use echo_cas::cid::DAG_FS;
use echo_cas::Cid;
use echo_dag::Prototype;

/// Where a link was found.
#[derive(Debug, Clone, Copy)]
pub struct LinkContext<'a> {
    /// Block holding the node that carried the link; `None` at the start of a
    /// walk.
    pub parent: Option<&'a Cid>,
    /// Segments followed from the start of the walk up to this link.
    pub path: &'a [String],
}

/// Picks a decoding shape for every block a session loads, the root included.
pub trait NodeChooser: Send + Sync {
    /// Shape for the block behind `link`.
    fn choose(&self, link: &Cid, ctx: &LinkContext<'_>) -> Prototype;
}

impl<F> NodeChooser for F
where
    F: Fn(&Cid, &LinkContext<'_>) -> Prototype + Send + Sync,
{
    fn choose(&self, link: &Cid, ctx: &LinkContext<'_>) -> Prototype {
        self(link, ctx)
    }
}

/// Always the generic shape.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultChooser;

impl NodeChooser for DefaultChooser {
    fn choose(&self, _link: &Cid, _ctx: &LinkContext<'_>) -> Prototype {
        Prototype::Any
    }
}

/// File/directory shape for `dag-fs` links, generic shape for the rest.
///
/// With this chooser `/dir/file` walks directory entries by name, and a file
/// split across many chunk blocks reads as one byte sequence.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathFollowingChooser;

impl NodeChooser for PathFollowingChooser {
    fn choose(&self, link: &Cid, ctx: &LinkContext<'_>) -> Prototype {
        if link.codec() == DAG_FS {
            return Prototype::Fs;
        }
        DefaultChooser.choose(link, ctx)
    }
}
