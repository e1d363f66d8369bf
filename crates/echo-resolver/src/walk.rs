// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Graph walker: runs a compiled plan from a root block and keeps track of
//! how far the walk has gone inside the current block.

use echo_cas::Cid;
use echo_dag::Node;
use tracing::{debug, instrument};

use crate::fetch::{FetchError, MissingField, Session};
use crate::selector::Selector;

/// Counts consecutive matches that stayed inside one block.
///
/// The first match in a block has depth 0; each further match from the same
/// block adds one. Blocks are compared by identifier only.
#[derive(Debug, Default, Clone)]
pub struct BlockBoundary {
    last: Option<Cid>,
    depth: usize,
}

impl BlockBoundary {
    /// Record a match that came from `block` and return the new depth.
    pub fn observe(&mut self, block: Cid) -> usize {
        if self.last == Some(block) {
            self.depth += 1;
        } else {
            debug!(%block, "entered block");
            self.last = Some(block);
            self.depth = 0;
        }
        self.depth
    }

    /// Block of the most recent match.
    pub fn last_block(&self) -> Option<Cid> {
        self.last
    }

    /// Depth of the most recent match inside [`Self::last_block`].
    pub fn depth(&self) -> usize {
        self.depth
    }
}

/// Outcome of one walk.
#[derive(Debug, Clone, Default)]
pub struct Walk {
    /// Matched nodes in path order.
    pub nodes: Vec<Node>,
    /// Block of the last match.
    pub last_block: Option<Cid>,
    /// Matches since the last block boundary, minus one.
    pub depth: usize,
    /// First field the plan asked for that the graph lacked.
    pub missing: Option<MissingField>,
}

/// Walk `selector` from the block `root`.
///
/// Matches without an originating block are attributed to `root`.
#[instrument(skip_all, fields(%root))]
pub async fn resolve_nodes(
    session: &mut Session,
    root: Cid,
    selector: &Selector,
) -> Result<Walk, FetchError> {
    let mut nodes = Vec::new();
    let mut boundary = BlockBoundary::default();
    let missing = session
        .block_matching(root, selector, |res| {
            boundary.observe(res.block.unwrap_or(root));
            nodes.push(res.node);
        })
        .await?;
    debug!(
        matches = nodes.len(),
        depth = boundary.depth(),
        missing = missing.is_some(),
        "walk finished"
    );
    Ok(Walk {
        nodes,
        last_block: boundary.last_block(),
        depth: boundary.depth(),
        missing,
    })
}
