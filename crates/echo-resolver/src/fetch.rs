// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Fetch collaborator port and per-call fetch sessions.
//!
//! A [`BlockService`] hands out raw block bytes by identifier; it is shared by
//! every concurrent resolution and must be safe for that. A [`Session`] is
//! scoped to one resolution call: it decodes blocks with the configured
//! [`NodeChooser`], runs selector traversals, and deregisters itself when
//! dropped.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use echo_cas::{BlockStore, CasError, Cid};
use echo_dag::{decode, DecodeError, FsNode, Kind, Link, Node, Prototype};
use tokio::time::Instant;
use tracing::debug;

use crate::chooser::{LinkContext, NodeChooser, PathFollowingChooser};
use crate::selector::Selector;

/// Errors raised by the fetch layer.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The service has no block under this identifier.
    #[error("block {0} not found")]
    NotFound(Cid),
    /// Backing store fault or integrity violation.
    #[error("block store: {0}")]
    Store(#[from] CasError),
    /// Block bytes do not decode under the chosen shape.
    #[error("cannot decode block {cid}: {source}")]
    Decode {
        /// Block that failed to decode.
        cid: Cid,
        /// Codec error.
        #[source]
        source: DecodeError,
    },
    /// Traversal reached a link it cannot load.
    #[error("cannot follow {0}")]
    UnsupportedLink(Link),
    /// A file chunk decoded to something that is neither bytes nor a file.
    #[error("block {cid} is a {kind} node, not file content")]
    NotFileContent {
        /// Offending chunk.
        cid: Cid,
        /// What it decoded to.
        kind: Kind,
    },
    /// Service-specific failure (network, remote peer, ...).
    #[error("block service: {0}")]
    Service(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Source of raw block bytes.
#[async_trait]
pub trait BlockService: Send + Sync {
    /// Fetch the bytes of `cid`.
    async fn get_block(&self, cid: &Cid) -> Result<Arc<[u8]>, FetchError>;
}

/// [`BlockService`] over any local [`BlockStore`], verifying every block it
/// hands out.
pub struct StoreBlockService<S> {
    store: RwLock<S>,
}

impl<S: BlockStore> StoreBlockService<S> {
    /// Wrap `store`.
    pub fn new(store: S) -> Self {
        Self {
            store: RwLock::new(store),
        }
    }

    /// Add a block to the underlying store.
    pub fn put(&self, codec: u64, bytes: &[u8]) -> Result<Cid, CasError> {
        self.store
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .put(codec, bytes)
    }

    /// Whether the underlying store holds `cid`.
    pub fn has(&self, cid: &Cid) -> bool {
        self.store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .has(cid)
    }
}

#[async_trait]
impl<S> BlockService for StoreBlockService<S>
where
    S: BlockStore + Send + Sync,
{
    async fn get_block(&self, cid: &Cid) -> Result<Arc<[u8]>, FetchError> {
        let found = self
            .store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(cid)?;
        let bytes = found.ok_or(FetchError::NotFound(*cid))?;
        cid.verify(&bytes)?;
        Ok(bytes)
    }
}

/// Shared configuration that opens fetch sessions.
#[derive(Clone)]
pub struct FetcherConfig {
    service: Arc<dyn BlockService>,
    chooser: Arc<dyn NodeChooser>,
    open_sessions: Arc<AtomicUsize>,
}

impl FetcherConfig {
    /// Sessions over `service`, decoding with [`PathFollowingChooser`].
    pub fn new(service: Arc<dyn BlockService>) -> Self {
        Self {
            service,
            chooser: Arc::new(PathFollowingChooser),
            open_sessions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Replace the node-type chooser.
    pub fn with_chooser(mut self, chooser: Arc<dyn NodeChooser>) -> Self {
        self.chooser = chooser;
        self
    }

    /// Open a session that must finish by `deadline`.
    pub fn new_session(&self, deadline: Instant) -> Session {
        let open = self.open_sessions.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(open, "fetch session opened");
        Session {
            service: Arc::clone(&self.service),
            chooser: Arc::clone(&self.chooser),
            open_sessions: Arc::clone(&self.open_sessions),
            deadline,
            blocks_fetched: 0,
        }
    }

    /// Number of sessions not yet released.
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::Acquire)
    }
}

/// One node delivered by a traversal.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// The matched node.
    pub node: Node,
    /// Block the node physically lives in; `None` when the node is inside the
    /// caller-supplied start node and no link has been crossed yet.
    pub block: Option<Cid>,
    /// Segments followed from the start node.
    pub path: Vec<String>,
}

/// A field the plan asked for that the graph did not have.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingField {
    /// The segment that failed to resolve.
    pub name: String,
    /// Block of the node the lookup ran against.
    pub block: Option<Cid>,
}

struct Frame<'s> {
    value: Node,
    selector: &'s Selector,
    block: Option<Cid>,
    path: Vec<String>,
    load: bool,
}

/// A fetch session, scoped to a single resolution call.
pub struct Session {
    service: Arc<dyn BlockService>,
    chooser: Arc<dyn NodeChooser>,
    open_sessions: Arc<AtomicUsize>,
    deadline: Instant,
    blocks_fetched: usize,
}

impl Session {
    /// Wall-clock deadline for everything done through this session.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Blocks fetched so far.
    pub fn blocks_fetched(&self) -> usize {
        self.blocks_fetched
    }

    /// Fetch and decode the block `cid`, choosing its shape with the session's
    /// chooser.
    pub async fn load(&mut self, cid: Cid, ctx: &LinkContext<'_>) -> Result<Node, FetchError> {
        let prototype = self.chooser.choose(&cid, ctx);
        self.load_as(cid, prototype).await
    }

    async fn load_as(&mut self, cid: Cid, prototype: Prototype) -> Result<Node, FetchError> {
        let bytes = self.service.get_block(&cid).await?;
        self.blocks_fetched += 1;
        debug!(%cid, ?prototype, len = bytes.len(), "fetched block");
        decode(prototype, &cid, &bytes).map_err(|source| FetchError::Decode { cid, source })
    }

    /// Walk `selector` from the block `root`, delivering matches in path order.
    ///
    /// Returns the first field the plan explored but the graph lacked, if any.
    pub async fn block_matching<F>(
        &mut self,
        root: Cid,
        selector: &Selector,
        on_match: F,
    ) -> Result<Option<MissingField>, FetchError>
    where
        F: FnMut(FetchResult) + Send,
    {
        let start = Frame {
            value: Node::link(root),
            selector,
            block: None,
            path: Vec::new(),
            load: true,
        };
        self.traverse(start, on_match).await
    }

    /// Walk `selector` from an in-hand node. The start node itself is not
    /// loaded even if it is a link.
    pub async fn node_matching<F>(
        &mut self,
        start: Node,
        selector: &Selector,
        on_match: F,
    ) -> Result<Option<MissingField>, FetchError>
    where
        F: FnMut(FetchResult) + Send,
    {
        let start = Frame {
            value: start,
            selector,
            block: None,
            path: Vec::new(),
            load: false,
        };
        self.traverse(start, on_match).await
    }

    async fn traverse<F>(
        &mut self,
        start: Frame<'_>,
        mut on_match: F,
    ) -> Result<Option<MissingField>, FetchError>
    where
        F: FnMut(FetchResult) + Send,
    {
        let mut missing = None;
        // depth-first, children pushed in reverse so they pop in plan order
        let mut stack = vec![start];
        while let Some(frame) = stack.pop() {
            let (node, block) = match frame.value {
                Node::Link(Link::Cid(cid)) if frame.load => {
                    let ctx = LinkContext {
                        parent: frame.block.as_ref(),
                        path: &frame.path,
                    };
                    (self.load(cid, &ctx).await?, Some(cid))
                }
                Node::Link(link @ Link::Unsupported(_)) if frame.load => {
                    return Err(FetchError::UnsupportedLink(link));
                }
                value => (value, frame.block),
            };

            let interests = frame.selector.interests();
            let mut children = Vec::with_capacity(interests.len());
            for (name, selector) in interests {
                match node.lookup_by_name(name) {
                    Ok(value) => {
                        let mut path = frame.path.clone();
                        path.push(name.to_owned());
                        children.push(Frame {
                            value,
                            selector,
                            block,
                            path,
                            load: true,
                        });
                    }
                    Err(err) => {
                        debug!(%err, "selector field absent");
                        missing.get_or_insert_with(|| MissingField {
                            name: name.to_owned(),
                            block,
                        });
                    }
                }
            }

            if frame.selector.is_match() {
                on_match(FetchResult {
                    node,
                    block,
                    path: frame.path,
                });
            }
            stack.extend(children.into_iter().rev());
        }
        Ok(missing)
    }

    /// Read the full content of a file node: inline data followed by every
    /// chunk, depth-first, in link order.
    pub async fn read_file(&mut self, file: &FsNode) -> Result<Vec<u8>, FetchError> {
        let mut out = file.data().to_vec();
        let mut pending: Vec<Cid> = file.chunks().map(|l| l.cid).collect();
        pending.reverse();
        let mut chunks = 0usize;
        while let Some(cid) = pending.pop() {
            chunks += 1;
            match self.load_as(cid, Prototype::Fs).await? {
                Node::Fs(chunk) => {
                    out.extend_from_slice(chunk.data());
                    pending.extend(chunk.chunks().map(|l| l.cid).rev());
                }
                Node::Bytes(bytes) => out.extend_from_slice(&bytes),
                other => {
                    return Err(FetchError::NotFileContent {
                        cid,
                        kind: other.kind(),
                    })
                }
            }
        }
        debug!(len = out.len(), chunks, "file read");
        Ok(out)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let open = self.open_sessions.fetch_sub(1, Ordering::AcqRel) - 1;
        debug!(open, blocks_fetched = self.blocks_fetched, "fetch session released");
    }
}
