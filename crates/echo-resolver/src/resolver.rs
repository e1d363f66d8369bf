// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Resolver facade: the four public resolution operations.
//!
//! Every call opens its own fetch session with a deadline of `now + timeout`.
//! The whole walk runs under that deadline; when it passes, the walk is
//! dropped mid-fetch, the session is released, and the call fails with
//! [`ResolveError::Timeout`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use echo_cas::Cid;
use echo_dag::{Link, Node};
use echo_path::Path;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, instrument};

use crate::chooser::LinkContext;
use crate::config::ResolverConfig;
use crate::error::ResolveError;
use crate::fetch::{BlockService, FetcherConfig, MissingField, Session};
use crate::selector::Selector;
use crate::walk::{resolve_nodes, Walk};

/// Budget applied when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

// About thirty years; stands in for budgets too large to add to a clock reading.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Resolves paths against a merkle-DAG reachable through a [`BlockService`].
///
/// A resolver holds no per-call state and can be shared between tasks.
#[derive(Clone)]
pub struct Resolver {
    fetch: FetcherConfig,
    timeout: Duration,
}

impl Resolver {
    /// Resolver over `service` with the path-following chooser and the
    /// default budget.
    pub fn new(service: Arc<dyn BlockService>) -> Self {
        Self::with_fetcher(FetcherConfig::new(service))
    }

    /// Resolver over `service` tuned by `config`.
    pub fn from_config(service: Arc<dyn BlockService>, config: &ResolverConfig) -> Self {
        Self {
            fetch: FetcherConfig::new(service).with_chooser(config.chooser()),
            timeout: config.timeout(),
        }
    }

    /// Resolver over a prepared fetcher configuration.
    pub fn with_fetcher(fetch: FetcherConfig) -> Self {
        Self {
            fetch,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Replace the per-call budget.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The fetcher configuration sessions are opened from.
    pub fn fetcher(&self) -> &FetcherConfig {
        &self.fetch
    }

    /// Per-call budget.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Deadline for a call starting now. Budgets past the clock's range are
    /// clamped to a far-future instant.
    pub fn deadline(&self) -> Instant {
        let now = Instant::now();
        now.checked_add(self.timeout)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now)
    }

    fn open(&self) -> Session {
        self.fetch.new_session(self.deadline())
    }

    async fn bounded<T, F>(&self, deadline: Instant, work: F) -> Result<T, ResolveError>
    where
        T: Send,
        F: Future<Output = Result<T, ResolveError>> + Send,
    {
        timeout_at(deadline, work).await.map_err(|_| {
            debug!(budget = ?self.timeout, "resolution timed out");
            ResolveError::Timeout {
                budget: self.timeout,
            }
        })?
    }

    /// The node at the end of `path`.
    #[instrument(skip_all, fields(%path))]
    pub async fn resolve_path(&self, path: &Path) -> Result<Node, ResolveError> {
        path.is_valid()?;
        let (root, segments) = path.split_abs_path()?;
        let selector = Selector::leaf(segments);
        let mut session = self.open();
        let deadline = session.deadline();
        self.bounded(deadline, async {
            let walk = resolve_nodes(&mut session, root, &selector).await?;
            let mut nodes = settle(walk, path)?;
            nodes.pop().ok_or_else(|| not_resolved(path))
        })
        .await
    }

    /// Every node along `path`, root first. Never empty on success; the last
    /// element is what [`Self::resolve_path`] returns.
    #[instrument(skip_all, fields(%path))]
    pub async fn resolve_path_components(&self, path: &Path) -> Result<Vec<Node>, ResolveError> {
        path.is_valid()?;
        let (root, segments) = path.split_abs_path()?;
        let selector = Selector::all(segments);
        let mut session = self.open();
        let deadline = session.deadline();
        self.bounded(deadline, async {
            let walk = resolve_nodes(&mut session, root, &selector).await?;
            settle(walk, path)
        })
        .await
    }

    /// Identifier of the last block `path` touches, plus the segments still to
    /// be applied inside it.
    ///
    /// When the final segment is a link the target is returned with no
    /// remainder and is not fetched. When it is inline data, the block that
    /// holds it is returned together with the trailing segments that resolve
    /// inside that block.
    #[instrument(skip_all, fields(%path))]
    pub async fn resolve_to_last_node(
        &self,
        path: &Path,
    ) -> Result<(Cid, Vec<String>), ResolveError> {
        let (root, segments) = path.split_abs_path()?;
        let Some((last, parents)) = segments.split_last() else {
            return Ok((root, Vec::new()));
        };
        let selector = Selector::all(parents);
        let mut session = self.open();
        let deadline = session.deadline();
        self.bounded(deadline, async {
            let (parent, block, depth) = if parents.is_empty() {
                let ctx = LinkContext {
                    parent: None,
                    path: &[],
                };
                (session.load(root, &ctx).await?, root, 0)
            } else {
                let walk = resolve_nodes(&mut session, root, &selector).await?;
                let block = walk.last_block.unwrap_or(root);
                let depth = walk.depth;
                let mut nodes = settle(walk, path)?;
                let parent = nodes.pop().ok_or_else(|| not_resolved(path))?;
                (parent, block, depth)
            };

            let value = parent
                .lookup_by_name(last)
                .map_err(|_| ResolveError::NoLink {
                    name: last.clone(),
                    parent: Some(block),
                })?;
            match value {
                Node::Link(Link::Cid(target)) => Ok((target, Vec::new())),
                Node::Link(link) => Err(ResolveError::UnsupportedLinkKind { link }),
                _ => {
                    // depth never exceeds the number of parent segments
                    let start = segments.len().saturating_sub(depth + 1);
                    debug!(%block, depth, "final segment is inline data");
                    Ok((block, segments[start..].to_vec()))
                }
            }
        })
        .await
    }

    /// Walk `names` from an in-hand node. The result starts with `start` and
    /// holds one node per segment after it.
    #[instrument(skip_all, fields(names = names.len()))]
    pub async fn resolve_links(
        &self,
        start: &Node,
        names: &[String],
    ) -> Result<Vec<Node>, ResolveError> {
        let selector = Selector::all(names);
        let mut session = self.open();
        let deadline = session.deadline();
        self.bounded(deadline, async {
            let mut nodes = vec![start.clone()];
            let missing = session
                .node_matching(start.clone(), &selector, |res| {
                    if !res.path.is_empty() {
                        nodes.push(res.node);
                    }
                })
                .await?;
            if let Some(MissingField { name, block }) = missing {
                return Err(ResolveError::NoLink {
                    name,
                    parent: block,
                });
            }
            Ok(nodes)
        })
        .await
    }
}

/// Follow `names` inside `node` up to the first link and return its target
/// with the names left over after it.
///
/// No blocks are fetched.
pub fn resolve_single(node: &Node, names: &[String]) -> Result<(Cid, Vec<String>), ResolveError> {
    if names.is_empty() {
        return Err(ResolveError::NoComponents);
    }
    let mut current = node.clone();
    for (i, name) in names.iter().enumerate() {
        current = current
            .lookup_by_name(name)
            .map_err(|_| ResolveError::NoLink {
                name: name.clone(),
                parent: None,
            })?;
        match current {
            Node::Link(Link::Cid(target)) => return Ok((target, names[i + 1..].to_vec())),
            Node::Link(link) => return Err(ResolveError::UnsupportedLinkKind { link }),
            _ => {}
        }
    }
    Err(ResolveError::NotResolved {
        path: echo_path::join(names),
    })
}

fn settle(walk: Walk, path: &Path) -> Result<Vec<Node>, ResolveError> {
    if let Some(MissingField { name, block }) = walk.missing {
        return Err(ResolveError::NoLink {
            name,
            parent: block,
        });
    }
    if walk.nodes.is_empty() {
        return Err(not_resolved(path));
    }
    Ok(walk.nodes)
}

fn not_resolved(path: &Path) -> ResolveError {
    ResolveError::NotResolved {
        path: path.to_string(),
    }
}
