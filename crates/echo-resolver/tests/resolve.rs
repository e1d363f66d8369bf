// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs, clippy::unwrap_used, clippy::panic)]
//! End-to-end resolution over an in-memory block store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use echo_cas::cid::{DAG_CBOR, DAG_FS};
use echo_cas::{Cid, MemoryTier};
use echo_dag::codec::{encode_cbor, encode_fs};
use echo_dag::{FsLink, FsNode, Link, Node};
use echo_path::Path;
use echo_resolver::{
    BlockService, DefaultChooser, FetchError, FetcherConfig, ResolveError, Resolver,
    ResolverConfig, StoreBlockService,
};

type Store = Arc<StoreBlockService<MemoryTier>>;

fn store() -> Store {
    Arc::new(StoreBlockService::new(MemoryTier::new()))
}

fn put(store: &Store, node: &Node) -> Cid {
    store.put(DAG_CBOR, &encode_cbor(node).unwrap()).unwrap()
}

fn path(root: Cid, rest: &str) -> Path {
    Path::parse(&format!("/ipfs/{root}/{rest}")).unwrap()
}

/// Counts every block request before passing it on.
struct Counting {
    inner: Store,
    fetched: AtomicUsize,
}

impl Counting {
    fn new(inner: Store) -> Arc<Self> {
        Arc::new(Self {
            inner,
            fetched: AtomicUsize::new(0),
        })
    }

    fn fetched(&self) -> usize {
        self.fetched.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlockService for Counting {
    async fn get_block(&self, cid: &Cid) -> Result<Arc<[u8]>, FetchError> {
        self.fetched.fetch_add(1, Ordering::SeqCst);
        self.inner.get_block(cid).await
    }
}

/// Never answers.
struct Stalled;

#[async_trait]
impl BlockService for Stalled {
    async fn get_block(&self, _cid: &Cid) -> Result<Arc<[u8]>, FetchError> {
        std::future::pending::<Result<Arc<[u8]>, FetchError>>().await
    }
}

/// A -child-> B -grandchild-> C, one block each.
fn chain(store: &Store) -> (Cid, Cid, Cid) {
    let c = put(store, &Node::map([("v", Node::string("leaf"))]));
    let b = put(store, &Node::map([("grandchild", Node::link(c))]));
    let a = put(store, &Node::map([("child", Node::link(b))]));
    (a, b, c)
}

#[tokio::test]
async fn resolves_across_block_boundaries() {
    let store = store();
    let (a, _, c) = chain(&store);
    let resolver = Resolver::new(store);
    let p = path(a, "child/grandchild");

    let node = resolver.resolve_path(&p).await.unwrap();
    assert_eq!(node, Node::map([("v", Node::string("leaf"))]));

    let (last, rest) = resolver.resolve_to_last_node(&p).await.unwrap();
    assert_eq!(last, c);
    assert!(rest.is_empty());
}

#[tokio::test]
async fn root_alone_needs_no_fetch() {
    let counting = Counting::new(store());
    let resolver = Resolver::new(counting.clone());
    // the root block does not even exist
    let ghost = Cid::of(DAG_CBOR, b"nowhere");

    let (last, rest) = resolver
        .resolve_to_last_node(&Path::from_cid(&ghost))
        .await
        .unwrap();
    assert_eq!(last, ghost);
    assert!(rest.is_empty());
    assert_eq!(counting.fetched(), 0);
}

#[tokio::test]
async fn final_link_target_is_not_fetched() {
    let store = store();
    // B is never stored: only A can be fetched
    let b = Cid::of(DAG_CBOR, b"elsewhere");
    let a = put(&store, &Node::map([("child", Node::link(b))]));
    let counting = Counting::new(store);
    let resolver = Resolver::new(counting.clone());

    let (last, rest) = resolver
        .resolve_to_last_node(&path(a, "child"))
        .await
        .unwrap();
    assert_eq!(last, b);
    assert!(rest.is_empty());
    assert_eq!(counting.fetched(), 1);
}

#[tokio::test]
async fn inline_value_yields_block_and_remainder() {
    let store = store();
    let blk = put(
        &store,
        &Node::map([("foo", Node::map([("bar", Node::string("baz"))]))]),
    );
    let resolver = Resolver::new(store);

    let (last, rest) = resolver
        .resolve_to_last_node(&path(blk, "foo/bar"))
        .await
        .unwrap();
    assert_eq!(last, blk);
    assert_eq!(rest, ["foo", "bar"]);
}

#[tokio::test]
async fn remainder_restarts_after_a_boundary() {
    let store = store();
    let inner = put(&store, &Node::map([("x", Node::map([("y", Node::Integer(7))]))]));
    let outer = put(&store, &Node::map([("in", Node::link(inner))]));
    let resolver = Resolver::new(store);

    let (last, rest) = resolver
        .resolve_to_last_node(&path(outer, "in/x/y"))
        .await
        .unwrap();
    assert_eq!(last, inner);
    assert_eq!(rest, ["x", "y"]);
}

#[tokio::test]
async fn missing_field_names_its_parent_block() {
    let store = store();
    let (a, b, _) = chain(&store);
    let resolver = Resolver::new(store);

    let err = resolver
        .resolve_path(&path(a, "child/nope"))
        .await
        .unwrap_err();
    assert!(
        matches!(&err, ResolveError::NoLink { name, parent } if name == "nope" && *parent == Some(b)),
        "{err:?}"
    );

    let err = resolver
        .resolve_path_components(&path(a, "nope/child"))
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::NoLink { parent, .. } if parent == Some(a)));

    let err = resolver
        .resolve_to_last_node(&path(a, "child/nope"))
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::NoLink { parent, .. } if parent == Some(b)));
}

#[tokio::test]
async fn components_run_root_to_leaf() {
    let store = store();
    let (a, _, _) = chain(&store);
    let resolver = Resolver::new(store);
    let p = path(a, "child/grandchild");

    let nodes = resolver.resolve_path_components(&p).await.unwrap();
    assert_eq!(nodes.len(), 3);
    assert_eq!(nodes[0].lookup_by_name("child").unwrap().kind(), echo_dag::Kind::Link);
    assert_eq!(nodes.last(), Some(&resolver.resolve_path(&p).await.unwrap()));

    let root_only = resolver
        .resolve_path_components(&Path::from_cid(&a))
        .await
        .unwrap();
    assert_eq!(root_only.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn expired_deadline_cancels_and_releases_session() {
    let resolver = Resolver::new(Arc::new(Stalled)).with_timeout(Duration::from_millis(50));
    let root = Cid::of(DAG_CBOR, b"slow");

    let err = resolver
        .resolve_path(&path(root, "a/b"))
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::Timeout { budget } if budget == Duration::from_millis(50)));
    assert_eq!(resolver.fetcher().open_sessions(), 0);
}

#[tokio::test]
async fn unbounded_budgets_do_not_overflow_the_clock() {
    let store = store();
    let (a, _, _) = chain(&store);
    let p = path(a, "child/grandchild");

    let config = ResolverConfig {
        timeout_secs: u64::MAX,
        follow_fs: true,
    };
    let from_config = Resolver::from_config(store.clone(), &config);
    assert!(from_config.resolve_path(&p).await.is_ok());

    let max = Resolver::new(store).with_timeout(Duration::MAX);
    assert!(max.deadline() > tokio::time::Instant::now());
    assert_eq!(max.resolve_path_components(&p).await.unwrap().len(), 3);
    assert!(max.resolve_to_last_node(&p).await.is_ok());
}

#[tokio::test]
async fn sessions_are_released_after_every_call() {
    let store = store();
    let (a, _, _) = chain(&store);
    let resolver = Resolver::new(store);

    let good = path(a, "child/grandchild");
    let bad = path(a, "missing");
    let (ok, err) = tokio::join!(resolver.resolve_path(&good), resolver.resolve_path(&bad));
    assert!(ok.is_ok());
    assert!(err.is_err());
    assert_eq!(resolver.fetcher().open_sessions(), 0);
}

#[tokio::test]
async fn links_are_followed_from_an_in_hand_node() {
    let store = store();
    let b = put(&store, &Node::map([("b", Node::Integer(1))]));
    let start = Node::map([("a", Node::link(b))]);
    let resolver = Resolver::new(store);

    let names = vec!["a".to_owned(), "b".to_owned()];
    let nodes = resolver.resolve_links(&start, &names).await.unwrap();
    assert_eq!(
        nodes,
        vec![start.clone(), Node::map([("b", Node::Integer(1))]), Node::Integer(1)]
    );

    let only_start = resolver.resolve_links(&start, &[]).await.unwrap();
    assert_eq!(only_start, vec![start.clone()]);

    let err = resolver
        .resolve_links(&start, &["zzz".to_owned()])
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::NoLink { parent: None, .. }));
}

#[tokio::test]
async fn unsupported_links_are_fatal() {
    let store = store();
    let a = put(
        &store,
        &Node::map([("x", Node::Link(Link::Unsupported(vec![1, 2, 3])))]),
    );
    let resolver = Resolver::new(store);

    let err = resolver
        .resolve_to_last_node(&path(a, "x"))
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::UnsupportedLinkKind { .. }));

    let err = resolver.resolve_path(&path(a, "x")).await.unwrap_err();
    assert!(matches!(err, ResolveError::UnsupportedLinkKind { .. }));
}

#[tokio::test]
async fn name_paths_are_rejected() {
    let resolver = Resolver::new(store());
    let p = Path::parse("/ipns/example.org/a").unwrap();
    assert!(matches!(
        resolver.resolve_path(&p).await,
        Err(ResolveError::InvalidPath(_))
    ));
}

#[tokio::test]
async fn paths_are_validated_before_any_fetch() {
    let counting = Counting::new(store());
    let resolver = Resolver::new(counting.clone());
    let p = Path::parse("/ipns/example.org/a/b").unwrap();

    assert!(matches!(
        resolver.resolve_path_components(&p).await,
        Err(ResolveError::InvalidPath(_))
    ));
    assert!(matches!(
        resolver.resolve_path(&p).await,
        Err(ResolveError::InvalidPath(_))
    ));
    assert_eq!(counting.fetched(), 0);
    assert_eq!(resolver.fetcher().open_sessions(), 0);
}

/// dir -sub-> subdir -file.txt-> file (head + two chunks)
fn tree(store: &Store) -> (Cid, Cid) {
    let put_fs = |node: &FsNode| store.put(DAG_FS, &encode_fs(node).unwrap()).unwrap();
    let one = put_fs(&FsNode::new(b"lo, ".to_vec(), vec![]));
    let two = store.put(echo_cas::cid::RAW, b"world").unwrap();
    let file = put_fs(&FsNode::new(
        b"hel".to_vec(),
        vec![FsLink::chunk(one, 4), FsLink::chunk(two, 5)],
    ));
    let sub = put_fs(&FsNode::new(vec![], vec![FsLink::entry("file.txt", file, 12)]));
    let dir = put_fs(&FsNode::new(vec![], vec![FsLink::entry("sub", sub, 40)]));
    (dir, file)
}

#[tokio::test]
async fn directories_resolve_by_entry_name() {
    let store = store();
    let (dir, file) = tree(&store);
    let resolver = Resolver::new(store);
    let p = path(dir, "sub/file.txt");

    let Node::Fs(found) = resolver.resolve_path(&p).await.unwrap() else {
        panic!("expected a file node");
    };
    let mut session = resolver.fetcher().new_session(resolver.deadline());
    assert_eq!(session.read_file(&found).await.unwrap(), b"hello, world");
    drop(session);

    let (last, rest) = resolver.resolve_to_last_node(&p).await.unwrap();
    assert_eq!(last, file);
    assert!(rest.is_empty());
}

#[tokio::test]
async fn generic_chooser_sees_dag_fs_as_plain_maps() {
    let store = store();
    let (dir, _) = tree(&store);
    let fetch = FetcherConfig::new(store).with_chooser(Arc::new(DefaultChooser));
    let resolver = Resolver::with_fetcher(fetch);

    let err = resolver
        .resolve_path(&path(dir, "sub/file.txt"))
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::NoLink { name, .. } if name == "sub"));

    let links = resolver.resolve_path(&path(dir, "Links")).await.unwrap();
    assert_eq!(links.kind(), echo_dag::Kind::List);
}
