// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! echo-resolve
//!
//! Imports blocks into an on-disk store and resolves paths against it.
#![allow(clippy::print_stdout)]

use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use echo_cas::cid::{DAG_CBOR, DAG_FS};
use echo_cas::{Cid, DiskTier};
use echo_dag::codec::{encode_cbor, encode_fs};
use echo_dag::{FsLink, FsNode, Node};
use echo_path::Path;
use echo_resolver::{ConfigService, FsConfigStore, Resolver, ResolverConfig, StoreBlockService};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the block store
    #[clap(long)]
    store: PathBuf,

    /// Directory holding resolver.json (defaults to the user config dir)
    #[clap(long)]
    config_dir: Option<PathBuf>,

    /// Per-call budget in seconds, overriding the configured one
    #[clap(long)]
    timeout: Option<u64>,

    /// Command to execute
    #[clap(subcommand)]
    cmd: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Import a JSON document (file or `-` for stdin) as a dag-cbor block
    PutJson {
        /// Input file, or `-`
        input: String,
    },
    /// Write a dag-fs directory or file block
    PutFs {
        /// Inline data
        #[clap(long)]
        data: Option<String>,
        /// Unnamed chunk links, in order
        #[clap(long = "chunk")]
        chunks: Vec<Cid>,
        /// Directory entries as `name=cid`
        entries: Vec<String>,
    },
    #[clap(flatten)]
    Query(Query),
}

#[derive(clap::Subcommand, Debug)]
enum Query {
    /// Print the node at the end of a path as JSON
    Resolve {
        /// Path to resolve
        path: Path,
    },
    /// Print every node along a path, one JSON document per line
    Components {
        /// Path to resolve
        path: Path,
    },
    /// Print the last block a path touches and the remaining segments
    Last {
        /// Path to resolve
        path: Path,
    },
    /// Write the full content of a file to stdout
    Cat {
        /// Path to a file node
        path: Path,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let store = DiskTier::open(&args.store)
        .with_context(|| format!("opening block store {}", args.store.display()))?;
    let service = Arc::new(StoreBlockService::new(store));

    match args.cmd {
        Command::PutJson { input } => {
            let text = read_input(&input)?;
            let value: serde_json::Value = serde_json::from_str(&text).context("parsing JSON")?;
            let node = Node::from_json(&value)?;
            let cid = service.put(DAG_CBOR, &encode_cbor(&node)?)?;
            info!(%cid, "stored dag-cbor block");
            println!("{cid}");
        }
        Command::PutFs {
            data,
            chunks,
            entries,
        } => {
            let mut links = entries
                .iter()
                .map(|e| parse_entry(e, &service))
                .collect::<Result<Vec<_>>>()?;
            links.extend(chunks.into_iter().map(|cid| FsLink::chunk(cid, 0)));
            let node = FsNode::new(data.unwrap_or_default().into_bytes(), links);
            let cid = service.put(DAG_FS, &encode_fs(&node)?)?;
            info!(%cid, "stored dag-fs block");
            println!("{cid}");
        }
        Command::Query(query) => {
            let config = match args.config_dir {
                Some(dir) => ConfigService::new(FsConfigStore::at(dir)?).resolver()?,
                None => ConfigService::new(FsConfigStore::new()?).resolver()?,
            };
            let resolver = build_resolver(service, &config, args.timeout);
            run_query(&resolver, query).await?;
        }
    }
    Ok(())
}

fn build_resolver(
    service: Arc<StoreBlockService<DiskTier>>,
    config: &ResolverConfig,
    timeout: Option<u64>,
) -> Resolver {
    let resolver = Resolver::from_config(service, config);
    match timeout {
        Some(secs) => resolver.with_timeout(Duration::from_secs(secs)),
        None => resolver,
    }
}

async fn run_query(resolver: &Resolver, query: Query) -> Result<()> {
    match query {
        Query::Resolve { path } => {
            let node = resolver.resolve_path(&path).await?;
            println!("{}", serde_json::to_string_pretty(&node.to_json())?);
        }
        Query::Components { path } => {
            for node in resolver.resolve_path_components(&path).await? {
                println!("{}", node.to_json());
            }
        }
        Query::Last { path } => {
            let (cid, rest) = resolver.resolve_to_last_node(&path).await?;
            println!("{cid}");
            println!("/{}", echo_path::join(&rest));
        }
        Query::Cat { path } => {
            let content = match resolver.resolve_path(&path).await? {
                Node::Fs(file) if !file.is_directory() => {
                    let deadline = resolver.deadline();
                    let mut session = resolver.fetcher().new_session(deadline);
                    tokio::time::timeout_at(deadline, session.read_file(&file))
                        .await
                        .map_err(|_| anyhow!("reading {path} timed out"))??
                }
                Node::Bytes(bytes) => bytes,
                other => bail!("{path} is a {} node, not a file", other.kind()),
            };
            debug!(len = content.len(), "writing file content");
            std::io::stdout().lock().write_all(&content)?;
        }
    }
    Ok(())
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        return Ok(text);
    }
    std::fs::read_to_string(input).with_context(|| format!("reading {input}"))
}

fn parse_entry(entry: &str, service: &StoreBlockService<DiskTier>) -> Result<FsLink> {
    let (name, cid) = entry
        .split_once('=')
        .ok_or_else(|| anyhow!("entry {entry:?} must look like name=cid"))?;
    let cid: Cid = cid.parse()?;
    if !service.has(&cid) {
        debug!(%cid, name, "entry target is not in the local store");
    }
    Ok(FsLink::entry(name, cid, 0))
}
