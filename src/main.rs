// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: MIT

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::time::Duration;
use url::Url;

use sharded_merkle::client::registry::root_key;
use sharded_merkle::client::{CachedStore, FileRegistry, FileStore, UriStore};
use sharded_merkle::config::{DEFAULT_IPFS_GATEWAY, DEFAULT_MAX_SHARD_SIZE};
use sharded_merkle::proofs::parse_address;
use sharded_merkle::types::{parse_hash32, parse_uint_str};
use sharded_merkle::{
    BuilderConfig, ClaimProof, ProofResolver, RawEntry, Resolution, ResolverConfig,
    ShardedSnapshotBuilder,
};

/// Build and query sharded Merkle snapshots for airdrop allowlists
#[derive(Parser, Debug)]
#[command(name = "sharded-merkle")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build a snapshot from an entries file and publish it to a directory
    Build(BuildArgs),
    /// Resolve the claim proof for one recipient
    Resolve(ResolveArgs),
    /// Check a claim proof against a root offline
    Verify(VerifyArgs),
}

#[derive(Args, Debug)]
struct BuildArgs {
    /// JSON array of entries: {"recipient", "tokenId", "amount"?}
    #[arg(long)]
    entries: PathBuf,

    /// Directory the shard files and snapshot info are written to
    #[arg(long)]
    out_dir: PathBuf,

    /// URI the output directory will be served under
    #[arg(long)]
    base_uri: String,

    /// Fixed shard prefix length in hex characters
    #[arg(long, conflicts_with = "max_shard_size")]
    shard_nybbles: Option<u8>,

    /// Target upper bound on entries per shard
    #[arg(long, default_value_t = DEFAULT_MAX_SHARD_SIZE)]
    max_shard_size: usize,

    /// Where the snapshot info is published (defaults to <base-uri>/info.json)
    #[arg(long)]
    snapshot_uri: Option<String>,

    /// Contract metadata file to register the root in (defaults to <out-dir>/metadata.json)
    #[arg(long)]
    registry: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ResolveArgs {
    /// Contract metadata file holding the root registry
    #[arg(long)]
    registry: PathBuf,

    /// Published Merkle root
    #[arg(long)]
    root: String,

    /// Recipient address
    #[arg(long)]
    recipient: String,

    /// Only match the entry carrying this token id
    #[arg(long)]
    token_id: Option<String>,

    /// Serve URIs under a prefix from a local directory: <prefix>=<dir>
    #[arg(long = "mount", value_parser = parse_mount)]
    mounts: Vec<(String, PathBuf)>,

    /// Treat an unreachable shard as "not eligible" instead of failing
    #[arg(long)]
    lenient: bool,

    /// Allow snapshots to reference local file:// URLs
    #[arg(long)]
    file_urls: bool,

    #[command(flatten)]
    transport: TransportArgs,
}

#[derive(Args, Debug)]
struct TransportArgs {
    /// Gateway used for ipfs:// URIs
    #[arg(long, env = "SHARDED_MERKLE_IPFS_GATEWAY", default_value = DEFAULT_IPFS_GATEWAY)]
    ipfs_gateway: String,

    /// Per-request timeout in seconds
    #[arg(long, env = "SHARDED_MERKLE_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,
}

#[derive(Args, Debug)]
struct VerifyArgs {
    /// Merkle root the claim is checked against
    #[arg(long)]
    root: String,

    /// Claim proof JSON as printed by `resolve`
    #[arg(long)]
    claim: PathBuf,
}

fn parse_mount(s: &str) -> Result<(String, PathBuf)> {
    let (prefix, dir) = s
        .split_once('=')
        .ok_or_else(|| anyhow!("expected <prefix>=<dir>, got '{}'", s))?;
    Ok((prefix.to_string(), PathBuf::from(dir)))
}

async fn build(args: BuildArgs) -> Result<ExitCode> {
    let raw = tokio::fs::read(&args.entries)
        .await
        .with_context(|| format!("Failed to read {}", args.entries.display()))?;
    let entries: Vec<RawEntry> =
        serde_json::from_slice(&raw).context("Failed to parse entries file")?;

    let config = BuilderConfig {
        shard_nybbles: args.shard_nybbles,
        max_shard_size: args.max_shard_size,
    };
    let snapshot = ShardedSnapshotBuilder::new(config).build_raw(entries)?;
    tracing::info!(
        entries = snapshot.entry_count,
        shards = snapshot.shards.len(),
        shard_nybbles = snapshot.shard_nybbles,
        largest = snapshot.largest_shard(),
        "built snapshot"
    );

    let base_uri = args.base_uri.trim_end_matches('/').to_string();
    Url::parse(&base_uri).with_context(|| format!("--base-uri '{}' is not a URL", base_uri))?;
    let snapshot_uri = args
        .snapshot_uri
        .unwrap_or_else(|| format!("{}/info.json", base_uri));
    let registry_path = args
        .registry
        .unwrap_or_else(|| args.out_dir.join("metadata.json"));

    let store = FileStore::new().mount(base_uri.clone(), &args.out_dir);
    let registry = FileRegistry::new(registry_path);
    snapshot
        .publish(&store, &registry, &base_uri, &snapshot_uri)
        .await
        .context("Failed to publish snapshot")?;

    println!("{}", root_key(&snapshot.merkle_root));
    Ok(ExitCode::SUCCESS)
}

async fn resolve(args: ResolveArgs) -> Result<ExitCode> {
    let root = parse_hash32(&args.root)?;
    let recipient = parse_address(&args.recipient)?;
    let token_id = args
        .token_id
        .as_deref()
        .map(|t| parse_uint_str(t, "tokenId"))
        .transpose()?;

    let config = ResolverConfig {
        request_timeout: Duration::from_secs(args.transport.timeout_secs),
        ipfs_gateway: args.transport.ipfs_gateway,
        ..ResolverConfig::default()
    };
    let file = args
        .mounts
        .into_iter()
        .fold(FileStore::new(), |store, (prefix, dir)| store.mount(prefix, dir));
    let store = CachedStore::new(UriStore::from_config(&config, file)?.with_file_urls(args.file_urls));
    let resolver = ProofResolver::with_config(store, FileRegistry::new(args.registry), config);

    match resolver
        .resolve_detailed(&root, &recipient, token_id, args.lenient)
        .await?
    {
        Resolution::Eligible(claim) => {
            println!("{}", serde_json::to_string_pretty(&claim)?);
            Ok(ExitCode::SUCCESS)
        }
        Resolution::NotEligible(reason) => {
            eprintln!("not eligible: {:?}", reason);
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn verify(args: VerifyArgs) -> Result<ExitCode> {
    let root = parse_hash32(&args.root)?;
    let raw = tokio::fs::read(&args.claim)
        .await
        .with_context(|| format!("Failed to read {}", args.claim.display()))?;
    let claim: ClaimProof = serde_json::from_slice(&raw).context("Failed to parse claim")?;

    if claim.verify(&root) {
        println!("valid");
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("invalid: proof does not reach {}", root_key(&root));
        Ok(ExitCode::FAILURE)
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Build(args) => build(args).await,
        Commands::Resolve(args) => resolve(args).await,
        Commands::Verify(args) => verify(args).await,
    }
}
