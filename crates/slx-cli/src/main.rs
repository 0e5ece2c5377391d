//! 🚀 slx-cli — the front door, the bouncer, the maitre d' of sluicex.
//!
//! 🎬 *[narrator voice]* "It all started with a simple main() function..."
//! 📦 This binary crate is the thin CLI wrapper that parses flags,
//! sets up logging, and then lets the real code do the heavy lifting.
//! Like a manager. 🦆

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// 🚰 Stream an NDJSON file into a document store, one bulk request at a time.
///
/// Flags beat environment variables beat the TOML file beat the defaults.
/// A flag left unset simply doesn't vote.
#[derive(Debug, Parser)]
#[command(name = "slx", version, about)]
struct Cli {
    /// 📄 Optional TOML config file; flags and SLX_* env vars layer on top
    #[arg(long)]
    config: Option<PathBuf>,

    /// 📡 Cluster URL, e.g. http://localhost:9200
    #[arg(short, long)]
    cluster: Option<String>,

    /// 🗂️ Target index name
    #[arg(short, long = "index-name")]
    index_name: Option<String>,

    /// 📂 Path to the NDJSON input file
    #[arg(short, long)]
    file: Option<String>,

    /// 🔒 Basic-auth username
    #[arg(short, long)]
    user: Option<String>,

    /// 🔒 Basic-auth password
    #[arg(short, long)]
    password: Option<String>,

    /// 🔑 API key (wins over basic auth when both are set)
    #[arg(long)]
    api_key: Option<String>,

    /// 📝 Name of the field holding the text to chunk
    #[arg(long)]
    text_field: Option<String>,

    /// ✂️ Keep only the id and the text field, drop everything else
    #[arg(long)]
    only_text: bool,

    /// 📏 Chunk size in bytes (snapped to UTF-8 boundaries); 0 disables chunking
    #[arg(long)]
    chunk_size: Option<usize>,

    /// 📏 Overlap between consecutive chunks, in bytes
    #[arg(long)]
    chunk_overlap: Option<usize>,

    /// 🚚 Documents per bulk request; 1 means single-document writes
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// 🧵 Concurrent dispatch workers
    #[arg(long)]
    concurrency: Option<usize>,

    /// 🔄 Give up on a task after this many attempts (default: never)
    #[arg(long)]
    max_attempts: Option<u32>,

    /// ⏳ Base backoff between retries in ms, doubled per attempt (default: none)
    #[arg(long)]
    backoff_ms: Option<u64>,

    /// ✅ Append succeeded document ids to this file
    #[arg(long)]
    success_log: Option<PathBuf>,

    /// 💀 Append permanently failed document ids to this file
    #[arg(long)]
    failure_log: Option<PathBuf>,
}

impl Cli {
    /// 🔧 Lay the flags over whatever the config loader assembled from the
    /// TOML file, the environment, and the defaults. Unset flags don't vote.
    fn overlay(self, config: &mut slx::app_config::AppConfig) {
        if let Some(cluster) = self.cluster {
            config.cluster = cluster;
        }
        if let Some(index) = self.index_name {
            config.index = index;
        }
        if let Some(file) = self.file {
            config.file = file;
        }
        if let Some(user) = self.user {
            config.username = Some(user);
        }
        if let Some(password) = self.password {
            config.password = Some(password);
        }
        if let Some(api_key) = self.api_key {
            config.api_key = Some(api_key);
        }
        if let Some(text_field) = self.text_field {
            config.text_field = text_field;
        }
        if self.only_text {
            config.only_text = true;
        }
        if let Some(chunk_size) = self.chunk_size {
            config.chunk_size = chunk_size;
        }
        if let Some(chunk_overlap) = self.chunk_overlap {
            config.chunk_overlap = chunk_overlap;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(max_attempts) = self.max_attempts {
            config.retry.max_attempts = Some(max_attempts);
        }
        if let Some(backoff_ms) = self.backoff_ms {
            config.retry.backoff_ms = Some(backoff_ms);
        }
        if let Some(success_log) = self.success_log {
            config.success_log = Some(success_log);
        }
        if let Some(failure_log) = self.failure_log {
            config.failure_log = Some(failure_log);
        }
    }
}

/// 🚀 main() — where it all begins. The genesis. The big bang.
/// The "I pressed Enter and held my breath" moment.
///
/// 🔧 Steps:
/// 1. Init tracing (so we can see what goes wrong, and when)
/// 2. Parse flags (clap is picky so we don't have to be)
/// 3. Load config and overlay the flags (the moment of truth)
/// 4. Run the thing (send it and pray 🙏)
/// 5. Handle errors (cry, but informatively)
#[tokio::main]
async fn main() -> Result<()> {
    // 📡 Set up tracing — because println! debugging is a lifestyle choice
    // we're trying to move past, like flip phones and cargo shorts
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    // 🔧 Two doors into the same struct:
    //   flags-only (the trio is on the command line) → build directly;
    //   otherwise → figment assembles env/TOML, and the flags stomp in on
    //   top, because the person at the keyboard outranks the file.
    let mut app_config = match (&cli.config, &cli.cluster, &cli.index_name, &cli.file) {
        (None, Some(cluster), Some(index), Some(file)) => {
            slx::app_config::AppConfig::new(cluster.clone(), index.clone(), file.clone())
        }
        _ => slx::app_config::load_config(cli.config.as_deref())?,
    };
    cli.overlay(&mut app_config);

    // 🚀 SEND IT. No take-backs. The documents are leaving the building.
    let result = slx::run(app_config).await;

    // 💀 Error handling: the part where we find out what went wrong
    // and print it in a way that's helpful at 3am
    if let Err(err) = result {
        error!("💀 error: {}", err);
        // -- 🧅 peel the onion of sadness, one tear-jerking layer at a time
        let mut the_vibes_are_giving_connection_issues = false;
        for cause in err.chain().skip(1) {
            error!("⚠️  cause: {}", cause);
            // -- 🕵️ sniff the cause like a truffle pig hunting for connection problems
            let cause_str = cause.to_string();
            if cause_str.contains("error sending request")
                || cause_str.contains("connection refused")
                || cause_str.contains("Connection refused")
                || cause_str.contains("tcp connect error")
                || cause_str.contains("dns error")
            {
                the_vibes_are_giving_connection_issues = true;
            }
        }

        // -- 📡 if it smells like a connection problem, it's probably a connection problem
        // -- like when your wifi icon has full bars but nothing loads
        if the_vibes_are_giving_connection_issues {
            error!(
                "🔧 hint: looks like the cluster isn't reachable. \
                Double-check that the document store (OpenSearch, Elasticsearch, etc.) \
                is actually running and that --cluster points at it. If you're using \
                Docker, try: `docker ps` to see what's up, or `docker compose up -d` \
                to resurrect it. Even clusters need a nudge sometimes. ☕"
            );
        }

        // 🗑️ Exit with prejudice. Process exitus maximus.
        std::process::exit(1);
    }

    // ✅ If we got here, every document made it. Pop the champagne. 🍾
    Ok(())
}
