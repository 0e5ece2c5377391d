//! 🔧 App Configuration — the sacred flags-or-TOML-to-struct pipeline.
//!
//! 📡 "Which index was that going to again?" — every developer, mid-ingest,
//! scrolling up through their shell history like an archaeologist 🦆
//!
//! 🏗️ Powered by Figment on the env/file side and handed over as ONE immutable
//! struct, because an ambient bag of options consulted from nine places is how
//! you end up debugging a default at 3am. Every component gets this struct at
//! construction. Nobody reaches into the environment afterward. House rule.

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// 📦 The AppConfig: one struct to rule them all, one struct to find them,
/// one struct to bring them all, and in the Figment bind them.
///
/// 🎯 Everything the pipeline needs to know, decided exactly once, before
/// the first byte is read. Immutable thereafter. Like a wedding vow, but kept.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// 📡 Document store cluster URL, e.g. `http://localhost:9200`.
    /// Include scheme + port. Yes, all of it. Yes, I know it worked in dev.
    pub cluster: String,
    /// 📦 The index the documents will call home.
    pub index: String,
    /// 📂 Path to the NDJSON input file. One record per line, no envelope.
    pub file: String,
    /// 🔒 Username for basic auth. Optional, like flossing.
    #[serde(default)]
    pub username: Option<String>,
    /// 🔒 Password. If this is in plaintext in your shell history, I've already
    /// filed a complaint with the Department of Security Choices.
    #[serde(default)]
    pub password: Option<String>,
    /// 🔒 API key auth — the velvet rope variant. Wins over basic auth.
    #[serde(default)]
    pub api_key: Option<String>,
    /// 📄 Which field of each record holds the text to (maybe) chunk.
    #[serde(default = "default_text_field")]
    pub text_field: String,
    /// ✂️ Keep only the text field and the id, dropping everything else the
    /// record was carrying. Marie Kondo mode. The other fields did not spark joy.
    #[serde(default)]
    pub only_text: bool,
    /// 📏 Chunk size limit in bytes. Text longer than this is split into
    /// multiple documents. 0 disables splitting entirely — the whole text
    /// rides as one chunk, no questions asked.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// 🔁 Overlap between consecutive chunks, in bytes. Context glue.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// 🚚 Documents per bulk request. 1 means single-document writes —
    /// the accumulator is bypassed entirely and every document rides alone.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// 🧵 Number of dispatch workers running requests in parallel.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// 🔄 What to do when the store says no. See [`RetryConfig`].
    #[serde(default)]
    pub retry: RetryConfig,
    /// 🌊 Queue-depth thresholds that pause/resume the reader. See [`WatermarkConfig`].
    #[serde(default)]
    pub watermarks: WatermarkConfig,
    /// 📝 Optional append-only file of succeeded document ids, comma-joined.
    /// For post-run reconciliation, or for printing and framing. Your call.
    #[serde(default)]
    pub success_log: Option<PathBuf>,
    /// 📝 Optional append-only file of failed document ids, comma-joined.
    #[serde(default)]
    pub failure_log: Option<PathBuf>,
}

fn default_text_field() -> String {
    "text".to_string()
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_batch_size() -> usize {
    1
}

fn default_concurrency() -> usize {
    1
}

/// 🔄 The retry policy — how stubborn to be when a request fails.
///
/// The historical behavior of this tool's lineage is "retry forever, no
/// backoff, no ceiling" — eventual completion over bounded runtime. That
/// remains the DEFAULT (`max_attempts: None`, `backoff_ms: None`), but it is
/// now a choice you can see and change, instead of a fact you discover while
/// hot-looping against a cluster that is having a rough morning.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RetryConfig {
    /// 🛑 Maximum dispatch attempts per task. `None` = unlimited (the
    /// "we will outlast the outage" setting). `Some(1)` = no retries at all.
    #[serde(default)]
    pub max_attempts: Option<u32>,
    /// ⏳ Base backoff in milliseconds, doubled per attempt, capped at 30s.
    /// `None` = retry immediately, which is honest but impolite to a
    /// degraded store. Consider setting this. The store has feelings. And fans.
    #[serde(default)]
    pub backoff_ms: Option<u64>,
}

/// 🌊 Queue-depth watermarks — the backpressure knobs.
///
/// When more than `high` tasks are pending/in flight, the reader is paused.
/// When completions bring the depth back under `low`, the reader resumes.
/// Level-triggered, idempotent. The gap between the two keeps us from
/// flapping like a screen door in a storm.
#[derive(Debug, Deserialize, Clone)]
pub struct WatermarkConfig {
    /// ⬆️ Pause the reader when queue depth exceeds this.
    #[serde(default = "default_high_watermark")]
    pub high: usize,
    /// ⬇️ Resume the reader when queue depth falls below this.
    #[serde(default = "default_low_watermark")]
    pub low: usize,
}

fn default_high_watermark() -> usize {
    10
}

fn default_low_watermark() -> usize {
    3
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            high: default_high_watermark(),
            low: default_low_watermark(),
        }
    }
}

impl AppConfig {
    /// 🏗️ Build a config from the three required coordinates, everything else
    /// at its default. This is the CLI's door: clap supplies the trio, then
    /// overlays whatever other flags the user actually set.
    pub fn new(cluster: String, index: String, file: String) -> Self {
        Self {
            cluster,
            index,
            file,
            username: None,
            password: None,
            api_key: None,
            text_field: default_text_field(),
            only_text: false,
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            batch_size: default_batch_size(),
            concurrency: default_concurrency(),
            retry: RetryConfig::default(),
            watermarks: WatermarkConfig::default(),
            success_log: None,
            failure_log: None,
        }
    }

    /// 🕵️ Sanity-check the knobs before any byte is read or sent.
    ///
    /// Catching "overlap bigger than the chunk" here costs one `if`.
    /// Catching it mid-run costs an infinite loop and a very long evening.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.chunk_size > 0 && self.chunk_overlap >= self.chunk_size {
            anyhow::bail!(
                "💀 chunk_overlap ({}) must be smaller than chunk_size ({}). Otherwise every chunk starts before the previous one ended, forever, and 'forever' is not a throughput number.",
                self.chunk_overlap,
                self.chunk_size
            );
        }
        if self.batch_size == 0 {
            anyhow::bail!(
                "💀 batch_size is 0. A batch of zero documents is not a batch, it's a moment of silence. Use 1 for single-document writes."
            );
        }
        if self.concurrency == 0 {
            anyhow::bail!(
                "💀 concurrency is 0. Zero workers means the queue fills and nobody ever comes. We've all had jobs like that. Use at least 1."
            );
        }
        if self.watermarks.low >= self.watermarks.high {
            anyhow::bail!(
                "💀 low watermark ({}) must be below the high watermark ({}). Watermarks that cross are how you get a reader with a nervous tic — pause, resume, pause, resume.",
                self.watermarks.low,
                self.watermarks.high
            );
        }
        Ok(())
    }
}

/// 🚀 Load the config — from env vars (SLX_*), an optional TOML file, or both.
///
/// 📐 DESIGN NOTE (no cap, this is tribal knowledge):
///   - If `config_file_name` is None  → env vars only. No file. No assumptions.
///   - If `config_file_name` is Some  → env vars + TOML file, merged. TOML wins on conflicts.
///   The CLI takes a different door entirely: clap builds an [`AppConfig`]
///   directly from flags. Same struct, either way. One shape. No drift.
///
/// 💀 Returns an error if config is unparseable. Check the error message —
/// it's contextual, informative, and written with love. Or despair. Hard to tell at 3am.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    // 🏗️ Start with env vars as the base layer — like a good sourdough starter.
    // ALL SLX_* vars accepted. No ID required. No velvet rope. Everyone's invited.
    let config = Figment::new().merge(Env::prefixed("SLX_"));

    // 🎯 Conditionally layer in TOML only if a file was actually provided.
    // Ancient proverb: "He who defaults to config.toml uninvited, ingests into the wrong index."
    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (SLX_*). \
             The file exists in our hearts, but apparently not in a shape serde accepts.",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (SLX_*). \
                 No file was provided — this one's all on the environment. Classic."
            .to_string(),
    };

    let config: AppConfig = config.extract().context(context_msg)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn write_test_config(contents: &str) -> std::path::PathBuf {
        let timestamp_of_questionable_life_choices = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("💀 Clock went backwards. Time is a flat bug report.")
            .as_nanos();
        let temp_path = std::env::temp_dir().join(format!(
            "slx_app_config_{timestamp_of_questionable_life_choices}.toml"
        ));

        // 🧪 We write a real file here because Figment wants TOML from disk, like it's method acting.
        fs::write(&temp_path, contents)
            .expect("💀 Failed to write test config. The filesystem said 'new phone who dis'.");
        temp_path
    }

    #[test]
    fn the_one_where_defaults_show_up_uninvited_but_helpful() {
        let config_path = write_test_config(
            r#"
            cluster = "http://localhost:9200"
            index = "products"
            file = "catalog.ndjson"
            "#,
        );

        let config = load_config(Some(config_path.as_path()))
            .expect("💀 Minimal config should parse. The defaults had ONE job.");

        assert_eq!(config.text_field, "text");
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.chunk_overlap, 200);
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.concurrency, 1);
        assert!(!config.only_text);
        assert_eq!(config.watermarks.high, 10);
        assert_eq!(config.watermarks.low, 3);
        assert!(config.retry.max_attempts.is_none(), "unlimited retries is the inherited default");
        assert!(config.retry.backoff_ms.is_none());

        fs::remove_file(config_path)
            .expect("💀 Failed to remove test config. Even the trash has trust issues.");
    }

    #[test]
    fn the_one_where_every_knob_gets_turned() {
        let config_path = write_test_config(
            r#"
            cluster = "https://search.example.com:9200"
            index = "catalog"
            file = "data.ndjson"
            username = "elastic"
            password = "hunter2"
            text_field = "description"
            only_text = true
            chunk_size = 512
            chunk_overlap = 64
            batch_size = 50
            concurrency = 4
            success_log = "ok.txt"
            failure_log = "sad.txt"

            [retry]
            max_attempts = 5
            backoff_ms = 250

            [watermarks]
            high = 20
            low = 5
            "#,
        );

        let config = load_config(Some(config_path.as_path()))
            .expect("💀 Fully specified config should parse. Serde left us on read otherwise.");

        assert_eq!(config.text_field, "description");
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.retry.max_attempts, Some(5));
        assert_eq!(config.retry.backoff_ms, Some(250));
        assert_eq!(config.watermarks.high, 20);
        assert_eq!(config.success_log, Some(PathBuf::from("ok.txt")));

        fs::remove_file(config_path)
            .expect("💀 Failed to remove test config. The janitor quit mid-scene.");
    }

    #[test]
    fn the_one_where_overlap_tries_to_eat_the_whole_chunk() {
        let config_path = write_test_config(
            r#"
            cluster = "http://localhost:9200"
            index = "products"
            file = "catalog.ndjson"
            chunk_size = 100
            chunk_overlap = 100
            "#,
        );

        let err = load_config(Some(config_path.as_path()))
            .expect_err("💀 overlap == chunk_size must be rejected, or the splitter never advances");
        assert!(err.to_string().contains("chunk_overlap"));

        fs::remove_file(config_path)
            .expect("💀 Failed to remove test config. Even the trash has trust issues.");
    }

    #[test]
    fn the_one_where_crossed_watermarks_get_bounced_at_the_door() {
        let config = AppConfig {
            cluster: "http://localhost:9200".into(),
            index: "i".into(),
            file: "f".into(),
            username: None,
            password: None,
            api_key: None,
            text_field: "text".into(),
            only_text: false,
            chunk_size: 0,
            chunk_overlap: 0,
            batch_size: 1,
            concurrency: 1,
            retry: RetryConfig::default(),
            watermarks: WatermarkConfig { high: 3, low: 10 },
            success_log: None,
            failure_log: None,
        };
        assert!(config.validate().is_err(), "low above high is a flapping machine, not a config");
    }
}
