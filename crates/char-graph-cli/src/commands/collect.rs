//! Collect command implementation.
//!
//! Samples one prompt `n` times against an OpenAI-compatible endpoint and
//! writes the run snapshot, resuming from an earlier snapshot with the same
//! fingerprint when one exists in the output directory.

use std::path::PathBuf;

use anyhow::{Context, Result};
use char_graph_collector::{CollectionOutcome, CollectionSession, OpenAiSampler, RunKey, RunStore};
use clap::Args;
use tracing::info;

use crate::config::Config;

/// Flags of `cgc collect`.
#[derive(Args, Debug, Clone)]
pub struct CollectArgs {
    /// Prompt sent on every attempt.
    #[arg(long)]
    pub prompt: String,

    /// Target number of successful samples.
    #[arg(long, default_value_t = 10)]
    pub n: usize,

    /// Requests in flight at once.
    #[arg(long, default_value_t = 5)]
    pub concurrency: usize,

    /// Model name (defaults to the configured model).
    #[arg(long)]
    pub model: Option<String>,

    /// Write every snapshot to this exact file.
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Directory for snapshots and resumption lookup.
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Sampling temperature.
    #[arg(long, default_value_t = 1.0)]
    pub temp: f64,

    /// Output token budget per sample.
    #[arg(long, default_value_t = 50)]
    pub max_tokens: u32,

    /// Record per-token log-probabilities.
    #[arg(long)]
    pub debug: bool,

    /// Completions between checkpoints (default: a fifth of what is needed).
    #[arg(long)]
    pub checkpoint_interval: Option<usize>,

    /// Retries for rate-limit, server and transport failures.
    #[arg(long)]
    pub max_retries: Option<u32>,
}

impl CollectArgs {
    fn run_key(&self, config: &Config) -> RunKey {
        let model = self.model.clone().unwrap_or_else(|| config.model.clone());
        RunKey::new(model, self.prompt.clone(), self.temp, self.max_tokens, self.debug)
    }

    fn store(&self, config: &Config) -> RunStore {
        let out_dir = self.out_dir.clone().unwrap_or_else(|| config.output_dir.clone());
        RunStore::new(out_dir).with_output_path(self.out.clone())
    }
}

/// Execute the collect command.
pub async fn execute(config: &Config, args: CollectArgs) -> Result<CollectionOutcome> {
    let api_key = config.api_key.clone().unwrap_or_default();
    let sampler = OpenAiSampler::new(&config.api_url, api_key)
        .context("Set OPENAI_API_KEY in the environment or a .env file")?
        .with_max_retries(args.max_retries.unwrap_or(config.max_retries));

    let key = args.run_key(config);
    let store = args.store(config);
    info!(model = %key.model, api_url = %config.api_url, "collect_start");

    println!("🎯 Collecting {} samples with {}", args.n, key.model);
    println!("   Prompt: {:?}", key.prompt);

    let session = CollectionSession::new(key, args.n, store)
        .with_concurrency(args.concurrency)
        .with_checkpoint_interval(args.checkpoint_interval);
    let outcome = session
        .run(&sampler)
        .await
        .context("Collection failed")?;

    report(&outcome);
    Ok(outcome)
}

fn report(outcome: &CollectionOutcome) {
    if outcome.up_to_date {
        println!(
            "✅ Already complete: {} samples in {}",
            outcome.reused,
            outcome.path.display()
        );
        return;
    }

    if outcome.reused > 0 {
        println!("♻️  Reused {} samples from a previous run", outcome.reused);
    }
    println!("✅ Collection complete:");
    println!("   Sampled:     {}", outcome.sampled);
    println!("   Ok:          {}", outcome.totals.ok);
    println!("   Errors:      {}", outcome.totals.error);
    println!("   Checkpoints: {}", outcome.checkpoints_written);
    println!("💾 Saved to: {}", outcome.path.display());
}
