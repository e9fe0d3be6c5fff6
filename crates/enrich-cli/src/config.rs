//! Invocation surface: flags with environment fallbacks.

use std::time::Duration;

use clap::{Parser, ValueEnum};
use enrich_core::Source;
use enrich_source::governor::DEFAULT_IDENTITY;
use enrich_source::{DelayBand, PacingConfig, PacingError};
use enrich_store::RetryPolicy;

use crate::run::RunConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceArg {
    Homestars,
    Yelp,
    Bbb,
}

impl From<SourceArg> for Source {
    fn from(arg: SourceArg) -> Self {
        match arg {
            SourceArg::Homestars => Source::HomeStars,
            SourceArg::Yelp => Source::Yelp,
            SourceArg::Bbb => Source::Bbb,
        }
    }
}

/// Enrich one batch of the provider roster with ratings from a review source.
#[derive(Debug, Parser)]
#[command(name = "enrich", version)]
pub struct Args {
    /// 1-based batch index into the id-ordered roster.
    #[arg(long, env = "BATCH_NUMBER", default_value_t = 1, allow_negative_numbers = true)]
    pub batch_index: i64,

    /// Providers per batch.
    #[arg(long, env = "BATCH_SIZE", default_value_t = 200, allow_negative_numbers = true)]
    pub page_size: i64,

    #[arg(long, env = "RATING_SOURCE", value_enum, default_value_t = SourceArg::Homestars)]
    pub source: SourceArg,

    /// Look up providers even if they already have a result.
    #[arg(long, env = "FORCE_REFRESH")]
    pub force_refresh: bool,

    #[arg(long, env = "STORE_URL")]
    pub store_url: String,

    #[arg(long, env = "STORE_KEY", hide_env_values = true)]
    pub store_key: String,

    #[arg(long, env = "LOOKUP_URL")]
    pub lookup_url: String,

    #[arg(long, env = "LOOKUP_KEY", hide_env_values = true)]
    pub lookup_key: Option<String>,

    /// Automation identity recorded on each run record.
    #[arg(long, env = "RUN_OPERATOR", default_value = "automation:enrich")]
    pub operator: String,

    /// Contact URL or address appended to the User-Agent.
    #[arg(long, env = "ENRICH_CONTACT")]
    pub contact: Option<String>,

    #[arg(long, default_value_t = 2.0)]
    pub request_delay_min: f64,

    #[arg(long, default_value_t = 4.0)]
    pub request_delay_max: f64,

    #[arg(long, default_value_t = 30.0)]
    pub group_delay_min: f64,

    #[arg(long, default_value_t = 60.0)]
    pub group_delay_max: f64,

    /// Lookups between group cooldowns.
    #[arg(long, default_value_t = 20)]
    pub group_size: usize,

    /// Longest back-off honoured when the source rate-limits us, in seconds.
    #[arg(long, default_value_t = 300)]
    pub max_backoff_secs: u64,

    /// Attempts per store write before the batch is aborted.
    #[arg(long, default_value_t = 3)]
    pub write_attempts: u32,

    /// Seed for the pacing RNG (random if unset).
    #[arg(long, env = "ENRICH_SEED")]
    pub seed: Option<u64>,
}

impl Args {
    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            batch_index: self.batch_index,
            page_size: self.page_size,
            source: self.source.into(),
            force_refresh: self.force_refresh,
            operator: self.operator.clone(),
            retry: RetryPolicy {
                max_attempts: self.write_attempts,
                ..RetryPolicy::default()
            },
        }
    }

    pub fn pacing_config(&self) -> Result<PacingConfig, PacingError> {
        let identity = match &self.contact {
            Some(contact) => format!("{DEFAULT_IDENTITY} (+{contact})"),
            None => DEFAULT_IDENTITY.to_string(),
        };
        let config = PacingConfig {
            request: DelayBand::from_secs(self.request_delay_min, self.request_delay_max)?,
            group: DelayBand::from_secs(self.group_delay_min, self.group_delay_max)?,
            group_size: self.group_size,
            max_backoff: Duration::from_secs(self.max_backoff_secs),
            identity,
            ..PacingConfig::default()
        };
        config.validate()?;
        Ok(config)
    }
}
