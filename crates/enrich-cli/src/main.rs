mod config;
mod run;

use clap::Parser;
use enrich_core::validate_operator;
use enrich_source::{Governor, HttpLookupSource};
use enrich_store::PostgrestStore;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing_subscriber::EnvFilter;

use crate::config::Args;
use crate::run::{RunError, run_batch};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    tracing::info!("enrich v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let config = args.run_config();
    validate_operator(&config.operator)?;
    let pacing = args.pacing_config()?;

    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut governor = Governor::new(pacing, rng)?;
    let store = PostgrestStore::new(args.store_url.clone(), args.store_key.clone(), config.source);
    let source = HttpLookupSource::new(args.lookup_url.clone(), args.lookup_key.clone(), config.source)?;

    match run_batch(&store, &source, &mut governor, &config).await {
        Ok(_) => Ok(()),
        Err(RunError::Partition(e)) if e.is_exhausted() => {
            tracing::info!(batch_index = config.batch_index, "{e}; no more providers to enrich");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
