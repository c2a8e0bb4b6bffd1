use std::{collections::HashMap, error::Error, process};

use clap::Parser;
use skill_processor::{
    args::Args,
    data,
    model::{config::InferenceConfig, processor::SkillProcessor}
};
use tracing::{error, info, warn};
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let indicatif_layer = IndicatifLayer::new();
    tracing_subscriber::registry()
        .with(EnvFilter::new(&args.log_level))
        .with(tracing_subscriber::fmt::layer().with_writer(indicatif_layer.get_stderr_writer()))
        .with(indicatif_layer)
        .init();

    if let Err(e) = run(&args) {
        error!("{}", e);
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => data::load_config(path)?,
        None => InferenceConfig::from_env()?
    };
    if args.batch_days.is_some() {
        config.batch_days = args.batch_days;
    }

    let matches = data::load_matches(&args.matches)?;
    let priors = match &args.priors {
        Some(path) => data::load_priors(path)?,
        None => HashMap::new()
    };

    let mut processor = SkillProcessor::new(config, priors)?;
    processor.process(&matches)?;

    let output = processor.output();
    let unconverged = output.batches.iter().filter(|b| !b.inference.converged).count();
    if unconverged > 0 {
        warn!(batches = unconverged, "Some batches finished without converging");
    }
    let skipped: usize = output.batches.iter().map(|b| b.skipped.len()).sum();
    info!(
        players = output.skills.len(),
        batches = output.batches.len(),
        skipped,
        "Processing complete"
    );

    data::save_output(&args.output, &output)?;
    Ok(())
}
