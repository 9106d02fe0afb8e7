use anyhow::{Context, Result};
use clap::Parser;
use core_logic::{setup_logger, AccountManager, BatchScheduler, ExcludedTaskSet};
use dotenv::dotenv;
use game_farmer::api::HttpGameApi;
use game_farmer::config::FarmerConfig;
use game_farmer::processor::FarmingProcessor;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "bots/game-farmer/config.toml")]
    config: String,
    /// Overrides `scheduler.concurrency`
    #[arg(long)]
    concurrency: Option<usize>,
    /// Skip the task sweep
    #[arg(long)]
    no_tasks: bool,
    /// Run a single sweep and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    let mut config = match FarmerConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config {}: {:#}", args.config, e);
            return Err(e);
        }
    };

    if let Some(concurrency) = args.concurrency {
        config.scheduler.concurrency = concurrency.max(1);
    }
    if args.no_tasks {
        config.tasks.enabled = false;
    }
    if args.once {
        config.scheduler.max_cycles = Some(1);
    }

    let _log_guards = setup_logger(&config.logging)?;
    info!("Loaded config from: {}", args.config);

    let accounts = AccountManager::load(&config.accounts_file)?;

    let mut excluded = match &config.excluded_tasks_file {
        Some(path) => ExcludedTaskSet::load(path)?,
        None => ExcludedTaskSet::empty(),
    };
    excluded.extend(config.excluded_task_ids.iter().cloned());
    if !excluded.is_empty() {
        info!("{} task ids will be skipped", excluded.len());
    }

    let api = HttpGameApi::new(&config.api, config.daily_reward.offset_minutes)
        .context("Failed to initialise HTTP client")?;

    let scheduler_config = config.scheduler.clone();
    let processor = FarmingProcessor::new(Arc::new(api), Arc::new(config), Arc::new(excluded))?;
    let scheduler = BatchScheduler::new(Arc::new(processor), scheduler_config);

    if let Err(e) = scheduler
        .run_forever(accounts.into_accounts(), CancellationToken::new())
        .await
    {
        error!("Scheduler stopped: {:#}", e);
        return Err(e);
    }

    Ok(())
}
