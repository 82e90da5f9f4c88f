//! UTXO PoW Miner
//!
//! Command-line front end for the proof-of-work commitment engine.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use utxo_pow_miner::{
    config::Config,
    core::{Challenge, Difficulty, Nonce, RewardSchedule},
    error::Result,
    store::{FileStore, ProgressStore},
    utils::{self, format_hashrate},
    verify::verify_proof,
    workers::{
        CpuMiner, CpuMinerConfig, GpuMiner, GpuMinerConfig, Miner, MiningOutcome,
        ProgressSnapshot, gpu,
    },
};
use tracing::{error, info, warn};

/// Command-line interface
#[derive(Parser, Debug)]
#[clap(
    name = "utxo-pow-miner",
    about = "Proof-of-work commitment miner for Bitcoin funding outputs",
    version,
    author
)]
struct Cli {
    /// Configuration file path
    #[clap(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level
    #[clap(long, default_value = "info", env = "UTXO_POW_LOG", global = true)]
    log_level: String,

    /// Log format (plain, json)
    #[clap(long, default_value = "plain", global = true)]
    log_format: String,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mine a proof of work bound to a funding output
    Mine(MineArgs),
    /// Verify a submitted (challenge, nonce, digest) proof
    Verify(VerifyArgs),
    /// List available GPU devices
    Gpus,
}

#[derive(Args, Debug)]
struct MineArgs {
    /// Funding transaction id (64 hex chars)
    #[clap(short, long, env = "UTXO_POW_TXID")]
    txid: String,

    /// Funding output index
    #[clap(short, long, default_value = "0")]
    vout: u32,

    /// Difficulty in leading zero hex nibbles (overrides config)
    #[clap(short, long)]
    difficulty: Option<u32>,

    /// Worker back-end: cpu or gpu (overrides config)
    #[clap(short, long)]
    worker: Option<String>,

    /// Resume from this challenge's checkpoint
    #[clap(short, long)]
    resume: bool,

    /// Progress store directory (overrides config)
    #[clap(long)]
    store_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct VerifyArgs {
    /// Funding transaction id (64 hex chars)
    #[clap(short, long)]
    txid: String,

    /// Funding output index
    #[clap(short, long, default_value = "0")]
    vout: u32,

    /// Claimed nonce
    #[clap(short, long)]
    nonce: u64,

    /// Claimed digest (64 hex chars)
    #[clap(long)]
    digest: String,

    /// Required difficulty in leading zero hex nibbles
    #[clap(short, long, default_value = "4")]
    difficulty: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config.logging.level = cli.log_level.clone();
    config.logging.format = cli.log_format.clone();

    utils::init_logging(&config.logging.level, &config.logging.format);

    match cli.command {
        Command::Mine(args) => run_mine(config, args).await,
        Command::Verify(args) => run_verify(args),
        Command::Gpus => {
            let gpus = gpu::enumerate_gpus();
            if gpus.is_empty() {
                println!("No GPU adapters found");
            }
            for (index, name, device_type) in gpus {
                println!("GPU {}: {} ({:?})", index, name, device_type);
            }
            Ok(())
        }
    }
}

async fn run_mine(mut config: Config, args: MineArgs) -> Result<()> {
    if let Some(difficulty) = args.difficulty {
        config.mining.difficulty = difficulty;
    }
    if let Some(worker) = &args.worker {
        config.mining.worker = worker.clone();
    }
    if let Some(dir) = &args.store_dir {
        config.store.dir = dir.clone();
    }
    config.validate()?;

    let challenge = Challenge::new(&args.txid, args.vout)?;
    let difficulty = config.difficulty()?;
    let store: Arc<dyn ProgressStore> = Arc::new(FileStore::new(&config.store.dir)?);

    if args.resume {
        // a finished search needs no more work
        if let Some(result) = store.load_result(&challenge)? {
            info!(
                nonce = result.nonce,
                digest = %result.digest_hex,
                "challenge already completed"
            );
            print_proof_summary(result.nonce, &result.digest_hex, result.leading_zero_bits);
            return Ok(());
        }
    } else {
        store.clear_result(&challenge)?;
    }

    let miner = build_miner(&config, store).await?;
    spawn_progress_printer(miner.progress());

    let stopper = miner.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("stop requested, finishing current work");
            let _ = stopper.stop().await;
        }
    });

    match miner.mine(&challenge, difficulty, args.resume).await {
        Ok(Some(outcome)) => {
            report_outcome(&outcome);
            Ok(())
        }
        Ok(None) => {
            println!("mining stopped, reason: stopped by user (checkpoint saved)");
            Ok(())
        }
        Err(e) => {
            error!("mining stopped, reason: {}", e);
            Err(e)
        }
    }
}

/// Build the configured miner, falling back to the sequential back-end when
/// the accelerator is unavailable
async fn build_miner(config: &Config, store: Arc<dyn ProgressStore>) -> Result<Arc<dyn Miner>> {
    let checkpoint_interval = config.mining.checkpoint_interval;

    if config.mining.worker == "gpu" {
        let mut gpu_config = GpuMinerConfig::default();
        if checkpoint_interval > 0 {
            gpu_config.checkpoint_interval = checkpoint_interval;
        }
        match GpuMiner::new(gpu_config, store.clone()).await {
            Ok(miner) => return Ok(Arc::new(miner)),
            Err(e) if e.is_accelerator_failure() => {
                warn!("GPU unavailable ({}), falling back to sequential miner", e);
            }
            Err(e) => return Err(e),
        }
    }

    let mut cpu_config = CpuMinerConfig::default();
    if checkpoint_interval > 0 {
        cpu_config.checkpoint_interval = checkpoint_interval;
    }
    Ok(Arc::new(CpuMiner::new(cpu_config, store)))
}

fn spawn_progress_printer(mut progress: watch::Receiver<ProgressSnapshot>) {
    tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let snapshot = progress.borrow().clone();
            info!(
                nonce = snapshot.nonce,
                rate = %format_hashrate(snapshot.hash_rate_per_second),
                best_bits = snapshot.best_leading_zero_bits,
                "mining progress"
            );
        }
    });
}

fn report_outcome(outcome: &MiningOutcome) {
    print_proof_summary(
        outcome.nonce.value(),
        &outcome.digest.to_hex(),
        outcome.leading_zero_bits,
    );
}

fn print_proof_summary(nonce: u64, digest_hex: &str, leading_zero_bits: u32) {
    let reward = RewardSchedule::default().amount(leading_zero_bits, utils::current_timestamp_secs());
    println!("proof of work found");
    println!("  nonce:  {}", nonce);
    println!("  digest: {}", digest_hex);
    println!("  zeros:  {} bits", leading_zero_bits);
    println!("  reward: {} units (advisory)", reward);
}

fn run_verify(args: VerifyArgs) -> Result<()> {
    let challenge = Challenge::new(&args.txid, args.vout)?;
    let difficulty = Difficulty::from_nibbles(args.difficulty)?;

    let verification = verify_proof(&challenge, Nonce::new(args.nonce), &args.digest, difficulty);
    println!(
        "verification: {} ({})",
        if verification.accepted {
            "accepted"
        } else {
            "rejected"
        },
        verification.outcome
    );
    if !verification.accepted {
        std::process::exit(1);
    }
    Ok(())
}
