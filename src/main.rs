//! oxidized-gif - GIF unit trace replay
//!
//! Feeds a captured stream of A+D qwords through one GIF path and reports
//! what the unit did with it.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};

use og_core::config::Config;
use og_core::{logging, NoWorker};
use og_gif::{
    GifPathId, GifUnit, GsContext, GsCsr, GsImr, GsRegs, IrqCounter, PathOwner, TransferType,
    RECORD_SIZE,
};

#[derive(Debug, Parser)]
#[command(name = "oxidized-gif")]
#[command(about = "Replay GIF A+D traces through the GIF unit core")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Feed a raw trace of 16-byte A+D qwords into one path.
    Replay(ReplayArgs),
}

#[derive(Debug, Clone, Args)]
struct ReplayArgs {
    /// Raw trace file.
    trace: PathBuf,

    /// Target path (1 = XGKICK, 2 = VIF1 DIRECT, 3 = GIF DMA).
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u8).range(1..=3))]
    path: u8,

    /// Configuration file (default: the per-user config).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write a save state after the replay.
    #[arg(long)]
    save: Option<PathBuf>,

    /// Restore a save state before the replay.
    #[arg(long)]
    load: Option<PathBuf>,

    /// Acknowledge every SIGNAL immediately instead of stopping at the first stall.
    #[arg(long)]
    auto_ack: bool,
}

/// What a replay did
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct ReplayReport {
    records: usize,
    stalls: usize,
    /// Trace bytes never delivered because the path stayed stalled
    unfed: usize,
    interrupts: u32,
    sigid: u32,
    lblid: u32,
    csr: u64,
    mtvu_mismatch: bool,
}

fn transfer_type(id: GifPathId) -> TransferType {
    match id {
        GifPathId::Path1 => TransferType::Xgkick,
        GifPathId::Path2 => TransferType::Direct,
        GifPathId::Path3 => TransferType::Dma,
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::load().context("failed to load default config")?,
    };
    Ok(config)
}

fn replay(args: &ReplayArgs, config: &Config) -> Result<ReplayReport> {
    let id = GifPathId::from_index(usize::from(args.path) - 1)?;
    let mut unit = GifUnit::new(&config.gif);
    let mut report = ReplayReport::default();

    if let Some(load) = &args.load {
        report.mtvu_mismatch = unit
            .load_state(load, &NoWorker)
            .with_context(|| format!("failed to restore {}", load.display()))?
            .mtvu_mismatch;
    }

    let trace = fs::read(&args.trace)
        .with_context(|| format!("failed to read trace {}", args.trace.display()))?;
    if trace.len() % RECORD_SIZE != 0 {
        tracing::warn!(
            "Trace length {} is not a multiple of {}; trailing bytes stay buffered",
            trace.len(),
            RECORD_SIZE
        );
    }

    let mut regs = GsRegs {
        csr: GsCsr::empty(),
        imr: GsImr::empty(),
    };
    let mut irq = IrqCounter::default();

    // Half the arena per delivery leaves room for a partial trailing record
    let capacity = unit.with_path(id, |path| path.capacity());
    let chunk_size = (capacity / 2 / RECORD_SIZE).max(1) * RECORD_SIZE;

    let worker_owned = unit.with_path(id, |path| path.owner()) == PathOwner::Worker;
    if let Some(worker) = unit.worker_path().filter(|_| worker_owned) {
        let drain = worker.packets();
        for chunk in trace.chunks(chunk_size) {
            report.records += worker.kick(chunk)?;
            drain.drain();
            worker.retire_drained();
        }
    } else {
        let mut chunks = trace.chunks(chunk_size);
        'feed: for chunk in chunks.by_ref() {
            unit.append(id, transfer_type(id), chunk)?;
            loop {
                let mut gs = GsContext::new(&mut regs, &mut irq);
                let outcome = unit.process_path(id, &mut gs)?;
                report.records += outcome.records;
                if !outcome.stalled {
                    break;
                }
                report.stalls += 1;
                if !args.auto_ack {
                    break 'feed;
                }
                unit.write_csr(GsCsr::SIGNAL.bits(), &mut gs);
            }
        }
        report.unfed = chunks.map(<[u8]>::len).sum();
    }

    unit.poll(&mut GsContext::new(&mut regs, &mut irq));

    report.interrupts = irq.raised;
    report.sigid = unit.state.sig_lbl_id.sigid();
    report.lblid = unit.state.sig_lbl_id.lblid();
    report.csr = regs.csr.bits();

    if let Some(save) = &args.save {
        unit.save_state(save, &NoWorker)
            .with_context(|| format!("failed to save {}", save.display()))?;
    }

    Ok(report)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Replay(args) => {
            let config = load_config(args.config.as_deref())?;
            logging::init(&config.debug).map_err(|e| anyhow!(e))?;
            tracing::info!("Starting oxidized-gif replay of {}", args.trace.display());

            let report = replay(&args, &config)?;
            if report.mtvu_mismatch {
                eprintln!("warning: save state was taken with the other MTVU setting");
            }
            println!("records:    {}", report.records);
            println!("stalls:     {}", report.stalls);
            if report.unfed > 0 {
                println!("unfed:      {} bytes", report.unfed);
            }
            println!("interrupts: {}", report.interrupts);
            println!("SIGID:      {:#010x}", report.sigid);
            println!("LBLID:      {:#010x}", report.lblid);
            println!("GS_CSR:     {:#x}", report.csr);
            Ok(())
        }
    }
}
