//! Tally command-line driver
//!
//! Wires a meter, processor, push controller and stdout exporter together and
//! plays a workload through them.

mod args;
mod exporter;
mod progress;
mod workload;

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tally_core::{
    global, ControllerConfig, MeterProvider, ProcessorMode, PushController, UngroupedProcessor,
};
use tracing_subscriber::EnvFilter;

use args::Args;
use exporter::StreamExporter;
use progress::Progress;

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tally_core=info,tally_cli=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    args.validate()?;

    let config = ControllerConfig::from_secs_f64(args.period)?.with_timeout_secs(args.timeout);
    let mode = ProcessorMode::from(args.stateful);

    let operations = match &args.input {
        Some(path) => workload::load(path)?,
        None => workload::synthetic(args.iterations, args.seed),
    };

    global::set_meter_provider(Arc::new(MeterProvider::new()))?;
    let meter = global::meter(&args.meter);
    let instruments = workload::Instruments::register(&meter, &args.boundaries)?;

    let progress = Progress::new();
    progress.register(&meter)?;

    let controller = PushController::new(
        Arc::clone(&meter),
        UngroupedProcessor::new(mode),
        StreamExporter::new(args.format, std::io::stdout()),
        config,
    )?;

    tracing::info!(
        meter = %args.meter,
        mode = %mode,
        operations = operations.len(),
        format = %args.format,
        "running workload"
    );

    controller.start();
    let interval = Duration::from_millis(args.interval_ms);
    let mut rejected = 0usize;
    for op in &operations {
        match instruments.apply(op) {
            Ok(()) => progress.record_applied(),
            Err(e) => {
                rejected += 1;
                tracing::warn!(error = %e, "operation rejected");
            }
        }
        if !interval.is_zero() {
            std::thread::sleep(interval);
        }
    }
    controller.stop();

    tracing::info!(
        applied = progress.total(),
        rejected,
        "workload finished"
    );
    Ok(())
}
