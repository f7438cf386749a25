use std::any::Any;
use std::env;
use std::panic::{self, Location};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result, anyhow, bail};
use tracing::{error, info, warn};

use social_intel_worker::{app::ComponentRegistry, config::Config, manifest::Manifest};

struct CliArgs {
    manifest: PathBuf,
    output: Option<PathBuf>,
    metrics_out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    install_panic_hook();

    let args = parse_args()?;

    // the registry installs tracing
    let config = Config::from_env().context("failed to load configuration")?;
    let registry = ComponentRegistry::build(config).context("failed to build component registry")?;

    let manifest = Manifest::load_from_path(&args.manifest)?;
    let base_dir = args
        .manifest
        .parent()
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let requests = manifest.into_requests(&base_dir);
    info!(brands = requests.len(), manifest = %args.manifest.display(), "manifest loaded");

    let report = registry
        .orchestrator()
        .process_brands(&requests)
        .await
        .context("batch request rejected")?;

    if report.failed_units > 0 {
        warn!(
            failed_units = report.failed_units,
            succeeded_units = report.succeeded_units,
            "batch finished with failed units"
        );
    }

    let rendered = serde_json::to_string_pretty(&report).context("failed to encode report")?;
    match &args.output {
        Some(path) => tokio::fs::write(path, rendered)
            .await
            .with_context(|| format!("failed to write report to {}", path.display()))?,
        None => println!("{rendered}"),
    }

    if let Some(path) = &args.metrics_out {
        tokio::fs::write(path, registry.telemetry().render_prometheus())
            .await
            .with_context(|| format!("failed to write metrics to {}", path.display()))?;
    }

    registry.telemetry().shutdown();
    Ok(())
}

/// Routes panics through tracing so they land in the JSON log stream.
fn install_panic_hook() {
    panic::set_hook(Box::new(|info| {
        let location = info.location();
        error!(
            thread = std::thread::current().name().unwrap_or("unnamed"),
            file = location.map(Location::file),
            line = location.map(Location::line),
            column = location.map(Location::column),
            message = panic_message(info.payload()),
            "panic occurred"
        );
    }));
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic payload")
}

fn parse_args() -> Result<CliArgs> {
    let mut manifest = None;
    let mut output = None;
    let mut metrics_out = None;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--manifest" => {
                let value = args.next().context("--manifest requires a path argument")?;
                manifest = Some(PathBuf::from(value));
            }
            "--output" => {
                let value = args.next().context("--output requires a path argument")?;
                output = Some(PathBuf::from(value));
            }
            "--metrics-out" => {
                let value = args
                    .next()
                    .context("--metrics-out requires a path argument")?;
                metrics_out = Some(PathBuf::from(value));
            }
            "--help" => {
                print_usage();
                process::exit(0);
            }
            _ => {
                bail!("unknown argument: {}", arg);
            }
        }
    }

    let manifest = manifest.ok_or_else(|| anyhow!("--manifest is required"))?;
    Ok(CliArgs {
        manifest,
        output,
        metrics_out,
    })
}

fn print_usage() {
    eprintln!(
        "Usage: social-intel-worker --manifest <path> [--output <report.json>] \
         [--metrics-out <metrics.prom>]"
    );
}
