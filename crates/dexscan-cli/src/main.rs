//! dexscan CLI - flags malicious APKs with a DEX-image ONNX classifier.
//!
//! Usage:
//!   dexscan /data/app --model dex_image_classifier.onnx
//!   dexscan app.apk other.apk --model model.onnx --config scanner.json --format json
//!   dexscan /data/app --model model.onnx --all-sections --fail-closed --pause-ms 0

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use dexscan_core::logging::{init_tracing, init_tracing_json};
use dexscan_core::report::{print_results, OutputFormat};
use dexscan_core::{
    collect_packages, load_scan_settings, spawn_scan, FailurePolicy, ScanEvent, ScanSettings,
    Scanner, SectionPolicy, Verdict,
};

#[derive(Parser)]
#[command(name = "dexscan")]
#[command(about = "DEX-image malware scanner for Android packages")]
struct Cli {
    /// Packages to scan (APK files or directories containing them)
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Path to the ONNX model file
    #[arg(short, long)]
    model: PathBuf,

    /// Path to a JSON settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Maliciousness threshold (0.0-1.0), overrides the settings file
    #[arg(short, long)]
    threshold: Option<f32>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Classify every .dex section instead of only the first
    #[arg(long)]
    all_sections: bool,

    /// Treat inference failures as malicious instead of benign
    #[arg(long)]
    fail_closed: bool,

    /// Pause after a malicious verdict, in milliseconds
    #[arg(long)]
    pause_ms: Option<u64>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn settings(&self) -> Result<ScanSettings> {
        let mut settings = match &self.config {
            Some(path) => load_scan_settings(path)?,
            None => ScanSettings::default(),
        };
        if let Some(threshold) = self.threshold {
            settings.threshold = threshold;
        }
        if self.all_sections {
            settings.sections = SectionPolicy::All;
        }
        if self.fail_closed {
            settings.on_inference_error = FailurePolicy::Malicious;
        }
        if let Some(pause_ms) = self.pause_ms {
            settings.malicious_pause_ms = pause_ms;
        }
        settings.validate()?;
        Ok(settings)
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    if cli.log_json {
        init_tracing_json();
    } else {
        init_tracing();
    }

    let settings = cli.settings()?;

    info!(model = %cli.model.display(), "loading model");
    let scanner = Arc::new(Scanner::load(&cli.model, &settings)?);

    let packages = collect_packages(&cli.paths);
    info!(count = packages.len(), "found packages to scan");

    let handle = spawn_scan(scanner, packages);
    for event in handle.events() {
        match event {
            ScanEvent::Progress {
                percent,
                scanned,
                total,
            } => eprintln!("[*] {percent:>3}% ({scanned}/{total})"),
            ScanEvent::Finished {
                verdict: Verdict::Malicious,
                package: Some(package),
            } => eprintln!("[!] Malicious app found: {package}"),
            ScanEvent::Finished { .. } => eprintln!("[*] Scan complete"),
        }
    }
    let report = handle
        .join()
        .map_err(|_| anyhow::anyhow!("scan worker panicked"))?;

    print_results(&report, cli.format);

    Ok(if report.verdict.is_malicious() {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    })
}
