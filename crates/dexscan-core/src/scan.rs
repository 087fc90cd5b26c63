//! Scan orchestrator: one worker, packages in order, first malicious wins.
//!
//! Progress and the final verdict are delivered as [`ScanEvent`]s, either to
//! a callback ([`Scanner::scan`]) or over a channel from a background thread
//! ([`spawn_scan`]).

use std::path::Path;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::classify::{Classifier, Verdict};
use crate::error::Result;
use crate::extract::Extractor;
use crate::inference::{BinaryModel, OnnxModel};
use crate::package::PackageHandle;
use crate::report::{PackageStatus, ScanReport, ScanResult};
use crate::settings::ScanSettings;
use crate::tensor::ImageInput;

#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    /// Sent after every package. `percent` never decreases.
    Progress {
        percent: u32,
        scanned: usize,
        total: usize,
    },
    /// Sent exactly once, last.
    Finished {
        verdict: Verdict,
        package: Option<String>,
    },
}

pub struct Scanner {
    extractor: Extractor,
    classifier: Classifier,
    malicious_pause: Duration,
}

impl Scanner {
    pub fn new(extractor: Extractor, classifier: Classifier) -> Self {
        Self {
            extractor,
            classifier,
            malicious_pause: Duration::ZERO,
        }
    }

    /// Keep the worker alive for `pause` after announcing a malicious verdict.
    pub fn with_malicious_pause(mut self, pause: Duration) -> Self {
        self.malicious_pause = pause;
        self
    }

    /// Build a scanner from validated settings.
    pub fn from_settings(model: Box<dyn BinaryModel>, settings: &ScanSettings) -> Result<Self> {
        settings.validate()?;
        let extractor = Extractor::new(settings.extract_config());
        let classifier = Classifier::new(model, settings.classifier_settings());
        Ok(Self::new(extractor, classifier).with_malicious_pause(settings.malicious_pause()))
    }

    /// Load the ONNX model at `model_path`. Fails with
    /// [`ScanError::ScannerUnavailable`](crate::error::ScanError::ScannerUnavailable)
    /// when it cannot be loaded.
    pub fn load(model_path: &Path, settings: &ScanSettings) -> Result<Self> {
        settings.validate()?;
        let input_len = settings.classifier_settings().input_len();
        let model = OnnxModel::load(model_path, input_len)?;
        Self::from_settings(Box::new(model), settings)
    }

    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Extract and classify one package. Never fails: read and extraction
    /// problems skip the package, inference problems go through the
    /// classifier's failure policy.
    pub fn scan_package<P: PackageHandle + ?Sized>(&self, package: &P) -> ScanResult {
        let id = package.id();

        let archive = match package.read_archive() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(package = id, error = %e, "cannot read package");
                return ScanResult::skipped(id, Some(format!("read error: {e}")));
            }
        };

        let images = match self.extractor.extract_images(&archive) {
            Ok(images) => images,
            Err(e) => {
                warn!(package = id, error = %e, "cannot extract package");
                return ScanResult::skipped(id, Some(format!("extraction error: {e}")));
            }
        };
        if images.is_empty() {
            debug!(package = id, "no executable section, skipping");
            return ScanResult::skipped(id, None);
        }

        let mut status = PackageStatus::Benign;
        let mut score: Option<f32> = None;
        let mut errors = Vec::new();
        let mut examined = 0;

        for image in &images {
            examined += 1;
            let classification = self.classifier.evaluate(ImageInput::Encoded(image));
            if let Some(s) = classification.score {
                score = Some(score.map_or(s, |best| best.max(s)));
            }
            if let Some(e) = classification.error {
                errors.push(e);
            }
            if classification.verdict.is_malicious() {
                status = PackageStatus::Malicious;
                break;
            }
        }

        debug!(package = id, ?status, ?score, sections = examined, "package scanned");
        ScanResult {
            package: id.to_owned(),
            status,
            score,
            sections: examined,
            error: (!errors.is_empty()).then(|| errors.join("; ")),
        }
    }

    /// Scan packages in order, stopping at the first malicious one.
    ///
    /// `emit` receives a `Progress` event per processed package and one
    /// `Finished` event. On a malicious verdict the configured pause runs
    /// after `Finished` is emitted and before this returns.
    pub fn run<P: PackageHandle>(&self, packages: &[P], mut emit: impl FnMut(ScanEvent)) -> ScanReport {
        let total = packages.len();
        info!(total, "scan started");

        let mut results = Vec::with_capacity(total);
        let mut flagged = None;

        for (index, package) in packages.iter().enumerate() {
            let result = self.scan_package(package);
            let malicious = result.is_malicious();
            results.push(result);

            let scanned = index + 1;
            emit(ScanEvent::Progress {
                percent: percent(scanned, total),
                scanned,
                total,
            });

            if malicious {
                flagged = Some(package.id().to_owned());
                break;
            }
        }

        let verdict = if flagged.is_some() {
            Verdict::Malicious
        } else {
            Verdict::Benign
        };
        info!(?verdict, package = ?flagged, scanned = results.len(), total, "scan finished");

        emit(ScanEvent::Finished {
            verdict,
            package: flagged.clone(),
        });
        if verdict.is_malicious() && !self.malicious_pause.is_zero() {
            thread::sleep(self.malicious_pause);
        }

        ScanReport {
            verdict,
            flagged_package: flagged,
            total_packages: total,
            results,
        }
    }

    /// Callback form of [`Scanner::run`].
    pub fn scan<P: PackageHandle>(
        &self,
        packages: &[P],
        mut on_progress: impl FnMut(u32),
        on_result: impl FnOnce(Verdict, Option<&str>),
    ) -> ScanReport {
        let mut on_result = Some(on_result);
        self.run(packages, |event| match event {
            ScanEvent::Progress { percent, .. } => on_progress(percent),
            ScanEvent::Finished { verdict, package } => {
                if let Some(callback) = on_result.take() {
                    callback(verdict, package.as_deref());
                }
            }
        })
    }
}

fn percent(scanned: usize, total: usize) -> u32 {
    if total == 0 {
        return 100;
    }
    (scanned * 100 / total) as u32
}

/// A scan running on a background thread.
pub struct ScanHandle {
    events: mpsc::Receiver<ScanEvent>,
    worker: JoinHandle<ScanReport>,
}

impl ScanHandle {
    /// Events in the order the worker emitted them. Iterating ends when the
    /// worker is done.
    pub fn events(&self) -> &mpsc::Receiver<ScanEvent> {
        &self.events
    }

    /// Wait for the worker and take its report.
    pub fn join(self) -> thread::Result<ScanReport> {
        self.worker.join()
    }
}

/// Run a scan on a new thread. Blocking work stays off the caller's thread.
pub fn spawn_scan<P>(scanner: Arc<Scanner>, packages: Vec<P>) -> ScanHandle
where
    P: PackageHandle + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let worker = thread::spawn(move || {
        scanner.run(&packages, |event| {
            let _ = tx.send(event);
        })
    });
    ScanHandle { events: rx, worker }
}
