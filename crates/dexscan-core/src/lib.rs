//! dexscan-core: shared library for APK malware scanning.
//!
//! Provides `.dex`-to-image feature extraction, ONNX inference, the
//! sequential scan orchestrator, and result reporting used by the CLI.

pub mod classify;
pub mod error;
pub mod extract;
pub mod inference;
pub mod logging;
pub mod package;
pub mod report;
pub mod scan;
pub mod settings;
pub mod tensor;

pub use classify::{Classification, Classifier, ClassifierSettings, FailurePolicy, Verdict};
pub use error::{Result, ScanError};
pub use extract::{ExtractConfig, Extractor, SectionPolicy};
pub use inference::{BinaryModel, OnnxModel};
pub use package::{collect_packages, InstalledPackage, LoadedPackage, PackageHandle};
pub use report::{PackageStatus, ScanReport, ScanResult};
pub use scan::{spawn_scan, ScanEvent, ScanHandle, Scanner};
pub use settings::{load_scan_settings, ScanSettings};
pub use tensor::{ImageInput, InputTensor};
