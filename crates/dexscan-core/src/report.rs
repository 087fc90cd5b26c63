//! Scan results and their output formatting.

use serde::Serialize;

use crate::classify::Verdict;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageStatus {
    Benign,
    Malicious,
    /// No image could be produced; the package does not contribute a verdict.
    Skipped,
}

/// Outcome for one package.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanResult {
    pub package: String,
    pub status: PackageStatus,
    /// Highest model score over the package's sections.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    pub sections: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScanResult {
    pub fn skipped(package: impl Into<String>, error: Option<String>) -> Self {
        Self {
            package: package.into(),
            status: PackageStatus::Skipped,
            score: None,
            sections: 0,
            error,
        }
    }

    pub fn is_malicious(&self) -> bool {
        self.status == PackageStatus::Malicious
    }
}

/// Outcome for a whole scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanReport {
    pub verdict: Verdict,
    /// The package that made the scan malicious.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flagged_package: Option<String>,
    pub total_packages: usize,
    pub results: Vec<ScanResult>,
}

impl ScanReport {
    pub fn scanned(&self) -> usize {
        self.results.len()
    }

    pub fn skipped(&self) -> usize {
        self.count(PackageStatus::Skipped)
    }

    /// Results that carry an error, including fail-closed verdicts.
    pub fn errors(&self) -> impl Iterator<Item = &ScanResult> {
        self.results.iter().filter(|r| r.error.is_some())
    }

    fn count(&self, status: PackageStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {s}. Use 'text' or 'json'.")),
        }
    }
}

pub fn print_results(report: &ScanReport, format: OutputFormat) {
    match format {
        OutputFormat::Text => print!("{}", render_text(report)),
        OutputFormat::Json => println!("{}", render_json(report)),
    }
}

pub fn render_text(report: &ScanReport) -> String {
    let mut out = String::new();
    let rule = "=".repeat(70);

    out.push_str(&format!("\n{rule}\nSCAN RESULTS\n{rule}\n"));

    match (&report.verdict, &report.flagged_package) {
        (Verdict::Malicious, Some(package)) => {
            out.push_str(&format!("\nMalicious app found: {package}\n"));
            if let Some(r) = report.results.iter().find(|r| r.is_malicious()) {
                match r.score {
                    Some(score) => out.push_str(&format!("  [{score:.4}] {}\n", r.package)),
                    None => out.push_str(&format!(
                        "  [ERR ] {} -- {}\n",
                        r.package,
                        r.error.as_deref().unwrap_or("unknown")
                    )),
                }
            }
        }
        _ => out.push_str("\nScan complete - no malicious apps found\n"),
    }

    let problems: Vec<_> = report.errors().collect();
    if !problems.is_empty() {
        out.push_str(&format!("\nERRORS ({}):\n", problems.len()));
        for r in &problems {
            let err = r.error.as_deref().unwrap_or("unknown");
            out.push_str(&format!("  [ERR ] {} -- {}\n", r.package, err));
        }
    }

    out.push_str("\nSUMMARY:\n");
    out.push_str(&format!("  Packages:            {}\n", report.total_packages));
    out.push_str(&format!("  Scanned:             {}\n", report.scanned()));
    out.push_str(&format!("  Skipped:             {}\n", report.skipped()));
    out.push_str(&format!("  Errors:              {}\n", problems.len()));
    out.push_str(&format!("{rule}\n"));
    out
}

pub fn render_json(report: &ScanReport) -> String {
    let output = serde_json::json!({
        "verdict": report.verdict,
        "flagged_package": report.flagged_package,
        "results": report.results,
        "summary": {
            "total": report.total_packages,
            "scanned": report.scanned(),
            "skipped": report.skipped(),
            "errors": report.errors().count(),
        }
    });
    serde_json::to_string_pretty(&output).unwrap_or_default()
}
