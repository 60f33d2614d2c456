//! Run report: human-readable status lines and a JSON summary.

use std::fmt;
use std::fs;
use std::path::PathBuf;

use abiforge_targets::Arch;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::executor::{BuildResult, BuildRun};
use crate::verify::VerificationReport;

/// SHA-256 of `data` as lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Target outcome as shown in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetStatus {
    Built,
    Failed,
    Skipped,
}

impl fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TargetStatus::Built => "ok",
            TargetStatus::Failed => "FAILED",
            TargetStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// One target in the summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetRecord {
    pub target: String,
    pub arch: Option<Arch>,
    pub status: TargetStatus,
    pub artifact: Option<PathBuf>,
    /// Artifact size in bytes.
    pub size: Option<u64>,
    pub sha256: Option<String>,
    pub exit_code: Option<i32>,
    pub detail: Option<String>,
    pub duration_ms: u64,
    pub verification: Option<VerificationReport>,
}

impl TargetRecord {
    fn from_result(result: &BuildResult) -> Self {
        let (size, sha256) = match result.artifact.as_deref().map(fs::read) {
            Some(Ok(bytes)) => (Some(bytes.len() as u64), Some(sha256_hex(&bytes))),
            _ => (None, None),
        };
        Self {
            target: result.target.clone(),
            arch: Some(result.arch),
            status: if result.success {
                TargetStatus::Built
            } else {
                TargetStatus::Failed
            },
            artifact: result.artifact.clone(),
            size,
            sha256,
            exit_code: result.exit_code,
            detail: result.detail.clone(),
            duration_ms: result.duration_ms,
            verification: None,
        }
    }

    fn skipped(target: &str) -> Self {
        Self {
            target: target.to_string(),
            arch: None,
            status: TargetStatus::Skipped,
            artifact: None,
            size: None,
            sha256: None,
            exit_code: None,
            detail: None,
            duration_ms: 0,
            verification: None,
        }
    }

    /// One status line, e.g. `  [ok] arm64-v8a -> out/arm64-v8a/libcore.so (12 ms)`.
    pub fn status_line(&self) -> String {
        match self.status {
            TargetStatus::Built => format!(
                "  [{}] {} -> {} ({} ms)",
                self.status,
                self.target,
                self.artifact
                    .as_deref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
                self.duration_ms
            ),
            TargetStatus::Failed => {
                let code = self
                    .exit_code
                    .map(|c| format!(" (exit {c})"))
                    .unwrap_or_default();
                format!("  [{}] {}{code}", self.status, self.target)
            }
            TargetStatus::Skipped => format!("  [{}] {}", self.status, self.target),
        }
    }
}

/// Summary of a full run, serializable for `--json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub success: bool,
    pub tags: Vec<String>,
    pub targets: Vec<TargetRecord>,
}

impl RunSummary {
    /// Build the summary from a run and the verification reports, matched
    /// to targets by artifact path.
    pub fn new(run: &BuildRun, tags: &[String], verification: &[VerificationReport]) -> Self {
        let mut targets: Vec<TargetRecord> = run
            .results
            .iter()
            .map(|result| {
                let mut record = TargetRecord::from_result(result);
                record.verification = record.artifact.as_deref().and_then(|artifact| {
                    verification
                        .iter()
                        .find(|v| v.artifact == artifact)
                        .cloned()
                });
                record
            })
            .collect();
        targets.extend(run.skipped.iter().map(|t| TargetRecord::skipped(t)));
        Self {
            success: run.succeeded(),
            tags: tags.to_vec(),
            targets,
        }
    }

    pub fn warning_count(&self) -> usize {
        self.targets
            .iter()
            .filter_map(|t| t.verification.as_ref())
            .map(|v| v.warnings.len())
            .sum()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Build Report ===")?;
        writeln!(f, "Tags: {}", self.tags.join(","))?;
        writeln!(f)?;
        writeln!(f, "--- Targets ---")?;
        for record in &self.targets {
            writeln!(f, "{}", record.status_line())?;
        }

        let reports: Vec<&VerificationReport> = self
            .targets
            .iter()
            .filter_map(|t| t.verification.as_ref())
            .collect();
        if !reports.is_empty() {
            writeln!(f)?;
            writeln!(f, "--- Verification ({} warning(s)) ---", self.warning_count())?;
            for report in reports {
                write!(f, "{report}")?;
            }
        }

        writeln!(f)?;
        writeln!(
            f,
            "Result: {}",
            if self.success { "SUCCESS" } else { "FAILED" }
        )
    }
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  {}: {}", self.artifact.display(), self.executable_type)?;
        if let Some(align) = self.min_load_align {
            writeln!(f, "    load alignment: {align}")?;
        }
        match &self.dependencies {
            Some(deps) if deps.is_empty() => writeln!(f, "    needs: (none)")?,
            Some(deps) => writeln!(f, "    needs: {}", deps.join(", "))?,
            None => {}
        }
        for w in &self.warnings {
            writeln!(f, "    warning: {}", w.message)?;
        }
        Ok(())
    }
}
