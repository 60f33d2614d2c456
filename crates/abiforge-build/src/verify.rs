//! Post-build artifact verification.
//!
//! Catches binaries that build fine but crash on device: fixed-address
//! executables (rejected by loaders that require PIE), segments aligned
//! below the kernel page size, and artifacts built for the wrong machine.
//! Findings are warnings attached to the report; verification itself never
//! fails a run.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use abiforge_targets::{Arch, ToolchainPath};
use log::{debug, warn};
use serde::Serialize;

use crate::elf::{self, ElfHeader, ET_DYN, ET_EXEC};
use crate::plan::MIN_PAGE_SIZE;

/// Runtime libraries that are not present on devices and must be linked
/// statically.
const HOST_RUNTIME_LIBS: [&str; 3] = ["libgcc_s.so", "libc++_shared.so", "libunwind.so"];

/// Executable type classification from the ELF header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutableType {
    /// `ET_DYN`: loadable at any address.
    PositionIndependent,
    /// `ET_EXEC`: fixed load address; crashes at launch on modern Android.
    FixedAddress,
    /// Header missing, unreadable, or of another type.
    Unknown,
}

impl fmt::Display for ExecutableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutableType::PositionIndependent => "position-independent",
            ExecutableType::FixedAddress => "fixed-address",
            ExecutableType::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Category of a verification finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WarningKind {
    FixedAddress,
    UnreadableHeader,
    PageAlignment,
    MachineMismatch,
    RuntimeDependency,
}

/// A non-fatal verification finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationWarning {
    pub kind: WarningKind,
    pub message: String,
}

/// Verification outcome for one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    pub artifact: PathBuf,
    pub executable_type: ExecutableType,
    /// `e_machine`, when the header parsed.
    pub machine: Option<u16>,
    /// Smallest `PT_LOAD` alignment, when any load segment was found.
    pub min_load_align: Option<u64>,
    /// `DT_NEEDED` entries; `None` when no inspection tool could provide them.
    pub dependencies: Option<Vec<String>>,
    pub warnings: Vec<VerificationWarning>,
}

impl VerificationReport {
    pub fn passed(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Classify an artifact from its bytes.
pub fn classify(bytes: &[u8]) -> ExecutableType {
    match elf::parse_header(bytes) {
        Some(h) if h.object_type == ET_DYN => ExecutableType::PositionIndependent,
        Some(h) if h.object_type == ET_EXEC => ExecutableType::FixedAddress,
        _ => ExecutableType::Unknown,
    }
}

/// Lists the shared libraries an artifact declares as dependencies.
pub trait DependencyInspector {
    /// `None` when the information is unavailable.
    fn needed(&self, artifact: &Path) -> Option<Vec<String>>;
}

/// Reads `DT_NEEDED` entries with `readelf -d`.
#[derive(Debug, Clone)]
pub struct ReadelfInspector {
    program: PathBuf,
}

impl ReadelfInspector {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Prefer the toolchain's `llvm-readelf`, falling back to `readelf` on PATH.
    pub fn for_toolchain(toolchain: &ToolchainPath) -> Self {
        let bundled = toolchain.llvm_tool("llvm-readelf");
        if bundled.is_file() {
            Self::new(bundled)
        } else {
            Self::new("readelf")
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl DependencyInspector for ReadelfInspector {
    fn needed(&self, artifact: &Path) -> Option<Vec<String>> {
        let output = Command::new(&self.program)
            .arg("-d")
            .arg(artifact)
            .output()
            .map_err(|e| debug!("{} unavailable: {e}", self.program.display()))
            .ok()?;
        if !output.status.success() {
            return None;
        }
        Some(parse_needed(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// An inspector that never has dependency data.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoInspector;

impl DependencyInspector for NoInspector {
    fn needed(&self, _artifact: &Path) -> Option<Vec<String>> {
        None
    }
}

/// Extract library names from `readelf -d` output.
///
/// Lines look like:
/// ` 0x0000000000000001 (NEEDED)  Shared library: [libc.so]`
pub fn parse_needed(readelf_output: &str) -> Vec<String> {
    readelf_output
        .lines()
        .filter(|line| line.contains("(NEEDED)"))
        .filter_map(|line| {
            let start = line.find('[')? + 1;
            let end = line[start..].find(']')? + start;
            Some(line[start..end].to_string())
        })
        .collect()
}

/// Checks produced artifacts against Android loader requirements.
pub struct ArtifactVerifier {
    min_page_size: u64,
    inspector: Box<dyn DependencyInspector>,
}

impl Default for ArtifactVerifier {
    fn default() -> Self {
        Self::new(MIN_PAGE_SIZE, Box::new(NoInspector))
    }
}

impl ArtifactVerifier {
    pub fn new(min_page_size: u64, inspector: Box<dyn DependencyInspector>) -> Self {
        Self {
            min_page_size,
            inspector,
        }
    }

    /// Verify an artifact of unknown architecture.
    pub fn verify(&self, artifact: &Path) -> VerificationReport {
        self.verify_target(artifact, None)
    }

    /// Verify an artifact, also checking it was built for `expected`.
    pub fn verify_target(&self, artifact: &Path, expected: Option<Arch>) -> VerificationReport {
        let bytes = match std::fs::read(artifact) {
            Ok(bytes) => bytes,
            Err(e) => {
                let report = VerificationReport {
                    artifact: artifact.to_path_buf(),
                    executable_type: ExecutableType::Unknown,
                    machine: None,
                    min_load_align: None,
                    dependencies: None,
                    warnings: vec![VerificationWarning {
                        kind: WarningKind::UnreadableHeader,
                        message: format!("cannot read artifact: {e}"),
                    }],
                };
                log_warnings(&report);
                return report;
            }
        };

        let mut report = self.verify_bytes(artifact, &bytes, expected);
        report.dependencies = self.inspector.needed(artifact);
        if let Some(deps) = &report.dependencies {
            for dep in deps {
                if HOST_RUNTIME_LIBS.iter().any(|lib| dep.starts_with(lib)) {
                    report.warnings.push(VerificationWarning {
                        kind: WarningKind::RuntimeDependency,
                        message: format!("depends on {dep}, which is not shipped on devices"),
                    });
                }
            }
        }
        log_warnings(&report);
        report
    }

    /// Header-level checks. A pure function of the artifact bytes.
    pub fn verify_bytes(
        &self,
        artifact: &Path,
        bytes: &[u8],
        expected: Option<Arch>,
    ) -> VerificationReport {
        let header = elf::parse_header(bytes);
        let executable_type = classify(bytes);
        let mut warnings = Vec::new();

        match executable_type {
            ExecutableType::PositionIndependent => {}
            ExecutableType::FixedAddress => warnings.push(VerificationWarning {
                kind: WarningKind::FixedAddress,
                message: "fixed-address executable (ET_EXEC); Android 5.0+ refuses to run it"
                    .into(),
            }),
            ExecutableType::Unknown => warnings.push(VerificationWarning {
                kind: WarningKind::UnreadableHeader,
                message: match header {
                    Some(h) => format!("unexpected ELF type {}", h.object_type),
                    None => "not a readable ELF file".into(),
                },
            }),
        }

        let min_load_align = header.and_then(|h| self.check_alignment(bytes, &h, &mut warnings));

        if let (Some(h), Some(arch)) = (header, expected) {
            if h.machine != arch.elf_machine() {
                warnings.push(VerificationWarning {
                    kind: WarningKind::MachineMismatch,
                    message: format!(
                        "ELF machine {} does not match {arch} (expected {})",
                        h.machine,
                        arch.elf_machine()
                    ),
                });
            }
        }

        VerificationReport {
            artifact: artifact.to_path_buf(),
            executable_type,
            machine: header.map(|h| h.machine),
            min_load_align,
            dependencies: None,
            warnings,
        }
    }

    fn check_alignment(
        &self,
        bytes: &[u8],
        header: &ElfHeader,
        warnings: &mut Vec<VerificationWarning>,
    ) -> Option<u64> {
        let min = elf::load_alignments(bytes, header).into_iter().min()?;
        if min < self.min_page_size {
            warnings.push(VerificationWarning {
                kind: WarningKind::PageAlignment,
                message: format!(
                    "LOAD segment aligned to {min} bytes, below the required {}",
                    self.min_page_size
                ),
            });
        }
        Some(min)
    }
}

fn log_warnings(report: &VerificationReport) {
    for w in &report.warnings {
        warn!("{}: {}", report.artifact.display(), w.message);
    }
}
