//! TOML parsing, serialization, and validation for target catalogs.
//!
//! A project may replace the built-in catalog with a `targets.toml` file
//! holding one `[[target]]` table per ABI. Compiler wrapper names may be
//! omitted, in which case they follow the NDK naming convention for the
//! entry's architecture and API level.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::abi::Arch;
use crate::catalog::{BuildTarget, Catalog, MIN_API_LEVEL};
use crate::error::{Result, TargetError};

/// Variables the executor sets itself; a target may not override them.
pub const RESERVED_ENV: [&str; 5] = ["GOOS", "GOARCH", "CGO_ENABLED", "CC", "CXX"];

/// A validation issue found in a catalog definition.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Severity: "error" or "warning".
    pub severity: &'static str,
    /// Human-readable description.
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    target: Vec<TargetDef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct TargetDef {
    arch: String,
    abi: String,
    #[serde(default)]
    api_level: Option<u32>,
    #[serde(default)]
    compiler: Option<String>,
    #[serde(default)]
    linker: Option<String>,
    #[serde(default)]
    env_overrides: BTreeMap<String, String>,
}

impl TargetDef {
    fn into_target(self) -> Result<BuildTarget> {
        let arch: Arch = self.arch.parse()?;
        let mut target = BuildTarget::new(arch, self.abi, self.api_level.unwrap_or(MIN_API_LEVEL));
        if let Some(compiler) = self.compiler {
            target.compiler = compiler;
        }
        if let Some(linker) = self.linker {
            target.linker = linker;
        }
        target.env_overrides = self.env_overrides;
        Ok(target)
    }
}

/// Load a catalog from a TOML file.
pub fn load_catalog_toml(path: &Path) -> Result<Catalog> {
    if !path.exists() {
        return Err(TargetError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    parse_catalog_toml(&content)
}

/// Parse a catalog from a TOML string.
pub fn parse_catalog_toml(toml_str: &str) -> Result<Catalog> {
    let file: CatalogFile = toml::from_str(toml_str)?;
    let targets = file
        .target
        .into_iter()
        .map(TargetDef::into_target)
        .collect::<Result<Vec<_>>>()?;
    Catalog::new(targets)
}

/// Serialize a catalog to pretty TOML.
pub fn catalog_to_toml(catalog: &Catalog) -> Result<String> {
    let toml_str = toml::to_string_pretty(catalog)?;
    Ok(toml_str)
}

/// Serialize a catalog to JSON for tooling.
pub fn catalog_to_json(catalog: &Catalog) -> String {
    // Catalog holds only strings and maps; serialization cannot fail.
    serde_json::to_string_pretty(catalog).unwrap_or_default()
}

/// Validate a catalog for structural correctness.
///
/// Returns `Ok(())` if valid, or `Err(issues)` with a list of problems.
pub fn validate_catalog(catalog: &Catalog) -> std::result::Result<(), Vec<ValidationIssue>> {
    let mut issues = Vec::new();

    if catalog.is_empty() {
        issues.push(ValidationIssue {
            severity: "error",
            message: "catalog defines no targets".into(),
        });
    }

    for target in catalog.targets() {
        if target.abi.is_empty() || target.abi.contains(['/', '\\']) {
            issues.push(ValidationIssue {
                severity: "error",
                message: format!("ABI name '{}' is not a valid directory name", target.abi),
            });
        }

        for (name, value) in [("compiler", &target.compiler), ("linker", &target.linker)] {
            if value.is_empty() {
                issues.push(ValidationIssue {
                    severity: "error",
                    message: format!("target '{}' has an empty {name}", target.abi),
                });
            } else if !value.starts_with(target.arch.clang_triple()) {
                issues.push(ValidationIssue {
                    severity: "warning",
                    message: format!(
                        "target '{}' {name} '{value}' does not match triple '{}'",
                        target.abi,
                        target.arch.clang_triple()
                    ),
                });
            }
        }

        for key in target.env_overrides.keys() {
            if RESERVED_ENV.contains(&key.as_str()) {
                issues.push(ValidationIssue {
                    severity: "error",
                    message: format!(
                        "target '{}' overrides reserved variable {key}",
                        target.abi
                    ),
                });
            }
        }
    }

    let arches: Vec<_> = catalog.targets().iter().map(|t| t.arch).collect();
    for (i, arch) in arches.iter().enumerate() {
        if arches[..i].contains(arch) {
            issues.push(ValidationIssue {
                severity: "warning",
                message: format!("architecture {arch} appears more than once"),
            });
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::default_catalog;

    #[test]
    fn round_trip_default() {
        let original = default_catalog();
        let toml_str = catalog_to_toml(&original).unwrap();
        let parsed = parse_catalog_toml(&toml_str).unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn parse_minimal_toml() {
        let toml_str = r#"
[[target]]
arch = "arm64"
abi = "arm64-v8a"

[[target]]
arch = "arm"
abi = "armeabi-v7a"
api-level = 23

[target.env-overrides]
GOARM = "7"
"#;
        let catalog = parse_catalog_toml(toml_str).unwrap();
        assert_eq!(catalog.len(), 2);
        let arm = catalog.find("armeabi-v7a").unwrap();
        assert_eq!(arm.compiler, "armv7a-linux-androideabi23-clang");
        assert_eq!(arm.env_overrides.get("GOARM").unwrap(), "7");
        assert_eq!(
            catalog.find("arm64-v8a").unwrap().compiler,
            "aarch64-linux-android21-clang"
        );
    }

    #[test]
    fn parse_invalid_returns_error() {
        assert!(parse_catalog_toml("this is not valid toml [[[").is_err());
    }

    #[test]
    fn parse_unknown_arch_returns_error() {
        let toml_str = r#"
[[target]]
arch = "mips"
abi = "mips"
"#;
        assert!(matches!(
            parse_catalog_toml(toml_str).unwrap_err(),
            TargetError::UnknownTarget { .. }
        ));
    }

    #[test]
    fn parse_duplicate_abi_returns_error() {
        let toml_str = r#"
[[target]]
arch = "arm64"
abi = "arm64-v8a"

[[target]]
arch = "arm64"
abi = "arm64-v8a"
"#;
        assert!(parse_catalog_toml(toml_str).is_err());
    }

    #[test]
    fn validate_default_catalog() {
        assert!(validate_catalog(&default_catalog()).is_ok());
    }

    #[test]
    fn validate_empty_catalog() {
        let catalog = Catalog::new(Vec::new()).unwrap();
        let issues = validate_catalog(&catalog).unwrap_err();
        assert!(issues.iter().any(|i| i.message.contains("no targets")));
    }

    #[test]
    fn validate_reserved_override() {
        let target = BuildTarget::new(Arch::Arm64, "arm64-v8a", 21).with_env("GOARCH", "arm");
        let catalog = Catalog::new(vec![target]).unwrap();
        let issues = validate_catalog(&catalog).unwrap_err();
        assert!(issues
            .iter()
            .any(|i| i.severity == "error" && i.message.contains("reserved variable GOARCH")));
    }

    #[test]
    fn validate_mismatched_compiler() {
        let mut target = BuildTarget::new(Arch::X86, "x86", 21);
        target.compiler = "aarch64-linux-android21-clang".into();
        let catalog = Catalog::new(vec![target]).unwrap();
        let issues = validate_catalog(&catalog).unwrap_err();
        assert!(issues
            .iter()
            .any(|i| i.severity == "warning" && i.message.contains("does not match triple")));
    }

    #[test]
    fn validate_bad_abi_name() {
        let target = BuildTarget::new(Arch::X86, "x86/../..", 21);
        let catalog = Catalog::new(vec![target]).unwrap();
        let issues = validate_catalog(&catalog).unwrap_err();
        assert!(issues.iter().any(|i| i.message.contains("directory name")));
    }

    #[test]
    fn json_lists_targets() {
        let json = catalog_to_json(&default_catalog());
        assert!(json.contains("\"arm64-v8a\""));
        assert!(json.contains("\"GOARM\""));
    }

    #[test]
    fn load_not_found() {
        let result = load_catalog_toml(Path::new("/nonexistent/targets.toml"));
        assert!(matches!(result.unwrap_err(), TargetError::NotFound { .. }));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("targets.toml");
        std::fs::write(&path, catalog_to_toml(&default_catalog()).unwrap()).unwrap();

        let catalog = load_catalog_toml(&path).unwrap();
        assert_eq!(catalog.len(), 4);
    }
}
