//! Host model.
//!
//! Describes the machine running abiforge, which decides which prebuilt
//! NDK toolchain variant can execute on it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Host operating systems the NDK ships prebuilt toolchains for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostOs {
    Linux,
    MacOs,
    Windows,
    /// Anything else; toolchain discovery fails closed.
    Other,
}

impl HostOs {
    /// Map a `std::env::consts::OS` value.
    pub fn from_os_name(name: &str) -> Self {
        match name {
            "linux" => HostOs::Linux,
            "macos" => HostOs::MacOs,
            "windows" => HostOs::Windows,
            _ => HostOs::Other,
        }
    }
}

/// The running host, as far as toolchain discovery cares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostDescriptor {
    /// Operating system family.
    pub os: HostOs,
    /// CPU architecture name as reported by `std::env::consts::ARCH`.
    pub arch: String,
}

impl HostDescriptor {
    pub fn new(os: HostOs, arch: impl Into<String>) -> Self {
        Self {
            os,
            arch: arch.into(),
        }
    }

    /// Describe the host this process is running on.
    pub fn current() -> Self {
        Self::new(
            HostOs::from_os_name(std::env::consts::OS),
            std::env::consts::ARCH,
        )
    }

    /// Prebuilt directory names to probe under `toolchains/llvm/prebuilt/`,
    /// most specific first. Empty for unrecognized hosts.
    ///
    /// macOS NDKs ship a universal `darwin-x86_64` variant even for Apple
    /// silicon, so it is probed before `darwin-arm64`.
    pub fn prebuilt_candidates(&self) -> Vec<&'static str> {
        match self.os {
            HostOs::Linux => vec!["linux-x86_64"],
            HostOs::MacOs => vec!["darwin-x86_64", "darwin-arm64"],
            HostOs::Windows => vec!["windows-x86_64", "windows"],
            HostOs::Other => Vec::new(),
        }
    }
}

impl fmt::Display for HostDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let os = match self.os {
            HostOs::Linux => "linux",
            HostOs::MacOs => "darwin",
            HostOs::Windows => "windows",
            HostOs::Other => "unknown",
        };
        write!(f, "{os}-{}", self.arch)
    }
}
