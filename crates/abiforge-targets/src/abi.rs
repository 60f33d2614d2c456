//! CPU architecture model.
//!
//! Maps each Android architecture to the identifiers the build tool, the
//! NDK clang driver and the ELF loader use for it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TargetError;

/// A CPU architecture Android ships native code for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Arch {
    /// AArch64 (ARMv8-A, 64-bit).
    Arm64,
    /// 32-bit ARM (ARMv7-A).
    Arm,
    /// 32-bit x86 (i686).
    X86,
    /// x86-64 (AMD64).
    X86_64,
}

impl Arch {
    /// All architectures, in the default catalog order.
    pub const ALL: [Arch; 4] = [Arch::Arm64, Arch::Arm, Arch::X86, Arch::X86_64];

    /// The value the build tool expects for `GOARCH`.
    pub fn goarch(self) -> &'static str {
        match self {
            Arch::Arm64 => "arm64",
            Arch::Arm => "arm",
            Arch::X86 => "386",
            Arch::X86_64 => "amd64",
        }
    }

    /// The clang target triple prefix used by NDK compiler wrappers.
    pub fn clang_triple(self) -> &'static str {
        match self {
            Arch::Arm64 => "aarch64-linux-android",
            Arch::Arm => "armv7a-linux-androideabi",
            Arch::X86 => "i686-linux-android",
            Arch::X86_64 => "x86_64-linux-android",
        }
    }

    /// Native word size in bits.
    pub fn word_size(self) -> u32 {
        match self {
            Arch::Arm64 | Arch::X86_64 => 64,
            Arch::Arm | Arch::X86 => 32,
        }
    }

    /// The ELF `e_machine` value binaries for this architecture carry.
    pub fn elf_machine(self) -> u16 {
        match self {
            Arch::Arm64 => 183, // EM_AARCH64
            Arch::Arm => 40,    // EM_ARM
            Arch::X86 => 3,     // EM_386
            Arch::X86_64 => 62, // EM_X86_64
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.goarch())
    }
}

impl FromStr for Arch {
    type Err = TargetError;

    /// Accepts build-tool names (`amd64`), Rust-style names (`aarch64`) and
    /// kebab-case serde names (`x86-64`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "arm64" | "aarch64" => Ok(Arch::Arm64),
            "arm" | "armv7" | "armv7a" => Ok(Arch::Arm),
            "386" | "x86" | "i686" => Ok(Arch::X86),
            "amd64" | "x86_64" | "x86-64" => Ok(Arch::X86_64),
            other => Err(TargetError::UnknownTarget {
                name: other.to_string(),
            }),
        }
    }
}
