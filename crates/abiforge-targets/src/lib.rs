//! Android ABI targets and NDK toolchain discovery for abiforge.
//!
//! Three pieces of fixed data feed every build:
//! - **Host:** which prebuilt toolchain variant the running machine can execute
//! - **Toolchain:** the NDK root and its resolved host `bin/` directory
//! - **Catalog:** the ordered set of ABI targets and their per-target overrides

pub mod abi;
pub mod catalog;
pub mod error;
pub mod host;
pub mod parse;
pub mod toolchain;

pub use abi::Arch;
pub use catalog::{default_catalog, BuildTarget, Catalog, MIN_API_LEVEL};
pub use error::{Result, TargetError};
pub use host::{HostDescriptor, HostOs};
pub use toolchain::{locate, toolchain_root_from_env, ToolchainPath, NDK_ROOT_VARS};
