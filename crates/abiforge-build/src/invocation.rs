//! Concrete build tool invocations.
//!
//! An [`Invocation`] carries everything one target's build needs: program,
//! arguments, and an explicit environment map. The executor never touches
//! the process environment, so targets cannot leak settings into each other.

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::process::Command;

use log::debug;
use serde::Serialize;

/// Number of trailing stderr lines kept from a failed build.
const STDERR_TAIL_LINES: usize = 20;

/// One fully bound build tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
    /// Target identifier (ABI name).
    pub target: String,
    /// Build tool executable.
    pub program: PathBuf,
    /// Arguments after the program name.
    pub args: Vec<String>,
    /// Variables set for this call on top of the inherited environment.
    pub env: BTreeMap<String, String>,
    /// Working directory for the call, if not the current one.
    pub current_dir: Option<PathBuf>,
    /// Where the artifact is expected to appear.
    pub output: PathBuf,
}

impl Invocation {
    /// Render as a shell-like line for logs.
    pub fn display_line(&self) -> String {
        let env: Vec<String> = self.env.iter().map(|(k, v)| format!("{k}={v}")).collect();
        let args: Vec<String> = self
            .args
            .iter()
            .map(|a| {
                if a.contains(' ') {
                    format!("\"{a}\"")
                } else {
                    a.clone()
                }
            })
            .collect();
        format!(
            "{} {} {}",
            env.join(" "),
            self.program.display(),
            args.join(" ")
        )
    }
}

/// How a finished invocation went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationOutcome {
    pub success: bool,
    /// Exit code, if the process exited normally.
    pub exit_code: Option<i32>,
    /// Last lines of stderr.
    pub stderr_tail: String,
}

impl InvocationOutcome {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            exit_code: Some(0),
            stderr_tail: String::new(),
        }
    }

    pub fn failed(exit_code: i32, stderr_tail: impl Into<String>) -> Self {
        Self {
            success: false,
            exit_code: Some(exit_code),
            stderr_tail: stderr_tail.into(),
        }
    }
}

/// Runs invocations. Implementations must be shareable across worker threads.
pub trait Invoker: Sync {
    /// Run one invocation to completion.
    ///
    /// `Err` means the tool could not be started at all.
    fn invoke(&self, invocation: &Invocation) -> io::Result<InvocationOutcome>;
}

/// Runs invocations as child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessInvoker;

impl Invoker for ProcessInvoker {
    fn invoke(&self, invocation: &Invocation) -> io::Result<InvocationOutcome> {
        debug!("exec: {}", invocation.display_line());
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args).envs(&invocation.env);
        if let Some(dir) = &invocation.current_dir {
            cmd.current_dir(dir);
        }
        let output = cmd.output()?;
        Ok(InvocationOutcome {
            success: output.status.success(),
            exit_code: output.status.code(),
            stderr_tail: tail_lines(&String::from_utf8_lossy(&output.stderr), STDERR_TAIL_LINES),
        })
    }
}

fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}
