//! Shell completion generation.

use anyhow::{Context, Result};
use clap::CommandFactory;
use clap_complete::{Shell, generate};
use std::env;
use std::io::{self, Write as _};
use std::path::Path;

use crate::Cli;

const BIN: &str = "atlink";

/// `completions [SHELL]`: print the script; the shell defaults to `$SHELL`.
pub(crate) fn run(shell: Option<Shell>) -> Result<()> {
    let shell = shell.or_else(detect_shell_type).context(
        "Could not detect your shell. Please specify it explicitly, e.g.:\n  \
         atlink completions bash",
    )?;
    io::stdout().write_all(&script(shell))?;
    Ok(())
}

/// Render the completion script for `shell`.
fn script(shell: Shell) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, BIN, &mut buf);
    buf
}

/// Detect the user's current shell from environment.
fn detect_shell_type() -> Option<Shell> {
    if let Ok(shell_path) = env::var("SHELL") {
        return shell_from_path(&shell_path);
    }
    if cfg!(windows) && env::var("PSModulePath").is_ok() {
        return Some(Shell::PowerShell);
    }
    None
}

fn shell_from_path(shell_path: &str) -> Option<Shell> {
    let shell_name = Path::new(shell_path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");
    match shell_name {
        "bash" => Some(Shell::Bash),
        "zsh" => Some(Shell::Zsh),
        "fish" => Some(Shell::Fish),
        "elvish" => Some(Shell::Elvish),
        "pwsh" | "powershell" => Some(Shell::PowerShell),
        _ => None,
    }
}
