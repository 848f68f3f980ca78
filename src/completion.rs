//! # Shell Completion Module
//!
//! Completion scripts via `clap_complete`, plus the user-id list the hidden
//! `complete-users` command prints for dynamic `--user` completion.
//!
//! ## Usage
//!
//! ```bash
//! # Generate bash completions
//! tuneprint completion bash > ~/.local/share/bash-completion/completions/tuneprint
//!
//! # Generate zsh completions
//! tuneprint completion zsh > ~/.config/zsh/completions/_tuneprint
//! ```

use crate::cli::Shell;
use crate::store::SnapshotStore;
use anyhow::Result;
use clap::Command;
use clap_complete::{generate, Generator, Shell as CompletionShell};
use std::io::{self, Write};

/// Generate shell completions for the given shell
pub fn generate_completions<G: Generator>(gen: G, cmd: &mut Command) {
    generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
}

#[must_use]
pub fn shell_to_completion_shell(shell: Shell) -> CompletionShell {
    match shell {
        Shell::Bash => CompletionShell::Bash,
        Shell::Zsh => CompletionShell::Zsh,
        Shell::Fish => CompletionShell::Fish,
        Shell::PowerShell => CompletionShell::PowerShell,
        Shell::Elvish => CompletionShell::Elvish,
    }
}

/// Writes one known user id per line.
pub fn write_user_completions(store: &SnapshotStore, out: &mut impl Write) -> Result<()> {
    for user in store.users()? {
        writeln!(out, "{user}")?;
    }
    Ok(())
}

pub fn print_user_completions(store: &SnapshotStore) -> Result<()> {
    write_user_completions(store, &mut io::stdout().lock())
}
