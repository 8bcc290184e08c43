//! Batch evaluator for a toolbox of cryptographic and cryptanalytic actions:
//! GF(2^128) arithmetic, polynomial factorization over that field, AES-GCM,
//! a GCM nonce-reuse key recovery, a CBC padding-oracle attack client and
//! batch-GCD factoring of RSA moduli.
//!
//! Input is a JSON file of testcases; output is one `{"id", "reply"}` JSON
//! object per line on stdout.

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

mod action;
mod batch;
mod calc;
mod factor;
mod gcm;
mod gcm_crack;
mod gf128;
mod gfpoly;
mod padding_oracle;
mod rsa_factor;
mod utils;

use crate::utils::Result;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the JSON batch file
    batch: PathBuf,
}

fn run(path: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    let input = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    let stdout = std::io::stdout();
    batch::run(input, &mut stdout.lock())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli.batch) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
