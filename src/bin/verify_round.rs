//! Round Verifier
//!
//! Checks a revealed round offline:
//!
//! ```text
//! verify-round --secret <hex> --sequence <n> --commitment <hex> [--multiplier <x>]
//! ```
//!
//! The secret is used exactly as revealed: its text is hashed and used as
//! the HMAC key, it is not hex-decoded first.
//!
//! Exits non-zero if the secret does not match the commitment or the
//! announced multiplier cannot be reproduced.

use anyhow::{anyhow, bail};
use clap::Parser;

use crash_round::fairness::commitment::verify as verify_commitment;
use crash_round::fairness::verify::MULTIPLIER_TOLERANCE;
use crash_round::{compute_crash_multiplier, verify_round, CommitmentHash};

/// Verify a crash round from its revealed secret
#[derive(Parser, Debug)]
#[command(name = "verify-round")]
#[command(about = "Recompute the commitment and crash multiplier of a revealed round")]
#[command(version)]
struct Cli {
    /// Revealed secret, as published at the crash
    #[arg(short, long)]
    secret: String,

    /// Round sequence number
    #[arg(short = 'n', long)]
    sequence: u64,

    /// Commitment hash published before the round (hex)
    #[arg(short, long)]
    commitment: String,

    /// Crash multiplier announced at the crash
    #[arg(short, long)]
    multiplier: Option<f64>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let secret = cli.secret.trim();
    if secret.is_empty() {
        bail!("secret must not be empty");
    }
    let secret = secret.as_bytes();
    let commitment = CommitmentHash::from_hex(&cli.commitment)
        .ok_or_else(|| anyhow!("commitment must be 64 hex characters"))?;

    let recomputed = compute_crash_multiplier(secret, cli.sequence);

    match cli.multiplier {
        Some(announced) => {
            let report = verify_round(secret, cli.sequence, &commitment, announced)?;
            println!("commitment:  OK ({})", commitment);
            println!(
                "multiplier:  OK (announced {:.2}x, recomputed {:.6}x, drift {:.6} <= {})",
                announced, report.recomputed_multiplier, report.drift, MULTIPLIER_TOLERANCE
            );
        }
        None => {
            if !verify_commitment(secret, &commitment) {
                bail!("SHA-256 of the secret does not match commitment {}", commitment);
            }
            println!("commitment:  OK ({})", commitment);
            println!("multiplier:  {:.6}x (round {})", recomputed, cli.sequence);
        }
    }

    Ok(())
}
