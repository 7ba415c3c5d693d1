//! Mint a token for local testing against a token-mode server.
//!
//! Run with: cargo run --package access --example issue_token -- <secret> <dir> [quota] [ttl-secs]

use access::{issue, TokenClaims, MIN_SECRET_LENGTH};
use chrono::{Duration, Utc};

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 2 {
        eprintln!("usage: issue_token <secret> <dir> [quota] [ttl-secs]");
        std::process::exit(2);
    }

    let secret = &args[0];
    if secret.len() < MIN_SECRET_LENGTH {
        eprintln!("secret must be at least {} bytes", MIN_SECRET_LENGTH);
        std::process::exit(2);
    }

    let dir = &args[1];
    let quota = args.get(2).cloned().unwrap_or_default();
    let ttl: i64 = match args.get(3).map(|s| s.parse()) {
        Some(Ok(ttl)) => ttl,
        Some(Err(_)) => {
            eprintln!("ttl-secs must be an integer");
            std::process::exit(2);
        }
        None => 3600,
    };

    let expiry = Utc::now() + Duration::seconds(ttl);
    let claims = TokenClaims::new(dir.as_str(), quota)
        .with_exp(expiry)
        .with_expires_at(expiry.to_rfc3339());

    match issue(&claims, secret.as_bytes()) {
        Ok(token) => println!("{}", token),
        Err(e) => {
            eprintln!("failed to sign token: {}", e);
            std::process::exit(1);
        }
    }
}
