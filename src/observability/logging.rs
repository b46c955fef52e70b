//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber for the binary
//! - Mask secrets before they reach a log line
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - `RUST_LOG` wins over the configured level when set
//! - Private keys and mnemonics only ever appear masked

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. Safe to call more than once.
pub fn init(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("btc_wallet_core={0},btc_wallet={0}", log_level)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Mask a sensitive string, keeping at most four characters at each end.
///
/// Strings shorter than eight characters are fully hidden.
pub fn mask_secret(data: &str) -> String {
    let chars: Vec<char> = data.chars().collect();
    if chars.len() < 8 {
        return "****".to_string();
    }
    let visible = (chars.len() / 4).min(4);
    let head: String = chars[..visible].iter().collect();
    let tail: String = chars[chars.len() - visible..].iter().collect();
    format!("{}...{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret(""), "****");
        assert_eq!(mask_secret("short"), "****");
        assert_eq!(mask_secret("abcdefgh"), "ab...gh");
        assert_eq!(
            mask_secret("cVbZ9eQyCQKionG7J7xu5VLcKQzoubd6uv9pkzmfP24vRkXdLYGN"),
            "cVbZ...LYGN"
        );
    }
}
