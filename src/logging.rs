//! Diagnostic logging setup.
//!
//! Logs go to stderr so that command output on stdout (answers, search
//! results, stats) stays clean. The filter comes from `RAGCHAT_LOG` when
//! set, otherwise from the `--verbose` flag.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "RAGCHAT_LOG";

fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "ragchat=debug,ragchat_core=debug"
    } else {
        "ragchat=info,ragchat_core=info"
    }
}

/// Install the global subscriber. A second call is a no-op.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .with_ansi(atty::is(atty::Stream::Stderr));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_raises_crate_levels() {
        assert!(default_directives(true).contains("ragchat=debug"));
        assert_eq!(default_directives(false), "ragchat=info,ragchat_core=info");
    }

    #[test]
    fn init_twice_is_harmless() {
        init(false);
        init(true);
    }
}
