//! Tracing subscriber setup for the `rrz` binary.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Default filter directive for a verbosity level (`-q` = -1, `-v` = 1).
pub fn default_directive(verbosity: i8) -> &'static str {
    match verbosity {
        i8::MIN..=-1 => "rr_zfind=warn",
        0 => "rr_zfind=info",
        _ => "rr_zfind=debug",
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `verbosity`.
///
/// Logs go to stderr so that tables printed on stdout stay clean.
pub fn init_logging(verbosity: i8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));
    let console_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    // A second call (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(default_directive(-1), "rr_zfind=warn");
        assert_eq!(default_directive(0), "rr_zfind=info");
        assert_eq!(default_directive(3), "rr_zfind=debug");
    }
}
