use tracing_subscriber::{EnvFilter, prelude::*};

/// Crates whose events follow `RUST_LOG`; everything else stays at `warn`.
/// The `reel` binary shares its target prefix with the library.
const WORKSPACE_CRATES: [&str; 2] = ["reel", "utils"];

pub fn filter_directives(level: &str) -> String {
    let mut directives = vec!["warn".to_string()];
    directives.extend(
        WORKSPACE_CRATES
            .iter()
            .map(|name| format!("{}={}", name, level)),
    );
    directives.join(",")
}

/// Install the global subscriber: env-filtered fmt layer on stderr.
///
/// `RUST_LOG` may be a bare level (`debug`) or a full directive string; `default_level`
/// applies when it is unset.
pub fn init_tracing(default_level: &str) {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| default_level.to_string());
    let env_filter = if log_level.contains('=') || log_level.contains(',') {
        EnvFilter::try_new(&log_level)
    } else {
        EnvFilter::try_new(filter_directives(&log_level))
    }
    .unwrap_or_else(|_| EnvFilter::new(filter_directives("info")));

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(env_filter),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directives() {
        assert_eq!(
            filter_directives("debug"),
            "warn,reel=debug,utils=debug"
        );
        assert!(EnvFilter::try_new(filter_directives("info")).is_ok());
    }
}
