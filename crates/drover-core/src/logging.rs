//! Tracing subscriber bootstrap.
//!
//! All crates log through `tracing` macros with structured fields; hosts
//! install the subscriber once at startup and libraries never do. Filter
//! precedence: `DROVER_LOG` > `RUST_LOG` > the host-supplied default
//! level. The default directive quiets `hyper` and `reqwest` connection
//! noise so operator sessions stay readable at `debug`.

use tracing_subscriber::EnvFilter;

/// Environment variable holding a drover-specific filter directive.
pub const LOG_ENV_VAR: &str = "DROVER_LOG";

/// Install the global stderr subscriber.
///
/// `level` is the fallback directive (`"warn"`, `"info"`, `"debug"`, or
/// any `EnvFilter` expression) used when neither `DROVER_LOG` nor
/// `RUST_LOG` is set. Returns `false` if a subscriber was already
/// installed; calling twice is harmless.
pub fn init_subscriber(level: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(resolve_filter(level))
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .is_ok()
}

/// Build the filter from the environment, falling back to `level` with
/// the HTTP-stack directives appended.
fn resolve_filter(level: &str) -> EnvFilter {
    if let Ok(directive) = std::env::var(LOG_ENV_VAR) {
        if !directive.is_empty() {
            if let Ok(filter) = directive.parse::<EnvFilter>() {
                return filter;
            }
        }
    }
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter(level))
}

fn default_filter(level: &str) -> EnvFilter {
    let directive = format!("{level},hyper=warn,reqwest=warn");
    directive
        .parse::<EnvFilter>()
        .unwrap_or_else(|_| EnvFilter::new("warn"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
