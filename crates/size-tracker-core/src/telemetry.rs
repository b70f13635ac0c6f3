//! Log output for `size-tracker` runs.
//!
//! Lines go to stdout next to the build command's own output and the
//! `::group::` markers, so the Actions log reads in execution order. The
//! runner already timestamps every line, so the text format omits its own.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// HTTP client crates are capped at `warn` unless `RUST_LOG` says otherwise.
const QUIET_DEPENDENCIES: &[&str] = &[
    "hyper=warn",
    "hyper_util=warn",
    "reqwest=warn",
    "rustls=warn",
];

/// Filter directives used when `RUST_LOG` is unset.
pub fn default_directives(level: Level) -> String {
    let mut directives = vec![level.as_str().to_ascii_lowercase()];
    directives.extend(QUIET_DEPENDENCIES.iter().map(|d| d.to_string()));
    directives.join(",")
}

/// Install the global subscriber.
///
/// `json` switches to one JSON object per line for log shipping; `level` is
/// the default verbosity (`--verbose` passes `DEBUG`). A second call is a
/// no-op.
pub fn init_tracing(json: bool, level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if json {
        registry
            .with(fmt::layer().json().with_target(false).with_current_span(true))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).without_time())
            .try_init()
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
