//! Tracing initialisation for cvbake processes.
//!
//! Call [`init_tracing`] once at program start. The global subscriber can
//! only be installed once per process; later calls change nothing.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter applied when neither `RUST_LOG` nor `--verbose` is in play:
/// batch progress from cvbake itself, warnings from everything else.
const DEFAULT_DIRECTIVES: &str = "warn,cvbake_core=info,cvbake=info";

/// Verbose filter: debug-level cvbake events, info from dependencies.
const VERBOSE_DIRECTIVES: &str = "info,cvbake_core=debug,cvbake=debug";

/// Initialise the global tracing subscriber.
///
/// * `json` — when `true`, emit newline-delimited JSON log lines.
/// * `verbose` — select [`VERBOSE_DIRECTIVES`] over [`DEFAULT_DIRECTIVES`].
///
/// `RUST_LOG` overrides the built-in directives entirely. Returns whether
/// this call installed the subscriber; `false` means one was already in
/// place.
pub fn init_tracing(json: bool, verbose: bool) -> bool {
    let directives = if verbose {
        VERBOSE_DIRECTIVES
    } else {
        DEFAULT_DIRECTIVES
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(fmt::layer().with_target(false).json())
            .try_init()
            .is_ok()
    } else {
        registry
            .with(fmt::layer().with_target(false))
            .try_init()
            .is_ok()
    }
}
