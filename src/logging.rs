//! Diagnostic logging. `RUST_LOG` wins when set; otherwise the `debugLogging`
//! setting picks between crate debug output and warnings only.

use tracing::warn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

pub fn default_directive(debug: bool) -> &'static str {
    if debug {
        "demo_typer=debug,warn"
    } else {
        "warn"
    }
}

fn filter_for(debug: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(debug)))
}

/// Changes verbosity of the installed subscriber at runtime.
#[derive(Clone)]
pub struct LogHandle {
    filter: reload::Handle<EnvFilter, Registry>,
}

impl LogHandle {
    pub fn set_debug(&self, debug: bool) {
        if let Err(err) = self.filter.reload(filter_for(debug)) {
            warn!(error = %err, "could not change log level");
        }
    }
}

/// Installs the global subscriber, writing to stderr. Returns `None` when a
/// subscriber is already installed.
pub fn init(debug: bool) -> Option<LogHandle> {
    let (filter, handle) = reload::Layer::new(filter_for(debug));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init()
        .ok()?;
    Some(LogHandle { filter: handle })
}
