//! Log output.
//!
//! Progress, warnings and failed searches all go through `tracing`. The
//! binary writes them to stderr so the stream stays separate from any data
//! on stdout.

use tracing::Subscriber;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,sqlx=warn";

/// `RUST_LOG` if set and valid, otherwise [`DEFAULT_FILTER`].
pub fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// A formatting subscriber writing to `make_writer`.
pub fn subscriber<W>(
    filter: EnvFilter,
    make_writer: W,
) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .with(filter)
}
