use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::progress::OutputMode;

/// Terminal filter for a given output mode.
///
/// Tracing is suppressed while spinners own the terminal: writing to stderr
/// underneath indicatif corrupts its line tracking.
pub fn terminal_filter(mode: OutputMode, verbose: bool) -> EnvFilter {
    match mode {
        _ if verbose => EnvFilter::new("mpvm=debug"),
        OutputMode::Verbose => EnvFilter::new("mpvm=debug"),
        OutputMode::Normal => EnvFilter::new("off"),
        OutputMode::Plain => match "mpvm=info".parse() {
            Ok(directive) => EnvFilter::from_default_env().add_directive(directive),
            Err(_) => EnvFilter::from_default_env(),
        },
    }
}

/// Install the global subscriber, writing to stderr.
pub fn init(mode: OutputMode, verbose: bool) {
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .with_filter(terminal_filter(mode, verbose));

    tracing_subscriber::registry().with(layer).init();
}
