use tracing_subscriber::EnvFilter;

/// Install the stderr subscriber. Stdout carries the panel protocol, so logs never go there.
///
/// A non-empty `RUST_LOG` is used as-is. Otherwise the crate logs at `info`,
/// or `debug` with `verbose`. Calling this twice is harmless.
pub fn init_logging(verbose: bool) {
    let filter = match std::env::var("RUST_LOG") {
        // Scripts often export RUST_LOG="" unconditionally; treat that as unset.
        Ok(rustlog) if !rustlog.is_empty() => EnvFilter::try_new(&rustlog).unwrap_or_else(|_| default_filter(verbose)),
        _ => default_filter(verbose),
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .with_ansi(false)
        .without_time()
        .try_init();
}

fn default_filter(verbose: bool) -> EnvFilter {
    EnvFilter::new(if verbose { "multiref=debug" } else { "multiref=info" })
}
