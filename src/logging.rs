use tracing_subscriber::EnvFilter;

/// Diagnostics go to stderr so the report on stdout stays clean.
/// `RUST_LOG` wins; otherwise `--quiet` means warnings only and `--debug` means everything.
pub fn init(quiet: bool, debug: bool) {
  let default_level = if debug {
    "debug"
  } else if quiet {
    "warn"
  } else {
    "info"
  };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  let _ = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .with_target(false)
    .without_time()
    .try_init();
}
