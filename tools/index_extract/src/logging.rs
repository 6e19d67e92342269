//! stderr logging for the extraction CLI.
//!
//! Each `-v` raises the level of our own events (library and binary) one
//! step above `warn`; dependencies stay at `warn`. A set `RUST_LOG` replaces
//! the whole filter.
use tracing_subscriber::EnvFilter;

fn level_name(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn default_directives(verbose: u8) -> String {
    let level = level_name(verbose);
    format!("warn,parcel_core={level},index_extract={level}")
}

pub fn init(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose >= 2)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_raises_only_our_targets() {
        assert_eq!(default_directives(0), "warn,parcel_core=warn,index_extract=warn");
        assert_eq!(default_directives(1), "warn,parcel_core=info,index_extract=info");
        assert_eq!(default_directives(9), "warn,parcel_core=trace,index_extract=trace");
    }
}
