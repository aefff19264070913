//! Logging setup for the `fileorg` binary.
//!
//! Library code only emits through the `log` macros; the binary installs an
//! `env_logger` backend once at startup. The level comes from, in order:
//!
//! 1. `RUST_LOG` (full env_logger filter syntax)
//! 2. `--quiet` (errors only) or `-v` / `-vv` (debug / trace)
//! 3. Info
//!
//! Dependencies are held at `warn` unless `RUST_LOG` says otherwise, so
//! `-vv` traces this crate without flooding the output with SQLite or
//! thread-pool internals.
//!
//! ```rust,no_run
//! use fileorg::logging::init_logging;
//!
//! init_logging(1, false);
//! log::debug!("visible with -v");
//! ```

use std::env;
use std::io::Write;

use env_logger::Builder;
use log::LevelFilter;

/// Install the global logger. Returns `false` if one was already installed.
pub fn init_logging(verbose: u8, quiet: bool) -> bool {
    let mut builder = Builder::new();

    let from_env = env::var("RUST_LOG").is_ok();
    if from_env {
        builder.parse_default_env();
    } else {
        builder
            .filter_level(LevelFilter::Warn)
            .filter_module(env!("CARGO_CRATE_NAME"), level_for(verbose, quiet));
    }

    let detailed = cfg!(debug_assertions) || verbose > 0;
    builder.format(move |buf, record| {
        let level = record.level();
        let style = buf.default_level_style(level);
        if detailed {
            writeln!(
                buf,
                "{} {style}{:<5}{style:#} [{}] {}",
                buf.timestamp_millis(),
                level,
                record.module_path().unwrap_or("?"),
                record.args()
            )
        } else {
            writeln!(buf, "{style}{:<5}{style:#} {}", level, record.args())
        }
    });

    let installed = builder.try_init().is_ok();
    if installed {
        log::debug!(
            "Logging at {} ({})",
            log::max_level(),
            if from_env { "RUST_LOG" } else { "flags" }
        );
    }
    installed
}

/// Level selected by the verbosity flags.
fn level_for(verbose: u8, quiet: bool) -> LevelFilter {
    match (quiet, verbose) {
        (true, _) => LevelFilter::Error,
        (false, 0) => LevelFilter::Info,
        (false, 1) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    }
}
