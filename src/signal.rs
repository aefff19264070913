//! Ctrl+C handling for cooperative cancellation.
//!
//! A single `Arc<AtomicBool>` is shared with the walker, the hasher and the
//! index builder. Setting it stops new work; anything already appended to
//! the operation log stays valid, and an interrupted scan is never cached.
//!
//! ```rust,no_run
//! use fileorg::scanner::{ScanOptions, Scanner};
//! use fileorg::signal::install_handler;
//!
//! let handler = install_handler();
//! let scanner = Scanner::new(ScanOptions::default()).with_shutdown_flag(handler.get_flag());
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Shared shutdown flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandler {
    /// Create a handler with no shutdown requested.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether Ctrl+C was pressed or [`request_shutdown`](Self::request_shutdown) was called.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Set the flag.
    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Clear the flag.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    /// The flag itself, for components that take `with_shutdown_flag`.
    #[must_use]
    pub fn get_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }
}

static INSTALLED: OnceLock<ShutdownHandler> = OnceLock::new();

/// Install the process-wide Ctrl+C hook and return its handler.
///
/// Calling this again returns the same handler with the flag cleared. If
/// the hook cannot be registered (another crate owns it), the returned
/// handler still works for [`ShutdownHandler::request_shutdown`].
pub fn install_handler() -> ShutdownHandler {
    let handler = INSTALLED.get_or_init(|| {
        let handler = ShutdownHandler::new();
        let flag = handler.get_flag();
        let hooked = ctrlc::set_handler(move || {
            flag.store(true, Ordering::SeqCst);
            let mut stderr = std::io::stderr();
            let _ = writeln!(stderr, "\nInterrupted. Finishing current step...");
            let _ = stderr.flush();
        });
        if let Err(e) = hooked {
            log::debug!("Ctrl+C hook not installed: {}", e);
        }
        handler
    });
    handler.reset();
    handler.clone()
}
