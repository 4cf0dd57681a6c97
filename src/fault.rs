//! Fault reporting.
//!
//! Two channels: `fatal!` reports an unrecoverable contract violation or
//! escalated exhaustion, emits the message to stderr (and the `log` crate
//! when the `log` feature is enabled) and never returns; `debug_message!`
//! logs without terminating, used for leak reports and teardown notices.

use std::fmt;
use std::io::Write;

/// Emit a non-terminating debug message.
pub(crate) fn emit_debug(args: fmt::Arguments<'_>) {
    #[cfg(feature = "log")]
    log::debug!("{}", args);

    let mut stderr = std::io::stderr();
    let _ = writeln!(stderr, "[tagmem] {}", args);
}

/// Report an unrecoverable failure in `operation`. Never returns.
#[cold]
pub(crate) fn raise(operation: &str, args: fmt::Arguments<'_>) -> ! {
    #[cfg(feature = "log")]
    log::error!("[{}] {}", operation, args);

    {
        let mut stderr = std::io::stderr();
        let _ = writeln!(stderr, "[tagmem][{}] error: {}", operation, args);
    }

    panic!("[tagmem][{}] {}", operation, args);
}

macro_rules! fatal {
    ($operation:expr, $($arg:tt)*) => {
        $crate::fault::raise($operation, format_args!($($arg)*))
    };
}

macro_rules! debug_message {
    ($($arg:tt)*) => {
        $crate::fault::emit_debug(format_args!($($arg)*))
    };
}

pub(crate) use {debug_message, fatal};
