/// Logging macros for the supervisor and its collaborators
///
/// These wrap the `log` facade with a fixed `link` target so that a single
/// `RUST_LOG=link=debug` filter shows every state transition.
///
/// Log debug-level message
///
/// # Example
/// ```
/// use link_runtime::link_debug;
/// link_debug!("LinkSupervisor: {:?} → {:?}", "Disconnected", "Connecting");
/// ```
#[macro_export]
macro_rules! link_debug {
    ($($arg:tt)*) => {
        $crate::__log::debug!(target: "link", $($arg)*)
    };
}

/// Log info-level message
///
/// Use for session lifecycle changes visible to the user
#[macro_export]
macro_rules! link_info {
    ($($arg:tt)*) => {
        $crate::__log::info!(target: "link", $($arg)*)
    };
}

/// Log warning-level message
///
/// Use for recoverable errors and dropped notifications
#[macro_export]
macro_rules! link_warn {
    ($($arg:tt)*) => {
        $crate::__log::warn!(target: "link", $($arg)*)
    };
}

/// Log error-level message
///
/// Use for failures that leave the session unusable
#[macro_export]
macro_rules! link_error {
    ($($arg:tt)*) => {
        $crate::__log::error!(target: "link", $($arg)*)
    };
}

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    #[test]
    fn test_logging_macros_compile() {
        link_debug!("test debug");
        link_info!("test info");
        link_warn!("test warn");
        link_error!("test error");
    }

    #[test]
    fn test_logging_with_format_args() {
        link_debug!("LinkSupervisor: {} → {}", "Connected", "Probing");
        link_info!("Port opened at {} baud", 115200);
        link_warn!("Reconnect attempt {}/{}", 1, 5);
        link_error!("Failed to open port: {}", "Access denied");
    }
}
