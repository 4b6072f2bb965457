//! Logging macros for the roster engine with verbosity level control.
//!
//! Provides zero-cost logging when disabled (verbosity=0) and routes enabled
//! messages through `tracing`, so the host application decides where they go.
//! Verbosity levels:
//! - 0: SILENT (only warnings emitted directly via `tracing::warn!`)
//! - 1: CHANGES (assignments, relaxations, commits)
//! - 2: CHECKS (candidate consideration, blocking reasons)
//! - 3: DEBUG (full algorithm internals, backtracking)

/// Verbosity level constants.
pub const VERBOSITY_SILENT: u8 = 0;
pub const VERBOSITY_CHANGES: u8 = 1;
pub const VERBOSITY_CHECKS: u8 = 2;
pub const VERBOSITY_DEBUG: u8 = 3;

/// Log at CHANGES level (verbosity >= 1), emitted as `tracing::info!`.
///
/// Used for: shift assignments, applied relaxations, committed edits.
#[macro_export]
macro_rules! log_changes {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_CHANGES {
            ::tracing::info!($($arg)*);
        }
    };
}

/// Log at CHECKS level (verbosity >= 2), emitted as `tracing::debug!`.
///
/// Used for: candidate ranking, skip reasons, eligibility checks.
#[macro_export]
macro_rules! log_checks {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_CHECKS {
            ::tracing::debug!($($arg)*);
        }
    };
}

/// Log at DEBUG level (verbosity >= 3), emitted as `tracing::trace!`.
///
/// Used for: backtracking decisions, per-iteration internals.
#[macro_export]
macro_rules! log_debug {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_DEBUG {
            ::tracing::trace!($($arg)*);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_ordering() {
        assert!(VERBOSITY_SILENT < VERBOSITY_CHANGES);
        assert!(VERBOSITY_CHANGES < VERBOSITY_CHECKS);
        assert!(VERBOSITY_CHECKS < VERBOSITY_DEBUG);
    }

    #[test]
    fn test_log_macros_compile() {
        // No subscriber installed: must be a silent no-op at every level
        for verbosity in [VERBOSITY_SILENT, VERBOSITY_DEBUG] {
            log_changes!(verbosity, "assigned {} on {}", "w1", 3);
            log_checks!(verbosity, "candidate {}", "w2");
            log_debug!(verbosity, "backtrack depth={}", 2);
        }
    }
}
