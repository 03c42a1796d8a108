//! Log level selection for storinspect
//!
//! The crate logs through the `log` facade and never installs a logger
//! itself. This module only decides how chatty it is allowed to be,
//! based on the `debug` and `verbose` features.

use log::LevelFilter;

/// Get the compile-time log level
pub fn level() -> LevelFilter {
    #[cfg(feature = "debug")]
    {
        #[cfg(feature = "verbose")]
        return LevelFilter::Trace;

        #[cfg(not(feature = "verbose"))]
        return LevelFilter::Debug;
    }

    #[cfg(not(feature = "debug"))]
    LevelFilter::Info
}

/// Apply the compile-time log level to the `log` facade
pub fn init() {
    log::set_max_level(level());
    log::debug!(
        "storinspect v{} logging at {} (debug={}, verbose={})",
        crate::VERSION,
        level(),
        crate::config::DEBUG,
        crate::config::VERBOSE
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_matches_features() {
        let expected = if crate::config::DEBUG && crate::config::VERBOSE {
            LevelFilter::Trace
        } else if crate::config::DEBUG {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        };
        assert_eq!(level(), expected);
    }
}
