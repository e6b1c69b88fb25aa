//! Logging setup

use log::LevelFilter;

/// Install the stderr logger. Warnings are always shown; `verbose` adds decoder traces.
pub fn init(verbose: bool) {
    // The backend lets everything through; the facade level decides
    let _ = env_logger::Builder::new()
        .filter_level(LevelFilter::Debug)
        .format_timestamp(None)
        .format_target(false)
        .try_init();
    set_verbose(verbose);
}

pub fn set_verbose(verbose: bool) {
    log::set_max_level(if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        init(false);
        assert_eq!(log::max_level(), LevelFilter::Warn);
        assert!(log::log_enabled!(log::Level::Warn));
        assert!(!log::log_enabled!(log::Level::Debug));

        set_verbose(true);
        assert_eq!(log::max_level(), LevelFilter::Debug);
        assert!(log::log_enabled!(log::Level::Debug));

        // A second init keeps the installed backend and only moves the level
        init(false);
        assert_eq!(log::max_level(), LevelFilter::Warn);
    }
}
