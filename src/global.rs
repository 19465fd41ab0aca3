//! The process-wide default logger.
//!
//! It is initialized at most once, either explicitly with [`init_global`],
//! or implicitly by the first call of [`global`], which then uses [`Options::from_env`].
//! Code that can get a [`Logger`] passed should prefer that over calling [`global`].
use crate::{Logger, LevlogError, Options};
use std::sync::OnceLock;

static GLOBAL: OnceLock<Logger> = OnceLock::new();

/// Initializes the process-wide default logger.
///
/// # Errors
///
/// `LevlogError::AlreadyInitialized` if the default logger exists already,
/// be it from an earlier call of this method or from a call of [`global`].
pub fn init_global(options: Options) -> Result<&'static Logger, LevlogError> {
    let mut options = Some(options);
    let logger = GLOBAL.get_or_init(|| {
        Logger::new(options.take().unwrap_or_else(Options::from_env))
    });
    if options.is_some() {
        Err(LevlogError::AlreadyInitialized)
    } else {
        Ok(logger)
    }
}

/// The process-wide default logger; creates it with [`Options::from_env`] if necessary.
pub fn global() -> &'static Logger {
    GLOBAL.get_or_init(|| Logger::new(Options::from_env()))
}
