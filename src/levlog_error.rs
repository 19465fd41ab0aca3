use thiserror::Error;

/// Describes errors in the use of `levlog`.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LevlogError {
    /// A string could not be parsed as [`Level`](crate::Level).
    #[error("Invalid level: {0}")]
    InvalidLevel(String),

    /// The sink failed to accept a log line.
    #[error("Writing to the log sink failed")]
    SinkWrite(#[from] std::io::Error),

    /// Some synchronization object is poisoned.
    #[error("Some synchronization object is poisoned")]
    Poison,

    /// The configuration could not be read.
    #[cfg(feature = "config")]
    #[cfg_attr(docsrs, doc(cfg(feature = "config")))]
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Installing the logger as backend of the `log` facade failed.
    #[error("Logger initialization failed")]
    Log(#[from] log::SetLoggerError),

    /// The process-wide default logger was already initialized.
    #[error("The global logger was already initialized")]
    AlreadyInitialized,
}

impl<T> From<std::sync::PoisonError<T>> for LevlogError {
    fn from(_e: std::sync::PoisonError<T>) -> Self {
        Self::Poison
    }
}

#[cfg(feature = "config")]
impl From<toml::de::Error> for LevlogError {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}
