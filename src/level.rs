use crate::LevlogError;
use std::{cmp::Ordering, fmt, str::FromStr};

/// Severity of a log record.
///
/// The variants are ordered from the most urgent to the least urgent one,
/// so a record passes a threshold iff `record_level <= threshold`.
///
/// [`Level::Raw`] is special: records with this level bypass all filtering
/// and are written verbatim, without colors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    /// Unfiltered output, written as-is.
    Raw,
    /// Errors; also used by `fatal` and `panic`.
    Error,
    /// Suspicious conditions.
    Warning,
    /// Successful completion of something noteworthy.
    Success,
    /// Normal but significant conditions.
    Notice,
    /// Informational messages.
    Info,
    /// Debugging output.
    Debug,
    /// Function and request tracing.
    Trace,
}

impl Level {
    /// All levels, from the most urgent to the least urgent one.
    pub const ALL: [Level; 8] = [
        Level::Raw,
        Level::Error,
        Level::Warning,
        Level::Success,
        Level::Notice,
        Level::Info,
        Level::Debug,
        Level::Trace,
    ];

    /// Numeric rank; a lower rank means a more urgent level.
    #[must_use]
    pub fn rank(self) -> u8 {
        self as u8
    }

    /// Compares the urgency of two levels.
    ///
    /// `Ordering::Greater` means that `self` is more urgent than `other`.
    #[must_use]
    pub fn compare_severity(self, other: Level) -> Ordering {
        other.rank().cmp(&self.rank())
    }

    /// Returns true if a record with this level passes the given threshold.
    #[must_use]
    pub fn passes(self, threshold: Level) -> bool {
        self == Level::Raw || self <= threshold
    }

    /// Upper-case name, as used by `%{level}`.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Level::Raw => "RAW",
            Level::Error => "ERROR",
            Level::Warning => "WARNING",
            Level::Success => "SUCCESS",
            Level::Notice => "NOTICE",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        }
    }

    /// Conventional short form, like `DBG` or `WARN`.
    ///
    /// Templates do not use it: `%{lvl}` writes the first three characters of
    /// [`Level::name`], like `DEB` or `WAR`.
    #[must_use]
    pub fn abbreviation(self) -> &'static str {
        match self {
            Level::Raw => "RAW",
            Level::Error => "ERR",
            Level::Warning => "WARN",
            Level::Success => "SUCC",
            Level::Notice => "NOTE",
            Level::Info => "INFO",
            Level::Debug => "DBG",
            Level::Trace => "TRC",
        }
    }

    /// ANSI SGR foreground code of the level's color.
    #[must_use]
    pub fn ansi_code(self) -> u8 {
        match self {
            Level::Raw | Level::Info => 37,
            Level::Error => 31,
            Level::Success => 32,
            Level::Warning => 33,
            Level::Debug => 34,
            Level::Trace => 35,
            Level::Notice => 36,
        }
    }

    /// The color in which lines of this level are painted.
    #[cfg(feature = "colors")]
    #[cfg_attr(docsrs, doc(cfg(feature = "colors")))]
    #[must_use]
    pub fn color(self) -> nu_ansi_term::Color {
        use nu_ansi_term::Color;
        match self {
            Level::Raw | Level::Info => Color::White,
            Level::Error => Color::Red,
            Level::Success => Color::Green,
            Level::Warning => Color::Yellow,
            Level::Debug => Color::Blue,
            Level::Trace => Color::Magenta,
            Level::Notice => Color::Cyan,
        }
    }

    fn lower_name(self) -> &'static str {
        match self {
            Level::Raw => "raw",
            Level::Error => "error",
            Level::Warning => "warning",
            Level::Success => "success",
            Level::Notice => "notice",
            Level::Info => "info",
            Level::Debug => "debug",
            Level::Trace => "trace",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Level {
    type Err = LevlogError;

    /// Case-insensitive lookup by name; `warn` is accepted for `warning`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Level::ALL
            .iter()
            .copied()
            .find(|l| l.lower_name().eq_ignore_ascii_case(s))
            .or_else(|| s.eq_ignore_ascii_case("warn").then_some(Level::Warning))
            .ok_or_else(|| LevlogError::InvalidLevel(s.to_string()))
    }
}

impl From<log::Level> for Level {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Level::Error,
            log::Level::Warn => Level::Warning,
            log::Level::Info => Level::Info,
            log::Level::Debug => Level::Debug,
            log::Level::Trace => Level::Trace,
        }
    }
}

#[cfg(feature = "json")]
impl serde::Serialize for Level {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.lower_name())
    }
}

#[cfg(feature = "json")]
impl<'de> serde::Deserialize<'de> for Level {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
