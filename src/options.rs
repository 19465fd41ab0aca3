use crate::{
    environment::{ColorMode, Environment, BUILD_ENV},
    record::{CallSiteResolver, LocationResolver},
    ring_buffer::{DumpPolicy, DEFAULT_RING_CAPACITY},
    writers::Sink,
    Level,
};
use std::{fmt, sync::Arc};

const UNKNOWN_MODULE: &str = "unknown";
const DEFAULT_CONTEXT_SEPARATOR: &str = ": ";

// Module names must be longer than three characters.
pub(crate) fn module_name(name: &str) -> String {
    if name.chars().count() <= 3 {
        UNKNOWN_MODULE.to_string()
    } else {
        name.to_string()
    }
}

/// Configuration of a [`Logger`](crate::Logger).
///
/// All settings have defaults; the environment decides about threshold,
/// color mode and line format unless these are set explicitly.
///
/// ```rust
/// use levlog::{ColorMode, Environment, Level, Logger, Options};
///
/// let logger = Logger::new(
///     Options::new("billing")
///         .environment(Environment::Development)
///         .color(ColorMode::Disabled)
///         .level(Level::Info),
/// );
/// logger.info("ready");
/// ```
pub struct Options {
    pub(crate) module: String,
    pub(crate) environment: Environment,
    pub(crate) color: ColorMode,
    pub(crate) level: Option<Level>,
    pub(crate) format: Option<String>,
    pub(crate) production_format: Option<String>,
    pub(crate) development_format: Option<String>,
    pub(crate) json: bool,
    pub(crate) dump: DumpPolicy,
    pub(crate) ring_capacity: usize,
    pub(crate) sequence_ceiling: Option<u64>,
    pub(crate) context_separator: String,
    pub(crate) resolver: Arc<dyn CallSiteResolver>,
    pub(crate) exit_on_fatal: bool,
    pub(crate) report_swallowed_errors: bool,
    pub(crate) sink: Option<Sink>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            module: UNKNOWN_MODULE.to_string(),
            environment: Environment::NotSet,
            color: ColorMode::NotSet,
            level: None,
            format: None,
            production_format: None,
            development_format: None,
            json: false,
            dump: DumpPolicy::default(),
            ring_capacity: DEFAULT_RING_CAPACITY,
            sequence_ceiling: None,
            context_separator: DEFAULT_CONTEXT_SEPARATOR.to_string(),
            resolver: Arc::new(LocationResolver),
            exit_on_fatal: true,
            report_swallowed_errors: false,
            sink: None,
        }
    }
}

impl Options {
    /// Default options for the given module name.
    ///
    /// Module names with three or fewer characters are replaced by `unknown`.
    #[must_use]
    pub fn new<S: Into<String>>(module: S) -> Self {
        Self::default().module(module)
    }

    /// Default options with the environment derived from the value of the build environment
    /// (`dev`, `qa`, or anything else for production).
    #[must_use]
    pub fn from_build_env(value: &str) -> Self {
        Self::default().environment(Environment::from_build_env(value))
    }

    /// Like [`Options::from_build_env`], with the value of the environment variable
    /// [`BUILD_ENV`]; if it is not set, the environment is `Production`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_build_env(&std::env::var(BUILD_ENV).unwrap_or_default())
    }

    /// Reads options from a TOML document.
    ///
    /// ```toml
    /// module = "billing"
    /// environment = "qa"
    /// color = "off"
    /// level = "debug"
    /// format = "%{lvl} %{message}"
    /// json = false
    /// context_separator = " | "
    ///
    /// [dump]
    /// enabled = true
    /// trigger = "error"
    /// prefix = "dump: "
    /// capacity = 64
    /// ```
    ///
    /// All entries are optional.
    ///
    /// # Errors
    ///
    /// `LevlogError::Config` if the document is not valid TOML, has entries of the wrong type,
    /// or contains unknown level names.
    #[cfg(feature = "config")]
    #[cfg_attr(docsrs, doc(cfg(feature = "config")))]
    pub fn from_toml_str(s: &str) -> Result<Self, crate::LevlogError> {
        config::parse(s)
    }

    /// Sets the module name.
    #[must_use]
    pub fn module<S: Into<String>>(mut self, module: S) -> Self {
        let module: String = module.into();
        self.module = module_name(&module);
        self
    }

    /// Sets the environment.
    #[must_use]
    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Overrides the environment's color mode.
    #[must_use]
    pub fn color(mut self, color: ColorMode) -> Self {
        self.color = color;
        self
    }

    /// Overrides the environment's threshold.
    #[must_use]
    pub fn level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    /// Overrides the environment's line format with a placeholder format.
    #[must_use]
    pub fn format<S: Into<String>>(mut self, format: S) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Placeholder format that is used whenever the environment is switched to `Production`.
    #[must_use]
    pub fn production_format<S: Into<String>>(mut self, format: S) -> Self {
        self.production_format = Some(format.into());
        self
    }

    /// Placeholder format that is used whenever the environment is switched to `Development`.
    #[must_use]
    pub fn development_format<S: Into<String>>(mut self, format: S) -> Self {
        self.development_format = Some(format.into());
        self
    }

    /// Write JSON objects instead of formatted lines, in `Production` and `Testing`.
    #[must_use]
    pub fn json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// Sets the dump policy.
    #[must_use]
    pub fn dump(mut self, dump: DumpPolicy) -> Self {
        self.dump = dump;
        self
    }

    /// Maximum number of withheld lines; default is 32.
    #[must_use]
    pub fn ring_capacity(mut self, capacity: usize) -> Self {
        self.ring_capacity = capacity;
        self
    }

    /// Lets sequence numbers restart with 1 after `ceiling`.
    ///
    /// Sequence numbers are process-wide; creating the logger sets the ceiling
    /// for all loggers, see [`set_sequence_ceiling`](crate::set_sequence_ceiling).
    #[must_use]
    pub fn sequence_ceiling(mut self, ceiling: u64) -> Self {
        self.sequence_ceiling = Some(ceiling);
        self
    }

    /// Text behind each context of loggers created with
    /// [`Logger::with_context`](crate::Logger::with_context); default is `": "`.
    #[must_use]
    pub fn context_separator<S: Into<String>>(mut self, separator: S) -> Self {
        self.context_separator = separator.into();
        self
    }

    /// Replaces the default [`LocationResolver`].
    #[must_use]
    pub fn call_site_resolver<R: CallSiteResolver + 'static>(mut self, resolver: R) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    /// Whether [`Logger::fatal`](crate::Logger::fatal) terminates the process
    /// (outside of `Testing`); default is `true`.
    #[must_use]
    pub fn exit_on_fatal(mut self, exit: bool) -> Self {
        self.exit_on_fatal = exit;
        self
    }

    /// Print sink errors that the convenience methods swallow to stderr; default is `false`.
    #[must_use]
    pub fn report_swallowed_errors(mut self, report: bool) -> Self {
        self.report_swallowed_errors = report;
        self
    }

    /// Sets the sink; default is stderr.
    #[must_use]
    pub fn sink(mut self, sink: Sink) -> Self {
        self.sink = Some(sink);
        self
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Options")
            .field("module", &self.module)
            .field("environment", &self.environment)
            .field("color", &self.color)
            .field("level", &self.level)
            .field("format", &self.format)
            .field("json", &self.json)
            .field("dump", &self.dump)
            .field("ring_capacity", &self.ring_capacity)
            .field("sequence_ceiling", &self.sequence_ceiling)
            .field("context_separator", &self.context_separator)
            .field("sink", &self.sink.as_ref().map(|_| "<custom>"))
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "config")]
mod config {
    use super::Options;
    use crate::{ColorMode, DumpPolicy, Environment, Level, LevlogError};

    #[derive(serde_derive::Deserialize)]
    #[serde(deny_unknown_fields)]
    struct RawOptions {
        module: Option<String>,
        environment: Option<String>,
        color: Option<String>,
        level: Option<String>,
        format: Option<String>,
        production_format: Option<String>,
        development_format: Option<String>,
        json: Option<bool>,
        context_separator: Option<String>,
        dump: Option<RawDump>,
    }

    #[derive(serde_derive::Deserialize)]
    #[serde(deny_unknown_fields)]
    struct RawDump {
        enabled: Option<bool>,
        trigger: Option<String>,
        prefix: Option<String>,
        capacity: Option<usize>,
    }

    pub(super) fn parse(s: &str) -> Result<Options, LevlogError> {
        let raw: RawOptions = toml::from_str(s)?;
        let mut options = Options::default();
        if let Some(module) = raw.module {
            options = options.module(module);
        }
        if let Some(environment) = raw.environment {
            options = options.environment(Environment::from_name(&environment));
        }
        if let Some(color) = raw.color {
            options = options.color(ColorMode::from_name(&color));
        }
        if let Some(level) = raw.level {
            options = options.level(parse_level(&level)?);
        }
        if let Some(format) = raw.format {
            options = options.format(format);
        }
        if let Some(format) = raw.production_format {
            options = options.production_format(format);
        }
        if let Some(format) = raw.development_format {
            options = options.development_format(format);
        }
        if let Some(json) = raw.json {
            options = options.json(json);
        }
        if let Some(separator) = raw.context_separator {
            options = options.context_separator(separator);
        }
        if let Some(dump) = raw.dump {
            let mut policy = DumpPolicy::new(Level::Error, dump.prefix.unwrap_or_default());
            policy.enabled = dump.enabled.unwrap_or(true);
            if let Some(trigger) = dump.trigger {
                policy.trigger = parse_level(&trigger)?;
            }
            options = options.dump(policy);
            if let Some(capacity) = dump.capacity {
                options = options.ring_capacity(capacity);
            }
        }
        Ok(options)
    }

    fn parse_level(s: &str) -> Result<Level, LevlogError> {
        s.parse()
            .map_err(|e: LevlogError| LevlogError::Config(e.to_string()))
    }
}
