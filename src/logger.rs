use crate::{
    environment::{ColorMode, Environment},
    fields::{Fielder, Fields},
    options::Options,
    record::{base_name, set_sequence_ceiling, CallSite, CallSiteResolver, Record},
    ring_buffer::DumpPolicy,
    util::{eprint_err, ErrorCode},
    worker::Worker,
    writers::Sink,
    Level, LevlogError,
};
use std::{backtrace::Backtrace, fmt, panic::Location, sync::Arc, time::Duration};

/// The logger.
///
/// Create it with [`Logger::new`], configure it with [`Options`]
/// and change its configuration at runtime with the `set_*` methods.
/// Clones share the same [`Worker`], i.e. the same configuration, sink and ring buffer.
///
/// The level methods ([`Logger::error`], [`Logger::info`], ...) never fail; sink errors are
/// swallowed. Use [`Logger::log`] to see them.
///
/// ```rust
/// use levlog::{Environment, Logger, Options};
///
/// let logger = Logger::new(Options::new("billing").environment(Environment::Quality));
/// logger.info("invoice created");
/// logger.debug("not shown in Quality");
/// if let Err(e) = logger.log(levlog::Level::Error, format_args!("{} invoices lost", 2)) {
///     eprintln!("logging failed: {e}");
/// }
/// ```
#[derive(Clone)]
pub struct Logger {
    worker: Arc<Worker>,
    resolver: Arc<dyn CallSiteResolver>,
    exit_on_fatal: bool,
    report_swallowed_errors: bool,
}

macro_rules! level_methods {
    ($($(#[$attr:meta])* $name:ident => $level:expr;)*) => {
        $(
            $(#[$attr])*
            #[track_caller]
            pub fn $name<M: fmt::Display>(&self, message: M) {
                let result = self.dispatch($level, message, Location::caller());
                self.swallow(result);
            }
        )*
    };
}

impl Logger {
    /// Creates a logger.
    #[must_use]
    pub fn new(mut options: Options) -> Self {
        let resolver = Arc::clone(&options.resolver);
        if let Some(ceiling) = options.sequence_ceiling.take() {
            set_sequence_ceiling(Some(ceiling));
        }
        let exit_on_fatal = options.exit_on_fatal;
        let report_swallowed_errors = options.report_swallowed_errors;
        Self {
            worker: Arc::new(Worker::new(options)),
            resolver,
            exit_on_fatal,
            report_swallowed_errors,
        }
    }

    /// Installs a clone of this logger as backend of the `log` facade.
    ///
    /// The facade's levels map to `Error`, `Warning`, `Info`, `Debug` and `Trace`.
    ///
    /// # Errors
    ///
    /// `LevlogError::Log` if a `log` backend was already installed.
    pub fn start(&self) -> Result<(), LevlogError> {
        log::set_boxed_logger(Box::new(self.clone()))?;
        // the threshold can change at runtime
        log::set_max_level(log::LevelFilter::Trace);
        Ok(())
    }

    /// The worker.
    #[must_use]
    pub fn worker(&self) -> &Worker {
        &self.worker
    }

    /// Logs the message with the given level.
    ///
    /// # Errors
    ///
    /// `LevlogError::SinkWrite` if the sink fails,
    /// `LevlogError::Poison` if the logger's mutex is poisoned.
    #[track_caller]
    pub fn log<M: fmt::Display>(&self, level: Level, message: M) -> Result<(), LevlogError> {
        self.dispatch(level, message, Location::caller())
    }

    /// Writes a prepared record.
    ///
    /// # Errors
    ///
    /// See [`Logger::log`].
    pub fn log_record(&self, record: Record) -> Result<(), LevlogError> {
        self.worker.log(record)
    }

    level_methods! {
        /// Logs the message at level `Error`.
        error => Level::Error;
        /// Logs the message at level `Warning`.
        warning => Level::Warning;
        /// Logs the message at level `Success`.
        success => Level::Success;
        /// Logs the message at level `Notice`.
        notice => Level::Notice;
        /// Logs the message at level `Info`.
        info => Level::Info;
        /// Logs the message at level `Debug`.
        debug => Level::Debug;
        /// Logs the message at level `Trace`.
        trace => Level::Trace;
        /// Writes the message as it is, without format and color, independent of the threshold.
        raw => Level::Raw;
    }

    /// Logs the message at level `Error` and terminates the process with exit code 1.
    ///
    /// The process is not terminated while the logger behaves like `Testing`,
    /// or if [`Options::exit_on_fatal`] was set to `false`.
    #[track_caller]
    pub fn fatal<M: fmt::Display>(&self, message: M) {
        let result = self.dispatch(Level::Error, message, Location::caller());
        self.swallow(result);
        let result = self.worker.flush();
        self.swallow(result);
        if self.exit_on_fatal && self.worker.environment() != Environment::Testing {
            std::process::exit(1);
        }
    }

    /// Logs the message at level `Error` and panics with it.
    #[track_caller]
    pub fn panic<M: fmt::Display>(&self, message: M) -> ! {
        let message = message.to_string();
        let result = self.dispatch(Level::Error, &message, Location::caller());
        self.swallow(result);
        panic!("{message}");
    }

    /// Logs the message, followed by a backtrace of the current thread, at level `Error`.
    #[track_caller]
    pub fn stack_as_error<M: fmt::Display>(&self, message: M) {
        let mut message = message.to_string();
        if message.is_empty() {
            message.push_str("Stack info");
        }
        let result = self.dispatch(
            Level::Error,
            format_args!("{message}\n{}", Backtrace::force_capture()),
            Location::caller(),
        );
        self.swallow(result);
    }

    /// Logs the entry into a function at level `Trace`,
    /// with the given function, file and line as call site.
    pub fn trace_function(&self, function: &str, file: &str, line: u32) {
        if !self.worker.wants(Level::Trace) {
            return;
        }
        let record = Record::builder(Level::Trace)
            .message(format!("Entering {function}"))
            .call_site(CallSite {
                file: base_name(file),
                line,
                function: Some(function.to_string()),
            })
            .build();
        let result = self.worker.log(record);
        self.swallow(result);
    }

    /// Logs a handled HTTP request at level `Trace`.
    ///
    /// Method, status code, route and duration are available
    /// as `%{method}`, `%{statuscode}`, `%{route}` and `%{duration}`.
    #[track_caller]
    pub fn http_trace(&self, method: &str, status_code: u16, route: &str, duration: Duration) {
        if !self.worker.wants(Level::Trace) {
            return;
        }
        let record = Record::builder(Level::Trace)
            .message(format!("{method} {route} {status_code} {duration:?}"))
            .request(method, status_code, route)
            .duration(duration)
            .call_site(self.resolver.resolve(Location::caller()))
            .build();
        let result = self.worker.log(record);
        self.swallow(result);
    }

    /// Returns a logger whose lines start with this logger's context, followed by `context`
    /// and the context separator (see [`Options::context_separator`]).
    ///
    /// The new logger starts with a copy of this logger's configuration and writes to the same
    /// sink, but has its own, empty ring buffer of the same capacity.
    /// Later configuration changes affect only the logger they are applied to,
    /// except for [`Logger::set_output`], which replaces the shared sink.
    ///
    /// ```rust
    /// use levlog::{Logger, Options};
    ///
    /// let logger = Logger::new(Options::new("billing"));
    /// let order = logger.with_context("order 17");
    /// order.error("payment declined"); // ... order 17: payment declined
    /// ```
    #[must_use]
    pub fn with_context(&self, context: &str) -> Logger {
        Logger {
            worker: Arc::new(self.worker.fork(context)),
            resolver: Arc::clone(&self.resolver),
            exit_on_fatal: self.exit_on_fatal,
            report_swallowed_errors: self.report_swallowed_errors,
        }
    }

    /// Returns an [`Entry`] that attaches the given fields to every message it logs.
    #[must_use]
    pub fn with_fields<F: Fielder>(&self, fielder: &F) -> Entry {
        Entry {
            logger: self.clone(),
            fields: fielder.fields(),
        }
    }

    /// See [`Worker::set_format`].
    pub fn set_format(&self, source: &str) {
        self.worker.set_format(source);
    }

    /// See [`Worker::set_level`].
    pub fn set_level(&self, level: Level) {
        self.worker.set_level(level);
    }

    /// See [`Worker::set_function`].
    pub fn set_function<S: Into<String>>(&self, name: S) {
        self.worker.set_function(name);
    }

    /// See [`Worker::set_module`].
    pub fn set_module(&self, name: &str) {
        self.worker.set_module(name);
    }

    /// See [`Worker::set_environment`].
    pub fn set_environment(&self, env: Environment) {
        self.worker.set_environment(env);
    }

    /// See [`Worker::clear_testing`].
    pub fn clear_testing(&self) {
        self.worker.clear_testing();
    }

    /// See [`Worker::set_color`].
    pub fn set_color(&self, color: ColorMode) {
        self.worker.set_color(color);
    }

    /// See [`Worker::set_output`].
    pub fn set_output(&self, sink: Sink) {
        self.worker.set_output(sink);
    }

    /// See [`Worker::set_json`].
    pub fn set_json(&self, json: bool) {
        self.worker.set_json(json);
    }

    /// See [`Worker::set_dump_policy`].
    pub fn set_dump_policy(&self, policy: DumpPolicy) {
        self.worker.set_dump_policy(policy);
    }

    /// See [`Worker::reset_timer`].
    pub fn reset_timer(&self) {
        self.worker.reset_timer();
    }

    /// The environment the logger currently behaves like.
    #[must_use]
    pub fn environment(&self) -> Environment {
        self.worker.environment()
    }

    /// The threshold.
    #[must_use]
    pub fn level(&self) -> Level {
        self.worker.level()
    }

    /// Flushes the sink.
    ///
    /// # Errors
    ///
    /// `LevlogError::SinkWrite` if the sink fails to flush.
    pub fn flush(&self) -> Result<(), LevlogError> {
        self.worker.flush()
    }

    fn dispatch<M: fmt::Display>(
        &self,
        level: Level,
        message: M,
        location: &'static Location<'static>,
    ) -> Result<(), LevlogError> {
        self.dispatch_with_fields(level, message, Fields::new(), location)
    }

    fn dispatch_with_fields<M: fmt::Display>(
        &self,
        level: Level,
        message: M,
        fields: Fields,
        location: &'static Location<'static>,
    ) -> Result<(), LevlogError> {
        if !self.worker.wants(level) {
            return Ok(());
        }
        let record = Record::builder(level)
            .message(message.to_string())
            .fields(fields)
            .call_site(self.resolver.resolve(location))
            .build();
        self.worker.log(record)
    }

    fn swallow(&self, result: Result<(), LevlogError>) {
        if let Err(e) = result {
            if self.report_swallowed_errors {
                eprint_err(ErrorCode::Write, "writing log line failed", &e);
            }
        }
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Logger")
            .field("module", &self.worker.module())
            .field("environment", &self.worker.environment())
            .field("level", &self.worker.level())
            .finish_non_exhaustive()
    }
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.worker.wants(Level::from(metadata.level()))
    }

    fn log(&self, record: &log::Record) {
        let level = Level::from(record.level());
        if !self.worker.wants(level) {
            return;
        }
        let file = record.file().or(record.module_path()).unwrap_or("<unnamed>");
        let levlog_record = Record::builder(level)
            .message(record.args().to_string())
            .call_site(CallSite {
                file: base_name(file),
                line: record.line().unwrap_or(0),
                function: None,
            })
            .build();
        if let Err(e) = self.worker.log(levlog_record) {
            eprint_err(ErrorCode::Write, "writing log line failed", &e);
        }
    }

    fn flush(&self) {
        if let Err(e) = self.worker.flush() {
            eprint_err(ErrorCode::Flush, "flushing failed", &e);
        }
    }
}

/// A logger with attached structured fields.
///
/// Created with [`Logger::with_fields`]. The fields are appended to each message
/// as `name=value` pairs, sorted by name; redactable values appear only in redacted form.
///
/// ```rust
/// use levlog::{Fields, Logger, Options, Sensitive};
///
/// let logger = Logger::new(Options::new("auth"));
/// let entry = logger.with_fields(
///     &Fields::new()
///         .with("user", "karl")
///         .with_redacted("password", Sensitive::new("hunter2")),
/// );
/// entry.error("login failed"); // ... login failed password=******* user=karl
/// ```
#[derive(Clone, Debug)]
pub struct Entry {
    logger: Logger,
    fields: Fields,
}

macro_rules! entry_level_methods {
    ($($(#[$attr:meta])* $name:ident => $level:expr;)*) => {
        $(
            $(#[$attr])*
            #[track_caller]
            pub fn $name<M: fmt::Display>(&self, message: M) {
                let result = self.logger.dispatch_with_fields(
                    $level,
                    message,
                    self.fields.clone(),
                    Location::caller(),
                );
                self.logger.swallow(result);
            }
        )*
    };
}

impl Entry {
    /// The attached fields.
    #[must_use]
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Returns an entry with additional fields.
    #[must_use]
    pub fn with_fields<F: Fielder>(&self, fielder: &F) -> Entry {
        let mut fields = self.fields.clone();
        fields.extend(fielder.fields());
        Entry {
            logger: self.logger.clone(),
            fields,
        }
    }

    /// Logs the message with the attached fields.
    ///
    /// # Errors
    ///
    /// See [`Logger::log`].
    #[track_caller]
    pub fn log<M: fmt::Display>(&self, level: Level, message: M) -> Result<(), LevlogError> {
        self.logger
            .dispatch_with_fields(level, message, self.fields.clone(), Location::caller())
    }

    entry_level_methods! {
        /// Logs the message at level `Error`.
        error => Level::Error;
        /// Logs the message at level `Warning`.
        warning => Level::Warning;
        /// Logs the message at level `Success`.
        success => Level::Success;
        /// Logs the message at level `Notice`.
        notice => Level::Notice;
        /// Logs the message at level `Info`.
        info => Level::Info;
        /// Logs the message at level `Debug`.
        debug => Level::Debug;
        /// Logs the message at level `Trace`.
        trace => Level::Trace;
    }
}

#[cfg(test)]
mod test {
    use super::Logger;
    use crate::{
        fields::{Fields, Sensitive},
        ColorMode, DumpPolicy, Environment, Level, Options, SharedBuffer,
    };
    use std::time::Duration;

    fn logger(env: Environment, format: &str) -> (Logger, SharedBuffer) {
        let buffer = SharedBuffer::new();
        let logger = Logger::new(
            Options::new("logger-test")
                .environment(env)
                .color(ColorMode::Disabled)
                .format(format)
                .sink(buffer.sink()),
        );
        (logger, buffer)
    }

    #[test]
    fn test_call_site() {
        let (logger, buffer) = logger(Environment::Quality, "%{file}:%{line} %{message}");
        let line = line!() + 1;
        logger.info("here");
        assert_eq!(buffer.contents(), format!("logger.rs:{line} here\n"));
    }

    #[test]
    fn test_level_methods() {
        let (logger, buffer) = logger(Environment::Quality, "%{level} %{message}");
        logger.error("e");
        logger.warning("w");
        logger.success("s");
        logger.notice("n");
        logger.info("i");
        logger.debug("d");
        logger.trace("t");
        logger.raw("r");
        assert_eq!(
            buffer.lines(),
            vec!["ERROR e", "WARNING w", "SUCCESS s", "NOTICE n", "INFO i", "r"]
        );
    }

    #[test]
    fn test_fatal_does_not_exit_in_testing() {
        let (logger, buffer) = logger(Environment::Testing, "%{lvl} %{message}");
        logger.fatal("fatal but alive");
        assert_eq!(buffer.lines(), vec!["ERR fatal but alive"]);
    }

    #[test]
    fn test_panic_logs_first() {
        let (logger, buffer) = logger(Environment::Testing, "%{lvl} %{message}");
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| logger.panic("gave up")));
        assert!(result.is_err());
        assert_eq!(buffer.lines(), vec!["ERR gave up"]);
    }

    #[test]
    fn test_stack_as_error() {
        let (logger, buffer) = logger(Environment::Production, "%{lvl} %{message}");
        logger.stack_as_error("");
        assert!(buffer.contents().starts_with("ERR Stack info\n"));
    }

    #[test]
    fn test_function_and_trace() {
        let (logger, buffer) = logger(Environment::Quality, "%{function} %{file}:%{line} %{message}");
        logger.set_level(Level::Trace);
        logger.set_function("handler");
        let line = line!() + 1;
        logger.info("in handler");
        logger.trace_function("parse", "src/parser.rs", 17);
        assert_eq!(
            buffer.lines(),
            vec![
                format!("handler logger.rs:{line} in handler"),
                "parse parser.rs:17 Entering parse".to_string(),
            ]
        );
    }

    #[test]
    fn test_http_trace() {
        let (logger, buffer) = logger(
            Environment::Quality,
            "%{method} %{route} %{statuscode} %{duration}",
        );
        logger.http_trace("GET", 200, "/health", Duration::from_millis(3));
        assert!(buffer.contents().is_empty());
        logger.set_level(Level::Trace);
        logger.http_trace("GET", 200, "/health", Duration::from_millis(3));
        assert_eq!(buffer.lines(), vec!["GET /health 200 3ms"]);
    }

    #[test]
    fn test_with_fields() {
        let (logger, buffer) = logger(Environment::Quality, "%{lvl} %{message}");
        let entry = logger.with_fields(
            &Fields::new()
                .with("user", "karl")
                .with_redacted("password", Sensitive::new("hunter2")),
        );
        entry.error("login failed");
        entry.with_fields(&Fields::new().with("attempt", 3)).info("retry");
        assert_eq!(
            buffer.lines(),
            vec![
                "ERR login failed password=******* user=karl",
                "INF retry attempt=3 password=******* user=karl"
            ]
        );
        assert!(!buffer.contents().contains("hunter2"));
    }

    #[test]
    fn test_dump_through_logger() {
        let (logger, buffer) = logger(Environment::Production, "%{lvl} %{message}");
        logger.set_dump_policy(DumpPolicy::new(Level::Error, "~ "));
        logger.info("context");
        logger.warning("more context");
        logger.error("failure");
        assert_eq!(
            buffer.lines(),
            vec!["~ INF context", "~ WAR more context", "ERR failure"]
        );
    }

    #[test]
    fn test_with_context() {
        let (logger, buffer) = logger(Environment::Production, "%{lvl} %{message}");
        logger.set_dump_policy(DumpPolicy::new(Level::Error, "~ "));
        let order = logger.with_context("order 17");
        let item = order.with_context("item 3");

        logger.info("parent context");
        order.info("order context");
        item.error("item failed");
        assert_eq!(buffer.lines(), vec!["order 17: item 3: ERR item failed"]);
        assert_eq!(logger.worker().withheld(), 1);
        assert_eq!(order.worker().withheld(), 1);

        order.error("order failed");
        assert_eq!(
            buffer.lines()[1..],
            ["~ order 17: INF order context", "order 17: ERR order failed"]
        );
        assert_eq!(logger.worker().withheld(), 1);

        order.set_level(Level::Debug);
        assert_eq!(logger.level(), Level::Error);
        assert_eq!(item.level(), Level::Error);
    }

    #[test]
    fn test_context_separator() {
        let buffer = SharedBuffer::new();
        let logger = Logger::new(
            Options::new("logger-test")
                .environment(Environment::Quality)
                .color(ColorMode::Disabled)
                .format("%{message}")
                .context_separator(" | ")
                .sink(buffer.sink()),
        );
        logger.with_context("a").with_context("b").info("c");
        logger.info("d");
        assert_eq!(buffer.lines(), vec!["a | b | c", "d"]);
    }

    #[test]
    fn test_redactor_may_log() {
        use crate::fields::Redactor;

        struct Audited(Logger);
        impl Redactor for Audited {
            fn redacted(&self) -> String {
                self.0.info("redacting");
                "***".to_string()
            }
        }

        let (logger, buffer) = logger(Environment::Quality, "%{lvl} %{message}");
        logger
            .with_fields(&Fields::new().with_redacted("token", Audited(logger.clone())))
            .info("login");
        assert_eq!(buffer.lines(), vec!["INF redacting", "INF login token=***"]);
    }

    #[test]
    fn test_facade_bridge() {
        use log::Log;

        let (logger, buffer) = logger(Environment::Quality, "%{level} %{file} %{message}");
        Log::log(
            &logger,
            &log::Record::builder()
                .args(format_args!("from the facade"))
                .level(log::Level::Warn)
                .file(Some("src/lib.rs"))
                .line(Some(3))
                .build(),
        );
        assert!(logger.enabled(&log::Metadata::builder().level(log::Level::Info).build()));
        assert!(!logger.enabled(&log::Metadata::builder().level(log::Level::Debug).build()));
        assert_eq!(buffer.lines(), vec!["WARNING lib.rs from the facade"]);
    }
}
