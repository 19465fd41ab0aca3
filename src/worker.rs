use crate::{
    environment::{ColorMode, Environment},
    formats::Template,
    options::{module_name, Options},
    record::Record,
    ring_buffer::{DumpPolicy, RingBuffer},
    util::{eprint_err, write_line, ErrorCode},
    writers::Sink,
    Level, LevlogError,
};
use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Instant,
};

/// The engine behind a [`Logger`](crate::Logger).
///
/// Owns the threshold, the environment, the color mode, the active template and the ring buffer;
/// all of them are protected by a single mutex, which is also held while a line is written.
/// Concurrent log calls therefore never interleave partial lines,
/// and never see a half-applied configuration change.
///
/// The sink is shared with the workers that are [forked](Worker::fork) from this one.
pub struct Worker {
    state: Mutex<State>,
}

struct State {
    sink: Arc<Mutex<Sink>>,
    module: String,
    requested_env: Environment,
    testing_pinned: bool,
    color: ColorMode,
    threshold: Level,
    template: Template,
    production_template: Template,
    development_template: Template,
    function: String,
    json: bool,
    dump: DumpPolicy,
    ring: RingBuffer<String>,
    timer: Instant,
    context: String,
    separator: String,
}

impl Worker {
    /// Creates a worker from the given options.
    ///
    /// The environment's defaults are applied first;
    /// explicitly configured color mode, level and format override them.
    #[must_use]
    pub fn new(options: Options) -> Self {
        let default_template = Template::default_template();
        let production_template = options.production_format.as_deref().map_or_else(
            Template::production,
            |src| Template::compile_with_default(src, &Template::production()),
        );
        let development_template = options.development_format.as_deref().map_or_else(
            Template::development,
            |src| Template::compile_with_default(src, &Template::development()),
        );

        let mut state = State {
            sink: Arc::new(Mutex::new(
                options.sink.unwrap_or_else(crate::writers::default_sink),
            )),
            module: module_name(&options.module),
            requested_env: options.environment,
            testing_pinned: options.environment == Environment::Testing,
            color: ColorMode::NotSet,
            threshold: Level::Error,
            template: default_template,
            production_template,
            development_template,
            function: String::new(),
            json: options.json,
            dump: options.dump,
            ring: RingBuffer::new(options.ring_capacity),
            timer: Instant::now(),
            context: String::new(),
            separator: options.context_separator,
        };
        state.apply_environment();
        if options.color != ColorMode::NotSet {
            state.color = options.color;
        }
        if let Some(level) = options.level {
            state.threshold = level;
        }
        if let Some(ref format) = options.format {
            state.template = Template::compile(format);
        }

        Self {
            state: Mutex::new(state),
        }
    }

    /// Creates a worker with a copy of this worker's configuration, the same sink,
    /// and an empty ring buffer of the same capacity.
    ///
    /// Its lines start with this worker's context, followed by `context` and the
    /// context separator.
    #[must_use]
    pub fn fork(&self, context: &str) -> Self {
        let state = self.state();
        Self {
            state: Mutex::new(State {
                sink: Arc::clone(&state.sink),
                module: state.module.clone(),
                requested_env: state.requested_env,
                testing_pinned: state.testing_pinned,
                color: state.color,
                threshold: state.threshold,
                template: state.template.clone(),
                production_template: state.production_template.clone(),
                development_template: state.development_template.clone(),
                function: state.function.clone(),
                json: state.json,
                dump: state.dump.clone(),
                ring: RingBuffer::new(state.ring.capacity()),
                timer: state.timer,
                context: format!("{}{context}{}", state.context, state.separator),
                separator: state.separator.clone(),
            }),
        }
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, State>, LevlogError> {
        self.state.lock().map_err(|_| LevlogError::Poison)
    }

    // Lock for setters and getters, which have no way to report errors.
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| {
            eprint_err(ErrorCode::Poison, "the logger's state is poisoned", &e);
            e.into_inner()
        })
    }

    /// Filters, renders and writes the record.
    ///
    /// * `Raw` records are written as plain message, never filtered and never colored.
    /// * Records that do not pass the threshold are dropped, or, with an enabled
    ///   [`DumpPolicy`], rendered and withheld in the ring buffer if they are less urgent
    ///   than its trigger.
    /// * A record at or above the dump trigger that passes the threshold lets the withheld
    ///   lines be written first, oldest first, with the dump prefix in front of each.
    ///
    /// # Errors
    ///
    /// `LevlogError::SinkWrite` if the sink fails,
    /// `LevlogError::Poison` if the state mutex is poisoned.
    pub fn log(&self, mut record: Record) -> Result<(), LevlogError> {
        // fields and redactors run user code, which must not run under the lock
        record.message();
        let mut guard = self.lock_state()?;
        let state = &mut *guard;
        let level = record.level();

        if level == Level::Raw {
            return state.write("", record.message());
        }

        record.complete(
            &state.module,
            &state.function,
            &state.context,
            state.timer.elapsed(),
        );

        if !level.passes(state.threshold) {
            if state.dump.withholds(level) {
                let line = state.render(&record);
                state.ring.push(line);
            }
            return Ok(());
        }

        if state.dump.triggers(level) {
            state.dump_withheld()?;
        }

        let line = state.render(&record);
        if state.colored() {
            state.write("", &paint(level, &line))
        } else {
            state.write("", &line)
        }
    }

    /// Writes all withheld lines now, independent of the dump trigger.
    ///
    /// # Errors
    ///
    /// `LevlogError::SinkWrite` if the sink fails; lines that were not yet written
    /// stay in the ring buffer.
    pub fn dump(&self) -> Result<(), LevlogError> {
        self.lock_state()?.dump_withheld()
    }

    /// Flushes the sink.
    ///
    /// # Errors
    ///
    /// `LevlogError::SinkWrite` if the sink fails to flush.
    pub fn flush(&self) -> Result<(), LevlogError> {
        let state = self.lock_state()?;
        state.sink.lock()?.flush()?;
        Ok(())
    }

    /// Compiles the placeholder format and makes it the active template.
    pub fn set_format(&self, source: &str) {
        self.state().template = Template::compile(source);
    }

    /// Sets the active template directly.
    pub fn set_template(&self, template: Template) {
        self.state().template = template;
    }

    /// Sets the threshold: records less urgent than `level` are not written.
    pub fn set_level(&self, level: Level) {
        self.state().threshold = level;
    }

    /// Sets the function name that is used for `%{function}`
    /// if the call site does not provide one.
    pub fn set_function<S: Into<String>>(&self, name: S) {
        self.state().function = name.into();
    }

    /// Sets the module name; names with three or fewer characters are replaced by `unknown`.
    pub fn set_module(&self, name: &str) {
        self.state().module = module_name(name);
    }

    /// Switches the environment and applies its threshold, color mode and template.
    ///
    /// Switching to `Testing` pins the worker to `Testing`;
    /// later switches are remembered but only take effect after [`Worker::clear_testing`].
    pub fn set_environment(&self, env: Environment) {
        let mut state = self.state();
        state.requested_env = env;
        if env == Environment::Testing {
            state.testing_pinned = true;
        }
        state.apply_environment();
    }

    /// Releases the `Testing` pin and applies the most recently requested environment.
    pub fn clear_testing(&self) {
        let mut state = self.state();
        state.testing_pinned = false;
        state.apply_environment();
    }

    /// Sets the color mode.
    pub fn set_color(&self, color: ColorMode) {
        self.state().color = color;
    }

    /// Replaces the sink, also for the workers that share it;
    /// the old one is flushed and dropped.
    pub fn set_output(&self, sink: Sink) {
        let state = self.state();
        let mut current = state.sink.lock().unwrap_or_else(|e| {
            eprint_err(ErrorCode::Poison, "the sink is poisoned", &e);
            e.into_inner()
        });
        if let Err(e) = current.flush() {
            eprint_err(ErrorCode::Flush, "flushing the replaced sink failed", &e);
        }
        *current = sink;
    }

    /// Switches JSON output on or off; only effective in `Production` and `Testing`.
    pub fn set_json(&self, json: bool) {
        self.state().json = json;
    }

    /// Sets the dump policy; disabling it discards the withheld lines.
    pub fn set_dump_policy(&self, policy: DumpPolicy) {
        let mut state = self.state();
        if !policy.enabled {
            state.ring.clear();
        }
        state.dump = policy;
    }

    /// Restarts the timer whose elapsed time is reported as `%{duration}`.
    pub fn reset_timer(&self) {
        self.state().timer = Instant::now();
    }

    /// The environment the worker currently behaves like.
    #[must_use]
    pub fn environment(&self) -> Environment {
        self.state().effective_environment()
    }

    /// The most recently requested environment.
    #[must_use]
    pub fn requested_environment(&self) -> Environment {
        self.state().requested_env
    }

    /// True while switched to `Testing` and not yet cleared.
    #[must_use]
    pub fn is_testing_pinned(&self) -> bool {
        self.state().testing_pinned
    }

    /// The threshold.
    #[must_use]
    pub fn level(&self) -> Level {
        self.state().threshold
    }

    /// True if a record of this level would be written.
    #[must_use]
    pub fn is_enabled_for(&self, level: Level) -> bool {
        level.passes(self.state().threshold)
    }

    // Whether a record of this level would be written or withheld.
    pub(crate) fn wants(&self, level: Level) -> bool {
        let state = self.state();
        level.passes(state.threshold) || state.dump.withholds(level)
    }

    /// The color mode.
    #[must_use]
    pub fn color_mode(&self) -> ColorMode {
        self.state().color
    }

    /// True if lines are currently colored.
    #[must_use]
    pub fn is_colored(&self) -> bool {
        self.state().colored()
    }

    /// The active template.
    #[must_use]
    pub fn template(&self) -> Template {
        self.state().template.clone()
    }

    /// The module name.
    #[must_use]
    pub fn module(&self) -> String {
        self.state().module.clone()
    }

    /// The function name.
    #[must_use]
    pub fn function(&self) -> String {
        self.state().function.clone()
    }

    /// The text in front of every line, see [`Worker::fork`].
    #[must_use]
    pub fn context(&self) -> String {
        self.state().context.clone()
    }

    /// True if lines are currently written as JSON objects.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.state().json_active()
    }

    /// The dump policy.
    #[must_use]
    pub fn dump_policy(&self) -> DumpPolicy {
        self.state().dump.clone()
    }

    /// Number of withheld lines.
    #[must_use]
    pub fn withheld(&self) -> usize {
        self.state().ring.len()
    }
}

impl State {
    fn effective_environment(&self) -> Environment {
        if self.testing_pinned {
            Environment::Testing
        } else {
            self.requested_env.resolved()
        }
    }

    fn apply_environment(&mut self) {
        let env = self.effective_environment();
        let defaults = env.defaults();
        self.threshold = defaults.threshold;
        self.color = defaults.color;
        self.template = match env {
            Environment::Production => self.production_template.clone(),
            Environment::Development => self.development_template.clone(),
            _ => defaults.template,
        };
    }

    fn json_active(&self) -> bool {
        cfg!(feature = "json") && self.json && self.effective_environment().allows_json()
    }

    fn colored(&self) -> bool {
        cfg!(feature = "colors")
            && !self.json_active()
            && self.color.resolve(self.effective_environment())
    }

    fn render(&self, record: &Record) -> String {
        #[cfg(feature = "json")]
        if self.json_active() {
            return record.to_json(self.template.time_format());
        }
        record.render(&self.template)
    }

    fn write(&self, prefix: &str, line: &str) -> Result<(), LevlogError> {
        let mut sink = self.sink.lock()?;
        write_line(prefix, line, &mut *sink)?;
        Ok(())
    }

    fn dump_withheld(&mut self) -> Result<(), LevlogError> {
        while let Some(line) = self.ring.pop() {
            self.write(&self.dump.prefix, &line)?;
        }
        Ok(())
    }
}

#[cfg(feature = "colors")]
fn paint(level: Level, line: &str) -> String {
    level.color().paint(line).to_string()
}

#[cfg(not(feature = "colors"))]
fn paint(_level: Level, line: &str) -> String {
    line.to_string()
}

#[cfg(test)]
mod test {
    use super::Worker;
    use crate::{
        environment::{ColorMode, Environment},
        formats::Template,
        record::Record,
        ring_buffer::DumpPolicy,
        writers::SharedBuffer,
        Level, Options,
    };

    fn worker(env: Environment) -> (Worker, SharedBuffer) {
        let buffer = SharedBuffer::new();
        let worker = Worker::new(
            Options::new("worker-test")
                .environment(env)
                .color(ColorMode::Disabled)
                .sink(buffer.sink()),
        );
        worker.set_template(Template::new("%.3[7]s %[8]s", "%Y"));
        (worker, buffer)
    }

    fn record(level: Level, message: &str) -> Record {
        Record::builder(level).message(message).build()
    }

    #[test]
    fn test_threshold() {
        let (worker, buffer) = worker(Environment::Production);
        assert_eq!(worker.level(), Level::Error);
        worker.log(record(Level::Info, "dropped")).unwrap();
        worker.log(record(Level::Error, "kept")).unwrap();
        assert_eq!(buffer.lines(), vec!["ERR kept"]);
    }

    #[test]
    fn test_threshold_monotonicity() {
        for threshold in Level::ALL {
            let (worker, _buffer) = worker(Environment::Production);
            worker.set_level(threshold);
            for l2 in Level::ALL {
                for l1 in Level::ALL.iter().filter(|l1| **l1 < l2) {
                    if worker.is_enabled_for(l2) {
                        assert!(worker.is_enabled_for(*l1));
                    }
                }
            }
        }
    }

    #[test]
    fn test_raw_bypasses_everything() {
        let (worker, buffer) = worker(Environment::Production);
        worker.set_color(ColorMode::Enabled);
        worker.log(record(Level::Raw, "as is %{level}")).unwrap();
        assert_eq!(buffer.contents(), "as is %{level}\n");
    }

    #[test]
    fn test_sticky_testing() {
        let (worker, _buffer) = worker(Environment::Testing);
        worker.set_environment(Environment::Production);
        assert_eq!(worker.environment(), Environment::Testing);
        assert_eq!(worker.requested_environment(), Environment::Production);
        assert_eq!(worker.level(), Level::Info);
        worker.clear_testing();
        assert_eq!(worker.environment(), Environment::Production);
        assert_eq!(worker.level(), Level::Error);
        assert_eq!(worker.template(), Template::production());
    }

    #[test]
    fn test_environment_templates() {
        let worker = Worker::new(
            Options::new("worker-test")
                .environment(Environment::Development)
                .color(ColorMode::Disabled)
                .sink(SharedBuffer::new().sink()),
        );
        assert_eq!(worker.template(), Template::development());
        assert_eq!(worker.level(), Level::Debug);
        assert!(!worker.is_colored());
        worker.set_environment(Environment::Quality);
        assert_eq!(worker.level(), Level::Info);
        assert_eq!(worker.color_mode(), ColorMode::Auto);
        assert_eq!(worker.is_colored(), cfg!(feature = "colors"));
        worker.set_environment(Environment::from(99));
        assert_eq!(worker.level(), Level::Error);
        assert!(!worker.is_colored());
    }

    #[test]
    fn test_dump_on_trigger() {
        let (worker, buffer) = worker(Environment::Production);
        worker.set_dump_policy(DumpPolicy::new(Level::Error, "> "));
        for i in 1..=4 {
            worker.log(record(Level::Debug, &format!("debug {i}"))).unwrap();
        }
        assert_eq!(worker.withheld(), 4);
        assert!(buffer.contents().is_empty());
        worker.log(record(Level::Error, "boom")).unwrap();
        assert_eq!(
            buffer.lines(),
            vec!["> DEB debug 1", "> DEB debug 2", "> DEB debug 3", "> DEB debug 4", "ERR boom"]
        );
        assert_eq!(worker.withheld(), 0);
    }

    #[test]
    fn test_fork_shares_the_sink() {
        let (worker, buffer) = worker(Environment::Production);
        worker.set_dump_policy(DumpPolicy::new(Level::Error, ""));
        worker.log(record(Level::Info, "parent")).unwrap();
        let child = worker.fork("job");
        assert_eq!(child.context(), "job: ");
        assert_eq!(child.template(), worker.template());
        assert_eq!(child.withheld(), 0);

        let other = SharedBuffer::new();
        child.set_output(other.sink());
        worker.log(record(Level::Error, "to the new sink")).unwrap();
        assert!(buffer.contents().is_empty());
        assert_eq!(other.lines(), vec!["INF parent", "ERR to the new sink"]);
    }

    #[test]
    fn test_disabling_dump_discards() {
        let (worker, buffer) = worker(Environment::Production);
        worker.set_dump_policy(DumpPolicy::new(Level::Error, ""));
        worker.log(record(Level::Info, "withheld")).unwrap();
        worker.set_dump_policy(DumpPolicy::default());
        worker.log(record(Level::Error, "alone")).unwrap();
        assert_eq!(buffer.lines(), vec!["ERR alone"]);
    }

    #[cfg(feature = "colors")]
    #[test]
    fn test_colors() {
        let (worker, buffer) = worker(Environment::Production);
        worker.set_color(ColorMode::Enabled);
        worker.log(record(Level::Error, "red")).unwrap();
        assert_eq!(buffer.contents(), "\u{1b}[31mERR red\u{1b}[0m\n");
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_json_only_in_production_and_testing() {
        let (worker, buffer) = worker(Environment::Production);
        worker.set_json(true);
        assert!(worker.is_json());
        worker.log(record(Level::Error, "as json")).unwrap();
        let v: serde_json::Value = serde_json::from_str(&buffer.lines()[0]).unwrap();
        assert_eq!(v["message"], "as json");

        worker.set_environment(Environment::Development);
        assert!(!worker.is_json());
    }

    #[test]
    fn test_sink_error_is_returned() {
        struct Broken;
        impl std::io::Write for Broken {
            fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("broken"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }
        let (worker, _buffer) = worker(Environment::Production);
        worker.set_output(Box::new(Broken));
        assert!(matches!(
            worker.log(record(Level::Error, "lost")),
            Err(crate::LevlogError::SinkWrite(_))
        ));
    }
}
