use crate::{
    fields::Fields,
    formats::{format_time, Template},
    printf::{sprintf, Arg, EXTRA_SENTINEL},
    Level,
};
use chrono::{DateTime, Local};
use std::{
    panic::Location,
    path::Path,
    sync::{
        atomic::{AtomicU64, Ordering},
        OnceLock,
    },
    time::Duration,
};

static SEQUENCE: AtomicU64 = AtomicU64::new(0);
// 0 means no ceiling.
static SEQUENCE_CEILING: AtomicU64 = AtomicU64::new(0);

/// Lets the process-wide sequence numbers restart with 1 after `ceiling`;
/// `None` or `Some(0)` removes the ceiling.
///
/// The sequence is shared by all loggers, and so is the ceiling.
pub fn set_sequence_ceiling(ceiling: Option<u64>) {
    SEQUENCE_CEILING.store(ceiling.unwrap_or(0), Ordering::Relaxed);
}

/// The ceiling set with [`set_sequence_ceiling`].
#[must_use]
pub fn sequence_ceiling() -> Option<u64> {
    match SEQUENCE_CEILING.load(Ordering::Relaxed) {
        0 => None,
        ceiling => Some(ceiling),
    }
}

/// Allocates the next process-wide sequence number.
///
/// Numbers start with 1; with a ceiling, the number after the ceiling is 1 again.
pub fn next_sequence_id() -> u64 {
    let ceiling = SEQUENCE_CEILING.load(Ordering::Relaxed);
    let step = |current: u64| {
        if ceiling > 0 && current >= ceiling {
            1
        } else {
            current.wrapping_add(1)
        }
    };
    let previous = SEQUENCE
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
            Some(step(current))
        })
        .unwrap_or_else(|current| current);
    step(previous)
}

/// Lets the sequence numbers start from 1 again.
pub fn reset_sequence() {
    SEQUENCE.store(0, Ordering::Relaxed);
}

/// Source location of a log call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallSite {
    /// Source file, without directories.
    pub file: String,
    /// Line in the source file.
    pub line: u32,
    /// Calling function, if known.
    pub function: Option<String>,
}

/// Determines the [`CallSite`] of a log call.
///
/// Is invoked once per log call, with the location that `#[track_caller]` provides.
pub trait CallSiteResolver: Send + Sync {
    /// Produces the call site.
    fn resolve(&self, location: &'static Location<'static>) -> CallSite;
}

/// Default resolver: base name of the file and line from the caller's location.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocationResolver;
impl CallSiteResolver for LocationResolver {
    fn resolve(&self, location: &'static Location<'static>) -> CallSite {
        CallSite {
            file: base_name(location.file()),
            line: location.line(),
            function: None,
        }
    }
}

/// Resolver that leaves the call site empty.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCallSite;
impl CallSiteResolver for NoCallSite {
    fn resolve(&self, _location: &'static Location<'static>) -> CallSite {
        CallSite::default()
    }
}

pub(crate) fn base_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map_or_else(|| path.to_string(), |f| f.to_string_lossy().to_string())
}

/// A single log event.
///
/// Is created when a level method is called, and is consumed when it is written
/// (or withheld in the ring buffer).
///
/// The message, including the structured fields, is assembled lazily, once.
#[derive(Debug)]
pub struct Record {
    id: u64,
    time: DateTime<Local>,
    level: Level,
    message: String,
    fields: Fields,
    call_site: CallSite,
    module: Option<String>,
    duration: Option<Duration>,
    method: Option<String>,
    status_code: Option<u16>,
    route: Option<String>,
    context: String,
    full_message: OnceLock<String>,
}

impl Record {
    /// Starts building a record.
    #[must_use]
    pub fn builder(level: Level) -> RecordBuilder {
        RecordBuilder::new(level)
    }

    /// Sequence number.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }
    /// Creation time.
    #[must_use]
    pub fn time(&self) -> &DateTime<Local> {
        &self.time
    }
    /// Level.
    #[must_use]
    pub fn level(&self) -> Level {
        self.level
    }
    /// Module name.
    #[must_use]
    pub fn module(&self) -> &str {
        self.module.as_deref().unwrap_or_default()
    }
    /// Source file.
    #[must_use]
    pub fn file(&self) -> &str {
        &self.call_site.file
    }
    /// Source line.
    #[must_use]
    pub fn line(&self) -> u32 {
        self.call_site.line
    }
    /// Calling function.
    #[must_use]
    pub fn function(&self) -> &str {
        self.call_site.function.as_deref().unwrap_or_default()
    }
    /// Time elapsed since the logger's timer was reset.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration.unwrap_or_default()
    }
    /// HTTP method of a traced request.
    #[must_use]
    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }
    /// HTTP status code of a traced request.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }
    /// Route of a traced request.
    #[must_use]
    pub fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }
    /// Structured fields.
    #[must_use]
    pub fn fields(&self) -> &Fields {
        &self.fields
    }
    /// Context of the logger that wrote the record, see
    /// [`Logger::with_context`](crate::Logger::with_context).
    #[must_use]
    pub fn context(&self) -> &str {
        &self.context
    }

    /// The message, followed by the structured fields as sorted `name=value` pairs.
    ///
    /// Redactable field values appear only in their redacted form.
    pub fn message(&self) -> &str {
        self.full_message.get_or_init(|| {
            if self.fields.is_empty() {
                self.message.clone()
            } else if self.message.is_empty() {
                self.fields.to_string()
            } else {
                format!("{} {}", self.message, self.fields)
            }
        })
    }

    /// Renders the record with the given template, behind the record's context.
    ///
    /// Diagnostics about superfluous arguments that the formatter might append are cut off.
    #[must_use]
    pub fn render(&self, template: &Template) -> String {
        let time = format_time(&self.time, template.time_format());
        let args = [
            Arg::Uint(self.id),
            Arg::Str(&time),
            Arg::Str(self.module()),
            Arg::Str(self.function()),
            Arg::Str(self.file()),
            Arg::Uint(u64::from(self.line())),
            Arg::Str(self.level.name()),
            Arg::Str(self.message()),
            Arg::Duration(self.duration()),
            Arg::Str(self.method().unwrap_or_default()),
            Arg::Uint(u64::from(self.status_code.unwrap_or_default())),
            Arg::Str(self.route().unwrap_or_default()),
        ];
        let mut line = sprintf(template.format(), &args);
        if let Some(i) = line.rfind(EXTRA_SENTINEL) {
            line.truncate(i);
        }
        if !self.context.is_empty() {
            line.insert_str(0, &self.context);
        }
        line
    }

    /// Encodes the record as a JSON object with string values.
    #[cfg(feature = "json")]
    #[cfg_attr(docsrs, doc(cfg(feature = "json")))]
    #[must_use]
    pub fn to_json(&self, time_format: &str) -> String {
        use std::collections::BTreeMap;

        #[derive(serde_derive::Serialize)]
        struct JsonRecord<'a> {
            id: String,
            time: String,
            module: &'a str,
            function: &'a str,
            filename: &'a str,
            line: String,
            level: &'a str,
            message: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            duration: Option<String>,
            #[serde(skip_serializing_if = "Option::is_none")]
            method: Option<&'a str>,
            #[serde(skip_serializing_if = "Option::is_none")]
            statuscode: Option<String>,
            #[serde(skip_serializing_if = "Option::is_none")]
            route: Option<&'a str>,
            #[serde(skip_serializing_if = "BTreeMap::is_empty")]
            fields: BTreeMap<&'a str, String>,
            #[serde(skip_serializing_if = "str::is_empty")]
            context: &'a str,
        }

        let is_request = self.method.is_some() || self.status_code.is_some();
        let json_record = JsonRecord {
            id: self.id.to_string(),
            time: format_time(&self.time, time_format),
            module: self.module(),
            function: self.function(),
            filename: self.file(),
            line: self.line().to_string(),
            level: self.level.name(),
            message: &self.message,
            duration: is_request.then(|| format!("{:?}", self.duration())),
            method: self.method(),
            statuscode: self.status_code.map(|s| s.to_string()),
            route: self.route(),
            fields: self
                .fields
                .iter()
                .map(|(name, value)| (name, value.to_string()))
                .collect(),
            context: &self.context,
        };
        serde_json::to_string(&json_record).unwrap_or_else(|e| {
            format!("{{\"level\":\"ERROR\",\"message\":\"JSON encoding failed: {e}\"}}")
        })
    }

    // Fills in what the worker knows better than the caller.
    pub(crate) fn complete(
        &mut self,
        module: &str,
        function: &str,
        context: &str,
        elapsed: Duration,
    ) {
        if self.module.is_none() {
            self.module = Some(module.to_string());
        }
        if self.call_site.function.is_none() && !function.is_empty() {
            self.call_site.function = Some(function.to_string());
        }
        if self.duration.is_none() {
            self.duration = Some(elapsed);
        }
        context.clone_into(&mut self.context);
    }
}

/// Builder for [`Record`].
#[derive(Debug)]
pub struct RecordBuilder {
    level: Level,
    message: String,
    fields: Fields,
    call_site: CallSite,
    module: Option<String>,
    duration: Option<Duration>,
    method: Option<String>,
    status_code: Option<u16>,
    route: Option<String>,
    time: Option<DateTime<Local>>,
}

impl RecordBuilder {
    fn new(level: Level) -> Self {
        Self {
            level,
            message: String::new(),
            fields: Fields::new(),
            call_site: CallSite::default(),
            module: None,
            duration: None,
            method: None,
            status_code: None,
            route: None,
            time: None,
        }
    }

    /// Sets the message.
    #[must_use]
    pub fn message<S: Into<String>>(mut self, message: S) -> Self {
        self.message = message.into();
        self
    }
    /// Sets the structured fields.
    #[must_use]
    pub fn fields(mut self, fields: Fields) -> Self {
        self.fields = fields;
        self
    }
    /// Sets the call site.
    #[must_use]
    pub fn call_site(mut self, call_site: CallSite) -> Self {
        self.call_site = call_site;
        self
    }
    /// Sets the module; if not set, the logger's module is used.
    #[must_use]
    pub fn module<S: Into<String>>(mut self, module: S) -> Self {
        self.module = Some(module.into());
        self
    }
    /// Sets the duration; if not set, the time since the logger's timer reset is used.
    #[must_use]
    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
    /// Sets the request data of a traced HTTP request.
    #[must_use]
    pub fn request<M: Into<String>, R: Into<String>>(
        mut self,
        method: M,
        status_code: u16,
        route: R,
    ) -> Self {
        self.method = Some(method.into());
        self.status_code = Some(status_code);
        self.route = Some(route.into());
        self
    }
    /// Sets the timestamp; by default, `build()` takes the current time.
    #[must_use]
    pub fn time(mut self, time: DateTime<Local>) -> Self {
        self.time = Some(time);
        self
    }
    /// Allocates a sequence number and creates the record.
    #[must_use]
    pub fn build(self) -> Record {
        Record {
            id: next_sequence_id(),
            time: self.time.unwrap_or_else(Local::now),
            level: self.level,
            message: self.message,
            fields: self.fields,
            call_site: self.call_site,
            module: self.module,
            duration: self.duration,
            method: self.method,
            status_code: self.status_code,
            route: self.route,
            context: String::new(),
            full_message: OnceLock::new(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::{base_name, next_sequence_id, CallSite, Record};
    use crate::{
        fields::{Fields, Sensitive},
        formats::Template,
        Level,
    };
    use std::{collections::HashSet, time::Duration};

    fn record(level: Level, message: &str) -> Record {
        let mut record = Record::builder(level)
            .message(message)
            .call_site(CallSite {
                file: "main.rs".to_string(),
                line: 42,
                function: None,
            })
            .build();
        record.complete("billing", "charge", "", Duration::from_millis(5));
        record
    }

    #[test]
    fn test_render() {
        let r = record(Level::Error, "This is Error!");
        let t = Template::new("%[3]s %[5]s:%[6]d %[4]s %.3[7]s [%[8]s] %[9]s", "%Y");
        assert_eq!(r.render(&t), "billing main.rs:42 charge ERR [This is Error!] 5ms");

        let t = Template::compile("%{lvl}|%{level}|%{message}|%{bogus}");
        assert_eq!(r.render(&t), "ERR|ERROR|This is Error!|");
    }

    #[test]
    fn test_lvl_cuts_the_name() {
        let t = Template::compile("%{lvl}");
        for (level, lvl) in [
            (Level::Warning, "WAR"),
            (Level::Debug, "DEB"),
            (Level::Notice, "NOT"),
            (Level::Trace, "TRA"),
        ] {
            assert_eq!(record(level, "").render(&t), lvl);
            assert_ne!(level.abbreviation(), lvl);
        }
    }

    #[test]
    fn test_context() {
        let mut r = Record::builder(Level::Info).message("charged").build();
        r.complete("billing", "", "order 17: ", Duration::ZERO);
        assert_eq!(r.context(), "order 17: ");
        assert_eq!(r.render(&Template::compile("%{lvl} %{message}")), "order 17: INF charged");
    }

    #[test]
    fn test_render_cuts_extra_arguments() {
        let r = record(Level::Info, "hi");
        let t = Template::new("%d <", "%Y");
        let line = r.render(&t);
        assert!(!line.contains("%!"));
        assert_eq!(line, format!("{} <", r.id()));
    }

    #[test]
    fn test_literal_percent() {
        let r = record(Level::Info, "m");
        let t = Template::compile("100% done: %{message}");
        assert_eq!(r.render(&t), "100% done: m");
    }

    #[test]
    fn test_message_with_fields() {
        let r = Record::builder(Level::Info)
            .message("login")
            .fields(
                Fields::new()
                    .with("user", "karl")
                    .with_redacted("password", Sensitive::new("hunter2")),
            )
            .build();
        assert_eq!(r.message(), "login password=******* user=karl");
        assert!(!format!("{r:?}").contains("hunter2"));
    }

    #[test]
    fn test_request_fields() {
        let r = Record::builder(Level::Trace)
            .request("GET", 404, "/v1/users")
            .duration(Duration::from_millis(12))
            .build();
        let t = Template::compile("%{method} %{route} %{statuscode} %{duration}");
        assert_eq!(r.render(&t), "GET /v1/users 404 12ms");
    }

    #[test]
    fn test_sequence_ids_are_unique() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| (0..500).map(|_| next_sequence_id()).collect::<Vec<_>>()))
            .collect();
        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("src/worker.rs"), "worker.rs");
        assert_eq!(base_name("main.rs"), "main.rs");
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_json() {
        let r = Record::builder(Level::Warning)
            .message("disk \"almost\" full")
            .fields(Fields::new().with("free", 3))
            .build();
        let v: serde_json::Value = serde_json::from_str(&r.to_json("%Y")).unwrap();
        assert_eq!(v["level"], "WARNING");
        assert_eq!(v["message"], "disk \"almost\" full");
        assert_eq!(v["id"], r.id().to_string());
        assert_eq!(v["fields"]["free"], "3");
        assert!(v.get("method").is_none());
    }
}
