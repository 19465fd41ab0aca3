use chrono::{
    format::{Item, StrftimeItems},
    DateTime, Local,
};
use std::{
    fmt::Write,
    sync::{LazyLock, PoisonError, RwLock},
};

/// Default time layout (chrono `strftime` syntax).
pub const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Compiled line format that is used in `Testing` and `Quality`, unless changed with
/// [`set_default_format`].
///
/// Produces log lines like
/// ```text
/// #12 2024-03-01 10:12:44 main.rs:23 ▶ INF Task successfully read from conf.json
/// ```
pub const DEFAULT_FORMAT: &str = "#%[1]d %.19[2]s %[5]s:%[6]d ▶ %.3[7]s %[8]s";

/// Compiled line format that is used in `Production`.
///
/// Produces log lines like
/// ```text
/// billing 2024-03-01 10:12:44 ERR ▶ Connection refused
/// ```
pub const PRODUCTION_FORMAT: &str = "%.16[3]s %.19[2]s %.3[7]s ▶ %[8]s";

/// Compiled line format that is used in `Development`; it contains the function name.
///
/// Produces log lines like
/// ```text
/// billing 2024-03-01 10:12:44 DEBUG ▶ read_config ▶ Reading conf.json
/// ```
pub const DEVELOPMENT_FORMAT: &str = "%.16[3]s %.19[2]s %.8[7]s ▶ %[4]s ▶ %[8]s";

// Shortest source that can contain a placeholder: "%{message}".
const MIN_SOURCE_LEN: usize = 10;

static DEFAULT_TEMPLATE: LazyLock<RwLock<Template>> =
    LazyLock::new(|| RwLock::new(Template::new(DEFAULT_FORMAT, DEFAULT_TIME_FORMAT)));

/// A compiled line format.
///
/// Consists of a positional format string, in which each field of a record is referenced
/// by a fixed argument index, and the time layout that is used to render `%{time}`.
///
/// | placeholder              | field                        | verb          |
/// |--------------------------|------------------------------|---------------|
/// | `%{id}`                  | sequence number              | `%[1]d`       |
/// | `%{time}`, `%{time:fmt}` | timestamp                    | `%[2]s`       |
/// | `%{module}`              | module name                  | `%[3]s`       |
/// | `%{function}`            | function name                | `%[4]s`       |
/// | `%{filename}`, `%{file}` | source file                  | `%[5]s`       |
/// | `%{line}`                | source line                  | `%[6]d`       |
/// | `%{level}`               | level name                   | `%[7]s`       |
/// | `%{lvl}`                 | first 3 chars of level name  | `%.3[7]s`     |
/// | `%{message}`             | message                      | `%[8]s`       |
/// | `%{duration}`            | elapsed time                 | `%[9]s`       |
/// | `%{method}`              | HTTP method                  | `%[10]s`      |
/// | `%{statuscode}`          | HTTP status code             | `%[11]d`      |
/// | `%{route}`               | HTTP route                   | `%[12]s`      |
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Template {
    format: String,
    time_format: String,
}

impl Template {
    /// Creates a template from an already compiled format string and a time layout.
    #[must_use]
    pub fn new<S: Into<String>, T: Into<String>>(format: S, time_format: T) -> Self {
        Self {
            format: format.into(),
            time_format: time_format.into(),
        }
    }

    /// Compiles a placeholder format, falling back to the current default template.
    ///
    /// See [`Template::compile_with_default`].
    #[must_use]
    pub fn compile(source: &str) -> Self {
        Self::compile_with_default(source, &Self::default_template())
    }

    /// Compiles a format like `"%{time:%H:%M:%S} %{lvl} %{message}"`.
    ///
    /// Malformed input never fails:
    ///
    /// * a source shorter than `%{message}` yields `default` unchanged,
    /// * a `%` that does not start a placeholder is kept as a literal percent sign,
    /// * a placeholder that is interrupted by another `%{` before its closing `}` is kept as
    ///   literal text, and the later placeholder is interpreted,
    /// * a `%{` without any closing `}` is kept as a literal `%`; its `{` is dropped,
    /// * unknown placeholders are removed.
    ///
    /// `%{time:<layout>}` replaces the time layout of `default`.
    #[must_use]
    pub fn compile_with_default(source: &str, default: &Template) -> Self {
        if source.len() < MIN_SOURCE_LEN {
            return default.clone();
        }

        let mut format = String::with_capacity(source.len() + 16);
        let mut time_format = default.time_format.clone();
        let mut rest = source;

        while let Some(idx) = rest.find('%') {
            format.push_str(&rest[..idx]);
            rest = &rest[idx..];

            if rest.len() <= 2 {
                format.push_str("%%");
                rest = &rest[1..];
            } else if rest.as_bytes()[1] != b'{' {
                format.push_str("%%");
                rest = &rest[1..];
            } else if let Some(end) = rest.find('}') {
                if rest[1..].find("%{").is_some_and(|next| next < end) {
                    // "%{broken %{level}": keep the first one as text
                    format.push_str("%%");
                    rest = &rest[1..];
                    continue;
                }
                let (placeholder, arg) = parse_placeholder(&rest[..=end]);
                if let Some(placeholder) = placeholder {
                    format.push_str(placeholder.verb());
                    if placeholder == Placeholder::Time && !arg.is_empty() {
                        time_format = arg.to_string();
                    }
                }
                rest = &rest[end + 1..];
            } else {
                // TODO: decide whether an unterminated "%{" should keep its brace
                format.push_str("%%");
                rest = &rest[2..];
            }
        }
        format.push_str(rest);

        Self {
            format,
            time_format,
        }
    }

    /// The process-wide default template.
    #[must_use]
    pub fn default_template() -> Self {
        DEFAULT_TEMPLATE
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Template with [`PRODUCTION_FORMAT`].
    #[must_use]
    pub fn production() -> Self {
        Self::new(PRODUCTION_FORMAT, Self::default_template().time_format)
    }

    /// Template with [`DEVELOPMENT_FORMAT`].
    #[must_use]
    pub fn development() -> Self {
        Self::new(DEVELOPMENT_FORMAT, Self::default_template().time_format)
    }

    /// The compiled positional format string.
    #[must_use]
    pub fn format(&self) -> &str {
        &self.format
    }

    /// The time layout.
    #[must_use]
    pub fn time_format(&self) -> &str {
        &self.time_format
    }
}

/// Compiles the given format and makes it the process-wide default template.
///
/// Affects loggers in `Testing` and `Quality` the next time their environment is applied,
/// and all templates compiled afterwards from too short sources.
pub fn set_default_format(source: &str) {
    let template = Template::compile(source);
    *DEFAULT_TEMPLATE
        .write()
        .unwrap_or_else(PoisonError::into_inner) = template;
}

/// Restores the built-in default template.
pub fn reset_default_format() {
    *DEFAULT_TEMPLATE
        .write()
        .unwrap_or_else(PoisonError::into_inner) =
        Template::new(DEFAULT_FORMAT, DEFAULT_TIME_FORMAT);
}

/// Fields that can be referenced in a format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Placeholder {
    Id,
    Time,
    Module,
    Function,
    Filename,
    Line,
    Level,
    Lvl,
    Message,
    Duration,
    Method,
    StatusCode,
    Route,
}

impl Placeholder {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "id" => Placeholder::Id,
            "time" => Placeholder::Time,
            "module" => Placeholder::Module,
            "function" => Placeholder::Function,
            "filename" | "file" => Placeholder::Filename,
            "line" => Placeholder::Line,
            "level" => Placeholder::Level,
            "lvl" => Placeholder::Lvl,
            "message" => Placeholder::Message,
            "duration" => Placeholder::Duration,
            "method" => Placeholder::Method,
            "statuscode" => Placeholder::StatusCode,
            "route" => Placeholder::Route,
            _ => return None,
        })
    }

    fn verb(self) -> &'static str {
        match self {
            Placeholder::Id => "%[1]d",
            Placeholder::Time => "%[2]s",
            Placeholder::Module => "%[3]s",
            Placeholder::Function => "%[4]s",
            Placeholder::Filename => "%[5]s",
            Placeholder::Line => "%[6]d",
            Placeholder::Level => "%[7]s",
            Placeholder::Lvl => "%.3[7]s",
            Placeholder::Message => "%[8]s",
            Placeholder::Duration => "%[9]s",
            Placeholder::Method => "%[10]s",
            Placeholder::StatusCode => "%[11]d",
            Placeholder::Route => "%[12]s",
        }
    }
}

// "%{name}" or "%{name:arg}" -> placeholder and argument
fn parse_placeholder(ph: &str) -> (Option<Placeholder>, &str) {
    if ph.len() < 4 || !ph.starts_with("%{") || !ph.ends_with('}') {
        return (None, "");
    }
    let inner = &ph[2..ph.len() - 1];
    match inner.split_once(':') {
        Some((name, arg)) => (Placeholder::from_name(name), arg),
        None => (Placeholder::from_name(inner), ""),
    }
}

/// Renders a timestamp with the given layout; layouts chrono can't handle are replaced by
/// [`DEFAULT_TIME_FORMAT`].
pub(crate) fn format_time(time: &DateTime<Local>, layout: &str) -> String {
    let layout = if StrftimeItems::new(layout).any(|item| matches!(item, Item::Error)) {
        DEFAULT_TIME_FORMAT
    } else {
        layout
    };
    let mut s = String::with_capacity(32);
    if write!(s, "{}", time.format(layout)).is_err() {
        s.clear();
        write!(s, "{}", time.format(DEFAULT_TIME_FORMAT)).ok();
    }
    s
}

#[cfg(test)]
mod test {
    use super::{format_time, Template, DEFAULT_FORMAT, DEFAULT_TIME_FORMAT};
    use chrono::{Local, TimeZone};

    fn default() -> Template {
        Template::new(DEFAULT_FORMAT, DEFAULT_TIME_FORMAT)
    }

    fn compile(source: &str) -> Template {
        Template::compile_with_default(source, &default())
    }

    #[test]
    fn test_short_input_keeps_default() {
        assert_eq!(compile("foobar"), default());
        assert_eq!(compile("%{lvl} %s"), default());
    }

    #[test]
    fn test_stray_percent_is_escaped() {
        let t = compile("{%.10s} - Foobar");
        assert_eq!(t.format(), "{%%.10s} - Foobar");
        assert_eq!(t.time_format(), DEFAULT_TIME_FORMAT);
    }

    #[test]
    fn test_placeholders() {
        let t = compile("%{id} %{module} %{file}:%{line} %{lvl} %{message}");
        assert_eq!(t.format(), "%[1]d %[3]s %[5]s:%[6]d %.3[7]s %[8]s");
        let t = compile("%{method} %{route} %{statuscode} %{duration}");
        assert_eq!(t.format(), "%[10]s %[12]s %[11]d %[9]s");
    }

    #[test]
    fn test_time_layout() {
        let t = compile("%{time:%H:%M:%S} %{message}");
        assert_eq!(t.format(), "%[2]s %[8]s");
        assert_eq!(t.time_format(), "%H:%M:%S");

        let t = compile("%{time} %{message}");
        assert_eq!(t.time_format(), DEFAULT_TIME_FORMAT);
    }

    #[test]
    fn test_unknown_and_empty_placeholders_vanish() {
        assert_eq!(compile("%{bogus} hi").format(), " hi");
        assert_eq!(compile("%{} [%{message}]").format(), " [%[8]s]");
    }

    #[test]
    fn test_malformed_then_valid() {
        assert_eq!(
            compile("%{incorr_verb %{level} msg").format(),
            "%%{incorr_verb %[7]s msg"
        );
        assert_eq!(compile("x %{%{line} yz").format(), "x %%{%[6]d yz");
    }

    #[test]
    fn test_unterminated_placeholder() {
        assert_eq!(compile("%{message is open").format(), "%%message is open");
        assert_eq!(compile("done at 100%").format(), "done at 100%%");
    }

    #[test]
    fn test_compile_is_idempotent() {
        let source = "text123 %{id} !@#$% %{time:%A} a{b %{module} %% %{nope} %{lvl}";
        assert_eq!(compile(source), compile(source));
    }

    #[test]
    fn test_format_time() {
        let time = Local.with_ymd_and_hms(2024, 3, 1, 10, 12, 44).unwrap();
        assert_eq!(format_time(&time, DEFAULT_TIME_FORMAT), "2024-03-01 10:12:44");
        assert_eq!(format_time(&time, "%H:%M"), "10:12");
        // invalid layouts fall back to the default one
        assert_eq!(format_time(&time, "%Q %"), "2024-03-01 10:12:44");
    }
}
