use crate::{formats::Template, Level};
use std::fmt;

/// Name of the environment variable that is consulted by [`Options::from_env`](crate::Options::from_env).
pub const BUILD_ENV: &str = "BUILD_ENV";

/// The environment the program runs in.
///
/// The environment determines the default threshold, the default color mode,
/// and the default line format.
///
/// `Testing` is sticky: once a logger was switched to `Testing`, later switches are remembered,
/// but the logger keeps behaving like in `Testing` until
/// [`Logger::clear_testing`](crate::Logger::clear_testing) is called.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Environment {
    /// Not decided yet; resolves to `Production`.
    #[default]
    NotSet,
    /// Automated tests.
    Testing,
    /// Developer machines: everything down to `Debug`, with function names.
    Development,
    /// Quality assurance.
    Quality,
    /// Production: only errors, no colors.
    Production,
}

impl Environment {
    /// Maps the value of the build environment variable:
    /// `dev` → `Development`, `qa` → `Quality`, anything else → `Production`.
    #[must_use]
    pub fn from_build_env(value: &str) -> Self {
        match value {
            "dev" => Environment::Development,
            "qa" => Environment::Quality,
            _ => Environment::Production,
        }
    }

    /// Lenient lookup by name, as used in configuration files.
    ///
    /// Unknown names fail closed to `Production`.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "" | "auto" | "notset" => Environment::NotSet,
            "test" | "testing" => Environment::Testing,
            "dev" | "development" => Environment::Development,
            "qa" | "quality" => Environment::Quality,
            _ => Environment::Production,
        }
    }

    /// `NotSet` resolves to `Production`, all others to themselves.
    #[must_use]
    pub fn resolved(self) -> Self {
        match self {
            Environment::NotSet => Environment::Production,
            env => env,
        }
    }

    /// The settings that are applied when switching to this environment.
    #[must_use]
    pub fn defaults(self) -> Defaults {
        let env = self.resolved();
        Defaults {
            threshold: env.threshold(),
            color: match env {
                Environment::Production => ColorMode::Disabled,
                _ => ColorMode::Auto,
            },
            template: match env {
                Environment::Production => Template::production(),
                Environment::Development => Template::development(),
                _ => Template::default_template(),
            },
        }
    }

    pub(crate) fn threshold(self) -> Level {
        match self.resolved() {
            Environment::Development => Level::Debug,
            Environment::Testing | Environment::Quality => Level::Info,
            _ => Level::Error,
        }
    }

    // Where ColorMode::Auto results in colored output.
    fn colors_by_default(self) -> bool {
        matches!(self, Environment::Development | Environment::Quality)
    }

    // Where JSON output can be switched on.
    pub(crate) fn allows_json(self) -> bool {
        matches!(self, Environment::Production | Environment::Testing)
    }
}

impl From<i32> for Environment {
    /// Numeric codes: `-1` testing, `0` production, `1` quality, `2` development;
    /// other values fail closed to `Production`.
    fn from(code: i32) -> Self {
        match code {
            -1 => Environment::Testing,
            1 => Environment::Quality,
            2 => Environment::Development,
            _ => Environment::Production,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Environment::NotSet => "not set",
            Environment::Testing => "testing",
            Environment::Development => "development",
            Environment::Quality => "quality assurance",
            Environment::Production => "production",
        })
    }
}

/// Controls colored output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ColorMode {
    /// Not configured; behaves like `Auto`.
    #[default]
    NotSet,
    /// Never color.
    Disabled,
    /// Always color, independent of the environment.
    Enabled,
    /// Color in `Development` and `Quality`, not in `Testing` and `Production`.
    Auto,
}

impl ColorMode {
    /// Decides whether output is colored in the given environment.
    #[must_use]
    pub fn resolve(self, env: Environment) -> bool {
        match self {
            ColorMode::Enabled => true,
            ColorMode::Disabled => false,
            ColorMode::NotSet | ColorMode::Auto => env.resolved().colors_by_default(),
        }
    }

    /// Lookup by name (`on`/`enabled`/`true`, `off`/`disabled`/`false`, `auto`).
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "on" | "enabled" | "true" | "always" => ColorMode::Enabled,
            "off" | "disabled" | "false" | "never" => ColorMode::Disabled,
            "auto" => ColorMode::Auto,
            _ => ColorMode::NotSet,
        }
    }
}

/// The settings an [`Environment`] implies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Defaults {
    /// Least urgent level that is still written.
    pub threshold: Level,
    /// Color mode.
    pub color: ColorMode,
    /// Line format.
    pub template: Template,
}

#[cfg(test)]
mod test {
    use super::{ColorMode, Environment};
    use crate::{formats::Template, Level};

    #[test]
    fn test_build_env() {
        assert_eq!(Environment::from_build_env("dev"), Environment::Development);
        assert_eq!(Environment::from_build_env("qa"), Environment::Quality);
        assert_eq!(Environment::from_build_env("prod"), Environment::Production);
        assert_eq!(Environment::from_build_env(""), Environment::Production);
        assert_eq!(Environment::from_build_env("DEV"), Environment::Production);
    }

    #[test]
    fn test_defaults() {
        let prod = Environment::Production.defaults();
        assert_eq!(prod.threshold, Level::Error);
        assert_eq!(prod.color, ColorMode::Disabled);
        assert_eq!(prod.template, Template::production());

        let dev = Environment::Development.defaults();
        assert_eq!(dev.threshold, Level::Debug);
        assert_eq!(dev.color, ColorMode::Auto);
        assert_eq!(dev.template, Template::development());

        assert_eq!(Environment::Quality.defaults().threshold, Level::Info);
        assert_eq!(Environment::Testing.defaults().threshold, Level::Info);
        assert_eq!(Environment::NotSet.defaults(), prod);
        assert_eq!(Environment::from(17).defaults(), prod);
    }

    #[test]
    fn test_color_resolution() {
        assert!(ColorMode::Enabled.resolve(Environment::Production));
        assert!(!ColorMode::Disabled.resolve(Environment::Development));
        assert!(ColorMode::Auto.resolve(Environment::Development));
        assert!(ColorMode::NotSet.resolve(Environment::Quality));
        assert!(!ColorMode::Auto.resolve(Environment::Testing));
        assert!(!ColorMode::Auto.resolve(Environment::NotSet));
    }
}
