// only enables the `doc_cfg` feature when the `docsrs` configuration attribute is defined
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_doctest_main)]
//! A leveled text logger with environment-driven defaults.
//!
//! ```rust
//! use levlog::{Environment, Logger, Options};
//!
//! let logger = Logger::new(
//!     Options::new("billing")
//!         .environment(Environment::Development)
//!         .format("%{time:%H:%M:%S} %{lvl} %{file}:%{line} ▶ %{message}"),
//! );
//! logger.info("invoice created");
//! ```
//!
//! See
//!
//! * [`Options`] for all configuration options,
//! * [`Environment`] for what `Production`, `Quality`, `Development` and `Testing` imply,
//! * [`Template::compile_with_default`] for the placeholder syntax of line formats,
//! * [`DumpPolicy`] for how low-severity lines can be withheld until an error occurs,
//! * [`Fields`] for structured logging with redaction of sensitive values.
//!
//! The [`Logger`] writes synchronously: each log call renders its line and writes it
//! to the sink while holding the logger's lock, so lines of concurrent callers never interleave.
//!
//! A [`Logger`] can also serve as backend of the [`log`](https://docs.rs/log) facade,
//! see [`Logger::start`].
//!
//! By default, i.e. if feature `colors` is not switched off, lines on a terminal can be colored,
//! depending on the environment and the [`ColorMode`].
//! With feature `json`, lines can be written as JSON objects in `Production` and `Testing`.
//! With feature `config`, [`Options`] can be read from TOML.

mod environment;
mod fields;
mod formats;
mod level;
mod levlog_error;
mod logger;
mod options;
mod printf;
mod record;
mod ring_buffer;
mod util;
mod worker;

pub mod global;
pub mod writers;

pub use crate::environment::{ColorMode, Defaults, Environment, BUILD_ENV};
pub use crate::fields::{redact, Fielder, Fields, Redactor, Sensitive, Value};
pub use crate::formats::{
    reset_default_format, set_default_format, Template, DEFAULT_FORMAT, DEFAULT_TIME_FORMAT,
    DEVELOPMENT_FORMAT, PRODUCTION_FORMAT,
};
pub use crate::global::{global, init_global};
pub use crate::level::Level;
pub use crate::levlog_error::LevlogError;
pub use crate::logger::{Entry, Logger};
pub use crate::options::Options;
pub use crate::record::{
    next_sequence_id, reset_sequence, sequence_ceiling, set_sequence_ceiling, CallSite,
    CallSiteResolver, LocationResolver, NoCallSite, Record, RecordBuilder,
};
pub use crate::ring_buffer::{DumpPolicy, RingBuffer, DEFAULT_RING_CAPACITY};
pub use crate::worker::Worker;
pub use crate::writers::SharedBuffer;
