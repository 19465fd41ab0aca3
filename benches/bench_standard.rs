#![feature(test)]

extern crate test;

use levlog::{DumpPolicy, Environment, Level, Logger, Options, SharedBuffer};
use test::Bencher;

fn logger(env: Environment) -> (Logger, SharedBuffer) {
    let buffer = SharedBuffer::new();
    let logger = Logger::new(Options::new("bench").environment(env).sink(buffer.sink()));
    (logger, buffer)
}

#[bench]
fn b10_compile_template(b: &mut Bencher) {
    b.iter(|| {
        levlog::Template::compile("%{time:%H:%M:%S} #%{id} %{file}:%{line} %{lvl} ▶ %{message}")
    });
}

#[bench]
fn b20_relevant_logs(b: &mut Bencher) {
    let (logger, buffer) = logger(Environment::Production);
    b.iter(|| {
        for _ in 1..100 {
            logger.error("This is an error message");
        }
        buffer.clear();
    });
}

#[bench]
fn b30_suppressed_logs(b: &mut Bencher) {
    let (logger, _buffer) = logger(Environment::Production);
    b.iter(|| {
        for _ in 1..100 {
            logger.trace("This is a trace message");
        }
    });
}

#[bench]
fn b40_withheld_logs(b: &mut Bencher) {
    let (logger, _buffer) = logger(Environment::Production);
    logger.set_dump_policy(DumpPolicy::new(Level::Error, ""));
    b.iter(|| {
        for _ in 1..100 {
            logger.debug("This is a withheld message");
        }
    });
}
