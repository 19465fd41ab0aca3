use levlog::{Environment, Level, LevlogError, Logger, Options};
use std::io::Write;

struct FailingSink;
impl Write for FailingSink {
    fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
        Err(std::io::Error::other("disk on fire"))
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Err(std::io::Error::other("disk on fire"))
    }
}

#[test]
fn test_sink_errors() {
    let logger = Logger::new(
        Options::new("sink-error")
            .environment(Environment::Production)
            .exit_on_fatal(false)
            .sink(Box::new(FailingSink)),
    );

    // explicit API: the error is returned
    match logger.log(Level::Error, "lost") {
        Err(LevlogError::SinkWrite(e)) => assert_eq!(e.to_string(), "disk on fire"),
        other => panic!("unexpected result {other:?}"),
    }
    assert!(logger.flush().is_err());

    // filtered records don't touch the sink
    assert!(logger.log(Level::Debug, "filtered").is_ok());

    // convenience API: the error is swallowed
    logger.error("also lost");
    logger.fatal("not fatal when exit is disabled");
}
