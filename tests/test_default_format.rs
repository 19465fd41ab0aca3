// Changes process-wide state, so it must stay the only test in this binary.
use levlog::{
    reset_default_format, set_default_format, ColorMode, Environment, Logger, Options,
    SharedBuffer, Template, DEFAULT_FORMAT,
};

#[test]
fn test_default_format() {
    assert_eq!(Template::default_template().format(), DEFAULT_FORMAT);

    set_default_format("%{time:%Y} <%{lvl}> %{message}");
    assert_eq!(Template::default_template().format(), "%[2]s <%.3[7]s> %[8]s");
    assert_eq!(Template::default_template().time_format(), "%Y");

    let buffer = SharedBuffer::new();
    let logger = Logger::new(
        Options::new("default-format")
            .environment(Environment::Quality)
            .color(ColorMode::Disabled)
            .sink(buffer.sink()),
    );
    logger.info("new default");
    let year = chrono::Local::now().format("%Y").to_string();
    assert_eq!(buffer.lines(), vec![format!("{year} <INF> new default")]);

    // too short formats fall back to the changed default
    logger.set_format("%{x}");
    logger.info("still");
    assert_eq!(buffer.lines()[1], format!("{year} <INF> still"));

    reset_default_format();
    assert_eq!(Template::default_template().format(), DEFAULT_FORMAT);
}
