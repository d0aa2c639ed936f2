use log4rs::{
    append::console::{ConsoleAppender, Target},
    config::{Appender, Root},
    encode::pattern::PatternEncoder,
    Config,
};

/// Log to stderr at `level`, so that command strings printed to stdout can
/// be piped straight into a shell.
pub fn init_logging(level: log::LevelFilter) {
    // Source locations are only useful when debugging the tools themselves.
    let pattern = if level >= log::LevelFilter::Debug {
        "{h({d(%Y-%m-%d %H:%M:%S)} [{l}] from line {L} in {M})} - {m}{n}"
    } else {
        "{h([{l}])} {m}{n}"
    };

    let stderr = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(pattern)))
        .target(Target::Stderr)
        .build();

    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(level))
        .expect("Failed to configure logger");

    log4rs::init_config(config).expect("Failed to initialize logger");
}
