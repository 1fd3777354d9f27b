//! Logging setup plus the installable warning sink §7 calls for.
//!
//! `init_logging` mirrors the teacher crate's `log4rs` console appender
//! almost verbatim, just parameterized on level instead of hardcoding it.
//! Warnings that the core wants to surface without aborting an operation
//! (classifier drops, NaN-fallback decisions during binning/regridding) go
//! through [`warn`] instead of `log::warn!` directly, so that an embedding
//! application can install its own sink (e.g. to collect warnings into a
//! product's processing history) without reconfiguring the logging backend.

use std::sync::OnceLock;

use log4rs::{
    append::console::{ConsoleAppender, Target},
    config::{Appender, Root},
    encode::pattern::PatternEncoder,
    Config,
};

pub fn init_logging(level: log::LevelFilter) {
    let stderr = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(
            "{h({d(%Y-%m-%d %H:%M:%S)} [{l}] from line {L} in {M})} - {m}{n}",
        )))
        .target(Target::Stderr)
        .build();

    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(level))
        .expect("Failed to configure logger");

    log4rs::init_config(config).expect("Failed to initialize logger");
}

/// A sink that receives warnings raised by core operations.
///
/// The default sink forwards to `log::warn!`; an embedder can install its own
/// (e.g. to append to a product's `history` string) via
/// [`install_warning_sink`].
pub trait WarningSink: Send + Sync {
    fn warn(&self, message: &str);
}

struct LogWarningSink;

impl WarningSink for LogWarningSink {
    fn warn(&self, message: &str) {
        log::warn!("{message}");
    }
}

static WARNING_SINK: OnceLock<Box<dyn WarningSink>> = OnceLock::new();

/// Install a custom warning sink. Must be called before the first warning is
/// raised; later calls are ignored (the first installed sink wins), matching
/// the "set once before initialization" discipline §5 requires of process-wide
/// settings.
pub fn install_warning_sink(sink: Box<dyn WarningSink>) {
    let _ = WARNING_SINK.set(sink);
}

/// Raise a warning through the installed sink (or the default `log::warn!`
/// sink if none was installed).
pub fn warn(message: &str) {
    WARNING_SINK
        .get_or_init(|| Box::new(LogWarningSink))
        .warn(message);
}
