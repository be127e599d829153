use std::fmt;
use std::str::FromStr;

use slog::{o, Drain, Key, Level, Logger, Never, OwnedKVList, Record, Serializer, KV};

use crate::config::Config;

/// Log section of the configuration.
#[derive(Clone)]
pub struct LoggerConfig {
    /// Minimum level emitted by the default drain.
    pub level: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        LoggerConfig {
            level: "debug".to_string(),
        }
    }
}

impl LoggerConfig {
    pub(crate) fn merge(&mut self, v: &toml::Value) -> Option<()> {
        let v = v.as_table()?;
        if let Some(level) = v.get("level").and_then(toml::Value::as_str) {
            self.level = level.to_string();
        }
        Some(())
    }
}

struct StdoutSerializer;

impl Serializer for StdoutSerializer {
    fn emit_arguments(&mut self, key: Key, val: &fmt::Arguments) -> slog::Result {
        print!(", {}={}", key, val);
        Ok(())
    }
}

/// Plain stdout drain used when the embedder does not hand in a logger
/// of their own.
pub struct StdoutDrain {
    level: Level,
}

impl StdoutDrain {
    pub fn new(level: Level) -> StdoutDrain {
        StdoutDrain { level }
    }
}

impl Drain for StdoutDrain {
    type Ok = ();
    type Err = Never;

    fn log(&self, record: &Record, values: &OwnedKVList) -> Result<(), Never> {
        if !record.level().is_at_least(self.level) {
            return Ok(());
        }

        print!("{} {}", record.level().as_short_str(), record.msg());

        let _ = record.kv().serialize(record, &mut StdoutSerializer);
        let _ = values.serialize(record, &mut StdoutSerializer);

        println!();
        Ok(())
    }
}

/// Builds the default logger from the configured level.
pub fn default_log(cfg: &Config) -> Logger {
    let level = Level::from_str(&cfg.log.level).unwrap_or(Level::Debug);
    Logger::root(StdoutDrain::new(level), o!())
}
