use crate::kernel::SchedulerConfig;
use crate::logger::LoggerConfig;

/// Runtime configuration, merged from defaults and an optional TOML
/// file.
#[derive(Clone)]
pub struct Config {
    pub debug: bool,
    pub log: LoggerConfig,
    pub scheduler: SchedulerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            debug: true,
            log: LoggerConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl Config {
    // Option<()> allows ? while walking the toml value
    fn merge(&mut self, v: &toml::Value) -> Option<()> {
        let v = v.as_table()?;
        if let Some(debug) = v.get("debug").and_then(toml::Value::as_bool) {
            self.debug = debug;
        }
        if let Some(log) = v.get("log") {
            let _ = self.log.merge(log);
        }
        if let Some(scheduler) = v.get("scheduler") {
            let _ = self.scheduler.merge(scheduler);
        }
        Some(())
    }
}

/// Loads the configuration.
///
/// `config/agentry.toml` (or the file named by the `AGENTRY_CONF`
/// environment variable) is merged over the defaults; a missing or
/// unreadable file leaves the defaults untouched.
pub fn load_config() -> Config {
    use std::{
        env,
        fs::File,
        io::{self, Read},
    };

    let mut cfg = Config::default();

    let path = env::var("AGENTRY_CONF").unwrap_or_else(|_| "config/agentry.toml".into());
    let cfg_amendment = File::open(path)
        .and_then(|mut f| {
            let mut s = String::new();
            f.read_to_string(&mut s)?;
            Ok(s)
        })
        .and_then(|s| {
            toml::from_str::<toml::Value>(&s).map_err(|e| io::Error::new(io::ErrorKind::Other, e))
        });
    if let Ok(cfg_amendment) = cfg_amendment {
        let _ = cfg.merge(&cfg_amendment);
    }

    cfg
}
