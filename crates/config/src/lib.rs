#![forbid(unsafe_code)]

mod cpu;
mod error;
mod logging;
mod monitor;
mod suspicion;

pub use cpu::Cpu;
pub use error::Error;
pub use logging::{LogFormat, Logging};
pub use monitor::{MarkScope, Monitor};
pub use suspicion::{FileAction, SuspicionLevel, SuspicionPolicy};

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub monitor: Monitor,
    pub logging: Logging,
    pub cpu: Cpu,
    pub suspicion: SuspicionPolicy,
}

impl Config {
    /// Load configuration from a TOML file. Missing fields are filled with defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)?;
        let config: Config = toml_edit::de::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let toml = toml_edit::ser::to_string_pretty(self)?;
        std::fs::write(path, toml)?;
        Ok(())
    }

    /// Load configuration from multiple TOML files. Later files override earlier ones.
    pub fn load_multiple<T, U>(paths: U) -> Result<Self, Error>
    where
        T: AsRef<Path>,
        U: IntoIterator<Item = T>,
    {
        let mut merged = toml_edit::DocumentMut::new();
        for path in paths {
            let path = path.as_ref();
            if !path.exists() {
                continue;
            }
            let text = std::fs::read_to_string(path)?;
            let doc: toml_edit::DocumentMut = text.parse()?;
            merge_document(&mut merged, doc);
        }
        let config: Config = toml_edit::de::from_str(&merged.to_string())?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the daemon cannot run with.
    pub fn validate(&self) -> Result<(), Error> {
        let intervals = [
            ("monitor.poll_interval", self.monitor.poll_interval),
            ("monitor.liveness_interval", self.monitor.liveness_interval),
            ("monitor.read_interval", self.monitor.read_interval),
            ("monitor.enumerate_timeout", self.monitor.enumerate_timeout),
            ("cpu.interval", self.cpu.interval),
        ];
        for (field, value) in intervals {
            if value == Duration::ZERO {
                return Err(Error::Invalid {
                    field,
                    reason: "must be greater than zero".into(),
                });
            }
        }
        if self.monitor.read_buffer_size == 0 {
            return Err(Error::Invalid {
                field: "monitor.read_buffer_size",
                reason: "must be greater than zero".into(),
            });
        }
        if self.cpu.window == 0 {
            return Err(Error::Invalid {
                field: "cpu.window",
                reason: "must keep at least one sample".into(),
            });
        }
        Ok(())
    }
}

fn merge_document(target: &mut toml_edit::DocumentMut, source: toml_edit::DocumentMut) {
    for (key, item) in source.iter() {
        merge_item(
            target.entry(key).or_insert(toml_edit::Item::None),
            item.clone(),
        );
    }
}

fn merge_item(target: &mut toml_edit::Item, source: toml_edit::Item) {
    use toml_edit::Item;
    match (target, source) {
        (Item::Table(target_table), Item::Table(source_table)) => {
            for (key, item) in source_table.iter() {
                merge_item(target_table.entry(key).or_insert(Item::None), item.clone());
            }
        }
        (Item::ArrayOfTables(target_array), Item::ArrayOfTables(source_array)) => {
            for table in source_array.iter() {
                target_array.push(table.clone());
            }
        }
        (target_item, source_item) => {
            *target_item = source_item;
        }
    }
}
