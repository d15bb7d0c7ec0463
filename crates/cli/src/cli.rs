use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use std::path::{Path, PathBuf};

/// airgapd: USB activity auditing for air-gapped endpoints
///
/// airgapd watches for USB mass storage devices, monitors file activity on
/// every mounted partition and writes each observed action to an audit log.
#[derive(Debug, Parser, Clone)]
#[command(about, long_about, version)]
pub struct Cli {
    /// Path to configuration file.
    ///
    /// If not provided, the default locations are checked. They are
    /// `/etc/airgapd/config.toml` and `/etc/airgapd/config.d/*.toml`,
    /// where the latter being a glob pattern. If they don't exist, the default
    /// configuration is used.
    #[arg(short, long, value_parser = validate_file)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub verbosity: Verbosity<InfoLevel>,
}

/// Check if the file exists.
#[inline(always)]
fn validate_file(file: &str) -> Result<PathBuf, String> {
    let path = Path::new(file);
    if path.is_file() {
        Ok(path.to_owned())
    } else {
        Err(format!("File not found: {:?}", path))
    }
}
