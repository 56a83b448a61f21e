//! Run configuration — CLI / env over `mkproj.toml` over built-in defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::error;

use crate::spec::STRUCTURE_FILE;

/// Optional override file, read from the working directory.
const CONFIG_FILE: &str = "mkproj.toml";

const DEFAULT_LOG: &str = "info";
const DEFAULT_LOG_FORMAT: &str = "pretty";

/// Everything a run needs, resolved once and passed explicitly — no
/// process-wide state.
#[derive(Debug, Clone)]
pub struct ScaffoldConfig {
    /// Path to the YAML structure file.
    pub structure_file: PathBuf,
    /// Destination root the tree is built into.
    pub dest: PathBuf,
    /// Log level filter string, e.g. "debug", "info,mkproj=trace".
    pub log: String,
    /// Log output format: "pretty" (human-readable) | "json" (structured).
    pub log_format: String,
}

/// `mkproj.toml` — all fields are optional overrides.
/// Priority: CLI / env var  >  TOML  >  built-in default.
#[derive(Deserialize, Default)]
struct TomlConfig {
    structure_file: Option<PathBuf>,
    dest: Option<PathBuf>,
    log: Option<String>,
    log_format: Option<String>,
}

fn load_toml(dir: &Path) -> Option<TomlConfig> {
    let path = dir.join(CONFIG_FILE);
    let contents = std::fs::read_to_string(&path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            error!(path = %path.display(), err = %e, "failed to parse mkproj.toml — using defaults");
            None
        }
    }
}

impl ScaffoldConfig {
    /// Build config from CLI/env args + optional TOML file.
    pub fn new(
        structure_file: Option<PathBuf>,
        dest: Option<PathBuf>,
        log: Option<String>,
        log_format: Option<String>,
    ) -> Self {
        let toml = load_toml(Path::new(".")).unwrap_or_default();

        let structure_file = structure_file
            .or(toml.structure_file)
            .unwrap_or_else(|| PathBuf::from(STRUCTURE_FILE));
        let dest = dest.or(toml.dest).unwrap_or_else(|| PathBuf::from("."));
        let log = log.or(toml.log).unwrap_or_else(|| DEFAULT_LOG.to_string());
        let log_format = log_format
            .or(toml.log_format)
            .unwrap_or_else(|| DEFAULT_LOG_FORMAT.to_string());

        Self {
            structure_file,
            dest,
            log,
            log_format,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_nothing_is_given() {
        let cfg = ScaffoldConfig::new(None, None, None, None);
        assert_eq!(cfg.structure_file, PathBuf::from(STRUCTURE_FILE));
        assert_eq!(cfg.dest, PathBuf::from("."));
        assert_eq!(cfg.log, "info");
        assert_eq!(cfg.log_format, "pretty");
    }

    #[test]
    fn cli_values_win() {
        let cfg = ScaffoldConfig::new(
            Some(PathBuf::from("layout.yaml")),
            Some(PathBuf::from("/tmp/out")),
            Some("debug".to_string()),
            Some("json".to_string()),
        );
        assert_eq!(cfg.structure_file, PathBuf::from("layout.yaml"));
        assert_eq!(cfg.dest, PathBuf::from("/tmp/out"));
        assert_eq!(cfg.log, "debug");
        assert_eq!(cfg.log_format, "json");
    }
}
