use std::fs;
use std::path::Path;

use crate::io::workspace::WorkspaceError;
use crate::model::config::Config;

/// Read and validate `config.toml` from the `.daylog/` directory. A missing
/// file yields the default config.
pub fn read_config(daylog_dir: &Path) -> Result<Config, WorkspaceError> {
    let config_path = daylog_dir.join("config.toml");
    let config_text = match fs::read_to_string(&config_path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
        Err(e) => {
            return Err(WorkspaceError::ReadError {
                path: config_path,
                source: e,
            });
        }
    };
    let config: Config = toml::from_str(&config_text)?;
    config.validate().map_err(WorkspaceError::InvalidConfig)?;
    Ok(config)
}
