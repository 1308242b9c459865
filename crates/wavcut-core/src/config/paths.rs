//! Standard locations for wavcut files

use std::path::PathBuf;

/// Application directory name under the user config directory
const APP_DIR: &str = "wavcut";

/// Default config file name
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Directory holding wavcut configuration
///
/// Returns `~/.config/wavcut` on Linux, the platform equivalent elsewhere,
/// or `./wavcut` when no config directory can be determined.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Default config file path: `<config_dir>/config.yaml`
pub fn default_config_path() -> PathBuf {
    config_dir().join(CONFIG_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_layout() {
        let path = default_config_path();
        assert!(path.ends_with("wavcut/config.yaml"));
    }
}
