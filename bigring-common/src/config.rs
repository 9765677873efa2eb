//! Configuration file location and video folder resolution

use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Environment variable naming the video folder
pub const VIDEO_FOLDER_ENV: &str = "BIGRING_VIDEO_FOLDER";

/// Video folder resolution in priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. `video_folder` value of the TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_video_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    config_value: Option<&Path>,
) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = config_value {
        return path.to_path_buf();
    }

    // Priority 4: OS-dependent compiled default
    default_video_folder()
}

/// Locate the default configuration file for the platform
///
/// Linux tries `~/.config/bigring/config.toml`, then `/etc/bigring/config.toml`.
pub fn default_config_file() -> Result<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("bigring").join("config.toml"));

    if let Some(path) = user_config {
        if path.exists() {
            return Ok(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/bigring/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config("No config file found".to_string()))
}

/// OS-dependent default video folder
pub fn default_video_folder() -> PathBuf {
    dirs::video_dir()
        .map(|d| d.join("bigring"))
        .or_else(|| dirs::data_local_dir().map(|d| d.join("bigring").join("videos")))
        .unwrap_or_else(|| PathBuf::from("./bigring_videos"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_cli_argument_wins() {
        std::env::set_var("BIGRING_TEST_FOLDER_A", "/from/env");
        let folder = resolve_video_folder(
            Some(Path::new("/from/cli")),
            "BIGRING_TEST_FOLDER_A",
            Some(Path::new("/from/toml")),
        );
        assert_eq!(folder, PathBuf::from("/from/cli"));
        std::env::remove_var("BIGRING_TEST_FOLDER_A");
    }

    #[test]
    #[serial]
    fn test_env_beats_config_file() {
        std::env::set_var("BIGRING_TEST_FOLDER_B", "/from/env");
        let folder = resolve_video_folder(
            None,
            "BIGRING_TEST_FOLDER_B",
            Some(Path::new("/from/toml")),
        );
        assert_eq!(folder, PathBuf::from("/from/env"));
        std::env::remove_var("BIGRING_TEST_FOLDER_B");
    }

    #[test]
    #[serial]
    fn test_empty_env_is_ignored() {
        std::env::set_var("BIGRING_TEST_FOLDER_C", "");
        let folder = resolve_video_folder(
            None,
            "BIGRING_TEST_FOLDER_C",
            Some(Path::new("/from/toml")),
        );
        assert_eq!(folder, PathBuf::from("/from/toml"));
        std::env::remove_var("BIGRING_TEST_FOLDER_C");
    }

    #[test]
    #[serial]
    fn test_falls_back_to_default() {
        std::env::remove_var("BIGRING_TEST_FOLDER_D");
        let folder = resolve_video_folder(None, "BIGRING_TEST_FOLDER_D", None);
        assert_eq!(folder, default_video_folder());
        assert!(!folder.as_os_str().is_empty());
    }
}
