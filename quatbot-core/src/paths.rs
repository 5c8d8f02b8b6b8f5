// ABOUTME: XDG Base Directory paths for config, logs, transcripts and game data
// ABOUTME: Falls back to directories under the working directory when XDG is unavailable

use directories::ProjectDirs;
use std::path::PathBuf;

/// Application identifier for XDG directories
const QUALIFIER: &str = "org";
const ORGANIZATION: &str = "quatbot";
const APPLICATION: &str = "quatbot";

/// Get XDG-compliant directories for the application
pub fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
}

/// Get the data directory path (e.g., ~/.local/share/quatbot/)
/// Falls back to ./data if XDG directories unavailable
pub fn data_dir() -> PathBuf {
    project_dirs()
        .map(|p| p.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("./data"))
}

/// Get the log directory path (inside data dir)
/// e.g., ~/.local/share/quatbot/logs/
pub fn log_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Where meeting transcripts go unless configured otherwise
/// e.g., ~/.local/share/quatbot/transcripts/
pub fn transcript_dir() -> PathBuf {
    data_dir().join("transcripts")
}

/// Get the crypto store directory path
/// e.g., ~/.local/share/quatbot/crypto_store/
pub fn crypto_store_dir() -> PathBuf {
    data_dir().join("crypto_store")
}

/// Get the config directory path (e.g., ~/.config/quatbot/)
/// Falls back to current directory if XDG directories unavailable
pub fn config_dir() -> PathBuf {
    project_dirs()
        .map(|p| p.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Get the default config file path
/// e.g., ~/.config/quatbot/config.toml
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}
