// ABOUTME: Configuration parsing from TOML file with environment variable overrides
// ABOUTME: Validates required fields and provides sensible defaults for optional ones
use crate::commands::DEFAULT_PREFIX;
use crate::paths;
use crate::traits::looks_like_identity;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix: Option<MatrixConfig>,
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub meeting: MeetingConfig,
    #[serde(default)]
    pub coffee: CoffeeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct MatrixConfig {
    pub home_server: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default = "default_device_name")]
    pub device_name: String,
}

// Custom Debug impl to redact sensitive fields
impl std::fmt::Debug for MatrixConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatrixConfig")
            .field("home_server", &self.home_server)
            .field("user_id", &self.user_id)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("device_name", &self.device_name)
            .finish()
    }
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            home_server: String::new(),
            user_id: String::new(),
            password: None,
            access_token: None,
            device_name: default_device_name(),
        }
    }
}

/// Rooms to join and who runs them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Room ids or aliases
    #[serde(default)]
    pub rooms: Vec<String>,
    /// Initial operators for every room (the bot itself is always one)
    #[serde(default)]
    pub operators: Vec<String>,
    /// Single character that starts a command
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            rooms: Vec::new(),
            operators: Vec::new(),
            prefix: default_prefix(),
        }
    }
}

impl BotConfig {
    /// The prefix as a character; falls back to `~` if unset
    pub fn prefix_char(&self) -> char {
        self.prefix.chars().next().unwrap_or(DEFAULT_PREFIX)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingConfig {
    /// Reminder interval while doing the roll-call
    #[serde(default = "default_rollcall_reminder_secs")]
    pub rollcall_reminder_secs: u64,
    /// Reminder interval for the current speaker
    #[serde(default = "default_turn_reminder_secs")]
    pub turn_reminder_secs: u64,
    /// How many reminders are sent before the bot goes quiet
    #[serde(default = "default_reminders")]
    pub reminders: i32,
}

impl Default for MeetingConfig {
    fn default() -> Self {
        Self {
            rollcall_reminder_secs: default_rollcall_reminder_secs(),
            turn_reminder_secs: default_turn_reminder_secs(),
            reminders: default_reminders(),
        }
    }
}

impl MeetingConfig {
    pub fn rollcall_interval(&self) -> Duration {
        Duration::from_secs(self.rollcall_reminder_secs)
    }

    pub fn turn_interval(&self) -> Duration {
        Duration::from_secs(self.turn_reminder_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoffeeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_jar_size")]
    pub jar_size: i32,
    /// One cookie is added to the jar this often
    #[serde(default = "default_refill_secs")]
    pub refill_secs: u64,
    /// Where the cookie jar is saved; defaults to the XDG data dir
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
}

impl Default for CoffeeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            jar_size: default_jar_size(),
            refill_secs: default_refill_secs(),
            data_dir: None,
        }
    }
}

impl CoffeeConfig {
    pub fn refill_interval(&self) -> Duration {
        Duration::from_secs(self.refill_secs)
    }

    pub fn data_path(&self) -> PathBuf {
        self.data_dir
            .as_deref()
            .map(|d| PathBuf::from(expand_tilde(d)))
            .unwrap_or_else(paths::data_dir)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Where meeting transcripts are written; defaults to the XDG data dir
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_dir: Option<String>,
    /// Program whose output answers `~fortune`
    #[serde(default = "default_fortune_program")]
    pub fortune_program: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            transcript_dir: None,
            fortune_program: default_fortune_program(),
        }
    }
}

impl LoggingConfig {
    pub fn transcript_path(&self) -> PathBuf {
        self.transcript_dir
            .as_deref()
            .map(|d| PathBuf::from(expand_tilde(d)))
            .unwrap_or_else(paths::transcript_dir)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Address for the Prometheus exporter, e.g. "127.0.0.1:9187"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen: Option<String>,
}

fn default_device_name() -> String {
    "quatbot".to_string()
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

fn default_rollcall_reminder_secs() -> u64 {
    60
}

fn default_turn_reminder_secs() -> u64 {
    30
}

fn default_reminders() -> i32 {
    2
}

fn default_true() -> bool {
    true
}

fn default_jar_size() -> i32 {
    12
}

fn default_refill_secs() -> u64 {
    3579 // a little under an hour
}

fn default_fortune_program() -> String {
    "fortune".to_string()
}

/// Expand tilde (~) to home directory in paths
/// Logs a warning if expansion fails and falls back to the original path
fn expand_tilde(path: &str) -> String {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(base_dirs) = directories::BaseDirs::new() {
            return base_dirs
                .home_dir()
                .join(stripped)
                .to_string_lossy()
                .to_string();
        } else {
            tracing::warn!(
                path = %path,
                "Failed to expand tilde in path: could not determine home directory"
            );
        }
    } else if path == "~" {
        if let Some(base_dirs) = directories::BaseDirs::new() {
            return base_dirs.home_dir().to_string_lossy().to_string();
        } else {
            tracing::warn!("Failed to expand tilde: could not determine home directory");
        }
    }
    path.to_string()
}

/// Comma-separated list from an env var, empty entries dropped
fn split_list(val: &str) -> Vec<String> {
    val.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    /// Find the config file, checking multiple locations in order:
    /// 1. QUATBOT_CONFIG_PATH env var (if set)
    /// 2. ./config.toml (current directory - for development)
    /// 3. ~/.config/quatbot/config.toml (XDG config dir)
    fn find_config_file() -> Option<PathBuf> {
        if let Ok(env_path) = std::env::var("QUATBOT_CONFIG_PATH") {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                return Some(path);
            }
        }

        let local_config = PathBuf::from("config.toml");
        if local_config.exists() {
            return Some(local_config);
        }

        let xdg_config = paths::config_file();
        if xdg_config.exists() {
            return Some(xdg_config);
        }

        None
    }

    /// Load configuration from config.toml with environment variable overrides
    /// Searches: QUATBOT_CONFIG_PATH env var, ./config.toml, then ~/.config/quatbot/config.toml
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Like [`Config::load`], but an explicit path (from the command line)
    /// wins over the search and must exist.
    pub fn load_from(explicit: Option<&Path>) -> Result<Self> {
        let config_path = match explicit {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Config file {} does not exist", path.display());
                }
                Some(path.to_path_buf())
            }
            None => Self::find_config_file(),
        };

        let mut config = if let Some(config_path) = config_path {
            tracing::info!(
                path = %config_path.display(),
                "Loading configuration from file"
            );
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            Self::from_toml_str(&content)
                .with_context(|| format!("Failed to parse {}", config_path.display()))?
        } else {
            tracing::info!("No config file found, using environment variables and defaults");
            Config::default()
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse without env overrides or validation
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str::<Config>(content)?)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if self.matrix.is_none() && std::env::var("MATRIX_HOME_SERVER").is_ok() {
            self.matrix = Some(MatrixConfig::default());
        }
        if let Some(ref mut matrix) = self.matrix {
            if let Ok(val) = std::env::var("MATRIX_HOME_SERVER") {
                matrix.home_server = val;
            }
            if let Ok(val) = std::env::var("MATRIX_USER_ID") {
                matrix.user_id = val;
            }
            if let Ok(val) = std::env::var("MATRIX_PASSWORD") {
                matrix.password = Some(val);
            }
            if let Ok(val) = std::env::var("MATRIX_ACCESS_TOKEN") {
                matrix.access_token = Some(val);
            }
            if let Ok(val) = std::env::var("MATRIX_DEVICE_NAME") {
                matrix.device_name = val;
            }
        }
        if let Ok(val) = std::env::var("QUATBOT_ROOMS") {
            self.bot.rooms = split_list(&val);
        }
        if let Ok(val) = std::env::var("QUATBOT_OPERATORS") {
            self.bot.operators = split_list(&val);
        }
        if let Ok(val) = std::env::var("QUATBOT_PREFIX") {
            self.bot.prefix = val;
        }
        if let Ok(val) = std::env::var("QUATBOT_JAR_SIZE") {
            self.coffee.jar_size = val.parse().with_context(|| {
                format!("QUATBOT_JAR_SIZE must be a valid number, got: {}", val)
            })?;
        }
        if let Ok(val) = std::env::var("QUATBOT_TRANSCRIPT_DIR") {
            self.logging.transcript_dir = Some(val);
        }
        if let Ok(val) = std::env::var("QUATBOT_METRICS_LISTEN") {
            self.metrics.listen = Some(val);
        }
        Ok(())
    }

    /// Check field values; called by [`Config::load`]
    pub fn validate(&mut self) -> Result<()> {
        if let Some(ref matrix) = self.matrix {
            if matrix.home_server.trim().is_empty() {
                anyhow::bail!(
                    "matrix.home_server is required (set in config.toml or MATRIX_HOME_SERVER env var)"
                );
            }
            if matrix.user_id.trim().is_empty() {
                anyhow::bail!(
                    "matrix.user_id is required (set in config.toml or MATRIX_USER_ID env var)"
                );
            }
            if !looks_like_identity(&matrix.user_id) {
                anyhow::bail!("Invalid Matrix user ID in matrix.user_id: {}", matrix.user_id);
            }
            if matrix.password.is_none() && matrix.access_token.is_none() {
                anyhow::bail!("Either matrix.password or matrix.access_token is required");
            }
        }

        self.bot.operators.retain(|s| !s.trim().is_empty());
        for user in &self.bot.operators {
            if !looks_like_identity(user) {
                anyhow::bail!("Invalid Matrix user ID in bot.operators: {}", user);
            }
        }
        if self.bot.prefix.chars().count() != 1 {
            anyhow::bail!(
                "bot.prefix must be exactly one character, got: '{}'",
                self.bot.prefix
            );
        }
        if self.bot.prefix.trim().is_empty() {
            anyhow::bail!("bot.prefix must not be whitespace");
        }

        if self.meeting.rollcall_reminder_secs == 0 || self.meeting.turn_reminder_secs == 0 {
            anyhow::bail!("meeting reminder intervals must be at least one second");
        }
        if self.coffee.jar_size < 1 {
            anyhow::bail!("coffee.jar_size must be positive, got: {}", self.coffee.jar_size);
        }
        if self.coffee.refill_secs == 0 {
            anyhow::bail!("coffee.refill_secs must be at least one second");
        }
        Ok(())
    }

    /// Get a reference to the Matrix config, returning an error if not configured.
    pub fn matrix_config(&self) -> Result<&MatrixConfig> {
        self.matrix
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Matrix configuration is required but not present"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_file() {
        let config = Config::from_toml_str("").unwrap();
        assert!(config.matrix.is_none());
        assert_eq!(config.bot.prefix_char(), '~');
        assert_eq!(config.meeting.rollcall_interval(), Duration::from_secs(60));
        assert_eq!(config.meeting.turn_interval(), Duration::from_secs(30));
        assert_eq!(config.meeting.reminders, 2);
        assert!(config.coffee.enabled);
        assert_eq!(config.coffee.jar_size, 12);
        assert_eq!(config.coffee.refill_secs, 3579);
        assert_eq!(config.logging.fortune_program, "fortune");
        assert!(config.metrics.listen.is_none());
    }

    #[test]
    fn test_full_file() {
        let toml_str = r##"
            [matrix]
            home_server = "https://matrix.example.org"
            user_id = "@quatbot:example.org"
            password = "hunter2"

            [bot]
            rooms = ["#meeting:example.org"]
            operators = ["@chair:example.org"]
            prefix = "!"

            [meeting]
            turn_reminder_secs = 45

            [coffee]
            enabled = false
            data_dir = "/var/lib/quatbot"

            [logging]
            transcript_dir = "/var/log/quatbot"
        "##;
        let mut config = Config::from_toml_str(toml_str).unwrap();
        config.validate().unwrap();
        let matrix = config.matrix_config().unwrap();
        assert_eq!(matrix.device_name, "quatbot");
        assert_eq!(config.bot.rooms, vec!["#meeting:example.org"]);
        assert_eq!(config.bot.prefix_char(), '!');
        assert_eq!(config.meeting.turn_reminder_secs, 45);
        assert_eq!(config.meeting.rollcall_reminder_secs, 60);
        assert!(!config.coffee.enabled);
        assert_eq!(config.coffee.data_path(), PathBuf::from("/var/lib/quatbot"));
        assert_eq!(
            config.logging.transcript_path(),
            PathBuf::from("/var/log/quatbot")
        );
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = MatrixConfig {
            home_server: "https://matrix.example.org".to_string(),
            user_id: "@quatbot:example.org".to_string(),
            password: Some("hunter2".to_string()),
            access_token: Some("syt_secret".to_string()),
            device_name: "quatbot".to_string(),
        };
        let debug_str = format!("{:?}", config);
        assert!(!debug_str.contains("hunter2"));
        assert!(!debug_str.contains("syt_secret"));
        assert!(debug_str.contains("[REDACTED]"));
    }

    #[test]
    fn test_validate_rejects_bad_prefix() {
        let mut config = Config::from_toml_str("[bot]\nprefix = \"~~\"").unwrap();
        assert!(config.validate().is_err());
        let mut config = Config::from_toml_str("[bot]\nprefix = \"\"").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_operator() {
        let mut config = Config::from_toml_str("[bot]\noperators = [\"bob\"]").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("bob"));
    }

    #[test]
    fn test_validate_requires_credentials() {
        let toml_str = r#"
            [matrix]
            home_server = "https://matrix.example.org"
            user_id = "@quatbot:example.org"
        "#;
        let mut config = Config::from_toml_str(toml_str).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("password"));
    }

    #[test]
    fn test_split_list() {
        assert_eq!(
            split_list(" @a:x.org, ,@b:x.org "),
            vec!["@a:x.org".to_string(), "@b:x.org".to_string()]
        );
    }
}
