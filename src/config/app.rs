use serde::Deserialize;
use std::path::Path;

/// Deployment profile selected with `--env`. Its table in the config file is
/// merged over the base sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Environment {
    Development,
    Production,
    Testing,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Testing => "testing",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlowerConfig {
    #[serde(default = "default_climate")]
    pub default_climate: String,
    #[serde(default = "default_season")]
    pub default_season: String,
    #[serde(default)]
    pub catalog_path: Option<String>,
    #[serde(default)]
    pub weather_path: Option<String>,
    #[serde(default)]
    pub flower_path: Option<String>,
    #[serde(default)]
    pub dice_seed: u64,
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub app: FlowerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(skip)]
    pub environment: Option<Environment>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    5000
}
fn default_climate() -> String {
    "temperate".to_string()
}
fn default_season() -> String {
    "spring".to_string()
}
fn default_session_idle_secs() -> u64 {
    3600
}
fn default_max_sessions() -> usize {
    10_000
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: default_host(),
            port: default_port(),
            debug: false,
        }
    }
}

impl Default for FlowerConfig {
    fn default() -> Self {
        FlowerConfig {
            default_climate: default_climate(),
            default_season: default_season(),
            catalog_path: None,
            weather_path: None,
            flower_path: None,
            dice_seed: 0,
            session_idle_secs: default_session_idle_secs(),
            max_sessions: default_max_sessions(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            server: ServerConfig::default(),
            app: FlowerConfig::default(),
            logging: LoggingConfig::default(),
            environment: None,
        }
    }
}

const SECTIONS: [&str; 3] = ["server", "app", "logging"];

impl AppConfig {
    pub fn from_file(path: &Path, environment: Option<Environment>) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
        Self::from_toml_str(&content, path, environment)
    }

    /// Like `from_file`, but a missing file yields the defaults. The bool
    /// reports whether the file existed.
    pub fn from_file_or_default(
        path: &Path,
        environment: Option<Environment>,
    ) -> Result<(Self, bool), String> {
        if !path.exists() {
            let config = AppConfig {
                environment,
                ..AppConfig::default()
            };
            config.validate()?;
            return Ok((config, false));
        }
        Self::from_file(path, environment).map(|c| (c, true))
    }

    pub fn from_toml_str(
        content: &str,
        source_path: &Path,
        environment: Option<Environment>,
    ) -> Result<Self, String> {
        let mut root: toml::Table =
            toml::from_str(content).map_err(|e| format!("{}: {}", source_path.display(), e))?;

        let profiles: Vec<(String, toml::Value)> = ["development", "production", "testing"]
            .iter()
            .filter_map(|name| root.remove(*name).map(|v| (name.to_string(), v)))
            .collect();

        if let Some(env) = environment {
            if let Some((_, toml::Value::Table(overlay))) =
                profiles.iter().find(|(name, _)| name == env.as_str())
            {
                merge_sections(&mut root, overlay);
            }
        }

        let mut config: AppConfig = toml::Value::Table(root)
            .try_into()
            .map_err(|e| format!("{}: {}", source_path.display(), e))?;
        config.environment = environment;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        let mut errors = Vec::new();

        if self.server.port < 1024 {
            errors.push(format!(
                "server.port must be 1024-65535, got {}. Example: port = 5000",
                self.server.port
            ));
        }

        if self.server.host.trim().is_empty() {
            errors.push("server.host must not be empty. Example: host = \"127.0.0.1\"".to_string());
        }

        if self.app.default_climate.trim().is_empty() {
            errors.push(
                "app.default_climate must not be empty. Example: default_climate = \"temperate\""
                    .to_string(),
            );
        }

        if self.app.default_season.trim().is_empty() {
            errors.push(
                "app.default_season must not be empty. Example: default_season = \"spring\""
                    .to_string(),
            );
        }

        if self.app.session_idle_secs == 0 {
            errors.push(format!(
                "app.session_idle_secs must be > 0, got {}. Example: session_idle_secs = 3600",
                self.app.session_idle_secs
            ));
        }

        if self.app.max_sessions == 0 {
            errors.push(
                "app.max_sessions must be > 0, got 0. Example: max_sessions = 10000".to_string(),
            );
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            errors.push(format!(
                "logging.level must be one of {:?}, got '{}'. Example: level = \"info\"",
                valid_levels, self.logging.level
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("\n"))
        }
    }

    pub fn environment_name(&self) -> &'static str {
        self.environment.map(Environment::as_str).unwrap_or("development")
    }
}

/// Overlay each known section of a profile table onto the base, key by key.
fn merge_sections(root: &mut toml::Table, overlay: &toml::Table) {
    for section in SECTIONS {
        let Some(toml::Value::Table(values)) = overlay.get(section) else {
            continue;
        };
        let entry = root
            .entry(section.to_string())
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        if let toml::Value::Table(base) = entry {
            for (key, value) in values {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}
