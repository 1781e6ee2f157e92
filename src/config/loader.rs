use super::schema::Config;
use crate::error::ConfigError;
use anyhow::{Context, Result};
use directories::UserDirs;
use std::fs;
use std::path::{Path, PathBuf};

/// Upper bound for any `rate_limit.*_period_secs` window.
const MAX_RATE_PERIOD_SECS: u64 = 7 * 24 * 60 * 60;

impl Config {
    /// Load `~/.tollgate/config.toml`, creating it with defaults on first run.
    pub fn load_or_init() -> Result<Self> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .context("Could not find home directory")?;
        Self::load_from(&home.join(".tollgate").join("config.toml"))
    }

    /// Load a config file, writing defaults if it does not exist yet.
    /// Environment overrides are applied before validation.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let mut config = if config_path.exists() {
            let contents =
                fs::read_to_string(config_path).context("Failed to read config file")?;
            let mut config: Config =
                toml::from_str(&contents).context("Failed to parse config file")?;
            config.config_path = config_path.to_path_buf();
            config
        } else {
            if let Some(parent) = config_path.parent() {
                fs::create_dir_all(parent).context("Failed to create config directory")?;
            }
            let config = Self {
                config_path: config_path.to_path_buf(),
                ..Self::default()
            };
            config.save()?;
            tracing::info!(path = %config_path.display(), "wrote default config");
            config
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&self.config_path, toml_str).context("Failed to write config file")?;
        Ok(())
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(workspace) = std::env::var("TOLLGATE_WORKSPACE")
            && !workspace.is_empty()
        {
            self.security.workspace_dir = workspace;
        }

        if let Ok(approvals) = std::env::var("TOLLGATE_APPROVALS")
            && !approvals.is_empty()
        {
            self.security.approvals_path = approvals;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: &str| Err(ConfigError::Validation(message.to_string()));

        if self.security.workspace_dir.trim().is_empty() {
            return invalid("security.workspace_dir must not be empty");
        }
        if self.security.approvals_path.trim().is_empty() {
            return invalid("security.approvals_path must not be empty");
        }
        if self.security.max_file_size == 0 {
            return invalid("security.max_file_size must be greater than 0");
        }
        if self.security.max_input_length == 0 {
            return invalid("security.max_input_length must be greater than 0");
        }
        if let Some(overlap) = self
            .security
            .allowed_commands
            .iter()
            .find(|cmd| self.security.blocked_commands.contains(cmd))
        {
            return Err(ConfigError::Validation(format!(
                "'{overlap}' is both allowed and blocked"
            )));
        }
        if self.engine.max_tool_rounds == 0 {
            return invalid("engine.max_tool_rounds must be greater than 0");
        }
        if self.engine.max_pairs == 0 {
            return invalid("engine.max_pairs must be greater than 0");
        }
        if self.http.timeout_secs == 0 {
            return invalid("http.timeout_secs must be greater than 0");
        }
        if self.http.max_attempts == 0 {
            return invalid("http.max_attempts must be greater than 0");
        }
        if self.search.max_results == 0 {
            return invalid("search.max_results must be greater than 0");
        }
        if self.rate_limit.iterations_max_calls > 0 && self.rate_limit.iterations_period_secs == 0
        {
            return invalid("rate_limit.iterations_period_secs must be greater than 0");
        }
        if self.rate_limit.web_search_period_secs == 0 {
            return invalid("rate_limit.web_search_period_secs must be greater than 0");
        }
        if self.rate_limit.iterations_period_secs > MAX_RATE_PERIOD_SECS
            || self.rate_limit.web_search_period_secs > MAX_RATE_PERIOD_SECS
        {
            return invalid("rate_limit periods must not exceed one week (604800 seconds)");
        }
        Ok(())
    }

    pub fn workspace_path(&self) -> PathBuf {
        expand(&self.security.workspace_dir)
    }

    pub fn approvals_path(&self) -> PathBuf {
        expand(&self.security.approvals_path)
    }

    pub fn sessions_path(&self) -> PathBuf {
        expand(&self.engine.sessions_dir)
    }
}

fn expand(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}
