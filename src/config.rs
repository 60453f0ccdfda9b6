//! Configuration for the SQL agent
//! Row cap, retry ceiling, collaborator timeouts, dataset location and logging

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// SQL validator settings
    pub validator: ValidatorConfig,
    /// Orchestration loop settings
    pub agent: LoopConfig,
    /// Location of the analytical view
    pub dataset: DatasetConfig,
    /// Question sanitisation
    pub input: InputConfig,
    /// Logging output
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Row cap appended to queries without LIMIT
    pub max_rows: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// SQL generation attempts per turn
    pub max_attempts: u32,
    /// Timeout for one SQL generation call in seconds
    pub generation_timeout_secs: u64,
    /// Timeout for query execution in seconds
    pub execution_timeout_secs: u64,
    /// Timeout for the answer synthesis call in seconds
    pub answer_timeout_secs: u64,
    /// Timeout for schema loading and example retrieval in seconds
    pub lookup_timeout_secs: u64,
    /// Number of similar examples handed to the generator
    pub examples_top_k: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Cloud project that owns the dataset
    pub project_id: String,
    /// Dataset name
    pub dataset: String,
    /// Analytical view queried by the agent
    pub view: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Questions longer than this are truncated
    pub max_question_chars: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_rows: crate::validation::DEFAULT_MAX_ROWS,
        }
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            generation_timeout_secs: 60,
            execution_timeout_secs: 120,
            answer_timeout_secs: 60,
            lookup_timeout_secs: 30,
            examples_top_k: 3,
        }
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            project_id: "saasimpacto".to_string(),
            dataset: "antaq".to_string(),
            view: "v_carga_metodologia_oficial".to_string(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            max_question_chars: 10_000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "antaq_sql_agent=info".to_string(),
            json: false,
        }
    }
}

impl AgentConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AgentConfig = toml::from_str(content).context("Invalid TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables and defaults
    pub fn from_env() -> Result<Self> {
        let mut config = AgentConfig::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Override fields from environment variables
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(max_rows) = std::env::var("ANTAQ_MAX_ROWS") {
            self.validator.max_rows = max_rows.parse().context("Invalid ANTAQ_MAX_ROWS")?;
        }

        if let Ok(max_attempts) = std::env::var("ANTAQ_MAX_ATTEMPTS") {
            self.agent.max_attempts = max_attempts
                .parse()
                .context("Invalid ANTAQ_MAX_ATTEMPTS")?;
        }

        if let Ok(project) = std::env::var("GOOGLE_CLOUD_PROJECT") {
            self.dataset.project_id = project;
        }

        if let Ok(dataset) = std::env::var("ANTAQ_DATASET") {
            self.dataset.dataset = dataset;
        }

        if let Ok(view) = std::env::var("ANTAQ_VIEW") {
            self.dataset.view = view;
        }

        if let Ok(filter) = std::env::var("RUST_LOG") {
            self.logging.filter = filter;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.validator.max_rows == 0 {
            return Err(anyhow::anyhow!("validator.max_rows cannot be 0"));
        }

        if self.agent.max_attempts == 0 {
            return Err(anyhow::anyhow!("agent.max_attempts cannot be 0"));
        }

        let timeouts = [
            ("agent.generation_timeout_secs", self.agent.generation_timeout_secs),
            ("agent.execution_timeout_secs", self.agent.execution_timeout_secs),
            ("agent.answer_timeout_secs", self.agent.answer_timeout_secs),
            ("agent.lookup_timeout_secs", self.agent.lookup_timeout_secs),
        ];
        for (name, secs) in timeouts {
            if secs == 0 {
                return Err(anyhow::anyhow!("{} cannot be 0", name));
            }
        }

        if self.dataset.dataset.is_empty() || self.dataset.view.is_empty() {
            return Err(anyhow::anyhow!("dataset.dataset and dataset.view cannot be empty"));
        }

        if self.input.max_question_chars == 0 {
            return Err(anyhow::anyhow!("input.max_question_chars cannot be 0"));
        }

        Ok(())
    }
}

impl LoopConfig {
    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    pub fn execution_timeout(&self) -> Duration {
        Duration::from_secs(self.execution_timeout_secs)
    }

    pub fn answer_timeout(&self) -> Duration {
        Duration::from_secs(self.answer_timeout_secs)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }
}

impl DatasetConfig {
    /// Backtick-quoted `project.dataset.view`
    pub fn fully_qualified_view(&self) -> String {
        if self.project_id.is_empty() {
            format!("`{}.{}`", self.dataset, self.view)
        } else {
            format!("`{}.{}.{}`", self.project_id, self.dataset, self.view)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AgentConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.validator.max_rows, 1000);
        assert_eq!(config.agent.max_attempts, 3);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AgentConfig::from_toml_str(
            r#"
            [validator]
            max_rows = 200

            [agent]
            max_attempts = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.validator.max_rows, 200);
        assert_eq!(config.agent.max_attempts, 5);
        assert_eq!(config.agent.execution_timeout_secs, 120);
        assert_eq!(config.dataset.view, "v_carga_metodologia_oficial");
    }

    #[test]
    fn test_zero_values_rejected() {
        assert!(AgentConfig::from_toml_str("[validator]\nmax_rows = 0").is_err());
        assert!(AgentConfig::from_toml_str("[agent]\nmax_attempts = 0").is_err());
        assert!(AgentConfig::from_toml_str("[agent]\nexecution_timeout_secs = 0").is_err());
    }

    #[test]
    fn test_fully_qualified_view() {
        let mut dataset = DatasetConfig::default();
        assert_eq!(
            dataset.fully_qualified_view(),
            "`saasimpacto.antaq.v_carga_metodologia_oficial`"
        );
        dataset.project_id.clear();
        assert_eq!(dataset.fully_qualified_view(), "`antaq.v_carga_metodologia_oficial`");
    }
}
