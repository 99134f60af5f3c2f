//! Task configuration read from the environment.
//!
//! The orchestrator passes everything a task needs through environment
//! variables. Missing required variables fail the task before any cloud call
//! is made.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::review::flow_definition_name;
use crate::storage::ObjectUrl;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Log verbosity accepted in `LOG_LEVEL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[value(rename_all = "UPPER")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    #[value(alias = "WARN")]
    Warning,
    Error,
}

impl LogLevel {
    /// Directive for `tracing_subscriber::EnvFilter`.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARNING" | "WARN" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            other => Err(ConfigError::InvalidValue {
                key: "LOG_LEVEL".to_string(),
                message: format!("expected DEBUG, INFO, WARNING or ERROR, got '{}'", other),
            }),
        }
    }
}

/// Settings shared by the dispatch and merge tasks.
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Execution id with the colon-delimited prefix stripped.
    pub execution_id: String,
    pub execution_name: String,
    pub label_attribute_name: String,
    pub input_manifest: ObjectUrl,
    pub staging_bucket_name: String,
    pub sns_topic_arn: String,
}

impl ExecutionConfig {
    /// Reads the shared settings through `lookup`.
    ///
    /// # Environment Variables
    ///
    /// - `EXECUTION_ID`: raw execution identifier; only the part after the
    ///   last `:` is kept
    /// - `EXECUTION_NAME`: human-readable execution name used in notifications
    /// - `LABEL_ATTRIBUTE_NAME`: manifest attribute holding the annotations
    /// - `INPUT_MANIFEST`: `s3://` URL of the input manifest
    /// - `STAGING_BUCKET_NAME`: bucket receiving review outputs
    /// - `SNS_TOPIC_ARN`: notification topic
    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            execution_id: parse_execution_id(&require(lookup, "EXECUTION_ID")?)?,
            execution_name: require(lookup, "EXECUTION_NAME")?,
            label_attribute_name: require(lookup, "LABEL_ATTRIBUTE_NAME")?,
            input_manifest: parse_object_url(&require(lookup, "INPUT_MANIFEST")?, "INPUT_MANIFEST")?,
            staging_bucket_name: require(lookup, "STAGING_BUCKET_NAME")?,
            sns_topic_arn: require(lookup, "SNS_TOPIC_ARN")?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.execution_id.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "execution_id cannot be empty".to_string(),
            ));
        }

        if self.label_attribute_name.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "label_attribute_name cannot be empty".to_string(),
            ));
        }

        if self.staging_bucket_name.contains('/') {
            return Err(ConfigError::ValidationFailed(
                "staging_bucket_name must be a bare bucket name".to_string(),
            ));
        }

        Ok(())
    }

    /// Name of the flow definition owned by this execution.
    pub fn flow_definition_name(&self) -> String {
        flow_definition_name(&self.execution_id)
    }

    /// Location the review service writes review outputs to.
    pub fn review_output_path(&self) -> String {
        format!(
            "s3://{}/reviewed/{}",
            self.staging_bucket_name, self.execution_id
        )
    }

    /// Prefix under which this execution's review outputs are listed.
    pub fn review_output_prefix(&self) -> ObjectUrl {
        ObjectUrl::new(
            &self.staging_bucket_name,
            format!("reviewed/{}/", self.execution_id),
        )
    }
}

/// How the flow definition activation is awaited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            timeout: Duration::from_secs(300),
        }
    }
}

impl PollSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "poll interval must be greater than 0".to_string(),
            ));
        }

        if self.timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "poll timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration of the review dispatch task.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub execution: ExecutionConfig,
    pub work_team_arn: String,
    pub work_template_arn: String,
    pub review_task_role: String,
    pub staging_table_name: String,
    pub poll: PollSettings,
}

impl DispatchConfig {
    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// Everything [`ExecutionConfig::from_lookup`] reads, plus:
    ///
    /// - `WORK_TEAM_ARN`: reviewer work team
    /// - `WORK_TEMPLATE_ARN`: human task UI
    /// - `REVIEW_TASK_ROLE`: role assumed by the review service
    /// - `STAGING_TABLE_NAME`: table holding pending markers
    /// - `FLOW_POLL_INTERVAL_MS`: activation poll interval (default: 100)
    /// - `FLOW_ACTIVATION_TIMEOUT_SECS`: activation deadline (default: 300)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or have invalid values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut poll = PollSettings::default();
        if let Some(val) = lookup("FLOW_POLL_INTERVAL_MS") {
            poll.interval = Duration::from_millis(parse_env_value(&val, "FLOW_POLL_INTERVAL_MS")?);
        }
        if let Some(val) = lookup("FLOW_ACTIVATION_TIMEOUT_SECS") {
            poll.timeout =
                Duration::from_secs(parse_env_value(&val, "FLOW_ACTIVATION_TIMEOUT_SECS")?);
        }

        let config = Self {
            execution: ExecutionConfig::from_lookup(lookup)?,
            work_team_arn: require(lookup, "WORK_TEAM_ARN")?,
            work_template_arn: require(lookup, "WORK_TEMPLATE_ARN")?,
            review_task_role: require(lookup, "REVIEW_TASK_ROLE")?,
            staging_table_name: require(lookup, "STAGING_TABLE_NAME")?,
            poll,
        };
        config.poll.validate()?;
        Ok(config)
    }

    /// Builder method to set the activation poll settings.
    pub fn with_poll(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }
}

/// Configuration of the result merge task.
#[derive(Debug, Clone)]
pub struct MergeConfig {
    pub execution: ExecutionConfig,
    pub output_manifest: ObjectUrl,
}

impl MergeConfig {
    /// Creates configuration from environment variables.
    ///
    /// Reads everything [`ExecutionConfig::from_lookup`] reads, plus
    /// `OUTPUT_MANIFEST` (`s3://` URL of the merged manifest).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            execution: ExecutionConfig::from_lookup(lookup)?,
            output_manifest: parse_object_url(
                &require(lookup, "OUTPUT_MANIFEST")?,
                "OUTPUT_MANIFEST",
            )?,
        })
    }
}

/// Configuration of the review completion callback.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub staging_table_name: String,
}

impl CompletionConfig {
    /// Creates configuration from environment variables (`STAGING_TABLE_NAME`).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            staging_table_name: require(lookup, "STAGING_TABLE_NAME")?,
        })
    }
}

/// Keeps only the part of a raw execution identifier after its last `:`.
pub fn parse_execution_id(raw: &str) -> Result<String, ConfigError> {
    let id = raw.rsplit(':').next().unwrap_or(raw).trim();
    if id.is_empty() {
        return Err(ConfigError::InvalidValue {
            key: "EXECUTION_ID".to_string(),
            message: format!("no identifier after the last ':' in '{}'", raw),
        });
    }
    Ok(id.to_string())
}

/// Reads a required variable; empty values count as missing.
fn require<F>(lookup: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Parse an environment variable value into a type.
fn parse_env_value<T: FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

fn parse_object_url(value: &str, key: &str) -> Result<ObjectUrl, ConfigError> {
    ObjectUrl::parse(value).map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}
