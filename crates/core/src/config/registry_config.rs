use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::{validate_log_level, validate_tag, ConfigError, ConfigSource};
use crate::container::identity::{ComponentId, EnvironmentTag};

pub const ENV_ENVIRONMENT_TAGS: &str = "ANCHORAGE_ENVIRONMENT_TAGS";
pub const ENV_REQUEST_ANCHOR: &str = "ANCHORAGE_REQUEST_ANCHOR";
pub const ENV_LOG_LEVEL: &str = "ANCHORAGE_LOG_LEVEL";

/// Loading and validation contract shared by configuration types
pub trait ConfigLoader: Sized {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self, ConfigError>;

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError>;

    /// Get configuration source information for debugging
    fn config_sources(&self) -> HashMap<String, ConfigSource>;
}

/// Settings consumed by the registration driver and the injector.
///
/// `environment_tags` decide which restricted components are eligible,
/// `request_anchor` is the anchor type used for request-scoped singletons.
/// Each field remembers where it was last set; equality ignores that.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub environment_tags: BTreeSet<EnvironmentTag>,
    pub request_anchor: ComponentId,
    pub log_level: String,
    #[serde(skip)]
    origins: BTreeMap<&'static str, ConfigSource>,
}

/// YAML document shape, keeping track of which keys were present
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    environment_tags: Option<BTreeSet<EnvironmentTag>>,
    request_anchor: Option<ComponentId>,
    log_level: Option<String>,
}

impl RegistryConfig {
    pub fn new() -> Self {
        Self {
            environment_tags: BTreeSet::new(),
            request_anchor: ComponentId::request_scope(),
            log_level: "info".to_string(),
            origins: BTreeMap::new(),
        }
    }

    /// Configuration with the given environment tags and defaults otherwise
    pub fn with_tags<I, T>(tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<EnvironmentTag>,
    {
        let mut config = Self::new();
        config.set_environment_tags(tags);
        config
    }

    /// Replace the environment tags from code
    pub fn set_environment_tags<I, T>(&mut self, tags: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<EnvironmentTag>,
    {
        self.environment_tags = tags.into_iter().map(Into::into).collect();
        self.origins.insert("environment_tags", ConfigSource::Programmatic);
    }

    /// Parse configuration from a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Self::from_yaml_labeled(yaml, "inline YAML")
    }

    /// Read configuration from a YAML file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_labeled(&content, &path.display().to_string())
    }

    fn from_yaml_labeled(yaml: &str, label: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = serde_yaml::from_str(yaml)?;
        let mut config = Self::new();
        let origin = ConfigSource::File(label.to_string());

        if let Some(tags) = file.environment_tags {
            config.environment_tags = tags;
            config.origins.insert("environment_tags", origin.clone());
        }
        if let Some(anchor) = file.request_anchor {
            config.request_anchor = anchor;
            config.origins.insert("request_anchor", origin.clone());
        }
        if let Some(level) = file.log_level {
            config.log_level = level.to_ascii_lowercase();
            config.origins.insert("log_level", origin);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn has_tag(&self, tag: &EnvironmentTag) -> bool {
        self.environment_tags.contains(tag)
    }
}

impl PartialEq for RegistryConfig {
    fn eq(&self, other: &Self) -> bool {
        self.environment_tags == other.environment_tags
            && self.request_anchor == other.request_anchor
            && self.log_level == other.log_level
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Value of an environment variable, `None` when unset
fn read_env(name: &str) -> Result<Option<String>, ConfigError> {
    match env::var(name) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => {
            Err(ConfigError::environment_error(format!("{} is not valid unicode", name)))
        }
    }
}

/// Split a comma separated tag list, ignoring blanks
fn parse_tags(raw: &str) -> Result<BTreeSet<EnvironmentTag>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(|tag| {
            validate_tag(tag)?;
            Ok(EnvironmentTag::new(tag))
        })
        .collect()
}

impl ConfigLoader for RegistryConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new();

        if let Some(raw) = read_env(ENV_ENVIRONMENT_TAGS)? {
            config.environment_tags = parse_tags(&raw)?;
            config
                .origins
                .insert("environment_tags", ConfigSource::EnvVar(ENV_ENVIRONMENT_TAGS.to_string()));
        }

        if let Some(anchor) = read_env(ENV_REQUEST_ANCHOR)? {
            config.request_anchor = ComponentId::new(anchor);
            config
                .origins
                .insert("request_anchor", ConfigSource::EnvVar(ENV_REQUEST_ANCHOR.to_string()));
        }

        if let Some(level) = read_env(ENV_LOG_LEVEL)? {
            config.log_level = level.to_ascii_lowercase();
            config
                .origins
                .insert("log_level", ConfigSource::EnvVar(ENV_LOG_LEVEL.to_string()));
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for tag in &self.environment_tags {
            validate_tag(tag.as_str())?;
        }

        if self.request_anchor.as_str().trim().is_empty() {
            return Err(ConfigError::invalid_value(
                "request_anchor",
                self.request_anchor.as_str(),
                "a non-empty component identity",
            ));
        }

        validate_log_level(&self.log_level)
    }

    fn config_sources(&self) -> HashMap<String, ConfigSource> {
        let defaults = [
            ("environment_tags", "no tags".to_string()),
            ("request_anchor", ComponentId::request_scope().to_string()),
            ("log_level", "info".to_string()),
        ];

        defaults
            .into_iter()
            .map(|(field, default)| {
                let source = self
                    .origins
                    .get(field)
                    .cloned()
                    .unwrap_or(ConfigSource::Default(default));
                (field.to_string(), source)
            })
            .collect()
    }
}
