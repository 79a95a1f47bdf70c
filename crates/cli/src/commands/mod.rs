pub mod bindings;
pub mod check;
pub mod known_types;
pub mod lists;

use std::path::Path;

use anchorage_core::container::EnvironmentTag;
use anchorage_core::{ConfigLoader, Manifest, RegistrationDriver, RegistrationSummary, RegistryConfig};
use anyhow::Context;

/// A manifest after registration ran against it
pub struct Workspace {
    pub manifest: Manifest,
    pub driver: RegistrationDriver,
    pub summary: RegistrationSummary,
}

impl Workspace {
    /// Resolve configuration from a file or the environment, then apply `--tag` overrides
    pub fn load_config(path: Option<&Path>, tags: &[String]) -> anyhow::Result<RegistryConfig> {
        let mut config = match path {
            Some(path) => RegistryConfig::from_path(path)
                .with_context(|| format!("Failed to read {}", path.display()))?,
            None => RegistryConfig::from_env()?,
        };

        if !tags.is_empty() {
            config.set_environment_tags(tags.iter().map(EnvironmentTag::new));
        }

        config.validate()?;
        Ok(config)
    }

    pub fn open(path: &Path, config: RegistryConfig) -> anyhow::Result<Self> {
        let manifest = Manifest::from_path(path)
            .with_context(|| format!("Failed to load manifest {}", path.display()))?;
        let graph = manifest
            .type_graph()
            .context("Manifest type section is invalid")?;
        let descriptors = manifest
            .descriptors()
            .context("Manifest component section is invalid")?;

        let mut driver = RegistrationDriver::new(graph, config).context("Type hierarchy is invalid")?;
        let summary = driver
            .process(descriptors)
            .context("Registration failed")?;

        Ok(Self {
            manifest,
            driver,
            summary,
        })
    }
}
