//! Configuration for the transforming layer and logging.
//!
//! Files are TOML or YAML, selected by extension.

use crate::dao::FieldSetMap;
use crate::xform::alias::AliasMap;
use crate::xform::named::{NamedAggMap, NamedQueryMap};
use crate::{Error, Result};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Alias, field set and named query/agg tables for the transforming decorator
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TransformConfig {
    #[serde(default)]
    pub aliases: AliasMap,
    #[serde(default)]
    pub field_sets: FieldSetMap,
    #[serde(default)]
    pub named_aggs: NamedAggMap,
    #[serde(default)]
    pub named_queries: NamedQueryMap,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct QuarryConfig {
    #[serde(default)]
    pub transform: TransformConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level filter string
    /// Override with RUST_LOG env var
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "pretty" or "json"
    /// Override with LOG_FORMAT env var
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info,quarry=debug".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Toml,
    Yaml,
}

fn format_of(path: &Path) -> Result<Format> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => Ok(Format::Toml),
        Some("yaml") | Some("yml") => Ok(Format::Yaml),
        other => Err(Error::Config(format!(
            "Unsupported config extension {:?} for {}",
            other,
            path.display()
        ))),
    }
}

fn parse<T: for<'de> Deserialize<'de>>(content: &str, format: Format) -> Result<T> {
    match format {
        Format::Toml => Ok(toml::from_str(content)?),
        Format::Yaml => Ok(serde_yaml::from_str(content)?),
    }
}

fn load_file<T: for<'de> Deserialize<'de>>(path: &Path) -> anyhow::Result<T> {
    let format = format_of(path)?;
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let parsed = parse(&content, format)
        .with_context(|| format!("Failed to parse config {}", path.display()))?;
    Ok(parsed)
}

impl TransformConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        parse(content, Format::Toml)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        parse(content, Format::Yaml)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let config: Self = load_file(path)?;
        tracing::debug!(
            path = %path.display(),
            aliases = config.aliases.len(),
            field_sets = config.field_sets.len(),
            named_aggs = config.named_aggs.len(),
            named_queries = config.named_queries.len(),
            "loaded transform config"
        );
        Ok(config)
    }
}

impl QuarryConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        load_file(path)
    }

    /// Load from `path` when it exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AggKind, Query};

    #[test]
    fn test_defaults() {
        let config = QuarryConfig::default();
        assert_eq!(config.logging.level, "info,quarry=debug");
        assert_eq!(config.logging.format, "pretty");
        assert!(config.transform.aliases.is_empty());
    }

    #[test]
    fn test_transform_from_toml() {
        let config = TransformConfig::from_toml_str(
            r#"
[aliases.age]
name = "person.age"
label = "Age"

[field_sets]
basic = [{ name = "name" }, { name = "age" }]

[named_aggs.status]
key = "status"
type = "terms"
field = "status"
size = 5

[named_queries.adults]
type = "range"
field = "age"
gte = 18
"#,
        )
        .unwrap();

        assert_eq!(config.aliases["age"].name.as_deref(), Some("person.age"));
        assert_eq!(config.field_sets["basic"].len(), 2);
        assert!(matches!(
            config.named_aggs["status"].kind,
            AggKind::Terms { size: Some(5), .. }
        ));
        assert!(matches!(config.named_queries["adults"], Query::Range(_)));
    }

    #[test]
    fn test_transform_from_yaml() {
        let config = TransformConfig::from_yaml_str(
            r#"
aliases:
  email:
    name: contact.email
named_aggs:
  has_email:
    key: has_email
    type: missing
    field: email
"#,
        )
        .unwrap();
        assert_eq!(config.aliases["email"].name.as_deref(), Some("contact.email"));
        assert_eq!(config.named_aggs["has_email"].field(), Some("email"));
    }

    #[test]
    fn test_unknown_extension() {
        let err = format_of(Path::new("quarry.ini")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
