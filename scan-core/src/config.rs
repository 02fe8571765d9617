//! Configuration loading: turns the on-disk provider config (the
//! `--client_file`, spec §6) and the provider catalog (`providers.yaml`)
//! into the typed values [`crate::provider::Provider`] and
//! [`crate::provider::catalog::ProviderCatalog`] consume.
//!
//! Grounded in `loom/src/prompts/load.rs`'s read/parse/graceful-fallback
//! chain, applied here to YAML provider configs instead of per-subsystem
//! prompt manifests: a missing catalog path falls back to the embedded
//! default catalog below the same way a missing prompt override falls
//! back to `include_str!`-embedded text (spec's ambient "tolerate
//! unknown keys / ship sane defaults" philosophy, §6 [AMBIENT]).

use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::provider::catalog::ProviderCatalog;
use crate::provider::ProviderSpec;

const DEFAULT_CATALOG_YAML: &str = include_str!("../config/providers.yaml");

/// The on-disk shape of a `--client_file`: a list of provider entries
/// under either `providers:` or `targets:` (spec §6).
#[derive(Debug, Deserialize)]
struct ProviderConfigFile {
    #[serde(default)]
    providers: Option<Vec<ProviderSpec>>,
    #[serde(default)]
    targets: Option<Vec<ProviderSpec>>,
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }
    std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Loads the list of [`ProviderSpec`] entries out of a `--client_file`
/// (YAML or JSON; YAML is a superset so one parser handles both).
pub fn load_provider_specs(path: &Path) -> Result<Vec<ProviderSpec>, ConfigError> {
    let text = read_file(path)?;
    let parsed: ProviderConfigFile =
        serde_yaml::from_str(&text).map_err(|e| ConfigError::ParseFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
    parsed
        .providers
        .or(parsed.targets)
        .ok_or(ConfigError::NoProviderList)
}

/// Loads the [`ProviderCatalog`]. `path` is an explicit catalog file
/// override; when absent (or when the caller passes `None`), the
/// embedded default catalog (OpenAI/Anthropic/Google standard-path
/// entries plus common model pricing) is used so the scanner works
/// without any external catalog asset.
pub fn load_catalog(path: Option<&Path>) -> Result<ProviderCatalog, ConfigError> {
    match path {
        Some(path) => {
            let text = read_file(path)?;
            ProviderCatalog::parse(&text).map_err(|e| ConfigError::ParseFailed {
                path: path.display().to_string(),
                message: e.to_string(),
            })
        }
        None => Ok(default_catalog()),
    }
}

/// The catalog embedded at compile time, parsed once per call. Cheap
/// enough (one small YAML document) that callers don't need to cache it
/// themselves; the orchestrator calls this once at scan startup.
pub fn default_catalog() -> ProviderCatalog {
    ProviderCatalog::parse(DEFAULT_CATALOG_YAML).expect("embedded providers.yaml must parse")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_resolves_the_built_in_types() {
        let catalog = default_catalog();
        assert!(catalog.resolve("openai").is_some());
        assert!(catalog.resolve("anthropic").is_some());
        assert!(catalog.resolve("google").is_some());
        assert!(catalog.resolve("nonexistent").is_none());
    }

    #[test]
    fn default_catalog_has_pricing_for_common_models() {
        let catalog = default_catalog();
        assert!(catalog.pricing_for_model("gpt-4o-mini").is_some());
    }

    #[test]
    fn load_catalog_with_no_path_returns_embedded_default() {
        let catalog = load_catalog(None).unwrap();
        assert!(catalog.resolve("openai").is_some());
    }

    #[test]
    fn load_catalog_missing_path_is_file_not_found() {
        let err = load_catalog(Some(Path::new("/nonexistent/catalog.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn load_provider_specs_reads_providers_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.yaml");
        std::fs::write(
            &path,
            r#"
providers:
  - id: "openai:gpt-4o-mini"
    label: "Target"
    config:
      api_key: "sk-test"
"#,
        )
        .unwrap();
        let specs = load_provider_specs(&path).unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].id, "openai:gpt-4o-mini");
        assert_eq!(specs[0].label.as_deref(), Some("Target"));
    }

    #[test]
    fn load_provider_specs_accepts_targets_key_as_alias() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.yaml");
        std::fs::write(
            &path,
            r#"
targets:
  - id: "http"
    config:
      url: "https://example.com/chat"
"#,
        )
        .unwrap();
        let specs = load_provider_specs(&path).unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].id, "http");
    }

    #[test]
    fn load_provider_specs_missing_file_errors() {
        let err = load_provider_specs(Path::new("/nonexistent/client.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn load_provider_specs_without_providers_or_targets_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.yaml");
        std::fs::write(&path, "other_key: []\n").unwrap();
        let err = load_provider_specs(&path).unwrap_err();
        assert!(matches!(err, ConfigError::NoProviderList));
    }
}
