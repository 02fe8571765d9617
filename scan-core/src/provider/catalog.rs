//! The provider catalog: a static, process-wide mapping from provider
//! `type` to wire-protocol details, loaded once from `providers.yaml`
//! (see spec §6). Read-only after construction; no synchronization needed.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

/// How credentials are attached to a standard-path request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    Bearer,
    XApiKey,
    Token,
    QueryParam,
    None,
}

impl Default for AuthType {
    fn default() -> Self {
        AuthType::None
    }
}

/// Per-type wire details, keyed by `type` in the catalog's `providers:` map.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogProviderEntry {
    pub endpoint: String,
    #[serde(default)]
    pub env_keys: Vec<String>,
    #[serde(default)]
    pub base_url_env: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub default_model: Option<String>,
    #[serde(default)]
    pub scan_endpoints: Vec<String>,
}

/// One `api_format` group in the catalog: shared request/auth shape for
/// every `type` nested under `providers:`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiFormatGroup {
    #[serde(default)]
    pub api_format: String,
    #[serde(default)]
    pub request_body_template: Option<Value>,
    #[serde(default)]
    pub response_path: Option<String>,
    #[serde(default)]
    pub auth_type: AuthType,
    #[serde(default)]
    pub auth_param_name: Option<String>,
    #[serde(default)]
    pub extra_headers: HashMap<String, String>,
    #[serde(default)]
    pub providers: HashMap<String, CatalogProviderEntry>,
}

/// A fully resolved catalog entry for one provider `type`: the group's
/// shared fields flattened together with the type's own endpoint/env/etc.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub request_body_template: Option<Value>,
    pub response_path: Option<String>,
    pub auth_type: AuthType,
    pub auth_param_name: Option<String>,
    pub extra_headers: HashMap<String, String>,
    pub endpoint: String,
    pub env_keys: Vec<String>,
    pub base_url_env: Option<String>,
    pub base_url: Option<String>,
    pub default_model: Option<String>,
    pub scan_endpoints: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Pricing {
    pub input: f64,
    pub output: f64,
}

/// Static mapping loaded once from `providers.yaml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderCatalog {
    #[serde(flatten)]
    groups: HashMap<String, ApiFormatGroup>,
    #[serde(default)]
    pricing: HashMap<String, Pricing>,
}

impl ProviderCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn parse(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Resolves a provider `type` (e.g. `"openai"`) to its flattened
    /// catalog entry, searching every `api_format` group's `providers:` map.
    pub fn resolve(&self, type_name: &str) -> Option<CatalogEntry> {
        for group in self.groups.values() {
            if group.api_format == "pricing" {
                continue;
            }
            if let Some(p) = group.providers.get(type_name) {
                return Some(CatalogEntry {
                    request_body_template: group.request_body_template.clone(),
                    response_path: group.response_path.clone(),
                    auth_type: group.auth_type,
                    auth_param_name: group.auth_param_name.clone(),
                    extra_headers: group.extra_headers.clone(),
                    endpoint: p.endpoint.clone(),
                    env_keys: p.env_keys.clone(),
                    base_url_env: p.base_url_env.clone(),
                    base_url: p.base_url.clone(),
                    default_model: p.default_model.clone(),
                    scan_endpoints: p.scan_endpoints.clone(),
                });
            }
        }
        None
    }

    /// Pricing per 1K tokens for the longest matching model-prefix, case-insensitive.
    pub fn pricing_for_model(&self, model: &str) -> Option<&Pricing> {
        let model_lower = model.to_lowercase();
        self.pricing
            .iter()
            .filter(|(prefix, _)| model_lower.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, p)| p)
    }
}
