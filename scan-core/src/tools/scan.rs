//! `scan` tool: probes a provider's configuration endpoints looking for
//! accidentally-exposed secrets.
//!
//! Grounded in
//! `original_source/agent-scan/tools/dialogue/scan.py`'s `AgentScanner`:
//! endpoints are configuration-driven (`ProviderCatalog::scan_endpoints`,
//! spec §6), `{{bot_id}}` is resolved the same way from a Coze-style
//! `provider:bot_id` id, and the same `SENSITIVE_PATTERNS` table is used
//! to flag likely-sensitive response content.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::provider::catalog::AuthType;
use crate::provider::{CozeRegion, Provider};

use super::{Tool, ToolContext, ToolError, ToolSpec};

const SENSITIVE_PATTERNS: &[(&str, &str)] = &[
    ("api_key", "API Key Exposure"),
    ("api_secret", "API Secret Exposure"),
    ("password", "Password Exposure"),
    ("token", "Token Exposure"),
    ("secret", "Secret Exposure"),
    ("private_key", "Private Key Exposure"),
    ("credential", "Credential Exposure"),
    ("database", "Database Configuration"),
    ("connection_string", "Connection String"),
    ("internal_", "Internal Configuration"),
    ("debug", "Debug Information"),
];

pub struct ScanTool;

#[async_trait]
impl Tool for ScanTool {
    fn name(&self) -> &str {
        "scan"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "scan",
            "Probe the target provider's configuration endpoints (from providers.yaml) for exposed secrets.",
        )
        .with_param("endpoints", "string", false)
        .needs_context()
    }

    async fn call(&self, args: Value, ctx: Option<&ToolContext>) -> Result<Value, ToolError> {
        let ctx = ctx.ok_or_else(|| ToolError::Failed("scan requires a ToolContext".to_string()))?;
        let override_endpoints: Option<Vec<String>> = args.get("endpoints").and_then(Value::as_str).map(|s| {
            s.split(',')
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty())
                .collect()
        });

        Ok(run_scan(ctx, override_endpoints).await)
    }
}

fn provider_type(provider: &Provider) -> String {
    match provider {
        Provider::Http { .. } => "http".to_string(),
        Provider::Dify { .. } => "dify".to_string(),
        Provider::Coze { .. } => "coze".to_string(),
        Provider::Standard { spec, .. } => spec.id.to_lowercase(),
        Provider::LocalValidate { spec, .. } => spec.id.to_lowercase(),
    }
}

fn base_url(provider: &Provider) -> String {
    let url = match provider {
        Provider::Http { spec } => spec.config.url.clone(),
        Provider::Dify { spec, .. } => spec.config.api_base_url.clone(),
        Provider::Coze { spec, region } => spec.config.api_base_url.clone().or_else(|| {
            Some(
                match region {
                    CozeRegion::Cn => "https://api.coze.cn",
                    CozeRegion::Com => "https://api.coze.com",
                }
                .to_string(),
            )
        }),
        Provider::Standard { spec, entry, .. } => spec.config.api_base_url.clone().or_else(|| entry.base_url.clone()),
        Provider::LocalValidate { .. } => None,
    };
    url.unwrap_or_default().trim_end_matches('/').to_string()
}

fn bot_id(provider: &Provider) -> Option<String> {
    let spec = match provider {
        Provider::Coze { spec, .. } | Provider::Dify { spec, .. } | Provider::Standard { spec, .. } => spec,
        _ => return None,
    };
    spec.config
        .extra
        .bot_id
        .clone()
        .or_else(|| spec.id.split_once(':').map(|(_, id)| id.to_string()))
}

/// `scan_endpoints` from the catalog entry, with `{{bot_id}}` resolved.
/// Endpoints that need a `bot_id` we don't have are dropped.
fn configured_endpoints(provider: &Provider) -> Vec<String> {
    let raw = match provider {
        Provider::Standard { entry, .. } => entry.scan_endpoints.clone(),
        _ => Vec::new(),
    };
    let id = bot_id(provider);
    raw.into_iter()
        .filter_map(|endpoint| {
            if endpoint.contains("{{bot_id}}") {
                id.as_ref().map(|id| endpoint.replace("{{bot_id}}", id))
            } else {
                Some(endpoint)
            }
        })
        .collect()
}

async fn run_scan(ctx: &ToolContext, override_endpoints: Option<Vec<String>>) -> Value {
    let provider_type = provider_type(&ctx.provider);
    let base_url = base_url(&ctx.provider);

    let endpoints = override_endpoints.unwrap_or_else(|| configured_endpoints(&ctx.provider));

    if endpoints.is_empty() {
        return json!({
            "provider_type": provider_type,
            "base_url": base_url,
            "total_endpoints": 0,
            "successful_scans": 0,
            "failed_scans": 0,
            "endpoint_results": [],
            "summary": format!("No scan_endpoints configured in providers.yaml for provider type: {provider_type}"),
        });
    }

    let mut endpoint_results = Vec::with_capacity(endpoints.len());
    let mut successful = 0usize;
    let mut failed = 0usize;

    for endpoint in &endpoints {
        let url = format!("{base_url}{endpoint}");
        let (ok, error, findings) = scan_endpoint(ctx, &url).await;
        if ok {
            successful += 1;
        } else {
            failed += 1;
        }
        endpoint_results.push(json!({
            "endpoint": endpoint,
            "success": ok,
            "error": error,
            "sensitive_findings": findings,
        }));
    }

    json!({
        "provider_type": provider_type,
        "base_url": base_url,
        "total_endpoints": endpoints.len(),
        "successful_scans": successful,
        "failed_scans": failed,
        "endpoint_results": endpoint_results,
        "summary": format!("Scanned {} endpoints: {successful} successful, {failed} failed", endpoints.len()),
    })
}

fn auth_header(provider: &Provider) -> Option<(&'static str, String)> {
    let Provider::Standard { spec, entry, .. } = provider else {
        return None;
    };
    let key = spec.config.api_key.clone()?;
    match entry.auth_type {
        AuthType::Bearer => Some(("Authorization", format!("Bearer {key}"))),
        AuthType::XApiKey => Some(("X-Api-Key", key)),
        AuthType::Token => Some(("Authorization", format!("Token {key}"))),
        _ => None,
    }
}

/// `(success, error, sensitive_findings)` for one endpoint probe.
async fn scan_endpoint(ctx: &ToolContext, url: &str) -> (bool, Option<String>, Vec<String>) {
    let client = reqwest::Client::new();
    let mut request = client.get(url);
    if let Some((name, value)) = auth_header(&ctx.provider) {
        request = request.header(name, value);
    }

    match request.send().await {
        Ok(response) => {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            if status.is_success() {
                (true, None, detect_sensitive_info(&body))
            } else {
                (false, Some(format!("status {}", status.as_u16())), Vec::new())
            }
        }
        Err(err) => (false, Some(err.to_string()), Vec::new()),
    }
}

fn detect_sensitive_info(body: &str) -> Vec<String> {
    let lower = body.to_lowercase();
    let mut findings: Vec<String> = SENSITIVE_PATTERNS
        .iter()
        .filter(|(pattern, _)| lower.contains(pattern))
        .map(|(_, label)| label.to_string())
        .collect();
    findings.sort();
    findings.dedup();
    findings
}
