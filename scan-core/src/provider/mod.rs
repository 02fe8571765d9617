//! C1 — ProviderAdapter: sends prompts to the target agent under test and
//! normalizes heterogeneous wire protocols into one [`ProviderResult`].
//!
//! Routing is a tagged sum type built once when a [`ProviderSpec`] is
//! loaded (see [`Provider::build`]), per the redesign note in spec §9:
//! the source routes by inspecting `provider.id` prefixes on every call,
//! which this replaces with a single `match` over [`Provider`].

pub mod catalog;
pub mod extract;
pub mod sse;

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use catalog::{AuthType, CatalogEntry, ProviderCatalog};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Extra per-provider fields used by Dify/Coze and general HTTP bodies.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProviderExtra {
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub inputs: HashMap<String, Value>,
}

/// The `config` record nested under a provider entry (spec §3).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u64>,
    #[serde(default)]
    pub transform_response: Option<String>,
    #[serde(default)]
    pub extra: ProviderExtra,
}

/// Raw, as-loaded provider entry: `{id, label, delay_ms, config}`.
/// Immutable once loaded; [`Provider::build`] turns it into a routed
/// [`Provider`].
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderSpec {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default, rename = "delay")]
    pub delay_ms: Option<u64>,
    #[serde(default)]
    pub config: ProviderConfig,
}

/// Routing outcome, resolved once at load time (spec §9's tagged sum type).
#[derive(Debug, Clone)]
pub enum Provider {
    Http {
        spec: ProviderSpec,
    },
    Dify {
        spec: ProviderSpec,
        workflow: bool,
    },
    Coze {
        spec: ProviderSpec,
        region: CozeRegion,
    },
    Standard {
        spec: ProviderSpec,
        entry: CatalogEntry,
        model: String,
    },
    LocalValidate {
        spec: ProviderSpec,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CozeRegion {
    Cn,
    Com,
}

impl Provider {
    /// Routes a [`ProviderSpec`] by lowercased `id`, consulting the
    /// catalog for anything that isn't an explicit `http`/`dify`/`coze`
    /// prefix. Mirrors spec §4.1's routing precedence exactly.
    pub fn build(spec: ProviderSpec, catalog: &ProviderCatalog) -> Provider {
        let lower = spec.id.to_lowercase();

        if lower.starts_with("http") || (spec.config.url.is_some() && !has_builtin_type(&lower)) {
            return Provider::Http { spec };
        }
        if lower.starts_with("dify") {
            let workflow = lower.contains("workflow");
            return Provider::Dify { spec, workflow };
        }
        if lower.starts_with("coze") {
            let region = if lower.contains("coze-cn") {
                CozeRegion::Cn
            } else {
                CozeRegion::Com
            };
            return Provider::Coze { spec, region };
        }

        let type_name = lower.split(':').next().unwrap_or(&lower).to_string();
        if let Some(entry) = catalog.resolve(&type_name) {
            let model = resolve_model(&spec.id, &spec.config, &entry);
            return Provider::Standard { spec, entry, model };
        }

        Provider::LocalValidate {
            spec,
            reason: format!("unknown provider type '{type_name}'"),
        }
    }

    pub fn spec(&self) -> &ProviderSpec {
        match self {
            Provider::Http { spec }
            | Provider::Dify { spec, .. }
            | Provider::Coze { spec, .. }
            | Provider::Standard { spec, .. }
            | Provider::LocalValidate { spec, .. } => spec,
        }
    }
}

fn has_builtin_type(lower_id: &str) -> bool {
    lower_id.starts_with("dify") || lower_id.starts_with("coze")
}

/// Resolves the effective model name: substring after the first `:` in
/// `id`, with reserved prefixes stripped, else the catalog default.
fn resolve_model(id: &str, config: &ProviderConfig, entry: &CatalogEntry) -> String {
    if let Some(config_model) = &config.model {
        return config_model.clone();
    }
    if let Some((_, rest)) = id.split_once(':') {
        let mut model = rest;
        for reserved in ["messages:", "chat:", "completion:"] {
            if let Some(stripped) = model.strip_prefix(reserved) {
                model = stripped;
            }
        }
        if !model.is_empty() {
            return model.to_string();
        }
    }
    entry.default_model.clone().unwrap_or_default()
}

/// The body of a [`ProviderResult`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProviderResponse {
    pub raw: Value,
    pub output: Option<String>,
    pub error: Option<String>,
    pub session_id: Option<String>,
    pub headers: HashMap<String, String>,
    pub token_usage: Option<Value>,
    pub cost: Option<f64>,
    pub metadata: HashMap<String, Value>,
}

/// The adapter's contract: one call in, one result out, never an `Err`.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderResult {
    pub success: bool,
    pub message: String,
    pub response: ProviderResponse,
}

impl ProviderResult {
    fn failure(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            success: false,
            message: message.clone(),
            response: ProviderResponse {
                error: Some(message),
                ..Default::default()
            },
        }
    }

    fn success(output: String, raw: Value) -> Self {
        Self {
            success: true,
            message: "ok".to_string(),
            response: ProviderResponse {
                raw,
                output: Some(output),
                ..Default::default()
            },
        }
    }
}

/// Sends prompts to a [`Provider`] and normalizes the response.
///
/// Owns a single long-lived [`reqwest::Client`] (connection pooling for
/// TLS/keep-alive), per spec Design Notes §9 — constructed once by the
/// orchestrator and shared across every `BaseAgent`/worker.
pub struct ProviderAdapter {
    client: reqwest::Client,
    catalog: ProviderCatalog,
}

impl ProviderAdapter {
    pub fn new(client: reqwest::Client, catalog: ProviderCatalog) -> Self {
        Self { client, catalog }
    }

    pub fn with_default_client(catalog: ProviderCatalog) -> Self {
        Self::new(reqwest::Client::new(), catalog)
    }

    /// `call(provider, prompt) -> ProviderResult`. Pure from the caller's
    /// point of view: one network exchange plus, on success, the
    /// configured post-call cooldown.
    pub async fn call(&self, provider: &Provider, prompt: &str) -> ProviderResult {
        let mut result = match provider {
            Provider::LocalValidate { reason, .. } => {
                ProviderResult::failure(format!("provider not routable: {reason}"))
            }
            Provider::Http { spec } => self.call_http(spec, prompt).await,
            Provider::Dify { spec, workflow } => self.call_dify(spec, prompt, *workflow).await,
            Provider::Coze { spec, region } => self.call_coze(spec, prompt, *region).await,
            Provider::Standard { spec, entry, model } => {
                self.call_standard(spec, entry, model, prompt).await
            }
        };

        if result.success {
            self.apply_cost(provider, &mut result);
            if let Some(delay) = provider.spec().delay_ms {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }
        result
    }

    fn apply_cost(&self, provider: &Provider, result: &mut ProviderResult) {
        let model = match provider {
            Provider::Standard { model, .. } => model.clone(),
            _ => return,
        };
        let Some(usage) = result.response.token_usage.clone() else {
            return;
        };
        let Some(pricing) = self.catalog.pricing_for_model(&model) else {
            return;
        };
        let prompt_tokens = usage
            .get("prompt_tokens")
            .or_else(|| usage.get("input_tokens"))
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        let completion_tokens = usage
            .get("completion_tokens")
            .or_else(|| usage.get("output_tokens"))
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        let cost = (prompt_tokens / 1000.0) * pricing.input + (completion_tokens / 1000.0) * pricing.output;
        let rounded = (cost * 1_000_000.0).round() / 1_000_000.0;
        result.response.cost = Some(rounded);
    }

    async fn call_standard(
        &self,
        spec: &ProviderSpec,
        entry: &CatalogEntry,
        model: &str,
        prompt: &str,
    ) -> ProviderResult {
        let base_url = spec
            .config
            .api_base_url
            .clone()
            .or_else(|| {
                entry
                    .base_url_env
                    .as_ref()
                    .and_then(|env| std::env::var(env).ok())
            })
            .or_else(|| entry.base_url.clone());
        let Some(base_url) = base_url else {
            return ProviderResult::failure("API base URL not configured");
        };
        let base_url = base_url.trim_end_matches('/');
        let endpoint = entry.endpoint.replace("{{model}}", model);
        let url = format!("{base_url}{endpoint}");

        let api_key = resolve_api_key(spec, entry);
        let mut url = url;
        let mut headers = reqwest::header::HeaderMap::new();
        match entry.auth_type {
            AuthType::Bearer => match api_key {
                Some(key) => {
                    insert_header(&mut headers, "Authorization", &format!("Bearer {key}"));
                }
                None => return missing_key_error(entry),
            },
            AuthType::XApiKey => match api_key {
                Some(key) => insert_header(&mut headers, "x-api-key", &key),
                None => return missing_key_error(entry),
            },
            AuthType::Token => match api_key {
                Some(key) => {
                    insert_header(&mut headers, "Authorization", &format!("Token {key}"));
                }
                None => return missing_key_error(entry),
            },
            AuthType::QueryParam => match api_key {
                Some(key) => {
                    let param = entry.auth_param_name.as_deref().unwrap_or("api_key");
                    let sep = if url.contains('?') { '&' } else { '?' };
                    url = format!("{url}{sep}{param}={key}");
                }
                None => return missing_key_error(entry),
            },
            AuthType::None => {}
        }

        insert_header(&mut headers, "Content-Type", "application/json");
        for (k, v) in &entry.extra_headers {
            insert_header(&mut headers, k, v);
        }
        for (k, v) in &spec.config.headers {
            insert_header(&mut headers, k, v);
        }

        let body = build_standard_body(entry, model, prompt, &spec.config);

        let transform = entry
            .response_path
            .as_deref()
            .or(spec.config.transform_response.as_deref());
        self.execute(self.client.post(url).headers(headers).json(&body), transform)
            .await
    }

    async fn call_http(&self, spec: &ProviderSpec, prompt: &str) -> ProviderResult {
        let Some(base) = &spec.config.url else {
            return ProviderResult::failure("url is required for http provider");
        };
        let url = match &spec.config.endpoint {
            Some(ep) => format!("{}{}", base.trim_end_matches('/'), ep),
            None => base.clone(),
        };
        let method = spec
            .config
            .method
            .as_deref()
            .unwrap_or("POST")
            .to_uppercase();

        let mut headers = reqwest::header::HeaderMap::new();
        insert_header(&mut headers, "Content-Type", "application/json");
        for (k, v) in &spec.config.headers {
            insert_header(&mut headers, k, v);
        }

        let body_str = render_body_template(&spec.config.body, prompt);
        let request = match method.as_str() {
            "GET" => self.client.get(&url),
            "PUT" => self.client.put(&url),
            _ => self.client.post(&url),
        }
        .headers(headers);

        let request = match serde_json::from_str::<Value>(&body_str) {
            Ok(json_body) => request.json(&json_body),
            Err(_) => request.body(body_str),
        };

        let mut result = self.execute(request, None).await;
        if result.success {
            if let Some(output) = extract::apply_transform(
                &result.response.raw,
                spec.config.transform_response.as_deref(),
            ) {
                result.response.output = Some(output);
            }
        }
        result
    }

    async fn call_dify(&self, spec: &ProviderSpec, prompt: &str, workflow: bool) -> ProviderResult {
        let Some(api_key) = spec.config.api_key.clone() else {
            return ProviderResult::failure("API key required. Set DIFY_API_KEY.");
        };
        let base_url = spec
            .config
            .api_base_url
            .clone()
            .unwrap_or_else(|| "https://api.dify.ai/v1".to_string());
        let endpoint = if workflow {
            "/workflows/run"
        } else {
            "/chat-messages"
        };
        let url = format!("{}{}", base_url.trim_end_matches('/'), endpoint);

        let mut inputs = spec.config.extra.inputs.clone();
        let mut body = if workflow {
            inputs.insert("query".to_string(), json!(prompt));
            json!({
                "inputs": inputs,
                "response_mode": "streaming",
                "user": spec.config.extra.user_id.clone().unwrap_or_else(|| "scanner".to_string()),
            })
        } else {
            json!({
                "inputs": inputs,
                "query": prompt,
                "response_mode": "streaming",
                "user": spec.config.extra.user_id.clone().unwrap_or_else(|| "scanner".to_string()),
            })
        };
        if let Some(conv) = &spec.config.extra.conversation_id {
            body["conversation_id"] = json!(conv);
        }

        let mut headers = reqwest::header::HeaderMap::new();
        insert_header(&mut headers, "Authorization", &format!("Bearer {api_key}"));
        insert_header(&mut headers, "Content-Type", "application/json");

        let result = self
            .execute(self.client.post(&url).headers(headers).json(&body), None)
            .await;
        self.finish_streaming_style(result, spec.config.transform_response.as_deref())
    }

    async fn call_coze(&self, spec: &ProviderSpec, prompt: &str, region: CozeRegion) -> ProviderResult {
        let Some(bot_id) = spec.config.extra.bot_id.clone() else {
            return ProviderResult::failure("bot_id is required in extra for coze provider");
        };
        let Some(api_key) = spec.config.api_key.clone() else {
            return ProviderResult::failure("API key required. Set COZE_API_KEY.");
        };
        let base_url = spec.config.api_base_url.clone().unwrap_or_else(|| match region {
            CozeRegion::Cn => "https://api.coze.cn".to_string(),
            CozeRegion::Com => "https://api.coze.com".to_string(),
        });
        let url = format!("{}/v3/chat", base_url.trim_end_matches('/'));

        let body = json!({
            "bot_id": bot_id,
            "user_id": spec.config.extra.user_id.clone().unwrap_or_else(|| "scanner".to_string()),
            "stream": true,
            "auto_save_history": true,
            "additional_messages": [{
                "role": "user",
                "content": prompt,
                "content_type": "text",
            }],
        });

        let mut headers = reqwest::header::HeaderMap::new();
        insert_header(&mut headers, "Authorization", &format!("Bearer {api_key}"));
        insert_header(&mut headers, "Content-Type", "application/json");

        let result = self
            .execute(self.client.post(&url).headers(headers).json(&body), None)
            .await;

        if result.success {
            if let Some(code) = result.response.raw.get("code").and_then(Value::as_i64) {
                if code != 0 {
                    let msg = result
                        .response
                        .raw
                        .get("msg")
                        .and_then(Value::as_str)
                        .unwrap_or("coze request failed");
                    return ProviderResult::failure(msg.to_string());
                }
            }
        }
        self.finish_streaming_style(result, None)
    }

    /// Shared tail for Dify/Coze: if the body looks like an SSE stream
    /// already captured as text (our `execute` reads whole bodies, not
    /// true incremental streams, so we detect and re-accumulate `data:`
    /// lines from the raw text here), reconstruct via [`sse::accumulate`].
    fn finish_streaming_style(
        &self,
        mut result: ProviderResult,
        transform: Option<&str>,
    ) -> ProviderResult {
        if !result.success {
            return result;
        }
        if let Some(raw_text) = result.response.raw.as_str() {
            let payloads = raw_text.lines().filter_map(|line| {
                line.trim()
                    .strip_prefix("data:")
                    .map(|rest| rest.trim().to_string())
            });
            let acc = sse::accumulate(payloads);
            if !acc.output.is_empty() {
                result.response.output = Some(acc.output);
            }
            if acc.session_id.is_some() {
                result.response.session_id = acc.session_id;
            }
            if acc.usage.is_some() {
                result.response.token_usage = acc.usage;
            }
            return result;
        }

        if let Some(output) = extract::apply_transform(&result.response.raw, transform)
            .or_else(|| extract::auto_detect(&result.response.raw))
        {
            result.response.output = Some(output);
        }
        if let Some(conv) = result.response.raw.get("conversation_id").and_then(Value::as_str) {
            result.response.session_id = Some(conv.to_string());
        }
        result
    }

    /// Performs the HTTP exchange, categorizing outcomes per spec §4.1:
    /// timeouts, connection errors, non-2xx, and malformed bodies all fold
    /// into a failed [`ProviderResult`] rather than an error return.
    ///
    /// `transform` is a caller-resolved `transform_response`-style
    /// expression (e.g. a catalog entry's `response_path`) applied to a
    /// JSON body ahead of format auto-detection; callers that already
    /// apply their own transform afterwards (HTTP/Dify/Coze) pass `None`
    /// here and keep auto-detection as the sole in-`execute` fallback.
    async fn execute(&self, request: reqwest::RequestBuilder, transform: Option<&str>) -> ProviderResult {
        let response = match request.timeout(DEFAULT_TIMEOUT).send().await {
            Ok(r) => r,
            Err(e) => {
                if e.is_timeout() {
                    return ProviderResult::failure(format!(
                        "Request timed out after {}s",
                        DEFAULT_TIMEOUT.as_secs()
                    ));
                }
                if e.is_connect() {
                    return ProviderResult::failure("Connection refused");
                }
                return ProviderResult::failure(format!("Request failed: {e}"));
            }
        };

        let status = response.status();
        let is_sse = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("text/event-stream"))
            .unwrap_or(false);

        let text = match response.text().await {
            Ok(t) => t,
            Err(e) => return ProviderResult::failure(format!("Failed to read response body: {e}")),
        };

        if !status.is_success() {
            let message = extract_error_message(&text).unwrap_or_else(|| text.clone());
            return ProviderResult::failure(format!(
                "Request failed with status {}: {}",
                status.as_u16(),
                message
            ));
        }

        if is_sse {
            let payloads = text.lines().filter_map(|line| {
                line.trim()
                    .strip_prefix("data:")
                    .map(|rest| rest.trim().to_string())
            });
            let acc = sse::accumulate(payloads);
            let mut result = ProviderResult::success(acc.output, Value::String(text));
            result.response.session_id = acc.session_id;
            result.response.token_usage = acc.usage;
            return result;
        }

        match serde_json::from_str::<Value>(&text) {
            Ok(body) => {
                let mut result = ProviderResult::success(String::new(), body.clone());
                if let Some(usage) = body.get("usage") {
                    result.response.token_usage = Some(usage.clone());
                }
                let output = match transform {
                    Some(expr) => extract::apply_transform(&body, Some(expr))
                        .or_else(|| extract::auto_detect(&body)),
                    None => extract::auto_detect(&body),
                };
                if let Some(output) = output {
                    result.response.output = Some(output);
                }
                result
            }
            Err(_) => ProviderResult::success(text.clone(), Value::String(text)),
        }
    }
}

fn missing_key_error(entry: &CatalogEntry) -> ProviderResult {
    let env = entry
        .env_keys
        .first()
        .cloned()
        .unwrap_or_else(|| "API_KEY".to_string());
    ProviderResult::failure(format!("API key required. Set {env}."))
}

fn resolve_api_key(spec: &ProviderSpec, entry: &CatalogEntry) -> Option<String> {
    if let Some(key) = &spec.config.api_key {
        return Some(key.clone());
    }
    for env in &entry.env_keys {
        if let Ok(v) = std::env::var(env) {
            return Some(v);
        }
    }
    None
}

fn insert_header(headers: &mut reqwest::header::HeaderMap, key: &str, value: &str) {
    if let (Ok(name), Ok(val)) = (
        reqwest::header::HeaderName::from_bytes(key.as_bytes()),
        reqwest::header::HeaderValue::from_str(value),
    ) {
        headers.insert(name, val);
    }
}

/// Renders catalog `request_body_template` (or the default shape) by
/// substituting `{{model}}` and JSON-escaping `{{prompt}}`, then injecting
/// `temperature`/`max_tokens` per spec.
fn build_standard_body(entry: &CatalogEntry, model: &str, prompt: &str, config: &ProviderConfig) -> Value {
    let mut body = match &entry.request_body_template {
        Some(template) => substitute_template(template, model, prompt),
        None => json!({
            "model": model,
            "messages": [{"role": "user", "content": prompt}],
            "max_tokens": 1000,
        }),
    };

    if let Some(obj) = body.as_object_mut() {
        if let Some(temp) = config.temperature {
            obj.entry("temperature").or_insert(json!(temp));
        }
        if let Some(max_tokens) = config.max_tokens {
            obj.entry("max_tokens").or_insert(json!(max_tokens));
            if let Some(gen_config) = obj.get_mut("generationConfig").and_then(Value::as_object_mut) {
                gen_config
                    .entry("maxOutputTokens")
                    .or_insert(json!(max_tokens));
            }
        }
    }
    body
}

fn substitute_template(template: &Value, model: &str, prompt: &str) -> Value {
    match template {
        Value::String(s) => {
            let rendered = s.replace("{{model}}", model).replace(
                "{{prompt}}",
                &serde_json::to_string(prompt).unwrap_or_default(),
            );
            Value::String(rendered)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|v| substitute_template(v, model, prompt))
                .collect(),
        ),
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                out.insert(k.clone(), substitute_template(v, model, prompt));
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

fn render_body_template(body: &Option<Value>, prompt: &str) -> String {
    match body {
        Some(Value::String(s)) => s.replace("{{prompt}}", prompt),
        Some(other) => substitute_template(other, "", prompt).to_string(),
        None => json!({"prompt": prompt}).to_string(),
    }
}

fn extract_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    if let Some(msg) = value.pointer("/error/message").and_then(Value::as_str) {
        return Some(msg.to_string());
    }
    if let Some(msg) = value.get("error").and_then(Value::as_str) {
        return Some(msg.to_string());
    }
    if let Some(msg) = value.get("message").and_then(Value::as_str) {
        return Some(msg.to_string());
    }
    None
}
