// # DreamHost Record Client
//
// This crate provides the DreamHost DNS API implementation of `RecordClient`.
//
// ## Behaviour
//
// - One HTTP request per call (list, add or remove)
// - Full error propagation to the caller (no retry, no backoff)
// - HTTP timeout configured (30 seconds)
// - Specific error handling for HTTP status codes (401/403, 429, 5xx)
// - Dry-run mode: listing still happens, writes are logged and skipped
// - Only records DreamHost marks as editable are listed
//
// ## Security Requirements
//
// - API key NEVER appears in logs or error messages (it travels in the query
//   string, so request URLs are stripped from transport errors)
// - Client construction fails if the key is empty
//
// ## API Reference
//
// - DreamHost API: https://help.dreamhost.com/hc/en-us/articles/217560167
// - List: GET `/?key=..&cmd=dns-list_records&format=json`
// - Add: GET `/?key=..&cmd=dns-add_record&record=..&type=..&value=..&comment=..&format=json`
// - Remove: GET `/?key=..&cmd=dns-remove_record&record=..&type=..&value=..&format=json`

use async_trait::async_trait;
use extdns_core::traits::{ProviderRecord, RecordClient, RecordInput};
use extdns_core::{Error, ProviderConfig, Result};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// DreamHost API base URL
pub const DREAMHOST_API_BASE: &str = "https://api.dreamhost.com";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Comment attached to every record this client adds
const RECORD_COMMENT: &str = "modified dynamically by external-dns";

const CMD_LIST: &str = "dns-list_records";
const CMD_ADD: &str = "dns-add_record";
const CMD_REMOVE: &str = "dns-remove_record";

/// Envelope of every DreamHost API response
#[derive(Debug, Deserialize)]
struct ApiResponse {
    result: String,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    reason: Option<String>,
}

/// One row of `dns-list_records`
#[derive(Debug, Deserialize)]
struct ApiRecord {
    record: String,
    #[serde(rename = "type")]
    record_type: String,
    value: String,
    #[serde(default)]
    zone: Option<String>,
    #[serde(default)]
    editable: Value,
}

impl ApiRecord {
    // DreamHost reports editable as "1"/"0"; accept a number too.
    fn is_editable(&self) -> bool {
        match &self.editable {
            Value::String(s) => s == "1",
            Value::Number(n) => n.as_u64() == Some(1),
            Value::Bool(b) => *b,
            _ => false,
        }
    }
}

/// DreamHost DNS record client
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the client will:
/// - Perform listing requests
/// - Log the intended add/remove call
/// - **NOT** actually modify DNS records, reporting success instead
pub struct DreamhostClient {
    /// DreamHost API key
    /// ⚠️ NEVER log this value
    api_key: String,

    /// API base URL, without trailing slash
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, list records but skip writes
    dry_run: bool,
}

// Custom Debug implementation that hides the API key
impl std::fmt::Debug for DreamhostClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DreamhostClient")
            .field("api_key", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl DreamhostClient {
    /// Create a new DreamHost client against a given API base URL
    ///
    /// # Parameters
    ///
    /// - `api_key`: DreamHost API key with the `dns-*` permissions
    /// - `base_url`: API base URL (normally [`DREAMHOST_API_BASE`])
    /// - `dry_run`: If true, list records but skip add/remove calls
    ///
    /// # Errors
    ///
    /// `Error::Config` if the key is empty or the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, dry_run: bool) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::config("DreamHost API key cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            dry_run,
        })
    }

    /// Create a client against the public API (live mode)
    pub fn new_live(api_key: impl Into<String>) -> Result<Self> {
        Self::new(api_key, DREAMHOST_API_BASE, false)
    }

    /// Create a client against the public API (dry-run mode)
    pub fn new_dry_run(api_key: impl Into<String>) -> Result<Self> {
        Self::new(api_key, DREAMHOST_API_BASE, true)
    }

    /// Create a client from the provider configuration
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        if config.dry_run {
            tracing::warn!("DreamHost client running in DRY-RUN mode - no changes will be made");
        }
        Self::new(config.api_key.clone(), config.api_url.clone(), config.dry_run)
    }

    /// Whether writes are skipped
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Issue one API command and return its `data` payload
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /?key=<key>&cmd=<cmd>&format=json&<params>
    /// ```
    async fn call(&self, cmd: &str, params: &[(&str, &str)]) -> Result<Value> {
        tracing::debug!("Calling DreamHost API: {}", cmd);

        let response = self
            .client
            .get(format!("{}/", self.base_url))
            .query(&[("key", self.api_key.as_str()), ("cmd", cmd), ("format", "json")])
            .query(params)
            .send()
            .await
            .map_err(|e| Error::http(format!("{} request failed: {}", cmd, e.without_url())))?;

        // Handle specific HTTP status codes
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            return match status.as_u16() {
                401 | 403 => Err(Error::auth(format!(
                    "Invalid API key or insufficient permissions. Status: {}",
                    status
                ))),
                429 => Err(Error::provider(
                    "dreamhost",
                    format!("Rate limit exceeded. Status: {}", status),
                )),
                500..=599 => Err(Error::provider(
                    "dreamhost",
                    format!("DreamHost server error (transient): {} - {}", status, error_text),
                )),
                _ => Err(Error::provider(
                    "dreamhost",
                    format!("{} failed: {} - {}", cmd, status, error_text),
                )),
            };
        }

        let text = response
            .text()
            .await
            .map_err(|e| Error::http(format!("{} response unreadable: {}", cmd, e.without_url())))?;
        let body: ApiResponse = serde_json::from_str(&text)?;

        if body.result != "success" {
            let detail = match (&body.data, &body.reason) {
                (Value::String(data), Some(reason)) => format!("{} ({})", data, reason),
                (Value::String(data), None) => data.clone(),
                (_, Some(reason)) => reason.clone(),
                (other, None) => other.to_string(),
            };
            return Err(Error::provider("dreamhost", format!("{}: {}", cmd, detail)));
        }

        Ok(body.data)
    }

    async fn write(&self, cmd: &str, input: &RecordInput) -> Result<()> {
        if self.dry_run {
            tracing::info!("[DRY-RUN] Would call {} for {}", cmd, input);
            return Ok(());
        }

        let mut params = vec![
            ("record", input.record.as_str()),
            ("type", input.record_type.as_str()),
            ("value", input.value.as_str()),
        ];
        if cmd == CMD_ADD {
            params.push(("comment", RECORD_COMMENT));
        }

        let data = self.call(cmd, &params).await?;
        tracing::debug!("{} {}: {}", cmd, input, data);
        Ok(())
    }
}

#[async_trait]
impl RecordClient for DreamhostClient {
    async fn list_records(&self) -> Result<Vec<ProviderRecord>> {
        let data = self.call(CMD_LIST, &[]).await?;

        let rows: Vec<ApiRecord> = serde_json::from_value(data)?;

        let total = rows.len();
        let records: Vec<ProviderRecord> = rows
            .into_iter()
            .filter(ApiRecord::is_editable)
            .map(|row| ProviderRecord {
                record: row.record,
                record_type: row.record_type,
                value: row.value,
                zone: row.zone,
            })
            .collect();

        tracing::debug!(
            "DreamHost listed {} record(s), {} editable",
            total,
            records.len()
        );
        Ok(records)
    }

    async fn add_record(&self, input: &RecordInput) -> Result<()> {
        self.write(CMD_ADD, input).await
    }

    async fn remove_record(&self, input: &RecordInput) -> Result<()> {
        self.write(CMD_REMOVE, input).await
    }

    fn client_name(&self) -> &'static str {
        "dreamhost"
    }
}
