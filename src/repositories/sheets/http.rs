use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::api::{Rows, SheetsApi};
use crate::config::SheetsConfig;
use crate::errors::ServiceError;
use crate::middleware_helpers::retry::{with_retry, RetryConfig, RetryPolicy};

const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME_SECS: i64 = 3600;
/// Refresh this long before the issued token actually expires
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Failure of a single API call, before retry handling
#[derive(Debug, thiserror::Error)]
enum CallError {
    #[error("spreadsheet API rate limit hit")]
    RateLimited,
    #[error("connection error: {0}")]
    Connection(String),
    #[error("spreadsheet API returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("{0}")]
    Other(String),
}

impl From<CallError> for ServiceError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::RateLimited => ServiceError::RateLimitExceeded,
            other => ServiceError::ExternalServiceError(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for CallError {
    fn from(err: reqwest::Error) -> Self {
        let text = err.to_string();
        let lowered = text.to_lowercase();
        if err.is_connect()
            || err.is_timeout()
            || lowered.contains("ssl")
            || lowered.contains("eof")
            || lowered.contains("connection")
        {
            CallError::Connection(text)
        } else {
            CallError::Other(text)
        }
    }
}

/// Linear backoff with separate bases for throttling and transport failures
#[derive(Debug, Clone)]
struct SheetsRetryPolicy {
    rate_limit_backoff: Duration,
    connection_backoff: Duration,
}

impl RetryPolicy<CallError> for SheetsRetryPolicy {
    fn retry_delay(&self, error: &CallError, attempt: u32) -> Option<Duration> {
        match error {
            CallError::RateLimited => Some(self.rate_limit_backoff * attempt),
            CallError::Connection(_) => Some(self.connection_backoff * attempt),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    fn from_config(config: &SheetsConfig) -> Result<Self, ServiceError> {
        let raw = match (&config.credentials_json, &config.credentials_file) {
            (Some(inline), _) if !inline.trim().is_empty() => {
                info!("Loaded spreadsheet credentials from configuration");
                strip_wrapping_quotes(inline.trim()).to_string()
            }
            (_, Some(path)) => {
                let contents = std::fs::read_to_string(path).map_err(|e| {
                    ServiceError::InternalError(format!(
                        "Cannot read credentials file {}: {}",
                        path, e
                    ))
                })?;
                info!("Loaded spreadsheet credentials from {}", path);
                contents
            }
            _ => {
                return Err(ServiceError::InternalError(
                    "Spreadsheet service-account credentials not configured".into(),
                ))
            }
        };

        serde_json::from_str(&raw).map_err(|e| {
            ServiceError::InternalError(format!("Invalid service-account credentials JSON: {}", e))
        })
    }
}

/// Env files often wrap the JSON blob in one layer of quotes
fn strip_wrapping_quotes(value: &str) -> &str {
    for quote in ['\'', '"'] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

enum Auth {
    Static(String),
    ServiceAccount {
        key: ServiceAccountKey,
        token: Mutex<Option<CachedToken>>,
    },
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

fn cell_to_string(cell: Value) -> String {
    match cell {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Spreadsheet values API over HTTPS
pub struct HttpSheetsApi {
    client: reqwest::Client,
    base_url: Url,
    spreadsheet_id: String,
    auth: Auth,
    retry: RetryConfig,
    policy: SheetsRetryPolicy,
}

impl HttpSheetsApi {
    pub fn new(config: &SheetsConfig) -> Result<Self, ServiceError> {
        let spreadsheet_id = config.cleaned_spreadsheet_id();
        if spreadsheet_id.is_empty() {
            return Err(ServiceError::InternalError(
                "Spreadsheet id is not configured".into(),
            ));
        }

        let base_url = Url::parse(&config.api_base_url).map_err(|e| {
            ServiceError::InternalError(format!("Invalid spreadsheet API base URL: {}", e))
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ServiceError::InternalError(format!("HTTP client setup failed: {}", e)))?;

        let auth = match config.access_token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => Auth::Static(token.to_string()),
            _ => Auth::ServiceAccount {
                key: ServiceAccountKey::from_config(config)?,
                token: Mutex::new(None),
            },
        };

        info!(
            "Spreadsheet API client ready (ID: {}...)",
            spreadsheet_id.chars().take(20).collect::<String>()
        );

        Ok(Self {
            client,
            base_url,
            spreadsheet_id,
            auth,
            retry: RetryConfig {
                max_attempts: config.max_retries.max(1),
            },
            policy: SheetsRetryPolicy {
                rate_limit_backoff: Duration::from_millis(config.rate_limit_backoff_ms),
                connection_backoff: Duration::from_millis(config.connection_backoff_ms),
            },
        })
    }

    fn url(&self, last_segment: &str) -> Result<Url, ServiceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ServiceError::InternalError("Spreadsheet API base URL cannot hold a path".into()))?
            .pop_if_empty()
            .push(&self.spreadsheet_id)
            .push("values")
            .push(last_segment);
        Ok(url)
    }

    async fn bearer_token(&self) -> Result<String, CallError> {
        match &self.auth {
            Auth::Static(token) => Ok(token.clone()),
            Auth::ServiceAccount { key, token } => {
                let mut cached = token.lock().await;
                if let Some(existing) = cached.as_ref() {
                    if Instant::now() < existing.refresh_at {
                        return Ok(existing.value.clone());
                    }
                }
                let fresh = self.exchange_assertion(key).await?;
                let value = fresh.value.clone();
                *cached = Some(fresh);
                Ok(value)
            }
        }
    }

    async fn forget_token(&self) {
        if let Auth::ServiceAccount { token, .. } = &self.auth {
            *token.lock().await = None;
        }
    }

    async fn exchange_assertion(&self, key: &ServiceAccountKey) -> Result<CachedToken, CallError> {
        let now = chrono::Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &key.client_email,
            scope: SHEETS_SCOPE,
            aud: &key.token_uri,
            iat: now,
            exp: now + TOKEN_LIFETIME_SECS,
        };
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| CallError::Other(format!("invalid service-account key: {}", e)))?;
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &signing_key)
            .map_err(|e| CallError::Other(format!("cannot sign token assertion: {}", e)))?;

        let response = self
            .client
            .post(&key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CallError::Status { status, body });
        }
        let token: TokenResponse = response.json().await?;

        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(TOKEN_LIFETIME_SECS as u64));
        debug!("Obtained spreadsheet access token");
        Ok(CachedToken {
            value: token.access_token,
            refresh_at: Instant::now() + lifetime.saturating_sub(TOKEN_REFRESH_MARGIN),
        })
    }

    async fn send_once(
        &self,
        method: &Method,
        url: &Url,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value, CallError> {
        let token = self.bearer_token().await?;
        let mut request = self
            .client
            .request(method.clone(), url.clone())
            .bearer_auth(token)
            .query(query);
        if let Some(body) = body {
            request = request.json(body);
        }

        metrics::counter!("bakery_ledger.sheets.requests", 1);
        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                let err = CallError::from(err);
                if matches!(err, CallError::Connection(_)) {
                    self.forget_token().await;
                }
                return Err(err);
            }
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(CallError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CallError::Status { status, body });
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| CallError::Other(e.to_string()))
    }

    async fn execute(
        &self,
        method: Method,
        url: Url,
        query: &[(&str, &str)],
        body: Option<Value>,
    ) -> Result<Value, ServiceError> {
        with_retry(&self.retry, &self.policy, || {
            self.send_once(&method, &url, query, body.as_ref())
        })
        .await
        .map_err(ServiceError::from)
    }
}

#[async_trait]
impl SheetsApi for HttpSheetsApi {
    #[instrument(skip(self))]
    async fn get_values(&self, range: &str) -> Result<Rows, ServiceError> {
        let url = self.url(range)?;
        let value = self.execute(Method::GET, url, &[], None).await?;
        if value.is_null() {
            return Ok(Vec::new());
        }
        let range: ValueRange = serde_json::from_value(value)?;
        Ok(range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }

    #[instrument(skip(self, rows))]
    async fn update_values(&self, range: &str, rows: Rows) -> Result<(), ServiceError> {
        let url = self.url(range)?;
        let body = json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": rows,
        });
        self.execute(
            Method::PUT,
            url,
            &[("valueInputOption", "USER_ENTERED")],
            Some(body),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn clear_values(&self, range: &str) -> Result<(), ServiceError> {
        let url = self.url(&format!("{}:clear", range))?;
        self.execute(Method::POST, url, &[], Some(json!({})))
            .await
            .map(|_| ())
            .map_err(|e| {
                warn!(range, error = %e, "clearing spreadsheet range failed");
                e
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_are_stripped_once() {
        assert_eq!(strip_wrapping_quotes("'{\"a\":1}'"), "{\"a\":1}");
        assert_eq!(strip_wrapping_quotes("\"{}\""), "{}");
        assert_eq!(strip_wrapping_quotes("{}"), "{}");
        assert_eq!(strip_wrapping_quotes("'"), "'");
    }

    #[test]
    fn retry_policy_scales_with_attempt() {
        let policy = SheetsRetryPolicy {
            rate_limit_backoff: Duration::from_secs(2),
            connection_backoff: Duration::from_secs(3),
        };
        assert_eq!(
            policy.retry_delay(&CallError::RateLimited, 2),
            Some(Duration::from_secs(4))
        );
        assert_eq!(
            policy.retry_delay(&CallError::Connection("eof".into()), 3),
            Some(Duration::from_secs(9))
        );
        assert_eq!(
            policy.retry_delay(
                &CallError::Status {
                    status: StatusCode::NOT_FOUND,
                    body: String::new()
                },
                1
            ),
            None
        );
    }

    #[test]
    fn cells_become_strings() {
        assert_eq!(cell_to_string(json!("Walnut")), "Walnut");
        assert_eq!(cell_to_string(json!(25)), "25");
        assert_eq!(cell_to_string(Value::Null), "");
    }

    #[test]
    fn credentials_are_required_without_a_token() {
        let config = SheetsConfig {
            spreadsheet_id: "a".repeat(44),
            ..SheetsConfig::default()
        };
        assert!(HttpSheetsApi::new(&config).is_err());
    }

    #[test]
    fn urls_keep_range_in_one_segment() {
        let config = SheetsConfig {
            spreadsheet_id: "a".repeat(44),
            api_base_url: "http://localhost:9000/v4/spreadsheets/".into(),
            access_token: Some("token".into()),
            ..SheetsConfig::default()
        };
        let api = HttpSheetsApi::new(&config).unwrap();
        let url = api.url("Orders!A2:H:clear").unwrap();
        assert_eq!(
            url.path(),
            format!("/v4/spreadsheets/{}/values/Orders!A2:H:clear", "a".repeat(44))
        );
    }
}
