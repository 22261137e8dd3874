//! Aqara open API client for running home-automation scenes.
//!
//! Requests are signed with an md5 over the app credentials, a nonce and a
//! millisecond timestamp. Access tokens come from exchanging an auth code
//! (sent to the account by `config.auth.getAuthCode`), are persisted to a
//! JSON file and refreshed once expired.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use md5::{Digest, Md5};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{NotifyError, NotifyResult};
use crate::notifier::Notifier;

fn default_api_url() -> String {
    "https://open-ru.aqara.com/v3.0/open/api".to_string()
}

fn default_tokens_path() -> PathBuf {
    PathBuf::from("/tmp/argus-aqara-tokens.json")
}

fn default_timeout_secs() -> u64 {
    15
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AqaraConfig {
    pub app_id: String,
    pub app_key: String,
    pub key_id: String,
    pub scene_id: String,
    /// Aqara account the auth code is sent to
    pub account: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_tokens_path")]
    pub tokens_path: PathBuf,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Tokens as persisted on disk; `expires_at` is a unix timestamp in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

impl StoredTokens {
    fn from_result(result: &Value, now: i64) -> NotifyResult<Self> {
        let field = |name: &str| {
            result
                .get(name)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| NotifyError::aqara(-1, format!("token response missing {}", name)))
        };
        // expiresIn arrives as a string of seconds
        let expires_in = match result.get("expiresIn") {
            Some(Value::String(s)) => s.parse::<i64>().ok(),
            Some(v) => v.as_i64(),
            None => None,
        }
        .ok_or_else(|| NotifyError::aqara(-1, "token response missing expiresIn"))?;

        Ok(Self {
            access_token: field("accessToken")?,
            refresh_token: field("refreshToken")?,
            expires_at: now + expires_in,
        })
    }

    fn is_expired(&self, now: i64) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    code: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    result: Value,
}

/// md5 request signature over the lower-cased pre-sign string.
pub fn sign(
    app_id: &str,
    key_id: &str,
    app_key: &str,
    nonce: &str,
    time_ms: &str,
    access_token: Option<&str>,
) -> String {
    let mut pre_sign = format!(
        "Appid={}&Keyid={}&Nonce={}&Time={}{}",
        app_id, key_id, nonce, time_ms, app_key
    );
    if let Some(token) = access_token.filter(|t| !t.is_empty()) {
        pre_sign = format!("Accesstoken={}&{}", token, pre_sign);
    }
    hex::encode(Md5::digest(pre_sign.to_lowercase().as_bytes()))
}

pub struct AqaraNotifier {
    client: Client,
    config: AqaraConfig,
    tokens: Mutex<Option<StoredTokens>>,
}

impl AqaraNotifier {
    /// Create the client, loading persisted tokens if present.
    pub fn new(config: AqaraConfig) -> NotifyResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let tokens = match std::fs::read(&config.tokens_path) {
            Ok(bytes) => match serde_json::from_slice::<StoredTokens>(&bytes) {
                Ok(tokens) => {
                    info!(path = %config.tokens_path.display(), "Loaded Aqara tokens");
                    Some(tokens)
                }
                Err(e) => {
                    warn!(path = %config.tokens_path.display(), error = %e, "Ignoring unreadable Aqara tokens");
                    None
                }
            },
            Err(_) => None,
        };

        Ok(Self {
            client,
            config,
            tokens: Mutex::new(tokens),
        })
    }

    pub async fn is_authorized(&self) -> bool {
        self.tokens.lock().await.is_some()
    }

    /// Ask Aqara to send an auth code to the configured account.
    pub async fn request_auth_code(&self) -> NotifyResult<()> {
        let data = json!({ "account": self.config.account, "accountType": 0 });
        self.post("config.auth.getAuthCode", data, None).await?;
        info!(account = %self.config.account, "Aqara auth code requested");
        Ok(())
    }

    async fn post(&self, intent: &str, data: Value, access_token: Option<&str>) -> NotifyResult<Value> {
        let nonce = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
        let time_ms = Utc::now().timestamp_millis().to_string();
        let signature = sign(
            &self.config.app_id,
            &self.config.key_id,
            &self.config.app_key,
            &nonce,
            &time_ms,
            access_token,
        );

        let response = self
            .client
            .post(&self.config.api_url)
            .header("Accesstoken", access_token.unwrap_or(""))
            .header("Appid", &self.config.app_id)
            .header("Keyid", &self.config.key_id)
            .header("Nonce", &nonce)
            .header("Time", &time_ms)
            .header("Sign", signature)
            .json(&json!({ "intent": intent, "data": data }))
            .send()
            .await?;

        let body: ApiResponse = response.json().await?;
        if body.code != 0 {
            return Err(NotifyError::aqara(
                body.code,
                body.message.unwrap_or_else(|| intent.to_string()),
            ));
        }
        Ok(body.result)
    }

    async fn store(&self, tokens: StoredTokens) -> NotifyResult<String> {
        let bytes = serde_json::to_vec_pretty(&tokens)?;
        tokio::fs::write(&self.config.tokens_path, bytes).await?;
        let access = tokens.access_token.clone();
        *self.tokens.lock().await = Some(tokens);
        Ok(access)
    }

    /// Current access token, refreshed first if expired.
    async fn access_token(&self) -> NotifyResult<String> {
        let current = self
            .tokens
            .lock()
            .await
            .clone()
            .ok_or(NotifyError::AqaraUnauthorized)?;

        let now = Utc::now().timestamp();
        if !current.is_expired(now) {
            return Ok(current.access_token);
        }

        info!("Refreshing Aqara access token");
        let result = self
            .post(
                "config.auth.refreshToken",
                json!({ "refreshToken": current.refresh_token }),
                Some(&current.access_token),
            )
            .await?;
        let refreshed = StoredTokens::from_result(&result, Utc::now().timestamp())?;
        self.store(refreshed).await
    }
}

#[async_trait]
impl Notifier for AqaraNotifier {
    fn name(&self) -> &'static str {
        "aqara"
    }

    async fn run_scene(&self) -> NotifyResult<()> {
        let token = self.access_token().await?;
        self.post(
            "config.scene.run",
            json!({ "sceneId": self.config.scene_id }),
            Some(&token),
        )
        .await?;
        info!(scene_id = %self.config.scene_id, "Aqara scene started");
        Ok(())
    }

    async fn save_auth_code(&self, code: &str) -> NotifyResult<()> {
        let data = json!({
            "authCode": code,
            "account": self.config.account,
            "accountType": 0,
        });
        let result = self.post("config.auth.getToken", data, None).await?;
        let tokens = StoredTokens::from_result(&result, Utc::now().timestamp())?;
        self.store(tokens).await?;
        info!("Aqara tokens saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_without_token() {
        let s = sign("app", "key", "secret", "abcd1234", "1700000000000", None);
        assert_eq!(s, "f11186f8450c4aef47fc386972313f9d");
        assert_eq!(
            sign("app", "key", "secret", "abcd1234", "1700000000000", Some("")),
            s
        );
    }

    #[test]
    fn test_sign_with_token_is_lowercased() {
        let s = sign("APP", "key", "secret", "abcd1234", "1700000000000", Some("TOK"));
        assert_eq!(s, "61d68ebaedc90a37b84a76b203f9a04d");
    }

    #[test]
    fn test_tokens_from_result() {
        let result = json!({"accessToken": "a", "refreshToken": "r", "expiresIn": "7200"});
        let tokens = StoredTokens::from_result(&result, 1000).unwrap();
        assert_eq!(tokens.expires_at, 8200);
        assert!(!tokens.is_expired(8199));
        assert!(tokens.is_expired(8200));

        let numeric = json!({"accessToken": "a", "refreshToken": "r", "expiresIn": 60});
        assert_eq!(StoredTokens::from_result(&numeric, 0).unwrap().expires_at, 60);

        assert!(StoredTokens::from_result(&json!({"accessToken": "a"}), 0).is_err());
    }
}
