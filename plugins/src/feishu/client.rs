//! 飞书开放平台 HTTP 客户端：tenant_access_token 缓存 + 统一的 code 校验

use std::time::{Duration, Instant};

use reqwest::Method;
use serde_json::{json, Value};
use tokio::sync::RwLock;

use taskbot_core::config::FeishuConfig;

use crate::http::{build_client, parse_json_response, HttpError};

const TOKEN_PATH: &str = "auth/v3/tenant_access_token/internal";
/// Refresh this long before the platform-reported expiry.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self, now: Instant) -> bool {
        now + TOKEN_REFRESH_MARGIN < self.expires_at
    }
}

pub struct FeishuClient {
    http: reqwest::Client,
    base_url: String,
    app_id: String,
    app_secret: String,
    token: RwLock<Option<CachedToken>>,
}

impl FeishuClient {
    pub fn new(cfg: &FeishuConfig) -> anyhow::Result<Self> {
        Ok(Self {
            http: build_client(cfg.timeout_ms)?,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            app_id: cfg.app_id.clone(),
            app_secret: cfg.app_secret.clone(),
            token: RwLock::new(None),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn tenant_token(&self) -> anyhow::Result<String> {
        if let Some(token) = self.token.read().await.as_ref() {
            if token.is_fresh(Instant::now()) {
                return Ok(token.value.clone());
            }
        }

        let mut slot = self.token.write().await;
        // another task may have refreshed while we waited
        if let Some(token) = slot.as_ref() {
            if token.is_fresh(Instant::now()) {
                return Ok(token.value.clone());
            }
        }

        let token = self.fetch_token().await?;
        let value = token.value.clone();
        *slot = Some(token);
        Ok(value)
    }

    async fn fetch_token(&self) -> anyhow::Result<CachedToken> {
        let url = self.url(TOKEN_PATH);
        tracing::debug!(target: "taskbot.feishu", stage = "feishu.token.in", url = %url);
        let resp = self
            .http
            .post(&url)
            .json(&json!({"app_id": self.app_id, "app_secret": self.app_secret}))
            .send()
            .await
            .map_err(|err| HttpError::from_reqwest(err, url.clone()))?;
        let body = check_code(parse_json_response(resp).await?, &url)?;

        let value = body
            .get("tenant_access_token")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| HttpError::shape_error(url.clone(), "tenant_access_token missing"))?;
        let expire = body.get("expire").and_then(Value::as_u64).unwrap_or(7200);
        tracing::debug!(target: "taskbot.feishu", stage = "feishu.token.out", expire_secs = expire);

        Ok(CachedToken {
            value: value.to_string(),
            expires_at: Instant::now() + Duration::from_secs(expire),
        })
    }

    /// Authenticated call; returns the `data` member of a `code == 0` response.
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> anyhow::Result<Value> {
        let url = self.url(path);
        let token = self.tenant_token().await?;
        tracing::debug!(
            target: "taskbot.feishu",
            stage = "feishu.call.in",
            method = %method,
            url = %url
        );

        let mut req = self
            .http
            .request(method, &url)
            .bearer_auth(token)
            .query(query);
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req
            .send()
            .await
            .map_err(|err| HttpError::from_reqwest(err, url.clone()))?;
        let status = resp.status();
        let mut value = check_code(parse_json_response(resp).await?, &url)?;
        tracing::debug!(target: "taskbot.feishu", stage = "feishu.call.out", status = %status);

        Ok(value
            .as_object_mut()
            .and_then(|o| o.remove("data"))
            .unwrap_or(Value::Null))
    }
}

fn check_code(body: Value, url: &str) -> anyhow::Result<Value> {
    let code = body.get("code").and_then(Value::as_i64).unwrap_or(0);
    if code != 0 {
        let msg = body.get("msg").and_then(Value::as_str).unwrap_or("");
        tracing::error!(target: "taskbot.feishu", code, msg, url, "feishu api error");
        return Err(HttpError::api_error(code, msg, url.to_string()).into());
    }
    Ok(body)
}
