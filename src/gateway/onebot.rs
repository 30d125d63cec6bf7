//! OneBot 11 HTTP gateway
//!
//! Calls the OneBot HTTP API (`POST {base_url}/{action}`), unwraps the
//! `{status, retcode, data}` envelope and classifies failures into
//! [`GatewayError`]s so the executor can tell transient from permanent.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use super::Gateway;
use crate::config::OneBotConfig;
use crate::models::{GroupId, MemberId, MemberRecord, Role, Roster};
use crate::utils::errors::{GatewayError, GatewayResult, Result, ValhallaError};
use crate::utils::logging::log_gateway_error;

const RETCODE_BAD_REQUEST: i64 = 100;

/// Group member a call is about; names the member in `NotMember` failures
type CallTarget = Option<(GroupId, MemberId)>;

#[derive(Debug, Deserialize)]
struct Envelope {
    status: String,
    #[serde(default)]
    retcode: i64,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    wording: Option<String>,
}

/// Member payload as sent by OneBot implementations; most fields are optional
#[derive(Debug, Deserialize)]
struct OneBotMember {
    user_id: i64,
    #[serde(default)]
    nickname: Option<String>,
    #[serde(default)]
    card: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    join_time: Option<i64>,
    #[serde(default)]
    last_sent_time: Option<i64>,
    #[serde(default)]
    level: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct LoginInfo {
    user_id: i64,
}

impl From<OneBotMember> for MemberRecord {
    fn from(raw: OneBotMember) -> Self {
        MemberRecord {
            id: MemberId(raw.user_id),
            display_name: raw.nickname.unwrap_or_default(),
            card: raw.card.unwrap_or_default(),
            title: raw.title.unwrap_or_default(),
            role: raw.role.as_deref().map(Role::parse).unwrap_or_default(),
            joined_at: timestamp(raw.join_time),
            last_active_at: timestamp(raw.last_sent_time),
            level: raw.level.as_ref().and_then(parse_level),
        }
    }
}

fn timestamp(seconds: Option<i64>) -> Option<DateTime<Utc>> {
    seconds.filter(|s| *s > 0).and_then(|s| DateTime::from_timestamp(s, 0))
}

fn parse_level(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// OneBot HTTP client
#[derive(Debug, Clone)]
pub struct OneBotGateway {
    client: Client,
    base_url: Url,
    access_token: Option<String>,
}

impl OneBotGateway {
    pub fn new(config: &OneBotConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent("Valhalla/1.0")
            .build()
            .map_err(ValhallaError::Http)?;

        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)?;
        let access_token = Some(config.access_token.clone()).filter(|t| !t.is_empty());

        Ok(Self { client, base_url, access_token })
    }

    async fn call<T: DeserializeOwned>(&self, action: &str, params: Value, target: CallTarget) -> GatewayResult<T> {
        let data = self.call_raw(action, params, target).await?;
        serde_json::from_value(data).map_err(|e| {
            let error = GatewayError::Protocol(format!("unexpected {} payload: {}", action, e));
            log_gateway_error(action, &error);
            error
        })
    }

    async fn call_raw(&self, action: &str, params: Value, target: CallTarget) -> GatewayResult<Value> {
        let url = self
            .base_url
            .join(action)
            .map_err(|e| GatewayError::Protocol(e.to_string()))?;
        debug!(action = action, url = %url, "Calling OneBot API");

        let mut request = self.client.post(url).json(&params);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let result = self.send(request, target).await;
        if let Err(error) = &result {
            log_gateway_error(action, error);
        }
        result
    }

    async fn send(&self, request: reqwest::RequestBuilder, target: CallTarget) -> GatewayResult<Value> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout
            } else {
                GatewayError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_http(status, body));
        }

        let envelope: Envelope = response
            .json()
            .await
            .map_err(|e| GatewayError::Protocol(format!("invalid response body: {}", e)))?;

        match envelope.status.as_str() {
            "ok" | "async" => Ok(envelope.data),
            _ => {
                let message = envelope
                    .wording
                    .or(envelope.msg)
                    .unwrap_or_else(|| format!("retcode {}", envelope.retcode));
                Err(classify_failure(envelope.retcode, message, target))
            }
        }
    }

    async fn set_member_attribute(&self, action: &str, params: Value, group_id: GroupId, member_id: MemberId) -> GatewayResult<()> {
        self.call_raw(action, params, Some((group_id, member_id))).await.map(|_| ())
    }
}

fn classify_http(status: StatusCode, body: String) -> GatewayError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => GatewayError::RateLimited,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayError::Auth(format!("HTTP {}", status)),
        s if s.is_server_error() => GatewayError::Network(format!("HTTP {}: {}", s, body)),
        s => GatewayError::Protocol(format!("HTTP {}: {}", s, body)),
    }
}

/// Without a target member a not-member reply cannot be attributed and is a
/// protocol failure
fn classify_failure(retcode: i64, message: String, target: CallTarget) -> GatewayError {
    let lower = message.to_lowercase();
    if lower.contains("permission") || message.contains("权限") {
        GatewayError::Permission(message)
    } else if lower.contains("not a member") || lower.contains("not in group") || message.contains("不存在") {
        match target {
            Some((group_id, member_id)) => GatewayError::NotMember { group_id, member_id },
            None => GatewayError::Protocol(message),
        }
    } else if lower.contains("owner") || message.contains("群主") {
        GatewayError::RequiresOwner
    } else if lower.contains("too frequent") || lower.contains("rate limit") {
        GatewayError::RateLimited
    } else if retcode == RETCODE_BAD_REQUEST {
        GatewayError::InvalidValue(message)
    } else {
        GatewayError::Protocol(message)
    }
}

#[async_trait]
impl Gateway for OneBotGateway {
    async fn fetch_roster(&self, group_id: GroupId) -> GatewayResult<Roster> {
        let members: Vec<OneBotMember> = self
            .call("get_group_member_list", json!({ "group_id": group_id.0, "no_cache": true }), None)
            .await?;
        debug!(group_id = %group_id, count = members.len(), "Fetched group roster");

        Roster::from_records(members.into_iter().map(MemberRecord::from))
            .map_err(|e| GatewayError::Protocol(e.to_string()))
    }

    async fn fetch_member(&self, group_id: GroupId, member_id: MemberId) -> GatewayResult<Option<MemberRecord>> {
        let result: GatewayResult<OneBotMember> = self
            .call(
                "get_group_member_info",
                json!({ "group_id": group_id.0, "user_id": member_id.0, "no_cache": true }),
                Some((group_id, member_id)),
            )
            .await;

        match result {
            Ok(member) => Ok(Some(member.into())),
            Err(GatewayError::NotMember { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn set_card(&self, group_id: GroupId, member_id: MemberId, card: &str) -> GatewayResult<()> {
        self.set_member_attribute(
            "set_group_card",
            json!({ "group_id": group_id.0, "user_id": member_id.0, "card": card }),
            group_id,
            member_id,
        )
        .await
    }

    async fn set_title(&self, group_id: GroupId, member_id: MemberId, title: &str) -> GatewayResult<()> {
        self.set_member_attribute(
            "set_group_special_title",
            json!({ "group_id": group_id.0, "user_id": member_id.0, "special_title": title, "duration": -1 }),
            group_id,
            member_id,
        )
        .await
    }

    async fn set_admin(&self, group_id: GroupId, member_id: MemberId, enable: bool) -> GatewayResult<()> {
        self.set_member_attribute(
            "set_group_admin",
            json!({ "group_id": group_id.0, "user_id": member_id.0, "enable": enable }),
            group_id,
            member_id,
        )
        .await
    }

    async fn self_id(&self) -> GatewayResult<MemberId> {
        let info: LoginInfo = self.call("get_login_info", json!({}), None).await?;
        Ok(MemberId(info.user_id))
    }
}
