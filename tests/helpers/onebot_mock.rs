//! Mock OneBot API server for testing
//!
//! Wraps a wiremock server answering OneBot-11 HTTP actions.

use serde_json::{json, Value};
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

use Valhalla::config::OneBotConfig;

pub struct OneBotMockServer {
    pub server: MockServer,
}

impl OneBotMockServer {
    pub async fn new() -> Self {
        Self { server: MockServer::start().await }
    }

    pub fn config(&self, access_token: &str) -> OneBotConfig {
        OneBotConfig {
            base_url: self.server.uri(),
            access_token: access_token.to_string(),
            timeout_seconds: 5,
        }
    }

    /// Answer `action` with a successful envelope around `data`
    pub async fn mock_ok(&self, action: &str, data: Value) {
        self.mock_response(action, ResponseTemplate::new(200).set_body_json(ok(data))).await;
    }

    /// Answer `action` with a failed envelope
    pub async fn mock_failed(&self, action: &str, retcode: i64, wording: &str) {
        let body = json!({ "status": "failed", "retcode": retcode, "data": null, "wording": wording });
        self.mock_response(action, ResponseTemplate::new(200).set_body_json(body)).await;
    }

    pub async fn mock_status(&self, action: &str, status: u16) {
        self.mock_response(action, ResponseTemplate::new(status)).await;
    }

    pub async fn mock_response(&self, action: &str, response: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path(format!("/{}", action)))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    pub async fn reset(&self) {
        self.server.reset().await;
    }
}

pub fn ok(data: Value) -> Value {
    json!({ "status": "ok", "retcode": 0, "data": data })
}
