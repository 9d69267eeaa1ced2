//! Telephony provider REST client.
//!
//! The trait is the seam between handlers and the provider: handlers only see
//! `TelephonyApi`, so tests substitute a fake without any HTTP involved.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

const DEFAULT_API_BASE: &str = "https://api.twilio.com";

/// An inbound message as we expose it to the frontend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub sid: String,
    pub from: String,
    pub body: String,
    pub date_sent: Option<String>,
    pub status: String,
}

/// Outbound operations against the provider.
#[async_trait]
pub trait TelephonyApi: Send + Sync {
    /// Send an SMS; returns the provider's message SID.
    async fn send_message(&self, from: &str, to: &str, body: &str) -> Result<String, ApiError>;

    /// Inbound messages addressed to `to`.
    async fn list_inbound(&self, to: &str) -> Result<Vec<InboundMessage>, ApiError>;

    /// Start an outbound call; the provider fetches instructions from `twiml_url`.
    async fn create_call(&self, to: &str, from: &str, twiml_url: &str) -> Result<String, ApiError>;
}

/// Provider credentials and endpoint.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub account_sid: String,
    pub auth_token: String,
    /// Overridable so tests can point the client at a local stub.
    pub api_base: String,
}

impl ProviderConfig {
    /// Load from TWILIO_ACCOUNT_SID / TWILIO_AUTH_TOKEN / TWILIO_API_BASE.
    /// `None` when credentials are missing; the server still runs, but the
    /// SMS and outbound-call endpoints answer 503.
    pub fn from_env() -> Option<Self> {
        let account_sid = std::env::var("TWILIO_ACCOUNT_SID")
            .ok()
            .filter(|s| !s.is_empty())?;
        let auth_token = std::env::var("TWILIO_AUTH_TOKEN")
            .ok()
            .filter(|s| !s.is_empty())?;
        let api_base =
            std::env::var("TWILIO_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        Some(Self {
            account_sid,
            auth_token,
            api_base,
        })
    }
}

/// The real client, speaking the provider's 2010-04-01 REST API with basic auth.
pub struct TwilioClient {
    config: ProviderConfig,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct CallResource {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct MessagePage {
    messages: Vec<MessageRecord>,
}

#[derive(Debug, Deserialize)]
struct MessageRecord {
    sid: String,
    from: String,
    body: String,
    direction: String,
    date_sent: Option<String>,
    status: String,
}

impl TwilioClient {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.api_base, self.config.account_sid
        )
    }

    fn calls_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Calls.json",
            self.config.api_base, self.config.account_sid
        )
    }

    /// Fail non-2xx responses with the provider's own error body attached.
    async fn check(&self, response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let detail = response.text().await.unwrap_or_default();
        Err(ApiError::Upstream(format!("{}: {}", status, detail)))
    }
}

#[async_trait]
impl TelephonyApi for TwilioClient {
    async fn send_message(&self, from: &str, to: &str, body: &str) -> Result<String, ApiError> {
        let response = self
            .http
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[("From", from), ("To", to), ("Body", body)])
            .send()
            .await
            .map_err(|e| ApiError::Upstream(e.to_string()))?;

        let resource: MessageResource = self
            .check(response)
            .await?
            .json()
            .await
            .map_err(|e| ApiError::Upstream(e.to_string()))?;
        Ok(resource.sid)
    }

    async fn list_inbound(&self, to: &str) -> Result<Vec<InboundMessage>, ApiError> {
        let response = self
            .http
            .get(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .query(&[("To", to), ("PageSize", "50")])
            .send()
            .await
            .map_err(|e| ApiError::Upstream(e.to_string()))?;

        let page: MessagePage = self
            .check(response)
            .await?
            .json()
            .await
            .map_err(|e| ApiError::Upstream(e.to_string()))?;

        Ok(page
            .messages
            .into_iter()
            .filter(|m| m.direction == "inbound")
            .map(|m| InboundMessage {
                sid: m.sid,
                from: m.from,
                body: m.body,
                date_sent: m.date_sent,
                status: m.status,
            })
            .collect())
    }

    async fn create_call(&self, to: &str, from: &str, twiml_url: &str) -> Result<String, ApiError> {
        let response = self
            .http
            .post(self.calls_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[("To", to), ("From", from), ("Url", twiml_url)])
            .send()
            .await
            .map_err(|e| ApiError::Upstream(e.to_string()))?;

        let resource: CallResource = self
            .check(response)
            .await?
            .json()
            .await
            .map_err(|e| ApiError::Upstream(e.to_string()))?;
        Ok(resource.sid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn config_requires_both_credentials() {
        std::env::remove_var("TWILIO_ACCOUNT_SID");
        std::env::remove_var("TWILIO_AUTH_TOKEN");
        assert!(ProviderConfig::from_env().is_none());

        std::env::set_var("TWILIO_ACCOUNT_SID", "AC123");
        assert!(ProviderConfig::from_env().is_none());

        std::env::set_var("TWILIO_AUTH_TOKEN", "secret");
        let config = ProviderConfig::from_env().unwrap();
        assert_eq!(config.account_sid, "AC123");
        assert_eq!(config.api_base, DEFAULT_API_BASE);

        std::env::remove_var("TWILIO_ACCOUNT_SID");
        std::env::remove_var("TWILIO_AUTH_TOKEN");
    }

    #[test]
    fn message_page_filters_happen_on_direction() {
        let page: MessagePage = serde_json::from_str(
            r#"{"messages":[
                {"sid":"SM1","from":"+1","body":"in","direction":"inbound","date_sent":null,"status":"received"},
                {"sid":"SM2","from":"+2","body":"out","direction":"outbound-api","date_sent":null,"status":"sent"}
            ]}"#,
        )
        .unwrap();

        let inbound: Vec<_> = page
            .messages
            .into_iter()
            .filter(|m| m.direction == "inbound")
            .collect();
        assert_eq!(inbound.len(), 1);
        assert_eq!(inbound[0].sid, "SM1");
    }
}
