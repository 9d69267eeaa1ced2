//! Capability token minting for the browser voice client.
//!
//! Pure pass-through: the server signs a short-lived HS256 token scoping
//! voice-call permissions for an identity, in the shape the provider's client
//! SDK expects. No admission state is involved.

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

const DEFAULT_TTL_SECONDS: i64 = 3600;

/// Signing configuration.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub account_sid: String,
    pub api_key_sid: String,
    pub api_key_secret: String,
    pub twiml_app_sid: String,
    pub ttl_seconds: i64,
}

impl TokenConfig {
    /// Load from TWILIO_ACCOUNT_SID, TWILIO_API_KEY_SID, TWILIO_API_KEY_SECRET
    /// and TWIML_APP_SID. All four are required; `None` disables `/token`.
    pub fn from_env() -> Option<Self> {
        let var = |name: &str| std::env::var(name).ok().filter(|s| !s.is_empty());
        Some(Self {
            account_sid: var("TWILIO_ACCOUNT_SID")?,
            api_key_sid: var("TWILIO_API_KEY_SID")?,
            api_key_secret: var("TWILIO_API_KEY_SECRET")?,
            twiml_app_sid: var("TWIML_APP_SID")?,
            ttl_seconds: DEFAULT_TTL_SECONDS,
        })
    }
}

/// Voice grant embedded in the token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceGrant {
    pub outgoing_application_sid: String,
    pub incoming_allow: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grants {
    pub identity: String,
    pub voice: VoiceGrant,
}

/// Claims in the provider's access-token shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub jti: String,
    /// API key SID, which is also the signing key id.
    pub iss: String,
    /// Account the grants apply to.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub grants: Grants,
}

#[derive(Clone)]
pub struct TokenIssuer {
    config: TokenConfig,
    encoding_key: EncodingKey,
    header: Header,
}

impl TokenIssuer {
    pub fn new(config: TokenConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.api_key_secret.as_bytes());
        let mut header = Header::new(Algorithm::HS256);
        // Content type the provider's SDK checks for.
        header.cty = Some("twilio-fpa;v=1".to_string());
        Self {
            config,
            encoding_key,
            header,
        }
    }

    /// Mint a voice capability token for `identity`.
    pub fn mint(&self, identity: &str) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            jti: format!("{}-{}", self.config.api_key_sid, now),
            iss: self.config.api_key_sid.clone(),
            sub: self.config.account_sid.clone(),
            iat: now,
            exp: now + self.config.ttl_seconds,
            grants: Grants {
                identity: identity.to_string(),
                voice: VoiceGrant {
                    outgoing_application_sid: self.config.twiml_app_sid.clone(),
                    incoming_allow: true,
                },
            },
        };
        encode(&self.header, &claims, &self.encoding_key)
    }
}
