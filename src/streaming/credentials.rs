//! Session credentials and endpoint selection.
//!
//! Credentials are held only for the duration of a session and are never
//! persisted; demos load them from the process environment, library callers
//! pass them in directly.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use super::StreamingError;

/// Domain of the audio-bridge service.
pub const SERVICE_DOMAIN: &str = "vocalbridge.io";

/// Characters escaped in URL query values. Notably the space in
/// `Bearer <token>` must become `%20`.
const QUERY_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'=')
    .add(b'?');

/// Credentials for one streaming session.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Deployment environment, e.g. `"prod"` or `"eu-staging"`.
    pub environment: String,
    /// Tenant name the session is billed to.
    pub tenant: String,
    /// Bearer token authorizing the session.
    pub token: String,
}

impl Credentials {
    pub fn new(
        environment: impl Into<String>,
        tenant: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            environment: environment.into(),
            tenant: tenant.into(),
            token: token.into(),
        }
    }

    /// Load credentials from `VOCALBRIDGE_ENVIRONMENT`, `VOCALBRIDGE_TENANT`
    /// and `VOCALBRIDGE_TOKEN`, honoring a local `.env` file.
    pub fn from_env() -> Result<Self, StreamingError> {
        dotenvy::dotenv().ok();
        Ok(Self {
            environment: require_env("VOCALBRIDGE_ENVIRONMENT")?,
            tenant: require_env("VOCALBRIDGE_TENANT")?,
            token: require_env("VOCALBRIDGE_TOKEN")?,
        })
    }

    fn base_url(&self) -> String {
        format!(
            "wss://api.{}.{}/audio-bridge/v2",
            self.environment, SERVICE_DOMAIN
        )
    }

    fn query(&self) -> String {
        format!(
            "tenant-name={}&token={}",
            utf8_percent_encode(&self.tenant, QUERY_VALUE),
            utf8_percent_encode(&format!("Bearer {}", self.token), QUERY_VALUE),
        )
    }
}

fn require_env(name: &'static str) -> Result<String, StreamingError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(StreamingError::MissingCredential(name))
}

/// Which endpoint family a session connects to.
#[derive(Debug, Clone)]
pub enum Endpoint {
    /// Multi-party interaction streams. The interaction id selects which
    /// interaction the audio belongs to.
    Interaction { interaction_id: String },
    /// Single-speaker dictation.
    Dictation,
}

impl Endpoint {
    /// Convenience constructor for the interaction variant.
    pub fn interaction(interaction_id: impl Into<String>) -> Self {
        Endpoint::Interaction {
            interaction_id: interaction_id.into(),
        }
    }

    /// Full WebSocket URL for this endpoint with the given credentials.
    pub fn url(&self, credentials: &Credentials) -> String {
        match self {
            Endpoint::Interaction { interaction_id } => format!(
                "{}/interactions/{}/streams?{}",
                credentials.base_url(),
                utf8_percent_encode(interaction_id, QUERY_VALUE),
                credentials.query(),
            ),
            Endpoint::Dictation => {
                format!("{}/transcribe?{}", credentials.base_url(), credentials.query())
            }
        }
    }

    /// Short name of the endpoint family, for config matching and logs.
    pub fn family(&self) -> &'static str {
        match self {
            Endpoint::Interaction { .. } => "interaction",
            Endpoint::Dictation => "dictation",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> Credentials {
        Credentials::new("prod", "acme-health", "tok-123")
    }

    #[test]
    fn test_interaction_url() {
        let url = Endpoint::interaction("int-42").url(&credentials());
        assert_eq!(
            url,
            "wss://api.prod.vocalbridge.io/audio-bridge/v2/interactions/int-42/streams\
             ?tenant-name=acme-health&token=Bearer%20tok-123"
        );
    }

    #[test]
    fn test_dictation_url() {
        let url = Endpoint::Dictation.url(&credentials());
        assert_eq!(
            url,
            "wss://api.prod.vocalbridge.io/audio-bridge/v2/transcribe\
             ?tenant-name=acme-health&token=Bearer%20tok-123"
        );
    }

    #[test]
    fn test_query_values_are_escaped() {
        let creds = Credentials::new("prod", "acme health", "a+b%c");
        let url = Endpoint::Dictation.url(&creds);
        assert!(url.contains("tenant-name=acme%20health"));
        assert!(url.contains("token=Bearer%20a%2Bb%25c"));
    }

    #[test]
    fn test_environment_selects_host() {
        let creds = Credentials::new("eu-staging", "t", "k");
        let url = Endpoint::Dictation.url(&creds);
        assert!(url.starts_with("wss://api.eu-staging.vocalbridge.io/"));
    }
}
