//! Provider-token issuance for request-based authentication.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use courier_protocol::ProtocolError;
use p256::ecdsa::{signature::Signer, Signature, SigningKey};
use serde_json::json;
use tracing::debug;

/// Cached ES256-signed bearer token.
///
/// The token is attached to every request header but only re-signed once it
/// is older than the configured lifetime; the gateway rejects tokens older
/// than an hour and throttles clients that sign one per request.
pub struct ProviderToken {
    signing_key: SigningKey,
    team_id: String,
    key_id: String,
    lifetime_secs: i64,
    cached: Option<Cached>,
}

struct Cached {
    token: String,
    issued_at: i64,
}

impl ProviderToken {
    pub fn new(
        signing_key: SigningKey,
        team_id: impl Into<String>,
        key_id: impl Into<String>,
        lifetime_secs: i64,
    ) -> Self {
        Self {
            signing_key,
            team_id: team_id.into(),
            key_id: key_id.into(),
            lifetime_secs,
            cached: None,
        }
    }

    /// Return a bearer token valid at `now` (epoch seconds), re-signing only
    /// when the cached one has aged out.
    pub fn bearer(&mut self, now: i64) -> Result<&str, ProtocolError> {
        let fresh = self
            .cached
            .take()
            .filter(|c| now - c.issued_at < self.lifetime_secs);
        let cached = match fresh {
            Some(c) => self.cached.insert(c),
            None => {
                let token = self.sign(now)?;
                debug!(issued_at = now, "signed provider token");
                self.cached.insert(Cached {
                    token,
                    issued_at: now,
                })
            }
        };
        Ok(&cached.token)
    }

    fn sign(&self, issued_at: i64) -> Result<String, ProtocolError> {
        let header = json!({ "alg": "ES256", "kid": self.key_id });
        let claims = json!({ "iss": self.team_id, "iat": issued_at });

        let mut signing_input = String::new();
        signing_input.push_str(&URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?));
        signing_input.push('.');
        signing_input.push_str(&URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?));

        let signature: Signature = self.signing_key.sign(signing_input.as_bytes());
        Ok(format!(
            "{}.{}",
            signing_input,
            URL_SAFE_NO_PAD.encode(signature.to_bytes())
        ))
    }
}

impl std::fmt::Debug for ProviderToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderToken")
            .field("team_id", &self.team_id)
            .field("key_id", &self.key_id)
            .field("lifetime_secs", &self.lifetime_secs)
            .field("cached", &self.cached.is_some())
            .finish()
    }
}
