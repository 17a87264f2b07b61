//! Ownership handshake: proves the activating server controls the domain it claims.
//!
//! The license server sends a random token to a well-known path on the claimed
//! domain. The deployment there answers with `HMAC-SHA256(purchase_code, token)`,
//! which only a holder of the purchase code can compute.

use std::net::IpAddr;
use std::time::Duration;

use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::config::HandshakeConfig;
use crate::domain;
use crate::models::Environment;

type HmacSha256 = Hmac<Sha256>;

/// Hostname suffixes that never resolve on the public internet.
const LOCAL_SUFFIXES: [&str; 5] = [".local", ".test", ".example", ".localhost", ".dev.cc"];

#[derive(Debug, Deserialize)]
struct HandshakeReply {
    #[serde(default)]
    success: bool,
    data: Option<HandshakeData>,
}

#[derive(Debug, Deserialize)]
struct HandshakeData {
    signature: String,
}

/// Whether a normalized domain names a local development host.
pub fn is_local_domain(domain_key: &str) -> bool {
    let host = domain::host(domain_key);
    host == "localhost"
        || LOCAL_SUFFIXES.iter().any(|suffix| host.ends_with(suffix))
        || host.parse::<IpAddr>().is_ok_and(|ip| ip.is_loopback())
}

/// Development activations on local hosts skip the handshake: nothing could reach them.
pub fn requires_handshake(enabled: bool, domain_key: &str, environment: Environment) -> bool {
    enabled && !(environment == Environment::Development && is_local_domain(domain_key))
}

/// The signature a deployment holding `purchase_code` must return for `token`.
pub fn expected_signature(purchase_code: &str, token: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(purchase_code.as_bytes()).ok()?;
    mac.update(token.as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time comparison of a returned signature against the expected one.
fn signature_matches(expected: &str, provided: &str) -> bool {
    let expected_bytes = expected.as_bytes();
    let provided_bytes = provided.trim().to_ascii_lowercase();
    let provided_bytes = provided_bytes.as_bytes();

    // Signature length is not secret: always 64 hex chars
    if expected_bytes.len() != provided_bytes.len() {
        return false;
    }

    expected_bytes.ct_eq(provided_bytes).into()
}

fn generate_token() -> String {
    use rand::RngCore;
    use rand::rngs::OsRng;

    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[derive(Debug, Clone)]
pub struct OwnershipVerifier {
    client: Client,
    enabled: bool,
    path: String,
}

impl OwnershipVerifier {
    pub fn new(config: &HandshakeConfig) -> reqwest::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let path = if config.path.starts_with('/') {
            config.path.clone()
        } else {
            format!("/{}", config.path)
        };

        Ok(Self {
            client,
            enabled: config.enabled,
            path,
        })
    }

    pub fn requires_handshake(&self, domain_key: &str, environment: Environment) -> bool {
        requires_handshake(self.enabled, domain_key, environment)
    }

    /// Challenge URL on the claimed domain. Local hosts are reached over plain HTTP.
    pub fn challenge_url(&self, domain_key: &str) -> String {
        let scheme = if is_local_domain(domain_key) { "http" } else { "https" };
        format!("{}://{}{}", scheme, domain_key, self.path)
    }

    /// Run the handshake against `domain_key`.
    ///
    /// Any failure (unreachable, non-2xx, malformed reply, wrong signature) is
    /// reported as `false`; the cause is only logged.
    pub async fn verify_ownership(&self, domain_key: &str, purchase_code: &str) -> bool {
        let token = generate_token();
        let url = self.challenge_url(domain_key);

        let response = match self
            .client
            .get(&url)
            .query(&[("token", token.as_str())])
            .header("Accept", "application/json")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(domain = %domain_key, "Handshake request failed: {}", e);
                return false;
            }
        };

        if response.status() != reqwest::StatusCode::OK {
            tracing::warn!(domain = %domain_key, status = %response.status(), "Handshake rejected");
            return false;
        }

        let reply: HandshakeReply = match response.json().await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(domain = %domain_key, "Malformed handshake reply: {}", e);
                return false;
            }
        };

        let Some(data) = reply.data.filter(|_| reply.success) else {
            tracing::warn!(domain = %domain_key, "Handshake reply carried no signature");
            return false;
        };

        let verified = expected_signature(purchase_code, &token)
            .is_some_and(|expected| signature_matches(&expected, &data.signature));
        if !verified {
            tracing::warn!(domain = %domain_key, "Handshake signature mismatch");
        }
        verified
    }
}
