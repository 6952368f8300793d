//! Access token verification for secure reads.
//!
//! A consumer presents a base64 RSA-encrypted token, a base64 signature over
//! the token ciphertext and (via its TLS client certificate) a distinguished
//! name. Verification runs these checks in order and stops at the first
//! failure:
//!
//! 1. the resource has a private key on record
//! 2. the signature verifies against the authorization system's key
//! 3. the token decrypts with the provider's private key
//! 4. the claims carry `s` and `c`
//! 5. `s` equals `<interface>.<serviceDefinition>` of the resource
//! 6. the DN common name's leading segment equals the leading segment of `c`
//! 7. the token is not expired
//!
//! The signature is always checked before anything decrypted is trusted.

use crate::crypto::{CryptoError, TokenCipher};
use crate::errors::TokenVerificationError;
use crate::services::claims::{ClaimsError, TokenClaims};
use base64::{engine::general_purpose, Engine as _};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Maximum accepted encoded token size in bytes.
///
/// A PKCS#1 v1.5 ciphertext is the size of the modulus, so even a 8192-bit
/// key stays well below this once base64 encoded.
pub const MAX_TOKEN_SIZE_BYTES: usize = 4096;

/// Length of the `CN=` prefix stripped from the DN field.
const COMMON_NAME_PREFIX_LEN: usize = 3;

/// Credentials presented with a secure read.
pub struct SecureReadRequest {
    /// Base64 token ciphertext as received (may contain spaces for `+`).
    pub token: SecretString,
    /// Base64 signature as received (may contain spaces for `+`).
    pub signature: String,
    /// Distinguished name of the client certificate, e.g. `C=HU,CN=client1.cloud.op`.
    pub client_dn: String,
}

/// Custom Debug implementation that redacts the token.
impl fmt::Debug for SecureReadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureReadRequest")
            .field("token", &"[REDACTED]")
            .field("signature_len", &self.signature.len())
            .field("client_dn", &self.client_dn)
            .finish()
    }
}

/// What the token must authorize.
#[derive(Debug, Clone, Copy)]
pub struct VerificationTarget<'a> {
    pub service_interface: &'a str,
    pub service_definition: &'a str,
    pub private_key_path: Option<&'a Path>,
}

impl VerificationTarget<'_> {
    /// Service id a token must carry in `s`.
    pub fn expected_service(&self) -> String {
        format!("{}.{}", self.service_interface, self.service_definition)
    }
}

/// Stateless verifier over an injected [`TokenCipher`].
#[derive(Clone)]
pub struct TokenVerifier {
    cipher: Arc<dyn TokenCipher>,
}

impl TokenVerifier {
    pub fn new(cipher: Arc<dyn TokenCipher>) -> Self {
        Self { cipher }
    }

    /// Decide whether `request` authorizes a read of `target` at unix time `now`.
    ///
    /// Returns the decoded claims on success.
    #[instrument(skip_all, name = "provider.token.verify")]
    pub fn verify(
        &self,
        request: &SecureReadRequest,
        target: &VerificationTarget<'_>,
        now: u64,
    ) -> Result<TokenClaims, TokenVerificationError> {
        let private_key_path = target
            .private_key_path
            .ok_or(TokenVerificationError::NoKeyMaterial)?;

        let encoded_token = request.token.expose_secret();
        if encoded_token.len() > MAX_TOKEN_SIZE_BYTES {
            return Err(TokenVerificationError::MalformedToken(format!(
                "token exceeds {} bytes",
                MAX_TOKEN_SIZE_BYTES
            )));
        }

        let ciphertext = decode_transport_base64(encoded_token).map_err(|e| {
            TokenVerificationError::MalformedToken(format!("token is not base64: {}", e))
        })?;
        let signature = decode_transport_base64(&request.signature).map_err(|e| {
            debug!(target: "provider.services.token_verifier", error = %e, "Signature is not base64");
            TokenVerificationError::BadSignature
        })?;

        self.cipher
            .verify_signature(&ciphertext, &signature)
            .map_err(|e| {
                if matches!(e, CryptoError::NoAuthorizationKey) {
                    warn!(
                        target: "provider.services.token_verifier",
                        "Secure read without a configured authorization key"
                    );
                }
                TokenVerificationError::BadSignature
            })?;

        let plaintext = self
            .cipher
            .decrypt(private_key_path, &ciphertext)
            .map_err(|e| TokenVerificationError::MalformedToken(e.to_string()))?;

        let claims = TokenClaims::decode(&plaintext).map_err(|e| match e {
            ClaimsError::MissingClaim(name) => TokenVerificationError::MissingClaim(name),
            ClaimsError::Malformed(reason) => TokenVerificationError::MalformedToken(reason),
        })?;

        let expected_service = target.expected_service();
        if claims.service != expected_service {
            return Err(TokenVerificationError::ServiceMismatch {
                expected: expected_service,
                actual: claims.service,
            });
        }

        // Only the leading segment of the common name is compared.
        let client_name = client_common_name_prefix(&request.client_dn)
            .ok_or(TokenVerificationError::IdentityMismatch)?;
        if client_name != consumer_name_prefix(&claims.consumer) {
            return Err(TokenVerificationError::IdentityMismatch);
        }

        if claims.is_expired_at(now) {
            return Err(TokenVerificationError::TokenExpired {
                expiry: claims.expiry,
                now,
            });
        }

        debug!(
            target: "provider.services.token_verifier",
            service = %claims.service,
            expiry = claims.expiry,
            "Access token verified"
        );
        Ok(claims)
    }
}

/// Decode base64 as received from the transport, where `+` may have been
/// turned into a space by form decoding.
pub fn decode_transport_base64(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    general_purpose::STANDARD.decode(normalize_transport_base64(encoded))
}

pub fn normalize_transport_base64(encoded: &str) -> String {
    encoded.replace(' ', "+")
}

/// Leading dot-segment of the common name in a DN such as
/// `C=HU,CN=client1.SmartGrid.SmartGridOperator` (here `client1`).
///
/// Takes the second comma-separated field, its first dot-separated segment,
/// and strips the three-character `CN=` prefix. Returns `None` when the DN
/// has no such field or the name is empty.
pub fn client_common_name_prefix(dn: &str) -> Option<&str> {
    let field = dn.split(',').nth(1)?;
    let segment = field.split('.').next()?;
    let (offset, _) = segment.char_indices().nth(COMMON_NAME_PREFIX_LEN)?;
    segment.get(offset..)
}

/// Leading dot-segment of the token consumer name.
pub fn consumer_name_prefix(consumer: &str) -> &str {
    consumer.split('.').next().unwrap_or(consumer)
}
