//! RSA primitives behind access token verification.
//!
//! Tokens are RSA PKCS#1 v1.5 encrypted to the provider's public key and
//! signed SHA256withRSA over the ciphertext by the authorization system.
//! [`TokenCipher`] is the seam the token verifier depends on.

use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::sha2::Sha256;
use rsa::signature::Verifier;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, warn};

const PEM_ARMOR_PREFIX: &str = "-----";

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("failed to load key from {path}: {reason}")]
    KeyLoad { path: String, reason: String },

    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("no authorization public key configured")]
    NoAuthorizationKey,

    #[error("signature does not verify")]
    InvalidSignature,

    #[error("decryption failed")]
    Decrypt,
}

/// Capability to check token signatures and decrypt token ciphertext.
pub trait TokenCipher: Send + Sync {
    /// Verify `signature` over `data` with the authorization system's public key.
    fn verify_signature(&self, data: &[u8], signature: &[u8]) -> Result<(), CryptoError>;

    /// Decrypt `ciphertext` with the private key stored at `private_key_path`.
    fn decrypt(&self, private_key_path: &Path, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError>;
}

/// [`TokenCipher`] backed by the `rsa` crate.
///
/// Provider private keys are loaded on first use and cached by path.
pub struct RsaTokenCipher {
    authorization_key: Option<VerifyingKey<Sha256>>,
    private_keys: Mutex<HashMap<PathBuf, Arc<RsaPrivateKey>>>,
}

impl RsaTokenCipher {
    pub fn new(authorization_key: Option<RsaPublicKey>) -> Self {
        Self {
            authorization_key: authorization_key.map(VerifyingKey::<Sha256>::new),
            private_keys: Mutex::new(HashMap::new()),
        }
    }

    /// Build from an optional authorization public key file.
    pub fn from_key_file(path: Option<&Path>) -> Result<Self, CryptoError> {
        let key = match path {
            Some(path) => Some(load_public_key(path)?),
            None => {
                warn!(
                    target: "provider.crypto",
                    "No authorization public key configured, secure reads will be denied"
                );
                None
            }
        };
        Ok(Self::new(key))
    }

    fn private_key(&self, path: &Path) -> Result<Arc<RsaPrivateKey>, CryptoError> {
        if let Some(key) = self
            .private_keys
            .lock()
            .map_err(|_| CryptoError::InvalidKey("key cache poisoned".to_string()))?
            .get(path)
        {
            return Ok(Arc::clone(key));
        }

        let key = Arc::new(load_private_key(path)?);
        debug!(target: "provider.crypto", path = %path.display(), "Loaded provider private key");

        self.private_keys
            .lock()
            .map_err(|_| CryptoError::InvalidKey("key cache poisoned".to_string()))?
            .insert(path.to_path_buf(), Arc::clone(&key));
        Ok(key)
    }
}

impl TokenCipher for RsaTokenCipher {
    fn verify_signature(&self, data: &[u8], signature: &[u8]) -> Result<(), CryptoError> {
        let key = self
            .authorization_key
            .as_ref()
            .ok_or(CryptoError::NoAuthorizationKey)?;
        let signature = Signature::try_from(signature).map_err(|_| CryptoError::InvalidSignature)?;
        key.verify(data, &signature)
            .map_err(|_| CryptoError::InvalidSignature)
    }

    fn decrypt(&self, private_key_path: &Path, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let key = self.private_key(private_key_path)?;
        key.decrypt(Pkcs1v15Encrypt, ciphertext)
            .map_err(|_| CryptoError::Decrypt)
    }
}

fn read_pem(path: &Path) -> Result<SecretString, CryptoError> {
    std::fs::read_to_string(path)
        .map(SecretString::from)
        .map_err(|e| CryptoError::KeyLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
}

/// Load an RSA public key from a PEM file (SPKI or PKCS#1).
pub fn load_public_key(path: &Path) -> Result<RsaPublicKey, CryptoError> {
    let pem = read_pem(path)?;
    parse_public_key_pem(pem.expose_secret())
}

/// Load an RSA private key from a PEM file (PKCS#8 or PKCS#1).
pub fn load_private_key(path: &Path) -> Result<RsaPrivateKey, CryptoError> {
    let pem = read_pem(path)?;
    parse_private_key_pem(pem.expose_secret())
}

pub fn parse_public_key_pem(pem: &str) -> Result<RsaPublicKey, CryptoError> {
    RsaPublicKey::from_public_key_pem(pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
        .map_err(|e| CryptoError::InvalidKey(format!("public key: {}", e)))
}

pub fn parse_private_key_pem(pem: &str) -> Result<RsaPrivateKey, CryptoError> {
    RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
        .map_err(|e| CryptoError::InvalidKey(format!("private key: {}", e)))
}

/// Registry `authenticationInfo` for a public key: the PEM body without its
/// armor lines, as one unbroken base64 string.
pub fn authentication_info_from_pem(pem: &str) -> Result<String, CryptoError> {
    let body: String = pem
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with(PEM_ARMOR_PREFIX))
        .collect();

    if body.is_empty() {
        return Err(CryptoError::InvalidKey(
            "public key PEM has no body".to_string(),
        ));
    }
    Ok(body)
}

/// Read a public key file and turn it into registry `authenticationInfo`.
pub fn authentication_info_from_file(path: &Path) -> Result<String, CryptoError> {
    let pem = std::fs::read_to_string(path).map_err(|e| CryptoError::KeyLoad {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    // Validate before advertising it to the registry
    parse_public_key_pem(&pem)?;
    authentication_info_from_pem(&pem)
}
