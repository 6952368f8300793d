//! Access token builder.
//!
//! Produces tokens the way the authorization system issues them: the JSON
//! claim set is RSA PKCS#1 v1.5 encrypted to the provider public key, and
//! the ciphertext is signed SHA256withRSA with the authorization key. Both
//! are carried as standard base64.

use crate::crypto_fixtures::{test_rsa_key, KeyDir, UNTRUSTED_KEY_SEED};
use crate::test_ids::{CONSUMER_COMMON_NAME, SERVICE_INTERFACE, TEMPERATURE_DEFINITION};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rsa::pkcs1v15::SigningKey;
use rsa::sha2::Sha256;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use serde_json::{Map, Value};

/// Encoded token and signature as sent in the secure read query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestToken {
    pub token: String,
    pub signature: String,
}

impl TestToken {
    /// Query string with both values left unescaped, so any `+` arrives as
    /// a space after form decoding.
    pub fn raw_query(&self) -> String {
        format!("token={}&signature={}", self.token, self.signature)
    }

    /// Query pairs for `reqwest::RequestBuilder::query`, which escapes them.
    pub fn query_pairs(&self) -> [(&'static str, String); 2] {
        [
            ("token", self.token.clone()),
            ("signature", self.signature.clone()),
        ]
    }
}

/// Builder for test access tokens.
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new()
///     .for_service("json", "Temperature")
///     .expires_at(1_700_000_000)
///     .build();
/// ```
pub struct TestTokenBuilder {
    claims: Map<String, Value>,
    signer: Option<RsaPrivateKey>,
    encryption_key: Option<RsaPublicKey>,
    rng_seed: u64,
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestTokenBuilder {
    /// Token for the fixture temperature service and consumer, never expiring.
    pub fn new() -> Self {
        let mut claims = Map::new();
        claims.insert(
            "s".to_string(),
            Value::from(format!("{}.{}", SERVICE_INTERFACE, TEMPERATURE_DEFINITION)),
        );
        claims.insert("c".to_string(), Value::from(CONSUMER_COMMON_NAME));
        claims.insert("e".to_string(), Value::from(0u64));

        Self {
            claims,
            signer: None,
            encryption_key: None,
            rng_seed: 7,
        }
    }

    pub fn for_service(mut self, interface: &str, definition: &str) -> Self {
        self.claims.insert(
            "s".to_string(),
            Value::from(format!("{}.{}", interface, definition)),
        );
        self
    }

    pub fn for_consumer(mut self, common_name: &str) -> Self {
        self.claims
            .insert("c".to_string(), Value::from(common_name));
        self
    }

    pub fn expires_at(mut self, unix_seconds: u64) -> Self {
        self.claims
            .insert("e".to_string(), Value::from(unix_seconds));
        self
    }

    /// Expiry `seconds` from now.
    pub fn expires_in(self, seconds: i64) -> Self {
        let expiry = chrono::Utc::now().timestamp() + seconds;
        self.expires_at(u64::try_from(expiry).expect("expiry before the epoch"))
    }

    /// Expired one minute ago.
    pub fn expired(self) -> Self {
        self.expires_in(-60)
    }

    /// Drop a claim (`s`, `c` or `e`).
    pub fn without_claim(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    /// Add an arbitrary claim.
    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    /// Sign with a key the provider does not trust.
    pub fn signed_by_untrusted_key(mut self) -> Self {
        self.signer = Some(test_rsa_key(UNTRUSTED_KEY_SEED));
        self
    }

    /// Encrypt to a key other than the provider's.
    pub fn encrypted_to(mut self, key: RsaPublicKey) -> Self {
        self.encryption_key = Some(key);
        self
    }

    /// Seed of the padding RNG; different seeds give different ciphertexts.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = seed;
        self
    }

    /// Claim set as JSON.
    pub fn claims_json(&self) -> String {
        Value::Object(self.claims.clone()).to_string()
    }

    /// Encrypt and sign with the fixture keys.
    pub fn build(self) -> TestToken {
        let encryption_key = self
            .encryption_key
            .clone()
            .unwrap_or_else(|| KeyDir::provider_key().to_public_key());
        let signer = self
            .signer
            .clone()
            .unwrap_or_else(KeyDir::authorization_key);

        let mut rng = StdRng::seed_from_u64(self.rng_seed);
        let ciphertext = encryption_key
            .encrypt(&mut rng, Pkcs1v15Encrypt, self.claims_json().as_bytes())
            .expect("token encryption failed");
        let signature = SigningKey::<Sha256>::new(signer)
            .sign(&ciphertext)
            .to_vec();

        TestToken {
            token: STANDARD.encode(ciphertext),
            signature: STANDARD.encode(signature),
        }
    }
}
