//! Deterministic cryptographic fixtures for testing.
//!
//! RSA keypairs are generated from fixed seeds, once per process, and can be
//! written as PEM files into a temporary key directory.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tempfile::TempDir;

/// Seed of the authorization system's signing key.
pub const AUTHORIZATION_KEY_SEED: u64 = 0xA117;

/// Seed of the provider's token decryption key.
pub const PROVIDER_KEY_SEED: u64 = 0x9801;

/// Seed of a key nobody trusts.
pub const UNTRUSTED_KEY_SEED: u64 = 0xBAD;

/// Key size of fixture keys. Small enough to generate quickly in tests.
pub const TEST_KEY_BITS: usize = 1024;

/// Deterministic RSA private key for `seed`.
///
/// Keys are generated on first use and cached for the rest of the process.
/// The same seed always produces the same key.
pub fn test_rsa_key(seed: u64) -> RsaPrivateKey {
    static AUTHORIZATION: OnceLock<RsaPrivateKey> = OnceLock::new();
    static PROVIDER: OnceLock<RsaPrivateKey> = OnceLock::new();
    static UNTRUSTED: OnceLock<RsaPrivateKey> = OnceLock::new();

    let generate = || {
        let mut rng = StdRng::seed_from_u64(seed);
        RsaPrivateKey::new(&mut rng, TEST_KEY_BITS).expect("RSA key generation failed")
    };

    match seed {
        AUTHORIZATION_KEY_SEED => AUTHORIZATION.get_or_init(generate).clone(),
        PROVIDER_KEY_SEED => PROVIDER.get_or_init(generate).clone(),
        UNTRUSTED_KEY_SEED => UNTRUSTED.get_or_init(generate).clone(),
        _ => generate(),
    }
}

/// Temporary directory holding the fixture keys as PEM files.
///
/// The directory is deleted when the value is dropped.
pub struct KeyDir {
    dir: TempDir,
    authorization_public: PathBuf,
    provider_private: PathBuf,
    provider_public: PathBuf,
}

impl KeyDir {
    /// Write the authorization public key and the provider keypair.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create key directory");

        let authorization_public = dir.path().join("authorization.pub");
        write_public_key(&authorization_public, &Self::authorization_key().to_public_key());

        let provider = Self::provider_key();
        let provider_private = dir.path().join("provider.key");
        std::fs::write(
            &provider_private,
            provider
                .to_pkcs8_pem(LineEnding::LF)
                .expect("private key PEM encoding failed")
                .as_bytes(),
        )
        .expect("failed to write provider private key");

        let provider_public = dir.path().join("provider.pub");
        write_public_key(&provider_public, &provider.to_public_key());

        Self {
            dir,
            authorization_public,
            provider_private,
            provider_public,
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn authorization_public_path(&self) -> &Path {
        &self.authorization_public
    }

    pub fn provider_private_path(&self) -> &Path {
        &self.provider_private
    }

    pub fn provider_public_path(&self) -> &Path {
        &self.provider_public
    }

    /// Key that signs access tokens.
    pub fn authorization_key() -> RsaPrivateKey {
        test_rsa_key(AUTHORIZATION_KEY_SEED)
    }

    /// Key that access tokens are encrypted to.
    pub fn provider_key() -> RsaPrivateKey {
        test_rsa_key(PROVIDER_KEY_SEED)
    }
}

impl Default for KeyDir {
    fn default() -> Self {
        Self::new()
    }
}

fn write_public_key(path: &Path, key: &RsaPublicKey) {
    let pem = key
        .to_public_key_pem(LineEnding::LF)
        .expect("public key PEM encoding failed");
    std::fs::write(path, pem).expect("failed to write public key");
}
