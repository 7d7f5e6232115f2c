//! Signing gateway
//!
//! The external signer is an opaque, non-deterministic capability: it
//! either produces a signature or it does not. It is modeled as a
//! single-method trait so wallets, hardware signers, and deterministic
//! test stubs are interchangeable. The gateway never retries internally;
//! retry is a user-facing decision owned by the submission engine.

use async_trait::async_trait;
use ed25519_dalek::{Signer as _, SigningKey};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::types::{Address, SignablePayload, TxSignature};

/// External signer contract
///
/// `None` means no signature was obtained — the user declined, or the
/// signer was unavailable and onboarding was triggered instead. The two
/// cases are distinguished by the caller, not by this return type, and
/// neither is an error.
#[async_trait]
pub trait PayloadSigner: Send + Sync {
    async fn sign(&self, payload: &SignablePayload) -> Option<TxSignature>;
}

/// Deterministic in-process signer over an ed25519 key
///
/// Signs the SHA-256 digest of the payload's canonical bytes. Used by the
/// CLI and as the reference implementation in tests; the key material is
/// zeroized on drop by the underlying signing key.
pub struct LocalSigner {
    key: SigningKey,
    address: Address,
}

impl LocalSigner {
    /// Build a signer from a 32-byte seed
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let key = SigningKey::from_bytes(&seed);
        let address = derive_address(&key);
        Self { key, address }
    }

    /// Load a signer from a hex seed file (`0x` prefix optional)
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let mut content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read key file {path}: {e}"))?;
        let trimmed = content.trim().trim_start_matches("0x");
        let mut bytes = hex::decode(trimmed)
            .map_err(|e| anyhow::anyhow!("key file {path} is not valid hex: {e}"))?;
        if bytes.len() != 32 {
            bytes.zeroize();
            content.zeroize();
            anyhow::bail!("key file {path} must hold a 32-byte seed");
        }
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&bytes);
        bytes.zeroize();
        content.zeroize();
        let signer = Self::from_seed(seed);
        seed.zeroize();
        Ok(signer)
    }

    /// The wallet address this signer acts as
    pub fn address(&self) -> &Address {
        &self.address
    }
}

#[async_trait]
impl PayloadSigner for LocalSigner {
    async fn sign(&self, payload: &SignablePayload) -> Option<TxSignature> {
        let signature = self.key.sign(&payload.digest());
        Some(TxSignature::from_bytes(signature.to_bytes().to_vec()))
    }
}

/// Ledger address derivation: first 20 bytes of SHA-256 of the public key
fn derive_address(key: &SigningKey) -> Address {
    let digest = Sha256::digest(key.verifying_key().as_bytes());
    let mut short = [0u8; 20];
    short.copy_from_slice(&digest[..20]);
    Address::from_bytes(&short)
}
