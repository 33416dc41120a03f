use crate::core::errors::ClearNodeError;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use sha3::{Digest, Keccak256};
use std::fmt;

/// Signing capability used to authenticate request envelopes
///
/// Implementations sign arbitrary payload bytes and report the account address the
/// remote node will attribute the signature to.
pub trait MessageSigner: Send + Sync {
    /// Sign a payload and return the `0x`-prefixed hex signature
    fn sign(&self, payload: &[u8]) -> Result<String, ClearNodeError>;

    /// Address derived from the signing key
    fn address(&self) -> &str;
}

/// Normalize a 32-byte hex private key.
///
/// Accepts surrounding whitespace, matching single or double quotes and an optional
/// `0x` prefix. Returns the lowercase `0x`-prefixed 64 hex character form.
pub fn normalize_private_key(input: &str) -> Result<String, ClearNodeError> {
    let mut key = input.trim();
    if key.len() >= 2
        && ((key.starts_with('"') && key.ends_with('"'))
            || (key.starts_with('\'') && key.ends_with('\'')))
    {
        key = key[1..key.len() - 1].trim();
    }

    let body = key.strip_prefix("0x").map_or(key, str::trim);

    if body.len() != 64 || !body.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ClearNodeError::InvalidKeyFormat(
            "private key must be a 32-byte hex string (64 hex chars), with or without 0x"
                .to_string(),
        ));
    }

    Ok(format!("0x{}", body.to_ascii_lowercase()))
}

/// Keccak256 digest, as used for Ethereum-style message hashing
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// secp256k1 ECDSA signer producing Ethereum-style `r || s || v` signatures over keccak256
#[derive(Clone)]
pub struct EcdsaSigner {
    secret_key: SecretKey,
    address: String,
    secp: Secp256k1<secp256k1::All>,
}

impl fmt::Debug for EcdsaSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EcdsaSigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl EcdsaSigner {
    /// Create a signer from a private key in any format accepted by [`normalize_private_key`]
    pub fn from_private_key(private_key: &str) -> Result<Self, ClearNodeError> {
        let normalized = normalize_private_key(private_key)?;
        let bytes = hex::decode(&normalized[2..])
            .map_err(|e| ClearNodeError::InvalidKeyFormat(format!("Invalid private key hex: {}", e)))?;
        let secret_key = SecretKey::from_slice(&bytes)
            .map_err(|e| ClearNodeError::InvalidKeyFormat(format!("Invalid private key: {}", e)))?;

        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);

        Ok(Self {
            secret_key,
            address: public_key_to_address(&public_key),
            secp,
        })
    }
}

impl MessageSigner for EcdsaSigner {
    fn sign(&self, payload: &[u8]) -> Result<String, ClearNodeError> {
        let digest = keccak256(payload);
        let message = Message::from_digest_slice(&digest)
            .map_err(|e| ClearNodeError::SigningError(format!("Failed to create message: {}", e)))?;

        let signature = self.secp.sign_ecdsa_recoverable(&message, &self.secret_key);
        let (recovery_id, compact) = signature.serialize_compact();

        let mut sig_with_recovery = [0u8; 65];
        sig_with_recovery[..64].copy_from_slice(&compact);
        sig_with_recovery[64] = 27 + recovery_id.to_i32() as u8;

        Ok(format!("0x{}", hex::encode(sig_with_recovery)))
    }

    fn address(&self) -> &str {
        &self.address
    }
}

fn public_key_to_address(public_key: &PublicKey) -> String {
    let public_key_bytes = public_key.serialize_uncompressed();

    // Skip the 0x04 uncompressed marker; address is the last 20 bytes of the hash
    let hash = keccak256(&public_key_bytes[1..]);
    format!("0x{}", hex::encode(&hash[12..]))
}
