//! Order signing.
//!
//! Submissions carry an ECDSA signature over a canonical digest of the order
//! fields plus the nonce, so the submission API can verify who sent them and
//! tie each one to a unique position in the account's sequence.

use alloy::primitives::{keccak256, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use serde::Serialize;
use thiserror::Error;
use zeroize::Zeroizing;

/// Signing errors.
#[derive(Debug, Error)]
pub enum SignerError {
    #[error("Failed to decode hex key: {0}")]
    HexDecode(#[from] hex::FromHexError),

    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    #[error("Address mismatch: expected {expected}, derived {actual}")]
    AddressMismatch { expected: String, actual: String },

    #[error("Invalid order fields: {0}")]
    InvalidFields(String),

    #[error("Signing failed: {0}")]
    SigningFailed(#[from] alloy::signers::Error),
}

/// Hex-encoded 65-byte signature, 0x-prefixed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Signature(pub String);

/// Canonical fields covered by an order signature.
///
/// The digest must be stable across processes, so fields are hashed in
/// declaration order with length-prefixed strings and big-endian integers.
#[derive(Debug, Clone)]
pub struct OrderFields {
    pub opportunity_id: String,
    pub asset: String,
    pub side: String,
    /// Decimal rendering of the size, exactly as submitted.
    pub size: String,
    /// Decimal rendering of the price; empty for liquidations.
    pub price: String,
    pub nonce: u64,
}

impl OrderFields {
    fn validate(&self) -> Result<(), SignerError> {
        if self.opportunity_id.is_empty() {
            return Err(SignerError::InvalidFields(
                "opportunity id is empty".to_string(),
            ));
        }
        if self.asset.is_empty() {
            return Err(SignerError::InvalidFields("asset is empty".to_string()));
        }
        if self.size.is_empty() {
            return Err(SignerError::InvalidFields("size is empty".to_string()));
        }
        Ok(())
    }

    /// Canonical digest of the fields.
    pub fn digest(&self) -> B256 {
        fn push_str(data: &mut Vec<u8>, s: &str) {
            data.extend_from_slice(&(s.len() as u32).to_be_bytes());
            data.extend_from_slice(s.as_bytes());
        }

        let mut data = Vec::new();
        push_str(&mut data, &self.opportunity_id);
        push_str(&mut data, &self.asset);
        push_str(&mut data, &self.side);
        push_str(&mut data, &self.size);
        push_str(&mut data, &self.price);
        data.extend_from_slice(&self.nonce.to_be_bytes());
        keccak256(&data)
    }
}

/// Produces signatures binding order fields to this agent's key.
pub trait OrderSigner: Send + Sync {
    /// 0x-prefixed address of the signing key.
    fn address(&self) -> &str;

    /// Sign the canonical digest of `fields`.
    fn sign(&self, fields: &OrderFields) -> Result<Signature, SignerError>;
}

/// Signer backed by a local private key.
pub struct LocalOrderSigner {
    inner: PrivateKeySigner,
    address: String,
}

impl LocalOrderSigner {
    /// Build from a hex-encoded private key (0x prefix and surrounding
    /// whitespace tolerated). The key material is wiped after parsing.
    ///
    /// If `expected_address` is given, the derived address must match.
    pub fn from_hex_key(
        hex_key: &str,
        expected_address: Option<&str>,
    ) -> Result<Self, SignerError> {
        let trimmed = hex_key.trim().trim_start_matches("0x");
        let secret_bytes: Zeroizing<Vec<u8>> = Zeroizing::new(hex::decode(trimmed)?);

        let inner = PrivateKeySigner::from_slice(&secret_bytes)
            .map_err(|e| SignerError::InvalidKey(e.to_string()))?;
        let address = format!("{:#x}", inner.address());

        if let Some(expected) = expected_address {
            if !address.eq_ignore_ascii_case(expected) {
                return Err(SignerError::AddressMismatch {
                    expected: expected.to_string(),
                    actual: address,
                });
            }
        }

        Ok(Self { inner, address })
    }
}

impl OrderSigner for LocalOrderSigner {
    fn address(&self) -> &str {
        &self.address
    }

    fn sign(&self, fields: &OrderFields) -> Result<Signature, SignerError> {
        fields.validate()?;
        let digest = fields.digest();
        // Do not log the signature; it is submission-sensitive.
        let signature = self.inner.sign_hash_sync(&digest)?;
        Ok(Signature(format!("0x{}", hex::encode(signature.as_bytes()))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known test private key (DO NOT use in production).
    const TEST_PRIVATE_KEY: &str =
        "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn fields() -> OrderFields {
        OrderFields {
            opportunity_id: "rfq/42".to_string(),
            asset: "USDC".to_string(),
            side: "sell".to_string(),
            size: "1000".to_string(),
            price: "1.0005".to_string(),
            nonce: 17,
        }
    }

    #[test]
    fn test_signer_derives_address() {
        let signer = LocalOrderSigner::from_hex_key(TEST_PRIVATE_KEY, None).unwrap();
        assert!(signer.address().starts_with("0x"));
        assert_eq!(signer.address().len(), 42);
    }

    #[test]
    fn test_address_mismatch_rejected() {
        let result = LocalOrderSigner::from_hex_key(
            TEST_PRIVATE_KEY,
            Some("0x0000000000000000000000000000000000000000"),
        );
        assert!(matches!(result, Err(SignerError::AddressMismatch { .. })));
    }

    #[test]
    fn test_digest_changes_with_nonce() {
        let a = fields();
        let mut b = fields();
        b.nonce = 18;
        assert_ne!(a.digest(), b.digest());
    }

    #[test]
    fn test_digest_is_deterministic() {
        assert_eq!(fields().digest(), fields().digest());
    }

    #[test]
    fn test_sign_produces_65_byte_signature() {
        let signer = LocalOrderSigner::from_hex_key(TEST_PRIVATE_KEY, None).unwrap();
        let sig = signer.sign(&fields()).unwrap();
        assert!(sig.0.starts_with("0x"));
        assert_eq!(sig.0.len(), 2 + 65 * 2);
    }

    #[test]
    fn test_empty_fields_rejected() {
        let signer = LocalOrderSigner::from_hex_key(TEST_PRIVATE_KEY, None).unwrap();
        let mut bad = fields();
        bad.asset = String::new();
        assert!(matches!(
            signer.sign(&bad),
            Err(SignerError::InvalidFields(_))
        ));
    }
}
