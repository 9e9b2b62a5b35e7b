//! RSA-SHA256 record signatures
//!
//! The signed payload covers the document id and the SHA-256 of both
//! ciphertexts, never the plaintext, so a record can be authenticated
//! without decrypting it:
//!
//! ```text
//! {"documentId":"...","contentHash":"<hex>","metadataHash":"<hex>"}
//! ```
//!
//! Signature: RSASSA-PKCS1-v1_5 / SHA-256, base64-encoded.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::cipher::Envelope;
use crate::error::{CryptoError, CryptoResult};
use crate::sha256_hex;

/// Modulus size for generated signing keys
pub const RSA_KEY_BITS: usize = 2048;

/// An RSA key pair used to sign and verify document records.
#[derive(Clone)]
pub struct DocumentKeyPair {
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
}

impl DocumentKeyPair {
    pub fn from_private_key(private_key: RsaPrivateKey) -> Self {
        let public_key = private_key.to_public_key();
        Self {
            private_key,
            public_key,
        }
    }

    /// Load from a PKCS#8 PEM private key.
    pub fn from_private_pem(pem: &str) -> CryptoResult<Self> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(pem)
            .map_err(|e| CryptoError::Key(format!("parsing private key: {e}")))?;
        Ok(Self::from_private_key(private_key))
    }

    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    /// PKCS#8 PEM of the private key. Zeroized on drop.
    pub fn private_key_pem(&self) -> CryptoResult<Zeroizing<String>> {
        self.private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| CryptoError::Key(format!("encoding private key: {e}")))
    }

    /// SubjectPublicKeyInfo PEM of the public key.
    pub fn public_key_pem(&self) -> CryptoResult<String> {
        public_key_to_pem(&self.public_key)
    }
}

impl std::fmt::Debug for DocumentKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentKeyPair")
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

pub fn public_key_to_pem(public_key: &RsaPublicKey) -> CryptoResult<String> {
    public_key
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| CryptoError::Key(format!("encoding public key: {e}")))
}

pub fn public_key_from_pem(pem: &str) -> CryptoResult<RsaPublicKey> {
    RsaPublicKey::from_public_key_pem(pem)
        .map_err(|e| CryptoError::Key(format!("parsing public key: {e}")))
}

/// What a record signature commits to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignaturePayload {
    pub document_id: String,
    /// SHA-256 of the content ciphertext (hex)
    pub content_hash: String,
    /// SHA-256 of the metadata ciphertext (hex)
    pub metadata_hash: String,
}

impl SignaturePayload {
    pub fn for_envelopes(document_id: &str, content: &Envelope, metadata: &Envelope) -> Self {
        Self {
            document_id: document_id.to_string(),
            content_hash: sha256_hex(&content.ciphertext),
            metadata_hash: sha256_hex(&metadata.ciphertext),
        }
    }

    /// Canonical bytes: compact JSON in field declaration order.
    fn canonical_bytes(&self) -> CryptoResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Generate a fresh RSA-2048 key pair.
pub fn generate_key_pair() -> CryptoResult<DocumentKeyPair> {
    let private_key = RsaPrivateKey::new(&mut rand::thread_rng(), RSA_KEY_BITS)
        .map_err(|e| CryptoError::Key(format!("RSA key generation failed: {e}")))?;
    Ok(DocumentKeyPair::from_private_key(private_key))
}

/// Sign a payload, returning a base64 signature.
pub fn sign(payload: &SignaturePayload, private_key: &RsaPrivateKey) -> CryptoResult<String> {
    let message = payload.canonical_bytes()?;
    let signing_key = SigningKey::<Sha256>::new(private_key.clone());
    let signature = signing_key
        .try_sign(&message)
        .map_err(|e| CryptoError::Signing(e.to_string()))?;
    Ok(STANDARD.encode(signature.to_bytes()))
}

/// Check a base64 signature.
///
/// Malformed signatures, wrong keys, and tampered payloads all yield
/// `false`; this never errors.
pub fn verify(payload: &SignaturePayload, signature: &str, public_key: &RsaPublicKey) -> bool {
    let Ok(message) = payload.canonical_bytes() else {
        return false;
    };
    let Ok(raw) = STANDARD.decode(signature.as_bytes()) else {
        return false;
    };
    let Ok(signature) = Signature::try_from(raw.as_slice()) else {
        return false;
    };

    let verifying_key = VerifyingKey::<Sha256>::new(public_key.clone());
    match verifying_key.verify(&message, &signature) {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!("signature verification failed: {e}");
            false
        }
    }
}
