//! Encrypted document records: content + metadata envelopes under one
//! per-document key, optionally signed.
//!
//! Both envelopes share the key but each gets its own random IV; reusing a
//! (key, IV) pair under GCM would break confidentiality and integrity.

use rsa::{RsaPrivateKey, RsaPublicKey};
use secrecy::SecretString;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use zeroize::Zeroizing;

use crate::cipher::{self, Envelope};
use crate::error::{CryptoError, CryptoResult};
use crate::kdf::{derive_document_key, KdfParams};
use crate::signer::{self, SignaturePayload};

/// Durable on-disk form of one stored document. Write-once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedDocumentRecord {
    pub id: String,
    pub encrypted_content: Envelope,
    pub encrypted_metadata: Envelope,
    /// Base64 RSA-SHA256 signature over [`SignaturePayload`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// Unix timestamp (seconds)
    pub created_at: u64,
    pub updated_at: u64,
}

impl EncryptedDocumentRecord {
    pub fn signature_payload(&self) -> SignaturePayload {
        SignaturePayload::for_envelopes(&self.id, &self.encrypted_content, &self.encrypted_metadata)
    }

    pub fn to_json_bytes(&self) -> CryptoResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(data: &[u8]) -> CryptoResult<Self> {
        serde_json::from_slice(data).map_err(|e| CryptoError::MalformedEnvelope(e.to_string()))
    }
}

/// Plaintext recovered from a record.
pub struct DisassembledDocument<M> {
    pub content: Zeroizing<Vec<u8>>,
    pub metadata: M,
    /// True only when a signature was present and checked out
    pub verified: bool,
}

/// Encrypt `content` and `metadata` for `document_id`.
///
/// The document key is derived once and used for two separate encryptions.
/// When `signing_key` is given the record is signed over its ciphertext
/// hashes.
pub fn assemble<M: Serialize>(
    document_id: &str,
    content: &[u8],
    metadata: &M,
    master_key: &SecretString,
    signing_key: Option<&RsaPrivateKey>,
    params: &KdfParams,
) -> CryptoResult<EncryptedDocumentRecord> {
    let key = derive_document_key(document_id, master_key, params)?;

    let metadata_json = Zeroizing::new(serde_json::to_vec(metadata)?);
    let encrypted_content = cipher::encrypt(content, &key)?;
    let encrypted_metadata = cipher::encrypt(&metadata_json, &key)?;

    let now = unix_now();
    let mut record = EncryptedDocumentRecord {
        id: document_id.to_string(),
        encrypted_content,
        encrypted_metadata,
        signature: None,
        created_at: now,
        updated_at: now,
    };

    if let Some(private_key) = signing_key {
        record.signature = Some(signer::sign(&record.signature_payload(), private_key)?);
    }

    Ok(record)
}

/// Decrypt both envelopes of `record`.
///
/// Signature verification runs only when the record carries a signature and
/// a public key is supplied; otherwise `verified` is false and no error is
/// raised.
pub fn disassemble<M: DeserializeOwned>(
    record: &EncryptedDocumentRecord,
    master_key: &SecretString,
    verifying_key: Option<&RsaPublicKey>,
    params: &KdfParams,
) -> CryptoResult<DisassembledDocument<M>> {
    let key = derive_document_key(&record.id, master_key, params)?;

    let content = cipher::decrypt(&record.encrypted_content, &key)?;
    let metadata_json = cipher::decrypt(&record.encrypted_metadata, &key)?;
    let metadata = serde_json::from_slice(&metadata_json)?;

    let verified = match (&record.signature, verifying_key) {
        (Some(signature), Some(public_key)) => {
            signer::verify(&record.signature_payload(), signature, public_key)
        }
        _ => false,
    };

    Ok(DisassembledDocument {
        content,
        metadata,
        verified,
    })
}

/// Decrypt a standalone metadata envelope belonging to `document_id`.
pub fn decrypt_metadata<M: DeserializeOwned>(
    document_id: &str,
    envelope: &Envelope,
    master_key: &SecretString,
    params: &KdfParams,
) -> CryptoResult<M> {
    let key = derive_document_key(document_id, master_key, params)?;
    let metadata_json = cipher::decrypt(envelope, &key)?;
    Ok(serde_json::from_slice(&metadata_json)?)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::tests::test_key_pairs;
    use serde_json::json;

    fn fast_params() -> KdfParams {
        KdfParams {
            pbkdf2_iterations: 10,
            scrypt_log_n: 4,
            scrypt_r: 8,
            scrypt_p: 1,
        }
    }

    fn master() -> SecretString {
        SecretString::from("master-key")
    }

    #[test]
    fn test_assemble_disassemble_unsigned() {
        let metadata = json!({"originalName": "a.txt", "size": 5});
        let record = assemble("doc-1", b"hello", &metadata, &master(), None, &fast_params()).unwrap();

        assert!(record.signature.is_none());
        assert_eq!(record.id, "doc-1");

        let doc: DisassembledDocument<serde_json::Value> =
            disassemble(&record, &master(), None, &fast_params()).unwrap();
        assert_eq!(doc.content.as_slice(), b"hello");
        assert_eq!(doc.metadata, metadata);
        assert!(!doc.verified);
    }

    #[test]
    fn test_envelopes_use_distinct_ivs() {
        let record = assemble("doc-1", b"hello", &json!({}), &master(), None, &fast_params()).unwrap();
        assert_ne!(record.encrypted_content.iv, record.encrypted_metadata.iv);
        assert_eq!(record.encrypted_content.salt, record.encrypted_metadata.salt);
    }

    #[test]
    fn test_signed_record_verifies() {
        let (pair, _) = test_key_pairs();
        let record = assemble(
            "doc-2",
            b"signed content",
            &json!({"k": "v"}),
            &master(),
            Some(pair.private_key()),
            &fast_params(),
        )
        .unwrap();
        assert!(record.signature.is_some());

        let doc: DisassembledDocument<serde_json::Value> =
            disassemble(&record, &master(), Some(pair.public_key()), &fast_params()).unwrap();
        assert!(doc.verified);
        assert_eq!(doc.content.as_slice(), b"signed content");
    }

    #[test]
    fn test_unsigned_record_with_public_key_is_unverified() {
        let (pair, _) = test_key_pairs();
        let record = assemble("doc-3", b"x", &json!({}), &master(), None, &fast_params()).unwrap();

        let doc: DisassembledDocument<serde_json::Value> =
            disassemble(&record, &master(), Some(pair.public_key()), &fast_params()).unwrap();
        assert!(!doc.verified);
    }

    #[test]
    fn test_mismatched_public_key_is_unverified() {
        let (a, b) = test_key_pairs();
        let record = assemble(
            "doc-4",
            b"x",
            &json!({}),
            &master(),
            Some(a.private_key()),
            &fast_params(),
        )
        .unwrap();

        let doc: DisassembledDocument<serde_json::Value> =
            disassemble(&record, &master(), Some(b.public_key()), &fast_params()).unwrap();
        assert!(!doc.verified);
        assert_eq!(doc.content.as_slice(), b"x");
    }

    #[test]
    fn test_signature_fails_after_envelope_swap() {
        let (pair, _) = test_key_pairs();
        let mut record = assemble(
            "doc-5",
            b"original",
            &json!({}),
            &master(),
            Some(pair.private_key()),
            &fast_params(),
        )
        .unwrap();
        let other = assemble("doc-5", b"replaced", &json!({}), &master(), None, &fast_params()).unwrap();
        record.encrypted_content = other.encrypted_content;

        let doc: DisassembledDocument<serde_json::Value> =
            disassemble(&record, &master(), Some(pair.public_key()), &fast_params()).unwrap();
        assert_eq!(doc.content.as_slice(), b"replaced");
        assert!(!doc.verified, "swapped ciphertext must not verify");
    }

    #[test]
    fn test_wrong_master_key_fails_decryption() {
        let record = assemble("doc-6", b"secret", &json!({}), &master(), None, &fast_params()).unwrap();
        let result: CryptoResult<DisassembledDocument<serde_json::Value>> =
            disassemble(&record, &SecretString::from("wrong"), None, &fast_params());
        assert!(matches!(result, Err(CryptoError::Decryption)));
    }

    #[test]
    fn test_record_json_roundtrip() {
        let (pair, _) = test_key_pairs();
        let record = assemble(
            "doc-7",
            b"bytes",
            &json!({"a": 1}),
            &master(),
            Some(pair.private_key()),
            &fast_params(),
        )
        .unwrap();

        let bytes = record.to_json_bytes().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(value.get("encryptedContent").is_some());
        assert!(value.get("encryptedMetadata").is_some());
        assert!(value.get("createdAt").is_some());

        let parsed = EncryptedDocumentRecord::from_json(&bytes).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_decrypt_metadata_only() {
        let record = assemble(
            "doc-8",
            b"content",
            &json!({"name": "n"}),
            &master(),
            None,
            &fast_params(),
        )
        .unwrap();
        let metadata: serde_json::Value =
            decrypt_metadata("doc-8", &record.encrypted_metadata, &master(), &fast_params()).unwrap();
        assert_eq!(metadata["name"], "n");

        let wrong_id: CryptoResult<serde_json::Value> =
            decrypt_metadata("doc-9", &record.encrypted_metadata, &master(), &fast_params());
        assert!(matches!(wrong_id, Err(CryptoError::Decryption)));
    }
}
