//! AES-256-GCM envelopes
//!
//! Wire format (JSON, camelCase keys, standard base64):
//! ```text
//! {
//!   "ciphertext": "...",            // same length as the plaintext
//!   "iv": "...",                    // 16 random bytes, fresh per call
//!   "authTag": "...",               // 16-byte GCM tag
//!   "salt": "...",                  // 32-byte KDF salt of the key
//!   "algorithm": "aes-256-gcm",
//!   "keyDerivationMethod": "pbkdf2-sha256" | "scrypt"
//! }
//! ```
//!
//! This shape plus the right key material is all a reader ever needs.

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::AesGcm;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{CryptoError, CryptoResult};
use crate::kdf::{EncryptionKey, KeyDerivationMethod};
use crate::{IV_SIZE, SALT_SIZE, TAG_SIZE};

/// AES-256-GCM with a 128-bit IV
type Aes256Gcm16 = AesGcm<Aes256, U16>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CipherAlgorithm {
    #[serde(rename = "aes-256-gcm")]
    Aes256Gcm,
}

/// Self-describing encryption output. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(with = "b64")]
    pub ciphertext: Vec<u8>,
    #[serde(with = "b64")]
    pub iv: [u8; IV_SIZE],
    #[serde(with = "b64")]
    pub auth_tag: [u8; TAG_SIZE],
    #[serde(with = "b64")]
    pub salt: [u8; SALT_SIZE],
    pub algorithm: CipherAlgorithm,
    pub key_derivation_method: KeyDerivationMethod,
}

impl Envelope {
    pub fn to_json(&self) -> CryptoResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_bytes(&self) -> CryptoResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse an envelope. Wrong field lengths or unknown tags are malformed.
    pub fn from_json(data: &[u8]) -> CryptoResult<Self> {
        serde_json::from_slice(data).map_err(|e| CryptoError::MalformedEnvelope(e.to_string()))
    }
}

/// Encrypt `plaintext` under `key` with a fresh random IV.
pub fn encrypt(plaintext: &[u8], key: &EncryptionKey) -> CryptoResult<Envelope> {
    let cipher = Aes256Gcm16::new(key.as_bytes().into());

    let mut iv = [0u8; IV_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);

    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(GenericArray::from_slice(&iv), b"", &mut buffer)
        .map_err(|_| CryptoError::Encryption)?;

    let mut auth_tag = [0u8; TAG_SIZE];
    auth_tag.copy_from_slice(&tag);

    Ok(Envelope {
        ciphertext: buffer,
        iv,
        auth_tag,
        salt: *key.salt(),
        algorithm: CipherAlgorithm::Aes256Gcm,
        key_derivation_method: key.method(),
    })
}

/// Decrypt an envelope.
///
/// The tag is checked before anything is returned; on failure the working
/// buffer is zeroed and dropped, so no unauthenticated bytes escape.
pub fn decrypt(envelope: &Envelope, key: &EncryptionKey) -> CryptoResult<Zeroizing<Vec<u8>>> {
    let cipher = Aes256Gcm16::new(key.as_bytes().into());
    let mut buffer = Zeroizing::new(envelope.ciphertext.clone());

    cipher
        .decrypt_in_place_detached(
            GenericArray::from_slice(&envelope.iv),
            b"",
            buffer.as_mut_slice(),
            GenericArray::from_slice(&envelope.auth_tag),
        )
        .map_err(|_| CryptoError::Decryption)?;

    Ok(buffer)
}

/// serde helpers: bytes ⇄ standard base64 strings
mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S, T>(bytes: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: AsRef<[u8]>,
    {
        serializer.serialize_str(&STANDARD.encode(bytes.as_ref()))
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: TryFrom<Vec<u8>>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = STANDARD.decode(s.as_bytes()).map_err(de::Error::custom)?;
        let len = bytes.len();
        T::try_from(bytes).map_err(|_| de::Error::custom(format!("unexpected length {len}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KEY_SIZE;
    use proptest::prelude::*;

    fn test_key(byte: u8) -> EncryptionKey {
        EncryptionKey::new(
            [byte; KEY_SIZE],
            [0x5Au8; SALT_SIZE],
            KeyDerivationMethod::Pbkdf2Sha256,
        )
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = test_key(1);
        let plaintext = b"hello, encrypted world!";

        let envelope = encrypt(plaintext, &key).unwrap();
        let decrypted = decrypt(&envelope, &key).unwrap();

        assert_eq!(decrypted.as_slice(), plaintext);
    }

    #[test]
    fn test_encrypt_decrypt_empty() {
        let key = test_key(1);
        let envelope = encrypt(b"", &key).unwrap();
        assert!(envelope.ciphertext.is_empty());
        assert_eq!(decrypt(&envelope, &key).unwrap().as_slice(), b"");
    }

    #[test]
    fn test_ciphertext_length_matches_plaintext() {
        let key = test_key(1);
        let plaintext = vec![0u8; 1000];
        let envelope = encrypt(&plaintext, &key).unwrap();
        assert_eq!(envelope.ciphertext.len(), 1000);
    }

    #[test]
    fn test_fresh_iv_per_call() {
        let key = test_key(1);
        let a = encrypt(b"same", &key).unwrap();
        let b = encrypt(b"same", &key).unwrap();
        assert_ne!(a.iv, b.iv, "IV must never repeat for the same key");
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_envelope_carries_key_salt_and_method() {
        let key = EncryptionKey::new([1; KEY_SIZE], [7; SALT_SIZE], KeyDerivationMethod::Scrypt);
        let envelope = encrypt(b"x", &key).unwrap();
        assert_eq!(envelope.salt, [7; SALT_SIZE]);
        assert_eq!(envelope.key_derivation_method, KeyDerivationMethod::Scrypt);
        assert_eq!(envelope.algorithm, CipherAlgorithm::Aes256Gcm);
    }

    #[test]
    fn test_decrypt_wrong_key() {
        let envelope = encrypt(b"secret data", &test_key(1)).unwrap();
        let result = decrypt(&envelope, &test_key(2));
        assert!(matches!(result, Err(CryptoError::Decryption)));
    }

    #[test]
    fn test_json_shape() {
        let envelope = encrypt(b"abc", &test_key(1)).unwrap();
        let json: serde_json::Value = serde_json::from_str(&envelope.to_json().unwrap()).unwrap();

        for field in ["ciphertext", "iv", "authTag", "salt", "algorithm", "keyDerivationMethod"] {
            assert!(json.get(field).is_some(), "missing field {field}");
        }
        assert_eq!(json["algorithm"], "aes-256-gcm");
        assert_eq!(json["keyDerivationMethod"], "pbkdf2-sha256");
    }

    #[test]
    fn test_json_roundtrip_decrypts() {
        let key = test_key(3);
        let envelope = encrypt(b"persisted", &key).unwrap();
        let parsed = Envelope::from_json(&envelope.to_json_bytes().unwrap()).unwrap();
        assert_eq!(parsed, envelope);
        assert_eq!(decrypt(&parsed, &key).unwrap().as_slice(), b"persisted");
    }

    #[test]
    fn test_malformed_iv_length_rejected() {
        let envelope = encrypt(b"abc", &test_key(1)).unwrap();
        let mut json: serde_json::Value =
            serde_json::from_str(&envelope.to_json().unwrap()).unwrap();
        json["iv"] = serde_json::Value::String("AAAA".into());

        let result = Envelope::from_json(json.to_string().as_bytes());
        assert!(matches!(result, Err(CryptoError::MalformedEnvelope(_))));
    }

    proptest! {
        #[test]
        fn roundtrip(data in proptest::collection::vec(any::<u8>(), 0..=2048), k in any::<u8>()) {
            let key = test_key(k);
            let envelope = encrypt(&data, &key).unwrap();
            let decrypted = decrypt(&envelope, &key).unwrap();
            prop_assert_eq!(decrypted.as_slice(), data.as_slice());
        }

        #[test]
        fn ciphertext_bit_flip_detected(
            data in proptest::collection::vec(any::<u8>(), 1..=512),
            pos in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let key = test_key(9);
            let mut envelope = encrypt(&data, &key).unwrap();
            let i = pos.index(envelope.ciphertext.len());
            envelope.ciphertext[i] ^= 1 << bit;
            prop_assert!(matches!(decrypt(&envelope, &key), Err(CryptoError::Decryption)));
        }

        #[test]
        fn iv_bit_flip_detected(pos in 0usize..IV_SIZE, bit in 0u8..8) {
            let key = test_key(9);
            let mut envelope = encrypt(b"integrity matters", &key).unwrap();
            envelope.iv[pos] ^= 1 << bit;
            prop_assert!(matches!(decrypt(&envelope, &key), Err(CryptoError::Decryption)));
        }

        #[test]
        fn tag_bit_flip_detected(pos in 0usize..TAG_SIZE, bit in 0u8..8) {
            let key = test_key(9);
            let mut envelope = encrypt(b"integrity matters", &key).unwrap();
            envelope.auth_tag[pos] ^= 1 << bit;
            prop_assert!(matches!(decrypt(&envelope, &key), Err(CryptoError::Decryption)));
        }
    }
}
