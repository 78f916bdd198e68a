//! AES-256-GCM field cipher for phone numbers stored at rest.

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng, Payload},
    Aes256Gcm,
};
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use sha2::{Digest, Sha256};
use sms_core::{FieldCipher, SmsError};

const ENCRYPTED_PREFIX: &str = "enc:v1:";
const NONCE_BYTES: usize = 12;
const AAD: &[u8] = b"acs-sms-bridge-field-v1";

/// Output format: `enc:v1:` + base64(nonce || ciphertext).
#[derive(Clone)]
pub struct AesGcmFieldCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for AesGcmFieldCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AesGcmFieldCipher")
    }
}

impl AesGcmFieldCipher {
    /// The key is the SHA-256 digest of `secret`.
    pub fn new(secret: &str) -> Result<Self, SmsError> {
        let secret = secret.trim();
        if secret.is_empty() {
            return Err(SmsError::Config("encryption secret must not be empty".into()));
        }
        let key = Sha256::digest(secret.as_bytes());
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|_| SmsError::Crypto("key material has invalid length".into()))?;
        Ok(Self { cipher })
    }
}

impl FieldCipher for AesGcmFieldCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String, SmsError> {
        let mut nonce = [0u8; NONCE_BYTES];
        use aes_gcm::aead::rand_core::RngCore as _;
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(
                (&nonce).into(),
                Payload {
                    msg: plaintext.as_bytes(),
                    aad: AAD,
                },
            )
            .map_err(|_| SmsError::Crypto("field encryption failed".into()))?;

        let mut payload = Vec::with_capacity(NONCE_BYTES + ciphertext.len());
        payload.extend_from_slice(&nonce);
        payload.extend_from_slice(&ciphertext);
        Ok(format!("{}{}", ENCRYPTED_PREFIX, BASE64_STANDARD.encode(payload)))
    }

    fn decrypt(&self, value: &str) -> Result<String, SmsError> {
        let Some(encoded) = value.strip_prefix(ENCRYPTED_PREFIX) else {
            return Ok(value.to_string());
        };
        let raw = BASE64_STANDARD
            .decode(encoded)
            .map_err(|_| SmsError::Crypto("field payload encoding is invalid".into()))?;
        if raw.len() <= NONCE_BYTES {
            return Err(SmsError::Crypto("field payload is truncated".into()));
        }

        let (nonce, ciphertext) = raw.split_at(NONCE_BYTES);
        let plaintext = self
            .cipher
            .decrypt(
                nonce.into(),
                Payload {
                    msg: ciphertext,
                    aad: AAD,
                },
            )
            .map_err(|_| SmsError::Crypto("field payload integrity check failed".into()))?;
        String::from_utf8(plaintext)
            .map_err(|_| SmsError::Crypto("field payload is not valid UTF-8".into()))
    }

    fn is_encrypted(&self, value: &str) -> bool {
        value.starts_with(ENCRYPTED_PREFIX)
    }
}
