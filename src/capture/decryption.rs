//! Pluggable response decryption

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Nonce};
use std::sync::{Arc, RwLock};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecryptionError {
    #[error("no decryptor registered for {0}")]
    NoDecryptor(String),

    #[error("decryption failed: {0}")]
    Failed(String),

    #[error("decryptor panicked")]
    Panicked,

    #[error("unsupported key length {0}; expected 16 or 32 bytes")]
    InvalidKey(usize),
}

/// Capability that turns marked response bytes back into plaintext.
pub trait Decryptor: Send + Sync {
    fn decrypt(&self, payload: &[u8]) -> Result<Vec<u8>, DecryptionError>;
}

impl<F> Decryptor for F
where
    F: Fn(&[u8]) -> Result<Vec<u8>, DecryptionError> + Send + Sync,
{
    fn decrypt(&self, payload: &[u8]) -> Result<Vec<u8>, DecryptionError> {
        self(payload)
    }
}

struct PatternDecryptor {
    pattern: String,
    decryptor: Arc<dyn Decryptor>,
}

/// Default decryption service plus per-URL overrides.
///
/// URL patterns match as case-insensitive substrings, in registration order.
#[derive(Default)]
pub struct DecryptorRegistry {
    default: RwLock<Option<Arc<dyn Decryptor>>>,
    patterns: RwLock<Vec<PatternDecryptor>>,
}

impl DecryptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_default(&self, decryptor: Option<Arc<dyn Decryptor>>) {
        let mut guard = self.default.write().unwrap_or_else(|e| e.into_inner());
        *guard = decryptor;
    }

    pub fn register(&self, url_pattern: &str, decryptor: Arc<dyn Decryptor>) {
        let mut guard = self.patterns.write().unwrap_or_else(|e| e.into_inner());
        guard.push(PatternDecryptor {
            pattern: url_pattern.to_ascii_lowercase(),
            decryptor,
        });
    }

    /// Register an AES-GCM key for URLs containing `url_pattern`.
    pub fn register_key(&self, url_pattern: &str, key: &[u8]) -> Result<(), DecryptionError> {
        let decryptor = AesGcmDecryptor::new(key)?;
        self.register(url_pattern, Arc::new(decryptor));
        Ok(())
    }

    /// Decryptor responsible for `url`, if any.
    pub fn resolve(&self, url: &str) -> Option<Arc<dyn Decryptor>> {
        let url = url.to_ascii_lowercase();
        {
            let patterns = self.patterns.read().unwrap_or_else(|e| e.into_inner());
            if let Some(entry) = patterns.iter().find(|p| url.contains(&p.pattern)) {
                return Some(Arc::clone(&entry.decryptor));
            }
        }
        self.default
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn decrypt(&self, url: &str, payload: &[u8]) -> Result<Vec<u8>, DecryptionError> {
        let decryptor = self
            .resolve(url)
            .ok_or_else(|| DecryptionError::NoDecryptor(url.to_string()))?;
        decryptor.decrypt(payload)
    }
}

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

enum GcmCipher {
    Aes128(Box<Aes128Gcm>),
    Aes256(Box<Aes256Gcm>),
}

/// Keyed AES-GCM decryptor. Payloads are `nonce (12) || ciphertext || tag (16)`;
/// a 16 byte key selects AES-128, a 32 byte key AES-256.
pub struct AesGcmDecryptor {
    cipher: GcmCipher,
}

impl AesGcmDecryptor {
    pub fn new(key: &[u8]) -> Result<Self, DecryptionError> {
        let invalid = |_| DecryptionError::InvalidKey(key.len());
        let cipher = match key.len() {
            16 => GcmCipher::Aes128(Box::new(Aes128Gcm::new_from_slice(key).map_err(invalid)?)),
            32 => GcmCipher::Aes256(Box::new(Aes256Gcm::new_from_slice(key).map_err(invalid)?)),
            other => return Err(DecryptionError::InvalidKey(other)),
        };
        Ok(Self { cipher })
    }
}

impl Decryptor for AesGcmDecryptor {
    fn decrypt(&self, payload: &[u8]) -> Result<Vec<u8>, DecryptionError> {
        if payload.len() < NONCE_LEN + TAG_LEN {
            return Err(DecryptionError::Failed(format!(
                "payload too short: {} bytes",
                payload.len()
            )));
        }
        let (nonce, ciphertext) = payload.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce);
        let opened = match &self.cipher {
            GcmCipher::Aes128(cipher) => cipher.decrypt(nonce, ciphertext),
            GcmCipher::Aes256(cipher) => cipher.decrypt(nonce, ciphertext),
        };
        opened.map_err(|e| DecryptionError::Failed(format!("AES-GCM: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reverse(payload: &[u8]) -> Result<Vec<u8>, DecryptionError> {
        Ok(payload.iter().rev().copied().collect())
    }

    fn always_fails(_: &[u8]) -> Result<Vec<u8>, DecryptionError> {
        Err(DecryptionError::Failed("bad key".into()))
    }

    #[test]
    fn pattern_overrides_default() {
        let registry = DecryptorRegistry::new();
        registry.set_default(Some(Arc::new(always_fails)));
        registry.register("Secure.Example", Arc::new(reverse));

        assert_eq!(
            registry
                .decrypt("https://secure.example.com/x", b"abc")
                .unwrap(),
            b"cba".to_vec()
        );
        assert!(matches!(
            registry.decrypt("https://other.test/", b"abc"),
            Err(DecryptionError::Failed(_))
        ));
    }

    #[test]
    fn missing_decryptor_is_reported() {
        let registry = DecryptorRegistry::new();
        assert!(registry.resolve("https://a.test/").is_none());
        assert!(matches!(
            registry.decrypt("https://a.test/", b"x"),
            Err(DecryptionError::NoDecryptor(_))
        ));
    }

    fn seal(key: &[u8], nonce: [u8; NONCE_LEN], plain: &[u8]) -> Vec<u8> {
        let sealed = match key.len() {
            16 => Aes128Gcm::new_from_slice(key)
                .unwrap()
                .encrypt(Nonce::from_slice(&nonce), plain)
                .unwrap(),
            _ => Aes256Gcm::new_from_slice(key)
                .unwrap()
                .encrypt(Nonce::from_slice(&nonce), plain)
                .unwrap(),
        };
        let mut payload = nonce.to_vec();
        payload.extend_from_slice(&sealed);
        payload
    }

    #[test]
    fn registered_keys_open_sealed_payloads() {
        let registry = DecryptorRegistry::new();
        let key128 = [7u8; 16];
        let key256 = [9u8; 32];
        registry.register_key("/v1/", &key128).unwrap();
        registry.register_key("/v2/", &key256).unwrap();

        let v1 = seal(&key128, [1; NONCE_LEN], b"{\"v\":1}");
        let v2 = seal(&key256, [2; NONCE_LEN], b"{\"v\":2}");
        assert_eq!(registry.decrypt("https://a.test/v1/x", &v1).unwrap(), b"{\"v\":1}");
        assert_eq!(registry.decrypt("https://a.test/v2/x", &v2).unwrap(), b"{\"v\":2}");
    }

    #[test]
    fn keyed_decryption_rejects_bad_input() {
        assert!(matches!(
            AesGcmDecryptor::new(&[0u8; 20]),
            Err(DecryptionError::InvalidKey(20))
        ));

        let decryptor = AesGcmDecryptor::new(&[3u8; 16]).unwrap();
        assert!(matches!(
            decryptor.decrypt(b"short"),
            Err(DecryptionError::Failed(_))
        ));

        let mut payload = seal(&[3u8; 16], [4; NONCE_LEN], b"hello");
        let last = payload.len() - 1;
        payload[last] ^= 0x01;
        assert!(matches!(
            decryptor.decrypt(&payload),
            Err(DecryptionError::Failed(_))
        ));
    }
}
