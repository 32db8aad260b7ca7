use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::Engine as _;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::LinkError;

type HmacSha256 = Hmac<Sha256>;

/// Helper to create an HMAC instance, resolving trait ambiguity.
fn new_hmac(key: &[u8]) -> Result<HmacSha256, LinkError> {
    <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|e| LinkError::Crypto(format!("HMAC init failed: {e}")))
}

/// AES-256-GCM encryption for stored tokens, HMAC signing for state tokens,
/// and PKCE verifier derivation.
#[derive(Clone)]
pub struct CryptoEngine {
    cipher: Aes256Gcm,
    hmac_key: Vec<u8>,
}

impl CryptoEngine {
    /// Create a new CryptoEngine from base64-encoded keys.
    pub fn new(master_key_b64: &str, hmac_secret_b64: &str) -> Result<Self, LinkError> {
        let master_key = base64::engine::general_purpose::STANDARD
            .decode(master_key_b64)
            .map_err(|e| LinkError::Crypto(format!("Invalid MASTER_KEY base64: {e}")))?;

        if master_key.len() != 32 {
            return Err(LinkError::Crypto(format!(
                "MASTER_KEY must be 32 bytes, got {}",
                master_key.len()
            )));
        }

        let hmac_key = base64::engine::general_purpose::STANDARD
            .decode(hmac_secret_b64)
            .map_err(|e| LinkError::Crypto(format!("Invalid HMAC_SECRET base64: {e}")))?;

        if hmac_key.is_empty() {
            return Err(LinkError::Crypto("HMAC_SECRET must not be empty".into()));
        }

        let cipher = Aes256Gcm::new_from_slice(&master_key)
            .map_err(|e| LinkError::Crypto(format!("Failed to init AES cipher: {e}")))?;

        Ok(Self { cipher, hmac_key })
    }

    /// Encrypt plaintext using AES-256-GCM. Returns base64(nonce || ciphertext).
    pub fn encrypt(&self, plaintext: &str) -> Result<String, LinkError> {
        let mut nonce_bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| LinkError::Crypto(format!("Encryption failed: {e}")))?;

        let mut combined = nonce_bytes.to_vec();
        combined.extend_from_slice(&ciphertext);

        Ok(base64::engine::general_purpose::STANDARD.encode(&combined))
    }

    /// Decrypt base64(nonce || ciphertext) back to plaintext.
    pub fn decrypt(&self, encrypted_b64: &str) -> Result<String, LinkError> {
        let combined = base64::engine::general_purpose::STANDARD
            .decode(encrypted_b64)
            .map_err(|e| LinkError::Crypto(format!("Invalid base64: {e}")))?;

        if combined.len() < 12 {
            return Err(LinkError::Crypto("Ciphertext too short".into()));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(12);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| LinkError::Crypto(format!("Decryption failed: {e}")))?;

        String::from_utf8(plaintext)
            .map_err(|e| LinkError::Crypto(format!("Invalid UTF-8 after decrypt: {e}")))
    }

    /// Sign a state payload with HMAC-SHA256. Returns base64url(hmac || payload).
    pub fn sign_state(&self, payload: &str) -> Result<String, LinkError> {
        let mut mac = new_hmac(&self.hmac_key)?;
        mac.update(payload.as_bytes());
        let signature = mac.finalize().into_bytes();

        let mut combined = signature.to_vec();
        combined.extend_from_slice(payload.as_bytes());

        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&combined))
    }

    /// Verify and extract a signed state payload.
    pub fn verify_state(&self, signed: &str) -> Result<String, LinkError> {
        let combined = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(signed)
            .map_err(|_| LinkError::InvalidState)?;

        if combined.len() < 32 {
            return Err(LinkError::InvalidState);
        }

        let (signature, payload_bytes) = combined.split_at(32);

        let mut mac = new_hmac(&self.hmac_key)?;
        mac.update(payload_bytes);
        mac.verify_slice(signature)
            .map_err(|_| LinkError::InvalidState)?;

        String::from_utf8(payload_bytes.to_vec()).map_err(|_| LinkError::InvalidState)
    }

    /// 32 random bytes, base64url encoded.
    pub fn random_token(&self) -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
    }

    /// PKCE verifier bound to a signed state. Deterministic, so the exchange
    /// step can recompute it without storing anything server-side.
    pub fn pkce_verifier(&self, state: &str) -> Result<String, LinkError> {
        let mut mac = new_hmac(&self.hmac_key)?;
        mac.update(b"pkce:");
        mac.update(state.as_bytes());
        let digest = mac.finalize().into_bytes();
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest))
    }
}

/// S256 code challenge: base64url(SHA-256(verifier)), no padding.
pub fn pkce_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(hash)
}
