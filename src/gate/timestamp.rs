use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};
use hkdf::Hkdf;
use sha2::Sha256;

const HKDF_SALT: &[u8] = b"honeypot-v1";
const HKDF_INFO: &[u8] = b"render-timestamp";
const NONCE_LEN: usize = 12;

fn derive_key(secret: &str) -> [u8; 32] {
    let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), secret.as_bytes());
    let mut okm = [0u8; 32];
    hk.expand(HKDF_INFO, &mut okm)
        .expect("32 bytes is a valid HKDF-SHA256 output length");
    okm
}

/// Encoding of the render timestamp echoed back by the client.
///
/// `Plain` carries the unix time as decimal digits and trusts whatever comes
/// back. `Sealed` encrypts it with AES-256-GCM, so a client can neither read
/// nor forge it; the token is hex of `nonce || ciphertext`.
#[derive(Clone)]
pub enum TimestampCodec {
    Plain,
    Sealed(Aes256Gcm),
}

impl std::fmt::Debug for TimestampCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimestampCodec::Plain => write!(f, "Plain"),
            TimestampCodec::Sealed(_) => write!(f, "Sealed"),
        }
    }
}

impl TimestampCodec {
    pub fn sealed(secret: &str) -> Self {
        let key = Key::<Aes256Gcm>::from(derive_key(secret));
        TimestampCodec::Sealed(Aes256Gcm::new(&key))
    }

    pub fn from_secret(secret: Option<&str>) -> Self {
        match secret {
            Some(s) if !s.is_empty() => Self::sealed(s),
            _ => TimestampCodec::Plain,
        }
    }

    pub fn encode(&self, timestamp: i64) -> Result<String, String> {
        match self {
            TimestampCodec::Plain => Ok(timestamp.to_string()),
            TimestampCodec::Sealed(cipher) => {
                let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
                let ciphertext = cipher
                    .encrypt(&nonce, timestamp.to_be_bytes().as_slice())
                    .map_err(|e| format!("Encryption failed: {e}"))?;

                let mut token = nonce.to_vec();
                token.extend_from_slice(&ciphertext);
                Ok(hex::encode(token))
            }
        }
    }

    /// Decode a token. Anything malformed or tampered with yields `None`.
    pub fn decode(&self, token: &str) -> Option<i64> {
        let token = token.trim();
        match self {
            TimestampCodec::Plain => {
                if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                token.parse().ok()
            }
            TimestampCodec::Sealed(cipher) => {
                let data = hex::decode(token).ok()?;
                if data.len() <= NONCE_LEN {
                    return None;
                }
                let nonce = Nonce::from_slice(&data[..NONCE_LEN]);
                let plaintext = cipher.decrypt(nonce, &data[NONCE_LEN..]).ok()?;
                let bytes: [u8; 8] = plaintext.try_into().ok()?;
                Some(i64::from_be_bytes(bytes))
            }
        }
    }
}
