//! RSA key pairs for the SecurePassthrough handshake.
//!
//! The client sends the public key to the device, which answers with the
//! session AES key and IV encrypted under it (PKCS#1 v1.5). The private key
//! never leaves the process, but it is still held as an encrypted PKCS#8 PEM
//! under an ephemeral password, so a stray log of the key pair reveals
//! nothing usable.

use pkcs8::{
    DecodePrivateKey, EncodePrivateKey, EncodePublicKey, LineEnding, PrivateKeyInfo, pkcs5::pbes2,
};
use rsa::rand_core::OsRng;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey};

use super::encoding::base64_decode_bytes;
use super::hash::random_bytes;
use crate::error::Error;

/// PEM label of an encrypted PKCS#8 private key.
const ENCRYPTED_PRIVATE_KEY_LABEL: &str = "ENCRYPTED PRIVATE KEY";

/// PBKDF2 iteration count used to wrap the private key.
const PBKDF2_ROUNDS: u32 = 2048;

/// A freshly generated RSA key pair.
#[derive(Clone)]
pub struct RsaKeyPair {
    /// SubjectPublicKeyInfo PEM (`-----BEGIN PUBLIC KEY-----`).
    pub public_pem: String,
    /// PKCS#8 PEM encrypted with PBES2 (PBKDF2-SHA256 + AES-256-CBC).
    pub private_pem: String,
}

impl std::fmt::Debug for RsaKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsaKeyPair")
            .field("public_pem", &self.public_pem)
            .field("private_pem", &"[REDACTED]")
            .finish()
    }
}

/// Generates an RSA key pair of `bits` bits, encrypting the private key
/// with `password`.
pub fn generate_key_pair(password: &str, bits: usize) -> Result<RsaKeyPair, Error> {
    let private = RsaPrivateKey::new(&mut OsRng, bits)
        .map_err(|e| Error::Protocol(format!("RSA key generation failed: {}", e)))?;

    let public_pem = private
        .to_public_key()
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| Error::Protocol(format!("public key encoding failed: {}", e)))?;

    let der = private
        .to_pkcs8_der()
        .map_err(|e| Error::Protocol(format!("private key encoding failed: {}", e)))?;
    let info = PrivateKeyInfo::try_from(der.as_bytes())
        .map_err(|e| Error::Protocol(format!("private key encoding failed: {}", e)))?;

    let salt = random_bytes(16);
    let mut iv = [0u8; 16];
    iv.copy_from_slice(&random_bytes(16));
    let params = pbes2::Parameters::pbkdf2_sha256_aes256cbc(PBKDF2_ROUNDS, &salt, &iv)
        .map_err(|e| Error::Protocol(format!("invalid PBES2 parameters: {}", e)))?;

    let encrypted = info
        .encrypt_with_params(params, password.as_bytes())
        .map_err(|e| Error::Protocol(format!("private key encryption failed: {}", e)))?;
    let private_pem = encrypted
        .to_pem(ENCRYPTED_PRIVATE_KEY_LABEL, LineEnding::LF)
        .map_err(|e| Error::Protocol(format!("private key encoding failed: {}", e)))?;

    Ok(RsaKeyPair {
        public_pem,
        private_pem: private_pem.to_string(),
    })
}

/// Decrypts a base64 PKCS#1 v1.5 ciphertext with a password-protected
/// private key.
///
/// Any failure (bad base64, wrong password, wrong key) is reported as
/// [`Error::HandshakeAuth`]: the only caller is the handshake, and none of
/// these can be fixed without starting it over.
pub fn rsa_decrypt(ciphertext_b64: &str, private_pem: &str, password: &str) -> Result<Vec<u8>, Error> {
    let ciphertext = base64_decode_bytes(ciphertext_b64)
        .map_err(|e| Error::HandshakeAuth(format!("handshake key is not base64: {}", e)))?;

    let private = RsaPrivateKey::from_pkcs8_encrypted_pem(private_pem, password.as_bytes())
        .map_err(|e| Error::HandshakeAuth(format!("cannot unlock private key: {}", e)))?;

    private
        .decrypt(Pkcs1v15Encrypt, &ciphertext)
        .map_err(|e| Error::HandshakeAuth(format!("RSA decryption failed: {}", e)))
}
