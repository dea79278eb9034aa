//! KLAP authentication hashes and session cipher.
//!
//! # Key Derivation
//!
//! With local seed `L`, remote seed `R` and auth hash `A`:
//!
//! - `auth_hash = sha256(sha1(username) + sha1(password))`
//! - `key = sha256("lsk" + L + R + A)[..16]`
//! - `iv = sha256("iv" + L + R + A)`: the first 12 bytes seed every request
//!   IV, the last 4 bytes are the initial sequence number (big-endian, signed)
//! - `sig = sha256("ldk" + L + R + A)[..28]`
//!
//! Each request increments the sequence, encrypts with IV `iv[..12] + seq`,
//! and prefixes the ciphertext with `sha256(sig + seq + ciphertext)`.

use super::hash::{sha1, sha256_concat};
use super::symmetric::{aes_cbc_decrypt, aes_cbc_encrypt};
use crate::{credentials::Credentials, error::Error};

/// Length of the signature that prefixes every KLAP payload.
pub const SIGNATURE_LEN: usize = 32;

/// Computes the KLAP auth hash: `sha256(sha1(username) + sha1(password))`.
pub fn generate_auth_hash(credentials: &Credentials) -> [u8; 32] {
    let user = sha1(credentials.username.as_bytes());
    let pass = sha1(credentials.expose_password().as_bytes());
    sha256_concat(&[user.as_slice(), pass.as_slice()])
}

/// Hash the device proves itself with in handshake1:
/// `sha256(local_seed + remote_seed + auth_hash)`.
pub fn handshake1_seed_auth_hash(local_seed: &[u8], remote_seed: &[u8], auth_hash: &[u8]) -> [u8; 32] {
    sha256_concat(&[local_seed, remote_seed, auth_hash])
}

/// Checks the server hash returned by handshake1.
///
/// The comparison is byte-exact over the whole hash: a truncated or
/// extended hash is a mismatch too.
pub fn verify_server_hash(
    local_seed: &[u8],
    remote_seed: &[u8],
    auth_hash: &[u8],
    server_hash: &[u8],
) -> Result<(), Error> {
    let expected = handshake1_seed_auth_hash(local_seed, remote_seed, auth_hash);
    if server_hash == expected.as_slice() {
        Ok(())
    } else {
        Err(Error::HandshakeAuth(
            "device hash does not match credentials; check email and password".into(),
        ))
    }
}

/// Hash the client proves itself with in handshake2:
/// `sha256(remote_seed + local_seed + auth_hash)`.
pub fn handshake2_seed_auth_hash(local_seed: &[u8], remote_seed: &[u8], auth_hash: &[u8]) -> [u8; 32] {
    sha256_concat(&[remote_seed, local_seed, auth_hash])
}

/// Per-session KLAP cipher state.
pub struct KlapCipher {
    key: [u8; 16],
    iv_seed: [u8; 12],
    sig: [u8; 28],
    seq: i32,
}

impl KlapCipher {
    /// Derives the cipher from the handshake seeds and the auth hash.
    pub fn new(local_seed: &[u8], remote_seed: &[u8], auth_hash: &[u8]) -> Self {
        let key_full = sha256_concat(&[b"lsk".as_slice(), local_seed, remote_seed, auth_hash]);
        let iv_full = sha256_concat(&[b"iv".as_slice(), local_seed, remote_seed, auth_hash]);
        let sig_full = sha256_concat(&[b"ldk".as_slice(), local_seed, remote_seed, auth_hash]);

        let mut key = [0u8; 16];
        key.copy_from_slice(&key_full[..16]);
        let mut iv_seed = [0u8; 12];
        iv_seed.copy_from_slice(&iv_full[..12]);
        let mut sig = [0u8; 28];
        sig.copy_from_slice(&sig_full[..28]);
        let seq = i32::from_be_bytes([iv_full[28], iv_full[29], iv_full[30], iv_full[31]]);

        Self {
            key,
            iv_seed,
            sig,
            seq,
        }
    }

    /// Returns the sequence number of the most recent request.
    pub fn seq(&self) -> i32 {
        self.seq
    }

    /// Advances the sequence and encrypts `plaintext` under it.
    ///
    /// Returns the signed payload; read [`seq`](Self::seq) afterwards for
    /// the value to put in the request URL.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Vec<u8> {
        self.seq = self.seq.wrapping_add(1);
        self.encrypt_at(plaintext, self.seq)
    }

    /// Encrypts `plaintext` under an explicit sequence number without
    /// advancing the session. This is how a device answers request `seq`.
    pub fn encrypt_at(&self, plaintext: &[u8], seq: i32) -> Vec<u8> {
        let seq_bytes = seq.to_be_bytes();

        let ciphertext = aes_cbc_encrypt(plaintext, &self.key, &self.iv_for(seq));
        let signature = sha256_concat(&[self.sig.as_slice(), seq_bytes.as_slice(), ciphertext.as_slice()]);

        let mut payload = Vec::with_capacity(SIGNATURE_LEN + ciphertext.len());
        payload.extend_from_slice(&signature);
        payload.extend_from_slice(&ciphertext);
        payload
    }

    /// Decrypts a response body produced for request `seq`.
    ///
    /// The device's signature is stripped without being checked.
    pub fn decrypt(&self, payload: &[u8], seq: i32) -> Result<Vec<u8>, Error> {
        if payload.len() <= SIGNATURE_LEN {
            return Err(Error::Decryption(format!(
                "KLAP payload too short: {} bytes",
                payload.len()
            )));
        }
        aes_cbc_decrypt(&payload[SIGNATURE_LEN..], &self.key, &self.iv_for(seq))
    }

    fn iv_for(&self, seq: i32) -> [u8; 16] {
        let mut iv = [0u8; 16];
        iv[..12].copy_from_slice(&self.iv_seed);
        iv[12..].copy_from_slice(&seq.to_be_bytes());
        iv
    }
}

impl std::fmt::Debug for KlapCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KlapCipher")
            .field("key", &"[REDACTED]")
            .field("seq", &self.seq)
            .finish()
    }
}
