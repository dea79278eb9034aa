//! Cryptographic primitives used by the Tapo device protocols.
//!
//! - [`hash`]: SHA-1 / SHA-256 digests and random bytes
//! - [`encoding`]: base64 helpers for the text fields devices exchange
//! - [`symmetric`]: AES-128-CBC with PKCS#7 padding
//! - [`keypair`]: RSA key pairs with password-protected PKCS#8 private keys
//! - [`klap`]: KLAP authentication hashes and the per-session cipher

pub mod encoding;
pub mod hash;
pub mod keypair;
pub mod klap;
pub mod symmetric;

pub use encoding::{base64_decode, base64_decode_bytes, base64_encode, base64_encode_bytes};
pub use hash::{random_bytes, sha1, sha256, sha256_concat};
pub use keypair::{RsaKeyPair, generate_key_pair, rsa_decrypt};
pub use klap::{
    KlapCipher, generate_auth_hash, handshake1_seed_auth_hash, handshake2_seed_auth_hash,
    verify_server_hash,
};
pub use symmetric::{aes_cbc_decrypt, aes_cbc_encrypt};
