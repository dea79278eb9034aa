//! AES-128-CBC with PKCS#7 padding.
//!
//! Both device protocols use this cipher. KLAP derives a fresh IV per
//! request; SecurePassthrough reuses the key and IV from its handshake.

use aes::Aes128;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};

use crate::error::Error;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

const BLOCK_SIZE: usize = 16;

/// Encrypts `plaintext` and returns the padded ciphertext.
pub fn aes_cbc_encrypt(plaintext: &[u8], key: &[u8; 16], iv: &[u8; 16]) -> Vec<u8> {
    Aes128CbcEnc::new(key.into(), iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

/// Decrypts `ciphertext` and strips the padding.
///
/// Fails with [`Error::Decryption`] when the input is not a whole number of
/// blocks or the padding is invalid, which is what happens when the key or
/// IV do not match the ones used for encryption.
pub fn aes_cbc_decrypt(ciphertext: &[u8], key: &[u8; 16], iv: &[u8; 16]) -> Result<Vec<u8>, Error> {
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(Error::Decryption(format!(
            "ciphertext length {} is not a multiple of {}",
            ciphertext.len(),
            BLOCK_SIZE
        )));
    }

    Aes128CbcDec::new(key.into(), iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| Error::Decryption("invalid padding".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_known_answer() {
        let ct = aes_cbc_encrypt(b"hello", &[0u8; 16], &[0u8; 16]);
        assert_eq!(hex::encode(&ct), "9834ed518cbc8fbe9af3c6ecb75eb8c0");
        assert_eq!(aes_cbc_decrypt(&ct, &[0u8; 16], &[0u8; 16]).unwrap(), b"hello");
    }

    #[test]
    fn test_empty_plaintext_is_one_block() {
        let ct = aes_cbc_encrypt(b"", &[1u8; 16], &[2u8; 16]);
        assert_eq!(ct.len(), 16);
        assert!(aes_cbc_decrypt(&ct, &[1u8; 16], &[2u8; 16]).unwrap().is_empty());
    }

    #[test]
    fn test_truncated_ciphertext() {
        assert!(matches!(
            aes_cbc_decrypt(&[0u8; 15], &[0u8; 16], &[0u8; 16]),
            Err(Error::Decryption(_))
        ));
        assert!(matches!(
            aes_cbc_decrypt(&[], &[0u8; 16], &[0u8; 16]),
            Err(Error::Decryption(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_round_trip(
            plaintext in any::<Vec<u8>>(),
            key in any::<[u8; 16]>(),
            iv in any::<[u8; 16]>(),
        ) {
            let ct = aes_cbc_encrypt(&plaintext, &key, &iv);
            prop_assert_eq!(ct.len() % 16, 0);
            prop_assert_eq!(aes_cbc_decrypt(&ct, &key, &iv).unwrap(), plaintext);
        }

        #[test]
        fn prop_wrong_key_never_yields_plaintext(
            plaintext in proptest::collection::vec(any::<u8>(), 1..64),
            key in any::<[u8; 16]>(),
            iv in any::<[u8; 16]>(),
        ) {
            let mut wrong = key;
            wrong[0] ^= 0x01;
            let ct = aes_cbc_encrypt(&plaintext, &key, &iv);
            match aes_cbc_decrypt(&ct, &wrong, &iv) {
                Ok(decrypted) => prop_assert_ne!(decrypted, plaintext),
                Err(e) => prop_assert!(matches!(e, Error::Decryption(_))),
            }
        }
    }
}
