//! Password encryption for the identity provider's login form.
//!
//! The login page ships a per-attempt salt that is used directly as the AES
//! key. The page script encrypts `filler || password` in CBC mode with a
//! random IV that is never sent. The server decrypts with an IV of its own,
//! which garbles only the first plaintext block; that block sits inside the
//! 64-character filler, so the password decrypts intact.
//!
//! This relies on observed server behavior, not a documented protocol. If the
//! server ever starts validating the IV every login fails here.

use aes::cipher::{block_padding::Pkcs7, BlockEncryptMut, KeyIvInit};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::Rng;

use crate::api::ApiError;

/// Character set the portal's own script draws filler and IV from
const RANDOM_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTWXYZabcdefhijkmnprstwxyz2345678";

/// Filler length; must cover at least the first AES block (16 bytes).
pub const FILLER_LEN: usize = 64;

const IV_LEN: usize = 16;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes192CbcEnc = cbc::Encryptor<aes::Aes192>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;

fn random_string<R: Rng + ?Sized>(rng: &mut R, len: usize) -> Vec<u8> {
    (0..len)
        .map(|_| RANDOM_ALPHABET[rng.gen_range(0..RANDOM_ALPHABET.len())])
        .collect()
}

/// Encrypt `secret` for submission, keyed by the login page's salt.
/// A fresh IV and filler are drawn on every call.
pub fn encrypt(secret: &str, server_salt: &str) -> Result<String, ApiError> {
    encrypt_with(&mut rand::thread_rng(), secret, server_salt)
}

pub(crate) fn encrypt_with<R: Rng + ?Sized>(
    rng: &mut R,
    secret: &str,
    server_salt: &str,
) -> Result<String, ApiError> {
    let key = server_salt.as_bytes();
    let iv = random_string(rng, IV_LEN);

    let mut plaintext = random_string(rng, FILLER_LEN);
    plaintext.extend_from_slice(secret.trim().as_bytes());

    let bad_key = |_| ApiError::malformed("login salt", format!("unusable key length {}", key.len()));
    let ciphertext = match key.len() {
        16 => Aes128CbcEnc::new_from_slices(key, &iv)
            .map_err(bad_key)?
            .encrypt_padded_vec_mut::<Pkcs7>(&plaintext),
        24 => Aes192CbcEnc::new_from_slices(key, &iv)
            .map_err(bad_key)?
            .encrypt_padded_vec_mut::<Pkcs7>(&plaintext),
        32 => Aes256CbcEnc::new_from_slices(key, &iv)
            .map_err(bad_key)?
            .encrypt_padded_vec_mut::<Pkcs7>(&plaintext),
        n => {
            return Err(ApiError::malformed(
                "login salt",
                format!("unusable key length {}", n),
            ))
        }
    };

    Ok(STANDARD.encode(ciphertext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes::cipher::BlockDecryptMut;
    use proptest::prelude::*;
    use rand::{rngs::StdRng, SeedableRng};

    type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
    type Aes192CbcDec = cbc::Decryptor<aes::Aes192>;
    type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

    /// What the server does: decrypt with an IV it picked itself (zeros).
    fn decrypt_with_zero_iv(ciphertext_b64: &str, salt: &str) -> Vec<u8> {
        let ciphertext = STANDARD.decode(ciphertext_b64).unwrap();
        let key = salt.as_bytes();
        let iv = [0u8; IV_LEN];
        match key.len() {
            16 => Aes128CbcDec::new_from_slices(key, &iv)
                .unwrap()
                .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext),
            24 => Aes192CbcDec::new_from_slices(key, &iv)
                .unwrap()
                .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext),
            32 => Aes256CbcDec::new_from_slices(key, &iv)
                .unwrap()
                .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext),
            n => panic!("no AES variant for a {}-byte key", n),
        }
        .unwrap()
    }

    #[test]
    fn test_longer_salts_select_wider_keys() {
        for salt in ["rjBFAaHsNkKAhpoi12345678", "rjBFAaHsNkKAhpoirjBFAaHsNkKAhpoi"] {
            let decrypted = decrypt_with_zero_iv(&encrypt("hunter2", salt).unwrap(), salt);
            assert_eq!(&decrypted[FILLER_LEN..], b"hunter2");
        }
    }

    proptest! {
        #[test]
        fn prop_secret_survives_any_salt_and_iv(
            secret in "\\PC{0,40}",
            salt_len in prop_oneof![Just(16usize), Just(24), Just(32)],
            seed in any::<u64>(),
        ) {
            let mut rng = StdRng::seed_from_u64(seed);
            let salt = String::from_utf8(random_string(&mut rng, salt_len)).unwrap();
            let encrypted = encrypt_with(&mut rng, &secret, &salt).unwrap();
            let decrypted = decrypt_with_zero_iv(&encrypted, &salt);
            prop_assert_eq!(&decrypted[FILLER_LEN..], secret.trim().as_bytes());
        }
    }

    #[test]
    fn test_secret_survives_iv_mismatch() {
        let salt = "rjBFAaHsNkKAhpoi";
        let long = "x".repeat(100);
        for secret in ["hunter2", "", "p@ss word with spaces", "密码1234", long.as_str()] {
            let encrypted = encrypt(secret, salt).unwrap();
            let decrypted = decrypt_with_zero_iv(&encrypted, salt);
            assert_eq!(decrypted.len(), FILLER_LEN + secret.len());
            assert_eq!(&decrypted[FILLER_LEN..], secret.as_bytes());
        }
    }

    #[test]
    fn test_secret_is_trimmed() {
        let salt = "0123456789abcdef";
        let decrypted = decrypt_with_zero_iv(&encrypt("  secret\n", salt).unwrap(), salt);
        assert_eq!(&decrypted[FILLER_LEN..], b"secret");
    }

    #[test]
    fn test_fresh_randomness_per_call() {
        let salt = "0123456789abcdef";
        assert_ne!(encrypt("same", salt).unwrap(), encrypt("same", salt).unwrap());
    }

    #[test]
    fn test_seeded_rng_is_deterministic() {
        let salt = "0123456789abcdef";
        let a = encrypt_with(&mut StdRng::seed_from_u64(7), "pw", salt).unwrap();
        let b = encrypt_with(&mut StdRng::seed_from_u64(7), "pw", salt).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_filler_uses_portal_alphabet() {
        let mut rng = StdRng::seed_from_u64(1);
        let filler = random_string(&mut rng, FILLER_LEN);
        assert!(filler.iter().all(|b| RANDOM_ALPHABET.contains(b)));
    }

    #[test]
    fn test_rejects_bad_salt_length() {
        assert!(matches!(
            encrypt("pw", "short"),
            Err(ApiError::MalformedResponse { what: "login salt", .. })
        ));
    }
}
