//! Login-phase cryptography: the RSA key exchange and the AES/CFB8 stream
//! cipher pair derived from it.
//!
//! The server generates one RSA keypair at startup. Each online-mode login
//! sends the DER public key plus a fresh verify token; the client answers
//! with both RSA-encrypted. The decrypted shared secret keys AES/CFB8 in
//! both directions, with the secret reused as IV per the protocol's
//! convention.

use aes::cipher::inout::InOutBuf;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use num_bigint::BigInt;
use rand::rngs::OsRng;
use rand::Rng;
use rsa::pkcs8::EncodePublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey};
use sha1::{Digest, Sha1};

pub type Aes128CfbEnc = cfb8::Encryptor<aes::Aes128>;
pub type Aes128CfbDec = cfb8::Decryptor<aes::Aes128>;

const RSA_BITS: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("RSA key generation failed: {0}")]
    KeyGen(rsa::Error),

    #[error("public key DER encoding failed")]
    KeyEncode,

    #[error("RSA decryption failed")]
    Decrypt,

    #[error("shared secret must be 16 bytes, got {0}")]
    SecretLength(usize),

    #[error("verify token mismatch")]
    VerifyToken,
}

/// The server's login keypair plus its DER-encoded public half.
pub struct ServerKeys {
    private_key:    RsaPrivateKey,
    public_key_der: Vec<u8>,
}

impl ServerKeys {
    pub fn generate() -> Result<Self, CryptoError> {
        let private_key = RsaPrivateKey::new(&mut OsRng, RSA_BITS).map_err(CryptoError::KeyGen)?;
        let public_key_der = private_key
            .to_public_key()
            .to_public_key_der()
            .map_err(|_| CryptoError::KeyEncode)?
            .into_vec();

        Ok(Self {
            private_key,
            public_key_der,
        })
    }

    /// The ASN.1 SubjectPublicKeyInfo document sent in EncryptionRequest.
    pub fn public_key_der(&self) -> &[u8] {
        &self.public_key_der
    }

    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.private_key
            .decrypt(Pkcs1v15Encrypt, ciphertext)
            .map_err(|_| CryptoError::Decrypt)
    }

    /// Decrypt and byte-compare the echoed verify token.
    pub fn check_verify_token(&self, expected: &[u8], echoed: &[u8]) -> Result<(), CryptoError> {
        let token = self.decrypt(echoed)?;
        if token != expected {
            return Err(CryptoError::VerifyToken);
        }
        Ok(())
    }

    /// Decrypt the shared secret and check its length.
    pub fn decrypt_shared_secret(&self, ciphertext: &[u8]) -> Result<[u8; 16], CryptoError> {
        let secret = self.decrypt(ciphertext)?;
        let len = secret.len();
        secret
            .try_into()
            .map_err(|_| CryptoError::SecretLength(len))
    }
}

/// Fresh 4-byte verify token for one EncryptionRequest.
pub fn generate_verify_token() -> [u8; 4] {
    rand::thread_rng().r#gen()
}

/// Build the CFB8 cipher pair from a shared secret; the secret doubles as
/// the IV.
pub fn create_ciphers(secret: &[u8; 16]) -> (Aes128CfbEnc, Aes128CfbDec) {
    // new_from_slices only fails on length mismatch, which the fixed-size
    // array rules out.
    let enc = Aes128CfbEnc::new_from_slices(secret, secret).expect("key and iv are 16 bytes");
    let dec = Aes128CfbDec::new_from_slices(secret, secret).expect("key and iv are 16 bytes");
    (enc, dec)
}

pub fn encrypt_in_place(cipher: &mut Aes128CfbEnc, data: &mut [u8]) {
    let (chunks, _rest) = InOutBuf::from(data).into_chunks();
    cipher.encrypt_blocks_inout_mut(chunks);
}

pub fn decrypt_in_place(cipher: &mut Aes128CfbDec, data: &mut [u8]) {
    let (chunks, _rest) = InOutBuf::from(data).into_chunks();
    cipher.decrypt_blocks_inout_mut(chunks);
}

/// The Minecraft server-id digest: SHA-1 over `server_id || secret ||
/// public_key_der`, rendered as the hex of the signed big-endian integer.
pub fn server_hash(server_id: &str, secret: &[u8; 16], public_key_der: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(server_id.as_bytes());
    hasher.update(secret);
    hasher.update(public_key_der);
    let digest = hasher.finalize();

    BigInt::from_signed_bytes_be(digest.as_slice()).to_str_radix(16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cipher_pair_roundtrip() {
        let secret = [7u8; 16];
        let (mut enc, mut dec) = create_ciphers(&secret);

        let mut data = b"lengths, ids and payloads all pass through".to_vec();
        let original = data.clone();

        encrypt_in_place(&mut enc, &mut data);
        assert_ne!(data, original);

        decrypt_in_place(&mut dec, &mut data);
        assert_eq!(data, original);
    }

    #[test]
    fn test_cipher_is_stateful_across_calls() {
        let secret = [3u8; 16];
        let (mut enc, mut dec) = create_ciphers(&secret);

        // Two slices encrypted back-to-back must decrypt as one stream.
        let mut first = vec![1u8, 2, 3];
        let mut second = vec![4u8, 5, 6, 7];
        encrypt_in_place(&mut enc, &mut first);
        encrypt_in_place(&mut enc, &mut second);

        let mut all = first;
        all.extend_from_slice(&second);
        decrypt_in_place(&mut dec, &mut all);
        assert_eq!(all, [1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_server_hash_known_vectors() {
        // The vanilla protocol's published digest examples.
        fn digest_of(name: &str) -> String {
            let mut hasher = Sha1::new();
            hasher.update(name.as_bytes());
            let digest = hasher.finalize();
            BigInt::from_signed_bytes_be(digest.as_slice()).to_str_radix(16)
        }

        assert_eq!(digest_of("Notch"), "4ed1f46bbe04bc756bcb17c0c7ce3e4632f06a48");
        assert_eq!(digest_of("jeb_"), "-7c9d5b0044c130109a5d7b5fb5c317c02b4e28c1");
        assert_eq!(digest_of("simon"), "88e16a1019277b15d58faf0541e11910eb756f6");
    }

    #[test]
    fn test_rsa_roundtrip_via_public_key() {
        use rsa::pkcs8::DecodePublicKey;
        use rsa::RsaPublicKey;

        let keys = ServerKeys::generate().unwrap();
        let public = RsaPublicKey::from_public_key_der(keys.public_key_der()).unwrap();

        let secret = [9u8; 16];
        let ciphertext = public
            .encrypt(&mut OsRng, Pkcs1v15Encrypt, &secret)
            .unwrap();
        assert_eq!(keys.decrypt_shared_secret(&ciphertext).unwrap(), secret);
    }

    #[test]
    fn test_verify_token_mismatch_rejected() {
        use rsa::pkcs8::DecodePublicKey;
        use rsa::RsaPublicKey;

        let keys = ServerKeys::generate().unwrap();
        let public = RsaPublicKey::from_public_key_der(keys.public_key_der()).unwrap();

        let token = generate_verify_token();
        let mut wrong = token;
        wrong[0] ^= 0xFF;
        let echoed = public.encrypt(&mut OsRng, Pkcs1v15Encrypt, &wrong).unwrap();

        assert!(matches!(
            keys.check_verify_token(&token, &echoed),
            Err(CryptoError::VerifyToken)
        ));
    }
}
