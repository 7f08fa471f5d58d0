//! Signed payload verification.
//!
//! Index payloads arrive wrapped in a [`Signed`] envelope whose signature
//! is RSA PKCS#1 v1.5 over the SHA-512 of the payload, made with the
//! repository's private key. This module checks the signature against the
//! configured public key and hands back the raw payload.

use prost::Message;
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::Verifier;
use rsa::RsaPublicKey;
use sha2::Sha512;

use crate::error::{Error, Result};
use crate::proto::Signed;

/// Decode a signed blob and return its payload.
///
/// With `verify` set, the signature is checked first and a failure
/// surfaces as [`Error::SignatureInvalid`] with the verifier's reason.
/// Without it the payload is returned unchecked; that path exists for
/// development and tests only.
pub fn read_signed(blob: &[u8], repo_public_key: &str, verify: bool) -> Result<Vec<u8>> {
    let signed = Signed::decode(blob)?;
    if verify {
        verify_signature(&signed.payload, &signed.signature, repo_public_key)?;
    }
    Ok(signed.payload)
}

fn verify_signature(payload: &[u8], signature: &[u8], public_key_pem: &str) -> Result<()> {
    let public_key =
        RsaPublicKey::from_public_key_pem(public_key_pem).map_err(|e| Error::InvalidKey {
            message: e.to_string(),
        })?;
    let verifying_key = VerifyingKey::<Sha512>::new(public_key);

    let signature = Signature::try_from(signature).map_err(|e| Error::SignatureInvalid {
        reason: format!("malformed signature: {e}"),
    })?;

    verifying_key
        .verify(payload, &signature)
        .map_err(|e| Error::SignatureInvalid {
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs1v15::SigningKey;
    use rsa::pkcs8::EncodePublicKey;
    use rsa::signature::{SignatureEncoding, Signer};
    use rsa::RsaPrivateKey;
    use std::sync::OnceLock;

    fn signing_key() -> &'static SigningKey<Sha512> {
        static KEY: OnceLock<SigningKey<Sha512>> = OnceLock::new();
        KEY.get_or_init(|| {
            let private_key =
                RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("generate key");
            SigningKey::new(private_key)
        })
    }

    fn public_key_pem() -> String {
        use rsa::signature::Keypair;
        signing_key()
            .verifying_key()
            .as_ref()
            .to_public_key_pem(rsa::pkcs8::LineEnding::LF)
            .expect("encode public key")
    }

    fn sign_blob(payload: &[u8]) -> Vec<u8> {
        let signature = signing_key().sign(payload);
        Signed {
            payload: payload.to_vec(),
            signature: signature.to_vec(),
        }
        .encode_to_vec()
    }

    #[test]
    fn valid_signature_passes() {
        let blob = sign_blob(b"payload");
        let payload = read_signed(&blob, &public_key_pem(), true).unwrap();
        assert_eq!(payload, b"payload");
    }

    #[test]
    fn tampered_payload_fails() {
        let mut signed = Signed::decode(sign_blob(b"payload").as_slice()).unwrap();
        signed.payload[0] ^= 0x01;
        let blob = signed.encode_to_vec();

        let err = read_signed(&blob, &public_key_pem(), true).unwrap_err();
        assert!(matches!(err, Error::SignatureInvalid { .. }));
    }

    #[test]
    fn tampered_signature_fails() {
        let mut signed = Signed::decode(sign_blob(b"payload").as_slice()).unwrap();
        let last = signed.signature.len() - 1;
        signed.signature[last] ^= 0x01;
        let blob = signed.encode_to_vec();

        let err = read_signed(&blob, &public_key_pem(), true).unwrap_err();
        assert!(matches!(err, Error::SignatureInvalid { .. }));
    }

    #[test]
    fn bypass_skips_verification() {
        let mut signed = Signed::decode(sign_blob(b"payload").as_slice()).unwrap();
        signed.signature.clear();
        let blob = signed.encode_to_vec();

        let payload = read_signed(&blob, "", false).unwrap();
        assert_eq!(payload, b"payload");
    }

    #[test]
    fn garbage_key_is_a_key_error() {
        let blob = sign_blob(b"payload");
        let err = read_signed(&blob, "not a pem", true).unwrap_err();
        assert!(matches!(err, Error::InvalidKey { .. }));
    }

    #[test]
    fn garbage_blob_is_a_decode_error() {
        // A truncated varint cannot decode as the envelope.
        let err = read_signed(&[0x0a, 0xff], &public_key_pem(), true).unwrap_err();
        assert!(matches!(err, Error::Proto(_)));
    }
}
