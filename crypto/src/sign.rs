//! Message signing and verification.

use ebb_types::{PrivateKey, PublicKey, Signature};
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};

/// Sign a message with an Ed25519 private key.
pub fn sign_message(message: &[u8], private: &PrivateKey) -> Signature {
    let signing_key = SigningKey::from_bytes(&private.0);
    Signature(signing_key.sign(message).to_bytes())
}

/// Verify a signature against a message and public key.
///
/// Malformed public keys verify as `false` rather than erroring; the
/// caller only cares whether the signature authorizes the message.
pub fn verify_signature(message: &[u8], signature: &Signature, public: &PublicKey) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(&public.0) else {
        return false;
    };
    let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    verifying_key.verify(message, &sig).is_ok()
}
