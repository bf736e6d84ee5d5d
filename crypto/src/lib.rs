//! Cryptographic primitives: Ed25519 keys and signatures, Blake2b hashing.

pub mod hash;
pub mod keys;
pub mod sign;

pub use hash::blake2b_256;
pub use keys::{generate_keypair, keypair_from_seed, public_from_private};
pub use sign::{sign_message, verify_signature};
