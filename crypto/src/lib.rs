//! Cryptographic primitives for the bftb replicated ledger.
//!
//! - **Ed25519** for client request signatures and replica response signatures
//! - **Blake2b** for proof-of-work digests and snapshot integrity hashes
//! - OS randomness for replica nonces

pub mod hash;
pub mod keys;
pub mod sign;

pub use hash::{blake2b_256, blake2b_256_multi};
pub use keys::{generate_keypair, keypair_from_private, keypair_from_seed, public_from_private, random_u64};
pub use sign::{sign_message, verify_signature};
