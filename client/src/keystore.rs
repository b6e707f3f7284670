//! Argon2id encrypted keystore for a client's Ed25519 key.
//!
//! Encrypts the 32-byte private key with a passphrase:
//! 1. Argon2id derives a 32-byte encryption key from the passphrase + random salt
//! 2. AES-256-GCM encrypts the private key with a random nonce
//! 3. The result is stored as a JSON file with all parameters for future decryption
//!
//! The public key is stored in the clear so an account can be named without
//! unlocking it.

use std::path::Path;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use bftb_crypto::keypair_from_private;
use bftb_types::{KeyPair, PrivateKey, PublicKey};

use crate::ClientError;

const KEYSTORE_VERSION: u32 = 1;

/// Argon2id parameters: 64 MB memory, 3 iterations, 1 lane of parallelism.
const ARGON2_MEMORY_KIB: u32 = 65536;
const ARGON2_ITERATIONS: u32 = 3;
const ARGON2_PARALLELISM: u32 = 1;
const ARGON2_OUTPUT_LEN: usize = 32;

const SALT_LEN: usize = 32;
/// AES-GCM nonce length in bytes (96 bits).
const NONCE_LEN: usize = 12;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeystoreFile {
    pub version: u32,
    /// Hex-encoded public key.
    pub public_key: String,
    pub crypto: KeystoreCrypto,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeystoreCrypto {
    pub cipher: String,
    pub kdf: String,
    pub kdf_params: KdfParams,
    /// Hex-encoded salt.
    pub salt: String,
    /// Hex-encoded nonce.
    pub nonce: String,
    /// Hex-encoded ciphertext.
    pub ciphertext: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KdfParams {
    pub memory: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl KeystoreFile {
    pub fn public_key(&self) -> Result<PublicKey, ClientError> {
        self.public_key
            .parse()
            .map_err(|e| ClientError::Keystore(format!("{e}")))
    }
}

fn keystore_error(msg: impl Into<String>) -> ClientError {
    ClientError::Keystore(msg.into())
}

/// Encrypt `keypair`'s private key under `password`.
pub fn encrypt_keystore(keypair: &KeyPair, password: &str) -> Result<KeystoreFile, ClientError> {
    let mut rng = rand::thread_rng();

    let mut salt = [0u8; SALT_LEN];
    rng.fill_bytes(&mut salt);
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rng.fill_bytes(&mut nonce_bytes);

    let derived_key = derive_key(password, &salt, ARGON2_MEMORY_KIB, ARGON2_ITERATIONS)?;
    let cipher = Aes256Gcm::new_from_slice(derived_key.as_ref())
        .map_err(|e| keystore_error(format!("AES key init failed: {e}")))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), keypair.private.0.as_ref())
        .map_err(|e| keystore_error(format!("encryption failed: {e}")))?;

    Ok(KeystoreFile {
        version: KEYSTORE_VERSION,
        public_key: keypair.public.to_hex(),
        crypto: KeystoreCrypto {
            cipher: "aes-256-gcm".to_string(),
            kdf: "argon2id".to_string(),
            kdf_params: KdfParams {
                memory: ARGON2_MEMORY_KIB,
                iterations: ARGON2_ITERATIONS,
                parallelism: ARGON2_PARALLELISM,
            },
            salt: hex::encode(salt),
            nonce: hex::encode(nonce_bytes),
            ciphertext: hex::encode(ciphertext),
        },
    })
}

/// Decrypt a keystore, checking the recovered key against the stored public key.
pub fn decrypt_keystore(keystore: &KeystoreFile, password: &str) -> Result<KeyPair, ClientError> {
    if keystore.version != KEYSTORE_VERSION {
        return Err(keystore_error(format!(
            "unsupported keystore version: {}",
            keystore.version
        )));
    }
    let crypto = &keystore.crypto;
    let salt =
        hex::decode(&crypto.salt).map_err(|e| keystore_error(format!("invalid salt hex: {e}")))?;
    let nonce_bytes = hex::decode(&crypto.nonce)
        .map_err(|e| keystore_error(format!("invalid nonce hex: {e}")))?;
    let ciphertext = hex::decode(&crypto.ciphertext)
        .map_err(|e| keystore_error(format!("invalid ciphertext hex: {e}")))?;
    if nonce_bytes.len() != NONCE_LEN {
        return Err(keystore_error(format!(
            "invalid nonce length: expected {NONCE_LEN}, got {}",
            nonce_bytes.len()
        )));
    }

    let derived_key = derive_key(
        password,
        &salt,
        crypto.kdf_params.memory,
        crypto.kdf_params.iterations,
    )?;
    let cipher = Aes256Gcm::new_from_slice(derived_key.as_ref())
        .map_err(|e| keystore_error(format!("AES key init failed: {e}")))?;
    let plaintext = Zeroizing::new(
        cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
            .map_err(|_| keystore_error("decryption failed: wrong password or corrupted data"))?,
    );
    let secret: [u8; 32] = plaintext.as_slice().try_into().map_err(|_| {
        keystore_error(format!(
            "decrypted key has wrong length: expected 32, got {}",
            plaintext.len()
        ))
    })?;

    let keypair = keypair_from_private(PrivateKey(secret));
    if keypair.public != keystore.public_key()? {
        return Err(keystore_error("decrypted key does not match stored public key"));
    }
    Ok(keypair)
}

pub fn save_keystore(keystore: &KeystoreFile, path: &Path) -> Result<(), ClientError> {
    let json = serde_json::to_string_pretty(keystore)
        .map_err(|e| keystore_error(format!("JSON serialization failed: {e}")))?;
    std::fs::write(path, json)
        .map_err(|e| keystore_error(format!("failed to write {}: {e}", path.display())))
}

pub fn load_keystore(path: &Path) -> Result<KeystoreFile, ClientError> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| keystore_error(format!("failed to read {}: {e}", path.display())))?;
    serde_json::from_str(&json).map_err(|e| keystore_error(format!("invalid keystore JSON: {e}")))
}

fn derive_key(
    password: &str,
    salt: &[u8],
    memory_kib: u32,
    iterations: u32,
) -> Result<Zeroizing<[u8; 32]>, ClientError> {
    let params = Params::new(
        memory_kib,
        iterations,
        ARGON2_PARALLELISM,
        Some(ARGON2_OUTPUT_LEN),
    )
    .map_err(|e| keystore_error(format!("Argon2 params error: {e}")))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut output = Zeroizing::new([0u8; 32]);
    argon2
        .hash_password_into(password.as_bytes(), salt, output.as_mut())
        .map_err(|e| keystore_error(format!("Argon2 hashing failed: {e}")))?;
    Ok(output)
}
