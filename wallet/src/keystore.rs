//! Password-encrypted credential store.
//!
//! Each key lives in its own JSON file under the store directory:
//! Argon2id derives an encryption key from the password and a random
//! salt, AES-256-GCM encrypts the Ed25519 secret. The store never holds
//! decrypted key material between calls; signing decrypts, signs, and
//! lets the secret zeroize on drop.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::debug;

use ebb_types::{PrivateKey, PublicKey, Signature};

use crate::error::KeyError;

const ARGON2_MEMORY_KIB: u32 = 19_456;
const ARGON2_ITERATIONS: u32 = 2;
const ARGON2_PARALLELISM: u32 = 1;

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;

const KEYFILE_VERSION: u32 = 1;

/// Public half of a stored key, as returned by `list_keys`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKeyRecord {
    pub alias: String,
    pub pubkey: PublicKey,
}

/// On-disk key file.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct KeyFile {
    version: u32,
    alias: String,
    /// Hex-encoded public key.
    pubkey: String,
    crypto: CryptoSection,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct CryptoSection {
    cipher: String,
    kdf: String,
    kdf_params: KdfParams,
    salt: String,
    nonce: String,
    ciphertext: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct KdfParams {
    memory: u32,
    iterations: u32,
    parallelism: u32,
}

/// A directory of password-encrypted Ed25519 keys.
pub struct KeyStore {
    dir: PathBuf,
    keys: BTreeMap<String, (PublicKeyRecord, KeyFile)>,
}

impl KeyStore {
    /// Open a store, loading any key files already in `dir`.
    pub fn open(dir: &Path) -> Result<Self, KeyError> {
        let mut keys = BTreeMap::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let file = load_key_file(&path)?;
            let record = record_of(&file, &path)?;
            keys.insert(record.alias.clone(), (record, file));
        }
        debug!(dir = %dir.display(), keys = keys.len(), "keystore opened");
        Ok(Self {
            dir: dir.to_path_buf(),
            keys,
        })
    }

    /// Generate a key under `alias`, encrypted with `password`.
    pub fn create_key(
        &mut self,
        alias: &str,
        password: &str,
    ) -> Result<PublicKeyRecord, KeyError> {
        if self.keys.contains_key(alias) {
            return Err(KeyError::DuplicateAlias(alias.to_string()));
        }
        let pair = ebb_crypto::generate_keypair();
        let file = encrypt_key(alias, &pair.public, &pair.private, password)?;

        let path = self.dir.join(format!("{alias}.json"));
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| KeyError::Crypto(format!("key file serialization failed: {e}")))?;
        fs::write(&path, json)?;

        let record = PublicKeyRecord {
            alias: alias.to_string(),
            pubkey: pair.public,
        };
        self.keys.insert(alias.to_string(), (record.clone(), file));
        debug!(alias, pubkey = %record.pubkey, "key created");
        Ok(record)
    }

    /// All stored public key records, ordered by alias.
    pub fn list_keys(&self) -> Vec<PublicKeyRecord> {
        self.keys.values().map(|(r, _)| r.clone()).collect()
    }

    /// Look up a key's public record by alias.
    pub fn find_key(&self, alias: &str) -> Result<&PublicKeyRecord, KeyError> {
        self.keys
            .get(alias)
            .map(|(r, _)| r)
            .ok_or_else(|| KeyError::UnknownKey(alias.to_string()))
    }

    /// Sign `message` with the key identified by `pubkey`, unlocking it
    /// with `password`.
    pub fn sign(
        &self,
        pubkey: &PublicKey,
        password: &str,
        message: &[u8],
    ) -> Result<Signature, KeyError> {
        let (record, file) = self
            .keys
            .values()
            .find(|(r, _)| r.pubkey == *pubkey)
            .ok_or_else(|| KeyError::UnknownKey(pubkey.to_string()))?;
        let private = decrypt_key(file, password).map_err(|err| match err {
            KeyError::WrongPassword { .. } => KeyError::WrongPassword {
                alias: record.alias.clone(),
            },
            other => other,
        })?;
        Ok(ebb_crypto::sign_message(message, &private))
    }
}

fn record_of(file: &KeyFile, path: &Path) -> Result<PublicKeyRecord, KeyError> {
    let bytes = hex::decode(&file.pubkey).map_err(|e| KeyError::Format {
        path: path.display().to_string(),
        reason: format!("bad pubkey hex: {e}"),
    })?;
    let arr: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| KeyError::Format {
        path: path.display().to_string(),
        reason: format!("pubkey must be 32 bytes, got {}", v.len()),
    })?;
    Ok(PublicKeyRecord {
        alias: file.alias.clone(),
        pubkey: PublicKey(arr),
    })
}

fn load_key_file(path: &Path) -> Result<KeyFile, KeyError> {
    let json = fs::read_to_string(path)?;
    let file: KeyFile = serde_json::from_str(&json).map_err(|e| KeyError::Format {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    if file.version != KEYFILE_VERSION {
        return Err(KeyError::Format {
            path: path.display().to_string(),
            reason: format!("unsupported key file version {}", file.version),
        });
    }
    Ok(file)
}

fn encrypt_key(
    alias: &str,
    public: &PublicKey,
    private: &PrivateKey,
    password: &str,
) -> Result<KeyFile, KeyError> {
    let mut rng = rand::thread_rng();
    let mut salt = [0u8; SALT_LEN];
    rng.fill_bytes(&mut salt);
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rng.fill_bytes(&mut nonce_bytes);

    let derived = derive_key(password, &salt)?;
    let cipher = Aes256Gcm::new_from_slice(&derived)
        .map_err(|e| KeyError::Crypto(format!("AES key init failed: {e}")))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), private.0.as_ref())
        .map_err(|e| KeyError::Crypto(format!("encryption failed: {e}")))?;

    Ok(KeyFile {
        version: KEYFILE_VERSION,
        alias: alias.to_string(),
        pubkey: hex::encode(public.0),
        crypto: CryptoSection {
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

fn decrypt_key(file: &KeyFile, password: &str) -> Result<PrivateKey, KeyError> {
    let salt = hex::decode(&file.crypto.salt)
        .map_err(|e| KeyError::Crypto(format!("invalid salt hex: {e}")))?;
    let nonce_bytes = hex::decode(&file.crypto.nonce)
        .map_err(|e| KeyError::Crypto(format!("invalid nonce hex: {e}")))?;
    let ciphertext = hex::decode(&file.crypto.ciphertext)
        .map_err(|e| KeyError::Crypto(format!("invalid ciphertext hex: {e}")))?;
    if nonce_bytes.len() != NONCE_LEN {
        return Err(KeyError::Crypto(format!(
            "nonce must be {NONCE_LEN} bytes, got {}",
            nonce_bytes.len()
        )));
    }

    let derived = derive_key_with(password, &salt, &file.crypto.kdf_params)?;
    let cipher = Aes256Gcm::new_from_slice(&derived)
        .map_err(|e| KeyError::Crypto(format!("AES key init failed: {e}")))?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
        .map_err(|_| KeyError::WrongPassword {
            alias: file.alias.clone(),
        })?;

    let bytes: [u8; 32] = plaintext
        .try_into()
        .map_err(|v: Vec<u8>| KeyError::Crypto(format!("decrypted key has length {}", v.len())))?;
    Ok(PrivateKey(bytes))
}

fn derive_key(password: &str, salt: &[u8]) -> Result<[u8; 32], KeyError> {
    derive_key_with(
        password,
        salt,
        &KdfParams {
            memory: ARGON2_MEMORY_KIB,
            iterations: ARGON2_ITERATIONS,
            parallelism: ARGON2_PARALLELISM,
        },
    )
}

fn derive_key_with(password: &str, salt: &[u8], params: &KdfParams) -> Result<[u8; 32], KeyError> {
    let params = Params::new(params.memory, params.iterations, params.parallelism, Some(32))
        .map_err(|e| KeyError::Crypto(format!("argon2 params: {e}")))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let mut out = [0u8; 32];
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut out)
        .map_err(|e| KeyError::Crypto(format!("argon2 hashing failed: {e}")))?;
    Ok(out)
}
