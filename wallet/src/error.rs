use thiserror::Error;

/// Credential store failures.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("key alias already exists: {0}")]
    DuplicateAlias(String),

    #[error("unknown key: {0}")]
    UnknownKey(String),

    #[error("password does not unlock key {alias}")]
    WrongPassword { alias: String },

    #[error("keystore crypto error: {0}")]
    Crypto(String),

    #[error("keystore file {path} is malformed: {reason}")]
    Format { path: String, reason: String },

    #[error("keystore io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("account alias already exists: {0}")]
    DuplicateAccount(String),

    #[error("asset alias already exists: {0}")]
    DuplicateAsset(String),

    #[error("unknown account alias: {0}")]
    UnknownAccount(String),

    #[error("unknown asset alias: {0}")]
    UnknownAsset(String),

    #[error("account {alias} quorum {quorum} is not satisfiable by {keys} keys")]
    InvalidQuorum {
        alias: String,
        quorum: usize,
        keys: usize,
    },

    #[error("cannot attach block at height {got}; wallet expects height {expected}")]
    AttachOutOfOrder { expected: u64, got: u64 },

    #[error("cannot detach block at height {got}; wallet's last attached height is {expected}")]
    DetachOutOfOrder { expected: u64, got: u64 },

    #[error(transparent)]
    Key(#[from] KeyError),
}
