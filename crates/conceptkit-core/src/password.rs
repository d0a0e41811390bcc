//! # Password Concept
//!
//! Salted credential storage: `set`, `check`, `validate`.
//!
//! Hashes are BLAKE3 over `password || salt` with a fresh random salt per
//! `set`. Both values are stored base64-encoded. Comparison goes through
//! `blake3::Hash`, whose equality is constant-time.

use crate::concept::{Concept, TypedRecord, VariantOutput, text_field, variant};
use crate::primitives::{MIN_PASSWORD_LENGTH, PASSWORD, SALT_LENGTH};
use crate::storage::RelationStore;
use crate::{Key, KernelError, Record};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// A stored credential. `hash` and `salt` are raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub user: String,
    pub hash: [u8; blake3::OUT_LEN],
    pub salt: Vec<u8>,
}

impl Credential {
    fn key_for(user: &str) -> Key {
        Key::single(user)
    }

    fn derive(password: &str, salt: &[u8]) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(password.as_bytes());
        hasher.update(salt);
        hasher.finalize()
    }

    /// Fresh credential for `password` with a random salt.
    fn create(user: String, password: &str) -> Self {
        let mut salt = vec![0u8; SALT_LENGTH];
        rand::thread_rng().fill_bytes(&mut salt);
        let hash = *Self::derive(password, &salt).as_bytes();
        Self { user, hash, salt }
    }

    fn verify(&self, password: &str) -> bool {
        Self::derive(password, &self.salt) == blake3::Hash::from_bytes(self.hash)
    }
}

impl TypedRecord for Credential {
    const RELATION: &'static str = PASSWORD;

    fn key(&self) -> Key {
        Self::key_for(&self.user)
    }

    fn to_record(&self) -> Result<Record, KernelError> {
        Ok(Record::new()
            .with("user", self.user.as_str())
            .with("hash", BASE64.encode(self.hash))
            .with("salt", BASE64.encode(&self.salt)))
    }

    fn from_record(key: &Key, record: &Record) -> Result<Self, KernelError> {
        let decode = |field: &str| -> Result<Vec<u8>, KernelError> {
            let encoded = text_field(Self::RELATION, key, record, field)?;
            BASE64
                .decode(encoded)
                .map_err(|_| KernelError::corrupted(Self::RELATION, key, field))
        };

        let hash: [u8; blake3::OUT_LEN] = decode("hash")?
            .try_into()
            .map_err(|_| KernelError::corrupted(Self::RELATION, key, "hash"))?;

        Ok(Self {
            user: text_field(Self::RELATION, key, record, "user")?,
            hash,
            salt: decode("salt")?,
        })
    }
}

fn long_enough(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LENGTH
}

// =============================================================================
// OPERATIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetInput {
    pub user: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "variant")]
pub enum SetOutput {
    #[serde(rename = "ok")]
    Ok { user: String },
    #[serde(rename = "invalid")]
    Invalid { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInput {
    pub user: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "variant")]
pub enum CheckOutput {
    #[serde(rename = "ok")]
    Ok { valid: bool },
    #[serde(rename = "notfound")]
    NotFound { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateInput {
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "variant")]
pub enum ValidateOutput {
    #[serde(rename = "ok")]
    Ok { valid: bool },
}

impl VariantOutput for SetOutput {
    fn variant(&self) -> &'static str {
        match self {
            Self::Ok { .. } => variant::OK,
            Self::Invalid { .. } => variant::INVALID,
        }
    }

    fn message(&self) -> Option<&str> {
        match self {
            Self::Ok { .. } => None,
            Self::Invalid { message } => Some(message),
        }
    }
}

impl VariantOutput for CheckOutput {
    fn variant(&self) -> &'static str {
        match self {
            Self::Ok { .. } => variant::OK,
            Self::NotFound { .. } => variant::NOT_FOUND,
        }
    }

    fn message(&self) -> Option<&str> {
        match self {
            Self::Ok { .. } => None,
            Self::NotFound { message } => Some(message),
        }
    }
}

impl VariantOutput for ValidateOutput {
    fn variant(&self) -> &'static str {
        variant::OK
    }

    fn message(&self) -> Option<&str> {
        None
    }
}

// =============================================================================
// HANDLER
// =============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct PasswordHandler;

impl Concept for PasswordHandler {
    const NAME: &'static str = "password";
    const RELATIONS: &'static [&'static str] = &[PASSWORD];
}

impl PasswordHandler {
    /// Store (or replace) the credential for `user`.
    pub fn set(&self, input: SetInput, store: &dyn RelationStore) -> Result<SetOutput, KernelError> {
        if !long_enough(&input.password) {
            return Ok(SetOutput::Invalid {
                message: format!(
                    "Password must be at least {} characters",
                    MIN_PASSWORD_LENGTH
                ),
            });
        }

        let credential = Credential::create(input.user, &input.password);
        store.put(PASSWORD, credential.key(), credential.to_record()?);
        tracing::debug!(user = %credential.user, "credential stored");

        Ok(SetOutput::Ok {
            user: credential.user,
        })
    }

    pub fn check(
        &self,
        input: CheckInput,
        store: &dyn RelationStore,
    ) -> Result<CheckOutput, KernelError> {
        let key = Credential::key_for(&input.user);
        let Some(record) = store.get(PASSWORD, &key) else {
            return Ok(CheckOutput::NotFound {
                message: format!("No credentials for user '{}'", input.user),
            });
        };
        let credential = Credential::from_record(&key, &record)?;

        Ok(CheckOutput::Ok {
            valid: credential.verify(&input.password),
        })
    }

    /// Length rule only; never touches the store.
    pub fn validate(&self, input: ValidateInput) -> Result<ValidateOutput, KernelError> {
        Ok(ValidateOutput::Ok {
            valid: long_enough(&input.password),
        })
    }
}
