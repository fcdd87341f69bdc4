use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::keys;
use crate::store::{Store, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordResetToken {
    pub token_hash: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}

impl Store {
    pub fn create_password_reset_token(
        &self,
        token: &PasswordResetToken,
    ) -> Result<(), StoreError> {
        let key = keys::password_reset_key(&token.token_hash);
        let bytes = Self::serialize(token)?;
        self.password_reset_tokens.insert(key.as_bytes(), bytes)?;
        Ok(())
    }

    /// Returns None for expired or already-used tokens.
    pub fn get_valid_password_reset_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<PasswordResetToken>, StoreError> {
        let key = keys::password_reset_key(token_hash);
        let Some(raw) = self.password_reset_tokens.get(key.as_bytes())? else {
            return Ok(None);
        };

        let token = Self::deserialize::<PasswordResetToken>(&raw)?;
        if token.used || token.expires_at <= Utc::now() {
            return Ok(None);
        }

        Ok(Some(token))
    }

    /// Marks a token used atomically, returning false if it was already
    /// consumed, missing or expired. One-time-use guarantee under races.
    pub fn consume_password_reset_token(&self, token_hash: &str) -> Result<bool, StoreError> {
        let key = keys::password_reset_key(token_hash);
        let key_bytes = key.as_bytes().to_vec();

        self.password_reset_tokens
            .transaction(move |tx| {
                let Some(raw) = tx.get(key_bytes.as_slice())? else {
                    return Ok(false);
                };
                let mut token = match serde_json::from_slice::<PasswordResetToken>(&raw) {
                    Ok(t) => t,
                    Err(_) => return Ok(false),
                };
                if token.used || token.expires_at <= Utc::now() {
                    return Ok(false);
                }
                token.used = true;
                let bytes = match serde_json::to_vec(&token) {
                    Ok(b) => b,
                    Err(_) => return Ok(false),
                };
                tx.insert(key_bytes.as_slice(), bytes.as_slice())?;
                Ok(true)
            })
            .map_err(|e: sled::transaction::TransactionError<()>| match e {
                sled::transaction::TransactionError::Abort(()) => {
                    StoreError::Sled(sled::Error::Unsupported("transaction aborted".into()))
                }
                sled::transaction::TransactionError::Storage(se) => StoreError::Sled(se),
            })
    }

    /// Removes expired or used tokens, at most 1000 per call.
    pub fn cleanup_expired_password_reset_tokens(&self) -> Result<u32, StoreError> {
        const MAX_BATCH_SIZE: usize = 1000;

        let mut stale = Vec::new();
        for item in self.password_reset_tokens.iter() {
            let (k, v) = item?;
            let token: PasswordResetToken = Self::deserialize(&v)?;
            if token.used || token.expires_at <= Utc::now() {
                stale.push(k.to_vec());
                if stale.len() >= MAX_BATCH_SIZE {
                    break;
                }
            }
        }

        let count = stale.len() as u32;
        for key in stale {
            self.password_reset_tokens.remove(key)?;
        }

        Ok(count)
    }
}
