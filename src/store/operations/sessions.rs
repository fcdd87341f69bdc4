use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::keys;
use crate::store::{Store, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token_hash: String,
    pub user_id: String,
    pub token_type: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
}

impl Store {
    pub fn create_session(&self, session: &Session) -> Result<(), StoreError> {
        let key = keys::session_key(&session.token_hash);
        let index_key = keys::session_user_index_key(&session.user_id, &session.token_hash);
        let session_bytes = Self::serialize(session)?;

        let key_bytes = key.as_bytes().to_vec();
        let index_key_bytes = index_key.as_bytes().to_vec();
        self.sessions
            .transaction(move |tx| {
                tx.insert(key_bytes.as_slice(), session_bytes.as_slice())?;
                tx.insert(index_key_bytes.as_slice(), &[] as &[u8])?;
                Ok(())
            })
            .map_err(|e: sled::transaction::TransactionError<()>| match e {
                sled::transaction::TransactionError::Abort(()) => {
                    StoreError::Sled(sled::Error::Unsupported("transaction aborted".into()))
                }
                sled::transaction::TransactionError::Storage(se) => StoreError::Sled(se),
            })?;
        Ok(())
    }

    /// Returns None for expired or revoked sessions without deleting them.
    /// Cleanup is the session_cleanup worker's job.
    pub fn get_session(&self, token_hash: &str) -> Result<Option<Session>, StoreError> {
        let key = keys::session_key(token_hash);
        let Some(raw) = self.sessions.get(key.as_bytes())? else {
            return Ok(None);
        };

        let session = Self::deserialize::<Session>(&raw)?;
        if session.revoked || session.expires_at <= Utc::now() {
            return Ok(None);
        }

        Ok(Some(session))
    }

    pub fn delete_session(&self, token_hash: &str) -> Result<(), StoreError> {
        let key = keys::session_key(token_hash);
        let raw = self.sessions.get(key.as_bytes())?;

        let session_key_bytes = key.as_bytes().to_vec();
        let index_key_bytes = raw
            .as_ref()
            .and_then(|r| Self::deserialize::<Session>(r).ok())
            .map(|session| {
                keys::session_user_index_key(&session.user_id, token_hash)
                    .as_bytes()
                    .to_vec()
            });

        self.sessions
            .transaction(move |tx| {
                if let Some(ref idx_key) = index_key_bytes {
                    tx.remove(idx_key.as_slice())?;
                }
                tx.remove(session_key_bytes.as_slice())?;
                Ok(())
            })
            .map_err(|e: sled::transaction::TransactionError<()>| match e {
                sled::transaction::TransactionError::Abort(()) => {
                    StoreError::Sled(sled::Error::Unsupported("transaction aborted".into()))
                }
                sled::transaction::TransactionError::Storage(se) => StoreError::Sled(se),
            })?;

        Ok(())
    }

    /// Deletes a session atomically, returning whether it existed.
    /// Used for refresh-token rotation so a replayed token cannot win a race.
    pub fn delete_session_if_exists(&self, token_hash: &str) -> Result<bool, StoreError> {
        let key = keys::session_key(token_hash);
        let session_key_bytes = key.as_bytes().to_vec();
        let token_hash_owned = token_hash.to_string();

        self.sessions
            .transaction(move |tx| {
                let Some(raw) = tx.remove(session_key_bytes.as_slice())? else {
                    return Ok(false);
                };

                if let Ok(session) = serde_json::from_slice::<Session>(&raw) {
                    let idx_key =
                        keys::session_user_index_key(&session.user_id, &token_hash_owned);
                    tx.remove(idx_key.as_bytes())?;
                }

                Ok(true)
            })
            .map_err(|e: sled::transaction::TransactionError<()>| match e {
                sled::transaction::TransactionError::Abort(()) => {
                    StoreError::Sled(sled::Error::Unsupported("transaction aborted".into()))
                }
                sled::transaction::TransactionError::Storage(se) => StoreError::Sled(se),
            })
    }

    pub fn delete_user_sessions(&self, user_id: &str) -> Result<u32, StoreError> {
        let prefix = keys::session_user_index_prefix(user_id);
        let mut hashes = Vec::new();

        for item in self.sessions.scan_prefix(prefix.as_bytes()) {
            let (k, _) = item?;
            let key_str = match String::from_utf8(k.to_vec()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping session index key with invalid UTF-8");
                    continue;
                }
            };
            if let Some(hash) = key_str.rsplit(':').next() {
                hashes.push(hash.to_string());
            }
        }

        let count = hashes.len() as u32;
        for hash in hashes {
            self.delete_session(&hash)?;
        }
        Ok(count)
    }

    /// Caps concurrent sessions per user, dropping oldest first.
    pub fn cleanup_oldest_user_sessions(
        &self,
        user_id: &str,
        max_sessions: usize,
    ) -> Result<(), StoreError> {
        let prefix = keys::session_user_index_prefix(user_id);
        let mut sessions: Vec<(String, DateTime<Utc>)> = Vec::new();

        for item in self.sessions.scan_prefix(prefix.as_bytes()) {
            let (k, _) = item?;
            let key_str = match String::from_utf8(k.to_vec()) {
                Ok(s) => s,
                Err(_) => continue,
            };
            if let Some(hash) = key_str.rsplit(':').next() {
                let session_key = keys::session_key(hash);
                if let Some(raw) = self.sessions.get(session_key.as_bytes())? {
                    if let Ok(session) = Self::deserialize::<Session>(&raw) {
                        sessions.push((hash.to_string(), session.created_at));
                    }
                }
            }
        }

        if sessions.len() <= max_sessions {
            return Ok(());
        }

        sessions.sort_by_key(|(_, created_at)| *created_at);

        let to_remove = sessions.len() - max_sessions;
        for (hash, _) in sessions.into_iter().take(to_remove) {
            self.delete_session(&hash)?;
        }

        Ok(())
    }

    /// Removes expired or revoked sessions, at most 1000 per call to bound
    /// the scan. Returns the number deleted in this batch.
    pub fn cleanup_expired_sessions(&self) -> Result<u32, StoreError> {
        const MAX_BATCH_SIZE: usize = 1000;

        let mut expired = Vec::new();
        for item in self.sessions.iter() {
            let (k, v) = item?;
            let key_str = String::from_utf8_lossy(&k);
            if key_str.starts_with("user:") {
                continue;
            }
            let session: Session = Self::deserialize(&v)?;
            if session.expires_at <= Utc::now() || session.revoked {
                expired.push(session.token_hash);
                if expired.len() >= MAX_BATCH_SIZE {
                    break;
                }
            }
        }

        let count = expired.len() as u32;
        for token_hash in expired {
            self.delete_session(&token_hash)?;
        }

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use tempfile::tempdir;

    use super::*;

    fn sample_session(token_hash: &str, user_id: &str, expires_in_hours: i64) -> Session {
        Session {
            token_hash: token_hash.to_string(),
            user_id: user_id.to_string(),
            token_type: "user".to_string(),
            created_at: Utc::now(),
            expires_at: Utc::now() + Duration::hours(expires_in_hours),
            revoked: false,
        }
    }

    #[test]
    fn create_and_get_session() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("sessions-db");
        let store = Store::open(db_path.to_str().unwrap()).unwrap();

        let session = sample_session("h1", "u1", 1);
        store.create_session(&session).unwrap();

        let got = store.get_session("h1").unwrap().unwrap();
        assert_eq!(got.user_id, "u1");
    }

    #[test]
    fn expired_session_is_invisible() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("sessions-db2");
        let store = Store::open(db_path.to_str().unwrap()).unwrap();

        store
            .create_session(&sample_session("h_expired", "u1", -1))
            .unwrap();
        assert!(store.get_session("h_expired").unwrap().is_none());
    }

    #[test]
    fn cleanup_expired() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("sessions-db3");
        let store = Store::open(db_path.to_str().unwrap()).unwrap();

        store
            .create_session(&sample_session("h_expired", "u1", -1))
            .unwrap();
        store
            .create_session(&sample_session("h_alive", "u1", 1))
            .unwrap();

        let cleaned = store.cleanup_expired_sessions().unwrap();
        assert_eq!(cleaned, 1);
        assert!(store.get_session("h_expired").unwrap().is_none());
        assert!(store.get_session("h_alive").unwrap().is_some());
    }

    #[test]
    fn rotation_delete_is_one_shot() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("sessions-db4");
        let store = Store::open(db_path.to_str().unwrap()).unwrap();

        store.create_session(&sample_session("h1", "u1", 1)).unwrap();
        assert!(store.delete_session_if_exists("h1").unwrap());
        assert!(!store.delete_session_if_exists("h1").unwrap());
    }

    #[test]
    fn oldest_sessions_are_trimmed() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("sessions-db5");
        let store = Store::open(db_path.to_str().unwrap()).unwrap();

        let mut old = sample_session("h_old", "u1", 1);
        old.created_at = Utc::now() - Duration::hours(5);
        store.create_session(&old).unwrap();
        store.create_session(&sample_session("h_new", "u1", 1)).unwrap();

        store.cleanup_oldest_user_sessions("u1", 1).unwrap();
        assert!(store.get_session("h_old").unwrap().is_none());
        assert!(store.get_session("h_new").unwrap().is_some());
    }
}
