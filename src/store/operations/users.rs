use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::keys;
use crate::store::{Store, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Parent,
    Child,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub user_type: UserType,
    /// Set on child accounts only, links to the paired parent.
    pub parent_id: Option<String>,
    pub age: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Store {
    pub fn create_user(&self, user: &User) -> Result<(), StoreError> {
        let email_key = keys::user_email_index_key(&user.email);
        let username_key = keys::user_username_index_key(&user.username);

        // Atomic compare-and-swap: only insert if the email key does not exist.
        // This prevents the race where two concurrent registrations with the
        // same email both pass the existence check.
        let cas_result = self
            .users
            .compare_and_swap(
                email_key.as_bytes(),
                None::<&[u8]>,
                Some(user.id.as_bytes().to_vec()),
            )
            .map_err(StoreError::Sled)?;

        if cas_result.is_err() {
            return Err(StoreError::Conflict {
                entity: "user_email".to_string(),
                key: user.email.clone(),
            });
        }

        // Same discipline for the username index; roll back the email
        // reservation on conflict.
        let cas_result = self
            .users
            .compare_and_swap(
                username_key.as_bytes(),
                None::<&[u8]>,
                Some(user.id.as_bytes().to_vec()),
            )
            .map_err(StoreError::Sled)?;

        if cas_result.is_err() {
            let _ = self.users.remove(email_key.as_bytes());
            return Err(StoreError::Conflict {
                entity: "user_username".to_string(),
                key: user.username.clone(),
            });
        }

        let user_key = keys::user_key(&user.id);
        let user_bytes = Self::serialize(user)?;
        if let Err(e) = self.users.insert(user_key.as_bytes(), user_bytes) {
            let _ = self.users.remove(email_key.as_bytes());
            let _ = self.users.remove(username_key.as_bytes());
            return Err(StoreError::Sled(e));
        }

        if let Some(parent_id) = &user.parent_id {
            let child_key = keys::children_index_key(parent_id, &user.id);
            self.users.insert(child_key.as_bytes(), &[] as &[u8])?;
        }

        Ok(())
    }

    pub fn get_user_by_id(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        let key = keys::user_key(user_id);
        match self.users.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let index_key = keys::user_email_index_key(email);
        let Some(user_id_raw) = self.users.get(index_key.as_bytes())? else {
            return Ok(None);
        };
        let user_id = match String::from_utf8(user_id_raw.to_vec()) {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(error = %e, "Invalid UTF-8 in user email index");
                return Ok(None);
            }
        };
        self.get_user_by_id(&user_id)
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let index_key = keys::user_username_index_key(username);
        let Some(user_id_raw) = self.users.get(index_key.as_bytes())? else {
            return Ok(None);
        };
        let user_id = match String::from_utf8(user_id_raw.to_vec()) {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(error = %e, "Invalid UTF-8 in username index");
                return Ok(None);
            }
        };
        self.get_user_by_id(&user_id)
    }

    /// Updates a user record. Email and username changes re-point their
    /// index entries transactionally so uniqueness holds under concurrency.
    pub fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let existing = self
            .get_user_by_id(&user.id)?
            .ok_or_else(|| StoreError::NotFound {
                entity: "user".to_string(),
                key: user.id.clone(),
            })?;

        let user_bytes = Self::serialize(user)?;
        let user_key = keys::user_key(&user.id);

        let email_changed = existing.email.to_lowercase() != user.email.to_lowercase();
        let username_changed = existing.username.to_lowercase() != user.username.to_lowercase();

        if email_changed || username_changed {
            let old_email_key = keys::user_email_index_key(&existing.email);
            let new_email_key = keys::user_email_index_key(&user.email);
            let old_username_key = keys::user_username_index_key(&existing.username);
            let new_username_key = keys::user_username_index_key(&user.username);
            let uid_bytes = user.id.as_bytes().to_vec();
            let ub = user_bytes.clone();
            let uk = user_key.clone();
            self.users
                .transaction(move |tx| {
                    if email_changed {
                        if let Some(existing_uid) = tx.get(new_email_key.as_bytes())? {
                            if existing_uid.as_ref() != uid_bytes.as_slice() {
                                return sled::transaction::abort(());
                            }
                        }
                        tx.remove(old_email_key.as_bytes())?;
                        tx.insert(new_email_key.as_bytes(), uid_bytes.as_slice())?;
                    }
                    if username_changed {
                        if let Some(existing_uid) = tx.get(new_username_key.as_bytes())? {
                            if existing_uid.as_ref() != uid_bytes.as_slice() {
                                return sled::transaction::abort(());
                            }
                        }
                        tx.remove(old_username_key.as_bytes())?;
                        tx.insert(new_username_key.as_bytes(), uid_bytes.as_slice())?;
                    }
                    tx.insert(uk.as_bytes(), ub.as_slice())?;
                    Ok(())
                })
                .map_err(
                    |e: sled::transaction::TransactionError<()>| match e {
                        sled::transaction::TransactionError::Abort(()) => StoreError::Conflict {
                            entity: "user".to_string(),
                            key: user.id.clone(),
                        },
                        sled::transaction::TransactionError::Storage(se) => StoreError::Sled(se),
                    },
                )?;
        } else {
            self.users.insert(user_key.as_bytes(), user_bytes)?;
        }

        Ok(())
    }

    pub fn list_children(&self, parent_id: &str) -> Result<Vec<User>, StoreError> {
        let prefix = keys::children_index_prefix(parent_id);
        let mut children = Vec::new();

        for item in self.users.scan_prefix(prefix.as_bytes()) {
            let (k, _) = item?;
            let key_str = match String::from_utf8(k.to_vec()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping children index key with invalid UTF-8");
                    continue;
                }
            };
            let Some(child_id) = key_str.rsplit(':').next() else {
                continue;
            };
            if let Some(child) = self.get_user_by_id(child_id)? {
                children.push(child);
            }
        }

        children.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(children)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tempfile::tempdir;

    use super::*;

    fn sample_user(id: &str, email: &str, username: &str) -> User {
        User {
            id: id.to_string(),
            email: email.to_string(),
            username: username.to_string(),
            password_hash: "hash".to_string(),
            user_type: UserType::Child,
            parent_id: None,
            age: Some(8),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn create_and_get_user() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("users-db");
        let store = Store::open(db_path.to_str().unwrap()).unwrap();

        let user = sample_user("u1", "u1@test.com", "kid1");
        store.create_user(&user).unwrap();
        let got = store.get_user_by_id("u1").unwrap().unwrap();
        assert_eq!(got.email, "u1@test.com");
        assert_eq!(got.user_type, UserType::Child);
    }

    #[test]
    fn duplicate_email_conflicts() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("users-db2");
        let store = Store::open(db_path.to_str().unwrap()).unwrap();

        let u1 = sample_user("u1", "dup@test.com", "kid1");
        let u2 = sample_user("u2", "dup@test.com", "kid2");
        store.create_user(&u1).unwrap();
        let err = store.create_user(&u2).unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[test]
    fn duplicate_username_conflicts_and_rolls_back_email() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("users-db3");
        let store = Store::open(db_path.to_str().unwrap()).unwrap();

        let u1 = sample_user("u1", "a@test.com", "samename");
        let u2 = sample_user("u2", "b@test.com", "samename");
        store.create_user(&u1).unwrap();
        let err = store.create_user(&u2).unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
        // the second registration's email reservation must not linger
        assert!(store.get_user_by_email("b@test.com").unwrap().is_none());
    }

    #[test]
    fn children_are_listed_for_parent() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("users-db4");
        let store = Store::open(db_path.to_str().unwrap()).unwrap();

        let mut parent = sample_user("p1", "p@test.com", "parent1");
        parent.user_type = UserType::Parent;
        parent.age = None;
        store.create_user(&parent).unwrap();

        let mut child = sample_user("c1", "c@test.com", "kid1");
        child.parent_id = Some("p1".to_string());
        store.create_user(&child).unwrap();

        let children = store.list_children("p1").unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, "c1");
    }

    #[test]
    fn username_lookup_is_case_insensitive() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("users-db5");
        let store = Store::open(db_path.to_str().unwrap()).unwrap();

        let user = sample_user("u1", "u1@test.com", "MixedCase");
        store.create_user(&user).unwrap();
        assert!(store.get_user_by_username("mixedcase").unwrap().is_some());
    }
}
