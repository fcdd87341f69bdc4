use crate::engine::state::LearnerDifficultyState;
use crate::store::keys;
use crate::store::{Store, StoreError};

impl Store {
    pub fn get_difficulty_state(
        &self,
        user_id: &str,
    ) -> Result<Option<LearnerDifficultyState>, StoreError> {
        let key = keys::difficulty_state_key(user_id);
        match self.difficulty_states.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn put_difficulty_state(
        &self,
        user_id: &str,
        state: &LearnerDifficultyState,
    ) -> Result<(), StoreError> {
        let key = keys::difficulty_state_key(user_id);
        let bytes = Self::serialize(state)?;
        self.difficulty_states.insert(key.as_bytes(), bytes)?;
        Ok(())
    }
}
