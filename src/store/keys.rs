pub fn user_key(user_id: &str) -> String {
    user_id.to_string()
}

pub fn user_email_index_key(email: &str) -> String {
    format!("email:{}", email.to_lowercase())
}

pub fn user_username_index_key(username: &str) -> String {
    format!("username:{}", username.to_lowercase())
}

pub fn children_index_key(parent_id: &str, child_id: &str) -> String {
    format!("children:{}:{}", parent_id, child_id)
}

pub fn children_index_prefix(parent_id: &str) -> String {
    format!("children:{}:", parent_id)
}

pub fn session_key(token_hash: &str) -> String {
    token_hash.to_string()
}

pub fn session_user_index_key(user_id: &str, token_hash: &str) -> String {
    format!("user:{}:{}", user_id, token_hash)
}

pub fn session_user_index_prefix(user_id: &str) -> String {
    format!("user:{}:", user_id)
}

/// Reverse-timestamp record key so prefix scans yield newest first.
pub fn test_result_key(user_id: &str, timestamp_ms: i64, result_id: &str) -> String {
    let ts = timestamp_ms.max(0) as u64;
    let reverse_ts = u64::MAX - ts;
    format!("{}:{:020}:{}", user_id, reverse_ts, result_id)
}

pub fn test_result_prefix(user_id: &str) -> String {
    format!("{}:", user_id)
}

pub fn game_score_key(user_id: &str, timestamp_ms: i64, score_id: &str) -> String {
    let ts = timestamp_ms.max(0) as u64;
    let reverse_ts = u64::MAX - ts;
    format!("{}:{:020}:{}", user_id, reverse_ts, score_id)
}

pub fn game_score_prefix(user_id: &str) -> String {
    format!("{}:", user_id)
}

pub fn difficulty_state_key(user_id: &str) -> String {
    user_id.to_string()
}

/// Daily stats sort ascending by date within a user prefix.
pub fn daily_stat_key(user_id: &str, date: &str) -> String {
    format!("{}:{}", user_id, date)
}

pub fn daily_stat_prefix(user_id: &str) -> String {
    format!("{}:", user_id)
}

pub fn password_reset_key(token_hash: &str) -> String {
    token_hash.to_string()
}
