pub const USERS: &str = "users";
pub const SESSIONS: &str = "sessions";
pub const TEST_RESULTS: &str = "test_results";
pub const GAME_SCORES: &str = "game_scores";
pub const DIFFICULTY_STATES: &str = "difficulty_states";
pub const DAILY_STATS: &str = "daily_stats";
pub const PASSWORD_RESET_TOKENS: &str = "password_reset_tokens";
pub const CONFIG_VERSIONS: &str = "config_versions";
