pub mod daily_stats;
pub mod difficulty;
pub mod game_scores;
pub mod password_resets;
pub mod sessions;
pub mod test_results;
pub mod users;
