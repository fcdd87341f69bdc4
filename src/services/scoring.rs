/// Position-aligned word accuracy: the i-th response word scores iff it
/// equals the i-th prompt word, case-insensitively. Extra response words
/// neither score nor penalize; the denominator is the prompt length.
pub fn word_accuracy(prompt: &str, response: &str) -> f64 {
    let prompt_words: Vec<String> = prompt
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect();
    if prompt_words.is_empty() {
        return 0.0;
    }

    let correct = response
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .enumerate()
        .filter(|(i, w)| prompt_words.get(*i).map(|p| p == w).unwrap_or(false))
        .count();

    correct as f64 / prompt_words.len() as f64
}

/// Spoken words per minute. Zero for non-positive durations.
pub fn words_per_minute(response: &str, time_taken_secs: f64) -> f64 {
    if !(time_taken_secs.is_finite() && time_taken_secs > 0.0) {
        return 0.0;
    }
    let word_count = response.split_whitespace().count();
    word_count as f64 / (time_taken_secs / 60.0)
}
