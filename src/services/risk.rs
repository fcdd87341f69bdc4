use serde::Serialize;

use crate::store::{TestResult, TestType};

const MIN_RESULTS_FOR_SCREENING: usize = 2;

const MODALITY_LOW_ACCURACY: f64 = 0.5;
const MODALITY_MID_ACCURACY: f64 = 0.7;
const MODALITY_LOW_CONTRIBUTION: f64 = 0.4;
const MODALITY_MID_CONTRIBUTION: f64 = 0.2;

const WPM_LOW: f64 = 20.0;
const WPM_MID: f64 = 30.0;
const WPM_LOW_CONTRIBUTION: f64 = 0.2;
const WPM_MID_CONTRIBUTION: f64 = 0.1;

const AT_RISK_THRESHOLD: f64 = 0.7;

// With no speech tests there is no wpm signal; 30 sits above both bands so
// the reading-speed term contributes nothing.
const WPM_NEUTRAL: f64 = 30.0;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskScreening {
    pub risk_probability: f64,
    pub at_risk: bool,
    pub average_speech_accuracy: Option<f64>,
    pub average_listening_accuracy: Option<f64>,
    pub average_words_per_minute: Option<f64>,
    pub results_considered: usize,
}

/// Rule-based dyslexia screening over accumulated test results. Banded
/// contributions per modality plus a reading-speed band, capped at 1.0.
/// A modality with no results counts as zero accuracy and lands in the low
/// band; the absence of data is itself a signal worth surfacing.
/// Needs at least two results; returns None otherwise. This is a screening
/// aid, not a diagnosis.
pub fn screen(results: &[TestResult]) -> Option<RiskScreening> {
    if results.len() < MIN_RESULTS_FOR_SCREENING {
        return None;
    }

    let speech: Vec<&TestResult> = results
        .iter()
        .filter(|r| r.test_type == TestType::Speech)
        .collect();
    let listening: Vec<&TestResult> = results
        .iter()
        .filter(|r| r.test_type == TestType::Listening)
        .collect();

    let avg_speech = mean(speech.iter().map(|r| r.accuracy));
    let avg_listening = mean(listening.iter().map(|r| r.accuracy));
    let avg_wpm = mean(speech.iter().filter_map(|r| r.words_per_minute));

    let mut probability = 0.0;

    probability += modality_contribution(avg_speech.unwrap_or(0.0));
    probability += modality_contribution(avg_listening.unwrap_or(0.0));

    let wpm = avg_wpm.unwrap_or(WPM_NEUTRAL);
    if wpm < WPM_LOW {
        probability += WPM_LOW_CONTRIBUTION;
    } else if wpm < WPM_MID {
        probability += WPM_MID_CONTRIBUTION;
    }

    let probability = probability.min(1.0);

    Some(RiskScreening {
        risk_probability: probability,
        at_risk: probability > AT_RISK_THRESHOLD,
        average_speech_accuracy: avg_speech,
        average_listening_accuracy: avg_listening,
        average_words_per_minute: avg_wpm,
        results_considered: results.len(),
    })
}

fn modality_contribution(accuracy: f64) -> f64 {
    if accuracy < MODALITY_LOW_ACCURACY {
        MODALITY_LOW_CONTRIBUTION
    } else if accuracy < MODALITY_MID_ACCURACY {
        MODALITY_MID_CONTRIBUTION
    } else {
        0.0
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for v in values {
        sum += v;
        count += 1;
    }
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn result(test_type: TestType, accuracy: f64, wpm: Option<f64>) -> TestResult {
        TestResult {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: "u1".to_string(),
            test_type,
            score: accuracy,
            accuracy,
            words_per_minute: wpm,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn fewer_than_two_results_is_inconclusive() {
        assert!(screen(&[]).is_none());
        assert!(screen(&[result(TestType::Speech, 0.3, Some(15.0))]).is_none());
    }

    #[test]
    fn strong_performance_is_low_risk() {
        let results = vec![
            result(TestType::Speech, 0.9, Some(60.0)),
            result(TestType::Listening, 0.85, None),
        ];
        let screening = screen(&results).unwrap();
        assert_eq!(screening.risk_probability, 0.0);
        assert!(!screening.at_risk);
    }

    #[test]
    fn weak_performance_across_the_board_is_at_risk() {
        let results = vec![
            result(TestType::Speech, 0.3, Some(15.0)),
            result(TestType::Listening, 0.4, None),
        ];
        let screening = screen(&results).unwrap();
        // 0.4 speech + 0.4 listening + 0.2 wpm, capped at 1.0
        assert!((screening.risk_probability - 1.0).abs() < 1e-9);
        assert!(screening.at_risk);
    }

    #[test]
    fn middling_bands_contribute_less() {
        let results = vec![
            result(TestType::Speech, 0.6, Some(25.0)),
            result(TestType::Listening, 0.6, None),
        ];
        let screening = screen(&results).unwrap();
        // 0.2 + 0.2 + 0.1
        assert!((screening.risk_probability - 0.5).abs() < 1e-9);
        assert!(!screening.at_risk);
    }

    #[test]
    fn missing_modality_counts_as_zero_accuracy() {
        let results = vec![
            result(TestType::Listening, 0.3, None),
            result(TestType::Listening, 0.3, None),
        ];
        let screening = screen(&results).unwrap();
        // 0.4 for the absent speech modality + 0.4 for listening at 0.3
        assert!((screening.risk_probability - 0.8).abs() < 1e-9);
        assert!(screening.at_risk);
        assert!(screening.average_speech_accuracy.is_none());
    }

    #[test]
    fn missing_wpm_adds_no_reading_speed_risk() {
        let results = vec![
            result(TestType::Listening, 0.9, None),
            result(TestType::Listening, 0.9, None),
        ];
        let screening = screen(&results).unwrap();
        // only the absent speech modality contributes
        assert!((screening.risk_probability - 0.4).abs() < 1e-9);
        assert!(!screening.at_risk);
        assert!(screening.average_words_per_minute.is_none());
    }
}
