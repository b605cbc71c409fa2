use crate::response::{AnalysisResponse, Scalar};

pub const REAL_JOB: &str = "Real Job";
pub const FAKE_JOB: &str = "Fake Job";
pub const UNKNOWN: &str = "Unknown";

/// Canonical `{result, confidence}` pair used by history and rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedResult {
    pub result: String,
    pub confidence: String,
}

impl NormalizedResult {
    pub fn is_fake(&self) -> bool {
        self.result.contains("Fake")
    }
}

pub fn normalize(result: Option<&Scalar>, confidence: Option<&Scalar>) -> NormalizedResult {
    NormalizedResult {
        result: normalize_label(result),
        confidence: format_confidence(confidence),
    }
}

pub fn normalize_response(response: &AnalysisResponse) -> NormalizedResult {
    normalize(response.verdict_value(), response.confidence.as_ref())
}

/// First match wins: "real" text, "fake" text, numeric 1, numeric 0,
/// otherwise the original value unchanged.
pub fn normalize_label(result: Option<&Scalar>) -> String {
    match result {
        Some(Scalar::Text(text)) => {
            let lower = text.to_lowercase();
            if lower.contains("real") {
                REAL_JOB.to_string()
            } else if lower.contains("fake") {
                FAKE_JOB.to_string()
            } else if text.is_empty() {
                UNKNOWN.to_string()
            } else {
                text.clone()
            }
        }
        Some(Scalar::Number(n)) if *n == 1.0 => REAL_JOB.to_string(),
        Some(Scalar::Number(n)) if *n == 0.0 => FAKE_JOB.to_string(),
        Some(other) => other.to_string(),
        None => UNKNOWN.to_string(),
    }
}

pub fn format_confidence(confidence: Option<&Scalar>) -> String {
    let text = match confidence {
        Some(value) if !value.is_blank() => value.to_string(),
        _ => "0".to_string(),
    };
    if text.contains('%') {
        text
    } else {
        format!("{}%", text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Scalar {
        Scalar::Text(s.to_string())
    }

    #[test]
    fn test_numeric_one_without_confidence() {
        let norm = normalize(Some(&Scalar::Number(1.0)), None);
        assert_eq!(norm.result, "Real Job");
        assert_eq!(norm.confidence, "0%");
    }

    #[test]
    fn test_numeric_zero_is_fake() {
        let norm = normalize(Some(&Scalar::Number(0.0)), Some(&Scalar::Number(73.0)));
        assert_eq!(norm.result, "Fake Job");
        assert_eq!(norm.confidence, "73%");
        assert!(norm.is_fake());
    }

    #[test]
    fn test_label_matching_is_case_insensitive() {
        assert_eq!(normalize_label(Some(&text("FAKE - high risk"))), "Fake Job");
        assert_eq!(normalize_label(Some(&text("real"))), "Real Job");
        assert_eq!(normalize_label(Some(&text("Likely REAL posting"))), "Real Job");
    }

    #[test]
    fn test_real_checked_before_fake() {
        assert_eq!(normalize_label(Some(&text("not fake, really real"))), "Real Job");
    }

    #[test]
    fn test_unrecognized_values_pass_through() {
        assert_eq!(normalize_label(Some(&text("Unknown"))), "Unknown");
        assert_eq!(normalize_label(Some(&text("Inconclusive"))), "Inconclusive");
        assert_eq!(normalize_label(Some(&Scalar::Number(2.0))), "2");
        assert_eq!(normalize_label(Some(&text("1"))), "1");
        assert_eq!(normalize_label(None), "Unknown");
    }

    #[test]
    fn test_confidence_suffix_not_doubled() {
        assert_eq!(format_confidence(Some(&text("92%"))), "92%");
        assert_eq!(format_confidence(Some(&text("85% (Domain Verified)"))), "85% (Domain Verified)");
        assert_eq!(format_confidence(Some(&Scalar::Number(64.25))), "64.25%");
        assert_eq!(format_confidence(Some(&text(""))), "0%");
    }

    #[test]
    fn test_normalize_response_prefers_result_over_prediction() {
        let response = AnalysisResponse {
            result: Some(text("Real Job")),
            prediction: Some(Scalar::Number(0.0)),
            confidence: Some(Scalar::Number(88.0)),
            ..Default::default()
        };
        let norm = normalize_response(&response);
        assert_eq!(norm.result, "Real Job");
        assert_eq!(norm.confidence, "88%");
    }
}
