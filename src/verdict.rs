use crate::normalize::format_confidence;
use crate::response::{AnalysisResponse, RiskLevel, Scalar};

/// Below this risk score a trusted domain overrides a fake prediction.
pub const TRUSTED_OVERRIDE_CEILING: f64 = 15.0;
/// Below this risk score a fake prediction is only "suspicious".
pub const SUSPICIOUS_CEILING: f64 = 30.0;
pub const DOMAIN_VERIFIED_CONFIDENCE: &str = "85% (Domain Verified)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Blacklisted,
    Legitimate,
    Suspicious,
    PotentialScam,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Blacklisted => "BLACKLISTED SCAM",
            Severity::Legitimate => "Legitimate Job",
            Severity::Suspicious => "Suspicious Activity",
            Severity::PotentialScam => "Potential Scam",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Severity::Blacklisted => "🚫",
            Severity::Legitimate => "✅",
            Severity::Suspicious => "⚠️",
            Severity::PotentialScam => "🚨",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Safe,
    Warning,
    Danger,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub is_real: bool,
    pub severity: Severity,
    pub confidence: String,
    /// Set when domain trust flipped a fake prediction.
    pub domain_override: bool,
    pub risk_score: f64,
}

pub fn decide(response: &AnalysisResponse) -> Verdict {
    let risk_score = response.risk_score();
    let mut confidence = format_confidence(response.confidence.as_ref());
    let mut domain_override = false;

    let is_real = match response.prediction.as_ref().and_then(Scalar::as_number) {
        Some(prediction) => {
            let mut real = prediction == 1.0;
            if !real && risk_score < TRUSTED_OVERRIDE_CEILING && response.trusted() {
                real = true;
                domain_override = true;
                confidence = DOMAIN_VERIFIED_CONFIDENCE.to_string();
            }
            real
        }
        None => response
            .verdict_value()
            .map(|v| v.to_string().to_lowercase().contains("real"))
            .unwrap_or(false),
    };

    let severity = if response.blacklisted() {
        Severity::Blacklisted
    } else if is_real {
        Severity::Legitimate
    } else if risk_score < SUSPICIOUS_CEILING {
        Severity::Suspicious
    } else {
        Severity::PotentialScam
    };

    Verdict {
        is_real,
        severity,
        confidence,
        domain_override,
        risk_score,
    }
}

/// Tone of the recommendation banner.
pub fn recommendation_tone(verdict: &Verdict, response: &AnalysisResponse) -> Tone {
    if verdict.severity == Severity::Blacklisted {
        Tone::Danger
    } else if verdict.is_real {
        Tone::Safe
    } else if response.risk_level() == Some(RiskLevel::Critical) {
        Tone::Danger
    } else {
        Tone::Warning
    }
}
