//! Typed view of the analysis service's JSON payloads.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed backend payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("backend payload has neither `result` nor `prediction`")]
    MissingVerdict,

    #[error("risk score {0} is outside 0..=100")]
    ScoreOutOfRange(f64),
}

fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A JSON scalar that may arrive as either a number or a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(f64),
    Text(String),
}

impl Scalar {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(*n),
            Scalar::Text(_) => None,
        }
    }

    /// Empty strings and zero count as "unset", mirroring how the backend
    /// uses them as placeholders.
    pub fn is_blank(&self) -> bool {
        match self {
            Scalar::Number(n) => *n == 0.0,
            Scalar::Text(s) => s.trim().is_empty(),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Number(n) => f.write_str(&format_number(*n)),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

/// Integral values print without a fractional part (`87`, not `87.0`).
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
    Unknown,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
            RiskLevel::Unknown => "unknown",
        }
    }
}

impl From<&str> for RiskLevel {
    fn from(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "low" => RiskLevel::Low,
            "medium" => RiskLevel::Medium,
            "high" => RiskLevel::High,
            "critical" => RiskLevel::Critical,
            _ => RiskLevel::Unknown,
        }
    }
}

impl From<String> for RiskLevel {
    fn from(value: String) -> Self {
        RiskLevel::from(value.as_str())
    }
}

impl From<RiskLevel> for String {
    fn from(value: RiskLevel) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskAnalysis {
    #[serde(default, deserialize_with = "null_default")]
    pub overall_score: f64,
    #[serde(default)]
    pub risk_level: Option<RiskLevel>,
    #[serde(default, deserialize_with = "null_default")]
    pub trusted: bool,
    #[serde(default, deserialize_with = "null_default")]
    pub is_blacklisted: bool,
    #[serde(default, deserialize_with = "null_default")]
    pub flags: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainInfo {
    #[serde(default, deserialize_with = "null_default")]
    pub domain: String,
    #[serde(default)]
    pub age_days: Option<f64>,
    #[serde(default)]
    pub age_years: Option<f64>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub found: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyVerification {
    #[serde(default)]
    pub domain_info: Option<DomainInfo>,
}

/// Model explanation: either a structured block or a bare sentence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Explanation {
    Text(String),
    Details {
        #[serde(default, deserialize_with = "null_default", skip_serializing_if = "Vec::is_empty")]
        top_words: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ai_summary: Option<String>,
    },
}

impl Explanation {
    pub fn empty() -> Self {
        Explanation::Details {
            top_words: Vec::new(),
            ai_summary: None,
        }
    }

    pub fn top_words(&self) -> &[String] {
        match self {
            Explanation::Details { top_words, .. } => top_words,
            Explanation::Text(_) => &[],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrapedData {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    #[serde(default)]
    pub result: Option<Scalar>,
    #[serde(default)]
    pub prediction: Option<Scalar>,
    #[serde(default)]
    pub confidence: Option<Scalar>,
    #[serde(default, deserialize_with = "null_default")]
    pub is_blacklisted: bool,
    #[serde(default)]
    pub risk_analysis: Option<RiskAnalysis>,
    #[serde(default)]
    pub company_verification: Option<CompanyVerification>,
    #[serde(default)]
    pub explanation: Option<Explanation>,
    #[serde(default)]
    pub scraped_data: Option<ScrapedData>,
}

impl AnalysisResponse {
    /// The label-ish verdict: `result` when present, else `prediction`.
    pub fn verdict_value(&self) -> Option<&Scalar> {
        self.result.as_ref().or(self.prediction.as_ref())
    }

    pub fn risk_score(&self) -> f64 {
        self.risk_analysis
            .as_ref()
            .map(|r| r.overall_score)
            .unwrap_or(0.0)
    }

    pub fn risk_level(&self) -> Option<RiskLevel> {
        self.risk_analysis.as_ref().and_then(|r| r.risk_level)
    }

    pub fn trusted(&self) -> bool {
        self.risk_analysis.as_ref().is_some_and(|r| r.trusted)
    }

    pub fn blacklisted(&self) -> bool {
        self.is_blacklisted || self.risk_analysis.as_ref().is_some_and(|r| r.is_blacklisted)
    }

    pub fn flags(&self) -> &[String] {
        self.risk_analysis
            .as_ref()
            .map(|r| r.flags.as_slice())
            .unwrap_or(&[])
    }

    pub fn recommendations(&self) -> &[String] {
        self.risk_analysis
            .as_ref()
            .map(|r| r.recommendations.as_slice())
            .unwrap_or(&[])
    }

    /// Domain intel, only when the backend actually resolved the domain.
    pub fn domain_info(&self) -> Option<&DomainInfo> {
        self.company_verification
            .as_ref()
            .and_then(|c| c.domain_info.as_ref())
            .filter(|d| d.found)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainAge {
    #[serde(default)]
    pub details: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainReport {
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub risk_level: Option<RiskLevel>,
    #[serde(default, deserialize_with = "null_default")]
    pub risk_score: f64,
    #[serde(default, deserialize_with = "null_default")]
    pub flags: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub trusted: bool,
    #[serde(default)]
    pub domain_age: Option<DomainAge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialProfile {
    pub platform: String,
    #[serde(default, deserialize_with = "null_default")]
    pub status: String,
    #[serde(default)]
    pub followers: Option<Scalar>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeepScanResult {
    #[serde(default, deserialize_with = "null_default")]
    pub social_risk_score: f64,
    #[serde(default, deserialize_with = "null_default")]
    pub verdict: String,
    #[serde(default)]
    pub profiles: Option<Vec<SocialProfile>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CsvRow {
    #[serde(rename = "Title", default)]
    pub title: Option<Scalar>,
    #[serde(rename = "Company", default)]
    pub company: Option<Scalar>,
    #[serde(rename = "Prediction", default)]
    pub prediction: Option<Scalar>,
    #[serde(default)]
    pub result: Option<Scalar>,
    #[serde(rename = "Confidence (%)", default)]
    pub confidence: Option<Scalar>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CsvResults {
    #[serde(default, deserialize_with = "null_default")]
    pub results: Vec<CsvRow>,
}

/// One row of the server-side analysis log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    #[serde(default, deserialize_with = "null_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_default")]
    pub company: String,
    #[serde(default)]
    pub result: Option<Scalar>,
    #[serde(default)]
    pub confidence: Option<Scalar>,
    #[serde(default, deserialize_with = "null_default")]
    pub risk_level: String,
    #[serde(default, deserialize_with = "null_default")]
    pub risk_score: f64,
    #[serde(default, deserialize_with = "null_default")]
    pub timestamp: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistorySummary {
    #[serde(default)]
    pub history: Option<Vec<HistoryRecord>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionCounts {
    #[serde(default, deserialize_with = "null_default")]
    pub total: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Analytics {
    #[serde(default)]
    pub predictions: Option<PredictionCounts>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    #[serde(default)]
    pub reply: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuccessFlag {
    #[serde(default, deserialize_with = "null_default")]
    pub success: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Parse any of the auxiliary payloads (domain check, deep scan, ...).
pub fn parse_json<T: DeserializeOwned>(raw: &str) -> Result<T, ParseError> {
    Ok(serde_json::from_str(raw)?)
}

/// Parse and validate a `/predict-text` or `/predict-url` response.
pub fn parse_analysis(raw: &str) -> Result<AnalysisResponse, ParseError> {
    let parsed: AnalysisResponse = serde_json::from_str(raw)?;

    if parsed.verdict_value().is_none() {
        return Err(ParseError::MissingVerdict);
    }

    if let Some(risk) = &parsed.risk_analysis {
        let score = risk.overall_score;
        if !(0.0..=100.0).contains(&score) {
            return Err(ParseError::ScoreOutOfRange(score));
        }
    }

    Ok(parsed)
}

/// Extract a human-readable message from an error response body.
pub fn error_message(raw: &str) -> Option<String> {
    let body: ErrorBody = serde_json::from_str(raw).ok()?;
    body.error
        .or(body.message)
        .filter(|m| !m.trim().is_empty())
}
