use serde::{Deserialize, Serialize};

use crate::response::Explanation;

/// Best-effort job posting pulled out of a third-party page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedJobPosting {
    pub title: String,
    pub company: String,
    pub description: String,
    pub url: String,
}

/// Locally cached, normalized view of one past analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub title: String,
    pub company: String,
    pub prediction: String, // "Real Job", "Fake Job", or a pass-through label
    pub confidence: String, // always carries a "%" suffix
    #[serde(default)]
    pub risk_level: String, // "low", "medium", "high", "critical"
    #[serde(default)]
    pub risk_score: f64,
    #[serde(default)]
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>, // "CSV" for bulk imports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<Explanation>,
}

impl HistoryEntry {
    pub fn is_real(&self) -> bool {
        self.prediction.contains("Real")
    }

    pub fn is_fake(&self) -> bool {
        self.prediction.contains("Fake")
    }

    /// Calendar part of the display date ("2026-10-19, 14:02:11" -> "2026-10-19").
    pub fn day(&self) -> &str {
        self.date.split(',').next().unwrap_or("")
    }
}

/// Request body for `/predict-text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextAnalysisRequest {
    pub title: String,
    pub company_profile: String,
    pub description: String,
    pub url: Option<String>,
}

/// Request body for `/report-scam`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScamReport {
    pub url: String,
    pub company: String,
    pub details: String,
    pub reporter: String,
}

/// Visitor captured by the welcome prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitorRecord {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub registered_at: String,
    pub source: String,
}

/// Request body for `/send-welcome-email`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WelcomeEmailRequest {
    pub email: String,
    pub name: String,
    pub source: String,
}
