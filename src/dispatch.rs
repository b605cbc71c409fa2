use anyhow::Result;
use chrono::Local;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use crate::api::AnalysisBackend;
use crate::extract::MIN_DESCRIPTION_CHARS;
use crate::models::{HistoryEntry, ScrapedJobPosting, TextAnalysisRequest};
use crate::normalize::{normalize, normalize_response, NormalizedResult};
use crate::response::{AnalysisResponse, CsvRow, DeepScanResult, Explanation, RiskLevel, Scalar};
use crate::verdict::{decide, Verdict};

pub const DEEP_SCAN_FLAG: &str = "Deep Scan: High Social Risk";
const DEEP_SCAN_PENALTY: f64 = 20.0;
const DATE_FORMAT: &str = "%Y-%m-%d, %H:%M:%S";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("No content found on page.")]
    NoContent,

    #[error("Title and Description are required")]
    MissingFields,
}

/// Which endpoint a scraped page goes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisRequest {
    Text(TextAnalysisRequest),
    Url(String),
}

pub fn choose_request(posting: &ScrapedJobPosting) -> Result<AnalysisRequest, DispatchError> {
    if posting.description.chars().count() > MIN_DESCRIPTION_CHARS {
        let title = if posting.title.is_empty() { "Job Posting" } else { posting.title.as_str() };
        let company = if posting.company.is_empty() { "Unknown Company" } else { posting.company.as_str() };
        return Ok(AnalysisRequest::Text(TextAnalysisRequest {
            title: title.to_string(),
            company_profile: company.to_string(),
            description: posting.description.clone(),
            url: Some(posting.url.clone()).filter(|u| !u.is_empty()),
        }));
    }
    if !posting.url.is_empty() {
        return Ok(AnalysisRequest::Url(posting.url.clone()));
    }
    Err(DispatchError::NoContent)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManualInput {
    pub title: String,
    pub company: String,
    pub location: String,
    pub description: String,
    pub deep_scan: bool,
}

/// Outcome of one successful analysis.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub entry: HistoryEntry,
    pub response: AnalysisResponse,
    pub verdict: Verdict,
}

impl Analysis {
    fn new(entry: HistoryEntry, response: AnalysisResponse) -> Self {
        let verdict = decide(&response);
        Self {
            entry,
            response,
            verdict,
        }
    }
}

pub struct Dispatcher<'a> {
    backend: &'a dyn AnalysisBackend,
}

impl<'a> Dispatcher<'a> {
    pub fn new(backend: &'a dyn AnalysisBackend) -> Self {
        Self { backend }
    }

    pub fn analyze_scraped(&self, posting: &ScrapedJobPosting) -> Result<Analysis> {
        match choose_request(posting)? {
            AnalysisRequest::Text(request) => {
                let response = self.backend.predict_text(&request)?;
                let norm = normalize_response(&response);
                let mut entry = create_entry(&request.title, &request.company_profile, &norm, &response);
                entry.source_url = request.url.clone();
                Ok(Analysis::new(entry, response))
            }
            AnalysisRequest::Url(url) => self.analyze_url(&url),
        }
    }

    pub fn analyze_url(&self, url: &str) -> Result<Analysis> {
        let response = self.backend.predict_url(url)?;
        let norm = normalize_response(&response);
        let scraped = response.scraped_data.clone().unwrap_or_default();

        let title = scraped.title.filter(|t| !t.is_empty());
        let company = scraped.company.filter(|c| !c.is_empty());
        let mut entry = create_entry(
            title.as_deref().unwrap_or("External Job"),
            company.as_deref().unwrap_or("Unknown"),
            &norm,
            &response,
        );
        entry.location = Some(
            scraped
                .location
                .filter(|l| !l.is_empty())
                .unwrap_or_else(|| "Unknown Location".to_string()),
        );
        entry.source_url = Some(url.to_string());
        Ok(Analysis::new(entry, response))
    }

    pub fn analyze_manual(&self, input: &ManualInput) -> Result<Analysis> {
        let title = input.title.trim();
        let company = input.company.trim();
        let description = input.description.trim();
        if title.is_empty() || description.is_empty() {
            return Err(DispatchError::MissingFields.into());
        }

        let request = TextAnalysisRequest {
            title: title.to_string(),
            company_profile: company.to_string(),
            description: description.to_string(),
            url: None,
        };
        let mut response = self.backend.predict_text(&request)?;

        if input.deep_scan && !company.is_empty() {
            match self.backend.deep_scan(company) {
                Ok(scan) => merge_deep_scan(&mut response, &scan),
                Err(e) => warn!("Deep scan failed: {}", e),
            }
        }

        let norm = normalize_response(&response);
        let mut entry = create_entry(title, company, &norm, &response);
        entry.description = Some(description.to_string());
        entry.location = Some(input.location.trim().to_string()).filter(|l| !l.is_empty());
        Ok(Analysis::new(entry, response))
    }

    /// Bulk-analyze a CSV file. Entries come back in row order.
    pub fn analyze_csv(&self, path: &Path) -> Result<Vec<HistoryEntry>> {
        let results = self.backend.predict_csv(path)?;
        info!("Backend analyzed {} CSV rows", results.results.len());
        Ok(results.results.iter().map(csv_row_entry).collect())
    }
}

pub fn now_label() -> String {
    Local::now().format(DATE_FORMAT).to_string()
}

pub fn create_entry(
    title: &str,
    company: &str,
    norm: &NormalizedResult,
    response: &AnalysisResponse,
) -> HistoryEntry {
    let risk_level = response
        .risk_level()
        .map(|level| level.as_str().to_string())
        .unwrap_or_else(|| fallback_risk_level(norm).to_string());

    HistoryEntry {
        title: title.to_string(),
        company: if company.is_empty() { "N/A".to_string() } else { company.to_string() },
        prediction: norm.result.clone(),
        confidence: norm.confidence.clone(),
        risk_level,
        risk_score: response.risk_score(),
        date: now_label(),
        location: None,
        source_url: None,
        source: None,
        description: None,
        explanation: response.explanation.clone(),
    }
}

fn fallback_risk_level(norm: &NormalizedResult) -> &'static str {
    if norm.is_fake() { "high" } else { "low" }
}

/// Fold a social-media scan into the analysis. Nothing changes when the scan
/// found no profiles.
pub fn merge_deep_scan(response: &mut AnalysisResponse, scan: &DeepScanResult) {
    let Some(profiles) = &scan.profiles else {
        return;
    };

    let mut summary = format!(
        "\n\nDeep Social Scan Results:\nSocial Risk Score: {}/100",
        crate::response::format_number(scan.social_risk_score)
    );
    for profile in profiles {
        let followers = profile
            .followers
            .as_ref()
            .map(Scalar::to_string)
            .unwrap_or_else(|| "unknown".to_string());
        summary.push_str(&format!(
            "\n- {}: {} ({} followers)",
            profile.platform, profile.status, followers
        ));
    }

    let explanation = response.explanation.take().unwrap_or_else(Explanation::empty);
    response.explanation = Some(match explanation {
        Explanation::Text(text) => Explanation::Details {
            top_words: Vec::new(),
            ai_summary: Some(format!("{}{}", text, summary)),
        },
        Explanation::Details {
            top_words,
            ai_summary,
        } => Explanation::Details {
            top_words,
            ai_summary: Some(format!("{}{}", ai_summary.unwrap_or_default(), summary)),
        },
    });

    if scan.verdict == "High Risk" {
        if let Some(risk) = response.risk_analysis.as_mut() {
            risk.overall_score = (risk.overall_score + DEEP_SCAN_PENALTY).min(100.0);
            risk.risk_level = Some(RiskLevel::High);
            risk.flags.push(DEEP_SCAN_FLAG.to_string());
        }
    }
}

/// A numeric 0 is a verdict, so only empty text counts as missing.
fn has_label(value: &&Scalar) -> bool {
    !matches!(value, Scalar::Text(text) if text.trim().is_empty())
}

pub fn csv_row_entry(row: &CsvRow) -> HistoryEntry {
    let raw = row
        .prediction
        .as_ref()
        .filter(has_label)
        .or(row.result.as_ref().filter(has_label))
        .cloned()
        .unwrap_or_else(|| Scalar::Text("Unknown".to_string()));
    let norm = normalize(Some(&raw), row.confidence.as_ref());
    let fake = norm.is_fake();

    let text_or = |value: &Option<Scalar>, default: &str| {
        value
            .as_ref()
            .filter(|v| !v.is_blank())
            .map(Scalar::to_string)
            .unwrap_or_else(|| default.to_string())
    };

    HistoryEntry {
        title: text_or(&row.title, "CSV Job"),
        company: text_or(&row.company, "Unknown"),
        prediction: norm.result,
        confidence: norm.confidence,
        risk_level: if fake { "high" } else { "low" }.to_string(),
        risk_score: if fake { 85.0 } else { 10.0 },
        date: now_label(),
        location: None,
        source_url: None,
        source: Some("CSV".to_string()),
        description: None,
        explanation: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::FakeBackend;
    use crate::response::{CsvResults, RiskAnalysis, ScrapedData, SocialProfile};
    use crate::verdict::Severity;

    fn fake_response(score: f64) -> AnalysisResponse {
        AnalysisResponse {
            result: Some(Scalar::Text("Fake Job".to_string())),
            prediction: Some(Scalar::Number(0.0)),
            confidence: Some(Scalar::Number(77.0)),
            risk_analysis: Some(RiskAnalysis {
                overall_score: score,
                risk_level: Some(RiskLevel::Medium),
                flags: vec!["⚠️ Vague job description".to_string()],
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn posting(description: &str, url: &str) -> ScrapedJobPosting {
        ScrapedJobPosting {
            title: String::new(),
            company: String::new(),
            description: description.to_string(),
            url: url.to_string(),
        }
    }

    #[test]
    fn test_long_description_goes_to_text_endpoint() {
        let request = choose_request(&posting(&"x".repeat(51), "https://jobs.example.com/1")).unwrap();
        match request {
            AnalysisRequest::Text(req) => {
                assert_eq!(req.title, "Job Posting");
                assert_eq!(req.company_profile, "Unknown Company");
                assert_eq!(req.url.as_deref(), Some("https://jobs.example.com/1"));
            }
            other => panic!("expected text request, got {:?}", other),
        }
    }

    #[test]
    fn test_short_description_falls_back_to_url() {
        let request = choose_request(&posting(&"x".repeat(50), "https://jobs.example.com/1")).unwrap();
        assert_eq!(request, AnalysisRequest::Url("https://jobs.example.com/1".to_string()));
    }

    #[test]
    fn test_nothing_to_analyze() {
        assert_eq!(choose_request(&posting("short", "")), Err(DispatchError::NoContent));
    }

    #[test]
    fn test_no_content_skips_backend() {
        let backend = FakeBackend::with_analysis(fake_response(40.0));
        let err = Dispatcher::new(&backend)
            .analyze_scraped(&posting("", ""))
            .unwrap_err();
        assert_eq!(err.to_string(), "No content found on page.");
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_url_analysis_uses_scraped_data() {
        let mut response = fake_response(40.0);
        response.scraped_data = Some(ScrapedData {
            title: Some("Data Entry Clerk".to_string()),
            company: None,
            location: None,
        });
        let backend = FakeBackend::with_analysis(response);
        let analysis = Dispatcher::new(&backend)
            .analyze_url("https://jobs.example.com/2")
            .unwrap();

        assert_eq!(analysis.entry.title, "Data Entry Clerk");
        assert_eq!(analysis.entry.company, "Unknown");
        assert_eq!(analysis.entry.location.as_deref(), Some("Unknown Location"));
        assert_eq!(analysis.entry.source_url.as_deref(), Some("https://jobs.example.com/2"));
        assert_eq!(analysis.entry.prediction, "Fake Job");
        assert_eq!(analysis.entry.risk_level, "medium");
        assert_eq!(analysis.verdict.severity, Severity::PotentialScam);
    }

    #[test]
    fn test_manual_requires_title_and_description() {
        let backend = FakeBackend::with_analysis(fake_response(40.0));
        let input = ManualInput {
            title: "Clerk".to_string(),
            ..Default::default()
        };
        let err = Dispatcher::new(&backend).analyze_manual(&input).unwrap_err();
        assert_eq!(err.to_string(), "Title and Description are required");
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_manual_entry_defaults_company() {
        let backend = FakeBackend::with_analysis(fake_response(40.0));
        let input = ManualInput {
            title: " Clerk ".to_string(),
            description: "Pay a starter fee to begin".to_string(),
            deep_scan: true,
            ..Default::default()
        };
        let analysis = Dispatcher::new(&backend).analyze_manual(&input).unwrap();
        assert_eq!(analysis.entry.title, "Clerk");
        assert_eq!(analysis.entry.company, "N/A");
        assert_eq!(analysis.entry.description.as_deref(), Some("Pay a starter fee to begin"));
        assert_eq!(analysis.entry.location, None);
        // No company, so no deep scan
        assert_eq!(backend.calls(), vec!["predict-text"]);
    }

    #[test]
    fn test_deep_scan_high_risk_raises_score() {
        let mut backend = FakeBackend::with_analysis(fake_response(90.0));
        backend.deep_scan = Some(DeepScanResult {
            social_risk_score: 80.0,
            verdict: "High Risk".to_string(),
            profiles: Some(vec![SocialProfile {
                platform: "LinkedIn".to_string(),
                status: "Not Found".to_string(),
                followers: Some(Scalar::Number(0.0)),
            }]),
        });
        let input = ManualInput {
            title: "Clerk".to_string(),
            company: "Acme".to_string(),
            description: "Pay a starter fee to begin".to_string(),
            deep_scan: true,
            ..Default::default()
        };
        let analysis = Dispatcher::new(&backend).analyze_manual(&input).unwrap();

        assert_eq!(analysis.entry.risk_score, 100.0);
        assert_eq!(analysis.entry.risk_level, "high");
        assert!(analysis.response.flags().contains(&DEEP_SCAN_FLAG.to_string()));
        match analysis.entry.explanation {
            Some(Explanation::Details { ai_summary: Some(summary), .. }) => {
                assert!(summary.contains("Social Risk Score: 80/100"));
                assert!(summary.contains("- LinkedIn: Not Found (0 followers)"));
            }
            other => panic!("unexpected explanation {:?}", other),
        }
    }

    #[test]
    fn test_deep_scan_without_profiles_changes_nothing() {
        let mut response = fake_response(40.0);
        let before = response.clone();
        merge_deep_scan(
            &mut response,
            &DeepScanResult {
                verdict: "High Risk".to_string(),
                ..Default::default()
            },
        );
        assert_eq!(response, before);
    }

    #[test]
    fn test_deep_scan_failure_is_ignored() {
        let backend = FakeBackend::with_analysis(fake_response(40.0));
        let input = ManualInput {
            title: "Clerk".to_string(),
            company: "Acme".to_string(),
            description: "Pay a starter fee to begin".to_string(),
            deep_scan: true,
            ..Default::default()
        };
        let analysis = Dispatcher::new(&backend).analyze_manual(&input).unwrap();
        assert_eq!(analysis.entry.risk_score, 40.0);
        assert_eq!(backend.calls(), vec!["predict-text", "deep-scan"]);
    }

    #[test]
    fn test_backend_error_propagates() {
        let backend = FakeBackend::failing("URL unreachable");
        let err = Dispatcher::new(&backend)
            .analyze_url("https://jobs.example.com/3")
            .unwrap_err();
        assert_eq!(err.to_string(), "URL unreachable");
    }

    #[test]
    fn test_csv_rows_map_to_entries() {
        let backend = FakeBackend {
            csv: Some(CsvResults {
                results: vec![
                    CsvRow {
                        title: Some(Scalar::Text("Clerk".to_string())),
                        prediction: Some(Scalar::Text("fake".to_string())),
                        confidence: Some(Scalar::Number(91.0)),
                        ..Default::default()
                    },
                    CsvRow {
                        result: Some(Scalar::Number(1.0)),
                        ..Default::default()
                    },
                ],
            }),
            ..Default::default()
        };
        let entries = Dispatcher::new(&backend)
            .analyze_csv(Path::new("jobs.csv"))
            .unwrap();

        assert_eq!(entries[0].title, "Clerk");
        assert_eq!(entries[0].company, "Unknown");
        assert_eq!(entries[0].prediction, "Fake Job");
        assert_eq!(entries[0].confidence, "91%");
        assert_eq!(entries[0].risk_score, 85.0);
        assert_eq!(entries[1].title, "CSV Job");
        assert_eq!(entries[1].prediction, "Real Job");
        assert_eq!(entries[1].confidence, "0%");
        assert_eq!(entries[1].risk_level, "low");
        assert_eq!(entries[1].source.as_deref(), Some("CSV"));
    }

    #[test]
    fn test_csv_numeric_zero_prediction_is_fake() {
        let row = CsvRow {
            title: Some(Scalar::Text("Courier".to_string())),
            prediction: Some(Scalar::Number(0.0)),
            result: Some(Scalar::Text("Real Job".to_string())),
            ..Default::default()
        };
        let entry = csv_row_entry(&row);
        assert_eq!(entry.prediction, "Fake Job");
        assert_eq!(entry.risk_level, "high");
        assert_eq!(entry.risk_score, 85.0);
    }

    #[test]
    fn test_csv_empty_prediction_falls_back_to_result() {
        let row = CsvRow {
            prediction: Some(Scalar::Text("  ".to_string())),
            result: Some(Scalar::Text("real".to_string())),
            ..Default::default()
        };
        let entry = csv_row_entry(&row);
        assert_eq!(entry.prediction, "Real Job");
        assert_eq!(entry.risk_score, 10.0);
    }
}
