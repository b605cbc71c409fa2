use anyhow::{anyhow, Context, Result};
use reqwest::blocking::multipart::Form;
use reqwest::blocking::{Client, Response};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::models::{HistoryEntry, ScamReport, TextAnalysisRequest, VisitorRecord, WelcomeEmailRequest};
use crate::response::{
    error_message, parse_analysis, parse_json, AnalysisResponse, Analytics, ChatReply, CsvResults,
    DeepScanResult, DomainReport, HistorySummary, SuccessFlag,
};

/// Generic message when the backend gives no usable error text.
pub const GENERIC_FAILURE: &str = "Analysis failed";

// --- Backend trait ---

/// Everything the client asks of the analysis service.
pub trait AnalysisBackend {
    fn predict_text(&self, request: &TextAnalysisRequest) -> Result<AnalysisResponse>;
    fn predict_url(&self, url: &str) -> Result<AnalysisResponse>;
    fn predict_csv(&self, path: &Path) -> Result<CsvResults>;
    fn check_domain(&self, url: &str) -> Result<DomainReport>;
    fn deep_scan(&self, company: &str) -> Result<DeepScanResult>;
    fn feedback(&self, title: &str, correct: bool) -> Result<()>;
    fn report_scam(&self, report: &ScamReport) -> Result<()>;
    fn history(&self) -> Result<HistorySummary>;
    fn analytics(&self) -> Result<Analytics>;
    fn clear_history(&self) -> Result<()>;
    fn generate_report(&self, entry: &HistoryEntry) -> Result<Vec<u8>>;
    fn chat(&self, message: &str) -> Result<ChatReply>;
    fn register_visitor(&self, visitor: &VisitorRecord) -> Result<bool>;
    fn send_welcome_email(&self, request: &WelcomeEmailRequest) -> Result<bool>;
}

// --- HTTP implementation ---

pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            base_url: config.api_base.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    fn post_form(&self, endpoint: &str, form: Form) -> Result<Response> {
        let url = self.url(endpoint);
        debug!("POST {}", url);
        self.client
            .post(&url)
            .multipart(form)
            .send()
            .with_context(|| format!("Failed to reach backend at {}", url))
    }

    /// Read the body of a successful response, or turn a failed one into the
    /// backend's own error message.
    fn success_body(response: Response) -> Result<String> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let message = error_message(&body).unwrap_or_else(|| GENERIC_FAILURE.to_string());
            warn!("Backend returned {}: {}", status, message);
            return Err(anyhow!(message));
        }
        response.text().context("Failed to read backend response")
    }

    /// Fire-and-record calls whose outcome the UI never inspects.
    fn ignore_status(endpoint: &str, response: Response) {
        if !response.status().is_success() {
            warn!("{} returned {}", endpoint, response.status());
        }
    }
}

impl AnalysisBackend for ApiClient {
    fn predict_text(&self, request: &TextAnalysisRequest) -> Result<AnalysisResponse> {
        let mut form = Form::new()
            .text("title", request.title.clone())
            .text("company_profile", request.company_profile.clone())
            .text("description", request.description.clone());
        if let Some(url) = &request.url {
            form = form.text("url", url.clone());
        }

        info!("Analyzing text for '{}'", request.title);
        let body = Self::success_body(self.post_form("/predict-text", form)?)?;
        Ok(parse_analysis(&body)?)
    }

    fn predict_url(&self, url: &str) -> Result<AnalysisResponse> {
        let form = Form::new().text("url", url.to_string());

        info!("Analyzing URL {}", url);
        let body = Self::success_body(self.post_form("/predict-url", form)?)?;
        Ok(parse_analysis(&body)?)
    }

    fn predict_csv(&self, path: &Path) -> Result<CsvResults> {
        let form = Form::new()
            .file("file", path)
            .with_context(|| format!("Failed to read CSV file: {}", path.display()))?;

        info!("Uploading {} for bulk analysis", path.display());
        let body = Self::success_body(self.post_form("/predict-csv", form)?)?;
        Ok(parse_json(&body)?)
    }

    fn check_domain(&self, url: &str) -> Result<DomainReport> {
        let form = Form::new().text("url", url.to_string());
        let body = Self::success_body(self.post_form("/check-domain", form)?)?;
        Ok(parse_json(&body)?)
    }

    fn deep_scan(&self, company: &str) -> Result<DeepScanResult> {
        let form = Form::new().text("company", company.to_string());
        let body = Self::success_body(self.post_form("/deep-scan", form)?)?;
        Ok(parse_json(&body)?)
    }

    fn feedback(&self, title: &str, correct: bool) -> Result<()> {
        let form = Form::new()
            .text("title", title.to_string())
            .text("correct", correct.to_string());
        let response = self.post_form("/feedback", form)?;
        Self::ignore_status("/feedback", response);
        Ok(())
    }

    fn report_scam(&self, report: &ScamReport) -> Result<()> {
        let form = Form::new()
            .text("url", report.url.clone())
            .text("company", report.company.clone())
            .text("details", report.details.clone())
            .text("reporter", report.reporter.clone());
        let response = self.post_form("/report-scam", form)?;
        Self::ignore_status("/report-scam", response);
        Ok(())
    }

    fn history(&self) -> Result<HistorySummary> {
        let url = self.url("/history");
        let response = self
            .client
            .get(&url)
            .send()
            .with_context(|| format!("Failed to reach backend at {}", url))?;
        let body = Self::success_body(response)?;
        Ok(parse_json(&body)?)
    }

    fn analytics(&self) -> Result<Analytics> {
        let url = self.url("/analytics");
        let response = self
            .client
            .get(&url)
            .send()
            .with_context(|| format!("Failed to reach backend at {}", url))?;
        let body = Self::success_body(response)?;
        Ok(parse_json(&body)?)
    }

    fn clear_history(&self) -> Result<()> {
        let url = self.url("/clear-history");
        let response = self
            .client
            .delete(&url)
            .send()
            .context("Failed to clear backend history")?;
        Self::ignore_status("/clear-history", response);
        Ok(())
    }

    fn generate_report(&self, entry: &HistoryEntry) -> Result<Vec<u8>> {
        let url = self.url("/generate-report");
        let response = self
            .client
            .post(&url)
            .json(entry)
            .send()
            .with_context(|| format!("Failed to reach backend at {}", url))?;

        if !response.status().is_success() {
            return Err(anyhow!("Failed to generate report ({})", response.status()));
        }
        let bytes = response.bytes().context("Failed to download report")?;
        Ok(bytes.to_vec())
    }

    fn chat(&self, message: &str) -> Result<ChatReply> {
        let url = self.url("/chat");
        let response = self
            .client
            .post(&url)
            .form(&[("message", message)])
            .send()
            .with_context(|| format!("Failed to reach backend at {}", url))?;
        let body = response.text().context("Failed to read chat reply")?;
        // Error bodies simply carry no reply
        Ok(parse_json(&body).unwrap_or_default())
    }

    fn register_visitor(&self, visitor: &VisitorRecord) -> Result<bool> {
        let url = self.url("/register-visitor");
        let response = self.client.post(&url).json(visitor).send()?;
        let body = response.text().unwrap_or_default();
        let flag: SuccessFlag = parse_json(&body).unwrap_or_default();
        Ok(flag.success)
    }

    fn send_welcome_email(&self, request: &WelcomeEmailRequest) -> Result<bool> {
        let url = self.url("/send-welcome-email");
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .context("Connectivity issue. Is the server running?")?;
        let body = response.text().unwrap_or_default();
        let flag: SuccessFlag = parse_json(&body).unwrap_or_default();
        Ok(flag.success)
    }
}

/// Scriptable in-process backend for tests.
#[cfg(test)]
pub mod fake {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    pub struct FakeBackend {
        pub analysis: Option<AnalysisResponse>,
        pub csv: Option<CsvResults>,
        pub domain: Option<DomainReport>,
        pub deep_scan: Option<DeepScanResult>,
        pub history: Option<HistorySummary>,
        pub analytics: Option<Analytics>,
        pub chat_reply: Option<String>,
        pub fail_with: Option<String>,
        pub calls: RefCell<Vec<String>>,
        pub text_requests: RefCell<Vec<TextAnalysisRequest>>,
    }

    impl FakeBackend {
        pub fn with_analysis(analysis: AnalysisResponse) -> Self {
            Self {
                analysis: Some(analysis),
                ..Default::default()
            }
        }

        pub fn failing(message: &str) -> Self {
            Self {
                fail_with: Some(message.to_string()),
                ..Default::default()
            }
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }

        fn record(&self, call: &str) -> Result<()> {
            self.calls.borrow_mut().push(call.to_string());
            match &self.fail_with {
                Some(message) => Err(anyhow!(message.clone())),
                None => Ok(()),
            }
        }

        fn canned<T: Clone>(value: &Option<T>, what: &str) -> Result<T> {
            value.clone().ok_or_else(|| anyhow!("no canned {}", what))
        }
    }

    impl AnalysisBackend for FakeBackend {
        fn predict_text(&self, request: &TextAnalysisRequest) -> Result<AnalysisResponse> {
            self.record("predict-text")?;
            self.text_requests.borrow_mut().push(request.clone());
            Self::canned(&self.analysis, "analysis")
        }

        fn predict_url(&self, _url: &str) -> Result<AnalysisResponse> {
            self.record("predict-url")?;
            Self::canned(&self.analysis, "analysis")
        }

        fn predict_csv(&self, _path: &Path) -> Result<CsvResults> {
            self.record("predict-csv")?;
            Self::canned(&self.csv, "csv results")
        }

        fn check_domain(&self, _url: &str) -> Result<DomainReport> {
            self.record("check-domain")?;
            Self::canned(&self.domain, "domain report")
        }

        fn deep_scan(&self, _company: &str) -> Result<DeepScanResult> {
            self.record("deep-scan")?;
            Self::canned(&self.deep_scan, "deep scan")
        }

        fn feedback(&self, title: &str, correct: bool) -> Result<()> {
            self.record(&format!("feedback:{}:{}", title, correct))
        }

        fn report_scam(&self, report: &ScamReport) -> Result<()> {
            self.record(&format!("report-scam:{}", report.url))
        }

        fn history(&self) -> Result<HistorySummary> {
            self.record("history")?;
            Self::canned(&self.history, "history")
        }

        fn analytics(&self) -> Result<Analytics> {
            self.record("analytics")?;
            Self::canned(&self.analytics, "analytics")
        }

        fn clear_history(&self) -> Result<()> {
            self.record("clear-history")
        }

        fn generate_report(&self, _entry: &HistoryEntry) -> Result<Vec<u8>> {
            self.record("generate-report")?;
            Ok(b"%PDF-1.4".to_vec())
        }

        fn chat(&self, _message: &str) -> Result<ChatReply> {
            self.record("chat")?;
            Ok(ChatReply {
                reply: self.chat_reply.clone(),
            })
        }

        fn register_visitor(&self, visitor: &VisitorRecord) -> Result<bool> {
            self.record(&format!("register-visitor:{}", visitor.email))?;
            Ok(true)
        }

        fn send_welcome_email(&self, request: &WelcomeEmailRequest) -> Result<bool> {
            self.record(&format!("send-welcome-email:{}:{}", request.email, request.name))?;
            Ok(true)
        }
    }
}
