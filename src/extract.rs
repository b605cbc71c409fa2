//! Job-posting extraction from job-board markup.

use anyhow::{anyhow, Context, Result};
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use crate::models::ScrapedJobPosting;

pub const MAX_TITLE_CHARS: usize = 100;
pub const MAX_COMPANY_CHARS: usize = 100;
pub const MAX_DESCRIPTION_CHARS: usize = 10_000;

/// Below this length a description is treated as noise; only longer ones are
/// worth a text analysis.
pub const MIN_DESCRIPTION_CHARS: usize = 50;

const JSON_LD_SELECTOR: &str = r#"script[type="application/ld+json"]"#;

const LINKEDIN_COMPANY_SELECTOR: &str = ".job-details-jobs-unified-top-card__company-name, .jobs-unified-top-card__company-name, .job-card-container__company-name";
const INDEED_COMPANY_SELECTOR: &str = r#"[data-testid="inlineHeader-companyName"], .jobsearch-CompanyInfoContainer a"#;
const LINKEDIN_TITLE_SELECTOR: &str = ".job-details-jobs-unified-top-card__job-title, .jobs-unified-top-card__job-title";
const INDEED_TITLE_SELECTOR: &str = r#"[data-testid="jobsearch-JobInfoHeader-title"]"#;
const LINKEDIN_DESCRIPTION_SELECTOR: &str = "#job-details, .jobs-description__content";
const INDEED_DESCRIPTION_SELECTOR: &str = "#jobDescriptionText";

const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template", "head"];
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hr", "li", "main", "nav", "ol", "p", "pre", "section", "table", "tr", "td", "th", "ul",
];

/// Run the full fallback chain over a page's HTML.
pub fn extract_posting(html: &str, url: &str) -> ScrapedJobPosting {
    let document = Html::parse_document(html);

    let mut title = String::new();
    let mut company = String::new();
    let mut description = String::new();

    // 1. Structured data
    for posting in json_ld_postings(&document) {
        title = posting.title;
        if let Some(name) = posting.company {
            company = name;
        }
        description = posting.description;
        debug!("JSON-LD JobPosting found: {:?}", title);
    }

    // 2. Page title
    if company.is_empty() || title.is_empty() {
        if let Some(guess) = page_title(&document).and_then(|t| split_page_title(&t)) {
            if title.is_empty() {
                title = guess.title;
            }
            if company.is_empty() {
                company = guess.company;
            }
        }
    }

    // 3. Platform specific selectors; the later board wins when both match
    if company.is_empty() {
        for css in [LINKEDIN_COMPANY_SELECTOR, INDEED_COMPANY_SELECTOR] {
            if let Some(element) = select_first(&document, css) {
                company = inner_text(element);
            }
        }
    }
    if title.is_empty() {
        for css in [LINKEDIN_TITLE_SELECTOR, INDEED_TITLE_SELECTOR] {
            if let Some(element) = select_first(&document, css) {
                title = inner_text(element);
            }
        }
    }

    // 4. Generic DOM
    if title.is_empty() {
        title = select_first(&document, "h1")
            .map(inner_text)
            .unwrap_or_default();
    }
    if company.is_empty() {
        if let Some(meta) = select_first(&document, r#"meta[property="og:site_name"]"#) {
            company = meta.value().attr("content").unwrap_or("").to_string();
        }
    }

    // 5. Description containers
    if description.chars().count() < MIN_DESCRIPTION_CHARS {
        for css in [LINKEDIN_DESCRIPTION_SELECTOR, INDEED_DESCRIPTION_SELECTOR] {
            if let Some(element) = select_first(&document, css) {
                description = inner_text(element);
            }
        }
        if description.is_empty() {
            description = select_first(&document, "main")
                .or_else(|| select_first(&document, "body"))
                .map(inner_text)
                .unwrap_or_default();
        }
    }

    // 6. Descriptions from JSON-LD often carry markup
    if description.contains("</") {
        description = strip_html(&description);
    }

    ScrapedJobPosting {
        title: truncate_chars(&title, MAX_TITLE_CHARS),
        company: truncate_chars(&company, MAX_COMPANY_CHARS),
        description: truncate_chars(&description, MAX_DESCRIPTION_CHARS),
        url: url.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct JsonLdPosting {
    title: String,
    company: Option<String>,
    description: String,
}

fn json_ld_postings(document: &Html) -> Vec<JsonLdPosting> {
    let Ok(selector) = Selector::parse(JSON_LD_SELECTOR) else {
        return Vec::new();
    };

    let mut postings = Vec::new();
    for script in document.select(&selector) {
        let content: String = script.text().collect();
        if !content.contains("JobPosting") {
            continue;
        }
        let json: Value = match serde_json::from_str(content.trim()) {
            Ok(json) => json,
            Err(e) => {
                debug!("Skipping malformed JSON-LD block: {}", e);
                continue;
            }
        };
        let items = match json {
            Value::Array(items) => items,
            other => vec![other],
        };
        for item in items {
            if item.get("@type").and_then(Value::as_str) != Some("JobPosting") {
                continue;
            }
            postings.push(JsonLdPosting {
                title: string_field(&item, "title"),
                company: item
                    .get("hiringOrganization")
                    .filter(|org| !org.is_null())
                    .map(|org| string_field(org, "name")),
                description: string_field(&item, "description"),
            });
        }
    }
    postings
}

fn string_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TitleGuess {
    title: String,
    company: String,
}

/// Split "Title at Company | Site", "Title | Company" or "Title - Company".
/// Only the first separator found (in that priority order) is used.
fn split_page_title(page_title: &str) -> Option<TitleGuess> {
    if page_title.contains(" at ") {
        let mut parts = page_title.split(" at ");
        let title = parts.next().unwrap_or("").trim().to_string();
        let company = parts
            .next()
            .unwrap_or("")
            .split('|')
            .next()
            .unwrap_or("")
            .split('-')
            .next()
            .unwrap_or("")
            .trim()
            .to_string();
        return Some(TitleGuess { title, company });
    }

    if page_title.contains(" | ") {
        let mut parts = page_title.split(" | ");
        let title = parts.next().unwrap_or("").trim().to_string();
        let candidate = parts.next().unwrap_or("").trim();
        // Board names are not employers
        let company = if candidate.contains("LinkedIn") || candidate.contains("Indeed") {
            String::new()
        } else {
            candidate.to_string()
        };
        return Some(TitleGuess { title, company });
    }

    if page_title.contains(" - ") {
        let mut parts = page_title.split(" - ");
        let title = parts.next().unwrap_or("").trim().to_string();
        let company = parts.next().unwrap_or("").trim().to_string();
        return Some(TitleGuess { title, company });
    }

    None
}

fn page_title(document: &Html) -> Option<String> {
    let element = select_first(document, "title")?;
    let raw: String = element.text().collect();
    Some(raw.split_whitespace().collect::<Vec<_>>().join(" "))
}

fn select_first<'a>(document: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    document.select(&selector).next()
}

/// Rendered text of an element: hidden content skipped, one line per block,
/// whitespace collapsed.
pub fn inner_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    collect_text(element, &mut raw);
    clean_lines(&raw)
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name();
    if SKIPPED_TAGS.contains(&name) {
        return;
    }
    if name == "br" {
        out.push('\n');
        return;
    }

    let block = BLOCK_TAGS.contains(&name);
    if block {
        out.push('\n');
    }
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_element) = ElementRef::wrap(child) {
            collect_text(child_element, out);
        }
    }
    if block {
        out.push('\n');
    }
}

fn clean_lines(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Re-parse a string as an HTML fragment and keep its rendered text.
pub fn strip_html(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    inner_text(fragment.root_element())
}

pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Download a job page the way a browser would request it.
pub fn fetch_page_html(url: &str, timeout: Duration) -> Result<String> {
    info!("Fetching job page: {}", url);

    let client = reqwest::blocking::Client::builder()
        .user_agent("Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36")
        .timeout(timeout)
        .build()
        .context("Failed to create HTTP client")?;

    let response = client
        .get(url)
        .send()
        .with_context(|| format!("Failed to fetch {}", url))?;

    if !response.status().is_success() {
        return Err(anyhow!("HTTP error fetching page: {}", response.status()));
    }

    response.text().context("Failed to read page body")
}
