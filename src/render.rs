use regex::Regex;

use crate::dispatch::Analysis;
use crate::history::{HistoryStats, TrendPoint};
use crate::models::HistoryEntry;
use crate::response::{format_number, DomainInfo, DomainReport, Explanation};
use crate::verdict::{recommendation_tone, Tone};

pub const MAX_FLAGS: usize = 4;
pub const MAX_KEYWORDS: usize = 5;
pub const METER_WIDTH: usize = 30;
pub const WRAP_WIDTH: usize = 72;
pub const DEFAULT_EXPLANATION: &str = "Standard pattern matching analysis complete.";
pub const EMPTY_HISTORY: &str = "No analysis data found. Start by scanning a job!";

const MARKER_EMOJI: [&str; 5] = ["✅", "🚨", "❌", "⚠️", "🕵️"];
const SPARK_BLOCKS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

pub fn tone_marker(tone: Tone) -> &'static str {
    match tone {
        Tone::Safe => "[ok]",
        Tone::Warning => "[!]",
        Tone::Danger => "[!!]",
    }
}

/// Flags carry their own severity marker emoji.
pub fn flag_tone(flag: &str) -> Tone {
    if flag.contains('🚨') {
        Tone::Danger
    } else if flag.contains('✅') {
        Tone::Safe
    } else {
        Tone::Warning
    }
}

/// Drop everything but ASCII word characters, whitespace and dashes.
pub fn clean_flag(flag: &str) -> String {
    match Regex::new(r"[^A-Za-z0-9_\s-]") {
        Ok(re) => re.replace_all(flag, "").trim().to_string(),
        Err(_) => flag.trim().to_string(),
    }
}

pub fn explanation_text(explanation: Option<&Explanation>) -> String {
    let content = match explanation {
        Some(Explanation::Details {
            ai_summary: Some(summary),
            ..
        }) if !summary.trim().is_empty() => summary.clone(),
        Some(Explanation::Details { top_words, .. }) if !top_words.is_empty() => format!(
            "Analysis triggered by keyword vectorization: {}",
            top_words.join(", ")
        ),
        Some(Explanation::Text(text)) if !text.trim().is_empty() => text.clone(),
        _ => DEFAULT_EXPLANATION.to_string(),
    };
    strip_markup(&content)
}

fn strip_markup(content: &str) -> String {
    let mut text = content.replace("<br>", "\n");
    if let Ok(re) = Regex::new(r"<[^>]+>") {
        text = re.replace_all(&text, "").to_string();
    }
    for marker in MARKER_EMOJI {
        text = text.replace(marker, "");
    }
    text.lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Horizontal gauge with a marker at the score's position.
pub fn risk_meter(score: f64, width: usize) -> String {
    let width = width.max(2);
    let clamped = score.clamp(0.0, 100.0);
    let pos = ((clamped / 100.0) * (width - 1) as f64).round() as usize;
    let bar: String = (0..width)
        .map(|i| if i == pos { '●' } else { '─' })
        .collect();
    format!("low [{}] high", bar)
}

fn wrap_into(out: &mut Vec<String>, text: &str, indent: &str) {
    for paragraph in text.lines() {
        if paragraph.is_empty() {
            out.push(String::new());
            continue;
        }
        for line in textwrap::wrap(paragraph, WRAP_WIDTH) {
            out.push(format!("{}{}", indent, line));
        }
    }
}

pub fn company_intel(info: &DomainInfo) -> String {
    let age = match (info.age_years, info.age_days) {
        (Some(years), _) if years != 0.0 => format!("{} years", format_number(years)),
        (_, Some(days)) => format!("{} days", format_number(days)),
        _ => "unknown".to_string(),
    };

    let mut lines = vec![
        "Company Intel".to_string(),
        format!("  Domain:     {}", info.domain),
        format!("  Age:        {}", age),
        format!("  Registered: {}", info.created.as_deref().unwrap_or("Unknown")),
    ];
    if info.age_years.is_some_and(|years| years < 1.0) {
        lines.push("  ⚠️ New Domain (<1 yr)".to_string());
    }
    lines.join("\n")
}

/// Full result card for a fresh analysis.
pub fn result_card(analysis: &Analysis) -> String {
    let verdict = &analysis.verdict;
    let response = &analysis.response;
    let mut out = Vec::new();

    let mut headline = format!("{} {}", verdict.severity.icon(), verdict.severity.label());
    let company = analysis.entry.company.as_str();
    if !company.is_empty() && company != "Unknown Company" && company != "N/A" {
        headline.push_str(&format!(" • {}", company));
    }
    out.push(headline);
    out.push(analysis.entry.title.clone());
    out.push(format!("AI Confidence: {}", verdict.confidence));
    if verdict.domain_override {
        out.push("Trusted domain with very low risk; model verdict overridden.".to_string());
    }
    out.push(String::new());

    if let Some(info) = response.domain_info() {
        out.push(company_intel(info));
        out.push(String::new());
    }

    out.push(format!("Risk Score: {}/100", format_number(verdict.risk_score)));
    out.push(risk_meter(verdict.risk_score, METER_WIDTH));

    let flags = response.flags();
    if !flags.is_empty() {
        out.push(String::new());
        out.push("⚠️ Risk Flags".to_string());
        for flag in flags.iter().take(MAX_FLAGS) {
            out.push(format!("  {} {}", tone_marker(flag_tone(flag)), clean_flag(flag)));
        }
    }

    let keywords = response
        .explanation
        .as_ref()
        .map(|e| e.top_words())
        .unwrap_or(&[]);
    if !keywords.is_empty() {
        out.push(String::new());
        let shown: Vec<&str> = keywords.iter().take(MAX_KEYWORDS).map(String::as_str).collect();
        out.push(format!("🔑 AI Key Indicators: {}", shown.join(", ")));
    }

    if let Some(first) = response.recommendations().first() {
        let tone = recommendation_tone(verdict, response);
        out.push(String::new());
        out.push(format!("💡 Recommendation {}: {}", tone_marker(tone), first));
    }

    out.push(String::new());
    out.push("AI Analysis Report".to_string());
    wrap_into(&mut out, &explanation_text(response.explanation.as_ref()), "  ");

    out.join("\n")
}

/// Detail view of a stored history entry.
pub fn entry_detail(entry: &HistoryEntry) -> String {
    let mut out = vec![
        entry.title.clone(),
        format!("at {}", entry.company),
        String::new(),
        format!("Verdict:    {}", entry.prediction),
        format!("Confidence: {}", entry.confidence),
        format!(
            "Risk:       {} ({}/100)",
            risk_label(&entry.risk_level),
            format_number(entry.risk_score)
        ),
        risk_meter(entry.risk_score, METER_WIDTH),
        format!("Date:       {}", entry.date),
    ];
    if let Some(location) = &entry.location {
        out.push(format!("Location:   {}", location));
    }
    if let Some(url) = &entry.source_url {
        out.push(format!("URL:        {}", url));
    }
    if let Some(source) = &entry.source {
        out.push(format!("Source:     {}", source));
    }

    out.push(String::new());
    out.push(if entry.is_real() {
        "You can proceed with caution. Always verify interview requests.".to_string()
    } else {
        "Do not provide personal info or money. Report this job.".to_string()
    });

    out.push(String::new());
    out.push("AI Analysis Report".to_string());
    wrap_into(&mut out, &explanation_text(entry.explanation.as_ref()), "  ");

    if let Some(description) = &entry.description {
        out.push(String::new());
        out.push("Description".to_string());
        wrap_into(&mut out, description, "  ");
    }

    out.join("\n")
}

fn risk_label(level: &str) -> String {
    if level.is_empty() {
        "N/A".to_string()
    } else {
        level.to_uppercase()
    }
}

pub fn domain_report(report: &DomainReport, requested: &str) -> String {
    let domain = report
        .domain
        .as_deref()
        .filter(|d| !d.is_empty())
        .unwrap_or(requested);
    let level = report
        .risk_level
        .map(|l| l.as_str().to_uppercase())
        .unwrap_or_else(|| "UNKNOWN".to_string());

    let mut out = vec![
        format!("Domain: {}", domain),
        format!("{} RISK", level),
        format!("Score: {}/100", format_number(report.risk_score)),
    ];
    if !report.flags.is_empty() {
        out.push(String::new());
        for flag in report.flags.iter().take(MAX_FLAGS) {
            out.push(format!("  {} {}", tone_marker(flag_tone(flag)), flag));
        }
    }
    if report.trusted {
        out.push(String::new());
        out.push("✅ Trusted job platform".to_string());
    }
    if let Some(details) = report.domain_age.as_ref().and_then(|a| a.details.as_deref()) {
        out.push(format!("📅 {}", details));
    }
    out.join("\n")
}

/// Numbered table; the number is what `report <n>` takes.
pub fn history_table(entries: &[(usize, &HistoryEntry)]) -> String {
    if entries.is_empty() {
        return EMPTY_HISTORY.to_string();
    }

    let mut out = vec![
        format!(
            "{:<4} {:<30} {:<20} {:<6} {:<9} {:<12} {}",
            "#", "Title", "Company", "Result", "Risk", "Confidence", "Date"
        ),
        "-".repeat(95),
    ];
    for (index, entry) in entries {
        out.push(format!(
            "{:<4} {:<30} {:<20} {:<6} {:<9} {:<12} {}",
            index + 1,
            truncate(&entry.title, 30),
            truncate(&entry.company, 20),
            if entry.is_real() { "Real" } else { "Fake" },
            risk_label(&entry.risk_level),
            truncate(&entry.confidence, 12),
            entry.day()
        ));
    }
    out.join("\n")
}

pub fn stats_panel(stats: &HistoryStats, total_scanned: u64) -> String {
    format!(
        "Total: {}   Fake: {}   Real: {}   Blacklisted: {}   (server total: {})",
        stats.total, stats.fake, stats.real, stats.blacklisted, total_scanned
    )
}

pub fn real_fake_share(stats: &HistoryStats) -> String {
    let classified = stats.real + stats.fake;
    if classified == 0 {
        return "Real 0% / Fake 0%".to_string();
    }
    let real = (stats.real as f64 / classified as f64 * 100.0).round();
    format!("Real {}% / Fake {}%", real, 100.0 - real)
}

/// One block character per point, scaled to 0..=100.
pub fn sparkline(points: &[TrendPoint]) -> String {
    points
        .iter()
        .map(|p| {
            let level = (p.score.clamp(0.0, 100.0) / 100.0 * (SPARK_BLOCKS.len() - 1) as f64).round();
            SPARK_BLOCKS[level as usize]
        })
        .collect()
}

pub fn trend_panel(points: &[TrendPoint]) -> String {
    if points.is_empty() {
        return "Risk trend: no data".to_string();
    }
    let first = points.first().map(|p| p.label.as_str()).unwrap_or("");
    let last = points.last().map(|p| p.label.as_str()).unwrap_or("");
    format!("Risk trend: {}  ({} .. {})", sparkline(points), first, last)
}
