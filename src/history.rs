use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::api::AnalysisBackend;
use crate::db::{Database, HISTORY_KEY};
use crate::models::HistoryEntry;
use crate::normalize::{format_confidence, normalize_label};
use crate::response::{Explanation, HistoryRecord};

/// Cap for entries added one analysis at a time.
pub const DASHBOARD_CAP: usize = 50;
/// Cap after a CSV bulk import.
pub const BULK_CAP: usize = 100;
/// Number of recent entries plotted in the trend line.
pub const TREND_WINDOW: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum HistoryFilter {
    All,
    Real,
    Fake,
    Critical,
}

impl HistoryFilter {
    pub fn matches(&self, entry: &HistoryEntry) -> bool {
        match self {
            HistoryFilter::All => true,
            HistoryFilter::Real => entry.is_real(),
            HistoryFilter::Fake => entry.is_fake(),
            HistoryFilter::Critical => entry.risk_level == "critical",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            HistoryFilter::All => HistoryFilter::Real,
            HistoryFilter::Real => HistoryFilter::Fake,
            HistoryFilter::Fake => HistoryFilter::Critical,
            HistoryFilter::Critical => HistoryFilter::All,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HistoryFilter::All => "all",
            HistoryFilter::Real => "real",
            HistoryFilter::Fake => "fake",
            HistoryFilter::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryStats {
    pub total: usize,
    pub fake: usize,
    pub real: usize,
    pub blacklisted: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendPoint {
    pub label: String,
    pub score: f64,
}

/// Newest-first list of past analyses, mirrored to the local store.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryCache {
    entries: Vec<HistoryEntry>,
    cap: usize,
}

impl HistoryCache {
    pub fn new(cap: usize) -> Self {
        Self {
            entries: Vec::new(),
            cap,
        }
    }

    /// Restore the cache from the store. Unreadable data starts an empty list.
    pub fn load(db: &Database, cap: usize) -> Result<Self> {
        let mut cache = Self::new(cap);
        if let Some(raw) = db.get(HISTORY_KEY)? {
            match serde_json::from_str::<Vec<HistoryEntry>>(&raw) {
                Ok(entries) => cache.entries = entries,
                Err(e) => warn!("Discarding unreadable history: {}", e),
            }
        }
        debug!("Loaded {} history entries", cache.entries.len());
        Ok(cache)
    }

    #[cfg(test)]
    pub fn from_entries(entries: Vec<HistoryEntry>, cap: usize) -> Self {
        Self { entries, cap }
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.first()
    }

    pub fn add_entry(&mut self, db: &Database, entry: HistoryEntry) -> Result<()> {
        self.entries.insert(0, entry);
        if self.entries.len() > self.cap {
            self.entries.pop();
        }
        self.persist(db)
    }

    /// Rows are inserted in order, so the last row ends up newest.
    pub fn add_bulk(&mut self, db: &Database, entries: Vec<HistoryEntry>) -> Result<()> {
        for entry in entries {
            self.entries.insert(0, entry);
        }
        self.entries.truncate(BULK_CAP);
        self.persist(db)
    }

    /// Server truth overrides the local cache.
    pub fn replace_all(&mut self, db: &Database, entries: Vec<HistoryEntry>) -> Result<()> {
        self.entries = entries;
        self.persist(db)
    }

    /// Clear server history, then the local list. A transport failure keeps
    /// the local list intact.
    pub fn clear(&mut self, db: &Database, backend: &dyn AnalysisBackend) -> Result<()> {
        backend.clear_history()?;
        self.entries.clear();
        self.persist(db)
    }

    pub fn filter(&self, filter: HistoryFilter) -> Vec<&HistoryEntry> {
        self.entries.iter().filter(|e| filter.matches(e)).collect()
    }

    pub fn stats(&self) -> HistoryStats {
        HistoryStats {
            total: self.entries.len(),
            fake: self.entries.iter().filter(|e| e.is_fake()).count(),
            real: self.entries.iter().filter(|e| e.is_real()).count(),
            blacklisted: self
                .entries
                .iter()
                .filter(|e| HistoryFilter::Critical.matches(e))
                .count(),
        }
    }

    /// Risk scores of the most recent entries, oldest first.
    pub fn trend(&self) -> Vec<TrendPoint> {
        self.entries
            .iter()
            .take(TREND_WINDOW)
            .rev()
            .map(|e| TrendPoint {
                label: e.day().to_string(),
                score: e.risk_score,
            })
            .collect()
    }

    pub fn summary_lines(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| format!("{} | {} | {}", e.title, e.company, e.prediction))
            .collect()
    }

    fn persist(&self, db: &Database) -> Result<()> {
        let raw = serde_json::to_string(&self.entries).context("Failed to serialize history")?;
        db.set(HISTORY_KEY, &raw)
    }
}

/// Map one server-side log row onto a cache entry.
pub fn from_server(record: HistoryRecord) -> HistoryEntry {
    HistoryEntry {
        title: record.title,
        company: record.company,
        prediction: normalize_label(record.result.as_ref()),
        confidence: format_confidence(record.confidence.as_ref()),
        risk_level: record.risk_level,
        risk_score: record.risk_score,
        date: record.timestamp,
        location: None,
        source_url: None,
        source: None,
        description: None,
        explanation: Some(Explanation::empty()),
    }
}
