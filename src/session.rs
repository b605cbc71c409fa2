use anyhow::Result;
use tracing::debug;

use crate::db::Database;
use crate::dispatch::Analysis;
use crate::history::HistoryCache;

/// Handle for one user action. Only the most recently issued ticket may
/// update what is on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RequestTicket(u64);

#[derive(Debug, Default)]
pub struct RequestTracker {
    issued: u64,
}

impl RequestTracker {
    pub fn issue(&mut self) -> RequestTicket {
        self.issued += 1;
        RequestTicket(self.issued)
    }

    pub fn is_current(&self, ticket: RequestTicket) -> bool {
        ticket.0 == self.issued
    }
}

/// Everything one command invocation knows: cached history, the analysis on
/// display, and the server-side total when it was fetched.
pub struct AppState {
    pub history: HistoryCache,
    pub current: Option<Analysis>,
    pub server_total: Option<u64>,
    tracker: RequestTracker,
}

impl AppState {
    pub fn new(history: HistoryCache) -> Self {
        Self {
            history,
            current: None,
            server_total: None,
            tracker: RequestTracker::default(),
        }
    }

    pub fn begin_request(&mut self) -> RequestTicket {
        self.tracker.issue()
    }

    /// Add a finished analysis to history and, if its ticket is still the
    /// latest, make it the displayed result. Returns whether it is displayed.
    pub fn record(&mut self, db: &Database, ticket: RequestTicket, analysis: Analysis) -> Result<bool> {
        self.history.add_entry(db, analysis.entry.clone())?;
        if !self.tracker.is_current(ticket) {
            debug!("Dropping stale result {:?}", ticket);
            return Ok(false);
        }
        self.current = Some(analysis);
        Ok(true)
    }

    /// Total analyses: the server count when known, else the local cache size.
    pub fn total_scanned(&self) -> u64 {
        self.server_total
            .unwrap_or(self.history.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::create_entry;
    use crate::history::DASHBOARD_CAP;
    use crate::normalize::normalize_response;
    use crate::response::{AnalysisResponse, Scalar};
    use crate::verdict::decide;

    fn analysis(title: &str) -> Analysis {
        let response = AnalysisResponse {
            result: Some(Scalar::Text("Real Job".to_string())),
            ..Default::default()
        };
        let entry = create_entry(title, "Acme", &normalize_response(&response), &response);
        let verdict = decide(&response);
        Analysis {
            entry,
            response,
            verdict,
        }
    }

    #[test]
    fn test_tickets_are_monotonic() {
        let mut tracker = RequestTracker::default();
        let first = tracker.issue();
        let second = tracker.issue();
        assert!(second > first);
        assert!(!tracker.is_current(first));
        assert!(tracker.is_current(second));
    }

    #[test]
    fn test_stale_result_never_overwrites_newer() {
        let db = Database::open_in_memory().unwrap();
        let mut state = AppState::new(HistoryCache::new(DASHBOARD_CAP));

        let slow = state.begin_request();
        let fast = state.begin_request();

        assert!(state.record(&db, fast, analysis("newer")).unwrap());
        assert!(!state.record(&db, slow, analysis("older")).unwrap());

        assert_eq!(state.current.as_ref().unwrap().entry.title, "newer");
        assert_eq!(state.history.len(), 2);
    }

    #[test]
    fn test_total_prefers_server_count() {
        let db = Database::open_in_memory().unwrap();
        let mut state = AppState::new(HistoryCache::new(DASHBOARD_CAP));
        let ticket = state.begin_request();
        state.record(&db, ticket, analysis("one")).unwrap();
        assert_eq!(state.total_scanned(), 1);

        state.server_total = Some(420);
        assert_eq!(state.total_scanned(), 420);
    }
}
