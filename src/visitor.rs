use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::api::AnalysisBackend;
use crate::db::{Database, VISITOR_KEY, WELCOMED_KEY};
use crate::models::{VisitorRecord, WelcomeEmailRequest};

/// A dismissed welcome prompt stays quiet this long.
pub const REMEMBER_DAYS: i64 = 30;
pub const REGISTER_SOURCE: &str = "welcome_modal";
pub const RESEND_SOURCE: &str = "manual_resend";

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Pure policy: no visitor record, and never welcomed or welcomed long ago.
pub fn welcome_due(has_visitor: bool, welcomed_at_ms: Option<i64>, now_ms: i64) -> bool {
    if has_visitor {
        return false;
    }
    match welcomed_at_ms {
        Some(at) => now_ms - at >= REMEMBER_DAYS * MILLIS_PER_DAY,
        None => true,
    }
}

pub fn is_valid_email(email: &str) -> bool {
    !email.is_empty() && email.contains('@') && email.contains('.')
}

pub fn current_visitor(db: &Database) -> Result<Option<VisitorRecord>> {
    let Some(raw) = db.get(VISITOR_KEY)? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(visitor) => Ok(Some(visitor)),
        Err(e) => {
            warn!("Ignoring unreadable visitor record: {}", e);
            Ok(None)
        }
    }
}

/// Name shown to the visitor: stored name, else the email's local part.
pub fn display_name(visitor: &VisitorRecord) -> String {
    visitor
        .name
        .clone()
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| visitor.email.split('@').next().unwrap_or("User").to_string())
}

fn welcomed_at(db: &Database) -> Result<Option<i64>> {
    Ok(db.get(WELCOMED_KEY)?.and_then(|raw| raw.trim().parse().ok()))
}

pub fn should_show_welcome(db: &Database, now: DateTime<Utc>) -> Result<bool> {
    let has_visitor = current_visitor(db)?.is_some();
    Ok(welcome_due(has_visitor, welcomed_at(db)?, now.timestamp_millis()))
}

/// Remember a dismissal for the next 30 days.
pub fn skip(db: &Database, now: DateTime<Utc>) -> Result<()> {
    db.set(WELCOMED_KEY, &now.timestamp_millis().to_string())
}

/// Store the visitor locally, then tell the backend. Backend failures are
/// not the visitor's problem and are only logged.
pub fn register(
    db: &Database,
    backend: &dyn AnalysisBackend,
    email: &str,
    now: DateTime<Utc>,
) -> Result<VisitorRecord> {
    let email = email.trim();
    if !is_valid_email(email) {
        bail!("Please enter a valid email");
    }

    let visitor = VisitorRecord {
        email: email.to_string(),
        name: None,
        registered_at: now.to_rfc3339(),
        source: REGISTER_SOURCE.to_string(),
    };
    let raw = serde_json::to_string(&visitor).context("Failed to serialize visitor")?;
    db.set(VISITOR_KEY, &raw)?;
    skip(db, now)?;

    match backend.register_visitor(&visitor) {
        Ok(accepted) => debug!("Visitor registration accepted: {}", accepted),
        Err(e) => warn!("Visitor registration failed: {}", e),
    }
    Ok(visitor)
}

pub fn resend(db: &Database, backend: &dyn AnalysisBackend) -> Result<bool> {
    let Some(visitor) = current_visitor(db)? else {
        bail!("No registered visitor. Run `fakejob welcome register <email>` first.");
    };
    let request = WelcomeEmailRequest {
        name: display_name(&visitor),
        email: visitor.email,
        source: RESEND_SOURCE.to_string(),
    };
    backend.send_welcome_email(&request)
}

/// Drop the visitor record and the welcome timestamp.
pub fn forget(db: &Database) -> Result<()> {
    db.remove(VISITOR_KEY)?;
    db.remove(WELCOMED_KEY)
}
