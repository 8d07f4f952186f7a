use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Actions recorded in the usage ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    UploadAndTranslate,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::UploadAndTranslate => "upload_and_translate",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of usage statistics, computed from the ledger at query time.
#[derive(Debug, Clone, Serialize)]
pub struct UsageAggregate {
    pub action: String,
    pub count: i64,
    pub first_use: DateTime<Utc>,
    pub last_use: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserStats {
    pub user_id: String,
    pub stats: Vec<UsageAggregate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TotalStats {
    pub total_stats: Vec<UsageAggregate>,
}
