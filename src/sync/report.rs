//! Structured sync report: the machine-readable outcome of a reverse run.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Success,
    Error,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ChangesApplied {
    pub yaml_updates: usize,
    pub handler_updates: usize,
    pub structural_updates: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub status: SyncStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<String>,
    pub changes_applied: ChangesApplied,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncReport {
    pub fn cancelled() -> Self {
        Self {
            status: SyncStatus::Cancelled,
            backup_dir: None,
            changes_applied: ChangesApplied::default(),
            details: Vec::new(),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: SyncStatus::Error,
            backup_dir: None,
            changes_applied: ChangesApplied::default(),
            details: Vec::new(),
            error: Some(message.into()),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_serializes_to_the_documented_contract() {
        let report = SyncReport {
            status: SyncStatus::Success,
            backup_dir: Some("/tmp/.sync_backup_20260101_000000".into()),
            changes_applied: ChangesApplied {
                yaml_updates: 2,
                handler_updates: 1,
                structural_updates: 0,
            },
            details: vec!["note".into()],
            error: None,
        };
        let json = report.to_json();
        assert!(json.contains("\"status\": \"success\""));
        assert!(json.contains("\"yaml_updates\": 2"));
        assert!(!json.contains("\"error\""));
    }
}
