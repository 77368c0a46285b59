use serde::Serialize;

use super::status::TaskStatus;
use super::ReportError;

/// One stored status transaction, as read from `task_transactions`.
/// Values are JSON-encoded status codes: `0`, `"0"` or `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawStatusRow {
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    /// Not open before, open after.
    Open,
    /// Open before, not open after.
    Close,
    /// Neither, e.g. resolved -> invalid.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTransitionEvent {
    pub timestamp: i64,
    pub transition: Transition,
}

impl StatusTransitionEvent {
    pub fn counts(&self) -> bool {
        self.transition != Transition::Ignored
    }
}

/// Strip JSON quoting from a stored status value and map it onto the
/// status domain. `None`, empty and `null` mean the task had no status yet.
pub fn normalize_status(raw: Option<&str>, row: usize) -> Result<Option<TaskStatus>, ReportError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let trimmed = raw.trim().trim_matches('"').trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(None);
    }
    trimmed
        .parse::<i64>()
        .ok()
        .and_then(TaskStatus::from_code)
        .map(Some)
        .ok_or_else(|| ReportError::UnknownStatus {
            row,
            value: raw.to_string(),
        })
}

/// Label a single row. Pure in its inputs.
pub fn classify_row(row: &RawStatusRow, index: usize) -> Result<Transition, ReportError> {
    let old = normalize_status(row.old_value.as_deref(), index)?;
    let new = normalize_status(row.new_value.as_deref(), index)?
        .ok_or(ReportError::MissingNewStatus { row: index })?;

    let old_is_open = old.is_some_and(TaskStatus::is_open);
    let new_is_open = new.is_open();

    Ok(if new_is_open && !old_is_open {
        Transition::Open
    } else if old_is_open && !new_is_open {
        Transition::Close
    } else {
        Transition::Ignored
    })
}

/// Classify a batch and put it in time order. Equal timestamps keep their
/// row order. Any bad row rejects the whole batch.
pub fn classify_rows(rows: &[RawStatusRow]) -> Result<Vec<StatusTransitionEvent>, ReportError> {
    let mut events = rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            if chrono::DateTime::from_timestamp(row.created_at, 0).is_none() {
                return Err(ReportError::BadTimestamp {
                    row: i,
                    timestamp: row.created_at,
                });
            }
            Ok(StatusTransitionEvent {
                timestamp: row.created_at,
                transition: classify_row(row, i)?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    events.sort_by_key(|e| e.timestamp);
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(old: Option<&str>, new: Option<&str>, at: i64) -> RawStatusRow {
        RawStatusRow {
            old_value: old.map(str::to_string),
            new_value: new.map(str::to_string),
            created_at: at,
        }
    }

    #[test]
    fn test_normalize_accepts_quoted_and_bare_codes() {
        assert_eq!(normalize_status(Some("\"0\""), 0), Ok(Some(TaskStatus::Open)));
        assert_eq!(normalize_status(Some("0"), 0), Ok(Some(TaskStatus::Open)));
        assert_eq!(normalize_status(Some("\"3\""), 0), Ok(Some(TaskStatus::Invalid)));
        assert_eq!(normalize_status(Some("null"), 0), Ok(None));
        assert_eq!(normalize_status(Some(""), 0), Ok(None));
        assert_eq!(normalize_status(None, 0), Ok(None));
    }

    #[test]
    fn test_normalize_rejects_out_of_domain_values() {
        assert_eq!(
            normalize_status(Some("\"9\""), 4),
            Err(ReportError::UnknownStatus {
                row: 4,
                value: "\"9\"".into()
            })
        );
        assert!(normalize_status(Some("resolved"), 0).is_err());
    }

    #[test]
    fn test_classify_open_close_and_ignored() {
        assert_eq!(classify_row(&row(None, Some("0"), 1), 0), Ok(Transition::Open));
        assert_eq!(classify_row(&row(Some("\"1\""), Some("\"0\""), 1), 0), Ok(Transition::Open));
        assert_eq!(classify_row(&row(Some("0"), Some("1"), 1), 0), Ok(Transition::Close));
        // Resolution change while staying closed.
        assert_eq!(classify_row(&row(Some("1"), Some("3"), 1), 0), Ok(Transition::Ignored));
        // Bogus open -> open entry.
        assert_eq!(classify_row(&row(Some("0"), Some("0"), 1), 0), Ok(Transition::Ignored));
    }

    #[test]
    fn test_classify_is_repeatable() {
        let r = row(Some("\"0\""), Some("\"2\""), 10);
        let first = classify_row(&r, 0);
        for _ in 0..5 {
            assert_eq!(classify_row(&r, 0), first);
        }
    }

    #[test]
    fn test_missing_new_value_is_an_error() {
        assert_eq!(
            classify_row(&row(Some("0"), None, 1), 7),
            Err(ReportError::MissingNewStatus { row: 7 })
        );
        assert!(classify_row(&row(Some("0"), Some("null"), 1), 7).is_err());
    }

    #[test]
    fn test_classify_rows_sorts_stably_and_rejects_batch() {
        let rows = vec![
            row(None, Some("0"), 200),
            row(Some("0"), Some("1"), 100),
            row(Some("1"), Some("0"), 100),
        ];
        let events = classify_rows(&rows).unwrap();
        let seen: Vec<_> = events.iter().map(|e| (e.timestamp, e.transition)).collect();
        assert_eq!(
            seen,
            vec![
                (100, Transition::Close),
                (100, Transition::Open),
                (200, Transition::Open)
            ]
        );

        let mut bad = rows.clone();
        bad.push(row(Some("0"), Some("\"42\""), 300));
        assert!(classify_rows(&bad).is_err());
    }

    #[test]
    fn test_out_of_range_timestamp_rejected() {
        let rows = vec![row(None, Some("0"), i64::MAX)];
        assert_eq!(
            classify_rows(&rows),
            Err(ReportError::BadTimestamp {
                row: 0,
                timestamp: i64::MAX
            })
        );
    }
}
