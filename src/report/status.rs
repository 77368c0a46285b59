use serde::{Deserialize, Serialize};

/// Task status codes as stored in `tasks.status` and in status transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Open,
    Resolved,
    Wontfix,
    Invalid,
    Duplicate,
    Spite,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 6] = [
        TaskStatus::Open,
        TaskStatus::Resolved,
        TaskStatus::Wontfix,
        TaskStatus::Invalid,
        TaskStatus::Duplicate,
        TaskStatus::Spite,
    ];

    pub fn code(self) -> i64 {
        match self {
            TaskStatus::Open => 0,
            TaskStatus::Resolved => 1,
            TaskStatus::Wontfix => 2,
            TaskStatus::Invalid => 3,
            TaskStatus::Duplicate => 4,
            TaskStatus::Spite => 5,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    pub fn is_open(self) -> bool {
        self == TaskStatus::Open
    }

    pub fn name(self) -> &'static str {
        match self {
            TaskStatus::Open => "Open",
            TaskStatus::Resolved => "Resolved",
            TaskStatus::Wontfix => "Wontfix",
            TaskStatus::Invalid => "Invalid",
            TaskStatus::Duplicate => "Duplicate",
            TaskStatus::Spite => "Spite",
        }
    }
}

/// Task priorities, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskPriority {
    UnbreakNow,
    Triage,
    High,
    Normal,
    Low,
    Wish,
}

impl TaskPriority {
    pub const ALL: [TaskPriority; 6] = [
        TaskPriority::UnbreakNow,
        TaskPriority::Triage,
        TaskPriority::High,
        TaskPriority::Normal,
        TaskPriority::Low,
        TaskPriority::Wish,
    ];

    pub fn value(self) -> i64 {
        match self {
            TaskPriority::UnbreakNow => 100,
            TaskPriority::Triage => 90,
            TaskPriority::High => 80,
            TaskPriority::Normal => 50,
            TaskPriority::Low => 25,
            TaskPriority::Wish => 0,
        }
    }

    pub fn from_value(value: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.value() == value)
    }

    pub fn label(self) -> &'static str {
        match self {
            TaskPriority::UnbreakNow => "Unbreak Now!",
            TaskPriority::Triage => "Needs Triage",
            TaskPriority::High => "High",
            TaskPriority::Normal => "Normal",
            TaskPriority::Low => "Low",
            TaskPriority::Wish => "Wishlist",
        }
    }

    /// Short column header for report tables.
    pub fn brief_label(self) -> &'static str {
        match self {
            TaskPriority::UnbreakNow => "Unbreak!",
            TaskPriority::Triage => "Triage",
            TaskPriority::High => "High",
            TaskPriority::Normal => "Normal",
            TaskPriority::Low => "Low",
            TaskPriority::Wish => "Wish",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_roundtrip() {
        for status in TaskStatus::ALL {
            assert_eq!(TaskStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(TaskStatus::from_code(6), None);
        assert_eq!(TaskStatus::from_code(-1), None);
    }

    #[test]
    fn test_only_open_is_open() {
        let open: Vec<_> = TaskStatus::ALL.iter().filter(|s| s.is_open()).collect();
        assert_eq!(open, vec![&TaskStatus::Open]);
    }

    #[test]
    fn test_priorities_listed_highest_first() {
        let values: Vec<i64> = TaskPriority::ALL.iter().map(|p| p.value()).collect();
        let mut sorted = values.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(values, sorted);
        assert_eq!(TaskPriority::from_value(50), Some(TaskPriority::Normal));
        assert_eq!(TaskPriority::from_value(51), None);
    }
}
