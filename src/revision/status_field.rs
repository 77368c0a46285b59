use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevisionStatus {
    NeedsReview,
    NeedsRevision,
    Accepted,
    Closed,
    Abandoned,
}

impl RevisionStatus {
    pub const ALL: [RevisionStatus; 5] = [
        RevisionStatus::NeedsReview,
        RevisionStatus::NeedsRevision,
        RevisionStatus::Accepted,
        RevisionStatus::Closed,
        RevisionStatus::Abandoned,
    ];

    pub fn code(self) -> i64 {
        match self {
            RevisionStatus::NeedsReview => 0,
            RevisionStatus::NeedsRevision => 1,
            RevisionStatus::Accepted => 2,
            RevisionStatus::Closed => 3,
            RevisionStatus::Abandoned => 4,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            RevisionStatus::NeedsReview => "Needs Review",
            RevisionStatus::NeedsRevision => "Needs Revision",
            RevisionStatus::Accepted => "Accepted",
            RevisionStatus::Closed => "Closed",
            RevisionStatus::Abandoned => "Abandoned",
        }
    }
}

/// Version control system of a revision's active diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceControl {
    Hg,
    Git,
    Svn,
}

impl SourceControl {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceControl::Hg => "hg",
            SourceControl::Git => "git",
            SourceControl::Svn => "svn",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "hg" => Some(SourceControl::Hg),
            "git" => Some(SourceControl::Git),
            "svn" => Some(SourceControl::Svn),
            _ => None,
        }
    }

    /// The `arc` command that lands an accepted revision.
    fn next_step(self) -> &'static str {
        match self {
            SourceControl::Hg => "<tt>arc merge</tt>",
            SourceControl::Git => "<tt>arc amend</tt> or <tt>arc merge</tt>",
            SourceControl::Svn => "<tt>arc commit</tt>",
        }
    }
}

/// How the status field renders on the revision page and in revision lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusField {
    pub label: &'static str,
    pub value: String,
    pub list_header: &'static str,
    pub list_value: &'static str,
}

pub fn render_view_value(status: RevisionStatus, vcs: Option<SourceControl>) -> String {
    let mut value = format!("<strong>{}</strong>", status.name());
    if status == RevisionStatus::Accepted {
        if let Some(vcs) = vcs {
            value.push_str(" &middot; Next step: ");
            value.push_str(vcs.next_step());
        }
    }
    value
}

pub fn status_field(status: RevisionStatus, vcs: Option<SourceControl>) -> StatusField {
    StatusField {
        label: "Revision Status:",
        value: render_view_value(status, vcs),
        list_header: "Status",
        list_value: status.name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepted_next_step_per_vcs() {
        assert_eq!(
            render_view_value(RevisionStatus::Accepted, Some(SourceControl::Hg)),
            "<strong>Accepted</strong> &middot; Next step: <tt>arc merge</tt>"
        );
        assert_eq!(
            render_view_value(RevisionStatus::Accepted, Some(SourceControl::Git)),
            "<strong>Accepted</strong> &middot; Next step: <tt>arc amend</tt> or <tt>arc merge</tt>"
        );
        assert_eq!(
            render_view_value(RevisionStatus::Accepted, Some(SourceControl::Svn)),
            "<strong>Accepted</strong> &middot; Next step: <tt>arc commit</tt>"
        );
    }

    #[test]
    fn test_no_hint_without_vcs_or_acceptance() {
        assert_eq!(
            render_view_value(RevisionStatus::Accepted, None),
            "<strong>Accepted</strong>"
        );
        for status in RevisionStatus::ALL {
            if status == RevisionStatus::Accepted {
                continue;
            }
            let value = render_view_value(status, Some(SourceControl::Git));
            assert_eq!(value, format!("<strong>{}</strong>", status.name()));
        }
    }

    #[test]
    fn test_list_rendering() {
        let field = status_field(RevisionStatus::NeedsRevision, Some(SourceControl::Git));
        assert_eq!(field.label, "Revision Status:");
        assert_eq!(field.list_header, "Status");
        assert_eq!(field.list_value, "Needs Revision");
    }

    #[test]
    fn test_codes_round_trip() {
        for status in RevisionStatus::ALL {
            assert_eq!(RevisionStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(RevisionStatus::from_code(9), None);
        assert_eq!(SourceControl::parse("git"), Some(SourceControl::Git));
        assert_eq!(SourceControl::parse("cvs"), None);
    }
}
