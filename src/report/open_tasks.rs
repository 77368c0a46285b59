//! Open tasks grouped by owner or project, broken down by priority.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::calendar::ViewerTimezone;
use super::format::{format_age_days, format_count};
use super::status::TaskPriority;

/// Filter value selecting tasks nobody owns.
pub const UP_FOR_GRABS_PHID: &str = "PHID-!!!!-UP-FOR-GRABS";
/// Filter value selecting tasks in no project.
pub const NO_PROJECT_PHID: &str = "PHID-!!!!-NO_PROJECT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenTasksView {
    #[default]
    User,
    Project,
}

impl OpenTasksView {
    pub fn as_str(self) -> &'static str {
        match self {
            OpenTasksView::User => "user",
            OpenTasksView::Project => "project",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenTasksOrder {
    #[default]
    Name,
    Total,
}

impl OpenTasksOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            OpenTasksOrder::Name => "name",
            OpenTasksOrder::Total => "total",
        }
    }
}

/// A task as the report needs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSummary {
    pub id: i64,
    pub title: String,
    pub owner_phid: Option<String>,
    pub priority: i64,
    pub date_created: i64,
    pub project_phids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OldestTask {
    pub task_id: i64,
    pub title: String,
    pub age: String,
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecentlyClosed {
    /// Formatted count, or `-` when nothing closed.
    pub count: String,
    pub task_ids: Vec<i64>,
    pub href: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenTasksRow {
    pub name: String,
    /// `None` for the leftover row.
    pub phid: Option<String>,
    pub href: String,
    /// One cell per priority, highest first; `-` for zero.
    pub priorities: Vec<String>,
    pub total: String,
    pub oldest_all: Option<OldestTask>,
    pub oldest_normal_or_better: Option<OldestTask>,
    pub closed_recently: RecentlyClosed,
    #[serde(skip)]
    pub total_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenTasksReport {
    pub header: String,
    pub headers: Vec<String>,
    pub rows: Vec<OpenTasksRow>,
}

pub struct OpenTasksInput<'a> {
    pub view: OpenTasksView,
    pub order: OpenTasksOrder,
    pub open: &'a [TaskSummary],
    pub recently_closed: &'a [TaskSummary],
    /// PHID -> display name for owners or projects.
    pub names: &'a HashMap<String, String>,
    pub now: i64,
    pub tz: ViewerTimezone,
}

fn group_keys(view: OpenTasksView, task: &TaskSummary) -> Vec<&str> {
    match view {
        OpenTasksView::User => task.owner_phid.as_deref().into_iter().collect(),
        OpenTasksView::Project => task.project_phids.iter().map(String::as_str).collect(),
    }
}

/// Split tasks into named groups and a leftover list (no owner / no project).
fn group<'t>(
    view: OpenTasksView,
    tasks: &'t [TaskSummary],
) -> (BTreeMap<&'t str, Vec<&'t TaskSummary>>, Vec<&'t TaskSummary>) {
    let mut groups: BTreeMap<&str, Vec<&TaskSummary>> = BTreeMap::new();
    let mut leftover = Vec::new();
    for task in tasks {
        let keys = group_keys(view, task);
        if keys.is_empty() {
            leftover.push(task);
        }
        for key in keys {
            groups.entry(key).or_default().push(task);
        }
    }
    (groups, leftover)
}

fn oldest(tasks: &[&TaskSummary], now: i64) -> Option<OldestTask> {
    let mut found: Option<&TaskSummary> = None;
    for &task in tasks {
        match found {
            Some(best) if task.date_created >= best.date_created => {}
            _ => found = Some(task),
        }
    }
    found.map(|task| OldestTask {
        task_id: task.id,
        title: task.title.clone(),
        age: format_age_days(now - task.date_created),
        href: format!("/T{}", task.id),
    })
}

fn recently_closed(tasks: &[&TaskSummary]) -> RecentlyClosed {
    if tasks.is_empty() {
        return RecentlyClosed {
            count: "-".to_string(),
            task_ids: Vec::new(),
            href: None,
        };
    }
    let task_ids: Vec<i64> = tasks.iter().map(|t| t.id).collect();
    let joined = task_ids
        .iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(",");
    RecentlyClosed {
        count: format_count(task_ids.len() as i64),
        href: Some(format!("/tasks?ids={joined}")),
        task_ids,
    }
}

fn build_row(
    name: String,
    phid: Option<&str>,
    href: String,
    open: &[&TaskSummary],
    closed: &[&TaskSummary],
    now: i64,
) -> OpenTasksRow {
    let mut total = 0;
    let priorities: Vec<String> = TaskPriority::ALL
        .iter()
        .map(|pri| {
            let n = open.iter().filter(|t| t.priority == pri.value()).count();
            total += n;
            if n == 0 {
                "-".to_string()
            } else {
                format_count(n as i64)
            }
        })
        .collect();

    let normal_or_better: Vec<&TaskSummary> = open
        .iter()
        .copied()
        .filter(|t| t.priority >= TaskPriority::Normal.value())
        .collect();

    OpenTasksRow {
        name,
        phid: phid.map(str::to_string),
        href,
        priorities,
        total: format_count(total as i64),
        oldest_all: oldest(open, now),
        oldest_normal_or_better: oldest(&normal_or_better, now),
        closed_recently: recently_closed(closed),
        total_count: total,
    }
}

pub fn build_open_tasks_report(input: OpenTasksInput<'_>) -> OpenTasksReport {
    let (open_groups, open_leftover) = group(input.view, input.open);
    let (closed_groups, closed_leftover) = group(input.view, input.recently_closed);

    let (column, filter, leftover_name, leftover_phid) = match input.view {
        OpenTasksView::User => ("User", "owner", "(Up For Grabs)", UP_FOR_GRABS_PHID),
        OpenTasksView::Project => ("Project", "projects", "(No Project)", NO_PROJECT_PHID),
    };

    let mut named: Vec<(&str, String)> = open_groups
        .keys()
        .map(|phid| {
            let name = input
                .names
                .get(*phid)
                .cloned()
                .unwrap_or_else(|| phid.to_string());
            (*phid, name)
        })
        .collect();
    named.sort_by(|a, b| a.1.cmp(&b.1));

    let mut rows: Vec<OpenTasksRow> = named
        .into_iter()
        .map(|(phid, name)| {
            let open = open_groups.get(phid).map(Vec::as_slice).unwrap_or_default();
            let closed = closed_groups.get(phid).map(Vec::as_slice).unwrap_or_default();
            build_row(
                name,
                Some(phid),
                format!("/tasks?{filter}={phid}"),
                open,
                closed,
                input.now,
            )
        })
        .collect();

    rows.push(build_row(
        leftover_name.to_string(),
        None,
        format!("/tasks?{filter}={leftover_phid}"),
        &open_leftover,
        &closed_leftover,
        input.now,
    ));

    // Rows are already in name order with the leftover row last.
    if input.order == OpenTasksOrder::Total {
        rows.sort_by_key(|r| r.total_count);
    }

    let mut headers = vec![column.to_string()];
    headers.extend(TaskPriority::ALL.iter().map(|p| p.brief_label().to_string()));
    headers.extend(
        ["Total", "Oldest (All)", "Oldest (Pri)", "Closed Last 7d"]
            .into_iter()
            .map(str::to_string),
    );

    OpenTasksReport {
        header: format!(
            "Open Tasks by {column} and Priority ({})",
            input.tz.date_label(input.now)
        ),
        headers,
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_792_324_800;
    const DAY: i64 = 86_400;

    fn task(id: i64, owner: Option<&str>, priority: i64, age_days: i64, projects: &[&str]) -> TaskSummary {
        TaskSummary {
            id,
            title: format!("Task {id}"),
            owner_phid: owner.map(str::to_string),
            priority,
            date_created: NOW - age_days * DAY,
            project_phids: projects.iter().map(|p| p.to_string()).collect(),
        }
    }

    fn names() -> HashMap<String, String> {
        [
            ("PHID-USER-b", "bob"),
            ("PHID-USER-a", "alice"),
            ("PHID-PROJ-x", "Web"),
            ("PHID-PROJ-y", "API"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    fn build(
        view: OpenTasksView,
        order: OpenTasksOrder,
        open: &[TaskSummary],
        closed: &[TaskSummary],
    ) -> OpenTasksReport {
        let names = names();
        build_open_tasks_report(OpenTasksInput {
            view,
            order,
            open,
            recently_closed: closed,
            names: &names,
            now: NOW,
            tz: ViewerTimezone::utc(),
        })
    }

    #[test]
    fn test_user_view_groups_by_owner_with_up_for_grabs() {
        let open = vec![
            task(1, Some("PHID-USER-b"), 100, 3, &[]),
            task(2, Some("PHID-USER-b"), 50, 10, &[]),
            task(3, Some("PHID-USER-a"), 25, 1, &[]),
            task(4, None, 0, 2, &[]),
        ];
        let r = build(OpenTasksView::User, OpenTasksOrder::Name, &open, &[]);

        assert_eq!(r.header, "Open Tasks by User and Priority (Oct 18 2026)");
        let names: Vec<_> = r.rows.iter().map(|row| row.name.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob", "(Up For Grabs)"]);

        let bob = &r.rows[1];
        assert_eq!(bob.priorities, vec!["1", "-", "-", "1", "-", "-"]);
        assert_eq!(bob.total, "2");
        assert_eq!(bob.oldest_all.as_ref().unwrap().task_id, 2);
        assert_eq!(bob.oldest_all.as_ref().unwrap().age, "10 d");
        assert_eq!(bob.href, "/tasks?owner=PHID-USER-b");

        let grabs = &r.rows[2];
        assert_eq!(grabs.phid, None);
        assert_eq!(grabs.href, format!("/tasks?owner={UP_FOR_GRABS_PHID}"));
        assert_eq!(grabs.total, "1");
    }

    #[test]
    fn test_oldest_normal_or_better_skips_low_priority() {
        let open = vec![
            task(1, Some("PHID-USER-a"), 0, 30, &[]),
            task(2, Some("PHID-USER-a"), 25, 20, &[]),
            task(3, Some("PHID-USER-a"), 80, 5, &[]),
        ];
        let r = build(OpenTasksView::User, OpenTasksOrder::Name, &open, &[]);
        let alice = &r.rows[0];
        assert_eq!(alice.oldest_all.as_ref().unwrap().task_id, 1);
        assert_eq!(alice.oldest_normal_or_better.as_ref().unwrap().task_id, 3);

        let low_only = vec![task(9, Some("PHID-USER-a"), 25, 1, &[])];
        let r = build(OpenTasksView::User, OpenTasksOrder::Name, &low_only, &[]);
        assert!(r.rows[0].oldest_normal_or_better.is_none());
        // Leftover row with no tasks at all.
        assert!(r.rows[1].oldest_all.is_none());
        assert_eq!(r.rows[1].total, "0");
    }

    #[test]
    fn test_project_view_counts_task_in_every_project() {
        let open = vec![
            task(1, None, 50, 1, &["PHID-PROJ-x", "PHID-PROJ-y"]),
            task(2, None, 50, 1, &["PHID-PROJ-x"]),
            task(3, None, 50, 1, &[]),
        ];
        let closed = vec![
            task(7, None, 50, 1, &["PHID-PROJ-x"]),
            task(8, None, 50, 1, &[]),
        ];
        let r = build(OpenTasksView::Project, OpenTasksOrder::Name, &open, &closed);

        let names: Vec<_> = r.rows.iter().map(|row| row.name.as_str()).collect();
        assert_eq!(names, vec!["API", "Web", "(No Project)"]);
        let totals: Vec<_> = r.rows.iter().map(|row| row.total.as_str()).collect();
        assert_eq!(totals, vec!["1", "2", "1"]);

        let web = &r.rows[1];
        assert_eq!(web.closed_recently.count, "1");
        assert_eq!(web.closed_recently.task_ids, vec![7]);
        assert_eq!(web.closed_recently.href.as_deref(), Some("/tasks?ids=7"));
        assert_eq!(r.rows[0].closed_recently.count, "-");
        assert_eq!(r.rows[2].closed_recently.task_ids, vec![8]);
        assert_eq!(r.headers[0], "Project");
        assert_eq!(r.headers.len(), 1 + 6 + 4);
    }

    #[test]
    fn test_closed_groups_without_open_tasks_are_not_rows() {
        let open = vec![task(1, Some("PHID-USER-a"), 50, 1, &[])];
        let closed = vec![task(2, Some("PHID-USER-b"), 50, 1, &[])];
        let r = build(OpenTasksView::User, OpenTasksOrder::Name, &open, &closed);
        assert_eq!(r.rows.len(), 2);
        assert!(r.rows.iter().all(|row| row.name != "bob"));
    }

    #[test]
    fn test_total_order_is_ascending_and_stable() {
        let open = vec![
            task(1, Some("PHID-USER-a"), 50, 1, &[]),
            task(2, Some("PHID-USER-a"), 50, 1, &[]),
            task(3, Some("PHID-USER-b"), 50, 1, &[]),
            task(4, Some("PHID-USER-c"), 50, 1, &[]),
        ];
        let r = build(OpenTasksView::User, OpenTasksOrder::Total, &open, &[]);
        let names: Vec<_> = r.rows.iter().map(|row| row.name.as_str()).collect();
        // Unknown PHIDs fall back to the PHID itself as their name, which
        // sorts before lowercase names.
        assert_eq!(names, vec!["(Up For Grabs)", "PHID-USER-c", "bob", "alice"]);
    }
}
