//! SQL for tasks, projects and users. Every function takes a plain
//! connection so handlers can call it inside `interact`.

use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;

use crate::report::classify::RawStatusRow;
use crate::report::open_tasks::{OpenTasksView, TaskSummary};
use crate::report::status::TaskStatus;

pub const STATUS_TRANSACTION: &str = "status";

/// Status transaction values are stored JSON-encoded.
pub fn encode_status(status: TaskStatus) -> String {
    serde_json::Value::from(status.code()).to_string()
}

/// All status transactions, oldest first, optionally limited to tasks
/// tagged with `project_phid`.
pub fn load_status_transactions(
    conn: &Connection,
    project_phid: Option<&str>,
) -> rusqlite::Result<Vec<RawStatusRow>> {
    let map = |row: &rusqlite::Row<'_>| {
        Ok(RawStatusRow {
            old_value: row.get(0)?,
            new_value: row.get(1)?,
            created_at: row.get(2)?,
        })
    };

    match project_phid {
        Some(project) => {
            let mut stmt = conn.prepare(
                "SELECT x.old_value, x.new_value, x.date_created
                 FROM task_transactions x
                 JOIN tasks t ON t.id = x.task_id
                 JOIN task_projects p ON p.task_phid = t.phid
                 WHERE x.transaction_type = ?1 AND p.project_phid = ?2
                 ORDER BY x.date_created ASC, x.id ASC",
            )?;
            let rows = stmt
                .query_map(params![STATUS_TRANSACTION, project], map)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        }
        None => {
            let mut stmt = conn.prepare(
                "SELECT old_value, new_value, date_created
                 FROM task_transactions
                 WHERE transaction_type = ?1
                 ORDER BY date_created ASC, id ASC",
            )?;
            let rows = stmt
                .query_map(params![STATUS_TRANSACTION], map)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        }
    }
}

pub fn project_name(conn: &Connection, phid: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT name FROM projects WHERE phid = ?1",
        params![phid],
        |row| row.get(0),
    )
    .optional()
}

/// The stored timezone of a user, if the user exists and set one.
pub fn user_timezone(conn: &Connection, phid: &str) -> rusqlite::Result<Option<String>> {
    let tz: Option<Option<String>> = conn
        .query_row(
            "SELECT timezone FROM users WHERE phid = ?1",
            params![phid],
            |row| row.get(0),
        )
        .optional()?;
    Ok(tz.flatten())
}

/// PHID -> display name for the handles a view groups by.
pub fn handle_names(
    conn: &Connection,
    view: OpenTasksView,
) -> rusqlite::Result<HashMap<String, String>> {
    let sql = match view {
        OpenTasksView::User => "SELECT phid, username FROM users",
        OpenTasksView::Project => "SELECT phid, name FROM projects",
    };
    let mut stmt = conn.prepare(sql)?;
    let names = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<HashMap<_, _>, _>>()?;
    Ok(names)
}

fn attach_projects(conn: &Connection, tasks: &mut [TaskSummary]) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare(
        "SELECT p.project_phid FROM task_projects p
         JOIN tasks t ON t.phid = p.task_phid
         WHERE t.id = ?1 ORDER BY p.project_phid",
    )?;
    for task in tasks.iter_mut() {
        task.project_phids = stmt
            .query_map(params![task.id], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
    }
    Ok(())
}

fn map_summary(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskSummary> {
    Ok(TaskSummary {
        id: row.get(0)?,
        title: row.get(1)?,
        owner_phid: row.get(2)?,
        priority: row.get(3)?,
        date_created: row.get(4)?,
        project_phids: Vec::new(),
    })
}

pub fn load_open_tasks(conn: &Connection) -> rusqlite::Result<Vec<TaskSummary>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, owner_phid, priority, date_created
         FROM tasks WHERE status = ?1 ORDER BY id",
    )?;
    let mut tasks = stmt
        .query_map(params![TaskStatus::Open.code()], map_summary)?
        .collect::<Result<Vec<_>, _>>()?;
    attach_projects(conn, &mut tasks)?;
    Ok(tasks)
}

/// Tasks that are closed now, were closed from an open (or unset) status at
/// or after `since`, and were last modified at or after `since`.
pub fn load_recently_closed(conn: &Connection, since: i64) -> rusqlite::Result<Vec<TaskSummary>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT t.id, t.title, t.owner_phid, t.priority, t.date_created
         FROM tasks t
         JOIN task_transactions x ON x.task_id = t.id
         WHERE t.status != ?1
           AND t.date_modified >= ?2
           AND x.transaction_type = ?3
           AND x.date_created >= ?2
           AND (x.old_value IS NULL OR x.old_value IN ('null', '0', '\"0\"'))
           AND x.new_value NOT IN ('null', '0', '\"0\"')
         ORDER BY t.id",
    )?;
    let mut tasks = stmt
        .query_map(
            params![TaskStatus::Open.code(), since, STATUS_TRANSACTION],
            map_summary,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    attach_projects(conn, &mut tasks)?;
    Ok(tasks)
}

/// Owner and project PHIDs that have no matching row.
pub fn unknown_handles(
    conn: &Connection,
    owner_phid: Option<&str>,
    project_phids: &[String],
) -> rusqlite::Result<Vec<String>> {
    let mut unknown = Vec::new();
    if let Some(owner) = owner_phid {
        let found: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM users WHERE phid = ?1",
            params![owner],
            |row| row.get(0),
        )?;
        if !found {
            unknown.push(owner.to_string());
        }
    }
    for project in project_phids {
        if project_name(conn, project)?.is_none() {
            unknown.push(project.clone());
        }
    }
    Ok(unknown)
}

/// A new task row as written by the create endpoint.
pub struct NewTask<'a> {
    pub phid: &'a str,
    pub title: &'a str,
    pub owner_phid: Option<&'a str>,
    pub priority: i64,
    pub project_phids: &'a [String],
    pub created_at: i64,
}

/// Insert a task, its project tags and its initial `null -> open` status
/// transaction. Returns the new task id.
pub fn insert_task(conn: &mut Connection, task: &NewTask<'_>) -> rusqlite::Result<i64> {
    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO tasks (phid, title, owner_phid, status, priority, date_created, date_modified)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![
            task.phid,
            task.title,
            task.owner_phid,
            TaskStatus::Open.code(),
            task.priority,
            task.created_at,
        ],
    )?;
    let id = tx.last_insert_rowid();
    for project in task.project_phids {
        tx.execute(
            "INSERT OR IGNORE INTO task_projects (task_phid, project_phid) VALUES (?1, ?2)",
            params![task.phid, project],
        )?;
    }
    tx.execute(
        "INSERT INTO task_transactions (task_id, transaction_type, old_value, new_value, date_created)
         VALUES (?1, ?2, NULL, ?3, ?4)",
        params![
            id,
            STATUS_TRANSACTION,
            encode_status(TaskStatus::Open),
            task.created_at,
        ],
    )?;
    tx.commit()?;
    Ok(id)
}

/// Move a task to `status`, recording the transaction. Returns the previous
/// status, or `None` if the task does not exist. A change to the current
/// status writes nothing.
pub fn change_task_status(
    conn: &mut Connection,
    task_id: i64,
    status: TaskStatus,
    at: i64,
) -> rusqlite::Result<Option<i64>> {
    let tx = conn.transaction()?;
    let current: Option<i64> = tx
        .query_row(
            "SELECT status FROM tasks WHERE id = ?1",
            params![task_id],
            |row| row.get(0),
        )
        .optional()?;
    let Some(current) = current else {
        return Ok(None);
    };
    if current == status.code() {
        return Ok(Some(current));
    }

    tx.execute(
        "UPDATE tasks SET status = ?1, date_modified = ?2 WHERE id = ?3",
        params![status.code(), at, task_id],
    )?;
    tx.execute(
        "INSERT INTO task_transactions (task_id, transaction_type, old_value, new_value, date_created)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            task_id,
            STATUS_TRANSACTION,
            serde_json::Value::from(current).to_string(),
            encode_status(status),
            at,
        ],
    )?;
    tx.commit()?;
    Ok(Some(current))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::migrations::run_migrations;

    const T0: i64 = 1_792_324_800;
    const DAY: i64 = 86_400;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        run_migrations(&conn).unwrap();
        conn.execute(
            "INSERT INTO projects (phid, name, created_at) VALUES ('PHID-PROJ-web', 'Web', 0)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO users (phid, username, timezone, created_at)
             VALUES ('PHID-USER-alice', 'alice', '+09:00', 0),
                    ('PHID-USER-bob', 'bob', NULL, 0)",
            [],
        )
        .unwrap();
        conn
    }

    fn create(conn: &mut Connection, phid: &str, projects: &[String], at: i64) -> i64 {
        insert_task(
            conn,
            &NewTask {
                phid,
                title: phid,
                owner_phid: Some("PHID-USER-alice"),
                priority: 50,
                project_phids: projects,
                created_at: at,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_insert_task_writes_initial_transaction() {
        let mut conn = setup();
        create(&mut conn, "PHID-TASK-1", &[], T0);

        let rows = load_status_transactions(&conn, None).unwrap();
        assert_eq!(
            rows,
            vec![RawStatusRow {
                old_value: None,
                new_value: Some("0".to_string()),
                created_at: T0,
            }]
        );
    }

    #[test]
    fn test_change_status_records_old_and_new() {
        let mut conn = setup();
        let id = create(&mut conn, "PHID-TASK-1", &[], T0);

        let prev = change_task_status(&mut conn, id, TaskStatus::Resolved, T0 + 60).unwrap();
        assert_eq!(prev, Some(0));
        // Same status again is a no-op.
        change_task_status(&mut conn, id, TaskStatus::Resolved, T0 + 120).unwrap();
        assert_eq!(change_task_status(&mut conn, 999, TaskStatus::Open, T0).unwrap(), None);

        let rows = load_status_transactions(&conn, None).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].old_value.as_deref(), Some("0"));
        assert_eq!(rows[1].new_value.as_deref(), Some("1"));
        assert_eq!(rows[1].created_at, T0 + 60);
    }

    #[test]
    fn test_project_filter_limits_transactions() {
        let mut conn = setup();
        create(&mut conn, "PHID-TASK-1", &["PHID-PROJ-web".to_string()], T0);
        create(&mut conn, "PHID-TASK-2", &[], T0 + 1);

        assert_eq!(load_status_transactions(&conn, None).unwrap().len(), 2);
        assert_eq!(
            load_status_transactions(&conn, Some("PHID-PROJ-web")).unwrap().len(),
            1
        );
        assert!(load_status_transactions(&conn, Some("PHID-PROJ-none"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_open_and_recently_closed_tasks() {
        let mut conn = setup();
        let web = vec!["PHID-PROJ-web".to_string()];
        let a = create(&mut conn, "PHID-TASK-a", &web, T0 - 30 * DAY);
        let b = create(&mut conn, "PHID-TASK-b", &[], T0 - 30 * DAY);
        let c = create(&mut conn, "PHID-TASK-c", &[], T0 - 30 * DAY);

        // b closed long ago, c closed yesterday.
        change_task_status(&mut conn, b, TaskStatus::Resolved, T0 - 20 * DAY).unwrap();
        change_task_status(&mut conn, c, TaskStatus::Wontfix, T0 - DAY).unwrap();

        let open = load_open_tasks(&conn).unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, a);
        assert_eq!(open[0].project_phids, web);

        let closed = load_recently_closed(&conn, T0 - 7 * DAY).unwrap();
        assert_eq!(closed.iter().map(|t| t.id).collect::<Vec<_>>(), vec![c]);
    }

    #[test]
    fn test_reclosed_task_counted_once() {
        let mut conn = setup();
        let id = create(&mut conn, "PHID-TASK-1", &[], T0 - 3 * DAY);
        change_task_status(&mut conn, id, TaskStatus::Resolved, T0 - 2 * DAY).unwrap();
        change_task_status(&mut conn, id, TaskStatus::Open, T0 - 2 * DAY + 60).unwrap();
        change_task_status(&mut conn, id, TaskStatus::Invalid, T0 - DAY).unwrap();

        let closed = load_recently_closed(&conn, T0 - 7 * DAY).unwrap();
        assert_eq!(closed.len(), 1);
    }

    #[test]
    fn test_unknown_handles() {
        let conn = setup();
        let projects = vec!["PHID-PROJ-web".to_string(), "PHID-PROJ-gone".to_string()];
        assert_eq!(
            unknown_handles(&conn, Some("PHID-USER-zed"), &projects).unwrap(),
            vec!["PHID-USER-zed".to_string(), "PHID-PROJ-gone".to_string()]
        );
        assert!(unknown_handles(&conn, Some("PHID-USER-bob"), &projects[..1])
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_handles_and_timezones() {
        let conn = setup();
        assert_eq!(
            user_timezone(&conn, "PHID-USER-alice").unwrap().as_deref(),
            Some("+09:00")
        );
        assert_eq!(user_timezone(&conn, "PHID-USER-bob").unwrap(), None);
        assert_eq!(user_timezone(&conn, "PHID-USER-nobody").unwrap(), None);

        let users = handle_names(&conn, OpenTasksView::User).unwrap();
        assert_eq!(users.get("PHID-USER-bob").map(String::as_str), Some("bob"));
        assert_eq!(project_name(&conn, "PHID-PROJ-web").unwrap().as_deref(), Some("Web"));
    }
}
