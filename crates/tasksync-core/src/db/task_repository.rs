//! Task repository implementation

use crate::error::{Error, Result};
use crate::models::{Task, TaskId, TaskPatch};
use libsql::{params, Connection, Row};

use super::values::{flag, integer_or_null, parse_column, text_or_null};

const TASK_COLUMNS: &str = "id, workspace_id, title, content, status, priority, due_date, archived, created_at, updated_at";

/// libSQL storage for internal tasks
pub struct LibSqlTaskRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlTaskRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a task as-is
    pub async fn create(&self, task: &Task) -> Result<Task> {
        if self.get(&task.id).await?.is_some() {
            return Err(Error::AlreadyExists(format!("task {}", task.id)));
        }
        self.conn
            .execute(
                &format!("INSERT INTO tasks ({TASK_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"),
                params![
                    task.id.as_str(),
                    task.workspace_id.as_str(),
                    task.title.as_str(),
                    text_or_null(task.content.as_deref()),
                    task.status.as_str(),
                    text_or_null(task.priority.map(|priority| priority.as_str())),
                    integer_or_null(task.due_date),
                    flag(task.archived),
                    task.created_at,
                    task.updated_at,
                ],
            )
            .await?;
        Ok(task.clone())
    }

    pub async fn get(&self, id: &TaskId) -> Result<Option<Task>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?"),
                [id.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_task(&row)?)),
            None => Ok(None),
        }
    }

    /// Tasks of a workspace, oldest first
    pub async fn list_by_workspace(
        &self,
        workspace_id: &str,
        include_archived: bool,
    ) -> Result<Vec<Task>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {TASK_COLUMNS} FROM tasks
                     WHERE workspace_id = ? AND (archived = 0 OR ?)
                     ORDER BY created_at ASC, id ASC"
                ),
                params![workspace_id, flag(include_archived)],
            )
            .await?;

        let mut tasks = Vec::new();
        while let Some(row) = rows.next().await? {
            tasks.push(Self::parse_task(&row)?);
        }
        Ok(tasks)
    }

    /// Apply a partial update, stamping `updated_at` with `now` when anything changed
    pub async fn update(&self, id: &TaskId, patch: &TaskPatch, now: i64) -> Result<Task> {
        let mut task = self
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("task {id}")))?;
        if !task.apply(patch, now) {
            return Ok(task);
        }

        self.conn
            .execute(
                "UPDATE tasks
                 SET title = ?, content = ?, status = ?, priority = ?, due_date = ?,
                     archived = ?, updated_at = ?
                 WHERE id = ?",
                params![
                    task.title.as_str(),
                    text_or_null(task.content.as_deref()),
                    task.status.as_str(),
                    text_or_null(task.priority.map(|priority| priority.as_str())),
                    integer_or_null(task.due_date),
                    flag(task.archived),
                    task.updated_at,
                    id.as_str(),
                ],
            )
            .await?;
        Ok(task)
    }

    fn parse_task(row: &Row) -> Result<Task> {
        let id: String = row.get(0)?;
        let status: String = row.get(4)?;
        let priority: Option<String> = row.get(5)?;

        Ok(Task {
            id: parse_column(&id, "task id")?,
            workspace_id: row.get(1)?,
            title: row.get(2)?,
            content: row.get(3)?,
            status: parse_column(&status, "status")?,
            priority: priority
                .map(|raw| parse_column(&raw, "priority"))
                .transpose()?,
            due_date: row.get(6)?,
            archived: row.get::<i64>(7)? != 0,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }
}
