use std::path::Path;

use tasksync_core::models::{TaskPatch, TaskStatus};
use tasksync_core::store::TaskStore;
use tasksync_core::util::{format_millis, normalize_text_option};
use tasksync_core::Task;

use crate::commands::common::{
    format_task_lines, load_task, normalize_title, open_database, task_to_list_item, TaskListItem,
};
use crate::error::CliError;

pub async fn run_task_add(
    title_parts: &[String],
    workspace: &str,
    content: Option<String>,
    db_path: &Path,
) -> Result<(), CliError> {
    let title = normalize_title(title_parts)?;
    let db = open_database(db_path).await?;

    let mut task = Task::new(workspace, title);
    task.content = normalize_text_option(content);
    let task = db.insert_task(&task).await?;

    println!("{}", task.id);
    Ok(())
}

pub async fn run_task_list(
    workspace: &str,
    include_archived: bool,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let tasks = db.list_tasks(workspace, include_archived).await?;

    if as_json {
        let json_items = tasks
            .iter()
            .map(task_to_list_item)
            .collect::<Vec<TaskListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else {
        for line in format_task_lines(&tasks) {
            println!("{line}");
        }
    }

    Ok(())
}

pub async fn run_task_show(id: &str, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let task = load_task(&db, id).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&task)?);
        return Ok(());
    }

    println!("{}", task.title);
    println!("id:        {}", task.id);
    println!("workspace: {}", task.workspace_id);
    println!("status:    {}", task.status);
    if let Some(priority) = task.priority {
        println!("priority:  {priority}");
    }
    if task.due_date.is_some() {
        println!("due:       {}", format_millis(task.due_date));
    }
    if task.archived {
        println!("archived:  yes");
    }
    println!("updated:   {}", format_millis(Some(task.updated_at)));
    if let Some(content) = &task.content {
        println!();
        println!("{content}");
    }
    Ok(())
}

/// Field changes requested on the command line
#[derive(Debug, Default)]
pub struct TaskEdit {
    pub title: Option<String>,
    pub content: Option<String>,
    pub status: Option<String>,
    pub archive: bool,
    pub unarchive: bool,
}

impl TaskEdit {
    pub fn into_patch(self) -> Result<TaskPatch, CliError> {
        let title = match self.title {
            Some(title) => Some(normalize_text_option(Some(title)).ok_or(CliError::EmptyTitle)?),
            None => None,
        };
        let status = self
            .status
            .map(|status| status.parse::<TaskStatus>())
            .transpose()?;
        let archived = if self.archive {
            Some(true)
        } else if self.unarchive {
            Some(false)
        } else {
            None
        };

        let patch = TaskPatch {
            title,
            content: self.content.map(|content| normalize_text_option(Some(content))),
            status,
            archived,
            ..TaskPatch::default()
        };
        if patch.is_empty() {
            return Err(CliError::EmptyEdit);
        }
        Ok(patch)
    }
}

pub async fn run_task_edit(id: &str, edit: TaskEdit, db_path: &Path) -> Result<(), CliError> {
    let patch = edit.into_patch()?;
    let db = open_database(db_path).await?;
    let task = load_task(&db, id).await?;

    let updated = db.update_task(&task.id, &patch).await?;
    println!("{}", updated.id);
    Ok(())
}
