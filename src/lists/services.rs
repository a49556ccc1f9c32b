//! Ownership-gated list and task operations.
//!
//! Every operation on an existing list starts with [`owned_list`]; a task is
//! reachable only through a list its caller owns.

use std::collections::HashSet;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    lists::{
        dto::{ListInput, TaskInput},
        repo::TodoRepo,
        repo_types::{timestamp, List, Task},
    },
};

const TASK_MISMATCH: &str = "specified task not found";

/// The list if `username` owns it. A foreign list is `Forbidden`, a missing one
/// `NotFound`; nothing else about the list is revealed.
pub async fn owned_list(repo: &dyn TodoRepo, list_id: Uuid, username: &str) -> AppResult<List> {
    let list = repo
        .find_list(list_id)
        .await?
        .ok_or(AppError::NotFound("list"))?;
    if list.username != username {
        warn!(%list_id, %username, "list belongs to another user");
        return Err(AppError::Forbidden);
    }
    Ok(list)
}

pub async fn lists_for(repo: &dyn TodoRepo, username: &str) -> AppResult<Vec<List>> {
    Ok(repo.lists_by_owner(username).await?)
}

/// New empty list owned by `username`; tasks in the input are ignored.
pub async fn create_list(repo: &dyn TodoRepo, username: &str, input: ListInput) -> AppResult<List> {
    let now = timestamp();
    let list = List {
        id: Uuid::new_v4(),
        created_at: now,
        updated_at: now,
        username: username.to_string(),
        title: input.title,
        tasks: Vec::new(),
    };
    repo.insert_list(&list).await?;
    info!(list_id = %list.id, %username, "list created");
    Ok(list)
}

/// Replaces the title, and the task collection only when one is supplied.
///
/// A supplied collection must name tasks already in the list; their fields are
/// written to both copies and tasks left out are deleted.
pub async fn update_list(
    repo: &dyn TodoRepo,
    list_id: Uuid,
    username: &str,
    input: ListInput,
) -> AppResult<List> {
    let mut list = owned_list(repo, list_id, username).await?;
    let now = timestamp();
    list.title = input.title;
    list.updated_at = now;

    let (upsert, remove) = match input.tasks {
        None => (Vec::new(), Vec::new()),
        Some(entries) => {
            let mut seen = HashSet::with_capacity(entries.len());
            let mut tasks = Vec::with_capacity(entries.len());
            for entry in entries {
                let current = entry
                    .id
                    .filter(|id| seen.insert(*id))
                    .and_then(|id| list.tasks.iter().find(|t| t.id == id))
                    .ok_or(AppError::Conflict(TASK_MISMATCH))?;
                tasks.push(Task {
                    id: current.id,
                    created_at: current.created_at,
                    updated_at: now,
                    title: entry.title,
                    description: entry.description,
                    status: entry.status,
                });
            }
            let remove: Vec<Uuid> = list
                .tasks
                .iter()
                .map(|t| t.id)
                .filter(|id| !seen.contains(id))
                .collect();
            list.tasks = tasks;
            (list.tasks.clone(), remove)
        }
    };

    save(repo, &list, &upsert, &remove).await?;
    info!(%list_id, %username, removed = remove.len(), "list updated");
    Ok(list)
}

/// Deletes the list and all of its tasks.
pub async fn delete_list(repo: &dyn TodoRepo, list_id: Uuid, username: &str) -> AppResult<()> {
    let list = owned_list(repo, list_id, username).await?;
    repo.delete_list(&list).await.map_err(|e| {
        error!(error = %e, %list_id, "list deletion failed, nothing was removed");
        AppError::Storage(e)
    })?;
    info!(%list_id, %username, tasks = list.tasks.len(), "list deleted");
    Ok(())
}

/// The list's embedded task collection.
pub async fn list_tasks(repo: &dyn TodoRepo, list_id: Uuid, username: &str) -> AppResult<Vec<Task>> {
    Ok(owned_list(repo, list_id, username).await?.tasks)
}

pub async fn get_task(
    repo: &dyn TodoRepo,
    list_id: Uuid,
    task_id: Uuid,
    username: &str,
) -> AppResult<Task> {
    owned_list(repo, list_id, username).await?;
    repo.find_task(list_id, task_id)
        .await?
        .ok_or(AppError::NotFound("task"))
}

pub async fn create_task(
    repo: &dyn TodoRepo,
    list_id: Uuid,
    username: &str,
    input: TaskInput,
) -> AppResult<Task> {
    let mut list = owned_list(repo, list_id, username).await?;
    let now = timestamp();
    let task = Task {
        id: Uuid::new_v4(),
        created_at: now,
        updated_at: now,
        title: input.title,
        description: input.description,
        status: input.status,
    };
    list.tasks.push(task.clone());
    list.updated_at = now;

    save(repo, &list, std::slice::from_ref(&task), &[]).await?;
    info!(%list_id, task_id = %task.id, "task created");
    Ok(task)
}

/// Updates title, description and status of a task in both of its copies.
pub async fn update_task(
    repo: &dyn TodoRepo,
    list_id: Uuid,
    task_id: Uuid,
    username: &str,
    input: TaskInput,
) -> AppResult<Task> {
    let mut list = owned_list(repo, list_id, username).await?;
    let stored = repo
        .find_task(list_id, task_id)
        .await?
        .ok_or(AppError::NotFound("task"))?;
    let slot = embedded_position(&list, task_id)?;

    let now = timestamp();
    let task = Task {
        id: stored.id,
        created_at: stored.created_at,
        updated_at: now,
        title: input.title,
        description: input.description,
        status: input.status,
    };
    list.tasks[slot] = task.clone();
    list.updated_at = now;

    save(repo, &list, std::slice::from_ref(&task), &[]).await?;
    debug!(%list_id, %task_id, status = task.status, "task updated");
    Ok(task)
}

pub async fn delete_task(
    repo: &dyn TodoRepo,
    list_id: Uuid,
    task_id: Uuid,
    username: &str,
) -> AppResult<()> {
    let mut list = owned_list(repo, list_id, username).await?;
    repo.find_task(list_id, task_id)
        .await?
        .ok_or(AppError::NotFound("task"))?;
    let slot = embedded_position(&list, task_id)?;

    list.tasks.remove(slot);
    list.updated_at = timestamp();

    save(repo, &list, &[], &[task_id]).await?;
    info!(%list_id, %task_id, "task deleted");
    Ok(())
}

/// Index of the embedded copy of `task_id`. A standalone task missing from its
/// list means the two copies diverged; that is never treated as success.
fn embedded_position(list: &List, task_id: Uuid) -> AppResult<usize> {
    list.tasks.iter().position(|t| t.id == task_id).ok_or_else(|| {
        warn!(list_id = %list.id, %task_id, "task missing from its list's embedded collection");
        AppError::Conflict(TASK_MISMATCH)
    })
}

async fn save(repo: &dyn TodoRepo, list: &List, upsert: &[Task], remove: &[Uuid]) -> AppResult<()> {
    repo.save_list(list, upsert, remove).await.map_err(|e| {
        error!(error = %e, list_id = %list.id, "list/task write failed and was rolled back");
        AppError::Storage(e)
    })
}
