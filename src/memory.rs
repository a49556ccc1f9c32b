//! In-memory `UserRepo` + `TodoRepo` used by unit and HTTP tests.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::{repo::UserRepo, repo_types::User},
    lists::{
        repo::{rebase_embedded, TodoRepo},
        repo_types::{timestamp, List, Task},
    },
};

#[derive(Default)]
struct Tables {
    users: HashMap<String, User>,
    lists: Vec<List>,
    tasks: HashMap<Uuid, (Uuid, Task)>, // task id -> (list id, standalone copy)
}

#[derive(Default)]
pub struct MemoryRepo {
    tables: Mutex<Tables>,
    fail_writes: AtomicBool,
}

impl MemoryRepo {
    /// Makes `save_list` and `delete_list` fail without touching anything.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// A standalone task with no embedded copy, i.e. diverged storage.
    pub fn insert_standalone_task(&self, list_id: Uuid, title: &str) -> Uuid {
        let now = timestamp();
        let task = Task {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            title: title.into(),
            description: String::new(),
            status: 0,
        };
        let id = task.id;
        self.tables.lock().unwrap().tasks.insert(id, (list_id, task));
        id
    }

    pub fn standalone_task_count(&self) -> usize {
        self.tables.lock().unwrap().tasks.len()
    }

    fn check_writable(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.fail_writes.load(Ordering::SeqCst), "store unavailable");
        Ok(())
    }
}

#[async_trait]
impl UserRepo for MemoryRepo {
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
    ) -> anyhow::Result<Option<User>> {
        let mut tables = self.tables.lock().unwrap();
        if tables.users.contains_key(username) {
            return Ok(None);
        }
        let user = User {
            id: Uuid::new_v4(),
            username: username.into(),
            password_hash: password_hash.into(),
            created_at: OffsetDateTime::now_utc(),
        };
        tables.users.insert(username.into(), user.clone());
        Ok(Some(user))
    }

    async fn find_user(&self, username: &str) -> anyhow::Result<Option<User>> {
        Ok(self.tables.lock().unwrap().users.get(username).cloned())
    }
}

#[async_trait]
impl TodoRepo for MemoryRepo {
    async fn lists_by_owner(&self, username: &str) -> anyhow::Result<Vec<List>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .lists
            .iter()
            .filter(|l| l.username == username)
            .cloned()
            .collect())
    }

    async fn find_list(&self, list_id: Uuid) -> anyhow::Result<Option<List>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.lists.iter().find(|l| l.id == list_id).cloned())
    }

    async fn insert_list(&self, list: &List) -> anyhow::Result<()> {
        self.tables.lock().unwrap().lists.push(list.clone());
        Ok(())
    }

    async fn save_list(
        &self,
        list: &List,
        upsert: &[Task],
        remove: &[Uuid],
    ) -> anyhow::Result<()> {
        self.check_writable()?;
        let mut tables = self.tables.lock().unwrap();
        let slot = tables
            .lists
            .iter()
            .position(|l| l.id == list.id)
            .ok_or_else(|| anyhow::anyhow!("list {} no longer exists", list.id))?;
        for task in upsert {
            if let Some((owner, _)) = tables.tasks.get(&task.id) {
                anyhow::ensure!(*owner == list.id, "task {} belongs to another list", task.id);
            }
        }

        let mut saved = list.clone();
        saved.tasks = rebase_embedded(list, &tables.lists[slot].tasks, upsert, remove);

        for task in upsert {
            tables.tasks.insert(task.id, (list.id, task.clone()));
        }
        tables
            .tasks
            .retain(|id, (owner, _)| !(*owner == list.id && remove.contains(id)));
        tables.lists[slot] = saved;
        Ok(())
    }

    async fn delete_list(&self, list: &List) -> anyhow::Result<()> {
        self.check_writable()?;
        let mut tables = self.tables.lock().unwrap();
        let before = tables.lists.len();
        tables.lists.retain(|l| l.id != list.id);
        anyhow::ensure!(tables.lists.len() < before, "list {} no longer exists", list.id);
        tables
            .tasks
            .retain(|id, (owner, _)| *owner != list.id && !list.tasks.iter().any(|t| t.id == *id));
        Ok(())
    }

    async fn find_task(&self, list_id: Uuid, task_id: Uuid) -> anyhow::Result<Option<Task>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .tasks
            .get(&task_id)
            .filter(|(owner, _)| *owner == list_id)
            .map(|(_, task)| task.clone()))
    }
}
