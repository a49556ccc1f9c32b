use anyhow::Context;
use async_trait::async_trait;
use sqlx::types::Json;
use tracing::warn;
use uuid::Uuid;

use crate::{
    db::PgRepo,
    lists::repo_types::{List, ListRow, Task},
};

/// List/task persistence. Ownership is not checked here; callers go through
/// `lists::services`, which does.
///
/// Tasks live twice: as standalone records and as copies embedded in their
/// list. Every write that touches tasks goes through `save_list` or
/// `delete_list`, which change both copies in one transaction.
#[async_trait]
pub trait TodoRepo: Send + Sync {
    async fn lists_by_owner(&self, username: &str) -> anyhow::Result<Vec<List>>;

    async fn find_list(&self, list_id: Uuid) -> anyhow::Result<Option<List>>;

    async fn insert_list(&self, list: &List) -> anyhow::Result<()>;

    /// Writes `list` (title, embedded tasks, `updated_at`), inserts or updates
    /// the standalone copies in `upsert` and deletes the standalone tasks in
    /// `remove`, atomically.
    ///
    /// `list` may be stale. Its embedded tasks are rebased onto the stored
    /// collection under a row lock (see [`rebase_embedded`]), so a concurrent
    /// write to the same list is merged rather than overwritten. The title is
    /// last write wins.
    async fn save_list(&self, list: &List, upsert: &[Task], remove: &[Uuid])
        -> anyhow::Result<()>;

    /// Deletes the list and every task it references, atomically.
    async fn delete_list(&self, list: &List) -> anyhow::Result<()>;

    /// Standalone copy of a task, only if it belongs to `list_id`.
    async fn find_task(&self, list_id: Uuid, task_id: Uuid) -> anyhow::Result<Option<Task>>;
}

/// The embedded collection to store when `list` was read before `stored`.
///
/// Tasks keep the order `list` gives them. Those in `upsert` take the written
/// version and the rest take the stored one. A task missing from `stored`
/// that is not being upserted was deleted concurrently and stays deleted.
/// Stored tasks `list` does not know about were created concurrently and are
/// appended unless named in `remove`.
pub(crate) fn rebase_embedded(
    list: &List,
    stored: &[Task],
    upsert: &[Task],
    remove: &[Uuid],
) -> Vec<Task> {
    fn find(tasks: &[Task], id: Uuid) -> Option<&Task> {
        tasks.iter().find(|t| t.id == id)
    }

    let mut tasks = Vec::with_capacity(list.tasks.len());
    let (mut gone, mut refreshed) = (0, 0);
    for task in list.tasks.iter().filter(|t| !remove.contains(&t.id)) {
        match (find(upsert, task.id), find(stored, task.id)) {
            (Some(written), _) => tasks.push(written.clone()),
            (None, Some(current)) => {
                if current != task {
                    refreshed += 1;
                }
                tasks.push(current.clone());
            }
            (None, None) => gone += 1,
        }
    }

    let known = tasks.len();
    tasks.extend(
        stored
            .iter()
            .filter(|t| !remove.contains(&t.id) && find(&list.tasks, t.id).is_none())
            .cloned(),
    );
    let added = tasks.len() - known;

    if added + gone + refreshed > 0 {
        warn!(
            list_id = %list.id,
            added,
            gone,
            refreshed,
            "list changed since it was read; merged with the stored tasks"
        );
    }
    tasks
}

#[async_trait]
impl TodoRepo for PgRepo {
    async fn lists_by_owner(&self, username: &str) -> anyhow::Result<Vec<List>> {
        let rows = sqlx::query_as::<_, ListRow>(
            r#"
            SELECT id, username, title, tasks, created_at, updated_at
            FROM lists
            WHERE username = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(username)
        .fetch_all(self.pool())
        .await
        .context("select lists by owner")?;
        Ok(rows.into_iter().map(List::from).collect())
    }

    async fn find_list(&self, list_id: Uuid) -> anyhow::Result<Option<List>> {
        let row = sqlx::query_as::<_, ListRow>(
            r#"
            SELECT id, username, title, tasks, created_at, updated_at
            FROM lists
            WHERE id = $1
            "#,
        )
        .bind(list_id)
        .fetch_optional(self.pool())
        .await
        .context("select list")?;
        Ok(row.map(List::from))
    }

    async fn insert_list(&self, list: &List) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO lists (id, username, title, tasks, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(list.id)
        .bind(&list.username)
        .bind(&list.title)
        .bind(Json(&list.tasks))
        .bind(list.created_at)
        .bind(list.updated_at)
        .execute(self.pool())
        .await
        .context("insert list")?;
        Ok(())
    }

    async fn save_list(
        &self,
        list: &List,
        upsert: &[Task],
        remove: &[Uuid],
    ) -> anyhow::Result<()> {
        let mut tx = self.pool().begin().await.context("begin tx")?;

        let stored = sqlx::query_scalar::<_, Json<Vec<Task>>>(
            r#"SELECT tasks FROM lists WHERE id = $1 FOR UPDATE"#,
        )
        .bind(list.id)
        .fetch_optional(&mut *tx)
        .await
        .context("lock list")?
        .with_context(|| format!("list {} no longer exists", list.id))?;
        let tasks = rebase_embedded(list, &stored.0, upsert, remove);

        for task in upsert {
            let res = sqlx::query(
                r#"
                INSERT INTO tasks (id, list_id, title, description, status, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (id) DO UPDATE
                   SET title = EXCLUDED.title,
                       description = EXCLUDED.description,
                       status = EXCLUDED.status,
                       updated_at = EXCLUDED.updated_at
                 WHERE tasks.list_id = EXCLUDED.list_id
                "#,
            )
            .bind(task.id)
            .bind(list.id)
            .bind(&task.title)
            .bind(&task.description)
            .bind(task.status)
            .bind(task.created_at)
            .bind(task.updated_at)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("upsert task {}", task.id))?;
            anyhow::ensure!(
                res.rows_affected() == 1,
                "task {} belongs to another list",
                task.id
            );
        }

        if !remove.is_empty() {
            sqlx::query(r#"DELETE FROM tasks WHERE list_id = $1 AND id = ANY($2)"#)
                .bind(list.id)
                .bind(remove)
                .execute(&mut *tx)
                .await
                .context("delete tasks")?;
        }

        let res = sqlx::query(
            r#"
            UPDATE lists
               SET title = $2, tasks = $3, updated_at = $4
             WHERE id = $1
            "#,
        )
        .bind(list.id)
        .bind(&list.title)
        .bind(Json(&tasks))
        .bind(list.updated_at)
        .execute(&mut *tx)
        .await
        .context("update list")?;
        anyhow::ensure!(res.rows_affected() == 1, "list {} no longer exists", list.id);

        tx.commit().await.context("commit tx")?;
        Ok(())
    }

    async fn delete_list(&self, list: &List) -> anyhow::Result<()> {
        let embedded: Vec<Uuid> = list.tasks.iter().map(|t| t.id).collect();
        let mut tx = self.pool().begin().await.context("begin tx")?;

        sqlx::query(r#"DELETE FROM tasks WHERE list_id = $1 OR id = ANY($2)"#)
            .bind(list.id)
            .bind(&embedded)
            .execute(&mut *tx)
            .await
            .context("delete list tasks")?;

        let res = sqlx::query(r#"DELETE FROM lists WHERE id = $1"#)
            .bind(list.id)
            .execute(&mut *tx)
            .await
            .context("delete list")?;
        anyhow::ensure!(res.rows_affected() == 1, "list {} no longer exists", list.id);

        tx.commit().await.context("commit tx")?;
        Ok(())
    }

    async fn find_task(&self, list_id: Uuid, task_id: Uuid) -> anyhow::Result<Option<Task>> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            SELECT id, created_at, updated_at, title, description, status
            FROM tasks
            WHERE id = $1 AND list_id = $2
            "#,
        )
        .bind(task_id)
        .bind(list_id)
        .fetch_optional(self.pool())
        .await
        .context("select task")?;
        Ok(task)
    }
}
