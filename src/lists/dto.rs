use serde::Deserialize;
use uuid::Uuid;

/// Body of `POST /lists` and `PUT /lists/{id}`. Any owner field sent by the
/// client is ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListInput {
    pub title: String,
    /// `None` leaves the list's tasks untouched on update.
    pub tasks: Option<Vec<TaskInput>>,
}

/// Body of `POST`/`PUT` on tasks, and one entry of `ListInput::tasks`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TaskInput {
    /// Only meaningful inside `ListInput::tasks`, where it names an existing task.
    pub id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub status: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_fields_take_zero_values() {
        let input: TaskInput = serde_json::from_str(r#"{"title":"Milk"}"#).unwrap();
        assert_eq!(input.title, "Milk");
        assert_eq!(input.description, "");
        assert_eq!(input.status, 0);
        assert!(input.id.is_none());
    }

    #[test]
    fn omitted_tasks_differ_from_empty_tasks() {
        let omitted: ListInput = serde_json::from_str(r#"{"title":"a"}"#).unwrap();
        assert!(omitted.tasks.is_none());

        let emptied: ListInput = serde_json::from_str(r#"{"title":"a","tasks":[]}"#).unwrap();
        assert_eq!(emptied.tasks.map(|t| t.len()), Some(0));
    }

    #[test]
    fn client_owner_field_is_ignored() {
        let input: ListInput =
            serde_json::from_str(r#"{"title":"a","username":"mallory"}"#).unwrap();
        assert_eq!(input.title, "a");
    }
}
