use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{
        operator::Entity as OperatorEntity,
        task::{self, Entity as TaskEntity, Priority, TaskStatus},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{paginate, Page},
};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateTaskInput {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub description: Option<String>,
    #[validate(length(max = 100))]
    pub project: Option<String>,
    pub assigned_to: Option<Uuid>,
    #[schema(value_type = Option<String>, example = "high")]
    pub priority: Option<Priority>,
    #[schema(value_type = Option<String>, example = "todo")]
    pub status: Option<TaskStatus>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateTaskInput {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub description: Option<String>,
    #[validate(length(max = 100))]
    pub project: Option<String>,
    pub assigned_to: Option<Uuid>,
    #[schema(value_type = Option<String>)]
    pub priority: Option<Priority>,
    #[schema(value_type = Option<String>)]
    pub status: Option<TaskStatus>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateTaskStatusInput {
    #[schema(value_type = String, example = "done")]
    pub status: TaskStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskFilter {
    pub project: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub status: Option<TaskStatus>,
    /// Open tasks whose due date has passed
    #[serde(default)]
    pub overdue: bool,
}

/// `completed_at` after moving to `status`: stamped on entering `done`,
/// kept while staying there, cleared otherwise.
pub fn completion_time(
    status: TaskStatus,
    current: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match status {
        TaskStatus::Done => Some(current.unwrap_or(now)),
        _ => None,
    }
}

#[derive(Clone)]
pub struct TaskService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl TaskService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    async fn check_assignee(&self, assigned_to: Option<Uuid>) -> Result<(), ServiceError> {
        if let Some(operator_id) = assigned_to {
            OperatorEntity::find_by_id(operator_id)
                .one(self.db.as_ref())
                .await
                .map_err(ServiceError::db_error)?
                .ok_or_else(|| ServiceError::not_found("Operator", operator_id))?;
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list_tasks(
        &self,
        filter: TaskFilter,
        page: u64,
        per_page: u64,
    ) -> Result<Page<task::Model>, ServiceError> {
        let mut query = TaskEntity::find();
        if let Some(project) = filter.project.filter(|p| !p.trim().is_empty()) {
            query = query.filter(task::Column::Project.eq(project.trim()));
        }
        if let Some(operator) = filter.assigned_to {
            query = query.filter(task::Column::AssignedTo.eq(operator));
        }
        if let Some(status) = filter.status {
            query = query.filter(task::Column::Status.eq(status));
        }
        if filter.overdue {
            query = query
                .filter(task::Column::DueDate.lt(Utc::now().date_naive()))
                .filter(task::Column::Status.is_not_in([TaskStatus::Done, TaskStatus::Cancelled]));
        }
        paginate(
            query
                .order_by_asc(task::Column::DueDate)
                .order_by_desc(task::Column::CreatedAt),
            self.db.as_ref(),
            page,
            per_page,
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn get_task(&self, id: Uuid) -> Result<task::Model, ServiceError> {
        TaskEntity::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Task", id))
    }

    #[instrument(skip(self, input))]
    pub async fn create_task(&self, input: CreateTaskInput) -> Result<task::Model, ServiceError> {
        input.validate()?;
        self.check_assignee(input.assigned_to).await?;

        let now = Utc::now();
        let status = input.status.unwrap_or_default();
        let task = task::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(input.title.trim().to_string()),
            description: Set(input.description),
            project: Set(input.project.map(|p| p.trim().to_string())),
            assigned_to: Set(input.assigned_to),
            priority: Set(input.priority.unwrap_or_default()),
            status: Set(status),
            due_date: Set(input.due_date),
            completed_at: Set(completion_time(status, None, now)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db.as_ref())
        .await
        .map_err(ServiceError::db_error)?;

        info!(task_id = %task.id, "Task created");
        Ok(task)
    }

    #[instrument(skip(self, input))]
    pub async fn update_task(&self, id: Uuid, input: UpdateTaskInput) -> Result<task::Model, ServiceError> {
        input.validate()?;
        self.check_assignee(input.assigned_to).await?;
        let existing = self.get_task(id).await?;
        let was_open = existing.status.is_open();
        let completed_at = existing.completed_at;

        let mut active: task::ActiveModel = existing.into();
        if let Some(title) = input.title {
            active.title = Set(title.trim().to_string());
        }
        if input.description.is_some() {
            active.description = Set(input.description);
        }
        if let Some(project) = input.project {
            active.project = Set(Some(project.trim().to_string()).filter(|p| !p.is_empty()));
        }
        if input.assigned_to.is_some() {
            active.assigned_to = Set(input.assigned_to);
        }
        if let Some(priority) = input.priority {
            active.priority = Set(priority);
        }
        if input.due_date.is_some() {
            active.due_date = Set(input.due_date);
        }
        let now = Utc::now();
        if let Some(status) = input.status {
            active.status = Set(status);
            active.completed_at = Set(completion_time(status, completed_at, now));
        }
        active.updated_at = Set(now);

        let task = active
            .update(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?;
        self.announce_completion(&task, was_open).await;
        Ok(task)
    }

    #[instrument(skip(self))]
    pub async fn update_status(&self, id: Uuid, status: TaskStatus) -> Result<task::Model, ServiceError> {
        self.update_task(
            id,
            UpdateTaskInput {
                status: Some(status),
                ..Default::default()
            },
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn delete_task(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = TaskEntity::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?;
        if result.rows_affected == 0 {
            return Err(ServiceError::not_found("Task", id));
        }
        info!(task_id = %id, "Task deleted");
        Ok(())
    }

    async fn announce_completion(&self, task: &task::Model, was_open: bool) {
        if let (true, TaskStatus::Done, Some(completed_at)) = (was_open, task.status, task.completed_at) {
            info!(task_id = %task.id, "Task completed");
            self.event_sender
                .send_or_log(Event::TaskCompleted {
                    task_id: task.id,
                    completed_at,
                })
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn done_stamps_completion_once() {
        let now = Utc::now();
        let earlier = now - Duration::hours(3);
        assert_eq!(completion_time(TaskStatus::Done, None, now), Some(now));
        assert_eq!(completion_time(TaskStatus::Done, Some(earlier), now), Some(earlier));
    }

    #[test]
    fn leaving_done_clears_completion() {
        let now = Utc::now();
        assert_eq!(completion_time(TaskStatus::InProgress, Some(now), now), None);
        assert_eq!(completion_time(TaskStatus::Cancelled, None, now), None);
    }
}
