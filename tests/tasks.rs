mod common;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use uuid::Uuid;

use common::{date_in, due_in, Harness};
use taskforge::auth::Caller;
use taskforge::models::{
    NewTask, Role, Task, TaskInput, TaskPatch, TaskQuery, TaskStatus, TaskUpdate,
};
use taskforge::repositories::{MemoryStore, TaskRepository};
use taskforge::{AppError, ErrorCode, ErrorKind, TaskService};

fn input(owner: i32, title: &str) -> TaskInput {
    TaskInput {
        user_id: Some(owner),
        title: Some(title.to_string()),
        ..TaskInput::default()
    }
}

fn dated(owner: i32, title: &str, days: i64) -> TaskInput {
    TaskInput {
        due_date: Some(due_in(days)),
        ..input(owner, title)
    }
}

fn raw_task(owner: i32, title: &str, days: i64) -> NewTask {
    NewTask {
        user_id: owner,
        title: title.to_string(),
        description: None,
        due_date: Some(date_in(days)),
        category_id: None,
        priority_id: None,
    }
}

fn titles(tasks: &[Task]) -> Vec<&str> {
    tasks.iter().map(|t| t.title.as_str()).collect()
}

fn owner() -> Caller {
    Caller::new(1, Role::User)
}

fn stranger() -> Caller {
    Caller::new(2, Role::User)
}

fn admin() -> Caller {
    Caller::new(99, Role::Admin)
}

#[actix_rt::test]
async fn test_create_round_trip() {
    let h = Harness::new();
    let mut data = dated(1, "Complete project report", 10);
    data.description = Some("Quarterly numbers".to_string());

    let created = h.tasks.create(&data).await.unwrap();
    let loaded = h.tasks.get_by_id(created.id).await.unwrap().unwrap();

    assert_eq!(loaded.title, "Complete project report");
    assert_eq!(loaded.description.as_deref(), Some("Quarterly numbers"));
    assert_eq!(loaded.due_date, Some(date_in(10)));
    assert_eq!(loaded.user_id, 1);
}

#[actix_rt::test]
async fn test_create_forces_pending() {
    let h = Harness::new();
    for status in ["completed", "cancelled", "in_progress", "bogus"] {
        let data = TaskInput {
            status: Some(status.to_string()),
            ..input(1, "Always pending")
        };
        let task = h.tasks.create(&data).await.unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
    }
}

#[actix_rt::test]
async fn test_create_due_date_floor_of_day() {
    let h = Harness::new();

    let err = h.tasks.create(&dated(1, "Yesterday", -1)).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidDueDate);

    let today = h.tasks.create(&dated(1, "Today", 0)).await.unwrap();
    assert_eq!(today.due_date, Some(date_in(0)));
}

#[actix_rt::test]
async fn test_create_validation_happens_before_storage() {
    let h = Harness::new();
    let err = h.tasks.create(&input(1, "   ")).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidTitle);

    let missing_owner = TaskInput {
        user_id: None,
        ..input(1, "Nobody's")
    };
    assert_eq!(
        h.tasks.create(&missing_owner).await.unwrap_err().code(),
        ErrorCode::UserIdRequired
    );

    assert!(h
        .tasks
        .list_for_user(1, &TaskQuery::default())
        .await
        .unwrap()
        .is_empty());
}

#[actix_rt::test]
async fn test_update_is_partial() {
    let h = Harness::new();
    let mut data = dated(1, "Original", 3);
    data.description = Some("Keep".to_string());
    data.category_id = Some(2);
    let task = h.tasks.create(&data).await.unwrap();

    let update = TaskUpdate {
        title: Some("Renamed".to_string()),
        ..TaskUpdate::default()
    };
    let updated = h.tasks.update(task.id, &update, &owner()).await.unwrap().unwrap();

    assert_eq!(updated.title, "Renamed");
    assert_eq!(updated.description.as_deref(), Some("Keep"));
    assert_eq!(updated.due_date, task.due_date);
    assert_eq!(updated.category_id, Some(2));
    assert_eq!(updated.status, TaskStatus::Pending);
    assert_eq!(updated.user_id, task.user_id);
    assert_eq!(updated.created_at, task.created_at);
}

#[actix_rt::test]
async fn test_update_rejects_empty_payload() {
    let h = Harness::new();
    let task = h.tasks.create(&input(1, "Untouched")).await.unwrap();

    let err = h
        .tasks
        .update(task.id, &TaskUpdate::default(), &owner())
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NoUpdateData);
}

#[actix_rt::test]
async fn test_update_due_date_rules() {
    let h = Harness::new();
    let task = h.tasks.create(&input(1, "Reschedule")).await.unwrap();

    let past = TaskUpdate {
        due_date: Some(due_in(-1)),
        ..TaskUpdate::default()
    };
    assert_eq!(
        h.tasks.update(task.id, &past, &owner()).await.unwrap_err().code(),
        ErrorCode::InvalidDueDate
    );

    let today = TaskUpdate {
        due_date: Some(due_in(0)),
        ..TaskUpdate::default()
    };
    let updated = h.tasks.update(task.id, &today, &owner()).await.unwrap().unwrap();
    assert_eq!(updated.due_date, Some(date_in(0)));
}

#[actix_rt::test]
async fn test_missing_task_is_a_sentinel_not_an_error() {
    let h = Harness::new();
    let id = Uuid::new_v4();
    let update = TaskUpdate {
        title: Some("x".to_string()),
        ..TaskUpdate::default()
    };

    assert!(h.tasks.get_by_id(id).await.unwrap().is_none());
    assert!(h.tasks.update(id, &update, &owner()).await.unwrap().is_none());
    assert!(!h.tasks.delete(id, &owner()).await.unwrap());
    assert!(h
        .tasks
        .change_status(id, "completed", &owner())
        .await
        .unwrap()
        .is_none());
}

#[actix_rt::test]
async fn test_non_owner_is_forbidden() {
    let h = Harness::new();
    let task = h.tasks.create(&input(1, "Private")).await.unwrap();
    let update = TaskUpdate {
        title: Some("Hijacked".to_string()),
        ..TaskUpdate::default()
    };

    let err = h.tasks.update(task.id, &update, &stranger()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    assert_eq!(err.code(), ErrorCode::Forbidden);

    let err = h.tasks.delete(task.id, &stranger()).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = h
        .tasks
        .change_status(task.id, "completed", &stranger())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let unchanged = h.tasks.get_by_id(task.id).await.unwrap().unwrap();
    assert_eq!(unchanged, task);
}

#[actix_rt::test]
async fn test_admin_may_modify_any_task() {
    let h = Harness::new();
    let task = h.tasks.create(&input(1, "Moderated")).await.unwrap();

    let updated = h
        .tasks
        .change_status(task.id, "cancelled", &admin())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.status, TaskStatus::Cancelled);
    assert_eq!(updated.user_id, 1);

    assert!(h.tasks.delete(task.id, &admin()).await.unwrap());
    assert!(h.tasks.get_by_id(task.id).await.unwrap().is_none());
}

#[actix_rt::test]
async fn test_status_transitions_are_unrestricted() {
    let h = Harness::new();
    let task = h.tasks.create(&input(1, "Wanderer")).await.unwrap();

    for status in ["completed", "pending", "cancelled", "in_progress", "completed"] {
        let updated = h
            .tasks
            .change_status(task.id, status, &owner())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status.as_str(), status);
    }

    let err = h
        .tasks
        .change_status(task.id, "archived", &owner())
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidStatus);
    let current = h.tasks.get_by_id(task.id).await.unwrap().unwrap();
    assert_eq!(current.status, TaskStatus::Completed);
}

#[actix_rt::test]
async fn test_list_orders_by_due_date_then_newest() {
    let h = Harness::new();
    h.tasks.create(&input(1, "undated-old")).await.unwrap();
    h.tasks.create(&dated(1, "in-5", 5)).await.unwrap();
    h.tasks.create(&dated(1, "in-1", 1)).await.unwrap();
    h.tasks.create(&input(1, "undated-new")).await.unwrap();
    h.tasks.create(&dated(2, "someone-else", 1)).await.unwrap();

    let tasks = h.tasks.list_for_user(1, &TaskQuery::default()).await.unwrap();

    assert_eq!(&titles(&tasks)[..2], &["in-1", "in-5"]);
    assert_eq!(tasks.len(), 4);
    assert!(tasks[2..].iter().all(|t| t.due_date.is_none()));
    assert!(tasks[2].created_at >= tasks[3].created_at);
}

#[actix_rt::test]
async fn test_list_filters() {
    let h = Harness::new();
    let work = TaskInput {
        category_id: Some(1),
        priority_id: Some(3),
        ..input(1, "Write report")
    };
    let home = TaskInput {
        category_id: Some(2),
        ..input(1, "Water plants")
    };
    let report = h.tasks.create(&work).await.unwrap();
    h.tasks.create(&home).await.unwrap();
    h.tasks.change_status(report.id, "in_progress", &owner()).await.unwrap();

    let by_category = TaskQuery {
        category_id: Some(1),
        ..TaskQuery::default()
    };
    let found = h.tasks.list_for_user(1, &by_category).await.unwrap();
    assert_eq!(titles(&found), ["Write report"]);

    let by_status = TaskQuery {
        status: Some(TaskStatus::Pending),
        ..TaskQuery::default()
    };
    let found = h.tasks.list_for_user(1, &by_status).await.unwrap();
    assert_eq!(titles(&found), ["Water plants"]);
}

#[actix_rt::test]
async fn test_search_is_case_insensitive_and_takes_precedence() {
    let h = Harness::new();
    let described = TaskInput {
        description: Some("Prepare the QUARTERLY report".to_string()),
        category_id: Some(1),
        ..input(1, "Finance")
    };
    h.tasks.create(&described).await.unwrap();
    h.tasks.create(&input(1, "Report to board")).await.unwrap();
    h.tasks.create(&input(1, "Unrelated")).await.unwrap();
    h.tasks.create(&input(2, "Report for user 2")).await.unwrap();

    // The category filter would exclude "Report to board"; search ignores it.
    let query = TaskQuery {
        search: Some("report".to_string()),
        category_id: Some(1),
        ..TaskQuery::default()
    };
    let mut found = titles(&h.tasks.list_for_user(1, &query).await.unwrap())
        .into_iter()
        .map(String::from)
        .collect::<Vec<_>>();
    found.sort();
    assert_eq!(found, ["Finance", "Report to board"]);

    // A blank search term is no search at all.
    let blank = TaskQuery {
        search: Some("  ".to_string()),
        category_id: Some(1),
        ..TaskQuery::default()
    };
    let found = h.tasks.list_for_user(1, &blank).await.unwrap();
    assert_eq!(titles(&found), ["Finance"]);
}

#[actix_rt::test]
async fn test_due_soon_window() {
    let h = Harness::new();
    let soon = h.tasks.create(&dated(1, "in-1", 1)).await.unwrap();
    h.tasks.create(&dated(1, "in-5", 5)).await.unwrap();
    h.tasks.create(&dated(1, "in-14", 14)).await.unwrap();
    let done = h.tasks.create(&dated(1, "in-1-done", 1)).await.unwrap();
    h.tasks.change_status(done.id, "completed", &owner()).await.unwrap();
    h.tasks.create(&input(1, "undated")).await.unwrap();

    let week = h.tasks.get_due_soon(1, 7).await.unwrap();
    assert_eq!(titles(&week), ["in-1", "in-5"]);

    let default_window = h
        .tasks
        .get_due_soon(1, taskforge::services::DEFAULT_DUE_SOON_DAYS)
        .await
        .unwrap();
    assert_eq!(titles(&default_window), ["in-1"]);

    // Cancelled tasks still count as due soon.
    h.tasks.change_status(soon.id, "cancelled", &owner()).await.unwrap();
    let week = h.tasks.get_due_soon(1, 7).await.unwrap();
    assert_eq!(titles(&week), ["in-1", "in-5"]);
}

#[actix_rt::test]
async fn test_due_soon_includes_today_and_last_day() {
    let h = Harness::new();
    h.tasks.create(&dated(1, "today", 0)).await.unwrap();
    h.tasks.create(&dated(1, "edge", 3)).await.unwrap();
    h.tasks.create(&dated(1, "beyond", 4)).await.unwrap();

    let found = h.tasks.get_due_soon(1, 3).await.unwrap();
    assert_eq!(titles(&found), ["today", "edge"]);
}

#[actix_rt::test]
async fn test_overdue() {
    let store = MemoryStore::new();
    let repo = store.tasks();
    let service = TaskService::new(repo.clone());

    // Past due dates cannot go through the service, so seed storage directly.
    repo.create(raw_task(1, "late-1", -1)).await.unwrap();
    repo.create(raw_task(1, "late-7", -7)).await.unwrap();
    repo.create(raw_task(1, "future", 1)).await.unwrap();
    let done = repo.create(raw_task(1, "late-done", -1)).await.unwrap();
    repo.change_status(done.id, done.version, TaskStatus::Completed)
        .await
        .unwrap();
    repo.create(raw_task(2, "other-user", -3)).await.unwrap();

    let overdue = service.get_overdue(1).await.unwrap();
    assert_eq!(titles(&overdue), ["late-7", "late-1"]);
}

#[actix_rt::test]
async fn test_category_and_priority_views_are_owner_scoped() {
    let h = Harness::new();
    let mine = TaskInput {
        category_id: Some(4),
        priority_id: Some(2),
        ..input(1, "mine")
    };
    let theirs = TaskInput {
        category_id: Some(4),
        priority_id: Some(2),
        ..input(2, "theirs")
    };
    h.tasks.create(&mine).await.unwrap();
    h.tasks.create(&theirs).await.unwrap();

    assert_eq!(titles(&h.tasks.get_by_category(4, 1).await.unwrap()), ["mine"]);
    assert_eq!(titles(&h.tasks.get_by_priority(2, 2).await.unwrap()), ["theirs"]);
    // No admin override for these views.
    assert!(h.tasks.get_by_category(4, admin().id).await.unwrap().is_empty());
}

/// Wraps the in-memory repository and lets another "request" act on a task between the
/// service's read and its write.
struct RacingRepository {
    inner: Arc<dyn TaskRepository>,
    delete_first: bool,
}

impl RacingRepository {
    async fn interfere(&self, id: Uuid) -> Result<(), AppError> {
        if let Some(task) = self.inner.find_by_id(id).await? {
            if self.delete_first {
                self.inner.delete(id, task.version).await?;
            } else {
                self.inner
                    .update(id, task.version, &TaskPatch::status(TaskStatus::InProgress))
                    .await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TaskRepository for RacingRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Task>, AppError> {
        self.inner.find_by_id(id).await
    }

    async fn create(&self, task: NewTask) -> Result<Task, AppError> {
        self.inner.create(task).await
    }

    async fn update(
        &self,
        id: Uuid,
        expected_version: i32,
        patch: &TaskPatch,
    ) -> Result<Option<Task>, AppError> {
        self.interfere(id).await?;
        self.inner.update(id, expected_version, patch).await
    }

    async fn change_status(
        &self,
        id: Uuid,
        expected_version: i32,
        status: TaskStatus,
    ) -> Result<Option<Task>, AppError> {
        self.interfere(id).await?;
        self.inner.change_status(id, expected_version, status).await
    }

    async fn delete(&self, id: Uuid, expected_version: i32) -> Result<bool, AppError> {
        self.interfere(id).await?;
        self.inner.delete(id, expected_version).await
    }

    async fn find_by_user_id(
        &self,
        user_id: i32,
        filter: &TaskQuery,
    ) -> Result<Vec<Task>, AppError> {
        self.inner.find_by_user_id(user_id, filter).await
    }

    async fn find_by_category_id(&self, category_id: i32) -> Result<Vec<Task>, AppError> {
        self.inner.find_by_category_id(category_id).await
    }

    async fn find_by_priority_id(&self, priority_id: i32) -> Result<Vec<Task>, AppError> {
        self.inner.find_by_priority_id(priority_id).await
    }

    async fn search(&self, user_id: i32, term: &str) -> Result<Vec<Task>, AppError> {
        self.inner.search(user_id, term).await
    }
}

#[actix_rt::test]
async fn test_update_after_concurrent_delete_reports_not_found() {
    let store = MemoryStore::new();
    let service = TaskService::new(Arc::new(RacingRepository {
        inner: store.tasks(),
        delete_first: true,
    }));
    let task = service.create(&input(1, "Doomed")).await.unwrap();
    let update = TaskUpdate {
        title: Some("Too late".to_string()),
        ..TaskUpdate::default()
    };

    assert!(service.update(task.id, &update, &owner()).await.unwrap().is_none());
    assert!(store.tasks().find_by_id(task.id).await.unwrap().is_none());
}

#[actix_rt::test]
async fn test_concurrent_modification_is_a_conflict() {
    let store = MemoryStore::new();
    let service = TaskService::new(Arc::new(RacingRepository {
        inner: store.tasks(),
        delete_first: false,
    }));
    let task = service.create(&input(1, "Contended")).await.unwrap();

    let err = service
        .change_status(task.id, "completed", &owner())
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ConcurrentModification);
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let err = service.delete(task.id, &owner()).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::ConcurrentModification);
    assert!(store.tasks().find_by_id(task.id).await.unwrap().is_some());
}
