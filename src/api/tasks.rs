use chrono::{DateTime, NaiveDate, Utc};
use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::{Deserialize, Serialize, json::Json};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::access::{COMPLETE_TASK, CREATE_TASK, MODIFY_TASK, Relation, START_TASK};
use crate::auth::{Permission, Role, User};
use crate::db::{
    NewTask, TaskUpdate, complete_task, create_task, delete_task, find_task, find_user,
    get_task, get_task_completions, get_task_player_ids, get_task_players, list_tasks,
    list_tasks_for_player, start_task, update_task,
};
use crate::error::AppError;
use crate::models::{Sport, Task, TaskCompletion};
use crate::validation::JsonValidateExt;

use super::UserData;

/// A task with its creator, assigned players and completion rows expanded.
#[derive(Serialize, Deserialize, Debug)]
pub struct TaskResponse {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub assigned_by: Option<UserData>,
    pub created_at: DateTime<Utc>,
    pub due_date: Option<NaiveDate>,
    pub time_limit_minutes: Option<u32>,
    pub sport: Option<Sport>,
    pub academy: Option<i64>,
    pub players: Vec<UserData>,
    pub completions: Vec<TaskCompletion>,
}

pub(crate) async fn task_response(db: &Pool<Sqlite>, task: Task) -> Result<TaskResponse, AppError> {
    let assigned_by = match task.assigned_by {
        Some(creator_id) => find_user(db, creator_id).await?.map(UserData::from),
        None => None,
    };

    let players = get_task_players(db, task.id).await?;
    let completions = get_task_completions(db, task.id).await?;

    Ok(TaskResponse {
        id: task.id,
        title: task.title,
        description: task.description,
        assigned_by,
        created_at: task.created_at,
        due_date: task.due_date,
        time_limit_minutes: task.time_limit_minutes,
        sport: task.sport,
        academy: task.academy,
        players: players.into_iter().map(UserData::from).collect(),
        completions,
    })
}

pub(crate) async fn task_responses(
    db: &Pool<Sqlite>,
    tasks: Vec<Task>,
) -> Result<Vec<TaskResponse>, AppError> {
    let mut responses = Vec::with_capacity(tasks.len());
    for task in tasks {
        responses.push(task_response(db, task).await?);
    }
    Ok(responses)
}

/// Any `sport` or `academy` in the body is ignored; both come from the
/// creating coach's profile.
#[derive(Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters."))]
    title: String,
    #[serde(default)]
    description: String,
    due_date: Option<NaiveDate>,
    time_limit_minutes: Option<u32>,
    #[serde(default)]
    players: Vec<i64>,
}

#[derive(Deserialize, Validate)]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters."))]
    title: Option<String>,
    description: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    due_date: Option<Option<NaiveDate>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    time_limit_minutes: Option<Option<u32>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    sport: Option<Option<Sport>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    academy: Option<Option<i64>>,
    players: Option<Vec<i64>>,
}

#[derive(Deserialize, Default)]
pub struct CompleteTaskRequest {
    notes: Option<String>,
}

impl CompleteTaskRequest {
    /// An empty body means no notes; anything else must be a valid request.
    fn from_body(body: &str) -> Result<Self, AppError> {
        if body.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_json::from_str(body)
            .map_err(|e| AppError::Validation(format!("Invalid request body: {}", e)))
    }
}

#[get("/tasks")]
pub async fn api_list_tasks(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<TaskResponse>>, AppError> {
    user.require_permission(Permission::ViewTasks)?;

    let tasks = list_tasks(db).await?;

    Ok(Json(task_responses(db, tasks).await?))
}

#[get("/tasks/mine")]
pub async fn api_my_tasks(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<TaskResponse>>, AppError> {
    let tasks = list_tasks_for_player(db, user.id).await?;

    Ok(Json(task_responses(db, tasks).await?))
}

#[get("/tasks/<id>")]
pub async fn api_get_task(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<TaskResponse>, AppError> {
    user.require_permission(Permission::ViewTasks)?;

    let task = get_task(db, id).await?;

    Ok(Json(task_response(db, task).await?))
}

#[post("/tasks", data = "<task>")]
pub async fn api_create_task(
    task: Json<CreateTaskRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<TaskResponse>>, AppError> {
    CREATE_TASK.check_role(&user)?;
    let validated = task.validate_custom()?;

    let created = create_task(
        db,
        &user,
        NewTask {
            title: validated.title,
            description: validated.description,
            due_date: validated.due_date,
            time_limit_minutes: validated.time_limit_minutes,
            players: validated.players,
        },
    )
    .await?;

    Ok(Custom(Status::Created, Json(task_response(db, created).await?)))
}

#[patch("/tasks/<id>", data = "<update>")]
pub async fn api_update_task(
    id: i64,
    update: Json<UpdateTaskRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<TaskResponse>, AppError> {
    MODIFY_TASK.check_role(&user)?;
    let validated = update.validate_custom()?;

    let task = get_task(db, id).await?;
    MODIFY_TASK.check_relation(&user, Relation::CreatorOf(&task))?;

    let updated = update_task(
        db,
        task.id,
        TaskUpdate {
            title: validated.title,
            description: validated.description,
            due_date: validated.due_date,
            time_limit_minutes: validated.time_limit_minutes,
            sport: validated.sport,
            academy: validated.academy,
            players: validated.players,
        },
    )
    .await?;

    Ok(Json(task_response(db, updated).await?))
}

#[delete("/tasks/<id>")]
pub async fn api_delete_task(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, AppError> {
    MODIFY_TASK.check_role(&user)?;

    let task = get_task(db, id).await?;
    MODIFY_TASK.check_relation(&user, Relation::CreatorOf(&task))?;

    delete_task(db, task.id).await?;

    Ok(Status::NoContent)
}

#[post("/tasks/<task_id>/start")]
pub async fn api_start_task(
    task_id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<TaskCompletion>, AppError> {
    START_TASK.check_role(&user)?;

    let Some(task) = find_task(db.inner(), task_id).await? else {
        return Err(START_TASK.deny());
    };

    let players = get_task_player_ids(db.inner(), task.id).await?;
    START_TASK.check_relation(&user, Relation::AssignedTo(&players))?;

    let completion = start_task(db, task.id, user.id).await?;

    Ok(Json(completion))
}

#[post("/tasks/<task_id>/players/<player_id>/complete", data = "<body>")]
pub async fn api_complete_task(
    task_id: i64,
    player_id: i64,
    body: String,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<TaskCompletion>, AppError> {
    COMPLETE_TASK.check_role(&user)?;

    let Some(task) = find_task(db.inner(), task_id).await? else {
        return Err(COMPLETE_TASK.deny());
    };
    COMPLETE_TASK.check_relation(&user, Relation::CreatorOf(&task))?;

    let player = find_user(db.inner(), player_id).await?;
    if !player.is_some_and(|p| p.role == Role::Player) {
        return Err(COMPLETE_TASK.deny());
    }

    let request = CompleteTaskRequest::from_body(&body)?;
    let completion = complete_task(db, task.id, player_id, request.notes.as_deref()).await?;

    Ok(Json(completion))
}
