use chrono::{NaiveDate, Utc};
use sqlx::{Executor, Pool, Sqlite, SqliteConnection};
use tracing::{info, instrument, warn};

use crate::auth::User;
use crate::{
    db::{USER_SELECT, academy_exists, find_profile_by_user},
    error::AppError,
    models::{DbTask, DbTaskCompletion, Sport, Task, TaskCompletion},
};

pub const DEFAULT_COMPLETION_NOTE: &str = "Completed by coach.";

const TASK_SELECT: &str = "SELECT t.id, t.title, t.description, t.assigned_by, t.created_at,
        t.due_date, t.time_limit_minutes, t.academy_id, t.sport
     FROM tasks t";

const COMPLETION_SELECT: &str = "SELECT c.id, c.task_id, c.player_id, u.username AS player_username,
        c.completed, c.started_at, c.time_taken_seconds, c.notes, c.updated_at
     FROM task_completions c
     JOIN users u ON u.id = c.player_id";

#[derive(Debug)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub due_date: Option<NaiveDate>,
    pub time_limit_minutes: Option<u32>,
    pub players: Vec<i64>,
}

#[derive(Debug, Default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<Option<NaiveDate>>,
    pub time_limit_minutes: Option<Option<u32>>,
    pub sport: Option<Option<Sport>>,
    pub academy: Option<Option<i64>>,
    pub players: Option<Vec<i64>>,
}

#[instrument(skip(executor))]
pub async fn find_task<'e, E>(executor: E, id: i64) -> Result<Option<Task>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, DbTask>(&format!("{} WHERE t.id = ?", TASK_SELECT))
        .bind(id)
        .fetch_optional(executor)
        .await?;

    Ok(row.map(Task::from))
}

#[instrument]
pub async fn get_task(pool: &Pool<Sqlite>, id: i64) -> Result<Task, AppError> {
    info!("Getting task");
    find_task(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Not found.".to_string()))
}

#[instrument]
pub async fn list_tasks(pool: &Pool<Sqlite>) -> Result<Vec<Task>, AppError> {
    info!("Listing tasks");
    let rows = sqlx::query_as::<_, DbTask>(&format!(
        "{} ORDER BY t.created_at DESC, t.id DESC",
        TASK_SELECT
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Task::from).collect())
}

/// Tasks assigned to a player, newest first.
#[instrument]
pub async fn list_tasks_for_player(
    pool: &Pool<Sqlite>,
    player_id: i64,
) -> Result<Vec<Task>, AppError> {
    info!("Listing tasks for player");
    let rows = sqlx::query_as::<_, DbTask>(&format!(
        "{} JOIN task_players tp ON tp.task_id = t.id
         WHERE tp.player_id = ?
         ORDER BY t.created_at DESC, t.id DESC",
        TASK_SELECT
    ))
    .bind(player_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Task::from).collect())
}

#[instrument(skip(executor))]
pub async fn get_task_player_ids<'e, E>(executor: E, task_id: i64) -> Result<Vec<i64>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows: Vec<(i64,)> =
        sqlx::query_as("SELECT player_id FROM task_players WHERE task_id = ? ORDER BY player_id")
            .bind(task_id)
            .fetch_all(executor)
            .await?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

#[instrument]
pub async fn get_task_players(pool: &Pool<Sqlite>, task_id: i64) -> Result<Vec<User>, AppError> {
    let rows = sqlx::query_as::<_, crate::auth::DbUser>(&format!(
        "{} JOIN task_players tp ON tp.player_id = u.id WHERE tp.task_id = ? ORDER BY u.id",
        USER_SELECT
    ))
    .bind(task_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(User::try_from).collect()
}

#[instrument]
pub async fn get_task_completions(
    pool: &Pool<Sqlite>,
    task_id: i64,
) -> Result<Vec<TaskCompletion>, AppError> {
    let rows = sqlx::query_as::<_, DbTaskCompletion>(&format!(
        "{} WHERE c.task_id = ? ORDER BY c.id",
        COMPLETION_SELECT
    ))
    .bind(task_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(TaskCompletion::from).collect())
}

#[instrument(skip(executor))]
pub async fn find_completion<'e, E>(
    executor: E,
    task_id: i64,
    player_id: i64,
) -> Result<Option<TaskCompletion>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, DbTaskCompletion>(&format!(
        "{} WHERE c.task_id = ? AND c.player_id = ?",
        COMPLETION_SELECT
    ))
    .bind(task_id)
    .bind(player_id)
    .fetch_optional(executor)
    .await?;

    Ok(row.map(TaskCompletion::from))
}

/// Rejects any id that is not a player account. Duplicates are collapsed.
#[instrument(skip(conn))]
async fn validate_player_ids(
    conn: &mut SqliteConnection,
    players: &[i64],
) -> Result<Vec<i64>, AppError> {
    let mut unique = players.to_vec();
    unique.sort_unstable();
    unique.dedup();

    for player_id in &unique {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM users WHERE id = ? AND role = 'player'")
                .bind(player_id)
                .fetch_optional(&mut *conn)
                .await?;

        if row.is_none() {
            warn!(player_id, "Rejected non-player assignment");
            return Err(AppError::Validation(format!(
                "Invalid player id {}: account does not exist or is not a player",
                player_id
            )));
        }
    }

    Ok(unique)
}

async fn replace_task_players(
    conn: &mut SqliteConnection,
    task_id: i64,
    players: &[i64],
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM task_players WHERE task_id = ?")
        .bind(task_id)
        .execute(&mut *conn)
        .await?;

    for player_id in players {
        sqlx::query("INSERT INTO task_players (task_id, player_id) VALUES (?, ?)")
            .bind(task_id)
            .bind(player_id)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

/// Creates a task authored by `creator`. Sport and academy always come from
/// the creator's own profile.
#[instrument(skip(pool, creator), fields(creator_id = creator.id))]
pub async fn create_task(
    pool: &Pool<Sqlite>,
    creator: &User,
    task: NewTask,
) -> Result<Task, AppError> {
    info!("Creating task");
    let mut tx = pool.begin().await?;

    let players = validate_player_ids(&mut tx, &task.players).await?;
    let profile = find_profile_by_user(&mut *tx, creator.id).await?;
    let (sport, academy) = profile
        .map(|p| (p.sport, p.academy))
        .unwrap_or((None, None));

    let res = sqlx::query(
        "INSERT INTO tasks (title, description, assigned_by, created_at, due_date, time_limit_minutes, academy_id, sport)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&task.title)
    .bind(&task.description)
    .bind(creator.id)
    .bind(Utc::now().naive_utc())
    .bind(task.due_date)
    .bind(task.time_limit_minutes.map(i64::from))
    .bind(academy)
    .bind(sport.map(|s| s.as_str()))
    .execute(&mut *tx)
    .await?;

    let task_id = res.last_insert_rowid();
    replace_task_players(&mut tx, task_id, &players).await?;

    tx.commit().await?;

    get_task(pool, task_id).await
}

#[instrument(skip(pool))]
pub async fn update_task(
    pool: &Pool<Sqlite>,
    task_id: i64,
    update: TaskUpdate,
) -> Result<Task, AppError> {
    info!("Updating task");
    let mut tx = pool.begin().await?;

    let current = find_task(&mut *tx, task_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Not found.".to_string()))?;

    if let Some(Some(academy_id)) = update.academy {
        if !academy_exists(&mut *tx, academy_id).await? {
            return Err(AppError::Validation(format!(
                "Academy {} does not exist",
                academy_id
            )));
        }
    }

    sqlx::query(
        "UPDATE tasks
         SET title = ?, description = ?, due_date = ?, time_limit_minutes = ?, academy_id = ?, sport = ?
         WHERE id = ?",
    )
    .bind(update.title.unwrap_or(current.title))
    .bind(update.description.unwrap_or(current.description))
    .bind(update.due_date.unwrap_or(current.due_date))
    .bind(
        update
            .time_limit_minutes
            .unwrap_or(current.time_limit_minutes)
            .map(i64::from),
    )
    .bind(update.academy.unwrap_or(current.academy))
    .bind(update.sport.unwrap_or(current.sport).map(|s| s.as_str()))
    .bind(task_id)
    .execute(&mut *tx)
    .await?;

    if let Some(players) = update.players {
        let players = validate_player_ids(&mut tx, &players).await?;
        replace_task_players(&mut tx, task_id, &players).await?;
    }

    tx.commit().await?;

    get_task(pool, task_id).await
}

#[instrument]
pub async fn delete_task(pool: &Pool<Sqlite>, task_id: i64) -> Result<(), AppError> {
    info!("Deleting task");
    let res = sqlx::query("DELETE FROM tasks WHERE id = ?")
        .bind(task_id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound("Not found.".to_string()));
    }

    Ok(())
}

/// Returns the completion row for the pair, inserting an empty one if needed.
/// The unique (task, player) constraint keeps this to a single row.
#[instrument(skip(conn))]
pub async fn get_or_create_completion(
    conn: &mut SqliteConnection,
    task_id: i64,
    player_id: i64,
) -> Result<TaskCompletion, AppError> {
    sqlx::query(
        "INSERT INTO task_completions (task_id, player_id, updated_at) VALUES (?, ?, ?)
         ON CONFLICT (task_id, player_id) DO NOTHING",
    )
    .bind(task_id)
    .bind(player_id)
    .bind(Utc::now().naive_utc())
    .execute(&mut *conn)
    .await?;

    find_completion(&mut *conn, task_id, player_id)
        .await?
        .ok_or_else(|| {
            AppError::Internal(format!(
                "Completion for task {} and player {} was not created",
                task_id, player_id
            ))
        })
}

/// Starts the player's timer on a task. Calling it again leaves the original
/// start time alone.
#[instrument(skip(pool))]
pub async fn start_task(
    pool: &Pool<Sqlite>,
    task_id: i64,
    player_id: i64,
) -> Result<TaskCompletion, AppError> {
    info!("Starting task");
    let mut tx = pool.begin().await?;

    let completion = get_or_create_completion(&mut tx, task_id, player_id).await?;

    if completion.started_at.is_none() {
        let now = Utc::now().naive_utc();
        sqlx::query(
            "UPDATE task_completions SET started_at = ?, updated_at = ?
             WHERE id = ? AND started_at IS NULL",
        )
        .bind(now)
        .bind(now)
        .bind(completion.id)
        .execute(&mut *tx)
        .await?;
    }

    let completion = find_completion(&mut *tx, task_id, player_id)
        .await?
        .unwrap_or(completion);

    tx.commit().await?;

    Ok(completion)
}

/// Marks the pair complete, overwriting any previous notes. A started timer is
/// stopped the first time this runs; it is never recomputed afterwards.
#[instrument(skip(pool, notes))]
pub async fn complete_task(
    pool: &Pool<Sqlite>,
    task_id: i64,
    player_id: i64,
    notes: Option<&str>,
) -> Result<TaskCompletion, AppError> {
    info!("Completing task");
    let mut tx = pool.begin().await?;

    let completion = get_or_create_completion(&mut tx, task_id, player_id).await?;

    let now = Utc::now();
    let time_taken = completion.time_taken_seconds.or_else(|| {
        completion
            .started_at
            .map(|started| (now - started).num_seconds().max(0))
    });

    sqlx::query(
        "UPDATE task_completions
         SET completed = TRUE, notes = ?, time_taken_seconds = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(notes.unwrap_or(DEFAULT_COMPLETION_NOTE))
    .bind(time_taken)
    .bind(now.naive_utc())
    .bind(completion.id)
    .execute(&mut *tx)
    .await?;

    let completion = find_completion(&mut *tx, task_id, player_id)
        .await?
        .ok_or_else(|| AppError::Internal("Completion vanished during update".to_string()))?;

    tx.commit().await?;

    Ok(completion)
}
