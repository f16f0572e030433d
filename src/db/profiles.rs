use sqlx::{Executor, Pool, Sqlite};
use tracing::{info, instrument};

use crate::{
    db::academy_exists,
    error::AppError,
    models::{DbProfile, Profile, Sport, Stats},
};

const PROFILE_SELECT: &str =
    "SELECT id, user_id, sport, academy_id, study_details, stats FROM profiles";

#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub sport: Option<Option<Sport>>,
    pub academy: Option<Option<i64>>,
    pub study_details: Option<String>,
    pub stats: Option<Stats>,
}

#[instrument(skip(executor))]
pub async fn find_profile_by_user<'e, E>(
    executor: E,
    user_id: i64,
) -> Result<Option<Profile>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, DbProfile>(&format!("{} WHERE user_id = ?", PROFILE_SELECT))
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

    Ok(row.map(Profile::from))
}

#[instrument]
pub async fn get_profile(pool: &Pool<Sqlite>, id: i64) -> Result<Profile, AppError> {
    info!("Getting profile");
    let row = sqlx::query_as::<_, DbProfile>(&format!("{} WHERE id = ?", PROFILE_SELECT))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(profile) => Ok(Profile::from(profile)),
        _ => Err(AppError::NotFound("Not found.".to_string())),
    }
}

#[instrument]
pub async fn list_profiles(pool: &Pool<Sqlite>) -> Result<Vec<Profile>, AppError> {
    info!("Listing profiles");
    let rows = sqlx::query_as::<_, DbProfile>(&format!("{} ORDER BY id", PROFILE_SELECT))
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(Profile::from).collect())
}

#[instrument]
pub async fn update_profile(
    pool: &Pool<Sqlite>,
    id: i64,
    update: ProfileUpdate,
) -> Result<Profile, AppError> {
    info!("Updating profile");
    let current = get_profile(pool, id).await?;

    if let Some(Some(academy_id)) = update.academy {
        if !academy_exists(pool, academy_id).await? {
            return Err(AppError::Validation(format!(
                "Academy {} does not exist",
                academy_id
            )));
        }
    }

    let stats = serde_json::to_string(&update.stats.unwrap_or(current.stats))?;

    sqlx::query(
        "UPDATE profiles SET sport = ?, academy_id = ?, study_details = ?, stats = ? WHERE id = ?",
    )
    .bind(update.sport.unwrap_or(current.sport).map(|s| s.as_str()))
    .bind(update.academy.unwrap_or(current.academy))
    .bind(update.study_details.unwrap_or(current.study_details))
    .bind(stats)
    .bind(id)
    .execute(pool)
    .await?;

    get_profile(pool, id).await
}
