use sqlx::{Executor, Pool, Sqlite};
use tracing::{info, instrument};

use crate::{
    error::AppError,
    models::{Academy, DbAcademy},
};

#[instrument(skip(executor))]
pub async fn academy_exists<'e, E>(executor: E, id: i64) -> Result<bool, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM academies WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await?;

    Ok(row.is_some())
}

#[instrument]
pub async fn list_academies(pool: &Pool<Sqlite>) -> Result<Vec<Academy>, AppError> {
    info!("Listing academies");
    let rows = sqlx::query_as::<_, DbAcademy>("SELECT id, name, location FROM academies ORDER BY id")
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(Academy::from).collect())
}

#[instrument]
pub async fn get_academy(pool: &Pool<Sqlite>, id: i64) -> Result<Academy, AppError> {
    info!("Getting academy");
    let row = sqlx::query_as::<_, DbAcademy>("SELECT id, name, location FROM academies WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(academy) => Ok(Academy::from(academy)),
        _ => Err(AppError::NotFound("Not found.".to_string())),
    }
}

#[instrument]
pub async fn create_academy(
    pool: &Pool<Sqlite>,
    name: &str,
    location: &str,
) -> Result<Academy, AppError> {
    info!("Creating academy");
    let res = sqlx::query("INSERT INTO academies (name, location) VALUES (?, ?)")
        .bind(name)
        .bind(location)
        .execute(pool)
        .await?;

    Ok(Academy {
        id: res.last_insert_rowid(),
        name: name.to_string(),
        location: location.to_string(),
    })
}

#[instrument]
pub async fn update_academy(
    pool: &Pool<Sqlite>,
    id: i64,
    name: Option<&str>,
    location: Option<&str>,
) -> Result<Academy, AppError> {
    info!("Updating academy");
    let current = get_academy(pool, id).await?;

    let name = name.unwrap_or(&current.name);
    let location = location.unwrap_or(&current.location);

    sqlx::query("UPDATE academies SET name = ?, location = ? WHERE id = ?")
        .bind(name)
        .bind(location)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(Academy {
        id,
        name: name.to_string(),
        location: location.to_string(),
    })
}

/// Profiles pointing at the academy lose the reference; its tasks are deleted
/// along with their assignments and completions.
#[instrument]
pub async fn delete_academy(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    info!("Deleting academy");
    let res = sqlx::query("DELETE FROM academies WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound("Not found.".to_string()));
    }

    Ok(())
}
