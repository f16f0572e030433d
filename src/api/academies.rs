use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::{Deserialize, json::Json};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::db::{create_academy, delete_academy, get_academy, list_academies, update_academy};
use crate::error::AppError;
use crate::models::Academy;
use crate::validation::JsonValidateExt;

#[derive(Deserialize, Validate)]
pub struct AcademyRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters."))]
    name: String,
    #[serde(default)]
    #[validate(length(max = 200, message = "Location must be at most 200 characters."))]
    location: String,
}

#[derive(Deserialize, Validate)]
pub struct AcademyUpdateRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters."))]
    name: Option<String>,
    #[validate(length(max = 200, message = "Location must be at most 200 characters."))]
    location: Option<String>,
}

#[get("/academies")]
pub async fn api_list_academies(db: &State<Pool<Sqlite>>) -> Result<Json<Vec<Academy>>, AppError> {
    Ok(Json(list_academies(db).await?))
}

#[get("/academies/<id>")]
pub async fn api_get_academy(id: i64, db: &State<Pool<Sqlite>>) -> Result<Json<Academy>, AppError> {
    Ok(Json(get_academy(db, id).await?))
}

#[post("/academies", data = "<academy>")]
pub async fn api_create_academy(
    academy: Json<AcademyRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<Academy>>, AppError> {
    let validated = academy.validate_custom()?;

    let created = create_academy(db, &validated.name, &validated.location).await?;

    Ok(Custom(Status::Created, Json(created)))
}

#[patch("/academies/<id>", data = "<academy>")]
pub async fn api_update_academy(
    id: i64,
    academy: Json<AcademyUpdateRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Academy>, AppError> {
    let validated = academy.validate_custom()?;

    let updated = update_academy(
        db,
        id,
        validated.name.as_deref(),
        validated.location.as_deref(),
    )
    .await?;

    Ok(Json(updated))
}

#[delete("/academies/<id>")]
pub async fn api_delete_academy(id: i64, db: &State<Pool<Sqlite>>) -> Result<Status, AppError> {
    delete_academy(db, id).await?;
    Ok(Status::NoContent)
}
