use chrono::NaiveDate;
use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::{Deserialize, Serialize, json::Json};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::access::{EDIT_ACCOUNT, EDIT_PROFILE, NOT_FOUND, Relation};
use crate::auth::{Permission, Role, User};
use crate::db::{
    AccountUpdate, NewAccount, ProfileUpdate, find_user, get_profile, get_user, list_profiles, list_users,
    register_account, register_parent, update_profile, update_user,
};
use crate::error::AppError;
use crate::models::{ParentChildLink, Profile, ProfileSummary, Sport, Stats};
use crate::validation::{JsonValidateExt, PLAYER_ID_PATTERN};

use super::UserData;

const NO_SUCH_PLAYER: &str = "No active player found with this ID.";

#[derive(Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 150, message = "Username must be 1-150 characters."))]
    username: String,
    #[validate(email(message = "Enter a valid email address."))]
    email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters."))]
    password: String,
    #[serde(default)]
    role: Role,
    profile: Option<ProfileSummary>,
}

#[post("/register", data = "<registration>")]
pub async fn api_register(
    registration: Json<RegisterRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<UserData>>, AppError> {
    let validated = registration.validate_custom()?;

    let user = register_account(
        db,
        NewAccount {
            username: &validated.username,
            email: &validated.email,
            password: &validated.password,
            role: validated.role,
            profile: validated.profile,
        },
    )
    .await?;

    Ok(Custom(Status::Created, Json(UserData::from(user))))
}

#[derive(Deserialize, Validate)]
pub struct ParentRegisterRequest {
    #[validate(length(min = 1, max = 150, message = "Username must be 1-150 characters."))]
    username: String,
    #[validate(email(message = "Enter a valid email address."))]
    email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters."))]
    password: String,
    child_player_id: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ParentRegisterResponse {
    pub user: UserData,
    pub child_id: i64,
    pub link_id: i64,
}

#[post("/register/parent", data = "<registration>")]
pub async fn api_register_parent(
    registration: Json<ParentRegisterRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<ParentRegisterResponse>>, AppError> {
    let validated = registration.validate_custom()?;

    let child_player_id = validated.child_player_id.trim();
    if !PLAYER_ID_PATTERN.is_match(child_player_id) {
        return Err(AppError::Validation(NO_SUCH_PLAYER.to_string()));
    }

    let (user, link): (User, ParentChildLink) = register_parent(
        db,
        &validated.username,
        &validated.email,
        &validated.password,
        child_player_id,
    )
    .await?;

    Ok(Custom(
        Status::Created,
        Json(ParentRegisterResponse {
            user: UserData::from(user),
            child_id: link.child_id,
            link_id: link.id,
        }),
    ))
}

#[get("/users?<sport>")]
pub async fn api_list_users(
    sport: Option<String>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<UserData>>, AppError> {
    user.require_permission(Permission::ViewUsers)?;

    let sport = match sport.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            raw.parse::<Sport>()
                .map_err(|e| AppError::Validation(e.to_string()))?,
        ),
        None => None,
    };

    let users = list_users(db, sport).await?;

    Ok(Json(users.into_iter().map(UserData::from).collect()))
}

#[get("/users/<id>")]
pub async fn api_get_user(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<UserData>, AppError> {
    user.require_permission(Permission::ViewUsers)?;

    let target = find_user(db.inner(), id)
        .await?
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.to_string()))?;

    Ok(Json(UserData::from(target)))
}

#[derive(Deserialize, Validate)]
pub struct UserUpdateRequest {
    #[validate(length(min = 1, max = 150, message = "Username must be 1-150 characters."))]
    username: Option<String>,
    #[validate(email(message = "Enter a valid email address."))]
    email: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    photo: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    membership_start_date: Option<Option<NaiveDate>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    membership_end_date: Option<Option<NaiveDate>>,
}

#[patch("/users/<id>", data = "<update>")]
pub async fn api_update_user(
    id: i64,
    update: Json<UserUpdateRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<UserData>, AppError> {
    EDIT_ACCOUNT.check_role(&user)?;
    let target = find_user(db.inner(), id)
        .await?
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.to_string()))?;
    EDIT_ACCOUNT.check_relation(&user, Relation::Account(target.id))?;

    let validated = update.validate_custom()?;

    if validated.membership_start_date.is_some() || validated.membership_end_date.is_some() {
        user.require_permission(Permission::EditMembership)?;
    }

    let updated = update_user(
        db,
        target.id,
        AccountUpdate {
            username: validated.username,
            email: validated.email,
            photo: validated.photo,
            membership_start_date: validated.membership_start_date,
            membership_end_date: validated.membership_end_date,
        },
    )
    .await?;

    Ok(Json(UserData::from(updated)))
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ProfileResponse {
    pub id: i64,
    pub user: UserData,
    pub sport: Option<Sport>,
    pub academy: Option<i64>,
    pub study_details: String,
    pub stats: Stats,
}

async fn profile_response(db: &Pool<Sqlite>, profile: Profile) -> Result<ProfileResponse, AppError> {
    let owner = get_user(db, profile.user_id).await?;

    Ok(ProfileResponse {
        id: profile.id,
        user: UserData::from(owner),
        sport: profile.sport,
        academy: profile.academy,
        study_details: profile.study_details,
        stats: profile.stats,
    })
}

#[get("/profiles")]
pub async fn api_list_profiles(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<ProfileResponse>>, AppError> {
    user.require_permission(Permission::ViewUsers)?;

    let mut responses = Vec::new();
    for profile in list_profiles(db).await? {
        responses.push(profile_response(db, profile).await?);
    }

    Ok(Json(responses))
}

#[get("/profiles/<id>")]
pub async fn api_get_profile(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<ProfileResponse>, AppError> {
    user.require_permission(Permission::ViewUsers)?;

    let profile = get_profile(db, id).await?;

    Ok(Json(profile_response(db, profile).await?))
}

#[derive(Deserialize, Validate)]
pub struct ProfileUpdateRequest {
    #[serde(default, with = "::serde_with::rust::double_option")]
    sport: Option<Option<Sport>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    academy: Option<Option<i64>>,
    study_details: Option<String>,
    stats: Option<Stats>,
}

#[patch("/profiles/<id>", data = "<update>")]
pub async fn api_update_profile(
    id: i64,
    update: Json<ProfileUpdateRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<ProfileResponse>, AppError> {
    EDIT_PROFILE.check_role(&user)?;
    let profile = get_profile(db, id).await?;
    EDIT_PROFILE.check_relation(&user, Relation::OwnerOf(&profile))?;

    let validated = update.validate_custom()?;

    let updated = update_profile(
        db,
        profile.id,
        ProfileUpdate {
            sport: validated.sport,
            academy: validated.academy,
            study_details: validated.study_details,
            stats: validated.stats,
        },
    )
    .await?;

    Ok(Json(profile_response(db, updated).await?))
}
