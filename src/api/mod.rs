use chrono::{Duration, NaiveDate, Utc};
use rocket::State;
use rocket::http::{Cookie, CookieJar, SameSite, Status};
use rocket::response::status::Custom;
use rocket::serde::{Deserialize, Serialize, json::Json};
use rocket::Request;
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::{Role, SESSION_COOKIE, User, UserSession};
use crate::db::{authenticate_user, create_user_session, invalidate_session};
use crate::env::Settings;
use crate::error::AppError;
use crate::models::ProfileSummary;
use crate::validation::{ErrorResponse, JsonValidateExt};

pub mod academies;
pub mod parents;
pub mod tasks;
pub mod users;

pub use academies::*;
pub use parents::*;
pub use tasks::*;
pub use users::*;

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "This field may not be blank."))]
    username: String,
    #[validate(length(min = 1, message = "This field may not be blank."))]
    password: String,
}

#[derive(Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub user: Option<UserData>,
    pub token: Option<String>,
    pub error: Option<String>,
}

/// Account as exposed over the API, with the short profile embedded.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UserData {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub profile: ProfileSummary,
    pub player_id: Option<String>,
    pub membership_start_date: Option<NaiveDate>,
    pub membership_end_date: Option<NaiveDate>,
    pub photo: Option<String>,
}

impl From<User> for UserData {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            profile: user.profile,
            player_id: user.player_id,
            membership_start_date: user.membership_start_date,
            membership_end_date: user.membership_end_date,
            photo: user.photo,
        }
    }
}

#[post("/login", data = "<login>")]
pub async fn api_login(
    login: Json<LoginRequest>,
    cookies: &CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
    settings: &State<Settings>,
) -> Result<Json<LoginResponse>, AppError> {
    let validated = login.validate_custom()?;

    match authenticate_user(db, &validated.username, &validated.password).await? {
        Some(user) => {
            let token = UserSession::generate_token();
            let expires_at = Utc::now() + Duration::hours(settings.session_ttl_hours);

            create_user_session(db, user.id, &token, expires_at.naive_utc()).await?;

            let cookie = Cookie::build((SESSION_COOKIE, token.clone()))
                .same_site(SameSite::Lax)
                .http_only(true)
                .max_age(rocket::time::Duration::hours(settings.session_ttl_hours));
            cookies.add_private(cookie);

            Ok(Json(LoginResponse {
                success: true,
                user: Some(UserData::from(user)),
                token: Some(token),
                error: None,
            }))
        }
        None => Ok(Json(LoginResponse {
            success: false,
            user: None,
            token: None,
            error: Some("Invalid username or password".to_string()),
        })),
    }
}

#[post("/logout")]
pub async fn api_logout(cookies: &CookieJar<'_>, db: &State<Pool<Sqlite>>) -> Status {
    let token = cookies
        .get_private(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string());

    if let Some(token) = token {
        if let Err(e) = invalidate_session(db, &token).await {
            e.log_and_record("Logout");
        }
    }

    cookies.remove_private(Cookie::build(SESSION_COOKIE));

    Status::NoContent
}

#[get("/me")]
pub async fn api_me(user: User) -> Json<UserData> {
    Json(UserData::from(user))
}

#[get("/health")]
pub fn health() -> &'static str {
    "OK"
}

fn catcher_body(status: Status, message: &str) -> Custom<Json<ErrorResponse>> {
    Custom(status, Json(ErrorResponse::detail(message)))
}

#[catch(400)]
pub fn bad_request_api(_req: &Request) -> Custom<Json<ErrorResponse>> {
    catcher_body(Status::BadRequest, "Malformed request.")
}

#[catch(403)]
pub fn forbidden_api(_req: &Request) -> Custom<Json<ErrorResponse>> {
    catcher_body(
        Status::Forbidden,
        "You do not have permission to perform this action.",
    )
}

#[catch(404)]
pub fn not_found_api(_req: &Request) -> Custom<Json<ErrorResponse>> {
    catcher_body(Status::NotFound, "Not found.")
}

#[catch(422)]
pub fn unprocessable_api(_req: &Request) -> Custom<Json<ErrorResponse>> {
    catcher_body(Status::UnprocessableEntity, "Invalid input.")
}

#[catch(500)]
pub fn internal_error_api(req: &Request) -> Custom<Json<ErrorResponse>> {
    tracing::error!(uri = %req.uri(), "Unhandled server error");
    catcher_body(Status::InternalServerError, "Internal server error.")
}
