use chrono::NaiveDate;
use sqlx::{Executor, Pool, Sqlite, SqliteConnection};
use tracing::{info, instrument};

use crate::auth::{Role, User, player_identifier};
use crate::{
    db::{HASH_COST, academy_exists, find_profile_by_user},
    error::AppError,
    models::{DbParentChildLink, ParentChildLink, Profile, ProfileSummary, Sport},
};

pub(crate) const USER_SELECT: &str = "SELECT u.id, u.username, u.email, u.role, u.photo, u.player_id,
        u.membership_start_date, u.membership_end_date, p.sport, p.academy_id
     FROM users u
     LEFT JOIN profiles p ON p.user_id = u.id";

pub struct NewAccount<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub role: Role,
    pub profile: Option<ProfileSummary>,
}

#[derive(Debug, Default)]
pub struct AccountUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub photo: Option<Option<String>>,
    pub membership_start_date: Option<Option<NaiveDate>>,
    pub membership_end_date: Option<Option<NaiveDate>>,
}

#[instrument(skip(executor))]
pub async fn find_user<'e, E>(executor: E, id: i64) -> Result<Option<User>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, crate::auth::DbUser>(&format!("{} WHERE u.id = ?", USER_SELECT))
        .bind(id)
        .fetch_optional(executor)
        .await?;

    row.map(User::try_from).transpose()
}

#[instrument]
pub async fn get_user(pool: &Pool<Sqlite>, id: i64) -> Result<User, AppError> {
    info!("Fetching user by ID");
    match find_user(pool, id).await? {
        Some(user) => Ok(user),
        _ => Err(AppError::NotFound(format!(
            "User with id {} not found in database",
            id
        ))),
    }
}

#[instrument]
pub async fn find_user_by_username(
    pool: &Pool<Sqlite>,
    username: &str,
) -> Result<Option<User>, AppError> {
    info!("Getting user by username");
    let row = sqlx::query_as::<_, crate::auth::DbUser>(&format!(
        "{} WHERE u.username = ?",
        USER_SELECT
    ))
    .bind(username)
    .fetch_optional(pool)
    .await?;

    row.map(User::try_from).transpose()
}

/// Resolves a player identifier, ignoring accounts that are not players.
#[instrument(skip(executor))]
pub async fn find_player_by_player_id<'e, E>(
    executor: E,
    player_id: &str,
) -> Result<Option<User>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, crate::auth::DbUser>(&format!(
        "{} WHERE u.player_id = ? AND u.role = 'player'",
        USER_SELECT
    ))
    .bind(player_id)
    .fetch_optional(executor)
    .await?;

    row.map(User::try_from).transpose()
}

#[instrument]
pub async fn list_users(pool: &Pool<Sqlite>, sport: Option<Sport>) -> Result<Vec<User>, AppError> {
    info!(sport = ?sport, "Listing users");

    let rows = match sport {
        Some(sport) => {
            sqlx::query_as::<_, crate::auth::DbUser>(&format!(
                "{} WHERE p.sport = ? ORDER BY u.id",
                USER_SELECT
            ))
            .bind(sport.as_str())
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, crate::auth::DbUser>(&format!("{} ORDER BY u.id", USER_SELECT))
                .fetch_all(pool)
                .await?
        }
    };

    rows.into_iter().map(User::try_from).collect()
}

#[instrument(skip_all, fields(username))]
pub async fn authenticate_user(
    pool: &Pool<Sqlite>,
    username: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    info!("Authenticating user");
    let stored: Option<(i64, String)> =
        sqlx::query_as("SELECT id, password FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(pool)
            .await?;

    match stored {
        Some((id, hash)) => match bcrypt::verify(password, &hash) {
            Ok(true) => find_user(pool, id).await,
            _ => Ok(None),
        },
        _ => Ok(None),
    }
}

/// Inserts the bare account row. Callers run [`provision_account`] afterwards.
#[instrument(skip(conn, password))]
pub async fn create_user(
    conn: &mut SqliteConnection,
    username: &str,
    email: &str,
    password: &str,
    role: Role,
) -> Result<i64, AppError> {
    info!("Creating new user");

    let existing_user: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(&mut *conn)
        .await?;

    if existing_user.is_some() {
        return Err(AppError::Validation(format!(
            "Username '{}' already exists",
            username
        )));
    }

    let hashed_password = bcrypt::hash(password, HASH_COST)?;

    let res = sqlx::query("INSERT INTO users (username, email, password, role) VALUES (?, ?, ?, ?)")
        .bind(username)
        .bind(email)
        .bind(hashed_password)
        .bind(role.as_str())
        .execute(&mut *conn)
        .await?;

    Ok(res.last_insert_rowid())
}

/// The post-creation step of every registration: makes sure the account has
/// its profile and, for players, its identifier. Safe to run more than once.
#[instrument(skip(conn))]
pub async fn provision_account(
    conn: &mut SqliteConnection,
    user_id: i64,
    role: Role,
) -> Result<Profile, AppError> {
    info!("Provisioning account");

    sqlx::query("INSERT INTO profiles (user_id) VALUES (?) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    if role == Role::Player {
        sqlx::query("UPDATE users SET player_id = ? WHERE id = ? AND player_id IS NULL")
            .bind(player_identifier(user_id))
            .bind(user_id)
            .execute(&mut *conn)
            .await?;
    }

    find_profile_by_user(&mut *conn, user_id)
        .await?
        .ok_or_else(|| AppError::Internal(format!("Profile for user {} was not created", user_id)))
}

#[instrument(skip_all, fields(username = account.username, role = %account.role))]
pub async fn register_account(
    pool: &Pool<Sqlite>,
    account: NewAccount<'_>,
) -> Result<User, AppError> {
    info!("Registering account");
    let mut tx = pool.begin().await?;

    if let Some(academy_id) = account.profile.as_ref().and_then(|p| p.academy) {
        if !academy_exists(&mut *tx, academy_id).await? {
            return Err(AppError::Validation(format!(
                "Academy {} does not exist",
                academy_id
            )));
        }
    }

    let user_id = create_user(
        &mut tx,
        account.username,
        account.email,
        account.password,
        account.role,
    )
    .await?;

    provision_account(&mut tx, user_id, account.role).await?;

    if let Some(profile) = &account.profile {
        sqlx::query("UPDATE profiles SET sport = ?, academy_id = ? WHERE user_id = ?")
            .bind(profile.sport.map(|s| s.as_str()))
            .bind(profile.academy)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    get_user(pool, user_id).await
}

/// Registers a parent and links them to the player holding `child_player_id`.
/// Nothing is written when the child cannot be resolved.
#[instrument(skip(pool, password))]
pub async fn register_parent(
    pool: &Pool<Sqlite>,
    username: &str,
    email: &str,
    password: &str,
    child_player_id: &str,
) -> Result<(User, ParentChildLink), AppError> {
    info!("Registering parent");

    let child = find_player_by_player_id(pool, child_player_id)
        .await?
        .ok_or_else(|| AppError::Validation("No active player found with this ID.".to_string()))?;

    let mut tx = pool.begin().await?;

    let parent_id = create_user(&mut tx, username, email, password, Role::Parent).await?;
    provision_account(&mut tx, parent_id, Role::Parent).await?;

    let res = sqlx::query("INSERT INTO parent_child_links (parent_id, child_id) VALUES (?, ?)")
        .bind(parent_id)
        .bind(child.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    let link = ParentChildLink {
        id: res.last_insert_rowid(),
        parent_id,
        child_id: child.id,
    };

    Ok((get_user(pool, parent_id).await?, link))
}

#[instrument]
pub async fn get_parent_link(
    pool: &Pool<Sqlite>,
    parent_id: i64,
) -> Result<Option<ParentChildLink>, AppError> {
    info!("Getting parent link");
    let row = sqlx::query_as::<_, DbParentChildLink>(
        "SELECT id, parent_id, child_id FROM parent_child_links WHERE parent_id = ?",
    )
    .bind(parent_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(ParentChildLink::from))
}

#[instrument]
pub async fn update_user(
    pool: &Pool<Sqlite>,
    user_id: i64,
    update: AccountUpdate,
) -> Result<User, AppError> {
    info!("Updating user");
    let current = get_user(pool, user_id).await?;

    if let Some(username) = &update.username {
        let existing: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM users WHERE username = ? AND id != ?")
                .bind(username)
                .bind(user_id)
                .fetch_optional(pool)
                .await?;

        if existing.is_some() {
            return Err(AppError::Validation("Username already exists".to_string()));
        }
    }

    sqlx::query(
        "UPDATE users
         SET username = ?, email = ?, photo = ?, membership_start_date = ?, membership_end_date = ?
         WHERE id = ?",
    )
    .bind(update.username.unwrap_or(current.username))
    .bind(update.email.unwrap_or(current.email))
    .bind(update.photo.unwrap_or(current.photo))
    .bind(update.membership_start_date.unwrap_or(current.membership_start_date))
    .bind(update.membership_end_date.unwrap_or(current.membership_end_date))
    .bind(user_id)
    .execute(pool)
    .await?;

    get_user(pool, user_id).await
}
