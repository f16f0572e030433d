use rocket::State;
use rocket::serde::{Deserialize, Serialize, json::Json};
use sqlx::{Pool, Sqlite};

use crate::auth::User;
use crate::auth::access::VIEW_CHILD_DASHBOARD;
use crate::db::{find_user, get_parent_link, list_tasks_for_player};
use crate::error::AppError;

use super::UserData;
use super::tasks::{TaskResponse, task_responses};

#[derive(Serialize, Deserialize, Debug)]
pub struct DashboardResponse {
    pub child: UserData,
    pub tasks: Vec<TaskResponse>,
}

#[get("/parent/dashboard")]
pub async fn api_parent_dashboard(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<DashboardResponse>, AppError> {
    VIEW_CHILD_DASHBOARD.check_role(&user)?;

    let Some(link) = get_parent_link(db, user.id).await? else {
        return Err(VIEW_CHILD_DASHBOARD.deny());
    };

    let Some(child) = find_user(db.inner(), link.child_id).await? else {
        return Err(VIEW_CHILD_DASHBOARD.deny());
    };

    let tasks = list_tasks_for_player(db, child.id).await?;

    Ok(Json(DashboardResponse {
        child: UserData::from(child),
        tasks: task_responses(db, tasks).await?,
    }))
}
