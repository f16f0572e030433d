#[cfg(test)]
pub mod test_db {
    use crate::auth::{Role, User};
    use crate::db::{NewAccount, NewTask, create_academy, create_task, get_user, register_account, register_parent};
    use crate::error::AppError;
    use crate::models::{ProfileSummary, Sport};
    use sqlx::{Pool, Sqlite, SqlitePool};
    use std::collections::HashMap;
    use std::sync::Once;

    static INIT: Once = Once::new();
    pub static STANDARD_PASSWORD: &str = "password123";

    #[derive(Default)]
    pub struct TestDbBuilder {
        academies: Vec<TestAcademy>,
        users: Vec<TestUser>,
        tasks: Vec<TestTask>,
    }

    pub struct TestAcademy {
        pub name: String,
        pub location: String,
    }

    pub struct TestUser {
        pub username: String,
        pub role: Role,
        pub password: String,
        pub sport: Option<Sport>,
        pub academy: Option<String>,
        pub child_username: Option<String>,
    }

    pub struct TestTask {
        pub title: String,
        pub coach_username: String,
        pub player_usernames: Vec<String>,
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn academy(mut self, name: &str, location: &str) -> Self {
            self.academies.push(TestAcademy {
                name: name.to_string(),
                location: location.to_string(),
            });
            self
        }

        fn user(mut self, username: &str, role: Role) -> Self {
            self.users.push(TestUser {
                username: username.to_string(),
                role,
                password: STANDARD_PASSWORD.to_string(),
                sport: None,
                academy: None,
                child_username: None,
            });
            self
        }

        pub fn player(self, username: &str) -> Self {
            self.user(username, Role::Player)
        }

        pub fn coach(self, username: &str) -> Self {
            self.user(username, Role::Coach)
        }

        pub fn management(self, username: &str) -> Self {
            self.user(username, Role::Management)
        }

        /// A coach whose profile carries a sport and, optionally, one of the
        /// builder's academies by name.
        pub fn coach_with_profile(mut self, username: &str, sport: Sport, academy: Option<&str>) -> Self {
            self.users.push(TestUser {
                username: username.to_string(),
                role: Role::Coach,
                password: STANDARD_PASSWORD.to_string(),
                sport: Some(sport),
                academy: academy.map(String::from),
                child_username: None,
            });
            self
        }

        pub fn parent_of(mut self, username: &str, child_username: &str) -> Self {
            self.users.push(TestUser {
                username: username.to_string(),
                role: Role::Parent,
                password: STANDARD_PASSWORD.to_string(),
                sport: None,
                academy: None,
                child_username: Some(child_username.to_string()),
            });
            self
        }

        pub fn task(mut self, title: &str, coach_username: &str, players: &[&str]) -> Self {
            self.tasks.push(TestTask {
                title: title.to_string(),
                coach_username: coach_username.to_string(),
                player_usernames: players.iter().map(|p| p.to_string()).collect(),
            });
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            INIT.call_once(|| {
                let _ = env_logger::Builder::from_env(
                    env_logger::Env::default().default_filter_or("debug"),
                )
                .is_test(true)
                .try_init();
            });

            let pool = SqlitePool::connect("sqlite::memory:").await?;

            sqlx::migrate!("./migrations").run(&pool).await?;

            let mut academy_id_map: HashMap<String, i64> = HashMap::new();
            let mut user_id_map: HashMap<String, i64> = HashMap::new();
            let mut task_id_map: HashMap<String, i64> = HashMap::new();

            for academy in &self.academies {
                let created = create_academy(&pool, &academy.name, &academy.location).await?;
                academy_id_map.insert(academy.name.clone(), created.id);
            }

            for user in self.users.iter().filter(|u| u.role != Role::Parent) {
                let academy = match &user.academy {
                    Some(name) => Some(academy_id_map.get(name).copied().ok_or_else(|| {
                        AppError::Internal(format!("Unknown test academy {}", name))
                    })?),
                    None => None,
                };

                let profile = (user.sport.is_some() || academy.is_some()).then_some(ProfileSummary {
                    sport: user.sport,
                    academy,
                });

                let created = register_account(
                    &pool,
                    NewAccount {
                        username: &user.username,
                        email: &format!("{}@example.com", user.username),
                        password: &user.password,
                        role: user.role,
                        profile,
                    },
                )
                .await?;

                user_id_map.insert(user.username.clone(), created.id);
            }

            for parent in self.users.iter().filter(|u| u.role == Role::Parent) {
                let child_username = parent.child_username.as_deref().unwrap_or_default();
                let child_id = user_id_map.get(child_username).copied().ok_or_else(|| {
                    AppError::Internal(format!("Unknown test child {}", child_username))
                })?;
                let child = get_user(&pool, child_id).await?;
                let child_player_id = child.player_id.unwrap_or_default();

                let (created, _) = register_parent(
                    &pool,
                    &parent.username,
                    &format!("{}@example.com", parent.username),
                    &parent.password,
                    &child_player_id,
                )
                .await?;

                user_id_map.insert(parent.username.clone(), created.id);
            }

            for task in &self.tasks {
                let coach_id = user_id_map.get(&task.coach_username).copied().ok_or_else(|| {
                    AppError::Internal(format!("Unknown test coach {}", task.coach_username))
                })?;
                let coach = get_user(&pool, coach_id).await?;

                let players = task
                    .player_usernames
                    .iter()
                    .filter_map(|name| user_id_map.get(name).copied())
                    .collect();

                let created = create_task(
                    &pool,
                    &coach,
                    NewTask {
                        title: task.title.clone(),
                        description: format!("{} description", task.title),
                        due_date: None,
                        time_limit_minutes: None,
                        players,
                    },
                )
                .await?;

                task_id_map.insert(task.title.clone(), created.id);
            }

            Ok(TestDb {
                pool,
                academy_id_map,
                user_id_map,
                task_id_map,
            })
        }
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub academy_id_map: HashMap<String, i64>,
        pub user_id_map: HashMap<String, i64>,
        pub task_id_map: HashMap<String, i64>,
    }

    impl TestDb {
        pub fn user_id(&self, username: &str) -> Option<i64> {
            self.user_id_map.get(username).copied()
        }

        pub fn academy_id(&self, name: &str) -> Option<i64> {
            self.academy_id_map.get(name).copied()
        }

        pub fn task_id(&self, title: &str) -> Option<i64> {
            self.task_id_map.get(title).copied()
        }

        pub async fn user(&self, username: &str) -> Result<User, AppError> {
            let id = self
                .user_id(username)
                .ok_or_else(|| AppError::NotFound(format!("No test user {}", username)))?;
            get_user(&self.pool, id).await
        }

        pub async fn completion_count(&self, task_id: i64, player_id: i64) -> Result<i64, sqlx::Error> {
            let (count,): (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM task_completions WHERE task_id = ? AND player_id = ?",
            )
            .bind(task_id)
            .bind(player_id)
            .fetch_one(&self.pool)
            .await?;

            Ok(count)
        }
    }
}

#[cfg(test)]
pub mod test_utils {
    pub use super::test_db::{STANDARD_PASSWORD, TestDb, TestDbBuilder};

    use crate::api::LoginResponse;
    use crate::env::Settings;
    use crate::init_rocket;
    use crate::models::Sport;
    use rocket::http::{ContentType, Header};
    use rocket::local::asynchronous::Client;
    use serde_json::json;

    pub async fn setup_test_client(test_db: TestDb) -> (Client, TestDb) {
        let settings = Settings {
            database_url: "sqlite::memory:".to_string(),
            ..Settings::default()
        };

        let rocket = init_rocket(test_db.pool.clone(), settings);

        let client = Client::untracked(rocket)
            .await
            .expect("Failed to create Rocket client");

        (client, test_db)
    }

    /// Logs in and returns the session token for use as a bearer header.
    pub async fn login_test_user(client: &Client, username: &str, password: &str) -> String {
        let response = client
            .post("/api/login")
            .header(ContentType::JSON)
            .body(json!({ "username": username, "password": password }).to_string())
            .dispatch()
            .await;

        let body = response.into_string().await.expect("Empty login response");
        let login: LoginResponse = serde_json::from_str(&body).expect("Invalid login response");

        assert!(login.success, "Login failed for {}: {:?}", username, login.error);
        login.token.expect("Login response carried no token")
    }

    pub fn bearer(token: &str) -> Header<'static> {
        Header::new("Authorization", format!("Bearer {}", token))
    }

    /// Academy "North Campus"; tennis coach `coach_user` at North Campus;
    /// football coach `other_coach`; players `player_one` and `player_two`;
    /// `parent_user` linked to `player_one`; `manager_user`; and the task
    /// "Serve practice" by `coach_user` for both players.
    pub async fn create_standard_test_db() -> TestDb {
        TestDbBuilder::new()
            .academy("North Campus", "12 Court Lane")
            .coach_with_profile("coach_user", Sport::Tennis, Some("North Campus"))
            .coach_with_profile("other_coach", Sport::Football, None)
            .player("player_one")
            .player("player_two")
            .parent_of("parent_user", "player_one")
            .management("manager_user")
            .task("Serve practice", "coach_user", &["player_one", "player_two"])
            .build()
            .await
            .expect("Failed to build standard test database")
    }
}
