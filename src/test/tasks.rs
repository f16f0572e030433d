#[cfg(test)]
mod tests {
    use crate::db::{
        DEFAULT_COMPLETION_NOTE, NewTask, TaskUpdate, complete_task, create_task, delete_academy,
        delete_task, find_completion, find_profile_by_user, get_task, get_task_completions,
        get_task_player_ids, list_tasks, list_tasks_for_player, start_task, update_task,
    };
    use crate::error::AppError;
    use crate::models::Sport;
    use crate::test::test_db::{TestDb, TestDbBuilder};
    use chrono::{Duration, Utc};
    use rocket::tokio;

    async fn serve_practice_db() -> TestDb {
        TestDbBuilder::new()
            .academy("Clay Courts", "5 Baseline Road")
            .coach_with_profile("tennis_coach", Sport::Tennis, Some("Clay Courts"))
            .coach("rival_coach")
            .player("player_seven")
            .player("player_eight")
            .player("bystander")
            .task("Serve practice", "tennis_coach", &["player_seven", "player_eight"])
            .build()
            .await
            .expect("Failed to build test database")
    }

    fn new_task(title: &str, players: Vec<i64>) -> NewTask {
        NewTask {
            title: title.to_string(),
            description: String::new(),
            due_date: None,
            time_limit_minutes: Some(30),
            players,
        }
    }

    #[tokio::test]
    async fn test_serve_practice_scenario() {
        let test_db = serve_practice_db().await;
        let task_id = test_db.task_id("Serve practice").unwrap();
        let seven = test_db.user_id("player_seven").unwrap();
        let eight = test_db.user_id("player_eight").unwrap();

        let task = get_task(&test_db.pool, task_id).await.unwrap();
        assert_eq!(task.sport, Some(Sport::Tennis));
        assert_eq!(task.academy, test_db.academy_id("Clay Courts"));
        assert_eq!(task.assigned_by, test_db.user_id("tennis_coach"));
        assert!(get_task_completions(&test_db.pool, task_id).await.unwrap().is_empty());

        let started = start_task(&test_db.pool, task_id, seven).await.unwrap();
        assert!(started.started_at.is_some());
        assert!(!started.completed);

        let completed = complete_task(&test_db.pool, task_id, seven, Some("Good form"))
            .await
            .unwrap();
        assert_eq!(completed.id, started.id);
        assert!(completed.completed);
        assert_eq!(completed.notes, "Good form");
        assert_eq!(completed.started_at, started.started_at);
        assert!(completed.time_taken_seconds.is_some_and(|s| s >= 0));

        let direct = complete_task(&test_db.pool, task_id, eight, None).await.unwrap();
        assert_ne!(direct.id, started.id);
        assert!(direct.completed);
        assert_eq!(direct.started_at, None);
        assert_eq!(direct.time_taken_seconds, None);
        assert_eq!(direct.notes, DEFAULT_COMPLETION_NOTE);

        let completions = get_task_completions(&test_db.pool, task_id).await.unwrap();
        assert_eq!(completions.len(), 2);
        assert_eq!(completions[0].player_username, "player_seven");
    }

    #[tokio::test]
    async fn test_start_twice_keeps_first_timestamp() {
        let test_db = serve_practice_db().await;
        let task_id = test_db.task_id("Serve practice").unwrap();
        let seven = test_db.user_id("player_seven").unwrap();

        let first = start_task(&test_db.pool, task_id, seven).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let second = start_task(&test_db.pool, task_id, seven).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.started_at, second.started_at);
        assert_eq!(test_db.completion_count(task_id, seven).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_repeated_workflow_calls_keep_one_row() {
        let test_db = serve_practice_db().await;
        let task_id = test_db.task_id("Serve practice").unwrap();
        let eight = test_db.user_id("player_eight").unwrap();

        complete_task(&test_db.pool, task_id, eight, Some("first")).await.unwrap();
        start_task(&test_db.pool, task_id, eight).await.unwrap();
        let last = complete_task(&test_db.pool, task_id, eight, None).await.unwrap();
        start_task(&test_db.pool, task_id, eight).await.unwrap();

        assert_eq!(test_db.completion_count(task_id, eight).await.unwrap(), 1);
        // Notes are overwritten on every completion.
        assert_eq!(last.notes, DEFAULT_COMPLETION_NOTE);
        assert!(last.completed);
    }

    #[tokio::test]
    async fn test_elapsed_time_is_fixed_at_first_completion() {
        let test_db = serve_practice_db().await;
        let task_id = test_db.task_id("Serve practice").unwrap();
        let seven = test_db.user_id("player_seven").unwrap();

        start_task(&test_db.pool, task_id, seven).await.unwrap();

        let ten_minutes_ago = (Utc::now() - Duration::minutes(10)).naive_utc();
        sqlx::query("UPDATE task_completions SET started_at = ? WHERE task_id = ? AND player_id = ?")
            .bind(ten_minutes_ago)
            .bind(task_id)
            .bind(seven)
            .execute(&test_db.pool)
            .await
            .unwrap();

        let first = complete_task(&test_db.pool, task_id, seven, None).await.unwrap();
        let taken = first.time_taken_seconds.expect("Timer should be stopped");
        assert!((599..=660).contains(&taken), "Unexpected elapsed time {}", taken);

        let again = complete_task(&test_db.pool, task_id, seven, Some("Recheck")).await.unwrap();
        assert_eq!(again.time_taken_seconds, Some(taken));
    }

    #[tokio::test]
    async fn test_task_takes_sport_and_academy_from_creator() {
        let test_db = TestDbBuilder::new()
            .academy("Academy A", "North")
            .academy("Academy B", "South")
            .coach_with_profile("football_coach", Sport::Football, Some("Academy A"))
            .player("striker")
            .build()
            .await
            .unwrap();

        let coach = test_db.user("football_coach").await.unwrap();
        let striker = test_db.user_id("striker").unwrap();

        let task = create_task(&test_db.pool, &coach, new_task("Shooting drill", vec![striker]))
            .await
            .unwrap();

        assert_eq!(task.sport, Some(Sport::Football));
        assert_eq!(task.academy, test_db.academy_id("Academy A"));
        assert_eq!(task.time_limit_minutes, Some(30));
        assert_eq!(get_task_player_ids(&test_db.pool, task.id).await.unwrap(), vec![striker]);
    }

    #[tokio::test]
    async fn test_coach_without_profile_values_creates_unscoped_task() {
        let test_db = serve_practice_db().await;
        let rival = test_db.user("rival_coach").await.unwrap();

        let profile = find_profile_by_user(&test_db.pool, rival.id)
            .await
            .unwrap()
            .expect("Coach should have a profile");
        assert_eq!(profile.sport, None);

        let task = create_task(&test_db.pool, &rival, new_task("Footwork", vec![]))
            .await
            .unwrap();
        assert_eq!(task.sport, None);
        assert_eq!(task.academy, None);
    }

    #[tokio::test]
    async fn test_non_player_assignment_is_rejected() {
        let test_db = serve_practice_db().await;
        let coach = test_db.user("tennis_coach").await.unwrap();
        let rival = test_db.user_id("rival_coach").unwrap();

        match create_task(&test_db.pool, &coach, new_task("Bad assignment", vec![rival])).await {
            Err(AppError::Validation(msg)) => assert!(msg.contains(&rival.to_string())),
            other => panic!("Expected Validation error, got {:?}", other.map(|t| t.id)),
        }

        assert_eq!(list_tasks(&test_db.pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_tasks_listed_newest_first() {
        let test_db = serve_practice_db().await;
        let coach = test_db.user("tennis_coach").await.unwrap();
        let seven = test_db.user_id("player_seven").unwrap();
        let bystander = test_db.user_id("bystander").unwrap();

        let volley = create_task(&test_db.pool, &coach, new_task("Volley drill", vec![seven]))
            .await
            .unwrap();

        let titles: Vec<String> = list_tasks_for_player(&test_db.pool, seven)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, vec!["Volley drill", "Serve practice"]);
        assert_eq!(list_tasks(&test_db.pool).await.unwrap()[0].id, volley.id);

        assert!(list_tasks_for_player(&test_db.pool, bystander).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_replaces_players_and_keeps_created_at() {
        let test_db = serve_practice_db().await;
        let task_id = test_db.task_id("Serve practice").unwrap();
        let bystander = test_db.user_id("bystander").unwrap();
        let before = get_task(&test_db.pool, task_id).await.unwrap();

        let updated = update_task(
            &test_db.pool,
            task_id,
            TaskUpdate {
                title: Some("Second serve practice".to_string()),
                sport: Some(Some(Sport::Badminton)),
                players: Some(vec![bystander, bystander]),
                ..TaskUpdate::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.title, "Second serve practice");
        assert_eq!(updated.sport, Some(Sport::Badminton));
        assert_eq!(updated.description, before.description);
        assert_eq!(updated.created_at, before.created_at);
        assert_eq!(
            get_task_player_ids(&test_db.pool, task_id).await.unwrap(),
            vec![bystander]
        );
    }

    #[tokio::test]
    async fn test_explicit_null_clears_task_fields() {
        let test_db = serve_practice_db().await;
        let task_id = test_db.task_id("Serve practice").unwrap();
        let due = Utc::now().date_naive() + Duration::days(7);

        let dated = update_task(
            &test_db.pool,
            task_id,
            TaskUpdate {
                due_date: Some(Some(due)),
                time_limit_minutes: Some(Some(30)),
                ..TaskUpdate::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(dated.due_date, Some(due));
        assert_eq!(dated.sport, Some(Sport::Tennis));
        assert!(dated.academy.is_some());

        let cleared = update_task(
            &test_db.pool,
            task_id,
            TaskUpdate {
                due_date: Some(None),
                academy: Some(None),
                sport: Some(None),
                ..TaskUpdate::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(cleared.due_date, None);
        assert_eq!(cleared.academy, None);
        assert_eq!(cleared.sport, None);
        assert_eq!(cleared.time_limit_minutes, Some(30));
    }

    #[tokio::test]
    async fn test_delete_task_removes_completions() {
        let test_db = serve_practice_db().await;
        let task_id = test_db.task_id("Serve practice").unwrap();
        let seven = test_db.user_id("player_seven").unwrap();

        start_task(&test_db.pool, task_id, seven).await.unwrap();
        delete_task(&test_db.pool, task_id).await.unwrap();

        assert!(find_completion(&test_db.pool, task_id, seven).await.unwrap().is_none());
        assert!(matches!(
            delete_task(&test_db.pool, task_id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_deleting_academy_cascades_to_tasks_and_profiles() {
        let test_db = serve_practice_db().await;
        let academy_id = test_db.academy_id("Clay Courts").unwrap();
        let coach_id = test_db.user_id("tennis_coach").unwrap();

        delete_academy(&test_db.pool, academy_id).await.unwrap();

        assert!(list_tasks(&test_db.pool).await.unwrap().is_empty());
        let profile = find_profile_by_user(&test_db.pool, coach_id)
            .await
            .unwrap()
            .expect("Coach should have a profile");
        assert_eq!(profile.academy, None);
        assert_eq!(profile.sport, Some(Sport::Tennis));
    }
}
