use anyhow::Error;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sport {
    TableTennis,
    Football,
    Athletics,
    Cricket,
    Badminton,
    Basketball,
    Swimming,
    Boxing,
    Wrestling,
    Tennis,
    Hockey,
    Cycling,
}

impl Sport {
    pub const ALL: [Sport; 12] = [
        Sport::TableTennis,
        Sport::Football,
        Sport::Athletics,
        Sport::Cricket,
        Sport::Badminton,
        Sport::Basketball,
        Sport::Swimming,
        Sport::Boxing,
        Sport::Wrestling,
        Sport::Tennis,
        Sport::Hockey,
        Sport::Cycling,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Sport::TableTennis => "table_tennis",
            Sport::Football => "football",
            Sport::Athletics => "athletics",
            Sport::Cricket => "cricket",
            Sport::Badminton => "badminton",
            Sport::Basketball => "basketball",
            Sport::Swimming => "swimming",
            Sport::Boxing => "boxing",
            Sport::Wrestling => "wrestling",
            Sport::Tennis => "tennis",
            Sport::Hockey => "hockey",
            Sport::Cycling => "cycling",
        }
    }
}

impl FromStr for Sport {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Sport::ALL
            .iter()
            .copied()
            .find(|sport| sport.as_str() == s)
            .ok_or_else(|| Error::msg(format!("Unknown sport: {}", s)))
    }
}

impl fmt::Display for Sport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parses an optional sport column. Unknown values read back as no sport.
pub(crate) fn parse_sport(value: Option<String>) -> Option<Sport> {
    value.and_then(|s| s.parse().ok())
}

/// A loosely typed statistic. Integers are tried before floats so `12` stays `12`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

pub type Stats = BTreeMap<String, StatValue>;

fn to_utc(dt: NaiveDateTime) -> DateTime<Utc> {
    DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc)
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Academy {
    pub id: i64,
    pub name: String,
    pub location: String,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbAcademy {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub location: Option<String>,
}

impl From<DbAcademy> for Academy {
    fn from(academy: DbAcademy) -> Self {
        Self {
            id: academy.id.unwrap_or_default(),
            name: academy.name.unwrap_or_default(),
            location: academy.location.unwrap_or_default(),
        }
    }
}

/// The slice of a profile embedded in account payloads.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct ProfileSummary {
    pub sport: Option<Sport>,
    pub academy: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Profile {
    pub id: i64,
    pub user_id: i64,
    pub sport: Option<Sport>,
    pub academy: Option<i64>,
    pub study_details: String,
    pub stats: Stats,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbProfile {
    pub id: Option<i64>,
    pub user_id: Option<i64>,
    pub sport: Option<String>,
    pub academy_id: Option<i64>,
    pub study_details: Option<String>,
    pub stats: Option<String>,
}

impl From<DbProfile> for Profile {
    fn from(profile: DbProfile) -> Self {
        Self {
            id: profile.id.unwrap_or_default(),
            user_id: profile.user_id.unwrap_or_default(),
            sport: parse_sport(profile.sport),
            academy: profile.academy_id,
            study_details: profile.study_details.unwrap_or_default(),
            stats: profile
                .stats
                .and_then(|raw| serde_json::from_str(&raw).ok())
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ParentChildLink {
    pub id: i64,
    pub parent_id: i64,
    pub child_id: i64,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbParentChildLink {
    pub id: Option<i64>,
    pub parent_id: Option<i64>,
    pub child_id: Option<i64>,
}

impl From<DbParentChildLink> for ParentChildLink {
    fn from(link: DbParentChildLink) -> Self {
        Self {
            id: link.id.unwrap_or_default(),
            parent_id: link.parent_id.unwrap_or_default(),
            child_id: link.child_id.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub assigned_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub due_date: Option<NaiveDate>,
    pub time_limit_minutes: Option<u32>,
    pub academy: Option<i64>,
    pub sport: Option<Sport>,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbTask {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub assigned_by: Option<i64>,
    pub created_at: Option<NaiveDateTime>,
    pub due_date: Option<NaiveDate>,
    pub time_limit_minutes: Option<i64>,
    pub academy_id: Option<i64>,
    pub sport: Option<String>,
}

impl From<DbTask> for Task {
    fn from(task: DbTask) -> Self {
        Self {
            id: task.id.unwrap_or_default(),
            title: task.title.unwrap_or_default(),
            description: task.description.unwrap_or_default(),
            assigned_by: task.assigned_by,
            created_at: task.created_at.map(to_utc).unwrap_or_else(Utc::now),
            due_date: task.due_date,
            time_limit_minutes: task
                .time_limit_minutes
                .and_then(|minutes| u32::try_from(minutes).ok()),
            academy: task.academy_id,
            sport: parse_sport(task.sport),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TaskCompletion {
    pub id: i64,
    pub task: i64,
    pub player: i64,
    pub player_username: String,
    pub completed: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub time_taken_seconds: Option<i64>,
    pub notes: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbTaskCompletion {
    pub id: Option<i64>,
    pub task_id: Option<i64>,
    pub player_id: Option<i64>,
    pub player_username: Option<String>,
    pub completed: Option<bool>,
    pub started_at: Option<NaiveDateTime>,
    pub time_taken_seconds: Option<i64>,
    pub notes: Option<String>,
    pub updated_at: Option<NaiveDateTime>,
}

impl From<DbTaskCompletion> for TaskCompletion {
    fn from(db: DbTaskCompletion) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            task: db.task_id.unwrap_or_default(),
            player: db.player_id.unwrap_or_default(),
            player_username: db.player_username.unwrap_or_default(),
            completed: db.completed.unwrap_or_default(),
            started_at: db.started_at.map(to_utc),
            time_taken_seconds: db.time_taken_seconds,
            notes: db.notes.unwrap_or_default(),
            updated_at: db.updated_at.map(to_utc).unwrap_or_else(Utc::now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sport_parses_snake_case_names() {
        assert_eq!("table_tennis".parse::<Sport>().unwrap(), Sport::TableTennis);
        assert_eq!(Sport::TableTennis.to_string(), "table_tennis");
        assert!("quidditch".parse::<Sport>().is_err());
        assert_eq!(parse_sport(Some("quidditch".to_string())), None);
    }

    #[test]
    fn test_stats_keep_value_kinds() {
        let stats: Stats =
            serde_json::from_str(r#"{"goals": 12, "avg_speed": 7.5, "captain": true, "foot": "left"}"#)
                .unwrap();

        assert_eq!(stats["goals"], StatValue::Integer(12));
        assert_eq!(stats["avg_speed"], StatValue::Float(7.5));
        assert_eq!(stats["captain"], StatValue::Bool(true));
        assert_eq!(stats["foot"], StatValue::Text("left".to_string()));

        let keys: Vec<&str> = stats.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["avg_speed", "captain", "foot", "goals"]);
    }

    #[test]
    fn test_profile_with_corrupt_stats_reads_empty_map() {
        let profile = Profile::from(DbProfile {
            id: Some(1),
            user_id: Some(2),
            sport: Some("tennis".to_string()),
            academy_id: None,
            study_details: None,
            stats: Some("not json".to_string()),
        });

        assert_eq!(profile.sport, Some(Sport::Tennis));
        assert!(profile.stats.is_empty());
    }
}
