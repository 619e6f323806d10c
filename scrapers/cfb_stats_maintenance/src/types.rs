use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Written for every imported row regardless of CSV content.
pub const PLACEHOLDER_STRENGTH_OF_SCHEDULE: f64 = 50.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingRecord {
    pub team_name: String,
    pub power_rating: f64,
    pub offense_rating: f64,
    pub defense_rating: f64,
    pub strength_of_schedule: f64,
    pub season: i32,
}

/// Season type tag from `games.season_type`. Values other than `regular` and
/// `postseason` (`allstar`, `spring_regular`, ...) are kept, trimmed and
/// lower-cased, and sent to the API unchanged.
///
/// Equality and ordering follow the string value, so `postseason` sorts
/// before `regular`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SeasonType {
    Regular,
    Postseason,
    Other(String),
}

impl SeasonType {
    pub fn as_str(&self) -> &str {
        match self {
            SeasonType::Regular => "regular",
            SeasonType::Postseason => "postseason",
            SeasonType::Other(value) => value.as_str(),
        }
    }
}

impl PartialEq for SeasonType {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for SeasonType {}

impl Hash for SeasonType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl PartialOrd for SeasonType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SeasonType {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl fmt::Display for SeasonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for SeasonType {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "regular" => SeasonType::Regular,
            "postseason" => SeasonType::Postseason,
            other => SeasonType::Other(other.to_string()),
        }
    }
}

impl From<String> for SeasonType {
    fn from(value: String) -> Self {
        SeasonType::from(value.as_str())
    }
}

impl From<SeasonType> for String {
    fn from(value: SeasonType) -> Self {
        value.as_str().to_string()
    }
}

/// A game with no rows in `drives`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingGame {
    pub game_id: i64,
    pub season: i32,
    pub week: i32,
    pub season_type: SeasonType,
    pub home_team: String,
    pub away_team: String,
    pub drive_count: i64,
}

/// The unit of re-sync: one week of one season type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct WeekKey {
    pub week: i32,
    pub season_type: SeasonType,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct SeasonCount {
    pub season: Option<i32>,
    pub teams: i64,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct RatedTeam {
    pub team_name: String,
    pub season: Option<i32>,
    pub power_rating: Option<f64>,
    pub offense_rating: Option<f64>,
    pub defense_rating: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_season_type_parsing() {
        assert_eq!(SeasonType::from("regular"), SeasonType::Regular);
        assert_eq!(SeasonType::from(" Postseason "), SeasonType::Postseason);
        assert_eq!(
            SeasonType::from("spring_regular"),
            SeasonType::Other("spring_regular".to_string())
        );
        assert_eq!(SeasonType::from("allstar").as_str(), "allstar");
    }

    #[test]
    fn test_week_keys_order_by_week_then_season_type_name() {
        let mut keys = vec![
            WeekKey { week: 5, season_type: SeasonType::Regular },
            WeekKey { week: 3, season_type: SeasonType::Regular },
            WeekKey { week: 3, season_type: SeasonType::Other("allstar".to_string()) },
            WeekKey { week: 3, season_type: SeasonType::Postseason },
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                WeekKey { week: 3, season_type: SeasonType::Other("allstar".to_string()) },
                WeekKey { week: 3, season_type: SeasonType::Postseason },
                WeekKey { week: 3, season_type: SeasonType::Regular },
                WeekKey { week: 5, season_type: SeasonType::Regular },
            ]
        );
    }
}
