use chrono::NaiveDateTime;
#[cfg(feature = "ssr")]
use diesel::deserialize::{self, FromSql};
#[cfg(feature = "ssr")]
use diesel::prelude::*;
#[cfg(feature = "ssr")]
use diesel::{AsExpression, FromSqlRow};
#[cfg(feature = "ssr")]
use diesel::serialize::{self, IsNull, Output, ToSql};
#[cfg(feature = "ssr")]
use diesel::sql_types::Text;
#[cfg(feature = "ssr")]
use diesel::sqlite::Sqlite;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle of a tournament. Transitions are monotonic: upcoming ->
/// in_progress -> completed, or upcoming -> cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "ssr", derive(AsExpression, FromSqlRow))]
#[cfg_attr(feature = "ssr", diesel(sql_type = Text))]
pub enum TournamentStatus {
    Upcoming,
    InProgress,
    Completed,
    Cancelled,
}

impl TournamentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TournamentStatus::Upcoming => "upcoming",
            TournamentStatus::InProgress => "in_progress",
            TournamentStatus::Completed => "completed",
            TournamentStatus::Cancelled => "cancelled",
        }
    }

    /// Whether moving from `self` to `next` is a legal transition. Staying in
    /// place is always allowed.
    pub fn can_transition_to(&self, next: TournamentStatus) -> bool {
        use TournamentStatus::*;
        match (*self, next) {
            (a, b) if a == b => true,
            (Upcoming, InProgress) | (Upcoming, Cancelled) | (InProgress, Completed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for TournamentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TournamentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upcoming" => Ok(TournamentStatus::Upcoming),
            "in_progress" => Ok(TournamentStatus::InProgress),
            "completed" => Ok(TournamentStatus::Completed),
            "cancelled" => Ok(TournamentStatus::Cancelled),
            other => Err(format!("unrecognized tournament status: {}", other)),
        }
    }
}

#[cfg(feature = "ssr")]
impl ToSql<Text, Sqlite> for TournamentStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
        out.set_value(self.as_str());
        Ok(IsNull::No)
    }
}

#[cfg(feature = "ssr")]
impl FromSql<Text, Sqlite> for TournamentStatus {
    fn from_sql(bytes: <Sqlite as diesel::backend::Backend>::RawValue<'_>) -> deserialize::Result<Self> {
        let s = <String as FromSql<Text, Sqlite>>::from_sql(bytes)?;
        s.parse().map_err(|e: String| e.into())
    }
}

/// Lifecycle of a match within a tournament.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "ssr", derive(AsExpression, FromSqlRow))]
#[cfg_attr(feature = "ssr", diesel(sql_type = Text))]
pub enum MatchStatus {
    Pending,
    InProgress,
    Completed,
    Disputed,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Pending => "pending",
            MatchStatus::InProgress => "in_progress",
            MatchStatus::Completed => "completed",
            MatchStatus::Disputed => "disputed",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MatchStatus::Pending),
            "in_progress" => Ok(MatchStatus::InProgress),
            "completed" => Ok(MatchStatus::Completed),
            "disputed" => Ok(MatchStatus::Disputed),
            other => Err(format!("unrecognized match status: {}", other)),
        }
    }
}

#[cfg(feature = "ssr")]
impl ToSql<Text, Sqlite> for MatchStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
        out.set_value(self.as_str());
        Ok(IsNull::No)
    }
}

#[cfg(feature = "ssr")]
impl FromSql<Text, Sqlite> for MatchStatus {
    fn from_sql(bytes: <Sqlite as diesel::backend::Backend>::RawValue<'_>) -> deserialize::Result<Self> {
        let s = <String as FromSql<Text, Sqlite>>::from_sql(bytes)?;
        s.parse().map_err(|e: String| e.into())
    }
}

/// Public view of an account. Credentials and confirmation state stay on the
/// server in [`AuthRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ssr", derive(Queryable, Selectable))]
#[cfg_attr(feature = "ssr", diesel(table_name = crate::schema::users))]
#[cfg_attr(feature = "ssr", diesel(check_for_backend(Sqlite)))]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: Option<String>,
    pub wallet_balance: f64,
    pub game_id: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Full account row, including credential fields. Server side only.
#[cfg(feature = "ssr")]
#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(Sqlite))]
pub struct AuthRecord {
    pub id: String,
    pub email: String,
    pub username: Option<String>,
    pub password_hash: String,
    pub wallet_balance: f64,
    pub game_id: Option<String>,
    pub confirmation_code: Option<String>,
    pub email_confirmed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[cfg(feature = "ssr")]
impl From<AuthRecord> for User {
    fn from(r: AuthRecord) -> Self {
        User {
            id: r.id,
            email: r.email,
            username: r.username,
            wallet_balance: r.wallet_balance,
            game_id: r.game_id,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[cfg(feature = "ssr")]
#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser<'a> {
    pub id: &'a str,
    pub email: &'a str,
    pub username: Option<&'a str>,
    pub password_hash: &'a str,
    pub wallet_balance: f64,
    pub confirmation_code: Option<&'a str>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    // game_id and email_confirmed_at start out NULL
}

#[cfg(feature = "ssr")]
#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = crate::schema::sessions)]
#[diesel(check_for_backend(Sqlite))]
pub struct Session {
    pub id: i32,
    pub user_id: String,
    pub token: String,
    pub created_at: NaiveDateTime,
    pub expires_at: Option<NaiveDateTime>,
}

#[cfg(feature = "ssr")]
#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::sessions)]
pub struct NewSession<'a> {
    pub user_id: &'a str,
    pub token: &'a str,
    pub created_at: NaiveDateTime,
    pub expires_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ssr", derive(Queryable, Selectable))]
#[cfg_attr(feature = "ssr", diesel(table_name = crate::schema::tournaments))]
#[cfg_attr(feature = "ssr", diesel(check_for_backend(Sqlite)))]
pub struct Tournament {
    pub id: String,
    pub title: String,
    pub game_type: String,
    pub entry_fee: f64,
    pub prize_pool: f64,
    pub max_players: i32,
    pub current_players: i32,
    pub start_time: NaiveDateTime,
    pub status: TournamentStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Creation payload. The server assigns id, current_players, and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TournamentCreate {
    pub title: String,
    pub game_type: String,
    pub entry_fee: f64,
    pub prize_pool: f64,
    pub max_players: i32,
    pub start_time: NaiveDateTime,
    pub status: TournamentStatus,
}

/// Partial update. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ssr", derive(AsChangeset))]
#[cfg_attr(feature = "ssr", diesel(table_name = crate::schema::tournaments))]
pub struct TournamentUpdate {
    pub title: Option<String>,
    pub game_type: Option<String>,
    pub entry_fee: Option<f64>,
    pub prize_pool: Option<f64>,
    pub max_players: Option<i32>,
    pub current_players: Option<i32>,
    pub start_time: Option<NaiveDateTime>,
    pub status: Option<TournamentStatus>,
}

#[cfg(feature = "ssr")]
#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::tournaments)]
pub struct NewTournament<'a> {
    pub id: &'a str,
    pub title: &'a str,
    pub game_type: &'a str,
    pub entry_fee: f64,
    pub prize_pool: f64,
    pub max_players: i32,
    pub current_players: i32,
    pub start_time: NaiveDateTime,
    pub status: TournamentStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ssr", derive(Queryable, Selectable))]
#[cfg_attr(feature = "ssr", diesel(table_name = crate::schema::matches))]
#[cfg_attr(feature = "ssr", diesel(check_for_backend(Sqlite)))]
pub struct Match {
    pub id: String,
    pub tournament_id: String,
    pub player1_id: String,
    pub player2_id: Option<String>,
    pub winner_id: Option<String>,
    pub status: MatchStatus,
    pub score: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Creation payload. The server assigns id and timestamps. `player2_id` may
/// be `None` for a bye or unfilled slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCreate {
    pub tournament_id: String,
    pub player1_id: String,
    pub player2_id: Option<String>,
    pub winner_id: Option<String>,
    pub status: MatchStatus,
    pub score: Option<String>,
}

/// Partial update. `None` fields are left unchanged; an already-set nullable
/// field cannot be cleared through this payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ssr", derive(AsChangeset))]
#[cfg_attr(feature = "ssr", diesel(table_name = crate::schema::matches))]
pub struct MatchUpdate {
    pub player1_id: Option<String>,
    pub player2_id: Option<String>,
    pub winner_id: Option<String>,
    pub status: Option<MatchStatus>,
    pub score: Option<String>,
}

#[cfg(feature = "ssr")]
#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::matches)]
pub struct NewMatch<'a> {
    pub id: &'a str,
    pub tournament_id: &'a str,
    pub player1_id: &'a str,
    pub player2_id: Option<&'a str>,
    pub winner_id: Option<&'a str>,
    pub status: MatchStatus,
    pub score: Option<&'a str>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Minimal player identity embedded in joined match results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ssr", derive(Queryable, Selectable))]
#[cfg_attr(feature = "ssr", diesel(table_name = crate::schema::users))]
#[cfg_attr(feature = "ssr", diesel(check_for_backend(Sqlite)))]
pub struct PlayerRef {
    pub id: String,
    pub username: Option<String>,
    pub game_id: Option<String>,
}

/// A match joined with the referenced player rows. A `None` player means the
/// slot is unfilled or the referenced account no longer exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchWithPlayers {
    pub summary: Match,
    pub player1: Option<PlayerRef>,
    pub player2: Option<PlayerRef>,
    pub winner: Option<PlayerRef>,
}

/// A tournament joined with its matches, ordered by creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TournamentWithMatches {
    pub tournament: Tournament,
    pub matches: Vec<Match>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for s in [
            TournamentStatus::Upcoming,
            TournamentStatus::InProgress,
            TournamentStatus::Completed,
            TournamentStatus::Cancelled,
        ] {
            assert_eq!(s.as_str().parse::<TournamentStatus>(), Ok(s));
        }
        assert!("paused".parse::<TournamentStatus>().is_err());

        for s in [
            MatchStatus::Pending,
            MatchStatus::InProgress,
            MatchStatus::Completed,
            MatchStatus::Disputed,
        ] {
            assert_eq!(s.as_str().parse::<MatchStatus>(), Ok(s));
        }
        assert!("abandoned".parse::<MatchStatus>().is_err());
    }

    #[test]
    fn test_tournament_status_transitions() {
        use TournamentStatus::*;

        assert!(Upcoming.can_transition_to(InProgress));
        assert!(Upcoming.can_transition_to(Cancelled));
        assert!(InProgress.can_transition_to(Completed));
        assert!(Upcoming.can_transition_to(Upcoming));

        assert!(!InProgress.can_transition_to(Upcoming));
        assert!(!InProgress.can_transition_to(Cancelled));
        assert!(!Completed.can_transition_to(InProgress));
        assert!(!Cancelled.can_transition_to(Upcoming));
        assert!(!Upcoming.can_transition_to(Completed));
    }
}
