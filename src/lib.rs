pub mod api;
pub mod app;
pub mod model;
pub mod retry;
#[cfg(feature = "ssr")]
pub mod schema;
pub mod store;

#[cfg(feature = "ssr")]
use chrono::{Duration, Utc};
#[cfg(feature = "ssr")]
use diesel::connection::SimpleConnection;
#[cfg(feature = "ssr")]
use diesel::prelude::*;
#[cfg(feature = "ssr")]
use diesel::SqliteConnection;
#[cfg(feature = "ssr")]
use dotenvy::dotenv;
#[cfg(feature = "ssr")]
use std::env;
#[cfg(feature = "ssr")]
use std::io::{Error as IoError, ErrorKind};
#[cfg(feature = "ssr")]
use uuid::Uuid;

#[cfg(feature = "ssr")]
use crate::model::{
    AuthRecord, Match, MatchCreate, MatchUpdate, MatchWithPlayers, NewMatch, NewSession,
    NewTournament, NewUser, PlayerRef, Session, Tournament, TournamentCreate, TournamentStatus,
    TournamentUpdate, TournamentWithMatches, User,
};
#[cfg(feature = "ssr")]
use crate::schema::{matches, sessions, tournaments, users};

#[cfg(feature = "hydrate")]
#[wasm_bindgen::prelude::wasm_bindgen]
pub fn hydrate() {
    use crate::app::*;
    console_error_panic_hook::set_once();
    leptos::mount::hydrate_body(App);
}

/// Sessions expire this long after issuance.
#[cfg(feature = "ssr")]
const SESSION_TTL_DAYS: i64 = 7;

// Generated once so that bcrypt::verify takes similar time as a real check
// when the email is unknown.
#[cfg(feature = "ssr")]
const DUMMY_HASH: &str = "$2b$12$LQv3c1yqBWVHxkd0LHAkCOYz6TtxMQJqhN8/LewdBPj4J/HS.iK8W";

#[cfg(feature = "ssr")]
pub fn establish_connection() -> SqliteConnection {
    dotenv().ok();
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set in .env");
    let mut conn = SqliteConnection::establish(&database_url)
        .expect(&format!("Error connecting to {}", database_url));

    // Enable WAL mode to allow concurrent reads during writes, and a timeout to retry locked
    // operations.
    conn.batch_execute(
        "PRAGMA foreign_keys = ON; \
        PRAGMA journal_mode = WAL; \
        PRAGMA synchronous = NORMAL; \
        PRAGMA busy_timeout = 10000;",
    )
    .expect("Failed to set SQLite PRAGMAs");

    conn
}

/// Wraps a domain violation (duplicate email, bad credentials, invariant
/// breach) in the query error type so every operation has one error channel.
#[cfg(feature = "ssr")]
fn data_error(message: &str) -> diesel::result::Error {
    diesel::result::Error::QueryBuilderError(Box::new(IoError::new(ErrorKind::Other, message)))
}

/// Creates an unconfirmed account. The password is stored as a bcrypt hash
/// and a confirmation code is generated; sign-in is rejected until the code
/// has been exchanged via [`confirm_email`].
/// Returns the public user record and the confirmation code.
#[cfg(feature = "ssr")]
pub fn create_user(
    conn: &mut SqliteConnection,
    email: &str,
    password: &str,
    username: Option<&str>,
) -> Result<(User, String), diesel::result::Error> {
    conn.transaction(|conn| {
        let existing: i64 = users::table
            .filter(users::email.eq(email))
            .count()
            .get_result(conn)?;
        if existing > 0 {
            return Err(data_error("User already registered"));
        }

        let password_hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)
            .map_err(|e| data_error(&format!("Failed to hash password: {}", e)))?;

        let id = Uuid::new_v4().to_string();
        let code = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();
        let new_user = NewUser {
            id: &id,
            email,
            username,
            password_hash: &password_hash,
            wallet_balance: 0.0,
            confirmation_code: Some(&code),
            created_at: now,
            updated_at: now,
        };
        diesel::insert_into(users::table)
            .values(&new_user)
            .execute(conn)?;

        let user: User = users::table
            .filter(users::id.eq(&id))
            .select(User::as_select())
            .first(conn)?;

        Ok((user, code))
    })
}

/// Validates credentials and issues a session. Credential failures and
/// unconfirmed accounts are reported verbatim; neither is retriable.
#[cfg(feature = "ssr")]
pub fn verify_sign_in(
    conn: &mut SqliteConnection,
    email: &str,
    password: &str,
) -> Result<(User, String), diesel::result::Error> {
    let record: Option<AuthRecord> = users::table
        .filter(users::email.eq(email))
        .select(AuthRecord::as_select())
        .first(conn)
        .optional()?;

    match record {
        Some(record) => {
            let ok = bcrypt::verify(password, &record.password_hash)
                .map_err(|e| data_error(&format!("Failed to verify password: {}", e)))?;
            if !ok {
                return Err(data_error("Invalid login credentials"));
            }
            if record.email_confirmed_at.is_none() {
                return Err(data_error("Email not confirmed"));
            }
            let token = create_session(conn, &record.id)?;
            Ok((record.into(), token))
        }
        None => {
            // Timing-safe: always perform bcrypt::verify even when the email
            // is unknown.
            let _ = bcrypt::verify(password, DUMMY_HASH);
            Err(data_error("Invalid login credentials"))
        }
    }
}

/// Exchanges a confirmation code for a confirmed account and a fresh
/// session. The code is single-use.
#[cfg(feature = "ssr")]
pub fn confirm_email(
    conn: &mut SqliteConnection,
    code: &str,
) -> Result<(User, String), diesel::result::Error> {
    conn.transaction(|conn| {
        let record: Option<AuthRecord> = users::table
            .filter(users::confirmation_code.eq(code))
            .select(AuthRecord::as_select())
            .first(conn)
            .optional()?;
        let record = record.ok_or(diesel::result::Error::NotFound)?;

        let now = Utc::now().naive_utc();
        diesel::update(users::table.filter(users::id.eq(&record.id)))
            .set((
                users::email_confirmed_at.eq(Some(now)),
                users::confirmation_code.eq(None::<String>),
                users::updated_at.eq(now),
            ))
            .execute(conn)?;

        let user: User = users::table
            .filter(users::id.eq(&record.id))
            .select(User::as_select())
            .first(conn)?;
        let token = create_session(conn, &user.id)?;

        Ok((user, token))
    })
}

/// Issues a session token for a user.
#[cfg(feature = "ssr")]
pub fn create_session(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> Result<String, diesel::result::Error> {
    let token = Uuid::new_v4().to_string();
    let now = Utc::now().naive_utc();
    let new_session = NewSession {
        user_id,
        token: &token,
        created_at: now,
        expires_at: Some(now + Duration::days(SESSION_TTL_DAYS)),
    };
    diesel::insert_into(sessions::table)
        .values(&new_session)
        .execute(conn)?;
    Ok(token)
}

/// Resolves a session token to its user. Expired or unknown tokens yield
/// NotFound.
#[cfg(feature = "ssr")]
pub fn get_user_by_session(
    conn: &mut SqliteConnection,
    token: &str,
) -> Result<User, diesel::result::Error> {
    // Validate token format.
    if Uuid::parse_str(token).is_err() {
        return Err(diesel::result::Error::NotFound);
    }

    let session: Option<Session> = sessions::table
        .filter(sessions::token.eq(token))
        .select(Session::as_select())
        .first(conn)
        .optional()?;
    let session = session.ok_or(diesel::result::Error::NotFound)?;

    if let Some(expires_at) = session.expires_at {
        if expires_at < Utc::now().naive_utc() {
            return Err(diesel::result::Error::NotFound);
        }
    }

    users::table
        .filter(users::id.eq(&session.user_id))
        .select(User::as_select())
        .first(conn)
}

/// Deletes a session by token. Returns the number of affected rows.
#[cfg(feature = "ssr")]
pub fn delete_session(
    conn: &mut SqliteConnection,
    token: &str,
) -> Result<usize, diesel::result::Error> {
    diesel::delete(sessions::table.filter(sessions::token.eq(token))).execute(conn)
}

/// Removes sessions past their expiry. Returns the number of rows removed.
#[cfg(feature = "ssr")]
pub fn clear_expired_sessions(
    conn: &mut SqliteConnection,
) -> Result<usize, diesel::result::Error> {
    let now = Utc::now().naive_utc();
    diesel::delete(sessions::table.filter(sessions::expires_at.lt(now))).execute(conn)
}

/// Fetches all tournaments ordered by scheduled start time.
#[cfg(feature = "ssr")]
pub fn list_tournaments(
    conn: &mut SqliteConnection,
) -> Result<Vec<Tournament>, diesel::result::Error> {
    tournaments::table
        .order(tournaments::start_time.asc())
        .select(Tournament::as_select())
        .load(conn)
}

/// Fetches a tournament together with its matches, oldest match first.
#[cfg(feature = "ssr")]
pub fn get_tournament_with_matches(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<TournamentWithMatches, diesel::result::Error> {
    let tournament: Tournament = tournaments::table
        .filter(tournaments::id.eq(id))
        .select(Tournament::as_select())
        .first(conn)?;

    let matches: Vec<Match> = matches::table
        .filter(matches::tournament_id.eq(id))
        .order(matches::created_at.asc())
        .select(Match::as_select())
        .load(conn)?;

    Ok(TournamentWithMatches {
        tournament,
        matches,
    })
}

/// Creates a tournament. The server assigns id, timestamps, and a zero
/// player count.
#[cfg(feature = "ssr")]
pub fn insert_tournament(
    conn: &mut SqliteConnection,
    payload: &TournamentCreate,
) -> Result<Tournament, diesel::result::Error> {
    if payload.max_players <= 0 {
        return Err(data_error("max_players must be positive"));
    }

    let id = Uuid::new_v4().to_string();
    let now = Utc::now().naive_utc();
    let new_tournament = NewTournament {
        id: &id,
        title: &payload.title,
        game_type: &payload.game_type,
        entry_fee: payload.entry_fee,
        prize_pool: payload.prize_pool,
        max_players: payload.max_players,
        current_players: 0,
        start_time: payload.start_time,
        status: payload.status,
        created_at: now,
        updated_at: now,
    };
    diesel::insert_into(tournaments::table)
        .values(&new_tournament)
        .execute(conn)?;

    tournaments::table
        .filter(tournaments::id.eq(&id))
        .select(Tournament::as_select())
        .first(conn)
}

/// Applies a partial update to a tournament and bumps updated_at. Rejects
/// non-monotonic status transitions and any combination that would leave
/// more registered players than seats.
#[cfg(feature = "ssr")]
pub fn update_tournament(
    conn: &mut SqliteConnection,
    id: &str,
    changes: &TournamentUpdate,
) -> Result<Tournament, diesel::result::Error> {
    conn.transaction(|conn| {
        let existing: Tournament = tournaments::table
            .filter(tournaments::id.eq(id))
            .select(Tournament::as_select())
            .first(conn)?;

        if let Some(next) = changes.status {
            if !existing.status.can_transition_to(next) {
                return Err(data_error(&format!(
                    "Illegal status transition: {} -> {}",
                    existing.status, next
                )));
            }
        }

        let effective_players = changes.current_players.unwrap_or(existing.current_players);
        let effective_seats = changes.max_players.unwrap_or(existing.max_players);
        if effective_players > effective_seats {
            return Err(data_error("current_players cannot exceed max_players"));
        }

        let now = Utc::now().naive_utc();
        diesel::update(tournaments::table.filter(tournaments::id.eq(id)))
            .set((changes, tournaments::updated_at.eq(now)))
            .execute(conn)?;

        tournaments::table
            .filter(tournaments::id.eq(id))
            .select(Tournament::as_select())
            .first(conn)
    })
}

/// Deletes a tournament and its matches. Returns the number of tournament
/// rows removed.
#[cfg(feature = "ssr")]
pub fn delete_tournament(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<usize, diesel::result::Error> {
    conn.transaction(|conn| {
        diesel::delete(matches::table.filter(matches::tournament_id.eq(id))).execute(conn)?;
        diesel::delete(tournaments::table.filter(tournaments::id.eq(id))).execute(conn)
    })
}

/// Registers a user for an upcoming tournament: deducts the entry fee from
/// their wallet, adds it to the prize pool, and takes one seat.
#[cfg(feature = "ssr")]
pub fn join_tournament(
    conn: &mut SqliteConnection,
    tournament_id: &str,
    user_id: &str,
) -> Result<Tournament, diesel::result::Error> {
    conn.transaction(|conn| {
        let tournament: Tournament = tournaments::table
            .filter(tournaments::id.eq(tournament_id))
            .select(Tournament::as_select())
            .first(conn)?;

        if tournament.status != TournamentStatus::Upcoming {
            return Err(data_error("Tournament is not open for registration"));
        }
        if tournament.current_players >= tournament.max_players {
            return Err(data_error("Tournament is full"));
        }

        let user: User = users::table
            .filter(users::id.eq(user_id))
            .select(User::as_select())
            .first(conn)?;
        if user.wallet_balance < tournament.entry_fee {
            return Err(data_error("Insufficient wallet balance"));
        }

        let now = Utc::now().naive_utc();
        diesel::update(users::table.filter(users::id.eq(user_id)))
            .set((
                users::wallet_balance.eq(user.wallet_balance - tournament.entry_fee),
                users::updated_at.eq(now),
            ))
            .execute(conn)?;

        diesel::update(tournaments::table.filter(tournaments::id.eq(tournament_id)))
            .set((
                tournaments::current_players.eq(tournament.current_players + 1),
                tournaments::prize_pool.eq(tournament.prize_pool + tournament.entry_fee),
                tournaments::updated_at.eq(now),
            ))
            .execute(conn)?;

        tournaments::table
            .filter(tournaments::id.eq(tournament_id))
            .select(Tournament::as_select())
            .first(conn)
    })
}

/// Looks up an account by email.
#[cfg(feature = "ssr")]
pub fn find_user_by_email(
    conn: &mut SqliteConnection,
    email: &str,
) -> Result<User, diesel::result::Error> {
    users::table
        .filter(users::email.eq(email))
        .select(User::as_select())
        .first(conn)
}

/// Credits a wallet.
#[cfg(feature = "ssr")]
pub fn credit_wallet(
    conn: &mut SqliteConnection,
    user_id: &str,
    amount: f64,
) -> Result<User, diesel::result::Error> {
    conn.transaction(|conn| {
        let user: User = users::table
            .filter(users::id.eq(user_id))
            .select(User::as_select())
            .first(conn)?;
        diesel::update(users::table.filter(users::id.eq(user_id)))
            .set((
                users::wallet_balance.eq(user.wallet_balance + amount),
                users::updated_at.eq(Utc::now().naive_utc()),
            ))
            .execute(conn)?;
        users::table
            .filter(users::id.eq(user_id))
            .select(User::as_select())
            .first(conn)
    })
}

#[cfg(feature = "ssr")]
fn load_player_ref(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> Result<Option<PlayerRef>, diesel::result::Error> {
    users::table
        .filter(users::id.eq(user_id))
        .select(PlayerRef::as_select())
        .first(conn)
        .optional()
}

#[cfg(feature = "ssr")]
fn attach_players(
    conn: &mut SqliteConnection,
    summary: Match,
) -> Result<MatchWithPlayers, diesel::result::Error> {
    let player1 = load_player_ref(conn, &summary.player1_id)?;
    let player2 = match &summary.player2_id {
        Some(id) => load_player_ref(conn, id)?,
        None => None,
    };
    let winner = match &summary.winner_id {
        Some(id) => load_player_ref(conn, id)?,
        None => None,
    };
    Ok(MatchWithPlayers {
        summary,
        player1,
        player2,
        winner,
    })
}

#[cfg(feature = "ssr")]
fn winner_references_player(winner: Option<&str>, player1: &str, player2: Option<&str>) -> bool {
    match winner {
        None => true,
        Some(w) => w == player1 || player2 == Some(w),
    }
}

/// Fetches the matches of a tournament, oldest first, each joined with its
/// player records.
#[cfg(feature = "ssr")]
pub fn list_matches(
    conn: &mut SqliteConnection,
    tournament_id: &str,
) -> Result<Vec<MatchWithPlayers>, diesel::result::Error> {
    let summaries: Vec<Match> = matches::table
        .filter(matches::tournament_id.eq(tournament_id))
        .order(matches::created_at.asc())
        .select(Match::as_select())
        .load(conn)?;

    summaries
        .into_iter()
        .map(|m| attach_players(conn, m))
        .collect()
}

/// Fetches a single match joined with its player records.
#[cfg(feature = "ssr")]
pub fn get_match_with_players(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<MatchWithPlayers, diesel::result::Error> {
    let summary: Match = matches::table
        .filter(matches::id.eq(id))
        .select(Match::as_select())
        .first(conn)?;
    attach_players(conn, summary)
}

/// Creates a match inside an existing tournament. The server assigns id and
/// timestamps. A set winner must be one of the match players.
#[cfg(feature = "ssr")]
pub fn insert_match(
    conn: &mut SqliteConnection,
    payload: &MatchCreate,
) -> Result<Match, diesel::result::Error> {
    conn.transaction(|conn| {
        let tournament_exists: i64 = tournaments::table
            .filter(tournaments::id.eq(&payload.tournament_id))
            .count()
            .get_result(conn)?;
        if tournament_exists == 0 {
            return Err(diesel::result::Error::NotFound);
        }

        if !winner_references_player(
            payload.winner_id.as_deref(),
            &payload.player1_id,
            payload.player2_id.as_deref(),
        ) {
            return Err(data_error("winner_id must reference one of the match players"));
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();
        let new_match = NewMatch {
            id: &id,
            tournament_id: &payload.tournament_id,
            player1_id: &payload.player1_id,
            player2_id: payload.player2_id.as_deref(),
            winner_id: payload.winner_id.as_deref(),
            status: payload.status,
            score: payload.score.as_deref(),
            created_at: now,
            updated_at: now,
        };
        diesel::insert_into(matches::table)
            .values(&new_match)
            .execute(conn)?;

        matches::table
            .filter(matches::id.eq(&id))
            .select(Match::as_select())
            .first(conn)
    })
}

/// Applies a partial update to a match and bumps updated_at. The winner
/// invariant is checked against the post-update player slots.
#[cfg(feature = "ssr")]
pub fn update_match(
    conn: &mut SqliteConnection,
    id: &str,
    changes: &MatchUpdate,
) -> Result<Match, diesel::result::Error> {
    conn.transaction(|conn| {
        let existing: Match = matches::table
            .filter(matches::id.eq(id))
            .select(Match::as_select())
            .first(conn)?;

        let player1 = changes
            .player1_id
            .as_deref()
            .unwrap_or(&existing.player1_id);
        let player2 = changes
            .player2_id
            .as_deref()
            .or(existing.player2_id.as_deref());
        let winner = changes
            .winner_id
            .as_deref()
            .or(existing.winner_id.as_deref());
        if !winner_references_player(winner, player1, player2) {
            return Err(data_error("winner_id must reference one of the match players"));
        }

        let now = Utc::now().naive_utc();
        diesel::update(matches::table.filter(matches::id.eq(id)))
            .set((changes, matches::updated_at.eq(now)))
            .execute(conn)?;

        matches::table
            .filter(matches::id.eq(id))
            .select(Match::as_select())
            .first(conn)
    })
}

/// Deletes a match by id. Returns the number of affected rows.
#[cfg(feature = "ssr")]
pub fn delete_match(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<usize, diesel::result::Error> {
    diesel::delete(matches::table.filter(matches::id.eq(id))).execute(conn)
}

/// Wipes all application data.
#[cfg(feature = "ssr")]
pub fn reset_database(conn: &mut SqliteConnection) -> Result<(), diesel::result::Error> {
    conn.transaction(|conn| {
        diesel::delete(matches::table).execute(conn)?;
        diesel::delete(tournaments::table).execute(conn)?;
        diesel::delete(sessions::table).execute(conn)?;
        diesel::delete(users::table).execute(conn)?;
        Ok(())
    })
}

#[cfg(all(test, feature = "ssr"))]
mod tests {
    use super::*;
    use crate::model::MatchStatus;
    use chrono::NaiveDateTime;

    // Each test runs against its own in-memory database with the migrations
    // applied, so there is nothing to roll back.
    fn test_connection() -> SqliteConnection {
        let mut conn = SqliteConnection::establish(":memory:")
            .expect("Failed to open in-memory database");
        conn.batch_execute("PRAGMA foreign_keys = ON;")
            .expect("Failed to set SQLite PRAGMAs");
        conn.batch_execute(include_str!(
            "../migrations/2025-11-04-000000_create_tables/up.sql"
        ))
        .expect("Failed to apply schema");
        conn
    }

    fn start_time(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").expect("Bad timestamp literal")
    }

    fn tournament_payload(title: &str, start: &str) -> TournamentCreate {
        TournamentCreate {
            title: title.to_string(),
            game_type: "fifa".to_string(),
            entry_fee: 10.0,
            prize_pool: 50.0,
            max_players: 4,
            start_time: start_time(start),
            status: TournamentStatus::Upcoming,
        }
    }

    // Creates a confirmed user and returns it.
    fn seed_user(conn: &mut SqliteConnection, name: &str) -> User {
        let email = format!("{}@example.com", name);
        let (_, code) =
            create_user(conn, &email, "hunter22", Some(name)).expect("Failed to create user");
        let (user, _) = confirm_email(conn, &code).expect("Failed to confirm user");
        user
    }

    #[test]
    fn test_create_user_populates_server_fields() {
        let mut conn = test_connection();

        let (user, code) = create_user(&mut conn, "a@x.com", "hunter22", Some("ada"))
            .expect("Failed to create user");
        assert!(Uuid::parse_str(&user.id).is_ok());
        assert!(Uuid::parse_str(&code).is_ok());
        assert_eq!(user.email, "a@x.com");
        assert_eq!(user.username.as_deref(), Some("ada"));
        assert_eq!(user.wallet_balance, 0.0);
        assert!(user.game_id.is_none());
        assert!(user.created_at.and_utc().timestamp() > 0);

        // Duplicate email is rejected.
        let err = create_user(&mut conn, "a@x.com", "other-pass", None)
            .expect_err("Should reject duplicate email");
        assert!(err.to_string().contains("User already registered"));
    }

    #[test]
    fn test_sign_in_before_confirmation_fails() {
        let mut conn = test_connection();

        create_user(&mut conn, "a@x.com", "hunter22", None).expect("Failed to create user");

        // Sign-up then immediate sign-in: the rejection is surfaced verbatim.
        let err = verify_sign_in(&mut conn, "a@x.com", "hunter22")
            .expect_err("Should reject unconfirmed account");
        assert!(err.to_string().contains("Email not confirmed"));
    }

    #[test]
    fn test_confirm_email_then_sign_in() {
        let mut conn = test_connection();

        let (created, code) =
            create_user(&mut conn, "a@x.com", "hunter22", Some("ada")).expect("Failed to create");
        let (confirmed, token) = confirm_email(&mut conn, &code).expect("Failed to confirm");
        assert_eq!(confirmed.id, created.id);
        assert!(Uuid::parse_str(&token).is_ok());

        // The code is single-use.
        assert!(matches!(
            confirm_email(&mut conn, &code),
            Err(diesel::result::Error::NotFound)
        ));

        let (user, token) =
            verify_sign_in(&mut conn, "a@x.com", "hunter22").expect("Failed to sign in");
        assert_eq!(user.id, created.id);
        let resolved = get_user_by_session(&mut conn, &token).expect("Failed to resolve session");
        assert_eq!(resolved.id, created.id);

        // Wrong password and unknown email report the same failure.
        let err = verify_sign_in(&mut conn, "a@x.com", "wrong")
            .expect_err("Should reject bad password");
        assert!(err.to_string().contains("Invalid login credentials"));
        let err = verify_sign_in(&mut conn, "nobody@x.com", "hunter22")
            .expect_err("Should reject unknown email");
        assert!(err.to_string().contains("Invalid login credentials"));
    }

    #[test]
    fn test_sessions_expire_and_delete() {
        let mut conn = test_connection();
        let user = seed_user(&mut conn, "ada");

        let token = create_session(&mut conn, &user.id).expect("Failed to create session");
        assert!(get_user_by_session(&mut conn, &token).is_ok());

        // Malformed token.
        assert!(matches!(
            get_user_by_session(&mut conn, "not-a-uuid"),
            Err(diesel::result::Error::NotFound)
        ));

        // Sign-out removes the session.
        assert_eq!(delete_session(&mut conn, &token).unwrap(), 1);
        assert!(matches!(
            get_user_by_session(&mut conn, &token),
            Err(diesel::result::Error::NotFound)
        ));

        // An expired session behaves like an absent one.
        let stale = Uuid::new_v4().to_string();
        let past = Utc::now().naive_utc() - Duration::days(1);
        diesel::insert_into(sessions::table)
            .values(&NewSession {
                user_id: &user.id,
                token: &stale,
                created_at: past,
                expires_at: Some(past),
            })
            .execute(&mut conn)
            .expect("Failed to insert stale session");
        assert!(matches!(
            get_user_by_session(&mut conn, &stale),
            Err(diesel::result::Error::NotFound)
        ));
        assert_eq!(clear_expired_sessions(&mut conn).unwrap(), 1);
    }

    #[test]
    fn test_insert_tournament_assigns_server_fields() {
        let mut conn = test_connection();

        let payload = tournament_payload("Friday Cup", "2025-12-05 18:00:00");
        let created = insert_tournament(&mut conn, &payload).expect("Failed to create tournament");

        assert!(Uuid::parse_str(&created.id).is_ok());
        assert_eq!(created.current_players, 0);
        assert!(created.created_at.and_utc().timestamp() > 0);
        assert_eq!(created.title, payload.title);
        assert_eq!(created.game_type, payload.game_type);
        assert_eq!(created.entry_fee, payload.entry_fee);
        assert_eq!(created.prize_pool, payload.prize_pool);
        assert_eq!(created.max_players, payload.max_players);
        assert_eq!(created.start_time, payload.start_time);
        assert_eq!(created.status, TournamentStatus::Upcoming);

        let mut bad = tournament_payload("Empty Cup", "2025-12-05 18:00:00");
        bad.max_players = 0;
        assert!(insert_tournament(&mut conn, &bad).is_err());
    }

    #[test]
    fn test_list_tournaments_ordered_by_start_time() {
        let mut conn = test_connection();

        insert_tournament(&mut conn, &tournament_payload("Late", "2025-12-20 18:00:00")).unwrap();
        insert_tournament(&mut conn, &tournament_payload("Early", "2025-12-01 09:00:00")).unwrap();
        insert_tournament(&mut conn, &tournament_payload("Middle", "2025-12-10 12:00:00")).unwrap();

        let titles: Vec<String> = list_tournaments(&mut conn)
            .expect("Failed to list")
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, vec!["Early", "Middle", "Late"]);
    }

    #[test]
    fn test_update_tournament_partial_fields() {
        let mut conn = test_connection();
        let created = insert_tournament(
            &mut conn,
            &tournament_payload("Friday Cup", "2025-12-05 18:00:00"),
        )
        .unwrap();

        let changes = TournamentUpdate {
            title: Some("Friday Night Cup".to_string()),
            prize_pool: Some(75.0),
            ..Default::default()
        };
        let updated =
            update_tournament(&mut conn, &created.id, &changes).expect("Failed to update");

        // Exactly the submitted fields changed.
        assert_eq!(updated.title, "Friday Night Cup");
        assert_eq!(updated.prize_pool, 75.0);
        assert_eq!(updated.game_type, created.game_type);
        assert_eq!(updated.entry_fee, created.entry_fee);
        assert_eq!(updated.max_players, created.max_players);
        assert_eq!(updated.start_time, created.start_time);
        assert_eq!(updated.status, created.status);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at >= created.updated_at);

        // A fresh read reflects the same state.
        let reread = get_tournament_with_matches(&mut conn, &created.id).unwrap();
        assert_eq!(reread.tournament, updated);

        assert!(matches!(
            update_tournament(&mut conn, "missing", &changes),
            Err(diesel::result::Error::NotFound)
        ));
    }

    #[test]
    fn test_update_tournament_rejects_illegal_transition() {
        let mut conn = test_connection();
        let created = insert_tournament(
            &mut conn,
            &tournament_payload("Friday Cup", "2025-12-05 18:00:00"),
        )
        .unwrap();

        let to_progress = TournamentUpdate {
            status: Some(TournamentStatus::InProgress),
            ..Default::default()
        };
        let in_progress = update_tournament(&mut conn, &created.id, &to_progress).unwrap();
        assert_eq!(in_progress.status, TournamentStatus::InProgress);

        // in_progress cannot go back to upcoming, or to cancelled.
        for status in [TournamentStatus::Upcoming, TournamentStatus::Cancelled] {
            let bad = TournamentUpdate {
                status: Some(status),
                ..Default::default()
            };
            let err = update_tournament(&mut conn, &created.id, &bad)
                .expect_err("Should reject transition");
            assert!(err.to_string().contains("Illegal status transition"));
        }

        // Capacity below registered players is rejected.
        let joined = TournamentUpdate {
            current_players: Some(3),
            max_players: Some(2),
            ..Default::default()
        };
        let err = update_tournament(&mut conn, &created.id, &joined)
            .expect_err("Should reject capacity violation");
        assert!(err.to_string().contains("current_players cannot exceed max_players"));
    }

    #[test]
    fn test_delete_tournament_removes_matches() {
        let mut conn = test_connection();
        let ada = seed_user(&mut conn, "ada");
        let tournament = insert_tournament(
            &mut conn,
            &tournament_payload("Friday Cup", "2025-12-05 18:00:00"),
        )
        .unwrap();
        insert_match(
            &mut conn,
            &MatchCreate {
                tournament_id: tournament.id.clone(),
                player1_id: ada.id.clone(),
                player2_id: None,
                winner_id: None,
                status: MatchStatus::Pending,
                score: None,
            },
        )
        .unwrap();

        assert_eq!(delete_tournament(&mut conn, &tournament.id).unwrap(), 1);

        // Delete then get yields not-found, and the matches are gone too.
        assert!(matches!(
            get_tournament_with_matches(&mut conn, &tournament.id),
            Err(diesel::result::Error::NotFound)
        ));
        assert_eq!(list_matches(&mut conn, &tournament.id).unwrap().len(), 0);

        // Deleting a non-existent id is a no-op.
        assert_eq!(delete_tournament(&mut conn, &tournament.id).unwrap(), 0);
    }

    #[test]
    fn test_join_tournament() {
        let mut conn = test_connection();
        let ada = seed_user(&mut conn, "ada");
        let bob = seed_user(&mut conn, "bob");
        credit_wallet(&mut conn, &ada.id, 25.0).unwrap();
        credit_wallet(&mut conn, &bob.id, 5.0).unwrap();

        let mut payload = tournament_payload("Friday Cup", "2025-12-05 18:00:00");
        payload.max_players = 1;
        let tournament = insert_tournament(&mut conn, &payload).unwrap();

        // Too poor: entry fee is 10.0.
        let err = join_tournament(&mut conn, &tournament.id, &bob.id)
            .expect_err("Should reject underfunded join");
        assert!(err.to_string().contains("Insufficient wallet balance"));

        let joined = join_tournament(&mut conn, &tournament.id, &ada.id).expect("Failed to join");
        assert_eq!(joined.current_players, 1);
        assert_eq!(joined.prize_pool, 60.0);
        let ada_after = find_user_by_email(&mut conn, "ada@example.com").unwrap();
        assert_eq!(ada_after.wallet_balance, 15.0);

        // Full now.
        credit_wallet(&mut conn, &bob.id, 100.0).unwrap();
        let err = join_tournament(&mut conn, &tournament.id, &bob.id)
            .expect_err("Should reject full tournament");
        assert!(err.to_string().contains("Tournament is full"));

        // Only upcoming tournaments accept registrations.
        update_tournament(
            &mut conn,
            &tournament.id,
            &TournamentUpdate {
                status: Some(TournamentStatus::Cancelled),
                ..Default::default()
            },
        )
        .unwrap();
        let err = join_tournament(&mut conn, &tournament.id, &bob.id)
            .expect_err("Should reject cancelled tournament");
        assert!(err.to_string().contains("not open for registration"));
    }

    #[test]
    fn test_insert_match_enforces_winner_invariant() {
        let mut conn = test_connection();
        let ada = seed_user(&mut conn, "ada");
        let bob = seed_user(&mut conn, "bob");
        let carol = seed_user(&mut conn, "carol");
        let tournament = insert_tournament(
            &mut conn,
            &tournament_payload("Friday Cup", "2025-12-05 18:00:00"),
        )
        .unwrap();

        // Winner outside the pairing is rejected.
        let bad = MatchCreate {
            tournament_id: tournament.id.clone(),
            player1_id: ada.id.clone(),
            player2_id: Some(bob.id.clone()),
            winner_id: Some(carol.id.clone()),
            status: MatchStatus::Completed,
            score: Some("2-1".to_string()),
        };
        let err = insert_match(&mut conn, &bad).expect_err("Should reject outside winner");
        assert!(err.to_string().contains("winner_id must reference"));

        // A bye slot with player1 as winner is fine.
        let bye = MatchCreate {
            tournament_id: tournament.id.clone(),
            player1_id: ada.id.clone(),
            player2_id: None,
            winner_id: Some(ada.id.clone()),
            status: MatchStatus::Completed,
            score: None,
        };
        let created = insert_match(&mut conn, &bye).expect("Failed to create bye match");
        assert!(Uuid::parse_str(&created.id).is_ok());
        assert_eq!(created.tournament_id, tournament.id);
        assert_eq!(created.winner_id.as_deref(), Some(ada.id.as_str()));

        // Unknown tournament.
        let mut orphan = bye.clone();
        orphan.tournament_id = "missing".to_string();
        assert!(matches!(
            insert_match(&mut conn, &orphan),
            Err(diesel::result::Error::NotFound)
        ));
    }

    #[test]
    fn test_update_match_partial_and_winner_check() {
        let mut conn = test_connection();
        let ada = seed_user(&mut conn, "ada");
        let bob = seed_user(&mut conn, "bob");
        let carol = seed_user(&mut conn, "carol");
        let tournament = insert_tournament(
            &mut conn,
            &tournament_payload("Friday Cup", "2025-12-05 18:00:00"),
        )
        .unwrap();
        let created = insert_match(
            &mut conn,
            &MatchCreate {
                tournament_id: tournament.id.clone(),
                player1_id: ada.id.clone(),
                player2_id: Some(bob.id.clone()),
                winner_id: None,
                status: MatchStatus::Pending,
                score: None,
            },
        )
        .unwrap();

        // Report a result: winner must be one of the players.
        let err = update_match(
            &mut conn,
            &created.id,
            &MatchUpdate {
                winner_id: Some(carol.id.clone()),
                ..Default::default()
            },
        )
        .expect_err("Should reject outside winner");
        assert!(err.to_string().contains("winner_id must reference"));

        let updated = update_match(
            &mut conn,
            &created.id,
            &MatchUpdate {
                winner_id: Some(bob.id.clone()),
                status: Some(MatchStatus::Completed),
                score: Some("1-3".to_string()),
                ..Default::default()
            },
        )
        .expect("Failed to update match");
        assert_eq!(updated.winner_id.as_deref(), Some(bob.id.as_str()));
        assert_eq!(updated.status, MatchStatus::Completed);
        assert_eq!(updated.score.as_deref(), Some("1-3"));
        // Untouched fields survive.
        assert_eq!(updated.player1_id, created.player1_id);
        assert_eq!(updated.player2_id, created.player2_id);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at >= created.updated_at);

        // A fresh read reflects exactly the same record.
        let reread = get_match_with_players(&mut conn, &created.id).unwrap();
        assert_eq!(reread.summary, updated);

        assert!(matches!(
            update_match(&mut conn, "missing", &MatchUpdate::default()),
            Err(diesel::result::Error::NotFound)
        ));
    }

    #[test]
    fn test_list_matches_with_players() {
        let mut conn = test_connection();
        let ada = seed_user(&mut conn, "ada");
        let bob = seed_user(&mut conn, "bob");
        let tournament = insert_tournament(
            &mut conn,
            &tournament_payload("Friday Cup", "2025-12-05 18:00:00"),
        )
        .unwrap();

        let first = insert_match(
            &mut conn,
            &MatchCreate {
                tournament_id: tournament.id.clone(),
                player1_id: ada.id.clone(),
                player2_id: Some(bob.id.clone()),
                winner_id: Some(ada.id.clone()),
                status: MatchStatus::Completed,
                score: Some("2-0".to_string()),
            },
        )
        .unwrap();
        let second = insert_match(
            &mut conn,
            &MatchCreate {
                tournament_id: tournament.id.clone(),
                player1_id: bob.id.clone(),
                player2_id: None,
                winner_id: None,
                status: MatchStatus::Pending,
                score: None,
            },
        )
        .unwrap();

        let listed = list_matches(&mut conn, &tournament.id).expect("Failed to list matches");
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].summary.id, first.id);
        assert_eq!(listed[1].summary.id, second.id);

        let with_players = &listed[0];
        assert_eq!(
            with_players.player1.as_ref().unwrap().username.as_deref(),
            Some("ada")
        );
        assert_eq!(
            with_players.player2.as_ref().unwrap().username.as_deref(),
            Some("bob")
        );
        assert_eq!(
            with_players.winner.as_ref().unwrap().id,
            ada.id
        );

        // The bye slot stays empty.
        assert!(listed[1].player2.is_none());
        assert!(listed[1].winner.is_none());

        // The tournament detail view carries the same matches.
        let detail = get_tournament_with_matches(&mut conn, &tournament.id).unwrap();
        assert_eq!(detail.matches.len(), 2);

        // Delete then get yields not-found.
        assert_eq!(delete_match(&mut conn, &second.id).unwrap(), 1);
        assert!(matches!(
            get_match_with_players(&mut conn, &second.id),
            Err(diesel::result::Error::NotFound)
        ));
    }

    #[test]
    fn test_reset_database() {
        let mut conn = test_connection();
        let ada = seed_user(&mut conn, "ada");
        let tournament = insert_tournament(
            &mut conn,
            &tournament_payload("Friday Cup", "2025-12-05 18:00:00"),
        )
        .unwrap();
        insert_match(
            &mut conn,
            &MatchCreate {
                tournament_id: tournament.id.clone(),
                player1_id: ada.id.clone(),
                player2_id: None,
                winner_id: None,
                status: MatchStatus::Pending,
                score: None,
            },
        )
        .unwrap();

        reset_database(&mut conn).expect("Failed to reset");

        assert_eq!(list_tournaments(&mut conn).unwrap().len(), 0);
        let user_count: i64 = users::table.count().get_result(&mut conn).unwrap();
        assert_eq!(user_count, 0);
        let session_count: i64 = sessions::table.count().get_result(&mut conn).unwrap();
        assert_eq!(session_count, 0);
    }
}
