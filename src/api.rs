use leptos::logging::log;
use leptos::prelude::*;
use leptos::server_fn::error::NoCustomError;
use serde::{Deserialize, Serialize};

use crate::model::User;

#[cfg(feature = "ssr")]
use diesel::r2d2::{ConnectionManager, Pool};
#[cfg(feature = "ssr")]
use diesel::SqliteConnection;
#[cfg(feature = "ssr")]
pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

/// Stable marker for not-found failures so the client can classify them
/// after they cross the server-function boundary as strings.
pub const NOT_FOUND: &str = "record not found";

#[cfg(feature = "ssr")]
const SESSION_COOKIE_MAX_AGE_SECS: i64 = 60 * 60 * 24 * 7;

/// Failure surfaced by a resource access function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum ApiError {
    #[error("not found")]
    NotFound,
    #[error("{0}")]
    Remote(String),
}

impl From<&ServerFnError<NoCustomError>> for ApiError {
    fn from(err: &ServerFnError<NoCustomError>) -> Self {
        let message = err.to_string();
        if message.contains(NOT_FOUND) {
            ApiError::NotFound
        } else {
            ApiError::Remote(message)
        }
    }
}

/// Uniform result of every resource access call: exactly one of `data` and
/// `error` is set. Callers branch on `error` instead of catching anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T> ApiResponse<T> {
    pub fn is_err(&self) -> bool {
        self.error.is_some()
    }
}

fn respond<T>(what: &str, result: Result<T, ServerFnError<NoCustomError>>) -> ApiResponse<T> {
    match result {
        Ok(data) => ApiResponse {
            data: Some(data),
            error: None,
        },
        Err(err) => {
            log!("Error {}: {}", what, err);
            ApiResponse {
                data: None,
                error: Some(ApiError::from(&err)),
            }
        }
    }
}

#[cfg(feature = "ssr")]
fn to_server_error(err: diesel::result::Error) -> ServerFnError<NoCustomError> {
    match err {
        diesel::result::Error::NotFound => ServerFnError::ServerError(NOT_FOUND.to_string()),
        err => ServerFnError::ServerError(err.to_string()),
    }
}

#[cfg(feature = "ssr")]
async fn session_token_from_headers() -> Result<Option<String>, ServerFnError<NoCustomError>> {
    use axum::http::HeaderMap;
    use leptos_axum::extract;

    let headers: HeaderMap = extract()
        .await
        .map_err(|e| ServerFnError::<NoCustomError>::ServerError(e.to_string()))?;

    let mut token: Option<String> = None;
    if let Some(cookie_header) = headers.get(axum::http::header::COOKIE) {
        if let Ok(cookie_str) = cookie_header.to_str() {
            for cookie in cookie_str.split(';') {
                let cookie = cookie.trim();
                if let Some(value) = cookie.strip_prefix("session_token=") {
                    token = Some(value.to_string());
                    break;
                }
            }
        }
    }
    Ok(token)
}

#[cfg(feature = "ssr")]
fn set_session_cookie(token: &str) -> Result<(), ServerFnError<NoCustomError>> {
    use leptos_axum::ResponseOptions;
    let resp: ResponseOptions = expect_context();
    let cookie = format!(
        "session_token={}; Max-Age={}; Path=/; HttpOnly; SameSite=Strict",
        token, SESSION_COOKIE_MAX_AGE_SECS
    );
    resp.insert_header(
        axum::http::header::SET_COOKIE,
        axum::http::HeaderValue::from_str(&cookie)
            .map_err(|e| ServerFnError::<NoCustomError>::ServerError(e.to_string()))?,
    );
    Ok(())
}

#[cfg(feature = "ssr")]
fn clear_session_cookie() -> Result<(), ServerFnError<NoCustomError>> {
    use leptos_axum::ResponseOptions;
    let resp: ResponseOptions = expect_context();
    let cookie = "session_token=; Max-Age=0; Path=/; HttpOnly; SameSite=Strict";
    resp.insert_header(
        axum::http::header::SET_COOKIE,
        axum::http::HeaderValue::from_str(cookie)
            .map_err(|e| ServerFnError::<NoCustomError>::ServerError(e.to_string()))?,
    );
    Ok(())
}

#[cfg(feature = "ssr")]
async fn session_user_from_request() -> Result<Option<User>, ServerFnError<NoCustomError>> {
    let pool: DbPool = expect_context();
    let token = session_token_from_headers().await?;

    let result = tokio::task::spawn_blocking(
        move || -> Result<Option<User>, ServerFnError<NoCustomError>> {
            let mut conn = pool
                .get()
                .map_err(|e| ServerFnError::<NoCustomError>::ServerError(e.to_string()))?;
            match token {
                Some(t) => Ok(crate::get_user_by_session(&mut conn, &t).ok()),
                None => Ok(None),
            }
        },
    )
    .await;
    match result {
        Ok(user) => user,
        Err(e) => Err(ServerFnError::ServerError(e.to_string())),
    }
}

// Returns the signed-in user, or an error for anonymous requests. Mutating
// endpoints call this first.
#[cfg(feature = "ssr")]
async fn require_user() -> Result<User, ServerFnError<NoCustomError>> {
    match session_user_from_request().await? {
        Some(user) => Ok(user),
        None => Err(ServerFnError::ServerError("Unauthorized".to_string())),
    }
}

/// Creates an unconfirmed account. The confirmation code is logged on the
/// server in place of an outbound email.
#[server(SignUp)]
pub async fn sign_up(
    email: String,
    password: String,
    username: String,
) -> Result<(), ServerFnError<NoCustomError>> {
    let pool: DbPool = expect_context();
    let for_log = email.clone();

    let result =
        tokio::task::spawn_blocking(move || -> Result<String, ServerFnError<NoCustomError>> {
            let mut conn = pool
                .get()
                .map_err(|e| ServerFnError::<NoCustomError>::ServerError(e.to_string()))?;
            let username = if username.is_empty() {
                None
            } else {
                Some(username.as_str())
            };
            let (_, code) =
                crate::create_user(&mut conn, &email, &password, username).map_err(to_server_error)?;
            Ok(code)
        })
        .await;
    let code = result.map_err(|e| ServerFnError::<NoCustomError>::ServerError(e.to_string()))??;

    log!("confirmation code for {}: {}", for_log, code);
    Ok(())
}

/// Validates credentials and establishes a cookie session. Rejections
/// (wrong password, unconfirmed email) are surfaced verbatim.
#[server(SignIn)]
pub async fn sign_in(
    email: String,
    password: String,
) -> Result<User, ServerFnError<NoCustomError>> {
    let pool: DbPool = expect_context();

    let result = tokio::task::spawn_blocking(
        move || -> Result<(User, String), ServerFnError<NoCustomError>> {
            let mut conn = pool
                .get()
                .map_err(|e| ServerFnError::<NoCustomError>::ServerError(e.to_string()))?;
            crate::verify_sign_in(&mut conn, &email, &password).map_err(to_server_error)
        },
    )
    .await;
    let (user, token) =
        result.map_err(|e| ServerFnError::<NoCustomError>::ServerError(e.to_string()))??;

    set_session_cookie(&token)?;
    Ok(user)
}

/// Ends the current session and clears the cookie.
#[server(SignOut)]
pub async fn sign_out() -> Result<(), ServerFnError<NoCustomError>> {
    let pool: DbPool = expect_context();
    let token = session_token_from_headers().await?;

    if let Some(token) = token {
        let result = tokio::task::spawn_blocking(move || -> Result<(), ServerFnError<NoCustomError>> {
            let mut conn = pool
                .get()
                .map_err(|e| ServerFnError::<NoCustomError>::ServerError(e.to_string()))?;
            crate::delete_session(&mut conn, &token).map_err(to_server_error)?;
            Ok(())
        })
        .await;
        result.map_err(|e| ServerFnError::<NoCustomError>::ServerError(e.to_string()))??;
    }

    clear_session_cookie()?;
    Ok(())
}

/// Returns the user of the live session, or `None` for anonymous requests.
/// Route guards treat any error here as an absent session.
#[server(GetSession)]
pub async fn get_session() -> Result<Option<User>, ServerFnError<NoCustomError>> {
    session_user_from_request().await
}

/// Exchanges an opaque confirmation code for a confirmed account and a
/// cookie session.
#[server(ExchangeAuthCode)]
pub async fn exchange_auth_code(code: String) -> Result<User, ServerFnError<NoCustomError>> {
    let pool: DbPool = expect_context();

    let result = tokio::task::spawn_blocking(
        move || -> Result<(User, String), ServerFnError<NoCustomError>> {
            let mut conn = pool
                .get()
                .map_err(|e| ServerFnError::<NoCustomError>::ServerError(e.to_string()))?;
            crate::confirm_email(&mut conn, &code).map_err(to_server_error)
        },
    )
    .await;
    let (user, token) =
        result.map_err(|e| ServerFnError::<NoCustomError>::ServerError(e.to_string()))??;

    set_session_cookie(&token)?;
    Ok(user)
}

/// Resource access for the tournaments table. Every public function retries
/// transient failures and reports through [`ApiResponse`]; nothing here
/// panics or propagates an error to the caller.
pub mod tournaments {
    use super::*;
    use crate::model::{Tournament, TournamentCreate, TournamentUpdate, TournamentWithMatches};
    use crate::retry::with_retry;

    #[server(ListTournaments)]
    pub async fn list() -> Result<Vec<Tournament>, ServerFnError<NoCustomError>> {
        let pool: DbPool = expect_context();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| ServerFnError::<NoCustomError>::ServerError(e.to_string()))?;
            crate::list_tournaments(&mut conn).map_err(to_server_error)
        })
        .await;
        match result {
            Ok(tournaments) => tournaments,
            Err(e) => Err(ServerFnError::ServerError(e.to_string())),
        }
    }

    #[server(GetTournament)]
    pub async fn fetch(id: String) -> Result<TournamentWithMatches, ServerFnError<NoCustomError>> {
        let pool: DbPool = expect_context();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| ServerFnError::<NoCustomError>::ServerError(e.to_string()))?;
            crate::get_tournament_with_matches(&mut conn, &id).map_err(to_server_error)
        })
        .await;
        match result {
            Ok(tournament) => tournament,
            Err(e) => Err(ServerFnError::ServerError(e.to_string())),
        }
    }

    #[server(CreateTournament)]
    pub async fn insert(
        payload: TournamentCreate,
    ) -> Result<Tournament, ServerFnError<NoCustomError>> {
        require_user().await?;

        let pool: DbPool = expect_context();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| ServerFnError::<NoCustomError>::ServerError(e.to_string()))?;
            crate::insert_tournament(&mut conn, &payload).map_err(to_server_error)
        })
        .await;
        match result {
            Ok(tournament) => tournament,
            Err(e) => Err(ServerFnError::ServerError(e.to_string())),
        }
    }

    #[server(UpdateTournament)]
    pub async fn patch(
        id: String,
        changes: TournamentUpdate,
    ) -> Result<Tournament, ServerFnError<NoCustomError>> {
        require_user().await?;

        let pool: DbPool = expect_context();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| ServerFnError::<NoCustomError>::ServerError(e.to_string()))?;
            crate::update_tournament(&mut conn, &id, &changes).map_err(to_server_error)
        })
        .await;
        match result {
            Ok(tournament) => tournament,
            Err(e) => Err(ServerFnError::ServerError(e.to_string())),
        }
    }

    #[server(DeleteTournament)]
    pub async fn remove(id: String) -> Result<(), ServerFnError<NoCustomError>> {
        require_user().await?;

        let pool: DbPool = expect_context();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| ServerFnError::<NoCustomError>::ServerError(e.to_string()))?;
            crate::delete_tournament(&mut conn, &id).map_err(to_server_error)?;
            Ok(())
        })
        .await;
        result.map_err(|e| ServerFnError::<NoCustomError>::ServerError(e.to_string()))?
    }

    #[server(JoinTournament)]
    pub async fn enroll(id: String) -> Result<Tournament, ServerFnError<NoCustomError>> {
        let user = require_user().await?;

        let pool: DbPool = expect_context();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| ServerFnError::<NoCustomError>::ServerError(e.to_string()))?;
            crate::join_tournament(&mut conn, &id, &user.id).map_err(to_server_error)
        })
        .await;
        match result {
            Ok(tournament) => tournament,
            Err(e) => Err(ServerFnError::ServerError(e.to_string())),
        }
    }

    /// All tournaments, ordered by start time.
    pub async fn get_all() -> ApiResponse<Vec<Tournament>> {
        respond("fetching tournaments", with_retry(list).await)
    }

    /// One tournament joined with its matches.
    pub async fn get_by_id(id: &str) -> ApiResponse<TournamentWithMatches> {
        let id = id.to_string();
        respond(
            "fetching tournament",
            with_retry(move || fetch(id.clone())).await,
        )
    }

    pub async fn create(payload: TournamentCreate) -> ApiResponse<Tournament> {
        respond(
            "creating tournament",
            with_retry(move || insert(payload.clone())).await,
        )
    }

    pub async fn update(id: &str, changes: TournamentUpdate) -> ApiResponse<Tournament> {
        let id = id.to_string();
        respond(
            "updating tournament",
            with_retry(move || patch(id.clone(), changes.clone())).await,
        )
    }

    pub async fn delete(id: &str) -> ApiResponse<()> {
        let id = id.to_string();
        respond(
            "deleting tournament",
            with_retry(move || remove(id.clone())).await,
        )
    }

    /// Registers the signed-in user for a tournament.
    pub async fn join(id: &str) -> ApiResponse<Tournament> {
        let id = id.to_string();
        respond(
            "joining tournament",
            with_retry(move || enroll(id.clone())).await,
        )
    }
}

/// Resource access for the matches table, same discipline as
/// [`tournaments`].
pub mod matches {
    use super::*;
    use crate::model::{Match, MatchCreate, MatchUpdate, MatchWithPlayers};
    use crate::retry::with_retry;

    #[server(ListMatches)]
    pub async fn list(
        tournament_id: String,
    ) -> Result<Vec<MatchWithPlayers>, ServerFnError<NoCustomError>> {
        let pool: DbPool = expect_context();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| ServerFnError::<NoCustomError>::ServerError(e.to_string()))?;
            crate::list_matches(&mut conn, &tournament_id).map_err(to_server_error)
        })
        .await;
        match result {
            Ok(matches) => matches,
            Err(e) => Err(ServerFnError::ServerError(e.to_string())),
        }
    }

    #[server(GetMatch)]
    pub async fn fetch(id: String) -> Result<MatchWithPlayers, ServerFnError<NoCustomError>> {
        let pool: DbPool = expect_context();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| ServerFnError::<NoCustomError>::ServerError(e.to_string()))?;
            crate::get_match_with_players(&mut conn, &id).map_err(to_server_error)
        })
        .await;
        match result {
            Ok(m) => m,
            Err(e) => Err(ServerFnError::ServerError(e.to_string())),
        }
    }

    #[server(CreateMatch)]
    pub async fn insert(payload: MatchCreate) -> Result<Match, ServerFnError<NoCustomError>> {
        require_user().await?;

        let pool: DbPool = expect_context();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| ServerFnError::<NoCustomError>::ServerError(e.to_string()))?;
            crate::insert_match(&mut conn, &payload).map_err(to_server_error)
        })
        .await;
        match result {
            Ok(m) => m,
            Err(e) => Err(ServerFnError::ServerError(e.to_string())),
        }
    }

    #[server(UpdateMatch)]
    pub async fn patch(
        id: String,
        changes: MatchUpdate,
    ) -> Result<Match, ServerFnError<NoCustomError>> {
        require_user().await?;

        let pool: DbPool = expect_context();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| ServerFnError::<NoCustomError>::ServerError(e.to_string()))?;
            crate::update_match(&mut conn, &id, &changes).map_err(to_server_error)
        })
        .await;
        match result {
            Ok(m) => m,
            Err(e) => Err(ServerFnError::ServerError(e.to_string())),
        }
    }

    #[server(DeleteMatch)]
    pub async fn remove(id: String) -> Result<(), ServerFnError<NoCustomError>> {
        require_user().await?;

        let pool: DbPool = expect_context();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| ServerFnError::<NoCustomError>::ServerError(e.to_string()))?;
            crate::delete_match(&mut conn, &id).map_err(to_server_error)?;
            Ok(())
        })
        .await;
        result.map_err(|e| ServerFnError::<NoCustomError>::ServerError(e.to_string()))?
    }

    /// Matches of a tournament, oldest first, joined with player records.
    pub async fn get_all(tournament_id: &str) -> ApiResponse<Vec<MatchWithPlayers>> {
        let tournament_id = tournament_id.to_string();
        respond(
            "fetching matches",
            with_retry(move || list(tournament_id.clone())).await,
        )
    }

    pub async fn get_by_id(id: &str) -> ApiResponse<MatchWithPlayers> {
        let id = id.to_string();
        respond(
            "fetching match",
            with_retry(move || fetch(id.clone())).await,
        )
    }

    pub async fn create(payload: MatchCreate) -> ApiResponse<Match> {
        respond(
            "creating match",
            with_retry(move || insert(payload.clone())).await,
        )
    }

    pub async fn update(id: &str, changes: MatchUpdate) -> ApiResponse<Match> {
        let id = id.to_string();
        respond(
            "updating match",
            with_retry(move || patch(id.clone(), changes.clone())).await,
        )
    }

    pub async fn delete(id: &str) -> ApiResponse<()> {
        let id = id.to_string();
        respond(
            "deleting match",
            with_retry(move || remove(id.clone())).await,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_classification() {
        let not_found: ServerFnError<NoCustomError> =
            ServerFnError::ServerError(NOT_FOUND.to_string());
        assert_eq!(ApiError::from(&not_found), ApiError::NotFound);

        let other: ServerFnError<NoCustomError> =
            ServerFnError::ServerError("connection reset".to_string());
        match ApiError::from(&other) {
            ApiError::Remote(message) => assert!(message.contains("connection reset")),
            ApiError::NotFound => panic!("misclassified as not-found"),
        }
    }

    #[test]
    fn test_respond_shapes() {
        let ok: ApiResponse<i32> = respond("reading", Ok(5));
        assert_eq!(ok.data, Some(5));
        assert!(ok.error.is_none());
        assert!(!ok.is_err());

        let err: ApiResponse<i32> = respond(
            "reading",
            Err(ServerFnError::ServerError("boom".to_string())),
        );
        assert!(err.data.is_none());
        assert!(err.is_err());
    }

    #[test]
    fn test_response_wire_shape() {
        // Exactly one of data/error is set on the wire.
        let ok: ApiResponse<i32> = respond("reading", Ok(5));
        let value = serde_json::to_value(&ok).expect("Failed to serialize");
        assert_eq!(value["data"], 5);
        assert!(value["error"].is_null());

        let err: ApiResponse<i32> = respond(
            "reading",
            Err(ServerFnError::ServerError(NOT_FOUND.to_string())),
        );
        let value = serde_json::to_value(&err).expect("Failed to serialize");
        assert!(value["data"].is_null());
        assert!(!value["error"].is_null());
    }
}
