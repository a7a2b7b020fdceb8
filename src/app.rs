use chrono::NaiveDateTime;
use leptos::ev::SubmitEvent;
use leptos::logging::log;
use leptos::prelude::*;
use leptos::task::spawn_local;
use leptos_meta::{provide_meta_context, MetaTags, Stylesheet, Title};
use leptos_router::{
    components::{Redirect, Route, Router, Routes},
    hooks::{use_navigate, use_params_map, use_query_map},
    path, NavigateOptions,
};

use crate::api::{self, exchange_auth_code, get_session, sign_in, sign_out, sign_up, ApiResponse};
use crate::model::{
    MatchStatus, MatchUpdate, MatchWithPlayers, PlayerRef, Tournament, TournamentCreate,
    TournamentStatus, TournamentUpdate,
};
use crate::store::{
    provide_stores, use_auth_store, use_match_store, use_tournament_store, MatchStore,
    SessionEvent, TournamentStore,
};

pub fn shell(options: LeptosOptions) -> impl IntoView {
    view! {
        <!DOCTYPE html>
        <html lang="en">
            <head>
                <meta charset="utf-8" />
                <meta name="viewport" content="width=device-width, initial-scale=1" />
                <AutoReload options=options.clone() />
                <HydrationScripts options />
                <MetaTags />
            </head>
            <body>
                <App />
            </body>
        </html>
    }
}

#[component]
pub fn App() -> impl IntoView {
    // Provides context that manages stylesheets, titles, meta tags, etc.
    provide_meta_context();
    // State containers live for the lifetime of the application and travel
    // through context, not through globals.
    provide_stores();

    let auth = use_auth_store();
    let notice = RwSignal::new(None::<String>);

    // Session transitions surface as a dismissible notification.
    let subscription = auth.changes().subscribe(move |event| {
        notice.set(Some(match event {
            SessionEvent::SignedIn(user) => format!("Signed in as {}", user.email),
            SessionEvent::SignedOut => "Signed out.".to_string(),
        }));
    });
    let auth_for_cleanup = auth.clone();
    on_cleanup(move || {
        auth_for_cleanup.changes().unsubscribe(subscription);
    });

    view! {
        <Stylesheet id="leptos" href="/pkg/gaming-arena.css" />

        <Title text="Gaming Arena" />

        <Router>
            <Navbar />
            {move || {
                notice
                    .get()
                    .map(|message| {
                        view! {
                            <div class="notice">
                                <span>{message}</span>
                                <button on:click=move |_| notice.set(None)>"Dismiss"</button>
                            </div>
                        }
                    })
            }}
            <main>
                <Routes fallback=|| "Page not found.".into_view()>
                    <Route path=path!("/") view=Home />
                    <Route
                        path=path!("/auth/login")
                        view=|| view! { <RedirectIfAuthed><LoginPage /></RedirectIfAuthed> }
                    />
                    <Route
                        path=path!("/auth/register")
                        view=|| view! { <RedirectIfAuthed><RegisterPage /></RedirectIfAuthed> }
                    />
                    <Route path=path!("/auth/callback") view=AuthCallbackPage />
                    <Route
                        path=path!("/dashboard")
                        view=|| view! { <RequireAuth><Dashboard /></RequireAuth> }
                    />
                    <Route
                        path=path!("/tournaments")
                        view=|| view! { <RequireAuth><TournamentsPage /></RequireAuth> }
                    />
                    <Route
                        path=path!("/tournaments/:id")
                        view=|| view! { <RequireAuth><TournamentDetailPage /></RequireAuth> }
                    />
                    <Route
                        path=path!("/matches/:id")
                        view=|| view! { <RequireAuth><MatchDetailPage /></RequireAuth> }
                    />
                    <Route
                        path=path!("/wallet")
                        view=|| view! { <RequireAuth><WalletPage /></RequireAuth> }
                    />
                </Routes>
            </main>
        </Router>
    }
}

/// Maps the outcome of a session check to "is there a live session".
/// `None` means the check is still in flight; a failed check counts as no
/// session, so the guards fail closed.
fn session_present<E>(result: Option<&Result<Option<crate::model::User>, E>>) -> Option<bool> {
    match result {
        None => None,
        Some(Ok(Some(_))) => Some(true),
        Some(_) => Some(false),
    }
}

/// Renders its children only when a live session exists. Anonymous requests
/// and failed session checks both redirect to the login page.
#[component]
fn RequireAuth(children: ChildrenFn) -> impl IntoView {
    let auth = use_auth_store();
    let session = Resource::new(|| (), |_| get_session());

    let auth_sync = auth.clone();
    Effect::new(move |_| {
        if let Some(result) = session.get() {
            // A failed check counts as no session.
            auth_sync.set_user(result.unwrap_or(None));
            auth_sync.set_loading(false);
        }
    });

    view! {
        <Suspense fallback=|| {
            view! { <p>"Checking session..."</p> }
        }>
            {move || {
                let children = children.clone();
                session
                    .with(move |result| match session_present(result.as_ref()) {
                        None => view! { <p>"Checking session..."</p> }.into_any(),
                        Some(true) => children().into_any(),
                        Some(false) => view! { <Redirect path="/auth/login" /> }.into_any(),
                    })
            }}
        </Suspense>
    }
}

/// The inverse guard for the auth pages: an already-authenticated visitor is
/// sent to the dashboard instead.
#[component]
fn RedirectIfAuthed(children: ChildrenFn) -> impl IntoView {
    let session = Resource::new(|| (), |_| get_session());

    view! {
        <Suspense fallback=|| {
            view! { <p>"Checking session..."</p> }
        }>
            {move || {
                let children = children.clone();
                session
                    .with(move |result| match session_present(result.as_ref()) {
                        None => view! { <p>"Checking session..."</p> }.into_any(),
                        Some(true) => view! { <Redirect path="/dashboard" /> }.into_any(),
                        Some(false) => children().into_any(),
                    })
            }}
        </Suspense>
    }
}

#[component]
fn Navbar() -> impl IntoView {
    let auth = use_auth_store();
    let user = auth.user;

    let auth_out = auth.clone();
    let on_sign_out = move |_| {
        let auth = auth_out.clone();
        spawn_local(async move {
            match sign_out().await {
                Ok(_) => {
                    auth.set_user(None);
                    let navigate = use_navigate();
                    navigate("/auth/login", NavigateOptions::default());
                }
                Err(e) => log!("Error signing out: {}", e),
            }
        });
    };

    view! {
        <nav>
            <a href="/" class="brand">
                "Gaming Arena"
            </a>
            {move || {
                if user.get().is_some() {
                    view! {
                        <span>
                            <a href="/dashboard">"Dashboard"</a>
                            <a href="/tournaments">"Tournaments"</a>
                            <a href="/wallet">"Wallet"</a>
                            <button on:click=on_sign_out.clone()>"Sign Out"</button>
                        </span>
                    }
                        .into_any()
                } else {
                    view! {
                        <span>
                            <a href="/auth/login">"Sign In"</a>
                            <a href="/auth/register">"Sign Up"</a>
                        </span>
                    }
                        .into_any()
                }
            }}
        </nav>
    }
}

#[component]
fn Home() -> impl IntoView {
    let auth = use_auth_store();
    let user = auth.user;

    view! {
        <div>
            <h1>"Gaming Arena"</h1>
            <p>"Competitive gaming platform for tournaments and matches."</p>
            {move || {
                if user.get().is_some() {
                    view! {
                        <p>
                            <a href="/tournaments">"Browse tournaments"</a>
                        </p>
                    }
                        .into_any()
                } else {
                    view! {
                        <p>
                            <a href="/auth/login">"Sign in"</a>
                            " or "
                            <a href="/auth/register">"create an account"</a>
                            " to compete."
                        </p>
                    }
                        .into_any()
                }
            }}
        </div>
    }
}

#[component]
fn LoginPage() -> impl IntoView {
    let auth = use_auth_store();
    let query = use_query_map();

    let email = RwSignal::new(String::new());
    let password = RwSignal::new(String::new());
    let error = RwSignal::new(String::new());

    // Redirect-worthy failures land here with an error indicator in the
    // query string.
    let callback_error = move || query.with(|q| q.get("error"));

    let auth_submit = auth.clone();
    let submit = move |ev: SubmitEvent| {
        ev.prevent_default();
        let e = email.get();
        let p = password.get();
        if e.is_empty() || p.is_empty() {
            error.set("Please enter email and password.".to_string());
            return;
        }
        let auth = auth_submit.clone();
        spawn_local(async move {
            // Not retried: a rejected credential must surface as-is.
            match sign_in(e, p).await {
                Ok(user) => {
                    error.set(String::new());
                    auth.set_user(Some(user));
                    let navigate = use_navigate();
                    navigate("/dashboard", NavigateOptions::default());
                }
                Err(e) => error.set(e.to_string()),
            }
        });
    };

    view! {
        <div>
            <h1>"Sign in to your account"</h1>
            {move || {
                callback_error()
                    .map(|code| view! { <p class="error">"Sign-in problem: " {code}</p> })
            }}
            <form on:submit=submit>
                <label>
                    "Email: "
                    <input
                        type="email"
                        on:input=move |ev| email.set(event_target_value(&ev))
                    />
                </label>
                <label>
                    "Password: "
                    <input
                        type="password"
                        on:input=move |ev| password.set(event_target_value(&ev))
                    />
                </label>
                <button type="submit">"Sign In"</button>
            </form>
            {move || (!error.get().is_empty()).then(|| view! { <p class="error">{error.get()}</p> })}
            <p>
                <a href="/auth/register">"Need an account? Sign up"</a>
            </p>
        </div>
    }
}

#[component]
fn RegisterPage() -> impl IntoView {
    let username = RwSignal::new(String::new());
    let email = RwSignal::new(String::new());
    let password = RwSignal::new(String::new());
    let error = RwSignal::new(String::new());
    let message = RwSignal::new(String::new());

    let submit = move |ev: SubmitEvent| {
        ev.prevent_default();
        let u = username.get();
        let e = email.get();
        let p = password.get();
        // Validated before any remote call.
        if u.len() < 3 {
            error.set("Username must be at least 3 characters.".to_string());
            return;
        }
        if !e.contains('@') {
            error.set("Invalid email address.".to_string());
            return;
        }
        if p.len() < 6 {
            error.set("Password must be at least 6 characters.".to_string());
            return;
        }
        spawn_local(async move {
            match sign_up(e, p, u).await {
                Ok(_) => {
                    error.set(String::new());
                    message.set(
                        "Registration successful! Check your email to confirm your account."
                            .to_string(),
                    );
                }
                Err(e) => error.set(e.to_string()),
            }
        });
    };

    view! {
        <div>
            <h1>"Create your account"</h1>
            <form on:submit=submit>
                <label>
                    "Username: "
                    <input
                        type="text"
                        on:input=move |ev| username.set(event_target_value(&ev))
                    />
                </label>
                <label>
                    "Email: "
                    <input
                        type="email"
                        on:input=move |ev| email.set(event_target_value(&ev))
                    />
                </label>
                <label>
                    "Password: "
                    <input
                        type="password"
                        on:input=move |ev| password.set(event_target_value(&ev))
                    />
                </label>
                <button type="submit">"Sign Up"</button>
            </form>
            {move || (!error.get().is_empty()).then(|| view! { <p class="error">{error.get()}</p> })}
            {move || {
                (!message.get().is_empty()).then(|| view! { <p class="success">{message.get()}</p> })
            }}
            <p>
                <a href="/auth/login">"Already registered? Sign in"</a>
            </p>
        </div>
    }
}

/// Exchanges the `code` query parameter for a session, then moves on to the
/// dashboard. Exchange failures bounce back to the login page with an error
/// indicator.
#[component]
fn AuthCallbackPage() -> impl IntoView {
    let auth = use_auth_store();
    let query = use_query_map();

    let exchange = Resource::new(
        move || query.with(|q| q.get("code")),
        |code| async move {
            match code {
                Some(code) if !code.is_empty() => Some(exchange_auth_code(code).await),
                _ => None,
            }
        },
    );

    let auth_sync = auth.clone();
    Effect::new(move |_| {
        if let Some(Some(Ok(user))) = exchange.get() {
            auth_sync.set_user(Some(user));
        }
    });

    view! {
        <Suspense fallback=|| {
            view! { <p>"Signing you in..."</p> }
        }>
            {move || {
                exchange
                    .with(|result| match result {
                        None => view! { <p>"Signing you in..."</p> }.into_any(),
                        Some(Some(Ok(_))) => view! { <Redirect path="/dashboard" /> }.into_any(),
                        Some(Some(Err(_))) => {
                            view! { <Redirect path="/auth/login?error=auth_callback_error" /> }
                                .into_any()
                        }
                        Some(None) => view! { <Redirect path="/auth/login" /> }.into_any(),
                    })
            }}
        </Suspense>
    }
}

#[component]
fn Dashboard() -> impl IntoView {
    let auth = use_auth_store();
    let user = auth.user;
    let tournaments = Resource::new(|| (), |_| api::tournaments::get_all());

    view! {
        <div>
            <h1>"Dashboard"</h1>
            {move || {
                user.get()
                    .map(|user| {
                        let name = user.username.unwrap_or(user.email);
                        view! {
                            <p>"Welcome back, " {name} "!"</p>
                            <p>
                                "Wallet balance: " {format!("{:.2}", user.wallet_balance)}
                                " — " <a href="/wallet">"manage"</a>
                            </p>
                        }
                    })
            }}
            <h2>"Upcoming tournaments"</h2>
            <Suspense fallback=|| {
                view! { <p>"Loading..."</p> }
            }>
                {move || {
                    tournaments
                        .with(|resp| match resp {
                            None => view! { <p>"Loading..."</p> }.into_any(),
                            Some(ApiResponse { data: Some(list), .. }) => {
                                let upcoming: Vec<Tournament> = list
                                    .iter()
                                    .filter(|t| t.status == TournamentStatus::Upcoming)
                                    .cloned()
                                    .collect();
                                if upcoming.is_empty() {
                                    view! { <p>"No upcoming tournaments."</p> }.into_any()
                                } else {
                                    view! {
                                        <ul>
                                            {upcoming
                                                .into_iter()
                                                .map(|t| {
                                                    let href = format!("/tournaments/{}", t.id);
                                                    view! {
                                                        <li>
                                                            <a href=href>{t.title.clone()}</a>
                                                            " — starts " {t.start_time.to_string()}
                                                        </li>
                                                    }
                                                })
                                                .collect_view()}
                                        </ul>
                                    }
                                        .into_any()
                                }
                            }
                            Some(_) => view! { <p>"Error loading tournaments."</p> }.into_any(),
                        })
                }}
            </Suspense>
            <p>
                <a href="/tournaments">"All tournaments"</a>
            </p>
        </div>
    }
}

async fn load_tournaments(store: TournamentStore) {
    store.set_loading(true);
    store.set_error(None);
    let resp = api::tournaments::get_all().await;
    if let Some(error) = resp.error {
        store.set_error(Some(error.to_string()));
    } else if let Some(list) = resp.data {
        store.set_tournaments(list);
    }
    store.set_loading(false);
}

async fn load_tournament(store: TournamentStore, id: String) {
    store.set_loading(true);
    store.set_error(None);
    let resp = api::tournaments::get_by_id(&id).await;
    if let Some(error) = resp.error {
        store.set_error(Some(error.to_string()));
    } else {
        store.set_current(resp.data);
    }
    store.set_loading(false);
}

async fn load_match(store: MatchStore, id: String) {
    store.set_loading(true);
    store.set_error(None);
    let resp = api::matches::get_by_id(&id).await;
    if let Some(error) = resp.error {
        store.set_error(Some(error.to_string()));
    } else {
        store.set_current(resp.data);
    }
    store.set_loading(false);
}

fn parse_start_time(value: &str) -> Option<NaiveDateTime> {
    // datetime-local inputs come with or without seconds.
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M"))
        .ok()
}

#[component]
fn TournamentsPage() -> impl IntoView {
    let store = use_tournament_store();

    Effect::new(move |_| {
        spawn_local(load_tournaments(store));
    });

    // Creation form state.
    let title = RwSignal::new(String::new());
    let game_type = RwSignal::new(String::new());
    let entry_fee = RwSignal::new(0.0f64);
    let prize_pool = RwSignal::new(0.0f64);
    let max_players = RwSignal::new(0i32);
    let start_time = RwSignal::new(String::new());
    let form_error = RwSignal::new(String::new());

    let submit = move |ev: SubmitEvent| {
        ev.prevent_default();
        if title.get().is_empty() || game_type.get().is_empty() {
            form_error.set("Title and game type are required.".to_string());
            return;
        }
        if max_players.get() <= 0 {
            form_error.set("Max players must be positive.".to_string());
            return;
        }
        let Some(start) = parse_start_time(&start_time.get()) else {
            form_error.set("Please pick a start time.".to_string());
            return;
        };
        let payload = TournamentCreate {
            title: title.get(),
            game_type: game_type.get(),
            entry_fee: entry_fee.get(),
            prize_pool: prize_pool.get(),
            max_players: max_players.get(),
            start_time: start,
            status: TournamentStatus::Upcoming,
        };
        spawn_local(async move {
            let resp = api::tournaments::create(payload).await;
            if let Some(error) = resp.error {
                form_error.set(error.to_string());
                return;
            }
            if let Some(tournament) = resp.data {
                form_error.set(String::new());
                title.set(String::new());
                game_type.set(String::new());
                store.add_tournament(tournament);
            }
        });
    };

    view! {
        <div>
            <h1>"Tournaments"</h1>
            {move || {
                store
                    .error
                    .get()
                    .map(|error| {
                        view! {
                            <div class="notice">
                                <span>{error}</span>
                                <button on:click=move |_| {
                                    store.set_error(None)
                                }>"Dismiss"</button>
                            </div>
                        }
                    })
            }}
            {move || {
                if store.is_loading.get() {
                    view! { <p>"Loading tournaments..."</p> }.into_any()
                } else {
                    let tournaments = store.tournaments.get();
                    if tournaments.is_empty() {
                        view! { <p>"No tournaments yet."</p> }.into_any()
                    } else {
                        view! {
                            <ul>
                                {tournaments
                                    .into_iter()
                                    .map(|t| {
                                        let href = format!("/tournaments/{}", t.id);
                                        view! {
                                            <li>
                                                <a href=href>{t.title.clone()}</a>
                                                " [" {t.game_type.clone()} "] " {t.status.to_string()}
                                                " — " {t.current_players} "/" {t.max_players}
                                                " players, entry " {format!("{:.2}", t.entry_fee)}
                                            </li>
                                        }
                                    })
                                    .collect_view()}
                            </ul>
                        }
                            .into_any()
                    }
                }
            }}
            <h2>"Create a tournament"</h2>
            <form on:submit=submit>
                <label>
                    "Title: "
                    <input type="text" on:input=move |ev| title.set(event_target_value(&ev)) />
                </label>
                <label>
                    "Game: "
                    <input
                        type="text"
                        on:input=move |ev| game_type.set(event_target_value(&ev))
                    />
                </label>
                <label>
                    "Entry fee: "
                    <input
                        type="number"
                        step="0.01"
                        on:input=move |ev| {
                            entry_fee.set(event_target_value(&ev).parse::<f64>().unwrap_or(0.0))
                        }
                    />
                </label>
                <label>
                    "Prize pool: "
                    <input
                        type="number"
                        step="0.01"
                        on:input=move |ev| {
                            prize_pool.set(event_target_value(&ev).parse::<f64>().unwrap_or(0.0))
                        }
                    />
                </label>
                <label>
                    "Max players: "
                    <input
                        type="number"
                        on:input=move |ev| {
                            max_players.set(event_target_value(&ev).parse::<i32>().unwrap_or(0))
                        }
                    />
                </label>
                <label>
                    "Start time: "
                    <input
                        type="datetime-local"
                        on:input=move |ev| start_time.set(event_target_value(&ev))
                    />
                </label>
                <button type="submit">"Create"</button>
            </form>
            {move || {
                (!form_error.get().is_empty())
                    .then(|| view! { <p class="error">{form_error.get()}</p> })
            }}
        </div>
    }
}

#[component]
fn TournamentDetailPage() -> impl IntoView {
    let store = use_tournament_store();
    let params = use_params_map();
    let id = move || params.with(|p| p.get("id").unwrap_or_default());

    Effect::new(move |_| {
        let id = id();
        if !id.is_empty() {
            spawn_local(load_tournament(store, id));
        }
    });

    let action_error = RwSignal::new(String::new());

    let set_status = move |status: TournamentStatus| {
        let id = id();
        spawn_local(async move {
            let changes = TournamentUpdate {
                status: Some(status),
                ..Default::default()
            };
            let resp = api::tournaments::update(&id, changes).await;
            if let Some(error) = resp.error {
                action_error.set(error.to_string());
            } else if let Some(tournament) = resp.data {
                action_error.set(String::new());
                store.update_tournament(tournament);
            }
        });
    };

    let join = move |_| {
        let id = id();
        spawn_local(async move {
            let resp = api::tournaments::join(&id).await;
            if let Some(error) = resp.error {
                action_error.set(error.to_string());
            } else if let Some(tournament) = resp.data {
                action_error.set(String::new());
                store.update_tournament(tournament);
            }
        });
    };

    let delete = move |_| {
        let id = id();
        spawn_local(async move {
            let resp = api::tournaments::delete(&id).await;
            if let Some(error) = resp.error {
                action_error.set(error.to_string());
            } else {
                store.remove_tournament(&id);
                let navigate = use_navigate();
                navigate("/tournaments", NavigateOptions::default());
            }
        });
    };

    view! {
        <div>
            {move || {
                store
                    .error
                    .get()
                    .map(|error| {
                        view! {
                            <div class="notice">
                                <span>{error}</span>
                                <button on:click=move |_| {
                                    store.set_error(None)
                                }>"Dismiss"</button>
                            </div>
                        }
                    })
            }}
            {move || {
                if store.is_loading.get() {
                    view! { <p>"Loading tournament..."</p> }.into_any()
                } else {
                    match store.current.get() {
                        None => view! { <p>"Tournament not found."</p> }.into_any(),
                        Some(detail) => {
                            let t = detail.tournament.clone();
                            let matches = detail.matches.clone();
                            view! {
                                <h1>{t.title.clone()}</h1>
                                <p>
                                    {t.game_type.clone()} " — " {t.status.to_string()} " — starts "
                                    {t.start_time.to_string()}
                                </p>
                                <p>
                                    "Players: " {t.current_players} "/" {t.max_players}
                                    ", entry fee " {format!("{:.2}", t.entry_fee)} ", prize pool "
                                    {format!("{:.2}", t.prize_pool)}
                                </p>
                                {(t.status == TournamentStatus::Upcoming)
                                    .then(|| {
                                        view! {
                                            <button on:click=join.clone()>"Join"</button>
                                            <button on:click=move |_| {
                                                set_status(TournamentStatus::InProgress)
                                            }>"Start"</button>
                                            <button on:click=move |_| {
                                                set_status(TournamentStatus::Cancelled)
                                            }>"Cancel"</button>
                                        }
                                    })}
                                {(t.status == TournamentStatus::InProgress)
                                    .then(|| {
                                        view! {
                                            <button on:click=move |_| {
                                                set_status(TournamentStatus::Completed)
                                            }>"Complete"</button>
                                        }
                                    })}
                                <button on:click=delete.clone()>"Delete"</button>
                                <h2>"Matches"</h2>
                                {if matches.is_empty() {
                                    view! { <p>"No matches yet."</p> }.into_any()
                                } else {
                                    view! {
                                        <ul>
                                            {matches
                                                .into_iter()
                                                .map(|m| {
                                                    let href = format!("/matches/{}", m.id);
                                                    view! {
                                                        <li>
                                                            <a href=href>
                                                                {m.status.to_string()}
                                                                {m
                                                                    .score
                                                                    .clone()
                                                                    .map(|s| format!(" ({})", s))
                                                                    .unwrap_or_default()}
                                                            </a>
                                                        </li>
                                                    }
                                                })
                                                .collect_view()}
                                        </ul>
                                    }
                                        .into_any()
                                }}
                            }
                                .into_any()
                        }
                    }
                }
            }}
            {move || {
                (!action_error.get().is_empty())
                    .then(|| view! { <p class="error">{action_error.get()}</p> })
            }}
        </div>
    }
}

fn player_label(player: &Option<PlayerRef>) -> String {
    match player {
        Some(p) => p.username.clone().unwrap_or_else(|| p.id.clone()),
        None => "—".to_string(),
    }
}

#[component]
fn MatchDetailPage() -> impl IntoView {
    let store = use_match_store();
    let params = use_params_map();
    let id = move || params.with(|p| p.get("id").unwrap_or_default());

    Effect::new(move |_| {
        let id = id();
        if !id.is_empty() {
            spawn_local(load_match(store, id));
        }
    });

    let score = RwSignal::new(String::new());
    let winner = RwSignal::new(String::new());
    let action_error = RwSignal::new(String::new());

    let report = move |ev: SubmitEvent| {
        ev.prevent_default();
        let id = id();
        let w = winner.get();
        if w.is_empty() {
            action_error.set("Pick a winner.".to_string());
            return;
        }
        let changes = MatchUpdate {
            winner_id: Some(w),
            status: Some(MatchStatus::Completed),
            score: (!score.get().is_empty()).then(|| score.get()),
            ..Default::default()
        };
        spawn_local(async move {
            let resp = api::matches::update(&id, changes).await;
            if let Some(error) = resp.error {
                action_error.set(error.to_string());
            } else if let Some(updated) = resp.data {
                action_error.set(String::new());
                store.update_match(updated);
            }
        });
    };

    let dispute = move |_| {
        let id = id();
        spawn_local(async move {
            let changes = MatchUpdate {
                status: Some(MatchStatus::Disputed),
                ..Default::default()
            };
            let resp = api::matches::update(&id, changes).await;
            if let Some(error) = resp.error {
                action_error.set(error.to_string());
            } else if let Some(updated) = resp.data {
                store.update_match(updated);
            }
        });
    };

    let delete = move |_| {
        let id = id();
        spawn_local(async move {
            let resp = api::matches::delete(&id).await;
            if let Some(error) = resp.error {
                action_error.set(error.to_string());
            } else {
                let back = store
                    .current
                    .get_untracked()
                    .map(|c| format!("/tournaments/{}", c.summary.tournament_id))
                    .unwrap_or_else(|| "/tournaments".to_string());
                store.remove_match(&id);
                let navigate = use_navigate();
                navigate(&back, NavigateOptions::default());
            }
        });
    };

    view! {
        <div>
            {move || {
                store
                    .error
                    .get()
                    .map(|error| {
                        view! {
                            <div class="notice">
                                <span>{error}</span>
                                <button on:click=move |_| {
                                    store.set_error(None)
                                }>"Dismiss"</button>
                            </div>
                        }
                    })
            }}
            {move || {
                if store.is_loading.get() {
                    view! { <p>"Loading match..."</p> }.into_any()
                } else {
                    match store.current.get() {
                        None => view! { <p>"Match not found."</p> }.into_any(),
                        Some(detail) => {
                            let MatchWithPlayers { summary, player1, player2, winner: w } = detail;
                            let back = format!("/tournaments/{}", summary.tournament_id);
                            let p1 = summary.player1_id.clone();
                            let p2 = summary.player2_id.clone();
                            view! {
                                <h1>
                                    {player_label(&player1)} " vs " {player_label(&player2)}
                                </h1>
                                <p>
                                    "Status: " {summary.status.to_string()}
                                    {summary
                                        .score
                                        .clone()
                                        .map(|s| format!(", score {}", s))
                                        .unwrap_or_default()}
                                </p>
                                {w
                                    .as_ref()
                                    .map(|w| {
                                        let name = w.username.clone().unwrap_or_else(|| w.id.clone());
                                        view! { <p>"Winner: " {name}</p> }
                                    })}
                                <form on:submit=report.clone()>
                                    <label>
                                        "Winner: "
                                        <select on:change=move |ev| {
                                            winner.set(event_target_value(&ev))
                                        }>
                                            <option value="">"Select winner"</option>
                                            <option value=p1>{player_label(&player1)}</option>
                                            {p2
                                                .map(|p2_id| {
                                                    view! {
                                                        <option value=p2_id>{player_label(&player2)}</option>
                                                    }
                                                })}
                                        </select>
                                    </label>
                                    <label>
                                        "Score: "
                                        <input
                                            type="text"
                                            placeholder="2-1"
                                            on:input=move |ev| score.set(event_target_value(&ev))
                                        />
                                    </label>
                                    <button type="submit">"Report result"</button>
                                </form>
                                <button on:click=dispute.clone()>"Dispute"</button>
                                <button on:click=delete.clone()>"Delete"</button>
                                <p>
                                    <a href=back>"Back to tournament"</a>
                                </p>
                            }
                                .into_any()
                        }
                    }
                }
            }}
            {move || {
                (!action_error.get().is_empty())
                    .then(|| view! { <p class="error">{action_error.get()}</p> })
            }}
        </div>
    }
}

#[component]
fn WalletPage() -> impl IntoView {
    let auth = use_auth_store();
    let user = auth.user;

    view! {
        <div>
            <h1>"Wallet"</h1>
            {move || {
                match user.get() {
                    Some(user) => {
                        view! {
                            <p>"Account: " {user.email.clone()}</p>
                            <p>"Balance: " {format!("{:.2}", user.wallet_balance)}</p>
                            <p>"Entry fees are deducted here when you join a tournament."</p>
                        }
                            .into_any()
                    }
                    None => view! { <p>"Loading..."</p> }.into_any(),
                }
            }}
        </div>
    }
}
