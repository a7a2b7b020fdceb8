use leptos::prelude::*;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::model::{Match, MatchWithPlayers, Tournament, TournamentWithMatches, User};

/// A session transition observed by the auth store.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    SignedIn(User),
    SignedOut,
}

/// Token returned by [`SessionChanges::subscribe`]; pass it back to
/// [`SessionChanges::unsubscribe`] on teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(usize);

type SessionHandler = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

#[derive(Default)]
struct SessionRegistry {
    next_id: usize,
    handlers: BTreeMap<usize, SessionHandler>,
}

/// Explicit subscription interface for session transitions. Each registered
/// handler is invoked exactly once per transition, in subscription order,
/// until it is unsubscribed.
#[derive(Clone, Default)]
pub struct SessionChanges {
    registry: Arc<Mutex<SessionRegistry>>,
}

impl SessionChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        let mut registry = self.registry.lock().expect("session registry poisoned");
        let id = registry.next_id;
        registry.next_id += 1;
        registry.handlers.insert(id, Arc::new(handler));
        SubscriptionId(id)
    }

    /// Removes a handler. Returns false if the token was already
    /// unsubscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut registry = self.registry.lock().expect("session registry poisoned");
        registry.handlers.remove(&id.0).is_some()
    }

    fn notify(&self, event: &SessionEvent) {
        // Snapshot the handlers so one may subscribe or unsubscribe from
        // inside its own callback.
        let handlers: Vec<SessionHandler> = {
            let registry = self.registry.lock().expect("session registry poisoned");
            registry.handlers.values().cloned().collect()
        };
        for handler in handlers {
            handler(event);
        }
    }
}

/// Computes the event for a user change, or `None` when nothing observable
/// changed (same account, or still signed out).
fn session_transition(old: Option<&User>, new: Option<&User>) -> Option<SessionEvent> {
    match (old, new) {
        (None, Some(user)) => Some(SessionEvent::SignedIn(user.clone())),
        (Some(_), None) => Some(SessionEvent::SignedOut),
        (Some(a), Some(b)) if a.id != b.id => Some(SessionEvent::SignedIn(b.clone())),
        _ => None,
    }
}

/// Holds the signed-in user mirrored from the server session.
#[derive(Clone)]
pub struct AuthStore {
    pub user: RwSignal<Option<User>>,
    pub is_loading: RwSignal<bool>,
    changes: SessionChanges,
}

impl AuthStore {
    pub fn new() -> Self {
        AuthStore {
            user: RwSignal::new(None),
            is_loading: RwSignal::new(true),
            changes: SessionChanges::new(),
        }
    }

    pub fn changes(&self) -> &SessionChanges {
        &self.changes
    }

    /// Replaces the current user and notifies subscribers when the session
    /// actually transitioned. Setting the same account twice delivers
    /// nothing.
    pub fn set_user(&self, user: Option<User>) {
        let event = self
            .user
            .with_untracked(|old| session_transition(old.as_ref(), user.as_ref()));
        self.user.set(user);
        if let Some(event) = event {
            self.changes.notify(&event);
        }
    }

    pub fn set_loading(&self, loading: bool) {
        self.is_loading.set(loading);
    }
}

impl Default for AuthStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Tournament list and detail state mirrored from the access layer.
#[derive(Clone, Copy)]
pub struct TournamentStore {
    pub tournaments: RwSignal<Vec<Tournament>>,
    pub current: RwSignal<Option<TournamentWithMatches>>,
    pub is_loading: RwSignal<bool>,
    pub error: RwSignal<Option<String>>,
}

impl TournamentStore {
    pub fn new() -> Self {
        TournamentStore {
            tournaments: RwSignal::new(Vec::new()),
            current: RwSignal::new(None),
            is_loading: RwSignal::new(false),
            error: RwSignal::new(None),
        }
    }

    pub fn set_tournaments(&self, tournaments: Vec<Tournament>) {
        self.tournaments.set(tournaments);
    }

    pub fn set_current(&self, current: Option<TournamentWithMatches>) {
        self.current.set(current);
    }

    pub fn set_loading(&self, loading: bool) {
        self.is_loading.set(loading);
    }

    pub fn set_error(&self, error: Option<String>) {
        self.error.set(error);
    }

    pub fn add_tournament(&self, tournament: Tournament) {
        self.tournaments.update(|list| list.push(tournament));
    }

    pub fn update_tournament(&self, tournament: Tournament) {
        self.tournaments
            .update(|list| replace_tournament(list, &tournament));
        self.current
            .update(|current| merge_current_tournament(current, &tournament));
    }

    pub fn remove_tournament(&self, id: &str) {
        self.tournaments.update(|list| list.retain(|t| t.id != id));
        self.current.update(|current| {
            if current.as_ref().is_some_and(|c| c.tournament.id == id) {
                *current = None;
            }
        });
    }
}

impl Default for TournamentStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Match list and detail state mirrored from the access layer.
#[derive(Clone, Copy)]
pub struct MatchStore {
    pub matches: RwSignal<Vec<Match>>,
    pub current: RwSignal<Option<MatchWithPlayers>>,
    pub is_loading: RwSignal<bool>,
    pub error: RwSignal<Option<String>>,
}

impl MatchStore {
    pub fn new() -> Self {
        MatchStore {
            matches: RwSignal::new(Vec::new()),
            current: RwSignal::new(None),
            is_loading: RwSignal::new(false),
            error: RwSignal::new(None),
        }
    }

    pub fn set_matches(&self, matches: Vec<Match>) {
        self.matches.set(matches);
    }

    pub fn set_current(&self, current: Option<MatchWithPlayers>) {
        self.current.set(current);
    }

    pub fn set_loading(&self, loading: bool) {
        self.is_loading.set(loading);
    }

    pub fn set_error(&self, error: Option<String>) {
        self.error.set(error);
    }

    pub fn add_match(&self, m: Match) {
        self.matches.update(|list| list.push(m));
    }

    pub fn update_match(&self, m: Match) {
        self.matches.update(|list| replace_match(list, &m));
        self.current
            .update(|current| merge_current_match(current, &m));
    }

    pub fn remove_match(&self, id: &str) {
        self.matches.update(|list| list.retain(|m| m.id != id));
        self.current.update(|current| {
            if current.as_ref().is_some_and(|c| c.summary.id == id) {
                *current = None;
            }
        });
    }
}

impl Default for MatchStore {
    fn default() -> Self {
        Self::new()
    }
}

fn replace_tournament(list: &mut [Tournament], updated: &Tournament) {
    if let Some(entry) = list.iter_mut().find(|t| t.id == updated.id) {
        *entry = updated.clone();
    }
}

/// Shallow-merges an updated tournament into the detail view, preserving the
/// already-loaded matches.
fn merge_current_tournament(current: &mut Option<TournamentWithMatches>, updated: &Tournament) {
    if let Some(c) = current {
        if c.tournament.id == updated.id {
            c.tournament = updated.clone();
        }
    }
}

fn replace_match(list: &mut [Match], updated: &Match) {
    if let Some(entry) = list.iter_mut().find(|m| m.id == updated.id) {
        *entry = updated.clone();
    }
}

/// Shallow-merges an updated match into the detail view, preserving the
/// already-loaded player records.
fn merge_current_match(current: &mut Option<MatchWithPlayers>, updated: &Match) {
    if let Some(c) = current {
        if c.summary.id == updated.id {
            c.summary = updated.clone();
        }
    }
}

/// Constructs the application's stores and provides them through context.
/// Called once from the root component; the reactive owner tears them down
/// with the application.
pub fn provide_stores() {
    provide_context(AuthStore::new());
    provide_context(TournamentStore::new());
    provide_context(MatchStore::new());
}

pub fn use_auth_store() -> AuthStore {
    expect_context::<AuthStore>()
}

pub fn use_tournament_store() -> TournamentStore {
    expect_context::<TournamentStore>()
}

pub fn use_match_store() -> MatchStore {
    expect_context::<MatchStore>()
}
