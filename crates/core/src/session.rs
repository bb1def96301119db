//! Search session controller.
//!
//! [`SessionState::transition`] is the whole state machine: it takes an
//! [`Event`] and returns the next state plus the [`Effect`]s the caller must
//! perform. [`SearchSession`] is the async driver that runs those effects
//! against a [`LifecycleClient`] and a [`HistoryStore`].

use chrono::Utc;
use lifecycle_llm::Collaborator;
use secrecy::SecretString;
use tracing::{debug, warn};

use crate::client::LifecycleClient;
use crate::error::QueryError;
use crate::history::{HistoryList, HistoryStore, Slot};
use crate::model::LifecycleResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    CredentialMissing,
    QuotaExhausted,
    ModelUnavailable,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&QueryError> for ErrorInfo {
    fn from(err: &QueryError) -> Self {
        let kind = match err {
            QueryError::CredentialMissing => ErrorKind::CredentialMissing,
            QueryError::QuotaExhausted => ErrorKind::QuotaExhausted,
            QueryError::ModelUnavailable => ErrorKind::ModelUnavailable,
            QueryError::Unknown(_) => ErrorKind::Unknown,
        };
        Self {
            kind,
            message: err.user_message(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Loading,
    Success(LifecycleResult),
    Failure(ErrorInfo),
}

impl Phase {
    pub fn is_loading(&self) -> bool {
        matches!(self, Phase::Loading)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Loading => "loading",
            Phase::Success(_) => "success",
            Phase::Failure(_) => "failure",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Submit(String),
    Replay(String),
    Resolved {
        result: LifecycleResult,
        timestamp: i64,
    },
    Rejected(QueryError),
    Retry,
    Dismiss,
    ClearHistory,
    CredentialConfigured,
}

/// Work the driver performs after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Query(String),
    SaveHistory,
    ClearStorage,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub phase: Phase,
    pub last_query: String,
    pub history: HistoryList,
    pub needs_credential: bool,
}

impl SessionState {
    pub fn new(history: HistoryList) -> Self {
        Self {
            history,
            ..Self::default()
        }
    }

    /// Pairs that are not listed leave the state untouched with no effects.
    /// Starting a query while one is loading is rejected.
    pub fn transition(mut self, event: Event) -> (SessionState, Vec<Effect>) {
        let loading = self.phase.is_loading();
        let failed = matches!(self.phase, Phase::Failure(_));
        match event {
            Event::Submit(_) | Event::Replay(_) | Event::Retry if loading => {
                debug!("query already in flight, ignoring");
                (self, Vec::new())
            }
            Event::Submit(query) | Event::Replay(query) => self.start(query),
            Event::Retry if failed => {
                let query = self.last_query.clone();
                self.start(query)
            }
            Event::Resolved { result, timestamp } if loading => {
                self.history.upsert(self.last_query.clone(), timestamp);
                self.phase = Phase::Success(result);
                (self, vec![Effect::SaveHistory])
            }
            Event::Rejected(err) if loading => {
                if err.needs_credential() {
                    self.needs_credential = true;
                }
                self.phase = Phase::Failure(ErrorInfo::from(&err));
                (self, Vec::new())
            }
            Event::Dismiss if failed => {
                self.phase = Phase::Idle;
                (self, Vec::new())
            }
            Event::ClearHistory => {
                self.history.clear();
                (self, vec![Effect::ClearStorage])
            }
            Event::CredentialConfigured => {
                self.needs_credential = false;
                (self, Vec::new())
            }
            event => {
                debug!(phase = self.phase.name(), ?event, "event ignored");
                (self, Vec::new())
            }
        }
    }

    fn start(mut self, query: String) -> (SessionState, Vec<Effect>) {
        let query = query.trim().to_string();
        if query.is_empty() {
            return (self, Vec::new());
        }
        self.last_query = query.clone();
        self.phase = Phase::Loading;
        (self, vec![Effect::Query(query)])
    }
}

/// Drives one session: one query at a time, history persisted after every
/// mutation.
pub struct SearchSession<C, S> {
    client: LifecycleClient<C>,
    store: HistoryStore<S>,
    state: SessionState,
}

impl<C: Collaborator, S: Slot> SearchSession<C, S> {
    pub fn open(client: LifecycleClient<C>, store: HistoryStore<S>) -> Self {
        let history = store.load();
        Self {
            client,
            store,
            state: SessionState::new(history),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> &Phase {
        &self.state.phase
    }

    pub fn history(&self) -> &HistoryList {
        &self.state.history
    }

    pub fn client(&self) -> &LifecycleClient<C> {
        &self.client
    }

    pub fn store(&self) -> &HistoryStore<S> {
        &self.store
    }

    pub async fn submit(&mut self, query: &str) -> &Phase {
        self.dispatch(Event::Submit(query.to_string())).await
    }

    /// Re-runs the history entry at `index` (0 = most recent). Out-of-range
    /// indices leave the session unchanged.
    pub async fn replay(&mut self, index: usize) -> &Phase {
        let Some(query) = self.state.history.get(index).map(|entry| entry.query.clone()) else {
            return &self.state.phase;
        };
        self.dispatch(Event::Replay(query)).await
    }

    pub async fn retry(&mut self) -> &Phase {
        self.dispatch(Event::Retry).await
    }

    pub fn dismiss(&mut self) -> &Phase {
        self.apply(Event::Dismiss);
        &self.state.phase
    }

    pub fn clear_history(&mut self) {
        self.apply(Event::ClearHistory);
    }

    pub fn configure_credential(&mut self, credential: SecretString) {
        self.client.set_credential(Some(credential));
        self.apply(Event::CredentialConfigured);
    }

    async fn dispatch(&mut self, event: Event) -> &Phase {
        let mut queue = self.apply(event);
        while let Some(query) = queue.take() {
            let event = match self.client.query(&query).await {
                Ok(result) => Event::Resolved {
                    result,
                    timestamp: Utc::now().timestamp_millis(),
                },
                Err(err) => Event::Rejected(err),
            };
            queue = self.apply(event);
        }
        &self.state.phase
    }

    /// Applies one event and runs its storage effects. Returns the query to
    /// send, if the transition started one.
    fn apply(&mut self, event: Event) -> Option<String> {
        let state = std::mem::take(&mut self.state);
        let (next, effects) = state.transition(event);
        self.state = next;
        let mut query = None;
        for effect in effects {
            match effect {
                Effect::Query(q) => query = Some(q),
                Effect::SaveHistory => {
                    if let Err(err) = self.store.save(&self.state.history) {
                        warn!(error = %err, "failed to save search history");
                    }
                }
                Effect::ClearStorage => {
                    if let Err(err) = self.store.clear() {
                        warn!(error = %err, "failed to clear search history");
                    }
                }
            }
        }
        query
    }
}
