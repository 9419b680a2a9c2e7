//! Room → game session bookkeeping.
//!
//! The chat host owns one [`SessionRegistry`] and calls into it for every
//! command and chat line. Each room has at most one live [`GameSession`]
//! actor; rooms never share session state, only the durable store.

use actix::{Actor, Addr, ArbiterHandle, MailboxError, Recipient};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::actors::announcer::Announce;
use crate::actors::game_session::{
    GameSession, SessionState, SkipQuestion, StopGame, SubmitAnswer,
};
use crate::config::GameSettings;
use crate::error::{Result, SessionError};
use crate::quiz::QuestionSource;
use crate::room::RoomId;
use crate::store::{HallOfFameEntry, TriviaStore};

/// Cloneable view of a running (or finished) session
#[derive(Clone)]
pub struct SessionHandle {
    addr: Addr<GameSession>,
    state: watch::Receiver<SessionState>,
}

impl SessionHandle {
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn in_progress(&self) -> bool {
        !self.state().is_terminal() && self.addr.connected()
    }

    /// Resolves once the session actor is gone, after its save if it had one
    pub async fn closed(&self) -> SessionState {
        let mut state = self.state.clone();
        while state.changed().await.is_ok() {}
        let last = *state.borrow();
        last
    }
}

pub struct SessionRegistry {
    store: TriviaStore,
    settings: GameSettings,
    announcer: Recipient<Announce>,
    arbiter: ArbiterHandle,
    sessions: Mutex<HashMap<RoomId, SessionHandle>>,
    /// Serializes session starts so a room cannot be started twice concurrently
    starting: tokio::sync::Mutex<()>,
}

impl SessionRegistry {
    pub fn new(
        store: TriviaStore,
        settings: GameSettings,
        announcer: Recipient<Announce>,
        arbiter: ArbiterHandle,
    ) -> Self {
        Self {
            store,
            settings,
            announcer,
            arbiter,
            sessions: Mutex::new(HashMap::new()),
            starting: tokio::sync::Mutex::new(()),
        }
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<RoomId, SessionHandle>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn session(&self, room: &RoomId) -> Option<SessionHandle> {
        self.sessions().get(room).cloned()
    }

    pub fn in_progress(&self, room: &RoomId) -> bool {
        self.session(room).is_some_and(|handle| handle.in_progress())
    }

    fn active_session(&self, room: &RoomId) -> Option<Addr<GameSession>> {
        self.session(room)
            .filter(SessionHandle::in_progress)
            .map(|handle| handle.addr)
    }

    /// Start a game in `room`, drawing `question_count` questions or the
    /// configured default. Returns the number of questions drawn.
    pub async fn start_session(
        &self,
        room: &RoomId,
        question_count: Option<usize>,
    ) -> Result<usize> {
        let _starting = self.starting.lock().await;

        if self.in_progress(room) {
            return Err(SessionError::AlreadyRunning(room.clone()).into());
        }

        let count = question_count.unwrap_or(self.settings.default_question_count);
        if count == 0 {
            return Err(SessionError::InvalidQuestionCount(count).into());
        }

        let questions = QuestionSource::new(&self.store).draw(count).await?;
        if questions.is_empty() {
            return Err(SessionError::EmptyQuestionBank.into());
        }
        let drawn = questions.len();

        let (session, state) = GameSession::new(
            room.clone(),
            questions,
            self.settings,
            self.store.clone(),
            self.announcer.clone(),
        );
        let addr = GameSession::start_in_arbiter(&self.arbiter, move |_| session);

        self.sessions()
            .insert(room.clone(), SessionHandle { addr, state });

        info!("Started trivia in {} with {} question(s)", room, drawn);
        Ok(drawn)
    }

    /// Cancel the game in `room` without saving. Returns whether a running
    /// game was stopped.
    pub async fn stop_session(&self, room: &RoomId) -> bool {
        let handle = self.sessions().remove(room);

        match handle {
            Some(handle) if handle.in_progress() => {
                ignore_closed(handle.addr.send(StopGame).await)
            }
            _ => false,
        }
    }

    pub async fn skip_current_question(&self, room: &RoomId) -> bool {
        match self.active_session(room) {
            Some(addr) => ignore_closed(addr.send(SkipQuestion).await),
            None => false,
        }
    }

    /// Offer a chat line as an answer. Cheap no-op when the room has no game.
    pub async fn submit_answer(&self, room: &RoomId, user_name: &str, text: &str) -> bool {
        let Some(addr) = self.active_session(room) else {
            return false;
        };

        ignore_closed(
            addr.send(SubmitAnswer {
                user_name: user_name.to_string(),
                text: text.to_string(),
            })
            .await,
        )
    }

    pub async fn add_alias(&self, user_name: &str, alias: &str) -> Result<bool> {
        Ok(self.store.add_alias(user_name, alias).await?)
    }

    pub async fn remove_alias(&self, user_name: &str, alias: &str) -> Result<bool> {
        Ok(self.store.remove_alias(user_name, alias).await?)
    }

    pub async fn list_aliases(&self, user_name: &str) -> Result<Vec<String>> {
        Ok(self.store.list_aliases(user_name).await?)
    }

    pub async fn hall_of_fame(&self, room: &RoomId) -> Result<Vec<HallOfFameEntry>> {
        Ok(self.store.hall_of_fame(room).await?)
    }

    pub async fn user_points(&self, room: &RoomId, user_name: &str) -> Result<i64> {
        Ok(self.store.points_for(room, user_name).await?)
    }
}

// A session that stopped between lookup and delivery simply ignores the message
fn ignore_closed(result: std::result::Result<bool, MailboxError>) -> bool {
    result.unwrap_or_else(|e| {
        debug!("Session no longer accepts messages: {}", e);
        false
    })
}

/// Text for a user's statistics
pub fn describe_points(user_name: &str, points: i64) -> String {
    format!("Statistics for {user_name}: {points} point(s)")
}
