use actix::{
    Actor, ActorContext, ActorFutureExt, AsyncContext, Context, Handler, Message, Recipient,
    SpawnHandle, WrapFuture,
};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::actors::announcer::Announce;
use crate::config::GameSettings;
use crate::quiz::{Difficulty, Question};
use crate::room::RoomId;
use crate::scoreboard::ScoreBoard;
use crate::store::TriviaStore;

/// Lifecycle of a game session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    /// Questions ran out and the scores were announced and saved
    Finished,
    /// Cancelled before the end; nothing was saved
    Stopped,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Finished | SessionState::Stopped)
    }
}

/// What the current question reveals next if nobody answers in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RevealStep {
    Hint(Difficulty),
    Answer,
}

/// Message carrying a chat line that may answer the current question
#[derive(Message)]
#[rtype(result = "bool")]
pub struct SubmitAnswer {
    pub user_name: String,
    pub text: String,
}

/// Message to close the current question without crediting anyone
#[derive(Message)]
#[rtype(result = "bool")]
pub struct SkipQuestion;

/// Message to cancel the game without saving its scores
#[derive(Message)]
#[rtype(result = "bool")]
pub struct StopGame;

type Step = fn(&mut GameSession, &mut Context<GameSession>);

/// Actor running one room's trivia game.
///
/// The reveal cadence is a chain of one-shot timers: each question gets its
/// prompt, then after every `hint_delay` the next hint and finally the answer.
/// A correct answer or a skip cancels the pending timer and closes the
/// question, and the next one is asked `question_delay` later. Only one timer
/// is pending at any time, so reveal steps never interleave across questions.
pub struct GameSession {
    room: RoomId,
    settings: GameSettings,
    questions: VecDeque<Question>,
    current: Option<Question>,
    next_step: RevealStep,
    scoreboard: Option<ScoreBoard>,
    state: SessionState,
    pending: Option<SpawnHandle>,
    store: TriviaStore,
    announcer: Recipient<Announce>,
    state_tx: watch::Sender<SessionState>,
}

impl GameSession {
    pub fn new(
        room: RoomId,
        questions: Vec<Question>,
        settings: GameSettings,
        store: TriviaStore,
        announcer: Recipient<Announce>,
    ) -> (Self, watch::Receiver<SessionState>) {
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);

        let session = Self {
            scoreboard: Some(ScoreBoard::new(room.clone())),
            room,
            settings,
            questions: questions.into(),
            current: None,
            next_step: RevealStep::Hint(Difficulty::Hard),
            state: SessionState::Idle,
            pending: None,
            store,
            announcer,
            state_tx,
        };

        (session, state_rx)
    }

    fn announce(&self, text: impl Into<String>) {
        self.announcer.do_send(Announce {
            room: self.room.clone(),
            text: text.into(),
        });
    }

    fn set_state(&mut self, state: SessionState) {
        debug!("Session {} is now {:?}", self.room, state);
        self.state = state;
        self.state_tx.send_replace(state);
    }

    fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    /// Replace the pending timer with `step` after `delay`
    fn schedule(&mut self, ctx: &mut Context<Self>, delay: Duration, step: Step) {
        self.cancel_pending(ctx);

        let handle = ctx.run_later(delay, move |act, ctx| {
            act.pending = None;
            step(act, ctx);
        });
        self.pending = Some(handle);
    }

    fn cancel_pending(&mut self, ctx: &mut Context<Self>) {
        if let Some(handle) = self.pending.take() {
            ctx.cancel_future(handle);
        }
    }

    fn ask_next_question(&mut self, ctx: &mut Context<Self>) {
        if !self.is_running() {
            return;
        }

        let Some(question) = self.questions.pop_front() else {
            self.finish(ctx);
            return;
        };

        debug!(
            "Asking a question in {} ({} left after this one)",
            self.room,
            self.questions.len()
        );

        self.announce(question.prompt());
        self.current = Some(question);
        self.next_step = RevealStep::Hint(Difficulty::Hard);
        self.schedule(ctx, self.settings.hint_delay, Self::reveal_next);
    }

    fn reveal_next(&mut self, ctx: &mut Context<Self>) {
        if !self.is_running() {
            return;
        }

        let Some(question) = self.current.as_ref() else {
            return;
        };
        if question.is_completed() {
            return;
        }

        match self.next_step {
            RevealStep::Hint(difficulty) => {
                let hint = format!("Hint: {}", question.hint(difficulty));
                self.announce(hint);

                self.next_step = difficulty
                    .easier()
                    .map_or(RevealStep::Answer, RevealStep::Hint);
                self.schedule(ctx, self.settings.hint_delay, Self::reveal_next);
            }
            RevealStep::Answer => {
                let answer = format!("Answer: {}", question.answer());
                self.announce(answer);
                self.close_question(ctx);
            }
        }
    }

    /// Retire the current question and queue the next one
    fn close_question(&mut self, ctx: &mut Context<Self>) {
        self.current = None;
        self.schedule(ctx, self.settings.question_delay, Self::ask_next_question);
    }

    fn finish(&mut self, ctx: &mut Context<Self>) {
        self.cancel_pending(ctx);
        self.set_state(SessionState::Finished);

        let Some(scoreboard) = self.scoreboard.take() else {
            ctx.stop();
            return;
        };

        info!("Trivia game finished in {}", self.room);
        self.announce(scoreboard.summary());

        // Hold the mailbox until the save is done
        let store = self.store.clone();
        ctx.wait(
            async move { scoreboard.save(&store).await }
                .into_actor(self)
                .map(|result, act, ctx| {
                    if let Err(e) = result {
                        error!("Failed to save scores for {}: {}", act.room, e);
                        act.announce(format!("Could not save the scores of this game: {e}"));
                    }
                    ctx.stop();
                }),
        );
    }
}

impl Actor for GameSession {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Context<Self>) {
        info!(
            "Trivia game started in {} with {} question(s)",
            self.room,
            self.questions.len()
        );

        self.set_state(SessionState::Running);
        self.ask_next_question(ctx);
    }

    fn stopped(&mut self, _ctx: &mut Context<Self>) {
        debug!("Game session for {} closed", self.room);
    }
}

impl Handler<SubmitAnswer> for GameSession {
    type Result = bool;

    fn handle(&mut self, msg: SubmitAnswer, ctx: &mut Context<Self>) -> Self::Result {
        if !self.is_running() {
            return false;
        }

        let Some(question) = self.current.as_mut() else {
            return false;
        };
        if question.is_completed() || !question.is_correct(&msg.text) || !question.complete() {
            return false;
        }

        info!("{} answered correctly in {}", msg.user_name, self.room);
        self.announce("Correct!");

        if let Some(scoreboard) = self.scoreboard.as_mut() {
            scoreboard.add_point(&msg.user_name);
        }

        self.close_question(ctx);
        true
    }
}

impl Handler<SkipQuestion> for GameSession {
    type Result = bool;

    fn handle(&mut self, _msg: SkipQuestion, ctx: &mut Context<Self>) -> Self::Result {
        if !self.is_running() {
            return false;
        }

        let skipped = self
            .current
            .as_mut()
            .is_some_and(|question| question.complete());
        if !skipped {
            return false;
        }

        info!("Question skipped in {}", self.room);
        self.close_question(ctx);
        true
    }
}

impl Handler<StopGame> for GameSession {
    type Result = bool;

    fn handle(&mut self, _msg: StopGame, ctx: &mut Context<Self>) -> Self::Result {
        if !self.is_running() {
            return false;
        }

        self.cancel_pending(ctx);
        self.current = None;
        self.questions.clear();
        self.scoreboard = None;
        self.set_state(SessionState::Stopped);

        info!("Trivia game stopped in {}", self.room);
        ctx.stop();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actors::announcer::testing::{next_text, transcript};
    use actix::Addr;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn settings(hint_delay: Duration, question_delay: Duration) -> GameSettings {
        GameSettings {
            hint_delay,
            question_delay,
            default_question_count: 10,
        }
    }

    fn start(
        store: &TriviaStore,
        questions: Vec<Question>,
        settings: GameSettings,
    ) -> (
        Addr<GameSession>,
        watch::Receiver<SessionState>,
        UnboundedReceiver<Announce>,
    ) {
        let (announcer, transcript) = transcript();
        let (session, state) = GameSession::new(
            RoomId::from("quiz"),
            questions,
            settings,
            store.clone(),
            announcer,
        );
        (session.start(), state, transcript)
    }

    async fn closed(mut state: watch::Receiver<SessionState>) -> SessionState {
        let last = tokio::time::timeout(Duration::from_secs(5), async {
            while state.changed().await.is_ok() {}
            *state.borrow()
        });
        last.await.expect("session did not close")
    }

    fn answer(user_name: &str, text: &str) -> SubmitAnswer {
        SubmitAnswer {
            user_name: user_name.to_string(),
            text: text.to_string(),
        }
    }

    #[actix_rt::test]
    async fn test_correct_answer_is_scored_and_saved() {
        let store = TriviaStore::in_memory().await.unwrap();
        let (addr, state, mut transcript) = start(
            &store,
            vec![Question::new("2+2", "4")],
            settings(Duration::from_secs(60), Duration::ZERO),
        );

        assert_eq!(next_text(&mut transcript).await, "2+2");
        assert!(addr.send(answer("alice", "4")).await.unwrap());
        assert_eq!(next_text(&mut transcript).await, "Correct!");
        assert_eq!(
            next_text(&mut transcript).await,
            "Game finished! Stats: alice: 1 point(s)"
        );

        assert_eq!(closed(state).await, SessionState::Finished);
        let room = RoomId::from("quiz");
        assert_eq!(store.points_for(&room, "alice").await.unwrap(), 1);
    }

    #[actix_rt::test]
    async fn test_unanswered_question_reveals_hints_then_answer() {
        let store = TriviaStore::in_memory().await.unwrap();
        let (_addr, state, mut transcript) = start(
            &store,
            vec![Question::new("2+2", "4")],
            settings(Duration::ZERO, Duration::ZERO),
        );

        assert_eq!(next_text(&mut transcript).await, "2+2");
        for _ in Difficulty::ALL {
            assert_eq!(next_text(&mut transcript).await, "Hint: 4");
        }
        assert_eq!(next_text(&mut transcript).await, "Answer: 4");
        assert_eq!(next_text(&mut transcript).await, "Game finished!");

        assert_eq!(closed(state).await, SessionState::Finished);
        let room = RoomId::from("quiz");
        assert!(store.hall_of_fame(&room).await.unwrap().is_empty());
    }

    #[actix_rt::test]
    async fn test_hints_go_from_hard_to_easy() {
        let store = TriviaStore::in_memory().await.unwrap();
        let question = Question::new("Capital of Finland?", "Helsinki");
        let expected: Vec<String> = Difficulty::ALL
            .iter()
            .map(|d| format!("Hint: {}", question.hint(*d)))
            .collect();

        let (_addr, state, mut transcript) = start(
            &store,
            vec![question],
            settings(Duration::from_millis(10), Duration::ZERO),
        );

        assert_eq!(next_text(&mut transcript).await, "Capital of Finland?");
        for hint in expected {
            assert_eq!(next_text(&mut transcript).await, hint);
        }
        assert_eq!(next_text(&mut transcript).await, "Answer: Helsinki");
        assert_eq!(next_text(&mut transcript).await, "Game finished!");
        closed(state).await;
    }

    #[actix_rt::test]
    async fn test_late_and_wrong_answers_are_ignored() {
        let store = TriviaStore::in_memory().await.unwrap();
        let (addr, state, mut transcript) = start(
            &store,
            vec![Question::new("Capital of Finland?", "Helsinki")],
            settings(Duration::from_secs(60), Duration::from_millis(200)),
        );

        assert_eq!(next_text(&mut transcript).await, "Capital of Finland?");
        assert!(!addr.send(answer("bob", "Turku")).await.unwrap());
        assert!(addr.send(answer("alice", "helsinki")).await.unwrap());
        // The question is already completed, so nobody else is credited
        assert!(!addr.send(answer("bob", "Helsinki")).await.unwrap());
        assert!(!addr.send(answer("alice", "HELSINKI")).await.unwrap());

        assert_eq!(next_text(&mut transcript).await, "Correct!");
        assert_eq!(
            next_text(&mut transcript).await,
            "Game finished! Stats: alice: 1 point(s)"
        );
        closed(state).await;
    }

    #[actix_rt::test]
    async fn test_skip_moves_to_next_question() {
        let store = TriviaStore::in_memory().await.unwrap();
        let (addr, state, mut transcript) = start(
            &store,
            vec![Question::new("first", "1"), Question::new("second", "2")],
            settings(Duration::from_secs(60), Duration::ZERO),
        );

        assert_eq!(next_text(&mut transcript).await, "first");
        assert!(addr.send(SkipQuestion).await.unwrap());
        assert_eq!(next_text(&mut transcript).await, "second");

        // The skipped question no longer accepts answers
        assert!(!addr.send(answer("alice", "1")).await.unwrap());
        assert!(addr.send(answer("alice", "2")).await.unwrap());
        assert_eq!(next_text(&mut transcript).await, "Correct!");
        assert_eq!(
            next_text(&mut transcript).await,
            "Game finished! Stats: alice: 1 point(s)"
        );
        closed(state).await;
    }

    #[actix_rt::test]
    async fn test_failed_save_is_announced() {
        let store = TriviaStore::in_memory().await.unwrap();
        let (addr, state, mut transcript) = start(
            &store,
            vec![Question::new("2+2", "4")],
            settings(Duration::from_secs(60), Duration::ZERO),
        );

        assert_eq!(next_text(&mut transcript).await, "2+2");
        store.drop_table("GameStatistics").await;

        assert!(addr.send(answer("alice", "4")).await.unwrap());
        assert_eq!(next_text(&mut transcript).await, "Correct!");
        assert_eq!(
            next_text(&mut transcript).await,
            "Game finished! Stats: alice: 1 point(s)"
        );

        let failure = next_text(&mut transcript).await;
        assert!(
            failure.starts_with("Could not save the scores of this game"),
            "unexpected announcement {failure:?}"
        );
        assert_eq!(closed(state).await, SessionState::Finished);
    }

    #[actix_rt::test]
    async fn test_stop_cancels_reveals_and_discards_scores() {
        let store = TriviaStore::in_memory().await.unwrap();
        let (addr, state, mut transcript) = start(
            &store,
            vec![Question::new("first", "1"), Question::new("second", "2")],
            settings(Duration::from_millis(250), Duration::from_millis(250)),
        );

        assert_eq!(next_text(&mut transcript).await, "first");
        assert!(addr.send(answer("alice", "1")).await.unwrap());
        assert_eq!(next_text(&mut transcript).await, "Correct!");
        assert!(addr.send(StopGame).await.unwrap());

        assert_eq!(closed(state).await, SessionState::Stopped);

        // Wait past every delay that was pending when the game stopped
        tokio::time::sleep(Duration::from_millis(750)).await;
        assert!(transcript.try_recv().is_err());

        let room = RoomId::from("quiz");
        assert_eq!(store.points_for(&room, "alice").await.unwrap(), 0);
    }
}
