use std::collections::HashSet;

use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::dao::models::QuestionEntity;

/// Runtime representation of a question inside an active session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Question identifier.
    pub id: Uuid,
    /// Prompt shown to participants.
    pub text: String,
    /// Answer options.
    pub options: Vec<String>,
    /// 0-based index of the correct option.
    pub correct_answer: u32,
    /// Configured answer window; the engine default applies when absent.
    pub time_limit_secs: Option<u32>,
    /// Points awarded for a correct answer.
    pub points: u32,
}

impl Question {
    /// Resolve the answer window, falling back to the engine default.
    pub fn effective_time_limit(&self, default_secs: u32) -> u32 {
        self.time_limit_secs.unwrap_or(default_secs)
    }
}

impl From<QuestionEntity> for Question {
    fn from(value: QuestionEntity) -> Self {
        Self {
            id: value.id,
            text: value.text,
            options: value.options,
            correct_answer: value.correct_answer,
            time_limit_secs: value.time_limit_secs,
            points: value.points,
        }
    }
}

/// Phases a quiz session moves through.
///
/// `Starting` covers the window between the start command and the first
/// question broadcast. The question/leaderboard pair loops until the last
/// question, after which the session parks in `Ended` until evicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Session created, first question not yet shown.
    Starting,
    /// A question is live and accepting answers.
    QuestionActive,
    /// Standings are displayed between questions.
    Leaderboard,
    /// The quiz finished; the session lingers for late reads.
    Ended,
}

/// What caused an advancement out of the active question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceTrigger {
    /// Every registered participant answered.
    AllAnswered,
    /// The server-side countdown reached zero.
    TimerExpired,
    /// A client sent the explicit `question_timeout` fallback.
    ClientTimeout,
}

/// Handle to the countdown task of the active question.
///
/// The session owns at most one of these; [`QuizSession::replace_timer`] is
/// the only way to install a new one and always cancels the predecessor.
#[derive(Debug)]
pub struct TimerHandle {
    question_index: usize,
    task: JoinHandle<()>,
}

impl TimerHandle {
    /// Wrap a spawned countdown task for the given question.
    pub fn new(question_index: usize, task: JoinHandle<()>) -> Self {
        Self {
            question_index,
            task,
        }
    }

    /// Question the countdown was armed for.
    pub fn question_index(&self) -> usize {
        self.question_index
    }

    /// Stop the countdown task.
    pub fn cancel(self) {
        self.task.abort();
    }
}

/// Live, in-memory execution state of a quiz for one room.
///
/// All mutation happens under the registry's per-room mutex, so the fields
/// need no synchronization of their own.
#[derive(Debug)]
pub struct QuizSession {
    room_id: Uuid,
    quiz_id: Uuid,
    questions: Vec<Question>,
    phase: SessionPhase,
    current_index: usize,
    answered: HashSet<Uuid>,
    timer: Option<TimerHandle>,
}

impl QuizSession {
    /// Create a session positioned before its first question.
    ///
    /// `questions` must be non-empty and already ordered; the start operation
    /// validates both before constructing the session.
    pub fn new(room_id: Uuid, quiz_id: Uuid, questions: Vec<Question>) -> Self {
        debug_assert!(!questions.is_empty());
        Self {
            room_id,
            quiz_id,
            questions,
            phase: SessionPhase::Starting,
            current_index: 0,
            answered: HashSet::new(),
            timer: None,
        }
    }

    /// Room this session belongs to.
    pub fn room_id(&self) -> Uuid {
        self.room_id
    }

    /// Quiz being played.
    pub fn quiz_id(&self) -> Uuid {
        self.quiz_id
    }

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// 0-based index of the current question.
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// Total number of questions in the quiz.
    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    /// Whether the current question is the last one.
    pub fn on_last_question(&self) -> bool {
        self.current_index + 1 == self.questions.len()
    }

    /// The question at the current index.
    pub fn current_question(&self) -> &Question {
        &self.questions[self.current_index]
    }

    /// Record that a participant answered the current question.
    ///
    /// Returns `false` when the participant already answered it — the caller
    /// must treat that submission as a duplicate and skip scoring.
    pub fn record_answer(&mut self, participant_id: Uuid) -> bool {
        self.answered.insert(participant_id)
    }

    /// Whether a participant already answered the current question.
    pub fn has_answered(&self, participant_id: Uuid) -> bool {
        self.answered.contains(&participant_id)
    }

    /// Whether every id in the roster answered the current question.
    pub fn all_answered<'a>(&self, roster: impl IntoIterator<Item = &'a Uuid>) -> bool {
        roster.into_iter().all(|id| self.answered.contains(id))
    }

    /// Make the current question live: enters `QuestionActive` and clears the
    /// answered set. Valid from `Starting` (first question) and `Leaderboard`
    /// (after an advance).
    pub fn activate_question(&mut self) {
        debug_assert!(matches!(
            self.phase,
            SessionPhase::Starting | SessionPhase::Leaderboard
        ));
        self.phase = SessionPhase::QuestionActive;
        self.answered.clear();
    }

    /// Enter the leaderboard interstitial after an advancement trigger.
    pub fn show_leaderboard(&mut self) {
        debug_assert_eq!(self.phase, SessionPhase::QuestionActive);
        self.phase = SessionPhase::Leaderboard;
    }

    /// Step to the next question index. Panics in debug builds when already
    /// on the last question; callers check [`Self::on_last_question`] first.
    pub fn step_to_next_question(&mut self) {
        debug_assert!(!self.on_last_question());
        self.current_index += 1;
    }

    /// Terminal transition once the last leaderboard was shown.
    pub fn finish(&mut self) {
        self.phase = SessionPhase::Ended;
    }

    /// Install a countdown for the current question, cancelling any live one.
    pub fn replace_timer(&mut self, handle: TimerHandle) {
        if let Some(previous) = self.timer.take() {
            previous.cancel();
        }
        self.timer = Some(handle);
    }

    /// Cancel the live countdown, if any.
    pub fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }

    /// Whether the given countdown is still the live one for this session.
    ///
    /// A timer that fired for an older question (or after its replacement was
    /// armed) must be treated as stale.
    pub fn timer_is_current(&self, question_index: usize) -> bool {
        self.phase == SessionPhase::QuestionActive
            && self.current_index == question_index
            && self
                .timer
                .as_ref()
                .is_some_and(|timer| timer.question_index() == question_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(points: u32) -> Question {
        Question {
            id: Uuid::new_v4(),
            text: "q".into(),
            options: vec!["a".into(), "b".into()],
            correct_answer: 0,
            time_limit_secs: None,
            points,
        }
    }

    fn session(question_count: usize) -> QuizSession {
        let questions = (0..question_count).map(|_| question(100)).collect();
        QuizSession::new(Uuid::new_v4(), Uuid::new_v4(), questions)
    }

    #[test]
    fn phases_follow_the_question_leaderboard_loop() {
        let mut session = session(2);
        assert_eq!(session.phase(), SessionPhase::Starting);

        session.activate_question();
        assert_eq!(session.phase(), SessionPhase::QuestionActive);
        assert_eq!(session.current_index(), 0);
        assert!(!session.on_last_question());

        session.show_leaderboard();
        session.step_to_next_question();
        session.activate_question();
        assert_eq!(session.current_index(), 1);
        assert!(session.on_last_question());

        session.show_leaderboard();
        session.finish();
        assert_eq!(session.phase(), SessionPhase::Ended);
    }

    #[test]
    fn index_stays_within_bounds_while_active() {
        let mut session = session(3);
        session.activate_question();
        for _ in 0..2 {
            assert!(session.current_index() < session.total_questions());
            session.show_leaderboard();
            session.step_to_next_question();
            session.activate_question();
        }
        assert_eq!(session.current_index(), 2);
        assert!(session.on_last_question());
    }

    #[test]
    fn record_answer_rejects_duplicates() {
        let mut session = session(1);
        session.activate_question();
        let participant = Uuid::new_v4();

        assert!(session.record_answer(participant));
        assert!(!session.record_answer(participant));
        assert!(session.has_answered(participant));
    }

    #[test]
    fn answered_set_clears_on_activation() {
        let mut session = session(2);
        session.activate_question();
        let participant = Uuid::new_v4();
        session.record_answer(participant);

        session.show_leaderboard();
        session.step_to_next_question();
        session.activate_question();
        assert!(!session.has_answered(participant));
    }

    #[test]
    fn all_answered_checks_whole_roster() {
        let mut session = session(1);
        session.activate_question();
        let roster = vec![Uuid::new_v4(), Uuid::new_v4()];

        session.record_answer(roster[0]);
        assert!(!session.all_answered(roster.iter()));
        session.record_answer(roster[1]);
        assert!(session.all_answered(roster.iter()));
    }

    #[tokio::test]
    async fn replace_timer_cancels_the_previous_one() {
        let mut session = session(1);
        session.activate_question();

        let first = TimerHandle::new(0, tokio::spawn(std::future::pending::<()>()));
        session.replace_timer(first);
        assert!(session.timer_is_current(0));

        let second = TimerHandle::new(0, tokio::spawn(std::future::pending::<()>()));
        session.replace_timer(second);
        // Only one live timer remains; cancelling clears it.
        session.cancel_timer();
        assert!(!session.timer_is_current(0));
    }

    #[tokio::test]
    async fn stale_timer_is_not_current_after_advance() {
        let mut session = session(2);
        session.activate_question();
        session.replace_timer(TimerHandle::new(0, tokio::spawn(std::future::pending::<()>())));

        session.show_leaderboard();
        assert!(!session.timer_is_current(0));

        session.step_to_next_question();
        session.activate_question();
        session.replace_timer(TimerHandle::new(1, tokio::spawn(std::future::pending::<()>())));
        assert!(!session.timer_is_current(0));
        assert!(session.timer_is_current(1));
    }
}
