use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use super::countdown::{Countdown, CountdownTick};
use super::session::{Advance, PresentedQuestion, QuizSession, QuizSummary, Reveal, TickOutcome};
use super::trivia::{QuestionQuery, TriviaError, TriviaSource};
use crate::client::ClientError;
use crate::models::{Category, Difficulty, QuizResult, SaveResultRequest};

pub const DEFAULT_QUESTION_COUNT: usize = 10;

#[derive(Debug, Error)]
pub enum QuizError {
    #[error("{0}")]
    Validation(String),

    #[error("Failed to load questions. Please try again.")]
    Upstream(#[from] TriviaError),

    #[error("No previous quiz to restart")]
    NothingToRestart,
}

/// Where finished quizzes are persisted.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Whether a signed-in user exists to persist results for.
    fn has_session(&self) -> bool;

    async fn save(&self, request: SaveResultRequest) -> Result<QuizResult, ClientError>;
}

/// Screen-level state of the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerPhase {
    Idle,
    Loading,
    AwaitingAnswer,
    Revealed,
    Finished,
    Error(String),
}

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub question_count: usize,
    pub tick_period: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            question_count: DEFAULT_QUESTION_COUNT,
            tick_period: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NextStep {
    Question(PresentedQuestion),
    Finished(QuizSummary),
}

/// Drives one quiz attempt at a time: fetching, presenting, the countdown race
/// and persistence of the final result.
///
/// Countdown ticks arrive on the receiver returned by [`QuizController::new`]
/// and must be fed back through [`QuizController::handle_tick`] by the task
/// that owns the controller.
pub struct QuizController {
    trivia: Arc<dyn TriviaSource>,
    results: Option<Arc<dyn ResultSink>>,
    settings: ControllerSettings,
    phase: ControllerPhase,
    session: Option<QuizSession>,
    last_params: Option<(Difficulty, Category)>,
    generation: u64,
    countdown: Option<Countdown>,
    ticks: UnboundedSender<CountdownTick>,
    pending_save: Option<JoinHandle<()>>,
    rng: StdRng,
}

impl QuizController {
    pub fn new(
        trivia: Arc<dyn TriviaSource>,
        settings: ControllerSettings,
    ) -> (Self, UnboundedReceiver<CountdownTick>) {
        let (ticks, rx) = mpsc::unbounded_channel();
        let controller = Self {
            trivia,
            results: None,
            settings,
            phase: ControllerPhase::Idle,
            session: None,
            last_params: None,
            generation: 0,
            countdown: None,
            ticks,
            pending_save: None,
            rng: StdRng::from_os_rng(),
        };
        (controller, rx)
    }

    /// Persist finished quizzes through `sink` whenever it has a session.
    pub fn attach_results(&mut self, sink: Arc<dyn ResultSink>) {
        self.results = Some(sink);
    }

    pub fn phase(&self) -> &ControllerPhase {
        &self.phase
    }

    pub fn session(&self) -> Option<&QuizSession> {
        self.session.as_ref()
    }

    /// Validate the raw form values and start a session.
    pub async fn start_session(
        &mut self,
        difficulty: &str,
        category: &str,
    ) -> Result<PresentedQuestion, QuizError> {
        let (difficulty, category) = parse_selection(difficulty, category)?;
        self.start(difficulty, category).await
    }

    pub async fn start(
        &mut self,
        difficulty: Difficulty,
        category: Category,
    ) -> Result<PresentedQuestion, QuizError> {
        self.discard();
        self.phase = ControllerPhase::Loading;
        self.last_params = Some((difficulty, category.clone()));

        let query = QuestionQuery {
            amount: self.settings.question_count,
            category: category.clone(),
            difficulty,
        };
        tracing::info!(
            difficulty = %difficulty,
            category = category.id,
            "Starting quiz session"
        );

        let questions = match self.trivia.fetch(&query).await {
            Ok(questions) => questions,
            Err(e) => {
                tracing::warn!("Failed to load questions: {}", e);
                let err = QuizError::from(e);
                self.phase = ControllerPhase::Error(err.to_string());
                return Err(err);
            }
        };

        self.session = Some(QuizSession::new(questions, difficulty, category));
        match self.present() {
            Some(presented) => Ok(presented),
            None => {
                let err = QuizError::Upstream(TriviaError::ShortBatch {
                    expected: self.settings.question_count,
                    got: 0,
                });
                self.session = None;
                self.phase = ControllerPhase::Error(err.to_string());
                Err(err)
            }
        }
    }

    fn present(&mut self) -> Option<PresentedQuestion> {
        let session = self.session.as_mut()?;
        let presented = session.present(&mut self.rng)?;

        // The old countdown must be gone before the new one ticks.
        self.countdown = None;
        self.countdown = Some(Countdown::start(
            CountdownTick {
                generation: self.generation,
                question_index: presented.index,
            },
            self.settings.tick_period,
            self.ticks.clone(),
        ));
        self.phase = ControllerPhase::AwaitingAnswer;
        Some(presented)
    }

    /// The user picked `selected`. `None` when the question is already revealed.
    pub fn submit_answer(&mut self, selected: &str) -> Option<Reveal> {
        let reveal = self.session.as_mut()?.submit_answer(Some(selected))?;
        self.countdown = None;
        self.phase = ControllerPhase::Revealed;
        Some(reveal)
    }

    /// Apply one countdown tick; stale ticks are ignored.
    pub fn handle_tick(&mut self, tick: CountdownTick) -> TickOutcome {
        let Some(session) = self.session.as_mut() else {
            return TickOutcome::Ignored;
        };
        if tick.generation != self.generation || tick.question_index != session.current_index()
        {
            return TickOutcome::Ignored;
        }

        let outcome = session.tick();
        if let TickOutcome::Expired(_) = outcome {
            self.countdown = None;
            self.phase = ControllerPhase::Revealed;
        }
        outcome
    }

    /// Advance past the revealed question.
    pub fn next_question(&mut self) -> Option<NextStep> {
        match self.session.as_mut()?.advance()? {
            Advance::Next => self.present().map(NextStep::Question),
            Advance::Finished => self.finish_session().map(NextStep::Finished),
        }
    }

    /// Summarise the finished session, discard it and persist the result in
    /// the background when a user session exists.
    pub fn finish_session(&mut self) -> Option<QuizSummary> {
        let summary = self.session.as_ref()?.summary()?;
        self.discard();
        self.phase = ControllerPhase::Finished;

        tracing::info!(
            score = summary.score,
            total = summary.total_questions,
            percentage = summary.percentage,
            "Quiz finished"
        );

        if let Some(sink) = self.results.as_ref().filter(|s| s.has_session()) {
            let sink = Arc::clone(sink);
            let request = summary.to_save_request();
            self.pending_save = Some(tokio::spawn(async move {
                match sink.save(request).await {
                    Ok(result) => tracing::debug!(result_id = %result.id, "Quiz result saved"),
                    Err(e) => tracing::warn!("Failed to save quiz result: {}", e),
                }
            }));
        }

        Some(summary)
    }

    /// The background save started by the last finished session, if any.
    pub fn take_pending_save(&mut self) -> Option<JoinHandle<()>> {
        self.pending_save.take()
    }

    /// Start over with the same difficulty and category.
    pub async fn restart(&mut self) -> Result<PresentedQuestion, QuizError> {
        let (difficulty, category) = self
            .last_params
            .clone()
            .ok_or(QuizError::NothingToRestart)?;
        self.start(difficulty, category).await
    }

    /// Leave the quiz and return to the start screen.
    pub fn abort(&mut self) {
        self.discard();
        self.phase = ControllerPhase::Idle;
    }

    fn discard(&mut self) {
        self.countdown = None;
        self.session = None;
        self.generation += 1;
    }
}

/// Check the difficulty and category picked on the start screen.
pub fn parse_selection(difficulty: &str, category: &str) -> Result<(Difficulty, Category), QuizError> {
    if difficulty.trim().is_empty() || category.trim().is_empty() {
        return Err(QuizError::Validation(
            "Please select both difficulty and category".to_string(),
        ));
    }

    let difficulty = difficulty
        .parse::<Difficulty>()
        .map_err(|e| QuizError::Validation(e.to_string()))?;
    let category = category
        .trim()
        .parse::<u32>()
        .map(Category::from_id)
        .map_err(|_| QuizError::Validation(format!("Unknown category '{}'", category.trim())))?;

    Ok((difficulty, category))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Question;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct StubTrivia {
        count: usize,
        calls: AtomicUsize,
        fail: bool,
    }

    impl StubTrivia {
        fn ok(count: usize) -> Arc<Self> {
            Arc::new(Self {
                count,
                calls: AtomicUsize::new(0),
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                count: 0,
                calls: AtomicUsize::new(0),
                fail: true,
            })
        }
    }

    #[async_trait]
    impl TriviaSource for StubTrivia {
        async fn fetch(&self, query: &QuestionQuery) -> Result<Vec<Question>, TriviaError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(TriviaError::NoResults(1));
            }
            assert_eq!(query.amount, self.count);
            Ok((0..self.count)
                .map(|i| {
                    Question::new(
                        format!("Q{}", i),
                        format!("right {}", i),
                        vec!["x".into(), "y".into(), "z".into()],
                    )
                })
                .collect())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        signed_in: bool,
        saved: Mutex<Vec<SaveResultRequest>>,
    }

    #[async_trait]
    impl ResultSink for RecordingSink {
        fn has_session(&self) -> bool {
            self.signed_in
        }

        async fn save(&self, request: SaveResultRequest) -> Result<QuizResult, ClientError> {
            self.saved.lock().unwrap().push(request.clone());
            Ok(QuizResult::from_request(request, chrono::Utc::now()))
        }
    }

    struct FailingSink {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl ResultSink for FailingSink {
        fn has_session(&self) -> bool {
            true
        }

        async fn save(&self, _request: SaveResultRequest) -> Result<QuizResult, ClientError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(ClientError::Rejected {
                status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                message: "Server error. Please try again.".to_string(),
            })
        }
    }

    fn settings(count: usize) -> ControllerSettings {
        ControllerSettings {
            question_count: count,
            tick_period: Duration::from_secs(1),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn validation_happens_before_fetch() {
        let trivia = StubTrivia::ok(10);
        let (mut controller, _rx) = QuizController::new(trivia.clone(), settings(10));

        let err = controller.start_session("", "9").await.unwrap_err();
        assert!(matches!(err, QuizError::Validation(_)));
        let err = controller.start_session("easy", " ").await.unwrap_err();
        assert!(matches!(err, QuizError::Validation(_)));
        assert_eq!(trivia.calls.load(Ordering::SeqCst), 0);
        assert_eq!(controller.phase(), &ControllerPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn upstream_failure_moves_to_error() {
        let (mut controller, _rx) = QuizController::new(StubTrivia::failing(), settings(10));

        let err = controller.start_session("easy", "9").await.unwrap_err();
        assert!(matches!(err, QuizError::Upstream(_)));
        assert_eq!(
            controller.phase(),
            &ControllerPhase::Error("Failed to load questions. Please try again.".to_string())
        );
        assert!(controller.session().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn all_correct_session_scores_full_marks() {
        let sink = Arc::new(RecordingSink {
            signed_in: true,
            ..Default::default()
        });
        let (mut controller, _rx) = QuizController::new(StubTrivia::ok(10), settings(10));
        controller.attach_results(sink.clone());

        let mut presented = controller.start_session("easy", "9").await.unwrap();
        let summary = loop {
            let reveal = controller
                .submit_answer(&format!("right {}", presented.index))
                .unwrap();
            assert!(reveal.is_correct);
            assert_eq!(controller.phase(), &ControllerPhase::Revealed);

            match controller.next_question().unwrap() {
                NextStep::Question(next) => presented = next,
                NextStep::Finished(summary) => break summary,
            }
        };

        assert_eq!(summary.score_line(), "10/10");
        assert_eq!(summary.percentage, 100);
        assert_eq!(
            summary.tier,
            crate::quiz::scoring::PerformanceTier::QuizMaster
        );
        assert_eq!(controller.phase(), &ControllerPhase::Finished);
        assert!(controller.session().is_none());

        controller.take_pending_save().unwrap().await.unwrap();
        let saved = sink.saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].category, "General Knowledge");
        assert_eq!(saved[0].percentage, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn guest_results_are_not_saved() {
        let sink = Arc::new(RecordingSink::default());
        let (mut controller, _rx) = QuizController::new(StubTrivia::ok(1), settings(1));
        controller.attach_results(sink.clone());

        controller.start_session("hard", "18").await.unwrap();
        controller.submit_answer("x").unwrap();
        let NextStep::Finished(summary) = controller.next_question().unwrap() else {
            panic!("single question session should finish");
        };
        assert_eq!(summary.percentage, 0);
        assert!(controller.take_pending_save().is_none());
        assert!(sink.saved.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_save_still_yields_summary() {
        let sink = Arc::new(FailingSink {
            attempts: AtomicUsize::new(0),
        });
        let (mut controller, _rx) = QuizController::new(StubTrivia::ok(2), settings(2));
        controller.attach_results(sink.clone());

        controller.start_session("medium", "9").await.unwrap();
        controller.submit_answer("right 0").unwrap();
        controller.next_question().unwrap();
        controller.submit_answer("x").unwrap();

        let Some(NextStep::Finished(summary)) = controller.next_question() else {
            panic!("last question should finish the session");
        };
        assert_eq!(summary.score_line(), "1/2");
        assert_eq!(summary.percentage, 50);
        assert_eq!(controller.phase(), &ControllerPhase::Finished);

        // The save task swallows the error instead of panicking.
        controller.take_pending_save().unwrap().await.unwrap();
        assert_eq!(sink.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(controller.phase(), &ControllerPhase::Finished);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_expiry_reveals_without_scoring() {
        let (mut controller, mut rx) = QuizController::new(StubTrivia::ok(2), settings(2));
        let presented = controller.start_session("hard", "9").await.unwrap();
        assert_eq!(presented.time_limit_seconds, 10);

        let reveal = loop {
            let tick = rx.recv().await.unwrap();
            match controller.handle_tick(tick) {
                TickOutcome::Running { .. } => continue,
                TickOutcome::Expired(reveal) => break reveal,
                TickOutcome::Ignored => panic!("live tick ignored"),
            }
        };
        assert!(reveal.timed_out());
        assert_eq!(reveal.correct_answer, "right 0");
        assert_eq!(controller.phase(), &ControllerPhase::Revealed);
        assert_eq!(controller.session().unwrap().score(), 0);

        // The click lost the race.
        assert!(controller.submit_answer("right 0").is_none());
        assert_eq!(controller.session().unwrap().score(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_ticks_are_ignored() {
        let (mut controller, _rx) = QuizController::new(StubTrivia::ok(2), settings(2));
        controller.start_session("easy", "9").await.unwrap();
        let generation = controller.generation;

        controller.submit_answer("right 0").unwrap();
        controller.next_question().unwrap();

        // Queued tick for the previous question.
        let stale = CountdownTick {
            generation,
            question_index: 0,
        };
        assert_eq!(controller.handle_tick(stale), TickOutcome::Ignored);

        controller.abort();
        let old_session = CountdownTick {
            generation,
            question_index: 1,
        };
        assert_eq!(controller.handle_tick(old_session), TickOutcome::Ignored);
        assert_eq!(controller.phase(), &ControllerPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_reuses_selection() {
        let trivia = StubTrivia::ok(3);
        let (mut controller, _rx) = QuizController::new(trivia.clone(), settings(3));

        assert!(matches!(
            controller.restart().await,
            Err(QuizError::NothingToRestart)
        ));

        controller.start_session("medium", "23").await.unwrap();
        controller.submit_answer("right 0").unwrap();

        let presented = controller.restart().await.unwrap();
        assert_eq!(presented.index, 0);
        assert_eq!(presented.time_limit_seconds, 15);
        let session = controller.session().unwrap();
        assert_eq!(session.score(), 0);
        assert_eq!(session.category().name, "History");
        assert_eq!(trivia.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn parse_selection_rejects_unknown_values() {
        assert!(parse_selection("extreme", "9").is_err());
        assert!(parse_selection("easy", "science").is_err());
        let (difficulty, category) = parse_selection("Medium", "17").unwrap();
        assert_eq!(difficulty, Difficulty::Medium);
        assert_eq!(category.name, "Science & Nature");
    }
}
