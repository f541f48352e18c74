//! Client-side quiz session: question flow, per-question countdown and scoring.

pub mod controller;
pub mod countdown;
pub mod scoring;
pub mod session;
pub mod trivia;

pub use controller::{
    ControllerPhase, ControllerSettings, NextStep, QuizController, QuizError, ResultSink,
};
pub use countdown::{Countdown, CountdownTick};
pub use scoring::{percentage, PerformanceTier};
pub use session::{
    OptionOutcome, PresentedQuestion, QuestionPhase, QuizSession, QuizSummary, Reveal,
    TickOutcome,
};
pub use trivia::{OpenTdbClient, QuestionQuery, TriviaError, TriviaSource};
