use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use super::scoring::{percentage, rounded_ratio, PerformanceTier};
use crate::models::{Category, Difficulty, Question, SaveResultRequest};

/// Where the current question stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionPhase {
    /// Not shown yet.
    Pending,
    /// Shown, countdown running.
    AwaitingAnswer,
    /// Correctness locked in.
    Revealed,
}

/// How an option is marked once its question is revealed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionOutcome {
    Correct,
    /// The option the user picked, when it was wrong.
    Incorrect,
    Neutral,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PresentedQuestion {
    pub index: usize,
    pub total: usize,
    pub prompt: String,
    pub options: Vec<String>,
    pub time_limit_seconds: u32,
}

impl PresentedQuestion {
    /// Progress bar fill, counting this question as reached.
    pub fn progress_percent(&self) -> u32 {
        rounded_ratio((self.index as u64 + 1) * 100, self.total as u64)
    }
}

/// The outcome of one question, fixed at reveal time.
#[derive(Debug, Clone, PartialEq)]
pub struct Reveal {
    pub index: usize,
    /// `None` when the countdown ran out.
    pub selected: Option<String>,
    pub correct_answer: String,
    pub is_correct: bool,
    pub options: Vec<(String, OptionOutcome)>,
}

impl Reveal {
    pub fn timed_out(&self) -> bool {
        self.selected.is_none()
    }

    pub fn message(&self) -> String {
        if self.timed_out() {
            format!(
                "⏰ Time's up! The correct answer was: {}",
                self.correct_answer
            )
        } else if self.is_correct {
            "🎉 Correct! You got it right!".to_string()
        } else {
            format!(
                "❌ Incorrect! The correct answer was: {}",
                self.correct_answer
            )
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Running { remaining_seconds: u32 },
    Expired(Reveal),
    /// Stale or late tick; nothing changed.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Next,
    Finished,
}

/// Final figures of a completed session.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizSummary {
    pub score: u32,
    pub total_questions: u32,
    pub percentage: u32,
    pub tier: PerformanceTier,
    pub difficulty: Difficulty,
    pub category: Category,
}

impl QuizSummary {
    pub fn score_line(&self) -> String {
        format!("{}/{}", self.score, self.total_questions)
    }

    pub fn to_save_request(&self) -> SaveResultRequest {
        SaveResultRequest {
            category: self.category.name.clone(),
            difficulty: self.difficulty,
            score: self.score,
            total_questions: self.total_questions,
            percentage: self.percentage,
        }
    }
}

/// State of one quiz attempt.
///
/// `current_index` stays within `0..=questions.len()`; reaching the length is
/// terminal. A question moves `Pending -> AwaitingAnswer -> Revealed`, and only
/// the first resolution (answer or expiry) of a question is counted.
#[derive(Debug, Clone)]
pub struct QuizSession {
    questions: Vec<Question>,
    difficulty: Difficulty,
    category: Category,
    current_index: usize,
    score: u32,
    remaining_seconds: u32,
    phase: QuestionPhase,
    options: Vec<String>,
}

impl QuizSession {
    pub fn new(questions: Vec<Question>, difficulty: Difficulty, category: Category) -> Self {
        QuizSession {
            questions,
            difficulty,
            category,
            current_index: 0,
            score: 0,
            remaining_seconds: difficulty.time_limit_seconds(),
            phase: QuestionPhase::Pending,
            options: Vec::new(),
        }
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn category(&self) -> &Category {
        &self.category
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    pub fn phase(&self) -> QuestionPhase {
        self.phase
    }

    pub fn is_finished(&self) -> bool {
        self.current_index >= self.questions.len()
    }

    /// Questions whose outcome is settled, the current one included once revealed.
    pub fn resolved(&self) -> usize {
        match self.phase {
            QuestionPhase::Revealed if !self.is_finished() => self.current_index + 1,
            _ => self.current_index,
        }
    }

    /// Options in the order they were last shown.
    pub fn presented_options(&self) -> &[String] {
        &self.options
    }

    /// Show the current question with a fresh shuffle and a full countdown.
    ///
    /// Returns `None` once the session is finished or while the current
    /// question is already revealed.
    pub fn present<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<PresentedQuestion> {
        if self.is_finished() || self.phase == QuestionPhase::Revealed {
            return None;
        }

        let question = &self.questions[self.current_index];
        let mut options = question.options();
        options.shuffle(rng);

        self.options = options.clone();
        self.remaining_seconds = self.difficulty.time_limit_seconds();
        self.phase = QuestionPhase::AwaitingAnswer;

        Some(PresentedQuestion {
            index: self.current_index,
            total: self.questions.len(),
            prompt: question.prompt.clone(),
            options,
            time_limit_seconds: self.remaining_seconds,
        })
    }

    /// Resolve the current question. `None` means the countdown expired.
    ///
    /// Only the first call per question counts; later calls return `None`.
    pub fn submit_answer(&mut self, selected: Option<&str>) -> Option<Reveal> {
        if self.phase != QuestionPhase::AwaitingAnswer {
            return None;
        }
        self.phase = QuestionPhase::Revealed;

        let question = &self.questions[self.current_index];
        let correct = question.correct_answer.as_str();
        let is_correct = selected == Some(correct);
        if is_correct {
            self.score += 1;
        }

        let options = self
            .options
            .iter()
            .map(|option| {
                let outcome = if option == correct {
                    OptionOutcome::Correct
                } else if Some(option.as_str()) == selected {
                    OptionOutcome::Incorrect
                } else {
                    OptionOutcome::Neutral
                };
                (option.clone(), outcome)
            })
            .collect();

        Some(Reveal {
            index: self.current_index,
            selected: selected.map(str::to_string),
            correct_answer: correct.to_string(),
            is_correct,
            options,
        })
    }

    /// One second of countdown; reaching zero reveals the question as expired.
    pub fn tick(&mut self) -> TickOutcome {
        if self.phase != QuestionPhase::AwaitingAnswer {
            return TickOutcome::Ignored;
        }

        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds > 0 {
            return TickOutcome::Running {
                remaining_seconds: self.remaining_seconds,
            };
        }

        match self.submit_answer(None) {
            Some(reveal) => TickOutcome::Expired(reveal),
            None => TickOutcome::Ignored,
        }
    }

    /// Move past a revealed question.
    pub fn advance(&mut self) -> Option<Advance> {
        if self.phase != QuestionPhase::Revealed || self.is_finished() {
            return None;
        }

        self.current_index += 1;
        self.options.clear();
        if self.is_finished() {
            Some(Advance::Finished)
        } else {
            self.phase = QuestionPhase::Pending;
            Some(Advance::Next)
        }
    }

    /// Final figures, available once every question has been resolved.
    pub fn summary(&self) -> Option<QuizSummary> {
        if !self.is_finished() {
            return None;
        }

        let total = self.questions.len() as u32;
        let percentage = percentage(self.score, total);
        Some(QuizSummary {
            score: self.score,
            total_questions: total,
            percentage,
            tier: PerformanceTier::from_percentage(percentage),
            difficulty: self.difficulty,
            category: self.category.clone(),
        })
    }
}
