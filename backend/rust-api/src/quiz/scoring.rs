use serde::Serialize;
use std::fmt;

/// `round(numerator / denominator * 100)` with halves rounded up.
///
/// A zero denominator yields 0 rather than dividing by zero.
pub fn percentage(score: u32, total: u32) -> u32 {
    rounded_ratio(u64::from(score) * 100, u64::from(total))
}

/// `numerator / denominator` rounded half-up, in integer arithmetic.
pub(crate) fn rounded_ratio(numerator: u64, denominator: u64) -> u32 {
    if denominator == 0 {
        return 0;
    }
    let rounded = (2 * numerator + denominator) / (2 * denominator);
    u32::try_from(rounded).unwrap_or(u32::MAX)
}

/// Completion message band for a final percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceTier {
    QuizMaster,
    Great,
    GoodEffort,
    KeepTrying,
}

impl PerformanceTier {
    pub fn from_percentage(percentage: u32) -> Self {
        match percentage {
            80.. => PerformanceTier::QuizMaster,
            60..=79 => PerformanceTier::Great,
            40..=59 => PerformanceTier::GoodEffort,
            _ => PerformanceTier::KeepTrying,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            PerformanceTier::QuizMaster => "🏆 Excellent! You're a quiz master!",
            PerformanceTier::Great => "👍 Great job! Well done!",
            PerformanceTier::GoodEffort => "😊 Good effort! Keep practicing!",
            PerformanceTier::KeepTrying => "🤔 Don't give up! Try again!",
        }
    }
}

impl fmt::Display for PerformanceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}
