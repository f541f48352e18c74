pub mod quiz;
pub mod trivia;
pub mod user;

pub use quiz::{
    Difficulty, HistoryResponse, HistoryStats, QuizResult, SaveResultRequest, SaveResultResponse,
};
pub use trivia::{Category, Question};
pub use user::{AuthProvider, AuthResponse, User, UserProfile};
