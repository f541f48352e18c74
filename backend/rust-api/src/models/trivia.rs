use serde::{Deserialize, Serialize};

/// Raw batch returned by the Open Trivia DB `api.php` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriviaResponse {
    pub response_code: i32,
    #[serde(default)]
    pub results: Vec<TriviaQuestion>,
}

/// Raw question as sent upstream; text fields are HTML-entity encoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriviaQuestion {
    #[serde(default)]
    pub category: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub difficulty: String,
    pub question: String,
    pub correct_answer: String,
    pub incorrect_answers: Vec<String>,
}

/// A multiple-choice question with its text already decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub prompt: String,
    pub correct_answer: String,
    pub incorrect_answers: Vec<String>,
}

impl Question {
    pub fn new(
        prompt: impl Into<String>,
        correct_answer: impl Into<String>,
        incorrect_answers: Vec<String>,
    ) -> Self {
        Question {
            prompt: prompt.into(),
            correct_answer: correct_answer.into(),
            incorrect_answers,
        }
    }

    /// All answer options, incorrect ones first, in upstream order.
    pub fn options(&self) -> Vec<String> {
        let mut options = self.incorrect_answers.clone();
        options.push(self.correct_answer.clone());
        options
    }
}

impl From<TriviaQuestion> for Question {
    fn from(raw: TriviaQuestion) -> Self {
        Question {
            prompt: decode_entities(&raw.question),
            correct_answer: decode_entities(&raw.correct_answer),
            incorrect_answers: raw
                .incorrect_answers
                .iter()
                .map(|a| decode_entities(a))
                .collect(),
        }
    }
}

fn decode_entities(text: &str) -> String {
    html_escape::decode_html_entities(text).into_owned()
}

/// Trivia category: the numeric id filters upstream, the name is what gets
/// stored in a user's history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: u32,
    pub name: String,
}

impl Category {
    /// Known category by id, or a generic name for ids outside the table.
    pub fn from_id(id: u32) -> Self {
        let name = CATEGORIES
            .iter()
            .find(|(known, _)| *known == id)
            .map(|(_, name)| name.to_string())
            .unwrap_or_else(|| format!("Category {}", id));
        Category { id, name }
    }
}

pub const CATEGORIES: &[(u32, &str)] = &[
    (9, "General Knowledge"),
    (10, "Entertainment: Books"),
    (11, "Entertainment: Film"),
    (12, "Entertainment: Music"),
    (13, "Entertainment: Musicals & Theatres"),
    (14, "Entertainment: Television"),
    (15, "Entertainment: Video Games"),
    (16, "Entertainment: Board Games"),
    (17, "Science & Nature"),
    (18, "Science: Computers"),
    (19, "Science: Mathematics"),
    (20, "Mythology"),
    (21, "Sports"),
    (22, "Geography"),
    (23, "History"),
    (24, "Politics"),
    (25, "Art"),
    (26, "Celebrities"),
    (27, "Animals"),
    (28, "Vehicles"),
    (29, "Entertainment: Comics"),
    (30, "Science: Gadgets"),
    (31, "Entertainment: Japanese Anime & Manga"),
    (32, "Entertainment: Cartoon & Animations"),
];
