use serde::{Deserialize, Serialize};

/// Number of answer options every question must carry.
pub const OPTIONS_PER_QUESTION: usize = 4;

/// One multiple-choice question. Immutable once a session has started.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Question {
    pub id: u32,
    pub text: String,
    pub options: Vec<String>,
    pub correct_index: usize,
}

impl Question {
    pub fn new(id: u32, text: &str, options: [&str; OPTIONS_PER_QUESTION], correct_index: usize) -> Self {
        Self {
            id,
            text: text.to_string(),
            options: options.iter().map(|o| o.to_string()).collect(),
            correct_index,
        }
    }

    /// Shape check applied to every question that crosses the generation
    /// boundary: non-empty text, exactly four non-empty options, and a
    /// correct index that points at one of them.
    pub fn is_valid(&self) -> bool {
        !self.text.trim().is_empty()
            && self.options.len() == OPTIONS_PER_QUESTION
            && self.options.iter().all(|o| !o.trim().is_empty())
            && self.correct_index < OPTIONS_PER_QUESTION
    }
}

/// Validates a whole generated batch. An empty batch is invalid: a session
/// can never start without at least one question.
pub fn validate_question_set(questions: &[Question]) -> bool {
    !questions.is_empty() && questions.iter().all(Question::is_valid)
}

/// Deterministic built-in question set. Serves as the Standard-mode default
/// and as the substitute when external generation fails or times out.
pub fn sample_questions() -> Vec<Question> {
    vec![
        Question::new(
            1,
            "What is the capital of France?",
            ["London", "Berlin", "Paris", "Madrid"],
            2,
        ),
        Question::new(
            2,
            "Which planet is known as the Red Planet?",
            ["Venus", "Mars", "Jupiter", "Saturn"],
            1,
        ),
        Question::new(
            3,
            "What is the largest ocean on Earth?",
            ["Atlantic", "Indian", "Arctic", "Pacific"],
            3,
        ),
        Question::new(
            4,
            "Who painted the Mona Lisa?",
            ["Van Gogh", "Picasso", "Da Vinci", "Monet"],
            2,
        ),
        Question::new(
            5,
            "What is the smallest prime number?",
            ["0", "1", "2", "3"],
            2,
        ),
        Question::new(
            6,
            "Which element has the chemical symbol 'O'?",
            ["Gold", "Oxygen", "Silver", "Iron"],
            1,
        ),
        Question::new(7, "How many continents are there?", ["5", "6", "7", "8"], 2),
        Question::new(
            8,
            "What is the fastest land animal?",
            ["Lion", "Cheetah", "Leopard", "Tiger"],
            1,
        ),
        Question::new(
            9,
            "Which country is home to the kangaroo?",
            ["New Zealand", "Australia", "South Africa", "Brazil"],
            1,
        ),
        Question::new(
            10,
            "What is the largest mammal in the world?",
            ["Elephant", "Blue Whale", "Giraffe", "Polar Bear"],
            1,
        ),
    ]
}
