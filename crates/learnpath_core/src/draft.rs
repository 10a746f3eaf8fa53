//! Validation of generated course content.
//!
//! The generation collaborator answers with loosely structured JSON. It is
//! parsed here into a [`CourseDraft`] with the exact shape a course needs, or
//! rejected with a [`DraftError`].

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::{
    Chapter, ChapterContent, CourseRecord, Difficulty, Flashcard, QaItem, QuizQuestion, Video,
};

pub const CHAPTER_COUNT: usize = 5;
pub const CONTENT_PER_CHAPTER: usize = 4;
pub const QUIZ_COUNT: usize = 12;
pub const FLASHCARD_COUNT: usize = 12;
pub const QA_COUNT: usize = 12;
pub const QUIZ_OPTION_COUNT: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DraftError {
    #[error("Response contains no JSON object")]
    NoJsonObject,
    #[error("Response is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("Missing required field '{0}'")]
    MissingField(&'static str),
    #[error("Expected {expected} entries in '{field}', found {actual}")]
    WrongCount {
        field: String,
        expected: usize,
        actual: usize,
    },
    #[error("Unknown difficulty '{0}'")]
    InvalidDifficulty(String),
    #[error("Quiz question {index} is malformed: {reason}")]
    InvalidQuizQuestion { index: usize, reason: String },
}

/// A validated, not yet persisted course.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseDraft {
    pub course_title: String,
    pub description: String,
    pub category: String,
    pub difficulty: Difficulty,
    pub chapters: Vec<Chapter>,
    pub quiz: Vec<QuizQuestion>,
    pub flashcards: Vec<Flashcard>,
    pub qa: Vec<QaItem>,
}

impl CourseDraft {
    /// Turns the draft into a fresh course record with no progress.
    pub fn into_course(
        self,
        owner: Option<Uuid>,
        banner_image: String,
        videos: Vec<Video>,
        now: DateTime<Utc>,
    ) -> CourseRecord {
        CourseRecord {
            id: Uuid::new_v4(),
            course_title: self.course_title,
            description: self.description,
            category: self.category,
            difficulty: self.difficulty,
            banner_image,
            created_by: owner,
            chapters: self.chapters,
            quiz: self.quiz,
            flashcards: self.flashcards,
            qa: self.qa,
            completed_chapter: Vec::new(),
            quiz_result: Vec::new(),
            quiz_marks: 0,
            videos,
            created_at: now,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCourse {
    course_title: Option<String>,
    description: Option<String>,
    category: Option<String>,
    difficulty: Option<String>,
    #[serde(default)]
    chapters: Vec<RawChapter>,
    #[serde(default)]
    quiz: Vec<RawQuizQuestion>,
    #[serde(default)]
    flashcards: Vec<RawFlashcard>,
    #[serde(default)]
    qa: Vec<RawQa>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawChapter {
    chapter_name: Option<String>,
    #[serde(default)]
    content: Vec<RawContent>,
}

#[derive(Deserialize)]
struct RawContent {
    topic: Option<String>,
    explain: Option<String>,
    code: Option<String>,
    example: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQuizQuestion {
    question: Option<String>,
    #[serde(default)]
    options: Vec<String>,
    correct_ans: Option<String>,
}

#[derive(Deserialize)]
struct RawFlashcard {
    front: Option<String>,
    back: Option<String>,
}

#[derive(Deserialize)]
struct RawQa {
    question: Option<String>,
    answer: Option<String>,
}

/// Parses the raw text of a generation response.
///
/// Anything before the first `{` and after the last `}` is ignored, which
/// strips code fences and chatter. The course may be wrapped as
/// `{"courses": [..]}`, `{"course": {..}}` or be the top-level object.
pub fn parse_course_draft(raw: &str) -> Result<CourseDraft, DraftError> {
    let start = raw.find('{').ok_or(DraftError::NoJsonObject)?;
    let end = raw.rfind('}').ok_or(DraftError::NoJsonObject)?;
    if end < start {
        return Err(DraftError::NoJsonObject);
    }

    let value: Value =
        serde_json::from_str(&raw[start..=end]).map_err(|e| DraftError::InvalidJson(e.to_string()))?;
    course_from_value(unwrap_course(value))
}

fn unwrap_course(value: Value) -> Value {
    match value {
        Value::Object(mut map) => {
            if let Some(Value::Array(mut courses)) = map.remove("courses") {
                if !courses.is_empty() {
                    return courses.swap_remove(0);
                }
            }
            if let Some(course @ Value::Object(_)) = map.remove("course") {
                return course;
            }
            Value::Object(map)
        }
        other => other,
    }
}

/// Validates a single course object, e.g. one entry of a seed file.
pub fn course_from_value(value: Value) -> Result<CourseDraft, DraftError> {
    let raw: RawCourse =
        serde_json::from_value(value).map_err(|e| DraftError::InvalidJson(e.to_string()))?;
    raw.validate()
}

fn required(value: Option<String>, field: &'static str) -> Result<String, DraftError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(DraftError::MissingField(field))
}

fn optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn expect_count<T>(items: &[T], field: impl Into<String>, expected: usize) -> Result<(), DraftError> {
    if items.len() != expected {
        return Err(DraftError::WrongCount {
            field: field.into(),
            expected,
            actual: items.len(),
        });
    }
    Ok(())
}

impl RawCourse {
    fn validate(self) -> Result<CourseDraft, DraftError> {
        let course_title = required(self.course_title, "courseTitle")?;
        let category = required(self.category, "category")?;
        let description = optional(self.description).unwrap_or_default();
        let difficulty = match optional(self.difficulty) {
            None => Difficulty::Easy,
            Some(label) => match label.parse::<Difficulty>() {
                Ok(difficulty) => difficulty,
                Err(_) => return Err(DraftError::InvalidDifficulty(label)),
            },
        };

        expect_count(&self.chapters, "chapters", CHAPTER_COUNT)?;
        let chapters = self
            .chapters
            .into_iter()
            .enumerate()
            .map(|(i, chapter)| chapter.validate(i))
            .collect::<Result<Vec<_>, _>>()?;

        expect_count(&self.quiz, "quiz", QUIZ_COUNT)?;
        let quiz = self
            .quiz
            .into_iter()
            .enumerate()
            .map(|(i, q)| q.validate(i))
            .collect::<Result<Vec<_>, _>>()?;

        expect_count(&self.flashcards, "flashcards", FLASHCARD_COUNT)?;
        let flashcards = self
            .flashcards
            .into_iter()
            .map(|card| {
                Ok(Flashcard {
                    front: required(card.front, "flashcards.front")?,
                    back: required(card.back, "flashcards.back")?,
                })
            })
            .collect::<Result<Vec<_>, DraftError>>()?;

        expect_count(&self.qa, "qa", QA_COUNT)?;
        let qa = self
            .qa
            .into_iter()
            .map(|item| {
                Ok(QaItem {
                    question: required(item.question, "qa.question")?,
                    answer: required(item.answer, "qa.answer")?,
                })
            })
            .collect::<Result<Vec<_>, DraftError>>()?;

        Ok(CourseDraft {
            course_title,
            description,
            category,
            difficulty,
            chapters,
            quiz,
            flashcards,
            qa,
        })
    }
}

impl RawChapter {
    fn validate(self, index: usize) -> Result<Chapter, DraftError> {
        let chapter_name = required(self.chapter_name, "chapters.chapterName")?;
        expect_count(
            &self.content,
            format!("chapters[{index}].content"),
            CONTENT_PER_CHAPTER,
        )?;
        let content = self
            .content
            .into_iter()
            .map(|c| {
                Ok(ChapterContent {
                    topic: required(c.topic, "chapters.content.topic")?,
                    explain: required(c.explain, "chapters.content.explain")?,
                    code: optional(c.code),
                    example: optional(c.example),
                })
            })
            .collect::<Result<Vec<_>, DraftError>>()?;
        Ok(Chapter {
            chapter_name,
            content,
        })
    }
}

impl RawQuizQuestion {
    fn validate(self, index: usize) -> Result<QuizQuestion, DraftError> {
        let invalid = |reason: &str| DraftError::InvalidQuizQuestion {
            index,
            reason: reason.to_string(),
        };

        let question = required(self.question, "quiz.question")?;
        let correct_ans = required(self.correct_ans, "quiz.correctAns")?;
        let options: Vec<String> = self.options.into_iter().map(|o| o.trim().to_string()).collect();

        if options.len() != QUIZ_OPTION_COUNT {
            return Err(invalid("expected exactly 4 options"));
        }
        if options.iter().any(String::is_empty) {
            return Err(invalid("empty option"));
        }
        for (i, option) in options.iter().enumerate() {
            if options[..i].contains(option) {
                return Err(invalid("duplicate option"));
            }
        }
        if !options.contains(&correct_ans) {
            return Err(invalid("correct answer is not one of the options"));
        }

        Ok(QuizQuestion {
            question,
            options,
            correct_ans,
        })
    }
}

/// Banner image name for a category, e.g. `Tech-&-Coding-3.png`.
pub fn banner_image_for<R: Rng + ?Sized>(category: &str, rng: &mut R) -> String {
    let variant = rng.gen_range(1..=6);
    let stem = category.trim();
    if stem.is_empty() {
        return format!("banner-{variant}.png");
    }
    format!("{}-{}.png", stem.replace(' ', "-"), variant)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use serde_json::{json, Value};

    /// A course object with the exact shape generation must produce.
    pub fn course_json(title: &str, category: &str, difficulty: &str) -> Value {
        let chapters: Vec<Value> = (0..5)
            .map(|c| {
                json!({
                    "chapterName": format!("Chapter {c}"),
                    "content": (0..4).map(|t| json!({
                        "topic": format!("Topic {c}.{t}"),
                        "explain": "An explanation.",
                        "code": null,
                        "example": "An example."
                    })).collect::<Vec<_>>()
                })
            })
            .collect();
        let quiz: Vec<Value> = (0..12)
            .map(|q| {
                json!({
                    "question": format!("Question {q}?"),
                    "options": ["A", "B", "C", "D"],
                    "correctAns": "B"
                })
            })
            .collect();
        let flashcards: Vec<Value> = (0..12)
            .map(|f| json!({"front": format!("Term {f}"), "back": "Meaning"}))
            .collect();
        let qa: Vec<Value> = (0..12)
            .map(|q| json!({"question": format!("Why {q}?"), "answer": "Because."}))
            .collect();

        json!({
            "courseTitle": title,
            "description": "A course.",
            "category": category,
            "difficulty": difficulty,
            "chapters": chapters,
            "quiz": quiz,
            "flashcards": flashcards,
            "qa": qa
        })
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::course_json;
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Mcg128Xsl64;
    use serde_json::json;

    #[test]
    fn accepts_wrapped_course_inside_a_code_fence() {
        let body = json!({"courses": [course_json("Rust Basics", "Tech & Coding", "Intermediate")]});
        let raw = format!("```json\n{body}\n```");
        let draft = parse_course_draft(&raw).unwrap();

        assert_eq!(draft.course_title, "Rust Basics");
        assert_eq!(draft.difficulty, Difficulty::Intermediate);
        assert_eq!(draft.chapters.len(), CHAPTER_COUNT);
        assert!(draft.chapters.iter().all(|c| c.content.len() == CONTENT_PER_CHAPTER));
        assert_eq!(draft.chapters[0].content[0].code, None);
        assert_eq!(draft.quiz.len(), QUIZ_COUNT);
    }

    #[test]
    fn accepts_course_key_and_bare_object() {
        let course = course_json("Algebra", "Mathematics", "Easy");
        assert!(parse_course_draft(&json!({ "course": course.clone() }).to_string()).is_ok());
        assert!(parse_course_draft(&course.to_string()).is_ok());
    }

    #[test]
    fn missing_difficulty_defaults_to_easy() {
        let mut course = course_json("Algebra", "Mathematics", "Easy");
        course.as_object_mut().unwrap().remove("difficulty");
        let draft = course_from_value(course).unwrap();
        assert_eq!(draft.difficulty, Difficulty::Easy);
    }

    #[test]
    fn rejects_missing_title() {
        let mut course = course_json("Algebra", "Mathematics", "Easy");
        course["courseTitle"] = json!("   ");
        assert_eq!(
            course_from_value(course),
            Err(DraftError::MissingField("courseTitle"))
        );
    }

    #[test]
    fn rejects_wrong_chapter_count() {
        let mut course = course_json("Algebra", "Mathematics", "Easy");
        course["chapters"].as_array_mut().unwrap().pop();
        assert_eq!(
            course_from_value(course),
            Err(DraftError::WrongCount {
                field: "chapters".to_string(),
                expected: 5,
                actual: 4
            })
        );
    }

    #[test]
    fn rejects_quiz_answer_outside_options() {
        let mut course = course_json("Algebra", "Mathematics", "Easy");
        course["quiz"][3]["correctAns"] = json!("Z");
        assert!(matches!(
            course_from_value(course),
            Err(DraftError::InvalidQuizQuestion { index: 3, .. })
        ));
    }

    #[test]
    fn rejects_unknown_difficulty_and_garbage() {
        let course = course_json("Algebra", "Mathematics", "Expert");
        assert_eq!(
            course_from_value(course),
            Err(DraftError::InvalidDifficulty("Expert".to_string()))
        );
        assert_eq!(parse_course_draft("no json here"), Err(DraftError::NoJsonObject));
        assert!(matches!(
            parse_course_draft("{ not: json }"),
            Err(DraftError::InvalidJson(_))
        ));
    }

    #[test]
    fn banner_follows_category() {
        let mut rng = Mcg128Xsl64::seed_from_u64(2);
        let banner = banner_image_for("Tech & Coding", &mut rng);
        assert!(banner.starts_with("Tech-&-Coding-"));
        assert!(banner.ends_with(".png"));
    }
}
