//! services/api/src/adapters/course_llm.rs
//!
//! This module contains the adapter for the course-writing LLM.
//! It implements the `CourseGenerationService` port from the `core` crate.
//! The returned text is handed to the core unvalidated.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, ResponseFormat,
    },
    Client,
};
use async_trait::async_trait;
use learnpath_core::draft::{
    CHAPTER_COUNT, CONTENT_PER_CHAPTER, FLASHCARD_COUNT, QA_COUNT, QUIZ_COUNT, QUIZ_OPTION_COUNT,
};
use learnpath_core::ports::{CourseGenerationService, PortError, PortResult};
use tracing::debug;

/// Categories a generated course may be filed under.
pub const CATEGORIES: [&str; 8] = [
    "Tech & Coding",
    "Business & Finance",
    "Health & Fitness",
    "Science & Engineering",
    "Arts & Creativity",
    "History and Mythology",
    "Mathematics",
    "Physics, Chemistry and Biology",
];

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `CourseGenerationService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiCourseAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiCourseAdapter {
    /// Creates a new `OpenAiCourseAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

/// The instructions sent as the system message.
pub fn system_prompt() -> String {
    let categories = CATEGORIES
        .iter()
        .map(|c| format!("\"{c}\""))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "You are an instructional designer and subject matter expert. You write complete, \
         in-depth and practical courses for learners with a foundational understanding of the field.\n\
         Answer with a single JSON object of the form {{\"course\": {{...}}}} and nothing else. The course object has:\n\
         - \"courseTitle\" reflecting the topic, \"description\" summarizing what the learner will achieve,\n\
         - \"category\", one of [{categories}],\n\
         - \"difficulty\", one of \"Easy\", \"Intermediate\", \"Advanced\",\n\
         - \"chapters\": exactly {CHAPTER_COUNT} chapters in teaching order, each with \"chapterName\" and exactly \
         {CONTENT_PER_CHAPTER} \"content\" objects with \"topic\" (3-5 words), \"explain\" (100-150 words covering the why and how), \
         \"code\" (a short commented example for technical topics, otherwise null) and \"example\" (a concrete real-world case, or null),\n\
         - \"quiz\": exactly {QUIZ_COUNT} objects with \"question\", \"options\" ({QUIZ_OPTION_COUNT} distinct strings) and \
         \"correctAns\" (one of the options), testing understanding rather than recall,\n\
         - \"flashcards\": exactly {FLASHCARD_COUNT} objects with \"front\" (a key term) and \"back\" (its definition),\n\
         - \"qa\": exactly {QA_COUNT} objects with \"question\" and \"answer\" covering questions a student would ask.\n\
         Escape every double quote that appears inside a string value."
    )
}

//=========================================================================================
// `CourseGenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl CourseGenerationService for OpenAiCourseAdapter {
    async fn generate_course(&self, topic: &str) -> PortResult<String> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system_prompt())
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(format!("Write the course for the topic \"{}\".", topic))
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .response_format(ResponseFormat::JsonObject)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Unexpected("Course generation LLM returned no text content.".to_string())
            })?;

        debug!("Course generation for '{}' returned {} bytes", topic, content.len());
        Ok(content)
    }
}
