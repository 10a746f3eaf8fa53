//! Builds well-formed four-option quiz bank items out of raw, possibly
//! incomplete quiz data, filling missing options with distractors drawn from
//! the rest of the corpus.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::QuizBankItem;

pub const OPTION_COUNT: usize = 4;
pub const DEFAULT_CATEGORY: &str = "General";
pub const FALLBACK_DISTRACTORS: [&str; 4] =
    ["None of the above", "All of the above", "Not sure", "Both A and B"];

pub const MISSING_FIELDS: &str = "missing question or correctAns";

/// A quiz item as found in seed data. Every field is optional and may hold
/// any JSON scalar.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawQuizItem {
    #[serde(default)]
    pub question: Option<Value>,
    #[serde(default)]
    pub correct_ans: Option<Value>,
    #[serde(default)]
    pub options: Option<Vec<Value>>,
    #[serde(default)]
    pub category: Option<Value>,
}

/// A raw item that could not be turned into a quiz bank item.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid quiz item at index {index}: {reason}")]
pub struct InvalidQuizItem {
    pub index: usize,
    pub reason: String,
}

/// Valid items plus the skip report of one batch.
#[derive(Debug, Default)]
pub struct SynthesisReport {
    pub items: Vec<QuizBankItem>,
    pub skipped: Vec<InvalidQuizItem>,
}

fn normalize(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(other) => other.to_string().trim().to_string(),
    }
}

fn provided_options(item: &RawQuizItem) -> Vec<String> {
    item.options
        .iter()
        .flatten()
        .map(|o| normalize(Some(o)))
        .filter(|o| !o.is_empty())
        .collect()
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !value.is_empty() && !list.contains(&value) {
        list.push(value);
    }
}

/// Corpus-wide candidates for distractors: every correct answer, then every
/// option, then the fixed fallbacks. Deduplicated, first occurrence wins.
#[derive(Debug, Clone, Default)]
pub struct DistractorPool {
    candidates: Vec<String>,
}

impl DistractorPool {
    pub fn from_corpus(items: &[RawQuizItem]) -> Self {
        let mut candidates = Vec::new();
        for item in items {
            push_unique(&mut candidates, normalize(item.correct_ans.as_ref()));
        }
        for item in items {
            for option in provided_options(item) {
                push_unique(&mut candidates, option);
            }
        }
        for fallback in FALLBACK_DISTRACTORS {
            push_unique(&mut candidates, fallback.to_string());
        }
        Self { candidates }
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }
}

/// Produces a quiz bank item with exactly four distinct options, one of which
/// is the correct answer, in a random order.
///
/// The item's own options come first. If it brings more than three distinct
/// wrong options only the first three are kept. Missing options are taken
/// from `pool` in order and, once that runs dry, padded with `Option N`.
pub fn synthesize<R: Rng + ?Sized>(
    item: &RawQuizItem,
    pool: &DistractorPool,
    rng: &mut R,
) -> Result<QuizBankItem, String> {
    let question = normalize(item.question.as_ref());
    let correct_ans = normalize(item.correct_ans.as_ref());
    if question.is_empty() || correct_ans.is_empty() {
        return Err(MISSING_FIELDS.to_string());
    }

    let mut category = normalize(item.category.as_ref());
    if category.is_empty() {
        category = DEFAULT_CATEGORY.to_string();
    }

    let mut options = vec![correct_ans.clone()];
    let wrong = provided_options(item)
        .into_iter()
        .chain(pool.candidates.iter().cloned());
    for option in wrong {
        if options.len() == OPTION_COUNT {
            break;
        }
        push_unique(&mut options, option);
    }

    let mut n = options.len() + 1;
    while options.len() < OPTION_COUNT {
        push_unique(&mut options, format!("Option {n}"));
        n += 1;
    }

    options.shuffle(rng);

    Ok(QuizBankItem {
        id: Uuid::new_v4(),
        question,
        options,
        correct_ans,
        category,
    })
}

/// Runs [`synthesize`] over a whole batch, using the batch itself as the
/// distractor corpus. Invalid items are reported and skipped.
pub fn synthesize_batch<R: Rng + ?Sized>(items: &[RawQuizItem], rng: &mut R) -> SynthesisReport {
    let pool = DistractorPool::from_corpus(items);
    let mut report = SynthesisReport::default();

    for (index, item) in items.iter().enumerate() {
        match synthesize(item, &pool, rng) {
            Ok(valid) => report.items.push(valid),
            Err(reason) => report.skipped.push(InvalidQuizItem { index, reason }),
        }
    }
    report
}
