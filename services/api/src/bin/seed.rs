//! services/api/src/bin/seed.rs
//!
//! Loads the shared quiz bank and the owner-less template courses.
//!
//! Quiz items get their options completed by the distractor synthesizer;
//! items without a question or answer are reported and skipped. Template
//! courses are validated like generated ones and upserted by title, so the
//! tool can be run repeatedly.

use api_lib::{adapters::DbAdapter, config::Config, error::ApiError};
use chrono::Utc;
use clap::Parser;
use learnpath_core::distractors::{synthesize_batch, RawQuizItem};
use learnpath_core::draft::{banner_image_for, course_from_value};
use learnpath_core::ports::DatabaseService;
use rand::SeedableRng;
use rand_pcg::Mcg128Xsl64;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(about = "Seeds the quiz bank and template courses")]
struct Args {
    /// JSON file with raw quiz items (an array, or an object with a `courses` array).
    #[arg(long)]
    quizzes: Option<PathBuf>,

    /// JSON file with template courses.
    #[arg(long)]
    courses: Option<PathBuf>,

    /// Clear the quiz bank and the template courses before loading.
    #[arg(long)]
    wipe: bool,

    /// Fixes option shuffling and banner selection.
    #[arg(long)]
    seed: Option<u64>,
}

/// Raw quiz items from either accepted top-level shape.
fn quiz_items_from(payload: Value) -> Result<Vec<RawQuizItem>, serde_json::Error> {
    let list = match payload {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("courses") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };
    list.into_iter().map(serde_json::from_value).collect()
}

/// Course objects from `{"courses": [...]}` or an array of `{"courses": [...]}`
/// / `{"course": {...}}` entries.
fn course_values_from(payload: Value) -> Vec<Value> {
    let mut courses = Vec::new();
    match payload {
        Value::Array(entries) => {
            for entry in entries {
                let Value::Object(mut map) = entry else { continue };
                if let Some(Value::Array(list)) = map.remove("courses") {
                    courses.extend(list);
                } else if let Some(course @ Value::Object(_)) = map.remove("course") {
                    courses.push(course);
                }
            }
        }
        Value::Object(mut map) => {
            if let Some(Value::Array(list)) = map.remove("courses") {
                courses = list;
            }
        }
        _ => {}
    }
    courses
}

fn read_json(path: &Path) -> Result<Value, ApiError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

async fn seed_quizzes(
    db: &DbAdapter,
    path: &Path,
    wipe: bool,
    rng: &mut Mcg128Xsl64,
) -> Result<(), ApiError> {
    let items = quiz_items_from(read_json(path)?)?;
    if items.is_empty() {
        warn!("No quiz items found in {}", path.display());
        return Ok(());
    }

    let report = synthesize_batch(&items, rng);
    for skip in &report.skipped {
        warn!("Skipped quiz item {}: {}", skip.index, skip.reason);
    }

    if wipe {
        let removed = db.delete_quiz_items().await?;
        info!("Removed {} quiz bank items", removed);
    }
    let inserted = db.insert_quiz_items(&report.items).await?;
    info!(
        "Inserted {} quiz items, skipped {} of {}",
        inserted,
        report.skipped.len(),
        items.len()
    );
    Ok(())
}

async fn seed_courses(
    db: &DbAdapter,
    path: &Path,
    wipe: bool,
    rng: &mut Mcg128Xsl64,
) -> Result<(), ApiError> {
    let values = course_values_from(read_json(path)?);
    if values.is_empty() {
        warn!("No courses found in {}", path.display());
        return Ok(());
    }

    if wipe {
        let removed = db.delete_template_courses().await?;
        info!("Removed {} template courses", removed);
    }

    let mut upserted = 0;
    for (index, value) in values.into_iter().enumerate() {
        let draft = match course_from_value(value) {
            Ok(draft) => draft,
            Err(e) => {
                warn!("Skipped course {}: {}", index, e);
                continue;
            }
        };
        let banner = banner_image_for(&draft.category, rng);
        let course = draft.into_course(None, banner, Vec::new(), Utc::now());
        db.upsert_template_course(&course).await?;
        info!("Upserted: {}", course.course_title);
        upserted += 1;
    }
    info!("Seeded {} template courses", upserted);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    let args = Args::parse();
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if args.quizzes.is_none() && args.courses.is_none() {
        return Err(ApiError::Internal(
            "Nothing to seed: pass --quizzes and/or --courses".to_string(),
        ));
    }

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&config.database_url)
        .await?;
    let db = DbAdapter::new(pool);
    db.run_migrations().await?;

    let mut rng = match args.seed.or(config.rng_seed) {
        Some(seed) => Mcg128Xsl64::seed_from_u64(seed),
        None => Mcg128Xsl64::from_entropy(),
    };

    if let Some(path) = &args.quizzes {
        seed_quizzes(&db, path, args.wipe, &mut rng).await?;
    }
    if let Some(path) = &args.courses {
        seed_courses(&db, path, args.wipe, &mut rng).await?;
    }

    info!("Seeding complete");
    Ok(())
}
