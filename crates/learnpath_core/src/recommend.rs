//! Per-domain course recommendations and the miscellaneous bucket.
//!
//! Storage hands over listings already filtered and reduced to one per
//! normalized title. The filters and the per-title pick are re-applied here
//! before the seeded sample, so results hold for any store.

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::difficulty;
use crate::domain::{CourseListing, CourseRecord, Difficulty};

pub const SAMPLE_SIZE: usize = 5;
pub const MISCELLANEOUS: &str = "Miscellaneous";

#[derive(Debug, Clone, PartialEq)]
pub struct DomainRecommendations {
    pub domain: String,
    pub courses: Vec<CourseListing>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recommendations {
    pub domains: Vec<DomainRecommendations>,
    pub miscellaneous: Vec<CourseListing>,
}

/// What the sampler needs to know about the requesting learner.
#[derive(Debug, Clone)]
pub struct LearnerProfile {
    pub learner_id: Uuid,
    pub score: i32,
    pub domains: Vec<String>,
    /// Normalized titles of the learner's own courses.
    pub owned_titles: HashSet<String>,
}

impl LearnerProfile {
    pub fn new(learner_id: Uuid, score: i32, domains: Vec<String>, owned: &[CourseRecord]) -> Self {
        Self {
            learner_id,
            score,
            domains,
            owned_titles: owned.iter().map(CourseRecord::title_key).collect(),
        }
    }

    pub fn allowed_difficulties(&self) -> &'static [Difficulty] {
        difficulty::classify(self.score)
    }
}

/// Keeps one record per normalized title: a record owned by `prefer_owner`
/// if the group has one, otherwise the most recently created. Groups are
/// returned in order of first appearance.
pub fn dedupe_by_title(
    candidates: Vec<CourseListing>,
    prefer_owner: Option<Uuid>,
) -> Vec<CourseListing> {
    let mut order: Vec<String> = Vec::new();
    let mut best: HashMap<String, CourseListing> = HashMap::new();

    for course in candidates {
        let key = course.title_key();
        match best.get(&key) {
            None => {
                order.push(key.clone());
                best.insert(key, course);
            }
            Some(current) => {
                if outranks(&course, current, prefer_owner) {
                    best.insert(key, course);
                }
            }
        }
    }

    order.into_iter().filter_map(|key| best.remove(&key)).collect()
}

fn outranks(candidate: &CourseListing, current: &CourseListing, prefer_owner: Option<Uuid>) -> bool {
    let owned = |c: &CourseListing| prefer_owner.is_some() && c.created_by == prefer_owner;
    match (owned(candidate), owned(current)) {
        (true, false) => true,
        (false, true) => false,
        _ => candidate.created_at > current.created_at,
    }
}

/// Uniform sample of up to `size` records without replacement.
pub fn sample<R: Rng + ?Sized>(mut items: Vec<CourseListing>, size: usize, rng: &mut R) -> Vec<CourseListing> {
    if items.len() > size {
        let (picked, _) = items.partial_shuffle(rng, size);
        return picked.to_vec();
    }
    items.shuffle(rng);
    items
}

/// Recommendations for one domain out of `candidates` (records of that
/// domain as returned by storage).
pub fn recommend_domain<R: Rng + ?Sized>(
    profile: &LearnerProfile,
    domain: &str,
    candidates: Vec<CourseListing>,
    rng: &mut R,
) -> DomainRecommendations {
    let allowed = profile.allowed_difficulties();
    let eligible: Vec<CourseListing> = candidates
        .into_iter()
        .filter(|c| c.category == domain)
        .filter(|c| allowed.contains(&c.difficulty))
        .filter(|c| !profile.owned_titles.contains(&c.title_key()))
        .collect();

    let representatives = dedupe_by_title(eligible, Some(profile.learner_id));
    DomainRecommendations {
        domain: domain.to_string(),
        courses: sample(representatives, SAMPLE_SIZE, rng),
    }
}

/// The domain- and difficulty-agnostic bucket: anything not owned by the
/// learner, keeping the newest record of each title.
pub fn recommend_miscellaneous<R: Rng + ?Sized>(
    profile: &LearnerProfile,
    candidates: Vec<CourseListing>,
    rng: &mut R,
) -> Vec<CourseListing> {
    let not_owned: Vec<CourseListing> = candidates
        .into_iter()
        .filter(|c| !c.is_owned_by(profile.learner_id))
        .collect();
    sample(dedupe_by_title(not_owned, None), SAMPLE_SIZE, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rand::SeedableRng;
    use rand_pcg::Mcg128Xsl64;

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn record(title: &str, category: &str, difficulty: Difficulty, owner: Option<Uuid>, age_days: i64) -> CourseRecord {
        CourseRecord {
            id: Uuid::new_v4(),
            course_title: title.to_string(),
            description: String::new(),
            category: category.to_string(),
            difficulty,
            banner_image: "banner-1.png".to_string(),
            created_by: owner,
            chapters: Vec::new(),
            quiz: Vec::new(),
            flashcards: Vec::new(),
            qa: Vec::new(),
            completed_chapter: Vec::new(),
            quiz_result: Vec::new(),
            quiz_marks: 0,
            videos: Vec::new(),
            created_at: base_time() - Duration::days(age_days),
        }
    }

    fn course(title: &str, category: &str, difficulty: Difficulty, owner: Option<Uuid>, age_days: i64) -> CourseListing {
        CourseListing::from(&record(title, category, difficulty, owner, age_days))
    }

    #[test]
    fn dedupe_prefers_owner_then_newest() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let newest = course("Graph Theory", "Math", Difficulty::Easy, Some(other), 1);
        let mine = course("graph theory ", "Math", Difficulty::Easy, Some(me), 10);
        let oldest = course("GRAPH THEORY", "Math", Difficulty::Easy, None, 30);

        let kept = dedupe_by_title(vec![oldest.clone(), newest.clone(), mine.clone()], Some(me));
        assert_eq!(kept, vec![mine]);

        let kept = dedupe_by_title(vec![oldest, newest.clone()], None);
        assert_eq!(kept, vec![newest]);
    }

    #[test]
    fn owned_titles_never_reach_domain_results() {
        let me = Uuid::new_v4();
        let owned = vec![record("Intro to Algorithms", "Math", Difficulty::Easy, Some(me), 0)];
        let profile = LearnerProfile::new(me, 50, vec!["Math".to_string()], &owned);

        let candidates = vec![
            course("intro to algorithms", "Math", Difficulty::Easy, None, 2),
            course("Intro To Algorithms", "Math", Difficulty::Advanced, Some(Uuid::new_v4()), 1),
            course("Linear Algebra", "Math", Difficulty::Intermediate, None, 3),
        ];
        let mut rng = Mcg128Xsl64::seed_from_u64(4);
        let result = recommend_domain(&profile, "Math", candidates, &mut rng);

        assert_eq!(result.domain, "Math");
        assert_eq!(result.courses.len(), 1);
        assert!(result
            .courses
            .iter()
            .all(|c| c.title_key() != "intro to algorithms"));
    }

    #[test]
    fn domain_results_respect_band_and_category() {
        let me = Uuid::new_v4();
        let profile = LearnerProfile::new(me, 20, vec!["Math".to_string()], &[]);
        let candidates = vec![
            course("Calculus", "Math", Difficulty::Advanced, None, 1),
            course("Counting", "Math", Difficulty::Easy, None, 1),
            course("Poetry", "Arts", Difficulty::Easy, None, 1),
        ];
        let mut rng = Mcg128Xsl64::seed_from_u64(4);
        let result = recommend_domain(&profile, "Math", candidates, &mut rng);
        let titles: Vec<_> = result.courses.iter().map(|c| c.course_title.as_str()).collect();
        assert_eq!(titles, vec!["Counting"]);
    }

    #[test]
    fn out_of_range_score_yields_empty_domain_results() {
        let profile = LearnerProfile::new(Uuid::new_v4(), 150, vec!["Math".to_string()], &[]);
        let candidates = vec![course("Counting", "Math", Difficulty::Easy, None, 1)];
        let mut rng = Mcg128Xsl64::seed_from_u64(4);
        assert!(recommend_domain(&profile, "Math", candidates, &mut rng).courses.is_empty());
    }

    #[test]
    fn samples_at_most_five_distinct_titles() {
        let profile = LearnerProfile::new(Uuid::new_v4(), 50, vec!["Math".to_string()], &[]);
        let candidates: Vec<_> = (0..12)
            .flat_map(|i| {
                let title = format!("Course {i}");
                vec![
                    course(&title, "Math", Difficulty::Easy, None, 1),
                    course(&title, "Math", Difficulty::Easy, Some(Uuid::new_v4()), 2),
                ]
            })
            .collect();
        let mut rng = Mcg128Xsl64::seed_from_u64(8);
        let result = recommend_domain(&profile, "Math", candidates, &mut rng);

        assert_eq!(result.courses.len(), SAMPLE_SIZE);
        let keys: HashSet<_> = result.courses.iter().map(CourseListing::title_key).collect();
        assert_eq!(keys.len(), SAMPLE_SIZE);
    }

    #[test]
    fn miscellaneous_ignores_domain_and_band_but_not_ownership() {
        let me = Uuid::new_v4();
        let profile = LearnerProfile::new(me, 150, vec!["Math".to_string()], &[]);
        let candidates = vec![
            course("Mine", "Math", Difficulty::Easy, Some(me), 1),
            course("Painting", "Arts", Difficulty::Advanced, None, 1),
            course("painting", "Arts", Difficulty::Advanced, Some(Uuid::new_v4()), 0),
        ];
        let mut rng = Mcg128Xsl64::seed_from_u64(4);
        let misc = recommend_miscellaneous(&profile, candidates, &mut rng);

        assert_eq!(misc.len(), 1);
        assert_eq!(misc[0].course_title, "painting");
    }

    #[test]
    fn sampling_is_reproducible_with_a_seed() {
        let items: Vec<_> = (0..10)
            .map(|i| course(&format!("C{i}"), "Math", Difficulty::Easy, None, i))
            .collect();
        let a = sample(items.clone(), 5, &mut Mcg128Xsl64::seed_from_u64(21));
        let b = sample(items, 5, &mut Mcg128Xsl64::seed_from_u64(21));
        assert_eq!(a, b);
    }
}
