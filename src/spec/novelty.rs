//! Advisory novelty scoring against prior specifications.
//!
//! Similarity is a weighted sum of four components in [0, 1]. A high
//! score is logged by the caller but never rejects a spec.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::hash::Hash;

use super::model::{InteractionInput, SpecSummary};

pub const CATEGORY_WEIGHT: f64 = 0.35;
pub const TAGS_WEIGHT: f64 = 0.25;
pub const MOOD_WEIGHT: f64 = 0.15;
pub const INPUTS_WEIGHT: f64 = 0.25;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SimilarityBreakdown {
    pub category: f64,
    pub tags: f64,
    pub mood: f64,
    pub inputs: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoveltyReport {
    pub max_similarity: f64,
    pub most_similar: Option<String>,
    pub breakdown: Option<SimilarityBreakdown>,
    pub compared: usize,
    pub threshold: f64,
    pub is_similar: bool,
}

/// Jaccard index; two empty sets share nothing
fn jaccard<T: Eq + Hash>(a: &HashSet<T>, b: &HashSet<T>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

fn words(label: &str) -> HashSet<String> {
    label
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Exact label match scores 1; otherwise partial credit for shared words
fn label_similarity(a: Option<&str>, b: Option<&str>) -> f64 {
    match (a, b) {
        (Some(a), Some(b)) if a.trim().eq_ignore_ascii_case(b.trim()) && !a.trim().is_empty() => {
            1.0
        }
        (Some(a), Some(b)) => jaccard(&words(a), &words(b)),
        _ => 0.0,
    }
}

pub fn similarity(a: &SpecSummary, b: &SpecSummary) -> SimilarityBreakdown {
    let category = label_similarity(a.category.as_deref(), b.category.as_deref());
    let mood = label_similarity(a.mood.as_deref(), b.mood.as_deref());

    let tag_set = |s: &SpecSummary| -> HashSet<String> {
        s.tags.iter().map(|t| t.trim().to_lowercase()).collect()
    };
    let tags = jaccard(&tag_set(a), &tag_set(b));
    let input_set = |s: &SpecSummary| -> HashSet<InteractionInput> {
        s.inputs.iter().copied().collect()
    };
    let inputs = jaccard(&input_set(a), &input_set(b));

    let total = CATEGORY_WEIGHT * category
        + TAGS_WEIGHT * tags
        + MOOD_WEIGHT * mood
        + INPUTS_WEIGHT * inputs;

    SimilarityBreakdown {
        category,
        tags,
        mood,
        inputs,
        total: total.clamp(0.0, 1.0),
    }
}

/// Compare `candidate` against every prior and keep the closest match
pub fn novelty_report(
    candidate: &SpecSummary,
    priors: &[SpecSummary],
    threshold: f64,
) -> NoveltyReport {
    let closest = priors
        .iter()
        .filter(|p| p.id != candidate.id)
        .map(|p| (p, similarity(candidate, p)))
        .fold(None, |best: Option<(&SpecSummary, SimilarityBreakdown)>, (p, s)| match best {
            Some((_, b)) if b.total >= s.total => best,
            _ => Some((p, s)),
        });

    let max_similarity = closest.map(|(_, s)| s.total).unwrap_or(0.0);
    NoveltyReport {
        max_similarity,
        most_similar: closest.map(|(p, _)| p.id.clone()),
        breakdown: closest.map(|(_, s)| s),
        compared: priors.len(),
        threshold,
        is_similar: closest.is_some() && max_similarity >= threshold,
    }
}
