//! Aggregate statistics over submitted ratings.
//!
//! Standard errors and confidence intervals use the sample standard deviation
//! (`n - 1` denominator, floored at 1), so a single rating yields a spread of
//! zero rather than `NaN`.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::model::{AbsoluteSubmission, ComparativeSubmission, Submission};

/// z-value of a two-sided 95% interval.
pub const Z_95: f64 = 1.96;

/// Half-width around zero inside which a comparison counts as a tie.
pub const CMOS_TIE_THRESHOLD: f64 = 0.1;

/// Per-model summary of absolute ratings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelStats {
    pub model: String,
    pub count: usize,
    pub mean_naturalness: f64,
    pub mean_accuracy: f64,
    pub stderr_naturalness: f64,
    pub stderr_accuracy: f64,
}

/// Summary of comparative ratings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CmosStats {
    pub count: usize,
    pub mean_naturalness: f64,
    pub mean_accuracy: f64,
    /// Half-width of the 95% interval around `mean_naturalness`.
    pub ci_naturalness: f64,
    /// Half-width of the 95% interval around `mean_accuracy`.
    pub ci_accuracy: f64,
}

/// Which side a comparison favours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preference {
    /// Positive beyond the tie threshold.
    Reference,
    /// Negative beyond the tie threshold.
    Other,
    Tie,
}

impl Preference {
    pub fn from_mean(mean: f64) -> Self {
        if mean > CMOS_TIE_THRESHOLD {
            Preference::Reference
        } else if mean < -CMOS_TIE_THRESHOLD {
            Preference::Other
        } else {
            Preference::Tie
        }
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation with an `n - 1` denominator floored at 1.
pub fn sample_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let sum_sq: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    let denom = (values.len() - 1).max(1) as f64;
    (sum_sq / denom).sqrt()
}

/// Standard error of the mean.
pub fn standard_error(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    sample_std_dev(values) / (values.len() as f64).sqrt()
}

/// Half-width of the 95% confidence interval of the mean.
pub fn confidence_interval(values: &[f64]) -> f64 {
    Z_95 * standard_error(values)
}

/// Per-model count, mean and standard error. Sorted by model name.
pub fn calculate_model_stats(records: &[AbsoluteSubmission]) -> Vec<ModelStats> {
    let mut grouped: BTreeMap<&str, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for r in records {
        let (nat, acc) = grouped.entry(r.model.as_str()).or_default();
        nat.push(f64::from(r.naturalness));
        acc.push(f64::from(r.accuracy));
    }

    grouped
        .into_iter()
        .map(|(model, (nat, acc))| ModelStats {
            model: model.to_string(),
            count: nat.len(),
            mean_naturalness: mean(&nat),
            mean_accuracy: mean(&acc),
            stderr_naturalness: standard_error(&nat),
            stderr_accuracy: standard_error(&acc),
        })
        .collect()
}

/// Count, mean and 95% interval per dimension. `None` when there is nothing
/// to summarize.
pub fn calculate_cmos_stats(records: &[ComparativeSubmission]) -> Option<CmosStats> {
    if records.is_empty() {
        return None;
    }
    let nat: Vec<f64> = records.iter().map(|r| f64::from(r.naturalness_cmos)).collect();
    let acc: Vec<f64> = records.iter().map(|r| f64::from(r.accuracy_cmos)).collect();

    Some(CmosStats {
        count: records.len(),
        mean_naturalness: mean(&nat),
        mean_accuracy: mean(&acc),
        ci_naturalness: confidence_interval(&nat),
        ci_accuracy: confidence_interval(&acc),
    })
}

/// Everything the results page shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudySummary {
    pub total_ratings: usize,
    /// Distinct participant emails.
    pub unique_participants: usize,
    pub model_stats: Vec<ModelStats>,
    pub cmos: Option<CmosStats>,
}

pub fn summarize(records: &[Submission]) -> StudySummary {
    let unique_participants = records
        .iter()
        .map(Submission::email)
        .collect::<HashSet<_>>()
        .len();
    let (absolute, comparative) = Submission::partition(records);

    StudySummary {
        total_ratings: records.len(),
        unique_participants,
        model_stats: calculate_model_stats(&absolute),
        cmos: calculate_cmos_stats(&comparative),
    }
}

/// Keep only participants (by email) with exactly `expected` records.
///
/// Partial sessions and accidental double runs are dropped from analysis.
pub fn filter_complete_participants(records: &[Submission], expected: usize) -> Vec<Submission> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for r in records {
        *counts.entry(r.email()).or_default() += 1;
    }

    let kept: Vec<Submission> = records
        .iter()
        .filter(|r| counts.get(r.email()) == Some(&expected))
        .cloned()
        .collect();

    let dropped = counts.values().filter(|&&c| c != expected).count();
    if dropped > 0 {
        tracing::info!(
            kept = counts.len() - dropped,
            dropped,
            expected,
            "filtered incomplete participants"
        );
    }
    kept
}

/// Re-orient comparisons so that positive scores favour `reference`.
///
/// Records comparing two models other than `reference` are dropped.
pub fn normalize_cmos(
    records: &[ComparativeSubmission],
    reference: &str,
) -> Vec<ComparativeSubmission> {
    let mut skipped = 0usize;
    let normalized: Vec<ComparativeSubmission> = records
        .iter()
        .filter_map(|r| {
            if r.model_a == reference {
                Some(r.clone())
            } else if r.model_b == reference {
                Some(ComparativeSubmission {
                    model_a: r.model_b.clone(),
                    model_b: r.model_a.clone(),
                    naturalness_cmos: -r.naturalness_cmos,
                    accuracy_cmos: -r.accuracy_cmos,
                    ..r.clone()
                })
            } else {
                skipped += 1;
                None
            }
        })
        .collect();

    if skipped > 0 {
        tracing::warn!(skipped, reference, "records not involving the reference model");
    }
    normalized
}

/// Mean scores for one sentence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceBreakdown {
    pub sentence_id: String,
    pub count: usize,
    pub mean_naturalness: f64,
    pub mean_accuracy: f64,
}

/// Per-sentence means of comparative scores, sorted by sentence id.
pub fn per_sentence_breakdown(records: &[ComparativeSubmission]) -> Vec<SentenceBreakdown> {
    let mut grouped: BTreeMap<&str, Vec<&ComparativeSubmission>> = BTreeMap::new();
    for r in records {
        grouped.entry(r.sentence_id.as_str()).or_default().push(r);
    }

    grouped
        .into_iter()
        .map(|(sentence_id, group)| {
            let nat: Vec<f64> = group.iter().map(|r| f64::from(r.naturalness_cmos)).collect();
            let acc: Vec<f64> = group.iter().map(|r| f64::from(r.accuracy_cmos)).collect();
            SentenceBreakdown {
                sentence_id: sentence_id.to_string(),
                count: group.len(),
                mean_naturalness: mean(&nat),
                mean_accuracy: mean(&acc),
            }
        })
        .collect()
}
