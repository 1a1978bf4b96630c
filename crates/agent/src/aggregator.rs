//! Report aggregator — merges parallel specialist reviews into one report.
//!
//! `overall_score` is the weighted mean of per-category mean scores, taken
//! over the categories that actually reported. A missing category does not
//! pull the score down. Issues are deduplicated on (category, normalized
//! message), keeping the most severe copy, and sorted by severity then
//! category. The result depends only on the input.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use swarmforge_config::AggregatorConfig;
use swarmforge_core::agent::SpecialistCategory;
use swarmforge_core::review::{Issue, SpecialistReport};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateReport {
    pub overall_score: f64,
    pub category_scores: BTreeMap<SpecialistCategory, f64>,
    pub issues: Vec<Issue>,
}

#[derive(Debug, Clone)]
pub struct ReportAggregator {
    weights: BTreeMap<SpecialistCategory, f64>,
}

impl Default for ReportAggregator {
    fn default() -> Self {
        Self::new(swarmforge_config::default_weights())
    }
}

impl ReportAggregator {
    pub fn new(weights: HashMap<SpecialistCategory, f64>) -> Self {
        Self {
            weights: weights.into_iter().collect(),
        }
    }

    pub fn from_config(config: &AggregatorConfig) -> Self {
        Self::new(config.weights.clone())
    }

    pub fn weight(&self, category: SpecialistCategory) -> f64 {
        self.weights.get(&category).copied().unwrap_or(0.0).max(0.0)
    }

    pub fn aggregate(&self, reports: &[SpecialistReport]) -> AggregateReport {
        let category_scores = category_means(reports);

        AggregateReport {
            overall_score: self.overall(&category_scores),
            category_scores,
            issues: merge_issues(reports),
        }
    }

    fn overall(&self, category_scores: &BTreeMap<SpecialistCategory, f64>) -> f64 {
        if category_scores.is_empty() {
            return 0.0;
        }

        let (weighted, total_weight) = category_scores
            .iter()
            .map(|(category, score)| (score * self.weight(*category), self.weight(*category)))
            .fold((0.0, 0.0), |(ws, tw), (s, w)| (ws + s, tw + w));

        if total_weight > 0.0 {
            weighted / total_weight
        } else {
            // Only zero-weight categories reported.
            category_scores.values().sum::<f64>() / category_scores.len() as f64
        }
    }
}

fn category_means(reports: &[SpecialistReport]) -> BTreeMap<SpecialistCategory, f64> {
    let mut sums: BTreeMap<SpecialistCategory, (f64, usize)> = BTreeMap::new();
    for report in reports {
        let slot = sums.entry(report.category).or_insert((0.0, 0));
        slot.0 += report.score.clamp(0.0, 100.0);
        slot.1 += 1;
    }
    sums.into_iter()
        .map(|(category, (sum, n))| (category, sum / n as f64))
        .collect()
}

fn merge_issues(reports: &[SpecialistReport]) -> Vec<Issue> {
    let mut merged: BTreeMap<(SpecialistCategory, String), Issue> = BTreeMap::new();

    for issue in reports.iter().flat_map(|r| r.issues.iter()) {
        let key = (issue.category, normalize(&issue.message));
        match merged.get_mut(&key) {
            Some(existing) if issue.severity > existing.severity => *existing = issue.clone(),
            Some(_) => {}
            None => {
                merged.insert(key, issue.clone());
            }
        }
    }

    let mut issues: Vec<Issue> = merged.into_values().collect();
    issues.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then(a.category.cmp(&b.category))
            .then_with(|| a.message.cmp(&b.message))
    });
    issues
}

/// Lowercase, collapse whitespace, drop trailing punctuation.
fn normalize(message: &str) -> String {
    message
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .trim_end_matches(['.', '!', ';', ':'])
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarmforge_core::review::Severity;

    fn report(agent: &str, category: SpecialistCategory, score: f64, issues: Vec<Issue>) -> SpecialistReport {
        SpecialistReport {
            agent_id: agent.into(),
            category,
            score,
            issues,
        }
    }

    fn sample() -> Vec<SpecialistReport> {
        use SpecialistCategory::*;
        vec![
            report("sec", Security, 40.0, vec![
                Issue::new(Security, Severity::High, "SQL injection in login"),
                Issue::new(Security, Severity::Low, "Verbose errors"),
            ]),
            report("arch", Architecture, 80.0, vec![
                Issue::new(Architecture, Severity::Medium, "God object"),
            ]),
            report("sec-2", Security, 60.0, vec![
                Issue::new(Security, Severity::Critical, "sql  injection in LOGIN."),
            ]),
        ]
    }

    #[test]
    fn weighted_over_present_categories() {
        let aggregate = ReportAggregator::default().aggregate(&sample());
        // security mean 50 (w .35), architecture 80 (w .25)
        let expected = (50.0 * 0.35 + 80.0 * 0.25) / (0.35 + 0.25);
        assert!((aggregate.overall_score - expected).abs() < 1e-9);
        assert_eq!(aggregate.category_scores[&SpecialistCategory::Security], 50.0);
    }

    #[test]
    fn duplicates_keep_highest_severity() {
        let aggregate = ReportAggregator::default().aggregate(&sample());
        let injections: Vec<&Issue> = aggregate
            .issues
            .iter()
            .filter(|i| i.message.to_lowercase().contains("injection"))
            .collect();
        assert_eq!(injections.len(), 1);
        assert_eq!(injections[0].severity, Severity::Critical);
    }

    #[test]
    fn sorted_by_severity_then_category() {
        let aggregate = ReportAggregator::default().aggregate(&sample());
        let severities: Vec<Severity> = aggregate.issues.iter().map(|i| i.severity).collect();
        assert_eq!(severities, vec![Severity::Critical, Severity::Medium, Severity::Low]);

        use SpecialistCategory::*;
        let tied = ReportAggregator::default().aggregate(&[
            report("ux", Ux, 90.0, vec![Issue::new(Ux, Severity::High, "b")]),
            report("sec", Security, 90.0, vec![Issue::new(Security, Severity::High, "a")]),
        ]);
        assert_eq!(tied.issues[0].category, Security);
        assert_eq!(tied.issues[1].category, Ux);
    }

    #[test]
    fn aggregation_is_idempotent() {
        let aggregator = ReportAggregator::default();
        let reports = sample();
        let first = aggregator.aggregate(&reports);
        let second = aggregator.aggregate(&reports);
        assert_eq!(first, second);
    }

    #[test]
    fn empty_input_scores_zero() {
        let aggregate = ReportAggregator::default().aggregate(&[]);
        assert_eq!(aggregate.overall_score, 0.0);
        assert!(aggregate.issues.is_empty());
    }

    #[test]
    fn zero_weight_categories_fall_back_to_plain_mean() {
        let aggregator = ReportAggregator::new(HashMap::new());
        let aggregate = aggregator.aggregate(&[
            report("a", SpecialistCategory::General, 30.0, vec![]),
            report("b", SpecialistCategory::Ux, 70.0, vec![]),
        ]);
        assert_eq!(aggregate.overall_score, 50.0);
    }
}
