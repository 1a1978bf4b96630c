//! Parsing of scored reviews out of free-form model output.
//!
//! Two shapes are accepted. A JSON object, optionally inside a code fence:
//!
//! ```text
//! {"score": 72, "issues": [{"severity": "high", "message": "SQL built by string concat"}]}
//! ```
//!
//! or the line format the specialist templates ask for:
//!
//! ```text
//! SCORE: 72
//! - [high] SQL built by string concat
//! ```

use serde::Deserialize;
use swarmforge_core::agent::SpecialistCategory;
use swarmforge_core::review::{Issue, Severity, SpecialistReport};

/// A score and its findings.
#[derive(Debug, Clone, PartialEq)]
pub struct Critique {
    /// 0–100
    pub score: f64,
    pub issues: Vec<Issue>,
}

impl Critique {
    /// Render back into the line format, for feeding to a refiner.
    pub fn render(&self) -> String {
        let mut out = format!("SCORE: {}", self.score);
        for issue in &self.issues {
            out.push_str(&format!("\n- [{}] {}", issue.severity, issue.message));
        }
        out
    }
}

#[derive(Deserialize)]
struct JsonCritique {
    score: f64,
    #[serde(default)]
    issues: Vec<JsonIssue>,
}

#[derive(Deserialize)]
struct JsonIssue {
    #[serde(default)]
    severity: Option<String>,
    message: String,
    #[serde(default)]
    category: Option<String>,
}

/// Extract a critique from `text`. Issues without an explicit category get
/// `default_category`. `None` when no score can be found.
pub fn parse_critique(text: &str, default_category: SpecialistCategory) -> Option<Critique> {
    parse_json(text, default_category).or_else(|| parse_lines(text, default_category))
}

/// Parse a specialist's output into a report.
pub fn parse_report(
    agent_id: &str,
    category: SpecialistCategory,
    text: &str,
) -> Option<SpecialistReport> {
    let critique = parse_critique(text, category)?;
    Some(SpecialistReport {
        agent_id: agent_id.to_string(),
        category,
        score: critique.score,
        issues: critique.issues,
    })
}

fn parse_json(text: &str, default_category: SpecialistCategory) -> Option<Critique> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    let parsed: JsonCritique = serde_json::from_str(&text[start..=end]).ok()?;
    if !parsed.score.is_finite() {
        return None;
    }

    let issues = parsed
        .issues
        .into_iter()
        .filter(|i| !i.message.trim().is_empty())
        .map(|i| {
            let severity = i
                .severity
                .and_then(|s| s.parse().ok())
                .unwrap_or(Severity::Medium);
            let category = i
                .category
                .as_deref()
                .and_then(parse_category)
                .unwrap_or(default_category);
            Issue::new(category, severity, i.message.trim())
        })
        .collect();

    Some(Critique {
        score: parsed.score.clamp(0.0, 100.0),
        issues,
    })
}

fn parse_lines(text: &str, category: SpecialistCategory) -> Option<Critique> {
    let mut score = None;
    let mut issues = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if score.is_none() {
            if let Some(value) = parse_score_line(line) {
                score = Some(value);
                continue;
            }
        }
        if let Some(issue) = parse_issue_line(line, category) {
            issues.push(issue);
        }
    }

    Some(Critique {
        score: score?,
        issues,
    })
}

/// `SCORE: 82`, `**Score:** 82/100`, `score = 82.5`
fn parse_score_line(line: &str) -> Option<f64> {
    let cleaned = line.trim_start_matches(['*', '#', ' ']);
    if !cleaned.get(..5)?.eq_ignore_ascii_case("score") {
        return None;
    }
    let rest = cleaned[5..].trim_start_matches(|c: char| c == '*' || c == ':' || c == '=' || c.is_whitespace());
    let number: String = rest
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let value: f64 = number.parse().ok()?;
    Some(value.clamp(0.0, 100.0))
}

/// `- [high] message` or `* [high] message`
fn parse_issue_line(line: &str, category: SpecialistCategory) -> Option<Issue> {
    let body = line.strip_prefix("- ").or_else(|| line.strip_prefix("* "))?;
    let body = body.trim_start().strip_prefix('[')?;
    let (tag, message) = body.split_once(']')?;
    let severity: Severity = tag.parse().ok()?;
    let message = message.trim();
    if message.is_empty() {
        return None;
    }
    Some(Issue::new(category, severity, message))
}

fn parse_category(s: &str) -> Option<SpecialistCategory> {
    match s.trim().to_ascii_lowercase().as_str() {
        "security" => Some(SpecialistCategory::Security),
        "architecture" => Some(SpecialistCategory::Architecture),
        "performance" => Some(SpecialistCategory::Performance),
        "ux" | "usability" => Some(SpecialistCategory::Ux),
        "general" => Some(SpecialistCategory::General),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_line_format() {
        let text = "SCORE: 65\n- [high] No input validation\n- [low] Naming is inconsistent\nSome prose.";
        let critique = parse_critique(text, SpecialistCategory::General).unwrap();
        assert_eq!(critique.score, 65.0);
        assert_eq!(critique.issues.len(), 2);
        assert_eq!(critique.issues[0].severity, Severity::High);
        assert_eq!(critique.issues[1].message, "Naming is inconsistent");
    }

    #[test]
    fn parses_markdown_score_variants() {
        assert_eq!(parse_score_line("**Score:** 82/100"), Some(82.0));
        assert_eq!(parse_score_line("score = 71.5"), Some(71.5));
        assert_eq!(parse_score_line("Scores vary"), None);
        assert_eq!(parse_score_line("SCORE: 140"), Some(100.0));
    }

    #[test]
    fn parses_fenced_json() {
        let text = "Here you go:\n```json\n{\"score\": 58, \"issues\": [\
                    {\"severity\": \"critical\", \"message\": \"Hardcoded secret\", \"category\": \"security\"},\
                    {\"message\": \"Slow loop\"}]}\n```";
        let critique = parse_critique(text, SpecialistCategory::Performance).unwrap();
        assert_eq!(critique.score, 58.0);
        assert_eq!(critique.issues[0].category, SpecialistCategory::Security);
        assert_eq!(critique.issues[0].severity, Severity::Critical);
        assert_eq!(critique.issues[1].category, SpecialistCategory::Performance);
        assert_eq!(critique.issues[1].severity, Severity::Medium);
    }

    #[test]
    fn ignores_checkboxes_and_unknown_tags() {
        let text = "SCORE: 90\n- [x] done\n- [ ] todo\n- [medium] real issue";
        let critique = parse_critique(text, SpecialistCategory::Ux).unwrap();
        assert_eq!(critique.issues.len(), 1);
        assert_eq!(critique.issues[0].message, "real issue");
    }

    #[test]
    fn no_score_is_none() {
        assert!(parse_critique("- [high] something", SpecialistCategory::General).is_none());
        assert!(parse_critique("", SpecialistCategory::General).is_none());
    }

    #[test]
    fn render_round_trips_through_parser() {
        let critique = Critique {
            score: 40.0,
            issues: vec![Issue::new(SpecialistCategory::General, Severity::High, "Missing tests")],
        };
        let parsed = parse_critique(&critique.render(), SpecialistCategory::General).unwrap();
        assert_eq!(parsed, critique);
    }

    #[test]
    fn report_carries_agent_and_category() {
        let report = parse_report("security", SpecialistCategory::Security, "SCORE: 70\n- [high] XSS").unwrap();
        assert_eq!(report.agent_id, "security");
        assert_eq!(report.category, SpecialistCategory::Security);
        assert_eq!(report.issues[0].category, SpecialistCategory::Security);
    }
}
