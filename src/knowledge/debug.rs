//! Multi-phase debug investigation.
//!
//! An investigation runs three retrievals in a fixed order (past errors, related
//! tasks, code changes), optionally a fourth over directive summaries, and then
//! picks the first past error whose raw similarity reaches
//! [`PROVEN_FIX_THRESHOLD`]. A failing phase aborts the whole investigation.

use std::fmt;

use serde::Serialize;

use crate::error::Result;
use crate::knowledge::search::{KnowledgeSearch, Query};
use crate::knowledge::types::{Domain, ScoredChunk, SearchMode};

/// Raw similarity at which a past resolution counts as a proven fix.
pub const PROVEN_FIX_THRESHOLD: f64 = 0.70;

/// `(top_k, threshold)` per phase.
const PAST_ERRORS: (usize, f64) = (10, 0.30);
const RELATED_TASKS: (usize, f64) = (5, 0.35);
const CODE_CHANGES: (usize, f64) = (5, 0.30);
const DIRECTIVES: (usize, f64) = (5, 0.35);

/// Characters of the proven fix shown in [`DebugReport::summary`].
const SUMMARY_PREVIEW_CHARS: usize = 100;

/// Parameters of one investigation.
#[derive(Debug, Clone)]
pub struct Investigation {
    pub error: String,
    pub file_path: Option<String>,
    pub domain: Option<Domain>,
    pub project: String,
    pub directive_analysis: bool,
}

impl Investigation {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            file_path: None,
            domain: None,
            project: String::new(),
            directive_analysis: false,
        }
    }

    pub fn file_path(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = Some(file_path.into());
        self
    }

    pub fn domain(mut self, domain: Option<Domain>) -> Self {
        self.domain = domain;
        self
    }

    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    pub fn with_directive_analysis(mut self) -> Self {
        self.directive_analysis = true;
        self
    }

    fn phase(&self, text: &str, mode: SearchMode, (top_k, threshold): (usize, f64)) -> Query {
        Query::new(text)
            .mode(mode)
            .domain(self.domain)
            .project(self.project.clone())
            .top_k(top_k)
            .threshold(threshold)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Unknown,
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CostEstimate {
    /// Mean of the `cost` metadata values.
    pub predicted: f64,
    pub samples: usize,
}

/// Outcome of the optional directive phase.
#[derive(Debug, Clone, Serialize)]
pub struct DirectiveAnalysis {
    pub similar_directives: Vec<ScoredChunk>,
    pub risk: RiskLevel,
    pub cost_estimate: Option<CostEstimate>,
}

impl DirectiveAnalysis {
    /// Derive risk from the share of failed outcomes and cost from numeric `cost` metadata.
    pub fn from_matches(similar_directives: Vec<ScoredChunk>) -> Self {
        let total = similar_directives.len();
        let failures = similar_directives
            .iter()
            .filter(|hit| {
                matches!(
                    hit.chunk.metadata.get("outcome").and_then(|v| v.as_str()),
                    Some("failure") | Some("failed")
                )
            })
            .count();

        let risk = if total == 0 {
            RiskLevel::Unknown
        } else {
            let share = failures as f64 / total as f64;
            if share >= 0.5 {
                RiskLevel::High
            } else if share > 0.0 {
                RiskLevel::Medium
            } else {
                RiskLevel::Low
            }
        };

        let costs: Vec<f64> = similar_directives
            .iter()
            .filter_map(|hit| hit.chunk.metadata.get("cost").and_then(|v| v.as_f64()))
            .collect();
        let cost_estimate = (!costs.is_empty()).then(|| CostEstimate {
            predicted: costs.iter().sum::<f64>() / costs.len() as f64,
            samples: costs.len(),
        });

        Self { similar_directives, risk, cost_estimate }
    }
}

/// Structured investigation result, shaped like the server's debug response.
#[derive(Debug, Clone, Serialize)]
pub struct DebugReport {
    pub error: String,
    pub file_path: Option<String>,
    pub domain: Option<Domain>,
    pub past_errors: Vec<ScoredChunk>,
    pub related_tasks: Vec<ScoredChunk>,
    pub recent_code_changes: Vec<ScoredChunk>,
    pub directive_analysis: Option<DirectiveAnalysis>,
    pub has_proven_fix: bool,
    pub proven_fix: Option<ScoredChunk>,
}

impl DebugReport {
    pub fn risk_level(&self) -> Option<RiskLevel> {
        self.directive_analysis.as_ref().map(|a| a.risk)
    }

    /// Phase counts, then the proven fix (or its absence), then risk when analysed.
    pub fn summary(&self) -> String {
        let mut lines = vec![
            format!("Past errors: {}", self.past_errors.len()),
            format!("Related tasks: {}", self.related_tasks.len()),
            format!("Code changes: {}", self.recent_code_changes.len()),
        ];
        match &self.proven_fix {
            Some(fix) => {
                let preview: String = fix.chunk.content.chars().take(SUMMARY_PREVIEW_CHARS).collect();
                lines.push(format!("Proven fix: {preview}..."));
            }
            None => lines.push("No proven fix found".to_string()),
        }
        if let Some(risk) = self.risk_level() {
            lines.push(format!("Risk: {risk}"));
        }
        lines.join("\n")
    }
}

/// First result, in ranked order, whose raw similarity reaches [`PROVEN_FIX_THRESHOLD`].
pub fn find_proven_fix(past_errors: &[ScoredChunk]) -> Option<&ScoredChunk> {
    past_errors
        .iter()
        .find(|hit| hit.raw_similarity >= PROVEN_FIX_THRESHOLD)
}

pub struct DebugInvestigator {
    search: KnowledgeSearch,
}

impl DebugInvestigator {
    pub fn new(search: KnowledgeSearch) -> Self {
        Self { search }
    }

    pub fn search(&self) -> &KnowledgeSearch {
        &self.search
    }

    pub fn investigate(&self, investigation: &Investigation) -> Result<DebugReport> {
        let error = investigation.error.as_str();

        let past_errors = self
            .search
            .query(&investigation.phase(error, SearchMode::Errors, PAST_ERRORS))?
            .results;
        let related_tasks = self
            .search
            .query(&investigation.phase(error, SearchMode::Tasks, RELATED_TASKS))?
            .results;

        let code_text = match &investigation.file_path {
            Some(path) => format!("{error} {path}"),
            None => error.to_string(),
        };
        let recent_code_changes = self
            .search
            .query(&investigation.phase(&code_text, SearchMode::Code, CODE_CHANGES))?
            .results;

        let directive_analysis = if investigation.directive_analysis {
            let similar = self
                .search
                .query(&investigation.phase(error, SearchMode::Directives, DIRECTIVES))?
                .results;
            Some(DirectiveAnalysis::from_matches(similar))
        } else {
            None
        };

        let proven_fix = find_proven_fix(&past_errors).cloned();

        tracing::info!(
            past_errors = past_errors.len(),
            related_tasks = related_tasks.len(),
            code_changes = recent_code_changes.len(),
            proven_fix = proven_fix.is_some(),
            "investigation complete"
        );

        Ok(DebugReport {
            error: investigation.error.clone(),
            file_path: investigation.file_path.clone(),
            domain: investigation.domain,
            past_errors,
            related_tasks,
            recent_code_changes,
            directive_analysis,
            has_proven_fix: proven_fix.is_some(),
            proven_fix,
        })
    }

    /// Whether any past resolution reaches the proven-fix threshold.
    pub fn quick_check(&self, error: &str) -> Result<bool> {
        let response = self.search.query(
            &Query::new(error)
                .mode(SearchMode::Errors)
                .top_k(1)
                .threshold(PROVEN_FIX_THRESHOLD),
        )?;
        Ok(response.has_results())
    }

    pub fn close(&self) -> Result<()> {
        self.search.close()
    }
}
