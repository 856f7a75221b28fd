use anyhow::Result;

use nexus_knowledge::config::KnowledgeConfig;
use nexus_knowledge::knowledge::{DebugInvestigator, Domain, Investigation};

pub struct DebugOptions {
    pub file: Option<String>,
    pub domain: Option<Domain>,
    pub project: String,
    pub directives: bool,
    pub json: bool,
}

/// Run a full investigation and print the report.
pub fn debug(config: &KnowledgeConfig, error: &str, options: &DebugOptions) -> Result<()> {
    let investigator = DebugInvestigator::new(super::open_search(config)?);

    let mut investigation = Investigation::new(error)
        .domain(options.domain)
        .project(options.project.clone());
    if let Some(file) = &options.file {
        investigation = investigation.file_path(file.clone());
    }
    if options.directives {
        investigation = investigation.with_directive_analysis();
    }

    let report = investigator.investigate(&investigation)?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", report.summary());

    if let Some(analysis) = &report.directive_analysis {
        if let Some(cost) = &analysis.cost_estimate {
            println!("Estimated cost: {:.2} (from {} directives)", cost.predicted, cost.samples);
        }
    }

    if !report.past_errors.is_empty() {
        println!("\nPast errors:");
        for hit in &report.past_errors {
            println!(
                "  [{:.2}] {} {}",
                hit.raw_similarity,
                hit.chunk.source_id,
                super::preview(&hit.chunk.content, 80)
            );
        }
    }

    Ok(())
}

/// Quick proven-fix probe. Returns whether a fix exists.
pub fn check(config: &KnowledgeConfig, error: &str) -> Result<bool> {
    let investigator = DebugInvestigator::new(super::open_search(config)?);
    let found = investigator.quick_check(error)?;
    if found {
        println!("Proven fix available. Run `nexus-kb debug` for details.");
    } else {
        println!("No proven fix found.");
    }
    Ok(found)
}
