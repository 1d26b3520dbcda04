//! Batch imports that bypass the job queue: CSV files and agent prompts.
//!
//! Both feed every record through the normalizer and the dedup-keyed
//! create-or-update, and both report per-record outcomes. One bad record
//! never stops the rest.

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{ItemError, PipelineError, Result};
use crate::normalize::{csv::parse_csv, normalize};
use crate::traits::extractor::Extractor;
use crate::traits::store::{RecordStore, SaveOutcome};
use crate::types::record::ExtractedRecord;

/// Per-record counts for an import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
    pub errors: Vec<ImportFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportFailure {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// File line for CSV imports (header is line 1)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
    pub error: String,
}

impl ImportSummary {
    fn record(&mut self, outcome: std::result::Result<SaveOutcome, ImportFailure>) {
        match outcome {
            Ok(SaveOutcome::Created(_)) => self.created += 1,
            Ok(SaveOutcome::Updated(_)) => self.updated += 1,
            Err(failure) => {
                self.failed += 1;
                self.errors.push(failure);
            }
        }
    }
}

async fn import_one<S>(
    store: &S,
    raw: &ExtractedRecord,
    source_urls: impl IntoIterator<Item = String>,
) -> std::result::Result<SaveOutcome, ItemError>
where
    S: RecordStore + ?Sized,
{
    let record = normalize(raw)?.with_source_urls(source_urls);
    Ok(store.save_program(&record).await?)
}

fn failure_message(e: &ItemError) -> String {
    match e {
        // Row failures read as the bare list of problems
        ItemError::Validation(errors) => errors.to_string(),
        other => other.to_string(),
    }
}

/// Import every data row of a CSV file.
///
/// Fails as a whole only if the text cannot be parsed or has no data row.
pub async fn import_csv<S>(store: &S, text: &str) -> Result<ImportSummary>
where
    S: RecordStore + ?Sized,
{
    let rows = parse_csv(text)?;
    let mut summary = ImportSummary {
        total: rows.len(),
        ..ImportSummary::default()
    };

    for row in rows {
        let name = row.record.display_name();
        let outcome = import_one(store, &row.record, std::iter::empty()).await;
        match &outcome {
            Ok(SaveOutcome::Created(_)) => info!(row = row.row, name = ?name, "Created program"),
            Ok(SaveOutcome::Updated(_)) => info!(row = row.row, name = ?name, "Updated program"),
            Err(e) => warn!(row = row.row, name = ?name, error = %e, "CSV row failed"),
        }
        summary.record(outcome.map_err(|e| ImportFailure {
            name,
            row: Some(row.row),
            error: failure_message(&e),
        }));
    }

    info!(
        total = summary.total,
        created = summary.created,
        updated = summary.updated,
        failed = summary.failed,
        "CSV import finished"
    );
    Ok(summary)
}

/// Run a free-form prompt through the extraction service and store every
/// record it returns, each carrying its cited source URLs.
///
/// A failure of the prompt call itself is returned as an error.
pub async fn run_agent_prompt<S, E>(
    store: &S,
    extractor: &E,
    prompt: &str,
    max_credits: Option<u32>,
) -> Result<ImportSummary>
where
    S: RecordStore + ?Sized,
    E: Extractor + ?Sized,
{
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(PipelineError::InvalidSubmission {
            reason: "prompt cannot be empty".to_string(),
        });
    }

    info!(extractor = extractor.name(), ?max_credits, "Running agent prompt");
    let records = extractor.extract_from_prompt(prompt, max_credits).await?;
    info!(count = records.len(), "Agent returned programs");

    let mut summary = ImportSummary {
        total: records.len(),
        ..ImportSummary::default()
    };

    for agent in records {
        let name = agent.record.display_name();
        let outcome = import_one(store, &agent.record, agent.source_urls).await;
        if let Err(e) = &outcome {
            warn!(name = ?name, error = %e, "Failed to save agent record");
        }
        summary.record(outcome.map_err(|e| ImportFailure {
            name,
            row: None,
            error: failure_message(&e),
        }));
    }

    info!(
        total = summary.total,
        created = summary.created,
        updated = summary.updated,
        failed = summary.failed,
        "Agent prompt run complete"
    );
    Ok(summary)
}
