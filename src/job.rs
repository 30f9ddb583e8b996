//! End-to-end linking of an input table to a destination table.
//!
//! The steps, on a fresh [`AliasStore`]:
//!
//! 1. bind the input rows to entities
//! 2. reconcile input entities against destination alias groups that
//!    share no alias with them
//! 3. bind the destination rows, which now find the reconciled entities
//! 4. re-key the input by entity and label each row with the destination
//!    label its entity owns
//!
//! Input rows whose entity has no destination label are reported as
//! unplaced rather than failing the run.

use std::fs::File;
use std::io::{BufWriter, Write};

use serde::Serialize;

use crate::config::LinkConfig;
use crate::csv_io::{read_table_path, write_table_path};
use crate::entity::{looks_like_person_name, AliasStore, EntityId, MutualAlias};
use crate::error::{LinkError, LinkResult};
use crate::reconcile::{reconcile, Matcher, ReconcileReport};
use crate::table::{
    candidate_values, derive_entity_column, reindex_by_entity, BindingOptions, Table,
};

/// Result of a linking run.
#[derive(Debug, Clone, Serialize)]
pub struct LinkOutcome {
    /// Reconciliation of unmatched entities.
    pub reconciliation: ReconcileReport,
    /// Labels of input entities with no destination label.
    pub unplaced: Vec<String>,
    /// Input entities owning more than one destination label.
    pub ambiguous: Vec<EntityId>,
    /// Rows in the output table.
    pub rows_written: usize,
    /// The input re-keyed by entity, with the label column appended.
    #[serde(skip)]
    pub output: Table<EntityId>,
    /// Every alias learned during the run.
    #[serde(skip)]
    pub store: AliasStore,
}

/// Links two in-memory tables as described by `config`.
///
/// Paths in `config` are not touched.
///
/// # Errors
/// Any table binding or reconciliation failure. Two input rows resolving to
/// one entity fail with `DuplicateEntityKey`.
pub fn link_tables<M: Matcher + ?Sized>(
    config: &LinkConfig,
    input: Table,
    destination: &Table,
    matcher: &mut M,
) -> LinkResult<LinkOutcome> {
    let mut store = AliasStore::new();
    let input_refs = config.input.candidate_refs();
    let destination_refs = config.destination.candidate_refs();

    let input_ids = derive_entity_column(&mut store, &input, &input_refs, config.input.binding)?;
    let groups = candidate_values(destination, &destination_refs)?;
    let reconciliation = reconcile(&mut store, matcher, input_ids.iter().copied(), &groups)?;

    derive_entity_column(
        &mut store,
        destination,
        &destination_refs,
        config.destination.binding,
    )?;

    let vocabulary: Vec<String> = candidate_values(destination, &[config.label_ref()?])?
        .into_iter()
        .flatten()
        .collect();

    // Every input value is known by now.
    let known = BindingOptions {
        expect_new: false,
        collect_new: false,
    };
    let mut output = reindex_by_entity(&mut store, input, &input_refs, known)?;

    let mut labels = Vec::with_capacity(output.len());
    let mut unplaced = Vec::new();
    let mut ambiguous = Vec::new();
    for &id in output.keys() {
        match store.mutual_alias(&vocabulary, id)? {
            MutualAlias::One(label) => labels.push(label),
            MutualAlias::None => {
                unplaced.push(store.best_effort_alias(id, looks_like_person_name)?.to_string());
                labels.push(String::new());
            }
            MutualAlias::Many(found) => {
                tracing::warn!(
                    entity = %id,
                    labels = ?found,
                    "entity has several destination labels"
                );
                ambiguous.push(id);
                labels.push(String::new());
            }
        }
    }
    output.push_column(LinkConfig::LABEL_HEADER, labels)?;

    for label in &unplaced {
        tracing::warn!(%label, "no destination row for input entity");
    }
    tracing::info!(
        rows = output.len(),
        reconciled = reconciliation.applied.len(),
        unplaced = unplaced.len(),
        ambiguous = ambiguous.len(),
        "linked tables"
    );

    Ok(LinkOutcome {
        reconciliation,
        unplaced,
        ambiguous,
        rows_written: output.len(),
        output,
        store,
    })
}

/// Reads both tables, links them and writes the output and optional report.
///
/// # Errors
/// `Io` or `Csv` for file problems, otherwise see [`link_tables`]. No file
/// is written when linking fails.
pub fn run<M: Matcher + ?Sized>(config: &LinkConfig, matcher: &mut M) -> LinkResult<LinkOutcome> {
    let input = read_table_path(&config.input.path, config.input.key_column.as_deref())?;
    let destination = read_table_path(
        &config.destination.path,
        config.destination.key_column.as_deref(),
    )?;

    let outcome = link_tables(config, input, &destination, matcher)?;
    write_table_path(&config.output, &outcome.output)?;

    if let Some(path) = &config.report {
        let file = File::create(path).map_err(|e| LinkError::io(path, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &outcome)?;
        writer.flush().map_err(|e| LinkError::io(path, e))?;
    }
    Ok(outcome)
}
