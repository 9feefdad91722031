use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tally_core::Bank;
use tally_import::Importer;
use tally_ledger::{
    merge, remove_reversals, split_by_sign, Aggregator, PassThrough, PivotTable, ReversalOutcome,
    ReversalPair, ReversalPolicy,
};
use tally_storage::HistoryFile;
use tokio::task::JoinSet;

#[derive(Debug, Clone)]
pub struct Options {
    pub history_path: PathBuf,
    pub output_currency: String,
    pub policy: ReversalPolicy,
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    pub path: PathBuf,
    pub bank: Bank,
    pub imported: usize,
    pub kept: usize,
    pub removed_pairs: Vec<ReversalPair>,
}

#[derive(Debug, Serialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub files: Vec<FileReport>,
    pub failures: Vec<FileFailure>,
    pub added: usize,
    pub skipped: usize,
    pub history_size: usize,
    pub currency_mismatches: usize,
    pub income: PivotTable,
    pub expenses: PivotTable,
}

struct Batch {
    bank: Bank,
    imported: usize,
    outcome: ReversalOutcome,
}

/// Imports and de-reverses every file concurrently. Results come back in argument order.
async fn import_batches(
    importer: Arc<Importer>,
    paths: &[PathBuf],
    policy: ReversalPolicy,
) -> Vec<(PathBuf, Result<Batch, String>)> {
    let mut slots: Vec<(PathBuf, Result<Batch, String>)> = paths
        .iter()
        .map(|p| (p.clone(), Err("import task did not complete".to_string())))
        .collect();

    let mut set = JoinSet::new();
    for (idx, path) in paths.iter().cloned().enumerate() {
        let importer = Arc::clone(&importer);
        set.spawn(async move {
            let result = importer.import_file(&path).await.map(|statement| Batch {
                bank: statement.bank,
                imported: statement.transactions.len(),
                outcome: remove_reversals(statement.transactions, policy),
            });
            (idx, result.map_err(|e| e.to_string()))
        });
    }

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((idx, result)) => slots[idx].1 = result,
            Err(e) => tracing::error!("Import task panicked: {e}"),
        }
    }
    slots
}

pub async fn run(importer: Importer, paths: &[PathBuf], options: &Options) -> Result<Report> {
    let results = import_batches(Arc::new(importer), paths, options.policy).await;

    let mut files = Vec::new();
    let mut failures = Vec::new();
    let mut batches = Vec::new();
    for (path, result) in results {
        match result {
            Ok(batch) => {
                tracing::info!(
                    "{}: {} kept, {} reversal pairs removed",
                    path.display(),
                    batch.outcome.kept.len(),
                    batch.outcome.removed_pairs.len()
                );
                files.push(FileReport {
                    path,
                    bank: batch.bank,
                    imported: batch.imported,
                    kept: batch.outcome.kept.len(),
                    removed_pairs: batch.outcome.removed_pairs,
                });
                batches.push(batch.outcome.kept);
            }
            Err(error) => {
                tracing::warn!("{}: {error}", path.display());
                failures.push(FileFailure { path, error });
            }
        }
    }

    let history_file = HistoryFile::new(&options.history_path);
    let mut history = history_file.load().await?;
    let mut added = 0;
    let mut skipped = 0;
    for batch in batches {
        let outcome = merge(history, batch).context("history merge aborted")?;
        history = outcome.history;
        added += outcome.added;
        skipped += outcome.skipped;
    }

    if options.dry_run {
        tracing::info!("Dry run, history not saved");
    } else {
        history_file.save(&history).await?;
    }

    let aggregator = Aggregator::new(PassThrough::new(&options.output_currency));
    let (income, expenses) = split_by_sign(&history);
    let income = aggregator.pivot(&income);
    let expenses = aggregator.pivot(&expenses);

    Ok(Report {
        files,
        failures,
        added,
        skipped,
        history_size: history.len(),
        currency_mismatches: aggregator.converter().mismatches(),
        income,
        expenses,
    })
}
