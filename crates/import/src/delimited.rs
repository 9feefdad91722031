//! Semicolon-delimited bank exports (Windows-1251 decoded before they get here).

use chrono::{NaiveDate, NaiveDateTime};
use csv::StringRecord;
use rust_decimal::Decimal;
use tally_core::{Bank, Money, Transaction};
use tracing::debug;

use crate::dispatch::StatementParser;
use crate::error::ImportError;
use crate::rules::categorize;
use crate::util::parse_comma_decimal;

/// Reads every row, header included. Rows may differ in length.
fn read_rows(text: &str) -> Result<Vec<StringRecord>, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b';')
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for result in reader.records() {
        rows.push(result?);
    }
    Ok(rows)
}

fn first_cell(text: &str) -> Option<String> {
    let line = text.lines().next()?;
    let cell = line.split(';').next()?;
    Some(
        cell.trim_start_matches('\u{feff}')
            .trim()
            .trim_matches('"')
            .to_string(),
    )
}

/// Validates the header row and yields the data rows with their 1-based row numbers.
fn data_rows(
    text: &str,
    header_literal: &str,
) -> Result<impl Iterator<Item = (usize, StringRecord)>, ImportError> {
    let rows = read_rows(text)?;
    let header = rows
        .first()
        .and_then(|r| r.get(0))
        .map(|c| c.trim_start_matches('\u{feff}').trim().to_string());
    if header.as_deref() != Some(header_literal) {
        return Err(ImportError::malformed(
            1,
            format!("expected header starting with '{header_literal}'"),
        ));
    }
    Ok(rows
        .into_iter()
        .enumerate()
        .skip(1)
        .map(|(idx, record)| (idx + 1, record))
        .filter(|(_, record)| record.iter().any(|f| !f.trim().is_empty())))
}

fn field<'r>(record: &'r StringRecord, col: usize, row: usize) -> Result<&'r str, ImportError> {
    record
        .get(col)
        .map(str::trim)
        .ok_or_else(|| ImportError::malformed(row, format!("missing column {col}")))
}

fn amount_field(record: &StringRecord, col: usize, row: usize) -> Result<Decimal, ImportError> {
    let raw = field(record, col, row)?;
    if raw.is_empty() {
        return Ok(Decimal::ZERO);
    }
    parse_comma_decimal(raw)
        .ok_or_else(|| ImportError::malformed(row, format!("invalid amount '{raw}'")))
}

// ── Tinkoff ───────────────────────────────────────────────────────────────────

const TINKOFF_HEADER: &str = "Дата операции";
const TINKOFF_FAILED_STATUS: &str = "FAILED";

struct TinkoffColumns;

impl TinkoffColumns {
    const DATETIME: usize = 0;
    const STATUS: usize = 3;
    const AMOUNT: usize = 6;
    const CURRENCY: usize = 7;
    const CATEGORY: usize = 9;
    const DESCRIPTION: usize = 11;
}

/// Tinkoff card export: signed payment amount, own category column, declined
/// operations flagged in a status column.
pub struct TinkoffCsv;

impl StatementParser for TinkoffCsv {
    fn bank(&self) -> Bank {
        Bank::Tinkoff
    }

    fn name(&self) -> &'static str {
        "Tinkoff CSV"
    }

    fn detect(&self, text: &str) -> bool {
        first_cell(text).as_deref() == Some(TINKOFF_HEADER)
    }

    fn parse(&self, text: &str) -> Result<Vec<Transaction>, ImportError> {
        let mut transactions = Vec::new();

        for (row, record) in data_rows(text, TINKOFF_HEADER)? {
            if field(&record, TinkoffColumns::STATUS, row)? == TINKOFF_FAILED_STATUS {
                debug!(row, "skipping failed operation");
                continue;
            }

            let raw_date = field(&record, TinkoffColumns::DATETIME, row)?;
            let date = NaiveDateTime::parse_from_str(raw_date, "%d.%m.%Y %H:%M:%S")
                .map_err(|_| ImportError::malformed(row, format!("invalid date '{raw_date}'")))?;
            let amount = amount_field(&record, TinkoffColumns::AMOUNT, row)?;

            transactions.push(Transaction::new(
                date,
                Money::from_decimal(amount),
                field(&record, TinkoffColumns::CURRENCY, row)?,
                field(&record, TinkoffColumns::DESCRIPTION, row)?,
                field(&record, TinkoffColumns::CATEGORY, row)?,
                Bank::Tinkoff,
            ));
        }

        Ok(transactions)
    }
}

// ── Alfabank ──────────────────────────────────────────────────────────────────

const ALFABANK_HEADER: &str = "Тип счёта";

struct AlfabankColumns;

impl AlfabankColumns {
    const CURRENCY: usize = 2;
    const DATE: usize = 3;
    const NAME: usize = 5;
    const INCOME: usize = 6;
    const EXPENSE: usize = 7;
}

/// Alfabank account export: separate income and expense columns, no category,
/// dates without time.
pub struct AlfabankCsv;

impl StatementParser for AlfabankCsv {
    fn bank(&self) -> Bank {
        Bank::Alfabank
    }

    fn name(&self) -> &'static str {
        "Alfabank CSV"
    }

    fn detect(&self, text: &str) -> bool {
        first_cell(text).as_deref() == Some(ALFABANK_HEADER)
    }

    fn parse(&self, text: &str) -> Result<Vec<Transaction>, ImportError> {
        let mut transactions = Vec::new();

        for (row, record) in data_rows(text, ALFABANK_HEADER)? {
            let raw_date = field(&record, AlfabankColumns::DATE, row)?;
            let date = NaiveDate::parse_from_str(raw_date, "%d.%m.%y")
                .map_err(|_| ImportError::malformed(row, format!("invalid date '{raw_date}'")))?
                .and_time(chrono::NaiveTime::MIN);

            let income = amount_field(&record, AlfabankColumns::INCOME, row)?;
            let expense = amount_field(&record, AlfabankColumns::EXPENSE, row)?;
            let amount = if income.is_zero() { -expense } else { income };

            let categorized = categorize(field(&record, AlfabankColumns::NAME, row)?);

            transactions.push(Transaction::new(
                date,
                Money::from_decimal(amount),
                field(&record, AlfabankColumns::CURRENCY, row)?,
                categorized.name,
                categorized.category,
                Bank::Alfabank,
            ));
        }

        Ok(transactions)
    }
}
