//! Parsers over the linear text extracted from paginated statements.
//!
//! The text is a best-effort scrape, so blocks that do not match the record layout
//! are skipped rather than failing the whole document.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use tally_core::{Bank, Money, Transaction, UNDETERMINED_CATEGORY};
use tracing::debug;

use crate::dispatch::StatementParser;
use crate::error::ImportError;
use crate::util::{normalize_newlines, parse_comma_decimal, parse_dotted_decimal};

re!(re_sber_record,
    r"(\d{2}\.\d{2}\.\d{4})[ \t]?(\d{2}:\d{2})\n(?:\d{2}\.\d{2}\.\d{4}\n)?(.+)\n(.+\n)?(.+\n)?([+-]?[0-9 \x{a0}]+,[0-9]{2})");

re!(re_rs_opening_balance,
    r"Prethodno stanje:\s*([0-9.]+,[0-9]{2})");
re!(re_rs_record_start,
    r"\d{2}\.\d{2}\.\d{4}\d{2}\.\d{2}\.\d{4}");
re!(re_rs_record,
    r"(?s)^(\d{2}\.\d{2}\.\d{4})\d{2}\.\d{2}\.\d{4}([0-9.]+,[0-9]{2})([0-9.]+,[0-9]{2})(.+)$");

fn join_lines(s: &str) -> String {
    s.split('\n')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

// ── Sberbank ──────────────────────────────────────────────────────────────────

/// Sberbank card statement. Each record block reads:
///
/// ```text
/// 08.01.202213:16
/// 08.01.2022            <- optional processing date
/// Супермаркеты          <- category
/// PYATEROCHKA 1234      <- one or two description lines
/// Операция по карте ****1234
/// 500,00                <- `+` marks a credit, anything else is a debit
/// ```
pub struct SberbankStatement;

impl SberbankStatement {
    fn record(caps: &regex::Captures<'_>) -> Option<Transaction> {
        let date = NaiveDateTime::parse_from_str(
            &format!("{} {}", &caps[1], &caps[2]),
            "%d.%m.%Y %H:%M",
        )
        .ok()?;

        let raw_amount = &caps[6];
        let magnitude = parse_comma_decimal(raw_amount.trim_start_matches(['+', '-']))?;
        let amount = if raw_amount.starts_with('+') {
            magnitude
        } else {
            -magnitude
        };

        let name = [caps.get(4), caps.get(5)]
            .into_iter()
            .flatten()
            .map(|m| m.as_str().trim())
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string();

        Some(Transaction::new(
            date,
            Money::from_decimal(amount),
            "RUB",
            name,
            caps[3].trim(),
            Bank::Sberbank,
        ))
    }
}

impl StatementParser for SberbankStatement {
    fn bank(&self) -> Bank {
        Bank::Sberbank
    }

    fn name(&self) -> &'static str {
        "Sberbank statement"
    }

    fn detect(&self, text: &str) -> bool {
        re_sber_record().is_match(&normalize_newlines(text))
    }

    fn parse(&self, text: &str) -> Result<Vec<Transaction>, ImportError> {
        let text = normalize_newlines(text);
        let transactions: Vec<Transaction> = re_sber_record()
            .captures_iter(&text)
            .filter_map(|caps| Self::record(&caps))
            .collect();
        debug!(count = transactions.len(), "sberbank records parsed");
        Ok(transactions)
    }
}

// ── Raiffeisen (Serbia) ───────────────────────────────────────────────────────

/// One record as printed, before its sign is known.
#[derive(Debug, Clone, PartialEq)]
struct BalanceRecord {
    date: NaiveDate,
    amount: Decimal,
    balance_after: Decimal,
    description: String,
}

/// Running sign inference state threaded through the fold.
struct SignState {
    previous_balance: Decimal,
    transactions: Vec<Transaction>,
}

/// Raiffeisen (RS) account statement. Records carry an unsigned amount and the
/// balance after posting; the sign comes from how the balance moved. Records are
/// printed newest first.
pub struct RaiffeisenStatement;

impl RaiffeisenStatement {
    fn opening_balance(text: &str) -> Option<Decimal> {
        let caps = re_rs_opening_balance().captures(text)?;
        parse_dotted_decimal(&caps[1])
    }

    /// Splits the text at every record start; each block runs to the next start.
    fn blocks(text: &str) -> Vec<&str> {
        let starts: Vec<usize> = re_rs_record_start()
            .find_iter(text)
            .map(|m| m.start())
            .collect();
        starts
            .iter()
            .enumerate()
            .map(|(i, &start)| {
                let end = starts.get(i + 1).copied().unwrap_or(text.len());
                &text[start..end]
            })
            .collect()
    }

    fn record(block: &str) -> Option<BalanceRecord> {
        let caps = re_rs_record().captures(block)?;
        let description = join_lines(&caps[4]);
        if description.is_empty() {
            return None;
        }
        Some(BalanceRecord {
            date: NaiveDate::parse_from_str(&caps[1], "%d.%m.%Y").ok()?,
            amount: parse_dotted_decimal(&caps[2])?,
            balance_after: parse_dotted_decimal(&caps[3])?,
            description,
        })
    }

    /// Walks records oldest first; a balance drop makes the record a debit.
    fn infer_signs(opening_balance: Decimal, newest_first: Vec<BalanceRecord>) -> Vec<Transaction> {
        let initial = SignState {
            previous_balance: opening_balance,
            transactions: Vec::with_capacity(newest_first.len()),
        };

        let state = newest_first.into_iter().rev().fold(initial, |state, record| {
            let amount = if record.balance_after < state.previous_balance {
                -record.amount
            } else {
                record.amount
            };
            let mut transactions = state.transactions;
            transactions.push(Transaction::new(
                record.date.and_time(chrono::NaiveTime::MIN),
                Money::from_decimal(amount),
                "RSD",
                record.description,
                UNDETERMINED_CATEGORY,
                Bank::Raiffeisen,
            ));
            SignState {
                previous_balance: record.balance_after,
                transactions,
            }
        });

        state.transactions
    }
}

impl StatementParser for RaiffeisenStatement {
    fn bank(&self) -> Bank {
        Bank::Raiffeisen
    }

    fn name(&self) -> &'static str {
        "Raiffeisen statement"
    }

    fn detect(&self, text: &str) -> bool {
        re_rs_opening_balance().is_match(text)
    }

    fn parse(&self, text: &str) -> Result<Vec<Transaction>, ImportError> {
        let text = normalize_newlines(text);
        let opening = Self::opening_balance(&text)
            .ok_or_else(|| ImportError::MissingField("Prethodno stanje".to_string()))?;

        let blocks = Self::blocks(&text);
        let records: Vec<BalanceRecord> = blocks.iter().filter_map(|b| Self::record(b)).collect();
        if records.len() < blocks.len() {
            debug!(
                skipped = blocks.len() - records.len(),
                "raiffeisen blocks did not match the record layout"
            );
        }

        Ok(Self::infer_signs(opening, records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn money(s: &str) -> Money {
        Money::from_decimal(Decimal::from_str(s).unwrap())
    }

    const SBER: &str = "\
ПАО Сбербанк
Выписка по счёту дебетовой карты
08.01.202213:16
08.01.2022
Супермаркеты
PYATEROCHKA 1234 Moscow RUS
Операция по карте ****1234
1 250,40
09.01.202209:05
09.01.2022
Перевод на карту
SBOL перевод 4276****5678 И. ИВАН ИВАНОВИЧ
+10 000,00
10.01.202200:00
мусорная строка без суммы
";

    #[test]
    fn sber_parses_records() {
        let txs = SberbankStatement.parse(SBER).unwrap();
        assert_eq!(txs.len(), 2);

        assert_eq!(txs[0].date.to_string(), "2022-01-08 13:16:00");
        assert_eq!(txs[0].category, "Супермаркеты");
        assert_eq!(txs[0].name, "PYATEROCHKA 1234 Moscow RUS Операция по карте ****1234");
        assert_eq!(txs[0].amount, money("-1250.40"));
        assert_eq!(txs[0].currency, "RUB");
        assert_eq!(txs[0].bank, Bank::Sberbank);
    }

    #[test]
    fn sber_plus_sign_marks_credit() {
        let txs = SberbankStatement.parse(SBER).unwrap();
        assert_eq!(txs[1].amount, money("10000"));
        assert_eq!(txs[1].name, "SBOL перевод 4276****5678 И. ИВАН ИВАНОВИЧ");
        assert_eq!(txs[1].category, "Перевод на карту");
    }

    #[test]
    fn sber_second_date_line_is_optional() {
        let text = "15.02.202218:30\nКафе\nCOFFEE HOUSE\n350,00\n";
        let txs = SberbankStatement.parse(text).unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].category, "Кафе");
        assert_eq!(txs[0].name, "COFFEE HOUSE");
        assert_eq!(txs[0].amount, money("-350"));
        assert_eq!(txs[0].date_key().to_string(), "2022-02");
    }

    #[test]
    fn sber_explicit_minus_is_a_debit() {
        let text = "08.01.202213:16\n08.01.2022\nСупермаркеты\nPYATEROCHKA\n-1 250,40\n";
        let txs = SberbankStatement.parse(text).unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].name, "PYATEROCHKA");
        assert_eq!(txs[0].amount, money("-1250.40"));
    }

    #[test]
    fn sber_handles_crlf_text() {
        let txs = SberbankStatement.parse(&SBER.replace('\n', "\r\n")).unwrap();
        assert_eq!(txs.len(), 2);
    }

    #[test]
    fn sber_detect() {
        assert!(SberbankStatement.detect(SBER));
        assert!(!SberbankStatement.detect("nothing to see"));
    }

    #[test]
    fn sber_unmatched_text_yields_nothing() {
        assert!(SberbankStatement.parse("garbage\n\n").unwrap().is_empty());
    }

    // Newest first, as the bank prints it.
    const RAIFFEISEN: &str = "\
Raiffeisen banka a.d. Beograd
Izvod br. 3
Prethodno stanje: 1.000,00
15.01.202215.01.202250,001.150,00
Kupovina MAXI
Beograd
10.01.202210.01.2022200,001.200,00
Uplata zarade
";

    #[test]
    fn raiffeisen_infers_sign_from_balance() {
        let txs = RaiffeisenStatement.parse(RAIFFEISEN).unwrap();
        assert_eq!(txs.len(), 2);

        // Oldest first after processing.
        assert_eq!(txs[0].name, "Uplata zarade");
        assert_eq!(txs[0].amount, money("200.00"));
        assert_eq!(txs[1].name, "Kupovina MAXI Beograd");
        assert_eq!(txs[1].amount, money("-50.00"));
    }

    #[test]
    fn raiffeisen_fields() {
        let txs = RaiffeisenStatement.parse(RAIFFEISEN).unwrap();
        assert_eq!(txs[0].currency, "RSD");
        assert_eq!(txs[0].category, UNDETERMINED_CATEGORY);
        assert_eq!(txs[0].bank, Bank::Raiffeisen);
        assert_eq!(txs[0].date.to_string(), "2022-01-10 00:00:00");
        assert_eq!(txs[1].date_key().to_string(), "2022-01");
    }

    #[test]
    fn raiffeisen_thousands_in_amounts() {
        let text = "\
Prethodno stanje: 10.000,00
02.03.202202.03.20221.500,508.499,50
Placanje racuna
";
        let txs = RaiffeisenStatement.parse(text).unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].amount, money("-1500.50"));
    }

    #[test]
    fn raiffeisen_skips_malformed_blocks() {
        let text = "\
Prethodno stanje: 100,00
05.01.202205.01.2022bez iznosa
04.01.202204.01.202210,00110,00
Uplata
";
        let txs = RaiffeisenStatement.parse(text).unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].amount, money("10"));
    }

    #[test]
    fn raiffeisen_requires_opening_balance() {
        let text = "10.01.202210.01.2022200,001.200,00\nUplata\n";
        assert!(matches!(
            RaiffeisenStatement.parse(text),
            Err(ImportError::MissingField(_))
        ));
        assert!(!RaiffeisenStatement.detect(text));
    }

    #[test]
    fn raiffeisen_detects_preamble() {
        assert!(RaiffeisenStatement.detect(RAIFFEISEN));
        assert!(!RaiffeisenStatement.detect(SBER));
    }
}
