use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;
use tally_core::{Bank, Money, Transaction};
use tracing::debug;

use crate::dispatch::StatementParser;
use crate::error::ImportError;
use crate::util::decode_windows_1251;

/// Decodes an OFX file, honouring a `CHARSET:1251` header; anything else is read as UTF-8.
pub fn decode(data: &[u8]) -> String {
    let header_end = data
        .windows(5)
        .position(|w| w.eq_ignore_ascii_case(b"<OFX>"))
        .unwrap_or(data.len());
    let header = String::from_utf8_lossy(&data[..header_end]).to_uppercase();
    if header.contains("CHARSET:1251") || header.contains("WINDOWS-1251") {
        decode_windows_1251(data)
    } else {
        String::from_utf8_lossy(data).into_owned()
    }
}

/// Splits the document into `(TAG, value)` pairs. Works for both the SGML flavour
/// (unclosed leaf elements, one per line) and the XML flavour.
fn tokens(data: &str) -> impl Iterator<Item = (String, Option<String>)> + '_ {
    data.split('<').skip(1).filter_map(|chunk| {
        let (tag, value) = chunk.split_once('>')?;
        let value = value.trim();
        Some((
            tag.trim().to_uppercase(),
            (!value.is_empty()).then(|| unescape(value)),
        ))
    })
}

/// Resolves the predefined XML entities. `&amp;` goes last so `&amp;lt;` stays `&lt;`.
fn unescape(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[derive(Default)]
struct BuildingTrx {
    date: Option<String>,
    amount: Option<String>,
    name: Option<String>,
    memo: Option<String>,
    currency: Option<String>,
}

/// Tinkoff OFX export. Only `BANKMSGSRSV1 → … → BANKTRANLIST → STMTTRN` nodes are read.
pub struct TinkoffOfx;

impl TinkoffOfx {
    fn finish(
        index: usize,
        trx: BuildingTrx,
        default_currency: Option<&str>,
    ) -> Result<Transaction, ImportError> {
        let raw_date = trx
            .date
            .ok_or_else(|| ImportError::malformed(index, "missing DTPOSTED"))?;
        let date = parse_ofx_datetime(&raw_date)
            .ok_or_else(|| ImportError::malformed(index, format!("invalid DTPOSTED '{raw_date}'")))?;

        let raw_amount = trx
            .amount
            .ok_or_else(|| ImportError::malformed(index, "missing TRNAMT"))?;
        let amount = parse_ofx_amount(&raw_amount)
            .ok_or_else(|| ImportError::malformed(index, format!("invalid TRNAMT '{raw_amount}'")))?;

        let currency = trx
            .currency
            .as_deref()
            .or(default_currency)
            .ok_or_else(|| ImportError::malformed(index, "missing CURSYM and CURDEF"))?;

        Ok(Transaction::new(
            date.naive_local(),
            amount,
            currency,
            trx.name.unwrap_or_default(),
            trx.memo.unwrap_or_default(),
            Bank::Tinkoff,
        ))
    }
}

impl StatementParser for TinkoffOfx {
    fn bank(&self) -> Bank {
        Bank::Tinkoff
    }

    fn name(&self) -> &'static str {
        "Tinkoff OFX"
    }

    fn detect(&self, text: &str) -> bool {
        text.to_uppercase().contains("<OFX>")
    }

    fn parse(&self, text: &str) -> Result<Vec<Transaction>, ImportError> {
        let mut transactions = Vec::new();
        let mut default_currency: Option<String> = None;

        let mut in_bank_msgs = false;
        let mut in_tran_list = false;
        let mut saw_tran_list = false;
        let mut in_currency = false;
        let mut index = 0usize;
        let mut current_trx: Option<BuildingTrx> = None;

        for (tag, value) in tokens(text) {
            match tag.as_str() {
                "BANKMSGSRSV1" => in_bank_msgs = true,
                "/BANKMSGSRSV1" => in_bank_msgs = false,
                "BANKTRANLIST" if in_bank_msgs => {
                    in_tran_list = true;
                    saw_tran_list = true;
                }
                "/BANKTRANLIST" => in_tran_list = false,
                "CURDEF" if in_bank_msgs => default_currency = value,
                "STMTTRN" if in_tran_list => {
                    index += 1;
                    current_trx = Some(BuildingTrx::default());
                }
                "/STMTTRN" => {
                    if let Some(trx) = current_trx.take() {
                        transactions.push(Self::finish(index, trx, default_currency.as_deref())?);
                    }
                    in_currency = false;
                }
                _ => {
                    if let Some(ref mut trx) = current_trx {
                        match tag.as_str() {
                            "CURRENCY" => in_currency = true,
                            "/CURRENCY" => in_currency = false,
                            "CURSYM" if in_currency => trx.currency = value,
                            "DTPOSTED" => trx.date = value,
                            "TRNAMT" => trx.amount = value,
                            "NAME" => trx.name = value,
                            "MEMO" => trx.memo = value,
                            _ => {}
                        }
                    }
                }
            }
        }

        if !saw_tran_list {
            return Err(ImportError::MissingField("BANKTRANLIST".to_string()));
        }

        debug!(count = transactions.len(), "ofx transactions parsed");
        Ok(transactions)
    }
}

/// Parses `YYYYMMDD[HHMMSS[.XXX]][[offset:TZ]]`, e.g. `20220108131638.000[+3:MSK]`.
/// The bracketed suffix is the statement's UTC offset in hours; without one, UTC.
pub fn parse_ofx_datetime(s: &str) -> Option<DateTime<FixedOffset>> {
    let s = s.trim();
    let (stamp, zone) = match s.split_once('[') {
        Some((stamp, zone)) => (stamp, Some(zone.strip_suffix(']')?)),
        None => (s, None),
    };

    let (whole, fraction) = match stamp.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (stamp, None),
    };

    let naive = match whole.len() {
        8 => NaiveDate::parse_from_str(whole, "%Y%m%d")
            .ok()?
            .and_time(chrono::NaiveTime::MIN),
        12 => NaiveDateTime::parse_from_str(whole, "%Y%m%d%H%M").ok()?,
        14 => NaiveDateTime::parse_from_str(whole, "%Y%m%d%H%M%S").ok()?,
        _ => return None,
    };

    let naive = match fraction {
        Some(f) if !f.is_empty() && f.chars().all(|c| c.is_ascii_digit()) => {
            let millis: i64 = format!("{f:0<3}")[..3].parse().ok()?;
            naive.checked_add_signed(Duration::try_milliseconds(millis)?)?
        }
        Some(_) => return None,
        None => naive,
    };

    let offset_seconds = match zone {
        Some(zone) => {
            let hours = zone.split(':').next()?.trim();
            let hours = Decimal::from_str(hours.strip_prefix('+').unwrap_or(hours)).ok()?;
            (hours * Decimal::from(3600)).round().to_i32()?
        }
        None => 0,
    };
    let offset = FixedOffset::east_opt(offset_seconds)?;
    offset.from_local_datetime(&naive).single()
}

/// Whole currency units; any fractional part is dropped.
fn parse_ofx_amount(s: &str) -> Option<Money> {
    let s = s.trim().replace(',', ".");
    let dec = Decimal::from_str(s.strip_prefix('+').unwrap_or(&s)).ok()?;
    Some(Money::from_decimal(dec).truncate_to_units())
}
