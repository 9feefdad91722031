//! Category × name × month pivot tables.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;
use tally_core::{Money, MonthKey, Transaction};
use tracing::warn;

/// Hook applied to every transaction before it is summed.
pub trait CurrencyConverter {
    fn convert(&self, tx: &Transaction) -> Money;
}

/// Identity conversion. Transactions in any currency other than the output
/// currency are reported and counted, never rejected.
#[derive(Debug)]
pub struct PassThrough {
    output_currency: String,
    mismatches: AtomicUsize,
}

impl PassThrough {
    pub fn new(output_currency: &str) -> Self {
        Self {
            output_currency: tally_core::normalize_currency(output_currency),
            mismatches: AtomicUsize::new(0),
        }
    }

    pub fn output_currency(&self) -> &str {
        &self.output_currency
    }

    pub fn mismatches(&self) -> usize {
        self.mismatches.load(Ordering::Relaxed)
    }
}

impl CurrencyConverter for PassThrough {
    fn convert(&self, tx: &Transaction) -> Money {
        if tx.currency != self.output_currency {
            warn!(
                "{} {} on {} is not in {}; summed unconverted",
                tx.amount, tx.currency, tx.date, self.output_currency
            );
            self.mismatches.fetch_add(1, Ordering::Relaxed);
        }
        tx.amount
    }
}

/// Splits into `(income, expenses)`. Zero amounts belong to neither side.
pub fn split_by_sign(transactions: &[Transaction]) -> (Vec<Transaction>, Vec<Transaction>) {
    let income = transactions.iter().filter(|t| t.is_income()).cloned().collect();
    let expenses = transactions.iter().filter(|t| t.is_expense()).cloned().collect();
    (income, expenses)
}

type Months = BTreeMap<MonthKey, Money>;

/// `category → name → month → total`, each total rounded to whole units.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PivotTable {
    cells: BTreeMap<String, BTreeMap<String, Months>>,
}

impl PivotTable {
    pub fn get(&self, category: &str, name: &str, month: MonthKey) -> Option<Money> {
        self.cells.get(category)?.get(name)?.get(&month).copied()
    }

    pub fn category_total(&self, category: &str) -> Money {
        self.cells
            .get(category)
            .map(|names| names.values().flat_map(|m| m.values().copied()).sum())
            .unwrap_or_default()
    }

    pub fn grand_total(&self) -> Money {
        self.categories().map(|c| self.category_total(c)).sum()
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.cells.keys().map(String::as_str)
    }

    /// Every month with at least one cell, ascending.
    pub fn months(&self) -> BTreeSet<MonthKey> {
        self.cells
            .values()
            .flat_map(|names| names.values())
            .flat_map(|months| months.keys().copied())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

pub struct Aggregator<C> {
    converter: C,
}

impl<C: CurrencyConverter> Aggregator<C> {
    pub fn new(converter: C) -> Self {
        Self { converter }
    }

    pub fn converter(&self) -> &C {
        &self.converter
    }

    /// Sums converted amounts per cell, rounding each cell once after summation.
    pub fn pivot(&self, transactions: &[Transaction]) -> PivotTable {
        let mut cells: BTreeMap<String, BTreeMap<String, Months>> = BTreeMap::new();
        for tx in transactions {
            *cells
                .entry(tx.category.clone())
                .or_default()
                .entry(tx.name.clone())
                .or_default()
                .entry(tx.date_key())
                .or_default() += self.converter.convert(tx);
        }

        for month in cells
            .values_mut()
            .flat_map(|names| names.values_mut())
            .flat_map(|months| months.values_mut())
        {
            *month = month.round_to_units();
        }

        PivotTable { cells }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use tally_core::Bank;

    fn tx(month: u32, day: u32, category: &str, name: &str, amount: &str) -> Transaction {
        tx_in(month, day, category, name, amount, "RUB")
    }

    fn tx_in(
        month: u32,
        day: u32,
        category: &str,
        name: &str,
        amount: &str,
        currency: &str,
    ) -> Transaction {
        Transaction::new(
            NaiveDate::from_ymd_opt(2022, month, day)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            Money::from_decimal(Decimal::from_str(amount).unwrap()),
            currency,
            name,
            category,
            Bank::Tinkoff,
        )
    }

    fn month(m: u32) -> MonthKey {
        MonthKey::new(2022, m).unwrap()
    }

    #[test]
    fn pivot_groups_by_category_name_and_month() {
        let txs = vec![
            tx(1, 3, "Супермаркеты", "Пятёрочка", "-100"),
            tx(1, 20, "Супермаркеты", "Пятёрочка", "-50"),
            tx(2, 1, "Супермаркеты", "Пятёрочка", "-70"),
            tx(1, 5, "Супермаркеты", "Магнит", "-30"),
            tx(1, 7, "Транспорт", "Метро", "-60"),
        ];
        let pivot = Aggregator::new(PassThrough::new("RUB")).pivot(&txs);

        assert_eq!(pivot.get("Супермаркеты", "Пятёрочка", month(1)), Some(Money::from_units(-150)));
        assert_eq!(pivot.get("Супермаркеты", "Пятёрочка", month(2)), Some(Money::from_units(-70)));
        assert_eq!(pivot.get("Супермаркеты", "Магнит", month(1)), Some(Money::from_units(-30)));
        assert_eq!(pivot.get("Транспорт", "Метро", month(2)), None);
        assert_eq!(pivot.categories().collect::<Vec<_>>(), ["Супермаркеты", "Транспорт"]);
        assert_eq!(pivot.months().into_iter().collect::<Vec<_>>(), [month(1), month(2)]);
    }

    #[test]
    fn rounding_happens_after_summation() {
        // Rounded one by one these would give 2 and 0.
        let txs = vec![
            tx(3, 1, "Кафе", "Кофе", "0.50"),
            tx(3, 2, "Кафе", "Кофе", "0.50"),
            tx(3, 3, "Кафе", "Чай", "0.4"),
            tx(3, 4, "Кафе", "Чай", "0.4"),
        ];
        let pivot = Aggregator::new(PassThrough::new("RUB")).pivot(&txs);
        assert_eq!(pivot.get("Кафе", "Кофе", month(3)), Some(Money::from_units(1)));
        assert_eq!(pivot.get("Кафе", "Чай", month(3)), Some(Money::from_units(1)));
    }

    #[test]
    fn half_units_round_away_from_zero() {
        let txs = vec![tx(3, 1, "Кафе", "Кофе", "-2.5"), tx(3, 1, "Кафе", "Чай", "2.5")];
        let pivot = Aggregator::new(PassThrough::new("RUB")).pivot(&txs);
        assert_eq!(pivot.get("Кафе", "Кофе", month(3)), Some(Money::from_units(-3)));
        assert_eq!(pivot.get("Кафе", "Чай", month(3)), Some(Money::from_units(3)));
    }

    #[test]
    fn category_totals_conserve_input_sums() {
        let txs = vec![
            tx(1, 1, "Еда", "A", "-100"),
            tx(1, 2, "Еда", "B", "-250"),
            tx(2, 1, "Еда", "A", "-40"),
            tx(2, 2, "Дом", "C", "-1000"),
            tx(3, 2, "Дом", "C", "-500"),
        ];
        let pivot = Aggregator::new(PassThrough::new("RUB")).pivot(&txs);

        for category in ["Еда", "Дом"] {
            let expected: Money = txs
                .iter()
                .filter(|t| t.category == category)
                .map(|t| t.amount)
                .sum();
            assert_eq!(pivot.category_total(category), expected.round_to_units());
        }
        assert_eq!(pivot.grand_total(), Money::from_units(-1890));
        assert_eq!(pivot.category_total("Нет такой"), Money::zero());
    }

    #[test]
    fn split_by_sign_keeps_passes_disjoint() {
        let txs = vec![
            tx(1, 1, "Зарплата", "Работа", "1000"),
            tx(1, 2, "Еда", "A", "-100"),
            tx(1, 3, "Прочее", "Ноль", "0"),
        ];
        let (income, expenses) = split_by_sign(&txs);
        assert_eq!(income.len(), 1);
        assert_eq!(expenses.len(), 1);

        let aggregator = Aggregator::new(PassThrough::new("RUB"));
        assert_eq!(aggregator.pivot(&income).grand_total(), Money::from_units(1000));
        assert_eq!(aggregator.pivot(&expenses).grand_total(), Money::from_units(-100));
    }

    #[test]
    fn foreign_currency_is_counted_not_converted() {
        let txs = vec![
            tx(1, 1, "Игры", "Steam", "-20"),
            tx_in(1, 2, "Игры", "Steam", "-15", "USD"),
            tx_in(1, 3, "Игры", "Steam", "-5", "EUR"),
        ];
        let aggregator = Aggregator::new(PassThrough::new("rub"));
        let pivot = aggregator.pivot(&txs);

        assert_eq!(aggregator.converter().output_currency(), "RUB");
        assert_eq!(aggregator.converter().mismatches(), 2);
        assert_eq!(pivot.get("Игры", "Steam", month(1)), Some(Money::from_units(-40)));
    }

    #[test]
    fn custom_converter_is_applied_per_transaction() {
        struct Doubling;
        impl CurrencyConverter for Doubling {
            fn convert(&self, tx: &Transaction) -> Money {
                tx.amount + tx.amount
            }
        }
        let pivot = Aggregator::new(Doubling).pivot(&[tx(4, 1, "Еда", "A", "-10.25")]);
        assert_eq!(pivot.get("Еда", "A", month(4)), Some(Money::from_units(-21)));
    }

    #[test]
    fn pivot_serializes_as_nested_maps() {
        let pivot = Aggregator::new(PassThrough::new("RUB"))
            .pivot(&[tx(1, 1, "Еда", "A", "-100"), tx(2, 1, "Еда", "A", "-5")]);
        let json = serde_json::to_value(&pivot).unwrap();
        assert_eq!(json["Еда"]["A"]["2022-01"], serde_json::json!("-100"));
        assert_eq!(json["Еда"]["A"]["2022-02"], serde_json::json!("-5"));
    }

    #[test]
    fn empty_input_gives_empty_table() {
        let pivot = Aggregator::new(PassThrough::new("RUB")).pivot(&[]);
        assert!(pivot.is_empty());
        assert!(pivot.months().is_empty());
        assert_eq!(pivot.grand_total(), Money::zero());
    }
}
