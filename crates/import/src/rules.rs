//! Name-pattern category inference for exports that carry no category column.
//!
//! Rules are tried in order; the first whose pattern matches rewrites the name and
//! assigns its category. Unmatched names are kept verbatim with the undetermined category.

use regex::{Captures, Regex};
use tally_core::UNDETERMINED_CATEGORY;

pub const CARD_TRANSFER_CATEGORY: &str = "Переводы на карту";
pub const SALARY_CATEGORY: &str = "Зарплата";
pub const INTEREST_CATEGORY: &str = "Проценты";
pub const FAST_PAYMENT_CATEGORY: &str = "Переводы СБП";

re!(re_card_transfer,
    r"[0-9]+\++[0-9]+\s+[0-9]+\\(?:[A-Za-z0-9 ]+\\){3}([A-Za-z0-9 ]+ )");
re!(re_salary_basis,
    r"(?i)основание:\s*(?P<basis>(?:заработная\s+плата|зарплата|аванс|премия)[^;.]*)");
re!(re_interest,
    r"(?i)^\s*(?:выплата|капитализация|начисление)\s+процентов");
re!(re_fast_payment,
    r"(?i)перевод\w*\s+(?:через\s+|по\s+)?сбп(?:.*?\b(?:получатель:?|от|для)\s+(?P<who>[^,;]+))?");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Categorized {
    pub name: String,
    pub category: String,
}

struct NameRule {
    category: &'static str,
    pattern: fn() -> &'static Regex,
    rewrite: fn(&Captures<'_>) -> String,
}

const NAME_RULES: &[NameRule] = &[
    NameRule {
        category: CARD_TRANSFER_CATEGORY,
        pattern: re_card_transfer,
        rewrite: |c| format!("Перевод в {}", c[1].trim()),
    },
    NameRule {
        category: SALARY_CATEGORY,
        pattern: re_salary_basis,
        rewrite: |c| c["basis"].trim().to_string(),
    },
    NameRule {
        category: INTEREST_CATEGORY,
        pattern: re_interest,
        rewrite: |_| "Проценты на остаток".to_string(),
    },
    NameRule {
        category: FAST_PAYMENT_CATEGORY,
        pattern: re_fast_payment,
        rewrite: |c| match c.name("who") {
            Some(who) => format!("Перевод СБП {}", who.as_str().trim().trim_end_matches('.')),
            None => "Перевод СБП".to_string(),
        },
    },
];

/// Infers category and a cleaned name from a free-text operation description.
pub fn categorize(name: &str) -> Categorized {
    NAME_RULES
        .iter()
        .find_map(|rule| {
            (rule.pattern)().captures(name).map(|c| Categorized {
                name: (rule.rewrite)(&c),
                category: rule.category.to_string(),
            })
        })
        .unwrap_or_else(|| Categorized {
            name: name.to_string(),
            category: UNDETERMINED_CATEGORY.to_string(),
        })
}
