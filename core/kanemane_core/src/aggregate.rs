//! # Multi-currency aggregation
//!
//! Totals, per-currency subsets and income/expense comparisons over
//! [`LineItem`] snapshots. Every function here is pure.
//!
//! Inputs are assumed to be finite: records are validated where they are
//! decoded from backend JSON. A non-finite amount that slips through is not
//! hidden; it propagates into the result as NaN or infinity instead of
//! panicking. Sums run in input order so that results are reproducible.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::types::{Currency, ExchangeRate, ItemKind, LineItem, MoneyAmount};

/// Express `amount` in `target`.
pub fn convert(amount: MoneyAmount, target: Currency, rate: &ExchangeRate) -> f64 {
    if amount.currency == target {
        return amount.value;
    }
    match target {
        // JPY → IDR
        Currency::Idr => amount.value * rate.rate(),
        // IDR → JPY
        Currency::Jpy => amount.value / rate.rate(),
    }
}

/// Sum of every item expressed in `target`, whatever its own currency.
pub fn grand_total(items: &[LineItem], target: Currency, rate: &ExchangeRate) -> f64 {
    items
        .iter()
        .map(|item| convert(item.money(), target, rate))
        .sum()
}

pub fn filter_by_currency(items: &[LineItem], currency: Currency) -> Vec<LineItem> {
    items
        .iter()
        .filter(|item| item.currency == currency)
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KindSplit {
    pub income: Vec<LineItem>,
    pub expense: Vec<LineItem>,
}

/// Partition into income and expense. `Balance` items belong to neither.
pub fn split_by_kind(items: &[LineItem]) -> KindSplit {
    let mut split = KindSplit::default();
    for item in items {
        match item.kind {
            ItemKind::Income => split.income.push(item.clone()),
            ItemKind::Expense => split.expense.push(item.clone()),
            ItemKind::Balance => {}
        }
    }
    split
}

/// Share of income already spent, clamped to `[0, 1]`.
///
/// Zero or negative income yields `0` rather than a division error, and a
/// negative expense (net refunds) counts as nothing spent. NaN in either
/// argument stays NaN (`f64::clamp` is avoided for the same reason).
pub fn expense_ratio(income: f64, expense: f64) -> f64 {
    if income.is_nan() {
        return f64::NAN;
    }
    if income <= 0.0 {
        return 0.0;
    }
    let ratio = expense / income;
    if ratio > 1.0 {
        1.0
    } else if ratio < 0.0 {
        0.0
    } else {
        ratio
    }
}

/// Income left after expenses. Negative means overspend.
pub fn remaining(income: f64, expense: f64) -> f64 {
    income - expense
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct IncomeExpense {
    pub income: f64,
    pub expense: f64,
}

impl IncomeExpense {
    pub fn ratio(&self) -> f64 {
        expense_ratio(self.income, self.expense)
    }

    /// [`ratio`](Self::ratio) as a percentage for progress bars.
    pub fn percentage(&self) -> f64 {
        self.ratio() * 100.0
    }

    pub fn remaining(&self) -> f64 {
        remaining(self.income, self.expense)
    }
}

/// Income and expense totals for one currency. No conversion is applied.
pub fn totals_by_kind(items: &[LineItem], currency: Currency) -> IncomeExpense {
    sum_kinds(items.iter().filter(|item| item.currency == currency))
}

/// Like [`totals_by_kind`], restricted to one calendar month.
///
/// Undated items are left out.
pub fn monthly_totals(items: &[LineItem], currency: Currency, year: i32, month: u32) -> IncomeExpense {
    sum_kinds(items.iter().filter(|item| {
        item.currency == currency && item.date.is_some_and(|d| in_month(d, year, month))
    }))
}

fn in_month(date: NaiveDate, year: i32, month: u32) -> bool {
    date.year() == year && date.month() == month
}

fn sum_kinds<'a>(items: impl Iterator<Item = &'a LineItem>) -> IncomeExpense {
    let mut totals = IncomeExpense::default();
    for item in items {
        match item.kind {
            ItemKind::Income => totals.income += item.amount,
            ItemKind::Expense => totals.expense += item.amount,
            ItemKind::Balance => {}
        }
    }
    totals
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    pub amount: f64,
}

/// Expense totals per category for one currency, in order of first appearance.
pub fn category_breakdown(items: &[LineItem], currency: Currency) -> Vec<CategoryTotal> {
    let mut totals: Vec<CategoryTotal> = Vec::new();
    for item in items
        .iter()
        .filter(|item| item.currency == currency && item.kind == ItemKind::Expense)
    {
        match totals.iter_mut().find(|t| t.category == item.label) {
            Some(entry) => entry.amount += item.amount,
            None => totals.push(CategoryTotal {
                category: item.label.clone(),
                amount: item.amount,
            }),
        }
    }
    totals
}
