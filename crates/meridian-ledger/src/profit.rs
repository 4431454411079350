//! Profit summary over the rolling window

use meridian_common::AgentKind;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Days used to project the current daily net into a month
const DAYS_PER_MONTH: i64 = 30;

/// Revenue attributed to one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueEntry {
    pub amount: Decimal,
    /// Agent kind that produced it; `None` for revenue the feed reported without attribution
    pub source: Option<AgentKind>,
}

/// Operating cost by category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseEntry {
    pub amount: Decimal,
    pub category: String,
}

/// Income against costs within the rolling window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitSummary {
    pub income: Decimal,
    pub expenses: Decimal,
    pub net: Decimal,
    /// Realized income as a percentage of the daily target
    pub progress_percent: Decimal,
    pub projected_monthly: Decimal,
    pub income_by_source: BTreeMap<String, Decimal>,
    pub expenses_by_category: BTreeMap<String, Decimal>,
}

impl ProfitSummary {
    pub fn build<'a>(
        revenue: impl Iterator<Item = &'a RevenueEntry>,
        expenses: impl Iterator<Item = &'a ExpenseEntry>,
        progress_percent: Decimal,
    ) -> Self {
        let mut income = Decimal::ZERO;
        let mut income_by_source = BTreeMap::new();
        for entry in revenue {
            income += entry.amount;
            let key = entry
                .source
                .map(|k| k.as_str().to_string())
                .unwrap_or_else(|| "unattributed".to_string());
            *income_by_source.entry(key).or_insert(Decimal::ZERO) += entry.amount;
        }

        let mut total_expenses = Decimal::ZERO;
        let mut expenses_by_category = BTreeMap::new();
        for entry in expenses {
            total_expenses += entry.amount;
            *expenses_by_category
                .entry(entry.category.clone())
                .or_insert(Decimal::ZERO) += entry.amount;
        }

        let net = income - total_expenses;
        Self {
            income,
            expenses: total_expenses,
            net,
            progress_percent,
            projected_monthly: net * Decimal::from(DAYS_PER_MONTH),
            income_by_source,
            expenses_by_category,
        }
    }

    pub fn is_profitable(&self) -> bool {
        self.net > Decimal::ZERO
    }
}
