//! Dashboard aggregation for the finance tracker.
//!
//! This module reduces already-fetched accounts and transactions into the
//! figures shown on the dashboard. Every function is pure: inputs are taken by
//! shared reference, nothing is mutated, and identical inputs always produce
//! identical outputs, so results can be memoized by input.
//!
//! ## Key Responsibilities
//!
//! - **Balances**: net balance, available balance, assets vs. debt
//! - **Monthly Flows**: spend and income within a calendar month
//! - **Category Breakdown**: expense totals per category with a stable ordering
//! - **Budgets**: progress against a monthly limit with a status classification
//!
//! ## Amount Convention
//!
//! `Transaction::amount` is signed as the backend delivers it. Direction is
//! taken from `is_expense` / `is_income` only, and every aggregate sums
//! `amount.abs()`. The sign is never used to decide whether money went in or
//! out.
//!
//! ## Uncategorized Spend
//!
//! Expense transactions without a `primary_category` are left out of the
//! breakdown groups but still count toward the total the percentages are
//! taken from. Percentages therefore add up to 100 only when every expense
//! is categorized.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use shared::{Account, Category, Transaction, TransactionsSummary};
use std::collections::HashMap;

/// Label shown when there is no top category
pub const NO_DATA_LABEL: &str = "No data";

/// Utilization at which a budget is flagged as a warning
pub const BUDGET_WARNING_PERCENT: f64 = 80.0;

/// Spend within one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySpend {
    pub name: String,
    pub color: String,
    pub amount: f64,
    /// Share of all expense spend, 0-100
    pub percentage: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BudgetStatus {
    OverBudget,
    Warning,
    OnTrack,
    NoBudget,
}

impl BudgetStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BudgetStatus::OverBudget => "over-budget",
            BudgetStatus::Warning => "warning",
            BudgetStatus::OnTrack => "on-track",
            BudgetStatus::NoBudget => "no-budget",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetProgress {
    /// Utilization clamped to 100; `None` when there is no budget
    pub percentage: Option<f64>,
    pub status: BudgetStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryBudget {
    pub category_id: i64,
    pub name: String,
    pub spent: f64,
    pub budget_limit: Option<f64>,
    pub progress: BudgetProgress,
}

/// Every dashboard figure for one month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    /// First day of the summarized month
    pub month: NaiveDate,
    pub account_count: usize,
    pub total_balance: f64,
    pub total_available: f64,
    pub total_positive_balance: f64,
    pub total_debt: f64,
    pub monthly_spend: f64,
    pub monthly_income: f64,
    pub savings_rate: f64,
    pub average_daily_spend: f64,
    /// Breakdown of the month's expenses
    pub category_breakdown: Vec<CategorySpend>,
    pub top_category: Option<CategorySpend>,
    pub transaction_summary: TransactionsSummary,
}

impl DashboardSummary {
    pub fn compute(accounts: &[Account], transactions: &[Transaction], month: NaiveDate) -> Self {
        let in_month: Vec<Transaction> = transactions
            .iter()
            .filter(|tx| same_month(tx.date, month))
            .cloned()
            .collect();

        let monthly_spend = monthly_spend(transactions, month);
        let monthly_income = monthly_income(transactions, month);
        let category_breakdown = category_breakdown(&in_month);
        let top_category = top_category(&category_breakdown).cloned();

        Self {
            month: first_of_month(month),
            account_count: accounts.len(),
            total_balance: total_balance(accounts),
            total_available: total_available(accounts),
            total_positive_balance: total_positive_balance(accounts),
            total_debt: total_debt(accounts),
            monthly_spend,
            monthly_income,
            savings_rate: savings_rate(monthly_income, monthly_spend),
            average_daily_spend: average_daily_spend(monthly_spend, days_in_month(month)),
            category_breakdown,
            top_category,
            transaction_summary: transaction_summary(&in_month),
        }
    }

    pub fn top_category_label(&self) -> &str {
        self.top_category
            .as_ref()
            .map(|c| c.name.as_str())
            .unwrap_or(NO_DATA_LABEL)
    }
}

fn same_month(date: NaiveDate, month: NaiveDate) -> bool {
    date.year() == month.year() && date.month() == month.month()
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Number of days in the calendar month containing `date`
pub fn days_in_month(date: NaiveDate) -> u32 {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|next| next.pred_opt())
        .map(|last| last.day())
        .unwrap_or(30)
}

pub fn total_balance(accounts: &[Account]) -> f64 {
    accounts.iter().map(|a| a.balance_current).sum()
}

pub fn total_available(accounts: &[Account]) -> f64 {
    accounts.iter().map(|a| a.balance_available).sum()
}

/// Sum of the accounts with a non-negative current balance
pub fn total_positive_balance(accounts: &[Account]) -> f64 {
    accounts
        .iter()
        .filter(|a| a.balance_current >= 0.0)
        .map(|a| a.balance_current)
        .sum()
}

/// Magnitude of the accounts with a negative current balance
pub fn total_debt(accounts: &[Account]) -> f64 {
    accounts
        .iter()
        .filter(|a| a.balance_current < 0.0)
        .map(|a| a.balance_current.abs())
        .sum()
}

/// Expense total for the calendar month containing `month`
pub fn monthly_spend(transactions: &[Transaction], month: NaiveDate) -> f64 {
    transactions
        .iter()
        .filter(|tx| tx.is_expense && same_month(tx.date, month))
        .map(|tx| tx.amount.abs())
        .sum()
}

/// Income total for the calendar month containing `month`
pub fn monthly_income(transactions: &[Transaction], month: NaiveDate) -> f64 {
    transactions
        .iter()
        .filter(|tx| tx.is_income && same_month(tx.date, month))
        .map(|tx| tx.amount.abs())
        .sum()
}

/// Group expenses by category name, largest first.
///
/// Equal amounts keep the order in which their category was first seen.
pub fn category_breakdown(transactions: &[Transaction]) -> Vec<CategorySpend> {
    let expenses: Vec<&Transaction> = transactions.iter().filter(|tx| tx.is_expense).collect();
    let total_spend: f64 = expenses.iter().map(|tx| tx.amount.abs()).sum();

    let mut groups: Vec<CategorySpend> = Vec::new();
    let mut index_by_name: HashMap<&str, usize> = HashMap::new();

    for tx in &expenses {
        let category = match &tx.primary_category {
            Some(category) => category,
            None => continue,
        };

        let index = *index_by_name.entry(category.name.as_str()).or_insert_with(|| {
            groups.push(CategorySpend {
                name: category.name.clone(),
                color: category.color.clone(),
                amount: 0.0,
                percentage: 0.0,
                count: 0,
            });
            groups.len() - 1
        });

        let group = &mut groups[index];
        group.amount += tx.amount.abs();
        group.count += 1;
    }

    for group in &mut groups {
        group.percentage = if total_spend > 0.0 {
            group.amount / total_spend * 100.0
        } else {
            0.0
        };
    }

    // sort_by is stable
    groups.sort_by(|a, b| b.amount.total_cmp(&a.amount));
    groups
}

pub fn top_category(breakdown: &[CategorySpend]) -> Option<&CategorySpend> {
    breakdown.first()
}

/// Share of income kept, in percent. Zero income yields 0.
pub fn savings_rate(income: f64, expenses: f64) -> f64 {
    if income == 0.0 {
        return 0.0;
    }
    (income - expenses) / income * 100.0
}

pub fn budget_progress(spent: f64, budget_limit: Option<f64>) -> BudgetProgress {
    let limit = match budget_limit {
        Some(limit) if limit > 0.0 => limit,
        _ => {
            return BudgetProgress {
                percentage: None,
                status: BudgetStatus::NoBudget,
            }
        }
    };

    let utilization = spent / limit * 100.0;
    let status = if utilization >= 100.0 {
        BudgetStatus::OverBudget
    } else if utilization >= BUDGET_WARNING_PERCENT {
        BudgetStatus::Warning
    } else {
        BudgetStatus::OnTrack
    };

    BudgetProgress {
        percentage: Some(utilization.min(100.0)),
        status,
    }
}

/// Budget progress of `category` for `month`, counting spend in the category
/// and its direct children
pub fn category_budget_progress(category: &Category, transactions: &[Transaction], month: NaiveDate) -> CategoryBudget {
    let mut ids: Vec<i64> = vec![category.id];
    ids.extend(category.child_categories.iter().map(|child| child.id));

    let spent: f64 = transactions
        .iter()
        .filter(|tx| tx.is_expense && same_month(tx.date, month))
        .filter(|tx| {
            tx.primary_category
                .as_ref()
                .map(|c| ids.contains(&c.id))
                .unwrap_or(false)
        })
        .map(|tx| tx.amount.abs())
        .sum();

    CategoryBudget {
        category_id: category.id,
        name: category.name.clone(),
        spent,
        budget_limit: category.budget_limit,
        progress: budget_progress(spent, category.budget_limit),
    }
}

/// Totals over `transactions`, computed the same way the backend computes its summary
pub fn transaction_summary(transactions: &[Transaction]) -> TransactionsSummary {
    let total_expenses: f64 = transactions
        .iter()
        .filter(|tx| tx.is_expense)
        .map(|tx| tx.amount.abs())
        .sum();
    let total_income: f64 = transactions
        .iter()
        .filter(|tx| tx.is_income)
        .map(|tx| tx.amount.abs())
        .sum();

    TransactionsSummary {
        total_count: transactions.len() as u32,
        total_expenses,
        total_income,
        net_amount: total_income - total_expenses,
        pending_count: transactions.iter().filter(|tx| tx.pending).count() as u32,
        uncategorized_count: transactions.iter().filter(|tx| !tx.is_categorized()).count() as u32,
    }
}

pub fn average_daily_spend(spend: f64, days: u32) -> f64 {
    if days == 0 {
        return 0.0;
    }
    spend / days as f64
}
