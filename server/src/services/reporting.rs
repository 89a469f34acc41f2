//! Sales statistics over committed payments.
//!
//! Payments are only written after their reservations commit, so anything
//! the payment store returns is already a settled sale; pending holds never
//! show up here.

use chrono::Datelike;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::models::{MonthlyStats, OverallStats, Payment};
use crate::store::{PaymentStore, StoreResult};

/// Totals across every payment.
pub fn summarize(payments: &[Payment]) -> OverallStats {
    payments
        .iter()
        .fold(OverallStats::default(), |mut stats, payment| {
            stats.total_tickets_sold += i64::from(payment.ticket_count);
            stats.total_income += payment.total_amount;
            stats.total_transactions += 1;
            stats
        })
}

/// Per-month totals keyed on the UTC settlement timestamp, newest first.
pub fn bucket_by_month(payments: &[Payment]) -> Vec<MonthlyStats> {
    let mut buckets: BTreeMap<(i32, u32), (i64, Decimal, i64)> = BTreeMap::new();

    for payment in payments {
        let key = (payment.settled_at.year(), payment.settled_at.month());
        let bucket = buckets.entry(key).or_insert((0, Decimal::ZERO, 0));
        bucket.0 += i64::from(payment.ticket_count);
        bucket.1 += payment.total_amount;
        bucket.2 += 1;
    }

    buckets
        .into_iter()
        .rev()
        .map(|((year, month), (total_tickets, total_income, count))| MonthlyStats {
            year,
            month: month as i32,
            total_tickets,
            total_income,
            count,
        })
        .collect()
}

#[derive(Clone)]
pub struct ReportingAggregator {
    payments: Arc<dyn PaymentStore>,
}

impl ReportingAggregator {
    pub fn new(payments: Arc<dyn PaymentStore>) -> Self {
        Self { payments }
    }

    pub async fn overall_stats(&self) -> StoreResult<OverallStats> {
        let stats = self.payments.overall_stats().await?;
        tracing::debug!(
            transactions = stats.total_transactions,
            tickets = stats.total_tickets_sold,
            "Computed overall sales stats"
        );
        Ok(stats)
    }

    pub async fn monthly_stats(&self) -> StoreResult<Vec<MonthlyStats>> {
        let stats = self.payments.monthly_stats().await?;
        tracing::debug!(months = stats.len(), "Computed monthly sales stats");
        Ok(stats)
    }
}
