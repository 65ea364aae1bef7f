//! Production jobs, their material costs and the job state machine

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};

/// Production job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    InProgress,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "QUEUED",
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::Paused => "PAUSED",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "QUEUED" => Some(JobStatus::Queued),
            "IN_PROGRESS" => Some(JobStatus::InProgress),
            "PAUSED" => Some(JobStatus::Paused),
            "COMPLETED" => Some(JobStatus::Completed),
            "FAILED" => Some(JobStatus::Failed),
            "CANCELLED" => Some(JobStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Queued, InProgress)
                | (Queued, Cancelled)
                | (InProgress, Paused)
                | (InProgress, Completed)
                | (InProgress, Failed)
                | (InProgress, Cancelled)
                | (Paused, InProgress)
                | (Paused, Failed)
                | (Paused, Cancelled)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of manufacturing work on a printer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductionJob {
    pub id: Uuid,
    /// Sequential display number, e.g. "JOB-000042"
    pub job_number: String,
    pub name: String,
    pub status: JobStatus,
    /// 1 (lowest) to 10 (highest)
    pub priority: i32,
    pub estimated_hours: Option<Decimal>,
    pub actual_hours: Option<Decimal>,
    pub printer: Option<String>,
    /// Free-form material label shown on the job card
    pub material_label: Option<String>,
    /// Slicer/print parameters (layer height, infill, temperatures...)
    pub settings: Option<serde_json::Value>,
    pub files: Vec<String>,
    pub order_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Field values a status change writes back to the job
#[derive(Debug, Clone, PartialEq)]
pub struct JobTransition {
    pub status: JobStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub actual_hours: Option<Decimal>,
    /// Completing a job linked to a product adds one finished unit
    pub increments_product_stock: bool,
}

/// Validate and compute a status change.
///
/// Entering IN_PROGRESS stamps `started_at` once. Completing stamps
/// `completed_at` and, when no hours were reported, derives them from the
/// elapsed time since the job started.
pub fn apply_transition(
    job: &ProductionJob,
    next: JobStatus,
    reported_hours: Option<Decimal>,
    now: DateTime<Utc>,
) -> LedgerResult<JobTransition> {
    if !job.status.can_transition_to(next) {
        return Err(LedgerError::InvalidStateTransition(format!(
            "job {} cannot move from {} to {}",
            job.job_number, job.status, next
        )));
    }
    crate::validation::validate_hours("actualHours", reported_hours)?;

    let started_at = match next {
        JobStatus::InProgress => job.started_at.or(Some(now)),
        _ => job.started_at,
    };

    let (completed_at, actual_hours) = if next == JobStatus::Completed {
        let hours = reported_hours.or(job.actual_hours).unwrap_or_else(|| {
            started_at
                .map(|start| hours_between(start, now))
                .unwrap_or(Decimal::ZERO)
        });
        (Some(now), Some(hours))
    } else {
        (job.completed_at, reported_hours.or(job.actual_hours))
    };

    Ok(JobTransition {
        status: next,
        started_at,
        completed_at,
        actual_hours,
        increments_product_stock: next == JobStatus::Completed && job.product_id.is_some(),
    })
}

/// A running job owns live consumption and cannot be deleted
pub fn ensure_deletable(job: &ProductionJob) -> LedgerResult<()> {
    if job.status == JobStatus::InProgress {
        return Err(LedgerError::InvalidStateTransition(format!(
            "job {} is in progress and cannot be deleted",
            job.job_number
        )));
    }
    Ok(())
}

/// Materials can only be charged to jobs that are still open
pub fn ensure_accepts_consumption(job: &ProductionJob) -> LedgerResult<()> {
    if job.status.is_terminal() {
        return Err(LedgerError::InvalidStateTransition(format!(
            "job {} is {} and no longer accepts consumption",
            job.job_number, job.status
        )));
    }
    Ok(())
}

/// Elapsed hours between two instants, 2 dp, never negative
pub fn hours_between(start: DateTime<Utc>, end: DateTime<Utc>) -> Decimal {
    let seconds = (end - start).num_seconds().max(0);
    (Decimal::from(seconds) / Decimal::from(3600)).round_dp(2)
}

pub fn format_job_number(sequence: i64) -> String {
    format!("JOB-{:06}", sequence)
}

/// Material consumed by a job, with the unit cost frozen at consumption time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductionCost {
    pub id: Uuid,
    pub production_job_id: Uuid,
    pub material_id: Uuid,
    pub batch_id: Option<Uuid>,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Configured labor rate and margin used for pricing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostingPolicy {
    pub labor_rate_per_hour: Decimal,
    /// Fraction added on top of cost, e.g. 0.40
    pub margin: Decimal,
}

/// Consumed material, either one cost row or all rows of a material summed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CostLine {
    pub material_id: Uuid,
    pub material_name: String,
    pub unit: String,
    pub quantity: Decimal,
    pub total_cost: Decimal,
}

/// On-demand cost breakdown of a job
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CostBreakdown {
    pub job_id: Uuid,
    pub job_number: String,
    pub lines: Vec<CostLine>,
    pub material_cost: Decimal,
    pub labor_hours: Decimal,
    pub labor_rate_per_hour: Decimal,
    pub labor_cost: Decimal,
    pub total_cost: Decimal,
    pub margin: Decimal,
    pub suggested_price: Decimal,
}

/// Actual hours when reported, else the estimate, else nothing
pub fn labor_hours(actual: Option<Decimal>, estimated: Option<Decimal>) -> Decimal {
    actual.or(estimated).unwrap_or(Decimal::ZERO)
}

/// Merge rows per material, ordered by material name
pub fn group_cost_lines(rows: Vec<CostLine>) -> Vec<CostLine> {
    let mut grouped: Vec<CostLine> = Vec::new();
    for row in rows {
        match grouped.iter_mut().find(|l| l.material_id == row.material_id) {
            Some(line) => {
                line.quantity += row.quantity;
                line.total_cost += row.total_cost;
            }
            None => grouped.push(row),
        }
    }
    grouped.sort_by(|a, b| {
        a.material_name
            .cmp(&b.material_name)
            .then(a.material_id.cmp(&b.material_id))
    });
    grouped
}

/// Labor, total and selling price for a given material cost and print time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceQuote {
    pub labor_cost: Decimal,
    pub total_cost: Decimal,
    pub suggested_price: Decimal,
}

impl CostingPolicy {
    /// Amounts are rounded to cents
    pub fn quote(&self, material_cost: Decimal, labor_hours: Decimal) -> LedgerResult<PriceQuote> {
        let too_large = || LedgerError::invalid("totalCost", "value is too large");
        let labor_cost = labor_hours
            .checked_mul(self.labor_rate_per_hour)
            .ok_or_else(too_large)?
            .round_dp(2);
        let total_cost = material_cost
            .checked_add(labor_cost)
            .ok_or_else(too_large)?
            .round_dp(2);
        let suggested_price = total_cost
            .checked_mul(Decimal::ONE + self.margin)
            .ok_or_else(too_large)?
            .round_dp(2);
        Ok(PriceQuote {
            labor_cost,
            total_cost,
            suggested_price,
        })
    }
}

/// Sum a job's consumption, add labor and derive the suggested price.
///
/// Pure and idempotent: the same job and rows always yield the same totals.
pub fn compute_totals(
    job: &ProductionJob,
    rows: Vec<CostLine>,
    policy: &CostingPolicy,
) -> LedgerResult<CostBreakdown> {
    let material_cost = rows
        .iter()
        .try_fold(Decimal::ZERO, |sum, r| sum.checked_add(r.total_cost))
        .ok_or_else(|| LedgerError::invalid("totalCost", "value is too large"))?;
    let hours = labor_hours(job.actual_hours, job.estimated_hours);
    let quote = policy.quote(material_cost, hours)?;

    Ok(CostBreakdown {
        job_id: job.id,
        job_number: job.job_number.clone(),
        lines: group_cost_lines(rows),
        material_cost,
        labor_hours: hours,
        labor_rate_per_hour: policy.labor_rate_per_hour,
        labor_cost: quote.labor_cost,
        total_cost: quote.total_cost,
        margin: policy.margin,
        suggested_price: quote.suggested_price,
    })
}
