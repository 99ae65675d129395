//! Series preparation for the chart widgets.

use crate::format::day_key;
use crate::models::{ClientPending, CollaboratorCount, Labelled, Task, TimeseriesPoint, TypeCount};
use std::collections::BTreeMap;

pub const TYPE_SLICES: usize = 5;
pub const TOP_COLLABORATORS: usize = 10;
pub const TASK_DAYS: usize = 14;
pub const OTHERS: &str = "Otros";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Slice {
    pub name: String,
    pub value: u64,
}

impl Slice {
    fn new(name: impl Into<String>, value: u64) -> Self {
        Slice {
            name: name.into(),
            value,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatusTotals {
    pub pending: u64,
    pub finished: u64,
}

fn label_or_na(name: Option<&str>) -> String {
    match Labelled::from_parts(name, None) {
        Labelled::Resolved(name) => name,
        _ => "N/A".to_string(),
    }
}

/// Largest `top` types, then one "Otros" slice for whatever is left.
pub fn type_distribution(items: &[TypeCount], top: usize) -> Vec<Slice> {
    let mut sorted: Vec<&TypeCount> = items.iter().collect();
    sorted.sort_by(|a, b| b.total.cmp(&a.total));

    let mut slices: Vec<Slice> = sorted
        .iter()
        .take(top)
        .map(|t| Slice::new(label_or_na(t.type_name.as_deref()), t.total))
        .collect();
    if sorted.len() > top {
        let rest = sorted[top..].iter().map(|t| t.total).sum();
        slices.push(Slice::new(OTHERS, rest));
    }
    slices
}

pub fn top_collaborators(items: &[CollaboratorCount], top: usize) -> Vec<Slice> {
    let mut sorted: Vec<&CollaboratorCount> = items.iter().collect();
    sorted.sort_by(|a, b| b.total.cmp(&a.total));
    sorted
        .into_iter()
        .take(top)
        .map(|c| Slice::new(label_or_na(c.collaborator_name.as_deref()), c.total))
        .collect()
}

pub fn pending_by_client(items: &[ClientPending], top: usize) -> Vec<Slice> {
    let mut sorted: Vec<&ClientPending> = items.iter().collect();
    sorted.sort_by(|a, b| b.pending.cmp(&a.pending));
    sorted
        .into_iter()
        .take(top)
        .map(|c| {
            let name = Labelled::from_parts(c.client_name.as_deref(), c.client_id).to_string();
            Slice::new(name, c.pending)
        })
        .collect()
}

pub fn status_totals(points: &[TimeseriesPoint]) -> StatusTotals {
    points.iter().fold(StatusTotals::default(), |acc, p| StatusTotals {
        pending: acc.pending + p.pending,
        finished: acc.finished + p.finished,
    })
}

/// Daily totals in server order, labelled by day.
pub fn trend(points: &[TimeseriesPoint]) -> Vec<Slice> {
    points
        .iter()
        .map(|p| {
            let day = day_key(&p.day).unwrap_or_else(|| p.day.clone());
            Slice::new(day, p.total)
        })
        .collect()
}

/// Counts over the rows currently loaded, not the whole backlog.
pub fn page_status_totals(tasks: &[Task]) -> StatusTotals {
    let finished = tasks.iter().filter(|t| t.finished).count() as u64;
    StatusTotals {
        pending: tasks.len() as u64 - finished,
        finished,
    }
}

/// Tasks per day for the most recent `days` days that have data.
pub fn tasks_per_day(tasks: &[Task], days: usize) -> Vec<Slice> {
    let mut buckets: BTreeMap<String, u64> = BTreeMap::new();
    for day in tasks.iter().filter_map(|t| t.date.as_deref().and_then(day_key)) {
        *buckets.entry(day).or_default() += 1;
    }
    let skip = buckets.len().saturating_sub(days);
    buckets
        .into_iter()
        .skip(skip)
        .map(|(day, count)| Slice::new(day, count))
        .collect()
}
