//! Derived views over a set of consumption records.
//!
//! Every function here is pure: the input slice is only read, and grouped
//! views come back in ascending key order unless a sort is stated.

use crate::data_loader::ConsumptionRecord;
use crate::selector::Metric;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalMetrics {
    pub total_services: u64,
    pub billed_services: u64,
    pub units: f64,
    pub load: f64,
}

impl TotalMetrics {
    pub fn billed_ratio(&self) -> Option<f64> {
        ratio(self.billed_services, self.total_services)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRow {
    pub category: String,
    pub total_services: u64,
    pub units: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircleServicesRow {
    pub circle: String,
    pub total_services: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DivisionUnitsRow {
    pub division: String,
    pub units: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlaRow {
    pub circle: String,
    pub billed_services: u64,
    pub total_services: u64,
}

impl SlaRow {
    pub fn billed_ratio(&self) -> Option<f64> {
        ratio(self.billed_services, self.total_services)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionRow {
    pub circle: String,
    pub division: String,
    pub total_services: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubdivisionRow {
    pub subdivision: String,
    pub value: f64,
}

fn ratio(part: u64, whole: u64) -> Option<f64> {
    if whole == 0 {
        None
    } else {
        Some(part as f64 / whole as f64)
    }
}

/// Largest first under IEEE total ordering, so NaN sums still sort.
fn descending(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}

pub fn total_metrics(records: &[ConsumptionRecord]) -> TotalMetrics {
    let mut totals = TotalMetrics::default();
    for record in records {
        totals.total_services = totals.total_services.saturating_add(record.total_services);
        totals.billed_services = totals.billed_services.saturating_add(record.billed_services);
        totals.units += record.units;
        totals.load += record.load;
    }
    totals
}

pub fn by_category(records: &[ConsumptionRecord]) -> Vec<CategoryRow> {
    let mut groups: BTreeMap<&str, (u64, f64)> = BTreeMap::new();
    for record in records {
        let entry = groups.entry(record.category.as_str()).or_default();
        entry.0 = entry.0.saturating_add(record.total_services);
        entry.1 += record.units;
    }
    groups
        .into_iter()
        .map(|(category, (total_services, units))| CategoryRow {
            category: category.to_string(),
            total_services,
            units,
        })
        .collect()
}

/// Circles ranked by total services, largest first.
pub fn by_circle_services(records: &[ConsumptionRecord]) -> Vec<CircleServicesRow> {
    let mut groups: BTreeMap<&str, u64> = BTreeMap::new();
    for record in records {
        let entry = groups.entry(record.circle.as_str()).or_default();
        *entry = entry.saturating_add(record.total_services);
    }
    let mut rows = groups
        .into_iter()
        .map(|(circle, total_services)| CircleServicesRow {
            circle: circle.to_string(),
            total_services,
        })
        .collect::<Vec<_>>();
    rows.sort_by(|a, b| b.total_services.cmp(&a.total_services));
    rows
}

/// Divisions ranked by units consumed, largest first.
pub fn by_division_units(records: &[ConsumptionRecord]) -> Vec<DivisionUnitsRow> {
    let mut groups: BTreeMap<&str, f64> = BTreeMap::new();
    for record in records {
        *groups.entry(record.division.as_str()).or_default() += record.units;
    }
    let mut rows = groups
        .into_iter()
        .map(|(division, units)| DivisionUnitsRow {
            division: division.to_string(),
            units,
        })
        .collect::<Vec<_>>();
    rows.sort_by(|a, b| descending(a.units, b.units));
    rows
}

pub fn sla_by_circle(records: &[ConsumptionRecord]) -> Vec<SlaRow> {
    let mut groups: BTreeMap<&str, (u64, u64)> = BTreeMap::new();
    for record in records {
        let entry = groups.entry(record.circle.as_str()).or_default();
        entry.0 = entry.0.saturating_add(record.billed_services);
        entry.1 = entry.1.saturating_add(record.total_services);
    }
    groups
        .into_iter()
        .map(|(circle, (billed_services, total_services))| SlaRow {
            circle: circle.to_string(),
            billed_services,
            total_services,
        })
        .collect()
}

/// Two-level circle/division breakdown of total services.
pub fn regional_breakdown(records: &[ConsumptionRecord]) -> Vec<RegionRow> {
    let mut groups: BTreeMap<(&str, &str), u64> = BTreeMap::new();
    for record in records {
        let entry = groups
            .entry((record.circle.as_str(), record.division.as_str()))
            .or_default();
        *entry = entry.saturating_add(record.total_services);
    }
    groups
        .into_iter()
        .map(|((circle, division), total_services)| RegionRow {
            circle: circle.to_string(),
            division: division.to_string(),
            total_services,
        })
        .collect()
}

pub fn by_subdivision(records: &[ConsumptionRecord], metric: Metric) -> Vec<SubdivisionRow> {
    let mut groups: BTreeMap<&str, f64> = BTreeMap::new();
    for record in records {
        *groups.entry(record.subdivision.as_str()).or_default() += metric.value(record);
    }
    groups
        .into_iter()
        .map(|(subdivision, value)| SubdivisionRow {
            subdivision: subdivision.to_string(),
            value,
        })
        .collect()
}
