use crate::aggregator::{
    CategoryRow, CircleServicesRow, DivisionUnitsRow, RegionRow, SlaRow, SubdivisionRow,
    TotalMetrics,
};
use crate::selector::Metric;
use num_format::{Locale, ToFormattedString};

const BAR_WIDTH: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableMode {
    Full,
    Compact,
}

pub fn format_count(num: u64) -> String {
    num.to_formatted_string(&Locale::en)
}

/// Two decimals with thousands separators, e.g. `1,234.50`.
pub fn format_decimal(num: f64) -> String {
    if num.is_nan() || num.is_infinite() {
        return num.to_string();
    }
    let raw = format!("{num:.2}");
    let (sign, rest) = raw
        .strip_prefix('-')
        .map_or(("", raw.as_str()), |v| ("-", v));
    let (int_part, frac_part) = rest.split_once('.').unwrap_or((rest, "00"));
    let int_value: i128 = int_part.parse().unwrap_or(0);
    let grouped = int_value.to_formatted_string(&Locale::en);
    format!("{sign}{grouped}.{frac_part}")
}

pub fn format_energy(units: f64) -> String {
    format!("{} kWh", format_decimal(units))
}

pub fn format_load(load: f64) -> String {
    format!("{} kW", format_decimal(load))
}

pub fn format_percent(ratio: Option<f64>) -> String {
    match ratio {
        Some(ratio) => format!("{:.1}%", ratio * 100.0),
        None => "-".to_string(),
    }
}

pub fn format_metric_value(metric: Metric, value: f64) -> String {
    if metric.is_count() {
        format_count(value.round() as u64)
    } else {
        format_energy(value)
    }
}

fn bar(value: f64, max: f64) -> String {
    if max <= 0.0 || value <= 0.0 {
        return String::new();
    }
    let filled = ((value / max) * BAR_WIDTH as f64).round() as usize;
    "█".repeat(filled.clamp(1, BAR_WIDTH))
}

fn stacked_bar(part: u64, whole: u64, max: u64) -> String {
    if max == 0 || whole == 0 {
        return String::new();
    }
    let whole_cells = ((whole as f64 / max as f64) * BAR_WIDTH as f64).round() as usize;
    let whole_cells = whole_cells.clamp(1, BAR_WIDTH);
    let part_cells = ((part.min(whole) as f64 / whole as f64) * whole_cells as f64).round() as usize;
    format!(
        "{}{}",
        "█".repeat(part_cells),
        "░".repeat(whole_cells - part_cells)
    )
}

fn with_bar(mut row: Vec<String>, bar_cell: String, mode: TableMode) -> Vec<String> {
    if matches!(mode, TableMode::Full) {
        row.push(bar_cell);
    }
    row
}

pub fn build_metric_rows(totals: &TotalMetrics) -> Vec<Vec<String>> {
    vec![
        vec![
            "Total Services".to_string(),
            format_count(totals.total_services),
        ],
        vec![
            "Billed Services".to_string(),
            format_count(totals.billed_services),
        ],
        vec![
            "Total Units Consumed".to_string(),
            format_energy(totals.units),
        ],
        vec!["Total Load".to_string(), format_load(totals.load)],
        vec![
            "Billing Rate".to_string(),
            format_percent(totals.billed_ratio()),
        ],
    ]
}

pub fn build_category_rows(rows: &[CategoryRow]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|row| {
            vec![
                row.category.clone(),
                format_count(row.total_services),
                format_energy(row.units),
            ]
        })
        .collect()
}

pub fn build_circle_services_rows(rows: &[CircleServicesRow], mode: TableMode) -> Vec<Vec<String>> {
    let max = rows.iter().map(|r| r.total_services).max().unwrap_or(0) as f64;
    rows.iter()
        .map(|row| {
            with_bar(
                vec![row.circle.clone(), format_count(row.total_services)],
                bar(row.total_services as f64, max),
                mode,
            )
        })
        .collect()
}

pub fn build_division_units_rows(rows: &[DivisionUnitsRow], mode: TableMode) -> Vec<Vec<String>> {
    let max = rows.iter().map(|r| r.units).fold(0.0, f64::max);
    rows.iter()
        .map(|row| {
            with_bar(
                vec![row.division.clone(), format_energy(row.units)],
                bar(row.units, max),
                mode,
            )
        })
        .collect()
}

pub fn build_sla_rows(rows: &[SlaRow], mode: TableMode) -> Vec<Vec<String>> {
    let max = rows.iter().map(|r| r.total_services).max().unwrap_or(0);
    rows.iter()
        .map(|row| {
            with_bar(
                vec![
                    row.circle.clone(),
                    format_count(row.billed_services),
                    format_count(row.total_services),
                    format_percent(row.billed_ratio()),
                ],
                stacked_bar(row.billed_services, row.total_services, max),
                mode,
            )
        })
        .collect()
}

/// Circle header rows with their subtotal, each followed by its divisions.
pub fn build_region_rows(rows: &[RegionRow]) -> Vec<Vec<String>> {
    let grand_total: u64 = rows.iter().map(|r| r.total_services).sum();
    let mut table_rows = Vec::new();
    let mut start = 0;
    while start < rows.len() {
        let circle = &rows[start].circle;
        let end = rows[start..]
            .iter()
            .position(|r| &r.circle != circle)
            .map_or(rows.len(), |offset| start + offset);
        let group = &rows[start..end];
        let subtotal: u64 = group.iter().map(|r| r.total_services).sum();
        table_rows.push(vec![
            circle.clone(),
            format_count(subtotal),
            format_percent(share(subtotal, grand_total)),
        ]);
        for row in group {
            table_rows.push(vec![
                format!("  |- {}", row.division),
                format_count(row.total_services),
                format_percent(share(row.total_services, grand_total)),
            ]);
        }
        start = end;
    }
    table_rows
}

fn share(part: u64, whole: u64) -> Option<f64> {
    if whole == 0 {
        None
    } else {
        Some(part as f64 / whole as f64)
    }
}

pub fn build_subdivision_rows(
    rows: &[SubdivisionRow],
    metric: Metric,
    mode: TableMode,
) -> Vec<Vec<String>> {
    let max = rows.iter().map(|r| r.value).fold(0.0, f64::max);
    rows.iter()
        .map(|row| {
            with_bar(
                vec![
                    row.subdivision.clone(),
                    format_metric_value(metric, row.value),
                ],
                bar(row.value, max),
                mode,
            )
        })
        .collect()
}
