use crate::data_loader::{ConsumptionRecord, RecordTable};
use crate::error::UnknownMetricError;
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

pub const ALL_CIRCLES: &str = "All";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    TotalServices,
    BilledServices,
    Units,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Self::TotalServices, Self::BilledServices, Self::Units];

    pub fn label(self) -> &'static str {
        match self {
            Self::TotalServices => "Total Services",
            Self::BilledServices => "Billed Services",
            Self::Units => "Units Consumed",
        }
    }

    /// Source column the metric sums.
    pub fn column(self) -> &'static str {
        match self {
            Self::TotalServices => "totservices",
            Self::BilledServices => "billdservices",
            Self::Units => "units",
        }
    }

    pub fn value(self, record: &ConsumptionRecord) -> f64 {
        match self {
            Self::TotalServices => record.total_services as f64,
            Self::BilledServices => record.billed_services as f64,
            Self::Units => record.units,
        }
    }

    pub fn is_count(self) -> bool {
        !matches!(self, Self::Units)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Metric {
    type Err = UnknownMetricError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        resolve_metric(value)
    }
}

pub fn resolve_metric(label: &str) -> Result<Metric, UnknownMetricError> {
    Metric::ALL
        .into_iter()
        .find(|metric| metric.label() == label)
        .ok_or_else(|| UnknownMetricError {
            label: label.to_string(),
        })
}

/// `"All"` hands back the input untouched; any other choice is an exact
/// match on `circle`, possibly empty.
pub fn resolve_filter<'a>(
    records: &'a [ConsumptionRecord],
    circle_choice: &str,
) -> Cow<'a, [ConsumptionRecord]> {
    if circle_choice == ALL_CIRCLES {
        return Cow::Borrowed(records);
    }
    Cow::Owned(
        records
            .iter()
            .filter(|record| record.circle == circle_choice)
            .cloned()
            .collect(),
    )
}

pub fn circle_choices(table: &RecordTable) -> Vec<String> {
    let mut choices = vec![ALL_CIRCLES.to_string()];
    choices.extend(table.distinct_circles());
    choices
}
