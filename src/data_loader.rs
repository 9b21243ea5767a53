use crate::error::DataLoadError;
use csv::{ReaderBuilder, Trim};
use serde::{Deserialize, Deserializer};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tracing::{debug, info, warn};

pub const DEFAULT_DATA_FILE: &str = "consumption.csv";

pub const REQUIRED_COLUMNS: [&str; 8] = [
    "catdesc",
    "circle",
    "division",
    "subdivision",
    "totservices",
    "billdservices",
    "units",
    "load",
];

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConsumptionRecord {
    #[serde(rename = "catdesc")]
    pub category: String,
    pub circle: String,
    pub division: String,
    pub subdivision: String,
    #[serde(rename = "totservices", deserialize_with = "service_count")]
    pub total_services: u64,
    #[serde(rename = "billdservices", deserialize_with = "service_count")]
    pub billed_services: u64,
    pub units: f64,
    pub load: f64,
}

/// Accepts `10` as well as the `10.0` spreadsheet exports often write for
/// whole counts. Fractional, negative or non-finite values are rejected.
fn service_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(count) = raw.parse::<u64>() {
        return Ok(count);
    }
    match raw.parse::<f64>() {
        Ok(value)
            if value.is_finite()
                && value >= 0.0
                && value.fract() == 0.0
                && value <= u64::MAX as f64 =>
        {
            Ok(value as u64)
        }
        _ => Err(serde::de::Error::custom(format!(
            "expected a whole non-negative count, got {raw:?}"
        ))),
    }
}

/// Immutable set of records read from one dataset file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordTable {
    records: Vec<ConsumptionRecord>,
}

impl RecordTable {
    pub fn new(records: Vec<ConsumptionRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[ConsumptionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Circle values in the order they first appear in the file.
    pub fn distinct_circles(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut circles = Vec::new();
        for record in &self.records {
            if seen.insert(record.circle.as_str()) {
                circles.push(record.circle.clone());
            }
        }
        circles
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordIssue {
    pub index: usize,
    pub message: String,
}

impl fmt::Display for RecordIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "record {}: {}", self.index + 1, self.message)
    }
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub path: PathBuf,
    pub force_reload: bool,
    pub strict: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DATA_FILE),
            force_reload: false,
            strict: false,
        }
    }
}

pub fn load_records(path: &Path) -> Result<RecordTable, DataLoadError> {
    let file = File::open(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => DataLoadError::NotFound {
            path: path.to_path_buf(),
        },
        _ => DataLoadError::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;

    let mut reader = ReaderBuilder::new().trim(Trim::All).from_reader(file);
    let headers = reader
        .headers()
        .map_err(|source| DataLoadError::Parse {
            path: path.to_path_buf(),
            line: 1,
            source,
        })?
        .clone();

    let missing = REQUIRED_COLUMNS
        .iter()
        .filter(|column| !headers.iter().any(|h| h == **column))
        .map(|column| column.to_string())
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(DataLoadError::MissingColumns {
            path: path.to_path_buf(),
            columns: missing,
        });
    }

    let mut records = Vec::new();
    for (index, row) in reader.deserialize::<ConsumptionRecord>().enumerate() {
        let record = row.map_err(|source| DataLoadError::Parse {
            path: path.to_path_buf(),
            line: source
                .position()
                .map(|pos| pos.line())
                .unwrap_or(index as u64 + 2),
            source,
        })?;
        records.push(record);
    }

    Ok(RecordTable::new(records))
}

fn record_cache() -> &'static Mutex<HashMap<PathBuf, Arc<RecordTable>>> {
    static CACHE: OnceLock<Mutex<HashMap<PathBuf, Arc<RecordTable>>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Returns the table for `path`, reading the file only on the first call
/// unless `force_reload` is set. Failed loads are never cached.
pub fn load_cached(path: &Path, force_reload: bool) -> Result<Arc<RecordTable>, DataLoadError> {
    if !force_reload {
        let cache = record_cache()
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(table) = cache.get(path) {
            debug!(path = %path.display(), "dataset cache hit");
            return Ok(Arc::clone(table));
        }
    }

    let table = Arc::new(load_records(path)?);
    info!(path = %path.display(), rows = table.len(), "loaded dataset");
    record_cache()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(path.to_path_buf(), Arc::clone(&table));
    Ok(table)
}

pub fn validate_records(records: &[ConsumptionRecord]) -> Vec<RecordIssue> {
    let mut issues = Vec::new();
    for (index, record) in records.iter().enumerate() {
        if record.billed_services > record.total_services {
            issues.push(RecordIssue {
                index,
                message: format!(
                    "billdservices ({}) exceeds totservices ({})",
                    record.billed_services, record.total_services
                ),
            });
        }
        for (column, value) in [("units", record.units), ("load", record.load)] {
            if !value.is_finite() || value < 0.0 {
                issues.push(RecordIssue {
                    index,
                    message: format!("{column} must be a non-negative number, got {value}"),
                });
            }
        }
    }
    issues
}

/// Loads through the cache, then applies value-range checks: issues are
/// logged, or rejected when `strict` is set.
pub fn load_dataset(options: &LoadOptions) -> Result<Arc<RecordTable>, DataLoadError> {
    let table = load_cached(&options.path, options.force_reload)?;
    if table.is_empty() {
        warn!(path = %options.path.display(), "dataset contains no records");
    }
    let issues = validate_records(table.records());
    if issues.is_empty() {
        return Ok(table);
    }
    if options.strict {
        return Err(DataLoadError::InvalidValues {
            path: options.path.clone(),
            issues: issues.iter().map(ToString::to_string).collect(),
        });
    }
    for issue in &issues {
        warn!(path = %options.path.display(), "{issue}");
    }
    Ok(table)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    pub(crate) fn record(
        category: &str,
        circle: &str,
        division: &str,
        subdivision: &str,
        total_services: u64,
        billed_services: u64,
        units: f64,
        load: f64,
    ) -> ConsumptionRecord {
        ConsumptionRecord {
            category: category.to_string(),
            circle: circle.to_string(),
            division: division.to_string(),
            subdivision: subdivision.to_string(),
            total_services,
            billed_services,
            units,
            load,
        }
    }

    fn write_csv(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    const SAMPLE: &str = "\
catdesc,circle,division,subdivision,totservices,billdservices,units,load
A,X,D1,S1,10,8,100.0,5.0
B,X,D1,S2,20,15,50.0,2.5
";

    #[test]
    fn load_records_reads_all_rows() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "consumption.csv", SAMPLE);

        let table = load_records(&path).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(
            table.records()[0],
            record("A", "X", "D1", "S1", 10, 8, 100.0, 5.0)
        );
        assert_eq!(table.records()[1].billed_services, 15);
    }

    #[test]
    fn load_records_ignores_column_order_and_extra_columns() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "shuffled.csv",
            "load, units ,extra,subdivision,division,circle,catdesc,billdservices,totservices\n\
             2.5,50.0,ignored,S2,D1,X,B,15,20\n",
        );

        let table = load_records(&path).unwrap();

        assert_eq!(
            table.records(),
            &[record("B", "X", "D1", "S2", 20, 15, 50.0, 2.5)]
        );
    }

    #[test]
    fn load_records_reports_missing_columns() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "partial.csv",
            "catdesc,circle,division,subdivision,totservices,billdservices\nA,X,D1,S1,1,1\n",
        );

        match load_records(&path) {
            Err(DataLoadError::MissingColumns { columns, .. }) => {
                assert_eq!(columns, vec!["units".to_string(), "load".to_string()]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn load_records_reports_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.csv");
        assert!(matches!(
            load_records(&path),
            Err(DataLoadError::NotFound { .. })
        ));
    }

    #[test]
    fn load_records_reports_bad_row_line() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "bad.csv",
            "catdesc,circle,division,subdivision,totservices,billdservices,units,load\n\
             A,X,D1,S1,10,8,100.0,5.0\n\
             B,X,D1,S2,many,15,50.0,2.5\n",
        );

        match load_records(&path) {
            Err(DataLoadError::Parse { line, .. }) => assert_eq!(line, 3),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn load_records_accepts_whole_float_counts() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "floats.csv",
            "catdesc,circle,division,subdivision,totservices,billdservices,units,load\n\
             A,X,D1,S1,10.0,8.0,100.0,5.0\n",
        );

        let table = load_records(&path).unwrap();

        assert_eq!(table.records()[0].total_services, 10);
        assert_eq!(table.records()[0].billed_services, 8);
    }

    #[test]
    fn load_records_rejects_fractional_counts() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "fraction.csv",
            "catdesc,circle,division,subdivision,totservices,billdservices,units,load\n\
             A,X,D1,S1,10.5,8,100.0,5.0\n",
        );

        match load_records(&path) {
            Err(DataLoadError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn load_dataset_keeps_nan_rows_usable_in_every_view() {
        use crate::aggregator::{
            by_category, by_circle_services, by_division_units, by_subdivision,
            regional_breakdown, sla_by_circle, total_metrics,
        };
        use crate::selector::Metric;

        let dir = TempDir::new().unwrap();
        let mut content = String::from(
            "catdesc,circle,division,subdivision,totservices,billdservices,units,load\n",
        );
        for i in 0..30 {
            let units = if i % 3 == 0 { "NaN".to_string() } else { format!("{i}.5") };
            content.push_str(&format!("C{},X{},D{i},S{i},{i},{i},{units},inf\n", i % 4, i % 2));
        }
        let path = write_csv(&dir, "nan.csv", &content);

        let table = load_dataset(&LoadOptions {
            path,
            ..LoadOptions::default()
        })
        .unwrap();
        let records = table.records();

        assert_eq!(records.len(), 30);
        assert!(records[0].units.is_nan());
        assert!(validate_records(records).len() >= 30);
        assert!(total_metrics(records).units.is_nan());
        assert_eq!(by_category(records).len(), 4);
        assert_eq!(by_circle_services(records).len(), 2);
        assert_eq!(by_division_units(records).len(), 30);
        assert_eq!(sla_by_circle(records).len(), 2);
        assert_eq!(regional_breakdown(records).len(), 30);
        assert_eq!(by_subdivision(records, Metric::Units).len(), 30);
    }

    #[test]
    fn load_records_accepts_header_only_file() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "empty.csv",
            "catdesc,circle,division,subdivision,totservices,billdservices,units,load\n",
        );
        assert!(load_records(&path).unwrap().is_empty());
    }

    #[test]
    fn load_cached_reads_source_once() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "cached.csv", SAMPLE);

        let first = load_cached(&path, false).unwrap();
        std::fs::write(
            &path,
            "catdesc,circle,division,subdivision,totservices,billdservices,units,load\n",
        )
        .unwrap();
        let second = load_cached(&path, false).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.len(), 2);
    }

    #[test]
    fn load_cached_force_reload_bypasses_cache() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "reload.csv", SAMPLE);

        let first = load_cached(&path, false).unwrap();
        std::fs::write(
            &path,
            "catdesc,circle,division,subdivision,totservices,billdservices,units,load\n",
        )
        .unwrap();
        let reloaded = load_cached(&path, true).unwrap();
        let after = load_cached(&path, false).unwrap();

        assert_eq!(first.len(), 2);
        assert!(reloaded.is_empty());
        assert!(Arc::ptr_eq(&reloaded, &after));
    }

    #[test]
    fn load_cached_does_not_cache_failures() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("late.csv");

        assert!(load_cached(&path, false).is_err());
        std::fs::write(&path, SAMPLE).unwrap();
        assert_eq!(load_cached(&path, false).unwrap().len(), 2);
    }

    #[test]
    fn validate_records_flags_billed_over_total_and_negative_values() {
        let records = vec![
            record("A", "X", "D1", "S1", 10, 12, 100.0, 5.0),
            record("A", "X", "D1", "S2", 10, 5, -1.0, 5.0),
            record("A", "X", "D1", "S3", 10, 10, 1.0, 1.0),
        ];

        let issues = validate_records(&records);

        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].index, 0);
        assert_eq!(
            issues[0].to_string(),
            "record 1: billdservices (12) exceeds totservices (10)"
        );
        assert_eq!(issues[1].index, 1);
    }

    #[test]
    fn load_dataset_strict_rejects_invalid_values() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "strict.csv",
            "catdesc,circle,division,subdivision,totservices,billdservices,units,load\n\
             A,X,D1,S1,5,8,100.0,5.0\n",
        );

        let lenient = load_dataset(&LoadOptions {
            path: path.clone(),
            ..LoadOptions::default()
        });
        assert_eq!(lenient.unwrap().len(), 1);

        let strict = load_dataset(&LoadOptions {
            path,
            strict: true,
            ..LoadOptions::default()
        });
        assert!(matches!(strict, Err(DataLoadError::InvalidValues { .. })));
    }

    #[test]
    fn repeated_loads_yield_identical_views() {
        use crate::aggregator::{by_category, by_circle_services, total_metrics};

        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "twice.csv", SAMPLE);
        let options = LoadOptions {
            path,
            ..LoadOptions::default()
        };

        let first = load_dataset(&options).unwrap();
        let second = load_dataset(&LoadOptions {
            force_reload: true,
            ..options.clone()
        })
        .unwrap();

        assert_eq!(total_metrics(first.records()), total_metrics(second.records()));
        assert_eq!(by_category(first.records()), by_category(second.records()));
        assert_eq!(
            by_circle_services(first.records()),
            by_circle_services(second.records())
        );
    }

    #[test]
    fn distinct_circles_keeps_first_appearance_order() {
        let table = RecordTable::new(vec![
            record("A", "South", "D1", "S1", 1, 1, 1.0, 1.0),
            record("A", "North", "D2", "S2", 1, 1, 1.0, 1.0),
            record("B", "South", "D3", "S3", 1, 1, 1.0, 1.0),
        ]);
        assert_eq!(table.distinct_circles(), vec!["South", "North"]);
    }
}
