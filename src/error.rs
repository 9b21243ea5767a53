use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    #[error("dataset not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("failed to read dataset {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("dataset {} is missing required columns: {}", path.display(), columns.join(", "))]
    MissingColumns { path: PathBuf, columns: Vec<String> },
    #[error("failed to parse {} at line {line}: {source}", path.display())]
    Parse {
        path: PathBuf,
        line: u64,
        #[source]
        source: csv::Error,
    },
    #[error("dataset {} has {} invalid value(s); first: {}", path.display(), issues.len(), first_issue(issues))]
    InvalidValues { path: PathBuf, issues: Vec<String> },
}

fn first_issue(issues: &[String]) -> &str {
    issues.first().map(String::as_str).unwrap_or("")
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown metric: {label}")]
pub struct UnknownMetricError {
    pub label: String,
}
