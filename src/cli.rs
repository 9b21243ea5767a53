use crate::aggregator::{
    CategoryRow, CircleServicesRow, DivisionUnitsRow, RegionRow, SlaRow, SubdivisionRow,
    TotalMetrics, by_category, by_circle_services, by_division_units, by_subdivision,
    regional_breakdown, sla_by_circle, total_metrics,
};
use crate::data_loader::{ConsumptionRecord, DEFAULT_DATA_FILE, LoadOptions, load_dataset};
use crate::selector::{ALL_CIRCLES, Metric, circle_choices, resolve_filter};
use crate::table::{
    TableMode, build_category_rows, build_circle_services_rows, build_division_units_rows,
    build_metric_rows, build_region_rows, build_sla_rows, build_subdivision_rows,
};
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use comfy_table::Table;
use serde::Serialize;
use std::path::PathBuf;
use terminal_size::terminal_size;
use tracing::debug;

#[derive(Parser)]
#[command(
    name = "consumption-dash",
    version,
    about = "Consumption analysis report over a utility services dataset"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Full report: key metrics, category, regional, SLA, breakdown and explorer views
    Dashboard(ViewArgs),
    /// Selected metric by subdivision, optionally limited to one circle
    Explore(ViewArgs),
    /// List the circle choices accepted by --circle
    Circles(CirclesArgs),
}

#[derive(Args, Clone)]
pub struct CommonArgs {
    #[arg(short, long, default_value = DEFAULT_DATA_FILE, help = "Path to the consumption CSV")]
    file: PathBuf,
    #[arg(short = 'j', long, help = "Output in JSON format")]
    json: bool,
    #[arg(long, default_value_t = false, help = "Force compact mode")]
    compact: bool,
    #[arg(
        long,
        default_value_t = false,
        help = "Reject datasets with negative values or billed > total services"
    )]
    strict: bool,
}

#[derive(Args, Clone)]
pub struct ViewArgs {
    #[command(flatten)]
    common: CommonArgs,
    #[arg(short, long, default_value = ALL_CIRCLES, help = "Circle to explore")]
    circle: String,
    #[arg(
        short,
        long,
        default_value = "Total Services",
        help = "Metric to explore: \"Total Services\", \"Billed Services\" or \"Units Consumed\""
    )]
    metric: Metric,
}

#[derive(Args, Clone)]
pub struct CirclesArgs {
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DashboardOutput {
    key_metrics: TotalMetrics,
    categories: Vec<CategoryRow>,
    circle_services: Vec<CircleServicesRow>,
    division_units: Vec<DivisionUnitsRow>,
    sla_by_circle: Vec<SlaRow>,
    regional_breakdown: Vec<RegionRow>,
    explorer: ExplorerOutput,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExplorerOutput {
    circle: String,
    metric: String,
    column: String,
    subdivisions: Vec<SubdivisionRow>,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Dashboard(args) => run_dashboard(args),
        Command::Explore(args) => run_explore(args),
        Command::Circles(args) => run_circles(args),
    }
}

fn load_options(args: &CommonArgs) -> LoadOptions {
    LoadOptions {
        path: args.file.clone(),
        strict: args.strict,
        ..LoadOptions::default()
    }
}

fn explorer_output(records: &[ConsumptionRecord], circle: &str, metric: Metric) -> ExplorerOutput {
    let filtered = resolve_filter(records, circle);
    debug!(circle, metric = metric.column(), rows = filtered.len(), "explorer selection");
    ExplorerOutput {
        circle: circle.to_string(),
        metric: metric.label().to_string(),
        column: metric.column().to_string(),
        subdivisions: by_subdivision(&filtered, metric),
    }
}

fn run_dashboard(args: ViewArgs) -> Result<()> {
    let metric = args.metric;
    let table = load_dataset(&load_options(&args.common))?;
    let records = table.records();

    let output = DashboardOutput {
        key_metrics: total_metrics(records),
        categories: by_category(records),
        circle_services: by_circle_services(records),
        division_units: by_division_units(records),
        sla_by_circle: sla_by_circle(records),
        regional_breakdown: regional_breakdown(records),
        explorer: explorer_output(records, &args.circle, metric),
    };

    if args.common.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let mode = table_mode(args.common.compact);
    println!("Consumption Analysis Dashboard");

    print_section("Key Metrics Overview");
    println!(
        "{}",
        report_table(&["Metric", "Value"], None, build_metric_rows(&output.key_metrics))
    );

    print_section("Category-wise Analysis");
    println!(
        "{}",
        report_table(
            &["Category", "Total Services", "Units"],
            None,
            build_category_rows(&output.categories)
        )
    );

    print_section("Regional Trends");
    println!("Total Services by Circle");
    println!(
        "{}",
        report_table(
            &["Circle", "Total Services"],
            bar_header(mode),
            build_circle_services_rows(&output.circle_services, mode)
        )
    );
    println!("Units Consumed by Division");
    println!(
        "{}",
        report_table(
            &["Division", "Units Consumed"],
            bar_header(mode),
            build_division_units_rows(&output.division_units, mode)
        )
    );

    print_section("SLA Compliance Overview");
    println!("Billed vs Total Services by Circle");
    println!(
        "{}",
        report_table(
            &["Circle", "Billed Services", "Total Services", "Billed %"],
            bar_header(mode),
            build_sla_rows(&output.sla_by_circle, mode)
        )
    );

    print_section("Regional Breakdown");
    println!(
        "{}",
        report_table(
            &["Circle / Division", "Total Services", "Share"],
            None,
            build_region_rows(&output.regional_breakdown)
        )
    );

    print_section("Interactive Data Explorer");
    print_explorer(&output.explorer, metric, mode);

    if matches!(mode, TableMode::Compact) {
        println!("\nRunning in Compact Mode");
        println!("Expand terminal width to see bar charts");
    }

    Ok(())
}

fn run_explore(args: ViewArgs) -> Result<()> {
    let metric = args.metric;
    let table = load_dataset(&load_options(&args.common))?;
    let output = explorer_output(table.records(), &args.circle, metric);

    if args.common.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    print_explorer(&output, metric, table_mode(args.common.compact));
    Ok(())
}

fn run_circles(args: CirclesArgs) -> Result<()> {
    let table = load_dataset(&load_options(&args.common))?;
    let choices = circle_choices(&table);

    if args.common.json {
        println!("{}", serde_json::to_string_pretty(&choices)?);
        return Ok(());
    }

    for choice in choices {
        println!("{choice}");
    }
    Ok(())
}

fn print_explorer(output: &ExplorerOutput, metric: Metric, mode: TableMode) {
    println!("{metric} by Subdivision (circle: {})", output.circle);
    if output.subdivisions.is_empty() {
        println!("No data for this selection.");
        return;
    }
    println!(
        "{}",
        report_table(
            &["Subdivision", metric.label()],
            bar_header(mode),
            build_subdivision_rows(&output.subdivisions, metric, mode)
        )
    );
}

fn print_section(title: &str) {
    println!();
    println!("{title}");
    println!("{}", "─".repeat(title.chars().count()));
}

fn bar_header(mode: TableMode) -> Option<&'static str> {
    match mode {
        TableMode::Full => Some(""),
        TableMode::Compact => None,
    }
}

fn table_mode(force_compact: bool) -> TableMode {
    if force_compact {
        return TableMode::Compact;
    }
    let width = terminal_size().map(|(w, _)| w.0 as usize).unwrap_or(120);
    if width < 100 {
        TableMode::Compact
    } else {
        TableMode::Full
    }
}

fn report_table(headers: &[&str], extra: Option<&str>, rows: Vec<Vec<String>>) -> Table {
    let mut header_row = headers.to_vec();
    if let Some(extra) = extra {
        header_row.push(extra);
    }

    let mut table = Table::new();
    table.load_preset("││──╞═╪╡│─┼├┤┬┴┌┐└┘");
    table.set_header(header_row);
    for row in rows {
        table.add_row(row);
    }
    table
}
