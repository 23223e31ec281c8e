use std::collections::BTreeMap;
use std::fs;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueHint};
use phenocycle::{
    analyse_batch, BatchParams, BatchSummary, CycleBoundary, CycleRecord, LocationAnalysis,
    LocationInput, PhenoError, Series,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Per-cycle phenology descriptor CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Describe every minimum-to-minimum cycle of every location
    Cycles(CyclesArgs),
    /// Validate series CSV input and report per-location sampling
    Check(CheckArgs),
}

#[derive(Parser, Debug)]
struct CyclesArgs {
    /// Series CSV with columns location,timestamp,value (`-` for stdin)
    #[arg(long, value_hint = ValueHint::FilePath)]
    series: PathBuf,

    /// Boundary CSV with columns location,start,end
    #[arg(long, value_hint = ValueHint::FilePath)]
    boundaries: PathBuf,

    /// Output path (`-` for stdout)
    #[arg(short, long, default_value = "cycles.csv", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Write JSON instead of CSV
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,

    /// Optional params JSON (margin_factor, parallel)
    #[arg(long, value_hint = ValueHint::FilePath)]
    params: Option<PathBuf>,

    /// Buffer margin as a fraction of cycle length (overrides --params)
    #[arg(long)]
    margin_factor: Option<f64>,

    /// Process locations on a single thread
    #[arg(long, action = ArgAction::SetTrue)]
    serial: bool,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Parser, Debug)]
struct CheckArgs {
    /// Series CSV with columns location,timestamp,value (`-` for stdin)
    #[arg(required = true, value_hint = ValueHint::FilePath)]
    series: PathBuf,

    /// Output report path (`-` for stdout)
    #[arg(short, long, default_value = "series_check.txt", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Debug, Deserialize)]
struct SeriesRow {
    location: String,
    timestamp: i64,
    value: f64,
}

#[derive(Debug, Deserialize)]
struct BoundaryRow {
    location: String,
    start: i64,
    end: i64,
}

#[derive(Debug, Serialize)]
struct CycleRow {
    location: String,
    start: i64,
    end: i64,
    cycle_length_s: i64,
    standing_biomass: Option<f64>,
    baseline_integral: Option<f64>,
    combine_rule: Option<&'static str>,
    active_fraction_integral: Option<f64>,
    barycenter_epoch: Option<f64>,
    barycenter_date: Option<String>,
    dispersion_s: Option<f64>,
    dispersion_days: Option<f64>,
    max_value_timestamp: Option<i64>,
    reference_year: Option<i32>,
    error_flag: bool,
    error_kind: Option<&'static str>,
    error: Option<String>,
    warning: Option<&'static str>,
}

impl CycleRow {
    fn new(location: &str, record: &CycleRecord) -> Self {
        let boundary = record.boundary();
        Self {
            location: location.to_string(),
            start: boundary.start,
            end: boundary.end,
            cycle_length_s: record.cycle_length(),
            standing_biomass: record.standing_biomass(),
            baseline_integral: record.baseline_integral(),
            combine_rule: record.combine_rule().map(|rule| rule.as_str()),
            active_fraction_integral: record.active_fraction_integral(),
            barycenter_epoch: record.barycenter_epoch(),
            barycenter_date: record.barycenter_date().map(|d| d.to_rfc3339()),
            dispersion_s: record.dispersion_seconds(),
            dispersion_days: record
                .dispersion_duration()
                .map(|d| d.num_milliseconds() as f64 / 86_400_000.0),
            max_value_timestamp: record.max_value_timestamp(),
            reference_year: record.reference_year(),
            error_flag: record.error_flag(),
            error_kind: record.error().map(|e| e.kind().as_str()),
            error: record.error().map(|e| e.to_string()),
            warning: record.warning().map(|w| w.as_str()),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = match &cli.command {
        Command::Cycles(args) => args.verbose,
        Command::Check(args) => args.verbose,
    };
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match cli.command {
        Command::Cycles(args) => handle_cycles(args),
        Command::Check(args) => handle_check(args),
    }
}

fn handle_cycles(args: CyclesArgs) -> Result<()> {
    let mut params = match args.params.as_ref() {
        Some(path) => load_params(path)?,
        None => BatchParams::default(),
    };
    if let Some(margin) = args.margin_factor {
        params.cycle.margin_factor = margin;
    }
    if args.serial {
        params.parallel = false;
    }
    params
        .cycle
        .validate()
        .context("invalid cycle parameters")?;

    let t_read = Instant::now();
    let series = read_series(&args.series)?;
    let boundaries = read_boundaries(&args.boundaries)?;
    let inputs = build_inputs(series, boundaries);
    if inputs.is_empty() {
        return Err(anyhow!("no location has both a valid series and boundaries"));
    }
    if args.verbose {
        info!(
            "Read stage: {:.1} ms ({} locations)",
            t_read.elapsed().as_secs_f64() * 1000.0,
            inputs.len()
        );
    }

    let t_compute = Instant::now();
    let analyses = analyse_batch(&inputs, &params)?;
    let summary = BatchSummary::from_analyses(&analyses);
    if args.verbose {
        info!(
            "Compute stage: {:.1} ms",
            t_compute.elapsed().as_secs_f64() * 1000.0
        );
    }
    log_summary(&summary);

    let rows = collect_rows(&analyses);
    if args.output.as_os_str() == "-" {
        let stdout = io::stdout();
        write_rows(&rows, stdout.lock(), args.json)?;
    } else {
        let file = File::create(&args.output)
            .with_context(|| format!("failed to create {}", args.output.display()))?;
        write_rows(&rows, file, args.json)?;
        info!("Wrote {} cycles: {}", rows.len(), args.output.display());
    }
    Ok(())
}

fn load_params(path: &Path) -> Result<BatchParams> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read params {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid params JSON", path.display()))
}

fn open_input(path: &Path) -> Result<Box<dyn Read>> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(io::stdin()));
    }
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    Ok(Box::new(file))
}

/// Samples grouped by location, in file order.
fn read_series(path: &Path) -> Result<BTreeMap<String, (Vec<i64>, Vec<f64>)>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(open_input(path)?);
    let mut out: BTreeMap<String, (Vec<i64>, Vec<f64>)> = BTreeMap::new();
    for (line, row) in reader.deserialize::<SeriesRow>().enumerate() {
        let row = row.with_context(|| format!("{}: bad series row {}", path.display(), line + 1))?;
        let entry = out.entry(row.location).or_default();
        entry.0.push(row.timestamp);
        entry.1.push(row.value);
    }
    Ok(out)
}

fn read_boundaries(path: &Path) -> Result<BTreeMap<String, Vec<CycleBoundary>>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(open_input(path)?);
    let mut out: BTreeMap<String, Vec<CycleBoundary>> = BTreeMap::new();
    for (line, row) in reader.deserialize::<BoundaryRow>().enumerate() {
        let row =
            row.with_context(|| format!("{}: bad boundary row {}", path.display(), line + 1))?;
        // Malformed boundaries are kept; the engine flags them per cycle.
        out.entry(row.location).or_default().push(CycleBoundary {
            start: row.start,
            end: row.end,
        });
    }
    Ok(out)
}

fn build_inputs(
    series: BTreeMap<String, (Vec<i64>, Vec<f64>)>,
    mut boundaries: BTreeMap<String, Vec<CycleBoundary>>,
) -> Vec<LocationInput> {
    let mut inputs = Vec::with_capacity(series.len());
    for (id, (times, values)) in series {
        let Some(cycles) = boundaries.remove(&id) else {
            warn!("Location {} has no cycle boundaries; skipping", id);
            continue;
        };
        match Series::new(times, values) {
            Ok(series) => inputs.push(LocationInput {
                id,
                series,
                boundaries: cycles,
            }),
            Err(err) => warn!("Skipping location {}: {}", id, err),
        }
    }
    for id in boundaries.keys() {
        warn!("Boundaries for unknown location {}; skipping", id);
    }
    inputs
}

fn collect_rows(analyses: &[LocationAnalysis]) -> Vec<CycleRow> {
    analyses
        .iter()
        .flat_map(|a| a.cycles.iter().map(move |c| CycleRow::new(&a.id, c)))
        .collect()
}

fn write_rows<W: Write>(rows: &[CycleRow], writer: W, json: bool) -> Result<()> {
    if json {
        let mut writer = io::BufWriter::new(writer);
        serde_json::to_writer_pretty(&mut writer, rows)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        return Ok(());
    }
    let mut writer = csv::Writer::from_writer(writer);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn log_summary(summary: &BatchSummary) {
    info!(
        "Described {} cycles over {} locations: {} complete, {} errored",
        summary.cycles,
        summary.locations,
        summary.complete,
        summary.errored()
    );
    for (kind, count) in &summary.errors {
        warn!("  {} cycles with {} errors", count, kind);
    }
    for (warning, count) in &summary.warnings {
        info!("  {} cycles with warning {}", count, warning);
    }
}

#[derive(Debug, PartialEq)]
struct SeriesCheck {
    samples: usize,
    span_s: i64,
    median_step_s: Option<i64>,
    problem: Option<PhenoError>,
}

fn check_series(times: &[i64], values: &[f64]) -> SeriesCheck {
    let mut steps: Vec<i64> = times.windows(2).map(|w| w[1] - w[0]).collect();
    steps.sort_unstable();
    SeriesCheck {
        samples: times.len(),
        span_s: match (times.first(), times.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0,
        },
        median_step_s: steps.get(steps.len() / 2).copied(),
        problem: Series::new(times.to_vec(), values.to_vec()).err(),
    }
}

fn handle_check(args: CheckArgs) -> Result<()> {
    let series = read_series(&args.series)?;
    let mut report = String::new();
    let mut invalid = 0usize;
    for (id, (times, values)) in &series {
        let check = check_series(times, values);
        report.push_str(&format!("LOCATION: {}\n", id));
        report.push_str(&format!("  samples: {}\n", check.samples));
        report.push_str(&format!("  span_s: {}\n", check.span_s));
        report.push_str(&format!(
            "  median_step_s: {}\n",
            check.median_step_s.map_or("n/a".into(), |s| s.to_string())
        ));
        match check.problem {
            Some(err) => {
                invalid += 1;
                report.push_str(&format!("  status: invalid ({})\n", err));
            }
            None => report.push_str("  status: ok\n"),
        }
        report.push('\n');
    }

    if args.output.as_os_str() == "-" {
        io::stdout().write_all(report.as_bytes())?;
    } else {
        fs::write(&args.output, report)
            .with_context(|| format!("failed to write {}", args.output.display()))?;
        info!("Series report written: {}", args.output.display());
    }
    if invalid > 0 {
        warn!("{} of {} locations failed validation", invalid, series.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn reads_and_groups_series_rows() {
        let file = write_temp("location,timestamp,value\nb,0,1.0\na,0,2.0\nb,10,3.0\n");
        let series = read_series(file.path()).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series["b"], (vec![0, 10], vec![1.0, 3.0]));
    }

    #[test]
    fn build_inputs_skips_invalid_and_unmatched_locations() {
        let mut series = BTreeMap::new();
        series.insert("ok".to_string(), (vec![0, 1, 2], vec![1.0, 2.0, 1.0]));
        series.insert("bad".to_string(), (vec![0, 0], vec![1.0, 2.0]));
        series.insert("lonely".to_string(), (vec![0, 1], vec![1.0, 2.0]));
        let mut boundaries = BTreeMap::new();
        boundaries.insert("ok".to_string(), vec![CycleBoundary { start: 0, end: 2 }]);
        boundaries.insert("bad".to_string(), vec![CycleBoundary { start: 0, end: 2 }]);
        let inputs = build_inputs(series, boundaries);
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].id, "ok");
    }

    #[test]
    fn cycle_rows_round_through_csv() {
        let series = write_temp(
            "location,timestamp,value\n\
             px,1000,5\npx,1001,20\npx,1002,30\npx,1003,10\npx,1004,5\n",
        );
        let bounds = write_temp("location,start,end\npx,1000,1004\npx,1004,1000\n");
        let inputs = build_inputs(
            read_series(series.path()).unwrap(),
            read_boundaries(bounds.path()).unwrap(),
        );
        let params = BatchParams {
            parallel: false,
            ..BatchParams::default()
        };
        let analyses = analyse_batch(&inputs, &params).unwrap();
        let rows = collect_rows(&analyses);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].standing_biomass, Some(70.0));
        assert_eq!(rows[0].max_value_timestamp, Some(1002));
        assert!(!rows[0].error_flag);
        assert!(rows[1].error_flag);
        assert_eq!(rows[1].error_kind, Some("boundary"));

        let mut buf = Vec::new();
        write_rows(&rows, &mut buf, false).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("location,start,end,cycle_length_s"));
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn check_reports_sampling_and_problems() {
        let check = check_series(&[0, 10, 20, 40], &[1.0; 4]);
        assert_eq!(check.samples, 4);
        assert_eq!(check.span_s, 40);
        assert_eq!(check.median_step_s, Some(10));
        assert!(check.problem.is_none());

        let check = check_series(&[0, 10, 5], &[1.0; 3]);
        assert_eq!(
            check.problem,
            Some(PhenoError::NonMonotonicSeries { index: 2 })
        );
    }
}
