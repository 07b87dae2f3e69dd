//! LandDelta CLI - multi-temporal land-cover change detection

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use landdelta_algorithms::imagery::IndexKind;
use landdelta_algorithms::pipeline::{
    compute_year_series, export_change_report, run_change_branch, ChangeReport, ExportedRaster,
    PipelineConfig,
};
use landdelta_algorithms::temporal::YearSeries;
use landdelta_core::source::CatalogSource;
use landdelta_core::DateRange;

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "landdelta")]
#[command(author, version, about = "Land-cover change detection from multi-temporal imagery", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Pipeline configuration (JSON); defaults apply to missing fields
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Scene catalog (JSON) listing per-band GeoTIFFs
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Worker threads (default: all cores)
    #[arg(short, long, global = true)]
    threads: Option<usize>,

    /// Also write the results as JSON to this file
    #[arg(long, global = true)]
    json: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// NDVI and NDBI change maps, change masks and area totals
    Change {
        /// Output directory (overrides the configured one)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Also write the vegetation-loss and new-urban masks
        #[arg(long)]
        masks: bool,
        /// Skip writing rasters; only report areas
        #[arg(long)]
        no_export: bool,
    },
    /// Yearly spatial mean of an index
    Series {
        /// Index: ndvi or ndbi (default: configured)
        #[arg(short, long)]
        index: Option<String>,
        /// First year (overrides the configured one)
        #[arg(long)]
        from: Option<i32>,
        /// Last year (overrides the configured one)
        #[arg(long)]
        to: Option<i32>,
    },
    /// Change branch and series branch together
    Run {
        /// Output directory (overrides the configured one)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List catalog scenes passing the epoch and cloud filters
    Scenes {
        /// List this calendar year instead of the two epochs
        #[arg(short, long)]
        year: Option<i32>,
    },
    /// Print the effective configuration as JSON
    Config,
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn load_config(path: Option<&Path>, threads: Option<usize>) -> Result<PipelineConfig> {
    let mut config = match path {
        Some(p) => PipelineConfig::from_json_file(p)
            .with_context(|| format!("Failed to load config {}", p.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(n) = threads {
        config.threads = Some(n);
        landdelta_parallel::set_num_threads(n);
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn open_catalog(path: Option<&Path>) -> Result<CatalogSource> {
    let path = path.ok_or_else(|| anyhow!("--catalog <file> is required for this command"))?;
    let pb = spinner("Reading scene catalog...");
    let source = CatalogSource::open(path)
        .with_context(|| format!("Failed to read catalog {}", path.display()))?;
    pb.finish_and_clear();
    info!("Catalog: {} scenes", source.entries().len());
    Ok(source)
}

fn parse_index(s: &str) -> Result<IndexKind> {
    match s.to_lowercase().as_str() {
        "ndvi" | "vegetation" => Ok(IndexKind::Ndvi),
        "ndbi" | "built_up" | "urban" => Ok(IndexKind::Ndbi),
        _ => anyhow::bail!("Unknown index: {}. Use ndvi or ndbi.", s),
    }
}

fn print_areas(report: &ChangeReport) {
    let (baseline, current) = report_epochs(report);
    println!("Change {} vs {}:", current, baseline);
    for change in &report.changes {
        match change.area_km2 {
            Some(km2) => println!(
                "  {} ({} {}): {:.4} km²",
                change.label, change.index, change.threshold, km2
            ),
            None => println!("  {}: n/a (no scenes in an epoch)", change.label),
        }
    }
}

fn report_epochs(report: &ChangeReport) -> (String, String) {
    report
        .changes
        .iter()
        .find_map(|c| c.product.as_ref())
        .map(|p| (p.baseline.range.to_string(), p.current.range.to_string()))
        .unwrap_or_else(|| ("?".into(), "?".into()))
}

fn print_series(series: &YearSeries) {
    println!("{} series:", series.index);
    for entry in &series.entries {
        match entry.value {
            Some(v) => println!("  {}  {:>8.4}  ({} scenes)", entry.year, v, entry.image_count),
            None => println!("  {}  {:>8}  ({} scenes)", entry.year, "missing", entry.image_count),
        }
    }
}

fn print_exports(written: &[ExportedRaster]) {
    for file in written {
        println!("Saved to: {} ({} x {})", file.path.display(), file.cols, file.rows);
    }
}

fn write_json(path: Option<&Path>, value: serde_json::Value) -> Result<()> {
    if let Some(path) = path {
        let text = serde_json::to_string_pretty(&value)?;
        std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Results written to: {}", path.display());
    }
    Ok(())
}

fn change_branch(source: &CatalogSource, config: &PipelineConfig) -> Result<ChangeReport> {
    let pb = spinner("Compositing epochs and classifying change...");
    let report = run_change_branch(source, config).context("Change detection failed")?;
    pb.finish_and_clear();
    Ok(report)
}

fn export(report: &ChangeReport, config: &PipelineConfig) -> Result<Vec<ExportedRaster>> {
    let pb = spinner("Writing change rasters...");
    let written = export_change_report(report, config).context("Failed to write outputs")?;
    pb.finish_and_clear();
    Ok(written)
}

fn done(elapsed: std::time::Duration) {
    println!("  Processing time: {:.2?}", elapsed);
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let mut config = load_config(cli.config.as_deref(), cli.threads)?;
    let json_path = cli.json.as_deref();

    match cli.command {
        Commands::Change {
            output,
            masks,
            no_export,
        } => {
            if let Some(dir) = output {
                config.export.directory = dir;
            }
            config.export.write_masks |= masks;
            let source = open_catalog(cli.catalog.as_deref())?;

            let start = Instant::now();
            let report = change_branch(&source, &config)?;
            let written = if no_export {
                Vec::new()
            } else {
                export(&report, &config)?
            };
            let elapsed = start.elapsed();

            print_areas(&report);
            print_exports(&written);
            done(elapsed);
            write_json(json_path, serde_json::json!({ "areas": report.areas }))?;
        }

        Commands::Series { index, from, to } => {
            if let Some(year) = from {
                config.series.year_start = year;
            }
            if let Some(year) = to {
                config.series.year_end = year;
            }
            let kind = match index {
                Some(s) => parse_index(&s)?,
                None => config.series.index,
            };
            config.validate().context("Invalid series range")?;
            let source = open_catalog(cli.catalog.as_deref())?;

            let start = Instant::now();
            let pb = spinner("Compositing yearly series...");
            let series = compute_year_series(&source, &config, kind).context("Series extraction failed")?;
            pb.finish_and_clear();

            print_series(&series);
            done(start.elapsed());
            write_json(json_path, serde_json::json!({ "series": series }))?;
        }

        Commands::Run { output } => {
            if let Some(dir) = output {
                config.export.directory = dir;
            }
            let source = open_catalog(cli.catalog.as_deref())?;
            let kind = config.series.index;

            let start = Instant::now();
            let pb = spinner("Running change and series branches...");
            let (report, series) = rayon::join(
                || run_change_branch(&source, &config),
                || compute_year_series(&source, &config, kind),
            );
            pb.finish_and_clear();
            let report = report.context("Change detection failed")?;
            let series = series.context("Series extraction failed")?;
            let written = export(&report, &config)?;

            print_areas(&report);
            print_series(&series);
            print_exports(&written);
            done(start.elapsed());
            write_json(
                json_path,
                serde_json::json!({ "areas": report.areas, "series": series }),
            )?;
        }

        Commands::Scenes { year } => {
            let source = open_catalog(cli.catalog.as_deref())?;
            let ranges: Vec<DateRange> = match year {
                Some(y) => vec![DateRange::calendar_year(y)?],
                None => vec![config.baseline, config.current],
            };
            for range in ranges {
                let entries = source.matching(&range, config.max_cloud_percent);
                println!(
                    "{}: {} scenes below {}% cloud cover",
                    range,
                    entries.len(),
                    config.max_cloud_percent
                );
                for e in entries {
                    let bands: Vec<String> = e.bands.keys().map(|b| b.to_string()).collect();
                    println!("  {}  {}  {:>5.1}%  [{}]", e.id, e.date, e.cloud_cover, bands.join(", "));
                }
            }
        }

        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
