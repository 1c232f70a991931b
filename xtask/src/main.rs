use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::Command;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "hoh workspace automation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the lock-strategy benchmarks and write a comparison report
    Bench {
        /// Run quickly (lower sample size/time)
        #[arg(long, default_value_t = false)]
        quick: bool,

        /// Generate report only (skip running benchmarks)
        #[arg(long, default_value_t = false)]
        report_only: bool,

        /// Strategy every other column is compared against
        #[arg(long, default_value = "global")]
        baseline: String,
    },
}

const BENCHES: &[&str] = &["list_benchmark", "lock_benchmark"];

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Bench { quick, report_only, baseline } => {
            if !report_only {
                run_benchmarks(quick)?;
            }
            generate_report(&baseline)?;
        }
    }

    Ok(())
}

fn run_benchmarks(quick: bool) -> Result<()> {
    println!("Compiling benchmarks...");
    let status = Command::new("cargo")
        .args(["bench", "--no-run"])
        .status()?;
    if !status.success() {
        anyhow::bail!("Failed to compile benchmarks");
    }

    for bench in BENCHES {
        println!("\n>>> Running {bench}");
        let start = Instant::now();

        let mut cmd = Command::new("cargo");
        cmd.arg("bench").arg("--bench").arg(bench);

        // Args for the test runner (Criterion) go after --
        cmd.arg("--");
        if quick {
            cmd.arg("--measurement-time").arg("0.5");
            cmd.arg("--noplot");
            cmd.arg("--sample-size").arg("10");
        }

        let status = cmd.status().with_context(|| format!("Failed to run {bench}"))?;
        if status.success() {
            println!("Finished {bench} in {:.2?}", start.elapsed());
        } else {
            eprintln!("Warning: {bench} failed");
        }
    }

    Ok(())
}

/// The parts of criterion's `benchmark.json` the report needs.
#[derive(Deserialize)]
struct BenchmarkInfo {
    group_id: String,
    function_id: Option<String>,
    value_str: Option<String>,
    throughput: Option<ThroughputInfo>,
}

#[derive(Deserialize)]
struct ThroughputInfo {
    #[serde(rename = "Elements")]
    elements: Option<f64>,
}

#[derive(Deserialize)]
struct Estimates {
    mean: Estimate,
}

#[derive(Deserialize)]
struct Estimate {
    point_estimate: f64,
}

/// (workload, parameter) -> strategy -> ops/s
type Results = BTreeMap<(String, String), BTreeMap<String, f64>>;

fn generate_report(baseline: &str) -> Result<()> {
    println!("\n>>> Generating Report...");
    let criterion_dir = Path::new("target/criterion");
    if !criterion_dir.exists() {
        eprintln!("No criterion output found at {}", criterion_dir.display());
        return Ok(());
    }

    let mut results = Results::new();
    collect_results(criterion_dir, &mut results);

    let strategies: BTreeSet<&String> = results.values().flat_map(BTreeMap::keys).collect();

    let report_path = Path::new("benchmark_results/report.md");
    if let Some(parent) = report_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(report_path)?;

    writeln!(file, "# Lock Strategy Benchmark Report")?;
    writeln!(file)?;
    writeln!(file, "Relative figures are against `{baseline}`.")?;
    writeln!(file)?;

    write!(file, "| Workload | Threads |")?;
    for strategy in &strategies {
        write!(file, " {strategy} (Ops/s) | vs {baseline} |")?;
    }
    writeln!(file)?;

    write!(file, "|---|---|")?;
    for _ in &strategies {
        write!(file, "---|---|")?;
    }
    writeln!(file)?;

    for ((workload, param), row) in &results {
        write!(file, "| {workload} | {param} |")?;
        let base = row.get(baseline).copied().unwrap_or(0.0);
        for strategy in &strategies {
            match row.get(*strategy) {
                Some(ops) => {
                    let rel = if base > 0.0 { ops / base } else { 0.0 };
                    write!(file, " {} | **{rel:.2}x** |", format_ops(*ops))?;
                }
                None => write!(file, " N/A | - |")?,
            }
        }
        writeln!(file)?;
    }

    println!("Report written to {}", report_path.display());
    Ok(())
}

fn format_ops(ops: f64) -> String {
    if ops > 1_000_000.0 {
        format!("{:.2}M", ops / 1_000_000.0)
    } else if ops > 1_000.0 {
        format!("{:.2}K", ops / 1_000.0)
    } else {
        format!("{ops:.0}")
    }
}

fn collect_results(dir: &Path, results: &mut Results) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        // Structure: .../<group>/<function>/<value>/new/{benchmark,estimates}.json
        if path.file_name().and_then(|s| s.to_str()) == Some("new") {
            if let Some((key, strategy, ops)) = read_measurement(&path) {
                results.entry(key).or_default().insert(strategy, ops);
            }
        } else {
            collect_results(&path, results);
        }
    }
}

fn read_measurement(dir: &Path) -> Option<((String, String), String, f64)> {
    let info: BenchmarkInfo = serde_json::from_str(&fs::read_to_string(dir.join("benchmark.json")).ok()?).ok()?;
    let estimates: Estimates = serde_json::from_str(&fs::read_to_string(dir.join("estimates.json")).ok()?).ok()?;

    let time_ns = estimates.mean.point_estimate;
    if time_ns <= 0.0 {
        return None;
    }
    let elements = info.throughput.and_then(|t| t.elements).unwrap_or(1.0);

    // Groups named `<workload>/<strategy>` carry the strategy in the group id.
    let (workload, strategy, param) = match (info.group_id.split_once('/'), info.function_id) {
        (Some((workload, strategy)), Some(function)) => (workload.to_string(), strategy.to_string(), function),
        (_, Some(function)) => (info.group_id.clone(), function, info.value_str.clone().unwrap_or_default()),
        (_, None) => return None,
    };
    Some(((workload, param), strategy, elements * 1e9 / time_ns))
}
