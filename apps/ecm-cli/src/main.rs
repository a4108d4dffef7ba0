use clap::{Parser, Subcommand};
use ecm_app::{
    AppResult, BatchOptions, BatchProgressEvent, BatchRequest, BatchStage, BatchTimingSummary,
    CurveOrigin, analyze_label, interpolate_parameters, list_runs, load_config, load_run,
    open_dataset, pulse_report, resolve_curve, resolve_output_dir, run_batch_with_progress,
};
use ecm_fit::CancelToken;
use ecm_ocv::OcvCache;
use ecm_project::{DataSource, PipelineConfig, validate_config};
use ecm_results::{ResultStore, RunManifest};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ecm-cli")]
#[command(about = "Equivalent-circuit parameter identification from HPPC pulse data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a pipeline configuration file
    Validate {
        /// Path to the YAML or JSON configuration
        config_path: PathBuf,
    },
    /// Build (or reuse) the SOC-OCV curve of each label
    Ocv {
        /// Path to the YAML or JSON configuration
        config_path: PathBuf,
        /// Only this label instead of every configured one
        #[arg(long)]
        label: Option<String>,
    },
    /// Detect pulses and print their characteristics
    Pulses {
        /// Path to the YAML or JSON configuration
        config_path: PathBuf,
        /// Battery label to analyse
        #[arg(long)]
        label: String,
        /// Only this cycle index
        #[arg(long)]
        cycle: Option<usize>,
    },
    /// Fit ECM parameters for every detected pulse
    Fit {
        /// Path to the YAML or JSON configuration
        config_path: PathBuf,
        /// Skip cache and force re-run
        #[arg(long)]
        no_cache: bool,
        /// Worker threads (defaults to the configured value)
        #[arg(long)]
        threads: Option<usize>,
        /// Only this label instead of every configured one
        #[arg(long)]
        label: Option<String>,
    },
    /// List stored runs, or show one run and interpolated parameters
    Show {
        /// Path to the YAML or JSON configuration
        config_path: PathBuf,
        /// Run ID to display
        #[arg(long)]
        run: Option<String>,
        /// Battery label for parameter interpolation
        #[arg(long, requires = "soc")]
        label: Option<String>,
        /// State of charge (fraction) to interpolate at
        #[arg(long, requires = "label")]
        soc: Option<f64>,
        /// Restrict interpolation to one cycle
        #[arg(long)]
        cycle: Option<usize>,
    },
}

fn main() -> AppResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config_path } => cmd_validate(&config_path),
        Commands::Ocv { config_path, label } => cmd_ocv(&config_path, label.as_deref()),
        Commands::Pulses {
            config_path,
            label,
            cycle,
        } => cmd_pulses(&config_path, &label, cycle),
        Commands::Fit {
            config_path,
            no_cache,
            threads,
            label,
        } => cmd_fit(&config_path, !no_cache, threads, label.as_deref()),
        Commands::Show {
            config_path,
            run,
            label,
            soc,
            cycle,
        } => cmd_show(&config_path, run.as_deref(), label.as_deref().zip(soc), cycle),
    }
}

/// Configuration with an optional single-label override applied.
fn load_for(config_path: &Path, label: Option<&str>) -> AppResult<PipelineConfig> {
    let mut config = load_config(config_path)?;
    if let Some(label) = label {
        config.jobs.labels = vec![label.to_string()];
    }
    Ok(config)
}

fn open_store(config: &PipelineConfig, config_path: &Path) -> AppResult<ResultStore> {
    Ok(ResultStore::new(resolve_output_dir(config, Some(config_path)))?)
}

fn cmd_validate(config_path: &Path) -> AppResult<()> {
    println!("Validating configuration: {}", config_path.display());
    let config = load_config(config_path)?;
    validate_config(&config)?;
    let source = open_dataset(&config, Some(config_path))?;
    for label in &config.jobs.labels {
        source.require_label(label)?;
    }
    println!(
        "✓ Configuration is valid ({} labels, {}-RC model)",
        config.jobs.labels.len(),
        config.fit.rc_pairs
    );
    Ok(())
}

fn cmd_ocv(config_path: &Path, label: Option<&str>) -> AppResult<()> {
    let config = load_for(config_path, label)?;
    validate_config(&config)?;
    let source = open_dataset(&config, Some(config_path))?;
    let store = open_store(&config, config_path)?;
    let cache = OcvCache::new();

    for label in &config.jobs.labels {
        let report = resolve_curve(&source, label, &config, &store, &cache)?;
        let (v_min, v_max) = report.curve.voltage_range();
        println!(
            "{}: {} points, OCV {:.4} - {:.4} V",
            report.label,
            report.curve.len(),
            v_min,
            v_max
        );
        match &report.origin {
            CurveOrigin::Cache => println!("  origin: in-memory cache"),
            CurveOrigin::Stored => println!("  origin: saved curve"),
            CurveOrigin::Fitted {
                rms_residual,
                cycles_used,
                cycles_skipped,
                samples,
            } => {
                println!(
                    "  origin: fitted from {} samples ({} cycles used, {} skipped)",
                    samples, cycles_used, cycles_skipped
                );
                println!("  RMS residual: {:.3e} V", rms_residual);
            }
        }
        if let Some(path) = &report.path {
            println!("  file: {}", path.display());
        }
    }
    Ok(())
}

fn cmd_pulses(config_path: &Path, label: &str, cycle: Option<usize>) -> AppResult<()> {
    let mut config = load_for(config_path, Some(label))?;
    if let Some(cycle) = cycle {
        config.jobs.cycles = Some(vec![cycle]);
    }
    validate_config(&config)?;
    let source = open_dataset(&config, Some(config_path))?;
    source.require_label(label)?;
    let store = open_store(&config, config_path)?;

    let ocv = resolve_curve(&source, label, &config, &store, &OcvCache::new())?;
    let analysis = analyze_label(&source, label, &ocv.curve, &config)?;

    for report in pulse_report(&analysis)? {
        println!(
            "Cycle {} ({} samples, {} pulses):",
            report.cycle,
            report.samples,
            report.pulses.len()
        );
        println!("  #   start  length  peak [A]  drop [V]  SoC start  SoC end");
        for (i, p) in report.pulses.iter().enumerate() {
            println!(
                "  {:<3} {:>5}  {:>6}  {:>8.3}  {:>8.4}  {:>9.4}  {:>7.4}",
                i,
                p.start_index,
                p.duration,
                p.peak_current,
                p.voltage_drop,
                p.initial_soc,
                p.final_soc
            );
        }
    }
    for skipped in &analysis.skipped {
        println!("Cycle {} skipped: {}", skipped.cycle, skipped.reason);
    }
    Ok(())
}

fn cmd_fit(
    config_path: &Path,
    use_cache: bool,
    threads: Option<usize>,
    label: Option<&str>,
) -> AppResult<()> {
    let mut config = load_for(config_path, label)?;
    if threads.is_some() {
        config.jobs.threads = threads;
    }
    let source = open_dataset(&config, Some(config_path))?;
    println!(
        "Fitting {}-RC parameters for {} label(s)",
        config.fit.rc_pairs,
        config.jobs.labels.len()
    );

    let request = BatchRequest {
        config: &config,
        source: &source,
        output_dir: resolve_output_dir(&config, Some(config_path)),
        options: BatchOptions {
            use_cache,
            ..BatchOptions::default()
        },
        cancel: CancelToken::new(),
        evaluator: None,
        optimizer: None,
    };

    let mut last_emit = Instant::now();
    let mut last_stage = String::new();
    let response = run_batch_with_progress(
        &request,
        Some(&mut |event: BatchProgressEvent| {
            let stage_key = format!("{:?}", event.stage);
            let emit_now = stage_key != last_stage || last_emit.elapsed().as_millis() >= 100;
            if emit_now {
                render_cli_progress(&event);
                last_stage = stage_key;
                last_emit = Instant::now();
            }
        }),
    )?;
    clear_progress_line();

    if response.loaded_from_cache {
        println!("✓ Loaded from cache: {}", response.run_id);
    } else {
        println!("✓ Batch completed: {}", response.run_id);
    }

    print_timing_summary(&response.timing);
    print_manifest_summary(&response.manifest);
    println!("  Rows: {}", response.rows.len());
    Ok(())
}

fn clear_progress_line() {
    print!("\r{}\r", " ".repeat(140));
    let _ = io::stdout().flush();
}

fn render_cli_progress(event: &BatchProgressEvent) {
    let label = event.label.as_deref().unwrap_or("-");
    match (&event.stage, &event.fit) {
        (BatchStage::FittingPulses, Some(fit)) => {
            let width = 28usize;
            let fraction = fit.fraction_complete();
            let filled = ((fraction * width as f64).round() as usize).min(width);
            let bar = format!(
                "{}{}",
                "#".repeat(filled),
                "-".repeat(width.saturating_sub(filled))
            );
            print!(
                "\r[{}] {:>6.2}%  label={}  pulses={}/{}  ok={}  warn={}  failed={}  elapsed={:.1}s",
                bar,
                fraction * 100.0,
                label,
                fit.done,
                fit.total,
                fit.succeeded,
                fit.warnings,
                fit.failed,
                event.elapsed_wall_s
            );
        }
        _ => {
            let spinner = ['|', '/', '-', '\\'];
            let spin_idx = ((event.elapsed_wall_s * 10.0) as usize) % spinner.len();
            let mut line = format!(
                "\r{} {}  label={}  elapsed={:.2}s",
                spinner[spin_idx],
                event.stage.label(),
                label,
                event.elapsed_wall_s
            );
            if let Some(msg) = &event.message {
                line.push_str(&format!("  {}", msg));
            }
            print!("{}", line);
        }
    }
    let _ = io::stdout().flush();
}

fn print_timing_summary(timing: &BatchTimingSummary) {
    let total = timing.total_time_s.max(1.0e-12);
    let pct = |t: f64| 100.0 * t / total;

    println!("\nTiming summary:");
    if timing.load_cache_time_s > 0.0 {
        println!("  Cache load: {:.3}s", timing.load_cache_time_s);
    } else {
        println!(
            "  OCV:      {:.3}s ({:.1}%)",
            timing.ocv_time_s,
            pct(timing.ocv_time_s)
        );
        println!(
            "  Analysis: {:.3}s ({:.1}%)",
            timing.analysis_time_s,
            pct(timing.analysis_time_s)
        );
        println!(
            "  Fit:      {:.3}s ({:.1}%)",
            timing.fit_time_s,
            pct(timing.fit_time_s)
        );
        println!(
            "  Save:     {:.3}s ({:.1}%)",
            timing.save_time_s,
            pct(timing.save_time_s)
        );
    }
    println!("  Total:    {:.3}s", timing.total_time_s);
    if timing.pulses_fitted > 0 {
        println!(
            "  Pulses fitted: {} ({:.3}s worker time each, {} evaluations)",
            timing.pulses_fitted,
            timing.worker_fit_time_s / timing.pulses_fitted as f64,
            timing.evaluations
        );
    }
}

fn print_manifest_summary(manifest: &RunManifest) {
    let s = &manifest.summary;
    println!("\nResults ({} pulses):", s.total_pulses());
    println!("  Succeeded:     {}", s.succeeded);
    println!("  With warnings: {}", s.warnings);
    println!("  Failed:        {}", s.failed);
    println!("  Timed out:     {}", s.timed_out);
    println!("  Cycles skipped: {}", s.cycles_skipped);
    for failure in &manifest.failed_labels {
        println!("  Label {} failed: {}", failure.battery_label, failure.reason);
    }
}

fn cmd_show(
    config_path: &Path,
    run_id: Option<&str>,
    interpolate: Option<(&str, f64)>,
    cycle: Option<usize>,
) -> AppResult<()> {
    let config = load_config(config_path)?;
    let store = open_store(&config, config_path)?;

    match run_id {
        Some(run_id) => {
            let manifest = load_run(&store, run_id)?;
            println!("Run {} ({})", manifest.run_id, manifest.timestamp);
            println!("  Name: {}", manifest.name);
            println!("  Tool version: {}", manifest.tool_version);
            println!("  Model: {}-RC", manifest.rc_pairs);
            println!("  Labels: {}", manifest.labels.join(", "));
            print_manifest_summary(&manifest);
            for skipped in &manifest.skipped_cycles {
                println!(
                    "  {} cycle {} skipped: {}",
                    skipped.battery_label, skipped.cycle, skipped.reason
                );
            }
            for pulse in manifest.pulses.iter().filter(|p| p.message.is_some()) {
                println!(
                    "  {} cycle {} pulse {}: {} ({})",
                    pulse.battery_label,
                    pulse.cycle,
                    pulse.pulse_number,
                    pulse.status,
                    pulse.message.as_deref().unwrap_or_default()
                );
            }
        }
        None if interpolate.is_none() => {
            let runs = list_runs(&store)?;
            if runs.is_empty() {
                println!("No stored runs in {}", store.root().display());
            } else {
                println!("Stored runs:");
                for manifest in runs {
                    println!(
                        "  {} ({}, {} pulses)",
                        manifest.run_id,
                        manifest.timestamp,
                        manifest.summary.total_pulses()
                    );
                }
            }
        }
        None => {}
    }

    if let Some((label, soc)) = interpolate {
        let values = interpolate_parameters(&store, label, cycle, soc)?;
        println!("\nParameters of {} at SoC {:.4}:", label, soc);
        for (parameter, value) in values {
            println!("  {:<3} = {:.6e}", parameter.short_name(), value);
        }
    }
    Ok(())
}
