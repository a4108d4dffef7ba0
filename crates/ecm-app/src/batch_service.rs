//! Batch identification over every requested label, cycle and pulse.
//!
//! Labels are processed one after another. Within a label the OCV curve is
//! built first, then every detected pulse is fitted on the rayon pool while
//! the calling thread drains the results channel as the only writer of the
//! result table.

use ecm_core::timing::{AccumulatingTimer, Timer};
use ecm_core::units::raw;
use ecm_fit::{
    CancelToken, ExportedFit, FitBuilder, FitModel, FitOutcome, FitStatus, Measurement,
    ModelEvaluator, Optimizer, Parameter, TheveninEvaluator,
};
use ecm_ocv::{OcvCache, OcvCurve};
use ecm_project::{DataSource, PipelineConfig, validate_config};
use ecm_pulse::{Pulse, PulseSummary};
use ecm_results::{
    AggregateParameters, BatchSummary, CycleFailureRecord, LabelFailureRecord, LookupTableRow,
    PulseParameterDoc, PulseStatusRecord, ResultStore, ResultTable, RunManifest, TraceColumns,
    compute_run_id,
};
use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::{Arc, mpsc};
use std::time::{Duration, Instant};

use crate::error::{AppError, AppResult};
use crate::ocv_service;
use crate::progress::{BatchProgressEvent, BatchStage, FitProgress};
use crate::pulse_service;

/// Options for running a batch.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub use_cache: bool,
    pub tool_version: String,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Request to execute a batch.
pub struct BatchRequest<'a> {
    pub config: &'a PipelineConfig,
    pub source: &'a dyn DataSource,
    pub output_dir: PathBuf,
    pub options: BatchOptions,
    /// Cancelling it fails every pulse still running or queued.
    pub cancel: CancelToken,
    /// Simulates candidates; `None` runs the Thevenin network on each label's curve.
    pub evaluator: Option<Arc<dyn ModelEvaluator>>,
    /// Searches the parameter space; `None` runs the configured particle swarm.
    pub optimizer: Option<Arc<dyn Optimizer>>,
}

/// Concise timing and execution summary for a batch.
#[derive(Debug, Clone, Default)]
pub struct BatchTimingSummary {
    pub ocv_time_s: f64,
    pub analysis_time_s: f64,
    pub fit_time_s: f64,
    pub save_time_s: f64,
    pub load_cache_time_s: f64,
    pub total_time_s: f64,
    /// Sum of per-pulse fit times across workers.
    pub worker_fit_time_s: f64,
    pub pulses_fitted: usize,
    pub evaluations: usize,
}

/// Response from a batch execution.
#[derive(Debug, Clone)]
pub struct BatchResponse {
    pub run_id: String,
    pub manifest: RunManifest,
    /// Every row of the batch, sorted by `(label, cycle, pulse)`.
    pub rows: Vec<LookupTableRow>,
    pub loaded_from_cache: bool,
    pub timing: BatchTimingSummary,
}

fn emit_progress(
    progress_cb: &mut Option<&mut dyn FnMut(BatchProgressEvent)>,
    event: BatchProgressEvent,
) {
    if let Some(cb) = progress_cb.as_deref_mut() {
        cb(event);
    }
}

/// Execute or load a batch.
pub fn run_batch(request: &BatchRequest<'_>) -> AppResult<BatchResponse> {
    run_batch_with_progress(request, None)
}

/// Execute or load a batch and stream progress events.
///
/// An unknown label aborts before any work starts. A label whose OCV curve
/// or pulse data cannot be obtained is recorded in the manifest and the
/// remaining labels still run.
///
/// A completed run with the same id is answered from the rows it stored.
/// Runs that were cancelled or hit the deadline are stored as partial and
/// fitted again next time.
pub fn run_batch_with_progress(
    request: &BatchRequest<'_>,
    mut progress_cb: Option<&mut dyn FnMut(BatchProgressEvent)>,
) -> AppResult<BatchResponse> {
    let started = Instant::now();
    let config = request.config;
    validate_config(config)?;
    let rc_pairs = config.fit.rc_pairs()?;

    emit_progress(
        &mut progress_cb,
        BatchProgressEvent::stage(
            BatchStage::LoadingDataset,
            None,
            started.elapsed().as_secs_f64(),
            Some(format!("{} label(s)", config.jobs.labels.len())),
        ),
    );
    for label in &config.jobs.labels {
        request.source.require_label(label)?;
    }

    emit_progress(
        &mut progress_cb,
        BatchProgressEvent::stage(
            BatchStage::CheckingCache,
            None,
            started.elapsed().as_secs_f64(),
            None,
        ),
    );
    let run_id = compute_run_id(
        config,
        &request.source.fingerprint(),
        &request.options.tool_version,
    );
    let store = ResultStore::new(request.output_dir.clone())?;

    if request.options.use_cache && store.has_run(&run_id) {
        emit_progress(
            &mut progress_cb,
            BatchProgressEvent::stage(
                BatchStage::LoadingCachedResult,
                None,
                started.elapsed().as_secs_f64(),
                Some(run_id.clone()),
            ),
        );
        let mut timing = BatchTimingSummary::default();
        let load = Timer::start("load_cache");
        let manifest = store.load_manifest(&run_id)?;
        let rows = store.load_run_rows(&run_id)?;
        timing.load_cache_time_s = load.stop();
        timing.total_time_s = started.elapsed().as_secs_f64();
        emit_progress(
            &mut progress_cb,
            BatchProgressEvent::stage(
                BatchStage::Completed,
                None,
                timing.total_time_s,
                Some("Loaded cached run".to_string()),
            ),
        );
        return Ok(BatchResponse {
            run_id,
            manifest,
            rows,
            loaded_from_cache: true,
            timing,
        });
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.jobs.threads.unwrap_or(0))
        .build()
        .map_err(|e| AppError::Backend {
            message: format!("failed to start worker pool: {e}"),
        })?;
    let model = FitBuilder::with_order(rc_pairs)
        .r_guess(config.fit.r_guess_ohm)
        .overrides(config.fit.priors.clone())
        .cell(config.fit.cell.constants())
        .budget(config.fit.budget())
        .build_model()?;
    let swarm = config.fit.swarm();
    let optimizer: &dyn Optimizer = match &request.optimizer {
        Some(optimizer) => optimizer.as_ref(),
        None => &swarm,
    };
    let cache = OcvCache::new();
    let worker_timer = AccumulatingTimer::new();

    let ctx = BatchContext {
        config,
        source: request.source,
        store: &store,
        cache: &cache,
        model: &model,
        evaluator: request.evaluator.as_deref(),
        optimizer,
        pool: &pool,
        cancel: &request.cancel,
        timeout: config.fit.timeout(),
        worker_timer: &worker_timer,
        started,
    };
    let mut assembly = Assembly::default();
    let mut failed_labels = Vec::new();

    for label in &config.jobs.labels {
        if let Err(e) = fit_label(&ctx, label, &mut assembly, &mut progress_cb) {
            tracing::error!(label = %label, error = %e, "label abandoned");
            failed_labels.push(LabelFailureRecord {
                battery_label: label.clone(),
                reason: e.to_string(),
            });
        }
    }

    let mut statuses = assembly.statuses;
    statuses.sort_by(|a, b| {
        let key = |r: &PulseStatusRecord| (r.battery_label.clone(), r.cycle, r.pulse_number);
        key(a).cmp(&key(b))
    });
    let mut summary = BatchSummary::from_statuses(&statuses);
    summary.cycles_skipped = assembly.skipped.len();
    summary.labels_failed = failed_labels.len();
    let partial = request.cancel.is_cancelled() || summary.timed_out > 0;
    if partial {
        tracing::warn!(run_id = %run_id, "batch incomplete; it will not be served from cache");
    }

    let manifest = RunManifest {
        run_id: run_id.clone(),
        name: config.name.clone(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        tool_version: request.options.tool_version.clone(),
        rc_pairs: u8::from(rc_pairs),
        labels: config.jobs.labels.clone(),
        pulses: statuses,
        skipped_cycles: assembly.skipped,
        failed_labels,
        summary,
        partial,
    };
    let rows = assembly.table.snapshot();
    let save = Timer::start("manifest");
    store.save_run_rows(&run_id, &rows, rc_pairs)?;
    store.save_manifest(&manifest)?;

    let mut timing = assembly.timing;
    timing.save_time_s += save.stop();
    timing.worker_fit_time_s = worker_timer.total_seconds();
    timing.total_time_s = started.elapsed().as_secs_f64();

    tracing::info!(
        run_id = %run_id,
        succeeded = summary.succeeded,
        warnings = summary.warnings,
        failed = summary.failed,
        timed_out = summary.timed_out,
        cycles_skipped = summary.cycles_skipped,
        labels_failed = summary.labels_failed,
        "batch finished"
    );
    emit_progress(
        &mut progress_cb,
        BatchProgressEvent::stage(
            BatchStage::Completed,
            None,
            timing.total_time_s,
            Some("Batch completed".to_string()),
        ),
    );

    Ok(BatchResponse {
        run_id,
        manifest,
        rows,
        loaded_from_cache: false,
        timing,
    })
}

/// Shared, read-only state of one batch.
struct BatchContext<'a> {
    config: &'a PipelineConfig,
    source: &'a dyn DataSource,
    store: &'a ResultStore,
    cache: &'a OcvCache,
    model: &'a FitModel,
    evaluator: Option<&'a dyn ModelEvaluator>,
    optimizer: &'a dyn Optimizer,
    pool: &'a rayon::ThreadPool,
    cancel: &'a CancelToken,
    timeout: Option<Duration>,
    worker_timer: &'a AccumulatingTimer,
    started: Instant,
}

impl BatchContext<'_> {
    fn elapsed_s(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }
}

/// Everything the writer accumulates across labels.
#[derive(Default)]
struct Assembly {
    table: ResultTable,
    statuses: Vec<PulseStatusRecord>,
    skipped: Vec<CycleFailureRecord>,
    timing: BatchTimingSummary,
}

struct PulseJob {
    cycle: usize,
    pulse: Pulse,
}

struct PulseFitReport {
    index: usize,
    fit: ExportedFit,
    message: Option<String>,
}

fn fit_label(
    ctx: &BatchContext<'_>,
    label: &str,
    assembly: &mut Assembly,
    progress_cb: &mut Option<&mut dyn FnMut(BatchProgressEvent)>,
) -> AppResult<()> {
    // an existing table of another order cannot take this run's rows
    let table_path = ctx.store.label_table_path(label)?;
    ctx.store
        .ensure_table_order(&table_path, ctx.model.order().rc_pairs())?;

    emit_progress(
        progress_cb,
        BatchProgressEvent::stage(
            BatchStage::BuildingOcvCurve,
            Some(label),
            ctx.elapsed_s(),
            None,
        ),
    );
    let timer = Timer::start("ocv");
    let ocv = ocv_service::resolve_curve(ctx.source, label, ctx.config, ctx.store, ctx.cache)?;
    assembly.timing.ocv_time_s += timer.stop();
    let curve = ocv.curve;
    let thevenin = TheveninEvaluator::with_curve(*ctx.model.cell(), Arc::clone(&curve));
    let evaluator: &dyn ModelEvaluator = match ctx.evaluator {
        Some(evaluator) => evaluator,
        None => &thevenin,
    };

    emit_progress(
        progress_cb,
        BatchProgressEvent::stage(
            BatchStage::AnalysingCycles,
            Some(label),
            ctx.elapsed_s(),
            None,
        ),
    );
    let timer = Timer::start("analysis");
    let analysis = pulse_service::analyze_label(ctx.source, label, &curve, ctx.config)?;
    let mut jobs = Vec::with_capacity(analysis.pulse_count());
    for hppc in &analysis.cycles {
        match hppc.pulses() {
            Ok(pulses) => jobs.extend(pulses.into_iter().map(|pulse| PulseJob {
                cycle: hppc.cycle(),
                pulse,
            })),
            Err(e) => assembly.skipped.push(CycleFailureRecord {
                battery_label: label.to_string(),
                cycle: hppc.cycle(),
                reason: e.to_string(),
            }),
        }
    }
    assembly.skipped.extend(analysis.skipped);
    assembly.timing.analysis_time_s += timer.stop();

    let mut progress = FitProgress {
        total: jobs.len(),
        ..FitProgress::default()
    };
    let mut event =
        BatchProgressEvent::stage(BatchStage::FittingPulses, Some(label), ctx.elapsed_s(), None);
    event.fit = Some(progress);
    emit_progress(progress_cb, event);

    let timer = Timer::start("fit");
    let mut label_table = ResultTable::new();
    let mut docs = Vec::with_capacity(jobs.len());
    let (tx, rx) = mpsc::channel::<PulseFitReport>();
    std::thread::scope(|scope| {
        let jobs = &jobs;
        let curve = curve.as_ref();
        scope.spawn(move || {
            ctx.pool.install(|| {
                jobs.par_iter()
                    .enumerate()
                    .for_each_with(tx, |tx, (index, job)| {
                        let token = match ctx.timeout {
                            Some(timeout) => ctx.cancel.with_timeout(timeout),
                            None => ctx.cancel.clone(),
                        };
                        let timer = Timer::start("pulse");
                        let (fit, message) = fit_pulse(
                            &job.pulse,
                            ctx.model,
                            curve,
                            evaluator,
                            ctx.optimizer,
                            &token,
                        );
                        ctx.worker_timer.record(timer.stop());
                        // the receiver outlives every worker
                        let _ = tx.send(PulseFitReport {
                            index,
                            fit,
                            message,
                        });
                    });
            });
        });

        for report in rx {
            let job = &jobs[report.index];
            let outcome = report.fit.outcome();
            let status = outcome.status;
            match status {
                FitStatus::Succeeded => progress.succeeded += 1,
                FitStatus::SucceededWithWarnings => progress.warnings += 1,
                FitStatus::Failed | FitStatus::TimedOut => progress.failed += 1,
            }
            progress.done += 1;
            assembly.timing.pulses_fitted += 1;
            assembly.timing.evaluations += outcome.evaluations;

            if status.has_parameters() {
                tracing::info!(
                    label,
                    cycle = job.cycle,
                    pulse = job.pulse.pulse_number(),
                    %status,
                    cost = outcome.cost,
                    "pulse fitted"
                );
            } else {
                tracing::warn!(
                    label,
                    cycle = job.cycle,
                    pulse = job.pulse.pulse_number(),
                    %status,
                    reason = report.message.as_deref().unwrap_or(""),
                    "pulse fit failed"
                );
            }

            let row = lookup_row(
                label,
                job.cycle,
                job.pulse.pulse_number(),
                job.pulse.summary(),
                &report.fit,
            );
            label_table.upsert(row.clone());
            assembly.table.upsert(row);
            assembly.statuses.push(PulseStatusRecord {
                battery_label: label.to_string(),
                cycle: job.cycle,
                pulse_number: job.pulse.pulse_number(),
                status,
                cost: outcome.cost.is_finite().then_some(outcome.cost),
                warnings: outcome.warnings.iter().map(ToString::to_string).collect(),
                message: report.message.clone(),
            });
            docs.push(PulseParameterDoc::new(
                label,
                job.cycle,
                job.pulse.pulse_number(),
                &report.fit,
            ));

            let mut event = BatchProgressEvent::stage(
                BatchStage::FittingPulses,
                Some(label),
                ctx.elapsed_s(),
                None,
            );
            event.fit = Some(progress);
            emit_progress(progress_cb, event);
        }
    });
    assembly.timing.fit_time_s += timer.stop();

    emit_progress(
        progress_cb,
        BatchProgressEvent::stage(
            BatchStage::SavingResults,
            Some(label),
            ctx.elapsed_s(),
            None,
        ),
    );
    let timer = Timer::start("save");
    persist_label(ctx, label, &label_table, &docs, &jobs)?;
    assembly.timing.save_time_s += timer.stop();
    Ok(())
}

/// Fit one pulse; never fails, failures come back as a status.
fn fit_pulse(
    pulse: &Pulse,
    model: &FitModel,
    curve: &OcvCurve,
    evaluator: &dyn ModelEvaluator,
    optimizer: &dyn Optimizer,
    token: &CancelToken,
) -> (ExportedFit, Option<String>) {
    let initial_soc = pulse.summary().initial_soc;
    let rc_pairs = model.order().rc_pairs();
    let cell = *model.cell();
    let failed = |ocv: f64, reason: String| {
        (
            FitOutcome::failed(rc_pairs, cell, initial_soc, ocv, FitStatus::Failed).export(),
            Some(reason),
        )
    };

    let ocv = match curve.ocv_at(initial_soc) {
        Ok(v) => v,
        Err(e) => return failed(f64::NAN, e.to_string()),
    };
    let trace = pulse.trace();
    let measurement = Measurement {
        time: trace.time,
        current: trace.current,
        voltage: trace.voltage,
    };
    let problem = match model.problem(measurement, initial_soc, ocv) {
        Ok(p) => p,
        Err(e) => return failed(ocv, e.to_string()),
    };

    match problem.optimize(evaluator, optimizer, token) {
        Ok(outcome) => {
            let message = match outcome.status {
                FitStatus::TimedOut => Some(format!(
                    "deadline exceeded after {} generations",
                    outcome.iterations
                )),
                FitStatus::Failed if token.is_cancelled() => Some("cancelled".to_string()),
                FitStatus::Failed => Some(format!(
                    "no finite-cost candidate in {} evaluations",
                    outcome.evaluations
                )),
                FitStatus::Succeeded | FitStatus::SucceededWithWarnings => None,
            };
            (outcome.export(), message)
        }
        Err(e) => failed(ocv, e.to_string()),
    }
}

fn lookup_row(
    label: &str,
    cycle: usize,
    pulse_number: usize,
    summary: &PulseSummary,
    fit: &ExportedFit,
) -> LookupTableRow {
    let outcome = fit.outcome();
    let value = |p: Parameter| outcome.parameters.as_ref().and_then(|x| x.value(p));
    LookupTableRow {
        battery_label: label.to_string(),
        cycle,
        pulse_number,
        current: summary.peak_current,
        voltage: outcome.ocv,
        temperature: raw::kelvin_of(outcome.cell.temperature),
        soc: outcome.initial_soc,
        r0: value(Parameter::R0),
        r1: value(Parameter::R1),
        c1: value(Parameter::C1),
        r2: value(Parameter::R2),
        c2: value(Parameter::C2),
    }
}

fn persist_label(
    ctx: &BatchContext<'_>,
    label: &str,
    label_table: &ResultTable,
    docs: &[PulseParameterDoc],
    jobs: &[PulseJob],
) -> AppResult<()> {
    let store = ctx.store;
    let rc_pairs = ctx.model.order().rc_pairs();

    for cycle in label_table.cycles(label) {
        let rows = label_table.cycle_snapshot(label, cycle);
        store.save_table(&store.cycle_table_path(label, cycle)?, &rows, rc_pairs)?;
        store.save_aggregate(&AggregateParameters::from_rows(
            label,
            cycle,
            rc_pairs,
            ctx.model.cell(),
            &rows,
        ))?;
    }
    for doc in docs {
        store.save_pulse_doc(doc)?;
    }
    if ctx.config.output.pulse_traces {
        for job in jobs {
            let p = &job.pulse;
            store.save_pulse_trace(
                label,
                job.cycle,
                p.pulse_number(),
                TraceColumns {
                    time: p.time(),
                    current: p.current(),
                    voltage: p.voltage(),
                    soc: p.soc(),
                },
            )?;
        }
    }

    // rows from earlier runs of other cycles survive; same keys are replaced
    let path = store.label_table_path(label)?;
    store.ensure_table_order(&path, rc_pairs)?;
    let mut merged = if path.exists() {
        ResultTable::from_rows(store.load_table(&path)?)
    } else {
        ResultTable::new()
    };
    merged.extend(label_table.iter().cloned());
    store.save_table(&path, &merged.label_snapshot(label), rc_pairs)?;
    tracing::info!(label, rows = merged.len(), path = %path.display(), "lookup table saved");
    Ok(())
}
