use crate::calculator::{Placement, tray_steady_state};
use crate::config::Config;
use crate::engine::{plot_convergence, simulate};
use crate::model::{BehaviouralSample, DiseaseParameters, SimulationConfig, Trajectory};
use crate::render::FileRenderer;
use crate::stats::{Accumulator, AccumulatorReport, TimeSeriesReport, report_time_series};
use crate::sweep::{
    PrevalenceReport, SampleMode, Sweep, default_axis, plot_sweep, prevalence_sensitivity,
};
use anyhow::{Context, Result, bail};
use glob::glob;
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

/// One simulator run as stored on disk.
#[derive(Serialize, Deserialize)]
struct RunRecord {
    seed: u64,
    cfg: SimulationConfig,
    trajectory: Trajectory,
}

#[derive(Serialize, Deserialize)]
struct SweepRecord {
    seed: u64,
    disease: DiseaseParameters,
    mode: SampleMode,
    samples: Vec<BehaviouralSample>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RunReport {
    seed: u64,
    steady_state: f64,
    mean_contaminated: f64,
    contaminated_frac: TimeSeriesReport,
    mean_new_cases: f64,
    mean_reinfections: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct AnalysisReport {
    runs: Vec<RunReport>,
    contaminated_frac: AccumulatorReport,
    new_cases: AccumulatorReport,
    reinfections: AccumulatorReport,
}

pub struct Manager {
    out_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(out_dir: P) -> Result<Self> {
        let out_dir = out_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(out_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { out_dir, cfg })
    }

    pub fn simulate(&self, seed: Option<u64>, n_replicates: usize) -> Result<()> {
        let seed = resolve_seed(seed)?;
        let cfg = self.cfg.simulation();
        let first_idx = self
            .count_files("trajectory-*.msgpack")
            .context("failed to count trajectory files")?;

        for rep_idx in 0..n_replicates {
            let file_idx = first_idx + rep_idx;
            let prefix = format!("trajectory-{file_idx:04}");
            let mut renderer = FileRenderer::new(self.out_dir.clone(), &prefix);
            let run_seed = seed.wrapping_add(file_idx as u64);

            let mut rng = ChaCha12Rng::seed_from_u64(run_seed);
            let trajectory = simulate(&cfg, &mut rng).context("failed to simulate")?;
            plot_convergence(&trajectory, &cfg, &mut renderer)?;

            let file = self.trajectory_file(file_idx);
            let record = RunRecord {
                seed: run_seed,
                cfg: cfg.clone(),
                trajectory,
            };
            write_msgpack(&file, &record)?;

            let progress = 100.0 * (rep_idx + 1) as f64 / n_replicates as f64;
            log::info!("completed {progress:06.2}% (wrote {file:?})");
        }

        Ok(())
    }

    pub fn sweep(&self, seed: Option<u64>) -> Result<()> {
        let seed = resolve_seed(seed)?;
        let sweep = Sweep::new(
            self.cfg.disease(),
            self.cfg.sweep.mode.clone(),
            self.cfg.sweep.uptake,
            seed,
        )
        .context("failed to construct sweep")?;

        let samples = sweep.run().context("failed to run sweep")?;
        let n_before = samples
            .iter()
            .filter(|s| s.placement == Placement::BeforeContact)
            .count();
        log::info!(
            "evaluated {} rows, {n_before} favour sanitiser before contact",
            samples.len()
        );

        let mut renderer = FileRenderer::new(self.out_dir.clone(), "sweep");
        plot_sweep(&sweep, &samples, "Sanitiser placement", &mut renderer)?;

        let record = SweepRecord {
            seed,
            disease: *sweep.disease(),
            mode: sweep.mode().clone(),
            samples,
        };
        write_msgpack(self.out_dir.join("sweep.msgpack"), &record)
    }

    pub fn prevalence(&self, seed: Option<u64>) -> Result<()> {
        let seed = resolve_seed(seed)?;
        let mode = match &self.cfg.sweep.mode {
            SampleMode::Grid { axis } => SampleMode::Grid { axis: axis.clone() },
            _ => {
                log::info!("prevalence sensitivity uses the default grid");
                SampleMode::Grid {
                    axis: default_axis(),
                }
            }
        };
        let sweep = Sweep::new(self.cfg.disease(), mode, self.cfg.sweep.uptake, seed)
            .context("failed to construct sweep")?;

        let reports: Vec<PrevalenceReport> =
            prevalence_sensitivity(&sweep, &self.cfg.sweep.prevalences)
                .context("failed to run prevalence sweeps")?;

        let mut renderer = FileRenderer::new(self.out_dir.clone(), "prevalence");
        for report in &reports {
            let at_prevalence = sweep.with_prevalence(report.prevalence)?;
            let title = format!("Prevalence {}", report.prevalence);
            plot_sweep(&at_prevalence, &report.samples, &title, &mut renderer)?;
        }

        write_msgpack(self.out_dir.join("prevalence.msgpack"), &reports)
    }

    pub fn analyze(&self) -> Result<()> {
        let files = self
            .list_files("trajectory-*.msgpack")
            .context("failed to list trajectory files")?;
        if files.is_empty() {
            bail!("no trajectory files in {:?}", self.out_dir);
        }

        let mut frac_acc = Accumulator::new();
        let mut new_cases_acc = Accumulator::new();
        let mut reinf_acc = Accumulator::new();
        let mut runs = Vec::with_capacity(files.len());

        for file in &files {
            let record: RunRecord = read_msgpack(file)?;
            let trajectory = &record.trajectory;

            let report = RunReport {
                seed: record.seed,
                steady_state: tray_steady_state(&record.cfg),
                mean_contaminated: trajectory.mean_contaminated(),
                contaminated_frac: report_time_series(&trajectory.contaminated_frac()),
                mean_new_cases: trajectory.mean_new_cases(),
                mean_reinfections: trajectory.mean_reinfections(),
            };
            log::info!(
                "{file:?}: contaminated fraction {:.4} +- {:.4} (steady state {:.4})",
                report.contaminated_frac.mean,
                report.contaminated_frac.sem,
                report.steady_state
            );
            if !report.contaminated_frac.is_equil {
                log::warn!("{file:?} may not have reached equilibrium");
            }

            frac_acc.add(report.contaminated_frac.mean);
            new_cases_acc.add(report.mean_new_cases);
            reinf_acc.add(report.mean_reinfections);
            runs.push(report);
        }

        let analysis = AnalysisReport {
            runs,
            contaminated_frac: frac_acc.report(),
            new_cases: new_cases_acc.report(),
            reinfections: reinf_acc.report(),
        };
        write_msgpack(self.out_dir.join("results.msgpack"), &analysis)
    }

    pub fn clean(&self) -> Result<()> {
        let files = self
            .list_files("*.msgpack")
            .context("failed to list output files")?;
        for file in &files {
            fs::remove_file(file).with_context(|| format!("failed to remove {file:?}"))?;
        }
        log::info!("removed {} files", files.len());
        Ok(())
    }

    fn list_files(&self, pattern: &str) -> Result<Vec<PathBuf>> {
        let pattern = self.out_dir.join(pattern);
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let mut files: Vec<_> = glob(pattern)
            .context("failed to glob files")?
            .filter_map(Result::ok)
            .filter(|p| p.is_file())
            .collect();
        files.sort();
        Ok(files)
    }

    fn count_files(&self, pattern: &str) -> Result<usize> {
        Ok(self.list_files(pattern)?.len())
    }

    fn trajectory_file(&self, file_idx: usize) -> PathBuf {
        self.out_dir.join(format!("trajectory-{file_idx:04}.msgpack"))
    }
}

fn resolve_seed(seed: Option<u64>) -> Result<u64> {
    let seed = match seed {
        Some(seed) => seed,
        None => ChaCha12Rng::try_from_os_rng()
            .context("failed to seed from the operating system")?
            .random(),
    };
    log::info!("using seed {seed}");
    Ok(seed)
}

fn write_msgpack<P: AsRef<Path>, T: Serialize>(file: P, value: &T) -> Result<()> {
    let file = file.as_ref();
    let handle = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
    let mut writer = BufWriter::new(handle);
    encode::write_named(&mut writer, value).context("failed to serialize value")?;
    writer.flush().context("failed to flush writer stream")?;
    Ok(())
}

fn read_msgpack<P: AsRef<Path>, T: DeserializeOwned>(file: P) -> Result<T> {
    let file = file.as_ref();
    let handle = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
    let mut reader = BufReader::new(handle);
    decode::from_read(&mut reader).with_context(|| format!("failed to deserialize {file:?}"))
}
