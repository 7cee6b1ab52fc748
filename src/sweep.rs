//! Parameter sweeps over behaviour and prevalence.

use crate::calculator::{Placement, Uptake, sample_k};
use crate::error::ModelError;
use crate::model::{BehaviouralSample, DiseaseParameters, Perception};
use crate::render::{Labels, Renderer, Series};
use crate::utils::{check_num, check_prob};
use anyhow::{Context, Result};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use serde::{Deserialize, Serialize};

/// Smallest threat drawn or placed on a grid; `1/threat` is undefined at zero.
pub const MIN_THREAT: f64 = 0.001;

/// Prevalences of the prevalence-sensitivity mode.
pub const DEFAULT_PREVALENCES: [f64; 6] = [0.9, 0.5, 0.1, 0.01, 0.001, 0.0001];

/// Default grid axis: `MIN_THREAT` followed by `0.1, 0.2, ..., 1.0`.
pub fn default_axis() -> Vec<f64> {
    std::iter::once(MIN_THREAT)
        .chain((1..=10).map(|i| i as f64 / 10.0))
        .collect()
}

/// How sweep points are generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SampleMode {
    /// Threat and efficacy drawn uniformly.
    RandomPerception { n_samples: usize },
    /// Usage before and after contact drawn uniformly and independently.
    RandomUsage { n_samples: usize },
    /// Cartesian product of `axis` with itself, efficacy rows by threat columns.
    Grid { axis: Vec<f64> },
}

/// A restartable sweep.
///
/// Every call to [`Sweep::samples`] reseeds the generator, so the same sweep
/// always yields the same rows in the same order.
#[derive(Debug, Clone)]
pub struct Sweep {
    disease: DiseaseParameters,
    mode: SampleMode,
    uptake: Uptake,
    seed: u64,
}

impl Sweep {
    pub fn new(
        disease: DiseaseParameters,
        mode: SampleMode,
        uptake: Uptake,
        seed: u64,
    ) -> Result<Self, ModelError> {
        disease.validate()?;
        match &mode {
            SampleMode::RandomPerception { n_samples } | SampleMode::RandomUsage { n_samples } => {
                check_num("number of samples", *n_samples, 1..)?;
            }
            SampleMode::Grid { axis } => {
                check_num("grid axis length", axis.len(), 1..)?;
                for &val in axis {
                    check_prob("grid axis value", val)?;
                }
            }
        }
        Ok(Self {
            disease,
            mode,
            uptake,
            seed,
        })
    }

    pub fn disease(&self) -> &DiseaseParameters {
        &self.disease
    }

    pub fn mode(&self) -> &SampleMode {
        &self.mode
    }

    /// Number of rows the sweep yields.
    pub fn len(&self) -> usize {
        match &self.mode {
            SampleMode::RandomPerception { n_samples } | SampleMode::RandomUsage { n_samples } => {
                *n_samples
            }
            SampleMode::Grid { axis } => axis.len() * axis.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Grid shape `(n_rows, n_cols)` for contour plotting.
    pub fn shape(&self) -> Option<(usize, usize)> {
        match &self.mode {
            SampleMode::Grid { axis } => Some((axis.len(), axis.len())),
            _ => None,
        }
    }

    /// Same sweep at a different prevalence.
    pub fn with_prevalence(&self, prevalence: f64) -> Result<Self, ModelError> {
        Self::new(
            self.disease.with_prevalence(prevalence),
            self.mode.clone(),
            self.uptake,
            self.seed,
        )
    }

    /// Lazily evaluate the sweep rows in generation order.
    pub fn samples(&self) -> Samples<'_> {
        Samples {
            sweep: self,
            rng: ChaCha12Rng::seed_from_u64(self.seed),
            i_row: 0,
        }
    }

    /// Evaluate all rows, stopping at the first error.
    pub fn run(&self) -> Result<Vec<BehaviouralSample>, ModelError> {
        self.samples().collect()
    }
}

pub struct Samples<'a> {
    sweep: &'a Sweep,
    rng: ChaCha12Rng,
    i_row: usize,
}

impl Samples<'_> {
    fn next_sample(&mut self) -> Result<BehaviouralSample, ModelError> {
        let disease = &self.sweep.disease;
        match &self.sweep.mode {
            SampleMode::RandomPerception { .. } => {
                let threat = self.rng.random_range(MIN_THREAT..=1.0);
                let efficacy = self.rng.random();
                self.perceive(threat, efficacy)
            }
            SampleMode::RandomUsage { .. } => {
                let use_prior = self.rng.random();
                let use_post = self.rng.random();
                evaluate(disease, None, use_prior, use_post)
            }
            SampleMode::Grid { axis } => {
                let n_cols = axis.len();
                let efficacy = axis[self.i_row / n_cols];
                let threat = axis[self.i_row % n_cols];
                self.perceive(threat, efficacy)
            }
        }
    }

    fn perceive(&mut self, threat: f64, efficacy: f64) -> Result<BehaviouralSample, ModelError> {
        let k = sample_k(threat, &mut self.rng)?;
        let perception = Perception {
            threat,
            efficacy,
            k,
        };
        let (use_prior, use_post) = self.sweep.uptake.usage(&perception)?;
        evaluate(&self.sweep.disease, Some(perception), use_prior, use_post)
    }
}

impl Iterator for Samples<'_> {
    type Item = Result<BehaviouralSample, ModelError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.i_row >= self.sweep.len() {
            return None;
        }
        let sample = self.next_sample();
        self.i_row += 1;
        Some(sample)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n_left = self.sweep.len() - self.i_row;
        (n_left, Some(n_left))
    }
}

impl ExactSizeIterator for Samples<'_> {}

fn evaluate(
    disease: &DiseaseParameters,
    perception: Option<Perception>,
    use_prior: f64,
    use_post: f64,
) -> Result<BehaviouralSample, ModelError> {
    Ok(BehaviouralSample {
        perception,
        use_prior,
        use_post,
        pc: disease.pc(use_prior, use_post)?,
        delta_pc: disease.delta_pc(use_prior, use_post)?,
        delta_pc8: disease.delta_pc8(use_prior, use_post)?,
        placement: disease.placement(use_prior, use_post)?,
    })
}

/// Grid sweep at one prevalence, with the size of its negative region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrevalenceReport {
    pub prevalence: f64,
    pub samples: Vec<BehaviouralSample>,
    /// Rows where sanitiser works better before contact.
    pub n_negative: usize,
    pub negative_frac: f64,
}

/// Re-run `sweep` once per prevalence.
pub fn prevalence_sensitivity(
    sweep: &Sweep,
    prevalences: &[f64],
) -> Result<Vec<PrevalenceReport>, ModelError> {
    let mut reports = Vec::with_capacity(prevalences.len());
    for &prevalence in prevalences {
        let at_prevalence = sweep.with_prevalence(prevalence)?;
        let samples = at_prevalence.run()?;
        let n_negative = samples
            .iter()
            .filter(|s| s.placement == Placement::BeforeContact)
            .count();
        let negative_frac = if at_prevalence.is_empty() {
            0.0
        } else {
            n_negative as f64 / samples.len() as f64
        };
        log::info!("prevalence {prevalence}: {n_negative} negative rows ({negative_frac:.3})");
        reports.push(PrevalenceReport {
            prevalence,
            samples,
            n_negative,
            negative_frac,
        });
    }
    Ok(reports)
}

/// Render the change in contamination probability over the sweep.
pub fn plot_sweep(
    sweep: &Sweep,
    samples: &[BehaviouralSample],
    title: &str,
    renderer: &mut dyn Renderer,
) -> Result<()> {
    let z: Vec<f64> = samples.iter().map(|s| s.delta_pc).collect();

    let (series, labels) = match sweep.mode() {
        SampleMode::RandomUsage { .. } => {
            let x = samples.iter().map(|s| s.use_prior).collect();
            let y = samples.iter().map(|s| s.use_post).collect();
            let series = Series {
                z: Some(z),
                ..Series::line("delta P_C", x, y)
            };
            (series, Labels::new(title, "use before", "use after"))
        }
        mode => {
            let perceptions = samples
                .iter()
                .map(|s| s.perception.context("sample lacks a perception"))
                .collect::<Result<Vec<_>>>()?;
            let x = perceptions.iter().map(|p| p.threat).collect();
            let y = perceptions.iter().map(|p| p.efficacy).collect();
            let series = match (mode, sweep.shape()) {
                (SampleMode::Grid { .. }, Some(shape)) => {
                    Series::contour("delta P_C", x, y, z, shape)
                }
                _ => Series {
                    z: Some(z),
                    ..Series::line("delta P_C", x, y)
                },
            };
            (series, Labels::new(title, "threat", "efficacy"))
        }
    };

    renderer
        .render(&[series], &labels.with_z("delta P_C"))
        .context("failed to render sweep plot")
}
