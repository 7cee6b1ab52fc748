use crate::calculator::tray_steady_state;
use crate::error::ModelError;
use crate::model::{SimulationConfig, Step, TRAYS_PER_CUSTOMER, Trajectory, TrayState};
use crate::render::{Labels, Renderer, Series};
use anyhow::{Context, Result};
use rand::prelude::*;
use rand_distr::{Binomial, Poisson};

/// Tray-contamination simulator.
///
/// Advances a tau-leaping birth-death process of the number of contaminated
/// trays. Holds the configuration, the current state and the random number
/// generator for one run.
pub struct Engine<R> {
    cfg: SimulationConfig,
    state: TrayState,
    rng: R,
}

/// Simulate one run of `cfg`, drawing every variate from `rng`.
///
/// The count pass draws, per step, the new cases, their pre-contact failures
/// and (from step 1) the contamination and decontamination increments. The
/// derived pass then draws, per step, the post-contact failures, the new cases
/// and the reinfections. With a seeded generator the result is reproducible.
///
/// # Errors
/// Returns [`ModelError::InvalidConfig`] before any sampling if `cfg` is out
/// of domain.
pub fn simulate<R: Rng + ?Sized>(
    cfg: &SimulationConfig,
    rng: &mut R,
) -> Result<Trajectory, ModelError> {
    Engine::new(cfg.clone(), rng)?.run()
}

impl<R: Rng> Engine<R> {
    /// Create a new `Engine` with the given configuration at step 0.
    pub fn new(cfg: SimulationConfig, rng: R) -> Result<Self, ModelError> {
        cfg.validate()?;
        let state = TrayState {
            step: 0,
            contaminated: cfg.init_contaminated,
        };
        Ok(Self { cfg, state, rng })
    }

    /// Perform the simulation and return the full trajectory.
    pub fn run(mut self) -> Result<Trajectory, ModelError> {
        log::debug!("simulating {} steps", self.cfg.max_steps);

        let mut steps = self.perform_count_pass()?;
        self.perform_derived_pass(&mut steps)?;
        log::debug!(
            "finished at step {} with {} contaminated trays",
            self.state.step,
            self.state.contaminated
        );

        Ok(Trajectory {
            n_trays: self.cfg.n_trays,
            steps,
        })
    }

    fn perform_count_pass(&mut self) -> Result<Vec<Step>, ModelError> {
        let cfg = &self.cfg;
        let case_prob = cfg.prevalence * cfg.dt;
        let skip_prob = 1.0 - cfg.use_before;

        let mut steps = Vec::with_capacity(cfg.max_steps);
        let mut prev_first_decon_fail = 0;

        for i_step in 0..self.cfg.max_steps {
            let cases = draw_binomial(&mut self.rng, self.cfg.people, case_prob)?;
            let first_decon_fail = draw_binomial(&mut self.rng, cases, skip_prob)?;

            if i_step > 0 {
                self.perform_step(prev_first_decon_fail)?;
            }
            prev_first_decon_fail = first_decon_fail;

            steps.push(Step {
                time: i_step as f64 * self.cfg.dt,
                contaminated: self.state.contaminated,
                cases,
                first_decon_fail,
                alpha: 0.0,
                second_decon_fail: 0,
                new_cases: 0,
                reinfections: 0,
            });
        }

        Ok(steps)
    }

    fn perform_step(&mut self, first_decon_fail: u64) -> Result<(), ModelError> {
        let n_trays = self.cfg.n_trays;
        let contaminated = self.state.contaminated;

        // Contamination slows down as trays saturate.
        let free_frac = 1.0 - contaminated as f64 / n_trays as f64;
        let rate_cont = self.cfg.prob_trans * first_decon_fail as f64 * free_frac;
        let rate_decon = self.cfg.rec_rate * contaminated as f64 * self.cfg.dt;

        // Clamp both increments so that 0 <= T <= N0 always holds.
        let n_cont = draw_poisson(&mut self.rng, rate_cont)?.min(n_trays - contaminated);
        let n_decon = draw_poisson(&mut self.rng, rate_decon)?.min(contaminated);

        self.state.contaminated = contaminated + n_cont - n_decon;
        self.state.step += 1;

        Ok(())
    }

    fn perform_derived_pass(&mut self, steps: &mut [Step]) -> Result<(), ModelError> {
        let cfg = &self.cfg;
        let skip_prob = 1.0 - cfg.use_after;
        let mut n_saturated = 0;

        for step in steps.iter_mut() {
            step.alpha = cfg.prob_trans * step.contaminated as f64 / cfg.n_trays as f64
                * TRAYS_PER_CUSTOMER;

            step.second_decon_fail =
                draw_binomial(&mut self.rng, step.first_decon_fail, skip_prob)?;

            let new_case_prob = skip_prob * (1.0 - cfg.prevalence) * step.alpha * cfg.dt;
            let reinf_prob = skip_prob * step.alpha;
            if new_case_prob > 1.0 || reinf_prob > 1.0 {
                n_saturated += 1;
            }

            step.new_cases = draw_binomial(&mut self.rng, cfg.people, new_case_prob.min(1.0))?;
            step.reinfections = draw_binomial(
                &mut self.rng,
                step.cases - step.first_decon_fail,
                reinf_prob.min(1.0),
            )?;
        }

        if n_saturated > 0 {
            log::warn!("exposure probability saturated at 1 in {n_saturated} steps");
        }

        Ok(())
    }
}

fn draw_binomial<R: Rng + ?Sized>(rng: &mut R, n: u64, p: f64) -> Result<u64, ModelError> {
    let dist = Binomial::new(n, p).map_err(|err| ModelError::sampling("binomial", err))?;
    Ok(dist.sample(rng))
}

fn draw_poisson<R: Rng + ?Sized>(rng: &mut R, lambda: f64) -> Result<u64, ModelError> {
    // Poisson(0) is a point mass at zero.
    if lambda <= 0.0 {
        return Ok(0);
    }
    let dist = Poisson::new(lambda).map_err(|err| ModelError::sampling("poisson", err))?;
    Ok(dist.sample(rng) as u64)
}

/// Render the contaminated fraction of `traj` against the closed-form steady state.
pub fn plot_convergence(
    traj: &Trajectory,
    cfg: &SimulationConfig,
    renderer: &mut dyn Renderer,
) -> Result<()> {
    let times = traj.times();
    let steady_state = tray_steady_state(cfg);

    let series = [
        Series::line("simulation", times.clone(), traj.contaminated_frac()),
        Series::line("steady state", times.clone(), vec![steady_state; times.len()]),
    ];
    let labels = Labels::new(
        "Tray contamination",
        "time",
        "fraction of contaminated trays",
    );

    renderer
        .render(&series, &labels)
        .context("failed to render convergence plot")
}
