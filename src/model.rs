//! Model data types.

use crate::calculator::Placement;
use crate::error::ModelError;
use crate::utils::{check_non_neg, check_num, check_pos, check_prob};
use serde::{Deserialize, Serialize};

/// Number of trays each customer touches on the way through screening.
pub const TRAYS_PER_CUSTOMER: f64 = 2.0;

/// Disease constants shared by every calculator call.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct DiseaseParameters {
    /// Customers in contact with a tray per unit time.
    pub contact_rate: f64,
    /// Probability that a contact transmits the pathogen.
    pub prob_trans: f64,
    /// Probability that an arriving customer is infectious.
    pub prevalence: f64,
    /// Tray decontamination rate.
    pub rec_rate: f64,
    /// Trays touched per customer.
    pub trays_per_customer: f64,
}

impl DiseaseParameters {
    pub fn validate(&self) -> Result<(), ModelError> {
        check_non_neg("contact rate", self.contact_rate)?;
        check_prob("transmission probability", self.prob_trans)?;
        check_prob("prevalence", self.prevalence)?;
        check_non_neg("recovery rate", self.rec_rate)?;
        check_non_neg("trays per customer", self.trays_per_customer)?;
        Ok(())
    }

    /// Same constants with a different prevalence.
    pub fn with_prevalence(&self, prevalence: f64) -> Self {
        Self {
            prevalence,
            ..*self
        }
    }
}

/// Parameters of one simulator run.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Time step.
    pub dt: f64,
    /// Number of recorded steps, including the initial one.
    pub max_steps: usize,
    /// Total tray capacity (`N0`).
    pub n_trays: u64,
    /// Contaminated trays at step 0 (`T0`).
    pub init_contaminated: u64,
    /// Per-contact transmission probability.
    pub prob_trans: f64,
    /// Customers per unit time.
    pub people: u64,
    /// Probability of sanitising before tray contact.
    pub use_before: f64,
    /// Probability of sanitising after tray contact.
    pub use_after: f64,
    /// Background prevalence.
    pub prevalence: f64,
    /// Tray decontamination rate.
    pub rec_rate: f64,
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), ModelError> {
        check_pos("time step", self.dt)?;
        check_num("number of steps", self.max_steps, 1..)?;
        check_num("number of trays", self.n_trays, 1..)?;
        check_num(
            "initial contaminated trays",
            self.init_contaminated,
            0..=self.n_trays,
        )?;
        check_prob("transmission probability", self.prob_trans)?;
        check_prob("pre-contact usage probability", self.use_before)?;
        check_prob("post-contact usage probability", self.use_after)?;
        check_prob("prevalence", self.prevalence)?;
        check_non_neg("recovery rate", self.rec_rate)?;
        check_prob("per-step case probability", self.prevalence * self.dt)?;
        Ok(())
    }

    /// Customers per tray per unit time.
    pub fn contact_rate(&self) -> f64 {
        self.people as f64 / self.n_trays as f64
    }

    /// Disease constants matching this tray configuration.
    pub fn disease(&self) -> DiseaseParameters {
        DiseaseParameters {
            contact_rate: self.contact_rate(),
            prob_trans: self.prob_trans,
            prevalence: self.prevalence,
            rec_rate: self.rec_rate,
            trays_per_customer: TRAYS_PER_CUSTOMER,
        }
    }
}

/// Mutable state of the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrayState {
    /// Current step index.
    pub step: usize,
    /// Currently contaminated trays.
    pub contaminated: u64,
}

/// Record of the simulation at a single step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub time: f64,
    pub contaminated: u64,
    /// Externally infected customers entering during this step.
    pub cases: u64,
    /// Cases that skipped sanitising before tray contact.
    pub first_decon_fail: u64,
    /// Expected per-customer exposure rate.
    pub alpha: f64,
    /// First failures that also skipped sanitising after contact.
    pub second_decon_fail: u64,
    pub new_cases: u64,
    pub reinfections: u64,
}

/// Ordered steps of one simulator run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub n_trays: u64,
    pub steps: Vec<Step>,
}

impl Trajectory {
    pub fn times(&self) -> Vec<f64> {
        self.steps.iter().map(|step| step.time).collect()
    }

    /// Contaminated fraction `T / N0` at each step.
    pub fn contaminated_frac(&self) -> Vec<f64> {
        let n_trays = self.n_trays as f64;
        self.steps
            .iter()
            .map(|step| step.contaminated as f64 / n_trays)
            .collect()
    }

    pub fn mean_contaminated(&self) -> f64 {
        mean(self.steps.iter().map(|step| step.contaminated as f64))
    }

    pub fn mean_new_cases(&self) -> f64 {
        mean(self.steps.iter().map(|step| step.new_cases as f64))
    }

    pub fn mean_reinfections(&self) -> f64 {
        mean(self.steps.iter().map(|step| step.reinfections as f64))
    }
}

fn mean(vals: impl ExactSizeIterator<Item = f64>) -> f64 {
    let n_vals = vals.len();
    if n_vals == 0 {
        return f64::NAN;
    }
    vals.sum::<f64>() / n_vals as f64
}

/// EPPM perception behind a behavioural sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Perception {
    pub threat: f64,
    pub efficacy: f64,
    /// Usage-increase factor in `[1, 1/threat]`.
    pub k: f64,
}

/// One row of a parameter sweep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BehaviouralSample {
    /// Absent when usage probabilities were drawn directly.
    pub perception: Option<Perception>,
    pub use_prior: f64,
    pub use_post: f64,
    pub pc: f64,
    pub delta_pc: f64,
    pub delta_pc8: f64,
    /// Sign of `delta_pc`.
    pub placement: Placement,
}
