//! Closed-form steady state and sensitivity of the contamination probability.
//!
//! `rho` is the probability of sanitising before tray contact and `omega` the
//! probability of sanitising after it.

use crate::error::ModelError;
use crate::model::{DiseaseParameters, Perception, SimulationConfig};
use crate::utils::check_prob;
use rand::prelude::*;
use rand_distr::Uniform;
use serde::{Deserialize, Serialize};

/// Expected fraction of contaminated trays in the simulator's steady state.
pub fn tray_steady_state(cfg: &SimulationConfig) -> f64 {
    let inflow =
        (1.0 - cfg.use_before) * cfg.prob_trans * cfg.prevalence * cfg.people as f64;
    let outflow = cfg.n_trays as f64 * cfg.rec_rate;
    if inflow + outflow == 0.0 {
        return 0.0;
    }
    inflow / (inflow + outflow)
}

impl DiseaseParameters {
    pub fn transmission(&self) -> f64 {
        self.prob_trans * self.contact_rate * self.prevalence
    }

    /// Probability that a tray is contaminated without any intervention.
    pub fn prob_tray_contaminated(&self) -> f64 {
        let transmission = self.transmission();
        if transmission == 0.0 {
            return 0.0;
        }
        transmission / (transmission + self.rec_rate)
    }

    /// Baseline contamination probability, including the tray-mediated term.
    pub fn pc00(&self) -> f64 {
        self.prevalence
            + (1.0 - self.prevalence)
                * self.trays_per_customer
                * self.prob_trans
                * self.prob_tray_contaminated()
    }

    pub fn eta(&self) -> f64 {
        let pc00 = self.pc00();
        if pc00 == 0.0 {
            return 0.0;
        }
        self.prevalence / pc00 * (1.0 - self.trays_per_customer * self.prob_trans)
    }

    /// Contamination probability (eq. 4).
    pub fn pc(&self, rho: f64, omega: f64) -> Result<f64, ModelError> {
        Ok((1.0 - rho) * (1.0 - omega) * self.prior_factor(rho)? * self.pc00())
    }

    /// Change in contamination probability (eq. 5).
    ///
    /// Positive means sanitiser works better after tray contact than before.
    pub fn delta_pc(&self, rho: f64, omega: f64) -> Result<f64, ModelError> {
        Ok((1.0 - rho) * self.prior_factor(rho)? - (1.0 - omega))
    }

    /// Alternative form of [`DiseaseParameters::delta_pc`] (eq. 8).
    pub fn delta_pc8(&self, rho: f64, omega: f64) -> Result<f64, ModelError> {
        let p = self.prob_tray_contaminated();
        let free = self.free_after_prior(rho)?;
        Ok(omega - rho + rho * p * (1.0 - self.eta()) * (1.0 - rho) / free)
    }

    pub fn placement(&self, rho: f64, omega: f64) -> Result<Placement, ModelError> {
        let delta_pc = self.delta_pc(rho, omega)?;
        Placement::from_delta(delta_pc).ok_or(ModelError::SingularParameter {
            name: "change in contamination probability",
            value: delta_pc,
        })
    }

    fn prior_factor(&self, rho: f64) -> Result<f64, ModelError> {
        let p = self.prob_tray_contaminated();
        Ok((1.0 - p * rho * self.eta()) / self.free_after_prior(rho)?)
    }

    /// `1 - p rho`, which vanishes once every tray is contaminated and every
    /// customer sanitises before contact.
    fn free_after_prior(&self, rho: f64) -> Result<f64, ModelError> {
        let free = 1.0 - self.prob_tray_contaminated() * rho;
        if !(free.is_finite() && free > 0.0) {
            return Err(ModelError::SingularParameter {
                name: "pre-contact usage",
                value: rho,
            });
        }
        Ok(free)
    }
}

/// Where sanitiser reduces contamination the most.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Placement {
    AfterContact,
    BeforeContact,
    Indifferent,
}

impl Placement {
    /// Sign of `delta_pc`, or `None` if it is NaN.
    pub fn from_delta(delta_pc: f64) -> Option<Self> {
        if delta_pc > 0.0 {
            Some(Self::AfterContact)
        } else if delta_pc < 0.0 {
            Some(Self::BeforeContact)
        } else if delta_pc == 0.0 {
            Some(Self::Indifferent)
        } else {
            None
        }
    }
}

/// How perceived threat and efficacy translate into sanitiser usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Uptake {
    /// Usage after contact grows with the threat felt at the tray.
    ThreatIncreasing,
    NonIncreasing,
}

impl Uptake {
    /// Usage probabilities `(use_prior, use_post)` for a perception.
    ///
    /// # Errors
    /// Returns [`ModelError::SingularParameter`] if `1/threat` is undefined, and
    /// [`ModelError::InvalidConfig`] if an input or a resulting usage lies
    /// outside `[0, 1]`.
    pub fn usage(self, perception: &Perception) -> Result<(f64, f64), ModelError> {
        let Perception {
            threat,
            efficacy,
            k,
        } = *perception;
        check_threat(threat)?;
        check_prob("efficacy", efficacy)?;
        if !(1.0..=1.0 / threat).contains(&k) {
            return Err(ModelError::invalid(
                "usage-increase factor",
                format!("number must be in the range [1, {}], but is {k}", 1.0 / threat),
            ));
        }

        // k <= 1/threat, so only rounding can push this past 1.
        let raised = (k * threat).min(1.0);
        let (use_prior, use_post) = match self {
            Self::ThreatIncreasing => (efficacy * threat, raised * efficacy),
            Self::NonIncreasing => (
                efficacy * threat * (efficacy + 1.0 - threat),
                efficacy * raised * (efficacy + 1.0 - raised),
            ),
        };

        check_prob("prior usage", use_prior)?;
        check_prob("post usage", use_post)?;
        Ok((use_prior, use_post))
    }
}

/// Draw a usage-increase factor uniformly from `[1, 1/threat]`.
pub fn sample_k<R: Rng + ?Sized>(threat: f64, rng: &mut R) -> Result<f64, ModelError> {
    check_threat(threat)?;
    let dist = Uniform::new_inclusive(1.0, 1.0 / threat)
        .map_err(|err| ModelError::sampling("uniform", err))?;
    Ok(dist.sample(rng))
}

fn check_threat(threat: f64) -> Result<(), ModelError> {
    // Subnormal threats are positive but still overflow 1/threat.
    if threat.is_nan() || threat <= 0.0 || !(1.0 / threat).is_finite() {
        return Err(ModelError::SingularParameter {
            name: "threat",
            value: threat,
        });
    }
    check_prob("threat", threat)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::TRAYS_PER_CUSTOMER;
    use crate::model::tests::reference_config;
    use approx::assert_relative_eq;
    use rand_chacha::ChaCha12Rng;

    pub fn reference_disease() -> DiseaseParameters {
        reference_config().disease()
    }

    #[test]
    fn reference_scenario_contamination_probability() {
        let disease = reference_disease();
        assert_relative_eq!(disease.contact_rate, 50.0);

        let transmission = 1.0 / 15.0 * 50.0 * 0.01;
        assert_relative_eq!(disease.transmission(), transmission, max_relative = 1e-12);

        let expected = transmission / (transmission + 1.0);
        assert_relative_eq!(disease.prob_tray_contaminated(), expected, max_relative = 1e-12);
        assert_relative_eq!(disease.prob_tray_contaminated(), 0.0323, epsilon = 1e-3);

        let pc00 = 0.01 + 0.99 * TRAYS_PER_CUSTOMER / 15.0 * expected;
        assert_relative_eq!(disease.pc00(), pc00, max_relative = 1e-12);
        assert_relative_eq!(
            disease.eta(),
            0.01 / pc00 * (1.0 - TRAYS_PER_CUSTOMER / 15.0),
            max_relative = 1e-12
        );
    }

    #[test]
    fn steady_state_matches_closed_form() {
        let cfg = reference_config();
        let inflow = 1.0 / 15.0 * 0.01 * 2000.0;
        assert_relative_eq!(
            tray_steady_state(&cfg),
            inflow / (inflow + 40.0),
            max_relative = 1e-12
        );
    }

    #[test]
    fn no_intervention_means_no_change() {
        let disease = reference_disease();
        assert_eq!(disease.delta_pc(0.0, 0.0).unwrap(), 0.0);
        assert_eq!(disease.delta_pc8(0.0, 0.0).unwrap(), 0.0);
        assert_relative_eq!(
            disease.pc(0.0, 0.0).unwrap(),
            disease.pc00(),
            max_relative = 1e-12
        );
        assert_eq!(disease.placement(0.0, 0.0).unwrap(), Placement::Indifferent);
    }

    #[test]
    fn post_contact_usage_is_monotone() {
        let disease = reference_disease();
        for rho in [0.0, 0.3, 0.9] {
            let omegas: Vec<f64> = (0..=20).map(|i| i as f64 / 20.0).collect();
            for pair in omegas.windows(2) {
                assert!(disease.pc(rho, pair[1]).unwrap() < disease.pc(rho, pair[0]).unwrap());
                assert!(
                    disease.delta_pc(rho, pair[1]).unwrap()
                        > disease.delta_pc(rho, pair[0]).unwrap()
                );
            }
        }
    }

    #[test]
    fn more_usage_after_than_before_is_never_harmful() {
        let disease = reference_disease();
        let mut rng = ChaCha12Rng::seed_from_u64(11);
        let mut n_checked = 0;
        for _ in 0..5000 {
            let rho: f64 = rng.random();
            let omega: f64 = rng.random();
            if omega > rho {
                let delta_pc = disease.delta_pc(rho, omega).unwrap();
                assert!(delta_pc > 0.0, "rho={rho} omega={omega}");
                assert_eq!(disease.placement(rho, omega).unwrap(), Placement::AfterContact);
                n_checked += 1;
            }
        }
        assert!(n_checked > 1000);
    }

    #[test]
    fn both_delta_forms_agree() {
        for prevalence in [0.9, 0.01, 0.0001] {
            let disease = reference_disease().with_prevalence(prevalence);
            for (rho, omega) in [(0.1, 0.2), (0.8, 0.1), (0.5, 0.5), (1.0, 0.0)] {
                assert_relative_eq!(
                    disease.delta_pc(rho, omega).unwrap(),
                    disease.delta_pc8(rho, omega).unwrap(),
                    epsilon = 1e-12
                );
            }
        }
    }

    #[test]
    fn threat_increasing_uptake() {
        let perception = Perception {
            threat: 0.5,
            efficacy: 0.8,
            k: 1.5,
        };
        let (use_prior, use_post) = Uptake::ThreatIncreasing.usage(&perception).unwrap();
        assert_relative_eq!(use_prior, 0.4, max_relative = 1e-12);
        assert_relative_eq!(use_post, 0.6, max_relative = 1e-12);
    }

    #[test]
    fn non_increasing_uptake() {
        let perception = Perception {
            threat: 0.5,
            efficacy: 0.8,
            k: 1.5,
        };
        let (use_prior, use_post) = Uptake::NonIncreasing.usage(&perception).unwrap();
        assert_relative_eq!(use_prior, 0.8 * 0.5 * 1.3, max_relative = 1e-12);
        assert_relative_eq!(use_post, 0.8 * 0.75 * 1.05, max_relative = 1e-12);
    }

    #[test]
    fn zero_threat_is_singular() {
        let mut rng = ChaCha12Rng::seed_from_u64(0);
        assert!(matches!(
            sample_k(0.0, &mut rng),
            Err(ModelError::SingularParameter { name: "threat", .. })
        ));
        let perception = Perception {
            threat: 0.0,
            efficacy: 0.5,
            k: 1.0,
        };
        assert!(matches!(
            Uptake::ThreatIncreasing.usage(&perception),
            Err(ModelError::SingularParameter { .. })
        ));
    }

    #[test]
    fn out_of_range_inputs_are_rejected() {
        let perception = Perception {
            threat: 0.5,
            efficacy: 1.2,
            k: 1.0,
        };
        assert!(matches!(
            Uptake::NonIncreasing.usage(&perception),
            Err(ModelError::InvalidConfig { .. })
        ));
        let perception = Perception {
            threat: 0.5,
            efficacy: 0.5,
            k: 3.0,
        };
        assert!(Uptake::ThreatIncreasing.usage(&perception).is_err());
    }

    #[test]
    fn sampled_k_stays_in_range() {
        let mut rng = ChaCha12Rng::seed_from_u64(2);
        for threat in [0.001, 0.25, 1.0] {
            for _ in 0..100 {
                let k = sample_k(threat, &mut rng).unwrap();
                assert!((1.0..=1.0 / threat).contains(&k));
            }
        }
    }

    #[test]
    fn saturated_trays_with_full_prior_usage_are_singular() {
        let disease = DiseaseParameters {
            rec_rate: 0.0,
            ..reference_disease()
        };
        assert!(disease.validate().is_ok());
        assert_eq!(disease.prob_tray_contaminated(), 1.0);

        for result in [
            disease.pc(1.0, 1.0),
            disease.delta_pc(1.0, 1.0),
            disease.delta_pc8(1.0, 1.0),
        ] {
            assert!(matches!(
                result,
                Err(ModelError::SingularParameter {
                    name: "pre-contact usage",
                    ..
                })
            ));
        }
        assert!(disease.placement(1.0, 1.0).is_err());
        assert!(disease.delta_pc(0.5, 1.0).unwrap().is_finite());
    }

    #[test]
    fn nan_delta_has_no_placement() {
        assert_eq!(Placement::from_delta(f64::NAN), None);
        assert_eq!(Placement::from_delta(0.0), Some(Placement::Indifferent));
        assert_eq!(Placement::from_delta(-0.1), Some(Placement::BeforeContact));
    }

    #[test]
    fn subnormal_threat_is_singular() {
        let mut rng = ChaCha12Rng::seed_from_u64(0);
        assert!(matches!(
            sample_k(5e-324, &mut rng),
            Err(ModelError::SingularParameter { name: "threat", .. })
        ));
    }
}
