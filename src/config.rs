use crate::calculator::Uptake;
use crate::model::{DiseaseParameters, SimulationConfig};
use crate::sweep::{DEFAULT_PREVALENCES, SampleMode, default_axis};
use crate::utils::check_prob;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Run configuration.
///
/// Loaded from a TOML file and validated before use. Every field has a
/// default reproducing the reference airport lane, so an empty file is valid.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Disease constants.
    pub disease: DiseaseSection,
    /// Screening lane and its simulation.
    pub trays: TraySection,
    /// Behavioural sweeps.
    pub sweep: SweepSection,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiseaseSection {
    /// Per-contact transmission probability.
    pub prob_trans: f64,
    /// Background prevalence.
    pub prevalence: f64,
    /// Tray decontamination rate.
    pub rec_rate: f64,
    /// Customers per tray per unit time; derived from the lane when absent.
    pub contact_rate: Option<f64>,
}

impl Default for DiseaseSection {
    fn default() -> Self {
        Self {
            prob_trans: 1.0 / 15.0,
            prevalence: 0.01,
            rec_rate: 1.0,
            contact_rate: None,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TraySection {
    pub dt: f64,
    pub max_steps: usize,
    pub n_trays: u64,
    pub init_contaminated: u64,
    pub people: u64,
    pub use_before: f64,
    pub use_after: f64,
}

impl Default for TraySection {
    fn default() -> Self {
        Self {
            dt: 0.1,
            max_steps: 10_000,
            n_trays: 40,
            init_contaminated: 0,
            people: 2000,
            use_before: 0.0,
            use_after: 0.0,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SweepSection {
    pub mode: SampleMode,
    pub uptake: Uptake,
    /// Prevalences of the prevalence-sensitivity mode.
    pub prevalences: Vec<f64>,
}

impl Default for SweepSection {
    fn default() -> Self {
        Self {
            mode: SampleMode::Grid {
                axis: default_axis(),
            },
            uptake: Uptake::ThreatIncreasing,
            prevalences: DEFAULT_PREVALENCES.to_vec(),
        }
    }
}

impl Config {
    /// Load a [`Config`] from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.simulation()
            .validate()
            .context("invalid tray simulation")?;
        self.disease()
            .validate()
            .context("invalid disease parameters")?;
        for &prevalence in &self.sweep.prevalences {
            check_prob("sweep prevalence", prevalence).context("invalid prevalence list")?;
        }
        Ok(())
    }

    pub fn simulation(&self) -> SimulationConfig {
        SimulationConfig {
            dt: self.trays.dt,
            max_steps: self.trays.max_steps,
            n_trays: self.trays.n_trays,
            init_contaminated: self.trays.init_contaminated,
            prob_trans: self.disease.prob_trans,
            people: self.trays.people,
            use_before: self.trays.use_before,
            use_after: self.trays.use_after,
            prevalence: self.disease.prevalence,
            rec_rate: self.disease.rec_rate,
        }
    }

    pub fn disease(&self) -> DiseaseParameters {
        let mut disease = self.simulation().disease();
        if let Some(contact_rate) = self.disease.contact_rate {
            disease.contact_rate = contact_rate;
        }
        disease
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_reference_lane() {
        let config = Config::from_toml("").unwrap();
        let cfg = config.simulation();
        assert_eq!(cfg.n_trays, 40);
        assert_eq!(cfg.people, 2000);
        assert_eq!(config.disease().contact_rate, 50.0);
        assert_eq!(config.sweep.prevalences.len(), 6);
    }

    #[test]
    fn sections_override_defaults() {
        let config = Config::from_toml(
            r#"
[disease]
prevalence = 0.1
contact_rate = 20.0

[trays]
max_steps = 50
use_before = 0.3

[sweep]
uptake = "non-increasing"
mode = { kind = "random-usage", n_samples = 10 }
"#,
        )
        .unwrap();

        assert_eq!(config.simulation().max_steps, 50);
        assert_eq!(config.simulation().prevalence, 0.1);
        assert_eq!(config.disease().contact_rate, 20.0);
        assert_eq!(config.sweep.uptake, Uptake::NonIncreasing);
        assert_eq!(config.sweep.mode, SampleMode::RandomUsage { n_samples: 10 });
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(Config::from_toml("[trays]\nn_trays = 0\n").is_err());
        assert!(Config::from_toml("[trays]\ninit_contaminated = 41\n").is_err());
        assert!(Config::from_toml("[disease]\nprevalence = 1.5\n").is_err());
        assert!(Config::from_toml("[sweep]\nprevalences = [0.1, -0.1]\n").is_err());
        assert!(Config::from_toml("[trays]\nunknown = 1\n").is_err());
    }
}
