//! Summary statistics of simulated series.

use serde::{Deserialize, Serialize};

/// Online mean and standard deviation (Welford).
#[derive(Debug, Default)]
pub struct Accumulator {
    n_vals: usize,
    mean: f64,
    diff_2_sum: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccumulatorReport {
    pub n_vals: usize,
    pub mean: f64,
    pub std_dev: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, val: f64) {
        self.n_vals += 1;

        let diff_a = val - self.mean;
        self.mean += diff_a / self.n_vals as f64;

        let diff_b = val - self.mean;
        self.diff_2_sum += diff_a * diff_b;
    }

    pub fn report(&self) -> AccumulatorReport {
        AccumulatorReport {
            n_vals: self.n_vals,
            mean: if self.n_vals > 0 { self.mean } else { f64::NAN },
            std_dev: if self.n_vals > 1 {
                (self.diff_2_sum / (self.n_vals as f64 - 1.0)).sqrt()
            } else {
                f64::NAN
            },
        }
    }
}

/// Statistics of a correlated time series after discarding its transient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesReport {
    /// First index of the equilibrated part.
    pub i_equil: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub sem: f64,
    /// Whether a transient shorter than half of the series was found.
    pub is_equil: bool,
}

pub fn report_time_series(time_series: &[f64]) -> TimeSeriesReport {
    let i_equil = compute_opt_i_equil(time_series);
    let tail = summarize(&time_series[i_equil..]);
    TimeSeriesReport {
        i_equil,
        mean: tail.mean,
        std_dev: tail.std_dev,
        sem: blocking_sem(&time_series[i_equil..]),
        is_equil: i_equil != time_series.len() / 2,
    }
}

fn summarize(vals: &[f64]) -> AccumulatorReport {
    let mut acc = Accumulator::new();
    vals.iter().for_each(|&val| acc.add(val));
    acc.report()
}

/// Squared standard error estimated at one blocking level.
#[derive(Debug, Clone, Copy)]
struct BlockLevel {
    sem2: f64,
    sem2_err: f64,
}

impl BlockLevel {
    /// `None` once fewer than two blocks remain.
    fn of(blocks: &[f64]) -> Option<Self> {
        let n_blocks = blocks.len();
        if n_blocks < 2 {
            return None;
        }
        let std_dev = summarize(blocks).std_dev;
        let sem2 = std_dev * std_dev / n_blocks as f64;
        Some(Self {
            sem2,
            sem2_err: sem2 * (2.0 / (n_blocks - 1) as f64).sqrt(),
        })
    }

    fn lower_bound(&self) -> f64 {
        self.sem2 - self.sem2_err
    }
}

/// Standard error of the mean by Flyvbjerg-Petersen blocking.
///
/// Neighbouring values are averaged pairwise while two or more blocks remain;
/// the first level above every later lower bound gives the estimate.
fn blocking_sem(time_series: &[f64]) -> f64 {
    let levels: Vec<BlockLevel> = std::iter::successors(Some(time_series.to_vec()), |blocks| {
        (blocks.len() >= 4).then(|| {
            blocks
                .chunks_exact(2)
                .map(|pair| 0.5 * (pair[0] + pair[1]))
                .collect()
        })
    })
    .map_while(|blocks| BlockLevel::of(&blocks))
    .collect();

    let plateau = (0..levels.len()).find(|&i_level| {
        let max_lower = levels[i_level..]
            .iter()
            .map(BlockLevel::lower_bound)
            .fold(f64::NEG_INFINITY, f64::max);
        levels[i_level].sem2 > max_lower
    });

    match plateau.or(levels.len().checked_sub(1)) {
        Some(i_level) => levels[i_level].sem2.sqrt(),
        None => f64::NAN,
    }
}

/// Equilibration index minimising the marginal standard error.
fn compute_opt_i_equil(time_series: &[f64]) -> usize {
    let n_vals = time_series.len();
    let mut opt_i_equil = n_vals / 2;
    if n_vals < 2 {
        return opt_i_equil;
    }

    let mut min_mse = f64::INFINITY;
    let n_idxs = n_vals.ilog2() + 1;
    for idx in 0..n_idxs {
        let i_equil = n_vals / 2_usize.pow(n_idxs - idx);
        let tail = &time_series[i_equil..];
        let n_tail = tail.len();
        if n_tail < 2 {
            continue;
        }

        let std_dev = summarize(tail).std_dev;
        let mse = std_dev * std_dev * (n_tail - 1) as f64 / n_tail.pow(2) as f64;
        if mse < min_mse {
            min_mse = mse;
            opt_i_equil = i_equil;
        }
    }

    opt_i_equil
}
