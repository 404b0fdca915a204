use serde::Serialize;

use super::types::TrialResult;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Assessment {
    Exceptional,
    VeryHigh,
    High,
    Marginal,
    Risky,
    Poor,
    VeryPoor,
    Hopeless,
}

impl Assessment {
    pub fn from_success_rate(success_rate_pct: f64) -> Self {
        match success_rate_pct {
            r if r >= 99.0 => Self::Exceptional,
            r if r >= 95.0 => Self::VeryHigh,
            r if r >= 90.0 => Self::High,
            r if r >= 80.0 => Self::Marginal,
            r if r >= 50.0 => Self::Risky,
            r if r >= 40.0 => Self::Poor,
            r if r >= 20.0 => Self::VeryPoor,
            _ => Self::Hopeless,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSummary {
    pub trials: u32,
    pub successes: u32,
    pub failures: u32,
    /// Percent of trials that never failed.
    pub success_rate: f64,
    pub median_success_assets: f64,
    pub p10_success_assets: f64,
    pub median_failure_assets: f64,
    pub p10_failure_assets: f64,
    /// Months elapsed until failure, counting the failing month.
    pub median_months_to_failure: f64,
    pub p10_months_to_failure: f64,
    pub assessment: Assessment,
    /// Success rate looks fine but the pessimistic successful outcome leaves nothing.
    pub thin_margin: bool,
}

pub fn summarize(results: &[TrialResult]) -> SimulationSummary {
    let mut success_assets = Vec::new();
    let mut failure_assets = Vec::new();
    let mut failure_months = Vec::new();

    for trial in results {
        if trial.success {
            success_assets.push(trial.final_total_assets());
        } else {
            failure_assets.push(trial.final_total_assets());
            failure_months.push(trial.failure_month as f64 + 1.0);
        }
    }

    let trials = results.len() as u32;
    let successes = success_assets.len() as u32;
    let success_rate = if trials > 0 {
        successes as f64 / trials as f64 * 100.0
    } else {
        0.0
    };
    let p10_success_assets = percentile(&mut success_assets, 10.0);

    SimulationSummary {
        trials,
        successes,
        failures: trials - successes,
        success_rate,
        median_success_assets: percentile(&mut success_assets, 50.0),
        p10_success_assets,
        median_failure_assets: percentile(&mut failure_assets, 50.0),
        p10_failure_assets: percentile(&mut failure_assets, 10.0),
        median_months_to_failure: percentile(&mut failure_months, 50.0),
        p10_months_to_failure: percentile(&mut failure_months, 10.0),
        assessment: Assessment::from_success_rate(success_rate),
        thin_margin: success_rate >= 50.0 && p10_success_assets <= 0.0,
    }
}

/// Linear-interpolated order statistic; 0 for an empty set.
pub fn percentile(values: &mut [f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    values.sort_by(|a, b| a.total_cmp(b));

    let n = values.len();
    if n == 1 {
        return values[0];
    }

    let rank = (p / 100.0) * (n as f64 - 1.0);
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;

    if lower == upper {
        values[lower]
    } else {
        let w = rank - lower as f64;
        values[lower] * (1.0 - w) + values[upper] * w
    }
}
