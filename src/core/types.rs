use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::error::SimulationError;

/// Capital-gains rate (percent) applied when no tax-rate event is in force.
pub const DEFAULT_CAPITAL_GAINS_RATE: f64 = 20.315;

/// Upper bound on `times` accepted by validation.
pub const MAX_TRIALS: u32 = 1_000_000;
/// Upper bound on `years` accepted by validation.
pub const MAX_YEARS: u32 = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationConfig {
    /// Horizon in years.
    pub years: u32,
    /// Number of independent trials.
    pub times: u32,
    #[serde(default)]
    pub cash: f64,
    /// Annual inflation applied to the living cost, in percent.
    #[serde(default)]
    pub inflation_rate: f64,
    /// Fixed base seed for reproducible runs; drawn from OS entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl SimulationConfig {
    pub fn total_months(&self) -> u32 {
        self.years.saturating_mul(12)
    }
}

/// Offset from the simulation start at which gains on an asset become taxable.
/// `month` is 1-based; 0 is accepted and treated like 1.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxStart {
    pub year: u32,
    pub month: u32,
}

impl TaxStart {
    pub fn month_index(self) -> u32 {
        self.year
            .saturating_mul(12)
            .saturating_add(self.month.saturating_sub(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub name: String,
    pub units: u64,
    /// Value per `unit_size` units, e.g. a fund quoted per 10,000 units.
    pub value_per_unit: f64,
    #[serde(default = "default_unit_size")]
    pub unit_size: f64,
    /// Weighted-average acquisition price, same scale as `value_per_unit`.
    #[serde(default)]
    pub average_price: f64,
    /// Annualized expected return in percent.
    #[serde(default)]
    pub annual_return: f64,
    /// Annualized volatility in percent.
    #[serde(default)]
    pub volatility: f64,
    #[serde(default)]
    pub tax_start: Option<TaxStart>,
}

fn default_unit_size() -> f64 {
    1.0
}

impl Asset {
    pub fn price_per_unit(&self) -> f64 {
        if self.unit_size <= 0.0 {
            return 0.0;
        }
        self.value_per_unit / self.unit_size
    }

    pub fn average_price_per_unit(&self) -> f64 {
        if self.unit_size <= 0.0 {
            return 0.0;
        }
        self.average_price / self.unit_size
    }

    pub fn market_value(&self) -> f64 {
        self.units as f64 * self.price_per_unit()
    }

    pub fn tax_start_month(&self) -> u32 {
        self.tax_start.map(TaxStart::month_index).unwrap_or(0)
    }

    pub fn is_taxable(&self, month: u32) -> bool {
        self.tax_start_month() <= month
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationPair {
    pub first: String,
    pub second: String,
    pub coefficient: f64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchedulePattern {
    Once,
    Monthly,
    Annual,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurringInvestment {
    pub asset: String,
    pub amount: f64,
    pub pattern: SchedulePattern,
    pub start_month: u32,
    /// Last month (inclusive) for monthly and annual rules; open-ended when absent.
    #[serde(default)]
    pub end_month: Option<u32>,
}

impl RecurringInvestment {
    pub fn is_active(&self, month: u32) -> bool {
        if month < self.start_month {
            return false;
        }
        match self.pattern {
            SchedulePattern::Once => month == self.start_month,
            _ if self.end_month.is_some_and(|end| month > end) => false,
            SchedulePattern::Monthly => true,
            SchedulePattern::Annual => (month - self.start_month) % 12 == 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifeCostEvent {
    pub month: u32,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BigExpenseEvent {
    pub month: u32,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeEvent {
    pub start_month: u32,
    #[serde(default)]
    pub end_month: Option<u32>,
    pub amount: f64,
}

impl IncomeEvent {
    pub fn is_active(&self, month: u32) -> bool {
        month >= self.start_month && self.end_month.is_none_or(|end| month <= end)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxRateEvent {
    pub month: u32,
    /// Capital-gains rate in percent.
    pub rate: f64,
}

/// Everything the engine needs for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub config: SimulationConfig,
    #[serde(default)]
    pub assets: Vec<Asset>,
    #[serde(default)]
    pub correlations: Vec<CorrelationPair>,
    #[serde(default)]
    pub recurring_investments: Vec<RecurringInvestment>,
    #[serde(default)]
    pub life_costs: Vec<LifeCostEvent>,
    #[serde(default)]
    pub big_expenses: Vec<BigExpenseEvent>,
    #[serde(default)]
    pub incomes: Vec<IncomeEvent>,
    #[serde(default)]
    pub tax_rates: Vec<TaxRateEvent>,
}

impl Scenario {
    /// Rejects inputs the engine cannot interpret. An empty asset list or a
    /// trial count of zero is not an error; the engine returns no trials for it.
    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.config.years == 0 {
            return Err(SimulationError::config("years must be > 0"));
        }
        if self.config.years > MAX_YEARS {
            return Err(SimulationError::config(format!("years must be <= {MAX_YEARS}")));
        }
        if self.config.times > MAX_TRIALS {
            return Err(SimulationError::config(format!("times must be <= {MAX_TRIALS}")));
        }
        if !(self.config.cash.is_finite() && self.config.cash >= 0.0) {
            return Err(SimulationError::config("cash must be >= 0"));
        }
        if !self.config.inflation_rate.is_finite() || self.config.inflation_rate <= -100.0 {
            return Err(SimulationError::config("inflationRate must be > -100"));
        }

        let mut names = HashSet::with_capacity(self.assets.len());
        for asset in &self.assets {
            if asset.name.trim().is_empty() {
                return Err(SimulationError::config("asset name must not be empty"));
            }
            if !names.insert(asset.name.as_str()) {
                return Err(SimulationError::config(format!(
                    "asset name '{}' is not unique",
                    asset.name
                )));
            }
            if !(asset.unit_size.is_finite() && asset.unit_size > 0.0) {
                return Err(SimulationError::config(format!(
                    "unitSize of '{}' must be > 0",
                    asset.name
                )));
            }
            if !(asset.value_per_unit.is_finite() && asset.value_per_unit >= 0.0) {
                return Err(SimulationError::config(format!(
                    "valuePerUnit of '{}' must be >= 0",
                    asset.name
                )));
            }
            if !(asset.average_price.is_finite() && asset.average_price >= 0.0) {
                return Err(SimulationError::config(format!(
                    "averagePrice of '{}' must be >= 0",
                    asset.name
                )));
            }
            if !asset.annual_return.is_finite() || !asset.volatility.is_finite() {
                return Err(SimulationError::config(format!(
                    "return parameters of '{}' must be finite",
                    asset.name
                )));
            }
            if asset.volatility < 0.0 {
                return Err(SimulationError::config(format!(
                    "volatility of '{}' must be >= 0",
                    asset.name
                )));
            }
        }

        for pair in &self.correlations {
            if !(-1.0..=1.0).contains(&pair.coefficient) {
                return Err(SimulationError::config(format!(
                    "correlation between '{}' and '{}' must be between -1 and 1",
                    pair.first, pair.second
                )));
            }
        }

        for rule in &self.recurring_investments {
            if !(rule.amount.is_finite() && rule.amount >= 0.0) {
                return Err(SimulationError::config(format!(
                    "recurring investment into '{}' must have a non-negative amount",
                    rule.asset
                )));
            }
            if rule.pattern != SchedulePattern::Once
                && rule.end_month.is_some_and(|end| end < rule.start_month)
            {
                return Err(SimulationError::config(format!(
                    "recurring investment into '{}' ends before it starts",
                    rule.asset
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetDetail {
    /// Realized monthly return in percent.
    pub rate: f64,
    pub value: f64,
    pub units: u64,
    pub value_per_unit: f64,
    pub average_price: f64,
    /// Unrealized tax per unit at the current price; display only.
    pub tax_per_unit: f64,
}

impl AssetDetail {
    pub fn empty(average_price: f64) -> Self {
        Self {
            rate: 0.0,
            value: 0.0,
            units: 0,
            value_per_unit: 0.0,
            average_price,
            tax_per_unit: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialHistoryEntry {
    pub month: u32,
    pub year_month: String,
    pub transferred_assets: f64,
    pub expense: f64,
    pub income: f64,
    pub tax: f64,
    pub cash: f64,
    pub recurring_investment: f64,
    pub financial_assets: f64,
    pub total_assets: f64,
    pub assets: Vec<AssetDetail>,
    pub failed: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialResult {
    pub trial_id: u32,
    pub success: bool,
    /// Month index of failure, or the horizon in months when the trial never failed.
    pub failure_month: u32,
    pub history: Vec<TrialHistoryEntry>,
}

impl TrialResult {
    pub fn final_total_assets(&self) -> f64 {
        self.history.last().map_or(0.0, |entry| entry.total_assets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_with(asset: Asset) -> Scenario {
        Scenario {
            config: SimulationConfig {
                years: 1,
                times: 1,
                cash: 0.0,
                inflation_rate: 0.0,
                seed: None,
            },
            assets: vec![asset],
            correlations: Vec::new(),
            recurring_investments: Vec::new(),
            life_costs: Vec::new(),
            big_expenses: Vec::new(),
            incomes: Vec::new(),
            tax_rates: Vec::new(),
        }
    }

    fn fund(tax_start: Option<TaxStart>) -> Asset {
        Asset {
            name: "fund".to_string(),
            units: 10,
            value_per_unit: 100.0,
            unit_size: 1.0,
            average_price: 100.0,
            annual_return: 0.0,
            volatility: 0.0,
            tax_start,
        }
    }

    #[test]
    fn tax_start_index_is_one_based_on_month() {
        assert_eq!(TaxStart { year: 0, month: 1 }.month_index(), 0);
        assert_eq!(TaxStart { year: 1, month: 6 }.month_index(), 17);
        assert_eq!(TaxStart { year: 2, month: 0 }.month_index(), 24);
    }

    #[test]
    fn far_future_tax_start_saturates() {
        let start = TaxStart {
            year: 400_000_000,
            month: 1,
        };
        assert_eq!(start.month_index(), u32::MAX);

        let asset = fund(Some(start));
        assert!(!asset.is_taxable(0));
        assert!(!asset.is_taxable(MAX_YEARS * 12));
        assert!(scenario_with(asset).validate().is_ok());
    }

    #[test]
    fn trial_count_and_horizon_are_bounded() {
        let mut scenario = scenario_with(fund(None));
        scenario.config.times = MAX_TRIALS;
        scenario.config.years = MAX_YEARS;
        assert!(scenario.validate().is_ok());

        scenario.config.times = u32::MAX;
        assert!(matches!(
            scenario.validate(),
            Err(SimulationError::Configuration(msg)) if msg.contains("times")
        ));

        scenario.config.times = 1;
        scenario.config.years = MAX_YEARS + 1;
        assert!(matches!(
            scenario.validate(),
            Err(SimulationError::Configuration(msg)) if msg.contains("years")
        ));
    }
}
