mod cashflow;
mod correlation;
mod engine;
mod error;
mod investment;
mod liquidation;
mod returns;
mod rng;
mod summary;
mod types;

pub use cashflow::{CashFlow, LivingCost, handle_income_and_expense, tax_rate_for_month};
pub use correlation::{CholeskyFactor, CorrelationMatrix};
pub use engine::{
    correlation_factor, run_simulation, run_simulation_with_cancel, run_trial, year_month_label,
};
pub use error::SimulationError;
pub use investment::{InvestmentOutcome, apply_recurring_investments};
pub use liquidation::{SaleOutcome, handle_asset_sale};
pub use returns::{MonthlyReturn, apply_monthly_return, monthly_rate};
pub use rng::{BoxMuller, NormalSource, base_seed, derive_seed};
pub use summary::{Assessment, SimulationSummary, percentile, summarize};
pub use types::{
    Asset, AssetDetail, BigExpenseEvent, CorrelationPair, DEFAULT_CAPITAL_GAINS_RATE, IncomeEvent,
    LifeCostEvent, MAX_TRIALS, MAX_YEARS, RecurringInvestment, Scenario, SchedulePattern,
    SimulationConfig, TaxRateEvent, TaxStart, TrialHistoryEntry, TrialResult,
};
