use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use super::cashflow::{LivingCost, handle_income_and_expense, tax_rate_for_month};
use super::correlation::{CholeskyFactor, CorrelationMatrix};
use super::error::SimulationError;
use super::investment::apply_recurring_investments;
use super::liquidation::handle_asset_sale;
use super::returns::apply_monthly_return;
use super::rng::{BoxMuller, NormalSource, base_seed, derive_seed};
use super::types::{Asset, Scenario, TrialHistoryEntry, TrialResult};

/// Runs every trial of `scenario` and returns them in trial-id order.
///
/// An empty asset list or zero trials yields an empty result. Inconsistent
/// correlations abort the run before any trial is simulated.
pub fn run_simulation(scenario: &Scenario) -> Result<Vec<TrialResult>, SimulationError> {
    run_simulation_with_cancel(scenario, &AtomicBool::new(false))
}

/// Same as [`run_simulation`], checking `cancel` before each trial.
pub fn run_simulation_with_cancel(
    scenario: &Scenario,
    cancel: &AtomicBool,
) -> Result<Vec<TrialResult>, SimulationError> {
    if scenario.assets.is_empty() || scenario.config.times == 0 {
        debug!(
            assets = scenario.assets.len(),
            times = scenario.config.times,
            "nothing to simulate"
        );
        return Ok(Vec::new());
    }
    scenario.validate()?;

    let factor = correlation_factor(scenario)?;
    let seed = base_seed(scenario.config.seed);
    debug!(
        trials = scenario.config.times,
        months = scenario.config.total_months(),
        assets = scenario.assets.len(),
        seed,
        "starting simulation"
    );

    let mut results = Vec::new();
    for trial_id in 1..=scenario.config.times {
        if cancel.load(Ordering::Relaxed) {
            info!(completed = results.len(), "simulation cancelled");
            return Err(SimulationError::Cancelled);
        }
        let mut normals = BoxMuller::seeded(derive_seed(seed, trial_id));
        results.push(run_trial(scenario, &factor, trial_id, &mut normals));
    }

    let successes = results.iter().filter(|r| r.success).count();
    info!(trials = results.len(), successes, "simulation finished");
    Ok(results)
}

pub fn correlation_factor(scenario: &Scenario) -> Result<CholeskyFactor, SimulationError> {
    let names = scenario
        .assets
        .iter()
        .map(|asset| asset.name.as_str())
        .collect::<Vec<_>>();
    CorrelationMatrix::from_pairs(&names, &scenario.correlations)
        .cholesky()
        .inspect_err(|err| warn!(%err, "correlation factorization failed"))
}

/// One trial over the full horizon. Works on its own copy of the asset
/// template and stops after the first failed month.
pub fn run_trial<N: NormalSource>(
    scenario: &Scenario,
    factor: &CholeskyFactor,
    trial_id: u32,
    normals: &mut N,
) -> TrialResult {
    let config = &scenario.config;
    let total_months = config.total_months();

    let mut assets: Vec<Asset> = scenario.assets.clone();
    let mut living_cost = LivingCost::new(&scenario.life_costs, config.inflation_rate);
    let mut cash = config.cash;
    let mut failure_month = None;
    let mut history: Vec<TrialHistoryEntry> = Vec::with_capacity(total_months as usize);

    for month in 0..total_months {
        if failure_month.is_some() {
            break;
        }

        let transferred_assets = match history.last() {
            Some(previous) => previous.financial_assets,
            None => opening_valuation(&scenario.assets),
        };
        let tax_rate = tax_rate_for_month(month, &scenario.tax_rates);
        let monthly_cost = living_cost.advance(month);

        let flow = handle_income_and_expense(
            month,
            cash,
            &scenario.incomes,
            &scenario.big_expenses,
            monthly_cost,
        );
        cash = flow.cash;

        let investment =
            apply_recurring_investments(month, cash, &mut assets, &scenario.recurring_investments);
        cash = investment.cash;

        let mut tax = 0.0;
        if flow.shortfall > 0.0 {
            let sale = handle_asset_sale(flow.shortfall, cash, &mut assets, tax_rate, month);
            cash = sale.cash;
            tax = sale.tax;
            if sale.failed {
                failure_month = Some(month);
            }
        }

        let returns = apply_monthly_return(month, &mut assets, factor, tax_rate, normals);
        let total_assets = returns.financial_assets + cash;
        if total_assets < 0.0 {
            failure_month = Some(month);
        }

        history.push(TrialHistoryEntry {
            month,
            year_month: year_month_label(month),
            transferred_assets,
            expense: flow.expense,
            income: flow.income,
            tax,
            cash,
            recurring_investment: investment.invested,
            financial_assets: returns.financial_assets,
            total_assets,
            assets: returns.details,
            failed: failure_month.is_some(),
        });
    }

    TrialResult {
        trial_id,
        success: failure_month.is_none(),
        failure_month: failure_month.unwrap_or(total_months),
        history,
    }
}

fn opening_valuation(assets: &[Asset]) -> f64 {
    assets.iter().map(Asset::market_value).sum()
}

/// Elapsed-time label, e.g. month 14 is `"1y 3m"`.
pub fn year_month_label(month: u32) -> String {
    format!("{}y {}m", month / 12, month % 12 + 1)
}
