use super::types::{Asset, RecurringInvestment};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvestmentOutcome {
    pub cash: f64,
    pub invested: f64,
}

/// Executes every rule active in `month`, in declaration order. A rule is
/// skipped whole when cash cannot cover it, when its asset is unknown, or when
/// the asset has no positive price.
pub fn apply_recurring_investments(
    month: u32,
    cash: f64,
    assets: &mut [Asset],
    rules: &[RecurringInvestment],
) -> InvestmentOutcome {
    let mut cash = cash;
    let mut invested = 0.0;

    for rule in rules.iter().filter(|rule| rule.is_active(month)) {
        let Some(asset) = assets.iter_mut().find(|asset| asset.name == rule.asset) else {
            continue;
        };
        if cash < rule.amount {
            continue;
        }
        let price = asset.price_per_unit();
        if price <= 0.0 {
            continue;
        }

        cash -= rule.amount;
        invested += rule.amount;
        buy(asset, rule.amount, price);
    }

    InvestmentOutcome { cash, invested }
}

fn buy(asset: &mut Asset, amount: f64, price: f64) {
    let bought = (amount / price).floor() as u64;
    let old_cost = asset.units as f64 * asset.average_price_per_unit();
    let units = asset.units + bought;

    asset.units = units;
    if units > 0 {
        asset.average_price = (old_cost + amount) / units as f64 * asset.unit_size;
    }
}
