use tracing::warn;

use super::types::Asset;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SaleOutcome {
    /// Cash left after paying the shortfall, floored to a whole amount.
    pub cash: f64,
    pub tax: f64,
    /// Gross sale proceeds before tax.
    pub proceeds: f64,
    /// The shortfall could not be fully funded; the trial has failed.
    pub failed: bool,
}

impl SaleOutcome {
    fn failure() -> Self {
        Self {
            cash: 0.0,
            tax: 0.0,
            proceeds: 0.0,
            failed: true,
        }
    }
}

/// Sells holdings to fund `required`. Taxable holdings are exhausted before
/// tax-exempt ones; within each group the declared asset order is kept.
///
/// When the whole portfolio is worth less than what is needed nothing is
/// sold and the outcome is a failure with zero cash.
pub fn handle_asset_sale(
    required: f64,
    cash: f64,
    assets: &mut [Asset],
    tax_rate: f64,
    month: u32,
) -> SaleOutcome {
    if required <= 0.0 {
        return SaleOutcome {
            cash: cash.floor(),
            tax: 0.0,
            proceeds: 0.0,
            failed: false,
        };
    }

    let needed = required - cash;
    let total_value: f64 = assets.iter().map(Asset::market_value).sum();
    if assets.is_empty() || total_value < needed {
        return SaleOutcome::failure();
    }

    let mut remaining = needed;
    let mut proceeds = 0.0;
    let mut tax = 0.0;

    let (taxable, exempt): (Vec<&mut Asset>, Vec<&mut Asset>) = assets
        .iter_mut()
        .partition(|asset| asset.is_taxable(month));

    for asset in taxable {
        if remaining <= 0.0 {
            break;
        }
        if let Some(sale) = sell_units(asset, remaining, Some(tax_rate)) {
            remaining -= sale.gross - sale.tax;
            proceeds += sale.gross;
            tax += sale.tax;
        }
    }

    for asset in exempt {
        if remaining <= 0.0 {
            break;
        }
        if let Some(sale) = sell_units(asset, remaining, None) {
            remaining = (remaining - sale.gross).max(0.0);
            proceeds += sale.gross;
        }
    }

    if remaining > 0.0 {
        warn!(
            month,
            remaining, needed, total_value, "liquidation left a shortfall despite sufficient value"
        );
        return SaleOutcome {
            tax,
            proceeds,
            ..SaleOutcome::failure()
        };
    }

    SaleOutcome {
        cash: (proceeds - tax - needed).floor(),
        tax,
        proceeds,
        failed: false,
    }
}

struct UnitSale {
    gross: f64,
    tax: f64,
}

/// Sells whole units of one asset towards `remaining`. Sale price per unit is
/// floored and cost per unit ceiled. A holding whose net proceeds per unit are
/// not positive is sold out entirely.
fn sell_units(asset: &mut Asset, remaining: f64, tax_rate: Option<f64>) -> Option<UnitSale> {
    let unit_sale = asset.price_per_unit().floor();
    if unit_sale <= 0.0 || asset.units == 0 {
        return None;
    }

    let unit_gain = unit_sale - asset.average_price_per_unit().ceil();
    let unit_tax = match tax_rate {
        Some(rate) if unit_gain > 0.0 => unit_gain * rate,
        _ => 0.0,
    };
    let unit_net = unit_sale - unit_tax;

    let target = if unit_net > 0.0 {
        (remaining / unit_net).ceil() as u64
    } else {
        asset.units
    };
    let sold = target.min(asset.units);
    if sold == 0 {
        return None;
    }

    asset.units -= sold;
    Some(UnitSale {
        gross: sold as f64 * unit_sale,
        tax: sold as f64 * unit_tax,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::TaxStart;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn holding(name: &str, units: u64, price: f64, average: f64) -> Asset {
        Asset {
            name: name.to_string(),
            units,
            value_per_unit: price,
            unit_size: 1.0,
            average_price: average,
            annual_return: 0.0,
            volatility: 0.0,
            tax_start: None,
        }
    }

    #[test]
    fn taxable_sale_grosses_up_for_tax() {
        let mut assets = vec![holding("a", 100, 100.0, 50.0)];

        let outcome = handle_asset_sale(3_000.0, 0.0, &mut assets, 0.20, 0);

        // gain 50, tax 10, net 90 per unit -> ceil(3000 / 90) = 34 units
        assert!(!outcome.failed);
        assert_eq!(assets[0].units, 66);
        assert_approx(outcome.proceeds, 3_400.0);
        assert_approx(outcome.tax, 340.0);
        assert_approx(outcome.cash, 60.0);
    }

    #[test]
    fn insufficient_total_value_fails_without_selling() {
        let mut assets = vec![holding("a", 10, 100.0, 50.0), holding("b", 5, 10.0, 10.0)];

        let outcome = handle_asset_sale(5_000.0, 0.0, &mut assets, 0.2, 0);

        assert!(outcome.failed);
        assert_eq!(outcome.cash, 0.0);
        assert_eq!(assets[0].units, 10);
        assert_eq!(assets[1].units, 5);
    }

    #[test]
    fn rounded_down_sale_price_can_leave_a_shortfall() {
        // 10 units quoted at 1.5 are worth 15 but only sell for 1 each
        let mut assets = vec![holding("fund", 10, 1.5, 0.0)];
        let outcome = handle_asset_sale(12.0, 0.0, &mut assets, 0.2, 0);

        assert!(outcome.failed);
        assert_approx(outcome.cash, 0.0);
        assert_approx(outcome.proceeds, 10.0);
        assert_approx(outcome.tax, 2.0);
        assert_eq!(assets[0].units, 0);
    }

    #[test]
    fn no_assets_fails() {
        let outcome = handle_asset_sale(1.0, 0.0, &mut [], 0.2, 0);
        assert!(outcome.failed);
        assert_eq!(outcome.cash, 0.0);
    }

    #[test]
    fn zero_requirement_sells_nothing() {
        let mut assets = vec![holding("a", 10, 100.0, 50.0)];
        let outcome = handle_asset_sale(0.0, 12.7, &mut assets, 0.2, 0);
        assert!(!outcome.failed);
        assert_approx(outcome.cash, 12.0);
        assert_eq!(assets[0].units, 10);
    }

    #[test]
    fn taxable_holdings_are_sold_before_exempt_ones() {
        let mut exempt = holding("exempt", 100, 100.0, 50.0);
        exempt.tax_start = Some(TaxStart { year: 5, month: 1 });
        let taxable = holding("taxable", 10, 100.0, 100.0);
        let mut assets = vec![exempt, taxable];

        let outcome = handle_asset_sale(1_500.0, 0.0, &mut assets, 0.2, 0);

        // taxable has no gain: 10 units -> 1000, remaining 500 from exempt
        assert!(!outcome.failed);
        assert_eq!(assets[1].units, 0);
        assert_eq!(assets[0].units, 95);
        assert_approx(outcome.tax, 0.0);
        assert_approx(outcome.proceeds, 1_500.0);
        assert_approx(outcome.cash, 0.0);
    }

    #[test]
    fn exemption_ends_at_tax_start_month() {
        let mut asset = holding("a", 100, 100.0, 50.0);
        asset.tax_start = Some(TaxStart { year: 1, month: 1 });
        let mut before = vec![asset.clone()];
        let mut after = vec![asset];

        let untaxed = handle_asset_sale(900.0, 0.0, &mut before, 0.2, 11);
        let taxed = handle_asset_sale(900.0, 0.0, &mut after, 0.2, 12);

        assert_approx(untaxed.tax, 0.0);
        assert_eq!(before[0].units, 91);
        assert_approx(taxed.tax, 100.0);
        assert_eq!(after[0].units, 90);
    }

    #[test]
    fn loss_making_holding_uses_sale_price_only() {
        let mut assets = vec![holding("a", 100, 40.0, 90.0)];
        let outcome = handle_asset_sale(100.0, 0.0, &mut assets, 0.5, 0);
        assert!(!outcome.failed);
        assert_eq!(assets[0].units, 97);
        assert_approx(outcome.tax, 0.0);
        assert_approx(outcome.cash, 20.0);
    }

    #[test]
    fn fractional_prices_floor_sale_and_ceil_cost() {
        let mut asset = holding("a", 10, 10.9, 5.1);
        asset.unit_size = 1.0;
        let mut assets = vec![asset];

        // sale 10, cost 6, gain 4, tax 2 at 50%, net 8 -> ceil(20 / 8) = 3 units
        let outcome = handle_asset_sale(20.0, 0.0, &mut assets, 0.5, 0);
        assert_eq!(assets[0].units, 7);
        assert_approx(outcome.proceeds, 30.0);
        assert_approx(outcome.tax, 6.0);
        assert_approx(outcome.cash, 4.0);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(48))]
        #[test]
        fn successful_sale_covers_requirement(
            units in 1_u64..500,
            price in 1_u64..400,
            average in 0_u64..400,
            rate in 0.0_f64..0.6,
            fraction in 0.01_f64..0.95,
        ) {
            let mut assets = vec![holding("a", units, price as f64, average as f64)];
            let required = (units * price) as f64 * fraction;

            let outcome = handle_asset_sale(required, 0.0, &mut assets, rate, 0);

            if !outcome.failed {
                prop_assert!(outcome.cash >= 0.0);
                prop_assert!(outcome.proceeds - outcome.tax + 1e-9 >= required);
                prop_assert!(assets[0].units <= units);
            } else {
                prop_assert_eq!(outcome.cash, 0.0);
            }
        }
    }
}
