use super::correlation::CholeskyFactor;
use super::rng::NormalSource;
use super::types::{Asset, AssetDetail};

#[derive(Debug, Clone)]
pub struct MonthlyReturn {
    /// End-of-month financial asset value, sum of units times price per unit.
    pub financial_assets: f64,
    pub details: Vec<AssetDetail>,
}

/// Single geometric-Brownian-motion step for one month.
pub fn monthly_rate(annual_return_pct: f64, annual_volatility_pct: f64, z: f64) -> f64 {
    let drift = annual_return_pct / 100.0 / 12.0;
    let vol = annual_volatility_pct / 100.0 / 12.0_f64.sqrt();
    (drift - vol * vol / 2.0 + vol * z).exp() - 1.0
}

/// Moves every held asset's price by one correlated monthly draw. One normal
/// is drawn per asset, held or not, so the draw sequence depends only on the
/// asset count.
pub fn apply_monthly_return<N: NormalSource>(
    month: u32,
    assets: &mut [Asset],
    factor: &CholeskyFactor,
    tax_rate: f64,
    normals: &mut N,
) -> MonthlyReturn {
    let mut independent = vec![0.0; assets.len()];
    normals.fill(&mut independent);
    let correlated = factor.correlate(&independent);

    let mut financial_assets = 0.0;
    let mut details = Vec::with_capacity(assets.len());

    for (asset, z) in assets.iter_mut().zip(correlated) {
        if asset.units == 0 {
            details.push(AssetDetail::empty(asset.average_price));
            continue;
        }

        let rate = monthly_rate(asset.annual_return, asset.volatility, z);
        asset.value_per_unit *= 1.0 + rate;

        let value = asset.market_value();
        financial_assets += value;

        details.push(AssetDetail {
            rate: rate * 100.0,
            value,
            units: asset.units,
            value_per_unit: asset.value_per_unit,
            average_price: asset.average_price,
            tax_per_unit: unrealized_tax_per_unit(asset, month, tax_rate),
        });
    }

    MonthlyReturn {
        financial_assets,
        details,
    }
}

fn unrealized_tax_per_unit(asset: &Asset, month: u32, tax_rate: f64) -> f64 {
    if !asset.is_taxable(month) || asset.value_per_unit <= asset.average_price {
        return 0.0;
    }
    (asset.price_per_unit() - asset.average_price_per_unit()) * tax_rate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::correlation::CorrelationMatrix;
    use crate::core::types::{CorrelationPair, TaxStart};

    const EPS: f64 = 1e-9;

    struct Fixed(Vec<f64>);

    impl NormalSource for Fixed {
        fn standard_normal(&mut self) -> f64 {
            self.0.remove(0)
        }
    }

    fn asset(name: &str, units: u64, value_per_unit: f64) -> Asset {
        Asset {
            name: name.to_string(),
            units,
            value_per_unit,
            unit_size: 10_000.0,
            average_price: 8_000.0,
            annual_return: 6.0,
            volatility: 15.0,
            tax_start: None,
        }
    }

    #[test]
    fn zero_volatility_grows_by_monthly_drift() {
        let rate = monthly_rate(12.0, 0.0, 3.0);
        assert!((rate - (0.01_f64.exp() - 1.0)).abs() <= EPS);
    }

    #[test]
    fn rate_uses_lognormal_correction() {
        let rate = monthly_rate(0.0, 12.0 * 12.0_f64.sqrt(), 0.0);
        // vol = 0.12 per month, so exp(-0.0072) - 1
        assert!((rate - ((-0.0072_f64).exp() - 1.0)).abs() <= EPS);
    }

    #[test]
    fn held_assets_move_and_empty_assets_keep_shape() {
        let mut assets = vec![asset("a", 1_000, 10_000.0), asset("b", 0, 20_000.0)];
        let factor = CorrelationMatrix::identity(2).cholesky().expect("identity");
        let mut normals = Fixed(vec![1.0, -1.0]);

        let result = apply_monthly_return(0, &mut assets, &factor, 0.2, &mut normals);

        let expected_rate = monthly_rate(6.0, 15.0, 1.0);
        let expected_value = 10_000.0 * (1.0 + expected_rate);
        assert!((assets[0].value_per_unit - expected_value).abs() <= EPS);
        assert_eq!(assets[1].value_per_unit, 20_000.0);

        assert_eq!(result.details.len(), 2);
        assert!((result.details[0].rate - expected_rate * 100.0).abs() <= EPS);
        assert_eq!(result.details[1], AssetDetail::empty(8_000.0));
        assert!((result.financial_assets - 1_000.0 * expected_value / 10_000.0).abs() <= EPS);
    }

    #[test]
    fn display_tax_only_for_taxable_gains() {
        let mut taxable = asset("a", 10, 12_000.0);
        taxable.volatility = 0.0;
        taxable.annual_return = 0.0;
        let mut exempt = taxable.clone();
        exempt.name = "b".to_string();
        exempt.tax_start = Some(TaxStart { year: 1, month: 1 });

        let mut assets = vec![taxable, exempt];
        let factor = CorrelationMatrix::identity(2).cholesky().expect("identity");
        let result = apply_monthly_return(3, &mut assets, &factor, 0.2, &mut Fixed(vec![0.0, 0.0]));

        // (1.2 - 0.8) * 0.2 per unit
        assert!((result.details[0].tax_per_unit - 0.08).abs() <= EPS);
        assert_eq!(result.details[1].tax_per_unit, 0.0);
    }

    #[test]
    fn second_asset_follows_correlated_shock() {
        let mut assets = vec![asset("a", 100, 10_000.0), asset("b", 100, 10_000.0)];
        let pairs = [CorrelationPair {
            first: "a".to_string(),
            second: "b".to_string(),
            coefficient: 0.6,
        }];
        let factor = CorrelationMatrix::from_pairs(&["a", "b"], &pairs)
            .cholesky()
            .expect("positive definite");

        let result =
            apply_monthly_return(0, &mut assets, &factor, 0.2, &mut Fixed(vec![1.0, 0.0]));

        // L = [[1, 0], [0.6, 0.8]] so b sees 0.6 * 1.0 + 0.8 * 0.0
        let correlated = monthly_rate(6.0, 15.0, 0.6) * 100.0;
        let independent = monthly_rate(6.0, 15.0, 0.0) * 100.0;
        assert!((result.details[0].rate - monthly_rate(6.0, 15.0, 1.0) * 100.0).abs() <= EPS);
        assert!((result.details[1].rate - correlated).abs() <= EPS);
        assert!((result.details[1].rate - independent).abs() > 1e-3);
    }
}
