use super::types::{
    BigExpenseEvent, DEFAULT_CAPITAL_GAINS_RATE, IncomeEvent, LifeCostEvent, TaxRateEvent,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CashFlow {
    pub cash: f64,
    pub income: f64,
    pub expense: f64,
    /// Part of this month's expense that cash could not cover.
    pub shortfall: f64,
}

/// Credits this month's income, then pays the living cost plus any one-off
/// expenses. Income is always credited before anything is paid.
pub fn handle_income_and_expense(
    month: u32,
    cash: f64,
    incomes: &[IncomeEvent],
    big_expenses: &[BigExpenseEvent],
    living_cost: f64,
) -> CashFlow {
    let income: f64 = incomes
        .iter()
        .filter(|event| event.is_active(month))
        .map(|event| event.amount)
        .sum();
    let cash = cash + income;

    let one_off: f64 = big_expenses
        .iter()
        .filter(|event| event.month == month)
        .map(|event| event.amount)
        .sum();
    let expense = living_cost + one_off;

    if cash >= expense {
        CashFlow {
            cash: cash - expense,
            income,
            expense,
            shortfall: 0.0,
        }
    } else {
        CashFlow {
            cash: 0.0,
            income,
            expense,
            shortfall: expense - cash,
        }
    }
}

/// Capital-gains rate in force for `month`, as a fraction. The latest event at
/// or before the month wins; on equal months the later-declared one wins.
pub fn tax_rate_for_month(month: u32, events: &[TaxRateEvent]) -> f64 {
    let mut in_force: Option<&TaxRateEvent> = None;
    for event in events.iter().filter(|event| event.month <= month) {
        if in_force.is_none_or(|current| event.month >= current.month) {
            in_force = Some(event);
        }
    }
    in_force.map_or(DEFAULT_CAPITAL_GAINS_RATE, |event| event.rate) / 100.0
}

/// Monthly living cost as a step function with annual inflation.
///
/// The earliest event sets the baseline from month 0. Each later event
/// replaces the baseline in its month, and in that month no inflation step is
/// applied even if it falls on a year boundary.
#[derive(Debug, Clone)]
pub struct LivingCost {
    events: Vec<LifeCostEvent>,
    next: usize,
    current: f64,
    inflation: f64,
}

impl LivingCost {
    pub fn new(events: &[LifeCostEvent], annual_inflation_pct: f64) -> Self {
        let mut events = events.to_vec();
        events.sort_by_key(|event| event.month);
        let current = events.first().map_or(0.0, |event| event.amount);
        Self {
            next: usize::from(!events.is_empty()),
            events,
            current,
            inflation: annual_inflation_pct / 100.0,
        }
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    /// Steps the baseline to `month` and returns the cost in force. Must be
    /// called once per month in increasing order.
    pub fn advance(&mut self, month: u32) -> f64 {
        let mut reset = false;
        while let Some(event) = self.events.get(self.next) {
            if event.month > month {
                break;
            }
            self.current = event.amount;
            self.next += 1;
            reset = true;
        }

        if month > 0 && month % 12 == 0 && !reset {
            self.current *= 1.0 + self.inflation;
        }
        self.current
    }
}
