//! Conversion of amounts into the base currency.
//!
//! Rates are looked up directly as `from → base`. Rows whose currency has
//! no rate are left unconverted and reported once per currency.

use crate::records::{CollateralItem, FxRate, GuaranteeItem, ProvisionItem};
use crate::unify::UnifiedExposure;
use crm_core::{CrmIssue, Relation};
use std::collections::{BTreeMap, HashMap};

/// Rates into a single base currency.
#[derive(Debug, Clone)]
pub struct FxTable {
    base: String,
    rates: HashMap<String, f64>,
}

impl FxTable {
    /// Builds the table from rates; only rates into `base_currency` are kept.
    pub fn new(rates: &[FxRate], base_currency: &str) -> Self {
        let rates = rates
            .iter()
            .filter(|r| r.to == base_currency && r.rate.is_finite() && r.rate > 0.0)
            .map(|r| (r.from.clone(), r.rate))
            .collect();
        Self {
            base: base_currency.to_string(),
            rates,
        }
    }

    /// Base currency.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Rate from `currency` into the base; 1 for the base itself.
    pub fn rate_to_base(&self, currency: &str) -> Option<f64> {
        if currency == self.base {
            Some(1.0)
        } else {
            self.rates.get(currency).copied()
        }
    }
}

#[derive(Default)]
struct MissingRates(BTreeMap<String, usize>);

impl MissingRates {
    fn record(&mut self, currency: &str) {
        *self.0.entry(currency.to_string()).or_insert(0) += 1;
    }

    fn into_issues(self, relation: &'static str) -> Vec<CrmIssue> {
        self.0
            .into_iter()
            .map(|(ccy, rows)| {
                CrmIssue::data_quality(
                    "fx_rate_missing",
                    format!("No FX rate for {}; {} {} row(s) left unconverted", ccy, rows, relation),
                )
                .with_entity(ccy)
                .with_context("relation", relation)
                .with_context("rows", rows)
            })
            .collect()
    }
}

/// Converts exposure amounts, recording the original currency and amount.
pub fn convert_exposures(rows: &mut [UnifiedExposure], table: &FxTable) -> Vec<CrmIssue> {
    let mut missing = MissingRates::default();
    for row in rows.iter_mut() {
        row.original_currency = Some(row.currency.clone());
        row.original_amount = Some(row.drawn_amount + row.interest + row.nominal_amount);
        if row.currency == table.base() {
            continue;
        }
        match table.rate_to_base(&row.currency) {
            Some(rate) => {
                row.drawn_amount *= rate;
                row.interest *= rate;
                row.nominal_amount *= rate;
                row.undrawn_amount *= rate;
                row.currency = table.base().to_string();
                row.fx_rate_applied = Some(rate);
            }
            None => missing.record(&row.currency),
        }
    }
    missing.into_issues("exposure")
}

fn convert_amounts<T, F>(
    relation: &mut Relation<T>,
    table: &FxTable,
    name: &'static str,
    mut apply: F,
) -> Vec<CrmIssue>
where
    F: FnMut(&mut T) -> (Option<&mut String>, Vec<&mut f64>),
{
    let mut missing = MissingRates::default();
    for row in relation.rows_mut() {
        let (currency, amounts) = apply(row);
        let Some(currency) = currency else { continue };
        if currency.as_str() == table.base() {
            continue;
        }
        match table.rate_to_base(currency) {
            Some(rate) => {
                for amount in amounts {
                    *amount *= rate;
                }
                *currency = table.base().to_string();
            }
            None => missing.record(currency),
        }
    }
    missing.into_issues(name)
}

/// Converts collateral market values.
pub fn convert_collateral(items: &mut Relation<CollateralItem>, table: &FxTable) -> Vec<CrmIssue> {
    convert_amounts(items, table, "collateral", |c| {
        (c.currency.as_mut(), c.market_value.as_mut().into_iter().collect())
    })
}

/// Converts guaranteed amounts.
pub fn convert_guarantees(items: &mut Relation<GuaranteeItem>, table: &FxTable) -> Vec<CrmIssue> {
    convert_amounts(items, table, "guarantee", |g| {
        (g.currency.as_mut(), g.amount_covered.as_mut().into_iter().collect())
    })
}

/// Converts provision amounts.
pub fn convert_provisions(items: &mut Relation<ProvisionItem>, table: &FxTable) -> Vec<CrmIssue> {
    convert_amounts(items, table, "provision", |p| {
        (p.currency.as_mut(), vec![&mut p.amount])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Loan;
    use approx::assert_relative_eq;
    use crm_core::{BeneficiaryLevel, CollateralType};

    fn table() -> FxTable {
        FxTable::new(
            &[FxRate::new("USD", "GBP", 0.79), FxRate::new("EUR", "GBP", 0.86)],
            "GBP",
        )
    }

    #[test]
    fn test_convert_usd_exposure() {
        let mut rows = vec![UnifiedExposure::from(
            &Loan::new("L1", "CP1", "USD", 1_000_000.0).with_interest(5_000.0),
        )];
        let issues = convert_exposures(&mut rows, &table());

        assert!(issues.is_empty());
        assert_relative_eq!(rows[0].drawn_amount, 790_000.0);
        assert_relative_eq!(rows[0].interest, 3_950.0);
        assert_eq!(rows[0].currency, "GBP");
        assert_eq!(rows[0].original_currency.as_deref(), Some("USD"));
        assert_relative_eq!(rows[0].original_amount.unwrap(), 1_005_000.0);
        assert_eq!(rows[0].fx_rate_applied, Some(0.79));
    }

    #[test]
    fn test_base_currency_unchanged() {
        let mut rows = vec![UnifiedExposure::from(&Loan::new("L1", "CP1", "GBP", 100.0))];
        convert_exposures(&mut rows, &table());
        assert_eq!(rows[0].drawn_amount, 100.0);
        assert_eq!(rows[0].fx_rate_applied, None);
        assert_eq!(rows[0].original_currency.as_deref(), Some("GBP"));
    }

    #[test]
    fn test_missing_rate_keeps_original() {
        let mut rows = vec![
            UnifiedExposure::from(&Loan::new("L1", "CP1", "ZAR", 100.0)),
            UnifiedExposure::from(&Loan::new("L2", "CP1", "ZAR", 200.0)),
        ];
        let issues = convert_exposures(&mut rows, &table());
        assert_eq!(rows[0].drawn_amount, 100.0);
        assert_eq!(rows[0].currency, "ZAR");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, "fx_rate_missing");
        assert_eq!(issues[0].context.get("rows").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_convert_crm_items() {
        let mut collateral = Relation::new(vec![CollateralItem::new(
            "C1",
            BeneficiaryLevel::Direct,
            "L1",
            CollateralType::Cash,
            1_000.0,
        )
        .with_currency("EUR")]);
        let mut provisions = Relation::new(vec![ProvisionItem::new(
            "P1",
            BeneficiaryLevel::Direct,
            "L1",
            100.0,
        )
        .with_currency("USD")]);

        convert_collateral(&mut collateral, &table());
        convert_provisions(&mut provisions, &table());

        assert_relative_eq!(collateral.rows()[0].market_value.unwrap(), 860.0);
        assert_eq!(collateral.rows()[0].currency.as_deref(), Some("GBP"));
        assert_relative_eq!(provisions.rows()[0].amount, 79.0);
    }
}
