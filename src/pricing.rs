//! Line and document arithmetic shared by BOMs, quotations, orders and the
//! pricing panel.
//!
//! For every line `amount = quantity × rate`. Discount applies to the
//! amount, tax applies to what is left after discount. Money is rounded to
//! two places, midpoint away from zero, only when results are reported; the
//! running sums use unrounded line values.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::ServiceError;

const HUNDRED: Decimal = dec!(100);

/// One priced line as entered on a form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LineInput {
    #[schema(value_type = String, example = "2.5")]
    pub quantity: Decimal,
    #[schema(value_type = String, example = "40.00")]
    pub rate: Decimal,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub discount_percent: Option<Decimal>,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub tax_percent: Option<Decimal>,
}

impl LineInput {
    pub fn new(quantity: Decimal, rate: Decimal) -> Self {
        Self {
            quantity,
            rate,
            discount_percent: None,
            tax_percent: None,
        }
    }

    pub fn with_discount(mut self, percent: Decimal) -> Self {
        self.discount_percent = Some(percent);
        self
    }

    pub fn with_tax(mut self, percent: Decimal) -> Self {
        self.tax_percent = Some(percent);
        self
    }
}

/// Computed figures for one line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LineBreakdown {
    #[schema(value_type = String)]
    pub quantity: Decimal,
    #[schema(value_type = String)]
    pub rate: Decimal,
    #[schema(value_type = String)]
    pub amount: Decimal,
    #[schema(value_type = String)]
    pub discount: Decimal,
    #[schema(value_type = String)]
    pub taxable: Decimal,
    #[schema(value_type = String)]
    pub tax: Decimal,
    #[schema(value_type = String)]
    pub line_total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Totals {
    #[schema(value_type = String)]
    pub subtotal: Decimal,
    #[schema(value_type = String)]
    pub discount_total: Decimal,
    #[schema(value_type = String)]
    pub tax_total: Decimal,
    #[schema(value_type = String)]
    pub grand_total: Decimal,
    pub line_count: usize,
}

impl Default for Totals {
    fn default() -> Self {
        Self {
            subtotal: Decimal::ZERO,
            discount_total: Decimal::ZERO,
            tax_total: Decimal::ZERO,
            grand_total: Decimal::ZERO,
            line_count: 0,
        }
    }
}

/// Rounds a money value to two places, midpoint away from zero.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn out_of_range() -> ServiceError {
    ServiceError::ValidationError("amount out of range".to_string())
}

/// Lifts an overflowing checked operation into a validation error.
pub fn in_range(value: Option<Decimal>) -> Result<Decimal, ServiceError> {
    value.ok_or_else(out_of_range)
}

/// `quantity × rate`
pub fn line_amount(quantity: Decimal, rate: Decimal) -> Result<Decimal, ServiceError> {
    in_range(quantity.checked_mul(rate))
}

/// `value × percent / 100`
fn percent_of(value: Decimal, percent: Decimal) -> Result<Decimal, ServiceError> {
    in_range(value.checked_mul(percent).and_then(|v| v.checked_div(HUNDRED)))
}

fn check_percent(field: &str, value: Option<Decimal>) -> Result<Decimal, ServiceError> {
    let value = value.unwrap_or(Decimal::ZERO);
    if value < Decimal::ZERO || value > HUNDRED {
        return Err(ServiceError::ValidationError(format!(
            "{} must be between 0 and 100",
            field
        )));
    }
    Ok(value)
}

/// Checks quantity > 0, rate ≥ 0 and both percents within 0..=100.
pub fn validate_line(line: &LineInput) -> Result<(), ServiceError> {
    if line.quantity <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "quantity must be greater than zero".to_string(),
        ));
    }
    if line.rate < Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "rate must not be negative".to_string(),
        ));
    }
    check_percent("discount_percent", line.discount_percent)?;
    check_percent("tax_percent", line.tax_percent)?;
    Ok(())
}

fn compute_unrounded(line: &LineInput) -> Result<LineBreakdown, ServiceError> {
    validate_line(line)?;
    let amount = line_amount(line.quantity, line.rate)?;
    let discount = percent_of(amount, line.discount_percent.unwrap_or(Decimal::ZERO))?;
    let taxable = amount - discount;
    let tax = percent_of(taxable, line.tax_percent.unwrap_or(Decimal::ZERO))?;
    let line_total = in_range(taxable.checked_add(tax))?;

    Ok(LineBreakdown {
        quantity: line.quantity,
        rate: line.rate,
        amount,
        discount,
        taxable,
        tax,
        line_total,
    })
}

/// Prices one line; money fields are rounded.
pub fn compute_line(line: &LineInput) -> Result<LineBreakdown, ServiceError> {
    let raw = compute_unrounded(line)?;
    Ok(LineBreakdown {
        amount: round_money(raw.amount),
        discount: round_money(raw.discount),
        taxable: round_money(raw.taxable),
        tax: round_money(raw.tax),
        line_total: round_money(raw.line_total),
        ..raw
    })
}

/// Prices every line and sums them. `document_discount_percent` comes off the
/// sum of line totals after line-level discount and tax.
pub fn compute_document(
    lines: &[LineInput],
    document_discount_percent: Option<Decimal>,
) -> Result<(Vec<LineBreakdown>, Totals), ServiceError> {
    let doc_discount = check_percent("discount_percent", document_discount_percent)?;

    let mut breakdowns = Vec::with_capacity(lines.len());
    let mut subtotal = Decimal::ZERO;
    let mut discount_total = Decimal::ZERO;
    let mut tax_total = Decimal::ZERO;
    let mut lines_total = Decimal::ZERO;

    for (index, line) in lines.iter().enumerate() {
        let raw = compute_unrounded(line).map_err(|e| match e {
            ServiceError::ValidationError(msg) => {
                ServiceError::ValidationError(format!("line {}: {}", index + 1, msg))
            }
            other => other,
        })?;
        subtotal = in_range(subtotal.checked_add(raw.amount))?;
        discount_total = in_range(discount_total.checked_add(raw.discount))?;
        tax_total = in_range(tax_total.checked_add(raw.tax))?;
        lines_total = in_range(lines_total.checked_add(raw.line_total))?;
        breakdowns.push(LineBreakdown {
            amount: round_money(raw.amount),
            discount: round_money(raw.discount),
            taxable: round_money(raw.taxable),
            tax: round_money(raw.tax),
            line_total: round_money(raw.line_total),
            ..raw
        });
    }

    let document_discount = percent_of(lines_total, doc_discount)?;
    let totals = Totals {
        subtotal: round_money(subtotal),
        discount_total: round_money(in_range(discount_total.checked_add(document_discount))?),
        tax_total: round_money(tax_total),
        grand_total: round_money(lines_total - document_discount),
        line_count: lines.len(),
    };

    Ok((breakdowns, totals))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;

    #[test]
    fn amount_is_quantity_times_rate() {
        let line = compute_line(&LineInput::new(dec!(2.5), dec!(40))).unwrap();
        assert_eq!(line.amount, dec!(100));
        assert_eq!(line.line_total, dec!(100));
    }

    #[test]
    fn discount_then_tax() {
        // 10 × 20 = 200, 10% off = 180, 5% tax = 9
        let line = compute_line(
            &LineInput::new(dec!(10), dec!(20))
                .with_discount(dec!(10))
                .with_tax(dec!(5)),
        )
        .unwrap();
        assert_eq!(line.amount, dec!(200));
        assert_eq!(line.discount, dec!(20));
        assert_eq!(line.taxable, dec!(180));
        assert_eq!(line.tax, dec!(9));
        assert_eq!(line.line_total, dec!(189));
    }

    #[test]
    fn rounding_is_midpoint_away_from_zero() {
        assert_eq!(round_money(dec!(0.125)), dec!(0.13));
        assert_eq!(round_money(dec!(0.135)), dec!(0.14));
        assert_eq!(round_money(dec!(-0.125)), dec!(-0.13));
    }

    #[test]
    fn document_totals_sum_lines() {
        let lines = vec![
            LineInput::new(dec!(1), dec!(100)).with_tax(dec!(10)),
            LineInput::new(dec!(3), dec!(33.333)),
        ];
        let (breakdown, totals) = compute_document(&lines, None).unwrap();
        assert_eq!(breakdown.len(), 2);
        assert_eq!(breakdown[1].amount, dec!(100.00));
        assert_eq!(totals.subtotal, dec!(200.00));
        assert_eq!(totals.tax_total, dec!(10));
        assert_eq!(totals.grand_total, dec!(210.00));
        assert_eq!(totals.line_count, 2);
    }

    #[test]
    fn document_discount_applies_after_line_totals() {
        let lines = vec![LineInput::new(dec!(2), dec!(50)).with_tax(dec!(20))];
        let (_, totals) = compute_document(&lines, Some(dec!(10))).unwrap();
        // line total 120, 10% document discount = 12
        assert_eq!(totals.discount_total, dec!(12));
        assert_eq!(totals.grand_total, dec!(108));
    }

    #[test]
    fn empty_document_has_zero_totals() {
        let (lines, totals) = compute_document(&[], None).unwrap();
        assert!(lines.is_empty());
        assert_eq!(totals, Totals::default());
    }

    #[rstest]
    #[case(LineInput::new(dec!(0), dec!(1)))]
    #[case(LineInput::new(dec!(-1), dec!(1)))]
    #[case(LineInput::new(dec!(1), dec!(-0.01)))]
    #[case(LineInput::new(dec!(1), dec!(1)).with_discount(dec!(100.5)))]
    #[case(LineInput::new(dec!(1), dec!(1)).with_tax(dec!(-1)))]
    fn invalid_lines_are_rejected(#[case] line: LineInput) {
        assert_matches!(compute_line(&line), Err(ServiceError::ValidationError(_)));
    }

    #[test]
    fn overflowing_amount_is_a_validation_error() {
        let huge = dec!(1000000000000000);
        let err = compute_line(&LineInput::new(huge, huge)).unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(ref msg) if msg.contains("out of range"));

        let max = LineInput::new(dec!(1), Decimal::MAX);
        assert_matches!(
            compute_document(&[max.clone(), max], None),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn invalid_line_error_names_its_position() {
        let lines = vec![
            LineInput::new(dec!(1), dec!(1)),
            LineInput::new(dec!(0), dec!(1)),
        ];
        let err = compute_document(&lines, None).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
