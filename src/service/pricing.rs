//! Quotation pricing. Pure functions only: every figure on a quotation is
//! derived here from the submitted line items and discount, never accepted
//! from the client.

use crate::model::quotation::{PricedItems, QuotationItem};
use crate::util::error::ServiceError;

/// Rounds to two decimals, halves away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// A line item as submitted, before totals are computed.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemDraft {
    pub sno: Option<u32>,
    pub item: String,
    pub description: Option<String>,
    pub unit: String,
    pub quantity: f64,
    pub unit_price: f64,
}

/// Everything a submitter provides for a quotation.
#[derive(Debug, Clone, PartialEq)]
pub struct QuotationDraft {
    pub scope_of_work: String,
    pub items: Vec<ItemDraft>,
    pub discount_percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PricingError {
    #[error("a quotation needs at least one item")]
    NoItems,
    #[error("item {0}: name and unit are required")]
    MissingText(usize),
    #[error("item {0}: quantity must be a finite number greater than 0")]
    InvalidQuantity(usize),
    #[error("item {0}: unit price must be a finite number of at least 0")]
    InvalidUnitPrice(usize),
    #[error("discount percent must be between 0 and 100")]
    InvalidDiscount,
    #[error("item {0}: line total is out of range")]
    LineTotalOutOfRange(usize),
    #[error("quotation total is out of range")]
    TotalOutOfRange,
}

impl From<PricingError> for ServiceError {
    fn from(err: PricingError) -> Self {
        ServiceError::Validation(err.to_string())
    }
}

/// Validates the drafts and computes line totals, subtotal, discount and
/// grand total. Items keep their order; when any draft lacks a serial number
/// all items are renumbered `1..=n`.
pub fn price_items(drafts: &[ItemDraft], discount_percent: Option<f64>) -> Result<PricedItems, PricingError> {
    if drafts.is_empty() {
        return Err(PricingError::NoItems);
    }
    let discount_percent = discount_percent.unwrap_or(0.0);
    if !discount_percent.is_finite() || !(0.0..=100.0).contains(&discount_percent) {
        return Err(PricingError::InvalidDiscount);
    }

    let renumber = drafts.iter().any(|d| d.sno.is_none());
    let mut items = Vec::with_capacity(drafts.len());
    for (index, draft) in drafts.iter().enumerate() {
        let position = index + 1;
        if draft.item.trim().is_empty() || draft.unit.trim().is_empty() {
            return Err(PricingError::MissingText(position));
        }
        if !draft.quantity.is_finite() || draft.quantity <= 0.0 {
            return Err(PricingError::InvalidQuantity(position));
        }
        if !draft.unit_price.is_finite() || draft.unit_price < 0.0 {
            return Err(PricingError::InvalidUnitPrice(position));
        }
        let total = round2(draft.quantity * draft.unit_price);
        if !total.is_finite() {
            return Err(PricingError::LineTotalOutOfRange(position));
        }
        let sno = match (renumber, draft.sno) {
            (false, Some(sno)) => sno,
            _ => position as u32,
        };
        items.push(QuotationItem {
            sno,
            item: draft.item.trim().to_string(),
            description: draft
                .description
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            unit: draft.unit.trim().to_string(),
            quantity: draft.quantity,
            unit_price: draft.unit_price,
            total,
        });
    }

    let subtotal = round2(items.iter().map(|i| i.total).sum());
    let discount_amount = round2(subtotal * discount_percent / 100.0);
    let grand_total = round2(subtotal - discount_amount);
    if ![subtotal, discount_amount, grand_total].iter().all(|v| v.is_finite()) {
        return Err(PricingError::TotalOutOfRange);
    }

    Ok(PricedItems {
        items,
        subtotal,
        discount_percent,
        discount_amount,
        grand_total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(item: &str, quantity: f64, unit_price: f64) -> ItemDraft {
        ItemDraft {
            sno: None,
            item: item.to_string(),
            description: None,
            unit: "sqft".to_string(),
            quantity,
            unit_price,
        }
    }

    #[test]
    fn paint_example_prices_to_450() {
        let priced = price_items(&[draft("paint", 100.0, 5.0)], Some(10.0)).unwrap();
        assert_eq!(priced.items[0].total, 500.0);
        assert_eq!(priced.subtotal, 500.0);
        assert_eq!(priced.discount_amount, 50.0);
        assert_eq!(priced.grand_total, 450.0);
    }

    #[test]
    fn rounds_each_derived_figure() {
        let priced = price_items(&[draft("tile", 3.0, 3.333), draft("grout", 1.0, 0.016)], Some(12.5)).unwrap();
        assert_eq!(priced.items[0].total, 10.0);
        assert_eq!(priced.items[1].total, 0.02);
        assert_eq!(priced.subtotal, 10.02);
        assert_eq!(priced.discount_amount, 1.25);
        assert_eq!(priced.grand_total, 8.77);
    }

    #[test]
    fn renumbers_when_serials_are_missing() {
        let mut second = draft("b", 1.0, 1.0);
        second.sno = Some(9);
        let priced = price_items(&[draft("a", 1.0, 1.0), second], None).unwrap();
        let serials: Vec<u32> = priced.items.iter().map(|i| i.sno).collect();
        assert_eq!(serials, vec![1, 2]);
        assert_eq!(priced.discount_percent, 0.0);
    }

    #[test]
    fn keeps_supplied_serials() {
        let mut a = draft("a", 1.0, 1.0);
        a.sno = Some(4);
        let mut b = draft("b", 1.0, 1.0);
        b.sno = Some(7);
        let priced = price_items(&[a, b], None).unwrap();
        assert_eq!(priced.items[1].sno, 7);
    }

    #[test]
    fn rejects_invalid_input() {
        assert_eq!(price_items(&[], None), Err(PricingError::NoItems));
        assert_eq!(price_items(&[draft("a", 0.0, 1.0)], None), Err(PricingError::InvalidQuantity(1)));
        assert_eq!(price_items(&[draft("a", f64::NAN, 1.0)], None), Err(PricingError::InvalidQuantity(1)));
        assert_eq!(price_items(&[draft("a", 1.0, -0.5)], None), Err(PricingError::InvalidUnitPrice(1)));
        assert_eq!(price_items(&[draft("a", 1.0, 1.0)], Some(100.5)), Err(PricingError::InvalidDiscount));
        assert_eq!(price_items(&[draft(" ", 1.0, 1.0)], None), Err(PricingError::MissingText(1)));
    }

    #[test]
    fn rejects_totals_that_overflow() {
        assert_eq!(
            price_items(&[draft("a", 1e300, 1e300)], None),
            Err(PricingError::LineTotalOutOfRange(1))
        );
        // Each line fits, their sum does not
        let near_max = f64::MAX / 200.0;
        assert_eq!(
            price_items(&[draft("a", 1.0, near_max), draft("b", 1.0, near_max)], Some(10.0)),
            Err(PricingError::TotalOutOfRange)
        );
    }

    #[test]
    fn full_discount_is_free() {
        let priced = price_items(&[draft("a", 2.0, 7.5)], Some(100.0)).unwrap();
        assert_eq!(priced.grand_total, 0.0);
    }

    #[test]
    fn round2_goes_away_from_zero() {
        assert_eq!(round2(2.675_000_1), 2.68);
        assert_eq!(round2(-1.235_000_1), -1.24);
        assert_eq!(round2(0.125), 0.13);
    }
}
