//! VAT and total computation for quotes.
//!
//! Totals are computed on unrounded decimal sums and rounded once, to the
//! cent, when they are rendered. Rounding each line first can drift by a
//! cent on inputs such as two 0.05 lines at 5.5 %.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::models::LineItem;

/// Derived totals of a quote. Serialized as two-decimal strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteTotals {
    #[serde(with = "money")]
    pub total_excl_vat: Decimal,
    #[serde(with = "money")]
    pub vat_amount: Decimal,
    #[serde(with = "money")]
    pub total_incl_vat: Decimal,
}

impl QuoteTotals {
    pub fn compute(line_items: &[LineItem], vat_rate: Decimal) -> Self {
        let total_excl_vat: Decimal = line_items.iter().map(|item| item.amount_excl_vat).sum();
        let vat_amount = total_excl_vat * vat_rate / Decimal::ONE_HUNDRED;

        Self {
            total_excl_vat,
            vat_amount,
            total_incl_vat: total_excl_vat + vat_amount,
        }
    }
}

impl Default for QuoteTotals {
    fn default() -> Self {
        Self {
            total_excl_vat: Decimal::ZERO,
            vat_amount: Decimal::ZERO,
            total_incl_vat: Decimal::ZERO,
        }
    }
}

/// Round to the cent, half away from zero, and always show two decimals.
pub fn format_money(value: Decimal) -> String {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded.to_string()
}

mod money {
    use rust_decimal::Decimal;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_money(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
        <Decimal as Deserialize>::deserialize(deserializer)
    }
}
