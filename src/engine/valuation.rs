//! Base-currency value of one token unit.
//!
//! Every value delta in the engine goes through [`ValuationResolver::unit_price`],
//! so bonds are valued the same way on every path.

use super::prices::PriceClaims;
use super::registry::TokenRegistry;
use crate::domain::{BondTerms, Decimal, TokenRef};

pub struct ValuationResolver<'a> {
    registry: &'a TokenRegistry,
    prices: &'a PriceClaims,
}

impl<'a> ValuationResolver<'a> {
    pub fn new(registry: &'a TokenRegistry, prices: &'a PriceClaims) -> Self {
        Self { registry, prices }
    }

    /// Unit price in base currency; zero when unpriced.
    ///
    /// A bond ignores its own price claim: its unit price is its face value
    /// times the price claim of its denomination asset.
    pub fn unit_price(&self, token: &TokenRef) -> Decimal {
        match &token.bond {
            Some(bond) => self.bond_unit_price(bond),
            None => self.prices.price_or_zero(&token.address),
        }
    }

    /// Face value scaled by the denomination asset's decimals.
    ///
    /// `None` while the denomination asset is not registered.
    pub fn face_value(&self, bond: &BondTerms) -> Option<Decimal> {
        self.registry
            .get(&bond.denomination_asset)
            .map(|asset| bond.face_value_exact.to_scaled(asset.token.decimals))
    }

    fn bond_unit_price(&self, bond: &BondTerms) -> Decimal {
        match self.face_value(bond) {
            Some(face_value) => {
                &face_value * &self.prices.price_or_zero(&bond.denomination_asset)
            }
            None => Decimal::zero(),
        }
    }
}
