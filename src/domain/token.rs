//! Token reference data as delivered by the decoding layer.

use super::{Address, ExactAmount, TokenType};
use serde::{Deserialize, Serialize};

/// Bond-specific terms. A bond's value derives from its denomination asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BondTerms {
    /// Token in which face value and redemption are expressed.
    pub denomination_asset: Address,
    /// Face value of one bond unit, in the denomination asset's smallest unit.
    pub face_value_exact: ExactAmount,
}

/// Reference to a token and the dimensions it aggregates into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRef {
    pub address: Address,
    /// System (token factory registry) the token belongs to.
    pub system: Address,
    pub token_type: TokenType,
    pub decimals: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bond: Option<BondTerms>,
}

impl TokenRef {
    pub fn new(address: Address, system: Address, token_type: TokenType, decimals: u8) -> Self {
        Self {
            address,
            system,
            token_type,
            decimals,
            bond: None,
        }
    }

    pub fn with_bond(mut self, denomination_asset: Address, face_value_exact: ExactAmount) -> Self {
        self.bond = Some(BondTerms {
            denomination_asset,
            face_value_exact,
        });
        self
    }

    pub fn is_bond(&self) -> bool {
        self.bond.is_some()
    }
}
