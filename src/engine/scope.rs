//! Aggregation scopes and their canonical keys.
//!
//! A scope id is the concatenation of its dimension identifiers in the fixed
//! order account, system, token type, token. Addresses are fixed-width, so the
//! concatenation is unambiguous without a separator. The same logical scope
//! always yields the same id.

use crate::domain::{Address, TokenRef, TokenType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    Account,
    AccountSystem,
    AccountTokenType,
    AccountSystemTokenType,
    System,
    SystemTokenType,
    Token,
}

impl ScopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeKind::Account => "account",
            ScopeKind::AccountSystem => "account_system",
            ScopeKind::AccountTokenType => "account_token_type",
            ScopeKind::AccountSystemTokenType => "account_system_token_type",
            ScopeKind::System => "system",
            ScopeKind::SystemTokenType => "system_token_type",
            ScopeKind::Token => "token",
        }
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown scope kind: {0}")]
pub struct UnknownScopeKind(pub String);

impl FromStr for ScopeKind {
    type Err = UnknownScopeKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "account" => Ok(ScopeKind::Account),
            "account_system" => Ok(ScopeKind::AccountSystem),
            "account_token_type" => Ok(ScopeKind::AccountTokenType),
            "account_system_token_type" => Ok(ScopeKind::AccountSystemTokenType),
            "system" => Ok(ScopeKind::System),
            "system_token_type" => Ok(ScopeKind::SystemTokenType),
            "token" => Ok(ScopeKind::Token),
            other => Err(UnknownScopeKind(other.to_string())),
        }
    }
}

/// One aggregation bucket, identified by its dimension keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ScopeKey {
    Account {
        account: Address,
    },
    AccountSystem {
        account: Address,
        system: Address,
    },
    AccountTokenType {
        account: Address,
        token_type: TokenType,
    },
    AccountSystemTokenType {
        account: Address,
        system: Address,
        token_type: TokenType,
    },
    System {
        system: Address,
    },
    SystemTokenType {
        system: Address,
        token_type: TokenType,
    },
    Token {
        token: Address,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeKeyError {
    #[error("no scope dimensions given")]
    Empty,
    #[error("token scopes cannot be combined with other dimensions")]
    TokenCombined,
    #[error("token type needs an account or a system")]
    BareTokenType,
}

impl ScopeKey {
    /// The account-side scopes a leaf balance of `token` held by `account` rolls into.
    pub fn balance_scopes(account: &Address, token: &TokenRef) -> [ScopeKey; 4] {
        [
            ScopeKey::Account {
                account: account.clone(),
            },
            ScopeKey::AccountSystem {
                account: account.clone(),
                system: token.system.clone(),
            },
            ScopeKey::AccountTokenType {
                account: account.clone(),
                token_type: token.token_type.clone(),
            },
            ScopeKey::AccountSystemTokenType {
                account: account.clone(),
                system: token.system.clone(),
                token_type: token.token_type.clone(),
            },
        ]
    }

    /// The supply-side scopes `token` rolls into.
    pub fn supply_scopes(token: &TokenRef) -> [ScopeKey; 3] {
        [
            ScopeKey::System {
                system: token.system.clone(),
            },
            ScopeKey::SystemTokenType {
                system: token.system.clone(),
                token_type: token.token_type.clone(),
            },
            ScopeKey::Token {
                token: token.address.clone(),
            },
        ]
    }

    /// Build a key from whichever dimensions are present.
    pub fn from_parts(
        account: Option<Address>,
        system: Option<Address>,
        token_type: Option<TokenType>,
        token: Option<Address>,
    ) -> Result<ScopeKey, ScopeKeyError> {
        match (account, system, token_type, token) {
            (None, None, None, Some(token)) => Ok(ScopeKey::Token { token }),
            (_, _, _, Some(_)) => Err(ScopeKeyError::TokenCombined),
            (Some(account), None, None, None) => Ok(ScopeKey::Account { account }),
            (Some(account), Some(system), None, None) => {
                Ok(ScopeKey::AccountSystem { account, system })
            }
            (Some(account), None, Some(token_type), None) => Ok(ScopeKey::AccountTokenType {
                account,
                token_type,
            }),
            (Some(account), Some(system), Some(token_type), None) => {
                Ok(ScopeKey::AccountSystemTokenType {
                    account,
                    system,
                    token_type,
                })
            }
            (None, Some(system), None, None) => Ok(ScopeKey::System { system }),
            (None, Some(system), Some(token_type), None) => {
                Ok(ScopeKey::SystemTokenType { system, token_type })
            }
            (None, None, Some(_), None) => Err(ScopeKeyError::BareTokenType),
            (None, None, None, None) => Err(ScopeKeyError::Empty),
        }
    }

    pub fn kind(&self) -> ScopeKind {
        match self {
            ScopeKey::Account { .. } => ScopeKind::Account,
            ScopeKey::AccountSystem { .. } => ScopeKind::AccountSystem,
            ScopeKey::AccountTokenType { .. } => ScopeKind::AccountTokenType,
            ScopeKey::AccountSystemTokenType { .. } => ScopeKind::AccountSystemTokenType,
            ScopeKey::System { .. } => ScopeKind::System,
            ScopeKey::SystemTokenType { .. } => ScopeKind::SystemTokenType,
            ScopeKey::Token { .. } => ScopeKind::Token,
        }
    }

    /// Canonical composite id (see module docs).
    pub fn id(&self) -> String {
        let mut id = String::new();
        for part in [
            self.account().map(Address::as_str),
            self.system().map(Address::as_str),
            self.token_type().map(TokenType::as_str),
            self.token().map(Address::as_str),
        ]
        .into_iter()
        .flatten()
        {
            id.push_str(part);
        }
        id
    }

    pub fn account(&self) -> Option<&Address> {
        match self {
            ScopeKey::Account { account }
            | ScopeKey::AccountSystem { account, .. }
            | ScopeKey::AccountTokenType { account, .. }
            | ScopeKey::AccountSystemTokenType { account, .. } => Some(account),
            _ => None,
        }
    }

    pub fn system(&self) -> Option<&Address> {
        match self {
            ScopeKey::AccountSystem { system, .. }
            | ScopeKey::AccountSystemTokenType { system, .. }
            | ScopeKey::System { system }
            | ScopeKey::SystemTokenType { system, .. } => Some(system),
            _ => None,
        }
    }

    pub fn token_type(&self) -> Option<&TokenType> {
        match self {
            ScopeKey::AccountTokenType { token_type, .. }
            | ScopeKey::AccountSystemTokenType { token_type, .. }
            | ScopeKey::SystemTokenType { token_type, .. } => Some(token_type),
            _ => None,
        }
    }

    pub fn token(&self) -> Option<&Address> {
        match self {
            ScopeKey::Token { token } => Some(token),
            _ => None,
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}
