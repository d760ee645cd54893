//! Token, price claim, and leaf balance operations for the repository.

use crate::domain::{Address, BondTerms, Decimal, TokenRef, TokenType};
use crate::engine::{
    LeafBalance, LeafBalanceChange, LeafBalances, PriceClaims, TokenRecord, TokenRegistry,
};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::warn;

use super::{parse_decimal, parse_exact, Repository};

pub(super) async fn upsert_token(
    conn: &mut SqliteConnection,
    record: &TokenRecord,
) -> Result<(), sqlx::Error> {
    let token = &record.token;
    sqlx::query(
        r#"
        INSERT INTO tokens (
            address, system, token_type, decimals, denomination_asset,
            face_value_exact, created, launched
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(address) DO UPDATE SET
            system = excluded.system,
            token_type = excluded.token_type,
            decimals = excluded.decimals,
            denomination_asset = excluded.denomination_asset,
            face_value_exact = excluded.face_value_exact,
            created = excluded.created,
            launched = excluded.launched
        "#,
    )
    .bind(token.address.as_str())
    .bind(token.system.as_str())
    .bind(token.token_type.as_str())
    .bind(token.decimals as i64)
    .bind(token.bond.as_ref().map(|b| b.denomination_asset.as_str()))
    .bind(token.bond.as_ref().map(|b| b.face_value_exact.to_string()))
    .bind(record.created)
    .bind(record.launched)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(super) async fn upsert_price(
    conn: &mut SqliteConnection,
    token: &Address,
    price: &Decimal,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO price_claims (token, price) VALUES (?, ?)
        ON CONFLICT(token) DO UPDATE SET price = excluded.price
        "#,
    )
    .bind(token.as_str())
    .bind(price.to_canonical_string())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Upsert a live leaf, or delete it once it emptied out.
pub(super) async fn write_leaf_balance(
    conn: &mut SqliteConnection,
    change: &LeafBalanceChange,
) -> Result<(), sqlx::Error> {
    match &change.balance {
        Some(balance) => {
            sqlx::query(
                r#"
                INSERT INTO leaf_balances (token, account, value_exact, frozen_exact)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(token, account) DO UPDATE SET
                    value_exact = excluded.value_exact,
                    frozen_exact = excluded.frozen_exact
                "#,
            )
            .bind(change.token.as_str())
            .bind(change.account.as_str())
            .bind(balance.value_exact.to_string())
            .bind(balance.frozen_exact.to_string())
            .execute(&mut *conn)
            .await?;
        }
        None => {
            sqlx::query("DELETE FROM leaf_balances WHERE token = ? AND account = ?")
                .bind(change.token.as_str())
                .bind(change.account.as_str())
                .execute(&mut *conn)
                .await?;
        }
    }
    Ok(())
}

fn parse_address(raw: &str, column: &str) -> Option<Address> {
    Address::from_str(raw)
        .map_err(|e| {
            warn!(column = %column, value = %raw, error = %e, "Skipping row with invalid address");
        })
        .ok()
}

fn token_record_from_row(row: &SqliteRow) -> Option<TokenRecord> {
    let address_str: String = row.get("address");
    let system_str: String = row.get("system");
    let token_type: String = row.get("token_type");
    let decimals: i64 = row.get("decimals");
    let denomination_asset: Option<String> = row.get("denomination_asset");
    let face_value_exact: Option<String> = row.get("face_value_exact");

    let address = parse_address(&address_str, "address")?;
    let system = parse_address(&system_str, "system")?;
    let bond = match (denomination_asset, face_value_exact) {
        (Some(asset), Some(face)) => Some(BondTerms {
            denomination_asset: parse_address(&asset, "denomination_asset")?,
            face_value_exact: parse_exact(&face, "face_value_exact", &address_str),
        }),
        _ => None,
    };

    Some(TokenRecord {
        token: TokenRef {
            address,
            system,
            token_type: TokenType::new(&token_type),
            decimals: u8::try_from(decimals).unwrap_or_else(|_| {
                warn!(token = %address_str, decimals, "Decimals out of range, using 18");
                18
            }),
            bond,
        },
        created: row.get("created"),
        launched: row.get("launched"),
    })
}

impl Repository {
    /// Look up one registered token.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_token(&self, address: &Address) -> Result<Option<TokenRecord>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM tokens WHERE address = ?")
            .bind(address.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().and_then(token_record_from_row))
    }

    pub(super) async fn load_registry(&self) -> Result<TokenRegistry, sqlx::Error> {
        let rows = sqlx::query("SELECT * FROM tokens ORDER BY address")
            .fetch_all(&self.pool)
            .await?;

        let mut registry = TokenRegistry::new();
        for record in rows.iter().filter_map(token_record_from_row) {
            registry.insert_record(record);
        }
        Ok(registry)
    }

    pub(super) async fn load_price_claims(&self) -> Result<PriceClaims, sqlx::Error> {
        let rows = sqlx::query("SELECT token, price FROM price_claims")
            .fetch_all(&self.pool)
            .await?;

        let mut prices = PriceClaims::new();
        for row in rows {
            let token_str: String = row.get("token");
            let price_str: String = row.get("price");
            let Some(token) = parse_address(&token_str, "token") else {
                continue;
            };
            prices.insert(token, parse_decimal(&price_str, "price", &token_str));
        }
        Ok(prices)
    }

    pub(super) async fn load_leaf_balances(&self) -> Result<LeafBalances, sqlx::Error> {
        let rows = sqlx::query("SELECT token, account, value_exact, frozen_exact FROM leaf_balances")
            .fetch_all(&self.pool)
            .await?;

        let mut balances = LeafBalances::new();
        for row in rows {
            let token_str: String = row.get("token");
            let account_str: String = row.get("account");
            let value_str: String = row.get("value_exact");
            let frozen_str: String = row.get("frozen_exact");
            let (Some(token), Some(account)) = (
                parse_address(&token_str, "token"),
                parse_address(&account_str, "account"),
            ) else {
                continue;
            };
            balances.insert(
                account,
                token,
                LeafBalance {
                    value_exact: parse_exact(&value_str, "value_exact", &token_str),
                    frozen_exact: parse_exact(&frozen_str, "frozen_exact", &token_str),
                },
            );
        }
        Ok(balances)
    }
}
