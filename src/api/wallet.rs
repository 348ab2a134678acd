use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::api::AppState;
use crate::domain::{BonusInfo, Decimal, PaymentMethod, Purchase, UserId, Wallet};
use crate::error::{AppError, WalletError};

/// Body of `POST /api/wallet/purchase`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRequest {
    pub user_id: UserId,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
}

/// Body of `POST /api/wallet/debit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebitRequest {
    pub user_id: UserId,
    pub amount: Decimal,
}

// Amount stays untyped until validated so a non-numeric value reports as an
// invalid amount rather than a generic parse failure.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPurchaseRequest {
    pub user_id: UserId,
    pub amount: serde_json::Value,
    pub payment_method: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDebitRequest {
    pub user_id: UserId,
    pub amount: serde_json::Value,
}

fn parse_user_id(raw: &str) -> Result<UserId, AppError> {
    UserId::from_str(raw).map_err(|_| AppError::BadRequest(format!("Invalid user id: {}", raw)))
}

fn parse_amount(value: &serde_json::Value) -> Result<Decimal, WalletError> {
    let parsed = match value {
        serde_json::Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        serde_json::Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    };
    parsed.ok_or_else(|| WalletError::InvalidAmount(format!("not a number: {}", value)))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

pub async fn get_wallet(
    Path(user_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Wallet>, AppError> {
    let user_id = parse_user_id(&user_id)?;
    Ok(Json(state.wallet.fetch_wallet(user_id).await?))
}

pub async fn get_history(
    Path(user_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<Purchase>>, AppError> {
    let user_id = parse_user_id(&user_id)?;
    Ok(Json(state.wallet.get_history(user_id).await?))
}

/// Idempotent: an existing wallet is returned unchanged.
pub async fn post_initialize(
    Path(user_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Wallet>, AppError> {
    let user_id = parse_user_id(&user_id)?;
    Ok(Json(state.wallet.initialize(user_id).await?))
}

pub async fn get_bonus_info(State(state): State<AppState>) -> Result<Json<BonusInfo>, AppError> {
    Ok(Json(state.wallet.get_bonus_info().await?))
}

pub async fn post_purchase(
    State(state): State<AppState>,
    payload: Result<Json<RawPurchaseRequest>, JsonRejection>,
) -> Result<Json<Purchase>, AppError> {
    let raw = body(payload)?;
    let payment_method = PaymentMethod::from_str(&raw.payment_method)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let amount = parse_amount(&raw.amount)?;

    let purchase = state
        .wallet
        .purchase(raw.user_id, amount, payment_method)
        .await?;
    Ok(Json(purchase))
}

pub async fn post_debit(
    State(state): State<AppState>,
    payload: Result<Json<RawDebitRequest>, JsonRejection>,
) -> Result<Json<Wallet>, AppError> {
    let raw = body(payload)?;
    let amount = parse_amount(&raw.amount)?;
    Ok(Json(state.wallet.debit(raw.user_id, amount).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_amount_accepts_numbers_and_numeric_strings() {
        assert_eq!(parse_amount(&json!(10)).unwrap(), Decimal::from(10));
        assert_eq!(
            parse_amount(&json!(130.01)).unwrap(),
            Decimal::from_str("130.01").unwrap()
        );
        assert_eq!(parse_amount(&json!(" 2.5 ")).unwrap(), Decimal::from_str("2.5").unwrap());
    }

    #[test]
    fn test_parse_amount_rejects_non_numeric() {
        for value in [json!("ten"), json!(null), json!(true), json!([1])] {
            assert!(matches!(
                parse_amount(&value),
                Err(WalletError::InvalidAmount(_))
            ));
        }
    }

    #[test]
    fn test_purchase_request_wire_shape() {
        let request = PurchaseRequest {
            user_id: UserId::new(1),
            amount: Decimal::from(10),
            payment_method: PaymentMethod::ApplePay,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["userId"], 1);
        assert_eq!(json["paymentMethod"], "apple_pay");
        assert!(json["amount"].is_number());
    }

    #[test]
    fn test_parse_user_id() {
        assert_eq!(parse_user_id("12").unwrap(), UserId::new(12));
        assert!(parse_user_id("twelve").is_err());
    }
}
