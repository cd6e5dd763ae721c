use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelBehavior, ActiveValue, Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Closed set of movement reason codes.
///
/// Every movement carries exactly one of these; free-text reasons are
/// rejected at the boundary so history queries and the advisory analytics
/// can group reliably.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum MovementReason {
    Transfer,
    WriteOff,
    FoundStock,
    StocktakeCorrection,
    Receipt,
    Shipment,
}

impl MovementReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementReason::Transfer => "transfer",
            MovementReason::WriteOff => "write-off",
            MovementReason::FoundStock => "found-stock",
            MovementReason::StocktakeCorrection => "stocktake-correction",
            MovementReason::Receipt => "receipt",
            MovementReason::Shipment => "shipment",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "transfer" => Some(MovementReason::Transfer),
            "write-off" => Some(MovementReason::WriteOff),
            "found-stock" => Some(MovementReason::FoundStock),
            "stocktake-correction" => Some(MovementReason::StocktakeCorrection),
            "receipt" => Some(MovementReason::Receipt),
            "shipment" => Some(MovementReason::Shipment),
            _ => None,
        }
    }

    /// Reasons a manual adjustment may carry. Transfer, receipt and shipment
    /// reasons belong to their dedicated operations.
    pub fn is_adjustment(&self) -> bool {
        matches!(
            self,
            MovementReason::WriteOff
                | MovementReason::FoundStock
                | MovementReason::StocktakeCorrection
        )
    }
}

/// Append-only audit fact: one row per quantity change, written in the same
/// transaction as the inventory record it explains. Null `from_location`
/// means an external source (receipt); null `to_location` means an external
/// sink (shipment, write-off). Both null never occurs.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "movements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_id: i64,
    pub from_location: Option<i64>,
    pub to_location: Option<i64>,
    pub quantity: i32,
    pub reason: String,
    pub actor_id: Uuid,
    pub ts: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        if let ActiveValue::NotSet = active_model.ts {
            active_model.ts = Set(Utc::now());
        }
        Ok(active_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_codes_round_trip_through_storage_form() {
        let all = [
            MovementReason::Transfer,
            MovementReason::WriteOff,
            MovementReason::FoundStock,
            MovementReason::StocktakeCorrection,
            MovementReason::Receipt,
            MovementReason::Shipment,
        ];
        for reason in all {
            assert_eq!(MovementReason::from_str(reason.as_str()), Some(reason));
        }
        assert_eq!(MovementReason::from_str("damaged"), None);
        assert_eq!(MovementReason::from_str(""), None);
    }

    #[test]
    fn adjustment_reasons_exclude_operation_owned_codes() {
        assert!(MovementReason::WriteOff.is_adjustment());
        assert!(MovementReason::FoundStock.is_adjustment());
        assert!(MovementReason::StocktakeCorrection.is_adjustment());
        assert!(!MovementReason::Transfer.is_adjustment());
        assert!(!MovementReason::Receipt.is_adjustment());
        assert!(!MovementReason::Shipment.is_adjustment());
    }
}
