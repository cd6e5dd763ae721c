use crate::{
    entities::{
        inventory_record::{self, Entity as InventoryRecord},
        movement::{self, Entity as Movement},
        product::Entity as Product,
    },
    errors::ServiceError,
    queries::Query,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;

/// Products running low on stock, summed across all locations.
///
/// With no explicit threshold each product is measured against its own
/// reorder point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetLowStockQuery {
    pub threshold: Option<i32>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LowStockRow {
    pub product_id: i64,
    pub sku: String,
    pub name: String,
    pub on_hand: i64,
    pub reorder_point: i32,
}

#[async_trait]
impl Query for GetLowStockQuery {
    type Result = Vec<LowStockRow>;

    async fn execute(&self, db: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        let on_hand = on_hand_by_product(db).await?;
        let products = Product::find()
            .order_by_asc(crate::entities::product::Column::Id)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let mut rows: Vec<LowStockRow> = products
            .into_iter()
            .filter_map(|p| {
                let held = on_hand.get(&p.id).copied().unwrap_or(0);
                let limit = i64::from(self.threshold.unwrap_or(p.reorder_point));
                if held < limit {
                    Some(LowStockRow {
                        product_id: p.id,
                        sku: p.sku,
                        name: p.name,
                        on_hand: held,
                        reorder_point: p.reorder_point,
                    })
                } else {
                    None
                }
            })
            .collect();

        rows.sort_by(|a, b| {
            a.on_hand
                .cmp(&b.on_hand)
                .then(a.product_id.cmp(&b.product_id))
        });
        Ok(rows)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum AbcClass {
    A,
    B,
    C,
}

/// Ranks products by consumption value over a trailing window.
///
/// Consumption is every movement out of internal stock (shipments,
/// write-offs, negative corrections) priced at the product's unit
/// price. Classes are cut on cumulative value share: a product is A
/// while the share accumulated before it is under the A cut, B under
/// the A+B cut, C past that. Ties rank by product id ascending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetAbcClassificationQuery {
    pub window_days: i64,
    pub class_a_share: f64,
    pub class_b_share: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AbcRow {
    pub product_id: i64,
    pub sku: String,
    pub name: String,
    pub consumed_qty: i64,
    #[schema(value_type = String)]
    pub consumption_value: Decimal,
    pub cumulative_share: f64,
    pub class: AbcClass,
}

#[async_trait]
impl Query for GetAbcClassificationQuery {
    type Result = Vec<AbcRow>;

    async fn execute(&self, db: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        let cutoff = Utc::now() - Duration::days(self.window_days);

        let consumed: Vec<(i64, Option<i64>)> = Movement::find()
            .select_only()
            .column(movement::Column::ProductId)
            .column_as(
                Expr::col((movement::Entity, movement::Column::Quantity)).sum(),
                "consumed",
            )
            .filter(movement::Column::Ts.gte(cutoff))
            .filter(movement::Column::FromLocation.is_not_null())
            .filter(movement::Column::ToLocation.is_null())
            .group_by(movement::Column::ProductId)
            .into_tuple()
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;
        let consumed: HashMap<i64, i64> = consumed
            .into_iter()
            .map(|(id, qty)| (id, qty.unwrap_or(0)))
            .collect();

        let products = Product::find().all(db).await.map_err(ServiceError::db_error)?;

        let mut ranked: Vec<(i64, String, String, i64, Decimal)> = products
            .into_iter()
            .map(|p| {
                let qty = consumed.get(&p.id).copied().unwrap_or(0);
                let value = p.unit_price * Decimal::from(qty);
                (p.id, p.sku, p.name, qty, value)
            })
            .collect();
        ranked.sort_by(|a, b| b.4.cmp(&a.4).then(a.0.cmp(&b.0)));

        let values: Vec<Decimal> = ranked.iter().map(|r| r.4).collect();
        let classes = assign_classes(&values, self.class_a_share, self.class_b_share);

        Ok(ranked
            .into_iter()
            .zip(classes)
            .map(
                |((product_id, sku, name, consumed_qty, consumption_value), (share, class))| {
                    AbcRow {
                        product_id,
                        sku,
                        name,
                        consumed_qty,
                        consumption_value,
                        cumulative_share: share,
                        class,
                    }
                },
            )
            .collect())
    }
}

/// Assigns a class to each value of a descending-sorted series.
///
/// Returns the cumulative share through each row alongside its class.
/// A zero-value series classifies everything C.
fn assign_classes(values: &[Decimal], class_a_share: f64, class_b_share: f64) -> Vec<(f64, AbcClass)> {
    let total: Decimal = values.iter().copied().sum();
    if total.is_zero() {
        return values.iter().map(|_| (0.0, AbcClass::C)).collect();
    }

    let mut running = Decimal::ZERO;
    values
        .iter()
        .map(|value| {
            let before = (running / total).to_f64().unwrap_or(1.0);
            let class = if before < class_a_share {
                AbcClass::A
            } else if before < class_a_share + class_b_share {
                AbcClass::B
            } else {
                AbcClass::C
            };
            running += *value;
            let through = (running / total).to_f64().unwrap_or(1.0);
            (through, class)
        })
        .collect()
}

/// Reorder proposals for products under their reorder point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetReorderSuggestionsQuery {}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReorderSuggestion {
    pub product_id: i64,
    pub sku: String,
    pub name: String,
    pub on_hand: i64,
    pub reorder_point: i32,
    pub suggested_quantity: i32,
}

#[async_trait]
impl Query for GetReorderSuggestionsQuery {
    type Result = Vec<ReorderSuggestion>;

    async fn execute(&self, db: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        let on_hand = on_hand_by_product(db).await?;
        let products = Product::find()
            .order_by_asc(crate::entities::product::Column::Id)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(products
            .into_iter()
            .filter_map(|p| {
                let held = on_hand.get(&p.id).copied().unwrap_or(0);
                if held >= i64::from(p.reorder_point) {
                    return None;
                }
                let shortfall = (i64::from(p.reorder_point) - held) as i32;
                Some(ReorderSuggestion {
                    product_id: p.id,
                    sku: p.sku,
                    name: p.name,
                    on_hand: held,
                    reorder_point: p.reorder_point,
                    suggested_quantity: p.reorder_quantity.max(shortfall),
                })
            })
            .collect())
    }
}

/// On-hand totals per product across every location.
async fn on_hand_by_product(db: &DatabaseConnection) -> Result<HashMap<i64, i64>, ServiceError> {
    let rows: Vec<(i64, Option<i64>)> = InventoryRecord::find()
        .select_only()
        .column(inventory_record::Column::ProductId)
        .column_as(
            Expr::col((inventory_record::Entity, inventory_record::Column::Quantity)).sum(),
            "on_hand",
        )
        .group_by(inventory_record::Column::ProductId)
        .into_tuple()
        .all(db)
        .await
        .map_err(ServiceError::db_error)?;

    Ok(rows
        .into_iter()
        .map(|(id, sum)| (id, sum.unwrap_or(0)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn classes_cut_on_cumulative_share() {
        // 80/15/5 over values 50/30/15/4/1.
        let values = vec![dec!(50), dec!(30), dec!(15), dec!(4), dec!(1)];
        let classes: Vec<AbcClass> = assign_classes(&values, 0.80, 0.15)
            .into_iter()
            .map(|(_, c)| c)
            .collect();
        assert_eq!(
            classes,
            vec![
                AbcClass::A,
                AbcClass::A,
                AbcClass::B,
                AbcClass::C,
                AbcClass::C
            ]
        );
    }

    #[test]
    fn top_consumer_is_always_class_a() {
        let values = vec![dec!(99), dec!(1)];
        let classes = assign_classes(&values, 0.80, 0.15);
        assert_eq!(classes[0].1, AbcClass::A);
        assert_eq!(classes[1].1, AbcClass::C);
    }

    #[test]
    fn zero_consumption_classifies_everything_c() {
        let values = vec![Decimal::ZERO, Decimal::ZERO];
        let classes = assign_classes(&values, 0.80, 0.15);
        assert!(classes.iter().all(|(_, c)| *c == AbcClass::C));
    }

    #[test]
    fn cumulative_share_reaches_one() {
        let values = vec![dec!(60), dec!(40)];
        let classes = assign_classes(&values, 0.80, 0.15);
        assert!((classes[1].0 - 1.0).abs() < 1e-9);
    }

    fn class_rank(class: AbcClass) -> u8 {
        match class {
            AbcClass::A => 0,
            AbcClass::B => 1,
            AbcClass::C => 2,
        }
    }

    fn descending_values() -> impl Strategy<Value = Vec<Decimal>> {
        proptest::collection::vec(0u32..10_000, 0..20).prop_map(|raw| {
            let mut values: Vec<Decimal> = raw.into_iter().map(Decimal::from).collect();
            values.sort_by(|a, b| b.cmp(a));
            values
        })
    }

    proptest! {
        #[test]
        fn shares_climb_and_classes_never_regress(values in descending_values()) {
            let classed = assign_classes(&values, 0.80, 0.15);
            prop_assert_eq!(classed.len(), values.len());

            let total: Decimal = values.iter().copied().sum();
            let mut previous_share = 0.0;
            let mut previous_rank = 0u8;
            for (share, class) in &classed {
                prop_assert!(*share >= previous_share - 1e-9);
                prop_assert!(*share <= 1.0 + 1e-9);
                prop_assert!(class_rank(*class) >= previous_rank);
                previous_share = *share;
                previous_rank = class_rank(*class);
            }

            if total.is_zero() {
                prop_assert!(classed.iter().all(|(s, c)| *s == 0.0 && *c == AbcClass::C));
            } else {
                prop_assert!((previous_share - 1.0).abs() < 1e-9);
                prop_assert_eq!(classed[0].1, AbcClass::A);
            }
        }
    }
}
