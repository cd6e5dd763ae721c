use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_products_table::Migration),
            Box::new(m20250301_000002_create_locations_table::Migration),
            Box::new(m20250301_000003_create_inventory_records_table::Migration),
            Box::new(m20250301_000004_create_movements_table::Migration),
            Box::new(m20250301_000005_create_stocktake_sessions_table::Migration),
            Box::new(m20250301_000006_create_stocktake_lines_table::Migration),
        ]
    }
}

// Migration implementations

mod m20250301_000001_create_products_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000001_create_products_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Catalog reference table aligned with entities::product Model
            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Products::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(Products::Sku)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(ColumnDef::new(Products::UnitPrice).decimal().not_null())
                        .col(
                            ColumnDef::new(Products::ReorderPoint)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::ReorderQuantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Products::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Products {
        Table,
        Id,
        Sku,
        Name,
        UnitPrice,
        ReorderPoint,
        ReorderQuantity,
        CreatedAt,
    }
}

mod m20250301_000002_create_locations_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000002_create_locations_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Locations::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Locations::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Locations::Label).string().not_null())
                        .col(ColumnDef::new(Locations::Zone).string().not_null())
                        .col(ColumnDef::new(Locations::Capacity).integer().null())
                        .col(ColumnDef::new(Locations::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Locations::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Locations {
        Table,
        Id,
        Label,
        Zone,
        Capacity,
        CreatedAt,
    }
}

mod m20250301_000003_create_inventory_records_table {

    use super::m20250301_000001_create_products_table::Products;
    use super::m20250301_000002_create_locations_table::Locations;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000003_create_inventory_records_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Materialized projection of the movement log, one row per
            // (product, location) pair that has ever held stock
            manager
                .create_table(
                    Table::create()
                        .table(InventoryRecords::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InventoryRecords::ProductId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryRecords::LocationId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryRecords::Quantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(InventoryRecords::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(InventoryRecords::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .primary_key(
                            Index::create()
                                .col(InventoryRecords::ProductId)
                                .col(InventoryRecords::LocationId),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_inventory_records_product_id")
                                .from(InventoryRecords::Table, InventoryRecords::ProductId)
                                .to(Products::Table, Products::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_inventory_records_location_id")
                                .from(InventoryRecords::Table, InventoryRecords::LocationId)
                                .to(Locations::Table, Locations::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_inventory_records_location_id")
                        .table(InventoryRecords::Table)
                        .col(InventoryRecords::LocationId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(InventoryRecords::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum InventoryRecords {
        Table,
        ProductId,
        LocationId,
        Quantity,
        Version,
        UpdatedAt,
    }
}

mod m20250301_000004_create_movements_table {

    use super::m20250301_000001_create_products_table::Products;
    use super::m20250301_000002_create_locations_table::Locations;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000004_create_movements_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Append-only audit log; no updates or deletes ever run against
            // this table
            manager
                .create_table(
                    Table::create()
                        .table(Movements::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Movements::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Movements::ProductId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Movements::FromLocation).big_integer().null())
                        .col(ColumnDef::new(Movements::ToLocation).big_integer().null())
                        .col(ColumnDef::new(Movements::Quantity).integer().not_null())
                        .col(ColumnDef::new(Movements::Reason).string().not_null())
                        .col(ColumnDef::new(Movements::ActorId).uuid().not_null())
                        .col(ColumnDef::new(Movements::Ts).timestamp().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_movements_product_id")
                                .from(Movements::Table, Movements::ProductId)
                                .to(Products::Table, Products::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_movements_from_location")
                                .from(Movements::Table, Movements::FromLocation)
                                .to(Locations::Table, Locations::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_movements_to_location")
                                .from(Movements::Table, Movements::ToLocation)
                                .to(Locations::Table, Locations::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_movements_product_id")
                        .table(Movements::Table)
                        .col(Movements::ProductId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_movements_ts")
                        .table(Movements::Table)
                        .col(Movements::Ts)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Movements::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Movements {
        Table,
        Id,
        ProductId,
        FromLocation,
        ToLocation,
        Quantity,
        Reason,
        ActorId,
        Ts,
    }
}

mod m20250301_000005_create_stocktake_sessions_table {

    use super::m20250301_000002_create_locations_table::Locations;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000005_create_stocktake_sessions_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StocktakeSessions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StocktakeSessions::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StocktakeSessions::LocationId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StocktakeSessions::Status).string().not_null())
                        .col(
                            ColumnDef::new(StocktakeSessions::StartedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StocktakeSessions::CompletedAt)
                                .timestamp()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stocktake_sessions_location_id")
                                .from(StocktakeSessions::Table, StocktakeSessions::LocationId)
                                .to(Locations::Table, Locations::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stocktake_sessions_location_id")
                        .table(StocktakeSessions::Table)
                        .col(StocktakeSessions::LocationId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StocktakeSessions::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum StocktakeSessions {
        Table,
        Id,
        LocationId,
        Status,
        StartedAt,
        CompletedAt,
    }
}

mod m20250301_000006_create_stocktake_lines_table {

    use super::m20250301_000001_create_products_table::Products;
    use super::m20250301_000005_create_stocktake_sessions_table::StocktakeSessions;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000006_create_stocktake_lines_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StocktakeLines::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(StocktakeLines::SessionId).uuid().not_null())
                        .col(
                            ColumnDef::new(StocktakeLines::ProductId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StocktakeLines::CountedQty)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StocktakeLines::RecordedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .primary_key(
                            Index::create()
                                .col(StocktakeLines::SessionId)
                                .col(StocktakeLines::ProductId),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stocktake_lines_session_id")
                                .from(StocktakeLines::Table, StocktakeLines::SessionId)
                                .to(StocktakeSessions::Table, StocktakeSessions::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stocktake_lines_product_id")
                                .from(StocktakeLines::Table, StocktakeLines::ProductId)
                                .to(Products::Table, Products::Id),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StocktakeLines::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum StocktakeLines {
        Table,
        SessionId,
        ProductId,
        CountedQty,
        RecordedAt,
    }
}
