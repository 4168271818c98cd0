//! Embedded schema. Decimal columns use precision 16, the most SQLite accepts.

use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_party_tables::Migration),
            Box::new(m20240301_000002_create_warehouse_tables::Migration),
            Box::new(m20240301_000003_create_manufacturing_tables::Migration),
            Box::new(m20240301_000004_create_trade_tables::Migration),
            Box::new(m20240301_000005_create_helpdesk_tables::Migration),
            Box::new(m20240301_000006_create_hr_project_tables::Migration),
        ]
    }
}

mod m20240301_000001_create_party_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_party_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Customers::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Customers::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Customers::Name).string().not_null())
                        .col(
                            ColumnDef::new(Customers::Email)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Customers::Phone).string().null())
                        .col(ColumnDef::new(Customers::Company).string().null())
                        .col(ColumnDef::new(Customers::Address).string().null())
                        .col(
                            ColumnDef::new(Customers::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Customers::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Operators::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Operators::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Operators::Name).string().not_null())
                        .col(
                            ColumnDef::new(Operators::Email)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Operators::Role).string_len(16).not_null())
                        .col(ColumnDef::new(Operators::PasswordHash).string().not_null())
                        .col(
                            ColumnDef::new(Operators::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Operators::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Operators::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Operators::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Customers::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Customers {
        Table,
        Id,
        Name,
        Email,
        Phone,
        Company,
        Address,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Operators {
        Table,
        Id,
        Name,
        Email,
        Role,
        PasswordHash,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000002_create_warehouse_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_warehouse_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Warehouses::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Warehouses::Id).uuid().not_null().primary_key())
                        .col(
                            ColumnDef::new(Warehouses::Code)
                                .string_len(32)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Warehouses::Name).string().not_null())
                        .col(ColumnDef::new(Warehouses::Address).string().null())
                        .col(
                            ColumnDef::new(Warehouses::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Warehouses::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Warehouses::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(WarehouseBins::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(WarehouseBins::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(WarehouseBins::WarehouseId).uuid().not_null())
                        .col(ColumnDef::new(WarehouseBins::Code).string_len(32).not_null())
                        .col(ColumnDef::new(WarehouseBins::Zone).string().null())
                        .col(ColumnDef::new(WarehouseBins::Capacity).decimal_len(16, 4).null())
                        .col(
                            ColumnDef::new(WarehouseBins::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(WarehouseBins::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WarehouseBins::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_warehouse_bins_warehouse_code")
                        .table(WarehouseBins::Table)
                        .col(WarehouseBins::WarehouseId)
                        .col(WarehouseBins::Code)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(InventoryBatches::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InventoryBatches::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(InventoryBatches::ItemCode).string().not_null())
                        .col(ColumnDef::new(InventoryBatches::ItemName).string().null())
                        .col(
                            ColumnDef::new(InventoryBatches::BatchNumber)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryBatches::WarehouseId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InventoryBatches::BinId).uuid().null())
                        .col(
                            ColumnDef::new(InventoryBatches::Quantity)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(InventoryBatches::UnitCost)
                                .decimal_len(16, 4)
                                .null(),
                        )
                        .col(ColumnDef::new(InventoryBatches::ExpiryDate).date().null())
                        .col(
                            ColumnDef::new(InventoryBatches::ReceivedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryBatches::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_inventory_batches_item_warehouse")
                        .table(InventoryBatches::Table)
                        .col(InventoryBatches::ItemCode)
                        .col(InventoryBatches::WarehouseId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(InventoryBatches::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(WarehouseBins::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Warehouses::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Warehouses {
        Table,
        Id,
        Code,
        Name,
        Address,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum WarehouseBins {
        Table,
        Id,
        WarehouseId,
        Code,
        Zone,
        Capacity,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum InventoryBatches {
        Table,
        Id,
        ItemCode,
        ItemName,
        BatchNumber,
        WarehouseId,
        BinId,
        Quantity,
        UnitCost,
        ExpiryDate,
        ReceivedAt,
        UpdatedAt,
    }
}

mod m20240301_000003_create_manufacturing_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_manufacturing_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Boms::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Boms::Id).uuid().not_null().primary_key())
                        .col(
                            ColumnDef::new(Boms::BomNumber)
                                .string_len(64)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Boms::ProductCode).string().not_null())
                        .col(ColumnDef::new(Boms::ProductName).string().not_null())
                        .col(ColumnDef::new(Boms::Quantity).decimal_len(16, 4).not_null())
                        .col(ColumnDef::new(Boms::Status).string_len(16).not_null())
                        .col(ColumnDef::new(Boms::Notes).text().null())
                        .col(
                            ColumnDef::new(Boms::TotalCost)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Boms::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Boms::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(BomLines::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(BomLines::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(BomLines::BomId).uuid().not_null())
                        .col(ColumnDef::new(BomLines::LineNo).integer().not_null())
                        .col(ColumnDef::new(BomLines::ItemCode).string().not_null())
                        .col(ColumnDef::new(BomLines::ItemName).string().null())
                        .col(ColumnDef::new(BomLines::LineType).string_len(16).not_null())
                        .col(ColumnDef::new(BomLines::Quantity).decimal_len(16, 4).not_null())
                        .col(ColumnDef::new(BomLines::Rate).decimal_len(16, 4).not_null())
                        .col(ColumnDef::new(BomLines::Amount).decimal_len(16, 4).not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_bom_lines_bom_id")
                        .table(BomLines::Table)
                        .col(BomLines::BomId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ProductionOrders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductionOrders::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(ProductionOrders::OrderNumber)
                                .string_len(64)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(ProductionOrders::BomId).uuid().null())
                        .col(
                            ColumnDef::new(ProductionOrders::ProductCode)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductionOrders::PlannedQuantity)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductionOrders::SourceWarehouseId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductionOrders::TargetWarehouseId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductionOrders::Status)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductionOrders::DueDate).date().null())
                        .col(
                            ColumnDef::new(ProductionOrders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductionOrders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ProductionOrderItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductionOrderItems::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(ProductionOrderItems::ProductionOrderId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductionOrderItems::ItemCode)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductionOrderItems::ItemName).string().null())
                        .col(
                            ColumnDef::new(ProductionOrderItems::RequiredQuantity)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductionOrderItems::TransferredQuantity)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(StockTransfers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockTransfers::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(StockTransfers::TransferNumber)
                                .string_len(64)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(StockTransfers::ProductionOrderId).uuid().null())
                        .col(
                            ColumnDef::new(StockTransfers::FromWarehouseId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransfers::ToWarehouseId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransfers::Status)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockTransfers::Remarks).text().null())
                        .col(
                            ColumnDef::new(StockTransfers::PostedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransfers::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(StockTransferLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockTransferLines::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(StockTransferLines::StockTransferId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransferLines::ProductionOrderItemId)
                                .uuid()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(StockTransferLines::ItemCode)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransferLines::BatchNumber)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockTransferLines::FromBinId).uuid().null())
                        .col(ColumnDef::new(StockTransferLines::ToBinId).uuid().null())
                        .col(
                            ColumnDef::new(StockTransferLines::Quantity)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockTransferLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(StockTransfers::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ProductionOrderItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ProductionOrders::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(BomLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Boms::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Boms {
        Table,
        Id,
        BomNumber,
        ProductCode,
        ProductName,
        Quantity,
        Status,
        Notes,
        TotalCost,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum BomLines {
        Table,
        Id,
        BomId,
        LineNo,
        ItemCode,
        ItemName,
        LineType,
        Quantity,
        Rate,
        Amount,
    }

    #[derive(DeriveIden)]
    enum ProductionOrders {
        Table,
        Id,
        OrderNumber,
        BomId,
        ProductCode,
        PlannedQuantity,
        SourceWarehouseId,
        TargetWarehouseId,
        Status,
        DueDate,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum ProductionOrderItems {
        Table,
        Id,
        ProductionOrderId,
        ItemCode,
        ItemName,
        RequiredQuantity,
        TransferredQuantity,
    }

    #[derive(DeriveIden)]
    enum StockTransfers {
        Table,
        Id,
        TransferNumber,
        ProductionOrderId,
        FromWarehouseId,
        ToWarehouseId,
        Status,
        Remarks,
        PostedAt,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum StockTransferLines {
        Table,
        Id,
        StockTransferId,
        ProductionOrderItemId,
        ItemCode,
        BatchNumber,
        FromBinId,
        ToBinId,
        Quantity,
    }
}

mod m20240301_000004_create_trade_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_trade_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(TradeDocuments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(TradeDocuments::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(TradeDocuments::Kind).string_len(24).not_null())
                        .col(
                            ColumnDef::new(TradeDocuments::DocumentNumber)
                                .string_len(64)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(TradeDocuments::PartyName).string().not_null())
                        .col(ColumnDef::new(TradeDocuments::CustomerId).uuid().null())
                        .col(ColumnDef::new(TradeDocuments::DocumentDate).date().not_null())
                        .col(ColumnDef::new(TradeDocuments::ValidUntil).date().null())
                        .col(
                            ColumnDef::new(TradeDocuments::Status)
                                .string_len(24)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TradeDocuments::Currency)
                                .string_len(3)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TradeDocuments::DiscountPercent)
                                .decimal_len(9, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(TradeDocuments::Subtotal)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TradeDocuments::DiscountTotal)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TradeDocuments::TaxTotal)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TradeDocuments::GrandTotal)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(TradeDocuments::SourceDocumentId).uuid().null())
                        .col(ColumnDef::new(TradeDocuments::Notes).text().null())
                        .col(
                            ColumnDef::new(TradeDocuments::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TradeDocuments::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_trade_documents_kind_status")
                        .table(TradeDocuments::Table)
                        .col(TradeDocuments::Kind)
                        .col(TradeDocuments::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(TradeDocumentLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(TradeDocumentLines::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(TradeDocumentLines::DocumentId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(TradeDocumentLines::LineNo).integer().not_null())
                        .col(
                            ColumnDef::new(TradeDocumentLines::ItemCode)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(TradeDocumentLines::Description).text().null())
                        .col(
                            ColumnDef::new(TradeDocumentLines::Quantity)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TradeDocumentLines::Rate)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TradeDocumentLines::DiscountPercent)
                                .decimal_len(9, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(TradeDocumentLines::TaxPercent)
                                .decimal_len(9, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(TradeDocumentLines::Amount)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TradeDocumentLines::LineTotal)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TradeDocumentLines::ReceivedQuantity)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(GoodsReceipts::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(GoodsReceipts::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(GoodsReceipts::GrnNumber)
                                .string_len(64)
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(GoodsReceipts::PurchaseOrderId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(GoodsReceipts::WarehouseId).uuid().not_null())
                        .col(ColumnDef::new(GoodsReceipts::ReceivedDate).date().not_null())
                        .col(ColumnDef::new(GoodsReceipts::ReceivedBy).string().null())
                        .col(ColumnDef::new(GoodsReceipts::Remarks).text().null())
                        .col(
                            ColumnDef::new(GoodsReceipts::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(GoodsReceiptLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(GoodsReceiptLines::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(GoodsReceiptLines::GrnId).uuid().not_null())
                        .col(
                            ColumnDef::new(GoodsReceiptLines::OrderLineId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(GoodsReceiptLines::ItemCode).string().not_null())
                        .col(
                            ColumnDef::new(GoodsReceiptLines::ReceivedQuantity)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(GoodsReceiptLines::AcceptedQuantity)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(GoodsReceiptLines::RejectedQuantity)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(GoodsReceiptLines::BatchNumber)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(GoodsReceiptLines::BinId).uuid().null())
                        .col(ColumnDef::new(GoodsReceiptLines::ExpiryDate).date().null())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(GoodsReceiptLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(GoodsReceipts::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(TradeDocumentLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(TradeDocuments::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum TradeDocuments {
        Table,
        Id,
        Kind,
        DocumentNumber,
        PartyName,
        CustomerId,
        DocumentDate,
        ValidUntil,
        Status,
        Currency,
        DiscountPercent,
        Subtotal,
        DiscountTotal,
        TaxTotal,
        GrandTotal,
        SourceDocumentId,
        Notes,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum TradeDocumentLines {
        Table,
        Id,
        DocumentId,
        LineNo,
        ItemCode,
        Description,
        Quantity,
        Rate,
        DiscountPercent,
        TaxPercent,
        Amount,
        LineTotal,
        ReceivedQuantity,
    }

    #[derive(DeriveIden)]
    enum GoodsReceipts {
        Table,
        Id,
        GrnNumber,
        PurchaseOrderId,
        WarehouseId,
        ReceivedDate,
        ReceivedBy,
        Remarks,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum GoodsReceiptLines {
        Table,
        Id,
        GrnId,
        OrderLineId,
        ItemCode,
        ReceivedQuantity,
        AcceptedQuantity,
        RejectedQuantity,
        BatchNumber,
        BinId,
        ExpiryDate,
    }
}

mod m20240301_000005_create_helpdesk_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000005_create_helpdesk_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Tickets::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Tickets::Id).uuid().not_null().primary_key())
                        .col(
                            ColumnDef::new(Tickets::TicketNumber)
                                .string_len(16)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Tickets::Subject).string().not_null())
                        .col(ColumnDef::new(Tickets::CustomerEmail).string().not_null())
                        .col(ColumnDef::new(Tickets::CustomerName).string().null())
                        .col(ColumnDef::new(Tickets::CustomerId).uuid().null())
                        .col(ColumnDef::new(Tickets::Status).string_len(16).not_null())
                        .col(ColumnDef::new(Tickets::Priority).string_len(16).not_null())
                        .col(ColumnDef::new(Tickets::Category).string().null())
                        .col(ColumnDef::new(Tickets::AssignedTo).uuid().null())
                        .col(ColumnDef::new(Tickets::Source).string_len(16).not_null())
                        .col(
                            ColumnDef::new(Tickets::LastMessageAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Tickets::ReopenedCount)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Tickets::ResolvedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Tickets::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Tickets::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_tickets_status_assigned")
                        .table(Tickets::Table)
                        .col(Tickets::Status)
                        .col(Tickets::AssignedTo)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(TicketMessages::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(TicketMessages::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(TicketMessages::TicketId).uuid().not_null())
                        .col(
                            ColumnDef::new(TicketMessages::Direction)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TicketMessages::AuthorEmail)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(TicketMessages::AuthorName).string().null())
                        .col(ColumnDef::new(TicketMessages::Subject).string().null())
                        .col(ColumnDef::new(TicketMessages::Body).text().not_null())
                        .col(
                            ColumnDef::new(TicketMessages::MessageId)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(TicketMessages::InReplyTo).string().null())
                        .col(
                            ColumnDef::new(TicketMessages::ReferenceIds)
                                .text()
                                .not_null()
                                .default(""),
                        )
                        .col(
                            ColumnDef::new(TicketMessages::DeliveryStatus)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(ColumnDef::new(TicketMessages::DeliveryError).text().null())
                        .col(
                            ColumnDef::new(TicketMessages::IsInternal)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(TicketMessages::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_ticket_messages_ticket_id")
                        .table(TicketMessages::Table)
                        .col(TicketMessages::TicketId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(TicketMessages::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Tickets::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Tickets {
        Table,
        Id,
        TicketNumber,
        Subject,
        CustomerEmail,
        CustomerName,
        CustomerId,
        Status,
        Priority,
        Category,
        AssignedTo,
        Source,
        LastMessageAt,
        ReopenedCount,
        ResolvedAt,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum TicketMessages {
        Table,
        Id,
        TicketId,
        Direction,
        AuthorEmail,
        AuthorName,
        Subject,
        Body,
        MessageId,
        InReplyTo,
        ReferenceIds,
        DeliveryStatus,
        DeliveryError,
        IsInternal,
        CreatedAt,
    }
}

mod m20240301_000006_create_hr_project_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000006_create_hr_project_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ProjectTasks::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProjectTasks::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(ProjectTasks::Title).string().not_null())
                        .col(ColumnDef::new(ProjectTasks::Description).text().null())
                        .col(ColumnDef::new(ProjectTasks::Project).string().null())
                        .col(ColumnDef::new(ProjectTasks::AssignedTo).uuid().null())
                        .col(
                            ColumnDef::new(ProjectTasks::Priority)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProjectTasks::Status).string_len(16).not_null())
                        .col(ColumnDef::new(ProjectTasks::DueDate).date().null())
                        .col(
                            ColumnDef::new(ProjectTasks::CompletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ProjectTasks::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProjectTasks::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(AttendanceRecords::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(AttendanceRecords::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(AttendanceRecords::OperatorId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(AttendanceRecords::WorkDate).date().not_null())
                        .col(
                            ColumnDef::new(AttendanceRecords::CheckIn)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(AttendanceRecords::CheckOut)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(AttendanceRecords::WorkedMinutes)
                                .big_integer()
                                .null(),
                        )
                        .col(ColumnDef::new(AttendanceRecords::Notes).text().null())
                        .col(
                            ColumnDef::new(AttendanceRecords::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_attendance_operator_date")
                        .table(AttendanceRecords::Table)
                        .col(AttendanceRecords::OperatorId)
                        .col(AttendanceRecords::WorkDate)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(AttendanceRecords::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ProjectTasks::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ProjectTasks {
        Table,
        Id,
        Title,
        Description,
        Project,
        AssignedTo,
        Priority,
        Status,
        DueDate,
        CompletedAt,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum AttendanceRecords {
        Table,
        Id,
        OperatorId,
        WorkDate,
        CheckIn,
        CheckOut,
        WorkedMinutes,
        Notes,
        CreatedAt,
    }
}
