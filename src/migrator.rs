use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_bakery_tables::Migration),
            Box::new(m20240101_000002_add_payment_fields::Migration),
        ]
    }
}

#[derive(DeriveIden)]
enum Varieties {
    Table,
    Id,
    Name,
    DefaultPrice,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Shops {
    Table,
    Id,
    Name,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Orders {
    Table,
    Id,
    VarietyId,
    ShopId,
    Quantity,
    Price,
    DeliveryDate,
    PaymentStatus,
    PaidAmount,
    CreatedAt,
}

mod m20240101_000001_create_bakery_tables {
    use super::{Orders, Shops, Varieties};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_bakery_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Varieties::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Varieties::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(Varieties::Name)
                                .string_len(100)
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Varieties::DefaultPrice)
                                .decimal_len(10, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Varieties::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Shops::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Shops::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(Shops::Name)
                                .string_len(200)
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Shops::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // Payment columns arrive in the next migration so that databases
            // created before they existed follow the same upgrade path.
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Orders::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Orders::VarietyId).integer().not_null())
                        .col(ColumnDef::new(Orders::ShopId).integer().not_null())
                        .col(ColumnDef::new(Orders::Quantity).integer().not_null())
                        .col(ColumnDef::new(Orders::Price).decimal_len(10, 2).not_null())
                        .col(ColumnDef::new(Orders::DeliveryDate).date().not_null())
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_orders_variety_id")
                                .from(Orders::Table, Orders::VarietyId)
                                .to(Varieties::Table, Varieties::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_orders_shop_id")
                                .from(Orders::Table, Orders::ShopId)
                                .to(Shops::Table, Shops::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_shop_id")
                        .table(Orders::Table)
                        .col(Orders::ShopId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_delivery_date")
                        .table(Orders::Table)
                        .col(Orders::DeliveryDate)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Orders::Table).if_exists().to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Shops::Table).if_exists().to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Varieties::Table).if_exists().to_owned())
                .await
        }
    }
}

mod m20240101_000002_add_payment_fields {
    use super::Orders;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_add_payment_fields"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // SQLite only accepts one column per ALTER TABLE
            if !manager.has_column("orders", "payment_status").await? {
                manager
                    .alter_table(
                        Table::alter()
                            .table(Orders::Table)
                            .add_column(
                                ColumnDef::new(Orders::PaymentStatus)
                                    .string_len(20)
                                    .not_null()
                                    .default("unpaid"),
                            )
                            .to_owned(),
                    )
                    .await?;
            }

            if !manager.has_column("orders", "paid_amount").await? {
                manager
                    .alter_table(
                        Table::alter()
                            .table(Orders::Table)
                            .add_column(
                                ColumnDef::new(Orders::PaidAmount)
                                    .decimal_len(10, 2)
                                    .not_null()
                                    .default(0),
                            )
                            .to_owned(),
                    )
                    .await?;
            }

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .alter_table(
                    Table::alter()
                        .table(Orders::Table)
                        .drop_column(Orders::PaidAmount)
                        .to_owned(),
                )
                .await?;
            manager
                .alter_table(
                    Table::alter()
                        .table(Orders::Table)
                        .drop_column(Orders::PaymentStatus)
                        .to_owned(),
                )
                .await
        }
    }
}
