pub mod user_group;
pub mod user;
pub mod category;
pub mod product;
pub mod cart;
pub mod cart_item;
pub mod order;
pub mod order_item;
pub mod refresh_token;
pub mod password_reset_token;

use sea_orm::sea_query::Index;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Schema, Set,
    TransactionTrait,
};

use crate::entities::user_group::GroupName;

//Tables are created in dependency order so foreign keys always point at
//existing tables.
pub async fn setup_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let tables = vec![
        schema.create_table_from_entity(user_group::Entity),
        schema.create_table_from_entity(user::Entity),
        schema.create_table_from_entity(category::Entity),
        schema.create_table_from_entity(product::Entity),
        schema.create_table_from_entity(cart::Entity),
        schema.create_table_from_entity(cart_item::Entity),
        schema.create_table_from_entity(order::Entity),
        schema.create_table_from_entity(order_item::Entity),
        schema.create_table_from_entity(refresh_token::Entity),
        schema.create_table_from_entity(password_reset_token::Entity),
    ];

    for mut table in tables {
        table.if_not_exists();
        db.execute(backend.build(&table)).await?;
    }

    //Composite uniques are not expressible on the entities themselves.
    let indexes = vec![
        Index::create()
            .name("ux_cart_items_cart_id_product_id")
            .table(cart_item::Entity)
            .col(cart_item::Column::CartId)
            .col(cart_item::Column::ProductId)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("ux_order_items_order_id_product_id")
            .table(order_item::Entity)
            .col(order_item::Column::OrderId)
            .col(order_item::Column::ProductId)
            .unique()
            .if_not_exists()
            .to_owned(),
    ];

    for index in indexes {
        db.execute(backend.build(&index)).await?;
    }

    Ok(())
}

pub async fn seed_user_groups(db: &DatabaseConnection) -> Result<(), DbErr> {
    let txn = db.begin().await?;

    for name in [GroupName::User, GroupName::Admin] {
        let existing = user_group::Entity::find()
            .filter(user_group::Column::Name.eq(name))
            .one(&txn)
            .await?;

        if existing.is_none() {
            let group = user_group::ActiveModel {
                name: Set(name),
                ..Default::default()
            };
            user_group::Entity::insert(group).exec(&txn).await?;
        }
    }

    txn.commit().await?;
    Ok(())
}
