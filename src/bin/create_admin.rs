use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, Database, EntityTrait, QueryFilter, Set,
};
use std::io::{self, BufRead, Write};
use std::process::exit;
use validator::ValidateEmail;

use storefront_api::auth::password::{hash_password, validate_password_strength};
use storefront_api::config::AppConfig;
use storefront_api::entities::user::{self, Entity as UserEntity};
use storefront_api::entities::user_group::{self, Entity as UserGroupEntity, GroupName};
use storefront_api::entities::{seed_user_groups, setup_schema};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().expect("Failed to load configuration");

    let mut options = ConnectOptions::new(config.database_url.clone());
    options
        .max_connections(config.database_max_connections)
        .sqlx_logging(false);
    let db = Database::connect(options)
        .await
        .expect("Failed to connect to the database");

    setup_schema(&db).await.expect("Failed to set up schema");
    seed_user_groups(&db).await.expect("Failed to seed user groups");

    let email = prompt("Email").to_lowercase();
    if !email.validate_email() {
        eprintln!("'{email}' is not a valid email address");
        exit(1);
    }

    let password = prompt("Password");
    let confirmation = prompt("Confirm password");
    if password != confirmation {
        eprintln!("Passwords do not match");
        exit(1);
    }
    if let Err(err) = validate_password_strength(&password) {
        eprintln!("Password is not strong enough: {err}");
        exit(1);
    }

    let existing = UserEntity::find()
        .filter(user::Column::Email.eq(&email))
        .one(&db)
        .await
        .expect("Failed to query users");
    if existing.is_some() {
        eprintln!("User with email {email} already exists");
        exit(1);
    }

    let admin_group = UserGroupEntity::find()
        .filter(user_group::Column::Name.eq(GroupName::Admin))
        .one(&db)
        .await
        .expect("Failed to query user groups")
        .expect("Admin group is missing");

    let hashed = hash_password(&password).expect("Failed to hash password");
    let now = Utc::now();
    let admin = user::ActiveModel {
        email: Set(email),
        hashed_password: Set(hashed),
        group_id: Set(admin_group.id),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&db)
    .await
    .expect("Failed to create admin user");

    println!("Admin user {} created with id {}", admin.email, admin.id);
}

fn prompt(label: &str) -> String {
    print!("{label}: ");
    io::stdout().flush().expect("Failed to flush stdout");

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .expect("Failed to read input");
    line.trim().to_string()
}
