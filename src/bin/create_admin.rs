//! Seed a superuser account for the admin dashboard.

use mongodb::bson::DateTime;
use std::env;

use hopebridge::auth::hash_password;
use hopebridge::db;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if it exists
    dotenvy::dotenv().ok();

    println!("Connecting to MongoDB...");
    let database = db::connect().await?;

    let email = env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@example.com".to_string());
    let name = env::var("ADMIN_NAME").unwrap_or_else(|_| "Admin User".to_string());
    let password = env::var("ADMIN_PASSWORD").expect("ADMIN_PASSWORD must be set");
    let phone = env::var("ADMIN_PHONE").unwrap_or_else(|_| "1234567890".to_string());

    if db::find_user_by_email(&database, &email).await?.is_some() {
        println!("User with email {} already exists.", email);
        return Ok(());
    }

    let user = db::create_user(
        &database,
        &email,
        &name,
        &phone,
        None,
        &hash_password(&password),
        DateTime::now(),
    )
    .await?;
    db::set_admin_flags(&database, &user.id).await?;

    println!("Successfully created superuser:");
    println!("Email: {}", email);
    println!("Name: {}", name);
    println!("Sign in at /api/auth/login to reach the admin endpoints.");
    Ok(())
}
