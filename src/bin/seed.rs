use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use aklaty_api::{config::AppConfig, db::create_pool};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    let grill = ensure_restaurant(&pool, "Aklaty Grill", 500).await?;
    let bakery = ensure_restaurant(&pool, "Sahara Bakery", 300).await?;

    ensure_user(&pool, "admin@aklaty.test", "admin123", "Admin", "admin", None).await?;
    ensure_user(&pool, "manager@aklaty.test", "manager123", "Grill Manager", "manager", Some(grill)).await?;
    ensure_user(&pool, "chef@aklaty.test", "chef123", "Grill Chef", "chef", Some(grill)).await?;
    ensure_user(&pool, "driver@aklaty.test", "driver123", "Grill Driver", "driver", Some(grill)).await?;
    ensure_user(&pool, "driver2@aklaty.test", "driver123", "Second Driver", "driver", Some(grill)).await?;
    ensure_user(&pool, "manager2@aklaty.test", "manager123", "Bakery Manager", "manager", Some(bakery)).await?;
    ensure_user(&pool, "customer@aklaty.test", "customer123", "Test Customer", "customer", None).await?;

    seed_menu(&pool, grill, &[
        ("Chicken Shawarma", 2500, "Sandwiches"),
        ("Beef Shawarma", 3000, "Sandwiches"),
        ("Mixed Grill Plate", 7500, "Plates"),
        ("Falafel Wrap", 1500, "Sandwiches"),
        ("Garlic Fries", 1200, "Sides"),
    ])
    .await?;
    seed_menu(&pool, bakery, &[
        ("Zaatar Manakish", 1000, "Bakery"),
        ("Cheese Fatayer", 1200, "Bakery"),
        ("Baklava Box", 4000, "Sweets"),
    ])
    .await?;

    println!("Seed completed");
    Ok(())
}

async fn ensure_restaurant(
    pool: &sqlx::PgPool,
    name: &str,
    delivery_fee: i64,
) -> anyhow::Result<Uuid> {
    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        INSERT INTO restaurants (id, name, delivery_fee)
        VALUES ($1, $2, $3)
        ON CONFLICT (name) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(delivery_fee)
    .fetch_optional(pool)
    .await?;

    let id = match row {
        Some((id,)) => id,
        None => {
            let existing: (Uuid,) = sqlx::query_as("SELECT id FROM restaurants WHERE name = $1")
                .bind(name)
                .fetch_one(pool)
                .await?;
            existing.0
        }
    };

    println!("Ensured restaurant {name}");
    Ok(id)
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    email: &str,
    password: &str,
    name: &str,
    role: &str,
    restaurant_id: Option<Uuid>,
) -> anyhow::Result<Uuid> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();

    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, password_hash, name, role, restaurant_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (email) DO UPDATE
            SET role = EXCLUDED.role, restaurant_id = EXCLUDED.restaurant_id
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .bind(name)
    .bind(role)
    .bind(restaurant_id)
    .fetch_optional(pool)
    .await?;

    let user_id = match row {
        Some((id,)) => id,
        None => {
            let existing: (Uuid,) = sqlx::query_as("SELECT id FROM users WHERE email = $1")
                .bind(email)
                .fetch_one(pool)
                .await?;
            existing.0
        }
    };

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

async fn seed_menu(
    pool: &sqlx::PgPool,
    restaurant_id: Uuid,
    items: &[(&str, i64, &str)],
) -> anyhow::Result<()> {
    let existing: (i64,) =
        sqlx::query_as("SELECT count(*) FROM menu_items WHERE restaurant_id = $1")
            .bind(restaurant_id)
            .fetch_one(pool)
            .await?;
    if existing.0 > 0 {
        return Ok(());
    }

    for (name, price, category) in items {
        sqlx::query(
            r#"
            INSERT INTO menu_items (id, restaurant_id, name, price, category)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(restaurant_id)
        .bind(name)
        .bind(price)
        .bind(category)
        .execute(pool)
        .await?;
    }

    println!("Seeded menu for {restaurant_id}");
    Ok(())
}
