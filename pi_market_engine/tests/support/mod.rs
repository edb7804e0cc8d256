#![allow(dead_code)]

use pi_market_engine::{
    db_types::{NewProduct, NewStore, Role, Roles, Store, User},
    order_objects::Actor,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    traits::{AuthManagement, StoreManagement},
    SqliteDatabase,
};
use pmg_common::MicroPi;

pub struct TestWorld {
    pub db: SqliteDatabase,
    pub customer: User,
    pub owner: User,
    pub driver: User,
    pub store: Store,
}

/// Creates a fresh database seeded with a customer, a store owner (with one store), and a driver.
pub async fn setup() -> TestWorld {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    let customer = db.upsert_network_user("uid-alice", "alice", Some("wallet-alice")).await.unwrap();
    let owner = db.upsert_network_user("uid-bob", "bob", Some("wallet-bob")).await.unwrap();
    db.assign_roles(owner.id, &Roles::default().with(Role::Customer).with(Role::StoreOwner)).await.unwrap();
    let driver = db.upsert_network_user("uid-dana", "dana", None).await.unwrap();
    db.assign_roles(driver.id, &Roles::default().with(Role::Driver)).await.unwrap();
    let store = db.create_store(NewStore { owner_id: owner.id, name: "Bob's Pies".to_string() }).await.unwrap();
    let owner = db.fetch_user(owner.id).await.unwrap().unwrap();
    let driver = db.fetch_user(driver.id).await.unwrap().unwrap();
    TestWorld { db, customer, owner, driver, store }
}

pub fn actor_for(user: &User) -> Actor {
    Actor::new(user.id, user.roles.clone())
}

/// A plain product with top-level stock.
pub async fn seed_product(world: &TestWorld, name: &str, price_pi: i64, stock: i64) -> i64 {
    let product = world
        .db
        .create_product(NewProduct {
            store_id: world.store.id,
            name: name.to_string(),
            price: MicroPi::from_pi(price_pi),
            stock,
            choices: vec![],
        })
        .await
        .unwrap();
    product.id
}

/// A product whose stock is tracked per choice.
pub async fn seed_product_with_choices(
    world: &TestWorld,
    name: &str,
    price_pi: i64,
    stock: i64,
    choices: &[(&str, i64)],
) -> i64 {
    let product = world
        .db
        .create_product(NewProduct {
            store_id: world.store.id,
            name: name.to_string(),
            price: MicroPi::from_pi(price_pi),
            stock,
            choices: choices.iter().map(|(n, s)| (n.to_string(), *s)).collect(),
        })
        .await
        .unwrap();
    product.id
}
