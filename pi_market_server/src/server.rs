use std::time::Duration;

use actix_web::{dev::Server, middleware::Logger, web, App, HttpServer};
use pi_market_engine::{
    events::EventProducers,
    AuthApi,
    OrderStatusApi,
    PaymentFlowApi,
    PayoutApi,
    SqliteDatabase,
    StoreApi,
};
use pi_network_tools::PiNetworkApi;

use crate::{
    auth::{TokenIssuer, TokenVerifier},
    config::ServerConfig,
    errors::ServerError,
    middleware::HmacSignatureFactory,
    payout_worker::start_payout_worker,
    routes,
    routes::{health, OrdersData},
    webhook_routes,
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let pi = PiNetworkApi::new(config.pi_config.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    start_payout_worker(db.clone(), pi.clone(), config.payout);
    let srv = create_server_instance(config, db, pi)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(config: ServerConfig, db: SqliteDatabase, pi: PiNetworkApi) -> Result<Server, ServerError> {
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let producers = EventProducers::default();
        let payment_api = PaymentFlowApi::new(db.clone(), producers.clone());
        let order_api = OrderStatusApi::new(db.clone(), producers.clone());
        let payout_api = PayoutApi::new(db.clone(), producers);
        let store_api = StoreApi::new(db.clone());
        let auth_api = AuthApi::new(db.clone());
        let issuer = TokenIssuer::new(&config.auth);
        let verifier = TokenVerifier::new(&config.auth);
        let webhook_guard = HmacSignatureFactory::new(config.webhook_secret.clone());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("pmg::access_log"))
            .app_data(web::Data::new(payment_api))
            .app_data(web::Data::new(order_api))
            .app_data(web::Data::new(payout_api))
            .app_data(web::Data::new(store_api))
            .app_data(web::Data::new(auth_api))
            .app_data(web::Data::new(OrdersData { db: db.clone() }))
            .app_data(web::Data::new(pi.clone()))
            .app_data(web::Data::new(issuer))
            .app_data(web::Data::new(verifier))
            .service(health)
            .service(web::resource("/auth").route(web::post().to(routes::auth::<SqliteDatabase>)))
            .service(
                web::scope("/pi").service(
                    web::resource("/payments")
                        .wrap(webhook_guard)
                        .route(web::post().to(webhook_routes::pi_payment_webhook::<SqliteDatabase>)),
                ),
            )
            .service(
                web::scope("/payments")
                    .service(web::resource("/approve").route(web::post().to(routes::approve_payment::<SqliteDatabase>)))
                    .service(
                        web::resource("/{payment_id}/complete")
                            .route(web::post().to(routes::complete_payment::<SqliteDatabase>)),
                    )
                    .service(
                        web::resource("/{payment_id}/cancel")
                            .route(web::post().to(routes::cancel_payment::<SqliteDatabase>)),
                    ),
            )
            .service(
                web::scope("/orders")
                    .service(web::resource("").route(web::get().to(routes::my_orders::<SqliteDatabase>)))
                    .service(
                        web::resource("/store/{store_id}")
                            .route(web::get().to(routes::store_orders::<SqliteDatabase>)),
                    )
                    .service(
                        web::resource("/{order_id}/status")
                            .route(web::post().to(routes::update_order_status::<SqliteDatabase>)),
                    )
                    .service(
                        web::resource("/{order_id}/driver")
                            .route(web::post().to(routes::assign_driver::<SqliteDatabase>)),
                    )
                    .service(
                        web::resource("/{order_id}/messages")
                            .route(web::post().to(routes::post_chat_message::<SqliteDatabase>)),
                    )
                    .service(
                        web::resource("/{order_id}").route(web::get().to(routes::order_by_id::<SqliteDatabase>)),
                    ),
            )
            .service(
                web::scope("/payouts")
                    .service(
                        web::resource("/store/{store_id}")
                            .route(web::get().to(routes::store_payouts::<SqliteDatabase>)),
                    )
                    .service(web::resource("/{id}/retry").route(web::post().to(routes::retry_payout::<SqliteDatabase>))),
            )
            .service(
                web::scope("/stores")
                    .service(web::resource("").route(web::post().to(routes::create_store::<SqliteDatabase>)))
                    .service(
                        web::resource("/relink").route(web::post().to(routes::relink_store_account::<SqliteDatabase>)),
                    ),
            )
            .service(web::resource("/products").route(web::post().to(routes::create_product::<SqliteDatabase>)))
            .service(
                web::resource("/discount_codes").route(web::post().to(routes::create_discount::<SqliteDatabase>)),
            )
            .service(web::resource("/notifications").route(web::get().to(routes::my_notifications::<SqliteDatabase>)))
    })
    .keep_alive(actix_web::http::KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}
