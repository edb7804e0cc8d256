//! Request handler definitions
//!
//! Define each route and its handler here. Handlers that are more than a line or two MUST go
//! into a separate module. Keep this module neat and tidy 🙏
//!
//! Handlers are generic over the engine traits so that endpoint tests can run them against
//! mocks; the server module instantiates them with [`pi_market_engine::SqliteDatabase`].
use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use pi_market_engine::{
    db_types::{NewDiscountCode, NewPaymentRecord, NewProduct, OrderId},
    traits::{
        AuthManagement,
        OrderManagement,
        PaymentManagement,
        PayoutManagement,
        StoreManagement,
    },
    AuthApi,
    OrderStatusApi,
    PaymentFlowApi,
    PayoutApi,
    StoreApi,
};
use pi_network_tools::{PiApiError, PiNetworkApi, PiUser};

use crate::{
    auth::{JwtClaims, TokenIssuer},
    data_objects::{
        ApprovePaymentParams,
        AssignDriverParams,
        AuthParams,
        AuthResponse,
        CancelPaymentParams,
        CompletePaymentParams,
        CreateDiscountParams,
        CreateProductParams,
        CreateStoreParams,
        JsonResponse,
        PostMessageParams,
        RelinkParams,
        UpdateOrderStatusParams,
    },
    errors::{AuthError, ServerError},
};

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Auth  ----------------------------------------------------
/// Route handler for the auth endpoint.
///
/// The client supplies the access token it received from the payment network, plus a
/// strictly-increasing nonce. The server resolves the token to a network identity via the `/me`
/// endpoint (or derives a development identity in mock mode), upserts the gateway user, and
/// issues a short-lived JWT.
pub async fn auth<B: AuthManagement>(
    body: web::Json<AuthParams>,
    api: web::Data<AuthApi<B>>,
    pi: web::Data<PiNetworkApi>,
    signer: web::Data<TokenIssuer>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ Received auth request");
    let params = body.into_inner();
    let pi_user = match pi.me(&params.access_token).await {
        Ok(user) => user,
        Err(PiApiError::MockMode) => {
            warn!("💻️ Pi network client is in mock mode. Deriving a development identity from the token.");
            PiUser {
                uid: format!("dev_{}", params.access_token),
                username: format!("dev_{}", params.access_token),
                wallet_address: None,
            }
        },
        Err(e) => {
            debug!("💻️ The network rejected the access token. {e}");
            return Err(ServerError::AuthenticationError(AuthError::NetworkTokenRejected(e.to_string())));
        },
    };
    let user = api.login(&pi_user.uid, &pi_user.username, pi_user.wallet_address.as_deref(), params.nonce).await?;
    let token = signer.issue_token(&user)?;
    trace!("💻️ Issued access token for user {}", user.id);
    Ok(HttpResponse::Ok().json(AuthResponse { token }))
}

//----------------------------------------------  Payments  ----------------------------------------------------
/// `POST /payments/approve`. Records the approved payment locally, then approves it on the
/// network. The network call is best-effort: in mock mode (or on a transient failure) the local
/// record is still authoritative and completion will reconcile.
pub async fn approve_payment<B: PaymentManagement + OrderManagement>(
    claims: JwtClaims,
    body: web::Json<ApprovePaymentParams>,
    api: web::Data<PaymentFlowApi<B>>,
    pi: web::Data<PiNetworkApi>,
) -> Result<HttpResponse, ServerError> {
    let params = body.into_inner();
    debug!("💻️ POST approve payment {}", params.payment_id);
    let record = api
        .approve_payment(NewPaymentRecord {
            payment_id: params.payment_id.clone().into(),
            user_id: claims.sub,
            amount: params.amount,
            metadata: params.metadata,
        })
        .await?;
    if let Err(e) = pi.approve_payment(&params.payment_id).await {
        warn!("💻️ Could not approve payment {} on the network. {e}", params.payment_id);
    }
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Payment {} approved", record.payment_id))))
}

/// `POST /payments/{payment_id}/complete`. The client-side confirmation call; it funnels into
/// the same completion flow as the webhook, so a race between the two is harmless.
pub async fn complete_payment<B: PaymentManagement + OrderManagement>(
    _claims: JwtClaims,
    path: web::Path<String>,
    body: web::Json<CompletePaymentParams>,
    api: web::Data<PaymentFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let payment_id = path.into_inner().into();
    let params = body.into_inner();
    debug!("💻️ POST client completion for payment {payment_id}");
    let result = api.complete_payment(&payment_id, &params.txid).await?;
    let message = if result.newly_fulfilled {
        format!("Payment completed. Order {} created.", result.order.order_id)
    } else {
        format!("Payment was already completed by order {}.", result.order.order_id)
    };
    Ok(HttpResponse::Ok().json(JsonResponse::success(message)))
}

/// `POST /payments/{payment_id}/cancel`.
pub async fn cancel_payment<B: PaymentManagement + OrderManagement>(
    _claims: JwtClaims,
    path: web::Path<String>,
    body: web::Json<CancelPaymentParams>,
    api: web::Data<PaymentFlowApi<B>>,
    pi: web::Data<PiNetworkApi>,
) -> Result<HttpResponse, ServerError> {
    let payment_id = path.into_inner().into();
    let reason = body.into_inner().reason.unwrap_or_else(|| "cancelled by user".to_string());
    let record = api.cancel_payment(&payment_id, &reason).await?;
    if let Err(e) = pi.cancel_payment(record.payment_id.as_str()).await {
        warn!("💻️ Could not cancel payment {payment_id} on the network. {e}");
    }
    Ok(HttpResponse::Ok().json(JsonResponse::success("Payment cancelled")))
}

//----------------------------------------------   Orders  ----------------------------------------------------
pub async fn my_orders<B: OrderManagement>(
    claims: JwtClaims,
    api: web::Data<OrdersData<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET my_orders for user {}", claims.sub);
    let orders = api.db.fetch_orders_for_customer(claims.sub).await?;
    Ok(HttpResponse::Ok().json(orders_summary(&orders)))
}

/// Plain data wrapper so queries that need no policy can share the backend without going through
/// an API struct.
pub struct OrdersData<B> {
    pub db: B,
}

/// `GET /orders/store/{store_id}` — the store owner's order list.
pub async fn store_orders<B: OrderManagement + StoreManagement + AuthManagement>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<OrderStatusApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let store_id = path.into_inner();
    let store = api
        .db()
        .fetch_store(store_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("store {store_id}")))?;
    if store.owner_id != claims.sub {
        return Err(ServerError::InsufficientPermissions("only the store owner may list its orders".to_string()));
    }
    let orders = api.db().fetch_orders_for_store(store_id).await?;
    Ok(HttpResponse::Ok().json(orders_summary(&orders)))
}

/// `GET /orders/{order_id}` — visible to the customer, the store owner and the assigned driver.
pub async fn order_by_id<B: OrderManagement + StoreManagement + AuthManagement>(
    claims: JwtClaims,
    path: web::Path<String>,
    api: web::Data<OrderStatusApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id: OrderId = path.into_inner().into();
    let order = api
        .db()
        .fetch_order_by_order_id(&order_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("order {order_id}")))?;
    let store = api
        .db()
        .fetch_store(order.store_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("store {}", order.store_id)))?;
    let is_party =
        claims.sub == order.customer_id || claims.sub == store.owner_id || order.driver_id == Some(claims.sub);
    if !is_party {
        return Err(ServerError::InsufficientPermissions("you are not a party to this order".to_string()));
    }
    Ok(HttpResponse::Ok().json(orders_summary(std::slice::from_ref(&order)).remove(0)))
}

pub async fn update_order_status<B: OrderManagement + StoreManagement + AuthManagement>(
    claims: JwtClaims,
    path: web::Path<String>,
    body: web::Json<UpdateOrderStatusParams>,
    api: web::Data<OrderStatusApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id: OrderId = path.into_inner().into();
    let params = body.into_inner();
    debug!("💻️ POST order {order_id} status -> {}", params.status);
    let order = api.update_status(&claims.actor(), &order_id, params.status).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Order {} is now {}", order.order_id, order.status))))
}

pub async fn assign_driver<B: OrderManagement + StoreManagement + AuthManagement>(
    claims: JwtClaims,
    path: web::Path<String>,
    body: web::Json<AssignDriverParams>,
    api: web::Data<OrderStatusApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id: OrderId = path.into_inner().into();
    let driver_id = body.into_inner().driver_id;
    debug!("💻️ POST assign driver {driver_id} to order {order_id}");
    api.assign_driver(&claims.actor(), &order_id, driver_id).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success("Driver assigned")))
}

pub async fn post_chat_message<B: OrderManagement + StoreManagement + AuthManagement>(
    claims: JwtClaims,
    path: web::Path<String>,
    body: web::Json<PostMessageParams>,
    api: web::Data<OrderStatusApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id: OrderId = path.into_inner().into();
    let message = api.post_message(&claims.actor(), &order_id, &body.into_inner().body).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Message {} posted", message.id))))
}

//----------------------------------------------   Payouts  ----------------------------------------------------
pub async fn store_payouts<B: PayoutManagement + StoreManagement>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<PayoutApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let store_id = path.into_inner();
    debug!("💻️ GET payouts for store {store_id}");
    let payouts = api.payouts_for_store(&claims.actor(), store_id).await?;
    let rows = payouts
        .iter()
        .map(|p| {
            serde_json::json!({
                "id": p.id,
                "order_id": p.order_id.as_str(),
                "amount": p.amount.value(),
                "status": p.status.to_string(),
                "txid": p.txid,
                "failure_reason": p.failure_reason,
                "attempt": p.attempt,
            })
        })
        .collect::<Vec<_>>();
    Ok(HttpResponse::Ok().json(rows))
}

/// `POST /payouts/{id}/retry`. The store owner's entry point for re-running a failed payout.
pub async fn retry_payout<B: PayoutManagement + StoreManagement>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<PayoutApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let payout_id = path.into_inner();
    info!("💻️ POST retry for payout {payout_id}");
    let task = api.retry_failed_payout(&claims.actor(), payout_id).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Payout retry queued as task {}", task.id))))
}

//----------------------------------------------   Stores  ----------------------------------------------------
pub async fn create_store<B: StoreManagement + AuthManagement>(
    claims: JwtClaims,
    body: web::Json<CreateStoreParams>,
    api: web::Data<StoreApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let store = api.create_store(&claims.actor(), &body.into_inner().name).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Store {} created with id {}", store.name, store.id))))
}

pub async fn create_product<B: StoreManagement + AuthManagement>(
    claims: JwtClaims,
    body: web::Json<CreateProductParams>,
    api: web::Data<StoreApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let params = body.into_inner();
    let product = api
        .add_product(&claims.actor(), NewProduct {
            store_id: params.store_id,
            name: params.name,
            price: params.price,
            stock: params.stock,
            choices: params.choices.into_iter().map(|c| (c.name, c.stock)).collect(),
        })
        .await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Product {} created with id {}", product.name, product.id))))
}

pub async fn create_discount<B: StoreManagement + AuthManagement>(
    claims: JwtClaims,
    body: web::Json<CreateDiscountParams>,
    api: web::Data<StoreApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let params = body.into_inner();
    let code = api
        .add_discount_code(&claims.actor(), NewDiscountCode {
            store_id: params.store_id,
            code: params.code,
            percent: params.percent,
            expires_at: params.expires_at,
            max_uses: params.max_uses,
        })
        .await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Discount code {} created", code.code))))
}

/// `POST /stores/relink`. Propagates a freshly linked network account to the owner's stores so
/// payouts have a destination.
pub async fn relink_store_account<B: StoreManagement + AuthManagement>(
    claims: JwtClaims,
    body: web::Json<RelinkParams>,
    api: web::Data<StoreApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let params = body.into_inner();
    let updated = api.relink_pi_account(&claims.actor(), &params.wallet_address, &params.pi_user_id).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("{updated} stores updated"))))
}

pub async fn my_notifications<B: StoreManagement + AuthManagement>(
    claims: JwtClaims,
    api: web::Data<StoreApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let notes = api.notifications_for(&claims.actor()).await?;
    let rows = notes
        .iter()
        .map(|n| serde_json::json!({ "id": n.id, "body": n.body, "is_read": n.is_read }))
        .collect::<Vec<_>>();
    Ok(HttpResponse::Ok().json(rows))
}

fn orders_summary(orders: &[pi_market_engine::db_types::Order]) -> Vec<serde_json::Value> {
    orders
        .iter()
        .map(|o| {
            serde_json::json!({
                "order_id": o.order_id.as_str(),
                "store_id": o.store_id,
                "status": o.status.to_string(),
                "total_amount": o.total_amount.value(),
                "discount_amount": o.discount_amount.value(),
                "delivery_fee": o.delivery_fee.value(),
                "driver_id": o.driver_id,
                "items": o.items.0,
            })
        })
        .collect()
}
