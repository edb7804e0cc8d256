//----------------------------------------------   Payment webhook  --------------------------------------------------

use actix_web::{web, HttpRequest, HttpResponse};
use log::*;
use pi_market_engine::{
    db_types::PaymentId,
    traits::{OrderManagement, PaymentManagement, PaymentStoreError},
    PaymentFlowApi,
    PaymentFlowError,
};
use pi_network_tools::PiNetworkApi;

use crate::{data_objects::{JsonResponse, WebhookPayload}, errors::ServerError};

/// `POST /pi/payments` — the payment network's completion notification.
///
/// The HMAC middleware has already authenticated the delivery by the time this handler runs; an
/// invalid signature never reaches here. The handler itself:
///
/// 1. Rejects a body without a `paymentId` with 400.
/// 2. Fetches the network's view of the payment for the audit trail. A fetch failure is logged
///    and swallowed; the local record is authoritative.
/// 3. Marks the record completed and fulfils it. A record that is already completed makes this a
///    no-op and still returns 200, so network redeliveries are harmless.
///
/// The handler always resolves to an HTTP response; nothing is thrown past its boundary.
pub async fn pi_payment_webhook<B>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<PaymentFlowApi<B>>,
    pi: web::Data<PiNetworkApi>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentManagement + OrderManagement,
{
    trace!("🔔️ Received payment webhook: {}", req.uri());
    let payload = serde_json::from_slice::<WebhookPayload>(&body)
        .map_err(|e| ServerError::CouldNotDeserializePayload(e.to_string()))?;
    let payment_id: PaymentId = match payload.payment_id {
        Some(id) if !id.is_empty() => id.into(),
        _ => {
            warn!("🔔️ Webhook delivery without a paymentId");
            return Err(ServerError::InvalidRequestBody("paymentId is required".to_string()));
        },
    };
    let txid = payload.txid.unwrap_or_default();

    // Best-effort verification against the network's own record. Failures here must not block
    // completion: the notification is already authenticated by its signature.
    match pi.get_payment(payment_id.as_str()).await {
        Ok(remote) => {
            let remote_txid = remote.transaction.as_ref().map(|t| t.txid.as_str()).unwrap_or_default();
            if !txid.is_empty() && remote_txid != txid {
                warn!("🔔️ Webhook txid {txid} does not match the network's record {remote_txid} for {payment_id}");
            }
        },
        Err(e) => debug!("🔔️ Could not fetch payment {payment_id} from the network. {e}"),
    }

    match api.complete_payment(&payment_id, &txid).await {
        Ok(result) if result.newly_fulfilled => {
            info!("🔔️ Payment [{payment_id}] completed. Order {} created.", result.order.order_id);
            Ok(HttpResponse::Ok().json(JsonResponse::success("Payment completed.")))
        },
        Ok(result) => {
            info!("🔔️ Duplicate webhook for [{payment_id}]; order {} already exists.", result.order.order_id);
            Ok(HttpResponse::Ok().json(JsonResponse::success("Payment was already completed.")))
        },
        Err(PaymentFlowError::PaymentStore(PaymentStoreError::PaymentNotFound(id))) => {
            warn!("🔔️ Webhook for unknown payment {id}");
            Err(ServerError::NoRecordFound(format!("payment {id}")))
        },
        Err(e) => {
            error!("🔔️ Error completing payment {payment_id}: {e}");
            Err(ServerError::BackendError(e.to_string()))
        },
    }
}
