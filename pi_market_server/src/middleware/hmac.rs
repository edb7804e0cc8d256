//! HMAC middleware for Actix Web.
//!
//! The payment network signs every webhook delivery with an HMAC-SHA256 over the raw request
//! body, using a secret shared with the app at registration time. The signature arrives in the
//! `x-pi-signature` header as `sha256=<hex>`.
//!
//! Wrap the webhook routes with this middleware to reject forged deliveries before a handler
//! ever sees them. A missing or mismatched signature yields 401 and the request body is never
//! parsed. When no secret is configured at all the middleware lets everything through — a
//! development-mode bypass that is logged loudly on every request.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_http::h1;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorUnauthorized,
    web,
    Error,
};
use futures::future::LocalBoxFuture;
use log::{trace, warn};
use pmg_common::Secret;

use crate::helpers::{verify_signature, SIGNATURE_HEADER};

pub struct HmacSignatureFactory {
    secret: Secret<String>,
}

impl HmacSignatureFactory {
    pub fn new(secret: Secret<String>) -> Self {
        HmacSignatureFactory { secret }
    }
}

impl<S, B> Transform<S, ServiceRequest> for HmacSignatureFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = HmacSignatureService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(HmacSignatureService { secret: self.secret.clone(), service: Rc::new(service) }))
    }
}

pub struct HmacSignatureService<S> {
    secret: Secret<String>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for HmacSignatureService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let secret = self.secret.clone();
        Box::pin(async move {
            trace!("🔐️ Checking webhook signature");
            if secret.is_unset() {
                warn!("🔐️ No webhook secret is configured. ALLOWING the request unchecked (development mode).");
                return service.call(req).await;
            }
            let header = req
                .headers()
                .get(SIGNATURE_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
                .ok_or_else(|| {
                    warn!("🔐️ No webhook signature found in request. Denying access.");
                    ErrorUnauthorized("No webhook signature found.")
                })?;
            let body = req.extract::<web::Bytes>().await.map_err(|e| {
                warn!("🔐️ Failed to extract request body: {e:?}");
                ErrorUnauthorized("Failed to read request body.")
            })?;
            if verify_signature(secret.reveal(), body.as_ref(), &header) {
                trace!("🔐️ Webhook signature check ✅️");
                req.set_payload(bytes_to_payload(body));
                service.call(req).await
            } else {
                warn!("🔐️ Invalid webhook signature. Denying access.");
                Err(ErrorUnauthorized("Invalid webhook signature."))
            }
        })
    }
}

fn bytes_to_payload(buf: web::Bytes) -> Payload {
    let (_, mut pl) = h1::Payload::create(true);
    pl.unread_data(buf);
    Payload::from(pl)
}
