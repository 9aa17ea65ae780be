//! Payment initiation and webhook reconciliation.
//!
//! The provider is only ever called after the order transaction commits, so a
//! slow or failing provider never holds row locks. A failed session request is
//! recorded in its own transaction: the payment becomes `failed`, the order
//! `payment_failed`, and the caller can retry through [`PaymentService::initiate_payment`].

use cartwright_core::rules::reconcile::{PaymentSignal, plan_payment_update};
use cartwright_core::{CurrencyCode, OrderId, OrderStatus, PaymentMethod, PaymentStatus, UserId};
use sqlx::PgPool;
use tracing::{error, info, instrument, warn};

use super::OrderError;
use super::email::EmailService;
use crate::config::ApiConfig;
use crate::db::{orders, payments, users};
use crate::models::{Order, Payment, PaymentSession};
use crate::payments::{
    Correlation, EventKind, PaymentClient, PaymentGatewayError, ProviderEvent, SessionRequest,
    WebhookError, webhook,
};

/// What happened to a verified webhook delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// State was reconciled (possibly to a no-op).
    Applied,
    /// The event id was already processed.
    Duplicate,
    /// Event type is not acted on.
    Ignored,
    /// No stored payment matches the event.
    Unmatched,
}

/// Payment service.
pub struct PaymentService<'a> {
    pool: &'a PgPool,
    client: &'a PaymentClient,
    config: &'a ApiConfig,
    email: Option<&'a EmailService>,
}

impl<'a> PaymentService<'a> {
    /// Create a new payment service.
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        client: &'a PaymentClient,
        config: &'a ApiConfig,
        email: Option<&'a EmailService>,
    ) -> Self {
        Self {
            pool,
            client,
            config,
            email,
        }
    }

    /// Currency charged for every payment.
    pub(crate) const fn currency(&self) -> CurrencyCode {
        self.config.payment.currency
    }

    /// Start (or restart) payment for an existing order.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the order is not the user's,
    /// `OrderError::InvalidState` if it is paid, closed, or has nothing to
    /// charge, `OrderError::BadRequest` for an unsupported method, and
    /// `OrderError::PaymentSetupFailed` if the provider call fails.
    #[instrument(skip(self), fields(user_id = %user_id, order_id = %order_id))]
    pub async fn initiate_payment(
        &self,
        user_id: UserId,
        order_id: OrderId,
        method: PaymentMethod,
    ) -> Result<PaymentSession, OrderError> {
        let mut tx = self.pool.begin().await?;

        let mut order = orders::lock_order(&mut tx, order_id)
            .await?
            .filter(|o| o.user_id == user_id)
            .ok_or(OrderError::NotFound("order"))?;

        if order.status.is_paid() {
            return Err(OrderError::InvalidState("order is already paid".to_string()));
        }
        if order.status.restocks() {
            return Err(OrderError::InvalidState(format!(
                "order is {}",
                order.status
            )));
        }
        if !order.total_price.is_positive() {
            return Err(OrderError::InvalidState(
                "order total must be greater than zero".to_string(),
            ));
        }
        if !method.is_supported() {
            return Err(OrderError::BadRequest(format!(
                "payment method {method} is not supported"
            )));
        }

        let payment = payments::upsert_for_order(
            &mut tx,
            order.id,
            method,
            order.total_price,
            self.config.payment.currency,
        )
        .await?;

        if order.status == OrderStatus::PaymentFailed {
            orders::set_status(&mut tx, order.id, OrderStatus::Pending).await?;
            order.status = OrderStatus::Pending;
        }

        let customer = users::get_user(&mut tx, user_id).await?;
        tx.commit().await?;

        info!(payment_id = %payment.id, amount = %payment.amount, "Payment armed");

        self.start_session(&order, &payment, customer.map(|u| u.email))
            .await
    }

    /// Request a hosted session for a committed payment.
    ///
    /// On provider failure the payment and order are marked failed in a
    /// separate transaction before the error is returned.
    pub(crate) async fn start_session(
        &self,
        order: &Order,
        payment: &Payment,
        customer_email: Option<String>,
    ) -> Result<PaymentSession, OrderError> {
        let base = self.config.public_url.trim_end_matches('/');
        let request = SessionRequest {
            order_id: order.id,
            order_number: order.order_number,
            payment_id: payment.id,
            attempt: payment.attempt,
            amount: payment.amount,
            currency: self.config.payment.currency,
            customer_email,
            success_url: format!("{base}/orders/{}?payment=success", order.id),
            cancel_url: format!("{base}/orders/{}?payment=cancelled", order.id),
        };

        match self.client.create_checkout_session(&request).await {
            Ok(session) => {
                let mut conn = self.pool.acquire().await?;
                payments::set_session(
                    &mut conn,
                    payment.id,
                    &session.session_id,
                    session.payment_intent_id.as_deref(),
                    &session.raw,
                )
                .await?;

                info!(
                    order_id = %order.id,
                    payment_id = %payment.id,
                    session_id = %session.session_id,
                    "Payment session created"
                );

                Ok(PaymentSession {
                    payment_id: payment.id,
                    client_secret: session.client_secret,
                    checkout_url: session.checkout_url,
                })
            }
            Err(source) => {
                error!(
                    order_id = %order.id,
                    payment_id = %payment.id,
                    error = %source,
                    "Payment session request failed"
                );
                self.record_setup_failure(order.id, payment, &source).await?;
                Err(OrderError::PaymentSetupFailed {
                    order_id: order.id,
                    order_number: order.order_number,
                    source,
                })
            }
        }
    }

    async fn record_setup_failure(
        &self,
        order_id: OrderId,
        payment: &Payment,
        source: &PaymentGatewayError,
    ) -> Result<(), OrderError> {
        let mut tx = self.pool.begin().await?;

        // Order before payment, matching webhook reconciliation.
        let order = orders::lock_order(&mut tx, order_id).await?;
        payments::mark_failed(&mut tx, payment.id, &source.to_string()).await?;

        if let Some(order) = order
            && order.status != OrderStatus::PaymentFailed
            && order.status.can_transition_to(OrderStatus::PaymentFailed)
        {
            orders::set_status(&mut tx, order_id, OrderStatus::PaymentFailed).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Verify and reconcile one webhook delivery.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::SignatureInvalid` if the signature or payload is
    /// rejected; no state is touched in that case.
    #[instrument(skip_all)]
    pub async fn handle_webhook(
        &self,
        signature: Option<&str>,
        payload: &str,
        now: i64,
    ) -> Result<WebhookOutcome, OrderError> {
        let signature = signature.ok_or(WebhookError::MissingSignature)?;
        webhook::verify_signature(
            &self.config.payment.webhook_secret,
            signature,
            payload,
            self.config.payment.webhook_tolerance_secs,
            now,
        )?;

        let event = webhook::parse_event(payload)?;
        self.reconcile(&event).await
    }

    /// Apply a verified event in a single transaction.
    #[instrument(skip(self, event), fields(event_id = %event.id, event_type = %event.event_type))]
    async fn reconcile(&self, event: &ProviderEvent) -> Result<WebhookOutcome, OrderError> {
        let signal = match event.kind {
            EventKind::Succeeded => PaymentSignal::Succeeded,
            EventKind::Failed => PaymentSignal::Failed,
            EventKind::Ignored => {
                info!("Ignoring webhook event");
                return Ok(WebhookOutcome::Ignored);
            }
        };

        let mut tx = self.pool.begin().await?;

        let mut found = None;
        if let Some(id) = event.correlation.payment_id {
            found = payments::get_by_id(&mut tx, id).await?;
        }
        if found.is_none() {
            found = payments::find_by_provider_ref(
                &mut tx,
                event.correlation.session_id.as_deref(),
                event.correlation.payment_intent_id.as_deref(),
            )
            .await?;
        }

        let Some(found) = found else {
            warn!(correlation = ?event.correlation, "No payment matches webhook event");
            return Ok(WebhookOutcome::Unmatched);
        };

        // Order before payment, matching payment initiation.
        let order = orders::lock_order(&mut tx, found.order_id)
            .await?
            .ok_or(OrderError::NotFound("order"))?;
        let payment = payments::lock_by_id(&mut tx, found.id)
            .await?
            .ok_or(OrderError::NotFound("payment"))?;

        if let Some(reason) = superseded_by(&event.correlation, &payment) {
            if signal == PaymentSignal::Succeeded {
                error!(
                    payment_id = %payment.id,
                    attempt = payment.attempt,
                    reason,
                    "Payment captured on a superseded session, refund required"
                );
            } else {
                warn!(payment_id = %payment.id, reason, "Ignoring event for a superseded session");
            }
            return Ok(WebhookOutcome::Unmatched);
        }

        if !payments::record_event(&mut tx, &event.id, &event.event_type, Some(payment.id)).await? {
            info!(payment_id = %payment.id, "Duplicate webhook event");
            return Ok(WebhookOutcome::Duplicate);
        }

        let update = plan_payment_update(signal, payment.status, order.status);

        if let Some(status) = update.payment {
            payments::apply_status(
                &mut tx,
                payment.id,
                status,
                if status == PaymentStatus::Succeeded {
                    event.correlation.transaction_id.as_deref()
                } else {
                    None
                },
                event.correlation.payment_intent_id.as_deref(),
                &event.object,
            )
            .await?;
        }
        if let Some(status) = update.order {
            orders::set_status(&mut tx, order.id, status).await?;
        }

        tx.commit().await?;

        info!(
            payment_id = %payment.id,
            order_id = %order.id,
            payment_status = ?update.payment,
            order_status = ?update.order,
            "Webhook reconciled"
        );

        if update.newly_succeeded {
            self.dispatch_confirmation(order.id, order.user_id);
        }

        Ok(WebhookOutcome::Applied)
    }

    /// Send the confirmation email in the background.
    fn dispatch_confirmation(&self, order_id: OrderId, user_id: UserId) {
        let Some(email) = self.email.cloned() else {
            return;
        };
        let pool = self.pool.clone();
        let currency = self.config.payment.currency.code();
        let public_url = self.config.public_url.clone();

        tokio::spawn(async move {
            if let Err(e) =
                send_confirmation(&pool, &email, order_id, user_id, currency, &public_url).await
            {
                error!(order_id = %order_id, error = %e, "Failed to send order confirmation");
            }
        });
    }
}

/// Why an event cannot belong to the payment's current attempt, if it cannot.
///
/// Provider references only disqualify when both sides know them: the
/// payment-intent id is often assigned after the session is created.
fn superseded_by(correlation: &Correlation, payment: &Payment) -> Option<&'static str> {
    if correlation
        .attempt
        .is_some_and(|attempt| attempt != payment.attempt)
    {
        return Some("attempt mismatch");
    }
    if let (Some(event), Some(stored)) = (&correlation.session_id, &payment.provider_session_id)
        && event != stored
    {
        return Some("session mismatch");
    }
    if let (Some(event), Some(stored)) = (
        &correlation.payment_intent_id,
        &payment.provider_payment_intent_id,
    ) && event != stored
    {
        return Some("payment intent mismatch");
    }
    None
}

async fn send_confirmation(
    pool: &PgPool,
    email: &EmailService,
    order_id: OrderId,
    user_id: UserId,
    currency: &str,
    public_url: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut conn = pool.acquire().await?;
    let order = orders::load_details(&mut conn, order_id)
        .await?
        .ok_or("order not found")?;
    let user = users::get_user(&mut conn, user_id)
        .await?
        .ok_or("user not found")?;
    drop(conn);

    email
        .send_order_confirmation(&user, &order, currency, public_url)
        .await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cartwright_core::{Money, PaymentId};
    use chrono::Utc;

    use super::*;

    fn payment(attempt: i32, session: Option<&str>, intent: Option<&str>) -> Payment {
        Payment {
            id: PaymentId::new(3),
            order_id: OrderId::new(7),
            payment_method: PaymentMethod::Card,
            amount: Money::from_cents(4_800),
            currency: "USD".to_owned(),
            status: PaymentStatus::RequiresAction,
            attempt,
            provider_session_id: session.map(str::to_owned),
            provider_payment_intent_id: intent.map(str::to_owned),
            transaction_id: None,
            gateway_response: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn correlation(
        attempt: Option<i32>,
        session: Option<&str>,
        intent: Option<&str>,
    ) -> Correlation {
        Correlation {
            payment_id: Some(PaymentId::new(3)),
            attempt,
            session_id: session.map(str::to_owned),
            payment_intent_id: intent.map(str::to_owned),
            transaction_id: None,
        }
    }

    #[test]
    fn test_current_session_is_accepted() {
        let stored = payment(2, Some("cs_new"), None);
        let current = correlation(Some(2), Some("cs_new"), Some("pi_1"));
        assert_eq!(superseded_by(&current, &stored), None);

        let intent_only = correlation(None, None, Some("pi_1"));
        assert_eq!(superseded_by(&intent_only, &stored), None);
    }

    #[test]
    fn test_old_attempt_is_superseded() {
        let stored = payment(2, None, None);
        assert_eq!(
            superseded_by(&correlation(Some(1), Some("cs_old"), None), &stored),
            Some("attempt mismatch")
        );
    }

    #[test]
    fn test_old_session_is_superseded_without_attempt() {
        let stored = payment(2, Some("cs_new"), Some("pi_new"));
        assert_eq!(
            superseded_by(&correlation(None, Some("cs_old"), None), &stored),
            Some("session mismatch")
        );
        assert_eq!(
            superseded_by(&correlation(None, None, Some("pi_old")), &stored),
            Some("payment intent mismatch")
        );
    }
}
