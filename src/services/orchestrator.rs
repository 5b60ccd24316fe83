//! Transaction orchestrator.
//!
//! The façade over the gateway adapters, the order ledger and the
//! post-payment workflow. Every operation mints a fresh request id used for
//! log correlation and forwarded to the gateway as its idempotency key, so
//! a network-level retry of the same logical call cannot double-charge.

use axum::http::HeaderMap;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::domain::{Gateway, Order, OrderStatus, PaymentMethod, Transaction};
use crate::error::{ErrorCode, PaymentError};
use crate::gateways::{
    BankTransferAdapter, CardstreamAdapter, ConfirmOutcome, GatewayAdapter, GatewayError,
    IntentRequest, WalletpayAdapter,
};
use crate::status;

use super::events::ProcessedEventCache;
use super::ledger::{OrderLedger, PaymentUpdate};
use super::workflow::PostPaymentWorkflow;

#[derive(Debug, Clone)]
pub struct CreateTransactionRequest {
    pub gateway: Gateway,
    pub amount_minor: i64,
    pub currency: String,
    pub order_id: String,
    pub customer: crate::domain::Customer,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct ConfirmTransactionRequest {
    pub gateway: Gateway,
    pub transaction_id: String,
    pub order_id: String,
    pub method_ref: Option<String>,
    pub save_method: bool,
    pub return_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ConfirmResult {
    pub transaction: Transaction,
    pub order_status: OrderStatus,
}

#[derive(Debug, Clone)]
pub struct WebhookOutcome {
    pub event_id: String,
    pub duplicate: bool,
    pub order_status: Option<OrderStatus>,
}

pub struct TransactionOrchestrator {
    card: CardstreamAdapter,
    wallet: WalletpayAdapter,
    bank: BankTransferAdapter,
    ledger: OrderLedger,
    workflow: PostPaymentWorkflow,
    events: ProcessedEventCache,
    regulated_countries: Vec<String>,
}

impl TransactionOrchestrator {
    pub fn new(config: &Config, ledger: OrderLedger, workflow: PostPaymentWorkflow) -> Self {
        Self {
            card: CardstreamAdapter::new(config.cardstream.clone()),
            wallet: WalletpayAdapter::new(config.walletpay.clone()),
            bank: BankTransferAdapter::new(config.bank_transfer.clone()),
            ledger,
            workflow,
            events: ProcessedEventCache::new(),
            regulated_countries: config.regulated_countries.clone(),
        }
    }

    fn adapter(&self, gateway: Gateway) -> &dyn GatewayAdapter {
        match gateway {
            Gateway::Cardstream => &self.card,
            Gateway::Walletpay => &self.wallet,
            Gateway::BankTransfer => &self.bank,
        }
    }

    pub fn ledger(&self) -> &OrderLedger {
        &self.ledger
    }

    pub async fn create_transaction(
        &self,
        req: CreateTransactionRequest,
    ) -> Result<Transaction, PaymentError> {
        if req.amount_minor <= 0 {
            return Err(PaymentError::Validation(
                "amount must be a positive number of minor units".to_string(),
            ));
        }
        if req.currency.len() != 3 || !req.currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(PaymentError::Validation(
                "currency must be a three-letter ISO 4217 code".to_string(),
            ));
        }

        let request_id = Uuid::new_v4().to_string();
        info!(
            request_id = %request_id,
            gateway = %req.gateway,
            order_id = %req.order_id,
            amount_minor = req.amount_minor,
            "creating transaction"
        );
        if let Some(metadata) = &req.metadata {
            tracing::debug!(
                request_id = %request_id,
                metadata = %crate::utils::redact::sanitize_json(metadata),
                "transaction metadata"
            );
        }

        // Non-card gateways need the order record up front: the wallet for
        // item detail, the bank transfer to write its pending snapshot.
        let order = match req.gateway {
            Gateway::Cardstream => None,
            Gateway::Walletpay | Gateway::BankTransfer => Some(
                self.ledger
                    .get_order(&req.order_id)
                    .await?
                    .ok_or_else(|| PaymentError::OrderNotFound(req.order_id.clone()))?,
            ),
        };

        let strong_auth = match req.gateway {
            Gateway::Cardstream => crate::gateways::cardstream::requires_strong_authentication(
                req.amount_minor,
                &req.customer.billing_country,
                &self.regulated_countries,
            ),
            _ => false,
        };

        let description = req.description.clone().or_else(|| {
            order
                .as_ref()
                .map(|order| format!("Order {} ({} items)", order.id, order.items.len()))
        });

        let handle = self
            .adapter(req.gateway)
            .create_intent(IntentRequest {
                amount_minor: req.amount_minor,
                currency: req.currency.clone(),
                order_id: req.order_id.clone(),
                customer_ref: req.customer.gateway_customer_id.clone(),
                description,
                metadata: req.metadata.clone(),
                request_id: request_id.clone(),
                strong_auth,
            })
            .await
            .map_err(|e| map_gateway_error(ErrorCode::PaymentCreationFailed, e))?;

        let tx_status = status::normalize(req.gateway, &handle.native_status);

        // The bank transfer has no confirm call; its pending snapshot lands
        // on the order immediately.
        if req.gateway == Gateway::BankTransfer {
            self.ledger
                .update_order_payment(
                    &req.order_id,
                    PaymentUpdate {
                        transaction_id: handle.intent_id.clone(),
                        gateway: req.gateway,
                        status: tx_status,
                        amount_minor: handle.amount_minor,
                        currency: handle.currency.clone(),
                        reference: Some(handle.intent_id.clone()),
                    },
                )
                .await?;
        }

        info!(
            request_id = %request_id,
            transaction_id = %handle.intent_id,
            status = %tx_status,
            "transaction created"
        );

        Ok(Transaction {
            id: handle.intent_id,
            gateway: req.gateway,
            amount_minor: handle.amount_minor.unwrap_or(req.amount_minor),
            currency: handle.currency.unwrap_or(req.currency),
            status: tx_status,
            requires_action: handle.requires_action || strong_auth,
            client_token: handle.client_token,
            order_id: req.order_id,
        })
    }

    pub async fn confirm_transaction(
        &self,
        req: ConfirmTransactionRequest,
    ) -> Result<ConfirmResult, PaymentError> {
        let request_id = Uuid::new_v4().to_string();
        info!(
            request_id = %request_id,
            gateway = %req.gateway,
            transaction_id = %req.transaction_id,
            order_id = %req.order_id,
            "confirming transaction"
        );

        let outcome = self
            .drive_confirmation(&req, &request_id)
            .await
            .map_err(|e| map_gateway_error(ErrorCode::PaymentConfirmationFailed, e))?;

        let tx_status = status::normalize(req.gateway, &outcome.native_status);

        // ORDER_NOT_FOUND here aborts the flow: money may have moved for an
        // order we no longer know about.
        let applied = self
            .ledger
            .update_order_payment(
                &req.order_id,
                PaymentUpdate {
                    transaction_id: outcome.intent_id.clone(),
                    gateway: req.gateway,
                    status: tx_status,
                    amount_minor: outcome.amount_minor,
                    currency: outcome.currency.clone(),
                    reference: None,
                },
            )
            .await?;

        if applied.newly_completed {
            self.workflow.run(&req.order_id).await;
        }

        if req.save_method {
            self.try_attach_method(&req, &applied.order).await;
        }

        let snapshot = applied.order.payment.as_ref();
        Ok(ConfirmResult {
            transaction: Transaction {
                id: outcome.intent_id,
                gateway: req.gateway,
                amount_minor: snapshot.map(|s| s.amount_minor).unwrap_or_default(),
                currency: snapshot.map(|s| s.currency.clone()).unwrap_or_default(),
                status: tx_status,
                requires_action: outcome.requires_action,
                client_token: outcome.client_token,
                order_id: req.order_id,
            },
            order_status: applied.order.status,
        })
    }

    async fn drive_confirmation(
        &self,
        req: &ConfirmTransactionRequest,
        request_id: &str,
    ) -> Result<ConfirmOutcome, GatewayError> {
        match req.gateway {
            Gateway::Cardstream => {
                self.card
                    .confirm_intent(
                        &req.transaction_id,
                        req.method_ref.as_deref(),
                        req.return_url.as_deref(),
                        request_id,
                    )
                    .await
            }
            // The wallet's post-approval confirmation is its capture phase.
            Gateway::Walletpay => self.wallet.capture_order(&req.transaction_id, request_id).await,
            Gateway::BankTransfer => {
                self.bank
                    .confirm_intent(&req.transaction_id, None, None, request_id)
                    .await
            }
        }
    }

    /// Attaching the instrument for reuse is best-effort: the payment is
    /// already confirmed, so an attachment failure is logged, never
    /// surfaced.
    async fn try_attach_method(&self, req: &ConfirmTransactionRequest, order: &Order) {
        let (Some(method_ref), Some(customer_ref)) =
            (&req.method_ref, &order.customer.gateway_customer_id)
        else {
            return;
        };

        if let Err(e) = self
            .adapter(req.gateway)
            .attach_method(customer_ref, method_ref, false)
            .await
        {
            warn!(
                order_id = %order.id,
                customer = %order.customer.id,
                error = %e,
                "saving the payment method failed; confirmation unaffected"
            );
        }
    }

    /// An empty list, not an error, when the customer has no gateway-side
    /// identity yet.
    pub async fn saved_payment_methods(
        &self,
        customer_id: &str,
        gateway: Gateway,
    ) -> Result<Vec<PaymentMethod>, PaymentError> {
        let Some(customer_ref) = self.customer_gateway_ref(customer_id).await? else {
            return Ok(Vec::new());
        };

        self.adapter(gateway)
            .list_methods(&customer_ref)
            .await
            .map_err(|e| map_gateway_error(ErrorCode::PaymentMethodFailed, e))
    }

    pub async fn delete_payment_method(
        &self,
        customer_id: &str,
        method_id: &str,
        gateway: Gateway,
    ) -> Result<(), PaymentError> {
        info!(customer = %customer_id, method = %method_id, gateway = %gateway, "detaching payment method");
        self.adapter(gateway)
            .detach_method(method_id)
            .await
            .map_err(|e| map_gateway_error(ErrorCode::PaymentMethodFailed, e))
    }

    async fn customer_gateway_ref(&self, customer_id: &str) -> Result<Option<String>, PaymentError> {
        let orders = self.ledger.customer_orders(customer_id).await?;
        Ok(orders
            .into_iter()
            .find_map(|order| order.customer.gateway_customer_id))
    }

    /// The asynchronous entry point: verifies the notification, drops
    /// duplicates, and routes the result through the same update path as
    /// the synchronous confirm call.
    pub async fn process_webhook(
        &self,
        gateway: Gateway,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<WebhookOutcome, PaymentError> {
        let event = self
            .adapter(gateway)
            .verify_webhook(headers, body)
            .map_err(|e| match e {
                GatewayError::InvalidSignature(msg) => PaymentError::WebhookVerification(msg),
                other => PaymentError::WebhookVerification(other.to_string()),
            })?;

        if self.events.is_duplicate(gateway, &event.event_id).await {
            info!(gateway = %gateway, event_id = %event.event_id, "duplicate webhook delivery dropped");
            return Ok(WebhookOutcome {
                event_id: event.event_id,
                duplicate: true,
                order_status: None,
            });
        }

        let order_id = event.order_id.clone().ok_or_else(|| {
            PaymentError::Validation("webhook event carries no order reference".to_string())
        })?;

        let tx_status = status::normalize(gateway, &event.native_status);
        info!(
            gateway = %gateway,
            event_id = %event.event_id,
            event_type = %event.event_type,
            transaction_id = %event.transaction_id,
            order_id = %order_id,
            status = %tx_status,
            "webhook event verified"
        );
        tracing::debug!(
            event_id = %event.event_id,
            payload = %crate::utils::redact::sanitize_json(&event.raw),
            "webhook payload"
        );

        let applied = self
            .ledger
            .update_order_payment(
                &order_id,
                PaymentUpdate {
                    transaction_id: event.transaction_id.clone(),
                    gateway,
                    status: tx_status,
                    amount_minor: event.amount_minor,
                    currency: event.currency.clone(),
                    reference: None,
                },
            )
            .await?;

        if applied.newly_completed {
            self.workflow.run(&order_id).await;
        }

        // Marked only after the update landed, so a failed delivery stays
        // retryable for the gateway.
        self.events.mark_processed(gateway, &event.event_id).await;

        Ok(WebhookOutcome {
            event_id: event.event_id,
            duplicate: false,
            order_status: Some(applied.order.status),
        })
    }
}

fn map_gateway_error(code: ErrorCode, err: GatewayError) -> PaymentError {
    match err {
        GatewayError::Rejected {
            message,
            decline_code,
        } => PaymentError::Gateway {
            code,
            message,
            decline_code,
            retryable: false,
        },
        GatewayError::Unavailable(message) => PaymentError::Gateway {
            code,
            message,
            decline_code: None,
            retryable: true,
        },
        GatewayError::InvalidResponse(message) => PaymentError::Gateway {
            code,
            message,
            decline_code: None,
            retryable: true,
        },
        GatewayError::InvalidSignature(message) => PaymentError::WebhookVerification(message),
        GatewayError::Unsupported(message) => PaymentError::Validation(message.to_string()),
    }
}
