//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use paystream_core::adapters::InMemoryOrderStore;
use paystream_core::config::{
    BankTransferConfig, CardstreamConfig, Config, Environment, WalletpayConfig,
};
use paystream_core::domain::{Customer, LineItem, Order, OrderDraft};
use paystream_core::ports::{InventorySink, Notifier};
use paystream_core::services::{OrderLedger, PostPaymentWorkflow, TransactionOrchestrator};
use paystream_core::{AppState, create_app};

pub const CARD_WEBHOOK_SECRET: &str = "whsec_card_test";
pub const WALLET_WEBHOOK_SECRET: &str = "whsec_wallet_test";
pub const BANK_NOTIFICATION_SECRET: &str = "bank_notify_test";

#[derive(Default)]
pub struct CountingNotifier {
    pub sent: AtomicU32,
}

#[async_trait]
impl Notifier for CountingNotifier {
    async fn send_payment_confirmation(&self, _order: &Order) -> anyhow::Result<()> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct CountingInventory {
    pub adjustments: AtomicU32,
}

#[async_trait]
impl InventorySink for CountingInventory {
    async fn adjust(&self, _sku: &str, _delta: i64) -> anyhow::Result<()> {
        self.adjustments.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn test_config(card_url: &str, wallet_url: &str) -> Config {
    Config {
        server_port: 0,
        environment: Environment::Development,
        cardstream: CardstreamConfig {
            base_url: card_url.to_string(),
            secret_key: "sk_test_xxx".to_string(),
            webhook_secret: CARD_WEBHOOK_SECRET.to_string(),
        },
        walletpay: WalletpayConfig {
            base_url: wallet_url.to_string(),
            client_id: "client_test".to_string(),
            client_secret: "secret_test".to_string(),
            webhook_secret: WALLET_WEBHOOK_SECRET.to_string(),
        },
        bank_transfer: BankTransferConfig {
            account_holder: "Paystream GmbH".to_string(),
            iban: "DE89370400440532013000".to_string(),
            bic: "COBADEFFXXX".to_string(),
            notification_secret: BANK_NOTIFICATION_SECRET.to_string(),
        },
        regulated_countries: vec!["DE".to_string(), "FR".to_string()],
    }
}

pub struct Harness {
    pub ledger: OrderLedger,
    pub orchestrator: Arc<TransactionOrchestrator>,
    pub notifier: Arc<CountingNotifier>,
    pub inventory: Arc<CountingInventory>,
    pub config: Arc<Config>,
}

impl Harness {
    pub fn new(card_url: &str, wallet_url: &str) -> Self {
        let config = test_config(card_url, wallet_url);
        let ledger = OrderLedger::new(Arc::new(InMemoryOrderStore::new()));
        let notifier = Arc::new(CountingNotifier::default());
        let inventory = Arc::new(CountingInventory::default());
        let workflow =
            PostPaymentWorkflow::new(ledger.clone(), notifier.clone(), inventory.clone());
        let orchestrator = Arc::new(TransactionOrchestrator::new(
            &config,
            ledger.clone(),
            workflow,
        ));

        Self {
            ledger,
            orchestrator,
            notifier,
            inventory,
            config: Arc::new(config),
        }
    }

    pub fn app(&self) -> axum::Router {
        create_app(AppState {
            orchestrator: self.orchestrator.clone(),
            config: self.config.clone(),
        })
    }
}

pub fn customer(id: &str, billing_country: &str, gateway_customer_id: Option<&str>) -> Customer {
    Customer {
        id: id.to_string(),
        email: format!("{id}@example.com"),
        name: "Jo Example".to_string(),
        billing_country: billing_country.to_string(),
        gateway_customer_id: gateway_customer_id.map(str::to_string),
    }
}

pub fn order_draft(order_id: &str, customer: Customer) -> OrderDraft {
    OrderDraft {
        id: Some(order_id.to_string()),
        items: vec![LineItem {
            sku: "sku-widget".to_string(),
            name: "Widget".to_string(),
            quantity: 2,
            unit_amount_minor: 2500,
        }],
        customer,
    }
}

pub fn sign_card_webhook(body: &[u8], timestamp: i64) -> String {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    let mut payload = format!("{timestamp}.").into_bytes();
    payload.extend_from_slice(body);
    let mut mac = Hmac::<Sha256>::new_from_slice(CARD_WEBHOOK_SECRET.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(&payload);
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}

pub fn sign_bank_notification(body: &[u8]) -> String {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    let mut mac = Hmac::<Sha256>::new_from_slice(BANK_NOTIFICATION_SECRET.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}
