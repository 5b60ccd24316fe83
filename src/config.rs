use std::env;

use dotenvy::dotenv;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    Development,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CardstreamConfig {
    pub base_url: String,
    pub secret_key: String,
    pub webhook_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletpayConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub webhook_secret: String,
}

/// Static remittance details shown to the buyer, plus the shared secret the
/// back office signs paid-notifications with.
#[derive(Debug, Clone, Deserialize)]
pub struct BankTransferConfig {
    pub account_holder: String,
    pub iban: String,
    pub bic: String,
    pub notification_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server_port: u16,
    pub environment: Environment,
    pub cardstream: CardstreamConfig,
    pub walletpay: WalletpayConfig,
    pub bank_transfer: BankTransferConfig,
    /// Billing countries where strong customer authentication applies.
    pub regulated_countries: Vec<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        let environment = match env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
            .as_str()
        {
            "production" => Environment::Production,
            _ => Environment::Development,
        };

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            environment,
            cardstream: CardstreamConfig {
                base_url: env::var("CARDSTREAM_BASE_URL")
                    .unwrap_or_else(|_| "https://api.cardstream.example".to_string()),
                secret_key: env::var("CARDSTREAM_SECRET_KEY")?,
                webhook_secret: env::var("CARDSTREAM_WEBHOOK_SECRET")?,
            },
            walletpay: WalletpayConfig {
                base_url: env::var("WALLETPAY_BASE_URL")
                    .unwrap_or_else(|_| "https://api.walletpay.example".to_string()),
                client_id: env::var("WALLETPAY_CLIENT_ID")?,
                client_secret: env::var("WALLETPAY_CLIENT_SECRET")?,
                webhook_secret: env::var("WALLETPAY_WEBHOOK_SECRET")?,
            },
            bank_transfer: BankTransferConfig {
                account_holder: env::var("BANK_ACCOUNT_HOLDER")?,
                iban: env::var("BANK_IBAN")?,
                bic: env::var("BANK_BIC")?,
                notification_secret: env::var("BANK_NOTIFICATION_SECRET")?,
            },
            regulated_countries: parse_country_list(
                &env::var("REGULATED_COUNTRIES")
                    .unwrap_or_else(|_| "AT,BE,DE,ES,FR,IE,IT,NL,PT".to_string()),
            ),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

fn parse_country_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_uppercase())
        .collect()
}
