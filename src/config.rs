use std::env;

const LOCAL_JWT_SECRET: &str = "tenantix-local-access-token-secret";
const LOCAL_PAYMENT_SECRET: &str = "sk_test_local_placeholder";
const DEFAULT_PAYMENT_API_BASE: &str = "https://api.stripe.com";

/// AppConfig
///
/// Holds the application's entire configuration state. Loaded once at startup and
/// never mutated afterwards; handlers and extractors pull a copy out of `AppState`
/// through `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls log format and secret fallbacks.
    pub env: Env,
    // Postgres connection string. `None` selects the in-memory document store (local only).
    pub db_url: Option<String>,
    // Secret key used to sign and verify identity tokens.
    pub jwt_secret: String,
    // Secret key for the payment provider API.
    pub payment_secret: String,
    // Base URL of the payment provider API.
    pub payment_api_base: String,
    // ISO currency code used for every payment intent.
    pub currency: String,
    // TCP port the HTTP server binds to.
    pub port: u16,
}

/// Env
///
/// Runtime context: `Local` for development (pretty logs, fallback secrets),
/// `Production` for hardened deployments (JSON logs, mandatory secrets).
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// Non-panicking configuration for test state scaffolding.
    fn default() -> Self {
        Self {
            env: Env::Local,
            db_url: None,
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            payment_secret: LOCAL_PAYMENT_SECRET.to_string(),
            payment_api_base: DEFAULT_PAYMENT_API_BASE.to_string(),
            currency: "usd".to_string(),
            port: 5000,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads every parameter from environment variables and fails fast.
    ///
    /// # Panics
    /// Panics in `Production` if `DATABASE_URL`, `ACCESS_TOKEN_SECRET` or
    /// `STRIPE_SECRET_KEY` is missing, and in any environment if `PORT` is not a valid port.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let port = match env::var("PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .expect("FATAL: PORT must be a valid TCP port number."),
            Err(_) => 5000,
        };

        let payment_api_base = env::var("STRIPE_API_BASE")
            .unwrap_or_else(|_| DEFAULT_PAYMENT_API_BASE.to_string());
        let currency = env::var("PAYMENT_CURRENCY").unwrap_or_else(|_| "usd".to_string());

        match env {
            Env::Local => Self {
                env: Env::Local,
                db_url: env::var("DATABASE_URL").ok(),
                jwt_secret: env::var("ACCESS_TOKEN_SECRET")
                    .unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string()),
                payment_secret: env::var("STRIPE_SECRET_KEY")
                    .unwrap_or_else(|_| LOCAL_PAYMENT_SECRET.to_string()),
                payment_api_base,
                currency,
                port,
            },
            Env::Production => Self {
                env: Env::Production,
                db_url: Some(
                    env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in prod"),
                ),
                jwt_secret: env::var("ACCESS_TOKEN_SECRET")
                    .expect("FATAL: ACCESS_TOKEN_SECRET must be set in production."),
                payment_secret: env::var("STRIPE_SECRET_KEY")
                    .expect("FATAL: STRIPE_SECRET_KEY required in prod"),
                payment_api_base,
                currency,
                port,
            },
        }
    }
}
