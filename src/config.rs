use anyhow::Context;

pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_addr: String,
}

impl Config {
    /// Reads configuration from the environment, with `.env` overlay.
    /// `JWT_SECRET` has no default on purpose.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        Ok(Self {
            database_url: dotenv::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://chat_app.sqlite?mode=rwc".to_owned()),
            jwt_secret: dotenv::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            bind_addr: dotenv::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_owned()),
        })
    }
}
