use std::env;

use anyhow::bail;

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub cors_origin: String,
    pub review_policy: ReviewPolicy,
}

/// How many reviews a student may leave for one tutor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReviewPolicy {
    Unlimited,
    OnePerCompletedBooking,
}

impl ReviewPolicy {
    fn parse(value: &str) -> anyhow::Result<Self> {
        match value {
            "unlimited" => Ok(Self::Unlimited),
            "one_per_completed_booking" => Ok(Self::OnePerCompletedBooking),
            other => bail!("unknown REVIEW_POLICY value: {other}"),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        // The signing secret has no default; startup fails without it
        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => secret,
            _ => bail!("JWT_SECRET must be set to a non-empty value"),
        };

        let review_policy = match env::var("REVIEW_POLICY") {
            Ok(value) => ReviewPolicy::parse(&value)?,
            Err(_) => ReviewPolicy::Unlimited,
        };

        Ok(Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(4000),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./data/tutorlink.db?mode=rwc".to_string()),
            jwt_secret,
            cors_origin: env::var("CORS_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            review_policy,
        })
    }
}
