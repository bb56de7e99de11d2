use std::fmt;

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_maxage: i64,
    pub confirmation_code_maxage: i64,
    pub port: u16,
    pub frontend_url: Option<String>,
    pub smtp: Option<SmtpConfig>,
    pub default_from_email: String,
    pub cleanup_cron: String,
}

/// Start-up configuration problem: a required variable is missing or a value
/// does not parse.
#[derive(Debug)]
pub struct ConfigError(String);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ConfigError {}

fn required(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError(format!("{} must be set", key)))
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

fn parsed<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match optional(key) {
        Some(value) => value
            .parse::<T>()
            .map_err(|_| ConfigError(format!("{} has an invalid value: {}", key, value))),
        None => Ok(default),
    }
}

impl Config {
    pub fn init() -> Result<Config, ConfigError> {
        let database_url = required("DATABASE_URL")?;
        let jwt_secret = required("JWT_SECRET_KEY")?;

        // SMTP is all or nothing; without a server mail goes to the console
        let smtp = match optional("SMTP_SERVER") {
            Some(server) => Some(SmtpConfig {
                server,
                port: parsed("SMTP_PORT", 587)?,
                username: required("SMTP_USERNAME")?,
                password: required("SMTP_PASSWORD")?,
            }),
            None => None,
        };

        Ok(Config {
            database_url,
            jwt_secret,
            jwt_maxage: parsed("JWT_MAXAGE", 86_400)?,
            confirmation_code_maxage: parsed("CONFIRMATION_CODE_MAXAGE", 86_400)?,
            port: parsed("PORT", 8000)?,
            frontend_url: optional("FRONTEND_URL"),
            smtp,
            default_from_email: optional("DEFAULT_FROM_EMAIL")
                .unwrap_or_else(|| "noreply@ratings.local".to_string()),
            cleanup_cron: optional("CLEANUP_CRON").unwrap_or_else(|| "0 0 1 * * *".to_string()),
        })
    }
}
