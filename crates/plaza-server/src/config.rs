use std::env;
use std::path::PathBuf;

use tracing::warn;

use plaza_api::mailer::MailConfig;

/// Process-wide configuration, read once at startup and passed explicitly
/// into every component that needs it.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    /// None disables transactional email; sends will fail and the handlers
    /// decide whether that is fatal.
    pub mail: Option<MailConfig>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let host = env::var("PLAZA_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = env::var("PLAZA_PORT")
            .unwrap_or_else(|_| "3001".into())
            .parse()?;
        let db_path = PathBuf::from(env::var("PLAZA_DB_PATH").unwrap_or_else(|_| "plaza.db".into()));

        let jwt_secret = env::var("PLAZA_JWT_SECRET").unwrap_or_else(|_| {
            warn!("PLAZA_JWT_SECRET not set, using dev secret");
            "dev-secret-change-me".into()
        });

        let mail = match (env::var("MAIL_API_URL"), env::var("MAIL_API_KEY")) {
            (Ok(api_url), Ok(api_key)) => Some(MailConfig {
                api_url,
                api_key,
                from: env::var("MAIL_FROM")
                    .unwrap_or_else(|_| "Plaza <no-reply@plaza.local>".into()),
                client_url: env::var("CLIENT_URL")
                    .unwrap_or_else(|_| "http://localhost:3000".into()),
            }),
            _ => {
                warn!("MAIL_API_URL/MAIL_API_KEY not set; password reset emails disabled");
                None
            }
        };

        Ok(Self {
            host,
            port,
            db_path,
            jwt_secret,
            mail,
        })
    }
}
