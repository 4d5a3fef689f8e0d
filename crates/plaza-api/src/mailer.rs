//! Transactional email over an HTTP mail relay.
//!
//! The relay speaks a simple JSON API: `POST {api_url}/messages` with a bearer
//! key and `{from, to, subject, html}`. When the relay is not configured every
//! send fails, which callers surface or swallow depending on the path.

use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use serde_json::json;
use tracing::info;

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_url: String,
    pub api_key: String,
    pub from: String,
    /// Base URL of the SPA; reset links point here.
    pub client_url: String,
}

pub struct Mailer {
    http: Client,
    config: Option<MailConfig>,
}

impl Mailer {
    pub fn new(config: Option<MailConfig>) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    /// Reset-request email carrying the one-time link. The plaintext token is
    /// embedded as a path segment and exists nowhere else.
    pub async fn send_password_reset(
        &self,
        to: &str,
        first_name: &str,
        reset_token: &str,
    ) -> Result<()> {
        let config = self.transport()?;
        let reset_url = format!(
            "{}/reset-password/{}",
            config.client_url.trim_end_matches('/'),
            reset_token
        );
        let html = reset_request_html(first_name, &reset_url);

        self.deliver(config, to, "Password Reset Request - Plaza", &html)
            .await
    }

    /// Courtesy confirmation after a successful reset. Callers treat failure
    /// as non-fatal.
    pub async fn send_password_reset_confirmation(&self, to: &str, first_name: &str) -> Result<()> {
        let config = self.transport()?;
        let html = reset_confirmation_html(first_name);

        self.deliver(config, to, "Password Successfully Reset - Plaza", &html)
            .await
    }

    fn transport(&self) -> Result<&MailConfig> {
        self.config
            .as_ref()
            .ok_or_else(|| anyhow!("mail transport not configured"))
    }

    async fn deliver(&self, config: &MailConfig, to: &str, subject: &str, html: &str) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/messages", config.api_url.trim_end_matches('/')))
            .bearer_auth(&config.api_key)
            .json(&json!({
                "from": config.from,
                "to": to,
                "subject": subject,
                "html": html,
            }))
            .send()
            .await
            .context("mail relay unreachable")?;

        if !response.status().is_success() {
            return Err(anyhow!("mail relay returned {}", response.status()));
        }

        info!("Sent '{}' email to {}", subject, to);
        Ok(())
    }
}

fn reset_request_html(first_name: &str, reset_url: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <style>
    body {{ font-family: sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px; }}
    .header {{ background: #5563c1; color: white; padding: 30px; text-align: center; border-radius: 10px 10px 0 0; }}
    .content {{ background: #f9f9f9; padding: 30px; border-radius: 0 0 10px 10px; }}
    .button {{ display: inline-block; background: #5563c1; color: white !important; padding: 15px 30px; text-decoration: none; border-radius: 5px; font-weight: bold; margin: 20px 0; }}
    .warning {{ background: #fff3cd; border: 1px solid #ffeaa7; color: #856404; padding: 15px; border-radius: 5px; margin: 20px 0; }}
  </style>
</head>
<body>
  <div class="header"><h1>Password Reset Request</h1></div>
  <div class="content">
    <h2>Hello {first_name}!</h2>
    <p>We received a request to reset the password for your Plaza account.</p>
    <div style="text-align: center;"><a href="{reset_url}" class="button">Reset Your Password</a></div>
    <div class="warning">
      <strong>Important:</strong> this link expires in 10 minutes. If you didn't
      request a reset, ignore this email and your password stays unchanged.
    </div>
    <p>If the button doesn't work, copy and paste this link into your browser:</p>
    <p style="word-break: break-all;">{reset_url}</p>
  </div>
</body>
</html>"#
    )
}

fn reset_confirmation_html(first_name: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <style>
    body {{ font-family: sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px; }}
    .header {{ background: #28a745; color: white; padding: 30px; text-align: center; border-radius: 10px 10px 0 0; }}
    .content {{ background: #f9f9f9; padding: 30px; border-radius: 0 0 10px 10px; }}
  </style>
</head>
<body>
  <div class="header"><h1>Password Successfully Reset</h1></div>
  <div class="content">
    <h2>Hello {first_name}!</h2>
    <p>Your Plaza password has been reset. You can now log in with your new password.</p>
    <p>If you didn't make this change, contact support immediately.</p>
  </div>
</body>
</html>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_email_embeds_link_and_expiry_notice() {
        let html = reset_request_html("Alice", "https://app.example.com/reset-password/abc123");
        assert!(html.contains("https://app.example.com/reset-password/abc123"));
        assert!(html.contains("expires in 10 minutes"));
        assert!(html.contains("Hello Alice!"));
    }

    #[tokio::test]
    async fn unconfigured_transport_fails_sends() {
        let mailer = Mailer::new(None);
        assert!(
            mailer
                .send_password_reset("a@example.com", "Alice", "token")
                .await
                .is_err()
        );
        assert!(
            mailer
                .send_password_reset_confirmation("a@example.com", "Alice")
                .await
                .is_err()
        );
    }
}
