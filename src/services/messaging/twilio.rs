use async_trait::async_trait;

use super::{is_dialable, MessagingProvider};
use crate::config::AppConfig;
use crate::errors::DependencyError;

pub struct TwilioSmsProvider {
    account_sid: String,
    auth_token: String,
    from_number: String,
    client: reqwest::Client,
}

impl TwilioSmsProvider {
    pub fn new(account_sid: String, auth_token: String, from_number: String) -> Self {
        Self {
            account_sid,
            auth_token,
            from_number,
            client: reqwest::Client::new(),
        }
    }

    /// `None` when Twilio credentials are not configured.
    pub fn from_config(config: &AppConfig) -> Option<Self> {
        config.sms_enabled().then(|| {
            Self::new(
                config.twilio_account_sid.clone(),
                config.twilio_auth_token.clone(),
                config.twilio_phone_number.clone(),
            )
        })
    }
}

#[async_trait]
impl MessagingProvider for TwilioSmsProvider {
    async fn send_sms(&self, to: &str, body: &str) -> Result<(), DependencyError> {
        if !is_dialable(to) {
            return Err(DependencyError::Sms(format!("not a dialable number: {to}")));
        }

        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.account_sid
        );

        self.client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("To", to), ("From", self.from_number.as_str()), ("Body", body)])
            .send()
            .await
            .map_err(|e| DependencyError::Sms(format!("failed to reach Twilio: {e}")))?
            .error_for_status()
            .map_err(|e| DependencyError::Sms(format!("Twilio API returned error: {e}")))?;

        Ok(())
    }
}
