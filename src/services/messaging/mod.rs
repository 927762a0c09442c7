pub mod twilio;

use async_trait::async_trait;

use crate::errors::DependencyError;

/// Outbound SMS transport. Fire-and-forget from the booking core's view.
#[async_trait]
pub trait MessagingProvider: Send + Sync {
    async fn send_sms(&self, to: &str, body: &str) -> Result<(), DependencyError>;
}

/// Loose E.164 check: `+` followed by 8 to 15 digits.
pub fn is_dialable(phone: &str) -> bool {
    phone
        .strip_prefix('+')
        .map(|digits| (8..=15).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_dialable() {
        assert!(is_dialable("+15551234567"));
        assert!(!is_dialable("5551234567"));
        assert!(!is_dialable("+1555-123"));
        assert!(!is_dialable("+123"));
    }
}
