use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;

/// Resolves a bearer token to the id of the user making the request.
pub trait IdentityProvider: Send + Sync {
    fn authenticate(&self, token: &str) -> Option<String>;
}

/// Tokens of the form `<actorId>.<base64url(HMAC-SHA1(secret, actorId))>`.
pub struct HmacIdentity {
    secret: String,
}

impl HmacIdentity {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn mac(&self, actor_id: &str) -> Option<Hmac<Sha1>> {
        let mut mac = Hmac::<Sha1>::new_from_slice(self.secret.as_bytes()).ok()?;
        mac.update(actor_id.as_bytes());
        Some(mac)
    }

    pub fn issue_token(&self, actor_id: &str) -> Option<String> {
        let signature = self.mac(actor_id)?.finalize().into_bytes();
        let encoded = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(signature);
        Some(format!("{actor_id}.{encoded}"))
    }
}

impl IdentityProvider for HmacIdentity {
    fn authenticate(&self, token: &str) -> Option<String> {
        let (actor_id, signature) = token.rsplit_once('.')?;
        if actor_id.is_empty() {
            return None;
        }

        let signature = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(signature)
            .ok()?;
        self.mac(actor_id)?.verify_slice(&signature).ok()?;

        Some(actor_id.to_string())
    }
}
