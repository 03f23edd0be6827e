use std::fmt;

use serde::Deserialize;

/// Gateway login material supplied by configuration
///
/// All values are opaque to this crate. `Debug` redacts the secrets so the
/// struct can be logged safely.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub broker_id: String,
    #[serde(alias = "investor_id")]
    pub user_id: String,
    pub password: String,
    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub auth_code: String,
}

impl Credentials {
    pub fn new(broker_id: impl Into<String>, user_id: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            broker_id: broker_id.into(),
            user_id: user_id.into(),
            password: password.into(),
            ..Default::default()
        }
    }

    /// Builder: terminal authentication pair, required by trade sessions
    pub fn with_app(mut self, app_id: impl Into<String>, auth_code: impl Into<String>) -> Self {
        self.app_id = app_id.into();
        self.auth_code = auth_code.into();
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("broker_id", &self.broker_id)
            .field("user_id", &self.user_id)
            .field("password", &"***")
            .field("app_id", &self.app_id)
            .field("auth_code", &"***")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = Credentials::new("9999", "000001", "hunter2").with_app("client_app", "0000000000000000");
        let shown = format!("{creds:?}");
        assert!(shown.contains("000001"));
        assert!(!shown.contains("hunter2"));
        assert!(!shown.contains("0000000000000000"));
    }
}
