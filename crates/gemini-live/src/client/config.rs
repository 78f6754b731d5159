use crate::client::consts::{BASE_URL, DEFAULT_MODEL};
use secrecy::SecretString;

/// Where and as whom a [`crate::Client`] connects.
pub struct Config {
    base_url: String,
    api_key: SecretString,
    model: String,
}

impl Config {
    /// Starts from the public live endpoint and the native-audio model.
    /// The key is mandatory; there is no anonymous access to the endpoint.
    pub fn builder(api_key: SecretString) -> ConfigBuilder {
        ConfigBuilder {
            base_url: BASE_URL.to_string(),
            api_key,
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> &SecretString {
        &self.api_key
    }

    /// Only used for logging; the model the session runs is the one named in
    /// the setup frame.
    pub fn model(&self) -> &str {
        &self.model
    }
}

pub struct ConfigBuilder {
    base_url: String,
    api_key: SecretString,
    model: String,
}

impl ConfigBuilder {
    /// Points the client at another endpoint, e.g. a local test server.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn build(self) -> Config {
        Config {
            base_url: self.base_url,
            api_key: self.api_key,
            model: self.model,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_builder_defaults_and_overrides() {
        let defaults = Config::builder(SecretString::from("k1".to_string())).build();
        assert!(defaults.base_url().starts_with("wss://generativelanguage.googleapis.com/"));
        assert_eq!(defaults.model(), DEFAULT_MODEL);
        assert_eq!(defaults.api_key().expose_secret(), "k1");

        let custom = Config::builder(SecretString::from("k2".to_string()))
            .with_base_url("ws://127.0.0.1:9000/live")
            .with_model("models/other")
            .build();
        assert_eq!(custom.base_url(), "ws://127.0.0.1:9000/live");
        assert_eq!(custom.model(), "models/other");
    }
}
