use crate::client::config::Config;
use secrecy::ExposeSecret;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;

pub fn build_request(config: &Config) -> tokio_tungstenite::tungstenite::Result<Request> {
    format!(
        "{}?key={}",
        config.base_url(),
        config.api_key().expose_secret()
    )
    .into_client_request()
}

/// Best-effort extraction of a frame's top-level keys, for debug logging.
pub fn frame_kind(text: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(serde_json::Value::Object(map)) => map.keys().cloned().collect::<Vec<_>>().join(","),
        _ => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_request_carries_key() {
        let config = Config::builder(secrecy::SecretString::from("secret-key".to_string()))
            .with_base_url("wss://example.test/live")
            .build();

        let request = build_request(&config).unwrap();

        assert_eq!(request.uri().host(), Some("example.test"));
        assert_eq!(request.uri().query(), Some("key=secret-key"));
    }

    #[test]
    fn test_frame_kind() {
        assert_eq!(frame_kind(r#"{"setupComplete": {}}"#), "setupComplete");
        assert_eq!(frame_kind("not json"), "unknown");
    }
}
