//! Dispatch target configuration
//!
//! Targets are built once at startup from the command line and never change
//! afterwards.

use crate::transform::TransformMode;
use serde::{Deserialize, Serialize};

/// Path appended to the HTTP base URL
pub const BEAT_GENERATOR_PATH: &str = "/api/beat-generator/real-time";

/// A place the tempo is sent to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DispatchTarget {
    /// Authenticated HTTP beat generator endpoint
    Http {
        /// Root URL of the server, e.g. `http://aurora.local:8080`
        base_url: String,
        /// Value of the `x-api-key` header
        api_key: String,
    },
    /// OSC message target
    Message {
        host: String,
        port: u16,
        /// OSC address pattern, e.g. `/gma3/Page1/Fader201`
        path: String,
        #[serde(default)]
        mode: TransformMode,
    },
}

impl DispatchTarget {
    /// Create an HTTP target
    pub fn http(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        DispatchTarget::Http {
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Create an OSC message target
    pub fn message(
        host: impl Into<String>,
        port: u16,
        path: impl Into<String>,
        mode: TransformMode,
    ) -> Self {
        DispatchTarget::Message {
            host: host.into(),
            port,
            path: path.into(),
            mode,
        }
    }

    /// Transform applied before sending. HTTP targets always receive the plain BPM.
    pub fn mode(&self) -> TransformMode {
        match self {
            DispatchTarget::Http { .. } => TransformMode::Plain,
            DispatchTarget::Message { mode, .. } => *mode,
        }
    }

    /// Returns a human-readable name for the target (used in logs)
    pub fn name(&self) -> String {
        match self {
            DispatchTarget::Http { base_url, .. } => format!("HTTP {}", base_url),
            DispatchTarget::Message {
                host,
                port,
                path,
                mode,
            } => format!("OSC {}:{}{} ({})", host, port, path, mode),
        }
    }

    /// Full URL of the beat generator endpoint for HTTP targets
    pub fn endpoint_url(&self) -> Option<String> {
        match self {
            DispatchTarget::Http { base_url, .. } => Some(format!(
                "{}{}",
                base_url.trim_end_matches('/'),
                BEAT_GENERATOR_PATH
            )),
            DispatchTarget::Message { .. } => None,
        }
    }

    /// Validate the target before any socket or client is created
    pub fn validate(&self) -> Result<(), String> {
        match self {
            DispatchTarget::Http { base_url, api_key } => {
                if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
                    return Err(format!(
                        "Server URL '{}' must start with http:// or https://",
                        base_url
                    ));
                }
                if api_key.is_empty() {
                    return Err("API key must not be empty".to_string());
                }
                if api_key.chars().any(|c| c.is_control()) {
                    return Err("API key contains control characters".to_string());
                }
            }
            DispatchTarget::Message { host, port, path, .. } => {
                if host.is_empty() {
                    return Err("OSC host must not be empty".to_string());
                }
                if *port == 0 {
                    return Err("OSC port must be non-zero".to_string());
                }
                if !path.starts_with('/') {
                    return Err(format!("OSC path '{}' must start with '/'", path));
                }
                if path.chars().any(|c| c.is_whitespace() || c.is_control()) {
                    return Err(format!("OSC path '{}' contains whitespace", path));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url_strips_trailing_slash() {
        let target = DispatchTarget::http("http://aurora.local:8080/", "key");
        assert_eq!(
            target.endpoint_url().as_deref(),
            Some("http://aurora.local:8080/api/beat-generator/real-time")
        );
    }

    #[test]
    fn test_http_mode_is_plain() {
        let target = DispatchTarget::http("http://localhost", "key");
        assert_eq!(target.mode(), TransformMode::Plain);

        let target = DispatchTarget::message("10.0.0.5", 8000, "/bpm", TransformMode::Half);
        assert_eq!(target.mode(), TransformMode::Half);
    }

    #[test]
    fn test_validation() {
        assert!(DispatchTarget::http("http://localhost", "key").validate().is_ok());
        assert!(DispatchTarget::http("localhost", "key").validate().is_err());
        assert!(DispatchTarget::http("https://localhost", "").validate().is_err());

        assert!(DispatchTarget::message("127.0.0.1", 9000, "/bpm", TransformMode::Plain)
            .validate()
            .is_ok());
        assert!(DispatchTarget::message("127.0.0.1", 0, "/bpm", TransformMode::Plain)
            .validate()
            .is_err());
        assert!(DispatchTarget::message("127.0.0.1", 9000, "bpm", TransformMode::Plain)
            .validate()
            .is_err());
        assert!(DispatchTarget::message("", 9000, "/bpm", TransformMode::Plain)
            .validate()
            .is_err());
    }

    #[test]
    fn test_message_mode_defaults_to_plain_when_deserialized() {
        let json = r#"{"kind":"message","host":"10.0.0.2","port":9000,"path":"/wled/bpm"}"#;
        let target: DispatchTarget = serde_json::from_str(json).unwrap();
        assert_eq!(target.mode(), TransformMode::Plain);
    }

    #[test]
    fn test_names() {
        let target = DispatchTarget::message("10.0.0.2", 9000, "/bpm", TransformMode::Gma3);
        assert_eq!(target.name(), "OSC 10.0.0.2:9000/bpm (GMA3)");
    }
}
