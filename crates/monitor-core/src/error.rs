use thiserror::Error;

/// All errors produced by the automation monitor.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// The backend could not be reached (connection refused, DNS, timeout).
    #[error("Network failure for {url}: {message}")]
    Network { url: String, message: String },

    /// The backend answered with a non-2xx status code.
    #[error("HTTP {status} from {url}")]
    Http { url: String, status: u16 },

    /// The response body was not valid JSON or did not match the expected shape.
    #[error("Failed to parse response from {url}: {message}")]
    Parse { url: String, message: String },

    /// A mutating call (approve / reject) was rejected or could not be sent.
    #[error("Action {path} failed: {message}")]
    Action { path: String, message: String },

    /// The realtime websocket channel failed.
    #[error("Realtime channel error: {0}")]
    Realtime(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl MonitorError {
    /// `true` for the fetch-category failures that the API client converts to
    /// an absent result.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            MonitorError::Network { .. } | MonitorError::Http { .. } | MonitorError::Parse { .. }
        )
    }
}

/// Convenience alias used throughout the monitor crates.
pub type Result<T> = std::result::Result<T, MonitorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_network() {
        let err = MonitorError::Network {
            url: "http://localhost:8000/api/stats".to_string(),
            message: "connection refused".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Network failure"));
        assert!(msg.contains("/api/stats"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn test_error_display_http() {
        let err = MonitorError::Http {
            url: "http://localhost:8000/api/rules".to_string(),
            status: 503,
        };
        assert_eq!(err.to_string(), "HTTP 503 from http://localhost:8000/api/rules");
    }

    #[test]
    fn test_error_display_parse() {
        let err = MonitorError::Parse {
            url: "http://x/health".to_string(),
            message: "expected value".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to parse response from http://x/health: expected value"
        );
    }

    #[test]
    fn test_error_display_action() {
        let err = MonitorError::Action {
            path: "/api/approve".to_string(),
            message: "HTTP 409".to_string(),
        };
        assert_eq!(err.to_string(), "Action /api/approve failed: HTTP 409");
    }

    #[test]
    fn test_error_display_config() {
        let err = MonitorError::Config("bad api url".to_string());
        assert_eq!(err.to_string(), "Configuration error: bad api url");
    }

    #[test]
    fn test_fetch_failure_classification() {
        assert!(MonitorError::Http {
            url: String::new(),
            status: 500
        }
        .is_fetch_failure());
        assert!(MonitorError::Network {
            url: String::new(),
            message: String::new()
        }
        .is_fetch_failure());
        assert!(!MonitorError::Action {
            path: String::new(),
            message: String::new()
        }
        .is_fetch_failure());
        assert!(!MonitorError::Realtime("closed".to_string()).is_fetch_failure());
        assert!(!MonitorError::Config("bad".to_string()).is_fetch_failure());
    }
}
