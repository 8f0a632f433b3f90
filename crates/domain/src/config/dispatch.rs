use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Dispatch (delivery transport)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Which delivery transport the gateway wires into the scheduler.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Log every delivery instead of sending it — for local development.
    Log,
    /// POST the rendered notification to the destination URL.
    Webhook,
}

impl Default for DispatchMode {
    fn default() -> Self {
        Self::Log
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default)]
    pub mode: DispatchMode,
    /// Timeout per delivery HTTP request in milliseconds.
    #[serde(default = "d_timeout_ms")]
    pub timeout_ms: u64,
    /// User-Agent header sent on webhook deliveries.
    #[serde(default = "d_user_agent")]
    pub user_agent: String,
    /// Attempts per delivery before the transport reports failure.
    #[serde(default = "d_max_attempts")]
    pub max_attempts: u32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            mode: DispatchMode::default(),
            timeout_ms: d_timeout_ms(),
            user_agent: d_user_agent(),
            max_attempts: d_max_attempts(),
        }
    }
}

fn d_timeout_ms() -> u64 {
    30_000
}

fn d_user_agent() -> String {
    "Chime/1.0".to_string()
}

fn d_max_attempts() -> u32 {
    3
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
