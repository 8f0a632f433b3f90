//! Webhook transport: POST the rendered notification to the destination URL,
//! with bounded retries inside the transport. The engine above only ever
//! sees the final success/failure.

use chime_domain::config::DispatchConfig;
use chime_domain::Error;
use chime_engine::{Dispatcher, Payload};

pub struct WebhookDispatcher {
    client: reqwest::Client,
    user_agent: String,
    max_attempts: u32,
}

impl WebhookDispatcher {
    pub fn new(config: &DispatchConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(config.timeout_ms))
            .build()
            .unwrap_or_default();
        Self {
            client,
            user_agent: config.user_agent.clone(),
            max_attempts: config.max_attempts.max(1),
        }
    }
}

#[async_trait::async_trait]
impl Dispatcher for WebhookDispatcher {
    async fn deliver(&self, payload: &Payload) -> chime_domain::Result<String> {
        let delivery_id = uuid::Uuid::new_v4();
        let body = serde_json::json!({
            "delivery_id": delivery_id,
            "title": payload.title,
            "message": payload.message,
            "priority": payload.priority,
        });
        // Derive jitter from the delivery id to avoid thundering herd on retries.
        let jitter_seed = delivery_id.as_bytes()[15] as u64;

        let mut last_error = String::new();
        for attempt in 1..=self.max_attempts {
            match self
                .client
                .post(&payload.destination)
                .header("Content-Type", "application/json")
                .header("User-Agent", &self.user_agent)
                .json(&body)
                .send()
                .await
            {
                Ok(resp) if resp.status().is_success() => {
                    tracing::info!(
                        destination = %payload.destination,
                        status = %resp.status(),
                        attempt,
                        "webhook delivered"
                    );
                    return Ok(delivery_id.to_string());
                }
                Ok(resp) if resp.status().is_server_error() && attempt < self.max_attempts => {
                    tracing::warn!(
                        destination = %payload.destination,
                        status = %resp.status(),
                        attempt,
                        "webhook 5xx, will retry"
                    );
                    last_error = format!("server returned {}", resp.status());
                }
                Ok(resp) => {
                    // 4xx or final 5xx — don't retry.
                    return Err(Error::Dispatch(format!(
                        "webhook returned {} for {}",
                        resp.status(),
                        payload.destination
                    )));
                }
                Err(e) if attempt < self.max_attempts => {
                    tracing::warn!(
                        destination = %payload.destination,
                        error = %e,
                        attempt,
                        "webhook failed, will retry"
                    );
                    last_error = e.to_string();
                }
                Err(e) => {
                    return Err(Error::Dispatch(format!(
                        "webhook delivery failed after {attempt} attempt(s): {e}"
                    )));
                }
            }
            // Exponential back-off with jitter: base 1s/2s + 0-255ms jitter.
            let base_ms = (1u64 << (attempt - 1)) * 1000;
            let jitter_ms = (jitter_seed.wrapping_mul(attempt as u64 * 37)) % 256;
            tokio::time::sleep(std::time::Duration::from_millis(base_ms + jitter_ms)).await;
        }
        Err(Error::Dispatch(format!(
            "webhook delivery failed after {} attempts: {last_error}",
            self.max_attempts
        )))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Destination URL validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Validate a webhook destination for safety: must be http(s) and must not
/// target private/internal networks.
///
/// Prevents SSRF by blocking:
/// - Non-http(s) schemes (file://, ftp://, etc.)
/// - Loopback addresses (127.0.0.0/8, ::1)
/// - Private networks (10/8, 172.16/12, 192.168/16)
/// - Link-local addresses (169.254/16 — includes cloud metadata endpoints)
/// - Known metadata hostnames (metadata.google.internal)
/// - Userinfo in URLs (http://evil@internal tricks)
pub fn validate_url(url: &str) -> Result<(), String> {
    use std::net::{Ipv4Addr, Ipv6Addr};

    let lower = url.to_ascii_lowercase();

    // Must use http or https scheme
    let after_scheme = if let Some(r) = lower.strip_prefix("https://") {
        r
    } else if let Some(r) = lower.strip_prefix("http://") {
        r
    } else {
        return Err("URL must use http or https scheme".into());
    };

    // Reject userinfo (prevent http://evil@internal-host tricks)
    let after_userinfo = match after_scheme.split_once('@') {
        Some((_, rest)) => rest,
        None => after_scheme,
    };

    // Extract authority (before first /)
    let authority = after_userinfo.split('/').next().unwrap_or("");

    // Handle IPv6 bracket notation [::1]:port
    let host = if authority.starts_with('[') {
        authority
            .split(']')
            .next()
            .unwrap_or("")
            .trim_start_matches('[')
    } else {
        // Strip port
        authority.split(':').next().unwrap_or("")
    };

    if host.is_empty() {
        return Err("URL has empty host".into());
    }

    // Block known dangerous hostnames
    if host == "localhost"
        || host.ends_with(".localhost")
        || host == "metadata.google.internal"
    {
        return Err(format!("URL must not target internal host: {}", host));
    }

    // Check IPv4
    if let Ok(ip) = host.parse::<Ipv4Addr>() {
        if ip.is_loopback()
            || ip.is_private()
            || ip.is_link_local()
            || ip.is_unspecified()
            || ip.is_broadcast()
        {
            return Err(format!(
                "URL must not target private/internal IP: {}",
                ip
            ));
        }
    }

    // Check IPv6
    if let Ok(ip) = host.parse::<Ipv6Addr>() {
        if ip.is_loopback() || ip.is_unspecified() {
            return Err(format!(
                "URL must not target private/internal IPv6: {}",
                ip
            ));
        }
        // Check IPv4-mapped IPv6 (::ffff:x.x.x.x)
        let segs = ip.segments();
        if segs[..6] == [0, 0, 0, 0, 0, 0xffff] {
            let mapped = Ipv4Addr::new(
                (segs[6] >> 8) as u8,
                segs[6] as u8,
                (segs[7] >> 8) as u8,
                segs[7] as u8,
            );
            if mapped.is_loopback()
                || mapped.is_private()
                || mapped.is_link_local()
                || mapped.is_unspecified()
            {
                return Err(format!(
                    "URL must not target private/internal IP: {}",
                    mapped
                ));
            }
        }
    }

    Ok(())
}
