/// Derives a streaming (WebSocket) URL from a configured HTTPS JSON-RPC URL by
/// rewriting `https -> wss`, `http -> ws`, and `/v3 -> /ws/v3` (the common Infura-
/// style path convention). Providers that don't follow this convention should
/// configure a dedicated WebSocket URL out-of-band; this is a best-effort default.
pub fn derive_ws_url(http_url: &str) -> String {
    let scheme_rewritten = if let Some(rest) = http_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = http_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        http_url.to_string()
    };

    scheme_rewritten.replacen("/v3", "/ws/v3", 1)
}
