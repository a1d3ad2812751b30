//! Request engine: endpoint rotation, header/parameter composition and the
//! retry loop.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use tracing::{debug, warn};
use url::Url;

use crate::config::{AuthMethod, ClientConfig, FaultCause};
use crate::error::{ClientError, ClientResult, TransportError};
use crate::settings::Settings;

use super::pool::{Pool, PoolOptions};
use super::response::HttpResponse;

/// One request to send: the SQL travels either as the `query` parameter
/// (inserts, with the data as the body) or as the body itself.
#[derive(Debug, Default)]
pub(crate) struct RequestSpec {
    /// SQL sent as the `query` parameter.
    pub query_param: Option<String>,
    /// Request body: SQL text, or encoded rows for inserts.
    pub body: Bytes,
    /// Response format requested via `default_format`.
    pub default_format: Option<&'static str>,
}

/// Engine counters.
#[derive(Debug, Default)]
pub(crate) struct EngineStats {
    pub requests: AtomicU64,
    pub retries: AtomicU64,
}

/// Sends requests over pooled connections, retrying retryable faults.
#[derive(Debug)]
pub(crate) struct RequestEngine {
    config: Arc<ClientConfig>,
    endpoints: Vec<Url>,
    next_endpoint: AtomicUsize,
    pools: DashMap<String, Arc<Pool>>,
    stats: EngineStats,
}

impl RequestEngine {
    pub fn new(config: Arc<ClientConfig>, endpoints: Vec<Url>) -> RequestEngine {
        RequestEngine {
            config,
            endpoints,
            next_endpoint: AtomicUsize::new(0),
            pools: DashMap::new(),
            stats: EngineStats::default(),
        }
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Sends the request, consuming retry budget on faults in the
    /// configured mask. Server-reported errors surface as
    /// [`ClientError::Server`] / [`ClientError::Auth`].
    pub async fn execute(
        &self,
        spec: &RequestSpec,
        settings: Option<&Settings>,
    ) -> ClientResult<HttpResponse> {
        self.stats.requests.fetch_add(1, Ordering::Relaxed);
        let max_retries = self.config.max_retries;
        let mut attempt = 0u32;
        loop {
            match self.try_send(spec, settings).await {
                Ok(response) => return Ok(response),
                Err(error) => {
                    let retryable = fault_cause(&error)
                        .is_some_and(|cause| self.config.retry_on_failures.contains(cause));
                    if !retryable || attempt >= max_retries {
                        return Err(error);
                    }
                    attempt += 1;
                    self.stats.retries.fetch_add(1, Ordering::Relaxed);
                    warn!(attempt, error = %error, "retrying request");
                }
            }
        }
    }

    async fn try_send(
        &self,
        spec: &RequestSpec,
        settings: Option<&Settings>,
    ) -> ClientResult<HttpResponse> {
        let endpoint = self.pick_endpoint();
        let pool = self.pool_for(endpoint);
        let mut conn = pool.acquire().await.map_err(ClientError::Transport)?;

        let target = self.request_target(endpoint, spec, settings);
        let head = self.request_head(endpoint, &target, spec.body.len(), settings);
        debug!(endpoint = %endpoint, "sending request");

        conn.send_request(head.as_bytes(), &spec.body, self.config.socket_timeout)
            .await
            .map_err(ClientError::Transport)?;
        let response_head = conn.read_head(self.config.socket_timeout).await?;
        let response = HttpResponse::new(conn, response_head, self.config.socket_timeout)?;

        if response.exception_code().is_some() || !(200..300).contains(&response.status()) {
            return Err(response.into_server_error().await);
        }
        Ok(response)
    }

    fn pick_endpoint(&self) -> &Url {
        let index = self.next_endpoint.fetch_add(1, Ordering::Relaxed);
        &self.endpoints[index % self.endpoints.len()]
    }

    fn pool_for(&self, endpoint: &Url) -> Arc<Pool> {
        let host = endpoint.host_str().unwrap_or_default().to_string();
        let port = endpoint.port().unwrap_or(8123);
        let key = format!("{}:{}", host, port);
        Arc::clone(
            self.pools
                .entry(key)
                .or_insert_with(|| {
                    Pool::new(
                        host,
                        port,
                        PoolOptions {
                            max_connections: self.config.max_connections,
                            connection_request_timeout: self.config.connection_request_timeout,
                            connect_timeout: self.config.connect_timeout,
                            connection_ttl: self.config.connection_ttl,
                            keep_alive: self.config.keep_alive,
                            strategy: self.config.connection_reuse_strategy,
                        },
                    )
                })
                .value(),
        )
    }

    /// Socket counters summed across all pools: (opened, closed, reused).
    pub fn connection_counts(&self) -> (u64, u64, u64) {
        let mut opened = 0;
        let mut closed = 0;
        let mut reused = 0;
        for entry in self.pools.iter() {
            let stats = entry.value().stats();
            opened += stats.opened.load(Ordering::Relaxed);
            closed += stats.closed.load(Ordering::Relaxed);
            reused += stats.reused.load(Ordering::Relaxed);
        }
        (opened, closed, reused)
    }

    /// Composes the request target: path plus the query string assembled
    /// from identifiers, merged server settings (per-call wins), roles,
    /// compression hints, format and the query text.
    fn request_target(
        &self,
        endpoint: &Url,
        spec: &RequestSpec,
        settings: Option<&Settings>,
    ) -> String {
        let mut params = url::form_urlencoded::Serializer::new(String::new());

        if let Some(query_id) = settings.and_then(|s| s.query_id.as_deref()) {
            params.append_pair("query_id", query_id);
        }
        if let Some(session_id) = settings.and_then(|s| s.session_id.as_deref()) {
            params.append_pair("session_id", session_id);
        }
        let database = settings
            .and_then(|s| s.database.as_deref())
            .or(self.config.database.as_deref());
        if let Some(database) = database {
            params.append_pair("database", database);
        }

        // Flag-derived compression hints first so an explicit server
        // setting can override them.
        let mut merged: BTreeMap<String, String> = BTreeMap::new();
        if !self.config.use_http_compression {
            if self.config.compress_server_response {
                merged.insert("compress".to_string(), "1".to_string());
            }
            if self.config.compress_client_request {
                merged.insert("decompress".to_string(), "1".to_string());
            }
        } else if self.config.compress_server_response {
            merged.insert("enable_http_compression".to_string(), "1".to_string());
        }
        for (name, value) in &self.config.server_settings {
            merged.insert(name.clone(), value.clone());
        }
        if let Some(settings) = settings {
            for (name, value) in &settings.server_settings {
                merged.insert(name.clone(), value.clone());
            }
        }
        for (name, value) in &merged {
            params.append_pair(name, value);
        }

        let roles = settings
            .and_then(|s| s.roles.as_deref())
            .unwrap_or(&self.config.roles);
        if !roles.is_empty() {
            params.append_pair("roles", &roles.join(","));
        }

        if let Some(format) = spec.default_format {
            params.append_pair("default_format", format);
        }
        if let Some(query) = &spec.query_param {
            params.append_pair("query", query);
        }

        let query_string = params.finish();
        if query_string.is_empty() {
            "/".to_string()
        } else {
            format!("/?{}", query_string)
        }
    }

    /// Builds the request head: request line, host, user agent, auth and
    /// custom headers (per-call wins by canonical name), content length.
    fn request_head(
        &self,
        endpoint: &Url,
        target: &str,
        body_len: usize,
        settings: Option<&Settings>,
    ) -> String {
        let host = endpoint.host_str().unwrap_or_default();
        let port = endpoint.port().unwrap_or(8123);

        let mut headers: BTreeMap<String, String> = self.config.http_headers.clone();
        if let Some(settings) = settings {
            for (name, value) in &settings.http_headers {
                headers.insert(name.clone(), value.clone());
            }
        }

        let mut head = String::with_capacity(256);
        head.push_str(&format!("POST {} HTTP/1.1\r\n", target));
        head.push_str(&format!("Host: {}:{}\r\n", host, port));
        head.push_str(&format!("User-Agent: {}\r\n", self.user_agent()));
        head.push_str("Connection: keep-alive\r\n");

        // A caller-supplied Authorization header always wins.
        if !headers.contains_key("authorization") {
            match self.config.auth_method() {
                AuthMethod::Password { username, password } => {
                    if self.config.use_basic_auth {
                        let credentials = base64_encode(format!("{}:{}", username, password).as_bytes());
                        head.push_str(&format!("Authorization: Basic {}\r\n", credentials));
                    } else {
                        // Credentials travel in protocol headers instead.
                        head.push_str(&format!("X-ClickHouse-User: {}\r\n", username));
                        head.push_str(&format!("X-ClickHouse-Key: {}\r\n", password));
                    }
                }
                AuthMethod::AccessToken(token) => {
                    head.push_str(&format!("Authorization: Bearer {}\r\n", token));
                }
                // Identity comes from the client certificate; only the user
                // name travels.
                AuthMethod::SslIdentity { username } => {
                    head.push_str(&format!("X-ClickHouse-User: {}\r\n", username));
                }
            }
        }

        for (name, value) in &headers {
            head.push_str(&format!("{}: {}\r\n", header_case(name), value));
        }
        head.push_str(&format!("Content-Length: {}\r\n", body_len));
        head.push_str("\r\n");
        head
    }

    fn user_agent(&self) -> String {
        let prefix = self
            .config
            .client_name
            .as_deref()
            .map(|name| format!("{} ", name))
            .unwrap_or_default();
        format!(
            "{}rowhouse-client/{} ({}) tokio/1",
            prefix,
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS
        )
    }
}

/// Maps an error to its retryable fault class, if it has one.
fn fault_cause(error: &ClientError) -> Option<FaultCause> {
    match error {
        ClientError::Transport(TransportError::NoResponse)
        | ClientError::Transport(TransportError::ConnectionReset) => {
            Some(FaultCause::NO_HTTP_RESPONSE)
        }
        ClientError::Transport(TransportError::ConnectTimeout(_)) => {
            Some(FaultCause::CONNECT_TIMEOUT)
        }
        ClientError::Transport(TransportError::ConnectionRequestTimeout(_)) => {
            Some(FaultCause::CONNECTION_REQUEST_TIMEOUT)
        }
        ClientError::Server { .. } => Some(FaultCause::SERVER_RETRYABLE),
        _ => None,
    }
}

/// Restores conventional Header-Case from the canonical lowercase form.
fn header_case(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Standard base64, hand-rolled to keep the dependency set small.
pub(crate) fn base64_encode(data: &[u8]) -> String {
    const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut out = String::with_capacity(data.len().div_ceil(3) * 4);
    for block in data.chunks(3) {
        let b0 = block[0] as u32;
        let b1 = block.get(1).copied().unwrap_or(0) as u32;
        let b2 = block.get(2).copied().unwrap_or(0) as u32;
        let word = (b0 << 16) | (b1 << 8) | b2;
        out.push(ALPHABET[(word >> 18) as usize & 0x3F] as char);
        out.push(ALPHABET[(word >> 12) as usize & 0x3F] as char);
        out.push(if block.len() > 1 {
            ALPHABET[(word >> 6) as usize & 0x3F] as char
        } else {
            '='
        });
        out.push(if block.len() > 2 {
            ALPHABET[word as usize & 0x3F] as char
        } else {
            '='
        });
    }
    out
}
