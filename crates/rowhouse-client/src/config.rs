//! Client configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use bitflags::bitflags;
use url::Url;

use crate::error::ConfigError;

bitflags! {
    /// Retryable fault classes; requests failing with a cause inside the
    /// configured mask are retried up to `max_retries` times.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FaultCause: u8 {
        /// The server accepted the connection but returned no response, or
        /// reset it mid-exchange.
        const NO_HTTP_RESPONSE = 0b0001;
        /// Establishing the TCP connection timed out.
        const CONNECT_TIMEOUT = 0b0010;
        /// No pooled connection became free within the checkout window.
        const CONNECTION_REQUEST_TIMEOUT = 0b0100;
        /// A server-reported error the caller opted into retrying.
        const SERVER_RETRYABLE = 0b1000;
    }
}

impl Default for FaultCause {
    fn default() -> Self {
        FaultCause::NO_HTTP_RESPONSE
            | FaultCause::CONNECT_TIMEOUT
            | FaultCause::CONNECTION_REQUEST_TIMEOUT
    }
}

/// Order in which idle connections are reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionReuseStrategy {
    /// Most recently returned first; best cache locality on long keep-alive.
    #[default]
    Lifo,
    /// Oldest idle first; spreads load across parallel backends.
    Fifo,
}

/// TLS material, carried as a configured credential bundle.
///
/// Loading and session establishment are delegated to the TLS transport;
/// this client validates the auth-mode exclusivity and hands the bundle
/// through.
#[derive(Debug, Clone, Default)]
pub struct TlsBundle {
    /// Trusted root certificate path.
    pub root_cert: Option<PathBuf>,
    /// Client certificate path for SSL authentication.
    pub client_cert: Option<PathBuf>,
    /// Client key path for SSL authentication.
    pub client_key: Option<PathBuf>,
}

/// How requests authenticate, derived from the configuration at build time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AuthMethod {
    /// Username and password.
    Password {
        username: String,
        password: String,
    },
    /// Bearer access token.
    AccessToken(String),
    /// Identity comes from the client certificate; no Authorization header.
    SslIdentity { username: String },
}

/// Client configuration.
///
/// Built with chained setters; validation happens in
/// [`ClientConfig::validate`], which the client constructor runs before any
/// request is made.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URIs, tried round-robin.
    pub endpoints: Vec<String>,
    /// Username for Basic authentication.
    pub username: String,
    /// Password for Basic authentication.
    pub password: Option<String>,
    /// Bearer credential, exclusive with the password.
    pub access_token: Option<String>,
    /// Use the client certificate as the identity, exclusive with both.
    pub ssl_auth: bool,
    /// Send credentials as HTTP Basic auth; when disabled they travel in
    /// protocol headers instead.
    pub use_basic_auth: bool,
    /// TLS material paths.
    pub tls: TlsBundle,
    /// Default database.
    pub database: Option<String>,
    /// Pool cap per endpoint.
    pub max_connections: usize,
    /// Hard cap on total connection age.
    pub connection_ttl: Option<Duration>,
    /// Cap on idle connection age.
    pub keep_alive: Option<Duration>,
    /// Maximum wait for a free pool slot.
    pub connection_request_timeout: Duration,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Per-read/write cap.
    pub socket_timeout: Duration,
    /// Retry budget for retryable faults.
    pub max_retries: u32,
    /// Which fault classes are retried.
    pub retry_on_failures: FaultCause,
    /// Idle connection reuse order.
    pub connection_reuse_strategy: ConnectionReuseStrategy,
    /// Compress request bodies.
    pub compress_client_request: bool,
    /// Ask the server to compress response bodies.
    pub compress_server_response: bool,
    /// Use HTTP `Content-Encoding` instead of the native framing for
    /// compression.
    pub use_http_compression: bool,
    /// Product name prefixed to the User-Agent.
    pub client_name: Option<String>,
    /// Default custom headers, keyed by canonical name.
    pub http_headers: BTreeMap<String, String>,
    /// Default server settings appended to every query string.
    pub server_settings: BTreeMap<String, String>,
    /// Default roles.
    pub roles: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            username: "default".to_string(),
            password: None,
            access_token: None,
            ssl_auth: false,
            use_basic_auth: true,
            tls: TlsBundle::default(),
            database: None,
            max_connections: 10,
            connection_ttl: None,
            keep_alive: None,
            connection_request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            socket_timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_on_failures: FaultCause::default(),
            connection_reuse_strategy: ConnectionReuseStrategy::default(),
            compress_client_request: false,
            compress_server_response: false,
            use_http_compression: false,
            client_name: None,
            http_headers: BTreeMap::new(),
            server_settings: BTreeMap::new(),
            roles: Vec::new(),
        }
    }
}

impl ClientConfig {
    /// Creates a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an endpoint base URI.
    pub fn add_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoints.push(endpoint.into());
        self
    }

    /// Sets the username.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Sets the password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the bearer access token.
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Authenticates with the client certificate instead of credentials.
    pub fn ssl_auth(mut self, enabled: bool) -> Self {
        self.ssl_auth = enabled;
        self
    }

    /// Toggles HTTP Basic auth; when off, credentials travel in protocol
    /// headers.
    pub fn use_basic_auth(mut self, enabled: bool) -> Self {
        self.use_basic_auth = enabled;
        self
    }

    /// Sets the trusted root certificate path.
    pub fn root_certificate(mut self, path: impl Into<PathBuf>) -> Self {
        self.tls.root_cert = Some(path.into());
        self
    }

    /// Sets the client certificate path.
    pub fn client_certificate(mut self, path: impl Into<PathBuf>) -> Self {
        self.tls.client_cert = Some(path.into());
        self
    }

    /// Sets the client key path.
    pub fn client_key(mut self, path: impl Into<PathBuf>) -> Self {
        self.tls.client_key = Some(path.into());
        self
    }

    /// Sets the default database.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Caps connections per endpoint.
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Caps total connection age.
    pub fn connection_ttl(mut self, ttl: Duration) -> Self {
        self.connection_ttl = Some(ttl);
        self
    }

    /// Caps idle connection age.
    pub fn keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = Some(keep_alive);
        self
    }

    /// Caps the wait for a free pool slot.
    pub fn connection_request_timeout(mut self, timeout: Duration) -> Self {
        self.connection_request_timeout = timeout;
        self
    }

    /// Caps TCP connect time.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Caps each socket read and write.
    pub fn socket_timeout(mut self, timeout: Duration) -> Self {
        self.socket_timeout = timeout;
        self
    }

    /// Sets the retry budget.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Selects which fault classes are retried.
    pub fn retry_on_failures(mut self, mask: FaultCause) -> Self {
        self.retry_on_failures = mask;
        self
    }

    /// Selects the idle-connection reuse order.
    pub fn connection_reuse_strategy(mut self, strategy: ConnectionReuseStrategy) -> Self {
        self.connection_reuse_strategy = strategy;
        self
    }

    /// Compresses request bodies.
    pub fn compress_client_request(mut self, enabled: bool) -> Self {
        self.compress_client_request = enabled;
        self
    }

    /// Asks the server to compress responses.
    pub fn compress_server_response(mut self, enabled: bool) -> Self {
        self.compress_server_response = enabled;
        self
    }

    /// Switches compression to HTTP `Content-Encoding`.
    pub fn use_http_compression(mut self, enabled: bool) -> Self {
        self.use_http_compression = enabled;
        self
    }

    /// Prefixes the User-Agent with a product name.
    pub fn client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = Some(name.into());
        self
    }

    /// Adds a default custom header.
    pub fn http_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.http_headers.insert(canonical_header(&name.into()), value.into());
        self
    }

    /// Adds a default list-valued custom header, joined with commas.
    pub fn http_header_list<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let joined = values.into_iter().map(Into::into).collect::<Vec<_>>().join(",");
        self.http_headers.insert(canonical_header(&name.into()), joined);
        self
    }

    /// Adds a default server setting.
    pub fn server_setting(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.server_settings.insert(name.into(), value.into());
        self
    }

    /// Sets the default roles.
    pub fn roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// Validates the configuration and resolves the endpoints.
    ///
    /// Errors here are the only configuration errors the client raises;
    /// calls after a successful build never fail with [`ConfigError`].
    pub fn validate(&self) -> Result<Vec<Url>, ConfigError> {
        let configured = [
            self.password.is_some(),
            self.access_token.is_some(),
            self.ssl_auth,
        ]
        .iter()
        .filter(|&&set| set)
        .count();
        if configured > 1 {
            return Err(ConfigError::ExclusiveAuth);
        }
        if self.endpoints.is_empty() {
            return Err(ConfigError::NoEndpoints);
        }
        if self.max_connections == 0 {
            return Err(ConfigError::InvalidOption {
                option: "max_connections",
                reason: "must be greater than 0".to_string(),
            });
        }
        let mut urls = Vec::with_capacity(self.endpoints.len());
        for endpoint in &self.endpoints {
            let url = Url::parse(endpoint).map_err(|e| ConfigError::InvalidEndpoint {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            })?;
            if url.scheme() != "http" {
                return Err(ConfigError::UnsupportedScheme {
                    scheme: url.scheme().to_string(),
                });
            }
            if url.host_str().is_none() {
                return Err(ConfigError::InvalidEndpoint {
                    endpoint: endpoint.clone(),
                    reason: "missing host".to_string(),
                });
            }
            urls.push(url);
        }
        Ok(urls)
    }

    pub(crate) fn auth_method(&self) -> AuthMethod {
        if self.ssl_auth {
            AuthMethod::SslIdentity {
                username: self.username.clone(),
            }
        } else if let Some(token) = &self.access_token {
            AuthMethod::AccessToken(token.clone())
        } else {
            AuthMethod::Password {
                username: self.username.clone(),
                password: self.password.clone().unwrap_or_default(),
            }
        }
    }
}

/// Canonicalizes a header name: lowercase for comparison purposes.
pub(crate) fn canonical_header(name: &str) -> String {
    name.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new();
        assert_eq!(config.username, "default");
        assert_eq!(config.max_connections, 10);
        assert!(config.retry_on_failures.contains(FaultCause::NO_HTTP_RESPONSE));
        assert!(!config.retry_on_failures.contains(FaultCause::SERVER_RETRYABLE));
    }

    #[test]
    fn test_exclusive_auth() {
        let config = ClientConfig::new()
            .add_endpoint("http://localhost:8123")
            .password("s3cret")
            .ssl_auth(true)
            .client_certificate("some_user.crt")
            .client_key("some_user.key");
        assert!(matches!(config.validate(), Err(ConfigError::ExclusiveAuth)));

        let config = ClientConfig::new()
            .add_endpoint("http://localhost:8123")
            .password("s3cret")
            .access_token("token");
        assert!(matches!(config.validate(), Err(ConfigError::ExclusiveAuth)));
    }

    #[test]
    fn test_endpoint_validation() {
        assert!(matches!(
            ClientConfig::new().validate(),
            Err(ConfigError::NoEndpoints)
        ));
        assert!(matches!(
            ClientConfig::new().add_endpoint("not a url").validate(),
            Err(ConfigError::InvalidEndpoint { .. })
        ));
        assert!(matches!(
            ClientConfig::new().add_endpoint("https://localhost:8443").validate(),
            Err(ConfigError::UnsupportedScheme { .. })
        ));
        let urls = ClientConfig::new()
            .add_endpoint("http://localhost:8123")
            .validate()
            .unwrap();
        assert_eq!(urls[0].port(), Some(8123));
    }

    #[test]
    fn test_auth_method_resolution() {
        let config = ClientConfig::new().username("u").password("p");
        assert_eq!(
            config.auth_method(),
            AuthMethod::Password {
                username: "u".to_string(),
                password: "p".to_string()
            }
        );

        let config = ClientConfig::new().access_token("tok");
        assert_eq!(config.auth_method(), AuthMethod::AccessToken("tok".to_string()));

        let config = ClientConfig::new().username("cert_user").ssl_auth(true);
        assert_eq!(
            config.auth_method(),
            AuthMethod::SslIdentity {
                username: "cert_user".to_string()
            }
        );
    }

    #[test]
    fn test_header_canonicalization() {
        let config = ClientConfig::new()
            .http_header("X-Custom", "a")
            .http_header_list("X-List", ["x", "y"]);
        assert_eq!(config.http_headers.get("x-custom").map(String::as_str), Some("a"));
        assert_eq!(config.http_headers.get("x-list").map(String::as_str), Some("x,y"));
    }
}
