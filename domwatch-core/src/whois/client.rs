use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use super::servers::{get_tld, get_whois_server, IANA_WHOIS_SERVER};
use crate::error::{Result, WatchError};

pub const WHOIS_PORT: u16 = 43;
const READ_TIMEOUT: Duration = Duration::from_secs(3);
const SHORT_READ_GRACE: Duration = Duration::from_millis(500);
const READ_BUFFER_SIZE: usize = 8192;
const MAX_RESPONSE_SIZE: usize = 1024 * 1024; // 1MB
const MAX_REFERRAL_DEPTH: usize = 3;

static REFERRAL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?im)^[ \t]*Registrar WHOIS Server:[ \t]*(\S+)",
        r"(?im)^[ \t]*Whois Server:[ \t]*(\S+)",
        r"(?im)^[ \t]*ReferralServer:[ \t]*whois://(\S+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("Invalid referral regex"))
    .collect()
});

static IANA_REFER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^[ \t]*(?:refer|whois):[ \t]*(\S+)").expect("Invalid IANA regex"));

/// One line-oriented WHOIS session: connect, send the query, read the answer.
#[async_trait]
pub trait WhoisTransport: Send + Sync {
    /// Query `server` for `query`, spending at most `budget` in total.
    async fn query(&self, server: &str, query: &str, budget: Duration) -> Result<String>;
}

/// Raw TCP transport speaking WHOIS on port 43.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    port: u16,
    read_timeout: Duration,
    short_read_grace: Duration,
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl TcpTransport {
    pub fn new() -> Self {
        Self {
            port: WHOIS_PORT,
            read_timeout: READ_TIMEOUT,
            short_read_grace: SHORT_READ_GRACE,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }
}

#[async_trait]
impl WhoisTransport for TcpTransport {
    async fn query(&self, server: &str, query: &str, budget: Duration) -> Result<String> {
        let started = Instant::now();
        let addr = format!("{}:{}", server, self.port);

        // Connecting gets half the budget so a slow handshake still leaves
        // time to read.
        let mut stream = timeout(budget / 2, TcpStream::connect(&addr))
            .await
            .map_err(|_| WatchError::Timeout(format!("Connection to {} timed out", server)))?
            .map_err(|e| WatchError::WhoisConnection {
                server: server.to_string(),
                reason: e.to_string(),
            })?;

        let query_bytes = format!("{}\r\n", query);
        let remaining = budget.saturating_sub(started.elapsed());
        timeout(remaining, stream.write_all(query_bytes.as_bytes()))
            .await
            .map_err(|_| WatchError::Timeout(format!("Write to {} timed out", server)))?
            .map_err(|e| WatchError::WhoisConnection {
                server: server.to_string(),
                reason: format!("failed to send query: {}", e),
            })?;

        let mut response = Vec::new();
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        let mut per_read = self.read_timeout;

        loop {
            let remaining = budget.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                if response.is_empty() {
                    return Err(WatchError::Timeout(format!("Query to {} timed out", server)));
                }
                break;
            }

            match timeout(per_read.min(remaining), stream.read(&mut buf)).await {
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => {
                    response.extend_from_slice(&buf[..n]);
                    if response.len() > MAX_RESPONSE_SIZE {
                        return Err(WatchError::ResponseTooLarge(server.to_string()));
                    }
                    // A short read usually means the server has said everything;
                    // only wait briefly for more.
                    per_read = if n < buf.len() {
                        self.short_read_grace
                    } else {
                        self.read_timeout
                    };
                }
                Ok(Err(e)) => {
                    if !response.is_empty() {
                        debug!(server, error = %e, "Read error after data, keeping response");
                        break;
                    }
                    return Err(WatchError::WhoisConnection {
                        server: server.to_string(),
                        reason: format!("read error: {}", e),
                    });
                }
                Err(_) => {
                    if !response.is_empty() {
                        break;
                    }
                    return Err(WatchError::Timeout(format!("Read from {} timed out", server)));
                }
            }
        }

        if response.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(WatchError::EmptyResponse(server.to_string()));
        }

        Ok(decode_response(response))
    }
}

/// Try UTF-8, fall back to Latin-1.
fn decode_response(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => e.into_bytes().iter().map(|&c| c as char).collect(),
    }
}

/// One server's answer within a lookup chain.
#[derive(Debug, Clone)]
pub struct WhoisExchange {
    pub server: String,
    pub raw: String,
    pub elapsed: Duration,
}

/// The default WHOIS client: registry server for the TLD (discovered through
/// IANA when unknown), then registrar referrals.
#[derive(Clone)]
pub struct WhoisClient {
    transport: Arc<dyn WhoisTransport>,
}

impl Default for WhoisClient {
    fn default() -> Self {
        Self::new(Arc::new(TcpTransport::new()))
    }
}

impl WhoisClient {
    pub fn new(transport: Arc<dyn WhoisTransport>) -> Self {
        Self { transport }
    }

    /// Run the full lookup chain under one deadline.
    ///
    /// Returns every successful exchange, registry first, so callers can fall
    /// back to the registry's answer when the registrar's is unusable.
    #[instrument(skip(self), fields(domain = %domain))]
    pub async fn lookup(&self, domain: &str, budget: Duration) -> Result<Vec<WhoisExchange>> {
        let deadline = Instant::now() + budget;
        timeout(budget, self.lookup_chain(domain, deadline))
            .await
            .map_err(|_| {
                WatchError::Timeout(format!(
                    "WHOIS lookup for {} exceeded {}s",
                    domain,
                    budget.as_secs_f32()
                ))
            })?
    }

    /// Query a single server directly, without referrals.
    pub async fn query_server(
        &self,
        server: &str,
        domain: &str,
        budget: Duration,
    ) -> Result<WhoisExchange> {
        let started = Instant::now();
        let raw = self.transport.query(server, domain, budget).await?;
        Ok(WhoisExchange {
            server: server.to_string(),
            raw,
            elapsed: started.elapsed(),
        })
    }

    async fn lookup_chain(&self, domain: &str, deadline: Instant) -> Result<Vec<WhoisExchange>> {
        let tld = get_tld(domain).ok_or_else(|| WatchError::InvalidDomain(domain.to_string()))?;

        let mut server = match get_whois_server(tld) {
            Some(server) => server.to_string(),
            None => self.discover_registry(tld, deadline).await?,
        };

        let mut exchanges = Vec::new();
        let mut visited = HashSet::new();

        for depth in 0..MAX_REFERRAL_DEPTH {
            if !visited.insert(server.to_lowercase()) {
                warn!(server = %server, "Circular WHOIS referral detected");
                break;
            }

            debug!(whois_server = %server, depth, "Querying WHOIS server");
            let budget = deadline.saturating_duration_since(Instant::now());

            match self.query_server(&server, domain, budget).await {
                Ok(exchange) => {
                    let referral = extract_referral(&exchange.raw);
                    exchanges.push(exchange);
                    match referral {
                        Some(next) if !visited.contains(&next) => {
                            debug!(referral = %next, "Following referral");
                            server = next;
                        }
                        _ => break,
                    }
                }
                Err(e) if exchanges.is_empty() => return Err(e),
                Err(e) => {
                    debug!(server = %server, error = %e, "Referral query failed, keeping registry response");
                    break;
                }
            }
        }

        Ok(exchanges)
    }

    async fn discover_registry(&self, tld: &str, deadline: Instant) -> Result<String> {
        debug!(tld, "Unknown TLD, asking IANA for the registry server");
        let budget = deadline.saturating_duration_since(Instant::now());
        let raw = self.transport.query(IANA_WHOIS_SERVER, tld, budget).await?;

        IANA_REFER_PATTERN
            .captures(&raw)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_lowercase())
            .filter(|s| s.contains('.'))
            .ok_or_else(|| {
                WatchError::UnparseableResponse(format!("IANA has no WHOIS server for .{}", tld))
            })
    }
}

fn extract_referral(response: &str) -> Option<String> {
    for re in REFERRAL_PATTERNS.iter() {
        if let Some(m) = re.captures(response).and_then(|caps| caps.get(1)) {
            let server = m.as_str().trim().to_lowercase();
            let server = server
                .strip_prefix("whois://")
                .or_else(|| server.strip_prefix("http://"))
                .or_else(|| server.strip_prefix("https://"))
                .unwrap_or(&server)
                .trim_end_matches('/')
                .to_string();
            if !server.is_empty() && server.contains('.') {
                return Some(server);
            }
        }
    }

    None
}
