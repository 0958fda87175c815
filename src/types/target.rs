//! Target parsing and resolution.
//!
//! Turns the comma-separated host list from the command line into
//! resolved IPv4 [`Target`]s. Supported tokens:
//! - IPv4 addresses (192.168.1.1)
//! - IPv4 CIDR blocks (192.168.1.0/24)
//! - Hostnames (example.com), resolved through DNS
//!
//! A token that cannot be turned into an address is reported and skipped;
//! it never aborts resolution of the remaining tokens.

use ipnetwork::{IpNetwork, Ipv4Network};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::str::FromStr;
use tracing::{debug, warn};
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

/// A resolved scan target.
///
/// Created once during resolution and shared read-only by every job
/// scanning it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Target {
    /// The hostname as given, or the literal address.
    name: String,
    /// The resolved IPv4 address.
    addr: Ipv4Addr,
}

impl Target {
    /// Create a target with an explicit display name.
    pub fn new(name: impl Into<String>, addr: Ipv4Addr) -> Self {
        Self {
            name: name.into(),
            addr,
        }
    }

    /// Create a target named after its own address.
    pub fn literal(addr: Ipv4Addr) -> Self {
        Self::new(addr.to_string(), addr)
    }

    /// Display name used to key results.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolved address.
    pub fn addr(&self) -> Ipv4Addr {
        self.addr
    }

    /// Socket address of `port` on this target.
    pub fn socket_addr(&self, port: u16) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.addr, port))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name == self.addr.to_string() {
            write!(f, "{}", self.addr)
        } else {
            write!(f, "{} ({})", self.name, self.addr)
        }
    }
}

/// Error type for target parsing and resolution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
    #[error("invalid target format: {0}")]
    InvalidFormat(String),
    #[error("IPv6 targets are not supported: {0}")]
    Ipv6Unsupported(String),
    #[error("failed to resolve hostname '{0}': {1}")]
    DnsResolutionFailed(String, String),
    #[error("no IPv4 addresses found for hostname '{0}'")]
    NoAddressesFound(String),
    #[error("invalid CIDR notation: {0}")]
    InvalidCidr(String),
    #[error("CIDR range too large: {0} addresses (max: {1})")]
    CidrTooLarge(u64, u64),
}

/// A single parsed target token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSpec {
    /// A literal IPv4 address.
    Single(Ipv4Addr),
    /// An IPv4 network block.
    Cidr(Ipv4Network),
    /// A hostname to be resolved.
    Hostname(String),
}

impl TargetSpec {
    /// Maximum number of hosts allowed in a CIDR block (/16).
    pub const MAX_CIDR_HOSTS: u64 = 65536;

    /// Parse a target token.
    pub fn parse(s: &str) -> Result<Self, TargetError> {
        let s = s.trim();

        if let Ok(ip) = s.parse::<IpAddr>() {
            return match ip {
                IpAddr::V4(v4) => Ok(Self::Single(v4)),
                IpAddr::V6(_) => Err(TargetError::Ipv6Unsupported(s.to_string())),
            };
        }

        if s.contains('/') {
            let network: IpNetwork = s
                .parse()
                .map_err(|_| TargetError::InvalidCidr(s.to_string()))?;

            let IpNetwork::V4(net) = network else {
                return Err(TargetError::Ipv6Unsupported(s.to_string()));
            };

            let host_count = u64::from(net.size());
            if host_count > Self::MAX_CIDR_HOSTS {
                return Err(TargetError::CidrTooLarge(host_count, Self::MAX_CIDR_HOSTS));
            }

            return Ok(Self::Cidr(net));
        }

        if is_valid_hostname(s) {
            return Ok(Self::Hostname(s.to_string()));
        }

        Err(TargetError::InvalidFormat(s.to_string()))
    }

    /// Expand a literal or CIDR token without touching the network.
    ///
    /// Returns `None` for hostnames.
    fn expand_literal(&self) -> Option<Vec<Target>> {
        match self {
            Self::Single(ip) => Some(vec![Target::literal(*ip)]),
            Self::Cidr(net) => {
                let skip_edges = net.prefix() < 31;
                let (network, broadcast) = (net.network(), net.broadcast());
                Some(
                    net.iter()
                        .filter(|ip| !skip_edges || (*ip != network && *ip != broadcast))
                        .map(Target::literal)
                        .collect(),
                )
            }
            Self::Hostname(_) => None,
        }
    }
}

impl FromStr for TargetSpec {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(ip) => write!(f, "{}", ip),
            Self::Cidr(network) => write!(f, "{}", network),
            Self::Hostname(hostname) => write!(f, "{}", hostname),
        }
    }
}

/// Outcome of resolving a host list: the targets that resolved and the
/// errors for the tokens that did not.
#[derive(Debug, Default)]
pub struct Resolution {
    pub targets: Vec<Target>,
    pub errors: Vec<TargetError>,
}

impl Resolution {
    fn push(&mut self, target: Target, seen: &mut HashSet<String>) {
        if seen.insert(target.name.clone()) {
            self.targets.push(target);
        } else {
            debug!(host = %target, "Skipping duplicate target");
        }
    }

    fn fail(&mut self, err: TargetError) {
        warn!("{}", err);
        self.errors.push(err);
    }
}

/// Resolve a comma-separated host list.
///
/// Empty tokens are ignored. The DNS resolver is only built if at least
/// one token is a hostname.
pub async fn resolve_targets(list: &str) -> Resolution {
    resolve_with(list, build_resolver).await
}

async fn resolve_with(list: &str, make_resolver: impl Fn() -> TokioAsyncResolver) -> Resolution {
    let mut resolution = Resolution::default();
    let mut seen = HashSet::new();
    let mut resolver: Option<TokioAsyncResolver> = None;

    for token in list.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let spec = match TargetSpec::parse(token) {
            Ok(spec) => spec,
            Err(e) => {
                resolution.fail(e);
                continue;
            }
        };

        if let Some(targets) = spec.expand_literal() {
            for target in targets {
                resolution.push(target, &mut seen);
            }
            continue;
        }

        let resolver = resolver.get_or_insert_with(&make_resolver);
        match lookup_ipv4(resolver, token).await {
            Ok(addr) => {
                debug!(host = token, %addr, "Resolved hostname");
                resolution.push(Target::new(token, addr), &mut seen);
            }
            Err(e) => resolution.fail(e),
        }
    }

    resolution
}

fn build_resolver() -> TokioAsyncResolver {
    TokioAsyncResolver::tokio_from_system_conf().unwrap_or_else(|e| {
        debug!("System resolver configuration unavailable ({}), using defaults", e);
        TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
    })
}

/// Forward-resolve `host`, keeping the first IPv4 answer.
async fn lookup_ipv4(resolver: &TokioAsyncResolver, host: &str) -> Result<Ipv4Addr, TargetError> {
    let response = resolver
        .lookup_ip(host)
        .await
        .map_err(|e| TargetError::DnsResolutionFailed(host.to_string(), e.to_string()))?;

    first_ipv4(host, response.iter())
}

/// Pick the first IPv4 address out of a DNS answer. IPv6 answers are
/// skipped.
fn first_ipv4(host: &str, ips: impl IntoIterator<Item = IpAddr>) -> Result<Ipv4Addr, TargetError> {
    let mut first = None;
    for ip in ips {
        match ip {
            IpAddr::V4(v4) if first.is_none() => first = Some(v4),
            IpAddr::V4(_) => {}
            IpAddr::V6(v6) => debug!(host, %v6, "Ignoring IPv6 address"),
        }
    }

    first.ok_or_else(|| TargetError::NoAddressesFound(host.to_string()))
}

/// Check if a string is a valid hostname.
fn is_valid_hostname(s: &str) -> bool {
    if s.is_empty() || s.len() > 253 {
        return false;
    }

    let s = s.strip_suffix('.').unwrap_or(s);
    s.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && label.starts_with(|c: char| c.is_ascii_alphanumeric())
            && label.ends_with(|c: char| c.is_ascii_alphanumeric())
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}
