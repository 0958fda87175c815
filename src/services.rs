//! Service name guesses based on well-known port numbers.
//!
//! The table is read-only and handed to the formatters through the
//! [`ServiceLookup`] trait, so callers can substitute their own mapping.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Read-only mapping from port number to a likely service name.
pub trait ServiceLookup: Send + Sync {
    /// Look up the probable service name for a port.
    fn service_name(&self, port: u16) -> Option<&str>;

    /// Service name, or `"unknown"` if the port is not recognized.
    fn describe(&self, port: u16) -> &str {
        self.service_name(port).unwrap_or("unknown")
    }
}

const WELL_KNOWN: &[(u16, &str)] = &[
    (1, "tcpmux"),
    (7, "echo"),
    (9, "discard"),
    (13, "daytime"),
    (17, "qotd"),
    (19, "chargen"),
    (20, "ftp-data"),
    (21, "ftp"),
    (22, "ssh"),
    (23, "telnet"),
    (25, "smtp"),
    (37, "time"),
    (42, "nameserver"),
    (43, "whois"),
    (49, "tacacs"),
    (53, "dns"),
    (67, "dhcp-server"),
    (68, "dhcp-client"),
    (69, "tftp"),
    (70, "gopher"),
    (79, "finger"),
    (80, "http"),
    (88, "kerberos"),
    (110, "pop3"),
    (111, "rpcbind"),
    (113, "ident"),
    (119, "nntp"),
    (123, "ntp"),
    (135, "msrpc"),
    (137, "netbios-ns"),
    (138, "netbios-dgm"),
    (139, "netbios-ssn"),
    (143, "imap"),
    (161, "snmp"),
    (162, "snmptrap"),
    (179, "bgp"),
    (389, "ldap"),
    (443, "https"),
    (445, "microsoft-ds"),
    (465, "smtps"),
    (514, "syslog"),
    (548, "afp"),
    (554, "rtsp"),
    (587, "submission"),
    (631, "ipp"),
    (636, "ldaps"),
    (873, "rsync"),
    (993, "imaps"),
    (995, "pop3s"),
    (1025, "nfs-or-iis"),
    (1080, "socks"),
    (1194, "openvpn"),
    (1433, "mssql"),
    (1521, "oracle"),
    (1723, "pptp"),
    (1883, "mqtt"),
    (1900, "ssdp"),
    (2049, "nfs"),
    (2121, "ftp-alt"),
    (2375, "docker"),
    (2376, "docker-ssl"),
    (3000, "grafana"),
    (3128, "squid"),
    (3306, "mysql"),
    (3389, "rdp"),
    (4000, "icq"),
    (4443, "https-alt"),
    (4500, "ipsec-nat-t"),
    (5000, "upnp"),
    (5001, "upnp"),
    (5353, "mdns"),
    (5432, "postgresql"),
    (5500, "vnc-alt"),
    (5672, "amqp"),
    (5800, "vnc-http"),
    (5900, "vnc"),
    (6000, "x11"),
    (6379, "redis"),
    (6443, "kubernetes-api"),
    (8000, "http-alt"),
    (8008, "http-alt"),
    (8080, "http-proxy"),
    (8443, "https-alt"),
    (8888, "http-alt"),
    (9000, "http-alt"),
    (9090, "web-mgmt"),
    (9092, "kafka"),
    (9200, "elasticsearch"),
    (10000, "webmin"),
    (11211, "memcached"),
    (27017, "mongodb"),
    (28017, "mongodb-web"),
    (32400, "plex"),
];

static PORT_SERVICES: LazyLock<HashMap<u16, &'static str>> =
    LazyLock::new(|| WELL_KNOWN.iter().copied().collect());

/// The built-in well-known port table.
#[derive(Debug, Clone, Copy, Default)]
pub struct WellKnownServices;

impl ServiceLookup for WellKnownServices {
    fn service_name(&self, port: u16) -> Option<&str> {
        PORT_SERVICES.get(&port).copied()
    }
}
