//! Service names for well-known TCP ports.
//!
//! This is plain data. The engine receives it as an injected lookup
//! function and never consults the table directly.

/// Well-known TCP ports, sorted by port number.
const WELL_KNOWN: &[(u16, &str)] = &[
    (20, "FTP-Data"),
    (21, "FTP"),
    (22, "SSH"),
    (23, "Telnet"),
    (25, "SMTP"),
    (53, "DNS"),
    (69, "TFTP"),
    (80, "HTTP"),
    (88, "Kerberos"),
    (110, "POP3"),
    (111, "RPCBind"),
    (119, "NNTP"),
    (123, "NTP"),
    (135, "MSRPC"),
    (139, "NetBIOS-SSN"),
    (143, "IMAP"),
    (161, "SNMP"),
    (179, "BGP"),
    (389, "LDAP"),
    (443, "HTTPS"),
    (445, "SMB"),
    (465, "SMTPS"),
    (514, "Syslog"),
    (515, "Printer"),
    (548, "AFP"),
    (554, "RTSP"),
    (587, "Submission"),
    (631, "IPP"),
    (636, "LDAPS"),
    (873, "Rsync"),
    (993, "IMAPS"),
    (995, "POP3S"),
    (1080, "SOCKS"),
    (1194, "OpenVPN"),
    (1433, "MSSQL"),
    (1521, "Oracle"),
    (1723, "PPTP"),
    (1883, "MQTT"),
    (2049, "NFS"),
    (2181, "ZooKeeper"),
    (2375, "Docker"),
    (2376, "Docker-TLS"),
    (3000, "HTTP-Dev"),
    (3128, "Squid"),
    (3306, "MySQL"),
    (3389, "RDP"),
    (3690, "SVN"),
    (5000, "UPnP"),
    (5060, "SIP"),
    (5222, "XMPP"),
    (5432, "PostgreSQL"),
    (5672, "AMQP"),
    (5900, "VNC"),
    (5984, "CouchDB"),
    (6379, "Redis"),
    (6443, "Kubernetes-API"),
    (6667, "IRC"),
    (8000, "HTTP-Alt"),
    (8008, "HTTP-Alt"),
    (8080, "HTTP-Proxy"),
    (8443, "HTTPS-Alt"),
    (8888, "HTTP-Alt"),
    (9000, "CSListener"),
    (9042, "Cassandra"),
    (9090, "Prometheus"),
    (9092, "Kafka"),
    (9200, "Elasticsearch"),
    (9418, "Git"),
    (10000, "Webmin"),
    (11211, "Memcached"),
    (27017, "MongoDB"),
];

/// Look up the conventional service name for a TCP port.
pub fn service_name(port: u16) -> Option<&'static str> {
    WELL_KNOWN
        .binary_search_by_key(&port, |&(p, _)| p)
        .ok()
        .map(|i| WELL_KNOWN[i].1)
}

/// Service name for display; "unknown" when the port is not in the table.
pub fn service_label(name: Option<&str>) -> &str {
    name.unwrap_or("unknown")
}
