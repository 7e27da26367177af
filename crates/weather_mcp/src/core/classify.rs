//! Private versus public IP address classification.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Outcome of classifying a textual IP address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressClass {
    /// Loopback, RFC 1918, link-local or another non-globally-routable block
    Private(IpAddr),
    /// A routable address worth geolocating
    Public(IpAddr),
    /// Not an IPv4 or IPv6 address
    Invalid,
}

/// IPv4 blocks that are not globally routable, as (network, prefix length)
const PRIVATE_V4: &[(Ipv4Addr, u8)] = &[
    (Ipv4Addr::new(0, 0, 0, 0), 8),
    (Ipv4Addr::new(10, 0, 0, 0), 8),
    (Ipv4Addr::new(100, 64, 0, 0), 10),
    (Ipv4Addr::new(127, 0, 0, 0), 8),
    (Ipv4Addr::new(169, 254, 0, 0), 16),
    (Ipv4Addr::new(172, 16, 0, 0), 12),
    (Ipv4Addr::new(192, 0, 0, 0), 24),
    (Ipv4Addr::new(192, 0, 2, 0), 24),
    (Ipv4Addr::new(192, 168, 0, 0), 16),
    (Ipv4Addr::new(198, 18, 0, 0), 15),
    (Ipv4Addr::new(198, 51, 100, 0), 24),
    (Ipv4Addr::new(203, 0, 113, 0), 24),
    (Ipv4Addr::new(240, 0, 0, 0), 4),
];

/// IPv6 blocks that are not globally routable
const PRIVATE_V6: &[(Ipv6Addr, u8)] = &[
    (Ipv6Addr::UNSPECIFIED, 128),
    (Ipv6Addr::LOCALHOST, 128),
    (Ipv6Addr::new(0x64, 0xff9b, 1, 0, 0, 0, 0, 0), 48),
    (Ipv6Addr::new(0x100, 0, 0, 0, 0, 0, 0, 0), 64),
    (Ipv6Addr::new(0x2001, 0, 0, 0, 0, 0, 0, 0), 23),
    (Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 0), 32),
    (Ipv6Addr::new(0x2002, 0, 0, 0, 0, 0, 0, 0), 16),
    (Ipv6Addr::new(0x3fff, 0, 0, 0, 0, 0, 0, 0), 20),
    (Ipv6Addr::new(0xfc00, 0, 0, 0, 0, 0, 0, 0), 7),
    (Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 0), 10),
    (Ipv6Addr::new(0xfec0, 0, 0, 0, 0, 0, 0, 0), 10),
];

/// Globally routable assignments carved out of the IETF protocol block 2001::/23
const GLOBAL_V6_EXCEPTIONS: &[(Ipv6Addr, u8)] = &[
    (Ipv6Addr::new(0x2001, 0x1, 0, 0, 0, 0, 0, 0x1), 128),
    (Ipv6Addr::new(0x2001, 0x1, 0, 0, 0, 0, 0, 0x2), 128),
    (Ipv6Addr::new(0x2001, 0x3, 0, 0, 0, 0, 0, 0), 32),
    (Ipv6Addr::new(0x2001, 0x4, 0x112, 0, 0, 0, 0, 0), 48),
    (Ipv6Addr::new(0x2001, 0x20, 0, 0, 0, 0, 0, 0), 28),
    (Ipv6Addr::new(0x2001, 0x30, 0, 0, 0, 0, 0, 0), 28),
];

fn in_v4_block(ip: Ipv4Addr, (network, prefix): (Ipv4Addr, u8)) -> bool {
    let mask = u32::MAX.checked_shl(32 - u32::from(prefix)).unwrap_or(0);
    u32::from(ip) & mask == u32::from(network) & mask
}

fn in_v6_block(ip: Ipv6Addr, (network, prefix): (Ipv6Addr, u8)) -> bool {
    let mask = u128::MAX.checked_shl(128 - u32::from(prefix)).unwrap_or(0);
    u128::from(ip) & mask == u128::from(network) & mask
}

fn is_private_v4(ip: Ipv4Addr) -> bool {
    ip.is_broadcast() || PRIVATE_V4.iter().any(|block| in_v4_block(ip, *block))
}

fn is_private_v6(ip: Ipv6Addr) -> bool {
    // IPv4-mapped addresses are judged by the embedded IPv4 address
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_private_v4(v4);
    }
    if GLOBAL_V6_EXCEPTIONS.iter().any(|block| in_v6_block(ip, *block)) {
        return false;
    }
    PRIVATE_V6.iter().any(|block| in_v6_block(ip, *block))
}

/// Classify an already parsed address
pub fn classify_ip(ip: IpAddr) -> AddressClass {
    let private = match ip {
        IpAddr::V4(v4) => is_private_v4(v4),
        IpAddr::V6(v6) => is_private_v6(v6),
    };

    if private {
        AddressClass::Private(ip)
    } else {
        AddressClass::Public(ip)
    }
}

/// Classify a textual IP address. Unparsable input is logged and reported
/// as `Invalid`.
pub fn classify(address: &str) -> AddressClass {
    match address.trim().parse::<IpAddr>() {
        Ok(ip) => classify_ip(ip),
        Err(_) => {
            tracing::warn!("Invalid IP address format: {}", address);
            AddressClass::Invalid
        }
    }
}
