//! Allow-list parsing, syntax validation and address matching.
//!
//! The list is stored comma-joined. Entries are literal addresses or
//! `prefix/bits` ranges; only syntax is checked on write.

use std::net::IpAddr;

use ipnet::IpNet;

use crate::errors::MaintenanceError;

/// Separator between network prefix and length.
pub const CIDR_SEPARATOR: char = '/';

/// Range matching capability, chosen when the gate is built.
pub trait RangeMatcher: Send + Sync {
    /// Whether `range` parses as a `prefix/bits` network.
    fn is_valid_range(&self, range: &str) -> bool;

    /// Whether `address` falls within `range`. Unparsable input never matches.
    fn range_contains(&self, range: &str, address: &str) -> bool;
}

/// IPv4/IPv6 matching backed by `ipnet`.
#[derive(Debug, Default, Clone, Copy)]
pub struct IpNetMatcher;

impl RangeMatcher for IpNetMatcher {
    fn is_valid_range(&self, range: &str) -> bool {
        range.contains(CIDR_SEPARATOR) && range.parse::<IpNet>().is_ok()
    }

    fn range_contains(&self, range: &str, address: &str) -> bool {
        match (range.parse::<IpNet>(), address.parse::<IpAddr>()) {
            (Ok(net), Ok(ip)) => net.contains(&ip),
            _ => false,
        }
    }
}

/// Split the stored form into entries; the empty string has no entries.
pub fn parse_address_list(raw: &str) -> Vec<String> {
    if raw.is_empty() {
        return Vec::new();
    }
    raw.split(',').map(str::to_string).collect()
}

/// Accept `""` or `token(,token)*` where tokens are non-empty and contain no whitespace.
pub fn validate_address_list(raw: &str) -> Result<(), MaintenanceError> {
    if raw.is_empty() {
        return Ok(());
    }
    let well_formed = raw
        .split(',')
        .all(|token| !token.is_empty() && !token.chars().any(char::is_whitespace));
    if well_formed {
        Ok(())
    } else {
        Err(MaintenanceError::InvalidInput(raw.to_string()))
    }
}

/// Scan entries in order: exact string match first, then range containment.
/// Entries without a `/` only ever match exactly.
pub fn is_allowed(entries: &[String], address: &str, matcher: &dyn RangeMatcher) -> bool {
    entries.iter().any(|entry| {
        if entry == address {
            return true;
        }
        entry.contains(CIDR_SEPARATOR)
            && matcher.is_valid_range(entry)
            && matcher.range_contains(entry, address)
    })
}
