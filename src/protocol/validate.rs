// Structural checks applied to every inbound request before lookup

use serde_json::{Map, Value};
use std::net::Ipv4Addr;

use super::{
    FIELD_DN, FIELD_INTERFACE, FIELD_NEXT_HOP, FIELD_SOURCE_IP, RECOGNIZED_FIELDS, RouteRequest,
};
use crate::error::DecodeError;

/// Linux IFNAMSIZ minus the terminating NUL
const MAX_INTERFACE_LEN: usize = 15;

/// Every key must be alphanumeric and one of the recognized fields.
pub fn check_keys(message: &Map<String, Value>) -> Result<(), DecodeError> {
    for key in message.keys() {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(DecodeError::InvalidKey(key.clone()));
        }
        if !RECOGNIZED_FIELDS.contains(&key.as_str()) {
            return Err(DecodeError::UnknownKey(key.clone()));
        }
    }
    Ok(())
}

/// Validate a decoded JSON object and turn it into a typed request.
pub fn validate(mut message: Map<String, Value>) -> Result<RouteRequest, DecodeError> {
    check_keys(&message)?;

    let dn = required_string(&mut message, FIELD_DN)?;
    let interface = required_string(&mut message, FIELD_INTERFACE)?;
    check_interface(&interface)?;
    let next_hop = optional_ipv4(&mut message, FIELD_NEXT_HOP)?;
    let source_ip = optional_ipv4(&mut message, FIELD_SOURCE_IP)?;

    Ok(RouteRequest {
        dn,
        interface,
        next_hop,
        source_ip,
    })
}

fn required_string(
    message: &mut Map<String, Value>,
    field: &'static str,
) -> Result<String, DecodeError> {
    match message.remove(field) {
        Some(Value::String(s)) => Ok(s),
        None | Some(Value::Null) => Err(DecodeError::MissingField(field)),
        Some(other) => Err(DecodeError::InvalidValue {
            field,
            reason: format!("expected a string, got {}", other),
        }),
    }
}

fn optional_ipv4(
    message: &mut Map<String, Value>,
    field: &'static str,
) -> Result<Option<Ipv4Addr>, DecodeError> {
    match message.remove(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => s.parse().map(Some).map_err(|_| DecodeError::InvalidValue {
            field,
            reason: format!("{:?} is not an IPv4 address", s),
        }),
        Some(other) => Err(DecodeError::InvalidValue {
            field,
            reason: format!("expected a string, got {}", other),
        }),
    }
}

fn check_interface(name: &str) -> Result<(), DecodeError> {
    let invalid = |reason: &str| DecodeError::InvalidValue {
        field: FIELD_INTERFACE,
        reason: reason.to_string(),
    };

    if name.is_empty() || name.len() > MAX_INTERFACE_LEN {
        return Err(invalid("interface name must be 1 to 15 bytes"));
    }
    if name == "." || name == ".." {
        return Err(invalid("reserved interface name"));
    }
    if name.chars().any(|c| c == '/' || c.is_whitespace() || c.is_control()) {
        return Err(invalid("interface name contains forbidden characters"));
    }
    Ok(())
}
