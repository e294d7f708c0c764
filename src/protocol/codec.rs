// JSON encoding and decoding of requests and responses

use serde_json::{Value, json};

use super::{
    FIELD_DN, FIELD_INTERFACE, FIELD_NEXT_HOP, FIELD_SOURCE_IP, Reply, Response, RouteRequest,
    WireResponse, validate,
};
use crate::error::{AppError, AppResult, DecodeError};

const STATUS_TRUE: &str = "True";
const STATUS_FALSE: &str = "False";

/// Messages on the stream are terminated by a newline.
pub const DELIMITER: u8 = b'\n';

/// Append the delimiter to an encoded message.
pub fn frame(mut message: Vec<u8>) -> Vec<u8> {
    message.push(DELIMITER);
    message
}

/// Strip the delimiter (and a preceding carriage return) from a read line.
pub fn unframe(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(&[DELIMITER]).unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Decode and validate an inbound request.
pub fn decode_request(bytes: &[u8]) -> Result<RouteRequest, DecodeError> {
    match serde_json::from_slice::<Value>(bytes)? {
        Value::Object(message) => validate::validate(message),
        _ => Err(DecodeError::NotAnObject),
    }
}

pub fn encode_response(response: &Response) -> Vec<u8> {
    let value = match response {
        Response::Success => json!({ "Status": STATUS_TRUE }),
        Response::Failure(e) => json!({ "Status": STATUS_FALSE, "Error": e.to_string() }),
    };
    value.to_string().into_bytes()
}

/// Encode a request the way the VPN hook sends it. `NextHop` is always
/// present, `null` when there is none.
pub fn encode_request(request: &RouteRequest) -> Vec<u8> {
    let mut value = json!({
        FIELD_DN: request.dn,
        FIELD_INTERFACE: request.interface,
        FIELD_NEXT_HOP: request.next_hop.map(|ip| ip.to_string()),
    });
    if let Some(source_ip) = request.source_ip {
        value[FIELD_SOURCE_IP] = Value::String(source_ip.to_string());
    }
    value.to_string().into_bytes()
}

/// Decode a reply on the caller side.
pub fn decode_reply(bytes: &[u8]) -> AppResult<Reply> {
    let reply: WireResponse = serde_json::from_slice(bytes)
        .map_err(|e| AppError::Protocol(format!("Incorrect reply received: {}", e)))?;

    match reply.status.as_str() {
        STATUS_TRUE => Ok(Reply::Success),
        STATUS_FALSE => Ok(Reply::Failure(
            reply.error.unwrap_or_else(|| "no reason given".to_string()),
        )),
        other => Err(AppError::Protocol(format!(
            "Incorrect Status received: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RouteError;
    use std::net::Ipv4Addr;

    #[test]
    fn test_decode_request() {
        let request =
            decode_request(br#"{"DN":"centos-gw","Interface":"eth0","NextHop":null}"#).unwrap();
        assert_eq!(request.dn, "centos-gw");
        assert_eq!(request.interface, "eth0");
        assert_eq!(request.next_hop, None);
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(matches!(
            decode_request(b"{\"DN\": \"centos-gw\""),
            Err(DecodeError::Syntax(_))
        ));
        assert!(matches!(decode_request(b""), Err(DecodeError::Syntax(_))));
        assert!(matches!(
            decode_request(br#"["DN","Interface"]"#),
            Err(DecodeError::NotAnObject)
        ));
        assert!(matches!(
            decode_request(br#"{"DN":"a","Interface":"eth0","Extra!":"x"}"#),
            Err(DecodeError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_encode_success() {
        let value: Value = serde_json::from_slice(&encode_response(&Response::Success)).unwrap();
        assert_eq!(value, json!({"Status": "True"}));
    }

    #[test]
    fn test_encode_failures() {
        let value: Value =
            serde_json::from_slice(&encode_response(&Response::Failure(RouteError::UnknownUser)))
                .unwrap();
        assert_eq!(value, json!({"Status": "False", "Error": "No such user known"}));

        let value: Value =
            serde_json::from_slice(&encode_response(&Response::Failure(RouteError::Format)))
                .unwrap();
        assert_eq!(value, json!({"Status": "False", "Error": "Format error"}));
    }

    #[test]
    fn test_encoded_response_is_single_line() {
        let bytes = encode_response(&Response::Failure(RouteError::Process));
        assert!(!bytes.contains(&b'\n'));
    }

    #[test]
    fn test_encode_request() {
        let request = RouteRequest {
            dn: "centos-gw".to_string(),
            interface: "tun0".to_string(),
            next_hop: None,
            source_ip: None,
        };
        let value: Value = serde_json::from_slice(&encode_request(&request)).unwrap();
        assert_eq!(
            value,
            json!({"DN": "centos-gw", "Interface": "tun0", "NextHop": null})
        );

        let request = RouteRequest {
            next_hop: Some(Ipv4Addr::new(10, 8, 0, 1)),
            source_ip: Some(Ipv4Addr::new(10, 8, 0, 6)),
            ..request
        };
        assert_eq!(decode_request(&encode_request(&request)).unwrap(), request);
    }

    #[test]
    fn test_framing() {
        assert_eq!(frame(b"{}".to_vec()), b"{}\n".to_vec());
        assert_eq!(unframe(b"{}\n"), b"{}");
        assert_eq!(unframe(b"{}\r\n"), b"{}");
        assert_eq!(unframe(b"{}"), b"{}");
    }

    #[test]
    fn test_decode_reply() {
        assert_eq!(decode_reply(br#"{"Status":"True"}"#).unwrap(), Reply::Success);
        assert_eq!(
            decode_reply(br#"{"Status":"False","Error":"No routes for that DN"}"#).unwrap(),
            Reply::Failure("No routes for that DN".to_string())
        );
    }

    #[test]
    fn test_decode_reply_rejects_garbage() {
        assert!(matches!(
            decode_reply(br#"{"Error":"x"}"#),
            Err(AppError::Protocol(_))
        ));
        assert!(matches!(
            decode_reply(br#"{"Status":"Maybe"}"#),
            Err(AppError::Protocol(_))
        ));
        assert!(matches!(decode_reply(b"not json"), Err(AppError::Protocol(_))));
    }
}
