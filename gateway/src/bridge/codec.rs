use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid json: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("message is not a JSON object")]
    NotAnObject,
}

/// One decoded line from the engine's stdout: either a reply correlated to
/// an outstanding request, or a push event to hand to the broadcaster.
#[derive(Debug, Clone)]
pub enum InboundMessage {
    Reply { corr: u64, payload: Value },
    Event { event_type: String, payload: Value },
}

/// Encodes `{"op":<op>,"corr":<corr>, ...params}` as a single NDJSON line
/// (no embedded newline, terminated by the caller before writing to stdin).
pub fn encode_command(op: &str, corr: u64, params: Value) -> Result<String, CodecError> {
    let mut object = match params {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        _ => return Err(CodecError::NotAnObject),
    };
    object.insert("op".to_string(), Value::String(op.to_string()));
    object.insert("corr".to_string(), Value::Number(corr.into()));
    Ok(serde_json::to_string(&Value::Object(object))?)
}

/// Decodes one line from the engine's stdout. A `corr` field means a reply;
/// otherwise the message is routed as an event keyed by its `type` field.
pub fn decode_line(line: &str) -> Result<InboundMessage, CodecError> {
    let value: Value = serde_json::from_str(line)?;
    let Value::Object(ref map) = value else {
        return Err(CodecError::NotAnObject);
    };
    if let Some(corr) = map.get("corr").and_then(Value::as_u64) {
        return Ok(InboundMessage::Reply { corr, payload: value });
    }
    let event_type = map
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("system")
        .to_string();
    Ok(InboundMessage::Event { event_type, payload: value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn encodes_op_and_corr_into_params() {
        let line = encode_command("place", 7, json!({"symbol": "BTCUSDT"})).unwrap();
        let parsed: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["op"], "place");
        assert_eq!(parsed["corr"], 7);
        assert_eq!(parsed["symbol"], "BTCUSDT");
    }

    #[test]
    fn decodes_reply_by_corr_presence() {
        let msg = decode_line(r#"{"corr":5,"status":"ok"}"#).unwrap();
        match msg {
            InboundMessage::Reply { corr, .. } => assert_eq!(corr, 5),
            _ => panic!("expected reply"),
        }
    }

    #[test]
    fn decodes_event_by_type_field() {
        let msg = decode_line(r#"{"type":"order-update","client_order_id":"abc"}"#).unwrap();
        match msg {
            InboundMessage::Event { event_type, .. } => assert_eq!(event_type, "order-update"),
            _ => panic!("expected event"),
        }
    }
}
