// An HTTP response as captured from one connection.  Turning raw bytes into this structure is done
// by the capture side; here it is only a record that can be written out and read back in.
//
// Zero-valued fields are left out of the JSON, like the rest of the wire format.  An unknown
// content length is -1 and so is written.

use crate::record::Record;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const KIND_RESPONSE: &str = "http_response";

// Keys are unique and serialize in sorted order.
pub type Header = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Response {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub conn_id: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub transaction_id: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub status_code: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub proto: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub proto_major: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub proto_minor: i64,
    #[serde(skip_serializing_if = "Header::is_empty")]
    pub header: Header,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub body: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub content_length: i64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub transfer_encoding: Vec<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub close: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub uncompressed: bool,
    #[serde(skip_serializing_if = "Header::is_empty")]
    pub trailer: Header,
}

fn is_zero(n: &i64) -> bool {
    *n == 0
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl Response {
    pub fn new(conn_id: &str, transaction_id: i64) -> Response {
        Response {
            conn_id: conn_id.to_string(),
            transaction_id,
            ..Default::default()
        }
    }

    // Registry constructor.
    pub fn construct(data: Value) -> serde_json::Result<Arc<dyn Record>> {
        let r: Response = serde_json::from_value(data)?;
        Ok(Arc::new(r))
    }
}

impl Record for Response {
    fn to_json(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    fn kind(&self) -> Option<&str> {
        Some(KIND_RESPONSE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_zero_fields_are_omitted() {
        let r = Response::new("", 0);
        assert_eq!(serde_json::to_string(&r).unwrap(), "{}");
    }

    #[test]
    fn test_full_response() {
        let mut r = Response::new("10.0.0.1:80-10.0.0.2:5555", 3);
        r.status = "200 OK".to_string();
        r.status_code = 200;
        r.proto = "HTTP/1.1".to_string();
        r.proto_major = 1;
        r.proto_minor = 1;
        r.header
            .insert("Set-Cookie".to_string(), vec!["a=1".to_string(), "b=2".to_string()]);
        r.header
            .insert("Content-Type".to_string(), vec!["text/plain".to_string()]);
        r.body = "hello".to_string();
        r.content_length = -1;
        r.transfer_encoding = vec!["chunked".to_string()];
        r.close = true;
        assert_eq!(
            r.to_json().unwrap(),
            json!({
                "conn_id": "10.0.0.1:80-10.0.0.2:5555",
                "transaction_id": 3,
                "status": "200 OK",
                "status_code": 200,
                "proto": "HTTP/1.1",
                "proto_major": 1,
                "proto_minor": 1,
                "header": {
                    "Content-Type": ["text/plain"],
                    "Set-Cookie": ["a=1", "b=2"]
                },
                "body": "hello",
                "content_length": -1,
                "transfer_encoding": ["chunked"],
                "close": true
            })
        );
        // Header keys come out sorted.
        let s = serde_json::to_string(&r).unwrap();
        assert!(s.find("Content-Type").unwrap() < s.find("Set-Cookie").unwrap());
    }

    #[test]
    fn test_construct_from_partial() {
        let rec = Response::construct(json!({"status_code": 404, "uncompressed": true})).unwrap();
        assert_eq!(rec.kind(), Some(KIND_RESPONSE));
        assert_eq!(
            rec.to_json().unwrap(),
            json!({"status_code": 404, "uncompressed": true})
        );
    }
}
