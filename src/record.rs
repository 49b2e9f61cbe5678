// A Record is whatever a decoder produced.  The pipeline never looks inside one; it only asks for
// a JSON rendition when something has to be written, and asks whether the record names its own
// kind.  A record that names its kind is wrapped in an Envelope at the output boundary (see
// envelope.rs).
//
// Records move between threads as Arc<dyn Record> so that one record can be handed to several
// pipes without copying.

use std::fmt;

use serde_json::Value;

pub trait Record: Send + Sync + fmt::Debug {
    fn to_json(&self) -> serde_json::Result<Value>;

    // The kind-naming capability.  Records that return Some are enveloped before serialization.
    fn kind(&self) -> Option<&str> {
        None
    }
}

// Untyped JSON: anything the registry did not recognize.
impl Record for Value {
    fn to_json(&self) -> serde_json::Result<Value> {
        Ok(self.clone())
    }
}

#[test]
pub fn test_value_has_no_kind() {
    let v = serde_json::json!({"a": 1});
    assert!(v.kind().is_none());
    assert_eq!(v.to_json().unwrap(), v);
}
