use crate::record::Record;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// An Envelope pairs a record's JSON with the kind name the record declared.  Wrapping happens only
// when output is produced; the record itself is never touched.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub kind: String,
    pub data: Value,
}

impl Envelope {
    pub fn new(kind: &str, data: Value) -> Envelope {
        Envelope {
            kind: kind.to_string(),
            data,
        }
    }

    // Recognize an enveloped value on the way in.  The object must have exactly the two envelope
    // fields, otherwise a record that happens to have a "kind" field would be misread.
    pub fn from_value(v: &Value) -> Option<(&str, &Value)> {
        let o = v.as_object()?;
        if o.len() != 2 {
            return None;
        }
        let kind = o.get("kind")?.as_str()?;
        let data = o.get("data")?;
        Some((kind, data))
    }
}

// The JSON value that is actually written for `rec`: enveloped if the record names its kind,
// as-is otherwise.  Dispatch is on the capability only, never on the concrete type.
pub fn encode(rec: &dyn Record) -> serde_json::Result<Value> {
    let data = rec.to_json()?;
    match rec.kind() {
        Some(kind) => serde_json::to_value(Envelope::new(kind, data)),
        None => Ok(data),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug)]
    struct Named(Value);

    impl Record for Named {
        fn to_json(&self) -> serde_json::Result<Value> {
            Ok(self.0.clone())
        }

        fn kind(&self) -> Option<&str> {
            Some("named")
        }
    }

    #[test]
    fn test_named_record_is_wrapped() {
        let r = Named(json!({"x": 1}));
        assert_eq!(
            encode(&r).unwrap(),
            json!({"kind": "named", "data": {"x": 1}})
        );
        // Untouched.
        assert_eq!(r.0, json!({"x": 1}));
    }

    #[test]
    fn test_plain_record_is_not_wrapped() {
        let r = json!({"x": 1});
        assert_eq!(encode(&r).unwrap(), json!({"x": 1}));
    }

    #[test]
    fn test_from_value() {
        let v = json!({"kind": "k", "data": [1, 2]});
        let (kind, data) = Envelope::from_value(&v).unwrap();
        assert_eq!(kind, "k");
        assert_eq!(data, &json!([1, 2]));

        assert!(Envelope::from_value(&json!({"kind": "k"})).is_none());
        assert!(Envelope::from_value(&json!({"kind": 1, "data": 2})).is_none());
        assert!(Envelope::from_value(&json!({"kind": "k", "data": 2, "extra": 3})).is_none());
        assert!(Envelope::from_value(&json!([1])).is_none());
    }
}
