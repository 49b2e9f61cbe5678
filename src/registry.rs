// The decoder registry maps kind names to constructors.  On the way out, a record that names its
// kind is written as an Envelope; on the way in, an Envelope whose kind is registered is turned
// back into that record type.  Anything else is passed on as untyped JSON.
//
// The registry is built before the run starts and is read-only afterwards, so it is shared by
// reference without locking.

use crate::envelope::Envelope;
use crate::http;
use crate::jsonx::Decoder;
use crate::record::Record;

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use serde_json::Value;

pub type Constructor = fn(Value) -> serde_json::Result<Arc<dyn Record>>;

pub struct Registry {
    kinds: HashMap<String, Constructor>,
}

impl Default for Registry {
    fn default() -> Registry {
        let mut r = Registry::new();
        r.register(http::KIND_RESPONSE, http::Response::construct);
        r
    }
}

impl Registry {
    // An empty registry: every input value is decoded as untyped JSON.
    pub fn new() -> Registry {
        Registry {
            kinds: HashMap::new(),
        }
    }

    // A later registration of the same kind replaces the earlier one.
    pub fn register(&mut self, kind: &str, constructor: Constructor) {
        if self.is_registered(kind) {
            log::warn!("Replacing decoder for kind {kind}");
        }
        self.kinds.insert(kind.to_string(), constructor);
    }

    pub fn is_registered(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }

    // Read the next record from the decoder.  Ok(None) is the clean end of input.
    pub fn decode_json<R: io::BufRead>(
        &self,
        dec: &mut Decoder<R>,
    ) -> serde_json::Result<Option<Arc<dyn Record>>> {
        match dec.next_value()? {
            None => Ok(None),
            Some(v) => self.from_value(v).map(Some),
        }
    }

    pub fn from_value(&self, v: Value) -> serde_json::Result<Arc<dyn Record>> {
        if let Some((kind, data)) = Envelope::from_value(&v) {
            if let Some(construct) = self.kinds.get(kind) {
                return construct(data.clone());
            }
        }
        Ok(Arc::new(v))
    }
}
