// Errors produced while moving records through the pipeline.  None of these stop a loop: they are
// either posted on the context's error channel or collected in a Pipe's error list, and the caller
// decides what to do with them.
//
// End of input is not an error here; decoders signal it with Ok(None).

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // One record on one stream could not be decoded.  The stream keeps going unless the failure
    // came from the underlying reader.
    #[error("failed to decode input JSON on stream {stream}: {source}")]
    Decode {
        stream: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to close input stream {stream}: {source}")]
    Close {
        stream: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode to JSON: {0}")]
    Encode(#[source] serde_json::Error),

    // The one final encode of a buffered format.
    #[error("failed to encode buffer to JSON: {0}")]
    EncodeBuffer(#[source] serde_json::Error),

    #[error("failed to copy output to sink: {0}")]
    Copy(#[source] io::Error),

    #[error("sink failure: {0}")]
    Sink(#[source] io::Error),
}

impl Error {
    pub fn is_decode(&self) -> bool {
        matches!(self, Error::Decode { .. })
    }
}
