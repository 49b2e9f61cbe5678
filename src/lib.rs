// The output side of a record pipeline: formats that turn byte streams into records and records
// into bytes, sinks that receive the bytes, and pipes that join an output format to a sink.
//
// THREADS AND CHANNELS
//
// Every long-running piece runs on its own thread: one supervising and one decoding thread per input
// stream, one thread per output format loop, and the thread that calls Pipe::init.  They talk only
// through crossbeam channels and all stop on the cancellation carried by the session Context.  See
// session.rs for cancellation and error reporting, jsonx.rs for the loops themselves.

pub mod envelope;
pub mod error;
pub mod flow;
pub mod http;
pub mod jsonx;
pub mod pipe;
pub mod record;
pub mod registry;
pub mod session;
pub mod sink;


pub use error::Error;
pub use record::Record;
pub use session::{Canceller, Context};
