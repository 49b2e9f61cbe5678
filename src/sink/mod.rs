pub mod channel;
pub mod file;
pub mod stdio;

use crate::session::Context;

use std::io;

// A Sink is the destination of a pipe.  It receives chunks of serialized output through write(),
// each chunk being one complete unit (one record, or one buffered collection).
//
// init() does whatever setup the sink needs and is given the run's context.  A sink owns its
// resources and releases them when it is dropped, which happens after the pipe has stopped: a
// buffered format only produces its output once the run has been canceled, so the sink must still
// be usable then.
//
// flush() is never called by the sink on its own; the pipe's owner calls it before shutdown.

pub trait Sink: Send {
    fn init(&mut self, ctx: &Context) -> io::Result<()>;

    fn write(&mut self, data: &[u8]) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;
}

// Sinks are named on the command line by a path, with "-" meaning stdout.
pub fn from_path(path: &str) -> Box<dyn Sink> {
    if path == "-" {
        Box::new(stdio::StdioSink::new())
    } else {
        Box::new(file::FileSink::new(path))
    }
}
