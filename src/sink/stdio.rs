use crate::session::Context;
use crate::sink::Sink;

use std::io::{self, Write};

// Trivial sink.  This dumps the output on stdout.

pub struct StdioSink {}

impl StdioSink {
    pub fn new() -> StdioSink {
        StdioSink {}
    }
}

impl Default for StdioSink {
    fn default() -> StdioSink {
        StdioSink::new()
    }
}

impl Sink for StdioSink {
    fn init(&mut self, ctx: &Context) -> io::Result<()> {
        log::debug!(target: ctx.component(), "stdout sink ready");
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        // Lock per chunk so a unit is never interleaved with other stdout output.
        io::stdout().lock().write_all(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()
    }
}
