// A Pipe joins one output format to one sink.
//
// init() runs the format's loop on its own thread, with a writer that turns every write into one
// unit on a channel, and copies those units into the sink on the calling thread.  The format writes
// each record (or the whole buffered collection) with a single write, so one unit is one
// serialized record.  The unit channel has no capacity, so a write returns only once the unit has
// been taken for copying; a slow sink holds up the format's loop, and with it every writer.  When
// the format's loop returns the writer is dropped, the unit channel closes, and init() returns.
//
// Sink failures do not stop the copying; they are collected and can be inspected with errors()
// after init() has returned.  Flushing is left to the caller.

use crate::error::Error;
use crate::flow::OutputFormat;
use crate::record::Record;
use crate::session::Context;
use crate::sink::Sink;

use std::io;
use std::sync::Arc;
use std::thread;

use crossbeam::{channel, select};

pub struct Pipe {
    format: Arc<dyn OutputFormat>,
    sink: Box<dyn Sink>,
    errors: Vec<Error>,
}

struct UnitWriter {
    units: channel::Sender<Vec<u8>>,
}

impl io::Write for UnitWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.units
            .send(buf.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Pipe {
    pub fn new(format: Arc<dyn OutputFormat>, sink: Box<dyn Sink>) -> Pipe {
        Pipe {
            format,
            sink,
            errors: vec![],
        }
    }

    // Returns once the format has observed cancellation and everything it wrote has been offered
    // to the sink.
    pub fn init(&mut self, ctx: Context) {
        let ctx = ctx.with_component("pipe");
        log::debug!(target: ctx.component(), "init");

        if let Err(e) = self.sink.init(&ctx) {
            self.errors.push(Error::Sink(e));
        }

        let (units, unit_receiver) = channel::bounded(0);
        let format = Arc::clone(&self.format);
        let format_ctx = ctx.clone();
        let format_thread = thread::spawn(move || {
            let mut w = UnitWriter { units };
            format.init(format_ctx, &mut w);
        });

        for unit in unit_receiver {
            if let Err(e) = self.sink.write(&unit) {
                self.errors.push(Error::Copy(e));
            }
        }

        if format_thread.join().is_err() {
            log::error!(target: ctx.component(), "output format panicked");
        }
        log::debug!(target: ctx.component(), "done, {} errors", self.errors.len());
    }

    // The Write side of the pipe.  Handed out as a separate value so that records can be written
    // from other threads while init() runs.
    pub fn writer(&self) -> PipeWriter {
        PipeWriter {
            input: self.format.input(),
        }
    }

    pub fn flush(&mut self) -> Result<(), Error> {
        self.sink.flush().map_err(Error::Sink)
    }

    pub fn errors(&self) -> &[Error] {
        &self.errors
    }
}

#[derive(Clone)]
pub struct PipeWriter {
    input: channel::Sender<Arc<dyn Record>>,
}

impl PipeWriter {
    // Blocks until the format's loop takes the record.  Must not be used once the run has been
    // canceled, since nothing will take it; use write_until() when that can happen.
    pub fn write(&self, rec: Arc<dyn Record>) {
        let _ = self.input.send(rec);
    }

    // Like write(), but gives up when the run is canceled.  Returns whether the record was taken.
    pub fn write_until(&self, ctx: &Context, rec: Arc<dyn Record>) -> bool {
        select! {
            send(self.input, rec) -> res => res.is_ok(),
            recv(ctx.done()) -> _ => false,
        }
    }
}

// Stand-in for the transform stage: pass every record from `records` to every pipe input, in
// order, until the run is canceled.  A record is offered to the pipes one at a time, so a slow
// pipe slows all of them.
pub fn fan_out(
    ctx: &Context,
    records: channel::Receiver<Arc<dyn Record>>,
    pipes: &[PipeWriter],
) {
    loop {
        let rec = select! {
            recv(records) -> msg => match msg {
                Ok(rec) => rec,
                Err(_) => return,
            },
            recv(ctx.done()) -> _ => return,
        };
        for p in pipes {
            if !p.write_until(ctx, Arc::clone(&rec)) {
                return;
            }
        }
    }
}
