// The format contracts.
//
// An input format turns byte streams into records, an output format turns records into bytes.
// Both are long-running loops that are started on their own thread with init() and run until the
// context is canceled; records enter and leave them only through channels.

use crate::record::Record;
use crate::session::Context;

use std::io;
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;

use crossbeam::channel;

// The transform stage between the input and output formats.  Its semantics live outside this
// crate; formats receive it only so that it can be threaded through.
pub trait Middleware: Send + Sync {}

pub type Closer = Box<dyn FnOnce() -> io::Result<()> + Send>;

// One decode source, typically one connection.  `closer` releases the underlying resource.  It is
// called exactly once, possibly from another thread while a read on `reader` is blocked, so for a
// socket it should shut the socket down, which also unblocks the reader.
pub struct InputStream {
    pub id: String,
    pub reader: Box<dyn io::Read + Send>,
    pub closer: Closer,
}

impl InputStream {
    pub fn new(id: &str, reader: Box<dyn io::Read + Send>, closer: Closer) -> InputStream {
        InputStream {
            id: id.to_string(),
            reader,
            closer,
        }
    }

    // For sources that have nothing to release beyond dropping the reader.
    pub fn from_reader<R: io::Read + Send + 'static>(id: &str, reader: R) -> InputStream {
        InputStream::new(id, Box::new(reader), Box::new(|| Ok(())))
    }

    pub fn from_tcp(stream: TcpStream) -> io::Result<InputStream> {
        let id = match stream.peer_addr() {
            Ok(addr) => addr.to_string(),
            Err(_) => "tcp".to_string(),
        };
        let reader = stream.try_clone()?;
        Ok(InputStream::new(
            &id,
            Box::new(reader),
            Box::new(move || match stream.shutdown(Shutdown::Both) {
                // Already gone is as closed as it gets.
                Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
                r => r,
            }),
        ))
    }
}

pub trait InputFormat: Send + Sync {
    // Out(): every record decoded from every stream, in per-stream order.
    fn output(&self) -> channel::Receiver<Arc<dyn Record>>;

    // Init(): serve every stream that arrives on `streams` until the context is canceled.
    fn init(
        &self,
        ctx: Context,
        middleware: Option<Arc<dyn Middleware>>,
        streams: channel::Receiver<InputStream>,
    );
}

pub trait OutputFormat: Send + Sync {
    // In(): where records to be written are sent.
    fn input(&self) -> channel::Sender<Arc<dyn Record>>;

    // Init(): write records to `w` until the context is canceled.
    fn init(&self, ctx: Context, w: &mut dyn io::Write);
}
