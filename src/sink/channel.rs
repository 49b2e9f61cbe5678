use crate::session::Context;
use crate::sink::Sink;

use std::io;

use crossbeam::channel;

// Sink that hands every chunk to an in-process receiver.  The receiver gets exactly the units the
// pipe copied, in order.  Writes fail once the receiver is gone.

pub struct ChannelSink {
    chunks: channel::Sender<Vec<u8>>,
}

impl ChannelSink {
    pub fn new() -> (ChannelSink, channel::Receiver<Vec<u8>>) {
        let (chunks, receiver) = channel::unbounded();
        (ChannelSink { chunks }, receiver)
    }
}

impl Sink for ChannelSink {
    fn init(&mut self, _ctx: &Context) -> io::Result<()> {
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.chunks
            .send(data.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "receiver is gone"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
pub fn test_channel_sink() {
    let (mut sink, chunks) = ChannelSink::new();
    sink.write(b"one").unwrap();
    sink.write(b"two").unwrap();
    assert_eq!(chunks.try_iter().collect::<Vec<_>>(), vec![b"one".to_vec(), b"two".to_vec()]);
    drop(chunks);
    assert_eq!(
        sink.write(b"three").unwrap_err().kind(),
        io::ErrorKind::BrokenPipe
    );
}
