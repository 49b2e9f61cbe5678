// JSON input and output formats.
//
// INPUT
//
// Input is newline-delimited JSON, one value per line.  A value may not span lines, and a line
// holding more than one value is a single bad record.  Every stream gets two threads: a decode
// thread that reads records and forwards them on the shared output channel, and a supervising
// thread that waits for the decode thread to finish or for the run to be canceled, whichever comes
// first, and then closes the stream.  The stream is therefore closed exactly once.
//
// A line that does not parse, including one that is not valid UTF-8, is reported and skipped.  A
// failing read is reported and ends the stream, since reading again cannot make progress.
//
// Cancellation is checked between records and while a record is waiting to be forwarded, but a
// decode thread blocked inside read() only notices once the read returns.  Closing the stream
// (e.g. shutting down a socket) is what normally makes it return; a source that never returns from
// read() keeps its decode thread alive after the run is over.
//
// OUTPUT
//
// The streaming format writes each record as one line as soon as it arrives.  The buffered format
// keeps everything and writes a single JSON array once the run is canceled, never before.  Both
// wrap records that name their kind in an Envelope, so an element of the buffered array is
// identical to the corresponding streamed line.
//
// Each loop services exactly one of {record, cancellation} per iteration and finishes writing a
// record before it looks at the channels again.

use crate::envelope;
use crate::error::Error;
use crate::flow::{InputFormat, InputStream, Middleware, OutputFormat};
use crate::record::Record;
use crate::session::Context;

use std::io;
use std::sync::Arc;
use std::thread;

use crossbeam::{channel, select};
use serde_json::Value;

// Line reader for newline-delimited JSON.  Lines are taken as raw bytes so that bad UTF-8 is a
// syntax error on that line and not a read failure.
pub struct Decoder<R> {
    reader: R,
    line: Vec<u8>,
}

impl<R: io::BufRead> Decoder<R> {
    pub fn new(reader: R) -> Decoder<R> {
        Decoder {
            reader,
            line: Vec::new(),
        }
    }

    // Ok(None) at end of input.  Blank lines are skipped.  A syntax error consumes its line, so the
    // next call starts on the following one.  Only errors from the reader itself are is_io().
    pub fn next_value(&mut self) -> serde_json::Result<Option<Value>> {
        loop {
            self.line.clear();
            if self
                .reader
                .read_until(b'\n', &mut self.line)
                .map_err(serde_json::Error::io)?
                == 0
            {
                return Ok(None);
            }
            let text = self.line.trim_ascii();
            if !text.is_empty() {
                return serde_json::from_slice(text).map(Some);
            }
        }
    }
}

pub struct JsonInputFormat {
    out_sender: channel::Sender<Arc<dyn Record>>,
    out: channel::Receiver<Arc<dyn Record>>,
}

impl JsonInputFormat {
    pub fn new() -> JsonInputFormat {
        let (out_sender, out) = channel::bounded(0);
        JsonInputFormat { out_sender, out }
    }
}

impl Default for JsonInputFormat {
    fn default() -> JsonInputFormat {
        JsonInputFormat::new()
    }
}

impl InputFormat for JsonInputFormat {
    fn output(&self) -> channel::Receiver<Arc<dyn Record>> {
        self.out.clone()
    }

    fn init(
        &self,
        ctx: Context,
        _middleware: Option<Arc<dyn Middleware>>,
        streams: channel::Receiver<InputStream>,
    ) {
        let ctx = ctx.with_component("json_input_format");
        log::debug!(target: ctx.component(), "init");

        loop {
            select! {
                recv(streams) -> msg => match msg {
                    Ok(stream) => {
                        let ctx = ctx.clone();
                        let out = self.out_sender.clone();
                        thread::spawn(move || {
                            serve_stream(ctx, out, stream);
                        });
                    }
                    Err(_) => {
                        log::debug!(target: ctx.component(), "no more streams");
                        return;
                    }
                },
                recv(ctx.done()) -> _ => {
                    log::debug!(target: ctx.component(), "context canceled");
                    return;
                }
            }
        }
    }
}

fn serve_stream(ctx: Context, out: channel::Sender<Arc<dyn Record>>, stream: InputStream) {
    let InputStream { id, reader, closer } = stream;
    log::debug!(target: ctx.component(), "serving stream {id}");

    // Dropped by the decode thread when it returns.
    let (finished_sender, finished) = channel::bounded::<()>(0);
    {
        let ctx = ctx.clone();
        let id = id.clone();
        thread::spawn(move || {
            let _finished = finished_sender;
            decode_stream(&ctx, &id, io::BufReader::new(reader), &out);
        });
    }

    select! {
        recv(finished) -> _ => {
            log::debug!(target: ctx.component(), "stream {id} finished");
        }
        recv(ctx.done()) -> _ => {
            log::debug!(target: ctx.component(), "context canceled, closing stream {id}");
        }
    }

    if let Err(source) = closer() {
        ctx.report(Error::Close { stream: id, source });
    }
}

fn decode_stream<R: io::BufRead>(
    ctx: &Context,
    id: &str,
    reader: R,
    out: &channel::Sender<Arc<dyn Record>>,
) {
    let mut dec = Decoder::new(reader);
    while !ctx.is_canceled() {
        match ctx.registry().decode_json(&mut dec) {
            Ok(None) => {
                return;
            }
            Ok(Some(rec)) => {
                log::debug!(
                    target: ctx.component(),
                    "received JSON input on {id}: {rec:?} (kind {})",
                    rec.kind().unwrap_or("none")
                );
                select! {
                    send(out, rec) -> res => {
                        if res.is_err() {
                            return;
                        }
                    }
                    recv(ctx.done()) -> _ => {
                        return;
                    }
                }
            }
            Err(source) => {
                let fatal = source.is_io();
                ctx.report(Error::Decode {
                    stream: id.to_string(),
                    source,
                });
                if fatal {
                    return;
                }
            }
        }
    }
}

// Serialize one record as a single line and hand it to the writer in one piece.
fn encode_line(w: &mut dyn io::Write, rec: &dyn Record) -> serde_json::Result<()> {
    let mut buf = serde_json::to_vec(&envelope::encode(rec)?)?;
    buf.push(b'\n');
    w.write_all(&buf).map_err(serde_json::Error::io)
}

fn encode_all(w: &mut dyn io::Write, recs: &[Arc<dyn Record>]) -> serde_json::Result<()> {
    let values = recs
        .iter()
        .map(|r| envelope::encode(r.as_ref()))
        .collect::<serde_json::Result<Vec<Value>>>()?;
    let mut buf = serde_json::to_vec(&values)?;
    buf.push(b'\n');
    w.write_all(&buf).map_err(serde_json::Error::io)
}

pub struct JsonOutputFormat {
    in_sender: channel::Sender<Arc<dyn Record>>,
    input: channel::Receiver<Arc<dyn Record>>,
}

impl JsonOutputFormat {
    pub fn new() -> JsonOutputFormat {
        let (in_sender, input) = channel::bounded(0);
        JsonOutputFormat { in_sender, input }
    }
}

impl Default for JsonOutputFormat {
    fn default() -> JsonOutputFormat {
        JsonOutputFormat::new()
    }
}

impl OutputFormat for JsonOutputFormat {
    fn input(&self) -> channel::Sender<Arc<dyn Record>> {
        self.in_sender.clone()
    }

    fn init(&self, ctx: Context, w: &mut dyn io::Write) {
        let ctx = ctx.with_component("output_json");
        log::debug!(target: ctx.component(), "init");

        loop {
            select! {
                recv(self.input) -> msg => {
                    // We hold a sender ourselves, so the channel cannot disconnect.
                    let Ok(rec) = msg else { return };
                    if let Err(e) = encode_line(w, rec.as_ref()) {
                        ctx.report(Error::Encode(e));
                        continue;
                    }
                    log::debug!(target: ctx.component(), "value encoded");
                }
                recv(ctx.done()) -> _ => {
                    log::debug!(target: ctx.component(), "context canceled");
                    return;
                }
            }
        }
    }
}

pub struct BufferedJsonOutputFormat {
    in_sender: channel::Sender<Arc<dyn Record>>,
    input: channel::Receiver<Arc<dyn Record>>,
}

impl BufferedJsonOutputFormat {
    pub fn new() -> BufferedJsonOutputFormat {
        let (in_sender, input) = channel::bounded(0);
        BufferedJsonOutputFormat { in_sender, input }
    }
}

impl Default for BufferedJsonOutputFormat {
    fn default() -> BufferedJsonOutputFormat {
        BufferedJsonOutputFormat::new()
    }
}

impl OutputFormat for BufferedJsonOutputFormat {
    fn input(&self) -> channel::Sender<Arc<dyn Record>> {
        self.in_sender.clone()
    }

    fn init(&self, ctx: Context, w: &mut dyn io::Write) {
        let ctx = ctx.with_component("buffered_output_json");
        log::debug!(target: ctx.component(), "init");

        let mut buf: Vec<Arc<dyn Record>> = vec![];
        loop {
            select! {
                recv(self.input) -> msg => {
                    let Ok(rec) = msg else { return };
                    buf.push(rec);
                    log::debug!(target: ctx.component(), "value buffered");
                }
                recv(ctx.done()) -> _ => {
                    if let Err(e) = encode_all(w, &buf) {
                        ctx.report(Error::EncodeBuffer(e));
                    }
                    log::debug!(target: ctx.component(), "context canceled, {} values written", buf.len());
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decoder() {
        let input = "{\"a\":1}\n\n  \n[1,2]\n{oops\n\"s\"\n";
        let mut dec = Decoder::new(io::Cursor::new(input));
        assert_eq!(dec.next_value().unwrap(), Some(json!({"a": 1})));
        assert_eq!(dec.next_value().unwrap(), Some(json!([1, 2])));
        let e = dec.next_value().unwrap_err();
        assert!(e.is_syntax() || e.is_eof());
        assert_eq!(dec.next_value().unwrap(), Some(json!("s")));
        assert_eq!(dec.next_value().unwrap(), None);
        assert_eq!(dec.next_value().unwrap(), None);
    }

    #[test]
    fn test_decoder_bad_utf8_is_one_bad_line() {
        let input = b"{\"a\":1}\n{\"x\":\"\xff\xfe\"}\n{\"b\":2}\n".to_vec();
        let mut dec = Decoder::new(io::Cursor::new(input));
        assert_eq!(dec.next_value().unwrap(), Some(json!({"a": 1})));
        let e = dec.next_value().unwrap_err();
        assert!(!e.is_io());
        assert_eq!(dec.next_value().unwrap(), Some(json!({"b": 2})));
        assert_eq!(dec.next_value().unwrap(), None);
    }

    #[test]
    fn test_decoder_read_failure_is_io() {
        let mut dec = Decoder::new(io::BufReader::new(Failing {}));
        assert!(dec.next_value().unwrap_err().is_io());
    }

    struct Failing {}

    impl io::Read for Failing {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("link down"))
        }
    }

    #[test]
    fn test_decoder_last_line_unterminated() {
        let mut dec = Decoder::new(io::Cursor::new("{\"a\":1}\n{\"b\":2}"));
        assert_eq!(dec.next_value().unwrap(), Some(json!({"a": 1})));
        assert_eq!(dec.next_value().unwrap(), Some(json!({"b": 2})));
        assert_eq!(dec.next_value().unwrap(), None);
    }

    #[test]
    fn test_encode_line() {
        let mut out = Vec::new();
        encode_line(&mut out, &json!({"a": 1})).unwrap();
        assert_eq!(out, b"{\"a\":1}\n");
    }

    #[test]
    fn test_encode_all_empty() {
        let mut out = Vec::new();
        encode_all(&mut out, &[]).unwrap();
        assert_eq!(out, b"[]\n");
    }
}
