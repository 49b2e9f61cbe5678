use crate::session::Context;
use crate::sink::Sink;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

// Sink that appends the output to a file.  The directory holding the file is created by init(),
// and the file is opened there; it is closed when the sink is dropped.

pub struct FileSink {
    filename: PathBuf,
    file: Option<io::BufWriter<fs::File>>,
}

impl FileSink {
    pub fn new<P: AsRef<Path>>(filename: P) -> FileSink {
        FileSink {
            filename: filename.as_ref().to_path_buf(),
            file: None,
        }
    }

    fn file(&mut self) -> io::Result<&mut io::BufWriter<fs::File>> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "file sink not initialized"))
    }
}

impl Sink for FileSink {
    fn init(&mut self, ctx: &Context) -> io::Result<()> {
        if let Some(directory) = self.filename.parent() {
            if !directory.as_os_str().is_empty() {
                fs::DirBuilder::new().recursive(true).create(directory)?;
            }
        }
        let file = fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.filename)?;
        log::debug!(target: ctx.component(), "appending to {}", self.filename.display());
        self.file = Some(io::BufWriter::new(file));
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.file()?.write_all(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file()?.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    #[test]
    fn test_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("2026").join("records.json");
        let (ctx, _canceller, _errors) = Context::new(Registry::new());

        let mut sink = FileSink::new(&path);
        assert_eq!(
            sink.write(b"x").unwrap_err().kind(),
            io::ErrorKind::NotConnected
        );
        sink.init(&ctx).unwrap();
        sink.write(b"{\"a\":1}\n").unwrap();
        sink.write(b"{\"b\":2}\n").unwrap();
        sink.flush().unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "{\"a\":1}\n{\"b\":2}\n"
        );

        // A second run appends.
        drop(sink);
        let mut sink = FileSink::new(&path);
        sink.init(&ctx).unwrap();
        sink.write(b"[]\n").unwrap();
        drop(sink);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "{\"a\":1}\n{\"b\":2}\n[]\n"
        );
    }

    #[test]
    fn test_file_sink_init_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _canceller, _errors) = Context::new(Registry::new());
        // The directory itself is not a file we can append to.
        let mut sink = FileSink::new(dir.path());
        assert!(sink.init(&ctx).is_err());
    }
}
