//! Shared standard stream handles.
//!
//! The handles are opaque to the dispatcher: it only needs something it can
//! write to (or read from) and hands the same handles to every invocation.

use std::fmt;
use std::io::{self, BufRead, BufReader, Cursor, Read, Write};
use std::sync::Arc;

use parking_lot::Mutex;

/// A shared writable stream.
#[derive(Clone)]
pub struct Output {
    sink: Arc<Mutex<Box<dyn Write + Send>>>,
    label: &'static str,
}

impl Output {
    /// Wrap any writer.
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self::labelled(writer, "custom")
    }

    fn labelled(writer: impl Write + Send + 'static, label: &'static str) -> Self {
        Self {
            sink: Arc::new(Mutex::new(Box::new(writer))),
            label,
        }
    }

    /// The process standard output.
    pub fn stdout() -> Self {
        Self::labelled(io::stdout(), "stdout")
    }

    /// The process standard error.
    pub fn stderr() -> Self {
        Self::labelled(io::stderr(), "stderr")
    }

    /// A stream discarding everything written to it.
    pub fn null() -> Self {
        Self::labelled(io::sink(), "null")
    }

    /// A stream capturing everything written to it in memory.
    pub fn buffer() -> (Self, Buffer) {
        let buffer = Buffer::default();
        (Self::labelled(buffer.clone(), "buffer"), buffer)
    }

    /// Write a whole string and flush.
    pub fn write_str(&self, text: &str) -> io::Result<()> {
        let mut sink = self.sink.lock();
        sink.write_all(text.as_bytes())?;
        sink.flush()
    }
}

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.sink.lock().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink.lock().flush()
    }
}

impl fmt::Debug for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Output").field(&self.label).finish()
    }
}

/// In-memory sink behind [`Output::buffer`].
#[derive(Debug, Clone, Default)]
pub struct Buffer(Arc<Mutex<Vec<u8>>>);

impl Buffer {
    /// Everything written so far, decoded lossily.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }

    /// Discard everything written so far.
    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

impl Write for Buffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A shared readable stream.
#[derive(Clone)]
pub struct Input {
    source: Arc<Mutex<Box<dyn BufRead + Send>>>,
    label: &'static str,
}

impl Input {
    /// Wrap any reader.
    pub fn new(reader: impl Read + Send + 'static) -> Self {
        Self::labelled(BufReader::new(reader), "custom")
    }

    fn labelled(reader: impl BufRead + Send + 'static, label: &'static str) -> Self {
        Self {
            source: Arc::new(Mutex::new(Box::new(reader))),
            label,
        }
    }

    /// The process standard input.
    pub fn stdin() -> Self {
        Self::labelled(BufReader::new(io::stdin()), "stdin")
    }

    /// An input that is immediately at end of stream.
    pub fn empty() -> Self {
        Self::labelled(io::empty(), "empty")
    }

    /// An input serving the given text.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::labelled(Cursor::new(text.into().into_bytes()), "text")
    }

    /// Read one line, without its line terminator. `None` at end of stream.
    pub fn read_line(&self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.source.lock().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed);
        Ok(Some(line))
    }

    /// Read everything left in the stream.
    pub fn read_to_string(&self) -> io::Result<String> {
        let mut text = String::new();
        self.source.lock().read_to_string(&mut text)?;
        Ok(text)
    }
}

impl fmt::Debug for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Input").field(&self.label).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_captures_writes_from_clones() {
        let (output, buffer) = Output::buffer();
        let other = output.clone();

        output.write_str("hello ").unwrap();
        other.write_str("world\n").unwrap();

        assert_eq!(buffer.contents(), "hello world\n");
        buffer.clear();
        assert_eq!(buffer.contents(), "");
    }

    #[test]
    fn test_output_write_trait() {
        let (mut output, buffer) = Output::buffer();
        write!(output, "{}-{}", 1, 2).unwrap();
        assert_eq!(buffer.contents(), "1-2");
    }

    #[test]
    fn test_input_lines() {
        let input = Input::from_text("first\r\nsecond\nrest");
        assert_eq!(input.read_line().unwrap().as_deref(), Some("first"));
        assert_eq!(input.clone().read_line().unwrap().as_deref(), Some("second"));
        assert_eq!(input.read_to_string().unwrap(), "rest");
        assert_eq!(input.read_line().unwrap(), None);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(Input::empty().read_line().unwrap(), None);
    }
}
