//! Output sinks. The core only ever hands events to an `OutputBuffer`
//! consumer handle; concrete sinks are an external collaborator, per
//! the core's non-goals. This binary ships two minimal ones -- stdout
//! and a plain file -- enough to drive the replay loop end-to-end
//! without pulling in a message-bus client.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use redo_replay::output::OutputMessage;

pub enum Sink {
    Stdout(io::Stdout),
    File(BufWriter<File>),
}

impl Sink {
    pub fn stdout() -> Sink {
        Sink::Stdout(io::stdout())
    }

    pub fn file(path: PathBuf) -> io::Result<Sink> {
        Ok(Sink::File(BufWriter::new(File::create(path)?)))
    }

    pub fn write_message(&mut self, message: &OutputMessage) -> io::Result<()> {
        match self {
            Sink::Stdout(out) => {
                let mut lock = out.lock();
                lock.write_all(&message.bytes)?;
                lock.write_all(b"\n")
            }
            Sink::File(w) => {
                w.write_all(&message.bytes)?;
                w.write_all(b"\n")?;
                w.flush()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn file_sink_writes_newline_delimited_messages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let mut sink = Sink::file(path.clone()).unwrap();
        sink.write_message(&OutputMessage { bytes: b"{\"a\":1}".to_vec() }).unwrap();
        sink.write_message(&OutputMessage { bytes: b"{\"a\":2}".to_vec() }).unwrap();
        drop(sink);

        let contents = fs::read_to_string(path).unwrap();
        assert_eq!(contents, "{\"a\":1}\n{\"a\":2}\n");
    }
}
