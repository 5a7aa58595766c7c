use prettytable::{Table, row};
use thiserror::Error;

use crate::edit::{Document, EditError, History};
use crate::script::{self, Command};
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Edit error: {0}")]
    Edit(#[from] EditError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub type ShellResult<T> = Result<T, ShellError>;

const HELP: &str = "\
malloc <ch> <at> <len>        insert uninitialized bytes into one channel
free <ch> <at> <len>          remove bytes from one channel
write <ch> <at> \"text\"        overwrite bytes of one channel
fill <ch> <at> <len> <byte>   overwrite a range of one channel with a byte
read <ch> <at> <len>          hex dump of a range of one channel
insert <at> <len>             insert bytes into every channel (undoable)
delete <at> <len>             remove bytes from every channel (undoable)
cut <at> <len>                remove bytes into the clipboard (undoable)
copy <at> <len>               copy bytes into the clipboard
paste <at>                    insert the clipboard (undoable)
undo | redo                   walk the edit history
flush                         write cached frames back to disk
stats                         show page and frame counters
dispose                       empty the document and clear the history
quit                          leave the shell";

/// Runs shell commands against one document
pub struct Shell {
    document: Document,
    history: History,
    finished: bool,
}

impl Shell {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            history: History::new(),
            finished: false,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Whether a `quit` command has been run
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Parse and run one line; returns the output of each command
    pub fn run_line(&mut self, line: &str) -> ShellResult<Vec<String>> {
        let commands = script::parse(line).map_err(ShellError::Parse)?;

        let mut output = Vec::new();
        for command in commands {
            if let Some(text) = self.execute(command)? {
                output.push(text);
            }
            if self.finished {
                break;
            }
        }
        Ok(output)
    }

    /// Run one command
    pub fn execute(&mut self, command: Command) -> ShellResult<Option<String>> {
        match command {
            Command::Malloc { channel, at, len } => {
                self.document.channel_mut(channel)?.malloc(at, len)?;
                Ok(None)
            }
            Command::Free { channel, at, len } => {
                self.document.channel_mut(channel)?.free(at, len)?;
                Ok(None)
            }
            Command::Write { channel, at, data } => {
                self.document.write(channel, at, data.as_bytes())?;
                Ok(None)
            }
            Command::Fill {
                channel,
                at,
                len,
                byte,
            } => {
                self.document.write(channel, at, &vec![byte; len])?;
                Ok(None)
            }
            Command::Read { channel, at, len } => {
                let data = self.document.read(channel, at, len)?;
                Ok(Some(hex_dump(at, &data)))
            }
            Command::Edit(kind) => {
                self.history.apply(&mut self.document, kind)?;
                Ok(None)
            }
            Command::Undo => {
                let kind = self.history.undo(&mut self.document)?;
                Ok(Some(format!("undid {}", kind)))
            }
            Command::Redo => {
                let kind = self.history.redo(&mut self.document)?;
                Ok(Some(format!("redid {}", kind)))
            }
            Command::Flush => {
                self.document.flush()?;
                Ok(None)
            }
            Command::Stats => Ok(Some(self.stats_table())),
            Command::Dispose => {
                self.history.clear();
                self.document.dispose()?;
                Ok(None)
            }
            Command::Help => Ok(Some(HELP.to_string())),
            Command::Quit => {
                self.finished = true;
                Ok(None)
            }
        }
    }

    fn stats_table(&self) -> String {
        let mut table = Table::new();
        table.add_row(row![
            "channel", "bytes", "pages", "frames", "dirty", "hits", "misses", "evictions",
            "write-backs"
        ]);
        for (channel, stats) in self.document.stats().iter().enumerate() {
            table.add_row(row![
                channel,
                stats.used_size,
                stats.page_count,
                format!("{}/{}", stats.cached_frames, stats.frame_capacity),
                stats.dirty_frames,
                stats.hits,
                stats.misses,
                stats.evictions,
                stats.write_backs
            ]);
        }
        format!(
            "{}clipboard: {} bytes, undo: {}, redo: {}",
            table,
            self.document.clipboard_len(),
            self.history.undo_len(),
            self.history.redo_len()
        )
    }
}

/// Format bytes as hex, 16 per line, prefixed with their offset
pub fn hex_dump(offset: usize, data: &[u8]) -> String {
    let mut lines = Vec::with_capacity(data.len().div_ceil(16));
    for (i, chunk) in data.chunks(16).enumerate() {
        let hex: Vec<String> = chunk.iter().map(|b| format!("{:02x}", b)).collect();
        let ascii: String = chunk
            .iter()
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
            .collect();
        lines.push(format!("{:08x}  {:<47}  {}", offset + i * 16, hex.join(" "), ascii));
    }
    lines.join("\n")
}
