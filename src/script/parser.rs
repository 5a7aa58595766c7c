use chumsky::{prelude::*, regex::regex};

use crate::edit::EditKind;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // MALLOC channel at len
    Malloc { channel: usize, at: usize, len: usize },

    // FREE channel at len
    Free { channel: usize, at: usize, len: usize },

    // WRITE channel at "text"
    Write { channel: usize, at: usize, data: String },

    // FILL channel at len byte
    Fill { channel: usize, at: usize, len: usize, byte: u8 },

    // READ channel at len
    Read { channel: usize, at: usize, len: usize },

    // INSERT / DELETE / CUT / COPY at len, PASTE at
    Edit(EditKind),

    Undo,
    Redo,
    Flush,
    Stats,
    Dispose,
    Help,
    Quit,
}

fn number<'a>() -> impl Parser<'a, &'a str, usize, extra::Err<Rich<'a, char>>> {
    text::int(10)
        .try_map(|s: &str, span| {
            s.parse::<usize>()
                .map_err(|e| Rich::custom(span, format!("invalid number {}: {}", s, e)))
        })
        .padded()
}

fn byte<'a>() -> impl Parser<'a, &'a str, u8, extra::Err<Rich<'a, char>>> {
    text::int(10)
        .try_map(|s: &str, span| {
            s.parse::<u8>()
                .map_err(|_| Rich::custom(span, format!("{} is not a byte value", s)))
        })
        .padded()
}

fn string<'a>() -> impl Parser<'a, &'a str, String, extra::Err<Rich<'a, char>>> {
    regex(r#""([^"\\]|\\.)*""#)
        .map(|s: &str| unescape(&s[1..s.len() - 1]))
        .padded()
}

/// Resolve `\n`, `\t`, `\0` and `\<c>` (which stands for `c`)
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

fn store_command<'a>() -> impl Parser<'a, &'a str, Command, extra::Err<Rich<'a, char>>> {
    let malloc = just("malloc")
        .padded()
        .ignore_then(number())
        .then(number())
        .then(number())
        .map(|((channel, at), len)| Command::Malloc { channel, at, len });

    let free = just("free")
        .padded()
        .ignore_then(number())
        .then(number())
        .then(number())
        .map(|((channel, at), len)| Command::Free { channel, at, len });

    let write = just("write")
        .padded()
        .ignore_then(number())
        .then(number())
        .then(string())
        .map(|((channel, at), data)| Command::Write { channel, at, data });

    let fill = just("fill")
        .padded()
        .ignore_then(number())
        .then(number())
        .then(number())
        .then(byte())
        .map(|(((channel, at), len), byte)| Command::Fill {
            channel,
            at,
            len,
            byte,
        });

    let read = just("read")
        .padded()
        .ignore_then(number())
        .then(number())
        .then(number())
        .map(|((channel, at), len)| Command::Read { channel, at, len });

    choice((malloc, free, write, fill, read))
}

fn edit_command<'a>() -> impl Parser<'a, &'a str, Command, extra::Err<Rich<'a, char>>> {
    let insert = just("insert")
        .padded()
        .ignore_then(number())
        .then(number())
        .map(|(at, len)| EditKind::Insert { at, len });

    let delete = just("delete")
        .padded()
        .ignore_then(number())
        .then(number())
        .map(|(at, len)| EditKind::Delete { at, len });

    let cut = just("cut")
        .padded()
        .ignore_then(number())
        .then(number())
        .map(|(at, len)| EditKind::Cut { at, len });

    let copy = just("copy")
        .padded()
        .ignore_then(number())
        .then(number())
        .map(|(at, len)| EditKind::Copy { at, len });

    let paste = just("paste")
        .padded()
        .ignore_then(number())
        .map(|at| EditKind::Paste { at });

    choice((insert, delete, cut, copy, paste)).map(Command::Edit)
}

fn control_command<'a>() -> impl Parser<'a, &'a str, Command, extra::Err<Rich<'a, char>>> {
    choice((
        just("undo").to(Command::Undo),
        just("redo").to(Command::Redo),
        just("flush").to(Command::Flush),
        just("stats").to(Command::Stats),
        just("dispose").to(Command::Dispose),
        just("help").to(Command::Help),
        just("quit").to(Command::Quit),
        just("exit").to(Command::Quit),
    ))
    .padded()
}

/// Parse a line of `;`-separated commands
pub fn parser<'a>() -> impl Parser<'a, &'a str, Vec<Command>, extra::Err<Rich<'a, char>>> {
    choice((store_command(), edit_command(), control_command()))
        .separated_by(just(';').padded())
        .allow_trailing()
        .collect::<Vec<_>>()
        .padded()
}
