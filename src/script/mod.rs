mod parser;

pub use parser::{parser, Command};

use chumsky::Parser;

/// Parse one line of shell input into commands
pub fn parse(input: &str) -> Result<Vec<Command>, String> {
    parser().parse(input).into_result().map_err(|errs| {
        errs.iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    })
}
