mod command;
mod document;
mod error;
mod history;


pub use command::{EditCommand, EditKind};
pub use document::Document;
pub use error::{EditError, EditResult};
pub use history::History;
