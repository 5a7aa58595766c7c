use super::command::{EditCommand, EditKind};
use super::document::Document;
use super::error::{EditError, EditResult};

/// Undo and redo stacks of applied edits
#[derive(Default)]
pub struct History {
    undo: Vec<EditCommand>,
    redo: Vec<EditCommand>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a new edit; an undoable one clears the redo stack
    pub fn apply(&mut self, document: &mut Document, kind: EditKind) -> EditResult<()> {
        let mut command = EditCommand::new(kind, document)?;
        command.apply(document)?;

        if kind.is_undoable() {
            self.undo.push(command);
            self.redo.clear();
        }
        Ok(())
    }

    /// Revert the most recent edit
    pub fn undo(&mut self, document: &mut Document) -> EditResult<EditKind> {
        let mut command = self.undo.pop().ok_or(EditError::NothingToUndo)?;
        if let Err(e) = command.undo(document) {
            self.undo.push(command);
            return Err(e);
        }

        let kind = command.kind();
        self.redo.push(command);
        Ok(kind)
    }

    /// Re-apply the most recently undone edit
    pub fn redo(&mut self, document: &mut Document) -> EditResult<EditKind> {
        let mut command = self.redo.pop().ok_or(EditError::NothingToRedo)?;
        if let Err(e) = command.apply(document) {
            self.redo.push(command);
            return Err(e);
        }

        let kind = command.kind();
        self.undo.push(command);
        Ok(kind)
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    /// Drop every recorded edit along with its saved bytes
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}
