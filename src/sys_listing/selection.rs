//! Per-row selection state for the interactive listing.
//!
//! Rows start `Pending` while an operation on them is in flight, become
//! `Unselected` once it finishes, and only then can be toggled. Because a
//! pending row cannot be selected, `selected <= finished` holds by construction.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowState {
    Pending,
    Unselected,
    Selected,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("row {0} does not exist")]
    NoSuchRow(usize),
    #[error("row {0} is still pending")]
    Pending(usize),
}

#[derive(Debug, Clone, Default)]
pub struct Selection {
    rows: Vec<RowState>,
}

impl Selection {
    /// A selection over `n` rows that are already finished.
    pub fn finished(n: usize) -> Self {
        Self {
            rows: vec![RowState::Unselected; n],
        }
    }

    /// Append a pending row and return its index.
    pub fn push_pending(&mut self) -> usize {
        self.rows.push(RowState::Pending);
        self.rows.len() - 1
    }

    /// Mark a row finished. Finishing is one-way; finishing twice is a no-op.
    pub fn finish(&mut self, row: usize) -> Result<(), SelectionError> {
        let state = self.rows.get_mut(row).ok_or(SelectionError::NoSuchRow(row))?;
        if *state == RowState::Pending {
            *state = RowState::Unselected;
        }
        Ok(())
    }

    /// Flip a finished row between selected and unselected; returns whether
    /// it is now selected.
    pub fn toggle(&mut self, row: usize) -> Result<bool, SelectionError> {
        let state = self.rows.get_mut(row).ok_or(SelectionError::NoSuchRow(row))?;
        *state = match *state {
            RowState::Pending => return Err(SelectionError::Pending(row)),
            RowState::Unselected => RowState::Selected,
            RowState::Selected => RowState::Unselected,
        };
        Ok(*state == RowState::Selected)
    }

    pub fn state(&self, row: usize) -> Option<RowState> {
        self.rows.get(row).copied()
    }

    pub fn total(&self) -> usize {
        self.rows.len()
    }

    pub fn pending(&self) -> usize {
        self.count(|s| s == RowState::Pending)
    }

    pub fn finished_count(&self) -> usize {
        self.total() - self.pending()
    }

    pub fn selected(&self) -> usize {
        self.count(|s| s == RowState::Selected)
    }

    fn count(&self, pred: impl Fn(RowState) -> bool) -> usize {
        self.rows.iter().filter(|s| pred(**s)).count()
    }
}
