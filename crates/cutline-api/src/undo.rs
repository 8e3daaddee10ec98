/// Notifications from an undo stack, for history panels and dirty-state
/// indicators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoEvent {
    Pushed { name: String },
    Undone { name: String },
    Redone { name: String },
    CleanChanged { clean: bool },
    /// Entries that only touched a closed object were dropped.
    Pruned { removed: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub fn reversed(self) -> Direction {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}
