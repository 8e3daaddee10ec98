use cutline_api::marker::MarkerOwner;
use cutline_api::timeline::TimelineId;
use cutline_api::undo::Direction;

use crate::marker::MarkerCommand;
use crate::timeline::TimelineCommand;

/// One reversible primitive, addressed to the object it mutates.
#[derive(Debug, Clone)]
pub enum Command {
    Timeline(TimelineId, TimelineCommand),
    Marker(MarkerOwner, MarkerCommand),
}

impl Command {
    /// Whether the command mutates the timeline `id` or its guide list.
    pub fn addresses_timeline(&self, id: TimelineId) -> bool {
        match self {
            Command::Timeline(target, _) => *target == id,
            Command::Marker(owner, _) => *owner == MarkerOwner::Timeline(id),
        }
    }

    pub fn addresses_marker_list(&self, owner: MarkerOwner) -> bool {
        matches!(self, Command::Marker(target, _) if *target == owner)
    }
}

/// Ordered list of primitives that were applied together. Forward replays
/// them in order; backward applies each inverse in reverse order.
#[derive(Debug, Clone, Default)]
pub struct Transaction {
    commands: Vec<Command>,
}

impl Transaction {
    pub fn new() -> Transaction {
        Transaction::default()
    }

    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn extend(&mut self, other: Transaction) {
        self.commands.extend(other.commands);
    }

    pub fn retain(&mut self, f: impl FnMut(&Command) -> bool) {
        self.commands.retain(f);
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Commands in the order they have to be applied for `direction`.
    pub fn ordered(&self, direction: Direction) -> Vec<&Command> {
        match direction {
            Direction::Forward => self.commands.iter().collect(),
            Direction::Backward => self.commands.iter().rev().collect(),
        }
    }
}
