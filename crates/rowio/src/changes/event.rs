//! Changes: the notification published after a committed mutation.

use std::collections::BTreeSet;

/// Set of tables touched by one committed mutation (or one transaction).
///
/// `sequence` is assigned by the [`ChangeBus`](super::ChangeBus) at publish
/// time and increases strictly in publish order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Changes {
    tables: BTreeSet<String>,
    sequence: u64,
}

impl Changes {
    pub(crate) fn new(tables: BTreeSet<String>, sequence: u64) -> Self {
        Self { tables, sequence }
    }

    pub fn tables(&self) -> &BTreeSet<String> {
        &self.tables
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn affects(&self, table: &str) -> bool {
        self.tables.contains(table)
    }
}
