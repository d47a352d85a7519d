//! Outstanding request bookkeeping.
//!
//! Requests sent on an association are recorded by message ID
//! until their final response has been delivered.
//! C-GET requests are additionally queued in order of issue,
//! so that C-STORE sub-operations without an originator
//! message ID can be attributed to the oldest one.
use crate::message::CommandField;
use std::collections::{HashMap, VecDeque};

/// One request awaiting responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outstanding {
    pub command_field: CommandField,
    pub presentation_context_id: u8,
}

/// The table of outstanding requests of one association.
#[derive(Debug, Default)]
pub struct Correlation {
    last_id: u16,
    entries: HashMap<u16, Outstanding>,
    gets: VecDeque<u16>,
}

impl Correlation {
    pub fn new() -> Self {
        Correlation::default()
    }

    /// Pick the next free message ID.
    ///
    /// IDs roll over within 1..=255, skipping those still outstanding.
    /// Returns `None` if all of them are.
    pub fn allocate(&mut self) -> Option<u16> {
        for _ in 0..255 {
            self.last_id = self.last_id % 255 + 1;
            if !self.entries.contains_key(&self.last_id) {
                return Some(self.last_id);
            }
        }
        None
    }

    /// Record a request as outstanding.
    pub fn register(&mut self, message_id: u16, command_field: CommandField, presentation_context_id: u8) {
        if command_field == CommandField::CGetRq {
            self.gets.push_back(message_id);
        }
        self.entries.insert(
            message_id,
            Outstanding {
                command_field,
                presentation_context_id,
            },
        );
    }

    pub fn get(&self, message_id: u16) -> Option<&Outstanding> {
        self.entries.get(&message_id)
    }

    pub fn is_outstanding(&self, message_id: u16) -> bool {
        self.entries.contains_key(&message_id)
    }

    /// Drop a C-GET from the sub-operation queue,
    /// leaving its entry in place.
    pub fn retire_get(&mut self, message_id: u16) {
        self.gets.retain(|id| *id != message_id);
    }

    /// Remove a request once its exchange is over.
    pub fn complete(&mut self, message_id: u16) -> Option<Outstanding> {
        self.retire_get(message_id);
        self.entries.remove(&message_id)
    }

    /// The request a C-STORE sub-operation belongs to.
    ///
    /// An explicit originator message ID wins if it is outstanding,
    /// otherwise the oldest C-GET still queued is assumed.
    pub fn store_originator(&self, originator: Option<u16>) -> Option<u16> {
        originator
            .filter(|id| self.is_outstanding(*id))
            .or_else(|| self.gets.front().copied())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The outstanding message IDs, in no particular order.
    pub fn ids(&self) -> impl Iterator<Item = u16> + '_ {
        self.entries.keys().copied()
    }
}
