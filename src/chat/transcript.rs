//! In-memory conversation log.
//!
//! Messages are appended in user/assistant pairs. Index 0 is the anchor: the
//! first message ever recorded, kept through every trim. The only removal
//! path is [`Transcript::drop_after_anchor`], which cannot touch the anchor
//! or leave fewer than [`MIN_RETAINED`] messages.

use super::message::Message;

/// Trimming stops once this many messages remain.
pub const MIN_RETAINED: usize = 2;

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn anchor(&self) -> Option<&Message> {
        self.messages.first()
    }

    /// Record one completed exchange: the user input, then the reply.
    pub fn record_exchange(&mut self, input: &str, reply: &str) {
        self.messages.push(Message::user(input));
        self.messages.push(Message::assistant(reply));
    }

    /// How many post-anchor messages can go before hitting the floor.
    pub fn droppable(&self) -> usize {
        self.messages.len().saturating_sub(MIN_RETAINED)
    }

    /// Borrow the transcript as it would look after dropping `dropped`
    /// messages from just behind the anchor. Clamped like
    /// [`drop_after_anchor`](Self::drop_after_anchor).
    pub fn window(&self, dropped: usize) -> Window<'_> {
        let dropped = dropped.min(self.droppable());
        match self.messages.split_first() {
            Some((anchor, rest)) => Window { anchor: Some(anchor), tail: &rest[dropped..] },
            None => Window { anchor: None, tail: &[] },
        }
    }

    /// Remove up to `count` messages starting at index 1. Returns how many
    /// were actually removed.
    pub fn drop_after_anchor(&mut self, count: usize) -> usize {
        let count = count.min(self.droppable());
        if count > 0 {
            self.messages.drain(1..1 + count);
        }
        count
    }
}

/// Read-only view of a transcript with some of the oldest non-anchor
/// messages skipped.
#[derive(Debug, Clone, Copy)]
pub struct Window<'a> {
    anchor: Option<&'a Message>,
    tail: &'a [Message],
}

impl<'a> Window<'a> {
    pub fn len(&self) -> usize {
        usize::from(self.anchor.is_some()) + self.tail.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a Message> + use<'a> {
        self.anchor.into_iter().chain(self.tail.iter())
    }
}
