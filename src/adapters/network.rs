//! Network service hook.
//!
//! The board ships without a network stack; [`OfflineNetwork`] keeps the
//! scheduler's network slot cheap and observable.

#[derive(Debug, Default)]
pub struct OfflineNetwork {
    polls: u64,
}

impl OfflineNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Service pending network work.  Nothing to do offline.
    pub fn poll(&mut self) {
        self.polls = self.polls.wrapping_add(1);
    }

    pub fn polls(&self) -> u64 {
        self.polls
    }
}
