//! Sequence numbers for preview requests.
//!
//! Every preview is stamped with a number, either the client's own or
//! one issued here. A finished render is accepted only if its number is
//! at least the last accepted one, so a slow render of an old slider
//! position can never overwrite a newer result. Commit and undo
//! [`supersede`](Sequencer::supersede) everything issued so far.

/// Per-session sequence state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequencer {
    next: u64,
    last_accepted: u64,
}

impl Default for Sequencer {
    fn default() -> Self {
        Self {
            next: 1,
            last_accepted: 0,
        }
    }
}

impl Sequencer {
    /// Stamp an incoming request.
    ///
    /// A client-supplied number is used as is and moves the server
    /// counter past it; otherwise the next server number is issued.
    pub fn issue(&mut self, client: Option<u64>) -> u64 {
        match client {
            Some(n) => {
                self.next = self.next.max(n.saturating_add(1));
                n
            }
            None => {
                let n = self.next;
                self.next = self.next.saturating_add(1);
                n
            }
        }
    }

    /// Record a finished render. Returns `true` (and advances the
    /// watermark) if `n` is not older than the last accepted number.
    pub fn try_accept(&mut self, n: u64) -> bool {
        if n >= self.last_accepted {
            self.last_accepted = n;
            true
        } else {
            false
        }
    }

    /// Issue a fresh number and accept it immediately, invalidating
    /// every request stamped before now.
    pub fn supersede(&mut self) -> u64 {
        let n = self.issue(None);
        self.last_accepted = n;
        n
    }

    /// The newest accepted number (0 before anything was accepted).
    #[must_use]
    pub const fn last_accepted(&self) -> u64 {
        self.last_accepted
    }
}
