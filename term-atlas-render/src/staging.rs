//! Stage-to-array upload bookkeeping and blit completion signalling.

use std::collections::BTreeSet;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use crate::error::AtlasError;

/// Hook that drives the device forward while waiting on a ticket.
/// Called with `true` when the caller is about to block.
pub type PollFn = Box<dyn FnMut(bool) + Send>;

/// Single-shot completion signal for one blit.
///
/// The device fires the paired [`BlitSignal`] once the copy finished.
/// [`BlitTicket::wait`] consumes the ticket, so a completion is observed at
/// most once.
#[must_use = "a blit is only visible to draws after its ticket completes"]
pub struct BlitTicket {
    label: String,
    rx: Receiver<()>,
    completed: bool,
    poll: Option<PollFn>,
    cells: Vec<usize>,
}

/// Sending half of a [`BlitTicket`], moved into the device's completion callback.
pub struct BlitSignal {
    tx: Sender<()>,
}

impl BlitSignal {
    pub fn fire(self) {
        // The receiver may already be gone if the caller dropped the ticket.
        let _ = self.tx.send(());
    }
}

impl BlitTicket {
    /// Create a pending ticket and the signal that completes it.
    pub fn pending(label: &str, cells: Vec<usize>, poll: Option<PollFn>) -> (Self, BlitSignal) {
        let (tx, rx) = mpsc::channel();
        (
            Self {
                label: label.to_string(),
                rx,
                completed: false,
                poll,
                cells,
            },
            BlitSignal { tx },
        )
    }

    /// A ticket for a blit with nothing to copy.
    pub fn ready(label: &str) -> Self {
        let (ticket, signal) = Self::pending(label, Vec::new(), None);
        signal.fire();
        ticket
    }

    /// Number of cells copied by this blit.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Slot indices copied by this blit, ascending.
    pub fn cells(&self) -> &[usize] {
        &self.cells
    }

    /// Non-blocking completion check.
    pub fn is_complete(&mut self) -> Result<bool, AtlasError> {
        if self.completed {
            return Ok(true);
        }
        match self.rx.try_recv() {
            Ok(()) => {
                self.completed = true;
                Ok(true)
            }
            Err(TryRecvError::Empty) => {
                if let Some(poll) = self.poll.as_mut() {
                    poll(false);
                }
                match self.rx.try_recv() {
                    Ok(()) => {
                        self.completed = true;
                        Ok(true)
                    }
                    Err(TryRecvError::Empty) => Ok(false),
                    Err(TryRecvError::Disconnected) => {
                        Err(AtlasError::BlitAbandoned(self.label.clone()))
                    }
                }
            }
            Err(TryRecvError::Disconnected) => Err(AtlasError::BlitAbandoned(self.label.clone())),
        }
    }

    /// Block until the device reports the copy finished.
    pub fn wait(mut self) -> Result<(), AtlasError> {
        if self.completed {
            return Ok(());
        }
        if let Some(poll) = self.poll.as_mut() {
            poll(true);
        }
        self.rx
            .recv()
            .map_err(|_| AtlasError::BlitAbandoned(self.label.clone()))
    }
}

impl std::fmt::Debug for BlitTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlitTicket")
            .field("label", &self.label)
            .field("cells", &self.cells.len())
            .field("completed", &self.completed)
            .finish()
    }
}

/// Stage cells written since the last blit.
#[derive(Debug, Default)]
pub(crate) struct StagingArea {
    dirty: BTreeSet<usize>,
}

impl StagingArea {
    pub(crate) fn mark(&mut self, index: usize) {
        self.dirty.insert(index);
    }

    pub(crate) fn is_dirty(&self, index: usize) -> bool {
        self.dirty.contains(&index)
    }

    pub(crate) fn len(&self) -> usize {
        self.dirty.len()
    }

    /// Take every dirty index in ascending order, leaving the area clean.
    pub(crate) fn drain(&mut self) -> Vec<usize> {
        std::mem::take(&mut self.dirty).into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_ticket_completes_immediately() {
        let mut ticket = BlitTicket::ready("test");
        assert!(ticket.is_complete().unwrap());
        assert!(ticket.wait().is_ok());
    }

    #[test]
    fn pending_ticket_completes_after_signal() {
        let (mut ticket, signal) = BlitTicket::pending("test", vec![0, 1, 2], None);
        assert!(!ticket.is_complete().unwrap());
        signal.fire();
        assert!(ticket.is_complete().unwrap());
        assert_eq!(ticket.cell_count(), 3);
    }

    #[test]
    fn dropped_signal_reports_abandoned() {
        let (ticket, signal) = BlitTicket::pending("lost", vec![4], None);
        drop(signal);
        assert!(matches!(ticket.wait(), Err(AtlasError::BlitAbandoned(label)) if label == "lost"));
    }

    #[test]
    fn signal_fired_from_another_thread() {
        let (ticket, signal) = BlitTicket::pending("thread", vec![0], None);
        let handle = std::thread::spawn(move || signal.fire());
        assert!(ticket.wait().is_ok());
        handle.join().unwrap();
    }

    #[test]
    fn staging_drains_in_index_order() {
        let mut area = StagingArea::default();
        area.mark(5);
        area.mark(1);
        area.mark(5);
        assert!(area.is_dirty(1));
        assert_eq!(area.len(), 2);
        assert_eq!(area.drain(), vec![1, 5]);
        assert_eq!(area.len(), 0);
        assert!(!area.is_dirty(1));
    }
}
