use log::info;

use crate::checkpoint::Checkpoints;
use crate::common::Ordinal;
use crate::config::LedgerConfig;
use crate::delegation::{DelegationBook, VpBook};
use crate::error::LedgerError;
use crate::params::GENESIS_BOOK;
use crate::store::LedgerImage;

/// Owns the delegation books and decides which of them receives writes and which answers reads,
/// and tracks the cleanup boundary.
///
/// Books are never dropped: a retired book keeps its (pruned) history so queries at ordinals
/// where it was the read book still resolve through it. The read pointer is itself
/// checkpointed. While a replacement's read window is open, writes go to the new book and reads
/// keep going to the previous one.
pub struct LifecycleManager {
    cleanup_boundary: Ordinal,
    books: Vec<Box<dyn DelegationBook>>,
    write: usize,
    read: Checkpoints<usize>,
    /// Ordinal at which reads switch over to the write book.
    pending_switch: Option<Ordinal>,
}

impl LifecycleManager {
    pub fn new(genesis: Box<dyn DelegationBook>) -> Self {
        Self {
            cleanup_boundary: 0,
            books: vec![genesis],
            write: GENESIS_BOOK,
            read: Checkpoints::new(),
            pending_switch: None,
        }
    }

    pub fn from_image(
        image: &LedgerImage, config: &LedgerConfig,
    ) -> Result<Self, LedgerError> {
        let books = image
            .books
            .iter()
            .map(|b| {
                Ok(Box::new(VpBook::from_image(b, config)?) as Box<dyn DelegationBook>)
            })
            .collect::<Result<Vec<_>, LedgerError>>()?;
        let write = image.write_book as usize;
        let mut read_entries = Vec::new();
        for (o, idx) in image.read_books.iter() {
            read_entries.push((*o, *idx as usize));
        }
        if write >= books.len() ||
            read_entries.iter().any(|(_, idx)| *idx >= books.len())
        {
            return Err(LedgerError::InvariantViolation)
        }
        Ok(Self {
            cleanup_boundary: image.cleanup_boundary,
            books,
            write,
            read: Checkpoints::from_entries(
                read_entries,
                image.cleanup_boundary,
            )?,
            pending_switch: image.pending_switch,
        })
    }

    #[inline(always)]
    pub fn cleanup_boundary(&self) -> Ordinal {
        self.cleanup_boundary
    }

    #[inline(always)]
    pub fn pending_switch(&self) -> Option<Ordinal> {
        self.pending_switch
    }

    pub fn write_index(&self) -> usize {
        self.write
    }

    pub fn read_index(&self) -> usize {
        self.read.latest()
    }

    pub fn write_book(&self) -> &dyn DelegationBook {
        self.books[self.write].as_ref()
    }

    pub fn write_book_mut(&mut self) -> &mut dyn DelegationBook {
        self.books[self.write].as_mut()
    }

    pub fn read_book(&self) -> &dyn DelegationBook {
        self.books[self.read_index()].as_ref()
    }

    /// The book that answered reads at `ordinal`.
    pub fn read_book_at(
        &self, ordinal: Ordinal,
    ) -> Result<&dyn DelegationBook, LedgerError> {
        Ok(self.books[self.read.read(ordinal)?].as_ref())
    }

    pub fn read_book_at_mut(
        &mut self, ordinal: Ordinal,
    ) -> Result<&mut dyn DelegationBook, LedgerError> {
        let idx = self.read.read(ordinal)?;
        Ok(self.books[idx].as_mut())
    }

    /// Books that must keep their explicit amounts covered by balances once the clock reaches
    /// `ordinal`: the write book, and the read book unless it retires by then.
    pub fn bound_books(&self, ordinal: Ordinal) -> Vec<&dyn DelegationBook> {
        let mut out = vec![self.write_book()];
        let retiring = self.pending_switch.map_or(false, |at| at <= ordinal);
        if self.read_index() != self.write && !retiring {
            out.push(self.read_book())
        }
        out
    }

    pub fn books(&self) -> impl Iterator<Item = &dyn DelegationBook> {
        self.books.iter().map(|b| b.as_ref())
    }

    pub fn read_history(&self) -> &[(Ordinal, usize)] {
        self.read.entries()
    }

    /// Check a new cleanup boundary against the current one and the clock.
    pub fn check_cleanup_boundary(
        &self, boundary: Ordinal, current: Ordinal,
    ) -> Result<(), LedgerError> {
        if boundary < self.cleanup_boundary || boundary >= current {
            return Err(LedgerError::BoundaryInvalid)
        }
        Ok(())
    }

    /// Move the boundary and prune every book and the read pointer history.
    pub fn set_cleanup_boundary(&mut self, boundary: Ordinal) {
        if boundary <= self.cleanup_boundary {
            return
        }
        for b in self.books.iter_mut() {
            b.prune(boundary)
        }
        self.read.prune(boundary);
        self.cleanup_boundary = boundary;
    }

    /// Called whenever the clock moves to `ordinal`. Completes a read switch that fell due.
    pub fn on_advance(&mut self, ordinal: Ordinal) -> Result<(), LedgerError> {
        match self.pending_switch {
            Some(at) if at <= ordinal => self.switch_read(at).map(|_| ()),
            _ => Ok(()),
        }
    }

    /// Install `book` for writes at `ordinal`. Reads follow after `window` ordinals (at once for
    /// a zero window). A switch still pending from an earlier replacement completes first.
    pub fn replace_write_book(
        &mut self, mut book: Box<dyn DelegationBook>, ordinal: Ordinal,
        window: u64,
    ) -> Result<(), LedgerError> {
        let switch_at =
            ordinal.checked_add(window).ok_or(LedgerError::ArithmeticOverflow)?;
        book.clear_all(ordinal)?;
        if self.pending_switch.is_some() {
            self.switch_read(ordinal)?;
        }
        info!(
            "replacing write book {} with {} at {} (read window {})",
            self.write_book().name(),
            book.name(),
            ordinal,
            window
        );
        self.books.push(book);
        self.write = self.books.len() - 1;
        if window == 0 {
            self.switch_read(ordinal)?;
        } else {
            self.pending_switch = Some(switch_at);
        }
        Ok(())
    }

    /// Point reads at the write book from `ordinal` on. The retiring read book is cleared at
    /// that ordinal. Returns whether anything changed.
    pub fn switch_read(&mut self, ordinal: Ordinal) -> Result<bool, LedgerError> {
        self.pending_switch = None;
        let old = self.read_index();
        if old == self.write {
            return Ok(false)
        }
        self.books[old].clear_all(ordinal)?;
        self.read.write(ordinal, self.write)?;
        info!(
            "reads switched from {} to {} at {}",
            self.books[old].name(),
            self.write_book().name(),
            ordinal
        );
        Ok(true)
    }
}

#[cfg(test)]
fn manager() -> LifecycleManager {
    let config = LedgerConfig::default();
    LifecycleManager::new(Box::new(VpBook::named("genesis", &config)))
}

#[test]
fn test_window_switches_on_advance() {
    let config = LedgerConfig::default();
    let mut m = manager();
    let (a, b) = (1u64.into(), 2u64.into());
    m.write_book_mut().delegate_by_percent(&a, &b, 100, 3).unwrap();
    m.replace_write_book(Box::new(VpBook::named("next", &config)), 10, 5)
        .unwrap();
    assert_eq!(m.write_book().name(), "next");
    assert_eq!(m.read_book().name(), "genesis");
    assert_eq!(m.bound_books(12).len(), 2);
    assert_eq!(m.bound_books(15).len(), 1);
    m.on_advance(14).unwrap();
    assert_eq!(m.read_book().name(), "genesis");
    m.on_advance(20).unwrap();
    assert_eq!(m.read_book().name(), "next");
    assert_eq!(m.read_book_at(14).unwrap().name(), "genesis");
    assert_eq!(m.read_book_at(15).unwrap().name(), "next");
    // the retired book was cleared at the switch but keeps its history
    let old = m.read_book_at(14).unwrap();
    assert!(old.edge_at(&a, &b, 14).unwrap().is_some());
    assert!(old.edge_at(&a, &b, 15).unwrap().is_none());
    assert_eq!(m.pending_switch(), None);
}

#[test]
fn test_replace_completes_pending_switch() {
    let config = LedgerConfig::default();
    let mut m = manager();
    m.replace_write_book(Box::new(VpBook::named("b1", &config)), 10, 50)
        .unwrap();
    m.replace_write_book(Box::new(VpBook::named("b2", &config)), 20, 0)
        .unwrap();
    assert_eq!(m.read_book().name(), "b2");
    assert_eq!(m.read_history(), &[(20, 2)]);
    assert!(!m.switch_read(21).unwrap());
}

#[test]
fn test_cleanup_boundary_rules() {
    let mut m = manager();
    assert_eq!(m.check_cleanup_boundary(5, 5), Err(LedgerError::BoundaryInvalid));
    m.check_cleanup_boundary(5, 6).unwrap();
    m.set_cleanup_boundary(5);
    assert_eq!(m.check_cleanup_boundary(4, 10), Err(LedgerError::BoundaryInvalid));
    m.check_cleanup_boundary(5, 10).unwrap();
    assert_eq!(m.read_book_at(4).map(|b| b.name().to_string()), Err(LedgerError::PrunedHistory));
}
