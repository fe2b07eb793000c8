use vrl_types::{LedgerEntry, Sequence};

use crate::error::LedgerResult;
use crate::traits::Ledger;

/// Lazy, page-at-a-time iteration over `[from, until]`.
///
/// Pulls at most `page_size` entries per call, so a caller can stop between
/// pages and later resume a new scan from the last entry it fully handled.
/// Entries beyond `until` are never yielded even if the ledger has grown
/// past it in the meantime.
pub struct EntryScan<'a> {
    ledger: &'a dyn Ledger,
    next: Sequence,
    until: Sequence,
    page_size: usize,
    done: bool,
}

impl<'a> EntryScan<'a> {
    pub fn new(ledger: &'a dyn Ledger, from: Sequence, until: Sequence, page_size: usize) -> Self {
        Self {
            ledger,
            next: from,
            until,
            page_size: page_size.max(1),
            done: from > until,
        }
    }

    /// The next non-empty page, or `None` once `until` has been reached.
    pub async fn next_page(&mut self) -> LedgerResult<Option<Vec<LedgerEntry>>> {
        if self.done {
            return Ok(None);
        }

        let mut page = self.ledger.iterate(self.next, self.page_size).await?;
        let fetched = page.len();
        page.retain(|e| e.sequence <= self.until);

        if fetched < self.page_size || page.len() < fetched {
            self.done = true;
        }

        match page.last() {
            Some(last) => {
                if last.sequence >= self.until {
                    self.done = true;
                }
                self.next = last.sequence.successor();
                Ok(Some(page))
            }
            None => {
                self.done = true;
                Ok(None)
            }
        }
    }

    /// Drain the remaining pages into one vector.
    pub async fn collect_all(mut self) -> LedgerResult<Vec<LedgerEntry>> {
        let mut all = Vec::new();
        while let Some(page) = self.next_page().await? {
            all.extend(page);
        }
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use vrl_types::Identity;

    use super::*;
    use crate::memory::InMemoryLedger;

    fn ledger_with(n: usize) -> InMemoryLedger {
        let ledger = InMemoryLedger::new();
        for i in 0..n {
            ledger.submit_raw(Identity::derive("s"), None, vec![i as u8 + 1]);
        }
        ledger
    }

    #[tokio::test]
    async fn pages_cover_range_in_order() {
        let ledger = ledger_with(7);
        let head = ledger.head().await.unwrap();
        let mut scan = EntryScan::new(&ledger, Sequence::GENESIS, head, 3);

        let mut sizes = Vec::new();
        let mut seen = Vec::new();
        while let Some(page) = scan.next_page().await.unwrap() {
            sizes.push(page.len());
            seen.extend(page.into_iter().map(|e| e.sequence));
        }
        assert_eq!(sizes, vec![3, 3, 1]);
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(seen.last(), Some(&head));
    }

    #[tokio::test]
    async fn scan_stops_at_bound_even_if_ledger_grows() {
        let ledger = ledger_with(3);
        let bound = ledger.head().await.unwrap();
        let scan = EntryScan::new(&ledger, Sequence::GENESIS, bound, 2);
        ledger.submit_raw(Identity::derive("s"), None, vec![9]);
        let all = scan.collect_all().await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|e| e.sequence <= bound));
    }

    #[tokio::test]
    async fn empty_range_yields_nothing() {
        let ledger = ledger_with(2);
        let head = ledger.head().await.unwrap();
        let mut scan = EntryScan::new(&ledger, head.successor(), head, 10);
        assert!(scan.next_page().await.unwrap().is_none());

        let empty = InMemoryLedger::new();
        let scan = EntryScan::new(&empty, Sequence::GENESIS, Sequence::GENESIS, 10);
        assert!(scan.collect_all().await.unwrap().is_empty());
    }
}
