//! Per-thread accounting of native allocations made by the bridge.
//!
//! Every owned native resource records one acquisition when it is created and
//! one release when it is dropped. Bridge operations run to completion on the
//! caller's thread, so comparing two snapshots taken on that thread around a
//! call shows whether anything leaked or was released twice.

use std::cell::Cell;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AllocKind {
    /// One decoded UTF-16 string.
    String,
    /// The backing buffer of a string array.
    ArrayBuffer,
    /// A query result payload.
    ResultPayload,
}

impl AllocKind {
    const fn slot(self) -> usize {
        match self {
            AllocKind::String => 0,
            AllocKind::ArrayBuffer => 1,
            AllocKind::ResultPayload => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub acquired: u64,
    pub released: u64,
}

impl Counts {
    #[inline]
    pub fn live(&self) -> i64 {
        self.acquired as i64 - self.released as i64
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerSnapshot {
    kinds: [Counts; 3],
}

impl LedgerSnapshot {
    #[inline]
    pub fn of(&self, kind: AllocKind) -> Counts {
        self.kinds[kind.slot()]
    }

    pub fn total(&self) -> Counts {
        self.kinds.iter().fold(Counts::default(), |acc, c| Counts {
            acquired: acc.acquired + c.acquired,
            released: acc.released + c.released,
        })
    }

    /// Net allocations still outstanding across all kinds.
    #[inline]
    pub fn live(&self) -> i64 {
        self.total().live()
    }

    /// Activity recorded between `earlier` and `self`.
    pub fn since(&self, earlier: &LedgerSnapshot) -> LedgerSnapshot {
        let mut kinds = [Counts::default(); 3];
        for (i, k) in kinds.iter_mut().enumerate() {
            k.acquired = self.kinds[i].acquired - earlier.kinds[i].acquired;
            k.released = self.kinds[i].released - earlier.kinds[i].released;
        }
        LedgerSnapshot { kinds }
    }
}

thread_local! {
    static LEDGER: Cell<LedgerSnapshot> = const { Cell::new(LedgerSnapshot { kinds: [Counts { acquired: 0, released: 0 }; 3] }) };
}

pub fn snapshot() -> LedgerSnapshot {
    LEDGER.with(Cell::get)
}

pub(crate) fn acquire(kind: AllocKind) {
    LEDGER.with(|l| {
        let mut s = l.get();
        s.kinds[kind.slot()].acquired += 1;
        l.set(s);
    });
}

pub(crate) fn release(kind: AllocKind) {
    LEDGER.with(|l| {
        let mut s = l.get();
        s.kinds[kind.slot()].released += 1;
        l.set(s);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn since_reports_only_new_activity() {
        acquire(AllocKind::String);
        let before = snapshot();
        acquire(AllocKind::ArrayBuffer);
        release(AllocKind::ArrayBuffer);
        release(AllocKind::String);

        let d = snapshot().since(&before);
        assert_eq!(d.of(AllocKind::ArrayBuffer), Counts { acquired: 1, released: 1 });
        assert_eq!(d.of(AllocKind::String), Counts { acquired: 0, released: 1 });
        assert_eq!(d.live(), -1);
        assert_eq!(snapshot().live(), before.live() - 1);
    }
}
