/*!
The allocation meter.

A thread-local byte counter fed by the raster canvas (and anything else
that wants its buffers accounted). The benchmark zeroes it before each
replayed command and reads it after, so the per-command log can attribute
bytes to the command that caused them.

The counter is thread-local by construction: concurrent optimizations never
share a meter.
*/

use std::cell::Cell;

thread_local! {
    static ALLOCATED: Cell<u64> = const { Cell::new(0) };
}

/// Zero the counter.
pub fn reset() {
    ALLOCATED.with(|bytes| bytes.set(0));
}

/// Bytes recorded since the last [`reset`].
pub fn allocated() -> u64 {
    ALLOCATED.with(|bytes| bytes.get())
}

/// Add `bytes` to the counter.
pub fn record_alloc(bytes: usize) {
    ALLOCATED.with(|total| total.set(total.get() + bytes as u64));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_and_read() {
        reset();
        assert_eq!(allocated(), 0);
        record_alloc(128);
        record_alloc(64);
        assert_eq!(allocated(), 192);
        reset();
        assert_eq!(allocated(), 0);
    }
}
