/// An interned string.
///
/// This is provided by the [`symbol_table`](https://crates.io/crates/symbol_table) crate.
///
/// Command names and annotation keys are compared and copied a lot, so they
/// are interned. A [`Symbol`] is a wrapper around an integer index into a
/// global table, which makes it `Copy` and cheap to compare.
///
/// The internal symbol cache leaks the strings, which should be fine for
/// command names and annotation keys.
pub use symbol_table::GlobalSymbol as Symbol;

pub(crate) type Instant = quanta::Instant;

/// Exact `round(a * b / 255)` over bytes, without going through floats.
pub(crate) fn mul_div_255_round(a: u8, b: u8) -> u8 {
    let prod = u32::from(a) * u32::from(b) + 128;
    ((prod + (prod >> 8)) >> 8) as u8
}
