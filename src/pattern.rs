/*!
Type-level pattern matching over a [`Record`].

Rewrite passes describe the command spans they care about as a type, for
example the layer-folding pass:

```
use recopt::pattern::{Is, IsDraw};
use recopt::{Restore, SaveLayer};

type Match = (Is<SaveLayer>, IsDraw, Is<Restore>);
```

A pattern is a tuple of *elements*, each of which consumes a sub-span of
consecutive commands. Single-command elements ([`Is`], [`Or`], [`Not`],
[`IsDraw`]) consume exactly one slot; [`Greedy`] consumes zero or more,
maximally and without backtracking. [`Match::search`] scans left to right
for the next span matching the whole tuple, and typed accessors
([`Match::first`] and friends) hand back the payloads of single-command
positions.

Searching resumes at the *end* of the previous match, never inside it: the
passes guarantee their rewrites do not create new matches overlapping the
span they just rewrote, and in exchange every `apply` pass over a record
touches each index at most once.
*/

use std::marker::PhantomData;

use smallvec::SmallVec;

use crate::{Command, FromCommand, Record};

/// A `[begin, end)` index span into a record.
pub type Span = (usize, usize);

/// Sub-span storage for a match, one entry per pattern element.
pub type Spans = SmallVec<[Span; 7]>;

/// Matches a single command.
pub trait Matches {
    /// Does `command` match?
    fn matches(command: &Command) -> bool;
}

/// One command of variant `T`.
pub struct Is<T>(PhantomData<T>);

impl<T: FromCommand> Matches for Is<T> {
    fn matches(command: &Command) -> bool {
        T::from_command(command).is_some()
    }
}

/// One command carrying a paint that puts pixels on the canvas.
pub struct IsDraw;

impl Matches for IsDraw {
    fn matches(command: &Command) -> bool {
        command.is_draw()
    }
}

/// One command *not* matching `M`.
pub struct Not<M>(PhantomData<M>);

impl<M: Matches> Matches for Not<M> {
    fn matches(command: &Command) -> bool {
        !M::matches(command)
    }
}

/// One command matching any alternative in the tuple `T`.
pub struct Or<T>(PhantomData<T>);

macro_rules! impl_or {
    ($($alt:ident),*) => {
        impl<$($alt: Matches),*> Matches for Or<($($alt,)*)> {
            fn matches(command: &Command) -> bool {
                $($alt::matches(command))||*
            }
        }
    };
}

impl_or!(A, B);
impl_or!(A, B, C);
impl_or!(A, B, C, D);

/// A pattern element: consumes a sub-span of consecutive commands.
///
/// Every [`Matches`] type is an element consuming exactly one slot;
/// [`Greedy`] is the only multi-slot element.
pub trait Element {
    /// Try to consume starting at `begin`; return the end of the sub-span.
    fn consume(record: &Record, begin: usize) -> Option<usize>;
}

impl<T: FromCommand> Element for Is<T> {
    fn consume(record: &Record, begin: usize) -> Option<usize> {
        if begin < record.count() && Self::matches(&record[begin]) {
            Some(begin + 1)
        } else {
            None
        }
    }
}

impl<M: Matches> Element for Not<M> {
    fn consume(record: &Record, begin: usize) -> Option<usize> {
        if begin < record.count() && Self::matches(&record[begin]) {
            Some(begin + 1)
        } else {
            None
        }
    }
}

impl<T> Element for Or<T>
where
    Or<T>: Matches,
{
    fn consume(record: &Record, begin: usize) -> Option<usize> {
        if begin < record.count() && Self::matches(&record[begin]) {
            Some(begin + 1)
        } else {
            None
        }
    }
}

impl Element for IsDraw {
    fn consume(record: &Record, begin: usize) -> Option<usize> {
        if begin < record.count() && Self::matches(&record[begin]) {
            Some(begin + 1)
        } else {
            None
        }
    }
}

/// Zero or more consecutive commands each matching `M`; maximal.
pub struct Greedy<M>(PhantomData<M>);

impl<M: Matches> Element for Greedy<M> {
    fn consume(record: &Record, begin: usize) -> Option<usize> {
        let mut end = begin;
        while end < record.count() && M::matches(&record[end]) {
            end += 1;
        }
        Some(end)
    }
}

/// A concatenation of [`Element`]s, written as a tuple.
///
/// Implemented for tuples up to arity 7 (the widest pattern any pass uses).
pub trait Pattern {
    /// Try to match the whole tuple starting at `begin`, recording one
    /// sub-span per element; return the end of the overall span.
    fn match_at(record: &Record, begin: usize, spans: &mut Spans) -> Option<usize>;
}

macro_rules! impl_pattern {
    ($($el:ident),*) => {
        impl<$($el: Element),*> Pattern for ($($el,)*) {
            fn match_at(record: &Record, begin: usize, spans: &mut Spans) -> Option<usize> {
                spans.clear();
                let mut i = begin;
                $(
                    let end = $el::consume(record, i)?;
                    spans.push((i, end));
                    i = end;
                )*
                Some(i)
            }
        }
    };
}

impl_pattern!(A);
impl_pattern!(A, B);
impl_pattern!(A, B, C);
impl_pattern!(A, B, C, D);
impl_pattern!(A, B, C, D, E);
impl_pattern!(A, B, C, D, E, F);
impl_pattern!(A, B, C, D, E, F, G);

/// Match state for a pattern `P`: the cursor and the last match's sub-spans.
///
/// Holds indices only, never borrows, so a pass may freely mutate the
/// record between searches.
pub struct Match<P> {
    spans: Spans,
    _pattern: PhantomData<P>,
}

impl<P: Pattern> Default for Match<P> {
    fn default() -> Self {
        Match::new()
    }
}

impl<P: Pattern> Match<P> {
    /// Fresh match state with the cursor at the record start.
    pub fn new() -> Match<P> {
        Match {
            spans: SmallVec::new(),
            _pattern: PhantomData,
        }
    }

    /// Advance from `cursor` to the next span matching `P`.
    ///
    /// On success returns the `[begin, end)` span and leaves the cursor at
    /// `end`; on failure leaves the cursor at the record end.
    pub fn search(&mut self, record: &Record, cursor: &mut usize) -> Option<Span> {
        let mut begin = *cursor;
        while begin < record.count() {
            if let Some(end) = P::match_at(record, begin, &mut self.spans) {
                *cursor = end;
                return Some((begin, end));
            }
            begin += 1;
        }
        *cursor = record.count();
        None
    }

    /// The sub-span of positional element `n` in the last match.
    pub fn span(&self, n: usize) -> Span {
        self.spans[n]
    }

    /// Typed payload of positional element `n` in the last match.
    ///
    /// Panics unless that element matched exactly one record of variant
    /// `T`; [`Greedy`] spans are not addressable this way.
    pub fn nth<'r, T: FromCommand>(&self, record: &'r Record, n: usize) -> &'r T {
        let (begin, end) = self.spans[n];
        assert_eq!(
            end,
            begin + 1,
            "typed access to pattern element {} spanning [{}, {})",
            n,
            begin,
            end
        );
        T::from_command(&record[begin]).unwrap_or_else(|| {
            panic!(
                "pattern element {} matched a {}, not a {}",
                n,
                record[begin].name(),
                T::NAME
            )
        })
    }

    /// Typed payload of the first element.
    pub fn first<'r, T: FromCommand>(&self, record: &'r Record) -> &'r T {
        self.nth(record, 0)
    }

    /// Typed payload of the second element.
    pub fn second<'r, T: FromCommand>(&self, record: &'r Record) -> &'r T {
        self.nth(record, 1)
    }

    /// Typed payload of the third element.
    pub fn third<'r, T: FromCommand>(&self, record: &'r Record) -> &'r T {
        self.nth(record, 2)
    }

    /// Typed payload of the fourth element.
    pub fn fourth<'r, T: FromCommand>(&self, record: &'r Record) -> &'r T {
        self.nth(record, 3)
    }
}
