use recopt::pattern::{Greedy, Is, IsDraw, Match, Not, Or};
use recopt::test::{draw_rect, no_op, record, restore, save};
use recopt::{apply, NoOp, PeepholePass, Record, Restore, Save};

#[test]
fn spans_come_back_in_traversal_order_without_overlap() {
    let r = record(vec![
        save(),
        restore(),
        draw_rect(1.0, 0xFF00_0000),
        save(),
        restore(),
    ]);
    let mut m = Match::<(Is<Save>, Is<Restore>)>::new();
    let mut cursor = 0;
    let mut spans = vec![];
    while let Some(span) = m.search(&r, &mut cursor) {
        spans.push(span);
    }
    assert_eq!(spans, vec![(0, 2), (3, 5)]);
}

#[test]
fn greedy_does_not_backtrack_past_its_terminator() {
    // Greedy over "anything but Restore" leaves the Restore for the tail.
    let r = record(vec![
        save(),
        no_op(),
        draw_rect(1.0, 0xFF00_0000),
        restore(),
    ]);
    let mut m = Match::<(
        Is<Save>,
        Greedy<Not<Or<(Is<Save>, Is<Restore>)>>>,
        Is<Restore>,
    )>::new();
    let mut cursor = 0;
    assert_eq!(m.search(&r, &mut cursor), Some((0, 4)));
    assert_eq!(m.span(1), (1, 3));
}

#[test]
fn empty_greedy_matches_adjacent_commands() {
    let r = record(vec![save(), restore()]);
    let mut m = Match::<(Is<Save>, Greedy<Is<NoOp>>, Is<Restore>)>::new();
    let mut cursor = 0;
    assert_eq!(m.search(&r, &mut cursor), Some((0, 2)));
    assert_eq!(m.span(1), (1, 1));
}

#[test]
fn failed_search_parks_the_cursor_at_the_end() {
    let r = record(vec![draw_rect(1.0, 0xFF00_0000), draw_rect(1.0, 0xFF00_0000)]);
    let mut m = Match::<(Is<Save>,)>::new();
    let mut cursor = 0;
    assert_eq!(m.search(&r, &mut cursor), None);
    assert_eq!(cursor, r.count());
}

/// A pass that records every index its rewrites touch, to check that one
/// `apply` never hands the same index to two rewrites.
struct TouchTracker {
    touched: Vec<usize>,
}

impl PeepholePass for TouchTracker {
    type Pattern = (Is<Save>, Greedy<Or<(Is<NoOp>, IsDraw)>>, Is<Restore>);

    fn on_match(
        &mut self,
        record: &mut Record,
        _m: &Match<Self::Pattern>,
        begin: usize,
        end: usize,
    ) -> bool {
        self.touched.extend([begin, end - 1]);
        record.replace_with_noop(begin);
        record.replace_with_noop(end - 1);
        true
    }
}

#[test]
fn one_apply_touches_each_index_at_most_once() {
    let mut r = record(vec![
        save(),
        draw_rect(1.0, 0xFF00_0000),
        restore(),
        save(),
        restore(),
        save(),
        draw_rect(1.0, 0xFF00_0000),
        draw_rect(1.0, 0xFF00_0000),
        restore(),
    ]);
    let mut pass = TouchTracker { touched: vec![] };
    assert!(apply(&mut pass, &mut r));

    let mut sorted = pass.touched.clone();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(sorted.len(), pass.touched.len(), "an index was rewritten twice");
    assert_eq!(pass.touched, vec![0, 2, 3, 4, 5, 8]);
}

#[test]
fn rewrites_reduce_matchable_patterns_monotonically() {
    // The fixpoint loops terminate because every rewrite strictly reduces
    // the number of non-NoOp commands.
    let mut r = record(vec![
        save(),
        save(),
        draw_rect(1.0, 0xFF00_0000),
        restore(),
        restore(),
    ]);
    let mut pass = TouchTracker { touched: vec![] };
    let mut non_noops = recopt::test::names(&r).len();
    while apply(&mut pass, &mut r) {
        let now = recopt::test::names(&r).len();
        assert!(now < non_noops, "a rewrite did not make progress");
        non_noops = now;
    }
}
