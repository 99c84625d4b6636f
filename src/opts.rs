/*!
Peephole optimization passes over a [`Record`].

Every pass here is pattern-based: a pass is a [`Pattern`] type naming the
span shape it rewrites, plus an `on_match` that checks the semantic side
conditions and either rewrites in place (returning `true`) or refuses
(returning `false`). Refusal is not an error: conservative refusal on
ambiguous paint attributes is what keeps the rewrites pixel-exact.

[`apply`] runs one pass once across a record. Passes whose rewrites can
open up further matches (the save/restore peelers) are wrapped in fixpoint
loops; the rest run once. Two entry points compose the passes:
[`optimize`] and [`optimize2`].
*/

use log::{debug, trace};

use crate::pattern::{Greedy, Is, IsDraw, Match, Not, Or, Pattern};
use crate::util::mul_div_255_round;
use crate::{
    BlendMode, ClipRect, Color, NoOp, Paint, Record, Restore, Save, SaveLayer, SetMatrix,
};

/// A pattern-based rewrite: a span shape plus a semantic side condition.
///
/// `on_match` is handed the record, the match state (for typed accessors),
/// and the `[begin, end)` span. It returns `true` if it changed the record.
/// A rewrite must not create new matches overlapping `[begin, end)`:
/// [`apply`] resumes searching at `end`.
pub trait PeepholePass {
    /// The span shape this pass rewrites.
    type Pattern: Pattern;

    /// Check side conditions and rewrite in place.
    fn on_match(
        &mut self,
        record: &mut Record,
        m: &Match<Self::Pattern>,
        begin: usize,
        end: usize,
    ) -> bool;
}

/// Run `pass` once across `record`; true if it changed anything.
pub fn apply<P: PeepholePass>(pass: &mut P, record: &mut Record) -> bool {
    let mut m = Match::<P::Pattern>::new();
    let mut cursor = 0;
    let mut changed = false;
    while let Some((begin, end)) = m.search(record, &mut cursor) {
        let did = pass.on_match(record, &m, begin, end);
        trace!("match [{begin}, {end}) rewrote: {did}");
        changed |= did;
    }
    changed
}

/// A later `SetMatrix` fully overwrites an earlier one when nothing between
/// them observes the matrix.
struct CollapseSetMatrices;

impl PeepholePass for CollapseSetMatrices {
    type Pattern = (Is<SetMatrix>, Greedy<Is<NoOp>>, Is<SetMatrix>);

    fn on_match(
        &mut self,
        record: &mut Record,
        _m: &Match<Self::Pattern>,
        begin: usize,
        _end: usize,
    ) -> bool {
        record.replace_with_noop(begin); // first SetMatrix
        true
    }
}

/// Noop out runs of `SetMatrix · NoOp* · SetMatrix`, to fixpoint.
pub fn collapse_set_matrices(record: &mut Record) {
    while apply(&mut CollapseSetMatrices, record) {}
}

/// A save whose scope contains only draws alters nothing restorable.
struct SaveOnlyDrawsRestoreNooper;

impl PeepholePass for SaveOnlyDrawsRestoreNooper {
    type Pattern = (Is<Save>, Greedy<Or<(Is<NoOp>, IsDraw)>>, Is<Restore>);

    fn on_match(
        &mut self,
        record: &mut Record,
        _m: &Match<Self::Pattern>,
        begin: usize,
        end: usize,
    ) -> bool {
        record.replace_with_noop(begin); // Save
        record.replace_with_noop(end - 1); // Restore
        true
    }
}

/// A save scope that draws nothing has no observable effect at all: the
/// state changes inside it are discarded at the restore.
struct SaveNoDrawsRestoreNooper;

impl PeepholePass for SaveNoDrawsRestoreNooper {
    // Greedy matches greedily, so Save and Restore must be excluded too.
    // Nested SaveLayers need to be excluded, or we'd match their Restore.
    type Pattern = (
        Is<Save>,
        Greedy<Not<Or<(Is<Save>, Is<SaveLayer>, Is<Restore>, IsDraw)>>>,
        Is<Restore>,
    );

    fn on_match(
        &mut self,
        record: &mut Record,
        _m: &Match<Self::Pattern>,
        begin: usize,
        end: usize,
    ) -> bool {
        // The entire span between Save and Restore (inclusively) does nothing.
        for i in begin..end {
            record.replace_with_noop(i);
        }
        true
    }
}

/// Turn logically dead `Save`/`Restore` scopes into actual `NoOp`s.
///
/// The two peelers run in a loop until neither reports a change: nooping an
/// inner scope can expose an outer one.
pub fn noop_save_restores(record: &mut Record) {
    let mut only_draws = SaveOnlyDrawsRestoreNooper;
    let mut no_draws = SaveNoDrawsRestoreNooper;

    // Run until they stop changing things.
    while apply(&mut only_draws, record) || apply(&mut no_draws, record) {}
}

fn effectively_src_over(paint: Option<&Paint>) -> bool {
    match paint {
        None => true,
        Some(p) if p.is_src_over() => true,
        // src-mode with opaque color and no effects (which might change
        // opaqueness) is ok too.
        Some(p) => {
            p.blend == BlendMode::Src
                && !p.shader
                && !p.color_filter
                && !p.image_filter
                && p.alpha() == 0xFF
        }
    }
}

/// Try to fold a layer's alpha into `paint`, the paint of the single
/// command the layer brackets.
///
/// The fold can proceed only if `paint` does not combine with the layer in
/// complex ways: it must blend source-over, and its color must reach the
/// canvas unmodified.
///
/// `layer_paint` is always from a saveLayer. If `is_save_layer` is true,
/// `paint` is too (the SVG merge folds one layer into another); an image
/// filter on a layer paint applies to the layer contents before the color
/// modulation, so the fold still holds there, while on a normal draw it
/// would observe the un-modulated input.
fn fold_opacity_layer_color_to_paint(
    layer_paint: Option<&Paint>,
    is_save_layer: bool,
    paint: &mut Paint,
) -> bool {
    // TODO: most likely only some blend modes are the hard constraints
    if !paint.is_src_over() {
        return false;
    }

    if !is_save_layer && paint.image_filter {
        return false;
    }

    if paint.color_filter {
        // Filter input depends on the paint color.
        return false;
    }

    if let Some(layer) = layer_paint {
        // The layer paint color must have only an alpha component.
        if layer.color.with_alpha(0) != Color::TRANSPARENT {
            return false;
        }

        // The layer paint can not have any effects.
        if layer.path_effect
            || layer.shader
            || !layer.is_src_over()
            || layer.mask_filter
            || layer.color_filter
            || layer.image_filter
        {
            return false;
        }
        paint.set_alpha(mul_div_255_round(paint.alpha(), layer.color.a));
    }

    true
}

fn kill_save_layer_and_restore(record: &mut Record, save_layer: usize, restore: usize) -> bool {
    record.replace_with_noop(save_layer);
    record.replace_with_noop(restore);
    true
}

/// For `SaveLayer · draw · Restore`, merge the layer's alpha into the draw
/// and noop the `SaveLayer` and `Restore`.
struct SaveLayerDrawRestoreNooper;

impl PeepholePass for SaveLayerDrawRestoreNooper {
    type Pattern = (Is<SaveLayer>, IsDraw, Is<Restore>);

    fn on_match(
        &mut self,
        record: &mut Record,
        m: &Match<Self::Pattern>,
        begin: usize,
        _end: usize,
    ) -> bool {
        let layer = m.first::<SaveLayer>(record);
        if layer.backdrop {
            // can't throw away the layer if we have a backdrop
            return false;
        }

        // A SaveLayer's bounds field is just a hint, free to ignore.
        let layer_paint = layer.paint;
        let draw_paint = record[begin + 1].paint().copied();

        if layer_paint.is_none() && effectively_src_over(draw_paint.as_ref()) {
            // There wasn't really any point to this SaveLayer at all.
            return kill_save_layer_and_restore(record, begin, begin + 2);
        }

        let Some(mut folded) = draw_paint else {
            // The fold would have nowhere to carry the layer's alpha.
            return false;
        };

        if !fold_opacity_layer_color_to_paint(layer_paint.as_ref(), false, &mut folded) {
            return false;
        }

        record.mutate_paint(begin + 1, |paint| *paint = folded);
        kill_save_layer_and_restore(record, begin, begin + 2)
    }
}

/// Run [`SaveLayerDrawRestoreNooper`] once across the record.
pub fn noop_save_layer_draw_restores(record: &mut Record) {
    apply(&mut SaveLayerDrawRestoreNooper, record);
}

/// Merge the two layers SVG rendering typically nests:
///
/// ```text
/// SaveLayer (non-opaque, typically for CSS opacity)
///   Save
///     ClipRect
///     SaveLayer (typically for an SVG filter)
///     Restore
///   Restore
/// Restore
/// ```
struct SvgOpacityAndFilterLayerMergePass;

impl PeepholePass for SvgOpacityAndFilterLayerMergePass {
    type Pattern = (
        Is<SaveLayer>,
        Is<Save>,
        Is<ClipRect>,
        Is<SaveLayer>,
        Is<Restore>,
        Is<Restore>,
        Is<Restore>,
    );

    fn on_match(
        &mut self,
        record: &mut Record,
        m: &Match<Self::Pattern>,
        begin: usize,
        _end: usize,
    ) -> bool {
        let outer = m.first::<SaveLayer>(record);
        if outer.backdrop {
            // can't throw away the layer if we have a backdrop
            return false;
        }

        let Some(opacity_paint) = outer.paint else {
            // There wasn't really any point to this SaveLayer at all.
            return kill_save_layer_and_restore(record, begin, begin + 6);
        };

        // The inner layer typically holds a filter, but the fold works for
        // layers kept for other purposes too.
        let Some(mut filter_paint) = m.fourth::<SaveLayer>(record).paint else {
            return false;
        };

        if !fold_opacity_layer_color_to_paint(Some(&opacity_paint), true, &mut filter_paint) {
            return false;
        }

        record.mutate::<SaveLayer>(begin + 3, |inner| inner.paint = Some(filter_paint));
        kill_save_layer_and_restore(record, begin, begin + 6)
    }
}

/// Run [`SvgOpacityAndFilterLayerMergePass`] once across the record.
pub fn merge_svg_opacity_and_filter_layers(record: &mut Record) {
    apply(&mut SvgOpacityAndFilterLayerMergePass, record);
}

/// The default optimization pipeline.
///
/// The save/restore peelers are not in this pipeline: annotations carry no
/// paint, so the no-draw peeler would treat an annotated span as dead state
/// and drop the annotations with it.
pub fn optimize(record: &mut Record) {
    debug_assert!(record.balanced(), "unbalanced record before optimize");
    debug!("optimize: {} commands in", record.count());

    noop_save_layer_draw_restores(record);
    merge_svg_opacity_and_filter_layers(record);

    record.defrag();
    debug_assert!(record.balanced(), "unbalanced record after optimize");
    debug!("optimize: {} commands out", record.count());
}

/// The extended optimization pipeline: matrix collapsing and save/restore
/// peeling in front of the layer folds.
pub fn optimize2(record: &mut Record) {
    debug_assert!(record.balanced(), "unbalanced record before optimize2");
    debug!("optimize2: {} commands in", record.count());

    collapse_set_matrices(record);
    noop_save_restores(record);
    noop_save_layer_draw_restores(record);
    merge_svg_opacity_and_filter_layers(record);

    record.defrag();
    debug_assert!(record.balanced(), "unbalanced record after optimize2");
    debug!("optimize2: {} commands out", record.count());
}
