//! Wave scheduling.
//!
//! Stacks are grouped into waves by their declared `order`. Waves run strictly
//! one after another; deletes walk the same waves backwards.

use std::collections::BTreeMap;

use crate::model::StackConfig;

/// Group `stacks` into waves by `order`.
///
/// Waves come out in ascending order and only orders that carry at least one
/// stack produce a wave, so gaps collapse. Stacks with a negative order are
/// left out. Within a wave stacks are sorted by declared name. With `reverse`
/// the wave sequence is reversed end to end; wave membership does not change.
pub fn build_dependency_order<'a, I>(stacks: I, reverse: bool) -> Vec<Vec<&'a StackConfig>>
where
    I: IntoIterator<Item = &'a StackConfig>,
{
    let mut by_order: BTreeMap<i32, Vec<&StackConfig>> = BTreeMap::new();
    for stack in stacks.into_iter().filter(|s| s.is_scheduled()) {
        by_order.entry(stack.order).or_default().push(stack);
    }

    let mut waves: Vec<Vec<&StackConfig>> = by_order
        .into_values()
        .map(|mut wave| {
            wave.sort_by(|a, b| a.name.cmp(&b.name));
            wave
        })
        .collect();
    if reverse {
        waves.reverse();
    }
    waves
}
