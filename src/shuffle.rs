use crate::model::{EntryFlags, EntryId};
use crate::tree::PlayTree;
use rand::Rng;
use tracing::trace;

/// Shuffles the children of every `RANDOM` container under `id`, then clears
/// the flag on each of them.
///
/// Children are shuffled before their parent, and only ever among siblings.
pub fn shuffle_tree<R: Rng + ?Sized>(tree: &mut PlayTree, id: EntryId, rng: &mut R) {
    let mut order: Vec<EntryId> = tree.children(id).collect();
    for &child in &order {
        shuffle_tree(tree, child, rng);
    }

    if !tree[id].flags().contains(EntryFlags::RANDOM) {
        return;
    }

    // Move a random not-yet-placed sibling to the front of the unplaced tail.
    let count = order.len();
    for placed in 0..count.saturating_sub(1) {
        let pick = placed + rng.random_range(0..count - placed);
        order[placed..=pick].rotate_right(1);
    }

    tree.relink_children(id, &order);
    tree.unset_flag(id, EntryFlags::RANDOM, 0);
    trace!(entry = %id, count, "shuffled children");
}
