#![forbid(unsafe_code)]

//! Coalescing accumulator for batched list edits.
//!
//! A mutable list performs its structural edits one primitive at a time and
//! reports each to the builder immediately (`next_add`, `next_remove`, ..).
//! The builder folds them into the minimal equivalent set of sub-change
//! blocks; `end_change` at depth zero materializes them.
//!
//! # Internal model
//!
//! - `replacements`: replaced ranges in *current* (accumulated, not-yet-fired)
//!   coordinates, sorted, disjoint, never adjacent. A pure addition has no
//!   removed elements; a pure removal has `from == to`.
//! - `updates`: in-place mutation ranges, same coordinates, interval-unioned.
//! - `permutation`: at most one pending reorder, kept in *pre-batch*
//!   coordinates with absolute new indices.
//!
//! The emitted report is replay-ordered: the permutation block (if any)
//! first, then replacements and updates merged ascending by index. Replaying
//! the blocks in order against the pre-batch list reproduces the post-batch
//! list exactly.
//!
//! # Invariants
//!
//! 1. A batch whose net effect is empty emits nothing.
//! 2. An element added and removed within the same batch never appears in any
//!    block's removed list.
//! 3. Removed elements within one block appear in their pre-removal
//!    positional order.
//!
//! # Failure modes
//!
//! Calling any `next_*` mutator or `end_change` outside an open change is a
//! caller bug and panics. Index validity is the owning collection's problem
//! and is not re-checked here.

use crate::change::ListSubChange;

#[derive(Debug)]
struct Replacement<E> {
    from: usize,
    to: usize,
    removed: Vec<E>,
}

#[derive(Debug, Clone, Copy)]
struct IndexRange {
    from: usize,
    to: usize,
}

#[derive(Debug)]
struct Permutation {
    from: usize,
    to: usize,
    /// `mapping[i]` is the absolute new index of the element at `from + i`.
    mapping: Vec<usize>,
}

/// Builds one coalesced change report per batch.
pub struct ListChangeBuilder<E> {
    replacements: Vec<Replacement<E>>,
    updates: Vec<IndexRange>,
    permutation: Option<Permutation>,
    depth: usize,
}

impl<E> Default for ListChangeBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> ListChangeBuilder<E> {
    pub fn new() -> Self {
        Self {
            replacements: Vec::new(),
            updates: Vec::new(),
            permutation: None,
            depth: 0,
        }
    }

    /// Open a (possibly nested) batch.
    pub fn begin_change(&mut self) {
        self.depth += 1;
    }

    /// Close one nesting level. At depth zero, drains the accumulated state
    /// into the final block list; `None` means the batch had no net effect
    /// and nothing must fire.
    pub fn end_change(&mut self) -> Option<Vec<ListSubChange<E>>> {
        assert!(self.depth > 0, "end_change without matching begin_change");
        self.depth -= 1;
        if self.depth == 0 { self.commit() } else { None }
    }

    pub fn is_open(&self) -> bool {
        self.depth > 0
    }

    fn assert_open(&self) {
        assert!(self.depth > 0, "list edit reported outside an open change");
    }

    /// Elements now occupy `from..to` that did not exist before.
    pub fn next_add(&mut self, from: usize, to: usize) {
        self.assert_open();
        if from >= to {
            return;
        }
        let n = to - from;

        let old_updates = std::mem::take(&mut self.updates);
        for r in old_updates {
            if r.to <= from {
                self.updates.push(r);
            } else if r.from >= from {
                self.updates.push(IndexRange {
                    from: r.from + n,
                    to: r.to + n,
                });
            } else {
                // Insertion lands inside the update range; split around it.
                self.updates.push(IndexRange { from: r.from, to: from });
                self.updates.push(IndexRange {
                    from: from + n,
                    to: r.to + n,
                });
            }
        }

        let mut i = 0;
        while i < self.replacements.len() && self.replacements[i].to < from {
            i += 1;
        }
        if i < self.replacements.len() && self.replacements[i].from <= from {
            // Insertion point lies on an existing block; grow it.
            self.replacements[i].to += n;
        } else {
            self.replacements.insert(
                i,
                Replacement {
                    from,
                    to,
                    removed: Vec::new(),
                },
            );
        }
        for r in &mut self.replacements[i + 1..] {
            r.from += n;
            r.to += n;
        }
        self.merge_adjacent_replacements();
    }

    /// One element removed at `index` (current coordinates); `removed` is the
    /// element that was there.
    pub fn next_remove(&mut self, index: usize, removed: E) {
        self.assert_open();

        let old_updates = std::mem::take(&mut self.updates);
        for r in old_updates {
            if r.to <= index {
                self.updates.push(r);
            } else if r.from > index {
                self.updates.push(IndexRange {
                    from: r.from - 1,
                    to: r.to - 1,
                });
            } else if r.to - 1 > r.from {
                self.updates.push(IndexRange {
                    from: r.from,
                    to: r.to - 1,
                });
            }
        }
        self.merge_updates();

        let mut i = 0;
        while i < self.replacements.len() && self.replacements[i].to < index {
            i += 1;
        }
        if i < self.replacements.len()
            && self.replacements[i].from <= index
            && index < self.replacements[i].to
        {
            // Removing an element this same batch added: it vanishes without
            // a trace in the removed list.
            self.replacements[i].to -= 1;
            for r in &mut self.replacements[i + 1..] {
                r.from -= 1;
                r.to -= 1;
            }
            if self.replacements[i].from == self.replacements[i].to
                && self.replacements[i].removed.is_empty()
            {
                self.replacements.remove(i);
            }
        } else if i < self.replacements.len() && self.replacements[i].to == index {
            self.replacements[i].removed.push(removed);
            for r in &mut self.replacements[i + 1..] {
                r.from -= 1;
                r.to -= 1;
            }
        } else {
            self.replacements.insert(
                i,
                Replacement {
                    from: index,
                    to: index,
                    removed: vec![removed],
                },
            );
            for r in &mut self.replacements[i + 1..] {
                r.from -= 1;
                r.to -= 1;
            }
        }
        self.merge_adjacent_replacements();
    }

    /// Several elements removed starting at `index`.
    pub fn next_remove_all(&mut self, index: usize, removed: impl IntoIterator<Item = E>) {
        for e in removed {
            self.next_remove(index, e);
        }
    }

    /// Combined remove+add at one location: elements `from..to` replaced
    /// `removed`.
    pub fn next_replace(&mut self, from: usize, to: usize, removed: impl IntoIterator<Item = E>) {
        self.next_remove_all(from, removed);
        self.next_add(from, to);
    }

    /// Single-element replacement.
    pub fn next_set(&mut self, index: usize, removed: E) {
        self.next_remove(index, removed);
        self.next_add(index, index + 1);
    }

    /// The element at `index` mutated in place, identity unchanged.
    pub fn next_update(&mut self, index: usize) {
        self.assert_open();
        // An element added this batch is definitionally new; no update block.
        if self
            .replacements
            .iter()
            .any(|r| r.from <= index && index < r.to)
        {
            return;
        }
        self.updates.push(IndexRange {
            from: index,
            to: index + 1,
        });
        self.updates.sort_by_key(|r| r.from);
        self.merge_updates();
    }

    /// Elements `from..to` (current coordinates) were reordered;
    /// `mapping[i]` gives the absolute new index of the element at `from + i`.
    pub fn next_permutation(&mut self, from: usize, to: usize, mapping: &[usize]) {
        self.assert_open();
        debug_assert_eq!(mapping.len(), to.saturating_sub(from));
        if from >= to {
            return;
        }
        let apply = |p: usize| {
            if p >= from && p < to {
                mapping[p - from]
            } else {
                p
            }
        };

        if self.replacements.is_empty() {
            self.remap_updates(&apply);
            let incoming = Permutation {
                from,
                to,
                mapping: mapping.to_vec(),
            };
            self.permutation = Some(match self.permutation.take() {
                None => incoming,
                Some(prev) => compose(&prev, &incoming),
            });
            return;
        }

        // Pending replaced ranges: fold the reorder into them. Model the
        // touched prefix of the current list as a slot map, permute it, then
        // rebuild the replacement list and the survivors' incremental
        // permutation from the result.
        let len = to.max(self.replacements.last().map_or(0, |r| r.to));
        let reps = std::mem::take(&mut self.replacements);
        let added_total: usize = reps.iter().map(|r| r.to - r.from).sum();
        let removed_total: usize = reps.iter().map(|r| r.removed.len()).sum();
        // Pre-batch element count corresponding to current positions 0..len.
        let inter_len = len - added_total + removed_total;

        #[derive(Clone, Copy)]
        enum Slot {
            Added,
            Orig(usize),
        }

        let mut slots: Vec<Slot> = Vec::with_capacity(len);
        {
            let mut ri = 0;
            let mut offset: isize = 0;
            for p in 0..len {
                while ri < reps.len() && reps[ri].to <= p {
                    offset += reps[ri].removed.len() as isize
                        - (reps[ri].to - reps[ri].from) as isize;
                    ri += 1;
                }
                if ri < reps.len() && reps[ri].from <= p {
                    slots.push(Slot::Added);
                } else {
                    slots.push(Slot::Orig((p as isize + offset) as usize));
                }
            }
        }

        // Removed elements stay pinned at their pre-batch positions; the
        // rebuilt replacement blocks will collect them wherever the reorder
        // leaves their neighboring survivors.
        let mut pinned: Vec<Option<E>> = (0..inter_len).map(|_| None).collect();
        {
            let mut offset: isize = 0;
            for r in reps {
                let start = (r.from as isize + offset) as usize;
                let removed_len = r.removed.len();
                for (k, e) in r.removed.into_iter().enumerate() {
                    pinned[start + k] = Some(e);
                }
                offset += removed_len as isize - (r.to - r.from) as isize;
            }
        }

        let mut new_slots: Vec<Option<Slot>> = vec![None; len];
        for (p, s) in slots.iter().enumerate() {
            new_slots[apply(p)] = Some(*s);
        }

        // Survivors take the free (non-pinned) pre-batch positions in their
        // new order; pinned positions map to themselves.
        let free: Vec<usize> = (0..inter_len).filter(|&i| pinned[i].is_none()).collect();
        let mut survivor_perm: Vec<usize> = (0..inter_len).collect();
        let mut next_free = 0;
        for s in new_slots.iter().flatten() {
            if let Slot::Orig(ii) = s {
                survivor_perm[*ii] = free[next_free];
                next_free += 1;
            }
        }

        let mut rebuilt: Vec<Replacement<E>> = Vec::new();
        let mut fi = 0;
        let mut ii = 0;
        while fi < len || ii < inter_len {
            let start = fi;
            while fi < len && matches!(new_slots[fi], Some(Slot::Added)) {
                fi += 1;
            }
            let mut removed_run = Vec::new();
            while ii < inter_len {
                let Some(e) = pinned[ii].take() else { break };
                removed_run.push(e);
                ii += 1;
            }
            if start < fi || !removed_run.is_empty() {
                rebuilt.push(Replacement {
                    from: start,
                    to: fi,
                    removed: removed_run,
                });
                continue;
            }
            debug_assert!(fi < len && ii < inter_len);
            fi += 1;
            ii += 1;
        }
        self.replacements = rebuilt;

        if survivor_perm.iter().enumerate().any(|(i, &v)| v != i) {
            let incoming = Permutation {
                from: 0,
                to: inter_len,
                mapping: survivor_perm,
            };
            self.permutation = Some(match self.permutation.take() {
                None => incoming,
                Some(prev) => compose(&prev, &incoming),
            });
        }

        self.remap_updates(&apply);
    }

    fn remap_updates(&mut self, apply: &impl Fn(usize) -> usize) {
        if self.updates.is_empty() {
            return;
        }
        let ranges: Vec<IndexRange> = self.updates.drain(..).collect();
        let mut positions: Vec<usize> =
            ranges.iter().flat_map(|r| r.from..r.to).map(apply).collect();
        positions.sort_unstable();
        positions.dedup();
        for p in positions {
            match self.updates.last_mut() {
                Some(last) if last.to == p => last.to = p + 1,
                _ => self.updates.push(IndexRange { from: p, to: p + 1 }),
            }
        }
    }

    fn merge_updates(&mut self) {
        let mut i = 0;
        while i + 1 < self.updates.len() {
            if self.updates[i].to >= self.updates[i + 1].from {
                self.updates[i].to = self.updates[i].to.max(self.updates[i + 1].to);
                self.updates.remove(i + 1);
            } else {
                i += 1;
            }
        }
    }

    fn merge_adjacent_replacements(&mut self) {
        let mut i = 0;
        while i + 1 < self.replacements.len() {
            if self.replacements[i].to == self.replacements[i + 1].from {
                let next = self.replacements.remove(i + 1);
                let cur = &mut self.replacements[i];
                cur.to = next.to;
                cur.removed.extend(next.removed);
            } else {
                i += 1;
            }
        }
    }

    fn commit(&mut self) -> Option<Vec<ListSubChange<E>>> {
        let reps = std::mem::take(&mut self.replacements);
        let updates = std::mem::take(&mut self.updates);
        let perm = self.permutation.take();

        let mut out: Vec<ListSubChange<E>> = Vec::new();
        if let Some(p) = perm.and_then(trim_permutation) {
            out.push(p);
        }
        let mut reps = reps.into_iter().peekable();
        let mut updates = updates.into_iter().peekable();
        loop {
            let take_rep = match (reps.peek(), updates.peek()) {
                (Some(r), Some(u)) => r.from <= u.from,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (None, None) => break,
            };
            if take_rep {
                let r = reps.next().unwrap();
                out.push(ListSubChange::Replaced {
                    from: r.from,
                    to: r.to,
                    removed: r.removed,
                });
            } else {
                let u = updates.next().unwrap();
                out.push(ListSubChange::Updated {
                    from: u.from,
                    to: u.to,
                });
            }
        }
        if out.is_empty() { None } else { Some(out) }
    }
}

fn compose(prev: &Permutation, next: &Permutation) -> Permutation {
    let from = prev.from.min(next.from);
    let to = prev.to.max(next.to);
    let mapping = (from..to)
        .map(|i| {
            let mid = if i >= prev.from && i < prev.to {
                prev.mapping[i - prev.from]
            } else {
                i
            };
            if mid >= next.from && mid < next.to {
                next.mapping[mid - next.from]
            } else {
                mid
            }
        })
        .collect();
    Permutation { from, to, mapping }
}

/// Strip the identity fringe; a fully-identity permutation reports nothing.
fn trim_permutation<E>(p: Permutation) -> Option<ListSubChange<E>> {
    let Permutation { from, mapping, .. } = p;
    let lo = mapping.iter().enumerate().position(|(i, &v)| v != from + i)?;
    let hi = mapping
        .iter()
        .enumerate()
        .rfind(|&(i, &v)| v != from + i)
        .map(|(i, _)| i)
        .unwrap_or(lo);
    Some(ListSubChange::Permuted {
        from: from + lo,
        to: from + hi + 1,
        mapping: mapping[lo..=hi].to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Replay `subs` in order against `pre`, pulling inserted content from
    /// `post`, and check the result reproduces `post` exactly.
    fn assert_replays<E: Clone + PartialEq + std::fmt::Debug>(
        pre: &[E],
        subs: &[ListSubChange<E>],
        post: &[E],
    ) {
        let mut work: Vec<E> = pre.to_vec();
        for sub in subs {
            match sub {
                ListSubChange::Permuted { from, to, mapping } => {
                    let section: Vec<E> = work[*from..*to].to_vec();
                    for (i, e) in section.into_iter().enumerate() {
                        work[mapping[i]] = e;
                    }
                }
                ListSubChange::Replaced { from, to, removed } => {
                    assert_eq!(
                        &work[*from..*from + removed.len()],
                        &removed[..],
                        "removed elements must match the working list"
                    );
                    work.splice(
                        *from..*from + removed.len(),
                        post[*from..*to].iter().cloned(),
                    );
                }
                ListSubChange::Updated { .. } => {}
            }
        }
        assert_eq!(work, post);
    }

    fn batch<E>(f: impl FnOnce(&mut ListChangeBuilder<E>)) -> Option<Vec<ListSubChange<E>>> {
        let mut b = ListChangeBuilder::new();
        b.begin_change();
        f(&mut b);
        b.end_change()
    }

    #[test]
    fn single_add() {
        let subs = batch::<&str>(|b| b.next_add(1, 3)).unwrap();
        assert_eq!(
            subs,
            [ListSubChange::Replaced {
                from: 1,
                to: 3,
                removed: vec![]
            }]
        );
    }

    #[test]
    fn empty_batch_fires_nothing() {
        assert!(batch::<&str>(|_| {}).is_none());
    }

    #[test]
    fn add_then_remove_same_range_is_net_noop() {
        let subs = batch::<&str>(|b| {
            b.next_add(1, 3);
            b.next_remove(1, "x");
            b.next_remove(1, "y");
        });
        assert!(subs.is_none());
    }

    #[test]
    fn adjacent_adds_merge() {
        let subs = batch::<&str>(|b| {
            b.next_add(1, 2);
            b.next_add(2, 3);
        })
        .unwrap();
        assert_eq!(
            subs,
            [ListSubChange::Replaced {
                from: 1,
                to: 3,
                removed: vec![]
            }]
        );
    }

    #[test]
    fn consecutive_removes_keep_positional_order() {
        // [a, b, c, d]: remove "b" then "c", both at index 1.
        let subs = batch(|b| {
            b.next_remove(1, "b");
            b.next_remove(1, "c");
        })
        .unwrap();
        assert_eq!(
            subs,
            [ListSubChange::Replaced {
                from: 1,
                to: 1,
                removed: vec!["b", "c"]
            }]
        );
        assert_replays(&["a", "b", "c", "d"], &subs, &["a", "d"]);
    }

    #[test]
    fn set_reports_single_replace() {
        let subs = batch(|b| b.next_set(2, "old")).unwrap();
        assert_eq!(
            subs,
            [ListSubChange::Replaced {
                from: 2,
                to: 3,
                removed: vec!["old"]
            }]
        );
    }

    #[test]
    fn replace_reports_remove_and_add_as_one_block() {
        // [a, b, c]: replace b..c with three elements.
        let subs = batch(|b| b.next_replace(1, 4, ["b", "c"])).unwrap();
        assert_eq!(
            subs,
            [ListSubChange::Replaced {
                from: 1,
                to: 4,
                removed: vec!["b", "c"]
            }]
        );
    }

    #[test]
    fn interleaved_edits_coalesce_minimally() {
        // ["a","b","c","d"]: remove "c"; insert "cc","ccc" at 2; remove "cc";
        // remove "d"; insert "aa" at 0. Final ["aa","a","b","ccc"].
        let subs = batch(|b| {
            b.next_remove(2, "c");
            b.next_add(2, 4);
            b.next_remove(2, "cc");
            b.next_remove(3, "d");
            b.next_add(0, 1);
        })
        .unwrap();
        assert_eq!(
            subs,
            [
                ListSubChange::Replaced {
                    from: 0,
                    to: 1,
                    removed: vec![]
                },
                ListSubChange::Replaced {
                    from: 3,
                    to: 4,
                    removed: vec!["c", "d"]
                },
            ]
        );
        assert_replays(
            &["a", "b", "c", "d"],
            &subs,
            &["aa", "a", "b", "ccc"],
        );
    }

    #[test]
    fn permutations_compose_into_one() {
        let subs = batch::<&str>(|b| {
            b.next_permutation(0, 4, &[3, 2, 1, 0]);
            b.next_permutation(1, 4, &[3, 2, 1]);
        })
        .unwrap();
        assert_eq!(
            subs,
            [ListSubChange::Permuted {
                from: 0,
                to: 4,
                mapping: vec![1, 2, 3, 0]
            }]
        );
    }

    #[test]
    fn identity_permutation_fires_nothing() {
        assert!(batch::<&str>(|b| b.next_permutation(0, 3, &[0, 1, 2])).is_none());
    }

    #[test]
    fn permutation_identity_fringe_is_trimmed() {
        let subs = batch::<&str>(|b| b.next_permutation(0, 4, &[0, 2, 1, 3])).unwrap();
        assert_eq!(
            subs,
            [ListSubChange::Permuted {
                from: 1,
                to: 3,
                mapping: vec![2, 1]
            }]
        );
    }

    #[test]
    fn mutually_cancelling_permutations_fire_nothing() {
        let subs = batch::<&str>(|b| {
            b.next_permutation(0, 2, &[1, 0]);
            b.next_permutation(0, 2, &[1, 0]);
        });
        assert!(subs.is_none());
    }

    #[test]
    fn permutation_after_add_folds_into_the_add() {
        // ["a","b"]: append "x","y", then reverse all four.
        let subs = batch(|b| {
            b.next_add(2, 4);
            b.next_permutation(0, 4, &[3, 2, 1, 0]);
        })
        .unwrap();
        assert_eq!(
            subs,
            [
                ListSubChange::Permuted {
                    from: 0,
                    to: 2,
                    mapping: vec![1, 0]
                },
                ListSubChange::Replaced {
                    from: 0,
                    to: 2,
                    removed: vec![]
                },
            ]
        );
        assert_replays(&["a", "b"], &subs, &["x", "y", "b", "a"]);
    }

    #[test]
    fn permutation_of_added_elements_only_leaves_a_pure_add() {
        // ["a","b"]: append "x","y", then move the new elements to the front
        // preserving the originals' order.
        let subs = batch(|b| {
            b.next_add(2, 4);
            b.next_permutation(0, 4, &[2, 3, 0, 1]);
        })
        .unwrap();
        assert_eq!(
            subs,
            [ListSubChange::Replaced {
                from: 0,
                to: 2,
                removed: vec![]
            }]
        );
        assert_replays(&["a", "b"], &subs, &["x", "y", "a", "b"]);
    }

    #[test]
    fn permutation_after_remove_keeps_removed_identity() {
        // ["a","b","c"]: remove "b", then swap the survivors.
        let subs = batch(|b| {
            b.next_remove(1, "b");
            b.next_permutation(0, 2, &[1, 0]);
        })
        .unwrap();
        assert_eq!(
            subs,
            [
                ListSubChange::Permuted {
                    from: 0,
                    to: 3,
                    mapping: vec![2, 1, 0]
                },
                ListSubChange::Replaced {
                    from: 1,
                    to: 1,
                    removed: vec!["b"]
                },
            ]
        );
        assert_replays(&["a", "b", "c"], &subs, &["c", "a"]);
    }

    #[test]
    fn add_after_permutation_stays_independent() {
        // ["a","b"]: swap, then insert at 1.
        let subs = batch::<&str>(|b| {
            b.next_permutation(0, 2, &[1, 0]);
            b.next_add(1, 2);
        })
        .unwrap();
        assert_eq!(
            subs,
            [
                ListSubChange::Permuted {
                    from: 0,
                    to: 2,
                    mapping: vec![1, 0]
                },
                ListSubChange::Replaced {
                    from: 1,
                    to: 2,
                    removed: vec![]
                },
            ]
        );
        assert_replays(&["a", "b"], &subs, &["b", "x", "a"]);
    }

    #[test]
    fn remove_after_permutation_reports_current_identity() {
        // ["a","b"]: swap, then remove the element now at 0 ("b").
        let subs = batch(|b| {
            b.next_permutation(0, 2, &[1, 0]);
            b.next_remove(0, "b");
        })
        .unwrap();
        assert_eq!(
            subs,
            [
                ListSubChange::Permuted {
                    from: 0,
                    to: 2,
                    mapping: vec![1, 0]
                },
                ListSubChange::Replaced {
                    from: 0,
                    to: 0,
                    removed: vec!["b"]
                },
            ]
        );
        assert_replays(&["a", "b"], &subs, &["a"]);
    }

    #[test]
    fn updates_merge_by_interval_union() {
        let subs = batch::<&str>(|b| {
            b.next_update(1);
            b.next_update(2);
            b.next_update(5);
            b.next_update(2);
        })
        .unwrap();
        assert_eq!(
            subs,
            [
                ListSubChange::Updated { from: 1, to: 3 },
                ListSubChange::Updated { from: 5, to: 6 },
            ]
        );
    }

    #[test]
    fn update_inside_pending_add_is_noop() {
        let subs = batch::<&str>(|b| {
            b.next_add(1, 3);
            b.next_update(2);
        })
        .unwrap();
        assert_eq!(
            subs,
            [ListSubChange::Replaced {
                from: 1,
                to: 3,
                removed: vec![]
            }]
        );
    }

    #[test]
    fn update_positions_shift_with_edits() {
        let subs = batch::<&str>(|b| {
            b.next_update(1);
            b.next_update(2);
            b.next_add(2, 4);
        })
        .unwrap();
        assert_eq!(
            subs,
            [
                ListSubChange::Updated { from: 1, to: 2 },
                ListSubChange::Replaced {
                    from: 2,
                    to: 4,
                    removed: vec![]
                },
                ListSubChange::Updated { from: 4, to: 5 },
            ]
        );
    }

    #[test]
    fn update_positions_follow_a_permutation() {
        let subs = batch::<&str>(|b| {
            b.next_update(0);
            b.next_permutation(0, 2, &[1, 0]);
        })
        .unwrap();
        assert_eq!(
            subs,
            [
                ListSubChange::Permuted {
                    from: 0,
                    to: 2,
                    mapping: vec![1, 0]
                },
                ListSubChange::Updated { from: 1, to: 2 },
            ]
        );
    }

    #[test]
    fn update_on_removed_position_is_dropped() {
        let subs = batch(|b| {
            b.next_update(1);
            b.next_remove(1, "b");
        })
        .unwrap();
        // The removal survives; only the update block vanishes with it.
        assert_eq!(
            subs,
            [ListSubChange::Replaced {
                from: 1,
                to: 1,
                removed: vec!["b"]
            }]
        );
    }

    #[test]
    fn nested_batches_commit_once_at_outer_end() {
        let mut b: ListChangeBuilder<&str> = ListChangeBuilder::new();
        b.begin_change();
        b.next_add(0, 1);
        b.begin_change();
        b.next_add(1, 2);
        assert!(b.end_change().is_none());
        assert!(b.is_open());
        let subs = b.end_change().unwrap();
        assert_eq!(
            subs,
            [ListSubChange::Replaced {
                from: 0,
                to: 2,
                removed: vec![]
            }]
        );
        assert!(!b.is_open());
    }

    #[test]
    fn state_resets_between_batches() {
        let mut b: ListChangeBuilder<&str> = ListChangeBuilder::new();
        b.begin_change();
        b.next_add(0, 1);
        b.end_change().unwrap();
        b.begin_change();
        assert!(b.end_change().is_none());
    }

    #[test]
    #[should_panic(expected = "outside an open change")]
    fn mutator_outside_open_change_panics() {
        let mut b: ListChangeBuilder<&str> = ListChangeBuilder::new();
        b.next_add(0, 1);
    }

    #[test]
    #[should_panic(expected = "without matching begin_change")]
    fn unbalanced_end_change_panics() {
        let mut b: ListChangeBuilder<&str> = ListChangeBuilder::new();
        b.end_change();
    }
}
