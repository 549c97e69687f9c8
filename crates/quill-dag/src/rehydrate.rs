//! Rebuilding aggregate state by replaying matching events oldest-first.

use std::collections::HashSet;

use quill_refs::RefStore;
use quill_store::ObjectStore;
use quill_types::Hash;
use tracing::{debug, info_span, trace};

use crate::aggregate::Aggregate;
use crate::error::{DagError, DagResult};
use crate::manifest::Manifest;
use crate::matcher::PartitionPattern;
use crate::walk::ObjectLoader;

/// A checkpoint whose affix carries events for the target pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelevantCheckpoint {
    pub hash: Hash,
    /// Matching event hashes, partition by partition in name order.
    pub events: Vec<Hash>,
}

/// Counters describing one replay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub checkpoints_visited: usize,
    pub relevant_checkpoints: usize,
    pub events_applied: usize,
}

enum Frame {
    Enter(Hash),
    Exit(Option<RelevantCheckpoint>),
}

/// Resolve `ref_name` (following symbolic refs) to its head checkpoint.
pub fn resolve_head<R: RefStore + ?Sized>(refs: &R, ref_name: &str) -> DagResult<Hash> {
    refs.resolve(ref_name).map_err(|source| DagError::UnresolvedRef {
        name: ref_name.to_string(),
        source,
    })
}

/// Replays the checkpoint DAG onto aggregates.
///
/// Traversal is a synchronous depth-first walk from the head that follows
/// every parent of every merge. Each checkpoint is visited once, so a shared
/// ancestor of a diamond is replayed once. A checkpoint is emitted only
/// after all of its ancestors, so replay is strictly oldest-first; among the
/// parents of a merge, the first parent's history is replayed first.
pub struct Rehydrator<'a, O: ObjectStore + ?Sized, R: RefStore + ?Sized> {
    loader: ObjectLoader<'a, O>,
    refs: &'a R,
}

impl<'a, O: ObjectStore + ?Sized, R: RefStore + ?Sized> Rehydrator<'a, O, R> {
    pub fn new(objects: &'a O, refs: &'a R) -> Self {
        Self {
            loader: ObjectLoader::new(objects),
            refs,
        }
    }

    /// Checkpoints reachable from `head` whose affix matches `pattern`,
    /// oldest first, plus the number of checkpoints visited.
    pub fn relevant_checkpoints(
        &self,
        head: Hash,
        pattern: &PartitionPattern,
    ) -> DagResult<(Vec<RelevantCheckpoint>, usize)> {
        let mut visited = HashSet::new();
        let mut relevant = Vec::new();
        let mut stack = vec![Frame::Enter(head)];

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter(hash) => {
                    if !visited.insert(hash) {
                        continue;
                    }
                    let (checkpoint, affix) = self.loader.checkpoint_with_affix(&hash)?;
                    let events: Vec<Hash> = affix
                        .iter()
                        .filter(|(partition, _)| pattern.matches(partition.as_str()))
                        .flat_map(|(_, events)| events.iter().copied())
                        .collect();
                    let entry = (!events.is_empty()).then(|| RelevantCheckpoint { hash, events });
                    if entry.is_some() {
                        trace!(checkpoint = %hash.short_hex(), "relevant checkpoint");
                    }

                    stack.push(Frame::Exit(entry));
                    // Reversed so the first parent is walked, and emitted, first.
                    for parent in checkpoint.parent_hashes.iter().rev() {
                        stack.push(Frame::Enter(*parent));
                    }
                }
                Frame::Exit(Some(entry)) => relevant.push(entry),
                Frame::Exit(None) => {}
            }
        }
        Ok((relevant, visited.len()))
    }

    /// Replay every event visible from `ref_name` whose partition matches
    /// `pattern` onto `aggregate`, oldest first.
    ///
    /// A pattern that matches nothing leaves the aggregate untouched and is
    /// not an error. Any other failure aborts the replay with the position of
    /// the offending event.
    pub fn rehydrate<E, A>(
        &self,
        ref_name: &str,
        pattern: &str,
        manifest: &Manifest<E>,
        aggregate: &mut A,
    ) -> DagResult<ReplayStats>
    where
        A: Aggregate<E>,
    {
        let span = info_span!("rehydrate", ref_name, pattern);
        let _enter = span.enter();

        let matcher = PartitionPattern::new(pattern)?;
        let head = resolve_head(self.refs, ref_name)?;
        let (relevant, checkpoints_visited) = self.relevant_checkpoints(head, &matcher)?;

        let total: usize = relevant.iter().map(|r| r.events.len()).sum();
        let hashes = relevant.iter().flat_map(|r| r.events.iter());
        for (i, hash) in hashes.enumerate() {
            let position = i + 1;
            let (name, payload) = self.loader.event(hash)?;
            let event = manifest
                .for_name(&name, &payload)
                .map_err(|source| DagError::Manifest {
                    position,
                    total,
                    hash: *hash,
                    source,
                })?;
            aggregate
                .react_to(event)
                .map_err(|e| DagError::Aggregate {
                    position,
                    total,
                    hash: *hash,
                    source: Box::new(e),
                })?;
        }

        let stats = ReplayStats {
            checkpoints_visited,
            relevant_checkpoints: relevant.len(),
            events_applied: total,
        };
        debug!(
            head = %head.short_hex(),
            visited = stats.checkpoints_visited,
            relevant = stats.relevant_checkpoints,
            events = stats.events_applied,
            "rehydrated"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use quill_pack::{JsonPacker, ObjectKind, PackError};
    use quill_refs::RefError;
    use quill_store::{ObjectStore, StoreError};

    fn replay(fx: &Fixture, pattern: &str) -> DagResult<(Tally, ReplayStats)> {
        let mut tally = Tally::default();
        let stats = Rehydrator::new(&fx.objects, &fx.refs).rehydrate(
            MAIN,
            pattern,
            &manifest(),
            &mut tally,
        )?;
        Ok((tally, stats))
    }

    // ---- Oldest-first replay ----

    #[test]
    fn chain_replays_oldest_first() {
        let mut fx = Fixture::new();
        let (e1, e2, e3, e4, e5) = (fx.event(1), fx.event(2), fx.event(3), fx.event(4), fx.event(5));
        let c1 = fx.commit(&[], &[("widget/1", vec![e1, e2])]);
        let c2 = fx.commit(&[c1], &[("widget/1", vec![e3])]);
        let c3 = fx.commit(&[c2], &[("widget/1", vec![e4, e5])]);
        fx.point(MAIN, c3);

        let (tally, stats) = replay(&fx, "widget/1").unwrap();
        assert_eq!(tally.seen, vec![1, 2, 3, 4, 5]);
        assert_eq!(stats.events_applied, 5);
        assert_eq!(stats.relevant_checkpoints, 3);
        assert_eq!(stats.checkpoints_visited, 3);
    }

    #[test]
    fn other_partitions_are_ignored() {
        let mut fx = Fixture::new();
        let (a, b, c) = (fx.event(10), fx.event(20), fx.event(30));
        let c1 = fx.commit(&[], &[("widget/1", vec![a]), ("widget/2", vec![b])]);
        let c2 = fx.commit(&[c1], &[("gadget/1", vec![c])]);
        fx.point(MAIN, c2);

        let (tally, stats) = replay(&fx, "widget/1").unwrap();
        assert_eq!(tally.seen, vec![10]);
        assert_eq!(stats.relevant_checkpoints, 1);
        assert_eq!(stats.checkpoints_visited, 2);
    }

    #[test]
    fn glob_pattern_spans_partitions_in_name_order() {
        let mut fx = Fixture::new();
        let (a, b) = (fx.event(1), fx.event(2));
        let c1 = fx.commit(&[], &[("widget/2", vec![b]), ("widget/1", vec![a])]);
        fx.point(MAIN, c1);

        let (tally, _) = replay(&fx, "widget/*").unwrap();
        assert_eq!(tally.seen, vec![1, 2]);
    }

    // ---- Merges and diamonds ----

    #[test]
    fn merge_visits_both_parents() {
        let mut fx = Fixture::new();
        let (e1, e2, e3, e4) = (fx.event(1), fx.event(2), fx.event(3), fx.event(4));
        let root = fx.commit(&[], &[("w/1", vec![e1])]);
        let left = fx.commit(&[root], &[("w/1", vec![e2])]);
        let right = fx.commit(&[root], &[("w/1", vec![e3])]);
        let merge = fx.commit(&[left, right], &[("w/1", vec![e4])]);
        fx.point(MAIN, merge);

        let (tally, stats) = replay(&fx, "w/1").unwrap();
        // Shared root once, first parent's branch before the second's.
        assert_eq!(tally.seen, vec![1, 2, 3, 4]);
        assert_eq!(stats.checkpoints_visited, 4);
    }

    #[test]
    fn diamond_ancestor_replayed_once_and_first() {
        let mut fx = Fixture::new();
        let (e1, e2, e3) = (fx.event(1), fx.event(2), fx.event(3));
        let root = fx.commit(&[], &[("w/1", vec![e1])]);
        // Middle checkpoints carry no events for the partition.
        let left = fx.commit(&[root], &[]);
        let right = fx.commit(&[root], &[("w/1", vec![e2])]);
        let mid = fx.commit(&[left, right], &[]);
        let tip = fx.commit(&[mid, right], &[("w/1", vec![e3])]);
        fx.point(MAIN, tip);

        let (tally, stats) = replay(&fx, "w/1").unwrap();
        assert_eq!(tally.seen, vec![1, 2, 3]);
        assert_eq!(stats.checkpoints_visited, 5);
    }

    #[test]
    fn relevant_checkpoints_are_topologically_ordered() {
        let mut fx = Fixture::new();
        let e = fx.event(1);
        let root = fx.commit(&[], &[("w/1", vec![e])]);
        let a = fx.commit(&[root], &[("w/1", vec![e])]);
        let b = fx.commit(&[a], &[("w/1", vec![e])]);
        let merge = fx.commit(&[root, b], &[("w/1", vec![e])]);

        let rehydrator = Rehydrator::new(&fx.objects, &fx.refs);
        let pattern = PartitionPattern::new("w/1").unwrap();
        let (relevant, _) = rehydrator.relevant_checkpoints(merge, &pattern).unwrap();
        let order: Vec<Hash> = relevant.iter().map(|r| r.hash).collect();
        assert_eq!(order, vec![root, a, b, merge]);
    }

    // ---- Absent partition ----

    #[test]
    fn absent_partition_is_untouched() {
        let mut fx = Fixture::new();
        let e = fx.event(1);
        let c1 = fx.commit(&[], &[("widget/1", vec![e])]);
        fx.point(MAIN, c1);

        let (tally, stats) = replay(&fx, "nothing/here").unwrap();
        assert!(tally.seen.is_empty());
        assert_eq!(stats.events_applied, 0);
    }

    // ---- Failures ----

    #[test]
    fn unknown_ref_is_wrapped() {
        let fx = Fixture::new();
        assert!(matches!(
            replay(&fx, "w/1"),
            Err(DagError::UnresolvedRef {
                source: RefError::UnknownRef { .. },
                ..
            })
        ));
    }

    #[test]
    fn symbolic_ref_is_followed() {
        let mut fx = Fixture::new();
        let e = fx.event(7);
        let c1 = fx.commit(&[], &[("w/1", vec![e])]);
        fx.point(MAIN, c1);
        fx.refs.write_symbolic("HEAD", MAIN).unwrap();

        let mut tally = Tally::default();
        Rehydrator::new(&fx.objects, &fx.refs)
            .rehydrate("HEAD", "w/1", &manifest(), &mut tally)
            .unwrap();
        assert_eq!(tally.seen, vec![7]);
    }

    #[test]
    fn missing_ancestor_fails_whole_replay() {
        let mut fx = Fixture::new();
        let e = fx.event(1);
        let ghost = Hash::digest_of(b"never written");
        let c1 = fx.commit(&[ghost], &[("w/1", vec![e])]);
        fx.point(MAIN, c1);

        assert!(matches!(
            replay(&fx, "w/1"),
            Err(DagError::Store { hash, source: StoreError::NotFound(_) }) if hash == ghost
        ));
    }

    #[test]
    fn non_event_object_is_hard_error() {
        let mut fx = Fixture::new();
        let e = fx.event(1);
        let bogus = fx.commit(&[], &[]);
        let c1 = fx.commit(&[], &[("w/1", vec![e, bogus])]);
        fx.point(MAIN, c1);

        assert!(matches!(
            replay(&fx, "w/1"),
            Err(DagError::Pack {
                source: PackError::WrongObjectType {
                    expected: ObjectKind::Event,
                    actual: ObjectKind::Checkpoint
                },
                ..
            })
        ));
    }

    #[test]
    fn unknown_event_type_reports_position() {
        let mut fx = Fixture::new();
        let e1 = fx.event(1);
        let stray = JsonPacker
            .pack_event("renamed", &serde_json::json!({"to": "x"}))
            .unwrap();
        fx.objects.write_packed(&stray).unwrap();
        let c1 = fx.commit(&[], &[("w/1", vec![e1, *stray.hash()])]);
        fx.point(MAIN, c1);

        match replay(&fx, "w/1") {
            Err(DagError::Manifest {
                position, total, ..
            }) => {
                assert_eq!((position, total), (2, 2));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn aggregate_error_aborts() {
        let mut fx = Fixture::new();
        let (ok, bad, later) = (fx.event(1), fx.event(-1), fx.event(2));
        let c1 = fx.commit(&[], &[("w/1", vec![ok, bad, later])]);
        fx.point(MAIN, c1);

        let mut tally = Tally::default();
        let err = Rehydrator::new(&fx.objects, &fx.refs)
            .rehydrate(MAIN, "w/1", &manifest(), &mut tally)
            .unwrap_err();
        assert!(matches!(err, DagError::Aggregate { position: 2, total: 3, .. }));
        assert_eq!(tally.seen, vec![1]);
    }

    #[test]
    fn invalid_pattern_fails_before_traversal() {
        let fx = Fixture::new();
        assert!(matches!(
            replay(&fx, "w/["),
            Err(DagError::InvalidPattern { .. })
        ));
    }
}
