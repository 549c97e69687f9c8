//! Cheap queries over the partitions visible from a ref.

use std::collections::BTreeSet;
use std::ops::ControlFlow;

use quill_refs::RefStore;
use quill_store::ObjectStore;
use quill_types::PartitionName;
use tracing::debug;

use crate::error::DagResult;
use crate::matcher::PartitionPattern;
use crate::rehydrate::resolve_head;
use crate::walk::{visit_reachable, ObjectLoader};

/// Whether any affix reachable from `ref_name` has a partition matching
/// `pattern`.
///
/// Stops at the first match; every parent of a merge is considered until
/// then.
pub fn partition_exists<O, R>(objects: &O, refs: &R, ref_name: &str, pattern: &str) -> DagResult<bool>
where
    O: ObjectStore + ?Sized,
    R: RefStore + ?Sized,
{
    let matcher = PartitionPattern::new(pattern)?;
    let head = resolve_head(refs, ref_name)?;
    let loader = ObjectLoader::new(objects);

    let found = visit_reachable(&loader, head, |hash, _, affix| {
        if affix.partitions().any(|p| matcher.matches(p.as_str())) {
            debug!(checkpoint = %hash.short_hex(), pattern, "partition found");
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    })?;
    Ok(found)
}

/// Every partition matching `pattern` that appears in an affix reachable
/// from `ref_name`, sorted by name.
pub fn list_partitions<O, R>(
    objects: &O,
    refs: &R,
    ref_name: &str,
    pattern: &str,
) -> DagResult<Vec<PartitionName>>
where
    O: ObjectStore + ?Sized,
    R: RefStore + ?Sized,
{
    let matcher = PartitionPattern::new(pattern)?;
    let head = resolve_head(refs, ref_name)?;
    let loader = ObjectLoader::new(objects);

    let mut found = BTreeSet::new();
    visit_reachable(&loader, head, |_, _, affix| {
        found.extend(
            affix
                .partitions()
                .filter(|p| matcher.matches(p.as_str()))
                .cloned(),
        );
        ControlFlow::Continue(())
    })?;
    Ok(found.into_iter().collect())
}
