//! Soil group simplification.
//!
//! Each mapping unit points to a group of up to ten sub-soils. Records with
//! identical metrics are merged (shares summed); when distinct soils remain
//! the group is optionally collapsed onto its dominant soil.

use std::collections::BTreeMap;

#[cfg(feature = "threading")]
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::SimplifyConfig;
use crate::error::{RecordError, RecordId, Result};
use crate::record::{MuGlobal, SoilRecord};

/// Share assigned to the dominant soil when a group is collapsed.
pub const DOMINANT_SHARE: f64 = 100.0;

/// What happened to one mapping unit's soil group.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupOutcome {
    /// No records; the key is skipped.
    Empty,
    /// A lone record, or duplicates that merged into one.
    Merged(SoilRecord),
    /// Distinct soils collapsed onto the one with the largest share.
    Dominant { record: SoilRecord, distinct: usize },
    /// Distinct soils remain and dominant-soil reduction is off. The key is
    /// dropped from the output.
    Unresolved { distinct: usize },
}

impl GroupOutcome {
    /// Sub-soil count after duplicate merging.
    pub fn sub_soils(&self) -> usize {
        match self {
            GroupOutcome::Empty => 0,
            GroupOutcome::Merged(_) => 1,
            GroupOutcome::Dominant { distinct, .. } | GroupOutcome::Unresolved { distinct } => *distinct,
        }
    }

    /// Records to emit for the key, if any.
    pub fn into_records(self) -> Option<Vec<SoilRecord>> {
        match self {
            GroupOutcome::Merged(record) | GroupOutcome::Dominant { record, .. } => Some(vec![record]),
            GroupOutcome::Empty | GroupOutcome::Unresolved { .. } => None,
        }
    }
}

/// Counters reported after a simplification pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimplifyStats {
    pub groups_in: usize,
    pub groups_out: usize,
    /// Sub-soils across all well-formed input groups.
    pub sub_soils_raw: usize,
    /// Sub-soils after duplicate merging, before dominance reduction.
    pub sub_soils_merged: usize,
    pub empty_groups: usize,
    pub dominant_groups: usize,
    /// Keys dropped because distinct soils remained.
    pub unresolved: Vec<MuGlobal>,
}

/// Output of [`simplify_soil_groups`].
#[derive(Debug, Default)]
pub struct SoilSimplification {
    pub groups: BTreeMap<MuGlobal, Vec<SoilRecord>>,
    pub stats: SimplifyStats,
    pub rejected: Vec<RecordError>,
}

/// Sort the group and merge neighbours whose metrics are exactly equal,
/// summing their shares.
pub fn merge_duplicates(group: &[SoilRecord]) -> Vec<SoilRecord> {
    let mut sorted = group.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mut merged: Vec<SoilRecord> = Vec::with_capacity(sorted.len());
    for record in sorted {
        match merged.last_mut() {
            Some(last) if last.metrics() == record.metrics() => {
                let share = last.share() + record.share();
                last.set_share(share);
            }
            _ => merged.push(record),
        }
    }
    merged
}

/// First record holding the largest share. Ties keep sort order.
pub fn dominant_soil(records: &[SoilRecord]) -> Option<&SoilRecord> {
    records.iter().fold(None, |best, record| match best {
        Some(b) if b.share() >= record.share() => Some(b),
        _ => Some(record),
    })
}

/// Simplify the soil group of a single mapping unit.
pub fn simplify_soil_group(key: MuGlobal, group: &[SoilRecord], config: &SimplifyConfig) -> Result<GroupOutcome> {
    for record in group {
        config.shape.check(key, record)?;
    }

    match group {
        [] => return Ok(GroupOutcome::Empty),
        [single] => return Ok(GroupOutcome::Merged(single.clone())),
        _ => {}
    }

    let mut merged = merge_duplicates(group);
    if merged.len() == 1 {
        return Ok(GroupOutcome::Merged(merged.remove(0)));
    }

    let distinct = merged.len();
    if !config.use_dominant_soil {
        return Ok(GroupOutcome::Unresolved { distinct });
    }

    let record = match dominant_soil(&merged) {
        Some(dom) => dom.clone().with_share(DOMINANT_SHARE),
        None => return Ok(GroupOutcome::Empty),
    };
    debug!(mu_global = key, distinct, "collapsed soil group onto dominant soil");
    Ok(GroupOutcome::Dominant { record, distinct })
}

/// Simplify every soil group. Input is left untouched; malformed groups are
/// reported in `rejected` and the rest of the batch carries on.
pub fn simplify_soil_groups(
    groups: &BTreeMap<MuGlobal, Vec<SoilRecord>>,
    config: &SimplifyConfig,
) -> SoilSimplification {
    #[cfg(feature = "threading")]
    let outcomes: Vec<(MuGlobal, usize, Result<GroupOutcome>)> = groups
        .par_iter()
        .map(|(&key, group)| (key, group.len(), simplify_soil_group(key, group, config)))
        .collect();
    #[cfg(not(feature = "threading"))]
    let outcomes: Vec<(MuGlobal, usize, Result<GroupOutcome>)> = groups
        .iter()
        .map(|(&key, group)| (key, group.len(), simplify_soil_group(key, group, config)))
        .collect();

    let mut out = SoilSimplification::default();
    out.stats.groups_in = groups.len();

    for (key, n_raw, outcome) in outcomes {
        let outcome = match outcome {
            Ok(o) => o,
            Err(error) => {
                warn!(mu_global = key, %error, "skipping malformed soil group");
                out.rejected.push(RecordError { id: RecordId::SoilGroup(key), error });
                continue;
            }
        };

        out.stats.sub_soils_raw += n_raw;
        out.stats.sub_soils_merged += outcome.sub_soils();
        match &outcome {
            GroupOutcome::Empty => out.stats.empty_groups += 1,
            GroupOutcome::Dominant { .. } => out.stats.dominant_groups += 1,
            GroupOutcome::Unresolved { distinct } => {
                warn!(
                    mu_global = key,
                    distinct,
                    "mapping unit dropped: distinct soils remain and dominant soil is disabled"
                );
                out.stats.unresolved.push(key);
            }
            GroupOutcome::Merged(_) => {}
        }

        if let Some(records) = outcome.into_records() {
            out.groups.insert(key, records);
        }
    }
    out.stats.groups_out = out.groups.len();

    info!(
        records_in = out.stats.groups_in,
        records_out = out.stats.groups_out,
        raw_sub_soils = out.stats.sub_soils_raw,
        after_compression = out.stats.sub_soils_merged,
        "simplified soil records"
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SoilError;
    use crate::record::RecordShape;

    fn rec(values: &[f64]) -> SoilRecord {
        SoilRecord::new(values.to_vec())
    }

    fn cfg(use_dominant_soil: bool) -> SimplifyConfig {
        SimplifyConfig::new(use_dominant_soil, RecordShape::new(3))
    }

    #[test]
    fn single_record_passes_through_unchanged() {
        let group = vec![rec(&[2.1, 1.4, 5.5, 37.0])];
        let outcome = simplify_soil_group(9, &group, &cfg(true)).unwrap();
        assert_eq!(outcome, GroupOutcome::Merged(group[0].clone()));
    }

    #[test]
    fn identical_metrics_merge_into_one() {
        let group = vec![rec(&[1.0, 1.3, 6.5, 60.0]), rec(&[1.0, 1.3, 6.5, 40.0])];
        for dominant in [true, false] {
            let outcome = simplify_soil_group(42, &group, &cfg(dominant)).unwrap();
            assert_eq!(outcome, GroupOutcome::Merged(rec(&[1.0, 1.3, 6.5, 100.0])));
        }
    }

    #[test]
    fn merge_conserves_share_per_metric_set() {
        let group = vec![
            rec(&[2.0, 1.0, 7.0, 10.0]),
            rec(&[1.0, 1.0, 7.0, 25.0]),
            rec(&[2.0, 1.0, 7.0, 30.0]),
            rec(&[1.0, 1.0, 7.0, 5.0]),
        ];
        let merged = merge_duplicates(&group);
        assert_eq!(merged, vec![rec(&[1.0, 1.0, 7.0, 30.0]), rec(&[2.0, 1.0, 7.0, 40.0])]);
    }

    #[test]
    fn dominant_soil_takes_full_share() {
        let group = vec![
            rec(&[1.0, 1.2, 6.0, 20.0]),
            rec(&[3.0, 1.5, 5.0, 45.0]),
            rec(&[1.0, 1.2, 6.0, 20.0]),
            rec(&[0.5, 1.1, 7.0, 15.0]),
        ];
        // Merged shares: [0.5..]=15, [1.0..]=40, [3.0..]=45.
        match simplify_soil_group(5, &group, &cfg(true)).unwrap() {
            GroupOutcome::Dominant { record, distinct } => {
                assert_eq!(distinct, 3);
                assert_eq!(record.metrics(), &[3.0, 1.5, 5.0]);
                assert_eq!(record.share(), 100.0);
            }
            other => panic!("expected dominant outcome, got {other:?}"),
        }
    }

    #[test]
    fn dominance_uses_post_merge_share() {
        // Two 30 % halves of one soil beat a single 50 % soil.
        let group = vec![rec(&[9.0, 9.0, 9.0, 50.0]), rec(&[1.0, 1.0, 1.0, 30.0]), rec(&[1.0, 1.0, 1.0, 30.0])];
        let outcome = simplify_soil_group(1, &group, &cfg(true)).unwrap();
        assert_eq!(outcome.into_records(), Some(vec![rec(&[1.0, 1.0, 1.0, 100.0])]));
    }

    #[test]
    fn share_ties_resolve_to_first_in_sort_order() {
        let group = vec![rec(&[4.0, 1.0, 6.0, 50.0]), rec(&[2.0, 1.0, 6.0, 50.0])];
        let outcome = simplify_soil_group(3, &group, &cfg(true)).unwrap();
        assert_eq!(outcome.into_records(), Some(vec![rec(&[2.0, 1.0, 6.0, 100.0])]));
    }

    #[test]
    fn signed_zero_metrics_merge() {
        let group = vec![rec(&[-0.0, 1.0, 10.0]), rec(&[0.0, 0.0, 25.0]), rec(&[0.0, 1.0, 20.0])];
        let config = SimplifyConfig::new(true, RecordShape::new(2));

        let merged = merge_duplicates(&group);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[1].share(), 30.0);

        match simplify_soil_group(21, &group, &config).unwrap() {
            GroupOutcome::Dominant { record, distinct } => {
                assert_eq!(distinct, 2);
                assert_eq!(record.metrics(), &[0.0, 1.0]);
                assert_eq!(record.share(), 100.0);
            }
            other => panic!("expected dominant outcome, got {other:?}"),
        }
    }

    #[test]
    fn distinct_soils_without_dominance_are_unresolved() {
        let group = vec![rec(&[1.0, 1.0, 6.0, 70.0]), rec(&[2.0, 1.0, 6.0, 30.0])];
        let outcome = simplify_soil_group(8, &group, &cfg(false)).unwrap();
        assert_eq!(outcome, GroupOutcome::Unresolved { distinct: 2 });
        assert_eq!(outcome.into_records(), None);
    }

    #[test]
    fn wrong_shape_is_malformed() {
        let group = vec![rec(&[1.0, 1.0, 6.0, 70.0]), rec(&[2.0, 30.0])];
        let err = simplify_soil_group(11, &group, &cfg(true)).unwrap_err();
        assert!(matches!(err, SoilError::MalformedRecord { key: 11, expected: 4, found: 2 }));
    }

    #[test]
    fn batch_skips_bad_keys_and_counts() {
        let mut groups = BTreeMap::new();
        groups.insert(1, vec![rec(&[1.0, 1.0, 6.0, 100.0])]);
        groups.insert(2, vec![]);
        groups.insert(3, vec![rec(&[1.0, 1.0, 6.0, 60.0]), rec(&[1.0, 1.0, 6.0, 40.0])]);
        groups.insert(4, vec![rec(&[1.0, 1.0, 6.0, 60.0]), rec(&[2.0, 1.0, 6.0, 40.0])]);
        groups.insert(5, vec![rec(&[1.0, 60.0])]);
        let before = groups.clone();

        let out = simplify_soil_groups(&groups, &cfg(false));
        assert_eq!(groups, before);
        assert_eq!(out.groups.keys().copied().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(out.rejected.len(), 1);
        assert_eq!(out.rejected[0].id, RecordId::SoilGroup(5));

        let stats = &out.stats;
        assert_eq!(stats.groups_in, 5);
        assert_eq!(stats.groups_out, 2);
        assert_eq!(stats.sub_soils_raw, 5);
        assert_eq!(stats.sub_soils_merged, 4);
        assert_eq!(stats.empty_groups, 1);
        assert_eq!(stats.unresolved, vec![4]);

        let out = simplify_soil_groups(&groups, &cfg(true));
        assert_eq!(out.groups[&4], vec![rec(&[1.0, 1.0, 6.0, 100.0])]);
        assert_eq!(out.stats.dominant_groups, 1);
    }
}
