//! Greedy correlation clustering with optional fuzzy (multi-membership) labels
//!
//! The pass visits every ordered pair `(row, col)` of the matrix row-major over
//! ascending signal keys. Earlier decisions change which branch later pairs take,
//! so the key order is part of the result.

use crate::semantic::correlation::{round_correlation, CorrelationMatrix};
use crate::types::{AnalysisError, Result, SignalKey, SignalMap};
use std::collections::{BTreeMap, BTreeSet};

/// Cluster label -> member signals, in insertion order
pub type ClusterMap = BTreeMap<usize, Vec<SignalKey>>;

/// Signal -> every label it currently belongs to
pub type Memberships = BTreeMap<SignalKey, BTreeSet<usize>>;

/// Append `key` to every cluster in `labels`
pub(crate) fn append_to_clusters(
    clusters: &mut ClusterMap,
    labels: impl IntoIterator<Item = usize>,
    key: SignalKey,
) -> Result<()> {
    for label in labels {
        clusters
            .get_mut(&label)
            .ok_or(AnalysisError::UnknownClusterLabel(label))?
            .push(key);
    }
    Ok(())
}

/// Cluster the signals of a correlation matrix
pub fn greedy_signal_clustering(
    matrix: &CorrelationMatrix,
    correlation_threshold: f64,
    fuzzy_labeling: bool,
) -> Result<ClusterMap> {
    let keys = matrix.keys();
    let mut memberships: Memberships = BTreeMap::new();
    let mut clusters: ClusterMap = BTreeMap::new();
    let mut new_label = 0usize;

    for (n, row) in keys.iter().enumerate() {
        for (m, col) in keys.iter().enumerate() {
            if n == m {
                continue;
            }
            // NaN never passes
            if !(round_correlation(matrix.get(n, m)) >= correlation_threshold) {
                continue;
            }

            let row_labels = memberships.get(row).cloned();
            let col_labels = memberships.get(col).cloned();

            match (row_labels, col_labels) {
                (None, None) => {
                    log::debug!("New cluster {} for {} and {}", new_label, row, col);
                    clusters.insert(new_label, vec![*row, *col]);
                    memberships.insert(*row, BTreeSet::from([new_label]));
                    memberships.insert(*col, BTreeSet::from([new_label]));
                    new_label += 1;
                }
                (None, Some(col_labels)) => {
                    append_to_clusters(&mut clusters, col_labels.iter().copied(), *row)?;
                    memberships.insert(*row, col_labels);
                }
                (Some(row_labels), None) => {
                    append_to_clusters(&mut clusters, row_labels.iter().copied(), *col)?;
                    memberships.insert(*col, row_labels);
                }
                (Some(_), Some(_)) if !fuzzy_labeling => {}
                (Some(row_labels), Some(col_labels)) => {
                    if row_labels.is_disjoint(&col_labels) {
                        // A relationship no existing cluster captures: bridge cluster
                        log::debug!("Bridge cluster {} for {} and {}", new_label, row, col);
                        clusters.insert(new_label, vec![*row, *col]);
                        memberships.entry(*row).or_default().insert(new_label);
                        memberships.entry(*col).or_default().insert(new_label);
                        new_label += 1;
                    } else {
                        append_to_clusters(&mut clusters, row_labels.difference(&col_labels).copied(), *col)?;
                        append_to_clusters(&mut clusters, col_labels.difference(&row_labels).copied(), *row)?;
                        let union: BTreeSet<usize> = row_labels.union(&col_labels).copied().collect();
                        memberships.insert(*row, union.clone());
                        memberships.insert(*col, union);
                    }
                }
            }
        }
    }

    remove_duplicate_clusters(&mut clusters);
    log::info!("Greedy clustering produced {} cluster(s)", clusters.len());
    Ok(clusters)
}

/// Remove clusters whose member set repeats a lower-labelled cluster
pub fn remove_duplicate_clusters(clusters: &mut ClusterMap) {
    let mut seen: Vec<BTreeSet<SignalKey>> = Vec::new();
    clusters.retain(|label, members| {
        let set: BTreeSet<SignalKey> = members.iter().copied().collect();
        if seen.contains(&set) {
            log::trace!("Cluster {} duplicates an earlier cluster", label);
            false
        } else {
            seen.push(set);
            true
        }
    });
}

/// Remove clusters with fewer than two distinct members
pub fn remove_singleton_clusters(clusters: &mut ClusterMap) {
    clusters.retain(|_, members| members.iter().collect::<BTreeSet<_>>().len() > 1);
}

/// Fail if a cluster names a signal the signal map does not hold
pub fn validate_clusters(clusters: &ClusterMap, signals: &SignalMap) -> Result<()> {
    for (label, members) in clusters {
        for key in members {
            let present = signals
                .get(&key.arbitration_id)
                .map(|by_key| by_key.contains_key(key))
                .unwrap_or(false);
            if !present {
                return Err(AnalysisError::InconsistentCluster { label: *label, key: *key });
            }
        }
    }
    Ok(())
}
