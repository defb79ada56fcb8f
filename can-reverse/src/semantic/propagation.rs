//! Label propagation from the clustered subset to the whole signal population

use crate::semantic::clustering::{append_to_clusters, ClusterMap, Memberships};
use crate::semantic::correlation::{round_correlation, CorrelationMatrix};
use crate::types::Result;

/// Extend existing clusters with correlated, not yet clustered signals.
///
/// Uses the same rounded threshold test as the greedy pass but never allocates a
/// label and never bridges: the cluster count cannot grow.
pub fn label_propagation(
    matrix: &CorrelationMatrix,
    clusters: &mut ClusterMap,
    correlation_threshold: f64,
) -> Result<()> {
    let mut memberships: Memberships = Memberships::new();
    for (label, members) in clusters.iter() {
        for key in members {
            memberships.entry(*key).or_default().insert(*label);
        }
    }

    let keys = matrix.keys();
    let mut added = 0usize;
    for (n, row) in keys.iter().enumerate() {
        for (m, col) in keys.iter().enumerate() {
            if n == m || !(round_correlation(matrix.get(n, m)) >= correlation_threshold) {
                continue;
            }

            match (memberships.get(row).cloned(), memberships.get(col).cloned()) {
                (Some(row_labels), None) => {
                    append_to_clusters(clusters, row_labels.iter().copied(), *col)?;
                    memberships.insert(*col, row_labels);
                    added += 1;
                }
                (None, Some(col_labels)) => {
                    append_to_clusters(clusters, col_labels.iter().copied(), *row)?;
                    memberships.insert(*row, col_labels);
                    added += 1;
                }
                _ => {}
            }
        }
    }

    log::info!("Label propagation added {} signal(s) to {} cluster(s)", added, clusters.len());
    Ok(())
}
