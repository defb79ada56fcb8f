//! Semantic analysis: relating signals across arbitration IDs
//!
//! Correlation matrices are computed over signals aligned on a shared time axis,
//! then grouped by the greedy clusterer and extended by label propagation.

pub mod clustering;
pub mod correlation;
pub mod frame;
pub mod labeling;
pub mod propagation;

// Re-export key types for convenience
pub use clustering::{
    greedy_signal_clustering, remove_duplicate_clusters, remove_singleton_clusters,
    validate_clusters, ClusterMap, Memberships,
};
pub use correlation::{pearson_correlation, round_correlation, CorrelationMatrix};
pub use frame::{non_static_signals, reindex_nearest, subset_selection, SignalFrame};
pub use labeling::{known_signal_labeling, KnownMatch};
pub use propagation::label_propagation;
