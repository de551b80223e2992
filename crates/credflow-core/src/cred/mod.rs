pub mod engine;
pub mod interval;
pub mod timeline;

pub use engine::{compute_cred, Convergence, ConvergenceWarning, CredScores};
pub use interval::{graph_intervals, mint_vector, partition, validate_intervals, Interval, WEEK_MS};
pub use timeline::{compute_timeline_cred, CancellationToken, CredTotals, TimelineCredScores};
