use serde::Serialize;

use super::{Cable, CableCore, Connection, Customer, Endpoint, Node, RxPowerClass};

/// A core-to-core splice as shown in the matrix view
#[derive(Debug, Clone, Serialize)]
pub struct MatrixConnection {
    pub connection_id: i64,
    pub input_core_id: i64,
    pub output_core_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loss_db: Option<f64>,
}

/// Integrity findings for the cores referenced by a set of connections
#[derive(Debug, Clone, Default, Serialize)]
pub struct MatrixConsistency {
    pub consistent: bool,
    /// Cores on the same side (input or output) of more than one connection.
    /// A core leaving one splice and entering the next is not a duplicate.
    pub duplicate_cores: Vec<i64>,
    /// Referenced core ids with no matching core row
    pub dangling_cores: Vec<i64>,
    /// Referenced cores whose state is not USED
    pub state_mismatches: Vec<i64>,
}

/// Splice matrix at one location (or for the whole network when
/// `location_node` is absent)
#[derive(Debug, Clone, Serialize)]
pub struct SpliceMatrix {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_node: Option<Node>,
    pub input_cores: Vec<CableCore>,
    pub output_cores: Vec<CableCore>,
    pub connections: Vec<MatrixConnection>,
    /// Connections with at least one port endpoint
    pub other_connections: Vec<Connection>,
    pub consistency: MatrixConsistency,
}

/// Why a trace stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceTermination {
    ReachedHeadEnd,
    NoConnections,
    DeadEnd,
    HopLimit,
}

impl TraceTermination {
    pub fn is_valid(self) -> bool {
        self == TraceTermination::ReachedHeadEnd
    }
}

/// One traversed connection on the way to the head-end
#[derive(Debug, Clone, Serialize)]
pub struct TraceHop {
    pub sequence: usize,
    pub connection_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<Node>,
    pub input: Endpoint,
    pub output: Endpoint,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub core: Option<CableCore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cable: Option<Cable>,
    pub loss_db: f64,
    pub cumulative_loss_db: f64,
}

/// Customer path trace with its loss budget
#[derive(Debug, Clone, Serialize)]
pub struct CustomerTrace {
    pub customer: Customer,
    pub trace_path: Vec<TraceHop>,
    pub total_loss_db: f64,
    pub total_hops: usize,
    pub trace_valid: bool,
    pub termination: TraceTermination,
    pub cycle_detected: bool,
    /// Hop sequence numbers where more than one connection matched
    pub ambiguous_hops: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rx_power_status: Option<RxPowerClass>,
}
