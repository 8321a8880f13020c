//! Customer path tracing over the implicit connection graph.
//!
//! Connections chain when the output endpoint of one equals the input
//! endpoint of the next. The graph is indexed once per trace and walked
//! from the customer's serving node toward the head-end.

use std::collections::{HashMap, HashSet};

use crate::models::{
    Cable, CableCore, Connection, Customer, CustomerTrace, Endpoint, Node, NodeType, TraceHop,
    TraceTermination,
};

/// Default bound on traversed connections
pub const DEFAULT_MAX_HOPS: usize = 20;

/// Adjacency index over a connection snapshot. Buckets are sorted by id so
/// the first candidate is always the lowest id.
pub struct ConnectionIndex<'a> {
    by_input: HashMap<Endpoint, Vec<&'a Connection>>,
    by_location: HashMap<i64, Vec<&'a Connection>>,
}

impl<'a> ConnectionIndex<'a> {
    pub fn build(connections: &'a [Connection]) -> Self {
        let mut by_input: HashMap<Endpoint, Vec<&'a Connection>> = HashMap::new();
        let mut by_location: HashMap<i64, Vec<&'a Connection>> = HashMap::new();

        for conn in connections {
            by_input.entry(conn.input()).or_default().push(conn);
            if let Some(location) = conn.location_node_id {
                by_location.entry(location).or_default().push(conn);
            }
        }
        for bucket in by_input.values_mut().chain(by_location.values_mut()) {
            bucket.sort_by_key(|c| c.id);
        }

        Self { by_input, by_location }
    }

    /// Connections whose input endpoint is `endpoint`
    pub fn next_from(&self, endpoint: Endpoint) -> &[&'a Connection] {
        self.by_input.get(&endpoint).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Connections physically located at `node_id`
    pub fn located_at(&self, node_id: i64) -> &[&'a Connection] {
        self.by_location.get(&node_id).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Result of walking the graph, before hop details are resolved
#[derive(Debug, Clone)]
pub struct Walk {
    pub hops: Vec<Connection>,
    pub termination: TraceTermination,
    pub cycle_detected: bool,
    pub ambiguous_hops: Vec<usize>,
}

impl Walk {
    fn empty() -> Self {
        Self {
            hops: Vec::new(),
            termination: TraceTermination::NoConnections,
            cycle_detected: false,
            ambiguous_hops: Vec::new(),
        }
    }

    /// Location node ids of traversed connections, deduplicated
    pub fn node_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.hops.iter().filter_map(|c| c.location_node_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Core ids on the output side of traversed connections, deduplicated
    pub fn output_core_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.hops.iter().filter_map(|c| c.output().core_id()).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

/// Walk from `start_node` toward a head-end.
///
/// `node_types` maps node id to type and is used for head-end detection.
/// The walk stops at the first traversed connection located at a head-end,
/// when no connection chains further, or after `max_hops` connections.
/// Revisiting a connection marks the walk as cyclic but does not stop it.
pub fn walk(
    connections: &[Connection],
    start_node: Option<i64>,
    node_types: &HashMap<i64, NodeType>,
    max_hops: usize,
) -> Walk {
    let index = ConnectionIndex::build(connections);
    let mut result = Walk::empty();

    let Some(start_node) = start_node else {
        return result;
    };
    let start = index.located_at(start_node);
    let Some(&first) = start.first() else {
        return result;
    };
    if start.len() > 1 {
        result.ambiguous_hops.push(1);
    }

    let mut visited: HashSet<i64> = HashSet::new();
    let mut current = first;

    loop {
        if result.hops.len() >= max_hops {
            result.termination = TraceTermination::HopLimit;
            break;
        }

        if !visited.insert(current.id) {
            result.cycle_detected = true;
        }
        result.hops.push(current.clone());

        let at_head_end = current
            .location_node_id
            .and_then(|id| node_types.get(&id))
            .is_some_and(|t| t.is_head_end());
        if at_head_end {
            result.termination = TraceTermination::ReachedHeadEnd;
            break;
        }

        let candidates = index.next_from(current.output());
        let Some(&next) = candidates.first() else {
            result.termination = TraceTermination::DeadEnd;
            break;
        };
        if candidates.len() > 1 {
            result.ambiguous_hops.push(result.hops.len() + 1);
        }
        current = next;
    }

    result
}

/// Records referenced by the traversed hops
#[derive(Debug, Clone, Default)]
pub struct HopDetails {
    pub nodes: HashMap<i64, Node>,
    pub cores: HashMap<i64, CableCore>,
    pub cables: HashMap<i64, Cable>,
}

/// Combine a walk with its resolved records into the trace response
pub fn assemble(customer: Customer, walk: Walk, details: &HopDetails) -> CustomerTrace {
    let mut cumulative = 0.0;
    let mut trace_path = Vec::with_capacity(walk.hops.len());

    for (i, conn) in walk.hops.iter().enumerate() {
        let loss = conn.effective_loss();
        cumulative += loss;

        let core = conn
            .output()
            .core_id()
            .and_then(|id| details.cores.get(&id))
            .cloned();
        let cable = core
            .as_ref()
            .and_then(|c| details.cables.get(&c.cable_id))
            .cloned();

        trace_path.push(TraceHop {
            sequence: i + 1,
            connection_id: conn.id,
            node: conn
                .location_node_id
                .and_then(|id| details.nodes.get(&id))
                .cloned(),
            input: conn.input(),
            output: conn.output(),
            core,
            cable,
            loss_db: loss,
            cumulative_loss_db: cumulative,
        });
    }

    let rx_power_status = customer.rx_power_class();
    CustomerTrace {
        customer,
        total_hops: trace_path.len(),
        total_loss_db: cumulative,
        trace_path,
        trace_valid: walk.termination.is_valid(),
        termination: walk.termination,
        cycle_detected: walk.cycle_detected,
        ambiguous_hops: walk.ambiguous_hops,
        rx_power_status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CustomerStatus, EndpointType, RxPowerClass};
    use chrono::Utc;

    fn conn(id: i64, location: i64, input: Endpoint, output: Endpoint, loss: Option<f64>) -> Connection {
        Connection {
            id,
            location_node_id: Some(location),
            input_type: input.kind,
            input_id: input.id,
            output_type: output.kind,
            output_id: output.id,
            loss_db: loss,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn customer(node_id: Option<i64>) -> Customer {
        Customer {
            id: 1,
            node_id,
            name: "Subscriber".to_string(),
            ont_sn: Some("ZTEG00000001".to_string()),
            phone: None,
            email: None,
            current_status: CustomerStatus::Online,
            last_rx_power: Some(-26.0),
            subscription_type: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// Nodes 1..=3 are distribution points, node 10 is the OLT
    fn types() -> HashMap<i64, NodeType> {
        HashMap::from([
            (1, NodeType::Odp),
            (2, NodeType::Odc),
            (3, NodeType::Closure),
            (10, NodeType::Olt),
        ])
    }

    fn three_hop_chain() -> Vec<Connection> {
        vec![
            conn(1, 1, Endpoint::port(500), Endpoint::core(11), Some(0.5)),
            conn(2, 2, Endpoint::core(11), Endpoint::core(21), Some(0.3)),
            conn(3, 10, Endpoint::core(21), Endpoint::port(900), Some(0.2)),
        ]
    }

    #[test]
    fn test_no_connections_at_node() {
        let walk = walk(&three_hop_chain(), Some(3), &types(), DEFAULT_MAX_HOPS);
        assert!(walk.hops.is_empty());
        assert_eq!(walk.termination, TraceTermination::NoConnections);

        let trace = assemble(customer(Some(3)), walk, &HopDetails::default());
        assert_eq!(trace.total_hops, 0);
        assert!(!trace.trace_valid);
        assert_eq!(trace.total_loss_db, 0.0);
    }

    #[test]
    fn test_customer_without_node() {
        let walk = walk(&three_hop_chain(), None, &types(), DEFAULT_MAX_HOPS);
        assert_eq!(walk.termination, TraceTermination::NoConnections);
        assert!(walk.hops.is_empty());
    }

    #[test]
    fn test_chain_reaches_head_end() {
        let walk = walk(&three_hop_chain(), Some(1), &types(), DEFAULT_MAX_HOPS);
        assert_eq!(walk.termination, TraceTermination::ReachedHeadEnd);
        assert_eq!(walk.node_ids(), vec![1, 2, 10]);
        assert_eq!(walk.output_core_ids(), vec![11, 21]);

        let trace = assemble(customer(Some(1)), walk, &HopDetails::default());
        assert!(trace.trace_valid);
        assert_eq!(trace.total_hops, 3);
        assert!((trace.total_loss_db - 1.0).abs() < 1e-9);
        assert!((trace.trace_path[1].cumulative_loss_db - 0.8).abs() < 1e-9);
        assert_eq!(
            trace.trace_path.iter().map(|h| h.sequence).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(!trace.cycle_detected);
        assert!(trace.ambiguous_hops.is_empty());
        assert_eq!(trace.rx_power_status, Some(RxPowerClass::Warning));
    }

    #[test]
    fn test_dead_end_is_invalid() {
        let chain = vec![
            conn(1, 1, Endpoint::port(500), Endpoint::core(11), Some(0.5)),
            conn(2, 2, Endpoint::core(11), Endpoint::core(21), None),
        ];
        let walk = walk(&chain, Some(1), &types(), DEFAULT_MAX_HOPS);
        assert_eq!(walk.termination, TraceTermination::DeadEnd);
        assert_eq!(walk.hops.len(), 2);

        let trace = assemble(customer(Some(1)), walk, &HopDetails::default());
        assert!(!trace.trace_valid);
        // unknown loss counts as zero
        assert_eq!(trace.total_loss_db, 0.5);
    }

    #[test]
    fn test_cycle_stops_at_bound() {
        let cyclic = vec![
            conn(1, 1, Endpoint::core(1), Endpoint::core(2), Some(0.1)),
            conn(2, 2, Endpoint::core(2), Endpoint::core(1), Some(0.1)),
        ];
        let walk = walk(&cyclic, Some(1), &types(), DEFAULT_MAX_HOPS);
        assert_eq!(walk.termination, TraceTermination::HopLimit);
        assert_eq!(walk.hops.len(), DEFAULT_MAX_HOPS);
        assert!(walk.cycle_detected);

        let trace = assemble(customer(Some(1)), walk, &HopDetails::default());
        assert!(!trace.trace_valid);
        assert_eq!(trace.total_hops, 20);
    }

    #[test]
    fn test_self_loop_terminates() {
        let looped = vec![conn(1, 1, Endpoint::core(5), Endpoint::core(5), None)];
        let walk = walk(&looped, Some(1), &types(), 7);
        assert_eq!(walk.termination, TraceTermination::HopLimit);
        assert_eq!(walk.hops.len(), 7);
        assert!(walk.cycle_detected);
    }

    #[test]
    fn test_long_acyclic_chain_hits_bound() {
        let chain: Vec<Connection> = (1..=30)
            .map(|i| conn(i, 2, Endpoint::core(i), Endpoint::core(i + 1), None))
            .collect();
        let walk = walk(&chain, Some(2), &types(), DEFAULT_MAX_HOPS);
        assert_eq!(walk.termination, TraceTermination::HopLimit);
        assert_eq!(walk.hops.len(), 20);
        assert!(!walk.cycle_detected);
    }

    #[test]
    fn test_fan_out_takes_lowest_id() {
        let chain = vec![
            conn(1, 1, Endpoint::port(500), Endpoint::core(11), None),
            conn(9, 3, Endpoint::core(11), Endpoint::core(99), None),
            conn(4, 10, Endpoint::core(11), Endpoint::port(900), None),
        ];
        let walk = walk(&chain, Some(1), &types(), DEFAULT_MAX_HOPS);
        assert_eq!(walk.hops.iter().map(|c| c.id).collect::<Vec<_>>(), vec![1, 4]);
        assert_eq!(walk.termination, TraceTermination::ReachedHeadEnd);
        assert_eq!(walk.ambiguous_hops, vec![2]);
    }

    #[test]
    fn test_ambiguous_start() {
        let chain = vec![
            conn(7, 1, Endpoint::port(501), Endpoint::port(601), None),
            conn(3, 1, Endpoint::port(500), Endpoint::port(600), None),
        ];
        let walk = walk(&chain, Some(1), &types(), DEFAULT_MAX_HOPS);
        assert_eq!(walk.hops[0].id, 3);
        assert_eq!(walk.ambiguous_hops, vec![1]);
        assert_eq!(walk.termination, TraceTermination::DeadEnd);
    }

    #[test]
    fn test_endpoint_type_is_part_of_join_key() {
        let chain = vec![
            conn(1, 1, Endpoint::port(500), Endpoint::core(11), None),
            conn(2, 10, Endpoint::port(11), Endpoint::port(900), None),
        ];
        let walk = walk(&chain, Some(1), &types(), DEFAULT_MAX_HOPS);
        assert_eq!(walk.termination, TraceTermination::DeadEnd);
        assert_eq!(walk.hops.len(), 1);
        assert_eq!(walk.hops[0].output_type, EndpointType::Core);
    }

    #[test]
    fn test_assemble_resolves_core_and_cable() {
        let walk = walk(&three_hop_chain(), Some(1), &types(), DEFAULT_MAX_HOPS);
        let now = Utc::now();
        let mut details = HopDetails::default();
        details.cores.insert(
            11,
            CableCore {
                id: 11,
                cable_id: 5,
                core_index: 3,
                tube_color: Some("Blue".to_string()),
                core_color: Some("Green".to_string()),
                status: crate::models::CoreStatus::Used,
                created_at: now,
                updated_at: now,
            },
        );

        let trace = assemble(customer(Some(1)), walk, &details);
        let first = &trace.trace_path[0];
        assert_eq!(first.core.as_ref().map(|c| c.core_index), Some(3));
        // cable 5 was not resolved
        assert!(first.cable.is_none());
        assert!(trace.trace_path[2].core.is_none());
    }
}
