//! Splice matrix: the core-to-core mapping at a location, plus an integrity
//! report over every core the snapshot references.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::models::{
    CableCore, Connection, CoreStatus, MatrixConnection, MatrixConsistency, Node, SpliceMatrix,
};

/// Partition a connection snapshot into matrix edges and other connections.
///
/// `cores` holds the core rows referenced by the snapshot; any referenced id
/// missing from it is reported as dangling.
pub fn build_matrix(
    location_node: Option<Node>,
    mut connections: Vec<Connection>,
    cores: &HashMap<i64, CableCore>,
) -> SpliceMatrix {
    connections.sort_by_key(|c| c.id);

    let consistency = check_consistency(&connections, cores);

    let mut matrix = Vec::new();
    let mut other_connections = Vec::new();
    let mut input_ids = Vec::new();
    let mut output_ids = Vec::new();

    for conn in connections {
        if conn.is_core_splice() {
            input_ids.push(conn.input_id);
            output_ids.push(conn.output_id);
            matrix.push(MatrixConnection {
                connection_id: conn.id,
                input_core_id: conn.input_id,
                output_core_id: conn.output_id,
                loss_db: conn.loss_db,
            });
        } else {
            other_connections.push(conn);
        }
    }

    SpliceMatrix {
        location_node,
        input_cores: resolve(&input_ids, cores),
        output_cores: resolve(&output_ids, cores),
        connections: matrix,
        other_connections,
        consistency,
    }
}

/// Core rows for `ids` in first-seen order, skipping unknown and repeated ids
fn resolve(ids: &[i64], cores: &HashMap<i64, CableCore>) -> Vec<CableCore> {
    let mut seen = HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(**id))
        .filter_map(|id| cores.get(id).cloned())
        .collect()
}

/// Check that each referenced core exists, is used by exactly one
/// connection, and is marked USED.
pub fn check_consistency(
    connections: &[Connection],
    cores: &HashMap<i64, CableCore>,
) -> MatrixConsistency {
    // (as input, as output) reference counts per core
    let mut references: BTreeMap<i64, (usize, usize)> = BTreeMap::new();
    for conn in connections {
        if let Some(core_id) = conn.input().core_id() {
            references.entry(core_id).or_default().0 += 1;
        }
        if let Some(core_id) = conn.output().core_id() {
            references.entry(core_id).or_default().1 += 1;
        }
    }

    let mut report = MatrixConsistency::default();
    for (&core_id, &(as_input, as_output)) in &references {
        if as_input > 1 || as_output > 1 {
            report.duplicate_cores.push(core_id);
        }
        match cores.get(&core_id) {
            None => report.dangling_cores.push(core_id),
            Some(core) if core.status != CoreStatus::Used => report.state_mismatches.push(core_id),
            Some(_) => {}
        }
    }
    report.consistent = report.duplicate_cores.is_empty()
        && report.dangling_cores.is_empty()
        && report.state_mismatches.is_empty();
    report
}

/// Every core id referenced by `connections`, ascending
pub fn referenced_core_ids(connections: &[Connection]) -> Vec<i64> {
    let mut ids: Vec<i64> = connections.iter().flat_map(Connection::core_ids).collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Endpoint;
    use chrono::Utc;

    fn conn(id: i64, input: Endpoint, output: Endpoint) -> Connection {
        Connection {
            id,
            location_node_id: Some(4),
            input_type: input.kind,
            input_id: input.id,
            output_type: output.kind,
            output_id: output.id,
            loss_db: Some(0.1),
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn core(id: i64, status: CoreStatus) -> (i64, CableCore) {
        let now = Utc::now();
        (
            id,
            CableCore {
                id,
                cable_id: 1,
                core_index: id as i32,
                tube_color: Some("Blue".to_string()),
                core_color: Some("Blue".to_string()),
                status,
                created_at: now,
                updated_at: now,
            },
        )
    }

    #[test]
    fn test_partitions_core_splices() {
        let connections = vec![
            conn(3, Endpoint::core(5), Endpoint::port(70)),
            conn(1, Endpoint::core(1), Endpoint::core(2)),
            conn(2, Endpoint::core(3), Endpoint::core(4)),
            conn(4, Endpoint::port(8), Endpoint::port(9)),
        ];
        let cores: HashMap<i64, CableCore> = (1..=5).map(|id| core(id, CoreStatus::Used)).collect();

        let matrix = build_matrix(None, connections, &cores);
        assert_eq!(
            matrix.connections.iter().map(|m| m.connection_id).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert_eq!(matrix.connections[0].input_core_id, 1);
        assert_eq!(matrix.connections[0].output_core_id, 2);
        assert_eq!(
            matrix.other_connections.iter().map(|c| c.id).collect::<Vec<_>>(),
            vec![3, 4]
        );
        assert_eq!(matrix.input_cores.iter().map(|c| c.id).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(matrix.output_cores.iter().map(|c| c.id).collect::<Vec<_>>(), vec![2, 4]);
        assert!(matrix.consistency.consistent);
    }

    #[test]
    fn test_empty_snapshot_is_consistent() {
        let matrix = build_matrix(None, Vec::new(), &HashMap::new());
        assert!(matrix.connections.is_empty());
        assert!(matrix.other_connections.is_empty());
        assert!(matrix.consistency.consistent);
    }

    #[test]
    fn test_reports_duplicates_dangling_and_mismatches() {
        let connections = vec![
            conn(1, Endpoint::core(1), Endpoint::core(2)),
            conn(2, Endpoint::core(1), Endpoint::core(3)),
            conn(3, Endpoint::core(4), Endpoint::core(99)),
        ];
        let cores: HashMap<i64, CableCore> = [
            core(1, CoreStatus::Used),
            core(2, CoreStatus::Used),
            core(3, CoreStatus::Vacant),
            core(4, CoreStatus::Damaged),
        ]
        .into_iter()
        .collect();

        let report = check_consistency(&connections, &cores);
        assert!(!report.consistent);
        assert_eq!(report.duplicate_cores, vec![1]);
        assert_eq!(report.dangling_cores, vec![99]);
        assert_eq!(report.state_mismatches, vec![3, 4]);

        let matrix = build_matrix(None, connections, &cores);
        // dangling core 99 has no row to show
        assert_eq!(matrix.output_cores.iter().map(|c| c.id).collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn test_loopback_splice_is_not_a_duplicate() {
        let connections = vec![conn(1, Endpoint::core(7), Endpoint::core(7))];
        let cores: HashMap<i64, CableCore> = [core(7, CoreStatus::Used)].into_iter().collect();
        assert!(check_consistency(&connections, &cores).consistent);
    }

    #[test]
    fn test_chained_core_is_not_a_duplicate() {
        // core 2 leaves one splice and enters the next
        let connections = vec![
            conn(1, Endpoint::core(1), Endpoint::core(2)),
            conn(2, Endpoint::core(2), Endpoint::core(3)),
        ];
        let cores: HashMap<i64, CableCore> = (1..=3).map(|id| core(id, CoreStatus::Used)).collect();
        assert!(check_consistency(&connections, &cores).consistent);
    }

    #[test]
    fn test_referenced_core_ids() {
        let connections = vec![
            conn(1, Endpoint::core(9), Endpoint::core(2)),
            conn(2, Endpoint::port(9), Endpoint::core(2)),
        ];
        assert_eq!(referenced_core_ids(&connections), vec![2, 9]);
    }
}
