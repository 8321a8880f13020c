mod cables;
mod connections;
mod cores;
mod customers;
mod graph;
mod nodes;
pub(crate) mod row_helpers;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;

use crate::models::*;
use crate::topology::NearbyQuery;

pub use cables::CableRepo;
pub use connections::ConnectionRepo;
pub use cores::CoreRepo;
pub use customers::CustomerRepo;
pub use nodes::NodeRepo;

/// A lookup by id that matched nothing
#[derive(Debug)]
pub struct NotFoundError {
    pub resource: String,
    pub id: String,
}

impl NotFoundError {
    pub fn new(resource: &str, id: &str) -> Self {
        Self {
            resource: resource.to_string(),
            id: id.to_string(),
        }
    }
}

impl std::fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} not found: {}", self.resource, self.id)
    }
}

impl std::error::Error for NotFoundError {}

/// A delete refused because other records still reference the target
#[derive(Debug)]
pub struct ConflictError {
    pub message: String,
}

impl ConflictError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl std::fmt::Display for ConflictError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ConflictError {}

/// A write rejected by a data invariant (port ceiling, unknown node reference)
#[derive(Debug)]
pub struct ValidationError {
    pub message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValidationError {}

/// One page of a filtered list, with the unpaged row count
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}

/// Store handles all database operations, delegating to per-entity repo modules.
#[derive(Clone)]
pub struct Store {
    pool: Pool<Sqlite>,
}

impl Store {
    /// Create a new database store with a specific pool size
    pub async fn with_pool_size(db_path: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path))
            .context("Invalid database path")?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Fresh in-memory database on a single connection, for tests
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("Failed to open in-memory database")?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Run database migrations
    async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    // ========== Node Operations ==========

    pub async fn list_nodes(&self, filter: &NodeFilter, limit: i64, offset: i64) -> Result<Page<Node>> {
        NodeRepo::list(&self.pool, filter, limit, offset).await
    }

    pub async fn list_all_nodes(&self, filter: &NodeFilter) -> Result<Vec<Node>> {
        NodeRepo::list_all(&self.pool, filter).await
    }

    pub async fn get_node(&self, id: i64) -> Result<Option<Node>> {
        NodeRepo::get(&self.pool, id).await
    }

    pub async fn create_node(&self, req: &CreateNodeRequest) -> Result<Node> {
        NodeRepo::create(&self.pool, req).await
    }

    pub async fn update_node(&self, id: i64, req: &UpdateNodeRequest) -> Result<Node> {
        NodeRepo::update(&self.pool, id, req).await
    }

    pub async fn delete_node(&self, id: i64) -> Result<()> {
        NodeRepo::delete(&self.pool, id).await
    }

    pub async fn nearby_nodes(&self, query: &NearbyQuery) -> Result<Vec<NearbyNode>> {
        let (min_lat, max_lat) = query.latitude_band();
        let candidates = NodeRepo::list_in_latitude_band(&self.pool, min_lat, max_lat, query.node_type).await?;
        Ok(query.rank(candidates))
    }

    // ========== Cable Operations ==========

    pub async fn list_cables(&self, filter: &CableFilter, limit: i64, offset: i64) -> Result<Page<Cable>> {
        CableRepo::list(&self.pool, filter, limit, offset).await
    }

    pub async fn list_routed_cables(&self) -> Result<Vec<Cable>> {
        CableRepo::list_routed(&self.pool).await
    }

    pub async fn get_cable(&self, id: i64) -> Result<Option<Cable>> {
        CableRepo::get(&self.pool, id).await
    }

    pub async fn create_cable(&self, req: &CreateCableRequest) -> Result<Cable> {
        CableRepo::create(&self.pool, req).await
    }

    pub async fn update_cable(&self, id: i64, req: &UpdateCableRequest) -> Result<Cable> {
        CableRepo::update(&self.pool, id, req).await
    }

    pub async fn delete_cable(&self, id: i64) -> Result<()> {
        CableRepo::delete(&self.pool, id).await
    }

    // ========== Core Operations ==========

    pub async fn list_cores(&self, cable_id: i64) -> Result<Vec<CableCore>> {
        CoreRepo::list_by_cable(&self.pool, cable_id).await
    }

    pub async fn update_core(&self, cable_id: i64, core_id: i64, req: &UpdateCableCoreRequest) -> Result<CableCore> {
        CoreRepo::update(&self.pool, cable_id, core_id, req).await
    }

    // ========== Connection Operations ==========

    pub async fn list_connections(&self, filter: &ConnectionFilter, limit: i64, offset: i64) -> Result<Page<Connection>> {
        ConnectionRepo::list(&self.pool, filter, limit, offset).await
    }

    pub async fn list_connections_at(&self, node_id: i64) -> Result<Vec<Connection>> {
        ConnectionRepo::list_by_location(&self.pool, node_id).await
    }

    pub async fn get_connection(&self, id: i64) -> Result<Option<Connection>> {
        ConnectionRepo::get(&self.pool, id).await
    }

    pub async fn create_connection(&self, req: &CreateConnectionRequest) -> Result<Connection> {
        ConnectionRepo::create(&self.pool, req).await
    }

    pub async fn delete_connection(&self, id: i64) -> Result<()> {
        ConnectionRepo::delete(&self.pool, id).await
    }

    // ========== Customer Operations ==========

    pub async fn list_customers(&self, filter: &CustomerFilter, limit: i64, offset: i64) -> Result<Page<Customer>> {
        CustomerRepo::list(&self.pool, filter, limit, offset).await
    }

    pub async fn list_los_customers(&self) -> Result<Vec<Customer>> {
        CustomerRepo::list_by_status(&self.pool, CustomerStatus::Los).await
    }

    pub async fn get_customer(&self, id: i64) -> Result<Option<Customer>> {
        CustomerRepo::get(&self.pool, id).await
    }

    pub async fn create_customer(&self, req: &CreateCustomerRequest) -> Result<Customer> {
        CustomerRepo::create(&self.pool, req).await
    }

    pub async fn update_customer(&self, id: i64, req: &UpdateCustomerRequest) -> Result<Customer> {
        CustomerRepo::update(&self.pool, id, req).await
    }

    pub async fn update_customer_status(&self, id: i64, req: &UpdateCustomerStatusRequest) -> Result<Customer> {
        CustomerRepo::update_status(&self.pool, id, req).await
    }

    pub async fn bulk_update_customer_status(&self, updates: &[OntStatusUpdate]) -> Result<u64> {
        CustomerRepo::bulk_update_status(&self.pool, updates).await
    }

    pub async fn delete_customer(&self, id: i64) -> Result<()> {
        CustomerRepo::delete(&self.pool, id).await
    }

    // ========== Graph Reads ==========

    pub async fn trace_customer(&self, customer_id: i64, max_hops: usize) -> Result<CustomerTrace> {
        graph::trace_customer(&self.pool, customer_id, max_hops).await
    }

    pub async fn splice_matrix(&self, node_id: i64) -> Result<SpliceMatrix> {
        graph::splice_matrix(&self.pool, node_id).await
    }

    pub async fn network_matrix(&self) -> Result<SpliceMatrix> {
        graph::network_matrix(&self.pool).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_req(name: &str, node_type: NodeType, lat: f64, lng: f64) -> CreateNodeRequest {
        CreateNodeRequest {
            name: name.to_string(),
            node_type,
            latitude: lat,
            longitude: lng,
            address: None,
            capacity_ports: None,
            model: None,
            status: None,
        }
    }

    fn cable_req(core_count: i32) -> CreateCableRequest {
        CreateCableRequest {
            name: None,
            cable_type: CableType::Adss,
            core_count,
            length_meter: None,
            origin_node_id: None,
            dest_node_id: None,
            path_coordinates: Vec::new(),
            color_hex: None,
            status: None,
        }
    }

    fn splice(location: Option<i64>, input: Endpoint, output: Endpoint, loss_db: Option<f64>) -> CreateConnectionRequest {
        CreateConnectionRequest {
            location_node_id: location,
            input_type: input.kind,
            input_id: input.id,
            output_type: output.kind,
            output_id: output.id,
            loss_db,
            notes: None,
        }
    }

    fn customer_req(name: &str, node_id: Option<i64>, ont_sn: Option<&str>) -> CreateCustomerRequest {
        CreateCustomerRequest {
            node_id,
            name: name.to_string(),
            ont_sn: ont_sn.map(str::to_string),
            phone: None,
            email: None,
            current_status: None,
            subscription_type: None,
        }
    }

    async fn core_status(store: &Store, cable_id: i64, index: usize) -> CoreStatus {
        store.list_cores(cable_id).await.unwrap()[index].status
    }

    #[tokio::test]
    async fn test_cable_create_generates_cores() {
        let store = Store::in_memory().await.unwrap();
        let cable = store.create_cable(&cable_req(24)).await.unwrap();
        assert_eq!(cable.color_hex, DEFAULT_CABLE_COLOR);

        let cores = store.list_cores(cable.id).await.unwrap();
        assert_eq!(cores.len(), 24);
        assert!(cores.iter().enumerate().all(|(i, c)| c.core_index == i as i32 + 1));
        assert!(cores.iter().all(|c| c.status == CoreStatus::Vacant));
        assert_eq!(cores[12].tube_color.as_deref(), Some("Orange"));
        assert_eq!(cores[12].core_color.as_deref(), Some("Blue"));

        let err = store
            .update_cable(cable.id, &UpdateCableRequest { core_count: Some(12), ..Default::default() })
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<ValidationError>().is_some());
    }

    #[tokio::test]
    async fn test_cable_with_unknown_endpoint_is_rejected() {
        let store = Store::in_memory().await.unwrap();
        let mut req = cable_req(12);
        req.origin_node_id = Some(404);
        let err = store.create_cable(&req).await.unwrap_err();
        assert!(err.downcast_ref::<ValidationError>().is_some());
        assert_eq!(store.list_cables(&CableFilter::default(), 100, 0).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_connection_allocates_and_releases_cores() {
        let store = Store::in_memory().await.unwrap();
        let cable = store.create_cable(&cable_req(12)).await.unwrap();
        let cores = store.list_cores(cable.id).await.unwrap();
        let (a, b) = (cores[0].id, cores[1].id);

        let first = store
            .create_connection(&splice(None, Endpoint::core(a), Endpoint::core(b), Some(0.1)))
            .await
            .unwrap();
        let second = store
            .create_connection(&splice(None, Endpoint::core(b), Endpoint::port(1), None))
            .await
            .unwrap();
        assert_eq!(core_status(&store, cable.id, 0).await, CoreStatus::Used);
        assert_eq!(core_status(&store, cable.id, 1).await, CoreStatus::Used);

        // core b is still referenced by the second connection
        store.delete_connection(first.id).await.unwrap();
        assert_eq!(core_status(&store, cable.id, 0).await, CoreStatus::Vacant);
        assert_eq!(core_status(&store, cable.id, 1).await, CoreStatus::Used);

        store.delete_connection(second.id).await.unwrap();
        assert_eq!(core_status(&store, cable.id, 1).await, CoreStatus::Vacant);
    }

    #[tokio::test]
    async fn test_reserved_and_damaged_cores() {
        let store = Store::in_memory().await.unwrap();
        let cable = store.create_cable(&cable_req(4)).await.unwrap();
        let cores = store.list_cores(cable.id).await.unwrap();

        let reserve = UpdateCableCoreRequest { status: Some(CoreStatus::Reserved), ..Default::default() };
        let damage = UpdateCableCoreRequest { status: Some(CoreStatus::Damaged), ..Default::default() };
        store.update_core(cable.id, cores[0].id, &reserve).await.unwrap();
        store.update_core(cable.id, cores[1].id, &damage).await.unwrap();

        let conn = store
            .create_connection(&splice(None, Endpoint::core(cores[0].id), Endpoint::core(cores[1].id), None))
            .await
            .unwrap();
        assert_eq!(core_status(&store, cable.id, 0).await, CoreStatus::Used);
        assert_eq!(core_status(&store, cable.id, 1).await, CoreStatus::Damaged);

        store.delete_connection(conn.id).await.unwrap();
        assert_eq!(core_status(&store, cable.id, 0).await, CoreStatus::Vacant);
        assert_eq!(core_status(&store, cable.id, 1).await, CoreStatus::Damaged);
    }

    #[tokio::test]
    async fn test_connection_to_missing_core_still_succeeds() {
        let store = Store::in_memory().await.unwrap();
        let conn = store
            .create_connection(&splice(None, Endpoint::core(9001), Endpoint::port(3), None))
            .await
            .unwrap();
        assert_eq!(conn.input_id, 9001);
        store.delete_connection(conn.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_core_update_checks_owning_cable() {
        let store = Store::in_memory().await.unwrap();
        let one = store.create_cable(&cable_req(2)).await.unwrap();
        let other = store.create_cable(&cable_req(2)).await.unwrap();
        let core = store.list_cores(one.id).await.unwrap()[0].clone();

        let req = UpdateCableCoreRequest { core_color: Some("Aqua".into()), ..Default::default() };
        let err = store.update_core(other.id, core.id, &req).await.unwrap_err();
        assert!(err.downcast_ref::<NotFoundError>().is_some());

        let updated = store.update_core(one.id, core.id, &req).await.unwrap();
        assert_eq!(updated.core_color.as_deref(), Some("Aqua"));
        assert_eq!(updated.tube_color, core.tube_color);
    }

    #[tokio::test]
    async fn test_trace_through_closure_to_olt() {
        let store = Store::in_memory().await.unwrap();
        let olt = store.create_node(&node_req("OLT", NodeType::Olt, 0.0, 0.0)).await.unwrap();
        let closure = store.create_node(&node_req("JC", NodeType::Closure, 0.0, 0.1)).await.unwrap();
        let odp = store.create_node(&node_req("ODP", NodeType::Odp, 0.0, 0.2)).await.unwrap();
        let customer = store.create_customer(&customer_req("Rina", Some(odp.id), None)).await.unwrap();

        let feeder = store.create_cable(&cable_req(12)).await.unwrap();
        let cores = store.list_cores(feeder.id).await.unwrap();
        let (c1, c2) = (cores[0].id, cores[1].id);

        store
            .create_connection(&splice(Some(odp.id), Endpoint::port(1), Endpoint::core(c1), Some(0.3)))
            .await
            .unwrap();
        store
            .create_connection(&splice(Some(closure.id), Endpoint::core(c1), Endpoint::core(c2), Some(0.2)))
            .await
            .unwrap();
        store
            .create_connection(&splice(Some(olt.id), Endpoint::core(c2), Endpoint::port(7), Some(0.5)))
            .await
            .unwrap();

        let trace = store.trace_customer(customer.id, 20).await.unwrap();
        assert_eq!(trace.total_hops, 3);
        assert!((trace.total_loss_db - 1.0).abs() < 1e-9);
        assert!(trace.trace_valid);
        assert_eq!(trace.termination, TraceTermination::ReachedHeadEnd);
        assert!(!trace.cycle_detected);

        let first = &trace.trace_path[0];
        assert_eq!(first.node.as_ref().map(|n| n.id), Some(odp.id));
        assert_eq!(first.core.as_ref().map(|c| c.id), Some(c1));
        assert_eq!(first.cable.as_ref().map(|c| c.id), Some(feeder.id));
        assert_eq!(trace.trace_path[2].node.as_ref().map(|n| n.id), Some(olt.id));
    }

    #[tokio::test]
    async fn test_trace_without_connections() {
        let store = Store::in_memory().await.unwrap();
        let odp = store.create_node(&node_req("ODP", NodeType::Odp, 0.0, 0.2)).await.unwrap();
        let at_node = store.create_customer(&customer_req("A", Some(odp.id), None)).await.unwrap();
        let floating = store.create_customer(&customer_req("B", None, None)).await.unwrap();

        for id in [at_node.id, floating.id] {
            let trace = store.trace_customer(id, 20).await.unwrap();
            assert_eq!(trace.total_hops, 0);
            assert_eq!(trace.total_loss_db, 0.0);
            assert!(!trace.trace_valid);
            assert_eq!(trace.termination, TraceTermination::NoConnections);
        }

        let err = store.trace_customer(404, 20).await.unwrap_err();
        assert!(err.downcast_ref::<NotFoundError>().is_some());
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let store = Store::in_memory().await.unwrap();
        for err in [
            store.delete_node(1).await.unwrap_err(),
            store.delete_cable(1).await.unwrap_err(),
            store.delete_connection(1).await.unwrap_err(),
            store.delete_customer(1).await.unwrap_err(),
        ] {
            assert!(err.downcast_ref::<NotFoundError>().is_some(), "{:#}", err);
        }
    }

    #[tokio::test]
    async fn test_node_delete_conflict_and_port_ceiling() {
        let store = Store::in_memory().await.unwrap();
        let odp = store.create_node(&node_req("ODP", NodeType::Odp, 0.0, 0.0)).await.unwrap();
        store.create_customer(&customer_req("C", Some(odp.id), None)).await.unwrap();

        let err = store.delete_node(odp.id).await.unwrap_err();
        assert!(err.downcast_ref::<ConflictError>().is_some());
        assert!(store.get_node(odp.id).await.unwrap().is_some());

        let err = store
            .update_node(odp.id, &UpdateNodeRequest { used_ports: Some(9), ..Default::default() })
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<ValidationError>().is_some());

        let updated = store
            .update_node(odp.id, &UpdateNodeRequest { used_ports: Some(8), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(updated.used_ports, 8);
    }

    #[tokio::test]
    async fn test_list_pagination_and_filters() {
        let store = Store::in_memory().await.unwrap();
        for i in 0..5 {
            let node_type = if i % 2 == 0 { NodeType::Pole } else { NodeType::Odp };
            store
                .create_node(&node_req(&format!("N{}", i), node_type, 0.0, 0.0))
                .await
                .unwrap();
        }

        let page = store.list_nodes(&NodeFilter::default(), 2, 0).await.unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].name, "N4");

        let poles = NodeFilter { node_type: Some(NodeType::Pole), status: None };
        let page = store.list_nodes(&poles, 100, 0).await.unwrap();
        assert_eq!(page.total, 3);

        let page = store.list_nodes(&NodeFilter::default(), 100, 10).await.unwrap();
        assert_eq!(page.total, 5);
        assert!(page.items.is_empty());
    }

    #[tokio::test]
    async fn test_customer_search_and_status_feed() {
        let store = Store::in_memory().await.unwrap();
        store.create_customer(&customer_req("Dewi Lestari", None, Some("ZTEG00AA"))).await.unwrap();
        let joko = store.create_customer(&customer_req("Joko", None, Some("HWTC00BB"))).await.unwrap();

        let search = CustomerFilter { search: Some("hwtc".into()), ..Default::default() };
        let page = store.list_customers(&search, 100, 0).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, joko.id);

        let updates = vec![
            OntStatusUpdate { ont_sn: "HWTC00BB".into(), status: CustomerStatus::Los, rx_power: Some(-28.0) },
            OntStatusUpdate { ont_sn: "MISSING".into(), status: CustomerStatus::Online, rx_power: None },
        ];
        assert_eq!(store.bulk_update_customer_status(&updates).await.unwrap(), 1);

        let los = store.list_los_customers().await.unwrap();
        assert_eq!(los.len(), 1);
        assert_eq!(los[0].rx_power_class(), Some(RxPowerClass::Critical));

        let status = UpdateCustomerStatusRequest { status: CustomerStatus::Online, rx_power: Some(-22.0) };
        let updated = store.update_customer_status(joko.id, &status).await.unwrap();
        assert_eq!(updated.current_status, CustomerStatus::Online);
        assert_eq!(updated.last_rx_power, Some(-22.0));
        assert!(store.list_los_customers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_customer_search_is_literal() {
        let store = Store::in_memory().await.unwrap();
        let underscored = store.create_customer(&customer_req("A", None, Some("ONT_17"))).await.unwrap();
        store.create_customer(&customer_req("B", None, Some("ONTX17"))).await.unwrap();
        store.create_customer(&customer_req("C 100%", None, None)).await.unwrap();

        let search = CustomerFilter { search: Some("T_1".into()), ..Default::default() };
        let page = store.list_customers(&search, 100, 0).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, underscored.id);

        let search = CustomerFilter { search: Some("%".into()), ..Default::default() };
        let page = store.list_customers(&search, 100, 0).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].name, "C 100%");
    }

    #[tokio::test]
    async fn test_nearby_nodes() {
        let store = Store::in_memory().await.unwrap();
        let near = store.create_node(&node_req("near", NodeType::Pole, -6.2000, 106.8000)).await.unwrap();
        store.create_node(&node_req("nearer-odp", NodeType::Odp, -6.2001, 106.8001)).await.unwrap();
        store.create_node(&node_req("far", NodeType::Pole, -6.3, 106.9)).await.unwrap();

        let query = NearbyQuery::try_from(crate::topology::NearbyParams {
            lat: -6.2001,
            lng: 106.8001,
            radius: Some(500.0),
            node_type: Some(NodeType::Pole),
        })
        .unwrap();
        let found = store.nearby_nodes(&query).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].node.id, near.id);
        assert!(found[0].distance_km < 0.5);
    }

    #[tokio::test]
    async fn test_splice_matrix_consistency() {
        let store = Store::in_memory().await.unwrap();
        let jc = store.create_node(&node_req("JC", NodeType::Closure, 0.0, 0.0)).await.unwrap();
        let cable = store.create_cable(&cable_req(4)).await.unwrap();
        let cores = store.list_cores(cable.id).await.unwrap();

        store
            .create_connection(&splice(Some(jc.id), Endpoint::core(cores[0].id), Endpoint::core(cores[1].id), Some(0.05)))
            .await
            .unwrap();
        store
            .create_connection(&splice(Some(jc.id), Endpoint::core(cores[2].id), Endpoint::port(4), None))
            .await
            .unwrap();

        let matrix = store.splice_matrix(jc.id).await.unwrap();
        assert_eq!(matrix.location_node.as_ref().map(|n| n.id), Some(jc.id));
        assert_eq!(matrix.connections.len(), 1);
        assert_eq!(matrix.other_connections.len(), 1);
        assert_eq!(matrix.input_cores[0].id, cores[0].id);
        assert_eq!(matrix.output_cores[0].id, cores[1].id);
        assert!(matrix.consistency.consistent);

        // a manual override leaves a referenced core out of step
        let vacate = UpdateCableCoreRequest { status: Some(CoreStatus::Vacant), ..Default::default() };
        store.update_core(cable.id, cores[1].id, &vacate).await.unwrap();
        let network = store.network_matrix().await.unwrap();
        assert!(network.location_node.is_none());
        assert!(!network.consistency.consistent);
        assert_eq!(network.consistency.state_mismatches, vec![cores[1].id]);
    }

    #[tokio::test]
    async fn test_network_matrix_with_many_cores() {
        let store = Store::in_memory().await.unwrap();
        let west = store.create_cable(&cable_req(MAX_CORE_COUNT)).await.unwrap();
        let east = store.create_cable(&cable_req(MAX_CORE_COUNT)).await.unwrap();
        let west_cores = store.list_cores(west.id).await.unwrap();
        let east_cores = store.list_cores(east.id).await.unwrap();

        // more referenced cores than one IN (...) batch holds
        for (w, e) in west_cores.iter().zip(&east_cores) {
            store
                .create_connection(&splice(None, Endpoint::core(w.id), Endpoint::core(e.id), None))
                .await
                .unwrap();
        }

        let matrix = store.network_matrix().await.unwrap();
        assert_eq!(matrix.connections.len(), MAX_CORE_COUNT as usize);
        assert_eq!(matrix.input_cores.len(), MAX_CORE_COUNT as usize);
        assert_eq!(matrix.output_cores.len(), MAX_CORE_COUNT as usize);
        assert!(matrix.consistency.consistent);
        assert!(matrix.consistency.dangling_cores.is_empty());
    }

    #[tokio::test]
    async fn test_database_errors_carry_operation_context() {
        let store = Store::in_memory().await.unwrap();
        store.pool.close().await;

        let err = store.trace_customer(1, 20).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to start transaction");

        let err = store.network_matrix().await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to start transaction");
    }
}
