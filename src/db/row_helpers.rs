use sqlx::{Row, sqlite::SqliteRow};

use crate::models::*;

/// Treat '' stored in an optional text column as NULL
pub fn none_if_empty(opt: Option<String>) -> Option<String> {
    opt.filter(|s| !s.is_empty())
}

/// Map a SQLite row to a Node struct
pub fn map_node_row(row: &SqliteRow) -> Node {
    Node {
        id: row.get("id"),
        name: row.get("name"),
        node_type: row.get("type"),
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
        address: none_if_empty(row.get("address")),
        capacity_ports: row.get("capacity_ports"),
        used_ports: row.get("used_ports"),
        model: none_if_empty(row.get("model")),
        status: row.get("status"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Map a SQLite row to a Cable struct
pub fn map_cable_row(row: &SqliteRow) -> Cable {
    let path_json: String = row.get("path_coordinates");
    let path_coordinates: Vec<[f64; 2]> = serde_json::from_str(&path_json).unwrap_or_default();
    Cable {
        id: row.get("id"),
        name: none_if_empty(row.get("name")),
        cable_type: row.get("type"),
        core_count: row.get("core_count"),
        length_meter: row.get("length_meter"),
        origin_node_id: row.get("origin_node_id"),
        dest_node_id: row.get("dest_node_id"),
        path_coordinates,
        color_hex: row.get("color_hex"),
        status: row.get("status"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Map a SQLite row to a CableCore struct
pub fn map_core_row(row: &SqliteRow) -> CableCore {
    CableCore {
        id: row.get("id"),
        cable_id: row.get("cable_id"),
        core_index: row.get("core_index"),
        tube_color: none_if_empty(row.get("tube_color")),
        core_color: none_if_empty(row.get("core_color")),
        status: row.get("status"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Map a SQLite row to a Connection struct
pub fn map_connection_row(row: &SqliteRow) -> Connection {
    Connection {
        id: row.get("id"),
        location_node_id: row.get("location_node_id"),
        input_type: row.get("input_type"),
        input_id: row.get("input_id"),
        output_type: row.get("output_type"),
        output_id: row.get("output_id"),
        loss_db: row.get("loss_db"),
        notes: none_if_empty(row.get("notes")),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Map a SQLite row to a Customer struct
pub fn map_customer_row(row: &SqliteRow) -> Customer {
    Customer {
        id: row.get("id"),
        node_id: row.get("node_id"),
        name: row.get("name"),
        ont_sn: none_if_empty(row.get("ont_sn")),
        phone: none_if_empty(row.get("phone")),
        email: none_if_empty(row.get("email")),
        current_status: row.get("current_status"),
        last_rx_power: row.get("last_rx_power"),
        subscription_type: none_if_empty(row.get("subscription_type")),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
