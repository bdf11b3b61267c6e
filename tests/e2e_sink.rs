//! End-to-end tests for the sink contract: persisted shape, transactions,
//! and how both sinks render the two views.

use dualgraph::graph::GeometryVertex;
use dualgraph::model::{ChildIds, ID_PROPERTY, UNDIRECTED_PROPERTY};
use dualgraph::{
    ApplicationId, ConnectedPair, ContainsEdge, CypherSink, Direction, GeometryGraph, GraphSink,
    LogicalGraph, LogicalNode, MemorySink, PropertyMap, TxMode, Value, WriteOptions, CONNECTED_TO,
    CONTAINS,
};
use pretty_assertions::assert_eq;

fn logical(id: &str, type_name: &str, children: &[&str]) -> LogicalNode {
    LogicalNode {
        id: id.into(),
        name: format!("{id} name"),
        type_name: type_name.into(),
        children: children.iter().map(|c| (*c).into()).collect::<ChildIds>(),
        properties: PropertyMap::new(),
    }
}

fn ids(list: &[&str]) -> Vec<ApplicationId> {
    list.iter().map(|id| ApplicationId::from(*id)).collect()
}

fn vertex(id: &str) -> GeometryVertex {
    GeometryVertex { id: id.into(), name: id.to_uppercase(), type_name: "Mesh".into() }
}

/// level → [room, g1], room → [g2]; g1 and g2 collide, g3 is isolated.
fn views() -> (LogicalGraph, GeometryGraph) {
    let mut logical_graph = LogicalGraph::new();
    logical_graph.add_node(logical("level", "Level", &["room", "g1"]));
    logical_graph.add_node(logical("room", "Room", &["g2"]));
    for (p, c) in [("level", "room"), ("level", "g1"), ("room", "g2")] {
        logical_graph.add_edge(ContainsEdge::new(p, c));
    }

    let mut geometry = GeometryGraph::new();
    for id in ["g1", "g2", "g3"] {
        geometry.add_node(vertex(id));
    }
    geometry.add_edge(ConnectedPair::new("g2", "g1").unwrap());
    (logical_graph, geometry)
}

async fn write_views<S: GraphSink>(sink: &S, options: &WriteOptions) -> dualgraph::Result<()> {
    let (logical_graph, geometry) = views();
    let mut tx = sink.begin_tx(TxMode::ReadWrite).await?;
    sink.write_geometry_graph(&mut tx, &geometry, options).await?;
    sink.write_logical_graph(&mut tx, &logical_graph, options).await?;
    sink.commit_tx(tx).await
}

// ============================================================================
// 1. Persisted shape in the memory sink
// ============================================================================

#[tokio::test]
async fn test_memory_shape() {
    let sink = MemorySink::new();
    write_views(&sink, &WriteOptions::default()).await.unwrap();

    assert_eq!(sink.labels(), vec!["GeometryNode".to_string(), "LogicalNode".to_string()]);
    assert_eq!(sink.node_count(), 5);
    assert_eq!(sink.relationship_count(), 4);

    let room = sink.node_by_app_id("room").unwrap();
    assert!(room.has_label("LogicalNode"));
    assert_eq!(room.get("type"), Some(&Value::from("Room")));
    assert_eq!(room.get("name"), Some(&Value::from("room name")));

    let g3 = sink.node_by_app_id("g3").unwrap();
    assert_eq!(g3.get(ID_PROPERTY), Some(&Value::from("g3")));
    assert_eq!(g3.get("name"), Some(&Value::from("G3")));
    assert!(g3.get("type").is_none());
}

// ============================================================================
// 2. CONTAINS is directed, CONNECTED_TO is stored once and read both ways
// ============================================================================

#[tokio::test]
async fn test_relationship_directions() {
    let sink = MemorySink::new();
    write_views(&sink, &WriteOptions::default()).await.unwrap();

    assert_eq!(sink.neighbours("level", Direction::Outgoing, Some(CONTAINS)), ids(&["g1", "room"]));
    assert!(sink.neighbours("level", Direction::Incoming, Some(CONTAINS)).is_empty());
    assert_eq!(sink.neighbours("g2", Direction::Incoming, Some(CONTAINS)), ids(&["room"]));

    let connected = sink.relationships_by_type(CONNECTED_TO);
    assert_eq!(connected.len(), 1);
    assert_eq!(connected[0].properties.get(UNDIRECTED_PROPERTY), Some(&Value::Bool(true)));

    let g1 = sink.node_by_app_id("g1").unwrap();
    assert_eq!(connected[0].src, g1.id);

    // Either endpoint sees the other when reading both directions.
    assert_eq!(sink.neighbours("g1", Direction::Both, Some(CONNECTED_TO)), ids(&["g2"]));
    assert_eq!(sink.neighbours("g2", Direction::Both, Some(CONNECTED_TO)), ids(&["g1"]));
    assert!(sink.neighbours("g2", Direction::Outgoing, Some(CONNECTED_TO)).is_empty());
    assert!(sink.neighbours("g3", Direction::Both, None).is_empty());
}

// ============================================================================
// 3. Transactions
// ============================================================================

#[tokio::test]
async fn test_rollback_leaves_store_untouched() {
    let sink = MemorySink::new();
    let (logical_graph, geometry) = views();
    let options = WriteOptions::default();

    let mut tx = sink.begin_tx(TxMode::ReadWrite).await.unwrap();
    sink.write_geometry_graph(&mut tx, &geometry, &options).await.unwrap();
    sink.write_logical_graph(&mut tx, &logical_graph, &options).await.unwrap();
    sink.rollback_tx(tx).await.unwrap();

    assert_eq!(sink.node_count(), 0);
    assert_eq!(sink.relationship_count(), 0);
}

#[tokio::test]
async fn test_dangling_relationship_aborts_commit() {
    let sink = MemorySink::new();
    let (logical_graph, _) = views();

    // Logical view alone: g1 and g2 are never staged.
    let mut tx = sink.begin_tx(TxMode::ReadWrite).await.unwrap();
    sink.write_logical_graph(&mut tx, &logical_graph, &WriteOptions::default()).await.unwrap();
    assert!(sink.commit_tx(tx).await.is_err());
    assert_eq!(sink.node_count(), 0);
}

#[tokio::test]
async fn test_merge_updates_in_place() {
    let sink = MemorySink::new();
    write_views(&sink, &WriteOptions::default()).await.unwrap();

    let mut tx = sink.begin_tx(TxMode::ReadWrite).await.unwrap();
    let mut props = PropertyMap::new();
    props.insert(ID_PROPERTY.into(), Value::from("g3"));
    props.insert("name".into(), Value::from("Renamed"));
    sink.merge_node(&mut tx, "GeometryNode", props).await.unwrap();
    sink.commit_tx(tx).await.unwrap();

    assert_eq!(sink.node_count(), 5);
    let g3 = sink.node_by_app_id("g3").unwrap();
    assert_eq!(g3.get("name"), Some(&Value::from("Renamed")));
}

// ============================================================================
// 4. Custom labels
// ============================================================================

#[tokio::test]
async fn test_custom_labels() {
    let sink = MemorySink::new();
    let options = WriteOptions {
        logical_label: "Element".into(),
        geometry_label: "Solid".into(),
        ..Default::default()
    };
    write_views(&sink, &options).await.unwrap();

    assert_eq!(sink.nodes_by_label("Element").len(), 2);
    assert_eq!(sink.nodes_by_label("Solid").len(), 3);
    assert!(sink.nodes_by_label("LogicalNode").is_empty());
}

// ============================================================================
// 5. Cypher script rendering
// ============================================================================

#[tokio::test]
async fn test_cypher_script() {
    let sink = CypherSink::new(Vec::new());
    write_views(&sink, &WriteOptions::default()).await.unwrap();
    assert_eq!(sink.statements_written(), 9);

    let script = String::from_utf8(sink.into_inner()).unwrap();
    let lines: Vec<&str> = script.lines().collect();
    assert_eq!(lines.first(), Some(&":begin"));
    assert_eq!(lines.last(), Some(&":commit"));
    assert_eq!(lines.len(), 11);

    assert!(lines.contains(&"MERGE (n:GeometryNode {id: 'g1'}) SET n += {name: 'G1'};"));
    assert!(lines.contains(
        &"MATCH (a {id: 'g1'}), (b {id: 'g2'}) MERGE (a)-[r:CONNECTED_TO]->(b) SET r += {undirected: true};"
    ));
    assert!(lines.contains(&"MATCH (a {id: 'level'}), (b {id: 'room'}) MERGE (a)-[r:CONTAINS]->(b);"));
    assert!(lines.contains(
        &"MERGE (n:LogicalNode {id: 'room'}) SET n += {name: 'room name', type: 'Room'};"
    ));
}

#[tokio::test]
async fn test_cypher_rollback() {
    let sink = CypherSink::new(Vec::new());
    let (_, geometry) = views();
    let mut tx = sink.begin_tx(TxMode::ReadWrite).await.unwrap();
    sink.write_geometry_graph(&mut tx, &geometry, &WriteOptions::default()).await.unwrap();
    sink.rollback_tx(tx).await.unwrap();

    assert_eq!(sink.statements_written(), 0);
    assert!(sink.into_inner().is_empty());
}
