//! Cypher script sink: renders the dual graph as `MERGE` statements.
//!
//! ```text
//! write_logical_graph / write_geometry_graph → staged statements
//!   → commit → writer (file, stdout, Vec<u8>) → cypher-shell / Neo4j Browser
//! ```
//!
//! Every node is merged on `{id: ...}` and every relationship on its
//! endpoints and type, so loading the same script twice is harmless.

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::model::*;
use crate::tx::{Transaction, TxId, TxMode};
use crate::{Error, Result};
use super::GraphSink;

/// Writes committed transactions to `W` as Cypher.
pub struct CypherSink<W> {
    writer: Mutex<W>,
    next_tx_id: AtomicU64,
    statements: AtomicU64,
}

impl<W: Write + Send> CypherSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
            next_tx_id: AtomicU64::new(0),
            statements: AtomicU64::new(0),
        }
    }

    /// Statements flushed so far.
    pub fn statements_written(&self) -> u64 {
        self.statements.load(Ordering::Relaxed)
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

/// Statements staged for one commit.
pub struct CypherTx {
    id: TxId,
    mode: TxMode,
    buffer: Vec<String>,
}

impl Transaction for CypherTx {
    fn mode(&self) -> TxMode { self.mode }
    fn id(&self) -> TxId { self.id }
    fn pending(&self) -> usize { self.buffer.len() }
}

fn writable(tx: &CypherTx) -> Result<()> {
    if tx.is_read_only() {
        return Err(Error::TxError(format!("{} is read-only", tx.id)));
    }
    Ok(())
}

#[async_trait]
impl<W: Write + Send> GraphSink for CypherSink<W> {
    type Tx = CypherTx;

    async fn begin_tx(&self, mode: TxMode) -> Result<CypherTx> {
        let id = TxId(self.next_tx_id.fetch_add(1, Ordering::Relaxed) + 1);
        Ok(CypherTx { id, mode, buffer: Vec::new() })
    }

    async fn commit_tx(&self, tx: CypherTx) -> Result<()> {
        if tx.buffer.is_empty() {
            return Ok(());
        }
        let mut writer = self.writer.lock();
        writeln!(writer, ":begin")?;
        for statement in &tx.buffer {
            writeln!(writer, "{statement}")?;
        }
        writeln!(writer, ":commit")?;
        writer.flush()?;
        self.statements.fetch_add(tx.buffer.len() as u64, Ordering::Relaxed);
        tracing::debug!(tx = %tx.id, statements = tx.buffer.len(), "cypher script commit");
        Ok(())
    }

    async fn rollback_tx(&self, tx: CypherTx) -> Result<()> {
        tracing::debug!(tx = %tx.id, discarded = tx.buffer.len(), "cypher script rollback");
        Ok(())
    }

    async fn merge_node(&self, tx: &mut CypherTx, label: &str, props: PropertyMap) -> Result<()> {
        writable(tx)?;
        let id = props
            .get(ID_PROPERTY)
            .filter(|v| v.is_string())
            .ok_or_else(|| Error::Sink(format!("{label} node without `{ID_PROPERTY}` property")))?;

        let rest: PropertyMap = props
            .iter()
            .filter(|(k, _)| k.as_str() != ID_PROPERTY)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut statement = format!(
            "MERGE (n:{} {{{}: {}}})",
            escape_name(label),
            ID_PROPERTY,
            format_value(id)
        );
        if !rest.is_empty() {
            statement.push_str(&format!(" SET n += {{{}}}", format_properties(&rest)));
        }
        statement.push(';');
        tx.buffer.push(statement);
        Ok(())
    }

    async fn create_relationship(
        &self,
        tx: &mut CypherTx,
        src: &ApplicationId,
        dst: &ApplicationId,
        rel_type: &str,
        props: PropertyMap,
    ) -> Result<()> {
        writable(tx)?;
        let mut statement = format!(
            "MATCH (a {{{id}: {}}}), (b {{{id}: {}}}) MERGE (a)-[r:{}]->(b)",
            format_value(&Value::from(src.as_str())),
            format_value(&Value::from(dst.as_str())),
            escape_name(rel_type),
            id = ID_PROPERTY,
        );
        if !props.is_empty() {
            statement.push_str(&format!(" SET r += {{{}}}", format_properties(&props)));
        }
        statement.push(';');
        tx.buffer.push(statement);
        Ok(())
    }
}

/// Format a PropertyMap as Cypher map entries (key: value, ...), sorted by key.
fn format_properties(props: &PropertyMap) -> String {
    let mut keys: Vec<&String> = props.keys().collect();
    keys.sort();
    keys.into_iter()
        .map(|key| format!("{}: {}", escape_name(key), format_value(&props[key])))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Backtick-quote anything that is not a plain identifier.
fn escape_name(name: &str) -> String {
    let plain = name.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        name.to_string()
    } else {
        format!("`{}`", name.replace('`', "``"))
    }
}

/// Format a Value as a Cypher literal.
fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
        Value::Int(i) => i.to_string(),
        Value::Float(f) if f.is_finite() => format!("{f:?}"),
        Value::Float(_) | Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::List(items) => {
            let inner: Vec<String> = items.iter().map(format_value).collect();
            format!("[{}]", inner.join(", "))
        }
        Value::Map(m) => format!("{{{}}}", format_properties(m)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&Value::String("it's".into())), r"'it\'s'");
        assert_eq!(format_value(&Value::Int(42)), "42");
        assert_eq!(format_value(&Value::Float(3.0)), "3.0");
        assert_eq!(format_value(&Value::Float(f64::NAN)), "null");
        assert_eq!(format_value(&Value::Bool(true)), "true");
        assert_eq!(format_value(&Value::List(vec![Value::Int(1), Value::Null])), "[1, null]");
    }

    #[test]
    fn test_escape_name() {
        assert_eq!(escape_name("LogicalNode"), "LogicalNode");
        assert_eq!(escape_name("Base Level"), "`Base Level`");
        assert_eq!(escape_name("2d"), "`2d`");
    }

    #[tokio::test]
    async fn test_commit_writes_script() {
        let sink = CypherSink::new(Vec::new());
        let mut tx = sink.begin_tx(TxMode::ReadWrite).await.unwrap();

        let mut props = PropertyMap::new();
        props.insert(ID_PROPERTY.into(), Value::from("g1"));
        props.insert("name".into(), Value::from("Wall"));
        sink.merge_node(&mut tx, "GeometryNode", props).await.unwrap();

        let mut rel = PropertyMap::new();
        rel.insert(UNDIRECTED_PROPERTY.into(), Value::Bool(true));
        sink.create_relationship(&mut tx, &"g1".into(), &"g2".into(), CONNECTED_TO, rel)
            .await
            .unwrap();
        sink.commit_tx(tx).await.unwrap();

        assert_eq!(sink.statements_written(), 2);
        let script = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = script.lines().collect();
        assert_eq!(lines, vec![
            ":begin",
            "MERGE (n:GeometryNode {id: 'g1'}) SET n += {name: 'Wall'};",
            "MATCH (a {id: 'g1'}), (b {id: 'g2'}) MERGE (a)-[r:CONNECTED_TO]->(b) SET r += {undirected: true};",
            ":commit",
        ]);
    }

    #[tokio::test]
    async fn test_rollback_writes_nothing() {
        let sink = CypherSink::new(Vec::new());
        let mut tx = sink.begin_tx(TxMode::ReadWrite).await.unwrap();
        let mut props = PropertyMap::new();
        props.insert(ID_PROPERTY.into(), Value::from("a"));
        sink.merge_node(&mut tx, "LogicalNode", props).await.unwrap();
        sink.rollback_tx(tx).await.unwrap();

        assert!(sink.into_inner().is_empty());
    }
}
