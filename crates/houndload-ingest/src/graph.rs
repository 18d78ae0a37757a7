//! Graph database access
//!
//! [`GraphWriter`] is the single seam between the upload path and the
//! database. [`Neo4jWriter`] talks Bolt through `neo4rs`; tests substitute
//! in-memory writers.

use crate::config::GraphConfig;
use async_trait::async_trait;
use houndload_common::{HoundError, Result};
use neo4rs::{query, BoltBoolean, BoltFloat, BoltInteger, BoltList, BoltMap, BoltNull, BoltString, BoltType, Graph};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Executes one parameterized write per chunk
#[async_trait]
pub trait GraphWriter: Send + Sync {
    /// Run `statement` once with `props` bound as `$props`, in its own
    /// transaction
    async fn write_chunk(&self, statement: &str, props: &[Value]) -> Result<()>;
}

#[async_trait]
impl<T: GraphWriter + ?Sized> GraphWriter for Arc<T> {
    async fn write_chunk(&self, statement: &str, props: &[Value]) -> Result<()> {
        (**self).write_chunk(statement, props).await
    }
}

/// Bolt connection shared by every upload of a run
pub struct Neo4jWriter {
    graph: Graph,
}

impl Neo4jWriter {
    /// Open the connection pool and check the credentials with a trivial query
    pub async fn connect(config: &GraphConfig) -> Result<Self> {
        let uri = config.uri();
        info!(%uri, username = %config.username, "Connecting to graph database");

        let graph = Graph::new(&uri, &config.username, &config.password)
            .await
            .map_err(|e| HoundError::Connection(e.to_string()))?;
        graph
            .run(query("RETURN 1"))
            .await
            .map_err(|e| HoundError::Connection(e.to_string()))?;

        Ok(Self { graph })
    }
}

#[async_trait]
impl GraphWriter for Neo4jWriter {
    async fn write_chunk(&self, statement: &str, props: &[Value]) -> Result<()> {
        // The transaction holds one pooled connection; dropping it hands the
        // connection back on every path
        let mut txn = self
            .graph
            .start_txn()
            .await
            .map_err(|e| HoundError::Database(e.to_string()))?;

        let rows = BoltType::List(bolt_list(props));
        match txn.run(query(statement).param("props", rows)).await {
            Ok(()) => {
                txn.commit()
                    .await
                    .map_err(|e| HoundError::Database(e.to_string()))?;
                debug!(rows = props.len(), "Chunk committed");
                Ok(())
            },
            Err(e) => {
                // The statement error is the one worth reporting
                let _ = txn.rollback().await;
                Err(HoundError::Database(e.to_string()))
            },
        }
    }
}

fn bolt_list(values: &[Value]) -> BoltList {
    let mut list = BoltList::with_capacity(values.len());
    for value in values {
        list.push(to_bolt(value));
    }
    list
}

/// Map a JSON value onto the Bolt type system
pub fn to_bolt(value: &Value) -> BoltType {
    match value {
        Value::Null => BoltType::Null(BoltNull),
        Value::Bool(b) => BoltType::Boolean(BoltBoolean::new(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => BoltType::Integer(BoltInteger::new(i)),
            // u64 beyond i64 and real floats
            None => BoltType::Float(BoltFloat::new(n.as_f64().unwrap_or(f64::NAN))),
        },
        Value::String(s) => BoltType::String(BoltString::new(s)),
        Value::Array(items) => BoltType::List(bolt_list(items)),
        Value::Object(fields) => {
            let mut map = BoltMap::with_capacity(fields.len());
            for (key, value) in fields {
                map.put(BoltString::new(key), to_bolt(value));
            }
            BoltType::Map(map)
        },
    }
}
