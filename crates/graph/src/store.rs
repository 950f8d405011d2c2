use async_trait::async_trait;
use neo4rs::{ConfigBuilder, Graph, Query};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, StoreError};

/// Connection settings for the Neo4j backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Neo4jConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub max_connections: usize,
}

impl Default for Neo4jConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: "password".to_string(),
            database: "neo4j".to_string(),
            max_connections: 50,
        }
    }
}

/// Write and read access to a graph database.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Run a single statement in its own transaction.
    async fn execute(&self, statement: &str) -> Result<()>;

    /// Run every statement inside one transaction. On error nothing is kept.
    async fn execute_batch(&self, statements: &[String]) -> Result<()>;

    /// Run a read query and collect one string column.
    async fn read_column(&self, query: &str, column: &str) -> Result<Vec<String>>;

    /// Run a read query returning a single integer, 0 when there is no row.
    async fn read_count(&self, query: &str, column: &str) -> Result<i64>;
}

pub struct Neo4jStore {
    graph: Graph,
}

impl Neo4jStore {
    pub fn new(graph: Graph) -> Self {
        Self { graph }
    }

    pub async fn connect(config: &Neo4jConfig) -> Result<Self> {
        let neo4j_config = ConfigBuilder::default()
            .uri(config.uri.as_str())
            .user(config.user.as_str())
            .password(config.password.as_str())
            .db(config.database.as_str())
            .max_connections(config.max_connections)
            .build()
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let graph = Graph::connect(neo4j_config)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        info!(uri = %config.uri, database = %config.database, "Connected to Neo4j");
        Ok(Self::new(graph))
    }

    /// Round-trip a trivial query to confirm the server is reachable.
    pub async fn ping(&self) -> Result<()> {
        self.graph
            .run(Query::new("RETURN 1".to_string()))
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))
    }
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn execute(&self, statement: &str) -> Result<()> {
        self.graph
            .run(Query::new(statement.to_string()))
            .await
            .map_err(|e| StoreError::classify(e.to_string()))
    }

    async fn execute_batch(&self, statements: &[String]) -> Result<()> {
        let mut txn = self
            .graph
            .start_txn()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        for (i, statement) in statements.iter().enumerate() {
            if let Err(e) = txn.run(Query::new(statement.clone())).await {
                debug!(index = i, statement = %statement, "Statement failed, rolling back batch");
                // the server has usually aborted the transaction already
                let _ = txn.rollback().await;
                return Err(StoreError::classify(e.to_string()));
            }
        }

        txn.commit()
            .await
            .map_err(|e| StoreError::classify(e.to_string()))
    }

    async fn read_column(&self, query: &str, column: &str) -> Result<Vec<String>> {
        let mut result = self
            .graph
            .execute(Query::new(query.to_string()))
            .await
            .map_err(|e| StoreError::classify(e.to_string()))?;

        let mut values = Vec::new();
        while let Some(row) = result
            .next()
            .await
            .map_err(|e| StoreError::Store(e.to_string()))?
        {
            let value: String = row.get::<String>(column).unwrap_or_default();
            if !value.is_empty() {
                values.push(value);
            }
        }
        Ok(values)
    }

    async fn read_count(&self, query: &str, column: &str) -> Result<i64> {
        let mut result = self
            .graph
            .execute(Query::new(query.to_string()))
            .await
            .map_err(|e| StoreError::classify(e.to_string()))?;

        let count = match result
            .next()
            .await
            .map_err(|e| StoreError::Store(e.to_string()))?
        {
            Some(row) => row.get::<i64>(column).unwrap_or(0),
            None => 0,
        };
        Ok(count)
    }
}
