use async_trait::async_trait;
use neo4rs::{Graph, Query, query};
use tracing::{info, warn};

use crate::batch::{EntityKey, GraphWrite, WriteBatch};
use crate::error::IngestError;
use crate::{GraphStats, GraphStore};

const UPSERT_ARTICLE: &str = r#"
    MERGE (a:Article {id: $id})
    ON CREATE SET a.title = $title
"#;

const UPSERT_ENTITY: &str = r#"
    MERGE (e:Entity {name: $name, type: $type})
"#;

const MERGE_MENTIONED_IN: &str = r#"
    MATCH (e:Entity {name: $name, type: $type})
    MATCH (a:Article {id: $article_id})
    MERGE (e)-[:MENTIONED_IN]->(a)
"#;

const MERGE_CO_OCCURS: &str = r#"
    MATCH (e1:Entity {name: $source_name, type: $source_type})
    MATCH (e2:Entity {name: $target_name, type: $target_type})
    MERGE (e1)-[r:CO_OCCURS_WITH]->(e2)
    ON CREATE SET r.weight = 1
    ON MATCH SET r.weight = r.weight + 1
"#;

// The relation name is a property of one fixed relationship type, so no
// extracted text ever becomes part of the statement.
const MERGE_RELATION: &str = r#"
    MATCH (e1:Entity {name: $source_name, type: $source_type})
    MATCH (e2:Entity {name: $target_name, type: $target_type})
    MERGE (e1)-[r:RELATION {type: $label}]->(e2)
    ON CREATE SET r.weight = 1
    ON MATCH SET r.weight = r.weight + 1
"#;

/// Safe to run on every connect.
const SCHEMA_STATEMENTS: [&str; 2] = [
    "CREATE CONSTRAINT article_id_unique IF NOT EXISTS FOR (a:Article) REQUIRE a.id IS UNIQUE",
    "CREATE CONSTRAINT entity_key_unique IF NOT EXISTS FOR (e:Entity) REQUIRE (e.name, e.type) IS UNIQUE",
];

/// Neo4j-backed store. Opened once per run and closed explicitly.
pub struct Neo4jStore {
    graph: Graph,
}

impl Neo4jStore {
    pub async fn connect(uri: &str, user: &str, password: &str) -> Result<Self, IngestError> {
        info!(uri, "Connecting to Neo4j");
        let graph = Graph::new(uri, user, password)
            .await
            .map_err(IngestError::Connection)?;

        graph
            .run(query("RETURN 1"))
            .await
            .map_err(IngestError::Connection)?;

        Ok(Self { graph })
    }

    /// Uniqueness constraints backing the upsert keys. Concurrent MERGEs of
    /// the same entity only resolve to one node once these exist.
    pub async fn init_schema(&self) -> Result<(), IngestError> {
        info!("Creating Neo4j constraints");

        for statement in SCHEMA_STATEMENTS {
            self.graph
                .run(Query::new(statement.to_string()))
                .await
                .map_err(IngestError::Connection)?;
        }

        info!("Neo4j constraints created successfully");
        Ok(())
    }

    pub fn close(self) {
        drop(self.graph);
        info!("Neo4j connection closed");
    }
}

fn entity_params(q: Query, prefix: &str, key: &EntityKey) -> Query {
    q.param(&format!("{}_name", prefix), key.name.clone())
        .param(&format!("{}_type", prefix), key.entity_type.clone())
}

fn to_query(write: &GraphWrite) -> Query {
    match write {
        GraphWrite::UpsertArticle { id, title } => query(UPSERT_ARTICLE)
            .param("id", id.clone())
            .param("title", title.clone()),
        GraphWrite::UpsertEntity(key) => query(UPSERT_ENTITY)
            .param("name", key.name.clone())
            .param("type", key.entity_type.clone()),
        GraphWrite::MentionedIn { entity, article_id } => query(MERGE_MENTIONED_IN)
            .param("name", entity.name.clone())
            .param("type", entity.entity_type.clone())
            .param("article_id", article_id.clone()),
        GraphWrite::CoOccurs { source, target } => {
            let q = entity_params(query(MERGE_CO_OCCURS), "source", source);
            entity_params(q, "target", target)
        }
        GraphWrite::Relation {
            source,
            label,
            target,
        } => {
            let q = entity_params(query(MERGE_RELATION), "source", source);
            entity_params(q, "target", target).param("label", label.as_str().to_string())
        }
    }
}

async fn count(graph: &Graph, cypher: &str) -> Result<usize, neo4rs::Error> {
    let mut result = graph.execute(query(cypher)).await?;
    let count = match result.next().await? {
        Some(row) => row.get::<i64>("count").unwrap_or(0) as usize,
        None => 0,
    };
    Ok(count)
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn apply(&self, batch: &WriteBatch) -> Result<(), IngestError> {
        let write_err = |source: neo4rs::Error| IngestError::Write {
            article_id: batch.article_id.clone(),
            source,
        };

        let mut txn = self.graph.start_txn().await.map_err(IngestError::Connection)?;

        for write in &batch.writes {
            if let Err(e) = txn.run(to_query(write)).await {
                if let Err(rollback_err) = txn.rollback().await {
                    warn!(
                        article_id = %batch.article_id,
                        error = %rollback_err,
                        "Rollback failed"
                    );
                }
                return Err(write_err(e));
            }
        }

        txn.commit().await.map_err(write_err)
    }

    async fn stats(&self) -> Result<GraphStats, IngestError> {
        let stats = async {
            Ok::<_, neo4rs::Error>(GraphStats {
                articles: count(&self.graph, "MATCH (a:Article) RETURN count(a) as count").await?,
                entities: count(&self.graph, "MATCH (e:Entity) RETURN count(e) as count").await?,
                co_occurrence_edges: count(
                    &self.graph,
                    "MATCH ()-[r:CO_OCCURS_WITH]->() RETURN count(r) as count",
                )
                .await?,
                relation_edges: count(
                    &self.graph,
                    "MATCH ()-[r:RELATION]->() RETURN count(r) as count",
                )
                .await?,
            })
        };
        stats.await.map_err(IngestError::Connection)
    }
}
