//! End-to-end pipeline scenarios.

use std::collections::HashMap;
use std::sync::Arc;

use taleweave_build::config::{BuildConfig, SourceConfig};
use taleweave_build::export::{DATASET_FILE, INDEX_FILE, TENSOR_FILE};
use taleweave_build::runner;
use taleweave_build::sources::{
    HashingEmbedder, JsonSummaryFile, PrecomputedEmbeddings, SourceBatch, StaticSource,
};
use taleweave_build::{BuildError, GraphPipeline, PipelineOptions};
use taleweave_core::{EntityFragment, EntityType, RelationFragment, RelationType};
use taleweave_ledger::{FileLedgerStore, LedgerStore, RunQuery};
use taleweave_tensor::checksum;

fn chain_batch() -> SourceBatch {
    SourceBatch {
        entities: vec![
            EntityFragment::new("A", EntityType::Motif, "Glass slipper"),
            EntityFragment::new("B", EntityType::Motif, "Lost shoe"),
            EntityFragment::new("C", EntityType::TaleType, "ATU 510A"),
        ],
        relations: vec![
            RelationFragment::new("A", "B", "variant-of"),
            RelationFragment::new("B", "C", "has-mechanic"),
        ],
    }
}

fn vectors(ids: &[&str]) -> PrecomputedEmbeddings {
    let map: HashMap<String, Vec<f32>> = ids
        .iter()
        .enumerate()
        .map(|(i, id)| (id.to_string(), vec![i as f32, 1.0, 0.5]))
        .collect();
    PrecomputedEmbeddings::from_map(3, map)
}

fn pipeline(batch: SourceBatch, embeddings: PrecomputedEmbeddings) -> GraphPipeline {
    GraphPipeline::new(Arc::new(embeddings))
        .with_source(Arc::new(StaticSource::new("test", batch)))
}

#[tokio::test]
async fn chain_scenario() {
    let output = pipeline(chain_batch(), vectors(&["A", "B", "C"]))
        .run()
        .await
        .unwrap();

    let t = &output.tensors;
    assert_eq!(t.num_nodes(), 3);
    assert_eq!(t.num_edges(), 2);
    let (a, b, c) = (t.node_index["A"], t.node_index["B"], t.node_index["C"]);
    assert_eq!(t.edge(0), (a, b));
    assert_eq!(t.edge(1), (b, c));
    assert_eq!(
        t.edge_types,
        vec![RelationType::VariantOf.code(), RelationType::HasMechanic.code()]
    );
    assert_eq!(output.quality.dropped_entities(), 0);
    assert_eq!(output.quality.orphan_entities, 0);
    assert!(output.quality.is_clean());
}

#[tokio::test]
async fn orphan_scenario() {
    let mut batch = chain_batch();
    batch.relations.truncate(1);

    let output = pipeline(batch, vectors(&["A", "B", "C"])).run().await.unwrap();

    let ids: Vec<&str> = output.graph.entities.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["A", "B"]);
    assert_eq!(output.quality.orphan_entities, 1);
}

#[tokio::test]
async fn missing_embedding_drops_and_revalidates() {
    let output = pipeline(chain_batch(), vectors(&["A", "B"])).run().await.unwrap();

    let ids: Vec<&str> = output.graph.entities.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["A", "B"]);
    assert_eq!(output.graph.relations.len(), 1);
    assert_eq!(output.missing_embeddings, vec!["C"]);
    assert_eq!(output.quality.missing_embeddings, 1);
    assert_eq!(output.quality.dangling_relations, 1);
    assert!(output.graph.verify().is_ok());
}

#[tokio::test]
async fn missing_embedding_is_fatal_in_strict_mode() {
    let result = pipeline(chain_batch(), vectors(&["A", "B"]))
        .with_options(PipelineOptions {
            strict_embeddings: true,
            ..Default::default()
        })
        .run()
        .await;

    match result {
        Err(BuildError::MissingEmbedding { identifiers }) => assert_eq!(identifiers, vec!["C"]),
        other => panic!("expected MissingEmbedding, got {other:?}"),
    }
}

#[tokio::test]
async fn wrong_dimension_counts_as_missing() {
    let mut map = HashMap::new();
    map.insert("A".to_string(), vec![1.0, 0.0, 0.0]);
    map.insert("B".to_string(), vec![0.0, 1.0, 0.0]);
    map.insert("C".to_string(), vec![0.0, 1.0]);

    let output = pipeline(chain_batch(), PrecomputedEmbeddings::from_map(3, map))
        .run()
        .await
        .unwrap();

    assert_eq!(output.missing_embeddings, vec!["C"]);
    assert_eq!(output.tensors.num_nodes(), 2);
}

#[tokio::test]
async fn non_finite_vector_counts_as_missing() {
    let mut batch = chain_batch();
    batch.entities.push(EntityFragment::new("D", EntityType::Motif, "Midnight"));
    batch.relations = vec![
        RelationFragment::new("A", "B", "variant-of"),
        RelationFragment::new("C", "D", "variant-of"),
    ];

    let mut map = HashMap::new();
    map.insert("A".to_string(), vec![1.0, 0.0, 0.0]);
    map.insert("B".to_string(), vec![0.0, 1.0, 0.0]);
    map.insert("C".to_string(), vec![f32::NAN, 1.0, 0.0]);
    map.insert("D".to_string(), vec![0.0, 0.0, f32::INFINITY]);

    let output = pipeline(batch.clone(), PrecomputedEmbeddings::from_map(3, map.clone()))
        .run()
        .await
        .unwrap();

    assert_eq!(output.missing_embeddings, vec!["C", "D"]);
    assert_eq!(output.tensors.num_nodes(), 2);
    assert_eq!(output.tensors.num_edges(), 1);
    assert!(output.tensors.features.iter().all(|v| v.is_finite()));

    let strict = pipeline(batch, PrecomputedEmbeddings::from_map(3, map))
        .with_options(PipelineOptions {
            strict_embeddings: true,
            ..Default::default()
        })
        .run()
        .await;
    assert!(matches!(strict, Err(BuildError::MissingEmbedding { .. })));
}

#[tokio::test]
async fn relations_of_unlabelled_entities_are_counted() {
    let mut batch = chain_batch();
    batch.entities.push(EntityFragment::new("E", EntityType::Motif, ""));
    batch.relations.push(RelationFragment::new("A", "E", "variant-of"));

    let summary = pipeline(batch, vectors(&[])).validate_only().await.unwrap();

    assert_eq!(summary.quality.relations_received, 3);
    assert_eq!(summary.quality.incomplete_entities, 1);
    assert_eq!(summary.quality.incomplete_relations, 1);
    assert_eq!(summary.quality.dropped_relations(), 1);
    assert_eq!(summary.stats.edge_count, 2);
}

#[tokio::test]
async fn graph_without_relations_is_refused() {
    let mut batch = chain_batch();
    batch.relations.clear();

    let result = pipeline(batch, vectors(&["A", "B", "C"])).run().await;
    assert!(matches!(result, Err(BuildError::EmptyGraph { nodes: 0, edges: 0 })));
}

#[tokio::test]
async fn all_embeddings_missing_is_refused() {
    let result = pipeline(chain_batch(), vectors(&[])).run().await;
    assert!(matches!(result, Err(BuildError::EmptyGraph { .. })));
}

#[tokio::test]
async fn summaries_feed_the_embedding_text() {
    let summaries = JsonSummaryFile::from_map(HashMap::from([(
        "A".to_string(),
        "A slipper of glass left at the ball.".to_string(),
    )]));
    let output = GraphPipeline::new(Arc::new(HashingEmbedder::new(16)))
        .with_source(Arc::new(StaticSource::new("test", chain_batch())))
        .with_summaries(Arc::new(summaries))
        .run()
        .await
        .unwrap();

    let a = &output.graph.entities[0];
    assert_eq!(a.summary.as_deref(), Some("A slipper of glass left at the ball."));
    let expected = HashingEmbedder::new(16)
        .embed_text("A slipper of glass left at the ball.")
        .unwrap();
    assert_eq!(a.embedding.as_deref(), Some(expected.as_slice()));
}

#[tokio::test]
async fn tensor_bytes_are_reproducible() {
    let build = || async {
        GraphPipeline::new(Arc::new(HashingEmbedder::new(16)))
            .with_source(Arc::new(StaticSource::new("test", chain_batch())))
            .run()
            .await
            .unwrap()
            .tensors
            .to_safetensors()
            .unwrap()
    };

    let first = build().await;
    let second = build().await;
    assert_eq!(checksum(&first), checksum(&second));
}

#[tokio::test]
async fn run_build_writes_artifacts_and_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let folklore = dir.path().join("folklore.json");
    let games = dir.path().join("games.json");
    std::fs::write(
        &folklore,
        r#"{
            "entities": [
                {"id": "Q1", "type": "motif", "label": "Trickster",
                 "properties": {"description": "A clever rule breaker"}},
                {"id": "Q3", "type": "tale_type", "label": "ATU 1525"}
            ],
            "relations": [
                {"source": "Q1", "target": "Q3", "type": "P31"},
                {"source": "Q1", "target": "Q404", "type": "P737"}
            ]
        }"#,
    )
    .unwrap();
    std::fs::write(
        &games,
        r#"{
            "entities": [
                {"id": "Q2", "type": "MechanicConcept", "label": "Deception"},
                {"id": "Q9", "type": "GenreConcept", "label": "Lonely genre"}
            ],
            "relations": [
                {"source": "Q2", "target": "Q1", "type": "inspired_by"}
            ]
        }"#,
    )
    .unwrap();

    let config = BuildConfig {
        sources: vec![
            SourceConfig {
                genre: Some("ATU_Folklore".to_string()),
                ..SourceConfig::from_path(&folklore)
            },
            SourceConfig {
                genre: Some("Game_Mechanic".to_string()),
                ..SourceConfig::from_path(&games)
            },
        ],
        embedding_dim: 16,
        output_dir: dir.path().join("output"),
        ledger_dir: dir.path().join("ledger"),
        ..Default::default()
    };

    let report = runner::run_build(&config).await.unwrap();

    assert_eq!(report.output.stats.node_count, 3);
    assert_eq!(report.output.stats.edge_count, 2);
    assert_eq!(report.output.quality.unresolved_endpoints, 1);
    assert_eq!(report.output.quality.orphan_entities, 1);

    let tensor_bytes = std::fs::read(config.output_dir.join(TENSOR_FILE)).unwrap();
    assert_eq!(checksum(&tensor_bytes), report.export.tensor_checksum);

    let index: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(config.output_dir.join(INDEX_FILE)).unwrap())
            .unwrap();
    assert_eq!(index["id2idx"]["Q1"], 0);
    assert_eq!(index["id2idx"]["Q2"], 2);

    let dataset: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(config.output_dir.join(DATASET_FILE)).unwrap(),
    )
    .unwrap();
    assert_eq!(dataset["meta"]["total_nodes"], 3);
    assert_eq!(dataset["meta"]["nodes_by_type"]["Motif"], 1);
    assert!(dataset["meta"].get("stats").is_none());
    assert_eq!(dataset["meta"]["categories"][1], "Game_Mechanic");
    assert_eq!(dataset["meta"]["tensor_checksum"], report.export.tensor_checksum);
    assert_eq!(dataset["nodes"][0]["properties"]["source_genre"], "ATU_Folklore");
    assert_eq!(dataset["edges"][0]["relation"], "is_a");
    assert!(dataset["nodes"][0].get("embedding").is_none());

    let store = FileLedgerStore::new(&config.ledger_dir).unwrap();
    let runs = store.list(&RunQuery::default()).unwrap();
    assert_eq!(runs.len(), 1);
    assert!(runs[0].succeeded());
    assert_eq!(runs[0].id.to_string(), report.run_id.unwrap());
    assert_eq!(runs[0].artifacts.len(), 3);
    assert!(runner::tensor_checksum_matches(&config, &report.export.tensor_checksum)
        .await
        .unwrap());
}

#[tokio::test]
async fn failed_build_is_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let config = BuildConfig {
        sources: vec![SourceConfig::from_path(dir.path().join("missing.json"))],
        output_dir: dir.path().join("output"),
        ledger_dir: dir.path().join("ledger"),
        ..Default::default()
    };

    let err = runner::run_build(&config).await.unwrap_err();
    assert!(matches!(err, BuildError::Source { .. }));

    let runs = runner::list_runs(&config, &RunQuery::default()).unwrap();
    assert_eq!(runs.len(), 1);
    assert!(!runs[0].succeeded());
    assert_eq!(runs[0].intent, "build");

    let succeeded = RunQuery {
        succeeded_only: true,
        ..Default::default()
    };
    assert!(runner::list_runs(&config, &succeeded).unwrap().is_empty());
    assert!(!config.output_dir.join(TENSOR_FILE).exists());
}
