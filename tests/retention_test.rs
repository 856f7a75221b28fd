mod helpers;

use chrono::{Duration, Utc};
use helpers::{blob, test_store, unit};
use nexus_knowledge::knowledge::{ChunkType, NewChunk};

fn aged(chunk_type: ChunkType, id: &str, age: Duration) -> NewChunk {
    NewChunk::new(chunk_type, id, blob(&unit(1)))
        .source_id(id)
        .created_at(Utc::now() - age)
}

#[test]
fn expired_conversation_is_pruned_and_old_error_survives() {
    let store = test_store();
    store
        .store_chunk(aged(ChunkType::Conversation, "conv-31d", Duration::days(31)))
        .unwrap();
    store
        .store_chunk(aged(ChunkType::ErrorResolution, "err-10y", Duration::days(3650)))
        .unwrap();

    assert_eq!(store.prune_old_chunks().unwrap(), 1);

    let left: Vec<String> = store
        .all_chunks()
        .unwrap()
        .into_iter()
        .map(|c| c.source_id)
        .collect();
    assert_eq!(left, vec!["err-10y"]);

    // pruning again finds nothing and still keeps the permanent chunk
    assert_eq!(store.prune_old_chunks().unwrap(), 0);
    assert_eq!(store.all_chunks().unwrap().len(), 1);
}

#[test]
fn each_type_uses_its_own_window() {
    let store = test_store();
    let rows = [
        (ChunkType::Conversation, "conv-29d", 29, true),
        (ChunkType::CodeChange, "code-29d", 29, true),
        (ChunkType::CodeChange, "code-31d", 31, false),
        (ChunkType::TaskOutcome, "task-60d", 60, true),
        (ChunkType::TaskOutcome, "task-91d", 91, false),
        (ChunkType::DirectiveSummary, "dir-89d", 89, true),
        (ChunkType::DirectiveSummary, "dir-120d", 120, false),
        (ChunkType::ErrorResolution, "err-400d", 400, true),
    ];
    for (chunk_type, id, days, _) in rows {
        store
            .store_chunk(aged(chunk_type, id, Duration::days(days)))
            .unwrap();
    }

    let expected_deleted = rows.iter().filter(|(_, _, _, kept)| !kept).count() as u64;
    assert_eq!(store.prune_old_chunks().unwrap(), expected_deleted);

    let left: Vec<String> = store
        .all_chunks()
        .unwrap()
        .into_iter()
        .map(|c| c.source_id)
        .collect();
    for (_, id, _, kept) in rows {
        assert_eq!(left.contains(&id.to_string()), kept, "{id}");
    }
}

#[test]
fn reingest_refreshes_the_retention_clock() {
    let store = test_store();
    store
        .store_chunk(aged(ChunkType::Conversation, "conv", Duration::days(40)))
        .unwrap();
    store
        .store_chunk(NewChunk::new(ChunkType::Conversation, "conv", blob(&unit(2))).source_id("conv"))
        .unwrap();
    assert_eq!(store.prune_old_chunks().unwrap(), 0);
}
