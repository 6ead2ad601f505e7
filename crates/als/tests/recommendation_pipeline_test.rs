//! Integration tests for the file-backed recommendation pipeline
//!
//! Writes a small MovieLens-style `u.data` / `u.item` pair to a temporary
//! directory and drives the pipeline through fit, persist and reload.

use anyhow::Result;
use implicit_rec_als::{
    ALSConfig, FactorSource, FactorStore, ItemCatalog, RatingsFileStore, RecommendRequest,
    RecommendationPipeline, SnapshotFactorStore, TsvFactorStore,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// Same interactions as the 5x3 reference matrix, keyed by external ids.
// The first line for (10, 100) is superseded by a later rating.
const RATINGS: &str = "\
10\t100\t9\t100
10\t100\t1\t200
10\t200\t2\t200
10\t300\t3\t200
20\t100\t4\t300
20\t200\t5\t300
30\t100\t1\t400
30\t200\t5\t400
30\t300\t3\t400
40\t100\t7\t500
40\t200\t3\t500
40\t300\t9\t500
50\t200\t4\t600
50\t300\t3\t600
";

const ITEMS: &str = "\
100|Toy Story (1995)|01-Jan-1995||http://example.org/100
200|GoldenEye (1995)|01-Jan-1995||http://example.org/200
300|Four Rooms (1995)|01-Jan-1995||http://example.org/300
";

fn write_dataset(dir: &Path) -> Result<(PathBuf, PathBuf)> {
    let ratings = dir.join("u.data");
    let items = dir.join("u.item");
    fs::write(&ratings, RATINGS)?;
    fs::write(&items, ITEMS)?;
    Ok((ratings, items))
}

fn config() -> ALSConfig {
    ALSConfig {
        latent_factors: 2,
        iterations: 50,
        regularization: 0.001,
        seed: Some(1),
        ..ALSConfig::default()
    }
}

fn build(dir: &Path, store: Box<dyn FactorStore>) -> Result<RecommendationPipeline> {
    let (ratings, items) = write_dataset(dir)?;
    Ok(RecommendationPipeline::new(
        config(),
        Box::new(RatingsFileStore::new(ratings)),
        store,
    )
    .with_catalog(Box::new(ItemCatalog::from_pipe_file(items)?)))
}

#[test]
fn test_tsv_pipeline_fits_once_and_reloads() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let factor_dir = temp_dir.path().join("factors");
    let pipeline = build(temp_dir.path(), Box::new(TsvFactorStore::new(&factor_dir)))?;

    let request = RecommendRequest {
        user_id: 20,
        k: 1,
        include_seen: false,
        refit: false,
    };

    let first = pipeline.recommend(request)?;
    assert_eq!(first.source, FactorSource::Fitted);
    assert_eq!(first.items.len(), 1);
    assert_eq!(first.items[0].item_id, 300);
    assert_eq!(first.items[0].title.as_deref(), Some("Four Rooms (1995)"));
    assert!(factor_dir.join("u_fac.tmp").is_file());
    assert!(factor_dir.join("i_fac.tmp").is_file());

    let second = pipeline.recommend(request)?;
    assert_eq!(second.source, FactorSource::Loaded);
    assert_eq!(second.items, first.items);

    Ok(())
}

#[test]
fn test_user_who_saw_everything_gets_backfilled_item() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let pipeline = build(
        temp_dir.path(),
        Box::new(TsvFactorStore::new(temp_dir.path())),
    )?;

    let result = pipeline.recommend(RecommendRequest {
        user_id: 30,
        k: 2,
        include_seen: false,
        refit: false,
    })?;

    assert_eq!(result.items.len(), 2);
    assert_eq!(result.backfilled, 2);
    assert!(result.items.iter().all(|item| item.seen));

    Ok(())
}

#[test]
fn test_snapshot_store_records_training_config() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let snapshot_path = temp_dir.path().join("model").join("factors.bin");
    let store = SnapshotFactorStore::new(&snapshot_path).with_config(config());
    let pipeline = build(temp_dir.path(), Box::new(store))?;

    let data = pipeline.load_data()?;
    assert_eq!(data.matrix.num_users(), 5);
    assert_eq!(data.matrix.num_items(), 3);
    // the later rating for (10, 100) replaced the earlier one
    assert_eq!(data.matrix.get(0, 0), 1.0);

    let fitted = pipeline.fit(&data)?;

    let snapshot = SnapshotFactorStore::new(&snapshot_path)
        .load_snapshot()?
        .expect("snapshot written by fit");
    assert_eq!(snapshot.factors, fitted);
    assert_eq!(snapshot.config, Some(config()));

    let (reused, source) = pipeline.factors_for(&data, false)?;
    assert_eq!(source, FactorSource::Loaded);
    assert_eq!(reused, fitted);

    Ok(())
}

#[test]
fn test_include_seen_ranks_every_item() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let pipeline = build(
        temp_dir.path(),
        Box::new(TsvFactorStore::new(temp_dir.path())),
    )?;

    let result = pipeline.recommend(RecommendRequest {
        user_id: 40,
        k: 5,
        include_seen: true,
        refit: false,
    })?;

    assert!(result.truncated);
    assert_eq!(result.backfilled, 0);
    let mut ids: Vec<u64> = result.items.iter().map(|item| item.item_id).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![100, 200, 300]);
    assert!(result
        .items
        .windows(2)
        .all(|pair| pair[0].score >= pair[1].score));

    Ok(())
}
