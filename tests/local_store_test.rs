//! Integration tests for extracting from a local directory through a file:// URL

use orbit_extract::backend::{open_store, BucketUrl, Scheme, StoreOptions};
use orbit_extract::config::ExtractConfig;
use orbit_extract::extract::{ExtractPolicy, Extractor};
use orbit_extract::ExtractError;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, key: &str, data: &[u8]) {
    let path = root.join(key);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, data).unwrap();
}

fn bucket() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "data/2024/01/file.parquet", b"PAR1-january-PAR1");
    write(dir.path(), "data/2024/01/file.csv", b"a,b\n1,2\n");
    write(dir.path(), "data/2024/02/file.parquet", b"PAR1-february-PAR1");
    write(dir.path(), "data/2024/03/file.parquet", b"PAR1-march-PAR1");
    write(dir.path(), "other/file.parquet", b"PAR1-other-PAR1");
    dir
}

fn file_url(root: &Path, pattern: &str) -> String {
    format!("file://{}/{}", root.display(), pattern)
}

#[tokio::test]
async fn test_file_url_glob_selects_matching_keys() {
    let bucket = bucket();
    let scratch = TempDir::new().unwrap();
    let url = BucketUrl::parse(&file_url(bucket.path(), "data/**/*.parquet")).unwrap();
    assert_eq!(url.scheme, Scheme::File);

    let mut config = ExtractConfig::default();
    config.download.temp_root = Some(scratch.path().to_path_buf());
    let store = open_store(&url, &StoreOptions::from(&config)).await.unwrap();

    let plan = Extractor::new(store, &url.pattern, &config)
        .unwrap()
        .plan()
        .await
        .unwrap();
    let sizes: Vec<u64> = plan.items.iter().map(|i| i.object.size).collect();
    assert_eq!(sizes, vec![17, 18, 15]);
    assert!(plan.items.iter().all(|i| i.key().ends_with("file.parquet")));
    assert_eq!(plan.matched, 3);
}

#[tokio::test]
async fn test_file_url_tail_files_with_head_bytes() {
    let bucket = bucket();
    let scratch = TempDir::new().unwrap();
    let url = BucketUrl::parse(&file_url(bucket.path(), "data/**/*.parquet")).unwrap();

    let mut config = ExtractConfig::default();
    config.policy = ExtractPolicy::unlimited().tail_files(2).head_bytes(4);
    config.download.temp_root = Some(scratch.path().to_path_buf());
    let store = open_store(&url, &StoreOptions::from(&config)).await.unwrap();

    let mut files = Extractor::new(store, &url.pattern, &config)
        .unwrap()
        .run()
        .await
        .unwrap();

    let mut contents = Vec::new();
    while let Some(file) = files.next().await.unwrap() {
        assert!(file.path().starts_with(scratch.path()));
        contents.push(fs::read(file.path()).unwrap());
    }
    assert_eq!(contents, vec![b"PAR1".to_vec(), b"PAR1".to_vec()]);
    assert_eq!(files.stats().partial_fetches, 2);

    files.close().await.unwrap();
    assert!(fs::read_dir(scratch.path()).unwrap().next().is_none());
    // Source files are never touched
    assert!(bucket.path().join("data/2024/03/file.parquet").exists());
}

#[tokio::test]
async fn test_single_object_pattern() {
    let bucket = bucket();
    let url = BucketUrl::parse(&file_url(bucket.path(), "data/2024/01/file.csv")).unwrap();
    let config = ExtractConfig::default();
    let store = open_store(&url, &StoreOptions::from(&config)).await.unwrap();

    let plan = Extractor::new(store, &url.pattern, &config)
        .unwrap()
        .plan()
        .await
        .unwrap();
    assert_eq!(plan.items.len(), 1);
    assert_eq!(plan.items[0].object.size, 8);
}

#[tokio::test]
async fn test_pattern_without_matches() {
    let bucket = bucket();
    let url = BucketUrl::parse(&file_url(bucket.path(), "data/2024/01/*.json")).unwrap();
    let config = ExtractConfig::default();
    let store = open_store(&url, &StoreOptions::from(&config)).await.unwrap();

    let err = Extractor::new(store, &url.pattern, &config)
        .unwrap()
        .plan()
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::NoMatches { .. }));
}

#[tokio::test]
async fn test_missing_root_is_config_error() {
    let bucket = bucket();
    let url = BucketUrl::parse(&file_url(bucket.path(), "nothing/here/*.csv")).unwrap();
    let result = open_store(&url, &StoreOptions::default()).await;
    assert!(matches!(result, Err(ExtractError::Config(_))));
}

#[test]
fn test_unknown_scheme_is_config_error() {
    assert!(matches!(
        BucketUrl::parse("ftp://bucket/data/*.csv"),
        Err(ExtractError::Config(_))
    ));
}
