use embed::{Embedder, LocalEmbedder};

#[tokio::test]
async fn test_local_embedder() {
    // This test downloads the model on first run (~23MB)
    let embedder = LocalEmbedder::new();
    if embedder.is_err() {
        eprintln!("Skipping LocalEmbedder test (model download may have failed)");
        return;
    }
    let embedder = embedder.unwrap();
    let vec = embedder.embed("Net profit increased from 2021 to 2022.").await.unwrap();
    assert_eq!(vec.len(), 384);
    assert_eq!(embedder.dimension(), 384);
    assert!(vec.iter().any(|&x| x != 0.0), "Embedding should not be all zeros");
}

#[tokio::test]
async fn test_local_embedder_batch() {
    let embedder = LocalEmbedder::from_name("all-minilm-l6-v2");
    if embedder.is_err() {
        eprintln!("Skipping LocalEmbedder batch test");
        return;
    }
    let embedder = embedder.unwrap();
    let vecs = embedder.embed_batch(&["store 12", "warehouse 3", "Q4 summary"]).await.unwrap();
    assert_eq!(vecs.len(), 3);
    for v in &vecs {
        assert_eq!(v.len(), 384);
    }
    assert!(embedder.embed_batch(&[]).await.unwrap().is_empty());
}
