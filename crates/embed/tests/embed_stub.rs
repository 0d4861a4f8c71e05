use embed::{Embedder, DummyEmbedder};
use anyhow::Result;

#[tokio::test]
async fn test_dummy_embedder() -> Result<()> {
    let embedder = DummyEmbedder;
    let vec = embedder.embed("quarterly revenue by store").await?;
    assert_eq!(vec.len(), 384);
    assert_eq!(embedder.dimension(), 384);
    Ok(())
}

#[tokio::test]
async fn test_dummy_embedder_batch_keeps_order_and_length() -> Result<()> {
    let embedder = DummyEmbedder;
    let vecs = embedder.embed_batch(&["annual report", "purchase order", "flyer"]).await?;
    assert_eq!(vecs.len(), 3);
    assert!(vecs.iter().all(|v| v.len() == embedder.dimension()));
    Ok(())
}
