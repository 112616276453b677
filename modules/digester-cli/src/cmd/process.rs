use anyhow::Result;

use digester_common::{AppConfig, EnrichSettings};
use digester_enrich::{EnrichmentContext, Pipeline};
use digester_store::ArticleStore;

pub async fn run(store: &ArticleStore, config: &AppConfig, batch_size: Option<usize>) -> Result<()> {
    let ctx = EnrichmentContext::from_config(config)?;
    let pipeline = Pipeline::new(store.clone(), ctx);

    let mut settings = EnrichSettings::default();
    if let Some(batch_size) = batch_size {
        settings.batch_size = batch_size;
    }
    let stats = pipeline.process_batch(&settings).await?;

    println!("{stats}");
    println!("Processed {} articles", stats.processed);
    Ok(())
}
