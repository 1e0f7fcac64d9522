//! `echovault reindex` — rebuild the vector table with the configured model.

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};

use crate::service::MemoryService;

pub async fn run(service: &MemoryService) -> Result<()> {
    let total = service.count_memories(None, None)? as u64;

    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {bar:40.cyan/blue} {pos}/{len} memories ({eta})")
            .expect("valid template")
            .progress_chars("##-"),
    );

    let result = service
        .reindex(|current, _total| {
            pb.set_position(current as u64);
        })
        .await?;

    pb.finish_and_clear();
    println!(
        "Reindexed {} memories at dimension {} with model {}",
        result.count, result.dim, result.model
    );
    Ok(())
}
