//! `echovault doctor` — vault and index health checks.

use anyhow::Result;
use std::path::Path;

use crate::db;

pub fn run(memory_home: &Path) -> Result<()> {
    println!("Memory home: {}", memory_home.display());

    let config_path = memory_home.join("config.yaml");
    println!(
        "Config:      {} ({})",
        config_path.display(),
        if config_path.exists() { "present" } else { "missing, using defaults" }
    );

    let db_path = memory_home.join("index.db");
    let conn = db::open_database(&db_path)?;
    let report = db::check_database_health(&conn)?;

    println!("Index:       {}", db_path.display());
    println!(
        "Integrity:   {}",
        if report.integrity_ok { "ok".to_string() } else { report.integrity_details.clone() }
    );
    println!("sqlite-vec:  {}", report.sqlite_vec_version);
    println!("Memories:    {} ({} with details)", report.memory_count, report.detail_count);
    match (report.embedding_dim, report.vector_count) {
        (Some(dim), Some(vectors)) => {
            println!("Vectors:     {vectors} at dimension {dim}");
            if vectors < report.memory_count {
                println!(
                    "             {} memories have no vector — run `echovault reindex`",
                    report.memory_count - vectors
                );
            }
        }
        _ => println!("Vectors:     none (no embedding has been stored yet)"),
    }

    if !report.integrity_ok {
        anyhow::bail!("database integrity check failed");
    }
    Ok(())
}
