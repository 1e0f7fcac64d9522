//! `echovault delete` — targeted or age-based deletion.

use anyhow::{bail, Result};

use crate::memory::types::Category;
use crate::service::MemoryService;

pub fn run(
    service: &MemoryService,
    id: Option<&str>,
    older_than_days: Option<i64>,
    project: Option<&str>,
    category: Option<&str>,
) -> Result<()> {
    match (id, older_than_days) {
        (Some(id), None) => {
            // A missing memory is reported but is not a failure.
            if service.delete(id)? {
                println!("Deleted memory {id}");
            } else {
                println!("No memory found with ID {id}");
            }
            Ok(())
        }
        (None, Some(days)) => {
            let category = match category.filter(|c| !c.is_empty()) {
                Some(c) => Some(c.parse::<Category>().map_err(|e| {
                    anyhow::anyhow!("invalid argument: {e} (expected one of: decision, pattern, bug, context, learning)")
                })?),
                None => None,
            };
            let deleted = service.delete_by_filter(project, category, days)?;
            println!("Deleted {deleted} memories older than {days} days");
            Ok(())
        }
        (Some(_), Some(_)) => {
            bail!("invalid argument: pass either a memory ID or --older-than-days, not both")
        }
        (None, None) => bail!("invalid argument: a memory ID or --older-than-days is required"),
    }
}
