//! Parse command - show what a report would relay without sending it.

use std::path::Path;

use anyhow::Context;

use crate::record::RecordParser;

/// Parse `file` and print the overlay message, or the record as JSON.
pub async fn run(file: &Path, source: Option<&str>, json: bool) -> anyhow::Result<()> {
    let source_id = source
        .map(str::to_string)
        .or_else(|| {
            file.parent()
                .and_then(Path::file_name)
                .map(|name| name.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "source".to_string());

    let record = RecordParser::new(source_id)
        .parse_file(file)
        .await
        .with_context(|| format!("failed to parse {}", file.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        println!("{}", record.to_message());
    }
    Ok(())
}
