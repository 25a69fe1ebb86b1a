use console::style;

use crate::commands::shared::{OutputFormat, build_service, print_json};
use crate::config::Config;

/// Show how many items each side holds.
pub(crate) async fn handle_counts(
    output: OutputFormat,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let service = build_service(config)?;
    let counts = service.counts().await;

    match output {
        OutputFormat::Json => print_json(&counts)?,
        OutputFormat::Text => {
            println!("Raindrop: {}", describe(counts.source, counts.source_error.as_deref()));
            println!("Notion:   {}", describe(counts.mirror, counts.mirror_error.as_deref()));
            if let Some(diff) = difference(counts.source, counts.mirror)
                && diff != 0
            {
                println!("{} {} bookmark(s) out of step", style("⚠").yellow(), diff.abs());
            }
        }
    }

    Ok(())
}

fn difference(source: Option<usize>, mirror: Option<usize>) -> Option<i64> {
    let source = i64::try_from(source?).ok()?;
    let mirror = i64::try_from(mirror?).ok()?;
    Some(source - mirror)
}

fn describe(count: Option<usize>, error: Option<&str>) -> String {
    match (count, error) {
        (Some(count), _) => count.to_string(),
        (None, Some(error)) => format!("unavailable ({})", error),
        (None, None) => "unavailable".to_string(),
    }
}
