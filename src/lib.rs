pub mod cli;
pub mod config;
pub mod filter;
pub mod fluentbit;

use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt::Write;
use std::path::Path;

pub use cli::{Cli, Commands, OutputFormat, cli_parse};
pub use filter::{
    Filter, FilterError, FilterParseError, Member, RecordMatcher, all_components,
    all_fluent_config, lua_quote, matches_any,
};
pub use fluentbit::{Stage, render_stages};

#[derive(Debug, Serialize)]
struct ScriptOutput<'a> {
    tag: &'a str,
    stages: &'a [Stage],
    lua: &'a str,
}

fn write_output_file(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write output file '{}'", path.display()))
}

fn render_components(
    tag: &str,
    texts: &[String],
    exclude: bool,
    format: OutputFormat,
) -> Result<String> {
    let filters = texts
        .iter()
        .map(|text| Filter::new(text).with_context(|| format!("Invalid filter '{text}'")))
        .collect::<Result<Vec<_>>>()?;

    let stages = all_components(tag, &filters, exclude);
    match format {
        OutputFormat::Text => Ok(render_stages(&stages)),
        OutputFormat::Json => {
            serde_json::to_string_pretty(&stages).context("Failed to serialize stages")
        }
    }
}

fn render_script(config_path: &Path, tag: Option<&str>, format: OutputFormat) -> Result<String> {
    let job = config::load_config_from_path(config_path)?;
    let filters = job.compile_filters()?;
    let tag = tag.unwrap_or(job.tag.as_str());
    if job.exclude {
        log::warn!("'exclude' has no effect on named filter scripts");
    }

    let (stages, lua) = all_fluent_config(tag, &filters);
    match format {
        OutputFormat::Text => {
            let mut out = render_stages(&stages);
            if !out.is_empty() {
                out.push('\n');
            }
            let _ = writeln!(out, "-- filter results for tag {tag}");
            out.push_str(&lua);
            Ok(out)
        }
        OutputFormat::Json => serde_json::to_string_pretty(&ScriptOutput {
            tag,
            stages: &stages,
            lua: &lua,
        })
        .context("Failed to serialize script output"),
    }
}

fn render_check(text: &str, file: &Path, format: OutputFormat) -> Result<String> {
    let filter = Filter::new(text).with_context(|| format!("Invalid filter '{text}'"))?;
    let matcher = RecordMatcher::new(&filter);
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read '{}'", file.display()))?;

    let mut lines = Vec::new();
    let mut records = Vec::new();
    for (number, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record: serde_json::Value = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(e) => {
                log::warn!("{}:{}: skipping invalid JSON: {}", file.display(), number + 1, e);
                continue;
            }
        };
        if matcher.matches(&record) {
            lines.push(line);
            records.push(record);
        }
    }
    log::info!("{} record(s) matched {filter}", records.len());

    match format {
        OutputFormat::Text => Ok(lines.iter().map(|l| format!("{l}\n")).collect()),
        OutputFormat::Json => {
            serde_json::to_string_pretty(&records).context("Failed to serialize records")
        }
    }
}

/// Produce the output of a parsed command line
pub fn render(cli: &Cli) -> Result<String> {
    match &cli.command {
        Commands::Components {
            tag,
            exclude,
            filters,
        } => render_components(tag, filters, *exclude, cli.format),
        Commands::Script { config, tag } => render_script(config, tag.as_deref(), cli.format),
        Commands::Check { filter, file } => render_check(filter, file, cli.format),
    }
}

pub fn run(cli: &Cli) -> Result<()> {
    let output = render(cli)?;
    print!("{output}");
    if !output.ends_with('\n') {
        println!();
    }
    if let Some(path) = &cli.output {
        write_output_file(path, &output)?;
    }
    Ok(())
}
