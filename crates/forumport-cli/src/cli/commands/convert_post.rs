//! Debugging aid: show what the rewriter makes of one post.

use std::fs;
use std::path::Path;

use console::style;

use forumport::rewrite::to_markdown;
use forumport::{Rewriter, Settings};

use super::helpers::connect_source;

/// Write `post.raw` (the legacy text), `post.simple` (the prepared text,
/// before quote resolution) and `post.md` (its Markdown rendering) into
/// `output`, then print the Markdown.
pub async fn cmd_convert_post(settings: &Settings, id: i64, output: &Path) -> anyhow::Result<()> {
    let source = connect_source(settings).await?;
    let Some(raw) = source.post_message(id).await? else {
        anyhow::bail!("Post {} not found", id);
    };

    let rewriter = Rewriter::new(settings.rules.spoiler_label.clone());
    let simple = rewriter.prepare(&raw);
    let markdown = to_markdown(&simple);

    fs::create_dir_all(output)?;
    let raw_path = output.join("post.raw");
    let simple_path = output.join("post.simple");
    let markdown_path = output.join("post.md");
    fs::write(&raw_path, &raw)?;
    fs::write(&simple_path, &simple)?;
    fs::write(&markdown_path, &markdown)?;

    for path in [&raw_path, &simple_path, &markdown_path] {
        println!("{} Wrote {}", style("✓").green(), path.display());
    }
    println!();
    println!("{}", style("=== Markdown ===").bold());
    println!("{}", markdown);
    Ok(())
}
