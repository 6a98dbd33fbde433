use std::sync::Arc;

use canopy_forest::{
    DiscussionNode, ForestConfig, ForestInserter, MissingReason, PostFacade, PostView,
    TruncationReason,
};
use canopy_server::{CanopyServer, ServerConfig};
use canopy_store::InMemoryRecordStore;
use canopy_types::{NewComment, NewPost, UserId};
use colored::Colorize;

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => cmd_serve(args).await,
        Command::Demo(args) => cmd_demo(args, cli.format).await,
        Command::Config(_) => cmd_config(),
    }
}

async fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(dir) = args.data_dir {
        config.data_dir = Some(dir);
    }

    let storage = match &config.data_dir {
        Some(dir) => dir.display().to_string(),
        None => "in-memory".into(),
    };
    println!(
        "{} Canopy server on {} (storage: {})",
        "✓".green().bold(),
        config.bind_addr.to_string().bold(),
        storage
    );
    CanopyServer::new(config)?.serve().await?;
    Ok(())
}

async fn cmd_demo(args: DemoArgs, format: OutputFormat) -> anyhow::Result<()> {
    let mut forest = ForestConfig::default();
    if let Some(max_depth) = args.max_depth {
        forest = forest.with_max_depth(max_depth);
    }
    forest.validate()?;

    let view = seed_demo(args.depth, forest).await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&view)?),
        OutputFormat::Text => {
            println!("{} {}", "Post".bold(), view.title.yellow().bold());
            for line in render_tree(&view.comments) {
                println!("{line}");
            }
            println!(
                "\n{} expanded, {} missing, {} truncated",
                view.stats.expanded.to_string().green(),
                view.stats.missing.to_string().red(),
                view.stats.truncated.to_string().yellow()
            );
        }
    }
    Ok(())
}

/// Build a post whose discussion is one reply chain `depth` comments long,
/// plus a sibling at the top level, and read it back.
async fn seed_demo(depth: usize, config: ForestConfig) -> anyhow::Result<PostView> {
    let store = Arc::new(InMemoryRecordStore::new());
    let inserter = ForestInserter::new(Arc::clone(&store), config.max_append_retries);
    let facade = PostFacade::new(store, config)?;

    let author = UserId::new("demo")?;
    let post = facade
        .create_post(NewPost::new("Reply chain").with_creator(author.clone()))
        .await?;

    let mut parent = None;
    for level in 1..=depth {
        let mut input = NewComment::new(format!("reply at depth {level}")).by(author.clone());
        input.parent = parent;
        let comment = inserter.insert_comment(&post.id, input).await?;
        parent = Some(comment.id);
    }
    facade
        .add_comment(&post.id, NewComment::new("a sibling thread"))
        .await
        .map_err(Into::into)
}

fn render_tree(nodes: &[DiscussionNode]) -> Vec<String> {
    let mut lines = Vec::new();
    render_level(nodes, 0, &mut lines);
    lines
}

fn render_level(nodes: &[DiscussionNode], indent: usize, lines: &mut Vec<String>) {
    let pad = "  ".repeat(indent);
    for node in nodes {
        match node {
            DiscussionNode::Comment(c) => {
                let author = c.author.as_ref().map(UserId::as_str).unwrap_or("anonymous");
                lines.push(format!(
                    "{pad}• {} {} {}",
                    c.text,
                    format!("({author})").dimmed(),
                    c.id.short_id().dimmed()
                ));
                render_level(&c.children, indent + 1, lines);
            }
            DiscussionNode::Missing { id, reason } => {
                let reason = match reason {
                    MissingReason::NotFound => "not found".to_string(),
                    MissingReason::Unavailable(msg) => format!("unavailable: {msg}"),
                    MissingReason::Corrupt(msg) => format!("corrupt: {msg}"),
                };
                lines.push(format!(
                    "{pad}{} {} ({reason})",
                    "✗ missing".red(),
                    id.short_id()
                ));
            }
            DiscussionNode::Truncated { id, reason } => {
                let reason = match reason {
                    TruncationReason::Depth => "depth limit",
                    TruncationReason::Budget => "node budget",
                    TruncationReason::Cycle => "cycle",
                    TruncationReason::Duplicate => "duplicate",
                };
                lines.push(format!(
                    "{pad}{} {} ({reason})",
                    "… truncated".yellow(),
                    id.short_id()
                ));
            }
        }
    }
}

fn cmd_config() -> anyhow::Result<()> {
    print!("{}", toml::to_string_pretty(&ServerConfig::default())?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn demo_chain_is_fully_expanded_within_bounds() {
        let view = seed_demo(4, ForestConfig::default()).await.unwrap();
        assert_eq!(view.comments.len(), 2);
        assert_eq!(view.stats.expanded, 5);
        assert_eq!(view.stats.truncated, 0);

        let lines = render_tree(&view.comments);
        assert_eq!(lines.len(), 5);
        assert!(lines[0].contains("reply at depth 1"));
        assert!(lines[3].starts_with("      •"));
        assert!(lines[4].contains("a sibling thread"));
    }

    #[tokio::test]
    async fn demo_deeper_than_bound_shows_marker() {
        let view = seed_demo(6, ForestConfig::default().with_max_depth(3))
            .await
            .unwrap();
        assert_eq!(view.stats.truncated, 1);

        let lines = render_tree(&view.comments);
        assert!(lines.iter().any(|l| l.contains("depth limit")));
        let level3 = view.comments[0].as_comment().unwrap().children[0]
            .as_comment()
            .unwrap()
            .children[0]
            .as_comment()
            .unwrap();
        assert!(level3.children[0].is_truncated());
        assert!(!lines.iter().any(|l| l.contains("reply at depth 4")));
    }

    #[tokio::test]
    async fn empty_demo_has_only_the_sibling() {
        let view = seed_demo(0, ForestConfig::default()).await.unwrap();
        assert_eq!(view.comments.len(), 1);
        assert_eq!(render_tree(&view.comments).len(), 1);
    }
}
