//! Polysearch CLI - index and search a polymorphic full-text table

use clap::{Parser, Subcommand};
use polysearch_core::config::Config;
use polysearch_core::search::{
    FulltextRow, Hits, IndexRepository, OwnerRef, ParentScope, RawFragments, SearchOptions,
    SearchOutput, SearchService, coerce_integer,
};
use polysearch_core::storage::Database;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Parser)]
#[command(name = "polysearch")]
#[command(author, version, about = "Ranked full-text search over a polymorphic index table", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Database file (overrides `database.path` from the config)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Index (or re-index) a record
    Index {
        /// Owner type, e.g. Article
        owner_type: String,
        /// Owner id
        owner_id: i64,
        /// Searchable text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
        /// Parent id used for scoped searches
        #[arg(short, long, allow_hyphen_values = true)]
        parent: Option<String>,
    },

    /// Remove a record from the index
    Remove {
        /// Owner type
        owner_type: String,
        /// Owner id
        owner_id: i64,
    },

    /// Search the index
    Search(SearchArgs),

    /// Show index statistics
    Stats,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Run health check
    Doctor,
}

#[derive(clap::Args)]
struct SearchArgs {
    /// Free-text query; every word matches as a prefix
    query: String,

    /// Restrict to these owner types (repeatable)
    #[arg(long)]
    only: Vec<String>,

    /// Restrict to these parent ids (repeatable)
    #[arg(long, allow_hyphen_values = true)]
    parent: Vec<String>,

    /// Maximum results (0 for all, negative for the default)
    #[arg(long, allow_negative_numbers = true)]
    limit: Option<i64>,

    /// Results to skip
    #[arg(long, allow_negative_numbers = true)]
    offset: Option<i64>,

    /// Page number; enables page pagination
    #[arg(long, allow_negative_numbers = true)]
    page: Option<i64>,

    /// Page size in page pagination
    #[arg(long, allow_negative_numbers = true)]
    per_page: Option<i64>,

    /// Extra SQL condition
    #[arg(long = "where")]
    where_clause: Option<String>,

    /// Extra SQL joins
    #[arg(long)]
    joins: Option<String>,

    /// Extra select expressions
    #[arg(long)]
    select: Option<String>,

    /// GROUP BY expression
    #[arg(long)]
    group: Option<String>,

    /// HAVING condition
    #[arg(long)]
    having: Option<String>,

    /// Print owner type/id pairs instead of loading rows
    #[arg(long)]
    raw: bool,
}

impl SearchArgs {
    fn options(&self) -> SearchOptions {
        SearchOptions {
            active_record: !self.raw,
            parent_id: ParentScope::coerce(&self.parent),
            only: self.only.clone().into(),
            limit: self.limit,
            offset: self.offset,
            page: self.page,
            per_page: self.per_page,
            fragments: RawFragments {
                select: self.select.clone(),
                joins: self.joins.clone(),
                where_clause: self.where_clause.clone(),
                group: self.group.clone(),
                having: self.having.clone(),
            },
        }
    }
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },
    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// Configuration value
        value: String,
    },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show the config file path
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing; stdout is reserved for results
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("polysearch=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Index {
            owner_type,
            owner_id,
            text,
            parent,
        } => {
            let db = open_database(cli.database.as_deref()).await?;
            cmd_index(&db, owner_type, owner_id, &text, parent.as_deref(), cli.quiet).await
        }

        Commands::Remove {
            owner_type,
            owner_id,
        } => {
            let db = open_database(cli.database.as_deref()).await?;
            cmd_remove(&db, OwnerRef::new(owner_type, owner_id), cli.quiet).await
        }

        Commands::Search(args) => {
            let db = open_database(cli.database.as_deref()).await?;
            cmd_search(&db, &args, cli.format, cli.quiet).await
        }

        Commands::Stats => {
            let db = open_database(cli.database.as_deref()).await?;
            cmd_stats(&db, cli.format).await
        }

        Commands::Config { action } => cmd_config(action, cli.quiet),

        Commands::Doctor => cmd_doctor(cli.database.as_deref(), cli.quiet).await,
    }
}

/// Open the configured database, migrating the configured index table
async fn open_database(path: Option<&Path>) -> anyhow::Result<Database> {
    let config = Config::load()?;
    let mut db_config = config.database_config()?;
    if let Some(path) = path {
        db_config.path = path.to_path_buf();
    }
    Database::new(db_config).await
}

fn repository(db: &Database) -> IndexRepository {
    IndexRepository::new(db.pool().clone(), db.index_table().clone())
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn cmd_index(
    db: &Database,
    owner_type: String,
    owner_id: i64,
    text: &[String],
    parent: Option<&str>,
    quiet: bool,
) -> anyhow::Result<()> {
    let mut row = FulltextRow::new(owner_type, owner_id, text.join(" "));
    row.parent_id = parent.map(coerce_integer);

    repository(db).index(&row).await?;

    if !quiet {
        println!("Indexed {}", row.owner());
        if let Some(parent_id) = row.parent_id {
            println!("  Parent: {}", parent_id);
        }
    }
    Ok(())
}

async fn cmd_remove(db: &Database, owner: OwnerRef, quiet: bool) -> anyhow::Result<()> {
    let removed = repository(db).remove(&owner).await?;
    if !quiet {
        if removed {
            println!("Removed {}", owner);
        } else {
            println!("{} was not indexed", owner);
        }
    }
    Ok(())
}

async fn cmd_search(
    db: &Database,
    args: &SearchArgs,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let config = Config::load()?;
    let repository = repository(db);
    let registry = repository.row_registry().await?;
    let service = SearchService::new(db.pool().clone(), db.index_table().clone(), registry)
        .with_default_per_page(config.search.default_per_page);

    let output = match service.search(&args.query, &args.options()).await {
        Ok(output) => output,
        Err(err) => {
            if let Some(suggestion) = err.suggestion() {
                warn!(code = err.code(), "Search failed");
                eprintln!("Hint: {}", suggestion);
            }
            return Err(err.into());
        }
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output)?),
        OutputFormat::Text => print_results(&output, quiet),
    }
    Ok(())
}

fn print_results(output: &SearchOutput<FulltextRow>, quiet: bool) {
    if output.hits.is_empty() {
        if !quiet {
            println!("No results.");
        }
        return;
    }

    match &output.hits {
        Hits::Records(rows) => {
            for (rank, row) in rows.iter().enumerate() {
                println!("{:>3}. {}  {}", rank + 1, row.owner(), row.indexed_text);
            }
        }
        Hits::Refs(refs) => {
            for (rank, owner) in refs.iter().enumerate() {
                println!("{:>3}. {}", rank + 1, owner);
            }
        }
    }

    if let (Some(page), false) = (output.page, quiet) {
        println!(
            "\nPage {} of {} ({} entries, {} per page)",
            page.current_page,
            page.total_pages(),
            page.total_entries,
            page.per_page
        );
    }
}

async fn cmd_stats(db: &Database, format: OutputFormat) -> anyhow::Result<()> {
    let repository = repository(db);
    let count = repository.count().await?;
    let owner_types = repository.owner_types().await?;

    match format {
        OutputFormat::Json => {
            let stats = serde_json::json!({
                "index_table": db.index_table().name(),
                "rows": count,
                "owner_types": owner_types,
            });
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        OutputFormat::Text => {
            println!("Index table: {}", db.index_table());
            println!("Rows: {}", count);
            if owner_types.is_empty() {
                println!("Owner types: (none)");
            } else {
                println!("Owner types: {}", owner_types.join(", "));
            }
        }
    }
    Ok(())
}

fn cmd_config(action: ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            let items = config.list()?;
            for (key, value) in items {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

async fn cmd_doctor(database: Option<&Path>, quiet: bool) -> anyhow::Result<()> {
    if !quiet {
        println!("Polysearch Health Check");
        println!("=======================");
        println!();
    }

    let mut all_ok = true;

    // Check configuration
    match Config::load().and_then(|config| config.index_table().map(|table| (config, table))) {
        Ok((_, table)) => {
            if !quiet {
                println!("[OK] Configuration: Valid");
                println!("     Index table: {}", table);
            }
        }
        Err(e) => {
            all_ok = false;
            if !quiet {
                println!("[!!] Configuration: Error - {}", e);
            }
        }
    }

    // Check config file location
    if !quiet {
        match Config::config_path() {
            Ok(path) => {
                if path.exists() {
                    println!("[OK] Config file: {}", path.display());
                } else {
                    println!("[--] Config file: {} (using defaults)", path.display());
                }
            }
            Err(e) => {
                println!("[!!] Config file: Error - {}", e);
            }
        }
    }

    // Check database
    match open_database(database).await {
        Ok(db) => match db.health_check().await {
            Ok(()) => {
                if !quiet {
                    println!("[OK] Database: Connected");
                    println!("     Path: {}", db.path().display());
                    match db.migration_status().await {
                        Ok(status) if status.needs_migration => println!(
                            "[!!] Database: Migrations pending (v{} -> v{})",
                            status.current_version, status.target_version
                        ),
                        Ok(status) => println!("[OK] Database: Schema v{}", status.current_version),
                        Err(e) => println!("[!!] Database: Migration check failed - {}", e),
                    }
                }

                // Check index table
                match repository(&db).count().await {
                    Ok(rows) => {
                        if !quiet {
                            println!("[OK] Index table: {} ({} rows)", db.index_table(), rows);
                        }
                    }
                    Err(e) => {
                        all_ok = false;
                        if !quiet {
                            println!("[!!] Index table: {} - {}", db.index_table(), e);
                        }
                    }
                }
            }
            Err(e) => {
                all_ok = false;
                if !quiet {
                    println!("[!!] Database: Health check failed - {}", e);
                }
            }
        },
        Err(e) => {
            all_ok = false;
            if !quiet {
                println!("[!!] Database: Error - {}", e);
            }
        }
    }

    if !quiet {
        println!();
        if all_ok {
            println!("All checks passed.");
        } else {
            println!("Some checks failed. See above for details.");
        }
    }

    if all_ok {
        Ok(())
    } else {
        Err(anyhow::anyhow!("Health check failed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_search_args_build_options() {
        let cli = Cli::parse_from([
            "polysearch",
            "search",
            "database engine",
            "--only",
            "article",
            "--only",
            "bar$",
            "--parent",
            "7x",
            "--limit",
            "-3",
            "--offset",
            "-5",
            "--where",
            "fulltext_rows.owner_id > 1",
            "--raw",
        ]);
        let Commands::Search(args) = cli.command else {
            panic!("expected search command");
        };
        let options = args.options();
        assert!(!options.active_record);
        assert_eq!(options.only.types(), ["Article"]);
        assert_eq!(options.parent_id, Some(ParentScope::One(7)));
        assert_eq!(options.limit, Some(-3));
        assert_eq!(options.offset, Some(-5));
        assert_eq!(
            options.fragments.where_clause.as_deref(),
            Some("fulltext_rows.owner_id > 1")
        );
    }

    #[test]
    fn test_multiple_parents_become_membership_scope() {
        let cli = Cli::parse_from(["polysearch", "search", "q", "--parent", "1", "--parent", "abc"]);
        let Commands::Search(args) = cli.command else {
            panic!("expected search command");
        };
        assert_eq!(args.options().parent_id, Some(ParentScope::Many(vec![1, 0])));
        assert!(args.options().active_record);
    }
}
