// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Instapost: AI agent crew for Instagram posts
//!
//! Writes a caption and hashtags in a brand's voice and sends the post to a
//! Zapier webhook for Buffer scheduling.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use instapost::agents::{PostContext, PostRequest};
use instapost::config::AppConfig;
use instapost::crew::Crew;
use instapost::db::{BrandPreferences, Database};
use instapost::openai::OpenAiClient;
use instapost::post::{MediaRef, MAX_MEDIA};
use instapost::{InstapostError, Result};

/// Instapost CLI - AI Instagram post crew
#[derive(Parser, Debug)]
#[command(name = "instapost")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version)]
#[command(about = "AI agents that write Instagram posts and schedule them via Zapier", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Output format for results
    #[arg(long, global = true, default_value = "text", value_parser = ["text", "json"])]
    format: String,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a post and send it to the webhook
    Create {
        /// Brand whose preferences drive the post
        #[arg(short, long)]
        brand: String,

        /// What the post is about (default: stored topic, then brand name)
        #[arg(short, long)]
        topic: Option<String>,

        /// Image URL or local file (repeatable)
        #[arg(short, long)]
        media: Vec<String>,

        /// Preferred posting time, e.g. "9:00 AM"
        #[arg(long)]
        time: Option<String>,

        /// Timezone for the posting time
        #[arg(long)]
        timezone: Option<String>,

        /// Generate everything but don't send the webhook
        #[arg(long)]
        dry_run: bool,

        /// Never generate an image
        #[arg(long)]
        no_image: bool,

        /// Skip model API health check on startup
        #[arg(long)]
        skip_health_check: bool,

        /// Send even if the same post was already published
        #[arg(long)]
        allow_duplicate: bool,
    },

    /// Brand preference memory
    Brand {
        #[command(subcommand)]
        action: BrandCommands,
    },

    /// Post history
    Posts {
        #[command(subcommand)]
        action: PostsCommands,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Show model API, search, webhook and database status
    Status,

    /// Initialize a new instapost project
    Init {
        /// Directory to initialize (default: current)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Force overwrite existing configuration
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum BrandCommands {
    /// Create or update a brand
    Set {
        /// Brand name
        name: String,

        #[arg(long)]
        tone: Option<String>,

        #[arg(long)]
        audience: Option<String>,

        /// Instagram account handle the post goes to
        #[arg(long)]
        account: Option<String>,

        /// Preferred posting time
        #[arg(long)]
        time: Option<String>,

        #[arg(long)]
        timezone: Option<String>,

        /// Example caption in the brand's voice (repeatable, replaces stored examples)
        #[arg(long)]
        example: Vec<String>,
    },

    /// Show a brand's preferences
    Show {
        name: String,
    },

    /// List all brands
    List,

    /// Delete a brand and its preferences
    Remove {
        name: String,
    },

    /// Set a free-form preference (e.g. topic, emoji_style)
    Pref {
        name: String,
        key: String,
        value: String,
    },
}

#[derive(Subcommand, Debug)]
enum PostsCommands {
    /// List recent posts
    List {
        /// Only this brand's posts
        #[arg(short, long)]
        brand: Option<String>,

        /// Number of posts to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Export post history to JSON
    Export {
        /// Output file
        output: PathBuf,
    },

    /// Show post statistics
    Stats,

    /// Vacuum database (reclaim space)
    Vacuum,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if !cli.quiet {
        info!("Instapost v{}", env!("CARGO_PKG_VERSION"));
    }

    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Commands::Create {
            brand,
            topic,
            media,
            time,
            timezone,
            dry_run,
            no_image,
            skip_health_check,
            allow_duplicate,
        } => {
            let media = media
                .iter()
                .map(|m| MediaRef::parse(m))
                .collect::<Result<Vec<_>>>()?;
            let request = PostRequest {
                brand,
                topic,
                media,
                posting_time: time,
                timezone,
                dry_run,
                generate_image: !no_image,
                allow_duplicate,
            };
            run_create(config, request, skip_health_check, &cli.format).await
        }
        Commands::Brand { action } => run_brand_command(config, action, &cli.format),
        Commands::Posts { action } => run_posts_command(config, action, &cli.format),
        Commands::Config { action } => run_config_command(config, action, &cli.config),
        Commands::Status => run_status(config).await,
        Commands::Init { dir, force } => run_init(dir, force),
    }
}

/// Run the crew for one post
async fn run_create(
    config: AppConfig,
    request: PostRequest,
    skip_health_check: bool,
    format: &str,
) -> Result<()> {
    if request.media.len() > MAX_MEDIA {
        return Err(InstapostError::Validation(format!(
            "at most {} media items per post, got {}",
            MAX_MEDIA,
            request.media.len()
        )));
    }

    for warning in config.validate()? {
        warn!("{}", warning);
    }

    if request.dry_run {
        warn!("DRY RUN MODE - the webhook will not be called");
    }

    if !skip_health_check {
        info!("Checking model API availability...");
        let client = OpenAiClient::from_config(&config)?;
        client.health_check().await.map_err(|e| {
            InstapostError::Model(format!("Model API at {} is unavailable: {}", client.base_url(), e))
        })?;

        let text_model = &config.ai_engine.models.text;
        if !client.model_available(text_model).await? {
            warn!("Text model '{}' not listed by the API", text_model);
        }
    } else {
        warn!("Skipping model API health check");
    }

    let db = Database::open(&config.database.path)?;
    let crew = Crew::new(&config, db)?;
    info!("Crew of {} agents: {:?}", crew.len(), crew.agent_names());

    let ctx = crew.kickoff(request, &config).await?;
    print_post(&ctx, format)
}

fn print_post(ctx: &PostContext, format: &str) -> Result<()> {
    let artifact = ctx.artifact()?;

    if format == "json" {
        let output = serde_json::json!({
            "brand": artifact.brand,
            "idea": artifact.idea,
            "caption": artifact.caption,
            "hashtags": artifact.hashtags,
            "media": artifact.media,
            "outcome": ctx.outcome,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Brand: {}", artifact.brand);
    if let Some(idea) = &artifact.idea {
        println!("Idea: {}", idea);
    }
    println!("\n{}\n", artifact.full_content());
    for media in &artifact.media {
        println!("  media: {}", media);
    }

    if let Some(outcome) = &ctx.outcome {
        println!("\nStatus: {}", outcome.status.as_str());
        println!("  Posting time: {} ({})", outcome.payload.preferred_posting_time, outcome.payload.timezone);
        if let Some(account) = &outcome.payload.account {
            println!("  Account: {}", account);
        }
        if let Some(receipt) = &outcome.receipt {
            println!("  Webhook: HTTP {} after {} attempt(s)", receipt.status, receipt.attempts);
        }
        println!("  Record: {}", outcome.record_id);
    }

    Ok(())
}

/// Run brand commands
fn run_brand_command(config: AppConfig, action: BrandCommands, format: &str) -> Result<()> {
    let db = Database::open(&config.database.path)?;

    match action {
        BrandCommands::Set { name, tone, audience, account, time, timezone, example } => {
            let mut brand = db.get_brand(&name)?.unwrap_or_else(|| BrandPreferences::new(&name));
            if let Some(tone) = tone {
                brand.tone = tone;
            }
            if let Some(audience) = audience {
                brand.audience = audience;
            }
            if account.is_some() {
                brand.account = account;
            }
            if time.is_some() {
                brand.preferred_posting_time = time;
            }
            if timezone.is_some() {
                brand.timezone = timezone;
            }
            if !example.is_empty() {
                brand.examples = example;
            }
            db.upsert_brand(&brand)?;
            println!("Saved brand '{}'", name);
        }
        BrandCommands::Show { name } => {
            let brand = db
                .get_brand(&name)?
                .ok_or_else(|| InstapostError::BrandNotFound(name.clone()))?;
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&brand)?);
            } else {
                print_brand(&brand);
            }
        }
        BrandCommands::List => {
            let brands = db.list_brands()?;
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&brands)?);
            } else {
                println!("Brands ({}):", brands.len());
                for brand in brands {
                    println!(
                        "  {} - {} ({})",
                        brand.name,
                        or_dash(&brand.tone),
                        brand.account.as_deref().unwrap_or("-")
                    );
                }
            }
        }
        BrandCommands::Remove { name } => {
            if !db.delete_brand(&name)? {
                return Err(InstapostError::BrandNotFound(name));
            }
            println!("Removed brand '{}'", name);
        }
        BrandCommands::Pref { name, key, value } => {
            db.set_preference(&name, &key, &value)?;
            println!("Set {}.{} = {}", name, key, value);
        }
    }

    Ok(())
}

fn print_brand(brand: &BrandPreferences) {
    println!("Brand: {}", brand.name);
    println!("  Tone: {}", or_dash(&brand.tone));
    println!("  Audience: {}", or_dash(&brand.audience));
    println!("  Account: {}", brand.account.as_deref().unwrap_or("-"));
    println!(
        "  Posting time: {} ({})",
        brand.preferred_posting_time.as_deref().unwrap_or("-"),
        brand.timezone.as_deref().unwrap_or("-")
    );
    if !brand.examples.is_empty() {
        println!("  Examples:");
        for example in &brand.examples {
            println!("    - {}", example);
        }
    }
    if !brand.extras.is_empty() {
        println!("  Preferences:");
        for (key, value) in &brand.extras {
            println!("    {} = {}", key, value);
        }
    }
    println!("  Updated: {}", brand.updated_at.format("%Y-%m-%d %H:%M"));
}

fn or_dash(s: &str) -> &str {
    if s.is_empty() {
        "-"
    } else {
        s
    }
}

/// Run post history commands
fn run_posts_command(config: AppConfig, action: PostsCommands, format: &str) -> Result<()> {
    let db = Database::open(&config.database.path)?;

    match action {
        PostsCommands::List { brand, limit } => {
            let posts = db.recent_posts(brand.as_deref(), limit)?;
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&posts)?);
            } else {
                println!("Recent posts ({}):", posts.len());
                for post in posts {
                    println!(
                        "  {} [{}] {}: {}",
                        post.created_at.format("%Y-%m-%d %H:%M"),
                        post.status.as_str(),
                        post.brand,
                        post.caption.lines().next().unwrap_or("")
                    );
                }
            }
        }
        PostsCommands::Export { output } => {
            let posts = db.recent_posts(None, usize::MAX)?;
            let json = serde_json::to_string_pretty(&posts)?;
            std::fs::write(&output, json)?;
            println!("Exported {} posts to {:?}", posts.len(), output);
        }
        PostsCommands::Stats => {
            let stats = db.get_stats()?;
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Database Statistics:");
                println!("  Brands: {}", stats.brand_count);
                println!("  Posts: {}", stats.post_count);
                println!("  Published: {}", stats.published_count);
                println!("  Failed: {}", stats.failed_count);
            }
        }
        PostsCommands::Vacuum => {
            db.vacuum()?;
            println!("Database vacuumed successfully");
        }
    }

    Ok(())
}

/// Run config commands
fn run_config_command(config: AppConfig, action: ConfigCommands, config_path: &Path) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
        ConfigCommands::Generate { output } => {
            AppConfig::default().save(&output)?;
            println!("Generated config at {:?}", output);
        }
        ConfigCommands::Validate => {
            let warnings = config.validate()?;
            println!("Configuration at {:?} is valid", config_path);
            println!("  Text model: {}", config.ai_engine.models.text);
            println!("  Vision model: {}", config.ai_engine.models.vision);
            println!("  Database: {}", config.database.path);
            for warning in warnings {
                println!("  warning: {}", warning);
            }
        }
    }
    Ok(())
}

/// Run status check
async fn run_status(config: AppConfig) -> Result<()> {
    println!("Instapost v{} Status", env!("CARGO_PKG_VERSION"));
    println!("======================");

    let client = OpenAiClient::from_config(&config)?;
    match client.health_check().await {
        Ok(()) => println!("Model API ({}): OK", client.base_url()),
        Err(e) => println!("Model API ({}): Error - {}", client.base_url(), e),
    }

    let models = &config.ai_engine.models;
    match client.list_models().await {
        Ok(available) => {
            for model in [&models.text, &models.vision, &models.image] {
                let marker = if available.iter().any(|m| m == model) { "✓" } else { "✗" };
                println!("  {} {}", marker, model);
            }
        }
        Err(e) => println!("  Error listing models: {}", e),
    }

    let search = if !config.search.enabled {
        "disabled"
    } else if config.secrets.serper_api_key.is_some() {
        "enabled"
    } else {
        "no SERPER_API_KEY"
    };
    println!("\nTrend research: {}", search);
    println!("Webhook: {}", config.publisher.webhook_url.as_deref().unwrap_or("not configured"));

    match Database::open(&config.database.path) {
        Ok(db) => {
            let stats = db.get_stats()?;
            println!("\nDatabase ({}):", config.database.path);
            println!("  Brands: {}", stats.brand_count);
            println!("  Posts: {}", stats.post_count);
        }
        Err(e) => println!("\nDatabase: ✗ Error - {}", e),
    }

    Ok(())
}

/// Initialize a new instapost project
fn run_init(dir: Option<PathBuf>, force: bool) -> Result<()> {
    let target = dir.unwrap_or_else(|| PathBuf::from("."));
    let config_path = target.join("config.json");

    if config_path.exists() && !force {
        return Err(InstapostError::Config(
            "config.json already exists. Use --force to overwrite".to_string(),
        ));
    }

    std::fs::create_dir_all(&target)?;
    AppConfig::default().save(&config_path)?;

    let env_path = target.join(".env");
    let wrote_env = !env_path.exists();
    if wrote_env {
        std::fs::write(&env_path, "OPENAI_API_KEY=\nSERPER_API_KEY=\nZAPIER_WEBHOOK_URL=\n")?;
    }

    println!("Instapost initialized in {:?}", target);
    println!("\nCreated:");
    println!("  - config.json");
    if wrote_env {
        println!("  - .env");
    }
    println!("\nNext steps:");
    println!("  1. Fill in API keys and the webhook URL in .env");
    println!("  2. Describe a brand: instapost brand set <name> --tone ... --account ...");
    println!("  3. Try it: instapost create --brand <name> --dry-run");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_create_command() {
        let cli = Cli::try_parse_from([
            "instapost", "create", "--brand", "acme", "--media", "https://cdn.example.com/a.jpg",
            "--media", "https://cdn.example.com/b.jpg", "--dry-run", "--no-image",
        ])
        .unwrap();

        match cli.command {
            Commands::Create { brand, media, dry_run, no_image, topic, .. } => {
                assert_eq!(brand, "acme");
                assert_eq!(media.len(), 2);
                assert!(dry_run);
                assert!(no_image);
                assert!(topic.is_none());
            }
            _ => panic!("Expected Create command"),
        }
    }

    #[test]
    fn test_cli_create_requires_brand() {
        assert!(Cli::try_parse_from(["instapost", "create"]).is_err());
    }

    #[test]
    fn test_cli_brand_pref_command() {
        let cli = Cli::try_parse_from(["instapost", "brand", "pref", "acme", "topic", "rockets"]).unwrap();
        match cli.command {
            Commands::Brand { action: BrandCommands::Pref { name, key, value } } => {
                assert_eq!((name.as_str(), key.as_str(), value.as_str()), ("acme", "topic", "rockets"));
            }
            _ => panic!("Expected Brand Pref command"),
        }
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::try_parse_from([
            "instapost", "posts", "list", "--format", "json", "--config", "/tmp/c.json", "-q",
        ])
        .unwrap();
        assert_eq!(cli.format, "json");
        assert_eq!(cli.config, PathBuf::from("/tmp/c.json"));
        assert!(cli.quiet);
        assert!(Cli::try_parse_from(["instapost", "status", "--format", "xml"]).is_err());
    }

    #[test]
    fn test_init_writes_config_and_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        run_init(Some(dir.path().to_path_buf()), false).unwrap();
        assert!(dir.path().join("config.json").exists());
        assert!(dir.path().join(".env").exists());

        assert!(run_init(Some(dir.path().to_path_buf()), false).is_err());
        run_init(Some(dir.path().to_path_buf()), true).unwrap();
    }
}
