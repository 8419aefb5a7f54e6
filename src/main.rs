mod ai;
mod cache;
mod cache_key;
mod extract;
mod fetch;
mod heuristics;
mod models;
mod sites;
mod storage;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use ai::{create_provider, match_resume, resolve_model};
use cache::MatchCache;
use extract::{extractor_for, Page};
use fetch::PageFetcher;
use models::{JobDescription, JobSource, MatchResult};
use storage::SqliteStorage;

#[derive(Parser)]
#[command(name = "jobmatch")]
#[command(about = "Match job postings against your resume - extract, analyze, cache")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize local storage and config directories
    Init,

    /// Extract a job posting and match it against your resume
    Match {
        /// URL of the job posting
        url: String,

        /// Path to your resume (markdown or plain text)
        #[arg(short, long)]
        resume: PathBuf,

        /// Model to use (sonnet, opus, haiku, gpt-4o, gpt-4o-mini, o3)
        #[arg(short, long, default_value = "sonnet")]
        model: String,

        /// Ignore any cached result and re-run the match
        #[arg(long)]
        refresh: bool,

        /// Skip the cache entirely (no read, no write)
        #[arg(long)]
        no_cache: bool,
    },

    /// Extract a job posting without matching
    Extract {
        /// URL of the job posting
        url: Option<String>,

        /// Read page HTML from a local file instead of fetching
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Inspect or clear cached match results
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },

    /// Manage dynamic site extraction configs
    Sites {
        #[command(subcommand)]
        command: SiteCommands,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// List cached match results
    List,

    /// Remove the cached result for one job URL
    Clear {
        /// Job posting URL
        url: String,
    },

    /// Remove all cached results
    ClearAll,
}

#[derive(Subcommand)]
enum SiteCommands {
    /// List registered site configs
    List,

    /// Validate and install a site config JSON file
    Add {
        /// Path to the config file
        file: PathBuf,
    },

    /// Remove a site config by name
    Remove {
        /// Config name
        name: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            let storage = SqliteStorage::open()?;
            let sites_dir = sites::default_sites_dir()?;
            std::fs::create_dir_all(&sites_dir)
                .with_context(|| format!("Failed to create {}", sites_dir.display()))?;
            println!("Storage initialized at {}", storage.path().display());
            println!("Site configs live in {}", sites_dir.display());
        }

        Commands::Match {
            url,
            resume,
            model,
            refresh,
            no_cache,
        } => {
            let resume_text = std::fs::read_to_string(&resume)
                .with_context(|| format!("Failed to read resume: {}", resume.display()))?;

            let job = extract_job(&url)?;
            if !job.has_description() {
                eprintln!("Warning: no description found, matching on degraded job data");
            }

            let cache = MatchCache::new(SqliteStorage::open()?);
            if !no_cache && !refresh {
                if let Some(mut cached) = cache.get(&job) {
                    cached.is_cached = true;
                    print_match(&cached);
                    return Ok(());
                }
            }

            let spec = resolve_model(&model)?;
            let provider = create_provider(&spec)?;
            eprintln!("Matching with {}...", provider.model_name());
            let result = match_resume(provider.as_ref(), &resume_text, &job)?;

            if !no_cache {
                if let Err(e) = cache.save(&result) {
                    eprintln!("Warning: result not cached: {e}");
                }
            }
            print_match(&result);
        }

        Commands::Extract { url, file } => {
            let job = match (url, file) {
                (maybe_url, Some(path)) => {
                    let body = std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read {}", path.display()))?;
                    // A URL given next to --file still drives extractor
                    // selection and the cache key.
                    let url =
                        maybe_url.unwrap_or_else(|| format!("file://{}", path.display()));
                    let configs = sites::load_site_configs(&sites::default_sites_dir()?)?;
                    let page = Page::parse(&url, &body);
                    extractor_for(&url, &configs).extract(&page)
                }
                (Some(url), None) => extract_job(&url)?,
                (None, None) => {
                    return Err(anyhow!("Provide a URL or --file <path>"));
                }
            };
            print_job(&job);
        }

        Commands::Cache { command } => {
            let cache = MatchCache::new(SqliteStorage::open()?);
            match command {
                CacheCommands::List => {
                    let entries = cache.entries();
                    if entries.is_empty() {
                        println!("Cache is empty.");
                    } else {
                        println!(
                            "{:<34} {:>6} {:<30} {:>8}",
                            "KEY", "MATCH", "TITLE", "AGE"
                        );
                        println!("{}", "-".repeat(82));
                        let now = chrono::Utc::now().timestamp_millis();
                        for (key, entry) in entries {
                            let age_days = (now - entry.cached_at) / (24 * 60 * 60 * 1000);
                            println!(
                                "{:<34} {:>5}% {:<30} {:>7}d",
                                truncate(&key, 32),
                                entry.result.match_percentage,
                                truncate(&entry.result.job.title, 28),
                                age_days
                            );
                        }
                    }
                }

                CacheCommands::Clear { url } => {
                    cache.clear(&job_stub(&url))?;
                    println!("Cleared cached result for {url}");
                }

                CacheCommands::ClearAll => {
                    cache.clear_all()?;
                    println!("Cleared all cached results.");
                }
            }
        }

        Commands::Sites { command } => {
            let dir = sites::default_sites_dir()?;
            match command {
                SiteCommands::List => {
                    let configs = sites::load_site_configs(&dir)?;
                    if configs.is_empty() {
                        println!("No site configs registered.");
                    } else {
                        println!("{:<20} {:<40}", "NAME", "URL PATTERN");
                        println!("{}", "-".repeat(60));
                        for config in configs {
                            println!(
                                "{:<20} {:<40}",
                                truncate(&config.name, 18),
                                truncate(&config.url_pattern, 38)
                            );
                        }
                    }
                }

                SiteCommands::Add { file } => {
                    let config = sites::add_site_config(&dir, &file)?;
                    println!("Registered site '{}' ({})", config.name, config.url_pattern);
                }

                SiteCommands::Remove { name } => {
                    if sites::remove_site_config(&dir, &name)? {
                        println!("Removed site '{name}'.");
                    } else {
                        println!("No site named '{name}'.");
                    }
                }
            }
        }
    }

    Ok(())
}

fn extract_job(url: &str) -> Result<JobDescription> {
    let configs = sites::load_site_configs(&sites::default_sites_dir()?)?;
    let fetcher = PageFetcher::new()?;
    eprintln!("Fetching {url}...");
    let body = fetcher.fetch(url)?;
    let page = Page::parse(url, &body);
    let extractor = extractor_for(url, &configs);
    eprintln!("Extracting with the {} extractor...", extractor.name());
    Ok(extractor.extract(&page))
}

// Minimal job wrapper so URL-based cache operations can derive a key; the
// key scheme normalizes the generic source from the URL.
fn job_stub(url: &str) -> JobDescription {
    JobDescription {
        title: String::new(),
        company: String::new(),
        description: String::new(),
        source: JobSource::Generic,
        url: url.to_string(),
        extracted_at: chrono::Utc::now(),
        extraction_metadata: None,
    }
}

fn print_match(result: &MatchResult) {
    let cached = if result.is_cached { " (cached)" } else { "" };
    println!(
        "Match: {}%{} - {} at {}",
        result.match_percentage, cached, result.job.title, result.job.company
    );
    println!("Source: {} ({})", result.job.source, result.job.url);

    if !result.analysis.is_empty() {
        println!("\n--- Analysis ---");
        println!("{}", textwrap::fill(&result.analysis, 80));
    }

    if !result.checklist.is_empty() {
        println!("\n--- Checklist ---");
        for item in &result.checklist {
            let mark = if item.checked { "x" } else { " " };
            println!("[{}] {}: {}", mark, item.category, item.description);
        }
    }
}

fn print_job(job: &JobDescription) {
    println!("Title: {}", job.title);
    println!("Company: {}", job.company);
    println!("Source: {}", job.source);
    println!("URL: {}", job.url);
    println!("Extracted: {}", job.extracted_at.format("%Y-%m-%d %H:%M:%S"));

    if let Some(meta) = &job.extraction_metadata {
        if let Some(selector) = &meta.used_selector {
            println!("Selector: {selector}");
        }
        if meta.is_collection {
            println!("Selected from scanned content blocks");
        }
        if !job.has_description() && !meta.failed_selectors.is_empty() {
            println!("Tried selectors: {}", meta.failed_selectors.join(", "));
        }
    }

    println!("\n--- Description ---\n{}", job.description);
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        format!("{}...", &s[..max.saturating_sub(3)])
    }
}
