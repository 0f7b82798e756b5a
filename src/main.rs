mod db;
mod extractor;
mod fetch;
mod sitemap;
mod webhook;

use std::time::Instant;

use clap::{Parser, Subcommand};

use extractor::HtmlPage;

#[derive(Parser)]
#[command(name = "listing_scraper", about = "Listing address scraper with webhook delivery")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a sitemap and populate the URL queue
    Init {
        /// Sitemap URL to pull page URLs from
        #[arg(long)]
        sitemap: String,
        /// Keep only URLs matching this regex
        #[arg(long)]
        filter: Option<String>,
    },
    /// Fetch unvisited pages
    Fetch {
        /// Max pages to fetch (default: all unvisited)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Extract addresses from fetched pages
    Extract {
        /// Max pages to extract (default: all unextracted)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Deliver pending captures to the webhook
    Send {
        /// Max captures to deliver (default: all pending)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Fetch + extract + send in one pipeline
    Run {
        /// Max pages to fetch
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Capture a single page: fetch, extract, print the payload
    Capture {
        /// Page URL
        url: String,
        /// Also POST the payload to the webhook
        #[arg(long)]
        send: bool,
    },
    /// Show pipeline statistics
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { sitemap, filter } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let urls = sitemap::fetch_page_urls(&sitemap, filter.as_deref()).await?;
            let inserted = db::insert_pages(&conn, &urls)?;
            println!("Inserted {} new page URLs ({} total found)", inserted, urls.len());
            Ok(())
        }
        Commands::Fetch { limit } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let pages = db::fetch_unvisited(&conn, limit)?;
            if pages.is_empty() {
                println!("No unvisited pages. Run 'init' first or all pages are fetched.");
                return Ok(());
            }
            println!("Fetching {} pages (streaming to DB)...", pages.len());
            let stats = fetch::fetch_pages_streaming(&conn, pages).await?;
            println!(
                "Done: {} fetched ({} ok, {} errors).",
                stats.total, stats.ok, stats.errors
            );
            Ok(())
        }
        Commands::Extract { limit } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let pages = db::fetch_unextracted(&conn, limit)?;
            if pages.is_empty() {
                println!("No unextracted pages. Run 'fetch' first.");
                return Ok(());
            }
            println!("Extracting from {} pages...", pages.len());
            let counts = extract_pages(&conn, &pages)?;
            counts.print();
            Ok(())
        }
        Commands::Send { limit } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let stats = webhook::deliver_pending(&conn, limit).await?;
            if stats.total == 0 {
                println!("No pending captures. Run 'extract' first.");
            } else {
                println!(
                    "Delivered {} of {} captures ({} errors).",
                    stats.sent, stats.total, stats.errors
                );
            }
            Ok(())
        }
        Commands::Run { limit } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let pages = db::fetch_unvisited(&conn, limit)?;
            if pages.is_empty() {
                println!("No unvisited pages. Run 'init' first.");
                return Ok(());
            }

            // Phase 1: Fetch (streaming to DB)
            let t_fetch = Instant::now();
            println!("Pipeline: fetching {} pages (streaming to DB)...", pages.len());
            let stats = fetch::fetch_pages_streaming(&conn, pages).await?;
            println!(
                "Fetched {} pages ({} ok, {} errors) in {:.1}s",
                stats.total,
                stats.ok,
                stats.errors,
                t_fetch.elapsed().as_secs_f64()
            );

            // Phase 2: Extract
            let unextracted = db::fetch_unextracted(&conn, None)?;
            if unextracted.is_empty() {
                println!("Nothing to extract (all fetched pages had errors).");
                return Ok(());
            }
            println!("Extracting from {} pages...", unextracted.len());
            let counts = extract_pages(&conn, &unextracted)?;
            counts.print();

            // Phase 3: Deliver
            let delivery = webhook::deliver_pending(&conn, None).await?;
            println!(
                "Delivered {} of {} captures ({} errors).",
                delivery.sent, delivery.total, delivery.errors
            );
            Ok(())
        }
        Commands::Capture { url, send } => capture_single(&url, send).await,
        Commands::Stats => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Queued:       {}", s.total);
            println!("Visited:      {}", s.visited);
            println!("Unvisited:    {}", s.unvisited);
            println!("Fetched OK:   {}", s.fetched);
            println!("Fetch errors: {}", s.fetch_errors);
            println!("Captured:     {}", s.captured);
            println!("No address:   {}", s.failed);
            println!("Delivered:    {}", s.delivered);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

struct ExtractCounts {
    captured: usize,
    failed: usize,
}

impl ExtractCounts {
    fn print(&self) {
        println!(
            "Saved {} captures ({} pages without address fields).",
            self.captured, self.failed,
        );
    }
}

fn extract_pages(
    conn: &rusqlite::Connection,
    pages: &[db::FetchedPage],
) -> anyhow::Result<ExtractCounts> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let pb = ProgressBar::new(pages.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
            .unwrap()
            .progress_chars("#>-"),
    );

    let mut counts = ExtractCounts {
        captured: 0,
        failed: 0,
    };

    for chunk in pages.chunks(200) {
        let rows: Vec<db::CaptureRow> = chunk.par_iter().map(capture_row).collect();

        for row in &rows {
            if row.error.is_some() {
                counts.failed += 1;
            } else {
                counts.captured += 1;
            }
        }

        db::save_captures(conn, &rows)?;
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    Ok(counts)
}

fn capture_row(page: &db::FetchedPage) -> db::CaptureRow {
    let doc = HtmlPage::parse(&page.html);
    match extractor::extract_address(&doc, &page.url) {
        Ok(c) => db::CaptureRow {
            page_data_id: page.page_data_id,
            url: page.url.clone(),
            street: Some(c.street),
            city: Some(c.city),
            state: Some(c.state),
            zip: Some(c.zip),
            full_address: Some(c.full_address),
            error: None,
        },
        Err(e) => db::CaptureRow {
            page_data_id: page.page_data_id,
            url: page.url.clone(),
            street: None,
            city: None,
            state: None,
            zip: None,
            full_address: None,
            error: Some(e.to_string()),
        },
    }
}

async fn capture_single(url: &str, send: bool) -> anyhow::Result<()> {
    let html = fetch::fetch_single_page(url).await?;
    let page = HtmlPage::parse(&html);

    match extractor::extract_address(&page, url) {
        Ok(capture) => {
            let payload = webhook::Payload::from_capture(&capture);
            println!("{}", serde_json::to_string_pretty(&payload)?);

            if send {
                let target = webhook::webhook_url()?;
                let client = fetch::client()?;
                webhook::send_payload(&client, &target, &payload).await?;
                println!("Webhook sent: {}", capture.full_address);
            }
        }
        Err(e) => println!("Extraction failed: {}", e),
    }
    Ok(())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
