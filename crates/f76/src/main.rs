use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use f76_core::fetch::{PageClient, PageFetcher};
use f76_core::item_locations::ensure_item_locations;
use f76_core::junk_items::scrape_junk_items;
use f76_core::lookup;
use f76_core::regions::scrape_regions_and_locations;
use f76_core::runtime::{ResolutionContext, ResolvedDb, resolve_db};
use f76_core::store::Store;
use f76_core::{JUNK_ITEMS_URL, LOCATIONS_URL};
use serde::Serialize;

#[derive(Debug, Parser)]
#[command(name = "f76", version, about = "Fallout 76 scrap and location lookup")]
struct Cli {
    #[arg(long, global = true, value_name = "PATH", help = "Path to fallout.sqlite")]
    db: Option<PathBuf>,
    #[arg(long, global = true, help = "Print results as JSON")]
    json: bool,
    #[arg(long, global = true, help = "Print resolved runtime diagnostics")]
    diagnostics: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Create and populate the database by running the scrapers once")]
    Init,
    #[command(subcommand, about = "Run one of the scrapers against the live wiki")]
    Scrape(ScrapeCommand),
    #[command(name = "components-of", about = "What a junk item scraps into")]
    ComponentsOf(NameArg),
    #[command(name = "items-for", about = "Junk items that yield a component")]
    ItemsFor(NameArg),
    #[command(name = "region-of", about = "Region containing a location")]
    RegionOf(NameArg),
    #[command(name = "locations-in", about = "Locations within a region")]
    LocationsIn(NameArg),
    #[command(name = "where-is", about = "Documented locations for an item")]
    WhereIs(NameArg),
}

#[derive(Debug, Subcommand)]
enum ScrapeCommand {
    #[command(about = "Junk items and their scrap components")]
    Junk,
    #[command(about = "Regions and their locations")]
    Locations,
}

#[derive(Debug, Args)]
struct NameArg {
    name: String,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let context = ResolutionContext::from_process(cli.db.clone())?;
    let resolved = resolve_db(&context);
    if cli.diagnostics {
        println!("[diagnostics]");
        println!("{}", resolved.diagnostics());
    }

    match &cli.command {
        Commands::Init => run_init(&resolved),
        Commands::Scrape(ScrapeCommand::Junk) => run_scrape_junk(&resolved),
        Commands::Scrape(ScrapeCommand::Locations) => run_scrape_locations(&resolved),
        Commands::ComponentsOf(args) => run_components_of(&resolved, &args.name, cli.json),
        Commands::ItemsFor(args) => run_items_for(&resolved, &args.name, cli.json),
        Commands::RegionOf(args) => run_region_of(&resolved, &args.name, cli.json),
        Commands::LocationsIn(args) => run_locations_in(&resolved, &args.name, cli.json),
        Commands::WhereIs(args) => run_where_is(&resolved, &args.name, cli.json),
    }
}

fn open_store(resolved: &ResolvedDb) -> Result<Store> {
    Store::open(&resolved.path)
}

fn run_init(resolved: &ResolvedDb) -> Result<()> {
    println!("initializing db at {}", resolved.path.display());
    run_scrape_junk(resolved)?;
    run_scrape_locations(resolved)
}

fn run_scrape_junk(resolved: &ResolvedDb) -> Result<()> {
    let mut store = open_store(resolved)?;
    let client = PageClient::new()?;
    let html = client.fetch_html(JUNK_ITEMS_URL)?;
    let report = scrape_junk_items(&mut store, &html)?;
    println!("scraped junk items");
    println!("items: {}", report.items);
    println!("component_links: {}", report.component_links);
    Ok(())
}

fn run_scrape_locations(resolved: &ResolvedDb) -> Result<()> {
    let mut store = open_store(resolved)?;
    let client = PageClient::new()?;
    let html = client.fetch_html(LOCATIONS_URL)?;
    let report = scrape_regions_and_locations(&mut store, &html)?;
    println!("scraped regions and locations");
    println!("regions: {}", report.regions);
    println!("locations: {}", report.locations);
    Ok(())
}

fn run_components_of(resolved: &ResolvedDb, item: &str, json: bool) -> Result<()> {
    let store = open_store(resolved)?;
    let rows = lookup::components_of(store.connection(), item)?;
    if rows.is_empty() {
        bail!("no scraps found for: {item} (db: {})", resolved.path.display());
    }
    if json {
        return print_json(&rows);
    }
    println!("\"{item}\" scraps into:");
    let width = column_width(rows.iter().map(|row| row.component.as_str()));
    for row in &rows {
        println!("  {:<width$}  x{}", row.component, row.quantity);
    }
    Ok(())
}

fn run_items_for(resolved: &ResolvedDb, component: &str, json: bool) -> Result<()> {
    let store = open_store(resolved)?;
    let rows = lookup::items_for(store.connection(), component)?;
    if rows.is_empty() {
        bail!(
            "no items found for component: {component} (db: {})",
            resolved.path.display()
        );
    }
    if json {
        return print_json(&rows);
    }
    println!("items that yield \"{component}\":");
    let width = column_width(rows.iter().map(|row| row.item.as_str()));
    for row in &rows {
        println!("  {:<width$}  x{}", row.item, row.quantity);
    }
    Ok(())
}

fn run_region_of(resolved: &ResolvedDb, location: &str, json: bool) -> Result<()> {
    let store = open_store(resolved)?;
    let regions = lookup::region_of(store.connection(), location)?;
    if regions.is_empty() {
        bail!(
            "no region found for location: {location} (db: {})",
            resolved.path.display()
        );
    }
    if json {
        return print_json(&regions);
    }
    for region in &regions {
        println!("{region}");
    }
    Ok(())
}

fn run_locations_in(resolved: &ResolvedDb, region: &str, json: bool) -> Result<()> {
    let store = open_store(resolved)?;
    let locations = lookup::locations_in(store.connection(), region)?;
    if locations.is_empty() {
        bail!(
            "no locations found in region: {region} (db: {})",
            resolved.path.display()
        );
    }
    if json {
        return print_json(&locations);
    }
    for location in &locations {
        println!("{location}");
    }
    Ok(())
}

fn run_where_is(resolved: &ResolvedDb, item: &str, json: bool) -> Result<()> {
    let mut store = open_store(resolved)?;
    // First query for an item triggers the lazy detail-page scrape.
    let client = PageClient::new()?;
    let report = ensure_item_locations(&mut store, &client, item)?;
    if report.fetched {
        println!("fetched detail page, inserted {} rows", report.inserted);
    }

    let rows = lookup::mentions_of(store.connection(), item)?;
    if rows.is_empty() {
        bail!(
            "no locations documented for: {item} (db: {})",
            resolved.path.display()
        );
    }
    if json {
        return print_json(&rows);
    }
    println!("\"{item}\" can be found at:");
    let width = column_width(rows.iter().map(|row| row.location.as_str()));
    for row in &rows {
        let quantity = row
            .quantity
            .map(|quantity| quantity.to_string())
            .unwrap_or_else(|| "?".to_string());
        println!("  {:<width$}  {:>3}  {}", row.location, quantity, row.description);
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to serialize output")?
    );
    Ok(())
}

fn column_width<'a>(values: impl Iterator<Item = &'a str>) -> usize {
    values.map(str::len).max().unwrap_or(0)
}
