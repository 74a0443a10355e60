//! CLI interface for flypoints

use clap::{Parser, Subcommand};
use flypoints::{output, Airline, FlightScraper, ScrapeOutcome, ScraperConfig, SearchQuery};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flypoints")]
#[command(about = "Flight schedules, fares and loyalty points from airline booking sites")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search one-way flights on an airline's booking site
    Search {
        /// Airline to search (spicejet, indigo, etihad)
        #[arg(short, long)]
        airline: String,
        /// Origin city name or airport code
        #[arg(short, long)]
        from: String,
        /// Destination city name or airport code
        #[arg(short, long)]
        to: String,
        /// Departure date (YYYY-MM-DD or DD-MM-YYYY)
        #[arg(short, long)]
        date: String,
        /// Print results as JSON instead of a table
        #[arg(long)]
        json: bool,
        /// Output file for JSON results
        #[arg(short, long)]
        output: Option<String>,
        /// Run the browser with a visible window
        #[arg(long)]
        headed: bool,
        /// Directory for raw payload / page-source debug dumps
        #[arg(long)]
        debug_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Search { airline, from, to, date, json, output, headed, debug_dir } => {
            let airline: Airline = airline.parse()?;
            let query = SearchQuery::parse(&from, &to, &date)?;

            let config = ScraperConfig {
                headless: !headed,
                debug_dir,
                ..ScraperConfig::default()
            };

            println!(
                "Searching {} flights: {} -> {} on {}",
                airline.profile().display_name,
                query.origin,
                query.destination,
                query.date
            );

            let scraper = FlightScraper::new(airline, config);
            let outcome = scraper.scrape(query).await?;

            if json || output.is_some() {
                let rendered = serde_json::to_string_pretty(&outcome)?;
                if let Some(output_file) = output {
                    fs::write(&output_file, &rendered)?;
                    println!("Results saved to {}", output_file);
                } else {
                    println!("{}", rendered);
                }
            } else {
                print_outcome(airline, &outcome);
            }

            if !outcome.success {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn print_outcome(airline: Airline, outcome: &ScrapeOutcome) {
    if !outcome.success {
        eprintln!(
            "Search failed: {}",
            outcome.error.as_deref().unwrap_or("unknown error")
        );
        return;
    }

    println!();
    println!("{}", output::render_table(airline.profile(), &outcome.flights));

    if outcome.flights.is_empty() {
        if let Some(reason) = &outcome.error {
            println!("Reason: {}", reason);
        }
        println!("This can mean no availability, a site redesign, or a blocked request.");
    }
}
