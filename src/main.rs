use sales_slice::aggregate::AggregationResult;
use sales_slice::bucket::Granularity;
use sales_slice::config::EngineConfig;
use sales_slice::dataset::Dataset;
use sales_slice::export::{cumulative_to_dataframe, dataframe_to_json, to_dataframe};
use sales_slice::filter::{DateRange, FilterSpec};
use sales_slice::loader::{load_csv, LoadPolicy};
use sales_slice::views::{self, TrendMode};
use sales_slice::{compare_states, EngineError};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args as ClapArgs, Parser, Subcommand};
use itertools::Itertools;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sales-slice")]
#[command(about = "Filter and aggregate a sales dataset the way the dashboard pages do")]
#[command(version)]
struct Args {
    /// Sales CSV file (or set SALES_DATA_PATH)
    #[arg(short, long, global = true)]
    data: Option<PathBuf>,

    /// What to do with invalid rows: skip or abort (or set SALES_LOAD_POLICY)
    #[arg(long, global = true)]
    policy: Option<LoadPolicy>,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Omitted filters default to the full domain found in the data.
#[derive(ClapArgs, Debug, Clone, Default)]
struct FilterArgs {
    /// First day to include (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Last day to include (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,

    /// Product category to include (repeatable)
    #[arg(long = "category")]
    categories: Vec<String>,

    /// Customer segment to include (repeatable)
    #[arg(long = "segment")]
    segments: Vec<String>,

    /// State code to include (repeatable)
    #[arg(long = "state")]
    states: Vec<String>,
}

impl FilterArgs {
    fn to_spec(&self, dataset: &Dataset) -> FilterSpec {
        let mut spec = FilterSpec::full(dataset.catalog());
        let range = spec.date_range;
        spec = spec.with_date_range(DateRange::new(
            self.from.unwrap_or(range.start),
            self.to.unwrap_or(range.end),
        ));
        if !self.categories.is_empty() {
            spec = spec.with_categories(self.categories.iter().cloned());
        }
        if !self.segments.is_empty() {
            spec = spec.with_segments(self.segments.iter().cloned());
        }
        if !self.states.is_empty() {
            spec = spec.with_states(self.states.iter().cloned());
        }
        spec
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List the categories, segments, states and date bounds in the data
    Catalog,
    /// Headline metrics and sales by date, category, state and segment
    Overview {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Top sub-categories and segments by total sales
    TopPerformers {
        #[command(flatten)]
        filter: FilterArgs,

        /// Number of entries (or set SALES_TOP_N)
        #[arg(short, long)]
        n: Option<usize>,
    },
    /// Largest single orders by total sales and by margin
    TopCustomers {
        #[command(flatten)]
        filter: FilterArgs,

        #[arg(short, long)]
        n: Option<usize>,
    },
    /// Sales over time per category
    Trend {
        #[command(flatten)]
        filter: FilterArgs,

        /// day, month or quarter
        #[arg(short, long, default_value = "day")]
        granularity: Granularity,

        /// periodic or cumulative
        #[arg(short, long, default_value = "periodic")]
        mode: TrendMode,
    },
    /// Compare two states side by side
    Compare {
        state_a: String,
        state_b: String,

        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Total sales per state
    StateMap {
        #[command(flatten)]
        filter: FilterArgs,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut config = EngineConfig::from_env().context("Invalid configuration")?;
    if let Some(path) = args.data.clone() {
        config.data_path = path;
    }
    if let Some(policy) = args.policy {
        config.load_policy = policy;
    }

    info!(path = %config.data_path.display(), policy = ?config.load_policy, "Loading sales data");
    let (dataset, report) = load_csv(&config.data_path, config.load_policy)
        .with_context(|| format!("Failed to load {}", config.data_path.display()))?;
    if report.rows_rejected() > 0 {
        info!(rejected = report.rows_rejected(), "Some rows were skipped");
    }

    let records = dataset.records();
    let outcome = match &args.command {
        Commands::Catalog => Ok(print_catalog(&dataset, args.json)),
        Commands::Overview { filter } => {
            let spec = filter.to_spec(&dataset);
            describe(&spec);
            views::overview(records, &spec).map(|view| -> Result<()> {
                if args.json {
                    return print_json(&view);
                }
                println!("Total Sales:   ${:.2}", view.headline.total_sales);
                println!("Total Margin:  ${:.2}", view.headline.total_margin);
                println!("Avg Margin %:  {:.2}%", view.headline.avg_margin_percent);
                print_table("Sales Over Time", &view.sales_over_time)?;
                print_table("Sales by Product Category", &view.sales_by_category)?;
                print_table("Sales by State", &view.sales_by_state)?;
                print_table("Sales by Customer Segment", &view.sales_by_segment)
            })
        }
        Commands::TopPerformers { filter, n } => {
            let spec = filter.to_spec(&dataset);
            describe(&spec);
            let n = n.unwrap_or(config.top_n);
            views::top_performers(records, &spec, n).map(|view| -> Result<()> {
                if args.json {
                    return print_json(&view);
                }
                print_table(&format!("Top {} Products by Total Sales", n), &view.top_products)?;
                print_table(&format!("Top {} Segments by Total Sales", n), &view.top_segments)
            })
        }
        Commands::TopCustomers { filter, n } => {
            let spec = filter.to_spec(&dataset);
            let n = n.unwrap_or(config.top_n);
            views::top_customers(records, &spec, n).map(|view| -> Result<()> {
                if args.json {
                    return print_json(&view);
                }
                println!("\n== Top {} Customers by Total Sales ==", n);
                for order in &view.by_sales {
                    println!("  {:<24} {:<10} ${:>12.2}", order.customer_name, order.order_id, order.total_sales);
                }
                println!("\n== Top {} Customers by Margin ==", n);
                for order in &view.by_margin {
                    println!("  {:<24} {:<10} ${:>12.2}", order.customer_name, order.order_id, order.margin);
                }
                Ok(())
            })
        }
        Commands::Trend { filter, granularity, mode } => {
            let spec = filter.to_spec(&dataset);
            describe(&spec);
            views::category_trend(records, &spec, *granularity, *mode).map(|view| -> Result<()> {
                if args.json {
                    return print_json(&view);
                }
                match &view.cumulative {
                    Some(table) => {
                        println!("\n== Cumulative Sales Over Time by Category ({}) ==", granularity);
                        println!("{}", cumulative_to_dataframe(table)?);
                        Ok(())
                    }
                    None => print_table(&format!("{} Sales Over Time by Category", granularity), &view.periodic),
                }
            })
        }
        Commands::Compare { state_a, state_b, filter } => {
            let spec = filter.to_spec(&dataset);
            describe(&spec);
            compare_states(records, &spec, state_a, state_b).map(|cmp| -> Result<()> {
                if args.json {
                    return print_json(&cmp);
                }
                for (state, snapshot) in [(&cmp.value_a, &cmp.a), (&cmp.value_b, &cmp.b)] {
                    println!("\n### {}", state);
                    println!("Total Sales:   ${:.2}", snapshot.headline.total_sales);
                    println!("Total Margin:  ${:.2}", snapshot.headline.total_margin);
                    println!("Avg Margin %:  {:.2}%", snapshot.headline.avg_margin_percent);
                    print_table(&format!("{}: Sales Over Time", state), &snapshot.sales_over_time)?;
                    print_table(&format!("{}: Sales by Product Category", state), &snapshot.sales_by_category)?;
                }
                Ok(())
            })
        }
        Commands::StateMap { filter } => {
            let spec = filter.to_spec(&dataset);
            describe(&spec);
            views::state_map(records, &spec).map(|result| -> Result<()> {
                if args.json {
                    return print_json(&dataframe_to_json(&to_dataframe(&result)?)?);
                }
                print_table("Total Sales by State", &result)
            })
        }
    };

    match outcome {
        Ok(printed) => printed,
        Err(EngineError::EmptyResult) => {
            println!("No data available for the selected filters.");
            Ok(())
        }
        Err(EngineError::EmptyComparison { .. }) => {
            println!("No data available for one or both of the selected states.");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn print_catalog(dataset: &Dataset, json: bool) -> Result<()> {
    let catalog = dataset.catalog();
    if json {
        return print_json(catalog);
    }
    let bound = |d: Option<NaiveDate>| d.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string());
    println!("Rows:           {}", dataset.len());
    println!("Dates:          {} to {}", bound(catalog.min_date), bound(catalog.max_date));
    println!("Categories:     {}", catalog.categories.iter().join(", "));
    println!("Sub-categories: {}", catalog.sub_categories.iter().join(", "));
    println!("Segments:       {}", catalog.segments.iter().join(", "));
    println!("States:         {}", catalog.states.iter().join(", "));
    Ok(())
}

fn describe(spec: &FilterSpec) {
    let list = |values: &std::collections::BTreeSet<String>| {
        if values.is_empty() {
            "None".to_string()
        } else {
            values.iter().join(", ")
        }
    };
    info!(
        from = %spec.date_range.start,
        to = %spec.date_range.end,
        categories = %list(&spec.categories),
        segments = %list(&spec.segments),
        states = %list(&spec.states),
        "Filter"
    );
}

fn print_table(title: &str, result: &AggregationResult) -> Result<()> {
    println!("\n== {} ==", title);
    println!("{}", to_dataframe(result)?);
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
