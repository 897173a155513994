use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, FixedOffset, Local, NaiveDate, Utc};
use clap::{ArgGroup, Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod config;
mod dataset;
mod dates;
mod metrics;
mod models;
mod report;
mod store;
mod views;

use config::Config;
use metrics::MetricsOptions;
use models::{ActivityPatch, ActivityRecord, Collaborator, Priority, Status};
use store::{ActivityFilter, ActivityStore, CategoryStore, InMemoryStore};

#[derive(Parser)]
#[command(name = "gii-dashboard")]
#[command(about = "Obligation and activity tracker for the fiscal department", long_about = None)]
struct Cli {
    /// JSON data file holding collaborators, categories and activities
    #[arg(long, global = true, env = "GII_DATA", default_value = "gii-data.json")]
    data: PathBuf,

    /// TOML config file (defaults to ./gii.toml when present)
    #[arg(long, global = true, env = "GII_CONFIG")]
    config: Option<PathBuf>,

    /// Evaluate as of this date instead of the current local date
    #[arg(long, global = true, value_name = "YYYY-MM-DD")]
    today: Option<NaiveDate>,

    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the demo dataset to the data file
    Seed {
        #[arg(long)]
        force: bool,
    },
    /// Import activities from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Print the KPI dashboard
    #[command(group(
        ArgGroup::new("scope")
            .args(["category", "all_categories"])
            .multiple(false)
    ))]
    Dashboard {
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        all_categories: bool,
        /// Emit the metrics as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write the dashboard as a markdown report
    #[command(group(
        ArgGroup::new("scope")
            .args(["category", "all_categories"])
            .multiple(false)
    ))]
    Report {
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        all_categories: bool,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Create an activity
    Add {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = metrics::OBLIGATIONS_CATEGORY)]
        category: String,
        #[arg(long)]
        subcategory: Option<String>,
        #[arg(long, default_value = "pending")]
        status: Status,
        #[arg(long)]
        priority: Option<Priority>,
        /// Collaborator id
        #[arg(long)]
        responsible: Option<String>,
        #[arg(long, value_name = "YYYY-MM-DD")]
        deadline: Option<NaiveDate>,
        #[arg(long, value_name = "YYYY-MM-DD")]
        legal_deadline: Option<NaiveDate>,
        #[arg(long, value_name = "YYYY-MM-DD")]
        reference: Option<NaiveDate>,
        #[arg(long)]
        description: Option<String>,
    },
    /// List open activities
    List {
        #[arg(long)]
        status: Option<Status>,
        /// Collaborator id
        #[arg(long)]
        responsible: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        search: Option<String>,
    },
    /// List completed activities, newest first
    History {
        #[arg(long)]
        responsible: Option<String>,
    },
    /// Show agenda items grouped by day
    Agenda,
    /// List forwarded requests by priority
    Forwarded {
        #[arg(long)]
        search: Option<String>,
    },
    /// Change fields of an existing activity
    Edit {
        #[arg(long)]
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        status: Option<Status>,
        #[arg(long)]
        priority: Option<Priority>,
        /// Collaborator id
        #[arg(long)]
        responsible: Option<String>,
        #[arg(long, value_name = "YYYY-MM-DD")]
        deadline: Option<NaiveDate>,
        #[arg(long, value_name = "YYYY-MM-DD")]
        legal_deadline: Option<NaiveDate>,
        #[arg(long, value_name = "YYYY-MM-DD")]
        reference: Option<NaiveDate>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Mark an activity as completed
    Complete {
        #[arg(long)]
        id: String,
        /// Completion date (defaults to now)
        #[arg(long, value_name = "YYYY-MM-DD")]
        on: Option<NaiveDate>,
    },
    /// Delete an activity
    Delete {
        #[arg(long)]
        id: String,
    },
    /// List collaborators
    Collaborators,
    /// Manage the category taxonomy
    Category {
        #[command(subcommand)]
        action: CategoryAction,
    },
}

#[derive(Subcommand)]
enum CategoryAction {
    List,
    Add {
        name: String,
    },
    AddSub {
        #[arg(long)]
        category: String,
        name: String,
    },
    RemoveSub {
        #[arg(long)]
        category: String,
        name: String,
    },
    Remove {
        #[arg(long)]
        category: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::resolve(cli.config.as_deref())?;
    let now = evaluation_instant(cli.today);
    let today = now.date_naive();
    debug!(%now, data = %cli.data.display(), "starting");

    match cli.command {
        Commands::Seed { force } => {
            if cli.data.exists() && !force {
                anyhow::bail!(
                    "{} already exists; pass --force to overwrite it",
                    cli.data.display()
                );
            }
            let store = InMemoryStore::from_snapshot(dataset::seed_snapshot());
            dataset::write_store(&cli.data, &store)?;
            println!("Seed data written to {}.", cli.data.display());
        }
        Commands::Import { csv } => {
            let mut store = dataset::load_store(&cli.data)?;
            let inserted = dataset::import_csv(&mut store, &csv)?;
            dataset::write_store(&cli.data, &store)?;
            println!("Inserted {inserted} activities from {}.", csv.display());
        }
        Commands::Dashboard {
            category,
            all_categories,
            json,
        } => {
            let store = dataset::load_store(&cli.data)?;
            let options = scope_options(&config, category, all_categories);
            let records = store.activities(&ActivityFilter::default());
            let metrics = metrics::aggregate(&records, &now, &options);

            if json {
                println!("{}", serde_json::to_string_pretty(&metrics)?);
            } else {
                print!(
                    "{}",
                    report::build_report(options.category.as_deref(), today, &metrics)
                );
            }
        }
        Commands::Report {
            category,
            all_categories,
            out,
        } => {
            let store = dataset::load_store(&cli.data)?;
            let options = scope_options(&config, category, all_categories);
            let records = store.activities(&ActivityFilter::default());
            let metrics = metrics::aggregate(&records, &now, &options);
            let report = report::build_report(options.category.as_deref(), today, &metrics);

            let out = out.unwrap_or_else(|| PathBuf::from(&config.report.output));
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            info!(path = %out.display(), total = metrics.total, "report written");
            println!("Report written to {}.", out.display());
        }
        Commands::Add {
            title,
            category,
            subcategory,
            status,
            priority,
            responsible,
            deadline,
            legal_deadline,
            reference,
            description,
        } => {
            let mut store = dataset::load_store(&cli.data)?;
            let mut activity = ActivityRecord::new(title, category, status);
            activity.subcategory = subcategory;
            activity.priority = priority;
            activity.description = description;
            activity.company_deadline = deadline;
            activity.legal_deadline = legal_deadline;
            activity.reference_date = reference;
            if let Some(id) = responsible {
                let collaborator = store
                    .collaborator(&id)
                    .with_context(|| format!("collaborator `{id}` not found"))?;
                activity.responsible = Some(collaborator.clone());
            }
            let saved = store.save_activity(activity)?;
            dataset::write_store(&cli.data, &store)?;
            println!("Activity {} created with id {}.", saved.title, saved.id);
        }
        Commands::List {
            status,
            responsible,
            category,
            search,
        } => {
            let store = dataset::load_store(&cli.data)?;
            let filter = ActivityFilter {
                status,
                responsible,
                category,
                search,
            };
            let records = store.activities(&ActivityFilter::default());
            let open = views::open_activities(&records, &filter);
            if open.is_empty() {
                println!("No open activities match these filters.");
            }
            for record in &open {
                print_activity(record, today);
            }
        }
        Commands::History { responsible } => {
            let store = dataset::load_store(&cli.data)?;
            let records = store.activities(&ActivityFilter::default());
            let done = views::history(&records, responsible.as_deref());
            if done.is_empty() {
                println!("No completed activities found.");
            }
            for record in &done {
                let completed = record
                    .completed_at
                    .map(|at| at.date_naive().to_string())
                    .unwrap_or_else(|| "unknown date".to_string());
                println!(
                    "- [{}] {} ({}, completed {})",
                    record.status,
                    record.title,
                    record.responsible_name(),
                    completed
                );
            }
        }
        Commands::Agenda => {
            let store = dataset::load_store(&cli.data)?;
            let records = store.activities(&ActivityFilter::default());
            let groups = views::agenda(&records, today);
            for (title, items) in [
                ("Today", &groups.today),
                ("Tomorrow", &groups.tomorrow),
                ("This week", &groups.this_week),
                ("Upcoming", &groups.upcoming),
                ("Past", &groups.past),
            ] {
                if items.is_empty() {
                    continue;
                }
                println!("{title}:");
                for item in items {
                    let start = item
                        .starts_at
                        .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_default();
                    println!("  - {} {} [{}] {}", start, item.title, item.status, item.responsible_name());
                }
            }
        }
        Commands::Forwarded { search } => {
            let store = dataset::load_store(&cli.data)?;
            let records = store.activities(&ActivityFilter::default());
            let requests = views::forwarded_requests(&records, search.as_deref());
            let summary = views::priority_summary(&requests);
            let totals: Vec<String> = summary
                .iter()
                .map(|(priority, count)| format!("{priority}: {count}"))
                .collect();
            println!("{} requests ({})", requests.len(), totals.join(", "));
            for request in &requests {
                let requester = request
                    .requester
                    .as_ref()
                    .map(Collaborator::display_name)
                    .unwrap_or("N/A");
                let priority = request.priority.map_or("-", |p| p.label());
                println!(
                    "- [{}] {} ({} -> {}) {}",
                    priority,
                    request.title,
                    requester,
                    request.responsible_name(),
                    request.status
                );
            }
        }
        Commands::Edit {
            id,
            title,
            status,
            priority,
            responsible,
            deadline,
            legal_deadline,
            reference,
            description,
        } => {
            let mut store = dataset::load_store(&cli.data)?;
            let mut activity = store
                .activity(&id)
                .with_context(|| format!("activity `{id}` not found"))?;
            let responsible = match responsible {
                Some(id) => Some(
                    store
                        .collaborator(&id)
                        .cloned()
                        .with_context(|| format!("collaborator `{id}` not found"))?,
                ),
                None => None,
            };
            let patch = ActivityPatch {
                title,
                description,
                status,
                priority,
                responsible,
                company_deadline: deadline,
                legal_deadline,
                reference_date: reference,
            };
            if patch.is_empty() {
                anyhow::bail!("nothing to change; pass at least one field");
            }
            patch.apply(&mut activity);
            let saved = store.save_activity(activity)?;
            dataset::write_store(&cli.data, &store)?;
            println!("Activity {} updated.", saved.id);
            print_activity(&saved, today);
        }
        Commands::Complete { id, on } => {
            let mut store = dataset::load_store(&cli.data)?;
            let mut activity = store
                .activity(&id)
                .with_context(|| format!("activity `{id}` not found"))?;
            let at = completion_instant(on, &now);
            activity.mark_completed(at);
            let saved = store.save_activity(activity)?;
            dataset::write_store(&cli.data, &store)?;
            println!("{} marked as {}.", saved.title, saved.status);
        }
        Commands::Delete { id } => {
            let mut store = dataset::load_store(&cli.data)?;
            if !store.delete_activity(&id) {
                anyhow::bail!("activity `{id}` not found");
            }
            dataset::write_store(&cli.data, &store)?;
            println!("Activity {id} deleted.");
        }
        Commands::Collaborators => {
            let store = dataset::load_store(&cli.data)?;
            for collaborator in store.collaborators() {
                println!(
                    "- {} {} <{}> {}",
                    collaborator.id, collaborator.name, collaborator.email, collaborator.department
                );
            }
        }
        Commands::Category { action } => {
            let mut store = dataset::load_store(&cli.data)?;
            run_category_action(&mut store, action)?;
            dataset::write_store(&cli.data, &store)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

/// The only place the system clock is read.
fn evaluation_instant(today: Option<NaiveDate>) -> DateTime<FixedOffset> {
    match today.and_then(|date| date.and_hms_opt(12, 0, 0)) {
        Some(noon) => noon.and_utc().fixed_offset(),
        None => Local::now().fixed_offset(),
    }
}

fn completion_instant(on: Option<NaiveDate>, now: &DateTime<FixedOffset>) -> DateTime<Utc> {
    on.and_then(|date| date.and_hms_opt(12, 0, 0))
        .map(|noon| noon.and_utc())
        .unwrap_or_else(|| now.with_timezone(&Utc))
}

fn scope_options(config: &Config, category: Option<String>, all_categories: bool) -> MetricsOptions {
    let mut options = config.metrics_options();
    if all_categories {
        options.category = None;
    } else if category.is_some() {
        options.category = category;
    }
    options
}

fn print_activity(record: &ActivityRecord, today: NaiveDate) {
    let due = record
        .company_deadline
        .map(|deadline| format!("due {} ({})", deadline, views::deadline_countdown(today, deadline)))
        .unwrap_or_else(|| "no deadline".to_string());
    println!(
        "- {} [{}] {} / {} - {} - {}",
        record.id,
        record.status,
        record.category,
        record.title,
        record.responsible_name(),
        due
    );
}

fn run_category_action(store: &mut InMemoryStore, action: CategoryAction) -> anyhow::Result<()> {
    match action {
        CategoryAction::List => {
            for category in store.categories() {
                println!(
                    "- {} {} ({})",
                    category.id,
                    category.name,
                    category.subcategories.join(", ")
                );
            }
        }
        CategoryAction::Add { name } => {
            let category = store.add_category(&name)?;
            println!("Category {} added with id {}.", category.name, category.id);
        }
        CategoryAction::AddSub { category, name } => {
            let updated = store.add_subcategory(&category, &name)?;
            println!("Subcategory {} added to {}.", name.trim(), updated.name);
        }
        CategoryAction::RemoveSub { category, name } => {
            let updated = store.remove_subcategory(&category, &name)?;
            println!("Subcategory {} removed from {}.", name, updated.name);
        }
        CategoryAction::Remove { category } => {
            let removed = store.delete_category(&category)?;
            println!("Category {} removed.", removed.name);
        }
    }
    Ok(())
}
