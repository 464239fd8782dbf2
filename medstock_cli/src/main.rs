use chrono::{DateTime, Local, TimeZone, Utc};
use clap::{Parser, Subcommand};
use medstock_core::config::DisplayZone;
use medstock_core::*;
use std::fmt::Display;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "medstock")]
#[command(about = "Medicine stock tracker with depletion forecasts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Evaluate as if the current time were this RFC 3339 instant
    #[arg(long, global = true, value_parser = parse_instant)]
    at: Option<DateTime<Utc>>,

    /// Evaluate schedules and print dates in UTC
    #[arg(long, global = true)]
    utc: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show projected stock for every medicine (default)
    List,

    /// Start tracking a medicine
    Add {
        #[arg(long)]
        name: String,

        /// Initial stock quantity
        #[arg(long)]
        stock: u32,

        /// Daily dose as HH:MM=AMOUNT (repeatable)
        #[arg(long = "dose", value_parser = parse_dosage, required = true)]
        doses: Vec<Dosage>,

        /// Low stock threshold for this medicine
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Change a tracked medicine
    Edit {
        /// Medicine id or unique id prefix
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        stock: Option<u32>,

        /// Replace the schedule with these doses (HH:MM=AMOUNT, repeatable)
        #[arg(long = "dose", value_parser = parse_dosage)]
        doses: Vec<Dosage>,

        #[arg(long, conflicts_with = "clear_threshold")]
        threshold: Option<f64>,

        /// Fall back to the configured default threshold
        #[arg(long)]
        clear_threshold: bool,
    },

    /// Stop tracking a medicine
    Delete {
        /// Medicine id or unique id prefix
        id: String,
    },

    /// Alert about medicines that newly fell below their threshold
    Check {
        /// Run even if the check interval has not elapsed
        #[arg(long)]
        force: bool,
    },

    /// Export projected stock to CSV
    Export {
        path: PathBuf,
    },
}

struct Context {
    data_dir: PathBuf,
    config: Config,
    now: DateTime<Utc>,
}

fn main() -> Result<()> {
    medstock_core::logging::init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| config.data.data_dir.clone());
    let zone = if cli.utc {
        DisplayZone::Utc
    } else {
        config.display.timezone
    };

    let ctx = Context {
        data_dir,
        config,
        now: cli.at.unwrap_or_else(Utc::now),
    };

    tracing::debug!("Evaluating at {} ({:?} time)", ctx.now, zone);

    let command = cli.command.unwrap_or(Commands::List);
    match zone {
        DisplayZone::Local => run(&ctx, command, &Local),
        DisplayZone::Utc => run(&ctx, command, &Utc),
    }
}

fn run<Tz>(ctx: &Context, command: Commands, tz: &Tz) -> Result<()>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let now = ctx.now.with_timezone(tz);
    let mut repo = JsonFileRepository::in_data_dir(&ctx.data_dir);

    match command {
        Commands::List => cmd_list(&repo, ctx, &now),
        Commands::Add {
            name,
            stock,
            doses,
            threshold,
        } => {
            let draft = MedicineDraft {
                name,
                stock,
                dosages: doses,
                low_stock_threshold: threshold,
            };
            cmd_add(&mut repo, draft, &now)
        }
        Commands::Edit {
            id,
            name,
            stock,
            doses,
            threshold,
            clear_threshold,
        } => {
            let medicine = repo.resolve(&id)?;
            let mut draft = medicine.to_draft();
            if let Some(name) = name {
                draft.name = name;
            }
            if let Some(stock) = stock {
                draft.stock = stock;
            }
            if !doses.is_empty() {
                draft.dosages = doses;
            }
            if threshold.is_some() || clear_threshold {
                draft.low_stock_threshold = threshold;
            }

            let updated = repo.update(medicine.id, draft)?;
            println!("✓ Updated {}", updated.name);
            Ok(())
        }
        Commands::Delete { id } => {
            let medicine = repo.resolve(&id)?;
            let removed = repo.delete(medicine.id)?;
            println!("✓ Deleted {}", removed.name);
            Ok(())
        }
        Commands::Check { force } => cmd_check(&repo, ctx, &now, force),
        Commands::Export { path } => {
            let processed = project_all(&repo.list()?, &now);
            let count = export::write_projection_csv(
                &path,
                &processed,
                ctx.config.alerts.low_stock_threshold,
            )?;
            println!("✓ Exported {} medicines to {}", count, path.display());
            Ok(())
        }
    }
}

fn cmd_list<Tz>(repo: &JsonFileRepository, ctx: &Context, now: &DateTime<Tz>) -> Result<()>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let medicines = repo.list()?;
    if medicines.is_empty() {
        println!("No medicines tracked yet. Add one with `medstock add`.");
        return Ok(());
    }

    for processed in project_all(&medicines, now) {
        display_medicine(&processed, now, ctx.config.alerts.low_stock_threshold);
    }
    Ok(())
}

fn cmd_add<Tz>(repo: &mut JsonFileRepository, draft: MedicineDraft, now: &DateTime<Tz>) -> Result<()>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let medicine = repo.add(draft, now.with_timezone(&Utc))?;
    let projection = project(&medicine, now);

    println!("✓ Added {} ({})", medicine.name, short_id(&medicine));
    println!(
        "  Predicted end: {}",
        format_end_date(projection.end_date.as_ref(), now)
    );
    Ok(())
}

fn cmd_check<Tz>(
    repo: &JsonFileRepository,
    ctx: &Context,
    now: &DateTime<Tz>,
    force: bool,
) -> Result<()>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let alerts = &ctx.config.alerts;
    if !alerts.enabled {
        println!("Low-stock alerts are disabled in config.");
        return Ok(());
    }

    let state_path = ctx.data_dir.join("alerts.json");
    let processed = project_all(&repo.list()?, now);

    let report = AlertState::update(&state_path, |state| {
        if !force && !state.is_check_due(ctx.now, alerts.check_interval()) {
            return Ok(None);
        }
        let mut notifier = StdoutNotifier;
        run_low_stock_check(
            state,
            &processed,
            alerts.low_stock_threshold,
            ctx.now,
            &mut notifier,
        )
        .map(Some)
    })?;

    match report {
        None => println!(
            "Alert check not due yet (runs every {} min).",
            alerts.check_interval_minutes
        ),
        Some(report) if report.newly_low.is_empty() => {
            println!("✓ No new low-stock medicines")
        }
        Some(_) => {}
    }
    Ok(())
}

/// Prints alerts to the terminal
struct StdoutNotifier;

impl Notifier for StdoutNotifier {
    fn notify(&mut self, title: &str, body: &str) -> Result<()> {
        println!("🔔 {}: {}", title, body);
        Ok(())
    }
}

fn display_medicine<Tz>(processed: &ProcessedMedicine, now: &DateTime<Tz>, default_threshold: f64)
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let medicine = &processed.medicine;
    let added = medicine.created_at.with_timezone(&now.timezone());

    println!("\n╭─────────────────────────────────────────╮");
    println!("│  {}", medicine.name);
    println!("╰─────────────────────────────────────────╯");
    println!("  Id:             {}", short_id(medicine));
    println!("  Added on:       {}", added.format("%Y-%m-%d"));
    println!(
        "  Current stock:  {} / {} ({:.0}%)",
        processed.whole_units(),
        medicine.stock,
        processed.stock_percentage()
    );
    if processed.is_low_stock(default_threshold) {
        println!("  ⚠ Low stock warning");
    }
    println!("  Predicted end:  {}", processed.end_date_label(now));

    let schedule: Vec<String> = medicine.dosages.iter().map(|d| d.to_string()).collect();
    println!("  Schedule:       {}", schedule.join(", "));
}

fn short_id(medicine: &Medicine) -> String {
    medicine.id.to_string()[..8].to_string()
}

fn parse_instant(s: &str) -> std::result::Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp: {}", e))
}

fn parse_dosage(s: &str) -> std::result::Result<Dosage, String> {
    s.parse::<Dosage>().map_err(|e| e.to_string())
}
