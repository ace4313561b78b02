use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use colored::*;
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};

use leanrs::composition::APPROXIMATION_NOTICE;
use leanrs::config::AppConfig;
use leanrs::dashboard;
use leanrs::error::LeanRsError;
use leanrs::export::{self, ExportFormat};
use leanrs::logging::init_logging;
use leanrs::models::{AppState, PhasePlan, ProfileSettings, TrendWindow, UserProfile};
use leanrs::phases::{self, PhaseEvent};
use leanrs::schedule;
use leanrs::storage::{JsonStore, TrackerData};
use leanrs::tracker::{self, NewWeighIn};
use leanrs::trend;

/// leanrs - Weekly Weight-Loss Tracker
///
/// Records one weigh-in per week and turns it into trend, plateau, projection and
/// phase-progress feedback for a three-phase fat-loss program.
#[derive(Parser)]
#[command(name = "leanrs")]
#[command(version = "0.1.0")]
#[command(about = "Weekly weight-loss tracker", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Overrides the data directory from the config
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Profile assumption flags shared by `init` and `settings`
#[derive(clap::Args, Debug)]
struct ProfileArgs {
    /// Age in years
    #[arg(long)]
    age: Option<u16>,

    /// Height in centimeters
    #[arg(long)]
    height: Option<Decimal>,

    /// Starting weight in kilograms
    #[arg(long)]
    start_weight: Option<Decimal>,

    /// Starting body fat percentage
    #[arg(long)]
    start_bf: Option<Decimal>,

    /// Goal body fat percentage
    #[arg(long)]
    goal_bf: Option<Decimal>,

    /// Lean mass in kilograms
    #[arg(long)]
    lean_mass: Option<Decimal>,
}

impl From<&ProfileArgs> for ProfileSettings {
    fn from(args: &ProfileArgs) -> Self {
        ProfileSettings {
            age: args.age,
            height_cm: args.height,
            starting_weight_kg: args.start_weight,
            starting_body_fat_pct: args.start_bf,
            goal_body_fat_pct: args.goal_bf,
            lean_mass_kg: args.lean_mass,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Set up the tracker with your starting profile
    Init {
        #[command(flatten)]
        profile: ProfileArgs,

        /// Overwrite existing tracker data
        #[arg(long)]
        force: bool,
    },

    /// Record this week's weigh-in
    WeighIn {
        /// Weight in kilograms
        #[arg(short, long)]
        weight: String,

        /// Free-text note
        #[arg(short, long)]
        note: Option<String>,

        /// Date of the weigh-in (YYYY-MM-DD, default: today)
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// Progress photo path
        #[arg(long)]
        photo: Option<String>,

        /// Allow a weigh-in on a day other than Sunday
        #[arg(long)]
        any_day: bool,
    },

    /// Correct the weight of a recorded weigh-in
    Amend {
        /// Weigh-in ID (see `history --ids`)
        #[arg(long)]
        id: String,

        /// Corrected weight in kilograms
        #[arg(short, long)]
        weight: String,
    },

    /// Show the dashboard
    Status,

    /// List recorded weigh-ins
    History {
        /// Number of most recent entries to show
        #[arg(short, long, default_value = "12")]
        limit: usize,

        /// Include weigh-in IDs
        #[arg(long)]
        ids: bool,
    },

    /// Show the phase plan
    Phases,

    /// Edit profile assumptions and preferences
    Settings {
        #[command(flatten)]
        profile: ProfileArgs,

        /// Trend view window in weeks (4, 6, 8 or 12)
        #[arg(long)]
        trend_weeks: Option<TrendWindow>,

        /// Enable or disable Sunday photo reminders
        #[arg(long)]
        photo_reminders: Option<bool>,
    },

    /// Export tracker data
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Export format (csv, json; default: from the file extension)
        #[arg(short = 'f', long)]
        format: Option<String>,
    },

    /// Delete all tracker data and start over
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },

    /// Configure application settings
    Config {
        /// List all configuration options
        #[arg(short, long)]
        list: bool,

        /// Set a configuration value (KEY=VALUE)
        #[arg(short, long)]
        set: Option<String>,

        /// Get a configuration value
        #[arg(short, long)]
        get: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        match e.downcast_ref::<LeanRsError>() {
            Some(err) => {
                tracing::debug!(error = %err, severity = ?err.severity(), "Command failed");
                eprintln!("{} {}", "✗".red().bold(), err.user_message().red());
            }
            None => eprintln!("{} {:#}", "✗".red().bold(), e),
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(AppConfig::default_config_path);
    let mut config = AppConfig::load_or_default(&config_path);
    if let Some(data_dir) = &cli.data_dir {
        config.settings.data_dir = data_dir.clone();
    }

    init_logging(&config.log_config(cli.verbose))?;

    let store = JsonStore::new(&config.settings.data_dir);
    tracing::debug!(data_dir = %store.root().display(), config = %config_path.display(), "Starting");

    match cli.command {
        Commands::Init { profile, force } => init(&store, &config, &profile, force),
        Commands::WeighIn {
            weight,
            note,
            date,
            photo,
            any_day,
        } => weigh_in(&store, &config, &weight, note, date, photo, any_day),
        Commands::Amend { id, weight } => amend(&store, &id, &weight),
        Commands::Status => status(&store, &config),
        Commands::History { limit, ids } => history(&store, limit, ids),
        Commands::Phases => show_phases(&store),
        Commands::Settings {
            profile,
            trend_weeks,
            photo_reminders,
        } => settings(&store, &profile, trend_weeks, photo_reminders),
        Commands::Export { output, format } => export_data(&store, output, format),
        Commands::Reset { yes } => reset(&store, yes),
        Commands::Config { list, set, get } => manage_config(&mut config, &config_path, list, set, get),
    }
}

fn load(store: &JsonStore) -> Result<TrackerData> {
    Ok(store.load().map_err(LeanRsError::from)?)
}

fn save(store: &JsonStore, data: &TrackerData) -> Result<()> {
    store.save(data).map_err(LeanRsError::from)?;
    Ok(())
}

fn init(store: &JsonStore, config: &AppConfig, args: &ProfileArgs, force: bool) -> Result<()> {
    if store.load().is_ok() && !force {
        anyhow::bail!(
            "Tracker already initialized in {} (use --force to start over)",
            store.root().display()
        );
    }

    let edits = ProfileSettings::from(args);
    edits.validate()?;

    let now = Utc::now();
    let profile = UserProfile::default_at(now).apply_settings(&edits, now);
    let state = AppState {
        trend_view_weeks: config.tracking.default_trend_window,
        ..tracker::complete_onboarding(&AppState::default_at(&profile, now))
    };
    let data = TrackerData {
        profile,
        phases: PhasePlan::default(),
        weigh_ins: Vec::new(),
        state,
    };
    save(store, &data)?;

    println!("{}", "✓ Tracker initialized".green().bold());
    println!(
        "  Starting weight: {} kg, age {}, height {} cm",
        data.profile.starting_weight_kg, data.profile.age, data.profile.height_cm
    );
    println!(
        "  First weigh-in: {}",
        data.state.next_weigh_in_date.format("%A, %B %-d")
    );
    Ok(())
}

fn weigh_in(
    store: &JsonStore,
    config: &AppConfig,
    weight: &str,
    note: Option<String>,
    date: Option<NaiveDate>,
    photo: Option<String>,
    any_day: bool,
) -> Result<()> {
    let now = Utc::now();
    let data = load(store)?;
    let weight_kg = tracker::parse_weight(weight)?;
    let date = date.map(schedule::start_of_day).unwrap_or(now);

    if config.tracking.enforce_sunday && !any_day && !schedule::is_sunday(date) {
        anyhow::bail!(
            "Weigh-ins happen on Sundays. Next weigh-in: {} (use --any-day to override)",
            data.state.next_weigh_in_date.format("%A, %B %-d")
        );
    }

    let mut new_weigh_in = NewWeighIn::new(weight_kg, date).with_notes(note.unwrap_or_default());
    if let Some(photo) = photo {
        new_weigh_in = new_weigh_in.with_photo(photo);
    }
    new_weigh_in.validate(&data.weigh_ins)?;

    let outcome = tracker::record_weigh_in(
        &data.profile,
        &data.phases,
        &data.weigh_ins,
        &data.state,
        new_weigh_in,
        now,
    );

    save(
        store,
        &TrackerData {
            profile: data.profile,
            phases: outcome.phases.clone(),
            weigh_ins: outcome.history.clone(),
            state: outcome.state.clone(),
        },
    )?;

    let entry = &outcome.weigh_in;
    println!("{}", "✓ Weigh-in saved".green().bold());
    println!(
        "  {} kg ({} kg this week, 4-week average {} kg)",
        entry.weight_kg,
        signed(entry.weekly_delta_kg),
        entry.four_week_avg_kg.round_dp(1)
    );
    println!(
        "  Estimated body fat: {}% ({} kg fat)",
        entry.estimated_bf_pct.round_dp(1),
        entry.estimated_fat_mass_kg.round_dp(1)
    );
    if outcome.new_low {
        println!("  {}", "New lowest weight!".cyan().bold());
    }
    println!();
    println!("{}", outcome.insight.to_string().italic());

    match outcome.phase_event {
        PhaseEvent::PhaseCompleted { completed, unlocked } => {
            println!();
            println!(
                "{}",
                format!("🎉 Phase {} complete! Phase {} unlocked.", completed, unlocked)
                    .yellow()
                    .bold()
            );
        }
        PhaseEvent::ProgramCompleted => {
            println!();
            println!("{}", "🏆 Program complete! All three phases done.".yellow().bold());
        }
        PhaseEvent::None => {}
    }

    if outcome.state.plateau_mode {
        println!();
        println!(
            "{}",
            "Plateau detected: weight has held steady for several weeks.".yellow()
        );
    }

    Ok(())
}

fn amend(store: &JsonStore, id: &str, weight: &str) -> Result<()> {
    let now = Utc::now();
    let data = load(store)?;
    let weight_kg = tracker::parse_weight(weight)?;

    let rebuilt = tracker::amend_and_replay(
        &data.profile,
        &data.phases,
        &data.weigh_ins,
        &data.state,
        id,
        weight_kg,
        now,
    )?;

    save(
        store,
        &TrackerData {
            profile: data.profile,
            phases: rebuilt.phases,
            weigh_ins: rebuilt.history,
            state: rebuilt.state,
        },
    )?;

    println!("{}", format!("✓ Weigh-in {} updated to {} kg", id, weight_kg).green());
    Ok(())
}

fn status(store: &JsonStore, config: &AppConfig) -> Result<()> {
    let now = Utc::now();
    let data = load(store)?;
    let summary = dashboard::summarize(&data.profile, &data.phases, &data.weigh_ins, &data.state, now);

    println!(
        "{}",
        format!(
            "Phase {}: {} (week {})",
            summary.current_phase, summary.phase_name, summary.week_in_phase
        )
        .bold()
    );
    println!(
        "  Current weight:  {} kg ({} kg this week)",
        summary.current_weight_kg,
        signed(summary.weekly_change_kg)
    );
    println!(
        "  Phase target:    {} kg ({} kg to go, {}% done)",
        summary.phase_target_kg,
        summary.remaining_kg.round_dp(1),
        summary.progress_pct.round_dp(0)
    );
    println!("  Expected now:    {} kg", summary.expected_weight_kg.round_dp(1));
    println!("  Total lost:      {} kg", summary.total_lost_kg.round_dp(1));
    println!(
        "  Body fat:        ~{}% ({} kg fat, {} kg lean)",
        summary.composition.body_fat_pct.round_dp(1),
        summary.composition.fat_mass_kg.round_dp(1),
        summary.composition.lean_mass_kg.round_dp(1)
    );
    println!("                   {}", APPROXIMATION_NOTICE.dimmed());

    let analysis = &summary.trend;
    println!(
        "  {}-week trend:    {} ({} kg/week over {} entries)",
        analysis.window_weeks,
        analysis.direction.description(),
        analysis.slope_kg_per_week.round_dp(2),
        analysis.entries_in_window
    );

    if summary.program_complete {
        println!("  {}", "Program complete!".green().bold());
    } else {
        println!(
            "  Projected finish: {} ({}-{} weeks)",
            summary.projection.date_range_label(),
            summary.projection.weeks_min,
            summary.projection.weeks_max
        );
    }

    if summary.plateau_mode {
        println!("  {}", "Plateau mode: progress has stalled. Stay consistent.".yellow());
    } else if trend::detect_plateau(&data.weigh_ins, config.tracking.plateau_threshold_weeks) {
        println!(
            "  {}",
            format!(
                "Weight has been flat for the last {} weigh-ins.",
                config.tracking.plateau_threshold_weeks
            )
            .yellow()
        );
    }

    let next = if summary.days_until_next_weigh_in == 0 {
        "today".green().bold().to_string()
    } else {
        format!(
            "{} (in {} days)",
            summary.next_weigh_in_date.format("%A, %B %-d"),
            summary.days_until_next_weigh_in
        )
    };
    println!("  Next weigh-in:   {}", next);

    if data.state.photo_reminders_enabled && schedule::is_sunday(now) {
        println!("  {}", "Sunday reminder: take a progress photo.".cyan());
    }

    Ok(())
}

#[derive(Tabled)]
struct HistoryRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Phase")]
    phase: u8,
    #[tabled(rename = "Weight")]
    weight: String,
    #[tabled(rename = "Change")]
    change: String,
    #[tabled(rename = "4-wk Avg")]
    average: String,
    #[tabled(rename = "Expected")]
    expected: String,
    #[tabled(rename = "Est. BF %")]
    body_fat: String,
    #[tabled(rename = "Notes")]
    notes: String,
}

fn history(store: &JsonStore, limit: usize, ids: bool) -> Result<()> {
    let data = load(store)?;
    if data.weigh_ins.is_empty() {
        println!("No weigh-ins recorded yet.");
        return Ok(());
    }

    let points = dashboard::trajectory(&data.profile, &data.phases, &data.weigh_ins, &data.state);
    let skip = data.weigh_ins.len().saturating_sub(limit);

    let rows: Vec<HistoryRow> = data
        .weigh_ins
        .iter()
        .zip(points.iter())
        .skip(skip)
        .map(|(entry, point)| HistoryRow {
            date: entry.date.format("%Y-%m-%d").to_string(),
            phase: entry.phase_id.number(),
            weight: if entry.is_edited {
                format!("{}*", entry.weight_kg)
            } else {
                entry.weight_kg.to_string()
            },
            change: signed(entry.weekly_delta_kg),
            average: entry.four_week_avg_kg.round_dp(1).to_string(),
            expected: point.expected_kg.round_dp(1).to_string(),
            body_fat: entry.estimated_bf_pct.round_dp(1).to_string(),
            notes: entry.notes.clone(),
        })
        .collect();

    println!("{}", Table::new(rows).with(Style::rounded()).to_string());

    if data.weigh_ins.iter().any(|w| w.is_edited) {
        println!("{}", "* amended after recording".dimmed());
    }
    if ids {
        for entry in data.weigh_ins.iter().skip(skip) {
            println!("  {}  {}", entry.date.format("%Y-%m-%d"), entry.id.dimmed());
        }
    }
    Ok(())
}

#[derive(Tabled)]
struct PhaseRow {
    #[tabled(rename = "Phase")]
    id: u8,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Body Fat")]
    body_fat: String,
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Weekly Loss")]
    pace: String,
    #[tabled(rename = "Duration")]
    duration: String,
    #[tabled(rename = "Status")]
    status: String,
}

fn show_phases(store: &JsonStore) -> Result<()> {
    let data = load(store)?;

    let rows: Vec<PhaseRow> = data
        .phases
        .iter()
        .map(|phase| PhaseRow {
            id: phase.id.number(),
            name: phase.name.clone(),
            body_fat: format!("{}% → {}%", phase.start_bf_pct, phase.end_bf_pct),
            target: format!("{} kg", phase.target_weight_kg),
            pace: format!("{}-{} kg", phase.weekly_loss_min_kg, phase.weekly_loss_max_kg),
            duration: format!(
                "{}-{} weeks",
                phase.estimated_duration_weeks_min, phase.estimated_duration_weeks_max
            ),
            status: match phase.completed_at {
                Some(at) => format!("completed {}", at.format("%Y-%m-%d")),
                None => phases::status_label(phase, data.state.current_phase).to_string(),
            },
        })
        .collect();

    println!("{}", Table::new(rows).with(Style::rounded()).to_string());
    Ok(())
}

fn settings(
    store: &JsonStore,
    args: &ProfileArgs,
    trend_weeks: Option<TrendWindow>,
    photo_reminders: Option<bool>,
) -> Result<()> {
    let now = Utc::now();
    let data = load(store)?;
    let edits = ProfileSettings::from(args);
    edits.validate()?;

    let mut state = AppState {
        trend_view_weeks: trend_weeks.unwrap_or(data.state.trend_view_weeks),
        photo_reminders_enabled: photo_reminders.unwrap_or(data.state.photo_reminders_enabled),
        ..data.state.clone()
    };

    let (profile, phases, weigh_ins) = if edits.is_empty() {
        (data.profile, data.phases, data.weigh_ins)
    } else {
        // Composition estimates and phase 1's start depend on the profile
        let profile = data.profile.apply_settings(&edits, now);
        let rebuilt = tracker::replay(&profile, &data.phases, &data.weigh_ins, &state);
        state = rebuilt.state;
        (profile, rebuilt.phases, rebuilt.history)
    };

    let profile_summary = format!(
        "age {}, height {} cm, start {} kg, body fat {}% → {}%, lean mass {} kg",
        profile.age,
        profile.height_cm,
        profile.starting_weight_kg,
        profile.starting_body_fat_pct,
        profile.goal_body_fat_pct,
        profile.lean_mass_kg
    );
    let trend_window = state.trend_view_weeks.weeks();

    save(
        store,
        &TrackerData {
            profile,
            phases,
            weigh_ins,
            state,
        },
    )?;

    println!("{}", "✓ Settings saved".green());
    println!("  Profile: {}", profile_summary);
    println!("  Trend view: {} weeks", trend_window);
    Ok(())
}

fn export_data(store: &JsonStore, output: PathBuf, format: Option<String>) -> Result<()> {
    let data = load(store)?;
    let format = match format {
        Some(name) => ExportFormat::from_str(&name).map_err(LeanRsError::from)?,
        None => ExportFormat::from_path(&output).unwrap_or(ExportFormat::Csv),
    };

    export::export(&data, format, &output, Utc::now()).map_err(LeanRsError::from)?;

    println!(
        "{}",
        format!(
            "✓ Exported {} weigh-ins to {}",
            data.weigh_ins.len(),
            output.display()
        )
        .green()
    );
    Ok(())
}

fn reset(store: &JsonStore, yes: bool) -> Result<()> {
    if !yes {
        println!(
            "{}",
            "This deletes every weigh-in and your profile. Re-run with --yes to confirm.".yellow()
        );
        return Ok(());
    }

    store.clear().map_err(LeanRsError::from)?;
    println!("{}", "✓ Tracker data deleted. Run `leanrs init` to start over.".green());
    Ok(())
}

fn manage_config(
    config: &mut AppConfig,
    config_path: &Path,
    list: bool,
    set: Option<String>,
    get: Option<String>,
) -> Result<()> {
    if let Some(key_value) = set {
        let (key, value) = key_value
            .split_once('=')
            .with_context(|| format!("Expected KEY=VALUE, got '{}'", key_value))?;
        config.set_value(key.trim(), value)?;
        config.save_to_file(config_path)?;
        println!("{}", format!("✓ {} = {}", key.trim(), value.trim()).green());
    } else if let Some(key) = get {
        let value = config
            .get_value(&key)
            .with_context(|| format!("Unknown configuration key: {}", key))?;
        println!("{}", value);
    } else if list {
        println!("{}", format!("Configuration ({})", config_path.display()).bold());
        for (key, value) in config.entries() {
            println!("  {} = {}", key.cyan(), value);
        }
    } else {
        println!("Use --list, --get KEY or --set KEY=VALUE");
    }
    Ok(())
}

fn signed(value: Decimal) -> String {
    let rounded = value.round_dp(1);
    if rounded > Decimal::ZERO {
        format!("+{}", rounded)
    } else {
        rounded.to_string()
    }
}
