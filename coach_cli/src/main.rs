use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use coach_core::history::{self, build_recomp_input};
use coach_core::wal::{self, latest_snapshot};
use coach_core::*;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "coach")]
#[command(about = "Adaptive nutrition targets and recomposition tracking", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log engine details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or update the stored profile
    Profile {
        #[command(flatten)]
        args: ProfileArgs,
    },

    /// Log a bodyweight sample (kg)
    Weigh {
        weight_kg: f64,

        /// Date of the sample (YYYY-MM-DD, default today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Log a girth measurement (cm)
    Measure {
        /// waist, arm or chest
        site: MeasurementSite,

        value_cm: f64,

        /// Date of the measurement (YYYY-MM-DD, default today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Compute today's adaptive calorie and macro targets
    Targets {
        /// Show targets without logging a snapshot
        #[arg(long)]
        dry_run: bool,

        /// Print JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Recomposition check-in with calorie-cycled targets for a day
    Recomp {
        /// Day to plan for (YYYY-MM-DD, default today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Override the schedule's day classification
        #[arg(long)]
        day_type: Option<DayType>,

        /// Print JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Roll up logged snapshots to CSV
    Rollup {
        /// Clean up processed logs after rollup
        #[arg(long)]
        cleanup: bool,
    },
}

#[derive(clap::Args)]
struct ProfileArgs {
    #[arg(long)]
    height_cm: Option<f64>,

    #[arg(long)]
    age: Option<u32>,

    #[arg(long)]
    sex: Option<SexArg>,

    #[arg(long)]
    activity: Option<ActivityArg>,

    #[arg(long)]
    goal: Option<GoalArg>,

    /// Target change in kg/week (negative to lose)
    #[arg(long, allow_hyphen_values = true)]
    rate: Option<f64>,

    /// Training load score, 0-100
    #[arg(long)]
    training_load: Option<f64>,
}

impl ProfileArgs {
    fn is_empty(&self) -> bool {
        self.height_cm.is_none()
            && self.age.is_none()
            && self.sex.is_none()
            && self.activity.is_none()
            && self.goal.is_none()
            && self.rate.is_none()
            && self.training_load.is_none()
    }

    fn apply(&self, profile: &mut Profile) {
        if let Some(height_cm) = self.height_cm {
            profile.height_cm = height_cm;
        }
        if let Some(age) = self.age {
            profile.age_years = age;
        }
        if let Some(sex) = self.sex {
            profile.sex = sex.into();
        }
        if let Some(activity) = self.activity {
            profile.activity_level = activity.into();
        }
        if let Some(goal) = self.goal {
            profile.goal_type = goal.into();
        }
        if let Some(rate) = self.rate {
            profile.goal_rate_per_week = rate;
        }
        if let Some(load) = self.training_load {
            profile.training_load_score = load;
        }
    }

    /// A fresh profile needs every body metric
    fn into_new_profile(self) -> Result<Profile> {
        let missing = |name: &str| Error::State(format!("new profile needs --{}", name));

        let mut profile = Profile {
            height_cm: self.height_cm.ok_or_else(|| missing("height-cm"))?,
            age_years: self.age.ok_or_else(|| missing("age"))?,
            sex: self.sex.ok_or_else(|| missing("sex"))?.into(),
            activity_level: self.activity.ok_or_else(|| missing("activity"))?.into(),
            goal_type: self.goal.ok_or_else(|| missing("goal"))?.into(),
            goal_rate_per_week: 0.0,
            training_load_score: 0.0,
        };
        self.apply(&mut profile);
        Ok(profile)
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SexArg {
    Male,
    Female,
}

impl From<SexArg> for Sex {
    fn from(arg: SexArg) -> Self {
        match arg {
            SexArg::Male => Sex::Male,
            SexArg::Female => Sex::Female,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ActivityArg {
    Sedentary,
    Light,
    Moderate,
    Active,
    VeryActive,
}

impl From<ActivityArg> for ActivityLevel {
    fn from(arg: ActivityArg) -> Self {
        match arg {
            ActivityArg::Sedentary => ActivityLevel::Sedentary,
            ActivityArg::Light => ActivityLevel::Light,
            ActivityArg::Moderate => ActivityLevel::Moderate,
            ActivityArg::Active => ActivityLevel::Active,
            ActivityArg::VeryActive => ActivityLevel::VeryActive,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum GoalArg {
    Cutting,
    Maintaining,
    Bulking,
    Recomposition,
}

impl From<GoalArg> for GoalType {
    fn from(arg: GoalArg) -> Self {
        match arg {
            GoalArg::Cutting => GoalType::Cutting,
            GoalArg::Maintaining => GoalType::Maintaining,
            GoalArg::Bulking => GoalType::Bulking,
            GoalArg::Recomposition => GoalType::Recomposition,
        }
    }
}

/// File layout under the data directory
struct DataPaths {
    profile: PathBuf,
    weights: PathBuf,
    measurements: PathBuf,
    wal_dir: PathBuf,
    wal: PathBuf,
    snapshots_csv: PathBuf,
}

impl DataPaths {
    fn new(data_dir: &Path) -> Self {
        let wal_dir = data_dir.join("wal");
        Self {
            profile: data_dir.join("profile.json"),
            weights: data_dir.join("weights.csv"),
            measurements: data_dir.join("measurements.csv"),
            wal: wal_dir.join("snapshots.wal"),
            wal_dir,
            snapshots_csv: data_dir.join("snapshots.csv"),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    coach_core::logging::init(cli.verbose);

    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    tracing::debug!("Using data directory {:?}", data_dir);
    let paths = DataPaths::new(&data_dir);

    match cli.command {
        Commands::Profile { args } => cmd_profile(&paths, args),
        Commands::Weigh { weight_kg, date } => {
            let entry = WeightEntry::new(date.unwrap_or_else(today), weight_kg);
            history::append_weight(&paths.weights, entry)?;
            println!("✓ Logged {:.1} kg for {}", entry.weight_kg, entry.date);
            Ok(())
        }
        Commands::Measure {
            site,
            value_cm,
            date,
        } => {
            let measurement = SiteMeasurement {
                site,
                point: MeasurementPoint::new(date.unwrap_or_else(today), value_cm),
            };
            history::append_measurement(&paths.measurements, measurement)?;
            println!(
                "✓ Logged {} {:.1} cm for {}",
                measurement.site.as_str(),
                measurement.point.value,
                measurement.point.date
            );
            Ok(())
        }
        Commands::Targets { dry_run, json } => cmd_targets(&paths, &config, dry_run, json),
        Commands::Recomp {
            date,
            day_type,
            json,
        } => cmd_recomp(&paths, &config, date.unwrap_or_else(today), day_type, json),
        Commands::Rollup { cleanup } => cmd_rollup(&paths, cleanup),
    }
}

/// Local calendar day
fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn cmd_profile(paths: &DataPaths, args: ProfileArgs) -> Result<()> {
    let existing = Profile::load(&paths.profile)?;

    let profile = match existing {
        Some(profile) if args.is_empty() => profile,
        Some(_) => Profile::update(&paths.profile, |profile| {
            args.apply(profile);
            Ok(())
        })?,
        None if args.is_empty() => {
            println!("No profile yet. Create one with:");
            println!("  coach profile --height-cm 178 --age 30 --sex male --activity moderate --goal cutting --rate -0.5");
            return Ok(());
        }
        None => {
            let profile = args.into_new_profile()?;
            profile.save(&paths.profile)?;
            profile
        }
    };

    display_profile(&profile);
    Ok(())
}

/// Load profile and history and run the adaptive engine
fn compute_current_targets(paths: &DataPaths, config: &Config) -> Result<(AdaptiveInput, AdaptiveOutput)> {
    let profile = Profile::load(&paths.profile)?.ok_or_else(|| {
        Error::State("no profile found; run `coach profile` first".into())
    })?;

    let weights = history::load_weights(&paths.weights)?;
    if weights.is_empty() {
        return Err(Error::State(
            "no bodyweight logged yet; run `coach weigh <kg>` first".into(),
        ));
    }

    let input = profile.adaptive_input(weights)?;
    input.validate()?;

    let output = compute_snapshot_with(&input, &config.adaptive)?;
    Ok((input, output))
}

fn cmd_targets(paths: &DataPaths, config: &Config, dry_run: bool, json: bool) -> Result<()> {
    let (input, output) = compute_current_targets(paths, config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        display_targets(&input, &output);
    }

    if dry_run {
        if !json {
            println!("\n[Dry run - not logging snapshot]");
        }
        return Ok(());
    }

    let record = SnapshotRecord::new(config.user.id.clone(), chrono::Utc::now(), output);
    let mut sink = JsonlSink::new(&paths.wal);
    sink.append(&record)?;

    if !json {
        println!("\n✓ Snapshot logged!");
    }
    Ok(())
}

fn cmd_recomp(
    paths: &DataPaths,
    config: &Config,
    date: NaiveDate,
    day_type: Option<DayType>,
    json: bool,
) -> Result<()> {
    let (input, fresh) = compute_current_targets(paths, config)?;

    // Prefer the last logged snapshot as the baseline so cycling follows
    // the targets the user has actually been given
    let snapshots = wal::read_snapshots(&paths.wal)?;
    let baseline_output = latest_snapshot(&snapshots, &config.user.id)
        .map(|record| record.output.clone())
        .unwrap_or(fresh);

    let measurements = history::load_measurements(&paths.measurements)?;
    let recomp_input = build_recomp_input(&measurements, &input.bodyweight_history);
    let metrics = compute_recomp_metrics(&recomp_input, config.recomp.lookback_days);

    let weekly_change = metrics.weight_trend.map(|t| t.slope_per_week);
    let checkin = compute_recomp_checkin(&metrics, weekly_change);

    let day_type = day_type.unwrap_or_else(|| config.schedule.classify(date));
    let targets = compute_recomp_daily_targets(
        baseline_output.tdee,
        day_type,
        input.weight_kg,
        &BaselineMacros::from(&baseline_output),
        &config.recomp,
    )?;

    if json {
        let report = serde_json::json!({
            "date": date,
            "metrics": metrics,
            "checkin": checkin,
            "targets": targets,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        display_recomp(date, &metrics, &checkin, &targets);
    }

    Ok(())
}

fn cmd_rollup(paths: &DataPaths, cleanup: bool) -> Result<()> {
    if !paths.wal.exists() {
        println!("No snapshot log found - nothing to roll up.");
        return Ok(());
    }

    let count = coach_core::csv_rollup::wal_to_csv_and_archive(&paths.wal, &paths.snapshots_csv)?;

    println!("✓ Rolled up {} snapshots to CSV", count);
    println!("  CSV: {}", paths.snapshots_csv.display());

    if cleanup {
        let cleaned = coach_core::csv_rollup::cleanup_processed_wals(&paths.wal_dir)?;
        if cleaned > 0 {
            println!("✓ Cleaned up {} processed logs", cleaned);
        }
    }

    Ok(())
}

fn display_profile(profile: &Profile) {
    println!("\n╭─────────────────────────────────────────╮");
    println!("│  PROFILE");
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!("  Height:   {:.1} cm", profile.height_cm);
    println!("  Age:      {}", profile.age_years);
    println!("  Sex:      {:?}", profile.sex);
    println!("  Activity: {:?}", profile.activity_level);
    println!(
        "  Goal:     {:?} ({:+.2} kg/week)",
        profile.goal_type, profile.goal_rate_per_week
    );
    println!("  Load:     {:.0}", profile.training_load_score);
    println!();
}

fn display_targets(input: &AdaptiveInput, output: &AdaptiveOutput) {
    println!("\n╭─────────────────────────────────────────╮");
    println!("│  DAILY TARGETS ({:?})", input.goal_type);
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!("  Calories: {:.0} kcal", output.target_calories);
    println!("  Protein:  {:.0} g", output.target_protein_g);
    println!("  Carbs:    {:.0} g", output.target_carbs_g);
    println!("  Fat:      {:.0} g", output.target_fat_g);
    println!();
    println!("  BMR {:.0} → TDEE {:.0} kcal", output.bmr, output.tdee);
    println!(
        "  Trend weight {:.2} kg, adjustment {:+.0} kcal",
        output.ema_current, output.adjustment_factor
    );
}

fn display_recomp(
    date: NaiveDate,
    metrics: &RecompMetricsOutput,
    checkin: &RecompCheckin,
    targets: &RecompDailyTargets,
) {
    println!("\n╭─────────────────────────────────────────╮");
    println!("│  RECOMP CHECK-IN {}", date);
    println!("╰─────────────────────────────────────────╯");
    println!();

    for (label, trend) in [
        ("Waist", metrics.waist_trend),
        ("Arm", metrics.arm_trend),
        ("Chest", metrics.chest_trend),
        ("Weight", metrics.weight_trend),
    ] {
        match trend {
            Some(t) => println!(
                "  {:<7} {:+.2}/week ({:?}, {} points)",
                label, t.slope_per_week, t.direction, t.data_points
            ),
            None => println!("  {:<7} not enough data", label),
        }
    }

    if let Some(score) = metrics.recomp_score {
        println!();
        println!("  Recomp score: {:.1}", score);
    }

    println!();
    println!("  {}", checkin.message);
    if let Some(adjustment) = checkin.suggested_adjustment {
        println!(
            "  → {:?} days: {:+.0}%",
            adjustment.day_type, adjustment.pct_change
        );
    }

    println!();
    println!(
        "  {:?} day ({:+.0}%): {:.0} kcal",
        targets.day_type, targets.cycle_pct, targets.adjusted_calories
    );
    println!(
        "  Protein {:.0} g · Carbs {:.0} g · Fat {:.0} g",
        targets.adjusted_protein_g, targets.adjusted_carbs_g, targets.adjusted_fat_g
    );
    println!();
}
