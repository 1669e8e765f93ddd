use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use jpr::config::Config;
use jpr::db::{check_alerts, Database};
use jpr::models::{JsonOutput, Lang, NewUser, PracticeResult};

#[derive(Parser)]
#[command(name = "jpr")]
#[command(about = "Data store for the Java peer review training system")]
#[command(version)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Path to config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    Init,

    /// Load the default catalog, badges and learning paths
    Seed,

    /// Show schema version and missing tables
    Status,

    /// Manage users
    #[command(subcommand)]
    User(UserCommands),

    /// Browse the Java error catalog
    #[command(subcommand)]
    Errors(ErrorCommands),

    /// Learning paths and enrollment
    #[command(subcommand)]
    Path(PathCommands),

    /// Practice sessions
    #[command(subcommand)]
    Practice(PracticeCommands),

    /// Badges
    #[command(subcommand)]
    Badge(BadgeCommands),

    /// Performance summary for one user or everyone
    Summary {
        /// User ID
        uid: Option<String>,
    },

    /// Per-skill XP, level and mastery for a user
    Skills {
        /// User ID
        uid: String,
    },

    /// Hint usage and helpfulness for a user
    Hints {
        /// User ID
        uid: String,

        /// Only this error type
        #[arg(long, short)]
        error_type: Option<String>,
    },

    /// Daily activity totals
    Daily {
        /// Number of days to include
        #[arg(long, short, default_value_t = 7)]
        days: i64,
    },

    /// Collect metrics and raise alerts
    Monitor,

    /// Delete old interaction telemetry
    Cleanup {
        /// Keep this many days (defaults to the configured retention)
        #[arg(long, short)]
        days: Option<i64>,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Register a user
    Add {
        email: String,

        /// Explicit user ID (generated when omitted)
        #[arg(long)]
        uid: Option<String>,

        #[arg(long)]
        name_en: Option<String>,

        #[arg(long)]
        name_zh: Option<String>,
    },

    /// Show a user with stats and recent activity
    Show { uid: String },

    /// Delete a user and everything they own
    Delete { uid: String },

    /// Top users by points
    Leaderboard {
        #[arg(long, short, default_value_t = 10)]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum ErrorCommands {
    /// List catalog errors
    List {
        /// Filter by category code
        #[arg(long, short)]
        category: Option<String>,

        /// Display language: en or zh
        #[arg(long, default_value = "en")]
        lang: String,
    },

    /// Show one error with its detail page
    Show {
        code: String,

        #[arg(long, default_value = "en")]
        lang: String,
    },

    /// Pick errors at random, weighted by frequency
    Pick {
        /// Category codes to draw from (repeatable)
        #[arg(long, short)]
        category: Vec<String>,

        #[arg(long, short = 'n', default_value_t = 3)]
        count: usize,
    },
}

#[derive(Subcommand)]
enum PathCommands {
    /// List active learning paths
    List,

    /// Show a path and its steps
    Show { id: i64 },

    /// Enroll a user in a path
    Enroll { uid: String, path_id: i64 },

    /// Complete the user's current step
    Complete {
        uid: String,
        path_id: i64,
        step_id: i64,
    },
}

#[derive(Subcommand)]
enum PracticeCommands {
    /// Start practicing an error
    Start { uid: String, error_code: String },

    /// Attach generated code to a session
    Ready {
        id: i64,

        /// File holding the generated Java code
        #[arg(long)]
        code_file: PathBuf,
    },

    /// Finish a review and score it
    Complete {
        id: i64,

        #[arg(long, short)]
        expected: i64,

        #[arg(long, short)]
        identified: i64,

        /// Time spent, in seconds
        #[arg(long, short, default_value_t = 0)]
        seconds: i64,
    },

    /// Abandon a session
    Abandon { id: i64 },
}

#[derive(Subcommand)]
enum BadgeCommands {
    /// List active badges
    List,

    /// Award a badge to a user
    Award { uid: String, badge_id: String },
}

fn init_logging(verbose: bool, level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new(level)
        }
    });

    // stderr keeps --json output clean
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn open_db(path: &Path) -> Result<Database> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Database::open(path).with_context(|| format!("Failed to open {}", path.display()))
}

fn print_json<T: Serialize>(data: T) -> Result<()> {
    println!("{}", serde_json::to_string(&JsonOutput::ok(data))?);
    Ok(())
}

fn print_not_found(json: bool, what: &str) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string(&JsonOutput::<()>::err(format!("{} not found", what)))?
        );
    } else {
        println!("{} not found.", what);
    }
    Ok(())
}

fn parse_lang(s: &str) -> Result<Lang> {
    Lang::from_str(s).with_context(|| format!("Unknown language '{}', expected en or zh", s))
}

fn main() {
    let cli = Cli::parse();
    let json = cli.json;

    if let Err(e) = run(cli) {
        if json {
            let out = JsonOutput::<()>::err(format!("{:#}", e));
            if let Ok(s) = serde_json::to_string(&out) {
                println!("{}", s);
            }
        } else {
            eprintln!("Error: {:#}", e);
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    init_logging(cli.verbose, &config.logging.level);

    let db_path = config.resolve_db_path()?;
    let db = open_db(&db_path)?;

    // Status reports the schema as found; everything else brings it current
    if !matches!(cli.command, Commands::Status) {
        db.init()?;
    }

    match cli.command {
        Commands::Init => {
            if cli.json {
                print_json(serde_json::json!({
                    "path": db_path,
                    "schema_version": db.schema_version()?
                }))?;
            } else {
                println!("Database initialized at: {}", db_path.display());
                println!("Schema version: {}", db.schema_version()?);
            }
        }

        Commands::Seed => {
            let report = db.seed_defaults()?;
            if cli.json {
                print_json(&report)?;
            } else {
                println!("Seeded {} new rows:", report.total());
                println!("  categories:     {}", report.categories);
                println!("  java errors:    {}", report.java_errors);
                println!("  badges:         {}", report.badges);
                println!("  error details:  {}", report.error_details);
                println!("  learning paths: {}", report.learning_paths);
                println!("  path steps:     {}", report.path_steps);
            }
        }

        Commands::Status => {
            let version = db.schema_version()?;
            let missing = db.verify_schema()?;
            if cli.json {
                print_json(serde_json::json!({
                    "path": db_path,
                    "schema_version": version,
                    "latest_version": Database::latest_version(),
                    "missing": missing
                }))?;
            } else {
                println!("=== Database Status ===");
                println!("Path: {}", db_path.display());
                println!(
                    "Schema version: {} (latest {})",
                    version,
                    Database::latest_version()
                );
                if missing.is_empty() {
                    println!("All tables and views present.");
                } else {
                    println!("Missing: {}", missing.join(", "));
                }
            }
        }

        Commands::User(cmd) => match cmd {
            UserCommands::Add {
                email,
                uid,
                name_en,
                name_zh,
            } => {
                let mut new = NewUser::new(&email);
                new.uid = uid;
                new.display_name_en = name_en;
                new.display_name_zh = name_zh;
                let uid = db.create_user(&new)?;
                if cli.json {
                    print_json(serde_json::json!({ "uid": uid, "email": email }))?;
                } else {
                    println!("Added user {} with ID: {}", email, uid);
                }
            }

            UserCommands::Show { uid } => {
                if let Some(user) = db.get_user(&uid)? {
                    let stats = db.category_stats(&uid)?;
                    let activity = db.recent_activity(&uid, 10)?;
                    if cli.json {
                        print_json(serde_json::json!({
                            "user": user,
                            "category_stats": stats,
                            "recent_activity": activity
                        }))?;
                    } else {
                        println!("User: {} ({})", user.display_name(), user.uid);
                        println!("Email: {}", user.email);
                        println!("Level: {} / {}", user.level_name_en, user.level_name_zh);
                        println!(
                            "Points: {}  Reviews: {}  Streak: {} day(s)",
                            user.total_points, user.reviews_completed, user.consecutive_days
                        );
                        if !stats.is_empty() {
                            println!();
                            println!("--- Categories ---");
                            for s in stats {
                                println!(
                                    "{:<16} {:>3}/{:<3} {}",
                                    s.category,
                                    s.identified,
                                    s.encountered,
                                    s.mastery_label()
                                );
                            }
                        }
                        if !activity.is_empty() {
                            println!();
                            println!("--- Recent activity ---");
                            for a in activity {
                                println!(
                                    "{}  {:<20} {:>+4}  {}",
                                    a.created_at,
                                    a.activity_type.as_str(),
                                    a.points,
                                    a.details_en.as_deref().unwrap_or("")
                                );
                            }
                        }
                    }
                } else {
                    print_not_found(cli.json, "User")?;
                }
            }

            UserCommands::Delete { uid } => {
                if db.delete_user(&uid)? {
                    if cli.json {
                        print_json(())?;
                    } else {
                        println!("User {} deleted.", uid);
                    }
                } else {
                    print_not_found(cli.json, "User")?;
                }
            }

            UserCommands::Leaderboard { limit } => {
                let users = db.leaderboard(limit)?;
                if cli.json {
                    print_json(&users)?;
                } else if users.is_empty() {
                    println!("No users yet.");
                } else {
                    println!("{:<4} {:<30} {:>8} {:>8}", "#", "USER", "POINTS", "REVIEWS");
                    println!("{}", "-".repeat(54));
                    for (rank, user) in users.iter().enumerate() {
                        println!(
                            "{:<4} {:<30} {:>8} {:>8}",
                            rank + 1,
                            truncate(user.display_name(), 28),
                            user.total_points,
                            user.reviews_completed
                        );
                    }
                }
            }
        },

        Commands::Errors(cmd) => match cmd {
            ErrorCommands::List { category, lang } => {
                let lang = parse_lang(&lang)?;
                let errors = db.list_java_errors(category.as_deref())?;
                if cli.json {
                    print_json(&errors)?;
                } else if errors.is_empty() {
                    println!("No errors found.");
                } else {
                    println!("{:<24} {:<16} {:<8} NAME", "CODE", "CATEGORY", "LEVEL");
                    println!("{}", "-".repeat(78));
                    for e in &errors {
                        println!(
                            "{:<24} {:<16} {:<8} {}",
                            e.error_code,
                            e.category_code,
                            e.difficulty.as_str(),
                            e.name(lang)
                        );
                    }
                }
            }

            ErrorCommands::Show { code, lang } => {
                let lang = parse_lang(&lang)?;
                if let Some(error) = db.get_java_error(&code)? {
                    let detail = db.get_error_detail(&code)?;
                    if cli.json {
                        print_json(serde_json::json!({ "error": error, "detail": detail }))?;
                    } else {
                        println!("{}: {}", error.error_code, error.name(lang));
                        println!("Category: {}", error.category_code);
                        println!("Difficulty: {}", error.difficulty.as_str());
                        println!("Used: {} time(s)", error.usage_count);
                        println!();
                        println!("{}", error.description(lang));
                        if let Some(d) = detail {
                            if let Some(fix) = &d.suggestion_fix_md {
                                println!();
                                println!("--- How to fix ---");
                                println!("{}", fix);
                            }
                        }
                    }
                } else {
                    print_not_found(cli.json, "Error")?;
                }
            }

            ErrorCommands::Pick { category, count } => {
                let picked = db.pick_random_errors(&category, count)?;
                if cli.json {
                    print_json(&picked)?;
                } else if picked.is_empty() {
                    println!("No active errors match.");
                } else {
                    for e in picked {
                        println!("{:<24} {}", e.error_code, e.error_name_en);
                    }
                }
            }
        },

        Commands::Path(cmd) => match cmd {
            PathCommands::List => {
                let paths = db.list_learning_paths(true)?;
                if cli.json {
                    print_json(&paths)?;
                } else if paths.is_empty() {
                    println!("No learning paths found.");
                } else {
                    println!("{:<5} {:<40} {:<14} HOURS", "ID", "NAME", "LEVEL");
                    println!("{}", "-".repeat(68));
                    for p in paths {
                        println!(
                            "{:<5} {:<40} {:<14} {}",
                            p.id,
                            truncate(&p.path_name, 38),
                            p.difficulty_level,
                            p.estimated_hours
                        );
                    }
                }
            }

            PathCommands::Show { id } => {
                if let Some(path) = db.get_learning_path(id)? {
                    let steps = db.path_steps(id)?;
                    if cli.json {
                        print_json(serde_json::json!({ "path": path, "steps": steps }))?;
                    } else {
                        println!("Path: {} (ID: {})", path.path_name, path.id);
                        if let Some(desc) = &path.description_en {
                            println!("Description: {}", desc);
                        }
                        println!();
                        for s in steps {
                            println!(
                                "{:>2}. [{}] {:<40} {} ({} min)",
                                s.step_order,
                                s.id,
                                truncate(&s.title, 38),
                                s.content.step_type(),
                                s.estimated_time_minutes
                            );
                        }
                    }
                } else {
                    print_not_found(cli.json, "Learning path")?;
                }
            }

            PathCommands::Enroll { uid, path_id } => {
                let enrollment = db.enroll_user(&uid, path_id)?;
                if cli.json {
                    print_json(&enrollment)?;
                } else {
                    println!(
                        "Enrolled {} in path {} ({})",
                        uid,
                        path_id,
                        enrollment.status.label()
                    );
                }
            }

            PathCommands::Complete {
                uid,
                path_id,
                step_id,
            } => {
                let enrollment = db.complete_step(&uid, path_id, step_id)?;
                if cli.json {
                    print_json(&enrollment)?;
                } else {
                    println!(
                        "Progress: {:.0}% ({})",
                        enrollment.progress_percentage,
                        enrollment.status.label()
                    );
                }
            }
        },

        Commands::Practice(cmd) => match cmd {
            PracticeCommands::Start { uid, error_code } => {
                let id = db.start_practice(&uid, &error_code, None)?;
                if cli.json {
                    print_json(serde_json::json!({ "id": id }))?;
                } else {
                    println!("Started practice session {} on {}", id, error_code);
                }
            }

            PracticeCommands::Ready { id, code_file } => {
                let code = std::fs::read_to_string(&code_file)
                    .with_context(|| format!("Failed to read {}", code_file.display()))?;
                db.mark_code_ready(id, &code)?;
                if cli.json {
                    print_json(())?;
                } else {
                    println!("Session {} is ready for review.", id);
                }
            }

            PracticeCommands::Complete {
                id,
                expected,
                identified,
                seconds,
            } => {
                let session =
                    db.complete_practice(id, PracticeResult::new(expected, identified, seconds))?;
                if cli.json {
                    print_json(&session)?;
                } else {
                    println!(
                        "Found {}/{} errors ({:.0}% accuracy)",
                        session.errors_identified,
                        session.errors_expected,
                        session.accuracy_percentage.unwrap_or(0.0)
                    );
                }
            }

            PracticeCommands::Abandon { id } => {
                db.abandon_practice(id)?;
                if cli.json {
                    print_json(())?;
                } else {
                    println!("Session {} abandoned.", id);
                }
            }
        },

        Commands::Badge(cmd) => match cmd {
            BadgeCommands::List => {
                let badges = db.list_badges()?;
                if cli.json {
                    print_json(&badges)?;
                } else if badges.is_empty() {
                    println!("No badges found.");
                } else {
                    for b in badges {
                        println!(
                            "{} {:<24} {:<24} {:>4} pts  {}",
                            b.icon.as_deref().unwrap_or(" "),
                            b.badge_id,
                            b.name,
                            b.points,
                            b.rarity
                        );
                    }
                }
            }

            BadgeCommands::Award { uid, badge_id } => {
                let held = db.award_badge(&uid, &badge_id)?;
                if cli.json {
                    print_json(&held)?;
                } else {
                    println!("Awarded {} to {}.", badge_id, uid);
                }
            }
        },

        Commands::Summary { uid } => match uid {
            Some(uid) => {
                if let Some(s) = db.user_performance_summary(&uid)? {
                    if cli.json {
                        print_json(&s)?;
                    } else {
                        println!("=== Performance: {} ===", s.email);
                        println!("Points: {}", s.total_points);
                        println!("Reviews: {}", s.reviews_completed);
                        println!(
                            "Practice: {} started, {} completed",
                            s.practice_sessions, s.completed_practices
                        );
                        if let Some(acc) = s.avg_accuracy {
                            println!("Average accuracy: {:.1}%", acc);
                        }
                        println!("Badges: {}", s.badges_earned);
                        println!("Paths completed: {}", s.paths_completed);
                        println!("Streak: {} day(s)", s.consecutive_days);
                    }
                } else {
                    print_not_found(cli.json, "User")?;
                }
            }
            None => {
                let all = db.performance_summaries()?;
                if cli.json {
                    print_json(&all)?;
                } else {
                    println!(
                        "{:<30} {:>7} {:>8} {:>9} {:>7}",
                        "USER", "POINTS", "REVIEWS", "ACCURACY", "BADGES"
                    );
                    println!("{}", "-".repeat(65));
                    for s in all {
                        let accuracy = s
                            .avg_accuracy
                            .map(|a| format!("{:.1}%", a))
                            .unwrap_or_else(|| "-".to_string());
                        println!(
                            "{:<30} {:>7} {:>8} {:>9} {:>7}",
                            truncate(&s.email, 28),
                            s.total_points,
                            s.reviews_completed,
                            accuracy,
                            s.badges_earned
                        );
                    }
                }
            }
        },

        Commands::Skills { uid } => {
            let skills = db.skill_progress(&uid)?;
            if cli.json {
                print_json(&skills)?;
            } else if skills.is_empty() {
                println!("No skill progress yet.");
            } else {
                println!(
                    "{:<20} {:>5} {:>7} {:>8} {:>7}",
                    "SKILL", "LEVEL", "XP", "MASTERY", "STREAK"
                );
                println!("{}", "-".repeat(51));
                for s in skills {
                    println!(
                        "{:<20} {:>5} {:>7} {:>7.1}% {:>7}",
                        truncate(&s.skill_category, 18),
                        s.current_level,
                        s.experience_points,
                        s.mastery_percentage,
                        s.practice_streak
                    );
                }
            }
        }

        Commands::Hints { uid, error_type } => {
            let analytics = db.hint_analytics(&uid, error_type.as_deref())?;
            if cli.json {
                print_json(&analytics)?;
            } else if analytics.is_empty() {
                println!("No hints used.");
            } else {
                for a in analytics {
                    println!("{} ({} use(s))", a.error_type, a.total_usage);
                    for level in a.levels {
                        let helpful = level
                            .helpfulness
                            .map(|h| format!("{:.0}% helpful", h * 100.0))
                            .unwrap_or_else(|| "unrated".to_string());
                        println!(
                            "  level {}: {} use(s), {}",
                            level.hint_level, level.usage_count, helpful
                        );
                    }
                }
            }
        }

        Commands::Daily { days } => {
            let rows = db.daily_activity_summary(days)?;
            if cli.json {
                print_json(&rows)?;
            } else if rows.is_empty() {
                println!("No activity in the last {} day(s).", days);
            } else {
                println!("{:<12} {:>6} {:>10} {:>8}", "DATE", "USERS", "ACTIVITIES", "POINTS");
                println!("{}", "-".repeat(40));
                for d in rows {
                    println!(
                        "{:<12} {:>6} {:>10} {:>8}",
                        d.activity_date, d.active_users, d.activities, d.points_awarded
                    );
                }
            }
        }

        Commands::Monitor => {
            let snapshot = db.collect_metrics(&config.monitoring)?;
            let alerts = check_alerts(&snapshot, &config.monitoring);
            for alert in &alerts {
                db.raise_alert(alert)?;
            }
            let open = db.open_alerts()?;
            if cli.json {
                print_json(serde_json::json!({
                    "metrics": snapshot,
                    "raised": alerts,
                    "open_alerts": open
                }))?;
            } else {
                println!("=== System Metrics ({}) ===", snapshot.collected_at);
                println!("Active sessions: {}", snapshot.active_sessions);
                println!("Interactions: {}", snapshot.total_interactions);
                println!("Error rate: {:.1}%", snapshot.error_rate * 100.0);
                println!("Avg time spent: {:.1}s", snapshot.avg_response_time_secs);
                match snapshot.workflow_completion_rate {
                    Some(rate) => println!("Workflow completion: {:.1}%", rate * 100.0),
                    None => println!("Workflow completion: -"),
                }
                if !open.is_empty() {
                    println!();
                    println!("--- Open alerts ---");
                    for a in open {
                        println!(
                            "[{}] {:<8} {}",
                            a.id,
                            a.severity.as_str(),
                            a.message
                        );
                    }
                }
            }
        }

        Commands::Cleanup { days } => {
            let days = days.unwrap_or(config.retention.telemetry_days);
            let report = db.cleanup_telemetry(days)?;
            if cli.json {
                print_json(&report)?;
            } else {
                println!(
                    "Deleted {} interaction(s) and {} tab navigation(s) before {}",
                    report.interactions_deleted, report.navigations_deleted, report.cutoff
                );
            }
        }
    }

    Ok(())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
