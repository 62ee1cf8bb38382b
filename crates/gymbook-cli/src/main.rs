//! GymBook CLI - Manage members, plans, and enrollments from the
//! terminal, and drive cloud sync passes.

use std::env;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::aot::Generator;
use clap_complete::{generate, shells};
use gymbook_core::config::SyncProfile;
use gymbook_core::db::{
    Database, EnrollmentRepository, MemberRepository, PlanRepository,
    SqliteEnrollmentRepository, SqliteMemberRepository, SqlitePlanRepository,
};
use gymbook_core::models::{Enrollment, ExperienceLevel, Gender, Member, MembershipPlan};
use gymbook_core::sync::{
    backoff_seconds, HttpRemoteStore, SyncError, SyncOrchestrator, SyncOutcome, SyncReport,
};
use gymbook_core::{MemberId, PlanId};
use serde::Serialize;
use thiserror::Error;

#[derive(Parser)]
#[command(name = "gymbook")]
#[command(about = "Gym membership management from the command line")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Optional path to local database file
    #[arg(long, value_name = "PATH")]
    db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage gym members
    #[command(subcommand)]
    Member(MemberCommands),
    /// Manage membership plans
    #[command(subcommand)]
    Plan(PlanCommands),
    /// Manage enrollments
    #[command(subcommand)]
    Enroll(EnrollCommands),
    /// Synchronize with the cloud store
    #[command(subcommand)]
    Sync(SyncCommands),
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum MemberCommands {
    /// Register a new member
    Add {
        /// Display name
        name: String,
        #[arg(long, value_enum, default_value_t = GenderArg::Other)]
        gender: GenderArg,
        #[arg(long, default_value = "30")]
        age: u32,
        /// Body weight in kilograms
        #[arg(long, default_value = "70")]
        weight: f64,
        #[arg(long, value_enum, default_value_t = LevelArg::Beginner)]
        level: LevelArg,
    },
    /// List members
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a member
    Delete {
        /// Member ID or unique ID prefix
        id: String,
    },
}

#[derive(Subcommand)]
enum PlanCommands {
    /// Create a membership plan
    Add {
        /// Plan name
        name: String,
        #[arg(long)]
        price: f64,
        /// Plan duration in days
        #[arg(long, value_name = "DAYS")]
        duration: i64,
    },
    /// List plans
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a plan
    Delete {
        /// Plan ID or unique ID prefix
        id: String,
    },
}

#[derive(Subcommand)]
enum EnrollCommands {
    /// Enroll a member in a plan
    Add {
        /// Member ID or unique ID prefix
        member: String,
        /// Plan ID or unique ID prefix
        plan: String,
        /// Record the enrollment as not yet paid
        #[arg(long)]
        unpaid: bool,
    },
    /// List enrollments
    List {
        /// Only enrollments for this member ID or prefix
        #[arg(long)]
        member: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete an enrollment
    Delete {
        /// Enrollment ID or unique ID prefix
        id: String,
    },
}

#[derive(Subcommand)]
enum SyncCommands {
    /// Run one sync pass
    Run {
        /// Ignore the stored watermark and pull everything
        #[arg(long)]
        full: bool,
    },
    /// Clear the stored watermark so the next pass pulls everything
    Reset,
    /// Replace the local database with the cloud state
    Restore,
    /// Sync periodically, retrying failures with backoff
    Watch {
        /// Seconds between successful passes
        #[arg(long, default_value = "300")]
        interval: u64,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Core(#[from] gymbook_core::Error),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No record found for id/prefix: {0}")]
    RecordNotFound(String),
    #[error("{0}")]
    AmbiguousId(String),
    #[error("Record ID cannot be empty")]
    EmptyId,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum GenderArg {
    Male,
    Female,
    Other,
}

impl From<GenderArg> for Gender {
    fn from(value: GenderArg) -> Self {
        match value {
            GenderArg::Male => Self::Male,
            GenderArg::Female => Self::Female,
            GenderArg::Other => Self::Other,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum LevelArg {
    Beginner,
    Intermediate,
    Advanced,
}

impl From<LevelArg> for ExperienceLevel {
    fn from(value: LevelArg) -> Self {
        match value {
            LevelArg::Beginner => Self::Beginner,
            LevelArg::Intermediate => Self::Intermediate,
            LevelArg::Advanced => Self::Advanced,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gymbook=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);

    match cli.command {
        Commands::Member(command) => run_member(command, &db_path),
        Commands::Plan(command) => run_plan(command, &db_path),
        Commands::Enroll(command) => run_enroll(command, &db_path),
        Commands::Sync(command) => run_sync(command, &db_path).await,
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref()),
    }
}

// ---------------------------------------------------------------------------
// Member commands
// ---------------------------------------------------------------------------

fn run_member(command: MemberCommands, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let repo = SqliteMemberRepository::new(db.connection());

    match command {
        MemberCommands::Add {
            name,
            gender,
            age,
            weight,
            level,
        } => {
            let member = Member::new(name, gender.into(), age, weight, level.into());
            repo.create(&member)?;
            println!("{}", member.id);
        }
        MemberCommands::List { json } => {
            let members = repo.list()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&members)?);
            } else {
                for line in format_member_lines(&members) {
                    println!("{line}");
                }
            }
        }
        MemberCommands::Delete { id } => {
            let resolved = resolve_record_id(&db, "members", &id)?;
            repo.delete(&resolved.parse::<MemberId>().map_err(|_| {
                CliError::RecordNotFound(id.clone())
            })?)?;
            println!("{resolved}");
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Plan commands
// ---------------------------------------------------------------------------

fn run_plan(command: PlanCommands, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let repo = SqlitePlanRepository::new(db.connection());

    match command {
        PlanCommands::Add {
            name,
            price,
            duration,
        } => {
            let plan = MembershipPlan::new(name, price, duration);
            repo.create(&plan)?;
            println!("{}", plan.id);
        }
        PlanCommands::List { json } => {
            let plans = repo.list()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&plans)?);
            } else {
                for plan in &plans {
                    println!(
                        "{:<13}  {:<24}  {:>8.2}  {:>4}d",
                        short_id(&plan.id.to_string()),
                        plan.name,
                        plan.price,
                        plan.duration_days
                    );
                }
            }
        }
        PlanCommands::Delete { id } => {
            let resolved = resolve_record_id(&db, "membership_plans", &id)?;
            repo.delete(&resolved.parse::<PlanId>().map_err(|_| {
                CliError::RecordNotFound(id.clone())
            })?)?;
            println!("{resolved}");
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Enrollment commands
// ---------------------------------------------------------------------------

fn run_enroll(command: EnrollCommands, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;

    match command {
        EnrollCommands::Add {
            member,
            plan,
            unpaid,
        } => {
            let member_id: MemberId = resolve_record_id(&db, "members", &member)?
                .parse()
                .map_err(|_| CliError::RecordNotFound(member.clone()))?;
            let plan_id: PlanId = resolve_record_id(&db, "membership_plans", &plan)?
                .parse()
                .map_err(|_| CliError::RecordNotFound(plan.clone()))?;

            let plan_repo = SqlitePlanRepository::new(db.connection());
            let plan = plan_repo
                .get(&plan_id)?
                .ok_or_else(|| CliError::RecordNotFound(plan_id.to_string()))?;

            let enrollment =
                Enrollment::new(member_id, plan_id, plan.duration_days, !unpaid);
            SqliteEnrollmentRepository::new(db.connection()).create(&enrollment)?;
            println!("{}", enrollment.id);
        }
        EnrollCommands::List { member, json } => {
            let repo = SqliteEnrollmentRepository::new(db.connection());
            let enrollments = match member {
                Some(query) => {
                    let member_id: MemberId = resolve_record_id(&db, "members", &query)?
                        .parse()
                        .map_err(|_| CliError::RecordNotFound(query.clone()))?;
                    repo.list_for_member(&member_id)?
                }
                None => repo.list()?,
            };

            if json {
                let items = enrollments
                    .iter()
                    .map(|enrollment| enrollment_to_list_item(&db, enrollment))
                    .collect::<Vec<EnrollmentListItem>>();
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else {
                for line in format_enrollment_lines(&db, &enrollments) {
                    println!("{line}");
                }
            }
        }
        EnrollCommands::Delete { id } => {
            let resolved = resolve_record_id(&db, "enrollments", &id)?;
            let enrollment_id = resolved
                .parse()
                .map_err(|_| CliError::RecordNotFound(id.clone()))?;
            SqliteEnrollmentRepository::new(db.connection()).delete(&enrollment_id)?;
            println!("{resolved}");
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Sync commands
// ---------------------------------------------------------------------------

async fn run_sync(command: SyncCommands, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let profile = SyncProfile::from_env().resolve()?;
    let remote = HttpRemoteStore::new(&profile.api_url, &profile.api_token)?;
    let orchestrator = SyncOrchestrator::new(&db, &remote);

    match command {
        SyncCommands::Run { full } => {
            let report = if full {
                orchestrator.force_full_resync(&profile.account_id).await?
            } else {
                orchestrator.try_sync(&profile.account_id, false).await?
            };
            print_report(&report);
        }
        SyncCommands::Reset => {
            db.clear_last_synced_at(&profile.account_id)?;
            println!("Watermark cleared; next sync will pull everything");
        }
        SyncCommands::Restore => {
            let report = orchestrator.restore_from_remote(&profile.account_id).await?;
            println!("Restored {} records from the cloud", report.pulled);
        }
        SyncCommands::Watch { interval } => {
            watch_loop(&orchestrator, &profile.account_id, interval).await?;
        }
    }

    Ok(())
}

async fn watch_loop(
    orchestrator: &SyncOrchestrator<'_, HttpRemoteStore>,
    account_id: &str,
    interval_secs: u64,
) -> Result<(), CliError> {
    let mut consecutive_failures = 0_i32;

    loop {
        match orchestrator.run_sync(Some(account_id)).await {
            SyncOutcome::Success(report) => {
                consecutive_failures = 0;
                print_report(&report);
                tokio::time::sleep(Duration::from_secs(interval_secs)).await;
            }
            SyncOutcome::Failure(error) if error.is_retryable() => {
                let delay = backoff_seconds(consecutive_failures);
                consecutive_failures += 1;
                tracing::warn!(%error, delay_secs = delay, "sync failed; retrying");
                tokio::time::sleep(Duration::from_secs(delay.unsigned_abs())).await;
            }
            SyncOutcome::Failure(error) => return Err(error.into()),
        }
    }
}

fn print_report(report: &SyncReport) {
    println!(
        "Synced in {}ms: {} pushed, {} pulled, {} deleted locally, {} deleted remotely",
        report.duration_ms,
        report.pushed,
        report.pulled,
        report.deleted_local,
        report.deleted_remote
    );
}

// ---------------------------------------------------------------------------
// Completions
// ---------------------------------------------------------------------------

fn run_completions(shell: CompletionShell, output_path: Option<&Path>) -> Result<(), CliError> {
    let mut command = Cli::command();
    let mut buffer = Vec::new();

    match shell {
        CompletionShell::Bash => generate_for_shell(shells::Bash, &mut command, &mut buffer),
        CompletionShell::Zsh => generate_for_shell(shells::Zsh, &mut command, &mut buffer),
        CompletionShell::Fish => generate_for_shell(shells::Fish, &mut command, &mut buffer),
    }

    if let Some(path) = output_path {
        std::fs::write(path, &buffer)?;
        println!("{}", path.display());
    } else {
        io::stdout().write_all(&buffer)?;
    }

    Ok(())
}

fn generate_for_shell<G: Generator>(
    generator: G,
    command: &mut clap::Command,
    buffer: &mut Vec<u8>,
) {
    generate(generator, command, "gymbook", buffer);
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Resolve a full record id from a full id or a unique prefix
fn resolve_record_id(db: &Database, table: &str, id_query: &str) -> Result<String, CliError> {
    let trimmed = id_query.trim();
    if trimmed.is_empty() {
        return Err(CliError::EmptyId);
    }

    let mut stmt = db
        .connection()
        .prepare(&format!(
            "SELECT id FROM {table} WHERE id LIKE ? ORDER BY last_updated DESC LIMIT 3"
        ))
        .map_err(gymbook_core::Error::from)?;
    let matching_ids = stmt
        .query_map(rusqlite::params![format!("{trimmed}%")], |row| {
            row.get::<_, String>(0)
        })
        .map_err(gymbook_core::Error::from)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(gymbook_core::Error::from)?;

    match matching_ids.len() {
        0 => Err(CliError::RecordNotFound(trimmed.to_string())),
        1 => Ok(matching_ids[0].clone()),
        _ => {
            let options = matching_ids
                .iter()
                .map(|id| short_id(id))
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousId(format!(
                "ID prefix '{trimmed}' is ambiguous; matches: {options}"
            )))
        }
    }
}

fn format_member_lines(members: &[Member]) -> Vec<String> {
    members
        .iter()
        .map(|member| {
            format!(
                "{:<13}  {:<24}  {:<12}  {:>3}y  {:>5.1}kg",
                short_id(&member.id.to_string()),
                member.name,
                member.experience_level.as_str(),
                member.age,
                member.weight_kg
            )
        })
        .collect()
}

/// Resolve member/plan display names; dangling references render as the
/// raw id prefix
fn resolve_enrollment_names(db: &Database, enrollment: &Enrollment) -> (String, String) {
    let member = SqliteMemberRepository::new(db.connection())
        .get(&enrollment.member_id)
        .ok()
        .flatten()
        .map_or_else(
            || short_id(&enrollment.member_id.to_string()),
            |m| m.name,
        );
    let plan = SqlitePlanRepository::new(db.connection())
        .get(&enrollment.plan_id)
        .ok()
        .flatten()
        .map_or_else(|| short_id(&enrollment.plan_id.to_string()), |p| p.name);
    (member, plan)
}

#[derive(Debug, Serialize)]
struct EnrollmentListItem {
    id: String,
    member: String,
    plan: String,
    paid: bool,
    paid_at: i64,
    expires_at: i64,
}

fn enrollment_to_list_item(db: &Database, enrollment: &Enrollment) -> EnrollmentListItem {
    let (member, plan) = resolve_enrollment_names(db, enrollment);
    EnrollmentListItem {
        id: enrollment.id.to_string(),
        member,
        plan,
        paid: enrollment.paid,
        paid_at: enrollment.paid_at,
        expires_at: enrollment.expires_at,
    }
}

fn format_enrollment_lines(db: &Database, enrollments: &[Enrollment]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();

    enrollments
        .iter()
        .map(|enrollment| {
            let (member, plan) = resolve_enrollment_names(db, enrollment);

            format!(
                "{:<13}  {:<24}  {:<16}  {:<6}  {}",
                short_id(&enrollment.id.to_string()),
                member,
                plan,
                if enrollment.paid { "paid" } else { "unpaid" },
                format_expiry(enrollment.expires_at, now_ms)
            )
        })
        .collect()
}

fn format_expiry(expires_at: i64, now_ms: i64) -> String {
    let day = 86_400_000_i64;
    let diff = expires_at - now_ms;

    if diff < 0 {
        format!("expired {}d ago", -diff / day)
    } else if diff < day {
        "expires today".to_string()
    } else {
        format!("expires in {}d", diff / day)
    }
}

fn short_id(id: &str) -> String {
    id.chars().take(13).collect()
}

fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("GYMBOOK_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gymbook")
        .join("gymbook.db")
}

fn open_database(path: &Path) -> Result<Database, CliError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(Database::open(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn short_id_truncates_uuids() {
        let id = "0198a7f2-3c44-7b1a-9f00-1234567890ab";
        assert_eq!(short_id(id), "0198a7f2-3c44");
        assert_eq!(short_id("abc"), "abc");
    }

    #[test]
    fn expiry_formatting_covers_past_and_future() {
        let day = 86_400_000_i64;
        assert_eq!(format_expiry(1_000 * day, 1_003 * day), "expired 3d ago");
        assert_eq!(format_expiry(1_000 * day + 1, 1_000 * day), "expires today");
        assert_eq!(format_expiry(1_010 * day, 1_000 * day), "expires in 10d");
    }

    #[test]
    fn prefix_resolution_handles_missing_unique_and_ambiguous() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteMemberRepository::new(db.connection());

        let ana = Member::new("Ana", Gender::Female, 28, 62.0, ExperienceLevel::Advanced);
        repo.create(&ana).unwrap();

        assert!(matches!(
            resolve_record_id(&db, "members", "zzzz"),
            Err(CliError::RecordNotFound(_))
        ));
        assert!(matches!(
            resolve_record_id(&db, "members", "  "),
            Err(CliError::EmptyId)
        ));

        let id = ana.id.to_string();
        assert_eq!(resolve_record_id(&db, "members", &id[..8]).unwrap(), id);

        // UUID v7 ids created back to back share a timestamp prefix
        let bea = Member::new("Bea", Gender::Female, 31, 58.0, ExperienceLevel::Beginner);
        repo.create(&bea).unwrap();
        assert!(matches!(
            resolve_record_id(&db, "members", "0"),
            Err(CliError::AmbiguousId(_)) | Err(CliError::RecordNotFound(_))
        ));
    }

    #[test]
    fn enrollment_list_items_resolve_names_and_serialize() {
        let db = Database::open_in_memory().unwrap();
        let member = Member::new("Ana", Gender::Female, 28, 62.0, ExperienceLevel::Advanced);
        let plan = MembershipPlan::new("Monthly", 29.99, 30);
        SqliteMemberRepository::new(db.connection()).create(&member).unwrap();
        SqlitePlanRepository::new(db.connection()).create(&plan).unwrap();

        let enrollment = Enrollment::new(member.id, plan.id, plan.duration_days, true);
        let item = enrollment_to_list_item(&db, &enrollment);
        assert_eq!(item.member, "Ana");
        assert_eq!(item.plan, "Monthly");

        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["paid"], true);
        assert_eq!(json["expires_at"], enrollment.expires_at);

        // Dangling references fall back to the raw id prefix
        let dangling = Enrollment::new(MemberId::new(), PlanId::new(), 30, false);
        let item = enrollment_to_list_item(&db, &dangling);
        assert_eq!(item.member, short_id(&dangling.member_id.to_string()));
    }

    #[test]
    fn member_lines_include_name_and_level() {
        let members = vec![Member::new(
            "Ana",
            Gender::Female,
            28,
            62.0,
            ExperienceLevel::Advanced,
        )];
        let lines = format_member_lines(&members);
        assert!(lines[0].contains("Ana"));
        assert!(lines[0].contains("advanced"));
    }
}
