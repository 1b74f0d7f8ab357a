use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use herald_core::config::HeraldConfig;
use herald_scheduler::{
    AuthorizationStatus, CalendarPattern, MemoryStore, NotificationDescriptor,
    NotificationManager, NotificationUpdate, RemovalScope, SchedulingError, TriggerTime,
};
use serde_json::{json, Value};
use tracing::info;

#[derive(Parser)]
#[command(name = "herald", version, about = "Local notification scheduler")]
struct Cli {
    /// Config file (default: $HERALD_CONFIG, then ~/.herald/herald.toml)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Schedule one notification and print the pending set.
    Schedule {
        #[arg(long)]
        title: String,
        #[arg(long)]
        body: Option<String>,
        #[arg(long)]
        identifier: Option<String>,
        /// Fire once after this many seconds.
        #[arg(long, conflicts_with_all = ["every_secs", "at", "daily"])]
        after_secs: Option<i64>,
        /// Fire repeatedly at this interval (at least 60).
        #[arg(long, conflicts_with_all = ["at", "daily"])]
        every_secs: Option<i64>,
        /// Fire once at an RFC 3339 instant.
        #[arg(long, conflicts_with = "daily")]
        at: Option<DateTime<Utc>>,
        /// Fire every day at HH:MM (UTC).
        #[arg(long)]
        daily: Option<String>,
        /// Simulate the user refusing the permission prompt.
        #[arg(long)]
        deny: bool,
    },
    /// Walk a notification through schedule, update, reschedule and removal.
    Demo,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "herald_scheduler=info,herald=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // explicit flag > HERALD_CONFIG env > ~/.herald/herald.toml
    let config_path = cli.config.or_else(|| std::env::var("HERALD_CONFIG").ok());
    let config = HeraldConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        HeraldConfig::default()
    });

    match cli.command {
        Command::Schedule {
            title,
            body,
            identifier,
            after_secs,
            every_secs,
            at,
            daily,
            deny,
        } => {
            let trigger = match (after_secs, every_secs, at, daily) {
                (Some(secs), ..) => TriggerTime::after(seconds(secs, "--after-secs")?),
                (_, Some(secs), ..) => TriggerTime::every(seconds(secs, "--every-secs")?),
                (_, _, Some(at), _) => TriggerTime::at(at),
                (_, _, _, Some(daily)) => TriggerTime::repeating(parse_daily(&daily)?),
                _ => TriggerTime::now(),
            };

            let mut descriptor = NotificationDescriptor::new(title, trigger);
            if let Some(body) = body {
                descriptor = descriptor.with_body(body);
            }
            if let Some(identifier) = identifier {
                descriptor = descriptor.with_identifier(identifier);
            }

            let store = Arc::new(
                MemoryStore::new(AuthorizationStatus::NotDetermined).granting(!deny),
            );
            let manager = NotificationManager::new(store, &config);

            match manager.schedule(descriptor).await {
                Ok(id) => {
                    info!(notification_id = %id, "scheduled");
                    print_json(&pending_report(&manager).await?)?;
                }
                Err(e) => {
                    print_json(&error_report(&e))?;
                    bail!("scheduling failed: {}", e.code());
                }
            }
        }
        Command::Demo => run_demo(&config).await?,
    }

    Ok(())
}

async fn run_demo(config: &HeraldConfig) -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new(AuthorizationStatus::NotDetermined));
    let manager = Arc::new(NotificationManager::new(store.clone(), config));
    store.set_delegate(&manager);

    let reminder = manager
        .schedule(
            NotificationDescriptor::new("Reminder", TriggerTime::after(Duration::minutes(30)))
                .with_body("Stretch your legs"),
        )
        .await?;
    let standup = manager
        .schedule(
            NotificationDescriptor::new(
                "Standup",
                TriggerTime::repeating(CalendarPattern::daily_at(9, 0)),
            )
            .with_identifier("standup")
            .with_thread_id("work"),
        )
        .await?;
    print_json(&json!({ "step": "scheduled", "pending": pending_report(&manager).await? }))?;

    manager
        .update(&standup, NotificationUpdate::new().with_body("Room 4B"))
        .await?;
    manager
        .reschedule(&reminder, TriggerTime::at(Utc::now() + Duration::hours(2)))
        .await?;
    print_json(&json!({ "step": "updated", "pending": pending_report(&manager).await? }))?;

    // interval triggers can't be reused without a new one
    let interval = manager
        .schedule(NotificationDescriptor::new(
            "Hydrate",
            TriggerTime::every(Duration::hours(1)),
        ))
        .await?;
    if let Err(e) = manager
        .update(&interval, NotificationUpdate::new().with_title("Drink water"))
        .await
    {
        print_json(&json!({ "step": "update_rejected", "error": error_report(&e) }))?;
    }

    let presented = store.deliver(&standup);
    print_json(&json!({ "step": "delivered", "identifier": standup, "presentation": presented }))?;

    manager.remove([reminder], RemovalScope::Both).await;
    manager.remove_all(RemovalScope::Delivered).await;
    print_json(&json!({ "step": "removed", "pending": pending_report(&manager).await? }))?;

    Ok(())
}

fn seconds(value: i64, flag: &str) -> anyhow::Result<Duration> {
    Duration::try_seconds(value).with_context(|| format!("{flag} out of range: {value}"))
}

fn parse_daily(value: &str) -> anyhow::Result<CalendarPattern> {
    let (hour, minute) = value
        .split_once(':')
        .with_context(|| format!("expected HH:MM, got '{}'", value))?;
    let hour: u32 = hour.parse().context("invalid hour")?;
    let minute: u32 = minute.parse().context("invalid minute")?;
    if hour > 23 || minute > 59 {
        bail!("time out of range: {}", value);
    }
    Ok(CalendarPattern::daily_at(hour, minute))
}

async fn pending_report(manager: &NotificationManager) -> anyhow::Result<Value> {
    let now = Utc::now();
    let entries = manager
        .pending()
        .await?
        .into_iter()
        .map(|descriptor| {
            let next_fire = descriptor
                .trigger
                .to_store_trigger(descriptor.repeats)
                .next_fire_after(now);
            json!({ "notification": descriptor, "next_fire": next_fire })
        })
        .collect();
    Ok(Value::Array(entries))
}

fn error_report(error: &SchedulingError) -> Value {
    json!({
        "code": error.code(),
        "description": error.description(),
        "recovery": error.recovery_suggestion(),
    })
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_daily_time() {
        assert_eq!(parse_daily("07:30").unwrap(), CalendarPattern::daily_at(7, 30));
        assert!(parse_daily("7").is_err());
        assert!(parse_daily("24:00").is_err());
        assert!(parse_daily("ab:cd").is_err());
    }

    #[test]
    fn out_of_range_seconds_are_an_error() {
        assert_eq!(seconds(90, "--after-secs").unwrap(), Duration::seconds(90));
        assert!(seconds(i64::MAX, "--after-secs").is_err());
        assert!(seconds(i64::MIN, "--every-secs").is_err());
    }

    #[test]
    fn cli_rejects_conflicting_triggers() {
        let parsed = Cli::try_parse_from([
            "herald", "schedule", "--title", "x", "--after-secs", "5", "--daily", "07:00",
        ]);
        assert!(parsed.is_err());
    }
}
