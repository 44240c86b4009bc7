mod cache;
mod credentials;
mod day;
mod error;
mod holidays;
mod models;
mod report;
mod slip;

use chrono::Duration;
use clap::Parser;
use futures::TryStreamExt;
use std::collections::HashMap;
use std::process;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cache::{CachedFetchClient, DEFAULT_CACHE_DIR};
use day::{CalendarDay, DayType};
use models::{SlipRow, TimeEntry};
use report::ReportSource;
use slip::SlipOptions;

#[derive(Parser, Debug)]
#[command(author, version, about = "Compare logged time against expected working days")]
struct Args {
    #[arg(long, help = "First day of the report (YYYY-MM-DD)", value_name = "DATE")]
    start: Option<String>,

    #[arg(long, help = "Last day of the report, defaults to yesterday", value_name = "DATE")]
    end: Option<String>,

    #[arg(long, help = "Also include the day after --end (today by default)")]
    today: bool,

    #[arg(long, default_value_t = 8.0, help = "Expected hours per workday", value_name = "HOURS")]
    target: f64,

    #[arg(long, help = "Ignore entries whose description contains TEXT", value_name = "TEXT")]
    exclude: Option<String>,

    #[arg(long, help = "Hours carried over into the running totals", value_name = "HOURS")]
    initial: Option<f64>,

    #[arg(long, help = "Remove cached responses before fetching")]
    clear_cache: bool,

    #[arg(long, help = "Log cache and request activity")]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn hours(h: f64) -> Duration {
    Duration::milliseconds((h * 3_600_000.0).round() as i64)
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    // Validate dates before touching config, disk or network
    let start_arg = args.start.as_deref().map(str::parse::<CalendarDay>).transpose()?;
    let end_arg = args.end.as_deref().map(str::parse::<CalendarDay>).transpose()?;

    let settings = credentials::load()?;
    let (start, end) = report_range(start_arg.or(settings.start_date), end_arg, CalendarDay::today());

    let options = SlipOptions {
        start,
        end,
        target: hours(args.target),
        exclude: args.exclude.clone(),
        initial: hours(args.initial.or(settings.initial_hours).unwrap_or(0.0)),
        include_next_day: args.today,
    };

    if options.start.is_after(&options.last_day()) {
        return Err(format!("start {} is after end {}", options.start, options.last_day()).into());
    }

    let client = CachedFetchClient::new(DEFAULT_CACHE_DIR)?;
    if args.clear_cache {
        client.clear_cache().await?;
    }

    let source = ReportSource::new(client, settings.toggl);
    let projects = source.projects().await?;

    info!(start = %options.start, end = %options.last_day(), "building slip report");
    let entries = source
        .time_entries(options.start, options.last_day())
        .into_stream()
        .map_ok(|entry| label_with_project(entry, &projects));

    let rows = slip::aggregate(entries, &options).await?;
    print_rows(&rows, &options);

    Ok(())
}

/// End defaults to yesterday, start to the first of the end's month, so a
/// run on the 1st reports the whole previous month.
fn report_range(
    start: Option<CalendarDay>,
    end: Option<CalendarDay>,
    today: CalendarDay,
) -> (CalendarDay, CalendarDay) {
    let end = end.unwrap_or_else(|| today.previous_day());
    let start = start.unwrap_or_else(|| end.first_of_month());
    (start, end)
}

fn label_with_project(mut entry: TimeEntry, projects: &HashMap<u64, String>) -> TimeEntry {
    entry.project_name = entry.project_id.and_then(|id| projects.get(&id)).cloned();
    entry
}

fn format_duration(d: Duration) -> String {
    let minutes = d.num_minutes();
    let sign = if minutes < 0 { "-" } else { "" };
    let minutes = minutes.abs();
    format!("{}{}:{:02}", sign, minutes / 60, minutes % 60)
}

fn format_slip(d: Duration) -> String {
    if d > Duration::zero() {
        format!("+{}", format_duration(d))
    } else {
        format_duration(d)
    }
}

fn marker(row: &SlipRow) -> &'static str {
    let off = row.day.is_off();
    if !off && row.worked == Duration::zero() {
        "!"
    } else if off && row.worked > Duration::zero() {
        "+"
    } else {
        " "
    }
}

fn print_rows(rows: &[SlipRow], options: &SlipOptions) {
    for row in rows {
        let kind = match row.day.day_type() {
            DayType::Workday => String::new(),
            other => other.to_string(),
        };
        let weekday = &row.day.weekday_name()[..3];

        println!(
            "{} {} {} {:>7} {:>7} {:>8} {:>8}  {:<12} {}",
            marker(row),
            row.day,
            weekday,
            format_duration(row.worked),
            format_slip(row.slip),
            format_duration(row.total_worked),
            format_slip(row.total_slip),
            truncate(&kind, 12),
            row.descriptions.join(", ")
        );
    }

    if let Some(last) = rows.last() {
        println!();
        println!(
            "{} days from {} to {}: worked {}, slip {}",
            rows.len(),
            options.start,
            options.last_day(),
            format_duration(last.total_worked),
            format_slip(last.total_slip)
        );
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let cut: String = s.chars().take(max - 1).collect();
        format!("{}…", cut)
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_render_as_hours_and_minutes() {
        assert_eq!(format_duration(Duration::minutes(90)), "1:30");
        assert_eq!(format_duration(Duration::minutes(-480)), "-8:00");
        assert_eq!(format_slip(Duration::minutes(5)), "+0:05");
        assert_eq!(format_slip(Duration::zero()), "0:00");
    }

    #[test]
    fn fractional_hours() {
        assert_eq!(hours(7.5), Duration::minutes(450));
        assert_eq!(hours(-0.25), Duration::minutes(-15));
    }

    #[test]
    fn markers_separate_missing_and_surplus_days() {
        let row = |date: &str, worked: Duration| SlipRow {
            day: date.parse().unwrap(),
            worked,
            slip: Duration::zero(),
            total_worked: Duration::zero(),
            total_slip: Duration::zero(),
            descriptions: Vec::new(),
        };

        assert_eq!(marker(&row("2025-03-04", Duration::zero())), "!");
        assert_eq!(marker(&row("2025-03-08", Duration::hours(1))), "+");
        assert_eq!(marker(&row("2025-03-08", Duration::zero())), " ");
        assert_eq!(marker(&row("2025-03-04", Duration::hours(8))), " ");
    }

    #[test]
    fn project_names_are_appended() {
        let mut projects = HashMap::new();
        projects.insert(3, "Ops".to_string());
        let entry = TimeEntry {
            description: "deploy".to_string(),
            project_id: Some(3),
            segments: Vec::new(),
            project_name: None,
        };

        let labelled = label_with_project(entry, &projects);
        assert_eq!(labelled.description, "deploy");
        assert_eq!(labelled.label(), "deploy [Ops]");
    }

    #[tokio::test]
    async fn exclusion_does_not_match_project_names() {
        use futures::stream;

        let mut projects = HashMap::new();
        projects.insert(3, "Ops".to_string());
        let entry = TimeEntry {
            description: "deploy".to_string(),
            project_id: Some(3),
            segments: vec![models::TimeSegment {
                start: chrono::DateTime::parse_from_rfc3339("2025-03-04T09:00:00+01:00").unwrap(),
                seconds: 3600,
            }],
            project_name: None,
        };
        let day: CalendarDay = "2025-03-04".parse().unwrap();
        let options = SlipOptions {
            start: day,
            end: day,
            target: Duration::hours(8),
            exclude: Some("ops".to_string()),
            initial: Duration::zero(),
            include_next_day: false,
        };

        let entries = stream::iter(vec![Ok::<_, crate::error::SlipError>(entry)]).map_ok(|e| label_with_project(e, &projects));
        let rows = slip::aggregate(entries, &options).await.unwrap();

        assert_eq!(rows[0].worked, Duration::hours(1));
        assert_eq!(rows[0].descriptions, vec!["deploy [Ops]"]);
    }

    #[test]
    fn default_range_on_first_of_month_is_previous_month() {
        let today: CalendarDay = "2025-04-01".parse().unwrap();
        let (start, end) = report_range(None, None, today);

        assert_eq!(start.to_string(), "2025-03-01");
        assert_eq!(end.to_string(), "2025-03-31");
    }

    #[test]
    fn default_range_mid_month() {
        let today: CalendarDay = "2025-04-15".parse().unwrap();
        let (start, end) = report_range(None, None, today);
        assert_eq!((start.to_string(), end.to_string()), ("2025-04-01".to_string(), "2025-04-14".to_string()));

        let explicit: CalendarDay = "2025-02-10".parse().unwrap();
        let (start, _) = report_range(Some(explicit), None, today);
        assert_eq!(start, explicit);
    }

    #[test]
    fn long_titles_are_truncated() {
        assert_eq!(truncate("Struggle for Freedom", 6), "Strug…");
        assert_eq!(truncate("weekend", 12), "weekend");
    }
}
