//! Replay recorded host events

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use console::{style, Emoji};
use forum_relay_core::segment::preview;
use forum_relay_core::{
    ActionFilter, AnalyticsRelay, Delivery, Envelope, HookRegistry, HostEvent, RelayConfig,
};
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;

static SENT: Emoji<'_, '_> = Emoji("✅ ", "+ ");
static SKIPPED: Emoji<'_, '_> = Emoji("⏸️ ", "- ");
static FAILED: Emoji<'_, '_> = Emoji("❌ ", "x ");

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// JSON-lines file of host events, `-` for stdin
    pub file: PathBuf,

    /// Print the records each event maps to instead of sending them
    #[arg(long)]
    pub dry_run: bool,
}

/// Tally of a replay run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplaySummary {
    pub events: usize,
    pub sent: usize,
    pub disabled: usize,
    pub failed: usize,
}

pub async fn replay(args: ReplayArgs) -> Result<()> {
    let input = read_input(&args.file).await?;
    let events = parse_events(&input)?;
    let registry = HookRegistry::with_default_hooks(ActionFilter::forum_defaults());

    if args.dry_run {
        return print_records(&events, &registry);
    }

    let config = RelayConfig::from_env().context("Failed to load relay configuration")?;
    if !config.enabled {
        println!(
            "{}",
            style("Relay is disabled (SEGMENT_IO_ENABLED), nothing will be sent").yellow()
        );
    }
    let (relay, _settings) = AnalyticsRelay::from_config(&config)?;

    let summary = replay_events(&events, &registry, &relay).await?;

    println!();
    println!(
        "{} events: {} sent, {} skipped, {} failed",
        style(summary.events).bold(),
        style(summary.sent).green(),
        style(summary.disabled).dim(),
        style(summary.failed).red()
    );
    Ok(())
}

async fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut input = String::new();
        tokio::io::stdin()
            .read_to_string(&mut input)
            .await
            .context("Failed to read events from stdin")?;
        return Ok(input);
    }
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

/// Parse one event per line. Blank lines and `#` comments are skipped.
pub fn parse_events(input: &str) -> Result<Vec<HostEvent>> {
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(idx, line)| {
            serde_json::from_str(line).with_context(|| format!("Invalid event on line {}", idx + 1))
        })
        .collect()
}

/// Dispatch every event through the registry, in order.
pub async fn replay_events(
    events: &[HostEvent],
    registry: &HookRegistry,
    relay: &AnalyticsRelay,
) -> Result<ReplaySummary> {
    let mut summary = ReplaySummary::default();

    for (idx, event) in events.iter().enumerate() {
        summary.events += 1;
        let outcomes = registry
            .dispatch(event, relay)
            .await
            .with_context(|| format!("Event {} failed", idx + 1))?;

        for outcome in outcomes {
            match outcome {
                Delivery::Sent => {
                    summary.sent += 1;
                    println!("{} {:?}", SENT, event.hook_point());
                }
                Delivery::Disabled => {
                    summary.disabled += 1;
                    println!("{} {:?}", SKIPPED, event.hook_point());
                }
                Delivery::Failed(reason) => {
                    summary.failed += 1;
                    println!("{} {:?} {}", FAILED, event.hook_point(), style(reason).red());
                }
            }
        }
    }

    Ok(summary)
}

fn print_records(events: &[HostEvent], registry: &HookRegistry) -> Result<()> {
    for (idx, event) in events.iter().enumerate() {
        let records = registry.map_event(event)?;
        println!(
            "{} {:?} -> {} record(s)",
            style(format!("#{}", idx + 1)).bold(),
            event.hook_point(),
            records.len()
        );
        for record in &records {
            let envelope = Envelope {
                write_key: "",
                record,
                timestamp: Utc::now(),
            };
            println!("{}", serde_json::to_string_pretty(&preview(&envelope)?)?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use forum_relay_core::{HookPoint, RecordingSink, SharedSettings};
    use forum_relay_testing::{CallMatcher, MockIngestion};
    use std::io::Write;

    const EVENTS: &str = r#"
# recorded on staging
{"event":"topic_tag_created","topic_id":5,"tag_name":"rust"}

{"event":"page_view","controller":"stylesheets","action":"show","url":"https://forum.example.com/s.css","current_user":{"id":1,"email":"a@b.com"}}
{"event":"page_view","controller":"about","action":"index","url":"https://forum.example.com/about","current_user":{"id":1,"email":"a@b.com"}}
"#;

    #[test]
    fn parses_json_lines_skipping_comments() {
        let events = parse_events(EVENTS).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].hook_point(), HookPoint::TopicTagCreated);
        assert_eq!(events[2].hook_point(), HookPoint::BeforeAction);
    }

    #[test]
    fn reports_line_of_bad_event() {
        let err = parse_events("{\"event\":\"topic_tag_created\",\"topic_id\":1,\"tag_name\":\"x\"}\n{oops}")
            .unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[tokio::test]
    async fn reads_events_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(EVENTS.as_bytes()).unwrap();

        let input = read_input(file.path()).await.unwrap();
        assert_eq!(parse_events(&input).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn replays_into_sink() {
        let sink = RecordingSink::new();
        let relay = AnalyticsRelay::new(SharedSettings::new(true, "wk"), sink.clone());
        let registry = HookRegistry::with_default_hooks(ActionFilter::forum_defaults());

        let events = parse_events(EVENTS).unwrap();
        let summary = replay_events(&events, &registry, &relay).await.unwrap();

        assert_eq!(
            summary,
            ReplaySummary {
                events: 3,
                sent: 2,
                disabled: 0,
                failed: 0
            }
        );
        assert_eq!(sink.records()[1].name(), Some("about#index"));
    }

    #[tokio::test]
    async fn replays_over_http() {
        let server = MockIngestion::start().await;
        server.expect(CallMatcher::track().anonymous_id("-1")).once();
        server.expect(CallMatcher::page().user_id(1)).once();

        let config = RelayConfig::new("wk_cli").endpoint(server.base_url());
        let (relay, _) = AnalyticsRelay::from_config(&config).unwrap();
        let registry = HookRegistry::with_default_hooks(ActionFilter::forum_defaults());

        let events = parse_events(EVENTS).unwrap();
        replay_events(&events, &registry, &relay).await.unwrap();

        server.verify();
    }
}
