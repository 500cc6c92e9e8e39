//! Show resolved configuration

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use forum_relay_core::{Environment, RelayConfig};

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Print the write key unmasked
    #[arg(long)]
    pub reveal: bool,
}

pub async fn show_config(args: ConfigArgs) -> Result<()> {
    let config = RelayConfig::from_env().context("Failed to load relay configuration")?;
    let env = Environment::current();

    println!("{}", style("Relay configuration").bold());
    println!();
    for (key, value) in describe(&config, &env, args.reveal) {
        println!("  {:<16} {}", style(key).cyan(), value);
    }

    if config.enabled && config.write_key.is_empty() {
        println!();
        println!(
            "{}",
            style("Relay is enabled but SEGMENT_IO_WRITE_KEY is empty; deliveries will fail").yellow()
        );
    }
    Ok(())
}

fn describe(config: &RelayConfig, env: &Environment, reveal: bool) -> Vec<(&'static str, String)> {
    let write_key = if config.write_key.is_empty() {
        "(unset)".to_string()
    } else if reveal {
        config.write_key.clone()
    } else {
        config.masked_write_key()
    };

    vec![
        ("environment", env.to_string()),
        ("enabled", config.enabled.to_string()),
        ("write_key", write_key),
        ("endpoint", config.endpoint.clone()),
        ("timeout", format!("{}s", config.timeout_secs)),
        ("failure_policy", format!("{:?}", config.failure_policy)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_key_unless_revealed() {
        let config = RelayConfig::new("wk_secret_9876");
        let env = Environment::Production;

        let masked = describe(&config, &env, false);
        assert_eq!(masked[2], ("write_key", "**********9876".to_string()));

        let revealed = describe(&config, &env, true);
        assert_eq!(revealed[2].1, "wk_secret_9876");
        assert_eq!(revealed[0].1, "production");
    }

    #[test]
    fn empty_key_is_reported_unset() {
        let rows = describe(&RelayConfig::default(), &Environment::Development, false);
        assert_eq!(rows[2].1, "(unset)");
        assert_eq!(rows[1].1, "false");
    }
}
