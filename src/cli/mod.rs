use crate::rotation::RotationEvent;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;

#[derive(Parser)]
#[command(
    name = "jwt-rotator",
    version,
    about = "Staged rotation of a JWT API token in a versioned secret store"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one rotation step against the configured services.
    Rotate(RotateOpts),
    /// Run a full rotation against an in-memory store.
    Simulate(SimulateOpts),
    Config(ConfigOpts),
    Version,
}

#[derive(clap::Args)]
pub struct RotateOpts {
    #[arg(short, long)]
    pub config: Option<String>,
    /// Trigger event JSON file, or `-` for stdin.
    #[arg(short, long, conflicts_with_all = ["secret_id", "token", "step"])]
    pub event: Option<String>,
    #[arg(long, env = "ROTATION_SECRET_ID", requires_all = ["token", "step"])]
    pub secret_id: Option<String>,
    #[arg(long, env = "ROTATION_CLIENT_REQUEST_TOKEN")]
    pub token: Option<String>,
    #[arg(long, env = "ROTATION_STEP")]
    pub step: Option<String>,
}

impl RotateOpts {
    /// Build the trigger event from `--event` or the individual flags.
    pub fn load_event(&self) -> Result<RotationEvent> {
        if let Some(source) = &self.event {
            let raw = if source == "-" {
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .context("Cannot read event from stdin")?;
                buf
            } else {
                std::fs::read_to_string(source)
                    .with_context(|| format!("Cannot read event file '{source}'"))?
            };
            return serde_json::from_str(&raw).context("Invalid rotation event JSON");
        }

        match (&self.secret_id, &self.token, &self.step) {
            (Some(secret_id), Some(token), Some(step)) => Ok(RotationEvent {
                secret_id: secret_id.clone(),
                client_request_token: token.clone(),
                step: step.clone(),
            }),
            _ => anyhow::bail!("Either --event or all of --secret-id, --token and --step are required"),
        }
    }
}

#[derive(clap::Args)]
pub struct SimulateOpts {
    #[arg(long, default_value = "simulated/api-token")]
    pub secret_id: String,
    /// Make the validation probe reject the new token.
    #[arg(long)]
    pub fail_probe: bool,
}

#[derive(clap::Args)]
pub struct ConfigOpts {
    #[arg(short, long)]
    pub config: Option<String>,
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    Show,
    Validate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_build_an_event() {
        let cli = Cli::try_parse_from([
            "jwt-rotator",
            "rotate",
            "--secret-id",
            "jwt",
            "--token",
            "v2",
            "--step",
            "createSecret",
        ])
        .unwrap();
        let Commands::Rotate(opts) = cli.command else {
            panic!("expected rotate");
        };
        let event = opts.load_event().unwrap();
        assert_eq!(event.secret_id, "jwt");
        assert_eq!(event.client_request_token, "v2");
        assert_eq!(event.step, "createSecret");
    }

    #[test]
    fn event_file_conflicts_with_flags() {
        let result = Cli::try_parse_from([
            "jwt-rotator",
            "rotate",
            "--event",
            "event.json",
            "--step",
            "testSecret",
        ]);
        assert!(result.is_err());
    }
}
