use clap::Parser;
use jwt_rotator::cli::{Cli, Commands, ConfigAction};
use jwt_rotator::config::{validate_config_object, Config};
use jwt_rotator::logging;
use jwt_rotator::rotation::{run_simulation, RotationCoordinator, SimulationOptions};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Rotate(opts) => {
            let config = Config::load(opts.config.as_deref())?;
            validate_config_object(&config)?;
            let event = opts.load_event()?;

            let coordinator = RotationCoordinator::from_config(&config)?;
            match coordinator.handle(&event).await {
                Ok(outcome) => {
                    println!("{}", serde_json::to_string(&outcome)?);
                }
                Err(e) => {
                    error!("Rotation step {} for {} failed: {e}", event.step, event.secret_id);
                    return Err(e.into());
                }
            }
        }
        Commands::Simulate(opts) => {
            info!("Simulating a rotation of {}", opts.secret_id);
            let report = run_simulation(&SimulationOptions {
                secret_id: opts.secret_id,
                fail_probe: opts.fail_probe,
            })
            .await?;

            for (step, outcome) in &report.steps {
                println!("{step:<13} {outcome:?}");
            }
            println!("version stages after rotation {}:", report.request_token);
            for (version, stages) in &report.after.versions {
                let labels: Vec<&str> = stages.iter().map(|s| s.as_str()).collect();
                println!("  {version}  [{}]", labels.join(", "));
            }
        }
        Commands::Config(opts) => {
            let config = Config::load(opts.config.as_deref())?;
            match opts.action {
                ConfigAction::Show => {
                    println!("{}", serde_json::to_string_pretty(&config)?);
                }
                ConfigAction::Validate => {
                    validate_config_object(&config)?;
                    info!("Configuration is valid");
                }
            }
        }
        Commands::Version => {
            println!("jwt-rotator {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
