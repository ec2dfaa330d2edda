//! # arttic-cli
//!
//! Terminal client for an ArtTic-LAB image generation service. Each
//! subcommand opens its own session, drives its operations to their terminal
//! events over the WebSocket link, and prints what the service reports.

#![deny(unsafe_code)]

use anyhow::{Context, Result, bail};
use arttic_client::{
    ApiClient, ClientConfig, DEFAULT_RECONNECT_DELAY_MS, SessionEvent, SessionHandle,
};
use arttic_protocol::{ClientCommand, GenerateParams, LoadModelParams, UnloadModelParams};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast;

/// Scheduler used when a load does not name one.
const DEFAULT_SCHEDULER: &str = "Euler A";

/// ArtTic-LAB terminal client.
#[derive(Parser, Debug)]
#[command(name = "arttic", about = "Drive an ArtTic-LAB service from the terminal")]
struct Cli {
    /// Service base URL.
    #[arg(long, global = true, default_value = "http://127.0.0.1:8000")]
    server: String,

    /// Delay between redials in milliseconds.
    #[arg(long, global = true, default_value_t = DEFAULT_RECONNECT_DELAY_MS)]
    reconnect_delay_ms: u64,

    /// Consecutive failed redials tolerated before giving up (default: keep
    /// dialing forever).
    #[arg(long, global = true)]
    max_reconnects: Option<u32>,

    /// Give up on an operation after this many seconds without service
    /// traffic (0 waits forever).
    #[arg(long, global = true, default_value_t = 0)]
    op_timeout_secs: u64,

    /// More log output on stderr (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the models, schedulers and gallery the service offers.
    Config,
    /// Load a model and wait for the service to report it ready.
    Load {
        /// Model name as listed by `config`.
        model: String,
        /// Scheduler to sample with.
        #[arg(long, default_value = DEFAULT_SCHEDULER)]
        scheduler: String,
        /// Decode through the VAE in tiles to cap memory use.
        #[arg(long)]
        vae_tiling: bool,
        /// Offload idle submodels to CPU between steps.
        #[arg(long)]
        cpu_offload: bool,
    },
    /// Release the loaded model.
    Unload,
    /// Generate one image and print its URL.
    Generate {
        /// Prompt text.
        prompt: String,
        /// Load this model first (with the default scheduler).
        #[arg(long)]
        model: Option<String>,
        /// What the image must avoid.
        #[arg(long, default_value = "")]
        negative_prompt: String,
        /// Denoising steps.
        #[arg(long, default_value_t = 20)]
        steps: u32,
        /// Classifier-free guidance scale.
        #[arg(long, default_value_t = 7.5)]
        guidance: f64,
        /// Seed for reproducible output (default: the service picks one and
        /// reports it in the result line).
        #[arg(long)]
        seed: Option<i64>,
        /// Image width in pixels.
        #[arg(long, default_value_t = 512)]
        width: u32,
        /// Image height in pixels.
        #[arg(long, default_value_t = 512)]
        height: u32,
    },
    /// Stay connected and print every notification the service pushes.
    Watch,
}

impl Cli {
    fn session_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(&self.server);
        config.reconnect.delay_ms = self.reconnect_delay_ms;
        config.reconnect.max_attempts = self.max_reconnects;
        if self.op_timeout_secs > 0 {
            config.operation_timeout_ms = Some(self.op_timeout_secs.saturating_mul(1000));
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.verbose);

    let api = ApiClient::new(&args.server);
    let config = args.session_config();
    match args.command {
        Command::Config => show_config(&api).await,
        Command::Load {
            model,
            scheduler,
            vae_tiling,
            cpu_offload,
        } => {
            let params = LoadModelParams {
                model_name: model,
                scheduler_name: scheduler,
                vae_tiling,
                cpu_offload,
            };
            run_commands(config, &api, vec![ClientCommand::LoadModel(params)]).await
        }
        Command::Unload => {
            let command = ClientCommand::UnloadModel(UnloadModelParams {});
            run_commands(config, &api, vec![command]).await
        }
        Command::Generate {
            prompt,
            model,
            negative_prompt,
            steps,
            guidance,
            seed,
            width,
            height,
        } => {
            let mut commands = Vec::new();
            if let Some(model) = model {
                let params = LoadModelParams::new(model, DEFAULT_SCHEDULER);
                commands.push(ClientCommand::LoadModel(params));
            }
            commands.push(ClientCommand::GenerateImage(GenerateParams {
                prompt,
                negative_prompt,
                steps,
                guidance,
                seed,
                width,
                height,
            }));
            run_commands(config, &api, commands).await
        }
        Command::Watch => watch(config, &api).await,
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

/// Fetch and print the service inventory.
async fn show_config(api: &ApiClient) -> Result<()> {
    let config = api
        .service_config()
        .await
        .context("failed to fetch /api/config")?;
    println!("models ({}):", config.models.len());
    for model in &config.models {
        println!("  {model}");
    }
    println!("schedulers ({}):", config.schedulers.len());
    for scheduler in &config.schedulers {
        println!("  {scheduler}");
    }
    println!("gallery ({} images):", config.gallery_images.len());
    for image in &config.gallery_images {
        println!("  {}", api.output_url(image));
    }
    Ok(())
}

/// Open a session and run `commands` in order, each to its terminal event.
async fn run_commands(
    config: ClientConfig,
    api: &ApiClient,
    commands: Vec<ClientCommand>,
) -> Result<()> {
    let server = config.server_url.clone();
    let handle = SessionHandle::spawn(config)?;
    handle
        .wait_until_connected()
        .await
        .with_context(|| format!("could not reach {server}"))?;

    let mut events = handle.subscribe();
    let mut outcome = Ok(());
    for command in commands {
        let action = command.action();
        if let Err(err) = handle.submit(command).await {
            outcome = Err(err).with_context(|| format!("could not send `{action}`"));
            break;
        }
        if let Err(err) = follow(&mut events, api).await {
            outcome = Err(err);
            break;
        }
    }
    handle.close().await;
    outcome
}

/// Print progress until the in-flight operation reaches a terminal event.
async fn follow(events: &mut broadcast::Receiver<SessionEvent>, api: &ApiClient) -> Result<()> {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "notification stream lagged");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => {
                bail!("session ended before the operation finished")
            }
        };
        match event {
            SessionEvent::Progress(tick) => {
                eprintln!("{:>3.0}% {}", tick.progress * 100.0, tick.description);
            }
            SessionEvent::ModelLoaded(done) => {
                println!("{}", done.status_message);
                return Ok(());
            }
            SessionEvent::ModelUnloaded(done) => {
                println!("{}", done.status_message);
                return Ok(());
            }
            SessionEvent::GenerationComplete(done) => {
                println!("{}", done.info);
                println!("{}", api.fresh_output_url(&done.image_filename));
                return Ok(());
            }
            SessionEvent::ServerError(fail) => bail!("service error: {}", fail.message),
            SessionEvent::OperationTimedOut { kind } => {
                bail!("`{kind}` produced no traffic for too long, giving up")
            }
            SessionEvent::ReconnectsExhausted { attempts } => {
                bail!("service unreachable after {attempts} consecutive failed dials")
            }
            SessionEvent::Disconnected => eprintln!("link lost, redialing"),
            _ => {}
        }
    }
}

/// Follow the service until ctrl-c.
async fn watch(config: ClientConfig, api: &ApiClient) -> Result<()> {
    eprintln!("watching {} (ctrl-c to stop)", config.server_url);
    let handle = SessionHandle::spawn(config)?;
    let mut events = handle.subscribe();
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for ctrl-c")?;
                break;
            }
            event = events.recv() => match event {
                Ok(event) => print_event(api, &event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    eprintln!("(skipped {missed} notifications)");
                }
                Err(broadcast::error::RecvError::Closed) => bail!("session ended"),
            },
        }
    }
    handle.close().await;
    Ok(())
}

fn print_event(api: &ApiClient, event: &SessionEvent) {
    match event {
        SessionEvent::Connected => println!("connected"),
        SessionEvent::Disconnected => println!("disconnected"),
        SessionEvent::Reconnecting { attempt } => println!("redialing (attempt {attempt})"),
        SessionEvent::ReconnectsExhausted { attempts } => {
            println!("gave up after {attempts} consecutive failed dials");
        }
        SessionEvent::ModelLoaded(done) => println!("{}", done.status_message),
        SessionEvent::ModelUnloaded(done) => println!("{}", done.status_message),
        SessionEvent::GenerationComplete(done) => {
            println!("{} {}", done.info, api.fresh_output_url(&done.image_filename));
        }
        SessionEvent::Progress(tick) => {
            println!("{:>3.0}% {}", tick.progress * 100.0, tick.description);
        }
        SessionEvent::GalleryUpdated(gallery) => {
            println!("gallery updated ({} images)", gallery.images.len());
        }
        SessionEvent::ServerError(fail) => println!("service error: {}", fail.message),
        SessionEvent::DecodeFailed { detail } => println!("bad frame: {detail}"),
        SessionEvent::UnknownKind { kind } => println!("unknown message type: {kind}"),
        SessionEvent::OperationTimedOut { kind } => println!("`{kind}` timed out"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn cli_default_server() {
        let cli = Cli::parse_from(["arttic", "config"]);
        assert_eq!(cli.server, "http://127.0.0.1:8000");
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn cli_server_after_subcommand() {
        let cli = Cli::parse_from(["arttic", "config", "--server", "http://10.0.0.5:8000"]);
        assert_eq!(cli.server, "http://10.0.0.5:8000");
    }

    #[test]
    fn cli_session_knob_defaults() {
        let cli = Cli::parse_from(["arttic", "unload"]);
        assert_eq!(cli.reconnect_delay_ms, DEFAULT_RECONNECT_DELAY_MS);
        assert_eq!(cli.max_reconnects, None);
        assert_eq!(cli.op_timeout_secs, 0);
        let config = cli.session_config();
        assert_eq!(config.operation_timeout_ms, None);
        assert_eq!(config.reconnect.max_attempts, None);
    }

    #[test]
    fn cli_session_knobs_flow_into_config() {
        let cli = Cli::parse_from([
            "arttic",
            "watch",
            "--reconnect-delay-ms",
            "50",
            "--max-reconnects",
            "3",
            "--op-timeout-secs",
            "120",
        ]);
        let config = cli.session_config();
        assert_eq!(config.reconnect.delay_ms, 50);
        assert_eq!(config.reconnect.max_attempts, Some(3));
        assert_eq!(config.operation_timeout_ms, Some(120_000));
    }

    #[test]
    fn load_defaults_to_euler_a() {
        let cli = Cli::parse_from(["arttic", "load", "dreamshaper-8"]);
        match cli.command {
            Command::Load {
                model,
                scheduler,
                vae_tiling,
                cpu_offload,
            } => {
                assert_eq!(model, "dreamshaper-8");
                assert_eq!(scheduler, "Euler A");
                assert!(!vae_tiling);
                assert!(!cpu_offload);
            }
            other => panic!("parsed {other:?}"),
        }
    }

    #[test]
    fn load_flags() {
        let cli = Cli::parse_from([
            "arttic",
            "load",
            "sdxl-base",
            "--scheduler",
            "DPM++ 2M",
            "--vae-tiling",
            "--cpu-offload",
        ]);
        match cli.command {
            Command::Load {
                scheduler,
                vae_tiling,
                cpu_offload,
                ..
            } => {
                assert_eq!(scheduler, "DPM++ 2M");
                assert!(vae_tiling);
                assert!(cpu_offload);
            }
            other => panic!("parsed {other:?}"),
        }
    }

    #[test]
    fn generate_defaults() {
        let cli = Cli::parse_from(["arttic", "generate", "a lighthouse at dusk"]);
        match cli.command {
            Command::Generate {
                prompt,
                model,
                negative_prompt,
                steps,
                guidance,
                seed,
                width,
                height,
            } => {
                assert_eq!(prompt, "a lighthouse at dusk");
                assert_eq!(model, None);
                assert_eq!(negative_prompt, "");
                assert_eq!(steps, 20);
                assert!((guidance - 7.5).abs() < f64::EPSILON);
                assert_eq!(seed, None);
                assert_eq!(width, 512);
                assert_eq!(height, 512);
            }
            other => panic!("parsed {other:?}"),
        }
    }

    #[test]
    fn generate_with_model_and_seed() {
        let cli = Cli::parse_from([
            "arttic",
            "generate",
            "x",
            "--model",
            "dreamshaper-8",
            "--seed",
            "42",
            "--steps",
            "30",
        ]);
        match cli.command {
            Command::Generate {
                model, seed, steps, ..
            } => {
                assert_eq!(model.as_deref(), Some("dreamshaper-8"));
                assert_eq!(seed, Some(42));
                assert_eq!(steps, 30);
            }
            other => panic!("parsed {other:?}"),
        }
    }
}
