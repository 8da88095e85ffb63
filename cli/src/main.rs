// pixelworld — command-line front end for the peer session core
//
// Runs a local session against simulated peers and manages the settings a
// real session joins with.

mod config;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::*;
use pixelworld_core::media::{RecordingAudioOutput, SyntheticDevices};
use pixelworld_core::{MediaCapabilities, MediaPhase, MemoryHub, PeerId, PeerSession, SessionConfig};
use std::sync::Arc;
use std::time::Duration;

const BOT_NAMES: [&str; 5] = ["Bob", "Carol", "Dave", "Erin", "Frank"];

#[derive(Parser)]
#[command(name = "pixelworld")]
#[command(about = "PixelWorld — peer session coordinator", long_about = None)]
#[command(version)]
struct Cli {
    /// Log at info level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a local session with simulated peers
    Demo(DemoArgs),
    /// Configure settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args)]
struct DemoArgs {
    /// Number of simulated peers (defaults to the configured value)
    #[arg(short, long)]
    bots: Option<usize>,
    /// Local display name (defaults to the configured or a generated one)
    #[arg(short, long)]
    name: Option<String>,
    /// Chat line to send once everyone is in
    #[arg(short, long, default_value = "Hello, world!")]
    message: String,
    /// Enable voice on every peer
    #[arg(long)]
    voice: bool,
    /// Enable video on every peer
    #[arg(long)]
    video: bool,
    /// Refuse microphone access locally
    #[arg(long)]
    deny_microphone: bool,
    /// Refuse camera access locally
    #[arg(long)]
    deny_camera: bool,
}

#[derive(Subcommand)]
enum ConfigAction {
    Set { key: String, value: String },
    Get { key: String },
    List,
    /// Print the config file location
    Path,
}

fn init_logging(verbose: bool, json: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    match cli.command {
        Commands::Demo(args) => cmd_demo(args).await,
        Commands::Config { action } => cmd_config(action),
    }
}

fn cmd_config(action: ConfigAction) -> Result<()> {
    let mut config = config::Config::load()?;

    match action {
        ConfigAction::Set { key, value } => {
            config.set(&key, &value)?;
            config.save()?;
            println!("{} {} = {}", "✓".green(), key.bright_yellow(), value);
        }
        ConfigAction::Get { key } => match config.get(&key) {
            Some(value) => println!("{}", value),
            None => println!("{} {} is not set", "✗".red(), key),
        },
        ConfigAction::List => {
            println!("{}", "Configuration".bold());
            println!();
            for (key, value) in config.list() {
                println!("  {:<20} {}", key.bright_yellow(), value);
            }
        }
        ConfigAction::Path => {
            println!("{}", config::Config::config_file()?.display());
        }
    }

    Ok(())
}

fn bot_name(index: usize) -> String {
    let base = BOT_NAMES[index % BOT_NAMES.len()];
    match index / BOT_NAMES.len() {
        0 => base.to_string(),
        round => format!("{} {}", base, round + 1),
    }
}

async fn cmd_demo(args: DemoArgs) -> Result<()> {
    let config = config::Config::load()?;
    let mut session_config = config.session.clone();
    if let Some(name) = args.name {
        session_config.display_name = Some(name);
    }
    session_config.validate().context("Invalid session config")?;
    let bots = args.bots.unwrap_or(config.demo.bots);
    let settle = Duration::from_millis(config.demo.settle_ms);

    let hub = MemoryHub::new();
    let audio = RecordingAudioOutput::new();
    let caps = MediaCapabilities::new(
        Arc::new(SyntheticDevices::denying(args.deny_microphone, args.deny_camera)),
        Arc::new(audio.clone()),
    );
    let (session, events) = PeerSession::join(session_config.clone(), &hub.connector(PeerId::random()), caps)
        .await
        .context("Failed to join session")?;
    let runner = tokio::spawn({
        let session = session.clone();
        async move { session.run(events).await }
    });

    println!(
        "{} Joined {}/{} as {} ({})",
        "✓".green(),
        session_config.app_id,
        session_config.room.bright_cyan(),
        session.display_name().bold(),
        session.self_id().short()
    );

    let mut peers = Vec::with_capacity(bots);
    for index in 0..bots {
        let bot_config = SessionConfig {
            display_name: Some(bot_name(index)),
            ..session_config.clone()
        };
        let (bot, bot_events) = PeerSession::join(bot_config, &hub.connector(PeerId::random()), MediaCapabilities::synthetic())
            .await
            .context("Failed to join simulated peer")?;
        let handle = tokio::spawn({
            let bot = bot.clone();
            async move { bot.run(bot_events).await }
        });
        peers.push((bot, handle));
    }
    tokio::time::sleep(settle).await;

    let everyone = std::iter::once(&session).chain(peers.iter().map(|(bot, _)| bot));
    for (index, member) in everyone.enumerate() {
        let local = index == 0;
        if args.voice {
            report_media(local, "Voice", &member.display_name(), member.enable_voice().await);
        }
        if args.video {
            report_media(local, "Video", &member.display_name(), member.enable_video().await);
        }
    }

    session.send_chat(&args.message).await.context("Chat failed")?;
    futures::future::join_all(peers.iter().map(|(bot, _)| async move {
        let line = format!("hi, I'm {}", bot.display_name());
        if let Err(e) = bot.send_chat(&line).await {
            tracing::warn!("{} could not chat: {}", bot.display_name(), e);
        }
    }))
    .await;
    tokio::time::sleep(settle).await;

    print_roster(&session);
    print_chat(&session);
    print_media(&session, &audio);

    if let Some((bot, handle)) = peers.pop() {
        let name = bot.display_name();
        bot.leave().await;
        let _ = handle.await;
        tokio::time::sleep(settle).await;
        println!();
        println!("{} {} left", "←".yellow(), name);
        print_roster(&session);
        print_media(&session, &audio);
    }

    for (bot, handle) in peers {
        bot.leave().await;
        let _ = handle.await;
    }
    session.leave().await;
    let _ = runner.await;
    println!();
    println!("{}", "Session closed".dimmed());

    Ok(())
}

fn report_media(local: bool, medium: &str, who: &str, result: Result<(), pixelworld_core::SessionError>) {
    if !local {
        if let Err(e) = result {
            tracing::warn!("{} could not enable {}: {}", who, medium, e);
        }
        return;
    }
    match result {
        Ok(()) => println!("{} {} enabled", "✓".green(), medium),
        Err(e) => println!("{} {}", "✗".red(), e),
    }
}

fn print_roster(session: &PeerSession) {
    let roster = session.roster();
    println!();
    println!("{} ({})", "Posse".bold(), roster.len());
    for entry in roster.iter() {
        let marker = if entry.is_self { "*".green() } else { " ".normal() };
        println!("  {} {:<12} {}", marker, entry.name, entry.id.short().dimmed());
    }
}

fn print_chat(session: &PeerSession) {
    println!();
    println!("{}", "Chat".bold());
    for line in session.chat_history() {
        println!(
            "  {} {}: {}",
            format_timestamp(line.timestamp).dimmed(),
            line.sender_name.bright_cyan(),
            line.text
        );
    }
}

fn print_media(session: &PeerSession, audio: &RecordingAudioOutput) {
    let voice = session.voice_state();
    let video = session.video_state();
    println!();
    println!("{}", "Media".bold());
    println!(
        "  voice {}  mic {}  speakers {}",
        phase_label(voice.phase),
        if voice.microphone_muted { "muted" } else { "live" },
        if voice.incoming_audio_enabled { "on" } else { "off" }
    );
    println!("  video {}", phase_label(video.phase));

    for peer in session.audio_peers() {
        let muted = audio.sink_for(&peer).map_or(true, |sink| sink.muted);
        println!(
            "    {} hearing {}{}",
            "♪".cyan(),
            session.resolve_name(&peer),
            if muted { " (muted)" } else { "" }
        );
    }
    for (peer, stream) in session.video_streams().iter() {
        println!(
            "    {} tile {} ({} tracks)",
            "▣".cyan(),
            session.resolve_name(peer),
            stream.tracks().len()
        );
    }
}

fn phase_label(phase: MediaPhase) -> ColoredString {
    match phase {
        MediaPhase::Enabled => phase.to_string().green(),
        MediaPhase::Enabling => phase.to_string().yellow(),
        MediaPhase::Disabled => phase.to_string().dimmed(),
    }
}

fn format_timestamp(timestamp_ms: u64) -> String {
    use chrono::{DateTime, Local, Utc};

    let dt = DateTime::from_timestamp_millis(timestamp_ms as i64).unwrap_or_else(Utc::now);
    let local: DateTime<Local> = dt.into();

    local.format("%H:%M:%S").to_string()
}
