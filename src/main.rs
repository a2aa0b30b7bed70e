//! Agora - narrative role-play session engine
//!
//! Main entry point for the Agora CLI.

use anyhow::Result;
use colored::Colorize;
use futures::StreamExt;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::Write;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use agora::agents::LlmAgentFactory;
use agora::cli::{Cli, Commands};
use agora::config::Config;
use agora::director::GameEvent;
use agora::engine::GameEngine;
use agora::persistence::SledStore;
use agora::providers::DeepSeekProvider;
use agora::scenario::LlmScenarioGenerator;
use agora::state::PLAYER_AUTHOR;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.verbose);

    let mut config = Config::load(&cli.config)?;
    config.validate()?;

    match cli.command {
        Commands::Play {
            theme,
            resume,
            max_turns,
        } => {
            if let Some(max_turns) = max_turns {
                config.engine.max_turns = max_turns;
            }
            let engine = build_engine(&config)?;
            run_play(&engine, theme.as_deref(), resume.as_deref(), &cli.user).await
        }
        Commands::List => {
            let engine = build_engine(&config)?;
            run_list(&engine, &cli.user)
        }
    }
}

fn build_engine(config: &Config) -> Result<GameEngine> {
    let store = SledStore::open(config.storage.games_db_path()?)?;
    let provider = Arc::new(DeepSeekProvider::new(&config.provider)?);
    let factory = Arc::new(LlmAgentFactory::new(provider.clone()));
    let generator = Arc::new(LlmScenarioGenerator::new(provider));
    Ok(GameEngine::new(
        Arc::new(store),
        factory,
        generator,
        config.engine.clone(),
    ))
}

async fn run_play(
    engine: &GameEngine,
    theme: Option<&str>,
    resume: Option<&str>,
    user: &str,
) -> Result<()> {
    let game_id = match resume {
        Some(game_id) => {
            if !engine.game_belongs_to_user(game_id, user)? {
                anyhow::bail!("game {game_id} does not belong to {user}");
            }
            let info = engine.resume_game(game_id)?;
            tracing::info!(
                "resumed game {game_id} (loaded_from_memory={})",
                info.loaded_from_memory
            );
            print_transcript(engine, game_id).await?;
            game_id.to_string()
        }
        None => {
            println!("{}", "Generating scenario...".dimmed());
            let (game_id, setup) = engine.create_game(theme, user).await?;
            println!("\n{}", setup.title.bold().cyan());
            if !setup.setting.is_empty() {
                println!("{}", setup.setting.dimmed());
            }
            if !setup.player_mission.is_empty() {
                println!("{} {}", "Your mission:".bold(), setup.player_mission);
            }
            if !setup.opening_narrative.is_empty() {
                println!("\n{}", setup.opening_narrative.italic());
            }
            print_transcript(engine, &game_id).await?;
            game_id
        }
    };
    println!("{}", "Type your message, or /exit to leave.".dimmed());

    let mut rl = DefaultEditor::new()?;
    loop {
        let line = match rl.readline(&format!("{} ", "You>".green().bold())) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => "/exit".to_string(),
            Err(e) => return Err(e.into()),
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(trimmed);
        let exit = trimmed == "/exit" || trimmed == "/quit";
        let text = if exit { "" } else { trimmed };

        let stream = engine.execute_turn_stream(&game_id, text, exit)?;
        let game_ended = print_event_stream(stream).await?;
        if game_ended || exit {
            break;
        }

        let status = engine.get_status(&game_id).await?;
        if status.turn_current >= status.turn_max {
            println!("{}", "Turn limit reached.".yellow());
            break;
        }
    }
    Ok(())
}

/// Prints the game's visible transcript, skipping already-streamed messages
async fn print_transcript(engine: &GameEngine, game_id: &str) -> Result<()> {
    let status = engine.get_status(game_id).await?;
    for message in &status.messages {
        if message.author == PLAYER_AUTHOR {
            println!("{} {}", "You>".green().bold(), message.content);
        } else {
            println!("{} {}", format!("{}>", message.author).cyan().bold(), message.content);
        }
    }
    Ok(())
}

/// Consumes a turn's event stream, printing as it goes
///
/// Returns true when the game ended during the turn.
async fn print_event_stream(
    stream: impl futures::Stream<Item = GameEvent> + Send,
) -> Result<bool> {
    futures::pin_mut!(stream);
    let mut game_ended = false;
    let mut streamed_chunks = false;
    while let Some(event) = stream.next().await {
        match event {
            GameEvent::MessageDelta { delta } => {
                streamed_chunks = true;
                print!("{delta}");
                std::io::stdout().flush()?;
            }
            GameEvent::Message { author, content, .. } => {
                if streamed_chunks {
                    // The text is already on screen; attribute it.
                    println!("\n  {}", format!("-- {author}").cyan());
                    streamed_chunks = false;
                } else {
                    println!("{} {}", format!("{author}>").cyan().bold(), content);
                }
            }
            GameEvent::Error { message } => {
                eprintln!("{} {}", "error:".red().bold(), message);
            }
            GameEvent::GameEnded { reason, mission_evaluation } => {
                game_ended = true;
                println!("\n{} {}", "Game over:".yellow().bold(), reason);
                if let Some(evaluation) = mission_evaluation {
                    if let Some(reasoning) = evaluation.get("reasoning").and_then(|v| v.as_str()) {
                        if !reasoning.is_empty() {
                            println!("{}", reasoning.dimmed());
                        }
                    }
                }
            }
        }
    }
    Ok(game_ended)
}

fn run_list(engine: &GameEngine, user: &str) -> Result<()> {
    let games = engine.list_games(user)?;
    if games.is_empty() {
        println!("No saved games for {user}.");
        return Ok(());
    }
    for game in games {
        let status = if game.status == "finished" {
            game.status.yellow()
        } else {
            game.status.green()
        };
        println!(
            "{}  {}  [{}]  updated {}",
            game.id.dimmed(),
            game.title.bold(),
            status,
            game.updated_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "agora=debug" } else { "agora=info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
