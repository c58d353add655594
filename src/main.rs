use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use assistant_chat::app::{ChatContext, ChatSession, SubmitOutcome};
use assistant_chat::commands::{parse_slash_command, SlashCommand, HELP_TEXT};
use assistant_chat::config::{BackendKind, ChatConfig, Variant};
use assistant_chat::credentials::resolve_credentials;
use assistant_chat::error::StartupError;
use assistant_chat::logging::init_tracing;
use assistant_chat::nutrition::NutritionClient;
use assistant_chat::providers::{backend_for, MOCK_ASSISTANT_ID};
use assistant_chat::runtime::TurnSettings;
use assistant_directory::{resolve_directory_path, AssistantDirectory};
use assistant_provider::CancelSignal;
use assistants_api::DeviceCodePrompt;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::info;

const PROMPT: &str = "you> ";

enum LoopControl {
    Continue,
    Exit,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    init_tracing();

    let context = match build_context().await {
        Ok(context) => Arc::new(context),
        Err(error) => {
            eprintln!("error: {error}");
            return ExitCode::FAILURE;
        }
    };

    match run_repl(context).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: failed to read input: {error}");
            ExitCode::FAILURE
        }
    }
}

async fn build_context() -> Result<ChatContext, StartupError> {
    let config = ChatConfig::from_env()?;

    let (backend, assistant_id) = match config.backend {
        BackendKind::Mock => {
            let assistant_id = match config.variant {
                Variant::Directory => None,
                Variant::Single | Variant::Tools => Some(
                    config
                        .assistant_id
                        .clone()
                        .unwrap_or_else(|| MOCK_ASSISTANT_ID.to_string()),
                ),
            };
            (backend_for(BackendKind::Mock, None)?, assistant_id)
        }
        BackendKind::Api => {
            let credentials = resolve_credentials(&config, print_device_code).await?;
            let backend = backend_for(BackendKind::Api, Some(&credentials))?;
            (backend, credentials.assistant_id)
        }
    };

    let profile = backend.profile();
    info!(
        provider = %profile.provider_id,
        endpoint = %profile.endpoint,
        variant = config.variant.as_str(),
        "backend ready"
    );

    let directory = if config.variant == Variant::Directory {
        let cwd = std::env::current_dir().map_err(|error| {
            StartupError::configuration(format!("failed to read working directory: {error}"))
        })?;
        let path = resolve_directory_path(&cwd, config.directory_path.to_str());
        AssistantDirectory::load(&path)
    } else {
        AssistantDirectory::default()
    };

    let settings = TurnSettings {
        poll_interval: config.poll_interval,
        run_timeout: config.run_timeout,
    };
    Ok(ChatContext::new(config.variant, backend, settings)
        .with_assistant_id(assistant_id)
        .with_directory(directory)
        .with_nutrition(NutritionClient::new(config.rapidapi_key.clone())))
}

fn print_device_code(prompt: &DeviceCodePrompt) {
    eprintln!("{}", prompt.message);
}

async fn run_repl(context: Arc<ChatContext>) -> Result<(), ReadlineError> {
    let mut editor = DefaultEditor::new()?;
    let mut session = ChatSession::new(context);

    println!("Type a message, or /help for commands.");
    if session.context().variant() == Variant::Directory {
        print_assistants(&session);
    }

    loop {
        let readline = tokio::task::block_in_place(|| editor.readline(PROMPT));
        let line = match readline {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(error) => return Err(error),
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(input);

        if let Some(command) = parse_slash_command(input) {
            match handle_command(&mut session, command) {
                LoopControl::Continue => continue,
                LoopControl::Exit => break,
            }
        }

        submit_turn(&mut session, input).await;
    }

    Ok(())
}

/// Runs one turn; Ctrl-C raises the cancel flag and the turn unwinds on its own.
async fn submit_turn(session: &mut ChatSession, input: &str) {
    let cancel: CancelSignal = Arc::new(AtomicBool::new(false));
    let turn = session.submit(input, &cancel);
    tokio::pin!(turn);

    let outcome = tokio::select! {
        outcome = &mut turn => outcome,
        _ = tokio::signal::ctrl_c() => {
            cancel.store(true, Ordering::Release);
            turn.await
        }
    };

    match outcome {
        SubmitOutcome::Replied(entry) => println!("{}", entry.reply),
        SubmitOutcome::Cancelled => eprintln!("Turn cancelled."),
    }
}

fn handle_command(session: &mut ChatSession, command: SlashCommand) -> LoopControl {
    match command {
        SlashCommand::Help => println!("{HELP_TEXT}"),
        SlashCommand::Clear => {
            session.clear();
            println!("Started a new conversation.");
        }
        SlashCommand::Export => match session.export() {
            Ok(path) => println!("Transcript written to {}", path.display()),
            Err(error) => eprintln!("error: failed to export transcript: {error}"),
        },
        SlashCommand::Assistants => print_assistants(session),
        SlashCommand::Assistant(Some(name)) => match session.select_assistant(&name) {
            Ok(()) => println!("Selected assistant '{}'.", name.trim()),
            Err(message) => eprintln!("{message}"),
        },
        SlashCommand::Assistant(None) => match session.selected_assistant() {
            Some(name) => println!("Current assistant: {name}"),
            None => println!("No assistant selected. Use /assistant <name>."),
        },
        SlashCommand::Tools => match session.context().tools() {
            Some(tools) => {
                for definition in tools.definitions() {
                    let description = definition.description.unwrap_or_default();
                    println!("{}  {description}", definition.name);
                }
            }
            None => println!(
                "No tools in the {} variant.",
                session.context().variant().as_str()
            ),
        },
        SlashCommand::Quit => return LoopControl::Exit,
        SlashCommand::Unknown(command) => {
            eprintln!("Unknown command {command}. Type /help for commands.");
        }
    }
    LoopControl::Continue
}

fn print_assistants(session: &ChatSession) {
    let directory = session.context().directory();
    if directory.is_empty() {
        println!("No assistants loaded.");
        return;
    }
    println!("Assistants:");
    for name in directory.names() {
        println!("  {name}");
    }
    println!("Select one with /assistant <name>.");
}
