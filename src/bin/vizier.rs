use clap::Parser;
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use spinners::{Spinner, Spinners};
use std::io::{self, IsTerminal, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use vizier::api::Server;
use vizier::chat::{ChatMessage, ChatProvider, ChatRole};
use vizier::config::{Overrides, Settings};
use vizier::document::Upload;
use vizier::relay::{submit_turn, RenderSurface, Submission};
use vizier::secret_store::SecretStore;
use vizier::session::{MemorySessionStore, Session, SessionStore, DEFAULT_SESSION_KEY};

/// Command line arguments for the Vizier CLI
#[derive(Parser)]
#[clap(
    name = "vizier",
    about = "Ask an LLM questions about your documents, in the terminal or the browser",
    allow_hyphen_values = true
)]
struct CliArgs {
    /// Command to execute (chat, serve, set, get, delete, default)
    #[arg(index = 1)]
    command: Option<String>,

    /// Secret key for set/get/delete, model for default, or a one-shot question for chat
    #[arg(index = 2)]
    key_or_prompt: Option<String>,

    /// Secret value for the set command
    #[arg(index = 3)]
    value: Option<String>,

    /// Model name to use
    #[arg(long)]
    model: Option<String>,

    /// System instruction the session is seeded with
    #[arg(long)]
    system: Option<String>,

    /// API key for the completion service
    #[arg(long)]
    api_key: Option<String>,

    /// Base URL for the API
    #[arg(long)]
    base_url: Option<String>,

    /// Temperature setting (0.0-1.0)
    #[arg(long)]
    temperature: Option<f32>,

    /// Maximum tokens in the response
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Document (.txt or .pdf) to attach to every question
    #[arg(long, short)]
    document: Option<PathBuf>,

    /// Address the serve command listens on
    #[arg(long, default_value = "127.0.0.1:8501")]
    addr: String,
}

impl CliArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            base_url: self.base_url.clone(),
            system: self.system.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            timeout_seconds: self.timeout,
        }
    }
}

/// Prints the reply as it streams, behind a spinner until the first fragment.
struct TerminalSurface {
    decorated: bool,
    spinner: Option<Spinner>,
    streaming: bool,
}

impl TerminalSurface {
    fn new(decorated: bool) -> Self {
        Self {
            decorated,
            spinner: None,
            streaming: false,
        }
    }

    fn stop_spinner(&mut self) {
        if let Some(mut sp) = self.spinner.take() {
            sp.stop();
            print!("\r\x1B[K");
        }
    }
}

impl RenderSurface for TerminalSurface {
    fn render_message(&mut self, _role: ChatRole, _content: &str) {
        // The question is already on screen where it was typed
        self.streaming = false;
        if self.decorated {
            self.spinner = Some(Spinner::new(
                Spinners::Dots12,
                "Thinking...".bright_magenta().to_string(),
            ));
        }
    }

    fn render_fragment(&mut self, fragment: &str) {
        if !self.streaming {
            self.stop_spinner();
            if self.decorated {
                print!("{} ", "> Assistant:".bright_green());
            }
            self.streaming = true;
        }
        print!("{fragment}");
        let _ = io::stdout().flush();
    }

    fn finish_reply(&mut self, _reply: &ChatMessage) {
        self.stop_spinner();
        println!();
        if self.decorated {
            println!("{}", "─".repeat(50).bright_black());
        }
    }
}

fn print_transcript(session: &Session) {
    for message in session.visible() {
        let label = match message.role {
            ChatRole::User => "> You:".bright_blue(),
            _ => "> Assistant:".bright_green(),
        };
        println!("{} {}", label, message.content);
    }
}

/// Keeps an upload only if it decodes, telling the user why otherwise.
fn usable(upload: Upload) -> Option<Upload> {
    match upload.try_decode() {
        Ok(_) => Some(upload),
        Err(e) => {
            eprintln!(
                "{} {} will be ignored: {}",
                "!".bright_yellow(),
                upload.name.as_deref().unwrap_or("document"),
                e
            );
            None
        }
    }
}

/// Works out the one-shot question from the positional arguments.
///
/// A lone positional that is not a known command is taken as the question.
fn prompt_from(command: Option<&str>, rest: Option<&str>) -> Option<String> {
    match command {
        Some("chat") | Some("serve") | None => rest.map(str::to_owned),
        Some(other) => {
            log::debug!("'{other}' is not a command, sending it as a question");
            Some(other.to_owned())
        }
    }
}

/// Runs a single question and exits.
async fn one_shot(
    provider: &dyn ChatProvider,
    session: &mut Session,
    prompt: Option<String>,
    upload: Option<Upload>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut upload = upload;
    let question = match prompt {
        Some(p) => {
            if !io::stdin().is_terminal() && upload.is_none() {
                let mut input = Vec::new();
                io::stdin().read_to_end(&mut input)?;
                if !input.is_empty() {
                    upload = Some(Upload::new(None, input));
                }
            }
            p
        }
        None => {
            let mut input = String::new();
            io::stdin().read_to_string(&mut input)?;
            input
        }
    };

    let submission = Submission::new(question).with_upload(upload.as_ref());
    let mut surface = TerminalSurface::new(false);
    submit_turn(session, provider, submission, &mut surface).await?;
    Ok(())
}

/// Interactive chat loop.
async fn interactive(
    provider: &dyn ChatProvider,
    session: &mut Session,
    upload: Option<Upload>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut upload = upload;

    println!("{}", "💬 Vizier".bright_cyan());
    println!(
        "{}",
        "Ask questions, optionally about a document. /upload <path> attaches one, /detach removes it, /history shows the transcript, 'exit' quits."
            .bright_black()
    );
    if let Some(u) = &upload {
        println!("Attached: {}", u.name.as_deref().unwrap_or("document").bright_green());
    }
    println!("{}", "─".repeat(50).bright_black());
    print_transcript(session);

    let mut rl = DefaultEditor::new()?;

    loop {
        io::stdout().flush()?;
        let readline = rl.readline("> ");
        match readline {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                if trimmed.eq_ignore_ascii_case("exit") || trimmed.eq_ignore_ascii_case("quit") {
                    println!("{}", "👋 Goodbye!".bright_cyan());
                    break;
                }
                let _ = rl.add_history_entry(trimmed);

                if let Some(path) = trimmed.strip_prefix("/upload ") {
                    match Upload::from_path(path.trim()) {
                        Ok(u) => {
                            if let Some(u) = usable(u) {
                                println!(
                                    "{} Attached {}",
                                    "✓".bright_green(),
                                    u.name.as_deref().unwrap_or(path)
                                );
                                upload = Some(u);
                            }
                        }
                        Err(e) => eprintln!("{} {}", "Error:".bright_red(), e),
                    }
                    continue;
                }
                if trimmed == "/detach" {
                    upload = None;
                    println!("{} Document detached", "✓".bright_green());
                    continue;
                }
                if trimmed == "/history" {
                    print_transcript(session);
                    continue;
                }

                let submission = Submission::new(trimmed).with_upload(upload.as_ref());
                let mut surface = TerminalSurface::new(true);
                if let Err(e) = submit_turn(session, provider, submission, &mut surface).await {
                    surface.stop_spinner();
                    println!();
                    eprintln!("{} {}", "Error:".bright_red(), e);
                    println!("{}", "─".repeat(50).bright_black());
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("\n{}", "👋 Goodbye!".bright_cyan());
                break;
            }
            Err(err) => {
                eprintln!("{} {:?}", "Error:".bright_red(), err);
                break;
            }
        }
    }

    Ok(())
}

/// Main entry point for the Vizier CLI
///
/// Handles secret management commands, the HTTP server, and chat in either
/// interactive or one-shot mode.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    vizier::init_logging();
    let args = CliArgs::parse();

    match args.command.as_deref() {
        Some("set") => {
            if let (Some(key), Some(value)) = (args.key_or_prompt.as_deref(), args.value.as_deref())
            {
                let mut store = SecretStore::new()?;
                store.set(key, value)?;
                println!("{} Secret '{}' has been set.", "✓".bright_green(), key);
                return Ok(());
            }
            eprintln!("{} Usage: vizier set <key> <value>", "Error:".bright_red());
            return Ok(());
        }
        Some("get") => {
            if let Some(key) = args.key_or_prompt.as_deref() {
                let store = SecretStore::new()?;
                match store.get(key) {
                    Some(value) => println!("{}: {}", key, value),
                    None => println!("{} Secret '{}' not found", "!".bright_yellow(), key),
                }
                return Ok(());
            }
            eprintln!("{} Usage: vizier get <key>", "Error:".bright_red());
            return Ok(());
        }
        Some("delete") => {
            if let Some(key) = args.key_or_prompt.as_deref() {
                let mut store = SecretStore::new()?;
                store.delete(key)?;
                println!("{} Secret '{}' has been deleted.", "✓".bright_green(), key);
                return Ok(());
            }
            eprintln!("{} Usage: vizier delete <key>", "Error:".bright_red());
            return Ok(());
        }
        Some("default") => {
            let mut store = SecretStore::new()?;
            match args.key_or_prompt.as_deref() {
                Some(model) => {
                    store.set_default_model(model)?;
                    println!("{} Default model set to {}", "✓".bright_green(), model);
                }
                None => match store.get_default_model() {
                    Some(model) => println!("Default model: {}", model),
                    None => println!("{} No default model set", "!".bright_yellow()),
                },
            }
            return Ok(());
        }
        Some("serve") | Some("chat") | None => {}
        Some(other) if args.key_or_prompt.is_some() => {
            return Err(format!(
                "Unknown command '{other}'. Expected chat, serve, set, get, delete or default"
            )
            .into())
        }
        // A lone positional that is not a command is a one-shot question
        Some(_) => {}
    }
    let prompt = prompt_from(args.command.as_deref(), args.key_or_prompt.as_deref());

    let store = match SecretStore::new() {
        Ok(store) => Some(store),
        Err(e) => {
            log::warn!("secret store unavailable: {e}");
            None
        }
    };
    let settings = Settings::resolve(args.overrides(), store.as_ref())?;
    let provider: Arc<dyn ChatProvider> = Arc::from(settings.provider()?);
    let sessions = Arc::new(MemorySessionStore::new(settings.system_prompt.clone()));

    if args.command.as_deref() == Some("serve") {
        return Ok(Server::new(provider, sessions).run(&args.addr).await?);
    }

    let upload = args
        .document
        .as_ref()
        .map(Upload::from_path)
        .transpose()?
        .and_then(usable);
    let session = sessions.get_or_init(DEFAULT_SESSION_KEY).await;
    let mut session = session.lock().await;

    if prompt.is_some() || !io::stdin().is_terminal() {
        one_shot(provider.as_ref(), &mut session, prompt, upload).await
    } else {
        interactive(provider.as_ref(), &mut session, upload).await
    }
}
