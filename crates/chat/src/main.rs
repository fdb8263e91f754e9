use std::path::PathBuf;

use parley::chat::{Message, Sender};
use parley::input::{ClipboardPayload, IntakeOutcome, PasteDisposition};
use parley::render;
use parley::settings::{SettingsError, SettingsStore};
use parley::{ChatSession, ClearPrompt};
use parley_llm::{Attachment, resolve_model};
use snafu::{ResultExt, Snafu};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;

const HELP: &str = "\
commands:
  /attach <path>      pick a file
  /drop <path>...     drop files (first one wins)
  /paste <path>       paste a file from the clipboard
  /detach             remove the pending attachment
  /suggest [n]        list suggestions or send suggestion n
  /clear              clear the conversation
  /mic                toggle dictation
  /key <api key>      save the API key
  /model <id>         save the model id
  /quit               exit
anything else is sent as a message";

#[derive(Debug, Snafu)]
enum CliError {
    #[snafu(display("failed to read input on `{stage}`: {source}"))]
    ReadInput {
        stage: &'static str,
        source: std::io::Error,
    },
    #[snafu(display("failed to write output on `{stage}`: {source}"))]
    WriteOutput {
        stage: &'static str,
        source: std::io::Error,
    },
}

enum Command {
    Send(String),
    Attach(PathBuf),
    Drop(Vec<PathBuf>),
    Paste(PathBuf),
    Detach,
    Suggest(Option<usize>),
    Clear,
    Mic,
    Key(String),
    Model(String),
    Help,
    Quit,
}

fn parse_command(line: &str) -> Option<Command> {
    let Some(rest) = line.strip_prefix('/') else {
        return Some(Command::Send(line.to_string()));
    };

    let mut words = rest.split_whitespace();
    let command = match words.next()? {
        "attach" => Command::Attach(PathBuf::from(words.next()?)),
        "drop" => Command::Drop(words.map(PathBuf::from).collect()),
        "paste" => Command::Paste(PathBuf::from(words.next()?)),
        "detach" => Command::Detach,
        "suggest" => Command::Suggest(words.next().and_then(|n| n.parse().ok())),
        "clear" => Command::Clear,
        "mic" => Command::Mic,
        "key" => Command::Key(words.next()?.to_string()),
        "model" => Command::Model(words.next()?.to_string()),
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ => return None,
    };
    Some(command)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn format_message(message: &Message) -> String {
    let body = render::parse(message.text()).plain_text();
    let media = match (message.image(), message.video()) {
        (Some(_), _) => " [image]",
        (_, Some(_)) => " [video]",
        _ => "",
    };
    match message.sender() {
        Sender::User => format!("you{media}> {body}"),
        Sender::Model => format!("model> {body}"),
        Sender::Error => format!("error> {body}"),
    }
}

struct Terminal {
    input: Lines<BufReader<Stdin>>,
    stdout: tokio::io::Stdout,
    printed: usize,
}

impl Terminal {
    async fn say(&mut self, text: &str) -> Result<(), CliError> {
        self.stdout
            .write_all(format!("{text}\n").as_bytes())
            .await
            .context(WriteOutputSnafu { stage: "write-line" })?;
        self.stdout
            .flush()
            .await
            .context(WriteOutputSnafu { stage: "flush" })
    }

    async fn read_line(&mut self) -> Result<Option<String>, CliError> {
        self.input
            .next_line()
            .await
            .context(ReadInputSnafu { stage: "read-line" })
    }

    /// Prints log entries added since the last call.
    async fn flush_transcript(&mut self, session: &ChatSession) -> Result<(), CliError> {
        let messages = session.orchestrator().messages();
        if messages.len() < self.printed {
            self.printed = 0;
        }
        for message in &messages[self.printed..] {
            self.say(&format_message(message)).await?;
        }
        self.printed = messages.len();
        Ok(())
    }
}

fn attachment_at(path: PathBuf) -> Option<Attachment> {
    if path.is_file() {
        Some(Attachment::from_path(&path))
    } else {
        None
    }
}

fn describe_intake(outcome: &IntakeOutcome) -> Option<String> {
    match outcome {
        IntakeOutcome::Installed(kind) => Some(format!("{} attached", kind.label())),
        IntakeOutcome::Rejected { .. } => None,
        IntakeOutcome::NoFile => Some("no file".to_string()),
    }
}

fn describe_save(store: &SettingsStore, saved: Result<(), SettingsError>) -> String {
    match saved {
        Ok(()) => format!("saved to {}, restart to apply", store.config_path().display()),
        Err(error) => format!("settings not saved: {error}"),
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    init_tracing();

    let store = SettingsStore::load();
    let settings = store.settings();
    let model = resolve_model(&settings.model);
    let mut session = ChatSession::from_settings(&settings, None);
    let mut terminal = Terminal {
        input: BufReader::new(tokio::io::stdin()).lines(),
        stdout: tokio::io::stdout(),
        printed: 0,
    };

    if let Some(error) = session.backend_error() {
        let error = error.to_string();
        terminal.say(&format!("backend unavailable: {error}")).await?;
    }
    let about = model.description.as_deref().unwrap_or("custom model");
    terminal
        .say(&format!("{} ({about}), type /help for commands", model.name))
        .await?;

    while let Some(line) = terminal.read_line().await? {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }

        let Some(command) = parse_command(line) else {
            terminal.say("unknown command, try /help").await?;
            continue;
        };

        match command {
            Command::Send(text) => {
                session.type_text(text);
                session.submit().await;
            }
            Command::Attach(path) => {
                let files = attachment_at(path).into_iter().collect();
                let outcome = session.pick_file(files);
                if let Some(note) = describe_intake(&outcome) {
                    terminal.say(&note).await?;
                }
            }
            Command::Drop(paths) => {
                session.drag_enter();
                let files = paths.into_iter().filter_map(attachment_at).collect();
                let outcome = session.drop_files(files);
                if let Some(note) = describe_intake(&outcome) {
                    terminal.say(&note).await?;
                }
            }
            Command::Paste(path) => {
                let payload = ClipboardPayload {
                    files: attachment_at(path).into_iter().collect(),
                    text: None,
                };
                match session.paste(payload) {
                    PasteDisposition::Intercepted(outcome) => {
                        if let Some(note) = describe_intake(&outcome) {
                            terminal.say(&note).await?;
                        }
                    }
                    PasteDisposition::PassThrough => {
                        terminal.say("nothing to paste").await?;
                    }
                }
            }
            Command::Detach => {
                let note = if session.remove_attachment() {
                    "attachment removed"
                } else {
                    "no attachment"
                };
                terminal.say(note).await?;
            }
            Command::Suggest(None) => {
                let listing = session
                    .suggestions()
                    .iter()
                    .enumerate()
                    .map(|(index, prompt)| format!("  {}. {}", index + 1, prompt.title))
                    .collect::<Vec<_>>();
                if listing.is_empty() {
                    terminal
                        .say("suggestions are only offered on an empty conversation")
                        .await?;
                } else {
                    terminal.say(&listing.join("\n")).await?;
                }
            }
            Command::Suggest(Some(number)) => {
                if session.pick_suggestion(number.saturating_sub(1)).await.is_none() {
                    terminal.say("no such suggestion").await?;
                }
            }
            Command::Clear => match session.request_clear() {
                ClearPrompt::NothingToClear => terminal.say("nothing to clear").await?,
                ClearPrompt::Blocked => terminal.say("a request is in flight").await?,
                ClearPrompt::Confirm { message_count } => {
                    terminal
                        .say(&format!("clear {message_count} messages? [y/N]"))
                        .await?;
                    let answer = terminal.read_line().await?.unwrap_or_default();
                    if answer.trim().eq_ignore_ascii_case("y") {
                        session.confirm_clear();
                        terminal.printed = 0;
                        terminal.say("conversation cleared").await?;
                    } else {
                        session.cancel_clear();
                    }
                }
            },
            Command::Mic => {
                session.toggle_dictation();
                if !session.is_dictation_supported() {
                    terminal.say("dictation is not supported in the terminal").await?;
                }
            }
            Command::Key(api_key) => {
                let saved = store.update_with(|settings| settings.api_key = api_key);
                let note = describe_save(&store, saved.map(|_| ()));
                terminal.say(&note).await?;
            }
            Command::Model(model_id) => {
                let saved = store.update_with(|settings| settings.model = model_id);
                let note = describe_save(&store, saved.map(|_| ()));
                terminal.say(&note).await?;
            }
            Command::Help => terminal.say(HELP).await?,
            Command::Quit => break,
        }

        terminal.flush_transcript(&session).await?;
    }

    session.shutdown();
    Ok(())
}
