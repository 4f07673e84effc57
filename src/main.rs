use clap::{Args, Parser, Subcommand};
use demo_typer::{
    config::{FileSettingsStore, Settings, SettingsStore},
    demo_page::{DemoPage, DemoTarget},
    emitter::{EmitOutcome, EmitReport},
    logging,
    messages::{Command, TypePayload},
    router::MessageRouter,
    runtime::{FnSleeper, Sleeper, ThreadSleeper},
    session::TypingController,
    shortcuts::Shortcut,
};
use itertools::Itertools;
use std::{error::Error, path::PathBuf, sync::Arc, time::Duration};

const PREVIEW_CHARS: usize = 40;

/// human-like typing into editable page elements, for demos and presentations
#[derive(Parser, Debug)]
#[clap(
    version,
    about,
    long_about = "Types text character by character with human-like pacing and optional typos into a demo page: native fields, contenteditable elements and editors nested in shadow DOM."
)]
pub struct Cli {
    /// settings file to use instead of the platform config dir
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// type text into the demo page
    Type {
        /// text to type; `\n` starts a new line
        text: String,

        #[clap(flatten)]
        run: RunArgs,

        /// characters per second (defaults to the saved speed)
        #[clap(long)]
        cps: Option<f64>,

        /// inject and correct typos
        #[clap(long)]
        mistakes: bool,

        /// typo probability in percent
        #[clap(long)]
        mistake_rate: Option<f64>,

        /// leave the caret after the typed text instead of restoring it
        #[clap(long)]
        no_restore: bool,

        /// type via keyboard events when no editable element is found
        #[clap(long)]
        force_type: bool,

        /// skip synthetic keyboard events
        #[clap(long)]
        no_key_events: bool,
    },
    /// run a keyboard shortcut (`type_last_snippet`, `type_snippet_<N>`)
    Shortcut {
        name: String,

        #[clap(flatten)]
        run: RunArgs,
    },
    /// manage saved snippets
    #[clap(subcommand)]
    Snippet(SnippetCommand),
    /// show or change persisted settings
    #[clap(subcommand)]
    Settings(SettingsCommand),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// element of the demo page that has focus
    #[clap(short, long, value_enum, default_value_t = DemoTarget::Input)]
    target: DemoTarget,

    /// do not wait between characters
    #[clap(long)]
    instant: bool,

    /// seed for reproducible pacing and typos
    #[clap(long)]
    seed: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum SnippetCommand {
    /// save a new snippet
    Add {
        text: String,
        #[clap(short, long, default_value = "")]
        name: String,
    },
    /// list saved snippets in shortcut order
    List,
    /// delete a snippet by id
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
enum SettingsCommand {
    Show,
    /// set a value by storage key, e.g. `lastSpeed 20`
    Set { key: String, value: String },
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let store = match &cli.config {
        Some(path) => FileSettingsStore::with_path(path),
        None => FileSettingsStore::new(),
    };
    let mut settings = store.load();
    let log_handle = logging::init(settings.debug_logging);

    match cli.command {
        Commands::Type {
            text,
            run,
            cps,
            mistakes,
            mistake_rate,
            no_restore,
            force_type,
            no_key_events,
        } => {
            let text = text.replace("\\n", "\n");
            let mut request = settings.request_for(text.clone());
            if let Some(cps) = cps {
                request.chars_per_second = cps;
            }
            if let Some(rate) = mistake_rate {
                request.mistake_rate_percent = rate;
            }
            request.mistakes |= mistakes;
            request.restore_cursor &= !no_restore;
            request.force_type |= force_type;
            request.use_key_events &= !no_key_events;

            settings.last_snippet = text;
            store.save(&settings)?;

            let command = Command::Type(TypePayload::from(&request.normalized()));
            run_on_demo_page(&settings, &run, command, log_handle)
        }
        Commands::Shortcut { name, run } => {
            let shortcut: Shortcut = name.parse()?;
            match shortcut.to_command(&settings) {
                Some(command) => run_on_demo_page(&settings, &run, command, log_handle),
                None => {
                    println!("Demo Typer is currently disabled");
                    Ok(())
                }
            }
        }
        Commands::Snippet(cmd) => run_snippet_command(&store, &mut settings, cmd),
        Commands::Settings(SettingsCommand::Show) => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
            Ok(())
        }
        Commands::Settings(SettingsCommand::Set { key, value }) => {
            settings.set(&key, &value)?;
            store.save(&settings)?;
            println!("{key} = {value}");
            Ok(())
        }
    }
}

fn run_on_demo_page(
    settings: &Settings,
    run: &RunArgs,
    command: Command,
    log_handle: Option<logging::LogHandle>,
) -> Result<(), Box<dyn Error>> {
    let page = DemoPage::build(run.target)?;
    let sleeper: Arc<dyn Sleeper> = if run.instant {
        Arc::new(FnSleeper(|_: Duration| {}))
    } else {
        Arc::new(ThreadSleeper)
    };
    let mut controller = TypingController::new(page.document().clone(), sleeper);
    if let Some(seed) = run.seed {
        controller = controller.with_seed(seed);
    }
    let mut router = MessageRouter::with_controller(page.document().clone(), controller);
    if let Some(handle) = log_handle {
        router = router.with_log_handle(handle);
    }
    router.apply_settings(settings);

    let reply = router.handle_json(&serde_json::to_string(&command)?)?;
    for notice in router.take_notices() {
        eprintln!("{notice}");
    }
    let response: demo_typer::messages::Response = serde_json::from_str(&reply)?;
    if !response.is_ok() {
        return Err(format!("rejected: {reply}").into());
    }

    if let Some(report) = router.controller_mut().wait() {
        print_report(&page, &report);
        if let EmitOutcome::Failed(err) = report.outcome {
            return Err(err.into());
        }
    }
    Ok(())
}

fn print_report(page: &DemoPage, report: &EmitReport) {
    println!("{}", page.content());
    eprintln!(
        "{}: {}/{} characters, {} corrected typos, mean delay {:.1} ms",
        report.outcome,
        report.chars_typed,
        report.total_chars,
        report.mistakes_injected,
        report.mean_delay_ms().unwrap_or(0.0)
    );
}

fn run_snippet_command(
    store: &FileSettingsStore,
    settings: &mut Settings,
    cmd: SnippetCommand,
) -> Result<(), Box<dyn Error>> {
    match cmd {
        SnippetCommand::Add { text, name } => {
            let snippet = settings.saved_snippets.save(None, &name, &text)?;
            println!("{} {}", snippet.id, snippet.name);
            store.save(settings)?;
        }
        SnippetCommand::List => {
            for (number, snippet) in settings.saved_snippets.list().iter().enumerate() {
                println!("{}. {} [{}] {}", number + 1, snippet.name, snippet.id, preview(&snippet.text));
            }
        }
        SnippetCommand::Delete { id } => {
            let removed = settings.saved_snippets.delete(&id)?;
            store.save(settings)?;
            println!("deleted {}", removed.name);
        }
    }
    Ok(())
}

fn preview(text: &str) -> String {
    let flat = text.lines().map(str::trim).filter(|l| !l.is_empty()).join(" / ");
    if flat.chars().count() > PREVIEW_CHARS {
        format!("{}...", flat.chars().take(PREVIEW_CHARS).collect::<String>())
    } else {
        flat
    }
}
