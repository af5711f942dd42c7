use std::collections::BTreeSet;
use std::collections::VecDeque;
use std::env;
use std::fs;
use std::io;
use std::io::BufRead;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use coach_core::actions::ChatAction;
use coach_core::actions::RuntimeAction;
use coach_core::actions::UserAction;
use coach_core::config::Config;
use coach_core::directive::extract_directives_with;
use coach_core::directive::ActionKind;
use coach_core::directive::DirectiveOrder;
use coach_core::directive::ExtractOptions;
use coach_core::directive::UiAction;
use coach_core::form::FormMode;
use coach_core::reducer::reduce;
use coach_core::reducer::CoachEffect;
use coach_core::state::ChatState;
use coach_core::state::ClearReason;
use coach_core::state::LogEntry;
use coach_core::state::LogLevel;
use coach_core::state::LogSource;
use coach_core::state::MessageId;
use coach_core::state::Role;
use coach_exec::transport::ChatTransport;
use coach_exec::transport::RetryingTransport;
use coach_exec::transport::ScriptedTransport;
use tracing_subscriber::EnvFilter;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .try_init();
}

fn run() -> CliResult<()> {
    let mut args = env::args().skip(1);
    let Some(command) = args.next() else {
        print_help();
        return Ok(());
    };

    match command.as_str() {
        "--help" | "-h" | "help" => {
            print_help();
            Ok(())
        }
        "--version" | "-V" | "version" => {
            println!("coach {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "parse" => run_parse(ParseArgs::from_args(args.collect())?),
        "chat" => run_chat(ChatArgs::from_args(args.collect())?),
        _ => {
            print_help();
            Err(format!("unknown command: {command}").into())
        }
    }
}

#[derive(Debug, Default, PartialEq)]
struct ParseArgs {
    input: Option<PathBuf>,
    json: bool,
    textual: bool,
    config: Option<PathBuf>,
}

impl ParseArgs {
    fn from_args(args: Vec<String>) -> CliResult<Self> {
        let mut parsed = Self::default();
        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--json" => parsed.json = true,
                "--textual" => parsed.textual = true,
                "--config" => {
                    let Some(value) = args.get(i + 1) else {
                        return Err("--config requires a path".into());
                    };
                    parsed.config = Some(PathBuf::from(value));
                    i += 1;
                }
                other if other.starts_with("--") => {
                    return Err(format!("unsupported argument: {other}").into());
                }
                other => {
                    if parsed.input.is_some() {
                        return Err(format!("unexpected extra input: {other}").into());
                    }
                    parsed.input = Some(PathBuf::from(other));
                }
            }
            i += 1;
        }
        Ok(parsed)
    }
}

#[derive(Debug, PartialEq)]
struct ChatArgs {
    script: PathBuf,
    config: Option<PathBuf>,
}

impl ChatArgs {
    fn from_args(args: Vec<String>) -> CliResult<Self> {
        let mut script = None;
        let mut config = None;
        let mut i = 0;
        while i < args.len() {
            let slot = match args[i].as_str() {
                "--script" => &mut script,
                "--config" => &mut config,
                other => return Err(format!("unsupported argument: {other}").into()),
            };
            let Some(value) = args.get(i + 1) else {
                return Err(format!("{} requires a path", args[i]).into());
            };
            *slot = Some(PathBuf::from(value));
            i += 2;
        }
        let Some(script) = script else {
            return Err("chat requires --script PATH".into());
        };
        Ok(Self { script, config })
    }
}

fn load_config(explicit: Option<&Path>) -> CliResult<Config> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match dirs::config_dir() {
            Some(dir) => dir.join("coach").join("config.toml"),
            None => return Ok(Config::default()),
        },
    };
    if explicit.is_none() && !path.exists() {
        return Ok(Config::default());
    }
    let source = fs::read_to_string(&path)
        .map_err(|err| io::Error::other(format!("read {}: {err}", path.display())))?;
    let config = toml::from_str::<Config>(&source)
        .map_err(|err| io::Error::other(format!("parse {}: {err}", path.display())))?;
    tracing::debug!(path = %path.display(), agent = %config.agent.name, "loaded config");
    Ok(config)
}

fn run_parse(args: ParseArgs) -> CliResult<()> {
    let config = load_config(args.config.as_deref())?;
    let raw = match &args.input {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let options = ExtractOptions {
        order: if args.textual {
            DirectiveOrder::Textual
        } else {
            config.directives.order
        },
    };
    let parsed = extract_directives_with(&raw, &options);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&parsed)?);
        return Ok(());
    }

    println!("{}", parsed.content);
    if let Some(actions) = &parsed.actions {
        println!("--- {} action(s), {}", actions.len(), FormMode::of(actions).label());
        for action in actions {
            println!("  {}", describe_action(action));
        }
    }
    Ok(())
}

fn describe_action(action: &UiAction) -> String {
    match action.kind {
        ActionKind::Slider => {
            let (low, high) = action.slider_bounds().unwrap_or_default();
            format!(
                "{:<7} {} [{low}..{high}] ({})",
                "slider",
                action.display_label(),
                action.id
            )
        }
        ActionKind::Choice => format!(
            "{:<7} {} ({})",
            "choice",
            action.options().join(" | "),
            action.id
        ),
        ActionKind::Select => format!(
            "{:<7} {}: {} ({})",
            "select",
            action.display_label(),
            action.options().join(" | "),
            action.id
        ),
    }
}

struct Session {
    state: ChatState,
    transport: RetryingTransport<ScriptedTransport>,
    system_instruction: String,
    last_printed: MessageId,
    confirmed: BTreeSet<MessageId>,
    announced: BTreeSet<MessageId>,
    finished: bool,
}

impl Session {
    fn dispatch(&mut self, action: ChatAction) -> CliResult<()> {
        let mut queue = VecDeque::from([action]);
        while let Some(action) = queue.pop_front() {
            for effect in reduce(&mut self.state, action) {
                match effect {
                    CoachEffect::RequestFrame => {}
                    CoachEffect::SubmitChat { message } => {
                        if self.transport.inner().is_exhausted() {
                            self.finished = true;
                            queue.push_back(ChatAction::Runtime(
                                RuntimeAction::AppendStructuredLog(
                                    LogEntry::new(
                                        LogLevel::Error,
                                        LogSource::Transport,
                                        "reply script exhausted",
                                    )
                                    .with_context(self.transport.name()),
                                ),
                            ));
                            continue;
                        }
                        let reply = self.transport.send(&message)?;
                        queue.push_back(ChatAction::Runtime(RuntimeAction::ReceiveModelReply(
                            reply,
                        )));
                    }
                    CoachEffect::ResetTransport => {
                        self.transport.reset(&self.system_instruction);
                    }
                }
            }
        }
        self.render();
        Ok(())
    }

    fn render(&mut self) {
        for (id, form) in &self.state.forms {
            if let Some(text) = form.confirmation() {
                if self.confirmed.insert(*id) {
                    println!("       [{text}]");
                }
            }
        }
        for message in &self.state.messages {
            if message.id <= self.last_printed {
                continue;
            }
            if message.role == Role::Model {
                println!();
                println!("coach> {}", message.content.replace('\n', "\n       "));
            }
            self.last_printed = message.id;
        }
    }

    fn announce_form(&mut self, message_id: MessageId) {
        if !self.announced.insert(message_id) {
            return;
        }
        let Some(form) = self.state.form(message_id) else {
            return;
        };
        if form.shows_submit() {
            println!(
                "       ({} field(s) waiting, /form to answer)",
                form.renderable_actions().count()
            );
        } else if let Some(action) = form.renderable_actions().next() {
            print_options(action);
            println!("       (pick a number, or just reply)");
        }
    }
}

fn run_chat(args: ChatArgs) -> CliResult<()> {
    let config = load_config(args.config.as_deref())?;
    let system_instruction = config.agent.system_instruction().to_string();

    let mut transport = RetryingTransport::new(ScriptedTransport::load(&args.script)?);
    transport.reset(&system_instruction);
    tracing::info!(
        script = %args.script.display(),
        transport = transport.name(),
        replies = transport.inner().remaining(),
        "starting chat session"
    );

    let mut session = Session {
        state: ChatState::new(&config),
        transport,
        system_instruction,
        last_printed: MessageId(0),
        confirmed: BTreeSet::new(),
        announced: BTreeSet::new(),
        finished: false,
    };
    println!("commands: /form /logs /clear /new /quit");
    session.dispatch(ChatAction::Runtime(RuntimeAction::Greet))?;

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    while !session.finished {
        let pending = pending_form_id(&session.state);
        if let Some(message_id) = pending {
            session.announce_form(message_id);
        }
        let Some(action) = read_command(&mut session, pending, &mut lines)? else {
            break;
        };
        session.dispatch(action)?;
    }

    if session.finished {
        println!();
        println!("script finished");
    }
    Ok(())
}

/// The newest open form that has something to interact with.
fn pending_form_id(state: &ChatState) -> Option<MessageId> {
    state
        .pending_form()
        .filter(|(_, form)| form.shows_submit() || form.renderable_actions().next().is_some())
        .map(|(message_id, _)| message_id)
}

/// Reads until a line produces an action. Free text is always accepted; a
/// pending single choice is also answered by its option number or text.
fn read_command(
    session: &mut Session,
    pending: Option<MessageId>,
    lines: &mut impl Iterator<Item = io::Result<String>>,
) -> CliResult<Option<ChatAction>> {
    loop {
        let Some(line) = read_line(lines, "you> ")? else {
            return Ok(None);
        };
        match line.trim() {
            "/quit" => return Ok(None),
            "/new" => return Ok(Some(ChatAction::User(UserAction::NewSession))),
            "/clear" => {
                return Ok(Some(ChatAction::Runtime(RuntimeAction::ClearLogs(
                    ClearReason::UserRequest,
                ))))
            }
            "/logs" => {
                print_logs(&session.state);
                continue;
            }
            "/form" => {
                let Some(message_id) = pending else {
                    println!("  no form is waiting");
                    continue;
                };
                return Ok(fill_form(session, message_id, lines)?.map(ChatAction::User));
            }
            "" => continue,
            _ => {}
        }
        let action = pending
            .and_then(|message_id| quick_pick(&session.state, message_id, &line))
            .unwrap_or(UserAction::SendMessage(line));
        return Ok(Some(ChatAction::User(action)));
    }
}

/// Answers a single-choice form straight from the prompt.
fn quick_pick(state: &ChatState, message_id: MessageId, line: &str) -> Option<UserAction> {
    let form = state.form(message_id)?;
    if form.shows_submit() {
        return None;
    }
    let action = form.renderable_actions().next()?;
    let value = pick_option(action, line)?;
    Some(UserAction::FormInput {
        message_id,
        action_id: action.id.clone(),
        value,
    })
}

fn print_logs(state: &ChatState) {
    for entry in state.logs.iter() {
        let context = entry
            .context
            .as_deref()
            .map(|context| format!("[{context}] "))
            .unwrap_or_default();
        println!(
            "  #{:<4} {:<5} {:?} {context}{}",
            entry.seq,
            entry.level.label(),
            entry.source,
            entry.message
        );
    }
}

/// Walks the pending form widget by widget. Returns the action that should
/// finish the form, or `None` on end of input.
fn fill_form(
    session: &mut Session,
    message_id: MessageId,
    lines: &mut impl Iterator<Item = io::Result<String>>,
) -> CliResult<Option<UserAction>> {
    let Some(form) = session.state.form(message_id) else {
        return Ok(None);
    };
    let single_choice = !form.shows_submit();
    let actions: Vec<UiAction> = form.renderable_actions().cloned().collect();

    if single_choice {
        let Some(action) = actions.first() else {
            return Ok(Some(UserAction::SubmitForm { message_id }));
        };
        print_options(action);
        loop {
            let Some(line) = read_line(lines, "pick> ")? else {
                return Ok(None);
            };
            if let Some(value) = pick_option(action, &line) {
                return Ok(Some(UserAction::FormInput {
                    message_id,
                    action_id: action.id.clone(),
                    value,
                }));
            }
        }
    }

    for action in &actions {
        loop {
            let prompt = match action.kind {
                ActionKind::Slider => {
                    let (low, high) = action.slider_bounds().unwrap_or_default();
                    let shown = session
                        .state
                        .form(message_id)
                        .and_then(|form| form.display_value(action))
                        .unwrap_or_default();
                    format!("{} [{low}-{high}, default {shown}]> ", action.display_label())
                }
                ActionKind::Choice | ActionKind::Select => {
                    print_options(action);
                    format!("{} (blank to skip)> ", action.display_label())
                }
            };
            let Some(line) = read_line(lines, &prompt)? else {
                return Ok(None);
            };
            if line.trim().is_empty() {
                break;
            }
            let value = match action.kind {
                ActionKind::Slider => Some(line.trim().to_string()),
                ActionKind::Choice | ActionKind::Select => pick_option(action, &line),
            };
            let Some(value) = value else {
                continue;
            };
            session.dispatch(ChatAction::User(UserAction::FormInput {
                message_id,
                action_id: action.id.clone(),
                value,
            }))?;
            let accepted = session
                .state
                .form(message_id)
                .and_then(|form| form.recorded_value(&action.id))
                .is_some();
            if accepted {
                break;
            }
            if let Some(entry) = session.state.logs.latest() {
                println!("  ! {}", entry.message);
            }
        }
    }
    Ok(Some(UserAction::SubmitForm { message_id }))
}

fn print_options(action: &UiAction) {
    for (idx, option) in action.options().iter().enumerate() {
        println!("  {}) {option}", idx + 1);
    }
}

/// Accepts either the option's number or its exact text.
fn pick_option(action: &UiAction, line: &str) -> Option<String> {
    let line = line.trim();
    let options = action.options();
    if let Ok(idx) = line.parse::<usize>() {
        return idx
            .checked_sub(1)
            .and_then(|idx| options.get(idx))
            .cloned();
    }
    options.iter().find(|option| option.as_str() == line).cloned()
}

fn read_line(
    lines: &mut impl Iterator<Item = io::Result<String>>,
    prompt: &str,
) -> io::Result<Option<String>> {
    print!("{prompt}");
    io::stdout().flush()?;
    lines.next().transpose()
}

fn print_help() {
    println!("coach {}", env!("CARGO_PKG_VERSION"));
    println!("Usage:");
    println!("  coach parse [FILE] [--json] [--textual] [--config PATH]");
    println!("  coach chat --script PATH [--config PATH]");
    println!("  coach --help");
    println!("  coach --version");
    println!();
    println!("Inside chat: /form answers the waiting form, /logs shows the session log,");
    println!("/clear empties it, /new starts over, /quit exits.");
}
