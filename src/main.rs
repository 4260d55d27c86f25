//! ts4linux - Mouse & Keyboard Macro Tool
//!
//! Records macros from global input, organizes them into profiles, binds
//! them to mouse buttons and replays them through a virtual input device.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use ts4linux::credentials::CredentialStore;
use ts4linux::device::{DryRunDevice, OutputDevice, VirtualOutput};
use ts4linux::listener::{InputListener, ListenerConfig};
use ts4linux::profile::{Action, MouseButton, ProfileStore};
use ts4linux::session::{ButtonTrigger, Session};
use ts4linux::settings::{AppSettings, PROFILES_FILE, USERS_FILE};

#[derive(Parser)]
#[command(name = "ts4linux")]
#[command(about = "Record, bind and replay mouse/keyboard macros", long_about = None)]
#[command(version)]
struct Cli {
    /// Directory holding settings.toml, profiles.json and users.json
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Login user
    #[arg(long, short, global = true, env = "TS4LINUX_USER")]
    user: Option<String>,

    /// Login password
    #[arg(long, global = true, env = "TS4LINUX_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage login users. Runs without a login so the first user can be
    /// created; anyone with write access to the config dir can add users.
    User {
        #[command(subcommand)]
        command: UserCommand,
    },

    /// Manage profiles
    Profile {
        #[command(subcommand)]
        command: ProfileCommand,
    },

    /// Inspect and edit macros of the active profile
    Macro {
        #[command(subcommand)]
        command: MacroCommand,
    },

    /// Bind a macro to a mouse button (left, right, middle, back, forward)
    Assign {
        button: String,

        /// Macro name, or "none" to clear the binding
        macro_name: String,
    },

    /// Record a new macro into the active profile until Ctrl-C
    Record {
        name: String,

        /// Delay stamped onto every captured action (ms)
        #[arg(long)]
        delay: Option<u32>,

        /// Replay in a loop until cancelled
        #[arg(long)]
        repeat: bool,

        /// Trigger on button release instead of press
        #[arg(long)]
        on_release: bool,

        /// Capture from this /dev/input device only
        #[arg(long)]
        device: Option<String>,

        /// Drop the last N captured actions before saving (e.g. 2 for the Ctrl-C chord)
        #[arg(long, default_value_t = 0)]
        trim: usize,
    },

    /// Replay a macro of the active profile
    Play {
        name: String,

        /// Log device operations instead of injecting them
        #[arg(short = 'n', long)]
        dry_run: bool,
    },

    /// Play macros bound to mouse buttons until Ctrl-C
    Listen {
        /// Profile to activate first
        #[arg(long)]
        profile: Option<String>,

        /// Listen on this /dev/input device only
        #[arg(long)]
        device: Option<String>,
    },
}

#[derive(Subcommand)]
enum UserCommand {
    /// Add a user, or reset an existing user's password
    Add { username: String, password: String },
    Remove { username: String },
    List,
}

#[derive(Subcommand)]
enum ProfileCommand {
    List,
    /// Create a profile and make it active
    Create { name: String },
    Delete { name: String },
    /// Make a profile active
    Select { name: String },
    /// Show macros and button bindings (active profile by default)
    Show { name: Option<String> },
}

#[derive(Subcommand)]
enum MacroCommand {
    List,
    Show { name: String },
    Delete { name: String },
    /// Change replay settings
    Edit {
        name: String,
        #[arg(long)]
        delay: Option<u32>,
        #[arg(long)]
        repeat: Option<bool>,
        #[arg(long)]
        on_press: Option<bool>,
    },
    /// Replace one action, e.g. '{"type":"move","x":10,"y":20,"delay_ms":5}'
    SetAction {
        name: String,
        index: usize,
        action: String,
    },
    RemoveAction { name: String, index: usize },
}

fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config_dir = match cli.config_dir.clone() {
        Some(dir) => dir,
        None => AppSettings::default_dir().context("Could not find config directory")?,
    };

    // Capture, playback and command handling all share this one thread
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start event loop")?;
    let local = tokio::task::LocalSet::new();

    local.block_on(&runtime, run(cli, config_dir))
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli, config_dir: PathBuf) -> Result<()> {
    info!("ts4linux starting (config: {:?})", config_dir);

    let mut credentials = CredentialStore::load(config_dir.join(USERS_FILE))?;
    if let Commands::User { command } = cli.command {
        return run_user_command(&mut credentials, command);
    }

    login(&credentials, cli.user.as_deref(), cli.password.as_deref())?;

    let mut settings = AppSettings::load(&config_dir)?;
    let store = ProfileStore::load(config_dir.join(PROFILES_FILE))?;

    let needs_injection = matches!(
        cli.command,
        Commands::Play { dry_run: false, .. } | Commands::Listen { .. }
    );
    let dry_run = Rc::new(RefCell::new(DryRunDevice::new()));
    let device: Rc<RefCell<dyn OutputDevice>> = if needs_injection {
        Rc::new(RefCell::new(VirtualOutput::create(
            settings.screen_width,
            settings.screen_height,
        )?))
    } else {
        dry_run.clone()
    };

    let mut session = Session::new(store, device, settings.capture_settings());
    if let Some(ref name) = settings.active_profile {
        if !session.select_profile(name) {
            warn!("Active profile '{}' no longer exists", name);
        }
    }

    match cli.command {
        Commands::User { .. } => unreachable!("handled before login"),
        Commands::Profile { command } => run_profile_command(&mut session, &mut settings, &config_dir, command),
        Commands::Macro { command } => run_macro_command(&mut session, command),
        Commands::Assign { button, macro_name } => {
            let button: MouseButton = button.parse()?;
            let target = (!macro_name.eq_ignore_ascii_case("none")).then_some(macro_name.as_str());
            session.assign_button(button, target)?;
            match target {
                Some(name) => println!("{} -> {}", button, name),
                None => println!("{} cleared", button),
            }
            Ok(())
        }
        Commands::Record { name, delay, repeat, on_release, device, trim } => {
            let mut capture = settings.capture_settings();
            if let Some(delay) = delay {
                capture.delay_ms = delay;
            }
            capture.repeat |= repeat;
            if on_release {
                capture.trigger_on_press = false;
            }
            session.set_capture_defaults(capture);
            record(&mut session, &settings, &name, device, trim).await
        }
        Commands::Play { name, dry_run: is_dry_run } => {
            play(&mut session, &name).await?;
            if is_dry_run {
                for op in dry_run.borrow().ops() {
                    println!("{:?}", op);
                }
            }
            Ok(())
        }
        Commands::Listen { profile, device } => {
            if let Some(ref name) = profile {
                if !session.select_profile(name) {
                    return Err(ts4linux::Error::ProfileNotFound(name.clone()).into());
                }
            }
            listen(&mut session, &settings, device).await
        }
    }
}

fn login(credentials: &CredentialStore, user: Option<&str>, password: Option<&str>) -> Result<()> {
    let (Some(user), Some(password)) = (user, password) else {
        bail!("Login required: pass --user and --password (or set TS4LINUX_USER / TS4LINUX_PASSWORD)");
    };

    if !credentials.authenticate(user, password) {
        error!("Login failed for '{}'", user);
        bail!("Invalid username or password");
    }

    info!("Logged in as '{}'", user);
    Ok(())
}

fn run_user_command(credentials: &mut CredentialStore, command: UserCommand) -> Result<()> {
    match command {
        UserCommand::Add { username, password } => {
            credentials.add_user(&username, &password)?;
            println!("User '{}' saved", username);
        }
        UserCommand::Remove { username } => {
            if credentials.remove_user(&username)? {
                println!("User '{}' removed", username);
            } else {
                println!("No such user '{}'", username);
            }
        }
        UserCommand::List => {
            for name in credentials.usernames() {
                println!("{}", name);
            }
        }
    }
    Ok(())
}

fn run_profile_command(
    session: &mut Session,
    settings: &mut AppSettings,
    config_dir: &Path,
    command: ProfileCommand,
) -> Result<()> {
    match command {
        ProfileCommand::List => {
            if session.profiles().is_empty() {
                println!("No profiles defined");
            }
            for (i, p) in session.profiles().iter().enumerate() {
                if session.active_index() == Some(i) {
                    println!("{} (active)", p.name);
                } else {
                    println!("{}", p.name);
                }
            }
        }
        ProfileCommand::Create { name } => {
            session.create_profile(&name)?;
            settings.active_profile = Some(name.clone());
            settings.save(config_dir)?;
            println!("Created profile '{}'", name);
        }
        ProfileCommand::Delete { name } => {
            if !session.delete_profile(&name)? {
                return Err(ts4linux::Error::ProfileNotFound(name).into());
            }
            let still_active = session.active_profile().map(|p| p.name.clone());
            if settings.active_profile != still_active {
                settings.active_profile = still_active;
                settings.save(config_dir)?;
            }
            println!("Deleted profile '{}'", name);
        }
        ProfileCommand::Select { name } => {
            if !session.select_profile(&name) {
                return Err(ts4linux::Error::ProfileNotFound(name).into());
            }
            settings.active_profile = Some(name.clone());
            settings.save(config_dir)?;
            println!("Active profile: '{}'", name);
        }
        ProfileCommand::Show { name } => {
            let profile = match name {
                Some(ref n) => session
                    .profiles()
                    .iter()
                    .find(|p| &p.name == n)
                    .ok_or_else(|| ts4linux::Error::ProfileNotFound(n.clone()))?,
                None => session.active_profile().ok_or(ts4linux::Error::NoActiveProfile)?,
            };

            println!("Profile: {}", profile.name);
            println!("Macros:");
            if profile.macros.is_empty() {
                println!("  (none)");
            }
            for m in profile.macros.values() {
                println!("  {} ({} actions)", m.name, m.actions.len());
            }
            println!("Buttons:");
            for button in MouseButton::ALL {
                let bound = profile.button_assignments.get(button.as_str());
                let state = match bound {
                    Some(name) if profile.macros.contains_key(name) => name.clone(),
                    Some(name) => format!("{} (missing)", name),
                    None => "None".to_string(),
                };
                println!("  {:<8} {}", button, state);
            }
        }
    }
    Ok(())
}

fn run_macro_command(session: &mut Session, command: MacroCommand) -> Result<()> {
    let profile = session.active_profile().ok_or(ts4linux::Error::NoActiveProfile)?;

    match command {
        MacroCommand::List => {
            if profile.macros.is_empty() {
                println!("No macros defined");
            }
            for m in profile.macros.values() {
                println!(
                    "{} ({} actions, delay={}ms, repeat={}, trigger={})",
                    m.name,
                    m.actions.len(),
                    m.delay_ms,
                    m.repeat,
                    if m.trigger_on_press { "press" } else { "release" }
                );
            }
        }
        MacroCommand::Show { name } => {
            let m = profile
                .macros
                .get(&name)
                .ok_or_else(|| ts4linux::Error::MacroNotFound(name.clone()))?;
            println!("Macro: {}", m.name);
            println!(
                "delay={}ms repeat={} trigger={}",
                m.delay_ms,
                m.repeat,
                if m.trigger_on_press { "press" } else { "release" }
            );
            println!("{}", m.to_display_text());
        }
        MacroCommand::Delete { name } => {
            if !session.delete_macro(&name)? {
                return Err(ts4linux::Error::MacroNotFound(name).into());
            }
            println!("Deleted macro '{}'", name);
        }
        MacroCommand::Edit { name, delay, repeat, on_press } => {
            let mut settings = profile
                .macros
                .get(&name)
                .ok_or_else(|| ts4linux::Error::MacroNotFound(name.clone()))?
                .settings();
            if let Some(delay) = delay {
                settings.delay_ms = delay;
            }
            if let Some(repeat) = repeat {
                settings.repeat = repeat;
            }
            if let Some(on_press) = on_press {
                settings.trigger_on_press = on_press;
            }
            session.edit_macro(&name, settings)?;
            println!("Updated macro '{}'", name);
        }
        MacroCommand::SetAction { name, index, action } => {
            let action: Action = serde_json::from_str(&action).context("Invalid action JSON")?;
            let shown = action.to_display_string();
            session.edit_action(&name, index, action)?;
            println!("{}[{}] = {}", name, index, shown);
        }
        MacroCommand::RemoveAction { name, index } => {
            let removed = session.remove_action(&name, index)?;
            println!("Removed {}", removed.to_display_string());
        }
    }
    Ok(())
}

fn listener_config(settings: &AppSettings, device: Option<String>) -> ListenerConfig {
    ListenerConfig {
        device: device.or_else(|| settings.input_device.clone()),
        screen_width: settings.screen_width,
        screen_height: settings.screen_height,
    }
}

/// Ctrl-C as a channel the event loop can select on
fn ctrl_c_channel() -> Result<mpsc::UnboundedReceiver<()>> {
    let (tx, rx) = mpsc::unbounded_channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .context("Failed to set Ctrl-C handler")?;
    Ok(rx)
}

async fn record(
    session: &mut Session,
    settings: &AppSettings,
    name: &str,
    device: Option<String>,
    trim: usize,
) -> Result<()> {
    session.start_recording(name)?;

    let (tx, mut events) = mpsc::unbounded_channel();
    let listener = InputListener::start(listener_config(settings, device), tx)?;
    let mut stop = ctrl_c_channel()?;

    println!("Recording '{}' - press Ctrl-C to stop", name);
    loop {
        tokio::select! {
            ev = events.recv() => match ev {
                Some(ev) => {
                    session.handle_input(ev);
                }
                None => {
                    session.cancel_recording();
                    bail!("Input listener stopped; recording '{}' discarded", name);
                }
            },
            _ = stop.recv() => break,
        }
    }
    listener.stop();

    if trim > 0 {
        let removed = session.trim_recording(trim);
        info!("Dropped {} trailing action(s)", removed);
    }
    for (i, line) in session.recorder().actions_list().iter().enumerate() {
        println!("{:>3}: {}", i, line);
    }

    if let Some(saved) = session.stop_recording()? {
        let count = session
            .active_profile()
            .and_then(|p| p.macros.get(&saved))
            .map_or(0, |m| m.actions.len());
        println!("Saved macro '{}' ({} actions)", saved, count);
    }
    Ok(())
}

async fn play(session: &mut Session, name: &str) -> Result<()> {
    if !session.play_macro(name) {
        println!("Nothing to play for '{}'", name);
        return Ok(());
    }

    let mut stop = ctrl_c_channel()?;
    let interrupted = tokio::select! {
        _ = session.playback_mut().wait() => false,
        _ = stop.recv() => true,
    };
    if interrupted {
        session.stop_playback();
    }
    Ok(())
}

async fn listen(session: &mut Session, settings: &AppSettings, device: Option<String>) -> Result<()> {
    let profile = session
        .active_profile()
        .ok_or(ts4linux::Error::NoActiveProfile)?
        .name
        .clone();

    let (tx, mut events) = mpsc::unbounded_channel();
    let listener = InputListener::start(listener_config(settings, device), tx)?;
    let mut stop = ctrl_c_channel()?;

    println!("Listening for bound buttons in '{}' - press Ctrl-C to quit", profile);
    loop {
        tokio::select! {
            ev = events.recv() => {
                let Some(ev) = ev else {
                    session.stop_playback();
                    bail!("Input listener stopped");
                };
                match session.handle_input(ev) {
                    Some(ButtonTrigger::Started(name)) => info!("Playing '{}'", name),
                    Some(ButtonTrigger::MacroMissing(name)) => warn!("Bound macro '{}' not found", name),
                    Some(ButtonTrigger::NothingToPlay(name)) => warn!("Bound macro '{}' has no actions", name),
                    _ => {}
                }
            }
            _ = stop.recv() => break,
        }
    }

    session.stop_playback();
    listener.stop();
    info!("ts4linux shutting down");
    Ok(())
}
