mod cli;
mod config;
mod error;
mod notify;
mod reminder;
mod storage;
mod store;
mod task;
mod theme;
mod ui;

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use config::Config;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use notify::{AudioCue, DesktopNotifier};
use ratatui::{backend::CrosstermBackend, Terminal};
use reminder::ReminderScheduler;
use std::{cell::RefCell, fs, io, path::PathBuf, rc::Rc};
use storage::FileStorage;
use store::TaskStore;
use ui::App;

fn command() -> Command {
    let id_arg = || {
        Arg::new("id")
            .required(true)
            .value_parser(value_parser!(i64))
            .help("Task id")
    };
    Command::new("taskminder")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Task list with due-date reminders")
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_name("PATH")
                .value_parser(value_parser!(PathBuf))
                .help("Config file (default: <config dir>/taskminder/config.toml)"),
        )
        .subcommand(Command::new("tui").about("Interactive task list (default)"))
        .subcommand(
            Command::new("add")
                .about("Add a new task")
                .arg(Arg::new("text").required(true).num_args(1..).help("Task text"))
                .arg(Arg::new("priority").short('p').long("priority").help("low, medium or high"))
                .arg(Arg::new("due").short('d').long("due").help("Due date, e.g. 2025-03-04T09:30")),
        )
        .subcommand(
            Command::new("list")
                .about("List tasks, open ones first")
                .arg(Arg::new("search").short('s').long("search").help("Filter by text")),
        )
        .subcommand(Command::new("done").about("Toggle a task's completed state").arg(id_arg()))
        .subcommand(
            Command::new("edit")
                .about("Edit a task; re-arms its reminder")
                .arg(id_arg())
                .arg(Arg::new("text").short('t').long("text"))
                .arg(Arg::new("priority").short('p').long("priority"))
                .arg(Arg::new("due").short('d').long("due")),
        )
        .subcommand(Command::new("rm").about("Delete a task").arg(id_arg()))
        .subcommand(Command::new("clear-completed").about("Delete all completed tasks"))
        .subcommand(Command::new("watch").about("Run the reminder scheduler without the TUI"))
        .subcommand(
            Command::new("notify")
                .about("Enable desktop notifications")
                .arg(
                    Arg::new("deny")
                        .long("deny")
                        .action(ArgAction::SetTrue)
                        .conflicts_with_all(["reset", "status"])
                        .help("Block desktop notifications"),
                )
                .arg(
                    Arg::new("status")
                        .long("status")
                        .action(ArgAction::SetTrue)
                        .conflicts_with("reset")
                        .help("Show the current permission and notifier"),
                )
                .arg(
                    Arg::new("reset")
                        .long("reset")
                        .action(ArgAction::SetTrue)
                        .help("Forget an earlier choice"),
                ),
        )
        .subcommand(Command::new("init-config").about("Write a default config file if none exists"))
        .subcommand(
            Command::new("theme")
                .about("Show or change the TUI theme")
                .arg(Arg::new("choice").value_parser(["light", "dark", "toggle"])),
        )
}

fn init_logging(config: &Config) {
    let env = env_logger::Env::default().default_filter_or(config.log_level.as_str());
    let mut builder = env_logger::Builder::from_env(env);
    let log_path = config.log_path();
    let file = log_path
        .parent()
        .map_or(Ok(()), fs::create_dir_all)
        .and_then(|_| {
            fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
        });
    match file {
        Ok(file) => {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        Err(err) => eprintln!("Cannot open log file {}: {err}", log_path.display()),
    }
    builder.init();
}

fn build_scheduler(config: &Config, desktop: &Rc<RefCell<DesktopNotifier>>) -> ReminderScheduler {
    let mut scheduler = ReminderScheduler::new(config.tick_interval(), config.reminder_window());
    if config.desktop_notifications {
        scheduler = scheduler.with_notifier(Box::new(Rc::clone(desktop)));
    }
    if config.audio_cue {
        scheduler = scheduler.with_notifier(Box::new(AudioCue::stdout()));
    }
    scheduler
}

fn run_tui(app: &mut App) -> Result<(), Box<dyn std::error::Error>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = ui::run_app(&mut terminal, app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result.map_err(Into::into)
}

fn id(matches: &ArgMatches) -> i64 {
    matches.get_one::<i64>("id").copied().unwrap_or_default()
}

fn text_of(matches: &ArgMatches) -> String {
    matches
        .get_many::<String>("text")
        .map(|words| words.map(String::as_str).collect::<Vec<_>>().join(" "))
        .unwrap_or_default()
}

fn opt<'a>(matches: &'a ArgMatches, name: &str) -> Option<&'a str> {
    matches.get_one::<String>(name).map(String::as_str)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = command().get_matches();

    let config_path = matches
        .get_one::<PathBuf>("config")
        .cloned()
        .unwrap_or_else(Config::default_config_path);
    let config = Config::load_or_default(&config_path);
    init_logging(&config);

    let storage = FileStorage::new(config.data_dir());
    log::debug!("Using data dir {}", storage.dir().display());
    let mut store = TaskStore::load(Box::new(storage.clone()));
    let desktop = Rc::new(RefCell::new(DesktopNotifier::new(Box::new(storage.clone()))));
    let mut out = io::stdout();

    match matches.subcommand() {
        Some(("add", sub)) => {
            cli::add(&mut store, &text_of(sub), opt(sub, "priority"), opt(sub, "due"), &mut out)?;
        }
        Some(("list", sub)) => cli::list(&store, opt(sub, "search").unwrap_or_default(), &mut out)?,
        Some(("done", sub)) => cli::toggle(&mut store, id(sub), &mut out)?,
        Some(("edit", sub)) => cli::edit(
            &mut store,
            id(sub),
            opt(sub, "text"),
            opt(sub, "priority"),
            opt(sub, "due"),
            &mut out,
        )?,
        Some(("rm", sub)) => cli::remove(&mut store, id(sub), &mut out)?,
        Some(("clear-completed", _)) => cli::clear_completed(&mut store, &mut out)?,
        Some(("watch", _)) => {
            let mut scheduler = build_scheduler(&config, &desktop);
            cli::watch(&mut scheduler, &mut store);
        }
        Some(("notify", sub)) => {
            let mut desktop = desktop.borrow_mut();
            if sub.get_flag("status") {
                cli::notification_status(&desktop, &mut out)?;
            } else if sub.get_flag("reset") {
                cli::reset_permission(&mut desktop, &mut out)?;
            } else {
                cli::notify(&mut desktop, sub.get_flag("deny"), &mut out)?;
            }
        }
        Some(("init-config", _)) => cli::init_config(&config_path, &mut out)?,
        Some(("theme", sub)) => {
            let mut prefs = storage.clone();
            cli::theme(&mut prefs, opt(sub, "choice"), &mut out)?;
        }
        _ => {
            let scheduler = build_scheduler(&config, &desktop);
            let mut app = App::new(store, scheduler, Rc::clone(&desktop), Box::new(storage));
            run_tui(&mut app)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_definition_is_valid() {
        command().debug_assert();
    }

    #[test]
    fn add_joins_words_and_reads_options() {
        let matches = command()
            .try_get_matches_from(["taskminder", "add", "buy", "milk", "-p", "high", "--due", "2030-01-01"])
            .expect("valid args");
        let (name, sub) = matches.subcommand().expect("subcommand");
        assert_eq!(name, "add");
        assert_eq!(text_of(sub), "buy milk");
        assert_eq!(opt(sub, "priority"), Some("high"));
        assert_eq!(opt(sub, "due"), Some("2030-01-01"));
    }

    #[test]
    fn ids_must_be_integers() {
        assert!(command().try_get_matches_from(["taskminder", "rm", "abc"]).is_err());
        let matches = command()
            .try_get_matches_from(["taskminder", "done", "1700000000000"])
            .expect("valid args");
        let (_, sub) = matches.subcommand().expect("subcommand");
        assert_eq!(id(sub), 1_700_000_000_000);
    }

    #[test]
    fn notify_flags_conflict() {
        assert!(command()
            .try_get_matches_from(["taskminder", "notify", "--deny", "--reset"])
            .is_err());
        assert!(command()
            .try_get_matches_from(["taskminder", "notify", "--status", "--deny"])
            .is_err());
        let matches = command()
            .try_get_matches_from(["taskminder", "notify", "--status"])
            .expect("valid args");
        let (_, sub) = matches.subcommand().expect("subcommand");
        assert!(sub.get_flag("status"));
    }

    #[test]
    fn init_config_honours_config_flag() {
        let matches = command()
            .try_get_matches_from(["taskminder", "init-config", "--config", "/tmp/tm.toml"])
            .expect("valid args");
        assert_eq!(
            matches.get_one::<PathBuf>("config"),
            Some(&PathBuf::from("/tmp/tm.toml"))
        );
        assert_eq!(matches.subcommand_name(), Some("init-config"));
    }
}
