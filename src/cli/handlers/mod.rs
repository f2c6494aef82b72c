use std::error::Error;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Local, NaiveDate, NaiveDateTime};

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::config_io::{self, CONFIG_FILE};
use crate::io::event_io::load_events;
use crate::io::state::{self, UiState};
use crate::io::vault_io::{delete_tasks, load_vault, save_task};
use crate::io::watcher::VaultWatcher;
use crate::model::config::Config;
use crate::model::event::Event;
use crate::model::task::{Task, TaskId};
use crate::ops::blocks::resolve_blocks;
use crate::ops::classify::{ClassifyOptions, Window, classify};
use crate::ops::forest::{build_forest, cascade};
use crate::ops::store::TaskStore;
use crate::parse::field_format::FieldFormat;
use crate::parse::task_parser::ParseContext;
use crate::parse::task_serializer::serialize_task;
use crate::util::iso::{When, parse_date, parse_when, round_to_quarter};

type CmdResult = Result<(), Box<dyn Error>>;

/// How long `watch` sleeps between redraws when nothing changes
const WATCH_TICK: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> CmdResult {
    let json = cli.json;
    let root = resolve_root(cli.vault_dir.as_deref())?;
    tracing::debug!(root = %root.display(), "using vault");

    match cli.command {
        // Read commands
        Commands::Day(args) => cmd_day(&root, args, json),
        Commands::Show(args) => cmd_show(&root, args, json),
        Commands::Tree(args) => cmd_tree(&root, args, json),

        // Write commands
        Commands::Schedule(args) => cmd_schedule(&root, args),
        Commands::Reformat(args) => cmd_reformat(&root, args),
        Commands::Delete(args) => cmd_delete(&root, args),
        Commands::Collapse(args) => cmd_collapse(&root, args),

        Commands::Watch(args) => cmd_watch(&root, args, json),
        Commands::Config(cmd) => cmd_config(&root, cmd, json),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn resolve_root(dir: Option<&str>) -> Result<PathBuf, Box<dyn Error>> {
    match dir {
        Some(dir) => Ok(std::fs::canonicalize(dir)
            .map_err(|e| format!("cannot resolve -C path '{}': {}", dir, e))?),
        None => Ok(std::env::current_dir()?),
    }
}

/// A loaded vault: settings, persisted UI state and the parsed tasks.
struct Session {
    config: Config,
    store: TaskStore,
}

impl Session {
    fn open(root: &Path) -> Result<Self, Box<dyn Error>> {
        let config = config_io::load_config(root)?;
        let ui = state::read_ui_state(root).unwrap_or_default();
        let mut session = Session {
            config,
            store: TaskStore::with_collapsed(ui.collapsed),
        };
        session.reload(root)?;
        Ok(session)
    }

    /// Rescan the vault; false when nothing changed since the last scan.
    fn reload(&mut self, root: &Path) -> Result<bool, Box<dyn Error>> {
        let raws = load_vault(root, &self.config)?;
        Ok(self.store.reload(&raws, &parse_context(&self.config)))
    }

    fn task(&self, id: &str) -> Result<&Task, Box<dyn Error>> {
        self.store
            .get(&TaskId::from(id))
            .ok_or_else(|| format!("task not found: {}", id).into())
    }
}

fn parse_context(config: &Config) -> ParseContext<'_> {
    ParseContext {
        field_format: config.tasks.field_format,
        daily_notes: config.daily_notes.as_ref(),
    }
}

fn parse_format(s: &str) -> Result<FieldFormat, Box<dyn Error>> {
    Ok(s.parse::<FieldFormat>()?)
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

/// Settings for one rendering of the day view
struct DayView {
    date: NaiveDate,
    now: Option<NaiveDateTime>,
    past: bool,
    show_completed: bool,
    extend: bool,
    events: Vec<Event>,
}

impl DayView {
    fn from_args(args: &DayArgs, config: &Config) -> Result<Self, Box<dyn Error>> {
        let now = match &args.now {
            Some(s) => Some(
                parse_when(s)
                    .ok_or_else(|| format!("invalid --now '{}'", s))?
                    .start(),
            ),
            None => None,
        };
        let date = match &args.date {
            Some(s) => parse_date(s).ok_or_else(|| format!("invalid date '{}'", s))?,
            None => now.unwrap_or_else(local_now).date(),
        };
        let events = match &args.events {
            Some(path) => load_events(Path::new(path))?,
            None => Vec::new(),
        };
        Ok(DayView {
            date,
            now,
            past: args.past,
            show_completed: args.show_completed || config.timeline.show_completed,
            extend: args.extend || config.timeline.extend_blocks,
            events,
        })
    }

    fn render(&self, store: &TaskStore, json: bool) -> CmdResult {
        let now = self.now.unwrap_or_else(local_now);
        let window = Window::day(self.date);
        let opts = ClassifyOptions {
            now,
            past_mode: self.past,
            show_completed: self.show_completed,
        };

        let c = classify(store.tasks().values(), &self.events, &window, &opts);
        let blocks = resolve_blocks(c.time_buckets.clone(), window.end(), self.extend);
        tracing::debug!(
            placed = c.placed(),
            excluded = c.excluded.len(),
            blocks = blocks.len(),
            "classified day"
        );

        if json {
            let dj = day_to_json(self.date, now, &c, &blocks);
            println!("{}", serde_json::to_string_pretty(&dj)?);
        } else {
            print_lines(format_day(self.date, &c, &blocks));
        }
        Ok(())
    }
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn cmd_day(root: &Path, args: DayArgs, json: bool) -> CmdResult {
    let session = Session::open(root)?;
    let view = DayView::from_args(&args, &session.config)?;
    view.render(&session.store, json)
}

fn cmd_show(root: &Path, args: ShowArgs, json: bool) -> CmdResult {
    let session = Session::open(root)?;
    let task = session.task(&args.id)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&task_to_json(task))?);
    } else {
        print_lines(format_task_detail(task));
    }
    Ok(())
}

fn cmd_tree(root: &Path, args: TreeArgs, json: bool) -> CmdResult {
    let session = Session::open(root)?;
    let forest = build_forest(session.store.tasks())?;
    let collapsed = session.store.collapsed();
    if json {
        let nodes: Vec<TaskJson> = forest.iter().map(|n| node_to_json(n, collapsed)).collect();
        println!("{}", serde_json::to_string_pretty(&nodes)?);
    } else {
        print_lines(format_tree(&forest, collapsed, args.all));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Write commands
// ---------------------------------------------------------------------------

fn cmd_schedule(root: &Path, args: ScheduleArgs) -> CmdResult {
    let session = Session::open(root)?;
    let mut task = session.task(&args.id)?.clone();

    task.scheduled = if args.when.eq_ignore_ascii_case("none") {
        None
    } else {
        let when = parse_when(&args.when)
            .ok_or_else(|| format!("invalid date or date-time '{}'", args.when))?;
        Some(match when {
            When::DateTime(at) if args.round => When::DateTime(round_to_quarter(at)),
            other => other,
        })
    };

    save_task(root, &task, session.config.tasks.field_format)?;
    match task.scheduled {
        Some(when) => println!("{} scheduled for {}", task.id, when),
        None => println!("{} unscheduled", task.id),
    }
    Ok(())
}

fn cmd_reformat(root: &Path, args: ReformatArgs) -> CmdResult {
    let session = Session::open(root)?;
    let task = session.task(&args.id)?;
    let format = match &args.format {
        Some(f) => parse_format(f)?,
        None => session.config.tasks.field_format,
    };
    save_task(root, task, format)?;
    println!("{}", serialize_task(task, format));
    Ok(())
}

fn cmd_delete(root: &Path, args: DeleteArgs) -> CmdResult {
    let session = Session::open(root)?;
    let task = session.task(&args.id)?;
    let ids = cascade(session.store.tasks(), &task.id)?;

    if !args.yes {
        eprintln!("delete {} and {} subtask(s):", task.id, ids.len() - 1);
        eprintln!("  {}", format_task_line(task));
        eprint!("Proceed? [y/n] ");
        std::io::stderr().flush()?;
        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("cancelled");
            return Ok(());
        }
    }

    delete_tasks(root, &ids)?;
    println!("deleted {} task(s)", ids.len());
    Ok(())
}

fn cmd_collapse(root: &Path, args: CollapseArgs) -> CmdResult {
    let mut session = Session::open(root)?;
    let id = session.task(&args.id)?.id.clone();
    let collapsed = session.store.toggle_collapsed(&id);

    let ui = UiState {
        collapsed: session.store.collapsed().clone(),
    };
    state::write_ui_state(root, &ui)?;
    println!("{} {}", id, if collapsed { "collapsed" } else { "expanded" });
    Ok(())
}

// ---------------------------------------------------------------------------
// Watch
// ---------------------------------------------------------------------------

fn cmd_watch(root: &Path, args: WatchArgs, json: bool) -> CmdResult {
    let watcher = VaultWatcher::start(root)?;
    let mut session = Session::open(root)?;
    let mut view = DayView::from_args(&args.day, &session.config)?;
    let mut redraws = 0;

    loop {
        view.render(&session.store, json)?;
        redraws += 1;
        if args.max_redraws.is_some_and(|max| redraws >= max) {
            return Ok(());
        }

        loop {
            let changed = watcher.wait(WATCH_TICK);
            if changed.is_empty() {
                // Tick: a pinned clock never moves, a live one does.
                if view.now.is_none() {
                    break;
                }
                continue;
            }
            tracing::debug!(paths = changed.len(), "vault changed");

            if changed.iter().any(|p| p.ends_with(CONFIG_FILE)) {
                session.config = config_io::load_config(root)?;
                session.store.invalidate();
                view = DayView::from_args(&args.day, &session.config)?;
            }
            if session.reload(root)? {
                break;
            }
        }
        if !json {
            println!();
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn cmd_config(root: &Path, cmd: ConfigCmd, json: bool) -> CmdResult {
    match cmd.action {
        ConfigAction::FieldFormat(args) => {
            let format = parse_format(&args.format)?;
            let (_, mut doc) = config_io::read_config(root)?;
            config_io::set_field_format(&mut doc, format);
            config_io::write_config(root, &doc)?;
            println!("field format set to {}", format);
        }
        ConfigAction::Show => {
            let config = config_io::load_config(root)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                print!("{}", toml::to_string_pretty(&config)?);
            }
        }
    }
    Ok(())
}
