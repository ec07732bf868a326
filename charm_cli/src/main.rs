use charm_core::api::{drain_outbox, Balance, WagerOutcome};
use charm_core::progression::STREAK_BREAK_PENALTY;
use charm_core::schedule::{format_hour, DAY_NAMES, DAYS_PER_WEEK};
use charm_core::store::{load_document, save_document};
use charm_core::tracker::rng_from_seed;
use charm_core::*;
use chrono::{Duration, Local, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "charm")]
#[command(about = "ChronoCharm quest planner and progression tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Use this config file instead of the default one
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Never contact the API
    #[arg(long, global = true)]
    offline: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show level, attributes, streak and badges (default)
    Stats {
        /// Fetch the stats stored by the API first
        #[arg(long)]
        refresh: bool,
    },

    /// Award experience points
    Xp {
        #[arg(allow_negative_numbers = true)]
        amount: i64,
    },

    /// Record that a task was completed today (or on --date)
    CompleteDay {
        /// Completion date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Manage available tasks
    Tasks {
        #[command(subcommand)]
        action: TaskCommand,
    },

    /// Weekly calendar
    Grid {
        #[command(subcommand)]
        action: GridCommand,
    },

    /// Split an assignment into micro-tasks
    Breakdown {
        /// Assignment text; defaults to the pending handoff
        text: Option<String>,

        /// Number of tasks to ask for
        #[arg(long)]
        count: Option<u32>,

        /// Wizard-themed task names
        #[arg(long)]
        wizard: bool,

        /// Add the resulting tasks to the task list
        #[arg(long)]
        import: bool,
    },

    /// Stake mana on a task
    Wager {
        #[command(subcommand)]
        action: WagerCommand,
    },

    /// Show mana balance
    Balance {
        /// Reset the mana ledger to its starting balance
        #[arg(long)]
        reset: bool,
    },

    /// Push queued stats to the API
    Sync,
}

#[derive(Subcommand)]
enum TaskCommand {
    /// List available tasks
    List,

    /// Add a custom task
    Add {
        #[arg(long)]
        title: String,

        #[arg(long, default_value = "")]
        description: String,

        /// Estimated duration in minutes
        #[arg(long, default_value_t = 60)]
        minutes: u32,

        #[arg(long)]
        stake: Option<u32>,

        #[arg(long)]
        bounty: Option<u32>,
    },

    /// Delete a task and remove it from the calendar
    Delete { id: String },

    /// Hand a task over to the next `breakdown` run
    Handoff { id: String },
}

#[derive(Subcommand)]
enum GridCommand {
    /// Print the week (or one day)
    Show {
        /// Day index, 0 = Monday
        #[arg(long)]
        day: Option<usize>,
    },

    /// Place a task starting at the given hour
    Place {
        #[arg(long)]
        day: usize,
        #[arg(long)]
        hour: usize,
        #[arg(long)]
        task: String,
    },

    /// Remove the task covering a slot
    Remove {
        #[arg(long)]
        day: usize,
        #[arg(long)]
        hour: usize,
    },

    /// Toggle a slot between free and blocked
    Block {
        #[arg(long)]
        day: usize,
        #[arg(long)]
        hour: usize,

        /// Remove a task occupying the slot instead of refusing
        #[arg(long)]
        evict: bool,
    },

    /// Mark a task completed everywhere on the calendar
    Complete { task_id: String },

    /// Let the scheduler place all pending tasks
    Organize,

    /// Clear the calendar
    Reset,
}

#[derive(Subcommand)]
enum WagerCommand {
    /// Deduct the task's stake
    Start { task_id: String },

    /// Settle a wager
    Finish {
        task_id: String,

        #[command(flatten)]
        outcome: OutcomeArg,

        /// Completion date for a won wager (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct OutcomeArg {
    /// Task finished in time
    #[arg(long)]
    won: bool,

    /// Time ran out
    #[arg(long)]
    lost: bool,
}

/// Files kept under the data directory
struct Paths {
    stats: PathBuf,
    outbox: PathBuf,
    tasks: PathBuf,
    schedule: PathBuf,
    handoff: PathBuf,
}

impl Paths {
    fn new(data_dir: &Path) -> Self {
        Self {
            stats: data_dir.join("stats.json"),
            outbox: data_dir.join("sync").join("outbox.jsonl"),
            tasks: data_dir.join("tasks.json"),
            schedule: data_dir.join("schedule.json"),
            handoff: data_dir.join("handoff.json"),
        }
    }
}

type Tracker = ProgressTracker<FileStatsStore, JsonlOutbox>;

struct App {
    config: Config,
    paths: Paths,
    client: Option<ApiClient>,
}

impl Commands {
    /// Commands that never write to the data directory
    fn is_read_only(&self) -> bool {
        matches!(
            self,
            Commands::Stats { refresh: false }
                | Commands::Tasks { action: TaskCommand::List }
                | Commands::Grid { action: GridCommand::Show { .. } }
                | Commands::Balance { reset: false }
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    charm_core::logging::init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    std::fs::create_dir_all(&data_dir)?;

    let client = if cli.offline || !config.api.enabled {
        None
    } else {
        Some(ApiClient::new(&config.api)?)
    };

    let app = App {
        paths: Paths::new(&data_dir),
        config,
        client,
    };

    let command = cli.command.unwrap_or(Commands::Stats { refresh: false });
    let _session = if command.is_read_only() {
        SessionLock::shared(&data_dir)?
    } else {
        SessionLock::exclusive(&data_dir)?
    };

    match command {
        Commands::Stats { refresh } => app.cmd_stats(refresh).await,
        Commands::Xp { amount } => app.cmd_xp(amount).await,
        Commands::CompleteDay { date } => app.cmd_complete_day(date).await,
        Commands::Tasks { action } => app.cmd_tasks(action),
        Commands::Grid { action } => app.cmd_grid(action).await,
        Commands::Breakdown {
            text,
            count,
            wizard,
            import,
        } => app.cmd_breakdown(text, count, wizard, import).await,
        Commands::Wager { action } => app.cmd_wager(action).await,
        Commands::Balance { reset } => app.cmd_balance(reset).await,
        Commands::Sync => app.cmd_sync().await,
    }
}

impl App {
    fn tracker(&self) -> Tracker {
        ProgressTracker::open(
            FileStatsStore::new(&self.paths.stats),
            Some(JsonlOutbox::new(&self.paths.outbox)),
            rng_from_seed(self.config.progression.seed),
        )
    }

    fn catalog(&self) -> Result<TaskCatalog> {
        let catalog = TaskCatalog::load(&self.paths.tasks)?;
        for error in catalog.validate() {
            tracing::warn!("Task list: {}", error);
        }
        Ok(catalog)
    }

    fn grid(&self) -> Result<ScheduleGrid> {
        Ok(load_document(&self.paths.schedule)?.unwrap_or_default())
    }

    fn save_grid(&self, grid: &ScheduleGrid) -> Result<()> {
        save_document(&self.paths.schedule, grid)
    }

    fn online(&self) -> Result<&ApiClient> {
        self.client.as_ref().ok_or_else(|| {
            Error::Other("this command needs the API; drop --offline or enable [api]".into())
        })
    }

    /// Push queued stats when online; failures only log
    async fn sync_quietly(&self) {
        if let Some(client) = &self.client {
            drain_outbox(&JsonlOutbox::new(&self.paths.outbox), client).await;
        }
    }

    async fn cmd_stats(&self, refresh: bool) -> Result<()> {
        let mut tracker = self.tracker();

        if refresh {
            let snapshot = self.online()?.fetch_stats().await?;
            tracker.replace(snapshot);
            println!("✓ Refreshed stats from the API");
        }

        display_stats(tracker.state());
        Ok(())
    }

    async fn cmd_xp(&self, amount: i64) -> Result<()> {
        let mut tracker = self.tracker();
        let events = tracker.add_experience(amount);

        println!("✓ {:+} XP", amount);
        display_events(&events);
        display_stats(tracker.state());

        self.sync_quietly().await;
        Ok(())
    }

    async fn cmd_complete_day(&self, date: Option<NaiveDate>) -> Result<()> {
        let today = date.unwrap_or_else(|| Local::now().date_naive());
        let mut tracker = self.tracker();
        let events = tracker.complete_for_day(today);

        if events.is_empty() {
            println!("Already recorded a completion for {}", today);
        } else {
            println!("✓ Completion recorded for {}", today);
            display_events(&events);
        }
        println!("  Streak: {} days", tracker.state().current_streak);

        self.sync_quietly().await;
        Ok(())
    }

    fn cmd_tasks(&self, action: TaskCommand) -> Result<()> {
        let mut catalog = self.catalog()?;

        match action {
            TaskCommand::List => {
                if catalog.tasks().is_empty() {
                    println!("No tasks. Add one with `charm tasks add --title ...`");
                }
                for task in catalog.tasks() {
                    display_task(task);
                }
            }
            TaskCommand::Add {
                title,
                description,
                minutes,
                stake,
                bounty,
            } => {
                let defaults = &self.config.breakdown;
                let task = catalog.add(
                    &title,
                    &description,
                    minutes,
                    stake.unwrap_or(defaults.default_stake),
                    bounty.unwrap_or(defaults.default_bounty),
                )?;
                println!("✓ Added task {}", task.id);
                display_task(task);
                catalog.save(&self.paths.tasks)?;
            }
            TaskCommand::Delete { id } => {
                let mut grid = self.grid()?;
                let task = catalog.delete(&id, &mut grid)?;
                catalog.save(&self.paths.tasks)?;
                self.save_grid(&grid)?;
                println!("✓ Deleted '{}'", task.title);
            }
            TaskCommand::Handoff { id } => {
                let task = catalog
                    .get(&id)
                    .ok_or_else(|| Error::Catalog(format!("No task with id '{}'", id)))?;
                PendingHandoff::from_task(task, Utc::now()).save(&self.paths.handoff)?;
                println!(
                    "✓ '{}' is ready for breakdown (expires in {} min)",
                    task.title, self.config.handoff.ttl_minutes
                );
                println!("  Run `charm breakdown` to continue.");
            }
        }

        Ok(())
    }

    async fn cmd_grid(&self, action: GridCommand) -> Result<()> {
        let mut grid = self.grid()?;

        match action {
            GridCommand::Show { day } => {
                match day {
                    Some(day) if day >= DAYS_PER_WEEK => {
                        return Err(ScheduleError::OutOfRange { day, hour: 0 }.into());
                    }
                    Some(day) => display_day(&grid, day),
                    None => (0..DAYS_PER_WEEK).for_each(|day| display_day(&grid, day)),
                }
                display_usage(&grid);
                return Ok(());
            }
            GridCommand::Place { day, hour, task } => {
                let catalog = self.catalog()?;
                let task = catalog
                    .get(&task)
                    .or_else(|| grid.task(&task))
                    .cloned()
                    .ok_or_else(|| Error::Catalog(format!("No task with id '{}'", task)))?;
                let hours = grid.place_task(day, hour, &task)?;
                println!(
                    "✓ Placed '{}' on {} at {} ({} h)",
                    task.title,
                    DAY_NAMES[day],
                    format_hour(hour),
                    hours
                );
            }
            GridCommand::Remove { day, hour } => match grid.remove_task(day, hour)? {
                Some(task) => println!("✓ Removed '{}' from {}", task.title, DAY_NAMES[day]),
                None => println!("Nothing scheduled at {} {}", DAY_NAMES[day], format_hour(hour)),
            },
            GridCommand::Block { day, hour, evict } => {
                let policy = if evict {
                    BlockPolicy::Evict
                } else {
                    self.config.schedule.block_policy
                };
                let blocked = grid.toggle_block(day, hour, policy)?;
                let verb = if blocked { "Blocked" } else { "Unblocked" };
                println!("✓ {} {} {}", verb, DAY_NAMES[day], format_hour(hour));
            }
            GridCommand::Complete { task_id } => {
                let slots = grid.complete_task(&task_id);
                if slots == 0 {
                    return Err(Error::Other(format!("'{}' is not on the calendar", task_id)));
                }
                let mut catalog = self.catalog()?;
                if catalog.mark_completed(&task_id) {
                    catalog.save(&self.paths.tasks)?;
                }
                println!("✓ Marked {} completed ({} slots)", task_id, slots);
            }
            GridCommand::Organize => self.organize(&mut grid).await?,
            GridCommand::Reset => {
                grid = ScheduleGrid::new();
                println!("✓ Calendar cleared");
            }
        }

        self.save_grid(&grid)
    }

    async fn organize(&self, grid: &mut ScheduleGrid) -> Result<()> {
        let catalog = self.catalog()?;
        let pending: Vec<TaskRef> = catalog
            .tasks()
            .iter()
            .filter(|t| !t.completed)
            .cloned()
            .collect();
        if pending.is_empty() {
            println!("No pending tasks to organize");
            return Ok(());
        }

        let free = grid.free_cells();
        let remote = match &self.client {
            Some(client) => match client.schedule(&pending, &free).await {
                Ok(plan) => Some(plan),
                Err(e) => {
                    tracing::warn!("Scheduling service failed: {}. Planning locally.", e);
                    None
                }
            },
            None => None,
        };
        let plan = remote.unwrap_or_else(|| plan_sequential(pending.len(), &free));

        let report = grid.organize_automatically(&pending, &plan);
        for assignment in &report.placed {
            let task = &pending[assignment.task_index];
            println!(
                "✓ {} at {}: {}",
                DAY_NAMES[assignment.day],
                format_hour(assignment.start_hour),
                task.title
            );
            if let Some(reason) = &assignment.reasoning {
                println!("    {}", reason);
            }
        }
        for (assignment, reason) in &report.skipped {
            match reason {
                SkipReason::UnknownTask => {
                    println!("  Skipped unknown task #{}", assignment.task_index)
                }
                SkipReason::Rejected(e) => {
                    println!("  Skipped '{}': {}", pending[assignment.task_index].title, e)
                }
            }
        }
        println!(
            "Organized {} of {} tasks",
            report.placed.len(),
            pending.len()
        );
        Ok(())
    }

    async fn cmd_breakdown(
        &self,
        text: Option<String>,
        count: Option<u32>,
        wizard: bool,
        import: bool,
    ) -> Result<()> {
        let client = self.online()?;
        let ttl = Duration::minutes(self.config.handoff.ttl_minutes);
        let assignment = match text {
            Some(text) => text,
            None => PendingHandoff::take(&self.paths.handoff, Utc::now(), ttl)?
                .map(|handoff| handoff.assignment_text())
                .ok_or_else(|| {
                    Error::Other("no assignment given and no pending handoff".into())
                })?,
        };

        let settings = &self.config.breakdown;
        let breakdown = client
            .breakdown(
                &assignment,
                count.unwrap_or(settings.task_count),
                wizard || settings.wizard_mode,
            )
            .await?;

        println!("\n╭─────────────────────────────────────────╮");
        println!("│  QUEST LOG");
        println!("╰─────────────────────────────────────────╯");
        for (i, task) in breakdown.tasks.iter().enumerate() {
            println!("  {}. {} ({})", i + 1, task.title, task.estimated_time);
            if !task.description.is_empty() {
                println!("     {}", task.description);
            }
        }
        println!();
        if !breakdown.quote.is_empty() {
            println!("  \"{}\"", breakdown.quote);
        }
        if !breakdown.total_estimated_time.is_empty() {
            println!("  Total: {}", breakdown.total_estimated_time);
        }

        if import {
            let mut catalog = self.catalog()?;
            let ids = catalog.import_breakdown(
                &breakdown.tasks,
                settings.default_stake,
                settings.default_bounty,
            );
            catalog.save(&self.paths.tasks)?;
            println!("\n✓ Imported {} tasks", ids.len());
        }

        Ok(())
    }

    async fn cmd_wager(&self, action: WagerCommand) -> Result<()> {
        match action {
            WagerCommand::Start { task_id } => {
                let task = self.find_task(&task_id)?;
                match &self.client {
                    Some(client) => {
                        let started = client.start_wager(&task.id, task.stake).await?;
                        println!(
                            "✓ Staked {} mana on '{}' (balance {})",
                            started.stake_deducted, task.title, started.new_balance
                        );
                    }
                    None => println!(
                        "✓ Wager on '{}' started offline (stake {})",
                        task.title, task.stake
                    ),
                }
                println!("  Finish within {} to win {} mana.", task.estimated_time(), task.bounty);
            }
            WagerCommand::Finish {
                task_id,
                outcome,
                date,
            } => {
                let task = self.find_task(&task_id)?;
                let won = outcome.won && !outcome.lost;

                if let Some(client) = &self.client {
                    let settled = client
                        .complete_wager(&task.id, task.bounty, task.stake, won)
                        .await?;
                    match settled.outcome {
                        WagerOutcome::Won => println!(
                            "✓ Bounty claimed: +{} mana (balance {})",
                            settled.total_gain.unwrap_or(0),
                            settled.new_balance
                        ),
                        WagerOutcome::Lost => println!(
                            "✗ Stake lost: {} mana (balance {})",
                            settled.stake_lost.unwrap_or(0),
                            settled.new_balance
                        ),
                    }
                } else if won {
                    println!("✓ '{}' completed", task.title);
                } else {
                    println!("✗ Time ran out on '{}'", task.title);
                }

                if won {
                    self.record_win(&task, date.unwrap_or_else(|| Local::now().date_naive()))?;
                    self.sync_quietly().await;
                }
            }
        }

        Ok(())
    }

    /// Bounty becomes experience, the day counts toward the streak, and the
    /// task is marked done everywhere
    fn record_win(&self, task: &TaskRef, today: NaiveDate) -> Result<()> {
        let mut tracker = self.tracker();
        let mut events = tracker.add_experience(i64::from(task.bounty));
        events.extend(tracker.complete_for_day(today));
        println!("  +{} XP", task.bounty);
        display_events(&events);

        let mut grid = self.grid()?;
        if grid.complete_task(&task.id) > 0 {
            self.save_grid(&grid)?;
        }
        let mut catalog = self.catalog()?;
        if catalog.mark_completed(&task.id) {
            catalog.save(&self.paths.tasks)?;
        }
        Ok(())
    }

    fn find_task(&self, id: &str) -> Result<TaskRef> {
        if let Some(task) = self.catalog()?.get(id) {
            return Ok(task.clone());
        }
        self.grid()?
            .task(id)
            .cloned()
            .ok_or_else(|| Error::Catalog(format!("No task with id '{}'", id)))
    }

    async fn cmd_balance(&self, reset: bool) -> Result<()> {
        let client = self.online()?;
        if reset {
            let result = client.reset().await?;
            println!("✓ Mana reset to {}", result.balance);
            return Ok(());
        }
        display_balance(&client.balance().await?);
        Ok(())
    }

    async fn cmd_sync(&self) -> Result<()> {
        let outbox = JsonlOutbox::new(&self.paths.outbox);
        let pending = outbox.pending()?.len();

        let Some(client) = &self.client else {
            println!("Offline: {} updates queued", pending);
            return Ok(());
        };
        if pending == 0 {
            println!("Nothing to sync");
            return Ok(());
        }

        if drain_outbox(&outbox, client).await {
            println!("✓ Synced stats ({} queued updates)", pending);
        } else {
            println!("✗ Sync failed; queued updates were dropped (see logs)");
        }
        Ok(())
    }
}

fn display_stats(state: &ProgressionState) {
    println!("\n╭─────────────────────────────────────────╮");
    println!("│  Level {} · {}", state.level(), state.title());
    println!("╰─────────────────────────────────────────╯");
    println!(
        "  XP: {} / {}",
        state.experience_points,
        state.experience_to_next_level()
    );
    println!(
        "  Endurance {}  Focus {}  Magic {}",
        state.attributes.endurance(),
        state.attributes.focus(),
        state.attributes.magic()
    );
    println!("  Streak: {} days", state.current_streak);
    if let Some(date) = state.last_completed_date {
        println!("  Last completion: {}", date);
    }
    if !state.badges.is_empty() {
        let badges: Vec<&str> = state.badges.iter().map(String::as_str).collect();
        println!("  Badges: {}", badges.join(", "));
    }
    println!();
}

fn display_events(events: &[ProgressionEvent]) {
    for event in events {
        match event {
            ProgressionEvent::LeveledUp { from, to } => println!("  ⬆ Level up! {} → {}", from, to),
            ProgressionEvent::AttributeRaised { attribute, value } => {
                println!("  ✦ {:?} rose to {}", attribute, value)
            }
            ProgressionEvent::BadgeEarned(badge) => println!("  🏅 Badge earned: {}", badge),
            ProgressionEvent::StreakContinued(days) => {
                println!("  🔥 Streak continues: {} days", days)
            }
            ProgressionEvent::StreakStarted => println!("  🔥 Streak started"),
            ProgressionEvent::StreakBroken { previous } => println!(
                "  Streak of {} days broken (endurance -{})",
                previous, STREAK_BREAK_PENALTY
            ),
        }
    }
}

fn display_task(task: &TaskRef) {
    let done = if task.completed { "✓" } else { " " };
    println!(
        "  [{}] {:<12} {} · {} · stake {} / bounty {}",
        done,
        task.id,
        task.title,
        task.estimated_time(),
        task.stake,
        task.bounty
    );
}

fn display_day(grid: &ScheduleGrid, day: usize) {
    println!("{}", DAY_NAMES[day]);
    let Some(slots) = grid.day(day) else {
        return;
    };

    let mut empty = true;
    for slot in slots {
        match &slot.state {
            SlotState::Free => continue,
            SlotState::Blocked => println!("  {:>5}  ▓ blocked", format_hour(slot.hour)),
            SlotState::Occupied { task_id, span_head } => {
                let (title, done) = grid
                    .task(task_id)
                    .map(|t| (t.title.as_str(), t.completed))
                    .unwrap_or((task_id.as_str(), false));
                let mark = if done { " ✓" } else { "" };
                if *span_head {
                    println!("  {:>5}  {}{}", format_hour(slot.hour), title, mark);
                } else {
                    println!("  {:>5}  │", format_hour(slot.hour));
                }
            }
        }
        empty = false;
    }
    if empty {
        println!("  (free)");
    }
}

fn display_usage(grid: &ScheduleGrid) {
    let total = DAYS_PER_WEEK * schedule::HOURS_PER_DAY;
    println!("\n{} of {} hours used", grid.used_hours(), total);
    if grid.is_nearly_full() {
        println!("⚠ Your week is nearly full");
    }
}

fn display_balance(balance: &Balance) {
    println!("Mana: {}", balance.balance);
    println!("  Earned: {}", balance.total_earned);
    println!("  Lost: {}", balance.total_lost);
    println!("  Quests completed: {}", balance.quests_completed);
}
