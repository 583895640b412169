//! Interactive terminal dashboard.
//!
//! Draws the system panel and the process table with crossterm, then polls
//! for keys in short slices until the next refresh is due.

use anyhow::Context;
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    style::{self, Stylize},
    terminal, ExecutableCommand, QueueableCommand,
};
use herakles_proc_top::format::{elapsed_time, progress_bar, truncate};
use herakles_proc_top::{OsReader, ProcessRegistry};
use std::io::{self, Write};
use std::time::{Duration, Instant};
use tracing::{debug, info};

const HELP: &str = "Up/c: CPU order  Down/m: memory order  +/-: rows  q: quit";

/// User input mapped to dashboard actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ToggleCpuOrder,
    ToggleMemoryOrder,
    MoreRows,
    FewerRows,
    Redraw,
    Quit,
}

/// Maps a terminal event to a dashboard command.
pub fn command_for(event: &Event) -> Option<Command> {
    match event {
        Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            ..
        }) => match code {
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => Some(Command::Quit),
            KeyCode::Up | KeyCode::Char('c') => Some(Command::ToggleCpuOrder),
            KeyCode::Down | KeyCode::Char('m') => Some(Command::ToggleMemoryOrder),
            KeyCode::Char('+') => Some(Command::MoreRows),
            KeyCode::Char('-') => Some(Command::FewerRows),
            KeyCode::Char('q') | KeyCode::Esc => Some(Command::Quit),
            _ => None,
        },
        Event::Resize(_, _) => Some(Command::Redraw),
        _ => None,
    }
}

/// Raw mode, alternate screen and hidden cursor for as long as it lives.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> anyhow::Result<Self> {
        terminal::enable_raw_mode().context("Failed to enable raw mode")?;
        let guard = TerminalGuard;
        io::stdout()
            .execute(terminal::EnterAlternateScreen)
            .and_then(|out| out.execute(cursor::Hide))
            .context("Failed to set up the terminal")?;
        install_panic_hook();
        Ok(guard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        restore_terminal();
    }
}

fn restore_terminal() {
    let mut stdout = io::stdout();
    let _ = stdout.execute(cursor::Show);
    let _ = stdout.execute(terminal::LeaveAlternateScreen);
    let _ = terminal::disable_raw_mode();
}

/// Restores the terminal before the default panic output.
///
/// Release builds abort on panic, so `Drop` never runs there.
fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        restore_terminal();
        previous(info);
    }));
}

/// Keeps `rows` within `1..=available` (at least 1 even with no processes).
pub fn clamp_rows(rows: usize, available: usize) -> usize {
    rows.clamp(1, available.max(1))
}

/// Text lines of one frame, with the index of the table header.
#[derive(Debug)]
pub struct Frame {
    pub lines: Vec<String>,
    pub header: usize,
}

/// Lays out one frame for a terminal `width` columns wide.
pub fn layout<R: OsReader>(registry: &ProcessRegistry<R>, rows: usize, width: usize) -> Frame {
    let mut lines = vec![
        format!("OS: {}", registry.operating_system()),
        format!("Kernel: {}", registry.kernel()),
        format!("CPU: {}", progress_bar(registry.cpu_utilization())),
        format!("Memory: {}", progress_bar(registry.memory_utilization())),
        format!("Total Processes: {}", registry.total_processes()),
        format!("Running Processes: {}", registry.running_processes()),
        format!("Up Time: {}", elapsed_time(registry.up_time())),
        String::new(),
    ];

    let header = lines.len();
    lines.push(format!(
        "{:>7} {:<8} {:>7} {:>7} {:>9} COMMAND",
        "PID", "USER", "CPU[%]", "RAM[MB]", "TIME+"
    ));

    // Width of everything left of COMMAND
    let prefix = 7 + 1 + 8 + 1 + 7 + 1 + 7 + 1 + 9 + 1;
    let command_width = width.saturating_sub(prefix);

    for p in registry.processes().iter().take(rows) {
        lines.push(format!(
            "{:>7} {:<8} {:>7.1} {:>7} {:>9} {}",
            p.pid(),
            truncate(p.user(), 8),
            p.cpu_utilization() * 100.0,
            p.ram_mb(),
            elapsed_time(p.up_time()),
            truncate(p.command(), command_width)
        ));
    }

    lines.push(String::new());
    lines.push(format!(
        "Order: {}  Rows: {}/{}  {}",
        registry.order(),
        rows,
        registry.processes().len(),
        HELP
    ));

    Frame { lines, header }
}

/// The interactive monitor loop.
pub struct Dashboard<R> {
    registry: ProcessRegistry<R>,
    rows: usize,
    interval: Duration,
    input_slice: Duration,
}

impl<R: OsReader> Dashboard<R> {
    pub fn new(
        registry: ProcessRegistry<R>,
        rows: usize,
        interval: Duration,
        input_slice: Duration,
    ) -> Self {
        Self {
            registry,
            rows: rows.max(1),
            interval,
            input_slice: input_slice.min(interval),
        }
    }

    /// Runs until the user quits. The terminal is restored on return.
    pub fn run(&mut self) -> anyhow::Result<()> {
        let _guard = TerminalGuard::enter()?;
        info!(
            "Dashboard started: interval {}ms, {} rows, order {}",
            self.interval.as_millis(),
            self.rows,
            self.registry.order()
        );

        loop {
            self.registry.refresh();
            self.draw()?;

            if !self.wait_for_input()? {
                break;
            }
        }

        info!("Dashboard stopped");
        Ok(())
    }

    /// Handles input until the interval elapses. Returns false on quit.
    fn wait_for_input(&mut self) -> anyhow::Result<bool> {
        let deadline = Instant::now() + self.interval;

        loop {
            let now = Instant::now();
            if now >= deadline {
                return Ok(true);
            }

            let slice = (deadline - now).min(self.input_slice);
            if !event::poll(slice).context("Failed to poll terminal events")? {
                continue;
            }

            let ev = event::read().context("Failed to read terminal event")?;
            let Some(command) = command_for(&ev) else {
                continue;
            };
            debug!("Dashboard command: {:?}", command);

            if command == Command::Quit {
                return Ok(false);
            }
            self.apply(command);
            self.draw()?;
        }
    }

    fn apply(&mut self, command: Command) {
        let available = self.registry.processes().len();
        match command {
            Command::ToggleCpuOrder => self.registry.toggle_order_by_cpu(),
            Command::ToggleMemoryOrder => self.registry.toggle_order_by_memory(),
            Command::MoreRows => self.rows = clamp_rows(self.rows.saturating_add(1), available),
            Command::FewerRows => self.rows = clamp_rows(self.rows.saturating_sub(1), available),
            Command::Redraw | Command::Quit => {}
        }
    }

    fn draw(&self) -> anyhow::Result<()> {
        let (cols, term_rows) = terminal::size().context("Failed to query terminal size")?;
        let rows = clamp_rows(self.rows, self.registry.processes().len());
        let frame = layout(&self.registry, rows, cols as usize);

        let mut stdout = io::stdout();
        stdout.queue(terminal::Clear(terminal::ClearType::All))?;

        for (y, line) in frame.lines.iter().take(term_rows as usize).enumerate() {
            let text = truncate(line, cols as usize);
            stdout.queue(cursor::MoveTo(0, y as u16))?;
            if y == frame.header {
                stdout.queue(style::PrintStyledContent(text.to_string().reverse()))?;
            } else if y + 1 == frame.lines.len() {
                stdout.queue(style::PrintStyledContent(text.to_string().grey()))?;
            } else {
                stdout.queue(style::Print(text))?;
            }
        }

        stdout.flush().context("Failed to flush terminal")?;
        Ok(())
    }
}
