//! Keyboard transport control.
//!
//! Runs the terminal loop: drains adapter events, redraws the status line
//! and maps key presses to transport commands.

use crate::display::status_line;
use anyhow::Result;
use crossbeam_channel::Receiver;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use modplay::{ChannelStrip, PlaybackAdapter, PlayerEvent, SessionState};
use modplay_common::{FrameInfo, ModuleDecoder, ModuleInfo, PlaybackState};
use std::io::{self, Write};
use std::time::Duration;
use tracing::{info, warn};

/// Seek step for the arrow keys.
const SEEK_STEP_MS: i64 = 5_000;

/// Status redraw / key poll interval.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A transport command bound to a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    TogglePause,
    Stop,
    Play,
    NextPosition,
    PreviousPosition,
    SeekBy(i64),
    ToggleChannel(usize),
    Quit,
}

/// Key binding table.
pub fn command_for(code: KeyCode) -> Option<Command> {
    match code {
        KeyCode::Char(' ') => Some(Command::TogglePause),
        KeyCode::Char('s') | KeyCode::Char('S') => Some(Command::Stop),
        KeyCode::Char('p') | KeyCode::Char('P') => Some(Command::Play),
        KeyCode::Char('n') | KeyCode::Char('N') => Some(Command::NextPosition),
        KeyCode::Char('b') | KeyCode::Char('B') => Some(Command::PreviousPosition),
        KeyCode::Right => Some(Command::SeekBy(SEEK_STEP_MS)),
        KeyCode::Left => Some(Command::SeekBy(-SEEK_STEP_MS)),
        KeyCode::Char(c @ '1'..='9') => Some(Command::ToggleChannel((c as u8 - b'1') as usize)),
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Some(Command::Quit),
        _ => None,
    }
}

/// Restores cooked mode when dropped, including on early return.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(RawModeGuard)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

fn apply<D: ModuleDecoder + 'static>(
    command: Command,
    adapter: &PlaybackAdapter<D>,
    strip: &mut ChannelStrip,
) {
    let result = match command {
        Command::TogglePause => match adapter.state() {
            SessionState::Running => adapter.pause(),
            SessionState::Paused => adapter.resume(),
            _ => adapter.start(),
        },
        Command::Stop => {
            adapter.stop();
            Ok(())
        }
        Command::Play => adapter.start().map(|()| strip.refresh(adapter)),
        Command::NextPosition => {
            let position = adapter.skip_forward();
            info!(position, "skipped forward");
            Ok(())
        }
        Command::PreviousPosition => {
            let position = adapter.skip_backward();
            info!(position, "skipped backward");
            Ok(())
        }
        Command::SeekBy(delta) => {
            let (_, elapsed) = adapter.position();
            let target = (i64::from(elapsed) + delta).clamp(0, i64::from(u32::MAX)) as u32;
            adapter.seek(target).map(|_| ())
        }
        Command::ToggleChannel(channel) if channel < strip.len() => {
            strip.toggle(adapter, channel).map(|_| ())
        }
        Command::ToggleChannel(_) | Command::Quit => Ok(()),
    };
    if let Err(err) = result {
        warn!(?command, %err, "command failed");
    }
}

/// Status shown by the control loop, folded from adapter events.
#[derive(Debug, Default)]
struct Monitor {
    frame: FrameInfo,
    /// The module ended or playback halted; cleared by the next frame.
    idle: bool,
}

impl Monitor {
    /// Fold in one event. An end or halt leaves the session stopped and the
    /// loop running, so the module can be played again.
    fn observe(&mut self, event: PlayerEvent) {
        match event {
            PlayerEvent::Frame(info) => {
                self.frame = info;
                self.idle = false;
            }
            PlayerEvent::Ended => {
                info!("module ended");
                self.idle = true;
            }
            PlayerEvent::Halted { reason } => {
                warn!(%reason, "playback halted");
                self.idle = true;
            }
            PlayerEvent::ModuleLoaded(_) | PlayerEvent::StateChanged(_) => {}
        }
    }

    fn line(&self, state: PlaybackState, duration_ms: u32, strip: &ChannelStrip) -> String {
        let line = status_line(state, &self.frame, duration_ms, strip);
        if self.idle {
            format!("{line}  (ended: [p] plays again, [q] quits)")
        } else {
            line
        }
    }
}

/// Run until the user quits.
pub fn run_control_loop<D: ModuleDecoder + 'static>(
    adapter: &PlaybackAdapter<D>,
    events: &Receiver<PlayerEvent>,
    module: &ModuleInfo,
) -> Result<()> {
    let _raw = RawModeGuard::enable()?;
    let mut stdout = io::stdout();
    let mut strip = ChannelStrip::for_module(module);
    let mut monitor = Monitor::default();

    loop {
        for event in events.try_iter() {
            monitor.observe(event);
        }

        let line = monitor.line(adapter.state().playback_state(), module.duration_ms, &strip);
        write!(stdout, "\r{line}\x1B[K")?;
        stdout.flush()?;

        if !event::poll(POLL_INTERVAL)? {
            continue;
        }
        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match command_for(key.code) {
                Some(Command::Quit) => break,
                Some(command) => apply(command, adapter, &mut strip),
                None => {}
            }
        }
    }

    write!(stdout, "\r\n")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_keys() {
        assert_eq!(command_for(KeyCode::Char(' ')), Some(Command::TogglePause));
        assert_eq!(command_for(KeyCode::Char('s')), Some(Command::Stop));
        assert_eq!(command_for(KeyCode::Char('p')), Some(Command::Play));
        assert_eq!(command_for(KeyCode::Char('q')), Some(Command::Quit));
        assert_eq!(command_for(KeyCode::Char('x')), None);
    }

    #[test]
    fn arrows_seek_five_seconds() {
        assert_eq!(command_for(KeyCode::Right), Some(Command::SeekBy(5_000)));
        assert_eq!(command_for(KeyCode::Left), Some(Command::SeekBy(-5_000)));
    }

    #[test]
    fn digits_address_channels_from_zero() {
        assert_eq!(
            command_for(KeyCode::Char('1')),
            Some(Command::ToggleChannel(0))
        );
        assert_eq!(
            command_for(KeyCode::Char('9')),
            Some(Command::ToggleChannel(8))
        );
        assert_eq!(command_for(KeyCode::Char('0')), None);
    }

    #[test]
    fn end_of_module_keeps_the_loop_alive() {
        let mut monitor = Monitor::default();
        let strip = ChannelStrip::new(4);
        monitor.observe(PlayerEvent::Frame(FrameInfo {
            position: 3,
            ..FrameInfo::default()
        }));
        assert!(!monitor.idle);

        monitor.observe(PlayerEvent::Ended);
        assert!(monitor.idle);
        assert_eq!(monitor.frame.position, 3);
        let line = monitor.line(PlaybackState::Stopped, 10_000, &strip);
        assert!(line.contains("[p] plays again"));

        // Playing again resumes the normal status line.
        monitor.observe(PlayerEvent::StateChanged(SessionState::Running));
        monitor.observe(PlayerEvent::Frame(FrameInfo::default()));
        assert!(!monitor.idle);
        assert!(!monitor.line(PlaybackState::Playing, 10_000, &strip).contains("again"));
    }

    #[test]
    fn halts_are_shown_as_idle() {
        let mut monitor = Monitor::default();
        monitor.observe(PlayerEvent::Halted {
            reason: "no frame".into(),
        });
        assert!(monitor.idle);
    }
}
