//! Status line rendering.
//!
//! Formats the metadata the adapter publishes into a single terminal line:
//! elapsed time, duration, transport position, tempo and channel flags.

use modplay::ChannelStrip;
use modplay_common::{ChannelState, FrameInfo, ModuleInfo, PlaybackState};

/// Elapsed time as `HHH:MM:SS.d`.
pub fn format_elapsed(time_ms: u32) -> String {
    let tenths = time_ms / 100;
    let hours = tenths / (60 * 600);
    let minutes = (tenths / 600) % 60;
    let seconds = (tenths / 10) % 60;
    format!("{hours:3}:{minutes:02}:{seconds:02}.{}", tenths % 10)
}

/// Module duration as `MM:SS`, rounded to the nearest second.
pub fn format_duration(duration_ms: u32) -> String {
    let rounded = duration_ms.saturating_add(500);
    format!("{:02}:{:02}", rounded / 60_000, (rounded / 1000) % 60)
}

/// One character per channel: digit when audible, `-` when muted.
pub fn channel_flags(states: impl IntoIterator<Item = ChannelState>) -> String {
    states
        .into_iter()
        .enumerate()
        .map(|(index, state)| {
            if state.is_muted() {
                '-'
            } else {
                char::from_digit(((index + 1) % 10) as u32, 10).unwrap_or('?')
            }
        })
        .collect()
}

fn state_label(state: PlaybackState) -> &'static str {
    match state {
        PlaybackState::Playing => "PLAY ",
        PlaybackState::Paused => "PAUSE",
        PlaybackState::Stopped => "STOP ",
    }
}

/// Print the module summary shown before playback.
pub fn describe_module(info: &ModuleInfo) -> String {
    format!(
        "Name:        {}\n\
         Format:      {}\n\
         Duration:    {}\n\
         Patterns:    {}\n\
         Tracks:      {}\n\
         Channels:    {}\n\
         Instruments: {}\n\
         Samples:     {}\n\
         Length:      {} patterns",
        if info.name.is_empty() { "-" } else { &info.name },
        info.format,
        format_duration(info.duration_ms),
        info.patterns,
        info.tracks,
        info.channels,
        info.instruments,
        info.samples,
        info.length,
    )
}

/// Render the status line.
pub fn status_line(
    state: PlaybackState,
    frame: &FrameInfo,
    duration_ms: u32,
    strip: &ChannelStrip,
) -> String {
    format!(
        "{} {} / {}  pos {:03} pat {:03} row {:02}/{:02}  spd {} bpm {:3}  [{}]",
        state_label(state),
        format_elapsed(frame.time_ms),
        format_duration(duration_ms),
        frame.position,
        frame.pattern,
        frame.row,
        frame.rows,
        frame.speed,
        frame.bpm,
        channel_flags(strip.iter().map(|(_, state)| state)),
    )
}
