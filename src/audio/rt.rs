// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use thread_priority::{set_current_thread_priority, ThreadPriority, ThreadPriorityValue};
use tracing::{info, warn};

/// Default priority for the output stream thread when EARCON_THREAD_PRIORITY is unset.
const DEFAULT_STREAM_THREAD_PRIORITY: u8 = 70;

/// Reads EARCON_THREAD_PRIORITY (0-99) once; used when building the stream so we
/// don't touch env in the hot path.
pub fn stream_thread_priority() -> ThreadPriorityValue {
    let configured = std::env::var("EARCON_THREAD_PRIORITY")
        .ok()
        .and_then(|value| parse_priority(&value));

    match configured {
        Some(priority) => priority,
        // The default is within the 0-99 range the type accepts.
        None => ThreadPriorityValue::try_from(DEFAULT_STREAM_THREAD_PRIORITY).unwrap(),
    }
}

/// Parses a priority level. The type itself rejects anything above 99.
fn parse_priority(value: &str) -> Option<ThreadPriorityValue> {
    let level = value.trim().parse::<u8>().ok()?;
    ThreadPriorityValue::try_from(level).ok()
}

fn env_flag(name: &str) -> bool {
    match std::env::var(name) {
        Ok(value) => matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => false,
    }
}

/// Returns whether we should attempt RT (SCHED_FIFO) scheduling for the output
/// stream thread. Default: enabled. Opt out with EARCON_DISABLE_RT_AUDIO=1.
pub fn rt_audio_enabled() -> bool {
    !env_flag("EARCON_DISABLE_RT_AUDIO")
}

/// Raises the current thread's priority, once. Called from the first stream
/// callback so the priority lands on the thread that actually mixes.
pub fn configure_stream_thread_priority(
    priority: ThreadPriorityValue,
    rt_audio: bool,
    priority_set: &mut bool,
) {
    if *priority_set {
        return;
    }
    *priority_set = true;

    let tp = ThreadPriority::Crossplatform(priority);
    let _ = set_current_thread_priority(tp);

    #[cfg(unix)]
    if rt_audio {
        promote_to_sched_fifo(tp);
    }
    #[cfg(not(unix))]
    let _ = rt_audio;
}

/// Switches the current thread to the FIFO real-time scheduling policy.
#[cfg(unix)]
fn promote_to_sched_fifo(tp: ThreadPriority) {
    use thread_priority::unix::{
        set_thread_priority_and_policy, thread_native_id, RealtimeThreadSchedulePolicy,
        ThreadSchedulePolicy,
    };

    let result = set_thread_priority_and_policy(
        thread_native_id(),
        tp,
        ThreadSchedulePolicy::Realtime(RealtimeThreadSchedulePolicy::Fifo),
    );
    match result {
        Ok(()) => info!("Output stream thread promoted to SCHED_FIFO"),
        Err(e) => warn!(error = %e, "Unable to promote output stream thread to SCHED_FIFO"),
    }
}

#[cfg(test)]
mod test {
    use super::parse_priority;

    #[test]
    fn test_parse_priority_accepts_valid_levels() {
        assert!(parse_priority("0").is_some());
        assert!(parse_priority(" 99 ").is_some());
        assert!(parse_priority("70").is_some());
    }

    #[test]
    fn test_parse_priority_rejects_out_of_range() {
        assert!(parse_priority("100").is_none());
        assert!(parse_priority("-1").is_none());
        assert!(parse_priority("fast").is_none());
        assert!(parse_priority("").is_none());
    }
}
