//! Deterministic local rule engine
//!
//! `respond` is the offline/degraded-mode fallback: a pure, total function
//! from a signal snapshot and a locale to a non-empty supportive text. It
//! never performs I/O and never depends on the external model, so the local
//! path keeps working when the delegated path cannot.
//!
//! Precedence is fixed, first match wins: sensory overload, then high
//! noise, then hunger, then needs-rest, then the no-signal fallback. When
//! any channel has ever reported, the head line is followed by the observed
//! values (in stable channel order, explicitly marked non-diagnostic), a
//! fixed set of reversible low-stimulus options, and one clarifying
//! question.

use crate::locale::Locale;
use crate::signals::SignalSnapshot;

/// Produce the deterministic local response for a snapshot.
pub fn respond(snapshot: &SignalSnapshot, locale: Locale) -> String {
    let flags = snapshot.flags;
    let head = if flags.sensory_overload {
        locale.overload()
    } else if flags.high_noise {
        locale.noise()
    } else if flags.hunger {
        locale.hunger()
    } else if flags.needs_rest {
        locale.rest()
    } else {
        locale.fallback()
    };

    if snapshot.values.is_empty() {
        return head.to_string();
    }

    // BTreeMap iteration gives the stable channel enumeration order.
    let observed: Vec<String> = snapshot
        .values
        .iter()
        .map(|(channel, value)| format!("{channel} {value:.1}"))
        .collect();

    format!(
        "{head}\n{} {}.\n{}\n{}",
        locale.observed_prefix(),
        observed.join(", "),
        locale.options_line(),
        locale.closing_question()
    )
}
