//! System-instruction composition for the delegated path
//!
//! `compose` is a pure, deterministic function from conversation context to
//! one constrained instruction text. The section order is fixed: style
//! policy, locale tone, audience framing, knowledge modules, serialized
//! context, initiative instruction, output-format contract, hard safety
//! rules. Only the serialized context substrings are ever truncated, so the
//! trailing safety sections always arrive intact.

pub mod knowledge;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Write as _;
use std::str::FromStr;

use crate::locale::Locale;
use crate::memory::Memory;
use crate::signals::{SignalChannel, SignalSnapshot};

/// Default hard cap on each serialized context substring, in characters.
pub const DEFAULT_CONTEXT_MAX_CHARS: usize = 1500;

/// Default heart-rate threshold above which the pain-triage module joins.
pub const DEFAULT_PAIN_CUE_HEART_RATE: f64 = 110.0;

/// Quality floor under which (with data present) the crisis module joins.
const COLLAPSED_QUALITY: f64 = 0.2;

/// Who the response is framed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    /// Clinical professional
    Clinician,
    /// Caregiver (default)
    #[default]
    Caregiver,
    /// Autistic adult / self-advocate
    Adult,
    /// Young person
    Youth,
}

impl Audience {
    fn framing(self) -> &'static str {
        match self {
            Audience::Clinician => {
                "Audience=clinician. Use concise clinical vocabulary; reference mechanisms briefly; never overstate certainty."
            }
            Audience::Caregiver => {
                "Audience=caregiver. Practical tone; environment adjustments; short steps; communication scripts."
            }
            Audience::Adult => {
                "Audience=autistic adult/self-advocate. Collaborative; autonomy-respecting; offer options; ask consent to explore."
            }
            Audience::Youth => "Audience=youth. Simple sentences; no jargon; one step at a time.",
        }
    }
}

impl FromStr for Audience {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clinician" => Ok(Audience::Clinician),
            "caregiver" => Ok(Audience::Caregiver),
            "adult" => Ok(Audience::Adult),
            "youth" => Ok(Audience::Youth),
            other => Err(format!(
                "unknown audience '{other}' (expected clinician, caregiver, adult or youth)"
            )),
        }
    }
}

impl fmt::Display for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Audience::Clinician => "clinician",
            Audience::Caregiver => "caregiver",
            Audience::Adult => "adult",
            Audience::Youth => "youth",
        };
        write!(f, "{s}")
    }
}

/// Tunable composition parameters, carried from config.
#[derive(Debug, Clone, Copy)]
pub struct ComposeParams {
    /// Hard cap on each serialized context substring
    pub context_max_chars: usize,
    /// Heart-rate threshold for the pain-triage module
    pub pain_cue_heart_rate: f64,
}

impl Default for ComposeParams {
    fn default() -> Self {
        Self {
            context_max_chars: DEFAULT_CONTEXT_MAX_CHARS,
            pain_cue_heart_rate: DEFAULT_PAIN_CUE_HEART_RATE,
        }
    }
}

/// Everything the composer needs for one instruction.
#[derive(Debug, Clone)]
pub struct ComposeInput<'a> {
    /// Active conversation locale
    pub locale: Locale,
    /// Audience framing
    pub audience: Audience,
    /// Current effective signal snapshot
    pub signals: &'a SignalSnapshot,
    /// Persisted user memory
    pub memory: &'a Memory,
    /// Whether unsolicited suggestions are permitted
    pub allow_initiative: bool,
}

/// Build the single system instruction for the external model.
///
/// Pure and deterministic given its inputs; performs no I/O.
pub fn compose(input: &ComposeInput<'_>, params: &ComposeParams) -> String {
    let mut out = String::with_capacity(4096);

    out.push_str(knowledge::STYLE_POLICY);
    out.push_str("\n\n");
    out.push_str(input.locale.tone_instruction());
    out.push('\n');
    out.push_str(input.audience.framing());
    out.push_str("\n\n");

    out.push_str("You are Neuroljus. Use the following knowledge when relevant:\n");
    let _ = writeln!(
        out,
        "- Sensory overload heuristics: {}",
        knowledge::KB_SENSORY_OVERLOAD
    );
    let _ = writeln!(
        out,
        "- Communication strategies: {}",
        knowledge::KB_COMMUNICATION
    );
    if pain_cue_present(input.signals, params.pain_cue_heart_rate) {
        let _ = writeln!(out, "- Pain triage: {}", knowledge::KB_PAIN_TRIAGE);
    }
    if crisis_cue_present(input.signals) {
        let _ = writeln!(out, "- Crisis escalation: {}", knowledge::KB_CRISIS_ESCALATION);
    }

    let signals_json = truncate_for_context(
        &serde_json::to_string(input.signals).unwrap_or_else(|_| "{}".to_string()),
        params.context_max_chars,
    )
    .to_string();
    let memory_json = truncate_for_context(
        &serde_json::to_string(input.memory).unwrap_or_else(|_| "{}".to_string()),
        params.context_max_chars,
    )
    .to_string();

    out.push_str("\nContext:\n");
    let _ = writeln!(out, "- Signals: {signals_json}");
    let _ = writeln!(out, "- Lightweight memory: {memory_json}");
    let initiative = if input.allow_initiative {
        "Allowed to gently propose options if clearly useful."
    } else {
        "Do not propose unsolicited suggestions."
    };
    let _ = writeln!(out, "- Initiative: {initiative}");

    out.push_str(
        "\nResponse format:\n\
         1) Brief acknowledgement (1 sentence).\n\
         2) If applicable: \"Hypothesis (confidence: low/medium/high): ... Because ...\"\n\
         3) \"Next 5-20 min:\" 2-4 bullet steps.\n\
         4) Optional: \"Ask:\" one clarifying question.\n",
    );

    out.push_str(
        "\nHard rules:\n\
         - Non-diagnostic. Avoid \"you have X\". Prefer \"may be related to...\".\n\
         - No prescriptions/dosages.\n\
         - If risk detected (self-harm, harm, severe symptoms): recommend urgent professional help.\n\
         - Be concise. Stay professional and supportive.\n",
    );

    out
}

/// Heart rate past the pain cue threshold pulls in the pain-triage module.
fn pain_cue_present(signals: &SignalSnapshot, threshold: f64) -> bool {
    signals
        .values
        .get(&SignalChannel::HeartRate)
        .is_some_and(|hr| *hr > threshold)
}

/// Overload together with high noise, or collapsed quality with data
/// present, pulls in the crisis-escalation module.
fn crisis_cue_present(signals: &SignalSnapshot) -> bool {
    (signals.flags.sensory_overload && signals.flags.high_noise)
        || (signals.quality < COLLAPSED_QUALITY && !signals.values.is_empty())
}

/// Cut a serialized context substring to at most `max_chars` characters,
/// never splitting a UTF-8 character. Only context substrings are ever
/// truncated; the instruction grammar around them stays intact.
pub fn truncate_for_context(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn compose_with(signals: &SignalSnapshot, memory: &Memory) -> String {
        compose(
            &ComposeInput {
                locale: Locale::En,
                audience: Audience::Caregiver,
                signals,
                memory,
                allow_initiative: true,
            },
            &ComposeParams::default(),
        )
    }

    #[test]
    fn test_section_order_is_fixed() {
        let snapshot = SignalSnapshot::default();
        let memory = Memory::default();
        let text = compose_with(&snapshot, &memory);

        let positions: Vec<usize> = [
            "ROLE",
            Locale::En.tone_instruction(),
            "Audience=caregiver",
            "SENSORY OVERLOAD",
            "COMMUNICATION SUPPORT",
            "Context:",
            "- Initiative:",
            "Response format:",
            "Hard rules:",
        ]
        .iter()
        .map(|needle| text.find(needle).unwrap_or_else(|| panic!("missing {needle}")))
        .collect();

        for pair in positions.windows(2) {
            assert!(pair[0] < pair[1], "sections out of order");
        }
    }

    #[test]
    fn test_safety_rules_always_present() {
        let mut snapshot = SignalSnapshot::default();
        snapshot.flags.sensory_overload = true;
        let mut memory = Memory::default();
        memory.preferred_name = Some("Alex".to_string());

        let text = compose_with(&snapshot, &memory);
        assert!(text.contains("Non-diagnostic."));
        assert!(text.contains("No prescriptions/dosages."));
        assert!(text.contains("urgent professional help"));
    }

    #[test]
    fn test_pain_triage_joins_above_threshold() {
        let mut snapshot = SignalSnapshot::default();
        snapshot.values.insert(SignalChannel::HeartRate, 105.0);
        let memory = Memory::default();
        assert!(!compose_with(&snapshot, &memory).contains("PAIN TRIAGE"));

        snapshot.values.insert(SignalChannel::HeartRate, 120.0);
        assert!(compose_with(&snapshot, &memory).contains("PAIN TRIAGE"));
    }

    #[test]
    fn test_crisis_module_heuristics() {
        let memory = Memory::default();

        let mut snapshot = SignalSnapshot::default();
        snapshot.flags.sensory_overload = true;
        assert!(!compose_with(&snapshot, &memory).contains("CRISIS ESCALATION"));

        snapshot.flags.high_noise = true;
        assert!(compose_with(&snapshot, &memory).contains("CRISIS ESCALATION"));

        let mut collapsed = SignalSnapshot::default();
        collapsed.values.insert(SignalChannel::Noise, 95.0);
        collapsed.quality = 0.05;
        assert!(compose_with(&collapsed, &memory).contains("CRISIS ESCALATION"));

        // Collapsed quality without any observation stays quiet.
        let mut empty = SignalSnapshot::default();
        empty.quality = 0.05;
        assert!(!compose_with(&empty, &memory).contains("CRISIS ESCALATION"));
    }

    #[test]
    fn test_initiative_variants() {
        let snapshot = SignalSnapshot::default();
        let memory = Memory::default();

        let with = compose(
            &ComposeInput {
                locale: Locale::Sv,
                audience: Audience::Adult,
                signals: &snapshot,
                memory: &memory,
                allow_initiative: true,
            },
            &ComposeParams::default(),
        );
        assert!(with.contains("Allowed to gently propose options"));

        let without = compose(
            &ComposeInput {
                locale: Locale::Sv,
                audience: Audience::Adult,
                signals: &snapshot,
                memory: &memory,
                allow_initiative: false,
            },
            &ComposeParams::default(),
        );
        assert!(without.contains("Do not propose unsolicited suggestions."));
    }

    #[test]
    fn test_memory_contents_reach_context() {
        let snapshot = SignalSnapshot::default();
        let mut memory = Memory::default();
        memory.avoid_words = BTreeSet::from(["shouting".to_string()]);

        let text = compose_with(&snapshot, &memory);
        assert!(text.contains("shouting"));
    }

    #[test]
    fn test_oversized_memory_is_truncated_but_tail_sections_survive() {
        let snapshot = SignalSnapshot::default();
        let mut memory = Memory::default();
        for i in 0..500 {
            memory.known_triggers.insert(format!("trigger-{i:04}"));
        }

        let text = compose(
            &ComposeInput {
                locale: Locale::En,
                audience: Audience::Caregiver,
                signals: &snapshot,
                memory: &memory,
                allow_initiative: true,
            },
            &ComposeParams {
                context_max_chars: 200,
                ..Default::default()
            },
        );

        let memory_line = text
            .lines()
            .find(|l| l.starts_with("- Lightweight memory:"))
            .unwrap();
        assert!(memory_line.len() < 200 + "- Lightweight memory: ".len() + 8);
        assert!(text.contains("Hard rules:"));
        assert!(text.trim_end().ends_with("Stay professional and supportive."));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let s = "åäö".repeat(10);
        let cut = truncate_for_context(&s, 5);
        assert_eq!(cut.chars().count(), 5);
        assert_eq!(cut, "åäöåä");
    }

    #[test]
    fn test_compose_is_deterministic() {
        let mut snapshot = SignalSnapshot::default();
        snapshot.values.insert(SignalChannel::Noise, 55.0);
        let memory = Memory::default();
        assert_eq!(compose_with(&snapshot, &memory), compose_with(&snapshot, &memory));
    }

    #[test]
    fn test_audience_parse() {
        assert_eq!("Clinician".parse::<Audience>().unwrap(), Audience::Clinician);
        assert_eq!(" youth ".parse::<Audience>().unwrap(), Audience::Youth);
        assert!("coach".parse::<Audience>().is_err());
    }
}
