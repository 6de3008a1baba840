//! Supported locales and their fixed user-facing texts
//!
//! The locale set is closed: Swedish (the designated default), Spanish and
//! English. Every string the Rule Engine or the Policy Composer can emit has
//! a translation here; unknown locale tags fall back to the default rather
//! than failing.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A supported conversation locale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    /// Swedish (default)
    #[default]
    Sv,
    /// Spanish
    Es,
    /// English
    En,
}

impl Locale {
    /// All supported locales, in a stable order.
    pub const ALL: [Locale; 3] = [Locale::Sv, Locale::Es, Locale::En];

    /// Parse a locale tag, falling back to the default for unknown tags.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "sv" => Locale::Sv,
            "es" => Locale::Es,
            "en" => Locale::En,
            _ => Locale::default(),
        }
    }

    /// The seeded assistant greeting shown at conversation start.
    pub fn greeting(self) -> &'static str {
        match self {
            Locale::Sv => {
                "Hej. Jag är Neuroljus. Jag lyssnar utan att anta. Vad behöver du idag?"
            }
            Locale::Es => "Hola. Soy Neuroljus. Escucho sin suponer. ¿Qué necesitas hoy?",
            Locale::En => {
                "Hello. I am Neuroljus. I listen without assuming. What do you need today?"
            }
        }
    }

    /// Head line for the sensory-overload rule.
    pub fn overload(self) -> &'static str {
        match self {
            Locale::Sv => {
                "Sensorisk överbelastning uppfattad. Sänk ljus/ljud och ta en kort paus."
            }
            Locale::Es => {
                "Se percibe sobrecarga sensorial. Bajemos luz/sonido y tomemos una pausa."
            }
            Locale::En => "Sensory overload detected. Lower light/sound and take a short break.",
        }
    }

    /// Head line for the high-noise rule.
    pub fn noise(self) -> &'static str {
        match self {
            Locale::Sv => {
                "Omgivningen verkar bullrig. Förslag: hörlurar eller en tystare plats."
            }
            Locale::Es => {
                "El entorno parece ruidoso. Sugerencia: auriculares o un lugar más silencioso."
            }
            Locale::En => "The environment seems noisy. Suggestion: headphones or a quieter space.",
        }
    }

    /// Head line for the hunger rule.
    pub fn hunger(self) -> &'static str {
        match self {
            Locale::Sv => "Signal om hunger uppfattad. Förslag: vatten + enkelt mellanmål.",
            Locale::Es => "Señal de hambre detectada. Propuesta: agua + colación simple.",
            Locale::En => "Hunger signal detected. Suggest: water + a simple snack.",
        }
    }

    /// Head line for the needs-rest rule.
    pub fn rest(self) -> &'static str {
        match self {
            Locale::Sv => "Behov av vila uppfattat. Vi kan pausa och återuppta sen.",
            Locale::Es => "Necesidad de descanso detectada. Podemos pausar y retomar.",
            Locale::En => "Need for rest detected. We can pause and resume.",
        }
    }

    /// No-signal fallback line.
    pub fn fallback(self) -> &'static str {
        match self {
            Locale::Sv => "Jag lyssnar. Vad vill du uppnå de närmaste 20 minuterna?",
            Locale::Es => "Te escucho. ¿Qué resultado quieres en los próximos 20 minutos?",
            Locale::En => "I’m listening. What outcome do you want in the next 20 minutes?",
        }
    }

    /// Prefix for the enumerated channel observations. Marks them as
    /// observations, never a diagnosis.
    pub fn observed_prefix(self) -> &'static str {
        match self {
            Locale::Sv => "Observerat (ingen diagnos):",
            Locale::Es => "Observado (sin diagnóstico):",
            Locale::En => "Observed (not a diagnosis):",
        }
    }

    /// Fixed set of reversible, low-stimulus options.
    pub fn options_line(self) -> &'static str {
        match self {
            Locale::Sv => {
                "Förslag: sänk ljus eller ljud, ta en kort paus, eller byt till en lugnare plats."
            }
            Locale::Es => {
                "Opciones: bajar luz o sonido, tomar una pausa corta, o ir a un lugar más tranquilo."
            }
            Locale::En => {
                "Options: lower light or sound, take a short break, or move to a calmer space."
            }
        }
    }

    /// Closing clarifying question.
    pub fn closing_question(self) -> &'static str {
        match self {
            Locale::Sv => "Vad skulle hjälpa mest just nu?",
            Locale::Es => "¿Qué ayudaría más ahora mismo?",
            Locale::En => "What would help most right now?",
        }
    }

    /// Tone instruction injected into the composed system instruction.
    pub fn tone_instruction(self) -> &'static str {
        match self {
            Locale::Sv => "Svara på enkel, tydlig svenska. Korta meningar, lugn ton.",
            Locale::Es => "Responde en español claro y técnico; frases cortas, tono sereno.",
            Locale::En => "Respond in clear, plain English; short sentences, calm tone.",
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locale::Sv => write!(f, "sv"),
            Locale::Es => write!(f, "es"),
            Locale::En => write!(f, "en"),
        }
    }
}
