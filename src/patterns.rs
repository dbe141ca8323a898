//! Compiled textual pattern sets for the safety components.
//!
//! Every registry is compiled once on first use and shared read-only across
//! all sessions. Entries are tagged with language, category, and severity so
//! the consuming component can report which lexicon fired.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

fn ci(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .expect("invalid built-in pattern")
}

// ---------------------------------------------------------------------------
// Safety gate: crisis / violence pre-check
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GateSeverity {
    High,
    Crisis,
}

pub struct GatePattern {
    pub regex: Regex,
    pub signal: &'static str,
    pub lang: &'static str,
    pub category: &'static str,
    pub severity: GateSeverity,
}

pub static GATE_PATTERNS: Lazy<Vec<GatePattern>> = Lazy::new(|| {
    let p = |pattern: &str,
             signal: &'static str,
             lang: &'static str,
             category: &'static str,
             severity: GateSeverity| GatePattern {
        regex: ci(pattern),
        signal,
        lang,
        category,
        severity,
    };
    vec![
        // Russian self-harm
        p(
            r"покончить\s*(с\s*собой|жизнь)",
            "self_harm_ru",
            "ru",
            "self_harm",
            GateSeverity::Crisis,
        ),
        p(r"суицид", "suicide_ru", "ru", "self_harm", GateSeverity::Crisis),
        p(
            r"(хочу|хотел[аи]?)\s*(умереть|сдохнуть|не\s*жить)",
            "death_wish_ru",
            "ru",
            "self_harm",
            GateSeverity::Crisis,
        ),
        p(
            r"повеситься|порезать\s*вены|прыгну\s*с",
            "method_ru",
            "ru",
            "self_harm",
            GateSeverity::Crisis,
        ),
        p(
            r"(убить|убью)\s*(себя)",
            "self_harm_direct_ru",
            "ru",
            "self_harm",
            GateSeverity::Crisis,
        ),
        p(
            r"не\s*вижу\s*смысла\s*(жить|в\s*жизни)",
            "hopelessness_ru",
            "ru",
            "self_harm",
            GateSeverity::High,
        ),
        // English self-harm
        p(
            r"kill\s*(myself|me)",
            "self_harm_en",
            "en",
            "self_harm",
            GateSeverity::Crisis,
        ),
        p(
            r"(want|going)\s*to\s*(die|end\s*(it|my\s*life))",
            "death_wish_en",
            "en",
            "self_harm",
            GateSeverity::Crisis,
        ),
        p(r"suicid(e|al)", "suicide_en", "en", "self_harm", GateSeverity::Crisis),
        p(
            r"(cut|hang|shoot|overdose)\s*(myself|me)",
            "method_en",
            "en",
            "self_harm",
            GateSeverity::Crisis,
        ),
        p(
            r"no\s*reason\s*to\s*live",
            "hopelessness_en",
            "en",
            "self_harm",
            GateSeverity::High,
        ),
        // Spanish self-harm
        p(r"suicidarme", "suicide_es", "es", "self_harm", GateSeverity::Crisis),
        p(
            r"quiero\s*morir(me)?",
            "death_wish_es",
            "es",
            "self_harm",
            GateSeverity::Crisis,
        ),
        p(r"matarme", "self_harm_es", "es", "self_harm", GateSeverity::Crisis),
        // Violence toward others
        p(
            r"(убить|убью)\s+(его|её|их|человека|людей)",
            "violence_ru",
            "ru",
            "violence",
            GateSeverity::Crisis,
        ),
        p(
            r"(kill|hurt|harm)\s+(someone|him|her|them|people)\s*(bad|serious)?",
            "violence_en",
            "en",
            "violence",
            GateSeverity::Crisis,
        ),
    ]
});

// ---------------------------------------------------------------------------
// Safety classifier layer 1: fine-grained RED / YELLOW registries
// ---------------------------------------------------------------------------

pub struct ClassifierPattern {
    pub regex: Regex,
    pub protocol_id: &'static str,
    pub signal: &'static str,
}

pub static RED_PATTERNS: Lazy<Vec<ClassifierPattern>> = Lazy::new(|| {
    let p = |pattern: &str, protocol_id: &'static str, signal: &'static str| ClassifierPattern {
        regex: ci(pattern),
        protocol_id,
        signal,
    };
    vec![
        // S1: suicide / self-harm with explicit intent
        p(r"хочу\s+умереть", "S1", "suicide_explicit_ru"),
        p(r"покончить\s+с\s+собой", "S1", "suicide_explicit_ru"),
        p(r"суицид", "S1", "suicide_keyword_ru"),
        p(r"убить\s+себя", "S1", "suicide_explicit_ru"),
        p(r"не\s+хочу\s+жить", "S1", "suicide_wish_ru"),
        p(r"лучше\s+бы\s+меня\s+не\s+было", "S1", "suicide_wish_ru"),
        p(r"kill\s+my\s*self", "S1", "suicide_explicit_en"),
        p(r"want\s+to\s+die", "S1", "suicide_explicit_en"),
        p(r"end\s+my\s+life", "S1", "suicide_explicit_en"),
        p(r"реж[уе]\s+себ[яе]", "S1", "self_harm_ru"),
        p(r"причин(ить|яю)\s+себе\s+(боль|вред)", "S1", "self_harm_ru"),
        p(r"hurt\s+my\s*self", "S1", "self_harm_en"),
        // S2: violence toward others
        p(r"убь[юёе]\s+(его|её|их|тебя)", "S2", "violence_threat_ru"),
        p(r"хочу\s+навредить", "S2", "violence_intent_ru"),
        p(r"kill\s+(him|her|them)", "S2", "violence_threat_en"),
    ]
});

pub static YELLOW_PATTERNS: Lazy<Vec<ClassifierPattern>> = Lazy::new(|| {
    let p = |pattern: &str, protocol_id: &'static str, signal: &'static str| ClassifierPattern {
        regex: ci(pattern),
        protocol_id,
        signal,
    };
    vec![
        // S3: psychosis signals
        p(r"голоса\s+говорят", "S3", "psychosis_hallucination_ru"),
        p(r"за\s+мной\s+следят", "S3", "psychosis_paranoia_ru"),
        p(r"я\s+избранн", "S3", "psychosis_grandiosity_ru"),
        p(r"voices\s+(are\s+)?telling\s+me", "S3", "psychosis_hallucination_en"),
        // S6: domestic violence
        p(r"(муж|парень|партн[её]р)\s+(бь[её]т|удари)", "S6", "dv_physical_ru"),
        p(r"бь[её]т\s+меня", "S6", "dv_physical_ru"),
        p(r"боюсь\s+партн[её]р", "S6", "dv_fear_ru"),
        p(r"(husband|boyfriend|partner)\s+(hits|hit|beats)\s+me", "S6", "dv_physical_en"),
    ]
});

// ---------------------------------------------------------------------------
// Output safety backstop: diagnosis / medication / pressure
// ---------------------------------------------------------------------------

pub struct OutputPattern {
    pub regex: Regex,
    pub reason: &'static str,
}

pub static OUTPUT_SAFETY_PATTERNS: Lazy<Vec<OutputPattern>> = Lazy::new(|| {
    let p = |pattern: &str, reason: &'static str| OutputPattern {
        regex: ci(pattern),
        reason,
    };
    vec![
        // Diagnosis
        p(
            r"(у\s*вас|у\s*тебя)\s*(депресси[яи]|тревожное\s*расстройство|птср|обсесси|биполярн)",
            "diagnosis",
        ),
        p(r"(ваш|твой)\s*диагноз", "diagnosis"),
        p(
            r"you\s*(have|suffer\s*from)\s*(depression|anxiety\s*disorder|ptsd|ocd|bipolar)",
            "diagnosis",
        ),
        p(r"(clinical|diagnosed\s*with)\s*(depression|anxiety|disorder)", "diagnosis"),
        // Medication
        p(
            r"(антидепрессант|транквилизатор|нейролептик|снотворн|седативн)",
            "medication",
        ),
        p(
            r"(принять|принимать|назначить|выпить)\s*(таблетк|лекарств|препарат)",
            "medication",
        ),
        p(
            r"(antidepressant|tranquilizer|benzodiazepine|ssri|medication|prescri)",
            "medication",
        ),
        p(r"(take|try)\s*(pills|medication|drugs)", "medication"),
        p(r"need\s*medication", "medication"),
        // Coercive pressure
        p(
            r"(обязан|должен|немедленно|прямо\s*сейчас)\s*(сделай|выполни|начни)",
            "pressure",
        ),
        p(r"you\s*(must|have\s*to|need\s*to)\s*(do\s*this|start|immediately)", "pressure"),
    ]
});

// ---------------------------------------------------------------------------
// Generation validator lexicons
// ---------------------------------------------------------------------------

pub static DIAGNOSIS_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\b(у вас|у тебя)\s+(депресси|тревожн|биполяр|шизофрен|птср|окр|bpd|adhd|ocd)",
        r"\byou have\s+(depression|anxiety|bipolar|schizophrenia|ptsd|ocd|bpd|adhd)\b",
        r"\bдиагноз\b",
        r"\bdiagnos(e|is|ed)\b",
    ]
    .iter()
    .map(|p| ci(p))
    .collect()
});

pub static MEDICATION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\b(прими|принимай|назначаю|рекомендую)\s+(таблетк|препарат|лекарств|антидепрессант)",
        r"\b(дозировк|дозу)\b",
        r"\b(take|prescribe|recommend)\s+(medication|pills|antidepressant|benzodiazepine)\b",
        r"\b(dosage|milligrams|mg)\b",
    ]
    .iter()
    .map(|p| ci(p))
    .collect()
});

pub static HARMFUL_LEXICON_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"как\s+(причинить|навредить)\s+себе",
        r"how\s+to\s+(harm|hurt|kill)\s+(yourself|myself)",
        r"способ(ы|ов)?\s+(суицид|самоубийств)",
        r"method(s)?\s+of\s+(suicide|self.harm)",
    ]
    .iter()
    .map(|p| ci(p))
    .collect()
});

// ---------------------------------------------------------------------------
// Style marker word lists (substring match on lowercased text)
// ---------------------------------------------------------------------------

pub const BANNED_SAFETY_MARKERS: &[&str] = &[
    "у вас депрессия",
    "у вас биполяр",
    "прими",
    "таблетк",
    "дозировк",
    "как причинить себе",
    "how to harm yourself",
];

pub const SARCASM_MARKERS: &[&str] = &[
    "ну да, конечно",
    "гениально",
    "супер идея",
    "brilliant",
    "sure, great",
];

pub const EMPATHY_MARKERS: &[&str] = &[
    "понимаю",
    "это тяжело",
    "слышу вас",
    "слышу тебя",
    "вижу, что",
    "i hear you",
    "that sounds hard",
    "you're not alone",
];

pub const CTA_MARKERS: &[&str] = &["хотите", "давайте", "готовы", "оцените", "?"];

pub const ACTION_MARKERS: &[&str] = &[
    "сделайте",
    "напишите",
    "оцените",
    "выберите",
    "назовите",
    "попробу",
    "давайте",
    "tell me",
    "rate",
    "choose",
    "try",
    "let's",
];

pub const HUMOR_MARKERS: &[&str] = &["😂", "🤣", "lol", "haha", "хаха"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_patterns_match_expected_languages() {
        let hit = GATE_PATTERNS
            .iter()
            .find(|p| p.regex.is_match("I want to die"))
            .expect("english death wish should match");
        assert_eq!(hit.lang, "en");
        assert_eq!(hit.severity, GateSeverity::Crisis);

        assert!(GATE_PATTERNS.iter().any(|p| p.regex.is_match("суицид")));
        assert!(GATE_PATTERNS.iter().any(|p| p.regex.is_match("quiero morir")));
    }

    #[test]
    fn gate_matching_is_case_insensitive() {
        assert!(GATE_PATTERNS.iter().any(|p| p.regex.is_match("SUICIDAL")));
        assert!(GATE_PATTERNS.iter().any(|p| p.regex.is_match("СУИЦИД")));
    }

    #[test]
    fn red_patterns_carry_protocol_ids() {
        let hit = RED_PATTERNS
            .iter()
            .find(|p| p.regex.is_match("хочу умереть"))
            .unwrap();
        assert_eq!(hit.protocol_id, "S1");

        let violence = RED_PATTERNS
            .iter()
            .find(|p| p.regex.is_match("kill them"))
            .unwrap();
        assert_eq!(violence.protocol_id, "S2");
    }

    #[test]
    fn yellow_patterns_are_distinct_from_red() {
        let text = "муж бьёт меня";
        assert!(YELLOW_PATTERNS.iter().any(|p| p.regex.is_match(text)));
        assert!(!RED_PATTERNS.iter().any(|p| p.regex.is_match(text)));
    }

    #[test]
    fn output_patterns_catch_diagnosis_and_medication() {
        let diag = OUTPUT_SAFETY_PATTERNS
            .iter()
            .find(|p| p.regex.is_match("you have depression"))
            .unwrap();
        assert_eq!(diag.reason, "diagnosis");

        let med = OUTPUT_SAFETY_PATTERNS
            .iter()
            .find(|p| p.regex.is_match("вам нужно принять таблетки"))
            .unwrap();
        assert_eq!(med.reason, "medication");
    }

    #[test]
    fn harmless_text_matches_nothing() {
        let text = "Сегодня я гулял в парке и слушал музыку.";
        assert!(!GATE_PATTERNS.iter().any(|p| p.regex.is_match(text)));
        assert!(!RED_PATTERNS.iter().any(|p| p.regex.is_match(text)));
        assert!(!YELLOW_PATTERNS.iter().any(|p| p.regex.is_match(text)));
        assert!(!OUTPUT_SAFETY_PATTERNS.iter().any(|p| p.regex.is_match(text)));
    }
}
