//! The three-level emotion vocabulary: six core emotions, each with primary
//! refinements, some of which carry secondary refinements. Labels are
//! presentation data, not an enum: entries store whichever words the patient
//! picked, and the same word may appear under more than one core.

use std::sync::OnceLock;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PrimaryEmotion {
    pub name: &'static str,
    pub secondaries: &'static [&'static str],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CoreEmotion {
    pub name: &'static str,
    /// Color token used by clients to tint anything carrying this core.
    pub color: &'static str,
    pub primaries: &'static [PrimaryEmotion],
}

const fn primary(name: &'static str, secondaries: &'static [&'static str]) -> PrimaryEmotion {
    PrimaryEmotion { name, secondaries }
}

pub static EMOTION_HIERARCHY: [CoreEmotion; 6] = [
    CoreEmotion {
        name: "Happy",
        color: "green",
        primaries: &[
            primary("Peaceful", &["Curious", "Inquisitive"]),
            primary("Interested", &[]),
            primary("Content", &["Open", "Sensitive"]),
            primary("Joyful", &[]),
            primary("Proud", &["Confident", "Relieved", "Important"]),
            primary("Accepted", &["Fulfilled"]),
            primary("Enthusiastic", &["Thrilled", "Respected", "Passionate"]),
            primary("Optimistic", &["Hopeful", "Inspired"]),
            primary(
                "Excited",
                &["Energetic", "Eager", "Awestruck", "Thrown", "No Words", "Confused"],
            ),
            primary("Loving", &[]),
            primary("Thankful", &[]),
        ],
    },
    CoreEmotion {
        name: "Sad",
        color: "blue",
        primaries: &[
            primary("Lonely", &["Abandoned", "Left Out"]),
            primary("Guilty", &["Ashamed", "Remorseful", "Powerless"]),
            primary("Depressed", &["Empty", "Undervalued", "Grief"]),
            primary("Hurt", &["Disappointed", "Forgotten", "In My Feelings"]),
            primary("Tired", &["Numb", "Don't Care"]),
        ],
    },
    CoreEmotion {
        name: "Disgusted",
        color: "orange",
        primaries: &[
            primary("Avoiding", &["Repelled", "Hesitant"]),
            primary("Awful", &["Nauseated", "Detest", "Appalled"]),
            primary(
                "Outraged",
                &["Uncomfortable", "Judgmental", "Loathing", "Embarrassed", "Ridiculed"],
            ),
        ],
    },
    CoreEmotion {
        name: "Mad",
        color: "red",
        primaries: &[
            primary("Let Down", &["Salty", "Bitter"]),
            primary("Humiliated", &["Disrespected", "Not Heard"]),
            primary("Angry", &["Frustrated", "Hateful", "Betrayed", "Violated"]),
            primary("Aggressive", &["Offended", "Resentful", "Hostile"]),
            primary("Furious", &["Rage", "Heated", "Annoyed"]),
            primary("Weak", &["Worthless", "Skeptical", "Insulted"]),
            primary("Nervous", &["Panicked", "Provoked"]),
        ],
    },
    CoreEmotion {
        name: "Scared",
        color: "purple",
        primaries: &[
            primary("Fearful", &["Terrified", "Threatened"]),
            primary("Anxious", &["Worried", "Overwhelmed", "Uneasy"]),
            primary(
                "Insecure",
                &["Inadequate", "Inferior", "Excluded", "Alienated", "Vulnerable"],
            ),
            primary("Rejected", &["Worthless"]),
            primary("Stressed", &[]),
        ],
    },
    CoreEmotion {
        name: "Surprised",
        color: "yellow",
        primaries: &[
            primary("Startled", &["Shook", "Stunned"]),
            primary("Amazed", &["Astonished", "Awestruck"]),
            primary("Confused", &[]),
        ],
    },
];

/// Every word in the hierarchy (core, primary and secondary names), deduplicated
/// while keeping first-appearance order. Used for filter pickers and nothing
/// else; entry words are deliberately not validated against it.
pub fn all_emotion_words() -> &'static [&'static str] {
    static WORDS: OnceLock<Vec<&'static str>> = OnceLock::new();
    WORDS.get_or_init(|| {
        let mut seen = std::collections::HashSet::new();
        let mut words = Vec::new();
        for core in &EMOTION_HIERARCHY {
            for word in std::iter::once(core.name).chain(core.primaries.iter().flat_map(|p| {
                std::iter::once(p.name).chain(p.secondaries.iter().copied())
            })) {
                if seen.insert(word) {
                    words.push(word);
                }
            }
        }
        words
    })
}

/// Looks up the core emotion with the given name, case-sensitively. Clients
/// use this to color a badge after the entry's first mood word.
pub fn core_for_label(label: &str) -> Option<&'static CoreEmotion> {
    EMOTION_HIERARCHY.iter().find(|core| core.name == label)
}
