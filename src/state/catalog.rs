//! Reference vocabulary of the game: modes, categories, intensity levels and prompts.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

/// Token a prompt text embeds where the second participant's name goes.
pub const PARTNER_PLACEHOLDER: &str = "[JOGADOR]";
/// Name used for the placeholder when the partner has no display name.
const FALLBACK_FIRST_NAME: &str = "Player";

/// Externally issued player identifier, opaque except for equality.
pub type PlayerId = String;

/// Top-level game variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Three or more players.
    Group,
    /// Exactly two players.
    Couple,
}

const GROUP_CATEGORIES: [Category; 6] = [
    Category::VerbalConfession,
    Category::Touch,
    Category::Kiss,
    Category::Performance,
    Category::BodyExposure,
    Category::IntimateContact,
];

const COUPLE_CATEGORIES: [Category; 8] = [
    Category::Reveal,
    Category::Act,
    Category::Roleplay,
    Category::Exposure,
    Category::Sensory,
    Category::Endurance,
    Category::Openness,
    Category::ThirdParties,
];

impl Mode {
    /// Every mode, in display order.
    pub const ALL: [Mode; 2] = [Mode::Group, Mode::Couple];

    /// Fixed category set available in this mode.
    pub fn categories(self) -> &'static [Category] {
        match self {
            Mode::Group => &GROUP_CATEGORIES,
            Mode::Couple => &COUPLE_CATEGORIES,
        }
    }

    /// Whether `count` participants satisfy this mode's headcount rule.
    pub fn accepts_headcount(self, count: usize) -> bool {
        match self {
            Mode::Group => count >= 3,
            Mode::Couple => count == 2,
        }
    }

    /// Most members an online room of this mode seats, if bounded.
    pub fn seat_limit(self) -> Option<usize> {
        match self {
            Mode::Group => None,
            Mode::Couple => Some(2),
        }
    }

    /// Storage representation, identical to the serde name.
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Group => "group",
            Mode::Couple => "couple",
        }
    }
}

/// Whether the room is played by real joined identities or by local fictional players.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    /// Every participant joins with their own device.
    Online,
    /// A single device plays with locally declared fictional players.
    Solo,
}

/// Topical bucket a prompt belongs to. Each category belongs to exactly one mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Group: verbal questions and confessions.
    VerbalConfession,
    /// Group: touching.
    Touch,
    /// Group: kissing.
    Kiss,
    /// Group: performances in front of the others.
    Performance,
    /// Group: body exposure.
    BodyExposure,
    /// Group: intimate contact.
    IntimateContact,
    /// Couple: revelations.
    Reveal,
    /// Couple: acts.
    Act,
    /// Couple: roleplay scenes.
    Roleplay,
    /// Couple: exposure.
    Exposure,
    /// Couple: sensory play.
    Sensory,
    /// Couple: endurance challenges.
    Endurance,
    /// Couple: openness.
    Openness,
    /// Couple: involving third parties.
    ThirdParties,
}

impl Category {
    /// Mode owning this category.
    pub fn mode(self) -> Mode {
        match self {
            Category::VerbalConfession
            | Category::Touch
            | Category::Kiss
            | Category::Performance
            | Category::BodyExposure
            | Category::IntimateContact => Mode::Group,
            _ => Mode::Couple,
        }
    }

    /// Two-letter code used by the prompt sheets.
    pub fn code(self) -> &'static str {
        match self {
            Category::VerbalConfession => "VC",
            Category::Touch => "TO",
            Category::Kiss => "BJ",
            Category::Performance => "PE",
            Category::BodyExposure => "EC",
            Category::IntimateContact => "CI",
            Category::Reveal => "RE",
            Category::Act => "AT",
            Category::Roleplay => "EN",
            Category::Exposure => "EX",
            Category::Sensory => "SE",
            Category::Endurance => "RS",
            Category::Openness => "AB",
            Category::ThirdParties => "TE",
        }
    }

    /// Human readable name.
    pub fn label(self) -> &'static str {
        match self {
            Category::VerbalConfession => "Verbal / Confession",
            Category::Touch => "Touch",
            Category::Kiss => "Kiss",
            Category::Performance => "Performance",
            Category::BodyExposure => "Body Exposure",
            Category::IntimateContact => "Intimate Contact",
            Category::Reveal => "Reveal",
            Category::Act => "Act",
            Category::Roleplay => "Roleplay",
            Category::Exposure => "Exposure",
            Category::Sensory => "Sensory",
            Category::Endurance => "Endurance",
            Category::Openness => "Openness",
            Category::ThirdParties => "Third Parties",
        }
    }

    /// Emoji shown next to the category.
    pub fn emoji(self) -> &'static str {
        match self {
            Category::VerbalConfession | Category::Reveal => "💬",
            Category::Touch => "👋",
            Category::Kiss => "💋",
            Category::Performance | Category::Roleplay => "🎭",
            Category::BodyExposure | Category::Exposure => "🙈",
            Category::IntimateContact => "🌶️",
            Category::Act => "🔥",
            Category::Sensory => "🎯",
            Category::Endurance => "⏱️",
            Category::Openness => "🔓",
            Category::ThirdParties => "👥",
        }
    }

    /// Storage representation, identical to the serde name.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::VerbalConfession => "verbal_confession",
            Category::Touch => "touch",
            Category::Kiss => "kiss",
            Category::Performance => "performance",
            Category::BodyExposure => "body_exposure",
            Category::IntimateContact => "intimate_contact",
            Category::Reveal => "reveal",
            Category::Act => "act",
            Category::Roleplay => "roleplay",
            Category::Exposure => "exposure",
            Category::Sensory => "sensory",
            Category::Endurance => "endurance",
            Category::Openness => "openness",
            Category::ThirdParties => "third_parties",
        }
    }
}

/// Content strength ceiling. `Never` excludes a category entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum IntensityLevel {
    /// 0: category excluded.
    Never,
    /// 1: light content; the implicit default when nothing is configured.
    Light,
    /// 2: medium content.
    Medium,
    /// 3: intense content, the maximum.
    Intense,
}

/// Raised when a numeric level falls outside `0..=3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("intensity level must be between 0 and 3 (got {0})")]
pub struct InvalidLevel(pub u8);

impl IntensityLevel {
    /// Every level, from lowest to highest.
    pub const ALL: [IntensityLevel; 4] = [
        IntensityLevel::Never,
        IntensityLevel::Light,
        IntensityLevel::Medium,
        IntensityLevel::Intense,
    ];

    /// Numeric value in `0..=3`.
    pub fn as_u8(self) -> u8 {
        match self {
            IntensityLevel::Never => 0,
            IntensityLevel::Light => 1,
            IntensityLevel::Medium => 2,
            IntensityLevel::Intense => 3,
        }
    }

    /// Fixed display label, shared by preference settings and escalation notices.
    pub fn label(self) -> &'static str {
        match self {
            IntensityLevel::Never => "Never",
            IntensityLevel::Light => "Light",
            IntensityLevel::Medium => "Medium",
            IntensityLevel::Intense => "Intense",
        }
    }

    /// Level for `value`, clamped to [`IntensityLevel::Intense`].
    pub fn saturating_from(value: u32) -> Self {
        match value {
            0 => IntensityLevel::Never,
            1 => IntensityLevel::Light,
            2 => IntensityLevel::Medium,
            _ => IntensityLevel::Intense,
        }
    }
}

impl TryFrom<u8> for IntensityLevel {
    type Error = InvalidLevel;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0..=3 => Ok(Self::saturating_from(value.into())),
            other => Err(InvalidLevel(other)),
        }
    }
}

impl From<IntensityLevel> for u8 {
    fn from(value: IntensityLevel) -> Self {
        value.as_u8()
    }
}

/// The two prompt types a player chooses between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    /// Answer a question.
    Truth,
    /// Perform a challenge.
    Dare,
}

impl PromptKind {
    /// Storage representation, identical to the serde name.
    pub fn as_str(self) -> &'static str {
        match self {
            PromptKind::Truth => "truth",
            PromptKind::Dare => "dare",
        }
    }
}

/// Participant requirement tag carried by each prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Participants {
    /// Only the acting player is involved.
    Solo,
    /// A second participant is required.
    Pair,
}

impl Participants {
    /// Storage representation, identical to the serde name.
    pub fn as_str(self) -> &'static str {
        match self {
            Participants::Solo => "solo",
            Participants::Pair => "pair",
        }
    }
}

/// Public identity of a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Stable identifier.
    pub id: PlayerId,
    /// Display name, if the player set one.
    pub display_name: Option<String>,
    /// Avatar reference, if any.
    pub avatar_url: Option<String>,
}

impl Player {
    /// First word of the display name, used when addressing the player.
    pub fn first_name(&self) -> &str {
        self.display_name
            .as_deref()
            .and_then(|name| name.split_whitespace().next())
            .unwrap_or(FALLBACK_FIRST_NAME)
    }
}

/// Immutable reference prompt ("card").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    /// Stable identifier.
    pub id: Uuid,
    /// Mode the prompt is played in.
    pub mode: Mode,
    /// Category of the prompt; always part of `mode`'s category set.
    pub category: Category,
    /// Intensity, between light and intense.
    pub level: IntensityLevel,
    /// Truth or dare.
    pub kind: PromptKind,
    /// Participant requirement tag.
    pub participants: Participants,
    /// Text body, possibly embedding [`PARTNER_PLACEHOLDER`].
    pub text: String,
}

impl Prompt {
    /// A prompt needs a partner when tagged `pair` or when its text names one.
    pub fn needs_partner(&self) -> bool {
        self.participants == Participants::Pair || self.text.contains(PARTNER_PLACEHOLDER)
    }

    /// Prompt text with the placeholder replaced by the partner's first name.
    pub fn render(&self, partner: Option<&Player>) -> String {
        let name = partner.map_or(FALLBACK_FIRST_NAME, Player::first_name);
        self.text.replace(PARTNER_PLACEHOLDER, name)
    }

    /// Countdown suggested by the text ("2 minutos", "30 segundos"), in seconds.
    pub fn timer_seconds(&self) -> Option<u32> {
        timer_hint(&self.text)
    }
}

fn timer_hint(text: &str) -> Option<u32> {
    let lower = text.to_lowercase();
    minutes_to_seconds(amount_before(&lower, "minuto"))
        .or_else(|| amount_before(&lower, "segundo"))
        .filter(|seconds| *seconds > 0)
}

fn minutes_to_seconds(minutes: Option<u32>) -> Option<u32> {
    minutes?.checked_mul(60)
}

/// First digit run followed, after optional whitespace, by `unit`.
fn amount_before(text: &str, unit: &str) -> Option<u32> {
    let mut rest = text;
    while let Some(start) = rest.find(|c: char| c.is_ascii_digit()) {
        let digits = &rest[start..];
        let end = digits
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(digits.len());
        let (number, tail) = digits.split_at(end);
        if tail.trim_start().starts_with(unit) {
            return number.parse().ok();
        }
        rest = tail;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt(text: &str, participants: Participants) -> Prompt {
        Prompt {
            id: Uuid::new_v4(),
            mode: Mode::Group,
            category: Category::Touch,
            level: IntensityLevel::Light,
            kind: PromptKind::Dare,
            participants,
            text: text.into(),
        }
    }

    #[test]
    fn categories_belong_to_their_mode() {
        for mode in Mode::ALL {
            assert!(mode.categories().iter().all(|c| c.mode() == mode));
        }
        assert_eq!(Mode::Group.categories().len(), 6);
        assert_eq!(Mode::Couple.categories().len(), 8);
    }

    #[test]
    fn headcount_rules() {
        assert!(!Mode::Group.accepts_headcount(2));
        assert!(Mode::Group.accepts_headcount(3));
        assert!(Mode::Group.accepts_headcount(8));
        assert!(Mode::Couple.accepts_headcount(2));
        assert!(!Mode::Couple.accepts_headcount(3));
    }

    #[test]
    fn level_labels_and_bounds() {
        let labels = IntensityLevel::ALL.map(IntensityLevel::label);
        assert_eq!(labels, ["Never", "Light", "Medium", "Intense"]);
        assert_eq!(IntensityLevel::try_from(4), Err(InvalidLevel(4)));
        assert_eq!(IntensityLevel::saturating_from(9), IntensityLevel::Intense);
    }

    #[test]
    fn placeholder_marks_pair_prompts() {
        assert!(prompt("Massage [JOGADOR]", Participants::Solo).needs_partner());
        assert!(prompt("Hold hands", Participants::Pair).needs_partner());
        assert!(!prompt("Sing a song", Participants::Solo).needs_partner());
    }

    #[test]
    fn render_uses_first_name() {
        let partner = Player {
            id: "p2".into(),
            display_name: Some("Ana Maria".into()),
            avatar_url: None,
        };
        let card = prompt("Kiss [JOGADOR] on the cheek", Participants::Pair);
        assert_eq!(card.render(Some(&partner)), "Kiss Ana on the cheek");
        assert_eq!(card.render(None), "Kiss Player on the cheek");
    }

    #[test]
    fn timer_hint_reads_minutes_and_seconds() {
        assert_eq!(prompt("Dance for 2 minutos", Participants::Solo).timer_seconds(), Some(120));
        assert_eq!(prompt("Hold 30 segundos", Participants::Solo).timer_seconds(), Some(30));
        assert_eq!(prompt("No clock here", Participants::Solo).timer_seconds(), None);
    }

    #[test]
    fn timer_hint_accepts_glued_units_and_parentheses() {
        assert_eq!(prompt("Dance for 2minutos", Participants::Solo).timer_seconds(), Some(120));
        assert_eq!(prompt("Hug (3 minutos)", Participants::Solo).timer_seconds(), Some(180));
        assert_eq!(prompt("Round 4: hold 45segundos", Participants::Solo).timer_seconds(), Some(45));
    }

    #[test]
    fn timer_hint_ignores_amounts_that_overflow() {
        assert_eq!(prompt("Wait 80000000 minutos", Participants::Solo).timer_seconds(), None);
        assert_eq!(prompt("Wait 99999999999 segundos", Participants::Solo).timer_seconds(), None);
    }
}
