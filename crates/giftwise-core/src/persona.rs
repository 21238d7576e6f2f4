use serde::{Deserialize, Serialize};
use tracing::debug;

/// A selectable wizard option: stored value plus display label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersonaOption {
    pub value: &'static str,
    pub label: &'static str,
}

const fn opt(value: &'static str, label: &'static str) -> PersonaOption {
    PersonaOption { value, label }
}

pub const OCCASION_OPTIONS: &[PersonaOption] = &[
    opt("birthday", "Birthday"),
    opt("anniversary", "Anniversary"),
    opt("graduation", "Graduation"),
    opt("housewarming", "Housewarming"),
    opt("wedding", "Wedding"),
    opt("babyShower", "Baby Shower"),
    opt("promotion", "Promotion"),
    opt("holiday", "Holiday"),
    opt("farewell", "Farewell"),
    opt("justBecause", "Just Because"),
];

pub const PERSONALITY_OPTIONS: &[PersonaOption] = &[
    opt("introvert", "Introvert"),
    opt("extrovert", "Extrovert"),
    opt("adventurous", "Adventurous"),
    opt("techSavvy", "Tech-Savvy"),
    opt("artistic", "Artistic"),
    opt("athletic", "Athletic"),
    opt("bookworm", "Bookworm"),
    opt("foodie", "Foodie"),
    opt("minimalist", "Minimalist"),
    opt("practical", "Practical"),
];

pub const MOOD_OPTIONS: &[PersonaOption] = &[
    opt("thoughtful", "Thoughtful"),
    opt("funny", "Funny"),
    opt("practical", "Practical"),
    opt("premium", "Premium"),
    opt("diy", "DIY"),
    opt("unique", "Unique"),
    opt("nostalgic", "Nostalgic"),
    opt("romantic", "Romantic"),
    opt("relaxing", "Relaxing"),
    opt("adventurous", "Adventurous"),
];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Persona {
    #[serde(default)]
    pub occasion: Option<String>,

    #[serde(default)]
    pub personality_tags: Vec<String>,

    #[serde(default)]
    pub mood: Option<String>,
}

impl Persona {
    pub fn occasion(&self) -> Option<&str> {
        non_empty(self.occasion.as_deref())
    }

    pub fn mood(&self) -> Option<&str> {
        non_empty(self.mood.as_deref())
    }

    /// Adds the tag, or removes it when already selected.
    pub fn toggle_tag(&mut self, tag: &str) {
        if let Some(idx) = self.personality_tags.iter().position(|t| t == tag) {
            self.personality_tags.remove(idx);
        } else {
            self.personality_tags.push(tag.to_string());
        }
    }

    pub fn is_blank(&self) -> bool {
        self.occasion().is_none() && self.personality_tags.is_empty() && self.mood().is_none()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStep {
    Occasion,
    Personality,
    Mood,
}

impl WizardStep {
    pub const TOTAL: u8 = 3;

    pub fn number(self) -> u8 {
        match self {
            Self::Occasion => 1,
            Self::Personality => 2,
            Self::Mood => 3,
        }
    }

    fn next(self) -> Option<Self> {
        match self {
            Self::Occasion => Some(Self::Personality),
            Self::Personality => Some(Self::Mood),
            Self::Mood => None,
        }
    }

    fn prev(self) -> Option<Self> {
        match self {
            Self::Occasion => None,
            Self::Personality => Some(Self::Occasion),
            Self::Mood => Some(Self::Personality),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Incomplete(WizardStep),
    Advanced(WizardStep),
    Finished(Persona),
}

/// Three-step persona builder: occasion, personality tags, mood.
#[derive(Debug, Clone)]
pub struct PersonaWizard {
    step: WizardStep,
    draft: Persona,
}

impl Default for PersonaWizard {
    fn default() -> Self {
        Self::new()
    }
}

impl PersonaWizard {
    pub fn new() -> Self {
        Self {
            step: WizardStep::Occasion,
            draft: Persona::default(),
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn draft(&self) -> &Persona {
        &self.draft
    }

    pub fn select_occasion(&mut self, occasion: &str) {
        self.draft.occasion = Some(occasion.to_string());
    }

    pub fn toggle_tag(&mut self, tag: &str) {
        self.draft.toggle_tag(tag);
    }

    pub fn select_mood(&mut self, mood: &str) {
        self.draft.mood = Some(mood.to_string());
    }

    pub fn is_step_complete(&self) -> bool {
        match self.step {
            WizardStep::Occasion => self.draft.occasion().is_some(),
            WizardStep::Personality => !self.draft.personality_tags.is_empty(),
            WizardStep::Mood => self.draft.mood().is_some(),
        }
    }

    pub fn next(&mut self) -> StepOutcome {
        if !self.is_step_complete() {
            debug!(step = self.step.number(), "wizard step incomplete");
            return StepOutcome::Incomplete(self.step);
        }

        match self.step.next() {
            Some(step) => {
                self.step = step;
                StepOutcome::Advanced(step)
            }
            None => StepOutcome::Finished(self.draft.clone()),
        }
    }

    pub fn prev(&mut self) {
        if let Some(step) = self.step.prev() {
            self.step = step;
        }
    }
}

pub fn is_known_option(options: &[PersonaOption], value: &str) -> bool {
    options.iter().any(|o| o.value == value)
}

#[cfg(test)]
mod tests {
    use super::{Persona, PersonaWizard, StepOutcome, WizardStep};

    #[test]
    fn toggle_preserves_selection_order() {
        let mut persona = Persona::default();
        persona.toggle_tag("artistic");
        persona.toggle_tag("foodie");
        persona.toggle_tag("introvert");
        persona.toggle_tag("foodie");
        assert_eq!(persona.personality_tags, vec!["artistic", "introvert"]);
    }

    #[test]
    fn empty_strings_count_as_unset() {
        let persona: Persona =
            serde_json::from_str(r#"{"occasion":"","personalityTags":[],"mood":null}"#)
                .expect("parse persona");
        assert_eq!(persona.occasion(), None);
        assert_eq!(persona.mood(), None);
        assert!(persona.is_blank());
    }

    #[test]
    fn wizard_blocks_incomplete_steps() {
        let mut wizard = PersonaWizard::new();
        assert_eq!(
            wizard.next(),
            StepOutcome::Incomplete(WizardStep::Occasion)
        );

        wizard.select_occasion("birthday");
        assert_eq!(wizard.next(), StepOutcome::Advanced(WizardStep::Personality));
        assert_eq!(
            wizard.next(),
            StepOutcome::Incomplete(WizardStep::Personality)
        );

        wizard.toggle_tag("techSavvy");
        assert_eq!(wizard.next(), StepOutcome::Advanced(WizardStep::Mood));

        wizard.prev();
        assert_eq!(wizard.step(), WizardStep::Personality);
        assert_eq!(wizard.next(), StepOutcome::Advanced(WizardStep::Mood));

        wizard.select_mood("funny");
        match wizard.next() {
            StepOutcome::Finished(persona) => {
                assert_eq!(persona.occasion(), Some("birthday"));
                assert_eq!(persona.personality_tags, vec!["techSavvy"]);
                assert_eq!(persona.mood(), Some("funny"));
            }
            other => panic!("expected finished wizard, got {other:?}"),
        }
    }
}
