use serde::{Deserialize, Serialize};
use std::fmt;

/// The fixed story premise, set once when the story starts.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct StoryContext {
    pub character_name: String,
    pub character_description: String,
    pub plot_summary: String,
    pub art_style: String,
}

impl Default for StoryContext {
    fn default() -> Self {
        Self {
            character_name: "John Constantine".to_string(),
            character_description:
                "A cynical, chain-smoking occult detective in a trench coat. Blonde messy hair."
                    .to_string(),
            plot_summary: "Investigating a deal gone wrong with a minor demon in a London pub."
                .to_string(),
            art_style: "Gritty Noir, high contrast, ink heavy, muted colors with neon accents"
                .to_string(),
        }
    }
}

/// One committed panel.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct StoryPage {
    pub id: String,
    pub narrative: String,
    /// A `data:` URI or a placeholder URL.
    pub image_url: String,
    pub choices: [String; 2],
    /// The visual direction the image was rendered from, after reader edits.
    pub visual_description: String,
    /// The choice that led to the *next* page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_choice: Option<String>,
}

impl StoryPage {
    pub fn page_id(number: usize) -> String {
        format!("page-{}", number)
    }
}

/// A generated panel waiting for review.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct StoryDraft {
    pub narrative: String,
    pub visual_description: String,
    pub choices: [String; 2],
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct StoryState {
    pub pages: Vec<StoryPage>,
    pub busy: bool,
    pub error: Option<String>,
    pub context: Option<StoryContext>,
    pub draft: Option<StoryDraft>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Setup,
    Drafting,
    Review,
    Rendering,
    Steady,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Setup => "setup",
            Phase::Drafting => "drafting",
            Phase::Review => "review",
            Phase::Rendering => "rendering",
            Phase::Steady => "steady",
        };
        f.write_str(name)
    }
}

impl StoryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        match (&self.context, self.busy, &self.draft) {
            (None, _, _) => Phase::Setup,
            (Some(_), true, None) => Phase::Drafting,
            (Some(_), true, Some(_)) => Phase::Rendering,
            (Some(_), false, Some(_)) => Phase::Review,
            (Some(_), false, None) => Phase::Steady,
        }
    }

    pub fn last_page(&self) -> Option<&StoryPage> {
        self.pages.last()
    }

    /// The choices the reader can pick from right now, if any.
    pub fn current_choices(&self) -> Option<&[String; 2]> {
        match self.phase() {
            Phase::Steady => self.last_page().map(|p| &p.choices),
            _ => None,
        }
    }
}

/// Returns a copy of `pages` with `choice` recorded on the last entry.
/// Every other entry is left as it was.
pub fn annotate_last(pages: &[StoryPage], choice: &str) -> Vec<StoryPage> {
    let mut annotated = pages.to_vec();
    if let Some(last) = annotated.last_mut() {
        last.user_choice = Some(choice.to_string());
    }
    annotated
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(n: usize) -> StoryPage {
        StoryPage {
            id: StoryPage::page_id(n),
            narrative: format!("N{}", n),
            image_url: "data:image/png;base64,AAAA".to_string(),
            choices: ["A".to_string(), "B".to_string()],
            visual_description: format!("V{}", n),
            user_choice: None,
        }
    }

    #[test]
    fn test_phase_derivation() {
        let mut state = StoryState::new();
        assert_eq!(state.phase(), Phase::Setup);

        state.context = Some(StoryContext::default());
        state.busy = true;
        assert_eq!(state.phase(), Phase::Drafting);

        state.draft = Some(StoryDraft {
            narrative: "N".to_string(),
            visual_description: "V".to_string(),
            choices: ["A".to_string(), "B".to_string()],
        });
        assert_eq!(state.phase(), Phase::Rendering);

        state.busy = false;
        assert_eq!(state.phase(), Phase::Review);

        state.draft = None;
        assert_eq!(state.phase(), Phase::Steady);
    }

    #[test]
    fn test_annotate_last_only_touches_last_page() {
        let pages = vec![page(1), page(2)];
        let annotated = annotate_last(&pages, "Run");

        assert_eq!(annotated.len(), 2);
        assert_eq!(annotated[0], pages[0]);
        assert_eq!(annotated[1].user_choice.as_deref(), Some("Run"));
        assert!(pages[1].user_choice.is_none(), "input must not be mutated");
    }

    #[test]
    fn test_annotate_last_on_empty_history() {
        assert!(annotate_last(&[], "Run").is_empty());
    }

    #[test]
    fn test_current_choices_only_when_steady() {
        let mut state = StoryState::new();
        state.context = Some(StoryContext::default());
        assert!(state.current_choices().is_none());

        state.pages.push(page(1));
        assert_eq!(state.current_choices().map(|c| c[0].as_str()), Some("A"));

        state.busy = true;
        assert!(state.current_choices().is_none());
    }

    #[test]
    fn test_user_choice_omitted_from_json_when_unset() {
        let json = serde_json::to_string(&page(1)).unwrap();
        assert!(!json.contains("user_choice"));
    }
}
