use crate::core::state::{Phase, StoryState};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusyKind {
    Drafting,
    Rendering,
}

impl BusyKind {
    pub fn label(&self) -> &'static str {
        match self {
            BusyKind::Drafting => "Drafting Script...",
            BusyKind::Rendering => "Inking Page...",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelView {
    pub number: usize,
    pub narrative: String,
    pub image_url: String,
    pub visual_description: String,
    pub user_choice: Option<String>,
    /// The most recent panel is the emphasized one.
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewView {
    pub narrative: String,
    /// Seed for the editable field.
    pub visual_description: String,
    pub editable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoicesView {
    pub options: [String; 2],
    pub enabled: bool,
}

/// Everything a front end needs to draw one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screen {
    pub setup_form: bool,
    pub panels: Vec<PanelView>,
    pub review: Option<ReviewView>,
    pub choices: Option<ChoicesView>,
    pub busy: Option<BusyKind>,
    pub error: Option<String>,
    /// The opening failed; the only way on is to request it again.
    pub retry_start: bool,
}

impl Screen {
    pub fn of(state: &StoryState) -> Self {
        let phase = state.phase();
        let setup_form = phase == Phase::Setup;

        let panels = if setup_form {
            Vec::new()
        } else {
            let last = state.pages.len();
            state
                .pages
                .iter()
                .enumerate()
                .map(|(i, page)| PanelView {
                    number: i + 1,
                    narrative: page.narrative.clone(),
                    image_url: page.image_url.clone(),
                    visual_description: page.visual_description.clone(),
                    user_choice: page.user_choice.clone(),
                    active: i + 1 == last,
                })
                .collect()
        };

        let review = state.draft.as_ref().map(|draft| ReviewView {
            narrative: draft.narrative.clone(),
            visual_description: draft.visual_description.clone(),
            editable: !state.busy,
        });

        // Stays on screen while the next draft is generated, disabled.
        let choices = match (&state.context, &state.draft, state.pages.last()) {
            (Some(_), None, Some(last)) => Some(ChoicesView {
                options: last.choices.clone(),
                enabled: !state.busy,
            }),
            _ => None,
        };

        let busy = match phase {
            Phase::Drafting => Some(BusyKind::Drafting),
            Phase::Rendering => Some(BusyKind::Rendering),
            _ => None,
        };

        let retry_start = phase == Phase::Steady && state.pages.is_empty();

        Self {
            setup_form,
            panels,
            review,
            choices,
            busy,
            error: state.error.clone(),
            retry_start,
        }
    }
}

/// Plain-text rendering for the terminal.
impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.setup_form {
            writeln!(f, "== Create Your Issue ==")?;
        }

        for panel in &self.panels {
            let marker = if panel.active { ">>" } else { "  " };
            writeln!(f, "{} [PANEL {}]", marker, panel.number)?;
            writeln!(f, "   {}", panel.narrative)?;
            writeln!(f, "   Visual: {}", panel.visual_description)?;
            writeln!(f, "   Image: {}", display_image_url(&panel.image_url))?;
            if let Some(choice) = &panel.user_choice {
                writeln!(f, "   Reader chose: {}", choice)?;
            }
            writeln!(f)?;
        }

        if let Some(review) = &self.review {
            writeln!(f, "== Script Editor // Review Phase ==")?;
            writeln!(f, "Narrative Caption (Locked):")?;
            writeln!(f, "   \"{}\"", review.narrative)?;
            writeln!(f, "Visual Direction (Editable):")?;
            writeln!(f, "   {}", review.visual_description)?;
            writeln!(f)?;
        }

        if let Some(choices) = &self.choices {
            for (idx, option) in choices.options.iter().enumerate() {
                let letter = (b'A' + idx as u8) as char;
                let suffix = if choices.enabled { "" } else { " (disabled)" };
                writeln!(f, "  [{}] {}{}", letter, option, suffix)?;
            }
        }

        if let Some(busy) = self.busy {
            writeln!(f, "{}", busy.label())?;
        }

        if let Some(error) = &self.error {
            writeln!(f, "!! {}", error)?;
        }

        if self.retry_start {
            writeln!(f, "The opening panel was not drafted. Try again?")?;
        }

        Ok(())
    }
}

/// `data:` URIs are long base64 blobs; show only their media type.
fn display_image_url(url: &str) -> String {
    match url.strip_prefix("data:") {
        Some(rest) => {
            let mime = rest.split(';').next().unwrap_or("image");
            format!("<inline {}>", mime)
        }
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::{StoryContext, StoryDraft, StoryPage};
    use crate::core::turn::START_FAILED;
    use anyhow::anyhow;

    fn page(n: usize) -> StoryPage {
        StoryPage {
            id: StoryPage::page_id(n),
            narrative: format!("N{}", n),
            image_url: "data:image/png;base64,AAAA".to_string(),
            choices: ["Fight".to_string(), "Flee".to_string()],
            visual_description: format!("V{}", n),
            user_choice: None,
        }
    }

    fn draft() -> StoryDraft {
        StoryDraft {
            narrative: "Rain falls".to_string(),
            visual_description: "Low angle shot".to_string(),
            choices: ["A".to_string(), "B".to_string()],
        }
    }

    #[test]
    fn test_setup_screen() {
        let screen = Screen::of(&StoryState::new());
        assert!(screen.setup_form);
        assert!(screen.panels.is_empty());
        assert!(screen.review.is_none());
        assert!(screen.choices.is_none());
        assert!(screen.to_string().contains("Create Your Issue"));
    }

    #[test]
    fn test_last_panel_is_active() {
        let mut state = StoryState::new();
        state.context = Some(StoryContext::default());
        state.pages = vec![page(1), page(2)];

        let screen = Screen::of(&state);
        assert!(!screen.panels[0].active);
        assert!(screen.panels[1].active);
        assert_eq!(screen.choices.as_ref().map(|c| c.enabled), Some(true));
    }

    #[test]
    fn test_drafting_keeps_choices_disabled() {
        let mut state = StoryState::new();
        state.context = Some(StoryContext::default());
        state.pages = vec![page(1)];
        state.busy = true;

        let screen = Screen::of(&state);
        assert_eq!(screen.busy, Some(BusyKind::Drafting));
        assert_eq!(screen.choices.map(|c| c.enabled), Some(false));
    }

    #[test]
    fn test_review_card_hides_choices() {
        let mut state = StoryState::new();
        state.context = Some(StoryContext::default());
        state.pages = vec![page(1)];
        state.draft = Some(draft());

        let screen = Screen::of(&state);
        assert!(screen.choices.is_none());
        let review = screen.review.unwrap();
        assert_eq!(review.visual_description, "Low angle shot");
        assert!(review.editable);
    }

    #[test]
    fn test_rendering_locks_review_card() {
        let mut state = StoryState::new();
        state.context = Some(StoryContext::default());
        state.draft = Some(draft());
        state.busy = true;

        let screen = Screen::of(&state);
        assert_eq!(screen.busy, Some(BusyKind::Rendering));
        assert!(!screen.review.unwrap().editable);
    }

    #[test]
    fn test_text_hides_inline_image_data() {
        let mut state = StoryState::new();
        state.context = Some(StoryContext::default());
        state.pages = vec![page(1)];
        state.error = Some("Failed to ink the page.".to_string());

        let text = Screen::of(&state).to_string();
        assert!(text.contains("<inline image/png>"));
        assert!(!text.contains("AAAA"));
        assert!(text.contains("[A] Fight"));
        assert!(text.contains("!! Failed to ink the page."));
    }

    #[test]
    fn test_failed_opening_offers_retry() {
        let (drafting, req) = StoryState::new().begin_start(StoryContext::default()).unwrap();
        let failed = drafting
            .settle_segment(&req, Err(anyhow!("connection reset")))
            .unwrap_err()
            .state;

        let screen = Screen::of(&failed);
        assert!(!screen.setup_form);
        assert!(screen.review.is_none());
        assert!(screen.choices.is_none());
        assert!(screen.retry_start);
        assert_eq!(screen.error.as_deref(), Some(START_FAILED));
        assert!(screen.to_string().contains("Try again?"));

        let (retrying, _) = failed.begin_start(StoryContext::default()).unwrap();
        assert!(!Screen::of(&retrying).retry_start);
    }

    #[test]
    fn test_retry_not_offered_once_pages_exist() {
        let mut state = StoryState::new();
        state.context = Some(StoryContext::default());
        state.pages = vec![page(1)];

        assert!(!Screen::of(&state).retry_start);
        assert!(!Screen::of(&StoryState::new()).retry_start);
    }
}
