//! Pure turn transitions over [`StoryState`].
//!
//! Every reader action is split in two. `begin_*` checks the phase and
//! returns the busy state together with the request the caller has to send;
//! `settle_*` folds the provider's answer back in. Neither mutates `self`.

use crate::core::state::{annotate_last, Phase, StoryContext, StoryDraft, StoryPage, StoryState};
use std::fmt;
use thiserror::Error;

pub const OPENING_INSTRUCTION: &str = "Begin the story. Establish the scene and character.";

pub const START_FAILED: &str = "Failed to initialize the story script. Please try again.";
pub const CHOOSE_FAILED: &str = "The connection to the ether was severed. Try again.";
pub const APPROVE_FAILED: &str = "Failed to ink the page. The artist is on strike.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Start,
    Choose,
    Approve,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Start => "start",
            Action::Choose => "choose",
            Action::Approve => "approve",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("cannot {action} during {phase}")]
    NotAllowed { action: Action, phase: Phase },
    #[error("{action} needs non-empty text")]
    EmptyInput { action: Action },
    #[error("{message}")]
    Generation { action: Action, message: String },
    #[error("{message}")]
    Render { message: String },
}

impl TransitionError {
    pub fn action(&self) -> Action {
        match self {
            TransitionError::NotAllowed { action, .. }
            | TransitionError::EmptyInput { action }
            | TransitionError::Generation { action, .. } => *action,
            TransitionError::Render { .. } => Action::Approve,
        }
    }
}

/// A failed settle. `state` is already idle with its error message set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected {
    pub state: StoryState,
    pub error: TransitionError,
}

pub type Settled = Result<StoryState, Rejected>;

/// What the text model produced for one panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub narrative: String,
    pub visual_description: String,
    pub choices: [String; 2],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentRequest {
    pub action: Action,
    pub history: Vec<StoryPage>,
    pub instruction: String,
    pub context: StoryContext,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub visual_description: String,
    pub art_style: String,
}

impl StoryState {
    /// Accepted from `Setup`, and from `Steady` with no pages, which is where
    /// a failed opening leaves the story.
    pub fn begin_start(
        &self,
        context: StoryContext,
    ) -> Result<(StoryState, SegmentRequest), TransitionError> {
        let phase = self.phase();
        let allowed = match phase {
            Phase::Setup => !self.busy,
            Phase::Steady => self.pages.is_empty(),
            _ => false,
        };
        if !allowed {
            return Err(TransitionError::NotAllowed {
                action: Action::Start,
                phase,
            });
        }

        let mut next = self.clone();
        next.context = Some(context.clone());
        next.draft = None;
        next.busy = true;
        next.error = None;

        let request = SegmentRequest {
            action: Action::Start,
            history: Vec::new(),
            instruction: OPENING_INSTRUCTION.to_string(),
            context,
        };
        Ok((next, request))
    }

    pub fn begin_choice(
        &self,
        choice: &str,
    ) -> Result<(StoryState, SegmentRequest), TransitionError> {
        let phase = self.phase();
        let context = match (&self.context, phase) {
            (Some(context), Phase::Steady) if !self.pages.is_empty() => context.clone(),
            _ => {
                return Err(TransitionError::NotAllowed {
                    action: Action::Choose,
                    phase,
                })
            }
        };
        if choice.trim().is_empty() {
            return Err(TransitionError::EmptyInput {
                action: Action::Choose,
            });
        }

        let mut next = self.clone();
        next.pages = annotate_last(&self.pages, choice);
        next.busy = true;
        next.error = None;

        let request = SegmentRequest {
            action: Action::Choose,
            history: next.pages.clone(),
            instruction: choice.to_string(),
            context,
        };
        Ok((next, request))
    }

    pub fn settle_segment(&self, request: &SegmentRequest, result: anyhow::Result<Segment>) -> Settled {
        let phase = self.phase();
        if phase != Phase::Drafting {
            return Err(Rejected {
                state: self.clone(),
                error: TransitionError::NotAllowed {
                    action: request.action,
                    phase,
                },
            });
        }

        let mut next = self.clone();
        next.busy = false;

        match result {
            Ok(segment) => {
                next.draft = Some(StoryDraft {
                    narrative: segment.narrative,
                    visual_description: segment.visual_description,
                    choices: segment.choices,
                });
                Ok(next)
            }
            Err(e) => {
                log::error!("Story {} failed: {:#}", request.action, e);
                let message = match request.action {
                    Action::Start => START_FAILED,
                    _ => CHOOSE_FAILED,
                };
                next.error = Some(message.to_string());
                Err(Rejected {
                    state: next,
                    error: TransitionError::Generation {
                        action: request.action,
                        message: message.to_string(),
                    },
                })
            }
        }
    }

    /// `edited` is used verbatim; it only has to contain something.
    pub fn begin_render(&self, edited: &str) -> Result<(StoryState, RenderRequest), TransitionError> {
        let phase = self.phase();
        let art_style = match (&self.context, phase) {
            (Some(context), Phase::Review) => context.art_style.clone(),
            _ => {
                return Err(TransitionError::NotAllowed {
                    action: Action::Approve,
                    phase,
                })
            }
        };
        if edited.trim().is_empty() {
            return Err(TransitionError::EmptyInput {
                action: Action::Approve,
            });
        }

        let mut next = self.clone();
        next.busy = true;
        next.error = None;

        let request = RenderRequest {
            visual_description: edited.to_string(),
            art_style,
        };
        Ok((next, request))
    }

    pub fn settle_render(&self, request: &RenderRequest, result: anyhow::Result<String>) -> Settled {
        let phase = self.phase();
        let draft = match (&self.draft, phase) {
            (Some(draft), Phase::Rendering) => draft.clone(),
            _ => {
                return Err(Rejected {
                    state: self.clone(),
                    error: TransitionError::NotAllowed {
                        action: Action::Approve,
                        phase,
                    },
                })
            }
        };

        let mut next = self.clone();
        next.busy = false;

        match result {
            Ok(image_url) => {
                next.pages.push(StoryPage {
                    id: StoryPage::page_id(self.pages.len() + 1),
                    narrative: draft.narrative,
                    image_url,
                    choices: draft.choices,
                    visual_description: request.visual_description.clone(),
                    user_choice: None,
                });
                next.draft = None;
                Ok(next)
            }
            Err(e) => {
                log::error!("Panel render failed: {:#}", e);
                next.error = Some(APPROVE_FAILED.to_string());
                Err(Rejected {
                    state: next,
                    error: TransitionError::Render {
                        message: APPROVE_FAILED.to_string(),
                    },
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn context() -> StoryContext {
        StoryContext {
            character_name: "X".to_string(),
            character_description: "A detective".to_string(),
            plot_summary: "A case".to_string(),
            art_style: "Noir".to_string(),
        }
    }

    fn segment(n: &str, v: &str) -> Segment {
        Segment {
            narrative: n.to_string(),
            visual_description: v.to_string(),
            choices: ["A".to_string(), "B".to_string()],
        }
    }

    /// Runs start and approve so the state holds one page.
    fn one_page_state() -> StoryState {
        let (drafting, req) = StoryState::new().begin_start(context()).unwrap();
        let review = drafting.settle_segment(&req, Ok(segment("N1", "V1"))).unwrap();
        let (rendering, render) = review.begin_render("V1").unwrap();
        rendering
            .settle_render(&render, Ok("data:image/png;base64,AAAA".to_string()))
            .unwrap()
    }

    #[test]
    fn test_start_produces_draft_without_pages() {
        let (drafting, req) = StoryState::new().begin_start(context()).unwrap();
        assert_eq!(drafting.phase(), Phase::Drafting);
        assert!(req.history.is_empty());
        assert_eq!(req.instruction, OPENING_INSTRUCTION);

        let review = drafting.settle_segment(&req, Ok(segment("N1", "V1"))).unwrap();
        assert_eq!(review.phase(), Phase::Review);
        assert!(review.pages.is_empty());
        assert_eq!(
            review.draft,
            Some(StoryDraft {
                narrative: "N1".to_string(),
                visual_description: "V1".to_string(),
                choices: ["A".to_string(), "B".to_string()],
            })
        );
    }

    #[test]
    fn test_approve_uses_edited_description() {
        let (drafting, req) = StoryState::new().begin_start(context()).unwrap();
        let review = drafting.settle_segment(&req, Ok(segment("N1", "V1"))).unwrap();

        let (rendering, render) = review.begin_render("V1-edited").unwrap();
        assert_eq!(rendering.phase(), Phase::Rendering);
        assert_eq!(render.art_style, "Noir");

        let steady = rendering
            .settle_render(&render, Ok("data:image/png;base64,AAAA".to_string()))
            .unwrap();
        assert_eq!(steady.phase(), Phase::Steady);
        assert!(steady.draft.is_none());
        assert_eq!(steady.pages.len(), 1);

        let page = &steady.pages[0];
        assert_eq!(page.id, "page-1");
        assert_eq!(page.narrative, "N1");
        assert_eq!(page.visual_description, "V1-edited");
        assert_eq!(page.choices, ["A".to_string(), "B".to_string()]);
        assert_eq!(page.image_url, "data:image/png;base64,AAAA");
    }

    #[test]
    fn test_failed_start_leaves_context_and_allows_restart() {
        let (drafting, req) = StoryState::new().begin_start(context()).unwrap();
        let rejected = drafting
            .settle_segment(&req, Err(anyhow!("connection reset")))
            .unwrap_err();

        assert_eq!(rejected.state.phase(), Phase::Steady);
        assert!(rejected.state.pages.is_empty());
        assert!(rejected.state.draft.is_none());
        assert_eq!(rejected.state.error.as_deref(), Some(START_FAILED));
        assert!(matches!(
            rejected.error,
            TransitionError::Generation { action: Action::Start, .. }
        ));

        let (retry, _) = rejected.state.begin_start(context()).unwrap();
        assert!(retry.error.is_none());
        assert_eq!(retry.phase(), Phase::Drafting);
    }

    #[test]
    fn test_start_rejected_once_story_has_pages() {
        let state = one_page_state();
        assert_eq!(
            state.begin_start(context()).unwrap_err(),
            TransitionError::NotAllowed {
                action: Action::Start,
                phase: Phase::Steady
            }
        );
    }

    #[test]
    fn test_choice_stamps_last_page_before_request() {
        let state = one_page_state();
        let (drafting, req) = state.begin_choice("A").unwrap();

        assert_eq!(drafting.pages[0].user_choice.as_deref(), Some("A"));
        assert_eq!(req.history[0].user_choice.as_deref(), Some("A"));
        assert_eq!(req.instruction, "A");
        assert_eq!(req.action, Action::Choose);
        assert!(state.pages[0].user_choice.is_none());
    }

    #[test]
    fn test_failed_choice_keeps_stamp() {
        let (drafting, req) = one_page_state().begin_choice("B").unwrap();
        let rejected = drafting
            .settle_segment(&req, Err(anyhow!("bad json")))
            .unwrap_err();

        assert_eq!(rejected.state.phase(), Phase::Steady);
        assert_eq!(rejected.state.pages[0].user_choice.as_deref(), Some("B"));
        assert_eq!(rejected.state.error.as_deref(), Some(CHOOSE_FAILED));
        assert_eq!(rejected.error.action(), Action::Choose);
    }

    #[test]
    fn test_failed_render_keeps_draft() {
        let (drafting, req) = StoryState::new().begin_start(context()).unwrap();
        let review = drafting.settle_segment(&req, Ok(segment("N1", "V1"))).unwrap();
        let (rendering, render) = review.begin_render("V1").unwrap();

        let rejected = rendering
            .settle_render(&render, Err(anyhow!("timeout")))
            .unwrap_err();

        assert_eq!(rejected.state.phase(), Phase::Review);
        assert!(rejected.state.pages.is_empty());
        assert_eq!(rejected.state.draft, review.draft);
        assert_eq!(rejected.state.error.as_deref(), Some(APPROVE_FAILED));
        assert!(matches!(rejected.error, TransitionError::Render { .. }));
    }

    #[test]
    fn test_busy_blocks_every_transition() {
        let (drafting, _) = StoryState::new().begin_start(context()).unwrap();
        assert!(drafting.begin_start(context()).is_err());
        assert!(drafting.begin_choice("A").is_err());
        assert!(drafting.begin_render("V").is_err());
    }

    #[test]
    fn test_choice_requires_pages() {
        let (drafting, req) = StoryState::new().begin_start(context()).unwrap();
        let failed = drafting
            .settle_segment(&req, Err(anyhow!("down")))
            .unwrap_err()
            .state;

        assert_eq!(
            failed.begin_choice("A").unwrap_err(),
            TransitionError::NotAllowed {
                action: Action::Choose,
                phase: Phase::Steady
            }
        );
    }

    #[test]
    fn test_blank_input_is_rejected() {
        let state = one_page_state();
        assert_eq!(
            state.begin_choice("   ").unwrap_err(),
            TransitionError::EmptyInput { action: Action::Choose }
        );

        let (drafting, req) = state.begin_choice("A").unwrap();
        let review = drafting.settle_segment(&req, Ok(segment("N2", "V2"))).unwrap();
        assert_eq!(
            review.begin_render("\n").unwrap_err(),
            TransitionError::EmptyInput { action: Action::Approve }
        );
    }

    #[test]
    fn test_settle_outside_its_phase_is_rejected() {
        let state = one_page_state();
        let render = RenderRequest {
            visual_description: "V".to_string(),
            art_style: "Noir".to_string(),
        };
        let rejected = state
            .settle_render(&render, Ok("url".to_string()))
            .unwrap_err();

        assert_eq!(rejected.state, state);
        assert_eq!(state.pages.len(), 1);
    }

    #[test]
    fn test_pages_only_grow() {
        let mut state = one_page_state();
        for n in 2..=4 {
            let before = state.pages.clone();
            let (drafting, req) = state.begin_choice("A").unwrap();
            let review = drafting
                .settle_segment(&req, Ok(segment(&format!("N{}", n), "V")))
                .unwrap();
            let (rendering, render) = review.begin_render("V").unwrap();
            state = rendering.settle_render(&render, Ok("url".to_string())).unwrap();

            assert_eq!(state.pages.len(), before.len() + 1);
            for (old, new) in before.iter().zip(&state.pages) {
                assert_eq!(old.id, new.id);
                assert_eq!(old.narrative, new.narrative);
            }
            assert_eq!(state.pages.last().unwrap().id, format!("page-{}", n));
        }
    }
}
