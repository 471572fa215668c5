use crate::core::state::{StoryContext, StoryState};
use crate::core::turn::{Rejected, Settled, TransitionError};
use crate::services::llm::ComicGenerator;

/// Owns the story state and runs each reader action against the generator.
///
/// Every action holds `&mut self` across its remote call, so a second call
/// cannot be issued before the first resolves.
pub struct StoryDirector {
    generator: Box<dyn ComicGenerator>,
    state: StoryState,
}

impl StoryDirector {
    pub fn new(generator: Box<dyn ComicGenerator>) -> Self {
        Self {
            generator,
            state: StoryState::new(),
        }
    }

    pub fn state(&self) -> &StoryState {
        &self.state
    }

    pub async fn start(&mut self, context: StoryContext) -> Result<(), TransitionError> {
        let (pending, request) = self.state.begin_start(context)?;
        self.state = pending;
        log::info!("Starting story for {}", request.context.character_name);

        let result = self
            .generator
            .generate_segment(&request.history, &request.instruction, &request.context)
            .await;
        let settled = self.state.settle_segment(&request, result);
        self.apply(settled)
    }

    pub async fn choose(&mut self, choice: &str) -> Result<(), TransitionError> {
        let (pending, request) = self.state.begin_choice(choice)?;
        self.state = pending;
        log::info!("Reader chose: {}", choice);

        let result = self
            .generator
            .generate_segment(&request.history, &request.instruction, &request.context)
            .await;
        let settled = self.state.settle_segment(&request, result);
        self.apply(settled)
    }

    pub async fn approve(&mut self, edited_visual_description: &str) -> Result<(), TransitionError> {
        let (pending, request) = self.state.begin_render(edited_visual_description)?;
        self.state = pending;
        log::info!("Rendering panel {}", self.state.pages.len() + 1);

        let result = self
            .generator
            .generate_image(&request.visual_description, &request.art_style)
            .await;
        let settled = self.state.settle_render(&request, result);
        self.apply(settled)
    }

    fn apply(&mut self, settled: Settled) -> Result<(), TransitionError> {
        match settled {
            Ok(state) => {
                self.state = state;
                Ok(())
            }
            Err(Rejected { state, error }) => {
                self.state = state;
                Err(error)
            }
        }
    }
}
