use crate::core::config::Config;
use crate::core::state::{Phase, StoryContext, StoryDraft, StoryPage, StoryState};
use crate::core::turn::TransitionError;
use crate::core::view::{BusyKind, Screen};
use crate::services::director::StoryDirector;
use crate::services::llm::ComicGenerator;
use crate::services::setup::{cancellable, prompt_context};
use crate::utils::image::save_panel_image;
use anyhow::{bail, Result};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Confirm, Select, Text};
use std::path::{Path, PathBuf};
use std::time::Duration;

const WRITE_YOUR_OWN: &str = "Write your own...";
const QUIT: &str = "Quit";

/// The reader's next move, collected while the story is idle.
enum Turn {
    Start(StoryContext),
    Choose(String),
    Approve(String),
}

impl Turn {
    fn busy_kind(&self) -> BusyKind {
        match self {
            Turn::Start(_) | Turn::Choose(_) => BusyKind::Drafting,
            Turn::Approve(_) => BusyKind::Rendering,
        }
    }
}

pub async fn run_session(config: &Config, generator: Box<dyn ComicGenerator>) -> Result<()> {
    let output_folder = PathBuf::from(&config.output_folder);
    let mut director = StoryDirector::new(generator);

    loop {
        println!("{}", Screen::of(director.state()));

        let turn = match next_turn(director.state())? {
            Some(turn) => turn,
            None => break,
        };

        let spinner = busy_spinner(turn.busy_kind())?;
        let is_render = matches!(turn, Turn::Approve(_));
        let result = match turn {
            Turn::Start(context) => director.start(context).await,
            Turn::Choose(choice) => director.choose(&choice).await,
            Turn::Approve(visual) => director.approve(&visual).await,
        };
        spinner.finish_and_clear();

        match result {
            Ok(()) if is_render => {
                if let Some(page) = director.state().last_page() {
                    println!("{}", report_saved_panel(&output_folder, page));
                }
            }
            Ok(()) => {}
            // The message is already in the state and shows on the next frame.
            Err(TransitionError::Generation { .. }) | Err(TransitionError::Render { .. }) => {}
            Err(e) => println!("!! {}", e),
        }
    }

    println!(
        "The issue ends after {} panel(s).",
        director.state().pages.len()
    );
    Ok(())
}

/// Saving is best effort; the page is already committed to the story.
fn report_saved_panel(folder: &Path, page: &StoryPage) -> String {
    match save_panel_image(folder, page) {
        Ok(Some(path)) => format!("Panel saved to {}", path.display()),
        Ok(None) => format!("No image for {}, placeholder used.", page.id),
        Err(e) => {
            log::warn!("Failed to save {}: {:#}", page.id, e);
            format!("Could not save {}: {:#}", page.id, e)
        }
    }
}

fn next_turn(state: &StoryState) -> Result<Option<Turn>> {
    match state.phase() {
        Phase::Setup => Ok(prompt_context()?.map(Turn::Start)),
        Phase::Review => match &state.draft {
            Some(draft) => Ok(prompt_review(draft)?.map(Turn::Approve)),
            None => bail!("review without a draft"),
        },
        Phase::Steady => match (&state.context, state.current_choices()) {
            (_, Some(choices)) => Ok(prompt_choice(choices)?.map(Turn::Choose)),
            (Some(context), None) if Screen::of(state).retry_start => {
                let retry = cancellable(
                    Confirm::new("Retry the opening panel?")
                        .with_default(true)
                        .prompt(),
                )?;
                Ok(match retry {
                    Some(true) => Some(Turn::Start(context.clone())),
                    _ => None,
                })
            }
            _ => bail!("steady without choices or a story context"),
        },
        Phase::Drafting | Phase::Rendering => bail!("story is still busy"),
    }
}

fn prompt_review(draft: &StoryDraft) -> Result<Option<String>> {
    let edited = Text::new("Visual Direction (Editable):")
        .with_initial_value(&draft.visual_description)
        .with_help_message(
            "Tip: Add details like lighting, camera angle, or specific objects to guide the artist. Enter to approve & render.",
        )
        .prompt();
    cancellable(edited)
}

fn prompt_choice(choices: &[String; 2]) -> Result<Option<String>> {
    let mut options: Vec<String> = choices
        .iter()
        .enumerate()
        .map(|(idx, choice)| format!("{}. {}", (b'A' + idx as u8) as char, choice))
        .collect();
    options.push(WRITE_YOUR_OWN.to_string());
    options.push(QUIT.to_string());

    let Some(selected) = cancellable(Select::new("What happens next?", options).raw_prompt())? else {
        return Ok(None);
    };

    match selected.index {
        0 | 1 => Ok(Some(choices[selected.index].clone())),
        2 => cancellable(Text::new("Your action:").prompt()),
        _ => Ok(None),
    }
}

fn busy_spinner(kind: BusyKind) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.yellow} {msg} [{elapsed}]")?);
    pb.set_message(kind.label());
    pb.enable_steady_tick(Duration::from_millis(120));
    Ok(pb)
}
