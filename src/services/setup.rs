use crate::core::state::StoryContext;
use anyhow::Result;
use inquire::validator::Validation;
use inquire::{InquireError, Text};

/// Maps Esc / Ctrl-C to `None` so callers can treat them as "quit".
pub fn cancellable<T>(result: Result<T, InquireError>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(InquireError::OperationCanceled) | Err(InquireError::OperationInterrupted) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn ask(prompt: &str, initial: &str, placeholder: &str) -> Result<Option<String>> {
    let answer = Text::new(prompt)
        .with_initial_value(initial)
        .with_placeholder(placeholder)
        .with_validator(|input: &str| {
            if input.trim().is_empty() {
                Ok(Validation::Invalid("This field cannot be empty.".into()))
            } else {
                Ok(Validation::Valid)
            }
        })
        .prompt();
    Ok(cancellable(answer)?.map(|s| s.trim().to_string()))
}

/// The setup form. Fields start out filled with the demo premise.
pub fn prompt_context() -> Result<Option<StoryContext>> {
    let defaults = StoryContext::default();

    println!("== Create Your Issue ==");

    let Some(character_name) = ask(
        "Protagonist Name:",
        &defaults.character_name,
        "e.g. Space Marine Titus",
    )?
    else {
        return Ok(None);
    };
    let Some(character_description) = ask(
        "Appearance & Personality:",
        &defaults.character_description,
        "Describe their look and attitude",
    )?
    else {
        return Ok(None);
    };
    let Some(plot_summary) = ask(
        "The Setup / Plot:",
        &defaults.plot_summary,
        "Where does the story begin?",
    )?
    else {
        return Ok(None);
    };
    let Some(art_style) = ask("Art Style:", &defaults.art_style, "e.g. Watercolor, Manga")? else {
        return Ok(None);
    };

    Ok(Some(StoryContext {
        character_name,
        character_description,
        plot_summary,
        art_style,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_and_interrupt_mean_quit() -> Result<()> {
        assert_eq!(cancellable::<String>(Err(InquireError::OperationCanceled))?, None);
        assert_eq!(cancellable::<String>(Err(InquireError::OperationInterrupted))?, None);
        assert_eq!(cancellable(Ok(3))?, Some(3));
        Ok(())
    }

    #[test]
    fn test_other_prompt_errors_propagate() {
        assert!(cancellable::<String>(Err(InquireError::NotTTY)).is_err());
    }
}
