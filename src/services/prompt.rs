use crate::core::state::{StoryContext, StoryPage};
use crate::core::turn::Segment;
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};

pub const SYSTEM_INSTRUCTION: &str = "\
You are a master comic book writer and director.
Your goal is to generate the next \"Panel\" of a continuous graphic novel.

RULES:
1. NARRATIVE: Keep captions punchy, atmospheric, and brief (under 50 words). Move the plot forward significantly.
2. VISUAL DESCRIPTION (CRITICAL): You are the cinematographer.
   - You MUST specify a CAMERA ANGLE (e.g., \"Extreme Close-up\", \"Bird's eye view\", \"Low angle\", \"Over-the-shoulder\").
   - You MUST describe the ACTION. What is the character DOING right now? (e.g., \"Lighting a cigarette,\" \"Running down a rainy alley,\" \"Punching a demon\").
   - Do NOT just describe the character's appearance again. Describe the SCENE and the MOMENT.
   - Include lighting and color mood specific to this scene (e.g., \"Bathed in harsh neon red light\").
3. CHOICES: Provide exactly 2 distinct choices that will lead to different visual outcomes.
";

/// One line per committed panel, oldest first.
pub fn history_text(history: &[StoryPage]) -> String {
    history
        .iter()
        .enumerate()
        .map(|(i, page)| {
            format!(
                "[PANEL {}] Narrative: \"{}\" | Visual Action: \"{}\" | Reader Choice: \"{}\"",
                i + 1,
                page.narrative,
                page.visual_description,
                page.user_choice.as_deref().unwrap_or("None")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn segment_prompt(history: &[StoryPage], instruction: &str, context: &StoryContext) -> String {
    let panel_number = history.len() + 1;

    let composition = if history.is_empty() {
        "Open with a strong establishing composition.".to_string()
    } else {
        format!(
            "Ensure the visual composition is DIFFERENT from Panel {}.\n\
             If the last panel was a wide shot, make this a close-up or medium shot.",
            panel_number - 1
        )
    };

    format!(
        "STORY CONTEXT:\n\
         - Protagonist: {} ({})\n\
         - Plot Outline: {}\n\
         - Art Style: {}\n\
         \n\
         PREVIOUS PANELS:\n\
         {}\n\
         \n\
         CURRENT SITUATION:\n\
         The reader chose: \"{}\".\n\
         \n\
         TASK:\n\
         Generate Panel #{}.\n\
         {}\n\
         Make the visual description highly specific to the action implied by the user's choice.",
        context.character_name,
        context.character_description,
        context.plot_summary,
        context.art_style,
        history_text(history),
        instruction,
        panel_number,
        composition,
    )
}

/// The JSON schema the text model must answer with.
pub fn segment_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "narrative": {
                "type": "STRING",
                "description": "The story text/caption for this panel."
            },
            "visual_description": {
                "type": "STRING",
                "description": "A detailed visual prompt for the image generator. MUST start with the Camera Angle and Action."
            },
            "choices": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "minItems": 2,
                "maxItems": 2,
                "description": "Two distinct actions for the protagonist."
            }
        },
        "required": ["narrative", "visual_description", "choices"]
    })
}

#[derive(Deserialize)]
struct SegmentResponse {
    narrative: String,
    visual_description: String,
    choices: Vec<String>,
}

pub fn parse_segment(response: &str) -> Result<Segment> {
    let clean_json = strip_code_blocks(response);
    let parsed: SegmentResponse = serde_json::from_str(&clean_json)
        .with_context(|| format!("Failed to parse segment JSON: {}", clean_json))?;

    let count = parsed.choices.len();
    let choices: [String; 2] = parsed
        .choices
        .try_into()
        .map_err(|_| anyhow!("Expected exactly 2 choices, got {}", count))?;

    Ok(Segment {
        narrative: parsed.narrative,
        visual_description: parsed.visual_description,
        choices,
    })
}

pub fn image_prompt(visual_description: &str, art_style: &str) -> String {
    let style = art_style.trim();
    if style.is_empty() {
        format!(
            "{}. Comic book panel, masterpiece, graphic novel style, high detailed.",
            visual_description
        )
    } else {
        format!(
            "{}. Art style: {}. Comic book panel, masterpiece, graphic novel style, high detailed.",
            visual_description, style
        )
    }
}

pub fn strip_code_blocks(s: &str) -> String {
    let s = s.trim();
    if s.starts_with("```json") {
        s.trim_start_matches("```json").trim_end_matches("```").trim().to_string()
    } else if s.starts_with("```") {
        s.trim_start_matches("```").trim_end_matches("```").trim().to_string()
    } else {
        s.to_string()
    }
}
