use crate::core::config::LlmConfig;
use crate::core::state::{StoryContext, StoryState};
use crate::core::turn::{Rejected, SegmentRequest, Settled, TransitionError};
use crate::core::view::{ChoicesView, PanelView, ReviewView, Screen};
use crate::services::llm::{ComicGenerator, GeminiClient};
use leptos::*;
use std::rc::Rc;

/// The key is injected at build time, the browser has no process environment.
fn llm_config() -> LlmConfig {
    LlmConfig {
        api_key: option_env!("API_KEY").map(|k| k.to_string()),
        ..LlmConfig::default()
    }
}

/// Stores a settled state. A freshly arrived draft reseeds the edit box.
fn apply(state: RwSignal<StoryState>, edited: RwSignal<String>, settled: Settled) {
    let next = match settled {
        Ok(next) => next,
        Err(Rejected { state: next, error }) => {
            log::warn!("{}", error);
            next
        }
    };
    if state.with_untracked(|s| s.draft.is_none()) {
        if let Some(draft) = &next.draft {
            edited.set(draft.visual_description.clone());
        }
    }
    state.set(next);
}

/// Publishes the drafting state and settles the segment call once it returns.
fn draft_segment(
    state: RwSignal<StoryState>,
    edited: RwSignal<String>,
    generator: Rc<dyn ComicGenerator>,
    begun: Result<(StoryState, SegmentRequest), TransitionError>,
) {
    let (pending, request) = match begun {
        Ok(next) => next,
        Err(e) => {
            log::warn!("{}", e);
            return;
        }
    };
    state.set(pending);
    spawn_local(async move {
        let result = generator
            .generate_segment(&request.history, &request.instruction, &request.context)
            .await;
        apply(state, edited, state.get_untracked().settle_segment(&request, result));
    });
}

fn scroll_to_bottom() {
    if let Some(window) = web_sys::window() {
        if let Some(body) = window.document().and_then(|d| d.body()) {
            window.scroll_to_with_x_and_y(0.0, body.scroll_height() as f64);
        }
    }
}

#[component]
pub fn App() -> impl IntoView {
    let generator: Rc<dyn ComicGenerator> = match GeminiClient::new(&llm_config()) {
        Ok(client) => Rc::new(client),
        Err(e) => {
            return view! { <p class="error">"Failed to create Gemini client: " {e.to_string()}</p> }
                .into_view()
        }
    };

    let state = create_rw_signal(StoryState::new());
    let edited = create_rw_signal(String::new());
    let screen = create_memo(move |_| state.with(Screen::of));

    create_effect(move |_| {
        screen.with(|s| (s.panels.len(), s.review.is_some()));
        scroll_to_bottom();
    });

    let start = {
        let generator = generator.clone();
        Callback::new(move |context: StoryContext| {
            let begun = state.get_untracked().begin_start(context);
            draft_segment(state, edited, generator.clone(), begun);
        })
    };

    let choose = {
        let generator = generator.clone();
        Callback::new(move |choice: String| {
            let begun = state.get_untracked().begin_choice(&choice);
            draft_segment(state, edited, generator.clone(), begun);
        })
    };

    let retry = Callback::new(move |_: ()| {
        if let Some(context) = state.with_untracked(|s| s.context.clone()) {
            start.call(context);
        }
    });

    let approve = Callback::new(move |visual: String| {
        let (pending, request) = match state.get_untracked().begin_render(&visual) {
            Ok(next) => next,
            Err(e) => {
                log::warn!("{}", e);
                return;
            }
        };
        state.set(pending);
        let generator = generator.clone();
        spawn_local(async move {
            let result = generator
                .generate_image(&request.visual_description, &request.art_style)
                .await;
            apply(state, edited, state.get_untracked().settle_render(&request, result));
        });
    });

    view! {
        <div class="app-container">
            <header>
                <h1 class="comic-title">"NOIR NARRATIVES"</h1>
                <p class="subtitle">"Infinite Comic Generator"</p>
            </header>
            <main>
                {move || screen.with(|s| s.setup_form).then(|| view! { <SetupForm on_start=start/> })}
                {move || {
                    screen
                        .get()
                        .panels
                        .into_iter()
                        .map(|panel| view! { <ComicPanel panel=panel/> })
                        .collect_view()
                }}
                {move || {
                    screen
                        .get()
                        .review
                        .map(|review| view! { <ScriptReview review=review edited=edited on_confirm=approve/> })
                }}
                {move || screen.get().error.map(|e| view! { <div class="error-banner">{e}</div> })}
                {move || screen.get().busy.map(|b| view! { <div class="busy-indicator">{b.label()}</div> })}
                {move || {
                    screen
                        .with(|s| s.retry_start)
                        .then(|| view! { <button class="retry" on:click=move |_| retry.call(())>"Try again"</button> })
                }}
            </main>
            {move || {
                screen
                    .get()
                    .choices
                    .map(|choices| view! { <Controls choices=choices on_choose=choose/> })
            }}
        </div>
    }
    .into_view()
}

#[component]
fn SetupForm(on_start: Callback<StoryContext>) -> impl IntoView {
    let defaults = StoryContext::default();
    let name = create_rw_signal(defaults.character_name);
    let description = create_rw_signal(defaults.character_description);
    let plot = create_rw_signal(defaults.plot_summary);
    let style = create_rw_signal(defaults.art_style);

    let on_submit = move |ev: ev::SubmitEvent| {
        ev.prevent_default();
        on_start.call(StoryContext {
            character_name: name.get_untracked(),
            character_description: description.get_untracked(),
            plot_summary: plot.get_untracked(),
            art_style: style.get_untracked(),
        });
    };

    view! {
        <form class="setup-form" on:submit=on_submit>
            <h2>"Create Your Issue"</h2>
            <label>"Protagonist Name"</label>
            <input
                type="text"
                placeholder="e.g. Space Marine Titus"
                prop:value=move || name.get()
                on:input=move |ev| name.set(event_target_value(&ev))
            />
            <label>"Appearance & Personality"</label>
            <textarea
                rows="2"
                prop:value=move || description.get()
                on:input=move |ev| description.set(event_target_value(&ev))
            ></textarea>
            <label>"The Setup / Plot"</label>
            <textarea
                rows="3"
                prop:value=move || plot.get()
                on:input=move |ev| plot.set(event_target_value(&ev))
            ></textarea>
            <label>"Art Style"</label>
            <input
                type="text"
                prop:value=move || style.get()
                on:input=move |ev| style.set(event_target_value(&ev))
            />
            <button type="submit">"Start the Story"</button>
        </form>
    }
}

#[component]
fn ComicPanel(panel: PanelView) -> impl IntoView {
    let class = if panel.active { "comic-panel active" } else { "comic-panel" };
    view! {
        <div class=class>
            <img src=panel.image_url alt=panel.visual_description/>
            <p class="caption">{panel.narrative}</p>
            <span class="page-number">"#" {panel.number}</span>
        </div>
    }
}

#[component]
fn ScriptReview(review: ReviewView, edited: RwSignal<String>, on_confirm: Callback<String>) -> impl IntoView {
    let editable = review.editable;
    view! {
        <div class="script-review">
            <h3>"Script Editor // Review Phase"</h3>
            <label>"Narrative Caption (Locked)"</label>
            <p class="narrative">"\"" {review.narrative} "\""</p>
            <label>"Visual Direction (Editable)"</label>
            <textarea
                rows="4"
                disabled=!editable
                prop:value=move || edited.get()
                on:input=move |ev| edited.set(event_target_value(&ev))
            ></textarea>
            <p class="tip">
                "Tip: Add details like lighting, camera angle, or specific objects to guide the artist."
            </p>
            <button disabled=!editable on:click=move |_| on_confirm.call(edited.get_untracked())>
                {if editable { "Approve & Render Panel" } else { "Inking Page..." }}
            </button>
        </div>
    }
}

#[component]
fn Controls(choices: ChoicesView, on_choose: Callback<String>) -> impl IntoView {
    if !choices.enabled {
        return view! { <div class="controls">"Constructing Reality..."</div> }.into_view();
    }

    view! {
        <div class="controls">
            {choices
                .options
                .into_iter()
                .enumerate()
                .map(|(idx, choice)| {
                    let letter = ((b'A' + idx as u8) as char).to_string();
                    let label = choice.clone();
                    view! {
                        <button on:click=move |_| on_choose.call(choice.clone())>
                            <span class="choice-letter">{letter}</span>
                            {label}
                        </button>
                    }
                })
                .collect_view()}
        </div>
    }
    .into_view()
}
