mod engine;
mod game;
pub mod sim;

use std::cell::RefCell;
use std::rc::Rc;

use log::{info, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Document, HtmlCanvasElement, KeyboardEvent, Request, RequestInit, RequestMode, Response, WebGlRenderingContext, Window};

use crate::engine::renderer::Renderer;
use crate::game::Game;
use crate::sim::config::GameConfig;
use crate::sim::input::TouchButton;
use crate::sim::SimEvent;

const CONFIG_PATH: &str = "/assets/config.json";

thread_local! {
    static GAME: RefCell<Option<Game>> = RefCell::new(None);
}

#[wasm_bindgen]
pub async fn init_game() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Info).ok();

    let window = web_sys::window().ok_or("No window")?;
    let document = window.document().ok_or("No document")?;
    let canvas = document.get_element_by_id("game-canvas")
        .ok_or("No canvas")?
        .dyn_into::<HtmlCanvasElement>()?;

    let gl = canvas
        .get_context("webgl")?
        .ok_or("No WebGL")?
        .dyn_into::<WebGlRenderingContext>()?;

    fit_canvas(&window, &canvas);
    let renderer = Renderer::new(gl)?;
    let config = load_config(&window).await;

    let game = Game::new(renderer, config, window.clone())
        .map_err(|err| JsValue::from_str(&err.to_string()))?;
    GAME.with(|g| *g.borrow_mut() = Some(game));
    info!("game started");

    let keydown = Closure::wrap(Box::new(move |event: KeyboardEvent| {
        let key = event.key();
        if key.eq_ignore_ascii_case("f") {
            toggle_fullscreen();
            return;
        }
        GAME.with(|g| {
            if let Some(game) = g.borrow_mut().as_mut() {
                if game.input.key_down(&key) {
                    event.prevent_default();
                }
            }
        });
    }) as Box<dyn FnMut(_)>);
    window.add_event_listener_with_callback("keydown", keydown.as_ref().unchecked_ref())?;
    keydown.forget();

    let keyup = Closure::wrap(Box::new(move |event: KeyboardEvent| {
        GAME.with(|g| {
            if let Some(game) = g.borrow_mut().as_mut() {
                game.input.key_up(&event.key());
            }
        });
    }) as Box<dyn FnMut(_)>);
    window.add_event_listener_with_callback("keyup", keyup.as_ref().unchecked_ref())?;
    keyup.forget();

    let resize_window = window.clone();
    let resize = Closure::wrap(Box::new(move || {
        fit_canvas(&resize_window, &canvas);
    }) as Box<dyn FnMut()>);
    window.add_event_listener_with_callback("resize", resize.as_ref().unchecked_ref())?;
    resize.forget();

    // Keys released while the page is hidden never fire keyup.
    let blur = Closure::wrap(Box::new(move || {
        GAME.with(|g| {
            if let Some(game) = g.borrow_mut().as_mut() {
                game.input.release_all();
            }
        });
    }) as Box<dyn FnMut()>);
    window.add_event_listener_with_callback("blur", blur.as_ref().unchecked_ref())?;
    blur.forget();

    // Game loop
    let f = Rc::new(RefCell::new(None));
    let g = f.clone();
    let mut last_frame = js_sys::Date::now();

    *g.borrow_mut() = Some(Closure::wrap(Box::new(move || {
        let now = js_sys::Date::now();
        let dt = ((now - last_frame) / 1000.0) as f32;
        last_frame = now;

        GAME.with(|game| {
            if let Some(game) = game.borrow_mut().as_mut() {
                let events = game.update(dt);
                game.render();
                update_ui(game, &events);
            }
        });
        if let Some(callback) = f.borrow().as_ref() {
            request_animation_frame(callback);
        }
    }) as Box<dyn FnMut()>));

    if let Some(callback) = g.borrow().as_ref() {
        request_animation_frame(callback);
    }

    Ok(())
}

/// Reads the game configuration, falling back to the built-in defaults when
/// it is missing or invalid.
async fn load_config(window: &Window) -> GameConfig {
    match fetch_config(window).await {
        Ok(config) => match config.validate() {
            Ok(()) => config,
            Err(err) => {
                warn!("{} is invalid ({}); using defaults", CONFIG_PATH, err);
                GameConfig::default()
            }
        },
        Err(err) => {
            warn!("could not load {} ({:?}); using defaults", CONFIG_PATH, err);
            GameConfig::default()
        }
    }
}

async fn fetch_config(window: &Window) -> Result<GameConfig, JsValue> {
    let opts = RequestInit::new();
    opts.set_method("GET");
    opts.set_mode(RequestMode::Cors);

    let request = Request::new_with_str_and_init(CONFIG_PATH, &opts)?;
    let response: Response = JsFuture::from(window.fetch_with_request(&request)).await?.dyn_into()?;
    if !response.ok() {
        return Err(JsValue::from_str(&format!("HTTP {}", response.status())));
    }
    let json = JsFuture::from(response.json()?).await?;
    Ok(serde_wasm_bindgen::from_value(json)?)
}

/// Sizes the canvas backing store to the window. The renderer picks the new
/// size up on its next frame.
fn fit_canvas(window: &Window, canvas: &HtmlCanvasElement) {
    let width = window.inner_width().ok().and_then(|v| v.as_f64());
    let height = window.inner_height().ok().and_then(|v| v.as_f64());
    match (width, height) {
        (Some(width), Some(height)) => {
            let (width, height) = viewport_size(width, height);
            canvas.set_width(width);
            canvas.set_height(height);
        }
        _ => warn!("window size unavailable; keeping canvas size"),
    }
}

fn viewport_size(width: f64, height: f64) -> (u32, u32) {
    let clamp = |v: f64| if v.is_finite() { v.max(1.0).round() as u32 } else { 1 };
    (clamp(width), clamp(height))
}

fn request_animation_frame(f: &Closure<dyn FnMut()>) {
    if let Some(window) = web_sys::window() {
        if window.request_animation_frame(f.as_ref().unchecked_ref()).is_err() {
            warn!("requestAnimationFrame failed; stopping");
        }
    }
}

fn toggle_fullscreen() {
    let Some(document) = web_sys::window().and_then(|w| w.document()) else {
        return;
    };
    let result = if document.fullscreen_element().is_some() {
        document.exit_fullscreen();
        Ok(())
    } else {
        match document.document_element() {
            Some(root) => root.request_fullscreen(),
            None => Ok(()),
        }
    };
    if let Err(err) = result {
        warn!("fullscreen request failed: {:?}", err);
    }
}

fn set_text(document: &Document, id: &str, text: &str) {
    if let Some(el) = document.get_element_by_id(id) {
        el.set_inner_html(text);
    }
}

fn set_style(document: &Document, id: &str, style: &str) {
    if let Some(el) = document.get_element_by_id(id) {
        el.set_attribute("style", style).ok();
    }
}

fn update_ui(game: &Game, events: &[SimEvent]) {
    let Some(document) = web_sys::window().and_then(|w| w.document()) else {
        return;
    };
    let hud = game.sim.hud();

    set_text(&document, "speed", &hud.speed.to_string());
    set_text(&document, "distance", &hud.distance.to_string());
    set_text(&document, "score", &hud.score.to_string());
    set_text(&document, "area", hud.biome);
    set_text(&document, "weather", hud.weather);

    for event in events {
        match event {
            SimEvent::Crashed { cause, score } => {
                set_text(&document, "crash-message", &format!("You crashed into a {}!", cause));
                set_text(&document, "final-score", &score.to_string());
                set_style(&document, "game-over", "display: flex;");
            }
            SimEvent::Restarted => set_style(&document, "game-over", "display: none;"),
            SimEvent::EnvironmentChanged { .. } => {}
        }
    }

    let progress = game.sim.loading_progress() * 100.0;
    set_style(&document, "loading-progress", &format!("width: {}%;", progress.round()));
    set_text(&document, "loading-text", &format!("Loading models... {}%", progress.round()));
    if progress >= 100.0 {
        set_style(&document, "loading-screen", "display: none;");
    }
}

#[wasm_bindgen]
pub fn touch_control(button: &str, pressed: bool) {
    let Some(button) = TouchButton::from_name(button) else {
        warn!("unknown touch button {}", button);
        return;
    };
    GAME.with(|g| {
        if let Some(game) = g.borrow_mut().as_mut() {
            game.input.set_touch(button, pressed);
        }
    });
}

#[wasm_bindgen]
pub fn restart_game() {
    GAME.with(|g| {
        if let Some(game) = g.borrow_mut().as_mut() {
            game.restart();
        }
    });
}
