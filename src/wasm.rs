use std::sync::Arc;

use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

use crate::clock::JsClock;
use crate::layout::{LayoutContext, LayoutEngine, Viewport};
use crate::model::{Forest, Settings};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LayoutOutput {
    forest: Forest,
    viewport: Viewport,
    pass: u64,
    anchor_shift: Option<(f64, f64)>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ViewInput {
    #[serde(default)]
    viewport: Viewport,
    #[serde(default)]
    anchor: Option<String>,
}

fn to_js(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Lay out a forest. `view` is optional: `{ viewport: { panX, panY }, anchor }`.
#[wasm_bindgen(js_name = layoutForest)]
pub fn layout_forest(forest: JsValue, settings: JsValue, view: JsValue) -> Result<JsValue, JsValue> {
    let mut forest: Forest = serde_wasm_bindgen::from_value(forest).map_err(to_js)?;
    let settings: Settings = if settings.is_undefined() || settings.is_null() {
        Settings::default()
    } else {
        serde_wasm_bindgen::from_value(settings).map_err(to_js)?
    };
    let view: ViewInput = if view.is_undefined() || view.is_null() {
        ViewInput::default()
    } else {
        serde_wasm_bindgen::from_value(view).map_err(to_js)?
    };

    let engine = LayoutEngine::from_settings(&settings, Arc::new(JsClock::new())).map_err(to_js)?;
    let mut ctx = LayoutContext::new(view.viewport);
    ctx.pending_anchor = view.anchor;
    let applied = engine.layout(&mut forest, &settings, &mut ctx).map_err(to_js)?;

    let output = LayoutOutput {
        forest,
        viewport: ctx.viewport,
        pass: applied.pass,
        anchor_shift: applied.anchor_shift,
    };
    serde_wasm_bindgen::to_value(&output).map_err(to_js)
}
