//! WASM bindings for the layout engine.
//!
//! `JsLayoutEngine` wraps [`LayoutEngine`] with a JavaScript callback as its
//! sink and `Date.now()` as its clock.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use js_sys::{Function, Promise, Reflect};
use serde::Serialize;
use serde_wasm_bindgen::{from_value, Serializer};
use tracing::warn;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{spawn_local, JsFuture};

use super::engine::{LayoutEngine, LayoutSink, SaveStatus};
use super::model::{parse_measure, IncomingSnapshot, LayoutChange, LayoutSnapshot, PhotoFile, Side};
use super::sync::Clock;
use crate::config::EngineConfig;
use crate::error::{LayoutError, LayoutResult};

/// Serialize a value to JsValue with HashMaps as plain JS objects (not Map).
fn to_js_value<T: Serialize>(value: &T) -> Result<JsValue, serde_wasm_bindgen::Error> {
    value.serialize(&Serializer::new().serialize_maps_as_objects(true))
}

// =============================================================================
// ERROR CONVERSION
// =============================================================================

impl From<LayoutError> for JsValue {
    fn from(err: LayoutError) -> JsValue {
        JsValue::from_str(&err.to_string())
    }
}

/// Helper macro for Result conversion
macro_rules! js_result {
    ($expr:expr) => {
        $expr.map_err(|e: LayoutError| JsValue::from(e))
    };
}

fn parse_side(side: &str) -> Result<Side, JsValue> {
    js_result!(side.parse::<Side>())
}

fn js_error_message(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{:?}", value))
}

// =============================================================================
// CLOCK AND SINK
// =============================================================================

/// `Date.now()` clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsClock;

impl Clock for JsClock {
    fn now_ms(&self) -> u64 {
        js_sys::Date::now() as u64
    }
}

type SharedEngine = RefCell<LayoutEngine<JsSink, JsClock>>;

/// Sink calling a JavaScript function with every change.
///
/// A callback returning a Promise leaves the save in flight until the
/// Promise settles; a rejection counts as a failed save, as does a throwing
/// callback.
pub struct JsSink {
    callback: Function,
    engine: Weak<SharedEngine>,
}

impl JsSink {
    fn watch(&self, promise: Promise, side: Side, version: u64) {
        let engine = self.engine.clone();
        spawn_local(async move {
            let result = JsFuture::from(promise)
                .await
                .map(|_| ())
                .map_err(|e| LayoutError::sink(js_error_message(&e)));
            let Some(engine) = engine.upgrade() else {
                return;
            };
            match engine.try_borrow_mut() {
                Ok(mut engine) => {
                    engine.settle_change(side, version, result);
                }
                Err(_) => warn!(%side, version, "engine busy, save outcome dropped"),
            }
        });
    }
}

impl LayoutSink for JsSink {
    fn apply_change(&mut self, change: &LayoutChange) -> LayoutResult<SaveStatus> {
        let value = to_js_value(change).map_err(|e| LayoutError::serialization(e.to_string()))?;
        if let Some(file) = &change.snapshot.photo_file {
            let file = to_js_value(file).map_err(|e| LayoutError::serialization(e.to_string()))?;
            let snapshot = Reflect::get(&value, &JsValue::from_str("snapshot"))
                .map_err(|e| LayoutError::sink(format!("{:?}", e)))?;
            Reflect::set(&snapshot, &JsValue::from_str("photoFile"), &file)
                .map_err(|e| LayoutError::sink(format!("{:?}", e)))?;
        }

        let returned = self
            .callback
            .call1(&JsValue::NULL, &value)
            .map_err(|e| LayoutError::sink(js_error_message(&e)))?;
        match returned.dyn_into::<Promise>() {
            Ok(promise) => {
                self.watch(promise, change.side, change.version);
                Ok(SaveStatus::InFlight)
            }
            Err(_) => Ok(SaveStatus::Settled),
        }
    }
}

// =============================================================================
// MAIN WRAPPER TYPE
// =============================================================================

/// JavaScript-friendly wrapper around LayoutEngine.
#[wasm_bindgen]
pub struct JsLayoutEngine {
    inner: Rc<SharedEngine>,
}

#[wasm_bindgen]
impl JsLayoutEngine {
    /// Creates an engine. `config` is an optional partial `EngineConfig`.
    ///
    /// # Example (JavaScript)
    /// ```js
    /// const engine = new JsLayoutEngine((change) => saveLayout(change), { taskPrefix: 'OS-42' });
    /// ```
    #[wasm_bindgen(constructor)]
    pub fn new(on_change: Function, config: JsValue) -> Result<JsLayoutEngine, JsValue> {
        let config: EngineConfig = if config.is_undefined() || config.is_null() {
            EngineConfig::default()
        } else {
            from_value(config)?
        };
        let inner = Rc::new_cyclic(|engine| {
            let sink = JsSink {
                callback: on_change,
                engine: engine.clone(),
            };
            RefCell::new(LayoutEngine::with_clock(sink, JsClock, config))
        });
        Ok(JsLayoutEngine { inner })
    }

    /// Offers a persisted snapshot. Returns the admission decision.
    ///
    /// # Example (JavaScript)
    /// ```js
    /// const decision = engine.receiveSnapshot('back', { height: 2.42, layoutSections: [...] }, null);
    /// if (decision.status !== 'applied') console.debug(decision);
    /// ```
    #[wasm_bindgen(js_name = receiveSnapshot)]
    pub fn receive_snapshot(
        &mut self,
        side: &str,
        snapshot: JsValue,
        acknowledged_version: Option<f64>,
    ) -> Result<JsValue, JsValue> {
        let side = parse_side(side)?;
        let snapshot: LayoutSnapshot = from_value(snapshot)?;
        let incoming = IncomingSnapshot {
            snapshot,
            acknowledged_version: acknowledged_version.map(|v| v as u64),
        };
        let admission = js_result!(self.inner.borrow_mut().receive_snapshot(side, incoming))?;
        Ok(to_js_value(&admission)?)
    }

    /// Reports the outcome of the oldest outstanding save. Only needed by
    /// hosts that persist outside the Promise returned from the callback.
    #[wasm_bindgen(js_name = saveSettled)]
    pub fn save_settled(&mut self, ok: bool, error: Option<String>) {
        let result = if ok {
            Ok(())
        } else {
            Err(LayoutError::sink(error.unwrap_or_else(|| "save failed".to_string())))
        };
        self.inner.borrow_mut().save_settled(result);
    }

    #[wasm_bindgen(js_name = selectSide)]
    pub fn select_side(&mut self, side: &str) -> Result<(), JsValue> {
        let side = parse_side(side)?;
        js_result!(self.inner.borrow_mut().select_side(side))
    }

    #[wasm_bindgen(js_name = activeSide)]
    pub fn active_side(&self) -> String {
        self.inner.borrow().active_side().to_string()
    }
}

// =============================================================================
// EDITING METHODS
// =============================================================================

#[wasm_bindgen]
impl JsLayoutEngine {
    /// Adds a default door to the active side. Returns its ID.
    #[wasm_bindgen(js_name = addDoor)]
    pub fn add_door(&mut self) -> Result<String, JsValue> {
        js_result!(self.inner.borrow_mut().add_door())
    }

    #[wasm_bindgen(js_name = removeDoor)]
    pub fn remove_door(&mut self, id: &str) -> Result<(), JsValue> {
        js_result!(self.inner.borrow_mut().remove_door(id))
    }

    #[wasm_bindgen(js_name = moveDoor)]
    pub fn move_door(&mut self, id: &str, position: f64) -> Result<f64, JsValue> {
        js_result!(self.inner.borrow_mut().move_door(id, position))
    }

    #[wasm_bindgen(js_name = resizeDoor)]
    pub fn resize_door(&mut self, id: &str, width: f64) -> Result<(), JsValue> {
        js_result!(self.inner.borrow_mut().resize_door(id, width))
    }

    #[wasm_bindgen(js_name = setDoorHeight)]
    pub fn set_door_height(&mut self, id: &str, door_height: f64) -> Result<f64, JsValue> {
        js_result!(self.inner.borrow_mut().set_door_height(id, door_height))
    }

    /// Resizes a segment of the active side from raw user input ("1,5" is accepted).
    ///
    /// # Example (JavaScript)
    /// ```js
    /// engine.resizeSegment(2, input.value);
    /// ```
    #[wasm_bindgen(js_name = resizeSegment)]
    pub fn resize_segment(&mut self, index: usize, width: &str) -> Result<(), JsValue> {
        js_result!(self.inner.borrow_mut().resize_segment(index, parse_measure(width)))
    }

    #[wasm_bindgen(js_name = setTotalWidth)]
    pub fn set_total_width(&mut self, width: &str) -> Result<f64, JsValue> {
        js_result!(self.inner.borrow_mut().set_total_width(parse_measure(width)))
    }

    #[wasm_bindgen(js_name = setHeight)]
    pub fn set_height(&mut self, height: &str) -> Result<f64, JsValue> {
        js_result!(self.inner.borrow_mut().set_height(parse_measure(height)))
    }

    #[wasm_bindgen(js_name = copySide)]
    pub fn copy_side(&mut self, from: &str, to: &str) -> Result<(), JsValue> {
        let (from, to) = (parse_side(from)?, parse_side(to)?);
        js_result!(self.inner.borrow_mut().copy_side(from, to))
    }

    #[wasm_bindgen(js_name = mirrorSide)]
    pub fn mirror_side(&mut self, from: &str, to: &str) -> Result<(), JsValue> {
        let (from, to) = (parse_side(from)?, parse_side(to)?);
        js_result!(self.inner.borrow_mut().mirror_side(from, to))
    }

    /// Attaches a rear photo chosen by the user.
    ///
    /// # Example (JavaScript)
    /// ```js
    /// const bytes = new Uint8Array(await file.arrayBuffer());
    /// engine.setPhotoFile(file.name, file.type, bytes);
    /// ```
    #[wasm_bindgen(js_name = setPhotoFile)]
    pub fn set_photo_file(&mut self, name: &str, content_type: &str, bytes: &[u8]) -> Result<(), JsValue> {
        js_result!(self.inner.borrow_mut().set_photo_file(PhotoFile::new(name, content_type, bytes.to_vec())))
    }

    #[wasm_bindgen(js_name = removePhoto)]
    pub fn remove_photo(&mut self) -> Result<(), JsValue> {
        js_result!(self.inner.borrow_mut().remove_photo())
    }
}

// =============================================================================
// QUERY AND EXPORT METHODS
// =============================================================================

#[wasm_bindgen]
impl JsLayoutEngine {
    /// Gets a side's state (`height`, `totalWidth`, `doors`) in centimeters.
    #[wasm_bindgen(js_name = getState)]
    pub fn get_state(&self, side: &str) -> Result<JsValue, JsValue> {
        let side = parse_side(side)?;
        Ok(to_js_value(self.inner.borrow().state(side))?)
    }

    /// Gets the derived panel/door segments of a side.
    #[wasm_bindgen(js_name = getSegments)]
    pub fn get_segments(&self, side: &str) -> Result<JsValue, JsValue> {
        let side = parse_side(side)?;
        Ok(to_js_value(&self.inner.borrow().segments(side))?)
    }

    /// Gets the persisted (meter) shape of a side.
    #[wasm_bindgen(js_name = getSnapshot)]
    pub fn get_snapshot(&self, side: &str) -> Result<JsValue, JsValue> {
        let side = parse_side(side)?;
        Ok(to_js_value(&self.inner.borrow().snapshot(side))?)
    }

    /// Gets `{ imageUrl, photoId }` of the rear photo.
    #[wasm_bindgen(js_name = getPhoto)]
    pub fn get_photo(&self) -> Result<JsValue, JsValue> {
        Ok(to_js_value(self.inner.borrow().photo())?)
    }

    #[wasm_bindgen(js_name = hasPendingChanges)]
    pub fn has_pending_changes(&self) -> bool {
        self.inner.borrow().has_pending_changes()
    }

    #[wasm_bindgen(js_name = isSaving)]
    pub fn is_saving(&self) -> bool {
        self.inner.borrow().is_saving()
    }

    #[wasm_bindgen(js_name = lastSaveError)]
    pub fn last_save_error(&self) -> Option<String> {
        self.inner.borrow().last_save_error().map(str::to_string)
    }

    #[wasm_bindgen(js_name = exportSvg)]
    pub fn export_svg(&self, side: &str) -> Result<String, JsValue> {
        let side = parse_side(side)?;
        js_result!(self.inner.borrow().export_svg(side))
    }

    /// Renders a side for download.
    ///
    /// # Example (JavaScript)
    /// ```js
    /// const { fileName, contents, mimeType } = engine.exportFile('left');
    /// const url = URL.createObjectURL(new Blob([contents], { type: mimeType }));
    /// ```
    #[wasm_bindgen(js_name = exportFile)]
    pub fn export_file(&self, side: &str) -> Result<JsValue, JsValue> {
        let side = parse_side(side)?;
        let file = js_result!(self.inner.borrow().export_file(side))?;
        let result = js_sys::Object::new();
        Reflect::set(&result, &"fileName".into(), &file.file_name.into())?;
        Reflect::set(&result, &"contents".into(), &file.contents.into())?;
        Reflect::set(&result, &"mimeType".into(), &super::drawing::ExportFile::MIME_TYPE.into())?;
        Ok(result.into())
    }
}
