//! WASM bindings for the PDF annotation editor
//!
//! All editing state lives in Rust inside an [`EditorSession`]. JavaScript
//! renders pages, forwards pointer and keyboard events, and draws whatever
//! the session reports back.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { EditorSession } from './pkg/annotate_wasm.js';
//!
//! await init();
//!
//! const session = new EditorSession("report.pdf", bytes);
//! session.setZoom(1.5);
//! session.setTool("highlight");
//! session.pointerDown(0, 120, 80);
//! session.pointerMove(0, 300, 96);
//! session.pointerUp(0, 300, 96);
//! const result = session.export();
//! ```

pub mod session;
pub mod storage;

use wasm_bindgen::prelude::*;

pub use session::EditorSession;
pub use storage::LocalStorage;

#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

#[wasm_bindgen]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Page count from PDF bytes without opening a session
#[wasm_bindgen]
pub fn get_page_count(bytes: &[u8]) -> Result<u32, JsValue> {
    annotate_core::get_page_count(bytes)
        .map(|n| n as u32)
        .map_err(|e| JsValue::from_str(&e.to_string()))
}
