//! NFC POS Web Frontend
//!
//! Leptos-based WASM frontend: amount keypad with simulated tap-to-pay,
//! transaction history and the Base plan sign-up.

mod api;
mod app;
mod components;
mod keypad;
mod pages;

pub use app::App;
pub use keypad::AmountEntry;

use wasm_bindgen::prelude::*;

/// WASM entry point
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    leptos::mount::mount_to_body(App);
}
