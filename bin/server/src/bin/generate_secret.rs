//! Prints a fresh base64-encoded key for `SESSION__SECRET_KEY`.

use axum_extra::extract::cookie::Key;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

fn main() {
    let key = Key::generate();
    println!("{}", STANDARD.encode(key.master()));
}
