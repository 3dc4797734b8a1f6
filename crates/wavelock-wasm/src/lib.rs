//! Wavelock WASM - WebAssembly bindings for the wavelock pipeline
//!
//! Exposes the byte-level operations of `wavelock-core` to a browser upload
//! front-end. Errors cross the boundary as strings.
//!
//! # Module Structure
//!
//! - `compress` - wavelet compression and quality evaluation
//! - `crypto` - password-based encryption and decryption
//! - `metadata` - `Hash` tag embedding and reading
//! - `types` - wrapper types for the artifacts
//!
//! # Usage
//!
//! ```typescript
//! import init, { compress_image, encrypt_bytes, embed_hash } from '@wavelock/wasm';
//!
//! await init();
//!
//! const bytes = new Uint8Array(await file.arrayBuffer());
//! const compressed = compress_image(bytes, undefined, undefined);
//! const blob = encrypt_bytes(compressed.bytes(), password, undefined, undefined);
//! const tagged = embed_hash(compressed.bytes(), blob.content_hash);
//! ```

use wasm_bindgen::prelude::*;

mod compress;
mod crypto;
mod metadata;
mod types;

pub use compress::{compress_image, evaluate_compression};
pub use crypto::{decrypt_bytes, encrypt_bytes};
pub use metadata::{embed_hash, read_embedded_tag};
pub use types::{JsCompressedImage, JsEncryptedBlob, JsMetadataImage, JsQualityMetrics};

/// Get the version of the WASM module
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

pub(crate) fn to_js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}
