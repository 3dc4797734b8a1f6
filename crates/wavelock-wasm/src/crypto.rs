//! Encryption bindings.
//!
//! Keys are derived in the browser with the same PBKDF2 parameters the
//! native pipeline uses, so blobs decrypt on either side.

use wasm_bindgen::prelude::*;
use wavelock_core::crypto::{self, KdfParams};

use crate::to_js_error;
use crate::types::JsEncryptedBlob;

/// Encrypt bytes under a password. `salt` and `iterations` default to the
/// pipeline defaults.
#[wasm_bindgen]
pub fn encrypt_bytes(
    bytes: &[u8],
    password: &str,
    salt: Option<String>,
    iterations: Option<u32>,
) -> Result<JsEncryptedBlob, JsValue> {
    let params = kdf_params(salt, iterations);
    warn_default_salt(&params);
    let key = crypto::derive_key(password, &params).map_err(to_js_error)?;
    crypto::encrypt(bytes, &key)
        .map(JsEncryptedBlob::from)
        .map_err(to_js_error)
}

/// Decrypt an `IV || ciphertext` blob.
#[wasm_bindgen]
pub fn decrypt_bytes(
    blob: &[u8],
    password: &str,
    salt: Option<String>,
    iterations: Option<u32>,
) -> Result<Vec<u8>, JsValue> {
    let params = kdf_params(salt, iterations);
    let key = crypto::derive_key(password, &params).map_err(to_js_error)?;
    crypto::decrypt(blob, &key).map_err(to_js_error)
}

pub(crate) fn kdf_params(salt: Option<String>, iterations: Option<u32>) -> KdfParams {
    let defaults = KdfParams::default();
    KdfParams {
        salt: salt.unwrap_or(defaults.salt),
        iterations: iterations.unwrap_or(defaults.iterations),
        key_length: defaults.key_length,
    }
}

/// Surface the hardcoded-salt finding in the browser console.
fn warn_default_salt(params: &KdfParams) {
    #[cfg(target_arch = "wasm32")]
    if params.uses_default_salt() {
        web_sys::console::warn_1(&JsValue::from_str(
            "wavelock: encrypting with the hardcoded default salt",
        ));
    }
    #[cfg(not(target_arch = "wasm32"))]
    let _ = params;
}
