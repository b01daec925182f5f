pub mod batch;
pub mod config;
pub mod damerau;
pub mod error;
pub mod output;
pub mod seq_reader;

pub use batch::{compute_batch, compute_range, recycled_indices, BatchShape};
#[cfg(not(target_arch = "wasm32"))]
pub use batch::compute_batch_par;
pub use config::DistanceConfig;
pub use damerau::{bounded_distance, distance, DistanceScratch, EditWeights, CEILING_EXCEEDED};
pub use error::{DistanceError, Result};

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use output::DistanceRecord;
use seq_reader::SymbolSequence;

const PROGRESS_CHUNK_SIZE: usize = 1 << 12;

fn js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn report(progress_callback: &js_sys::Function, message: &str) {
    let _ = progress_callback.call1(&JsValue::NULL, &JsValue::from_str(message));
}

fn symbol_from_js(index: usize, value: &JsValue) -> Result<u32> {
    match value.as_f64() {
        Some(n) if n >= 0.0 && n <= u32::MAX as f64 && n.fract() == 0.0 => Ok(n as u32),
        _ => Err(DistanceError::InvalidSymbol {
            index,
            reason: format!("{:?} is not a non-negative integer symbol", value),
        }),
    }
}

/// Accepts a string (codepoints), a `Uint32Array`, an array of integers, or
/// `null`/`undefined` for a missing element.
fn sequence_from_js(index: usize, value: &JsValue) -> Result<SymbolSequence> {
    if value.is_null() || value.is_undefined() {
        return Ok(None);
    }
    if let Some(text) = value.as_string() {
        return Ok(Some(text.chars().map(u32::from).collect()));
    }
    if let Some(typed) = value.dyn_ref::<js_sys::Uint32Array>() {
        return Ok(Some(typed.to_vec()));
    }
    if js_sys::Array::is_array(value) {
        return js_sys::Array::from(value)
            .iter()
            .map(|v| symbol_from_js(index, &v))
            .collect::<Result<Vec<u32>>>()
            .map(Some);
    }
    Err(DistanceError::InvalidSymbol {
        index,
        reason: "expected a string, Uint32Array, array of integers, or null".to_string(),
    })
}

fn sequences_from_js(items: &js_sys::Array, side: &str) -> std::result::Result<Vec<SymbolSequence>, JsValue> {
    items
        .iter()
        .enumerate()
        .map(|(index, value)| sequence_from_js(index, &value))
        .collect::<Result<Vec<_>>>()
        .map_err(|e| JsValue::from_str(&format!("{} batch: {}", side, e)))
}

fn warn_uneven_recycling(shape: BatchShape) {
    if !shape.recycles_evenly() {
        web_sys::console::warn_1(&JsValue::from_str(&format!(
            "longer batch length ({}) is not a multiple of shorter batch length ({})",
            shape.output_len(),
            shape.len_a.min(shape.len_b)
        )));
    }
}

/// Distance between two symbol arrays; -1 when over `max_distance` (0 = no ceiling).
#[wasm_bindgen]
pub fn dl_distance(a: &[u32], b: &[u32], weights: &[f64], max_distance: f64) -> std::result::Result<f64, JsValue> {
    let weights = EditWeights::from_slice(weights).map_err(js_error)?;
    let max_distance = batch::validate_max_distance(max_distance).map_err(js_error)?;
    Ok(distance(a, b, &weights, max_distance))
}

/// Element-wise distances with recycling. Missing slots come back as `NaN`.
#[wasm_bindgen]
pub fn dl_distance_batch(
    a: &js_sys::Array, b: &js_sys::Array, weights: &[f64], max_distance: f64,
) -> std::result::Result<Vec<f64>, JsValue> {
    let a = sequences_from_js(a, "source")?;
    let b = sequences_from_js(b, "target")?;
    let weights = EditWeights::from_slice(weights).map_err(js_error)?;
    let shape = BatchShape::new(a.len(), b.len()).map_err(js_error)?;
    warn_uneven_recycling(shape);
    let results = compute_batch(&a, &b, &weights, max_distance).map_err(js_error)?;
    Ok(results.into_iter().map(|d| d.unwrap_or(f64::NAN)).collect())
}

fn compute_records_with_progress(
    a: &js_sys::Array, b: &js_sys::Array, weights: &[f64], max_distance: f64,
    progress_callback: &js_sys::Function, label: &str,
) -> std::result::Result<Vec<DistanceRecord>, JsValue> {
    report(progress_callback, &format!("Rust Wasm ({}): Starting...", label));
    let a = sequences_from_js(a, "source")?;
    let b = sequences_from_js(b, "target")?;
    let weights = EditWeights::from_slice(weights).map_err(js_error)?;
    let shape = BatchShape::new(a.len(), b.len()).map_err(js_error)?;
    warn_uneven_recycling(shape);

    let total = shape.output_len();
    report(progress_callback, &format!(
        "Rust Wasm ({}): Loaded {} source and {} target sequences, {} pairs.",
        label, shape.len_a, shape.len_b, total
    ));

    let mut all_records = Vec::with_capacity(total);
    let mut start = 0;
    while start < total {
        let end = (start + PROGRESS_CHUNK_SIZE).min(total);
        let results = compute_range(&a, &b, &weights, max_distance, start..end).map_err(js_error)?;
        all_records.extend(output::records(shape, start, &results));
        report(progress_callback, &format!("Rust Wasm ({}): {}/{} pairs processed.", label, end, total));
        start = end;
    }
    Ok(all_records)
}

/// Like [`dl_distance_batch`], returning a JSON array of records with `null` for missing slots.
#[wasm_bindgen]
pub fn dl_distance_batch_json(
    a: &js_sys::Array, b: &js_sys::Array, weights: &[f64], max_distance: f64, progress_callback: &js_sys::Function,
) -> std::result::Result<String, JsValue> {
    let records = compute_records_with_progress(a, b, weights, max_distance, progress_callback, "JSON")?;
    report(progress_callback, "Rust Wasm (JSON): Serializing data...");
    output::records_to_json(&records).map_err(|e| JsValue::from_str(&format!("JSON serialization error: {}", e)))
}

/// Like [`dl_distance_batch`], returning an Arrow IPC file.
#[wasm_bindgen]
pub fn dl_distance_batch_ipc(
    a: &js_sys::Array, b: &js_sys::Array, weights: &[f64], max_distance: f64, progress_callback: &js_sys::Function,
) -> std::result::Result<Vec<u8>, JsValue> {
    let records = compute_records_with_progress(a, b, weights, max_distance, progress_callback, "IPC")?;
    report(progress_callback, "Rust Wasm (IPC): Finalizing IPC stream...");
    let bytes = output::records_to_ipc_bytes(&records)
        .map_err(|e| JsValue::from_str(&format!("Arrow IPC error: {}", e)))?;
    report(progress_callback, "Rust Wasm (IPC): Processing complete.");
    Ok(bytes)
}
