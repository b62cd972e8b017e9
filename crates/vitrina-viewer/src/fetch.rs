//! Streaming asset fetch

use gloo_net::http::Request;
use tracing::debug;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::ReadableStreamDefaultReader;

use vitrina_core::{LoadError, LoadSink};

/// Fetch `url` and report through `sink`; meant to run under `spawn_local`
pub async fn fetch_into(url: String, sink: LoadSink) {
    match fetch_bytes(&url, &sink).await {
        Ok(Some(bytes)) => {
            debug!("Fetched {} ({} bytes)", url, bytes.len());
            sink.finish_with_bytes(&bytes);
        }
        Ok(None) => debug!("Fetch of {} abandoned", url),
        Err(e) => {
            sink.fail(e);
        }
    }
}

/// Body bytes, or `None` if the load was cancelled mid-stream
async fn fetch_bytes(url: &str, sink: &LoadSink) -> Result<Option<Vec<u8>>, LoadError> {
    let response = Request::get(url)
        .send()
        .await
        .map_err(|e| LoadError::Network(e.to_string()))?;

    if !response.ok() {
        return Err(LoadError::Http {
            status: response.status(),
            status_text: response.status_text(),
        });
    }

    let total = response
        .headers()
        .get("content-length")
        .and_then(|v| v.trim().parse::<u64>().ok());

    let Some(body) = response.body() else {
        // No stream support: read it whole
        let bytes = response
            .binary()
            .await
            .map_err(|e| LoadError::Network(e.to_string()))?;
        sink.progress(bytes.len() as u64, total);
        return Ok(Some(bytes));
    };

    let reader: ReadableStreamDefaultReader = body.get_reader().unchecked_into();
    let mut bytes = Vec::with_capacity(total.unwrap_or(0) as usize);
    loop {
        if sink.is_cancelled() {
            let _ = reader.cancel();
            return Ok(None);
        }
        let chunk = JsFuture::from(reader.read()).await.map_err(js_error)?;
        let done = js_sys::Reflect::get(&chunk, &JsValue::from_str("done"))
            .map_err(js_error)?
            .as_bool()
            .unwrap_or(true);
        if done {
            break;
        }
        let value = js_sys::Reflect::get(&chunk, &JsValue::from_str("value")).map_err(js_error)?;
        let array = js_sys::Uint8Array::new(&value);
        let start = bytes.len();
        bytes.resize(start + array.length() as usize, 0);
        array.copy_to(&mut bytes[start..]);
        sink.progress(bytes.len() as u64, total);
    }
    Ok(Some(bytes))
}

fn js_error(value: JsValue) -> LoadError {
    LoadError::Network(format!("Fetch failed: {:?}", value))
}
