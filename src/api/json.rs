//! JSON decoding with useful diagnostics.
//!
//! A decode failure on a cached payload is hard to act on when all serde
//! reports is a line and column. This wraps deserialization with the serde
//! path to the offending field plus a snippet of the source line.

use anyhow::Result;

/// Decode `body` into `T`; on failure, the error names the serde path and
/// shows a caret-marked snippet of the line where decoding stopped.
pub fn decode_with_context<T: serde::de::DeserializeOwned>(body: &str) -> Result<T> {
    let de = &mut serde_json::Deserializer::from_str(body);
    match serde_path_to_error::deserialize(de) {
        Ok(value) => Ok(value),
        Err(err) => {
            let inner = err.inner();
            let (line, column) = (inner.line(), inner.column());
            let path = err.path().to_string();

            let mut message = String::new();
            if !path.is_empty() && path != "." {
                message.push_str(&format!("at path '{path}': "));
            }
            message.push_str(&format!(
                "{} (line {line} col {column})\n{}",
                strip_location(&inner.to_string(), line, column),
                snippet(body, line, column)
            ));
            Err(anyhow::anyhow!(message))
        }
    }
}

/// Serde appends " at line X column Y" to its messages; the snippet already
/// shows the location, so drop the suffix.
fn strip_location(message: &str, line: usize, column: usize) -> String {
    let suffix = format!(" at line {line} column {column}");
    message.strip_suffix(&suffix).unwrap_or(message).to_string()
}

/// A caret-marked excerpt of the offending line, clamped to a window around
/// the error column.
fn snippet(body: &str, line: usize, column: usize) -> String {
    let target = body.lines().nth(line.saturating_sub(1)).unwrap_or("");
    if target.is_empty() {
        return "(empty line)".to_string();
    }

    const WINDOW: usize = 20;
    let error_idx = column.saturating_sub(1);
    let start = error_idx.saturating_sub(WINDOW / 2);
    let end = (error_idx + WINDOW / 2).min(target.len());

    let caret = " ".repeat(error_idx - start) + "^";
    format!("...{}...\n   {caret}", &target[start..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::Product;

    #[test]
    fn error_names_the_offending_field() {
        let raw = r#"{"id":5,"name":null,"category":"tools","price":12.5,"stock":40}"#;
        let err = decode_with_context::<Product>(raw).unwrap_err().to_string();
        assert!(err.contains("at path 'name'"), "got: {err}");
        assert!(err.contains('^'));
    }

    #[test]
    fn nested_paths_are_reported() {
        #[derive(Debug, serde::Deserialize)]
        struct Listing {
            #[allow(dead_code)]
            products: Vec<Product>,
        }

        let raw = r#"{"products":[{"id":1,"name":"Hammer","category":"tools","price":"free","stock":2}]}"#;
        let err = decode_with_context::<Listing>(raw).unwrap_err().to_string();
        assert!(err.contains("products[0].price"), "got: {err}");
    }

    #[test]
    fn valid_payloads_pass_through() {
        let raw = r#"{"id":5,"name":"Hammer","category":"tools","price":12.5,"stock":40}"#;
        let product = decode_with_context::<Product>(raw).unwrap();
        assert_eq!(product.name, "Hammer");
    }

    #[test]
    fn empty_body_does_not_panic() {
        let err = decode_with_context::<Product>("").unwrap_err().to_string();
        assert!(err.contains("(empty line)") || err.contains("EOF"), "got: {err}");
    }
}
