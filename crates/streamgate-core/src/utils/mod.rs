pub mod ndjson;
pub mod sse;

#[cfg(test)]
pub mod test_helpers;
