use stubscope_api::models::{IndexKey, IndexValue};

/// Receives the forward-index occurrences produced by one stub.
pub trait IndexSink {
    fn occurrence(&mut self, key: &IndexKey, value: IndexValue);
}
