//! Divergence sink that keeps owned copies of every record

use parking_lot::Mutex;
use splitcodec_core::{Divergence, FlagSet, OperationKind};
use std::fmt::Display;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedDivergence {
    pub caller: String,
    pub op: OperationKind,
    pub type_name: String,
    pub input: String,
    pub output: String,
    pub old_error: Option<String>,
    pub new_error: Option<String>,
    pub flags: FlagSet,
}

#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    records: Arc<Mutex<Vec<RecordedDivergence>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Callback to register with a codec; shares storage with `self`
    pub fn callback<E>(&self) -> impl Fn(&Divergence<'_, E>) + Send + Sync + 'static
    where
        E: Display + 'static,
    {
        let records = Arc::clone(&self.records);
        move |d: &Divergence<'_, E>| {
            records.lock().push(RecordedDivergence {
                caller: d.caller.to_string(),
                op: d.op,
                type_name: d.type_name.to_string(),
                input: format!("{:?}", d.input),
                output: format!("{:?}", d.output),
                old_error: d.old_error.map(ToString::to_string),
                new_error: d.new_error.map(ToString::to_string),
                flags: d.flags.clone(),
            });
        }
    }

    pub fn records(&self) -> Vec<RecordedDivergence> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}
