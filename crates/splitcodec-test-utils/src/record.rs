//! Records understood by the text engines

use std::any::Any;

/// A record made of named string fields
pub trait TextRecord: Default + PartialEq + std::fmt::Debug + 'static {
    /// Field names in encoding order
    const FIELDS: &'static [&'static str];

    fn field(&self, index: usize) -> &str;

    fn field_mut(&mut self, index: usize) -> &mut String;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Person {
    pub first_name: String,
    pub last_name: String,
}

impl Person {
    pub fn new(first_name: &str, last_name: &str) -> Self {
        Self {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        }
    }
}

impl TextRecord for Person {
    const FIELDS: &'static [&'static str] = &["firstName", "lastName"];

    fn field(&self, index: usize) -> &str {
        match index {
            0 => &self.first_name,
            _ => &self.last_name,
        }
    }

    fn field_mut(&mut self, index: usize) -> &mut String {
        match index {
            0 => &mut self.first_name,
            _ => &mut self.last_name,
        }
    }
}

/// Bytes encoded as a single `text` field, possibly invalid UTF-8
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawText(pub Vec<u8>);

impl RawText {
    pub const FIELD: &'static str = "text";
}

/// Clone hook for [`Person`] decode targets
pub fn clone_person(value: &dyn Any) -> Option<Box<dyn Any>> {
    value
        .downcast_ref::<Person>()
        .map(|p| Box::new(p.clone()) as Box<dyn Any>)
}
