//! Concrete aspect values for one media item.

use super::metadata::AspectId;
use super::value::AttributeValue;
use std::collections::HashMap;

/// One MIA: the attribute values of one aspect on one item. Single-value
/// and multi-value attributes live in separate maps because they are stored
/// differently (fixed columns vs child-table rows).
#[derive(Debug, Clone, PartialEq)]
pub struct AspectInstance {
    pub aspect_id: AspectId,
    values: HashMap<String, AttributeValue>,
    multi_values: HashMap<String, Vec<AttributeValue>>,
}

impl AspectInstance {
    pub fn new(aspect_id: AspectId) -> Self {
        AspectInstance {
            aspect_id,
            values: HashMap::new(),
            multi_values: HashMap::new(),
        }
    }

    pub fn set(mut self, attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.values.insert(attribute.into(), value.into());
        self
    }

    pub fn set_multi(
        mut self,
        attribute: impl Into<String>,
        values: Vec<AttributeValue>,
    ) -> Self {
        self.multi_values.insert(attribute.into(), values);
        self
    }

    pub fn insert(&mut self, attribute: impl Into<String>, value: impl Into<AttributeValue>) {
        self.values.insert(attribute.into(), value.into());
    }

    pub fn insert_multi(&mut self, attribute: impl Into<String>, values: Vec<AttributeValue>) {
        self.multi_values.insert(attribute.into(), values);
    }

    pub fn get(&self, attribute: &str) -> Option<&AttributeValue> {
        self.values.get(attribute)
    }

    pub fn get_multi(&self, attribute: &str) -> Option<&[AttributeValue]> {
        self.multi_values.get(attribute).map(Vec::as_slice)
    }

    pub fn single_values(&self) -> impl Iterator<Item = (&String, &AttributeValue)> {
        self.values.iter()
    }

    pub fn multi_values(&self) -> impl Iterator<Item = (&String, &Vec<AttributeValue>)> {
        self.multi_values.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.multi_values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get() {
        let instance = AspectInstance::new(AspectId::new())
            .set("title", "Blade Runner")
            .set("year", 1982i64)
            .set_multi(
                "genres",
                vec![AttributeValue::from("sci-fi"), AttributeValue::from("noir")],
            );
        assert_eq!(instance.get("title").unwrap().as_text(), Some("Blade Runner"));
        assert_eq!(instance.get("year").unwrap().as_integer(), Some(1982));
        assert_eq!(instance.get_multi("genres").unwrap().len(), 2);
        assert!(instance.get("missing").is_none());
        assert!(!instance.is_empty());
    }
}
