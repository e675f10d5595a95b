//! Test unit and request models
//!
//! A `TestUnit` is what discovery produces; a `TestRequest` is that unit
//! once it has been handed to a worker lane.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One independently runnable test case
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TestUnit {
    /// Stable ordinal assigned at discovery time
    pub id: u64,
    /// Owning class, suite or file
    pub class: String,
    /// Test name within its class
    pub name: String,
}

impl TestUnit {
    pub fn new(id: u64, class: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            class: class.into(),
            name: name.into(),
        }
    }

    /// Parse a `Class::name` reference. A reference without `::` is treated
    /// as a bare name with an empty class.
    pub fn parse(id: u64, reference: &str) -> Self {
        match reference.rsplit_once("::") {
            Some((class, name)) => Self::new(id, class, name),
            None => Self::new(id, "", reference),
        }
    }

    /// Fully qualified `Class::name`
    pub fn qualified_name(&self) -> String {
        qualify(&self.class, &self.name)
    }
}

impl fmt::Display for TestUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.id, self.qualified_name())
    }
}

/// A test unit in flight to exactly one worker
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRequest {
    pub id: u64,
    pub class: String,
    pub name: String,
}

impl TestRequest {
    pub fn qualified_name(&self) -> String {
        qualify(&self.class, &self.name)
    }
}

impl From<TestUnit> for TestRequest {
    fn from(unit: TestUnit) -> Self {
        Self {
            id: unit.id,
            class: unit.class,
            name: unit.name,
        }
    }
}

impl From<&TestUnit> for TestRequest {
    fn from(unit: &TestUnit) -> Self {
        unit.clone().into()
    }
}

impl fmt::Display for TestRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.id, self.qualified_name())
    }
}

pub(crate) fn qualify(class: &str, name: &str) -> String {
    if class.is_empty() {
        name.to_string()
    } else {
        format!("{class}::{name}")
    }
}
