use object::Value;

use crate::RuntimeError;

/// Fixed-size storage for global variables.
///
/// Every slot starts out as [`Value::PLACEHOLDER`], so the area can be
/// handed to the collector before the program writes anything.
#[derive(Debug, Clone)]
pub struct GlobalArea {
    slots: Box<[Value]>,
}

impl GlobalArea {
    pub fn new(count: usize) -> Self {
        Self {
            slots: vec![Value::PLACEHOLDER; count].into_boxed_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get_mut(&mut self, index: i32) -> Result<&mut Value, RuntimeError> {
        let count = self.slots.len();
        usize::try_from(index)
            .ok()
            .and_then(|i| self.slots.get_mut(i))
            .ok_or(RuntimeError::GlobalOutOfBounds { index, count })
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_placeholders() {
        let globals = GlobalArea::new(4);
        assert_eq!(globals.len(), 4);
        assert!(globals.as_slice().iter().all(|v| *v == Value::PLACEHOLDER));
    }

    #[test]
    fn access_is_bounds_checked() {
        let mut globals = GlobalArea::new(2);
        *globals.get_mut(1).unwrap() = Value::Int(9);
        assert_eq!(globals.as_slice(), &[Value::PLACEHOLDER, Value::Int(9)]);

        for index in [-1, 2, i32::MAX] {
            assert!(matches!(
                globals.get_mut(index),
                Err(RuntimeError::GlobalOutOfBounds { count: 2, .. })
            ));
        }
    }

    #[test]
    fn empty_area() {
        let mut globals = GlobalArea::new(0);
        assert!(globals.is_empty());
        assert!(globals.get_mut(0).is_err());
    }
}
