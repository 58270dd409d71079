pub mod error;
pub mod globals;
pub mod image;
pub mod interpreter;
pub mod stack;

use heap::{ObjectRuntime, RootRange};
use object::Value;

pub use error::{LoadError, RuntimeError, VmError};
pub use globals::GlobalArea;
pub use image::{Image, ImageBuilder, PublicSymbol};
pub use stack::{CallStack, Frame};

#[derive(Debug, Clone)]
pub struct VMSettings {
    /// Maximum number of words the call/operand stack may hold.
    pub stack_capacity: usize,
}

impl Default for VMSettings {
    fn default() -> Self {
        Self {
            stack_capacity: 1 << 20,
        }
    }
}

/// Execution context of one program run.
///
/// Owns the image, the global area, the stack and the object runtime for
/// the lifetime of the run.
pub struct VM<R> {
    pub image: Image,
    pub globals: GlobalArea,
    pub stack: CallStack,
    pub runtime: R,
}

impl<R: ObjectRuntime> VM<R> {
    pub fn new(image: Image, runtime: R, settings: &VMSettings) -> Self {
        let globals = GlobalArea::new(image.global_count());
        Self {
            image,
            globals,
            stack: CallStack::new(settings.stack_capacity),
            runtime,
        }
    }

    pub fn run(&mut self) -> Result<(), VmError> {
        interpreter::interpret(self)
    }

    /// The region the collector treats as roots.
    pub fn roots(&self) -> RootRange<'_> {
        RootRange {
            stack: self.stack.live(),
            globals: self.globals.as_slice(),
        }
    }

    /// The value the outermost function returned, once the run has halted.
    pub fn result(&self) -> Option<Value> {
        self.stack.live().last().copied()
    }
}
