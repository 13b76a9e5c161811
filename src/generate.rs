//! Renders proxy source from a discovered catalog.
//!
//! The syntax of the target language lives entirely behind [`Template`];
//! [`render`] only decides the order things are emitted in.

mod rust;

pub use rust::RustTemplate;

use crate::{
    catalog::ExposureCatalog,
    descriptor::{ClassDescriptor, FunctionDescriptor, Modifiers},
    types::Value,
};
use std::fmt::{self, Write};

/// Syntax rules for one target language.
pub trait Template {
    fn prelude(&self, out: &mut dyn Write) -> fmt::Result;

    fn epilogue(&self, _out: &mut dyn Write) -> fmt::Result {
        Ok(())
    }

    /// A literal expression that evaluates to `value`.
    fn literal(&self, value: &Value) -> String;

    /// The keywords `modifiers` render to, possibly empty.
    fn modifiers(&self, modifiers: &Modifiers) -> String;

    /// A stand-in type whose constructor and methods forward to the exposer.
    fn class(&self, class: &ClassDescriptor, out: &mut dyn Write) -> fmt::Result;

    /// A stand-in callable that forwards with no receiver.
    fn function(&self, function: &FunctionDescriptor, out: &mut dyn Write) -> fmt::Result;
}

/// Classes first, then functions.
pub fn render(catalog: &ExposureCatalog, template: &impl Template) -> Result<String, fmt::Error> {
    let mut out = String::new();
    template.prelude(&mut out)?;
    for class in catalog.classes() {
        out.write_char('\n')?;
        template.class(class, &mut out)?;
    }
    for function in catalog.functions() {
        out.write_char('\n')?;
        template.function(function, &mut out)?;
    }
    template.epilogue(&mut out)?;
    Ok(out)
}
