//! The exposer's ordered, paginated collection of descriptors.

use crate::{
    descriptor::{CallableDescriptor, ClassDescriptor, FunctionDescriptor},
    dispatcher::Resolve,
    net::ExposurePage,
};
use tracing::debug;

/// Functions come first, then classes; one descriptor per page.
///
/// The catalog is only written during setup and is read-only while it serves
/// pages, so it can be shared across concurrent requests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExposureCatalog {
    functions: Vec<FunctionDescriptor>,
    classes: Vec<ClassDescriptor>,
}

impl ExposureCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends whatever `name` resolves to. A name that resolves to nothing is
    /// a silent no-op; returns whether anything was added.
    pub fn prepare(&mut self, resolver: &impl Resolve, name: &str) -> bool {
        let mut added = false;
        if let Some(class) = resolver.resolve_class(name) {
            self.classes.push(class);
            added = true;
        }
        if let Some(function) = resolver.resolve_function(name) {
            self.functions.push(function);
            added = true;
        }
        if !added {
            debug!(name, "nothing to expose under this name");
        }
        added
    }

    pub fn push(&mut self, descriptor: CallableDescriptor) {
        match descriptor {
            CallableDescriptor::Function(f) => self.functions.push(f),
            CallableDescriptor::Class(c) => self.classes.push(c),
        }
    }

    pub fn functions(&self) -> &[FunctionDescriptor] {
        &self.functions
    }

    pub fn classes(&self) -> &[ClassDescriptor] {
        &self.classes
    }

    pub fn total_pages(&self) -> u64 {
        (self.functions.len() + self.classes.len()) as u64
    }

    pub fn len(&self) -> usize {
        self.functions.len() + self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.functions.clear();
        self.classes.clear();
    }

    /// The descriptor on page `page` (1-based), or `None` when there is no
    /// such page.
    pub fn serve_page(&self, page: u64) -> Option<ExposurePage> {
        let total_pages = self.total_pages();
        let n_functions = self.functions.len() as u64;
        let element = match page {
            0 => return None,
            p if p <= n_functions => {
                CallableDescriptor::Function(self.functions[(p - 1) as usize].clone())
            }
            p if p <= total_pages => {
                CallableDescriptor::Class(self.classes[(p - n_functions - 1) as usize].clone())
            }
            _ => return None,
        };
        Some(ExposurePage {
            page,
            total_pages,
            elements: vec![element],
        })
    }

    /// Like [`ExposureCatalog::serve_page`], with a missing page carried as a
    /// page with no elements.
    pub fn page_or_empty(&self, page: u64) -> ExposurePage {
        self.serve_page(page).unwrap_or_else(|| ExposurePage {
            page,
            total_pages: self.total_pages(),
            elements: Vec::new(),
        })
    }
}
