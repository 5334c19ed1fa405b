//! Symbol resolution and namespace rewriting across parsed units.
//!
//! A [`ContextBuilder`] walks every unit twice to fill a [`Context`]: first
//! with the class-likes and functions each unit declares, then with every
//! node that refers back to one of them. A [`Transform`] then rewrites the
//! recorded nodes in place, and each unit is printed back to source.
//!
//! ```ignore
//! let mut builder = ContextBuilder::new();
//! builder.build_units(&units);
//! let ctx = builder.finish();
//!
//! NamespaceTransform::new(QName::parse("Module"), QName::parse("Cage\\Module"))
//!     .apply(&ctx, &mut units)?;
//! ```

mod collect;
mod context;
mod qname;
mod transform;

pub use collect::{ContextBuilder, DeclarationFinder, NamespaceStack, ReferenceFinder};
pub use context::{Context, NamespaceTree, Symbol, SymbolNamespace};
pub use qname::QName;
pub use transform::{NamespaceTransform, Transform, TransformError, TransformList};
