// Markup generation: escaping untrusted text and binding records into the LaTeX template.

pub mod escape;
pub mod template;

pub use template::{RenderedDocument, TemplateRenderer};
