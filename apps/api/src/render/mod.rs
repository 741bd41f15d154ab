// Report rendering. Markdown is the report itself; PDF goes through Typst.

pub mod pdf;

pub use pdf::PdfRenderer;
